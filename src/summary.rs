use colored::Colorize;
use itertools::Itertools;
use term_table::{row, row::Row, rows, table_cell::*, Table, TableStyle};

use crate::model::{System, UsagePattern};

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

fn format_count(count: f64) -> String {
    if count >= 1e6 {
        format!("{:.2}M", count / 1e6)
    } else if count >= 1e4 {
        format!("{:.1}k", count / 1e3)
    } else if (count - count.round()).abs() < 1e-9 {
        format!("{:.0}", count)
    } else {
        format!("{:.1}", count)
    }
}

/// One table per usage pattern: where the journeys run and how often.
pub fn print_patterns(system: &System) {
    println!("\n{}", " Usage patterns ".reversed().green());
    for pattern in &system.patterns {
        println!("{}:", pattern.name.green());

        let devices = format!(
            "{} ({})",
            pattern.devices.iter().map(|d| d.name.as_str()).join(", "),
            format_count(pattern.population())
        );
        let table = Table::builder()
            .rows(rows![
                row![
                    TableCell::builder("Journey".bold()).build(),
                    TableCell::builder("Country".bold()).build(),
                    TableCell::builder("Devices".bold()).build(),
                    TableCell::builder("Occurrences".bold()).build(),
                    TableCell::builder("Journey time".bold()).build(),
                    TableCell::builder("User time".bold()).build(),
                    TableCell::builder("Up / occurrence".bold()).build(),
                    TableCell::builder("Down / occurrence".bold()).build()
                ],
                row![
                    TableCell::new(&pattern.journey.name),
                    TableCell::new(pattern.country),
                    TableCell::new(devices),
                    TableCell::new(format_count(pattern.occurrences())),
                    TableCell::new(format!("{}", pattern.journey.duration())),
                    TableCell::new(format!("{}", pattern.user_time())),
                    TableCell::new(format!("{}", pattern.journey.data_upload())),
                    TableCell::new(format!("{}", pattern.journey.data_download()))
                ]
            ])
            .style(TableStyle::rounded())
            .build();

        println!("{}", table.render());
    }
}

/// Per-server rollup of the demand every pattern routes to it.
pub fn print_servers(system: &System) {
    println!("\n{}", " Server demand ".reversed().green());

    let mut rows = vec![row![
        TableCell::builder("Server".bold()).build(),
        TableCell::builder("Requests".bold()).build(),
        TableCell::builder("Data in".bold()).build(),
        TableCell::builder("Data out".bold()).build(),
        TableCell::builder("Data stored".bold()).build(),
        TableCell::builder("Busy time".bold()).build()
    ]];
    for demand in system.server_demand() {
        let requests = match demand.requests {
            r if r == 0.0 => "--".bright_black().to_string(),
            r => format_count(r),
        };
        rows.push(row![
            TableCell::new(&demand.server.name),
            TableCell::new(requests),
            TableCell::new(format!("{}", demand.data_upload)),
            TableCell::new(format!("{}", demand.data_download)),
            TableCell::new(format!("{}", demand.data_stored)),
            TableCell::new(format!("{}", demand.busy_time))
        ]);
    }

    let table = Table::builder()
        .rows(rows)
        .style(TableStyle::rounded())
        .build();
    println!("{}", table.render());
}

/// Series statistics for a single pattern: totals per year, the peak hour
/// and the weekly usage shape.
pub fn print_usage(pattern: &UsagePattern) {
    println!("\n{}", format!(" {} ", pattern.name).reversed().green());
    println!(
        "{} occurrences across {} hour buckets",
        format_count(pattern.occurrences()),
        pattern.series.len()
    );

    if let Some((timestamp, peak)) = pattern.series.peak() {
        println!(
            "peak of {} at {}",
            format_count(peak).green(),
            timestamp.format("%Y-%m-%d %H:%M")
        );
    }

    let mut year_rows = vec![row![
        TableCell::builder("Year".bold()).build(),
        TableCell::builder("Occurrences".bold()).build()
    ]];
    for (year, total) in pattern.series.totals_by_year() {
        year_rows.push(row![
            TableCell::new(year.to_string()),
            TableCell::new(format_count(total))
        ]);
    }
    let table = Table::builder()
        .rows(year_rows)
        .style(TableStyle::rounded())
        .build();
    println!("{}", table.render());

    // Weekly shape: per-weekday totals and the hours that see any usage.
    let profile = pattern.series.weekly_profile();
    let mut day_rows = vec![row![
        TableCell::builder("Day".bold()).build(),
        TableCell::builder("Occurrences".bold()).build(),
        TableCell::builder("Active hours".bold()).build()
    ]];
    for (day, hours) in profile.iter().enumerate() {
        let total: f64 = hours.iter().sum();
        let active = hours
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.0)
            .map(|(h, _)| format!("{:02}", h))
            .join(" ");
        day_rows.push(row![
            TableCell::new(WEEKDAYS[day]),
            TableCell::new(format_count(total)),
            TableCell::new(active)
        ]);
    }
    let table = Table::builder()
        .rows(day_rows)
        .style(TableStyle::rounded())
        .build();
    println!("{}", table.render());
}

/// Every sourced value in the system, with its owner and provenance.
pub fn print_assumptions(system: &System) {
    println!("\n{}", " Assumptions ".reversed().green());

    let mut rows = vec![row![
        TableCell::builder("Owner".bold()).build(),
        TableCell::builder("Assumption".bold()).build(),
        TableCell::builder("Value".bold()).build(),
        TableCell::builder("Source".bold()).build()
    ]];
    for assumption in system.assumptions() {
        rows.push(row![
            TableCell::new(assumption.owner),
            TableCell::new(assumption.label),
            TableCell::new(assumption.value),
            TableCell::new(assumption.source)
        ]);
    }

    let table = Table::builder()
        .rows(rows)
        .style(TableStyle::rounded())
        .build();
    println!("{}", table.render());
}
