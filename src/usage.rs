use anyhow::{anyhow, bail, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Deserialize;
use std::ops::Add;
use tracing::debug;

use crate::quantity::TimeSpan;

// ******** ******** ********
// **   HOURLY USAGE       **
// ******** ******** ********

/// How often occurrences of a user journey are launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// A time-indexed series with one value per hour: how many user-journey
/// occurrences start in that hour.
#[derive(Debug, Clone, PartialEq)]
pub struct HourlySeries {
    start: NaiveDateTime,
    values: Vec<f64>,
}

impl HourlySeries {
    pub fn empty() -> Self {
        HourlySeries {
            start: NaiveDateTime::UNIX_EPOCH,
            values: vec![],
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// First hour bucket past the end of the series.
    pub fn end(&self) -> NaiveDateTime {
        self.start + Duration::hours(self.values.len() as i64)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Element-wise sum over the union span of both series. Hours covered by
    /// only one operand keep that operand's value.
    pub fn add(&self, other: &HourlySeries) -> HourlySeries {
        if self.is_empty() {
            return other.clone();
        }
        if other.is_empty() {
            return self.clone();
        }

        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        let len = (end - start).num_hours() as usize;
        let mut values = vec![0.0; len];

        for (offset, series) in [self, other].iter().map(|s| {
            let offset = (s.start - start).num_hours() as usize;
            (offset, s)
        }) {
            for (i, v) in series.values.iter().enumerate() {
                values[offset + i] += v;
            }
        }

        HourlySeries { start, values }
    }

    /// Total occurrences per calendar year, in chronological order.
    pub fn totals_by_year(&self) -> Vec<(i32, f64)> {
        let mut totals: Vec<(i32, f64)> = vec![];
        for (i, v) in self.values.iter().enumerate() {
            let year = (self.start + Duration::hours(i as i64)).year();
            match totals.last_mut() {
                Some((y, total)) if *y == year => *total += v,
                _ => totals.push((year, *v)),
            }
        }
        totals
    }

    /// The busiest hour bucket. Ties resolve to the earliest bucket.
    pub fn peak(&self) -> Option<(NaiveDateTime, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, v) in self.values.iter().enumerate() {
            match best {
                Some((_, max)) if *v <= max => {}
                _ => best = Some((i, *v)),
            }
        }
        best.map(|(i, v)| (self.start + Duration::hours(i as i64), v))
    }

    /// Occurrences accumulated into a 7x24 grid: weekday (0 = Monday) by
    /// hour of day.
    pub fn weekly_profile(&self) -> [[f64; 24]; 7] {
        let mut profile = [[0.0; 24]; 7];
        for (i, v) in self.values.iter().enumerate() {
            let ts = self.start + Duration::hours(i as i64);
            let day = ts.weekday().num_days_from_monday() as usize;
            profile[day][ts.hour() as usize] += v;
        }
        profile
    }
}

impl Add<&HourlySeries> for &HourlySeries {
    type Output = HourlySeries;

    fn add(self, rhs: &HourlySeries) -> HourlySeries {
        HourlySeries::add(self, rhs)
    }
}

// ******** ******** ********
// **     GENERATORS       **
// ******** ******** ********

fn check_hours(hours: &[u32]) -> Result<()> {
    for hour in hours {
        if *hour > 23 {
            bail!("hour of day {} is out of range 0..=23", hour);
        }
    }
    Ok(())
}

fn check_days(frequency: Frequency, days: &[u32]) -> Result<()> {
    let (min, max, what) = match frequency {
        Frequency::Daily => return Ok(()),
        Frequency::Weekly => (0, 6, "day of week (0 = Monday)"),
        Frequency::Monthly => (1, 31, "day of month"),
        Frequency::Yearly => (1, 366, "day of year"),
    };
    for day in days {
        if *day < min || *day > max {
            bail!("{} {} is out of range {}..={}", what, day, min, max);
        }
    }
    Ok(())
}

fn default_active_days(frequency: Frequency) -> &'static [u32] {
    match frequency {
        Frequency::Daily => &[],
        // Monday, or the first day of the month / year.
        Frequency::Weekly => &[0],
        Frequency::Monthly | Frequency::Yearly => &[1],
    }
}

fn bucket_count(timespan: TimeSpan) -> Result<usize> {
    let n = timespan.hours().floor() as i64 + 1;
    if n <= 0 {
        bail!("timespan must cover at least one hour");
    }
    Ok(n as usize)
}

fn days_in_year(year: i32) -> u32 {
    NaiveDate::from_ymd_opt(year, 12, 31).map_or(365, |d| d.ordinal())
}

/// Deposits `volume` into every hour bucket of `[start, start + timespan]`
/// matching the frequency rule: the hour of day must be listed in
/// `launch_hours`, and for weekly/monthly/yearly frequencies the day must be
/// listed in `active_days` (day of week counted from Monday = 0, day of
/// month and day of year counted from 1).
///
/// Empty `launch_hours` defaults to midnight. Empty `active_days` defaults
/// to Monday (weekly) or the first day (monthly/yearly); daily rules must
/// leave it empty.
pub fn from_frequency(
    volume: f64,
    start: NaiveDate,
    timespan: TimeSpan,
    frequency: Frequency,
    active_days: &[u32],
    launch_hours: &[u32],
) -> Result<HourlySeries> {
    if frequency == Frequency::Daily && !active_days.is_empty() {
        bail!("active_days must be empty for daily frequency");
    }
    check_hours(launch_hours)?;
    check_days(frequency, active_days)?;

    let active_days = if active_days.is_empty() {
        default_active_days(frequency)
    } else {
        active_days
    };
    let launch_hours: &[u32] = if launch_hours.is_empty() {
        &[0]
    } else {
        launch_hours
    };

    let start = start.and_time(NaiveTime::MIN);
    let mut values = vec![0.0; bucket_count(timespan)?];
    for (i, slot) in values.iter_mut().enumerate() {
        let ts = start + Duration::hours(i as i64);
        if !launch_hours.contains(&ts.hour()) {
            continue;
        }
        let day_matches = match frequency {
            Frequency::Daily => true,
            Frequency::Weekly => active_days.contains(&ts.weekday().num_days_from_monday()),
            Frequency::Monthly => active_days.contains(&ts.day()),
            Frequency::Yearly => active_days.contains(&ts.ordinal()),
        };
        if day_matches {
            *slot = volume;
        }
    }

    debug!(
        "synthesized {} hour buckets from {:?} frequency rule",
        values.len(),
        frequency
    );
    Ok(HourlySeries { start, values })
}

/// Spreads `daily_volume` evenly over the listed hours of every day in
/// `[start, start + timespan]`.
pub fn from_daily_volume(
    daily_volume: f64,
    start: NaiveDate,
    timespan: TimeSpan,
    active_hours: &[u32],
) -> Result<HourlySeries> {
    if active_hours.is_empty() {
        bail!("active_hours must list at least one hour of the day");
    }
    check_hours(active_hours)?;

    let per_hour = daily_volume / active_hours.len() as f64;
    let start = start.and_time(NaiveTime::MIN);
    let mut values = vec![0.0; bucket_count(timespan)?];
    for (i, slot) in values.iter_mut().enumerate() {
        let ts = start + Duration::hours(i as i64);
        if active_hours.contains(&ts.hour()) {
            *slot = per_hour;
        }
    }

    Ok(HourlySeries { start, values })
}

/// Distributes each year's total volume over that year's active slots and
/// sums the per-year series into one. The slot count is leap-aware: a daily
/// rule has 366 active days in a leap year, so every year's series adds up
/// to exactly the year's given total.
pub fn from_yearly_volumes(
    volumes: &[(i32, f64)],
    frequency: Frequency,
    active_days: &[u32],
    launch_hours: &[u32],
) -> Result<HourlySeries> {
    if frequency == Frequency::Daily && !active_days.is_empty() {
        bail!("active_days must be empty for daily frequency");
    }
    check_hours(launch_hours)?;
    check_days(frequency, active_days)?;

    let active_days = if active_days.is_empty() {
        default_active_days(frequency)
    } else {
        active_days
    };
    let nb_hours = if launch_hours.is_empty() {
        1
    } else {
        launch_hours.len()
    };

    let mut total = HourlySeries::empty();
    for &(year, volume) in volumes {
        let days = days_in_year(year);
        let slots = match frequency {
            Frequency::Daily => days as usize,
            Frequency::Weekly => 52 * active_days.len(),
            Frequency::Monthly => 12 * active_days.len(),
            Frequency::Yearly => active_days.len(),
        } * nb_hours;

        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| anyhow!("invalid year {}", year))?;
        let timespan = TimeSpan::from_hours((days * 24 - 1) as f64);
        let series = from_frequency(
            volume / slots as f64,
            start,
            timespan,
            frequency,
            active_days,
            launch_hours,
        )?;
        total = total.add(&series);
    }
    Ok(total)
}

// ******** ******** ********
// **    USAGE RULES       **
// ******** ******** ********

/// Config-facing description of when a usage pattern's journeys start.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum UsageRule {
    /// A fixed volume deposited at every matching calendar slot.
    Frequency {
        volume: f64,
        frequency: Frequency,
        #[serde(default)]
        active_days: Vec<u32>,
        #[serde(default)]
        launch_hours: Vec<u32>,
        timespan: TimeSpan,
    },
    /// A daily volume spread evenly over the listed hours of every day.
    DailyVolume {
        volume: f64,
        hours: Vec<u32>,
        timespan: TimeSpan,
    },
    /// Explicit per-year totals distributed over each year's active slots.
    YearlyVolumes {
        volumes: Vec<YearlyVolume>,
        frequency: Frequency,
        #[serde(default)]
        active_days: Vec<u32>,
        #[serde(default)]
        launch_hours: Vec<u32>,
    },
    /// A yearly per-user occurrence rate applied to the pattern's device
    /// population, spread daily over the listed hours. Covers whole calendar
    /// years beginning with the start year.
    PerUser {
        rate: f64,
        hours: Vec<u32>,
        timespan: TimeSpan,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct YearlyVolume {
    pub year: i32,
    pub total: f64,
}

impl UsageRule {
    /// Synthesizes the hourly series for this rule. `population` is the
    /// total device count of the usage pattern, used only by per-user rules.
    pub fn resolve(&self, start_date: NaiveDate, population: f64) -> Result<HourlySeries> {
        match self {
            UsageRule::Frequency {
                volume,
                frequency,
                active_days,
                launch_hours,
                timespan,
            } => from_frequency(
                *volume,
                start_date,
                *timespan,
                *frequency,
                active_days,
                launch_hours,
            ),
            UsageRule::DailyVolume {
                volume,
                hours,
                timespan,
            } => from_daily_volume(*volume, start_date, *timespan, hours),
            UsageRule::YearlyVolumes {
                volumes,
                frequency,
                active_days,
                launch_hours,
            } => {
                let volumes = volumes.iter().map(|v| (v.year, v.total)).collect::<Vec<_>>();
                from_yearly_volumes(&volumes, *frequency, active_days, launch_hours)
            }
            UsageRule::PerUser {
                rate,
                hours,
                timespan,
            } => {
                let nb_years = (timespan.hours() / (24.0 * 365.25)).round().max(1.0) as i32;
                let mut total = HourlySeries::empty();
                for year in start_date.year()..start_date.year() + nb_years {
                    let days = days_in_year(year);
                    let start = NaiveDate::from_ymd_opt(year, 1, 1)
                        .ok_or_else(|| anyhow!("invalid year {}", year))?;
                    let series = from_daily_volume(
                        rate * population / days as f64,
                        start,
                        TimeSpan::from_hours((days * 24 - 1) as f64),
                        hours,
                    )?;
                    total = total.add(&series);
                }
                Ok(total)
            }
        }
    }
}
