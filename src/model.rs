use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use itertools::Itertools;
use std::fmt;
use std::rc::Rc;
use tracing::info;

use crate::builders;
use crate::config::{Config, DeviceKind, NetworkKind, ServerKind};
use crate::countries;
use crate::quantity::{DataSize, EnergyPerData, Mass, Power, Sourced, TimeSpan};
use crate::usage::HourlySeries;

// ******** ******** ********
// **   SCENARIO GRAPH     **
// ******** ******** ********

#[derive(Debug)]
pub struct Storage {
    pub name: String,
    pub capacity: Sourced<DataSize>,
    pub lifespan: Sourced<TimeSpan>,
    pub power: Sourced<Power>,
    pub idle_power: Sourced<Power>,
    pub fabrication_carbon: Sourced<Mass>,
    pub replication_factor: Sourced<f64>,
}

#[derive(Debug)]
pub struct Server {
    pub name: String,
    pub kind: ServerKind,
    pub storage: Rc<Storage>,
    pub ram: Sourced<DataSize>,
    pub cpu_cores: Sourced<f64>,
    pub power: Sourced<Power>,
    pub idle_power: Sourced<Power>,
    pub fabrication_carbon: Sourced<Mass>,
    pub lifespan: Sourced<TimeSpan>,
    pub power_usage_effectiveness: Sourced<f64>,
}

#[derive(Debug)]
pub struct Network {
    pub name: String,
    pub kind: NetworkKind,
    pub energy_intensity: Sourced<EnergyPerData>,
}

#[derive(Debug)]
pub struct Device {
    pub name: String,
    pub kind: DeviceKind,
    pub count: Sourced<f64>,
    pub power: Sourced<Power>,
    pub lifespan: Sourced<TimeSpan>,
    pub fabrication_carbon: Sourced<Mass>,
    pub daily_use: Sourced<TimeSpan>,
}

/// A unit of server demand triggered by a journey step. `trials` repeats the
/// job within a single occurrence.
#[derive(Debug)]
pub struct Job {
    pub name: String,
    pub server: Rc<Server>,
    pub data_upload: Sourced<DataSize>,
    pub data_download: Sourced<DataSize>,
    pub data_stored: Sourced<DataSize>,
    pub request_duration: Sourced<TimeSpan>,
    pub ram_needed: Sourced<DataSize>,
    pub cpu_needed: Sourced<f64>,
    pub trials: f64,
}

#[derive(Debug)]
pub struct JourneyStep {
    pub name: String,
    pub user_time: Sourced<TimeSpan>,
    pub jobs: Vec<Rc<Job>>,
}

#[derive(Debug)]
pub struct UserJourney {
    pub name: String,
    pub steps: Vec<Rc<JourneyStep>>,
}

impl UserJourney {
    /// Time a user spends on one occurrence of this journey.
    pub fn duration(&self) -> TimeSpan {
        self.steps.iter().map(|s| s.user_time.value).sum()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Rc<Job>> {
        self.steps.iter().flat_map(|s| s.jobs.iter())
    }

    pub fn data_upload(&self) -> DataSize {
        self.jobs().map(|j| j.data_upload.value * j.trials).sum()
    }

    pub fn data_download(&self) -> DataSize {
        self.jobs().map(|j| j.data_download.value * j.trials).sum()
    }

    pub fn data_stored(&self) -> DataSize {
        self.jobs().map(|j| j.data_stored.value * j.trials).sum()
    }
}

/// A user journey bound to a device population, network and country, with
/// its synthesized hourly usage series.
#[derive(Debug)]
pub struct UsagePattern {
    pub name: String,
    pub journey: Rc<UserJourney>,
    pub devices: Vec<Rc<Device>>,
    pub network: Rc<Network>,
    pub country_code: String,
    pub country: &'static str,
    pub series: HourlySeries,
}

impl UsagePattern {
    /// Journey occurrences over the whole modeled span.
    pub fn occurrences(&self) -> f64 {
        self.series.total()
    }

    pub fn population(&self) -> f64 {
        self.devices.iter().map(|d| d.count.value).sum()
    }

    /// Total user time over the whole modeled span.
    pub fn user_time(&self) -> TimeSpan {
        self.journey.duration() * self.occurrences()
    }
}

/// Usage a system routes to one server, accumulated over every pattern's
/// modeled span.
#[derive(Debug)]
pub struct ServerDemand {
    pub server: Rc<Server>,
    pub requests: f64,
    pub data_upload: DataSize,
    pub data_download: DataSize,
    pub data_stored: DataSize,
    pub busy_time: TimeSpan,
}

/// One sourced value of the scenario graph, flattened for display.
#[derive(Debug)]
pub struct Assumption {
    pub owner: String,
    pub label: String,
    pub value: String,
    pub source: String,
}

fn record<T: fmt::Display>(
    out: &mut Vec<Assumption>,
    owner: &str,
    field: &str,
    sourced: &Sourced<T>,
) {
    out.push(Assumption {
        owner: owner.to_string(),
        label: sourced
            .label
            .clone()
            .unwrap_or_else(|| field.replace('_', " ")),
        value: sourced.value.to_string(),
        source: sourced.source.to_string(),
    });
}

// ******** ******** ********
// **       SYSTEM         **
// ******** ******** ********

/// The resolved scenario graph of one config.
#[derive(Debug)]
pub struct System {
    pub name: String,
    pub start_date: NaiveDate,
    pub storages: Vec<Rc<Storage>>,
    pub servers: Vec<Rc<Server>>,
    pub patterns: Vec<UsagePattern>,
}

impl System {
    /// Builds the scenario graph, resolving every by-name reference and
    /// synthesizing each pattern's hourly usage series.
    pub fn resolve(config: &Config) -> Result<System> {
        let start_date = config.system.start_date;

        let storages = config
            .storages
            .iter()
            .map(|spec| Rc::new(builders::hardware::storage_from_spec(spec)))
            .collect::<Vec<_>>();

        let mut servers = vec![];
        for spec in &config.servers {
            let storage = storages
                .iter()
                .find(|s| s.name == spec.storage)
                .with_context(|| {
                    format!(
                        "server '{}' references unknown storage '{}'",
                        spec.name, spec.storage
                    )
                })?;
            servers.push(Rc::new(builders::hardware::server_from_spec(
                spec,
                Rc::clone(storage),
            )?));
        }

        let mut jobs = vec![];
        for spec in &config.jobs {
            let server = servers
                .iter()
                .find(|s| s.name == spec.server)
                .with_context(|| {
                    format!(
                        "job '{}' references unknown server '{}'",
                        spec.name, spec.server
                    )
                })?;
            jobs.push(Rc::new(builders::job_from_spec(spec, Rc::clone(server))?));
        }

        let mut steps = vec![];
        for spec in &config.steps {
            let mut step_jobs = vec![];
            for job_name in &spec.jobs {
                let job = jobs.iter().find(|j| &j.name == job_name).with_context(|| {
                    format!("step '{}' references unknown job '{}'", spec.name, job_name)
                })?;
                step_jobs.push(Rc::clone(job));
            }
            steps.push(Rc::new(JourneyStep {
                name: spec.name.clone(),
                user_time: spec.user_time.clone(),
                jobs: step_jobs,
            }));
        }

        let mut journeys = vec![];
        for spec in &config.journeys {
            let mut journey_steps = vec![];
            for step_name in &spec.steps {
                let step = steps.iter().find(|s| &s.name == step_name).with_context(|| {
                    format!(
                        "journey '{}' references unknown step '{}'",
                        spec.name, step_name
                    )
                })?;
                journey_steps.push(Rc::clone(step));
            }
            journeys.push(Rc::new(UserJourney {
                name: spec.name.clone(),
                steps: journey_steps,
            }));
        }

        let networks = config
            .networks
            .iter()
            .map(|spec| Rc::new(builders::hardware::network_from_spec(spec)))
            .collect::<Vec<_>>();
        let devices = config
            .devices
            .iter()
            .map(|spec| Rc::new(builders::hardware::device_from_spec(spec)))
            .collect::<Vec<_>>();

        let mut patterns = vec![];
        for spec in &config.usage_patterns {
            let journey = journeys
                .iter()
                .find(|j| j.name == spec.journey)
                .with_context(|| {
                    format!(
                        "usage pattern '{}' references unknown journey '{}'",
                        spec.name, spec.journey
                    )
                })?;
            let network = networks
                .iter()
                .find(|n| n.name == spec.network)
                .with_context(|| {
                    format!(
                        "usage pattern '{}' references unknown network '{}'",
                        spec.name, spec.network
                    )
                })?;
            let mut pattern_devices = vec![];
            for device_name in &spec.devices {
                let device = devices
                    .iter()
                    .find(|d| &d.name == device_name)
                    .with_context(|| {
                        format!(
                            "usage pattern '{}' references unknown device '{}'",
                            spec.name, device_name
                        )
                    })?;
                pattern_devices.push(Rc::clone(device));
            }
            let country = countries::country_name(&spec.country).with_context(|| {
                format!(
                    "usage pattern '{}' references unknown country code '{}'",
                    spec.name, spec.country
                )
            })?;

            let population = pattern_devices.iter().map(|d| d.count.value).sum();
            let series = spec
                .usage
                .resolve(start_date, population)
                .with_context(|| {
                    format!("unable to synthesize usage for pattern '{}'", spec.name)
                })?;

            patterns.push(UsagePattern {
                name: spec.name.clone(),
                journey: Rc::clone(journey),
                devices: pattern_devices,
                network: Rc::clone(network),
                country_code: spec.country.clone(),
                country,
                series,
            });
        }

        if patterns.is_empty() {
            bail!(
                "system '{}' must declare at least one usage pattern",
                config.system.name
            );
        }

        info!(
            "resolved system '{}': {} usage patterns over {} servers",
            config.system.name,
            patterns.len(),
            servers.len()
        );

        Ok(System {
            name: config.system.name.clone(),
            start_date,
            storages,
            servers,
            patterns,
        })
    }

    pub fn find_pattern(&self, name: &str) -> Result<&UsagePattern> {
        self.patterns
            .iter()
            .find(|p| p.name == name)
            .context(format!("Unable to find usage pattern with name {}", name))
    }

    /// Rolls every pattern's occurrences up into per-server totals, in
    /// config order. Servers no pattern reaches report zero demand.
    pub fn server_demand(&self) -> Vec<ServerDemand> {
        self.servers
            .iter()
            .map(|server| {
                let mut demand = ServerDemand {
                    server: Rc::clone(server),
                    requests: 0.0,
                    data_upload: DataSize::zero(),
                    data_download: DataSize::zero(),
                    data_stored: DataSize::zero(),
                    busy_time: TimeSpan::zero(),
                };
                for pattern in &self.patterns {
                    let occurrences = pattern.occurrences();
                    for job in pattern.journey.jobs() {
                        if !Rc::ptr_eq(&job.server, server) {
                            continue;
                        }
                        let executions = occurrences * job.trials;
                        demand.requests += executions;
                        demand.data_upload = demand.data_upload + job.data_upload.value * executions;
                        demand.data_download =
                            demand.data_download + job.data_download.value * executions;
                        demand.data_stored = demand.data_stored + job.data_stored.value * executions;
                        demand.busy_time =
                            demand.busy_time + job.request_duration.value * executions;
                    }
                }
                demand
            })
            .collect()
    }

    /// Every sourced value in the graph, flattened with its owner. The
    /// input-side of explainability: what was assumed, and on whose
    /// authority.
    pub fn assumptions(&self) -> Vec<Assumption> {
        let mut out = vec![];

        for storage in &self.storages {
            let owner = format!("storage {}", storage.name);
            record(&mut out, &owner, "capacity", &storage.capacity);
            record(&mut out, &owner, "lifespan", &storage.lifespan);
            record(&mut out, &owner, "power", &storage.power);
            record(&mut out, &owner, "idle_power", &storage.idle_power);
            record(&mut out, &owner, "fabrication_carbon", &storage.fabrication_carbon);
            record(&mut out, &owner, "replication_factor", &storage.replication_factor);
        }

        for server in &self.servers {
            let owner = format!("server {}", server.name);
            record(&mut out, &owner, "ram", &server.ram);
            record(&mut out, &owner, "cpu_cores", &server.cpu_cores);
            record(&mut out, &owner, "power", &server.power);
            record(&mut out, &owner, "idle_power", &server.idle_power);
            record(&mut out, &owner, "fabrication_carbon", &server.fabrication_carbon);
            record(&mut out, &owner, "lifespan", &server.lifespan);
            record(
                &mut out,
                &owner,
                "power_usage_effectiveness",
                &server.power_usage_effectiveness,
            );
        }

        for network in self
            .patterns
            .iter()
            .map(|p| &p.network)
            .unique_by(|n| n.name.clone())
        {
            let owner = format!("network {}", network.name);
            record(&mut out, &owner, "energy_intensity", &network.energy_intensity);
        }

        for device in self
            .patterns
            .iter()
            .flat_map(|p| p.devices.iter())
            .unique_by(|d| d.name.clone())
        {
            let owner = format!("device {}", device.name);
            record(&mut out, &owner, "count", &device.count);
            record(&mut out, &owner, "power", &device.power);
            record(&mut out, &owner, "lifespan", &device.lifespan);
            record(&mut out, &owner, "fabrication_carbon", &device.fabrication_carbon);
            record(&mut out, &owner, "daily_use", &device.daily_use);
        }

        for journey in self
            .patterns
            .iter()
            .map(|p| &p.journey)
            .unique_by(|j| j.name.clone())
        {
            for step in &journey.steps {
                let owner = format!("step {}", step.name);
                record(&mut out, &owner, "user_time", &step.user_time);
            }
        }

        for job in self
            .patterns
            .iter()
            .flat_map(|p| p.journey.jobs())
            .unique_by(|j| j.name.clone())
        {
            let owner = format!("job {}", job.name);
            record(&mut out, &owner, "data_upload", &job.data_upload);
            record(&mut out, &owner, "data_download", &job.data_download);
            record(&mut out, &owner, "data_stored", &job.data_stored);
            record(&mut out, &owner, "request_duration", &job.request_duration);
            record(&mut out, &owner, "ram_needed", &job.ram_needed);
            record(&mut out, &owner, "cpu_needed", &job.cpu_needed);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::quantity::Source;

    fn minimal_config() -> &'static str {
        r#"
        [system]
        name = "minimal"
        start_date = "2025-01-01"

        [[storage]]
        name = "disk"

        [[server]]
        name = "app"
        storage = "disk"

        [[job]]
        name = "fetch"
        server = "app"
        data_upload = "50 kB"
        data_download = "2 MB"
        data_stored = "0 B"
        request_duration = "3 s"
        ram_needed = "2 GB"
        cpu_needed = 1.0
        trials = 5.0

        [[step]]
        name = "browse"
        user_time = { value = "5 min", source = "user-data" }
        jobs = ["fetch"]

        [[journey]]
        name = "visit"
        steps = ["browse"]

        [[network]]
        name = "net"

        [[device]]
        name = "laptops"
        kind = "laptop"

        [[usage_pattern]]
        name = "daily_visits"
        journey = "visit"
        devices = ["laptops"]
        network = "net"
        country = "FR"
        usage = { kind = "daily-volume", volume = 100.0, hours = [9, 10], timespan = "10 day" }
        "#
    }

    #[test]
    fn resolves_a_minimal_system() -> Result<()> {
        let config = Config::try_from_str(minimal_config())?;
        let system = System::resolve(&config)?;

        assert_eq!(system.patterns.len(), 1);
        let pattern = &system.patterns[0];
        assert_eq!(pattern.country, "France");
        assert!((pattern.occurrences() - 1000.0).abs() < 1e-6);
        assert_eq!(pattern.journey.duration(), TimeSpan::from_minutes(5.0));
        // 5 trials of a 50 kB upload per occurrence.
        assert_eq!(pattern.journey.data_upload(), DataSize::from_kilobytes(250.0));
        Ok(())
    }

    #[test]
    fn server_demand_accumulates_trials_and_occurrences() -> Result<()> {
        let config = Config::try_from_str(minimal_config())?;
        let system = System::resolve(&config)?;

        let demand = system.server_demand();
        assert_eq!(demand.len(), 1);
        let app = &demand[0];
        // 1000 occurrences x 5 trials.
        assert!((app.requests - 5000.0).abs() < 1e-6);
        assert_eq!(app.data_download, DataSize::from_megabytes(2.0) * 5000.0);
        assert_eq!(app.busy_time, TimeSpan::from_seconds(3.0) * 5000.0);
        Ok(())
    }

    #[test]
    fn dangling_references_name_both_ends() {
        let config = Config::try_from_str(
            &minimal_config().replace("server = \"app\"", "server = \"db\""),
        )
        .unwrap();
        let err = System::resolve(&config).unwrap_err().to_string();
        assert!(err.contains("fetch"));
        assert!(err.contains("db"));
    }

    #[test]
    fn unknown_country_codes_are_rejected() {
        let config =
            Config::try_from_str(&minimal_config().replace("country = \"FR\"", "country = \"ZZ\""))
                .unwrap();
        assert!(System::resolve(&config).is_err());
    }

    #[test]
    fn systems_without_patterns_are_rejected() {
        let config = Config::try_from_str(
            r#"
            [system]
            name = "empty"
            start_date = "2025-01-01"
            "#,
        )
        .unwrap();
        let err = System::resolve(&config).unwrap_err().to_string();
        assert!(err.contains("at least one usage pattern"));
    }

    #[test]
    fn assumptions_carry_labels_and_sources() -> Result<()> {
        let config = Config::try_from_str(minimal_config())?;
        let system = System::resolve(&config)?;
        let assumptions = system.assumptions();

        let user_time = assumptions
            .iter()
            .find(|a| a.owner == "step browse")
            .unwrap();
        assert_eq!(user_time.label, "user time");
        assert_eq!(user_time.value, "5 min");
        assert_eq!(user_time.source, Source::UserData.to_string());
        Ok(())
    }
}
