use anyhow::Context;
use chrono::NaiveDate;
use itertools::Itertools;
use serde::Deserialize;
use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use crate::quantity::{DataSize, EnergyPerData, Mass, Power, Sourced, TimeSpan};
use crate::usage::UsageRule;

static EXAMPLE_CONFIG: &str = include_str!("templates/canopy.toml");

// ******** ******** ********
// **    CONFIGURATION     **
// ******** ******** ********

/// A scenario config: the declarative graph of servers, storage, networks,
/// devices, jobs, journeys and usage patterns that makes up one modeled
/// system.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub system: SystemSection,
    #[serde(rename = "storage", default)]
    pub storages: Vec<StorageSpec>,
    #[serde(rename = "server", default)]
    pub servers: Vec<ServerSpec>,
    #[serde(rename = "network", default)]
    pub networks: Vec<NetworkSpec>,
    #[serde(rename = "device", default)]
    pub devices: Vec<DeviceSpec>,
    #[serde(rename = "job", default)]
    pub jobs: Vec<JobSpec>,
    #[serde(rename = "step", default)]
    pub steps: Vec<StepSpec>,
    #[serde(rename = "journey", default)]
    pub journeys: Vec<JourneySpec>,
    #[serde(rename = "usage_pattern", default)]
    pub usage_patterns: Vec<UsagePatternSpec>,
}

impl Config {
    pub fn write_example_to_file(path: &Path) -> anyhow::Result<File> {
        let mut file = File::create_new(path)
            .with_context(|| format!("unable to create {}", path.display()))?;
        file.write_all(EXAMPLE_CONFIG.as_bytes())?;
        Ok(file)
    }

    pub fn try_from_path(path: &Path) -> anyhow::Result<Config> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        Config::try_from_str(&config_str)
    }

    pub fn try_from_str(conf_str: &str) -> anyhow::Result<Config> {
        let config: Config =
            toml::from_str(conf_str).map_err(|e| anyhow::anyhow!("TOML parsing error: {}", e))?;
        config.check_unique_names()?;
        Ok(config)
    }

    fn check_unique_names(&self) -> anyhow::Result<()> {
        let sections: [(&str, Vec<&str>); 8] = [
            ("storage", self.storages.iter().map(|s| s.name.as_str()).collect()),
            ("server", self.servers.iter().map(|s| s.name.as_str()).collect()),
            ("network", self.networks.iter().map(|n| n.name.as_str()).collect()),
            ("device", self.devices.iter().map(|d| d.name.as_str()).collect()),
            ("job", self.jobs.iter().map(|j| j.name.as_str()).collect()),
            ("step", self.steps.iter().map(|s| s.name.as_str()).collect()),
            ("journey", self.journeys.iter().map(|j| j.name.as_str()).collect()),
            (
                "usage_pattern",
                self.usage_patterns.iter().map(|u| u.name.as_str()).collect(),
            ),
        ];
        for (section, names) in sections {
            if let Some(dup) = names.into_iter().duplicates().next() {
                anyhow::bail!("duplicate {} name '{}'", section, dup);
            }
        }
        Ok(())
    }

    pub fn find_storage(&self, name: &str) -> anyhow::Result<&StorageSpec> {
        self.storages
            .iter()
            .find(|s| s.name == name)
            .context(format!("Unable to find storage with name {}", name))
    }

    pub fn find_server(&self, name: &str) -> anyhow::Result<&ServerSpec> {
        self.servers
            .iter()
            .find(|s| s.name == name)
            .context(format!("Unable to find server with name {}", name))
    }

    pub fn find_network(&self, name: &str) -> anyhow::Result<&NetworkSpec> {
        self.networks
            .iter()
            .find(|n| n.name == name)
            .context(format!("Unable to find network with name {}", name))
    }

    pub fn find_device(&self, name: &str) -> anyhow::Result<&DeviceSpec> {
        self.devices
            .iter()
            .find(|d| d.name == name)
            .context(format!("Unable to find device with name {}", name))
    }

    pub fn find_job(&self, name: &str) -> anyhow::Result<&JobSpec> {
        self.jobs
            .iter()
            .find(|j| j.name == name)
            .context(format!("Unable to find job with name {}", name))
    }

    pub fn find_step(&self, name: &str) -> anyhow::Result<&StepSpec> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .context(format!("Unable to find step with name {}", name))
    }

    pub fn find_journey(&self, name: &str) -> anyhow::Result<&JourneySpec> {
        self.journeys
            .iter()
            .find(|j| j.name == name)
            .context(format!("Unable to find journey with name {}", name))
    }

    pub fn find_usage_pattern(&self, name: &str) -> anyhow::Result<&UsagePatternSpec> {
        self.usage_patterns
            .iter()
            .find(|u| u.name == name)
            .context(format!("Unable to find usage pattern with name {}", name))
    }
}

#[derive(Debug, Deserialize)]
pub struct SystemSection {
    pub name: String,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub debug_level: Option<String>,
}

/// Storage attached to a server. Omitted fields fall back to the SSD
/// defaults.
#[derive(Debug, Deserialize)]
pub struct StorageSpec {
    pub name: String,
    #[serde(default)]
    pub capacity: Option<Sourced<DataSize>>,
    #[serde(default)]
    pub lifespan: Option<Sourced<TimeSpan>>,
    #[serde(default)]
    pub power: Option<Sourced<Power>>,
    #[serde(default)]
    pub idle_power: Option<Sourced<Power>>,
    #[serde(default)]
    pub fabrication_carbon: Option<Sourced<Mass>>,
    #[serde(default)]
    pub replication_factor: Option<Sourced<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServerKind {
    #[default]
    Autoscaling,
    OnPremise,
    Serverless,
}

/// A server and its resource envelope. A preset (`lg` or `sm`) may fill the
/// envelope; explicit fields override it, and anything still missing falls
/// back to the autoscaling defaults.
#[derive(Debug, Deserialize)]
pub struct ServerSpec {
    pub name: String,
    #[serde(default)]
    pub kind: ServerKind,
    pub storage: String,
    #[serde(default)]
    pub preset: Option<String>,
    #[serde(default)]
    pub ram: Option<Sourced<DataSize>>,
    #[serde(default)]
    pub cpu_cores: Option<Sourced<f64>>,
    #[serde(default)]
    pub power: Option<Sourced<Power>>,
    #[serde(default)]
    pub idle_power: Option<Sourced<Power>>,
    #[serde(default)]
    pub fabrication_carbon: Option<Sourced<Mass>>,
    #[serde(default)]
    pub lifespan: Option<Sourced<TimeSpan>>,
    #[serde(default)]
    pub power_usage_effectiveness: Option<Sourced<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    #[default]
    Wifi,
    Mobile,
}

#[derive(Debug, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
    #[serde(default)]
    pub kind: NetworkKind,
    #[serde(default)]
    pub energy_intensity: Option<Sourced<EnergyPerData>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Laptop,
    Smartphone,
}

/// An end-user device population.
#[derive(Debug, Deserialize)]
pub struct DeviceSpec {
    pub name: String,
    pub kind: DeviceKind,
    #[serde(default)]
    pub count: Option<Sourced<f64>>,
    #[serde(default)]
    pub power: Option<Sourced<Power>>,
    #[serde(default)]
    pub lifespan: Option<Sourced<TimeSpan>>,
    #[serde(default)]
    pub fabrication_carbon: Option<Sourced<Mass>>,
    #[serde(default)]
    pub daily_use: Option<Sourced<TimeSpan>>,
}

/// A unit of server demand. Values come from one of three places: a named
/// template, a generative-AI model description, or explicit fields. Explicit
/// fields override template values.
#[derive(Debug, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub server: String,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub genai: Option<GenAiSpec>,
    #[serde(default)]
    pub data_upload: Option<Sourced<DataSize>>,
    #[serde(default)]
    pub data_download: Option<Sourced<DataSize>>,
    #[serde(default)]
    pub data_stored: Option<Sourced<DataSize>>,
    #[serde(default)]
    pub request_duration: Option<Sourced<TimeSpan>>,
    #[serde(default)]
    pub ram_needed: Option<Sourced<DataSize>>,
    #[serde(default)]
    pub cpu_needed: Option<Sourced<f64>>,
    #[serde(default)]
    pub trials: Option<Sourced<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct GenAiSpec {
    pub provider: String,
    pub model: String,
    pub output_tokens: Sourced<f64>,
}

#[derive(Debug, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub user_time: Sourced<TimeSpan>,
    pub jobs: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct JourneySpec {
    pub name: String,
    pub steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct UsagePatternSpec {
    pub name: String,
    pub journey: String,
    pub devices: Vec<String>,
    pub network: String,
    pub country: String,
    pub usage: UsageRule,
}
