use anyhow::{anyhow, Result};
use std::rc::Rc;

use crate::config::{DeviceKind, DeviceSpec, NetworkKind, NetworkSpec, ServerSpec, StorageSpec};
use crate::model::{Device, Network, Server, Storage};
use crate::quantity::{DataSize, EnergyPerData, Mass, Power, Source, Sourced, TimeSpan};

pub(crate) fn ademe() -> Source {
    Source::Study {
        name: "Base ADEME v19".to_string(),
        link: None,
    }
}

pub(crate) fn traficom() -> Source {
    Source::Study {
        name: "Traficom study".to_string(),
        link: None,
    }
}

fn ssd_study() -> Source {
    Source::Study {
        name: "Dirty secret of SSDs: embodied carbon".to_string(),
        link: Some("https://arxiv.org/abs/2207.10793".to_string()),
    }
}

/// SSD defaults for any storage field the config leaves out.
pub fn storage_from_spec(spec: &StorageSpec) -> Storage {
    Storage {
        name: spec.name.clone(),
        capacity: spec
            .capacity
            .clone()
            .unwrap_or_else(|| Sourced::new(DataSize::from_terabytes(1.0), ssd_study())),
        lifespan: spec
            .lifespan
            .clone()
            .unwrap_or_else(|| Sourced::hypothesis(TimeSpan::from_years(6.0))),
        power: spec
            .power
            .clone()
            .unwrap_or_else(|| Sourced::new(Power::from_watts(1.3), ssd_study())),
        idle_power: spec
            .idle_power
            .clone()
            .unwrap_or_else(|| Sourced::hypothesis(Power::from_watts(0.0))),
        fabrication_carbon: spec
            .fabrication_carbon
            .clone()
            .unwrap_or_else(|| Sourced::new(Mass::from_kilograms(160.0), ssd_study())),
        replication_factor: spec
            .replication_factor
            .clone()
            .unwrap_or_else(|| Sourced::hypothesis(3.0)),
    }
}

struct ServerPreset {
    ram_gb: f64,
    cpu_cores: f64,
    power_w: f64,
    idle_power_w: f64,
    fabrication_kg: f64,
}

fn server_preset(name: &str) -> Option<ServerPreset> {
    match name {
        "lg" => Some(ServerPreset {
            ram_gb: 256.0,
            cpu_cores: 64.0,
            power_w: 300.0,
            idle_power_w: 50.0,
            fabrication_kg: 1000.0,
        }),
        "sm" => Some(ServerPreset {
            ram_gb: 32.0,
            cpu_cores: 8.0,
            power_w: 150.0,
            idle_power_w: 20.0,
            fabrication_kg: 200.0,
        }),
        _ => None,
    }
}

/// Fills a server's envelope from, in order of precedence: explicit fields,
/// the named preset, the autoscaling defaults.
pub fn server_from_spec(spec: &ServerSpec, storage: Rc<Storage>) -> Result<Server> {
    let preset = match spec.preset.as_deref() {
        Some(name) => Some(server_preset(name).ok_or_else(|| {
            anyhow!("unknown server preset '{}' for server '{}'", name, spec.name)
        })?),
        None => None,
    };
    let preset = preset.as_ref();

    Ok(Server {
        name: spec.name.clone(),
        kind: spec.kind,
        storage,
        ram: spec.ram.clone().unwrap_or_else(|| {
            Sourced::user_data(DataSize::from_gigabytes(
                preset.map_or(128.0, |p| p.ram_gb),
            ))
        }),
        cpu_cores: spec
            .cpu_cores
            .clone()
            .unwrap_or_else(|| Sourced::user_data(preset.map_or(24.0, |p| p.cpu_cores))),
        power: spec.power.clone().unwrap_or_else(|| {
            Sourced::hypothesis(Power::from_watts(preset.map_or(300.0, |p| p.power_w)))
        }),
        idle_power: spec.idle_power.clone().unwrap_or_else(|| {
            Sourced::hypothesis(Power::from_watts(preset.map_or(50.0, |p| p.idle_power_w)))
        }),
        fabrication_carbon: spec.fabrication_carbon.clone().unwrap_or_else(|| {
            match preset {
                Some(p) => Sourced::hypothesis(Mass::from_kilograms(p.fabrication_kg)),
                None => Sourced::new(Mass::from_kilograms(600.0), ademe()),
            }
        }),
        lifespan: spec
            .lifespan
            .clone()
            .unwrap_or_else(|| Sourced::hypothesis(TimeSpan::from_years(6.0))),
        power_usage_effectiveness: spec
            .power_usage_effectiveness
            .clone()
            .unwrap_or_else(|| Sourced::hypothesis(1.2)),
    })
}

pub fn network_from_spec(spec: &NetworkSpec) -> Network {
    let default_intensity = match spec.kind {
        NetworkKind::Wifi => 0.05,
        NetworkKind::Mobile => 0.12,
    };
    Network {
        name: spec.name.clone(),
        kind: spec.kind,
        energy_intensity: spec.energy_intensity.clone().unwrap_or_else(|| {
            Sourced::new(
                EnergyPerData::from_kwh_per_gb(default_intensity),
                traficom(),
            )
        }),
    }
}

pub fn device_from_spec(spec: &DeviceSpec) -> Device {
    let (power_w, lifespan_years, fabrication_kg, daily_use_hours) = match spec.kind {
        DeviceKind::Laptop => (50.0, 6.0, 156.0, 7.0),
        DeviceKind::Smartphone => (1.0, 3.0, 30.0, 3.6),
    };
    Device {
        name: spec.name.clone(),
        kind: spec.kind,
        count: spec
            .count
            .clone()
            .unwrap_or_else(|| Sourced::user_data(1.0)),
        power: spec
            .power
            .clone()
            .unwrap_or_else(|| Sourced::hypothesis(Power::from_watts(power_w))),
        lifespan: spec
            .lifespan
            .clone()
            .unwrap_or_else(|| Sourced::hypothesis(TimeSpan::from_years(lifespan_years))),
        fabrication_carbon: spec
            .fabrication_carbon
            .clone()
            .unwrap_or_else(|| Sourced::new(Mass::from_kilograms(fabrication_kg), ademe())),
        daily_use: spec
            .daily_use
            .clone()
            .unwrap_or_else(|| Sourced::hypothesis(TimeSpan::from_hours(daily_use_hours))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerKind;

    fn storage_spec(name: &str) -> StorageSpec {
        StorageSpec {
            name: name.to_string(),
            capacity: None,
            lifespan: None,
            power: None,
            idle_power: None,
            fabrication_carbon: None,
            replication_factor: None,
        }
    }

    #[test]
    fn storage_defaults_to_a_one_terabyte_ssd() {
        let storage = storage_from_spec(&storage_spec("disk"));
        assert_eq!(storage.capacity.value, DataSize::from_terabytes(1.0));
        assert_eq!(storage.replication_factor.value, 3.0);
    }

    #[test]
    fn server_presets_fill_the_resource_envelope() -> Result<()> {
        let spec = ServerSpec {
            name: "app".to_string(),
            kind: ServerKind::Autoscaling,
            storage: "disk".to_string(),
            preset: Some("sm".to_string()),
            ram: None,
            cpu_cores: None,
            power: Some(Sourced::hypothesis(Power::from_watts(100.0))),
            idle_power: None,
            fabrication_carbon: None,
            lifespan: None,
            power_usage_effectiveness: None,
        };
        let server = server_from_spec(&spec, Rc::new(storage_from_spec(&storage_spec("disk"))))?;
        assert_eq!(server.ram.value, DataSize::from_gigabytes(32.0));
        assert_eq!(server.cpu_cores.value, 8.0);
        // Explicit fields beat the preset.
        assert_eq!(server.power.value, Power::from_watts(100.0));
        Ok(())
    }

    #[test]
    fn unknown_presets_are_rejected() {
        let spec = ServerSpec {
            name: "app".to_string(),
            kind: ServerKind::Autoscaling,
            storage: "disk".to_string(),
            preset: Some("xxl".to_string()),
            ram: None,
            cpu_cores: None,
            power: None,
            idle_power: None,
            fabrication_carbon: None,
            lifespan: None,
            power_usage_effectiveness: None,
        };
        let res = server_from_spec(&spec, Rc::new(storage_from_spec(&storage_spec("disk"))));
        assert!(res.is_err());
    }

    #[test]
    fn mobile_networks_draw_more_energy_than_wifi() {
        let wifi = network_from_spec(&NetworkSpec {
            name: "wifi".to_string(),
            kind: NetworkKind::Wifi,
            energy_intensity: None,
        });
        let mobile = network_from_spec(&NetworkSpec {
            name: "4g".to_string(),
            kind: NetworkKind::Mobile,
            energy_intensity: None,
        });
        assert!(mobile.energy_intensity.value > wifi.energy_intensity.value);
    }
}
