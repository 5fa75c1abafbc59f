use anyhow::{anyhow, Result};
use phf::phf_map;

/// Per-request demand values for a named job template, the shorthand used by
/// configs for common job shapes.
#[derive(Debug, Clone, Copy)]
pub struct JobTemplate {
    pub upload_kb: f64,
    pub download_kb: f64,
    pub stored_kb: f64,
    pub duration_s: f64,
    pub ram_gb: f64,
    pub cpu_cores: f64,
}

static JOB_TEMPLATES: phf::Map<&'static str, JobTemplate> = phf_map! {
    // A plain data fetch against an application server.
    "default" => JobTemplate {
        upload_kb: 50.0,
        download_kb: 2_000.0,
        stored_kb: 0.0,
        duration_s: 3.0,
        ram_gb: 2.0,
        cpu_cores: 1.0,
    },
    // A CI build: pulls sources and dependencies, stores artifacts.
    "jenkins" => JobTemplate {
        upload_kb: 10_000.0,
        download_kb: 500_000.0,
        stored_kb: 1_000_000.0,
        duration_s: 1_800.0,
        ram_gb: 4.0,
        cpu_cores: 4.0,
    },
    // The two halves of a modeling-result computation: the main service
    // crunches, the backing services answer small calls.
    "base-calcul-a" => JobTemplate {
        upload_kb: 50.0,
        download_kb: 1_000.0,
        stored_kb: 100.0,
        duration_s: 3.0,
        ram_gb: 2.0,
        cpu_cores: 2.0,
    },
    "base-calcul-b" => JobTemplate {
        upload_kb: 10.0,
        download_kb: 100.0,
        stored_kb: 0.0,
        duration_s: 1.0,
        ram_gb: 1.0,
        cpu_cores: 1.0,
    },
};

pub fn find_template(name: &str) -> Result<&'static JobTemplate> {
    JOB_TEMPLATES.get(name).ok_or_else(|| {
        anyhow!(
            "unknown job template '{}' (expected one of: {})",
            name,
            template_names().join(", ")
        )
    })
}

pub fn template_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = JOB_TEMPLATES.keys().copied().collect();
    names.sort_unstable();
    names
}
