pub mod genai;
pub mod hardware;
pub mod templates;

use anyhow::{anyhow, bail, Result};
use std::rc::Rc;

use crate::config::JobSpec;
use crate::model::{Job, Server};
use crate::quantity::{DataSize, Sourced, TimeSpan};

/// Builds a job from its spec: generative-AI description, named template or
/// explicit fields. Explicit fields always win over template values.
pub fn job_from_spec(spec: &JobSpec, server: Rc<Server>) -> Result<Job> {
    if spec.template.is_some() && spec.genai.is_some() {
        bail!("job '{}' sets both a template and a genai model", spec.name);
    }

    let trials = spec.trials.as_ref().map(|t| t.value).unwrap_or(1.0);

    if let Some(genai_spec) = &spec.genai {
        let model = genai::GenAiModel::lookup(&genai_spec.provider, &genai_spec.model)?;
        return Ok(model.job(spec, genai_spec, server, trials));
    }

    let template = spec
        .template
        .as_deref()
        .map(templates::find_template)
        .transpose()?;

    fn field<T: Clone>(
        explicit: &Option<Sourced<T>>,
        template: Option<T>,
        job: &str,
        name: &str,
    ) -> Result<Sourced<T>> {
        explicit
            .clone()
            .or_else(|| template.map(Sourced::hypothesis))
            .ok_or_else(|| anyhow!("job '{}' must set {} or use a template", job, name))
    }

    Ok(Job {
        name: spec.name.clone(),
        server,
        data_upload: field(
            &spec.data_upload,
            template.map(|t| DataSize::from_kilobytes(t.upload_kb)),
            &spec.name,
            "data_upload",
        )?,
        data_download: field(
            &spec.data_download,
            template.map(|t| DataSize::from_kilobytes(t.download_kb)),
            &spec.name,
            "data_download",
        )?,
        data_stored: field(
            &spec.data_stored,
            template.map(|t| DataSize::from_kilobytes(t.stored_kb)),
            &spec.name,
            "data_stored",
        )?,
        request_duration: field(
            &spec.request_duration,
            template.map(|t| TimeSpan::from_seconds(t.duration_s)),
            &spec.name,
            "request_duration",
        )?,
        ram_needed: field(
            &spec.ram_needed,
            template.map(|t| DataSize::from_gigabytes(t.ram_gb)),
            &spec.name,
            "ram_needed",
        )?,
        cpu_needed: field(
            &spec.cpu_needed,
            template.map(|t| t.cpu_cores),
            &spec.name,
            "cpu_needed",
        )?,
        trials,
    })
}

/// Average yearly app-download rate per user of a mobile-app population.
///
/// Users active within the last three months download every app update.
/// Inactive users split by OS hibernation support: without hibernation they
/// also download every update, with hibernation they only re-download when
/// they come back to the app.
pub fn app_download_rate(
    active_fraction: f64,
    hibernation_fraction: f64,
    updates_per_year: f64,
    hibernating_downloads_per_year: f64,
) -> f64 {
    let inactive_fraction = 1.0 - active_fraction;
    (active_fraction + (1.0 - hibernation_fraction) * inactive_fraction) * updates_per_year
        + inactive_fraction * hibernation_fraction * hibernating_downloads_per_year
}
