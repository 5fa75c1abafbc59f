use anyhow::{anyhow, Result};
use phf::phf_map;
use std::rc::Rc;

use crate::config::{GenAiSpec, JobSpec};
use crate::model::{Job, Server};
use crate::quantity::{DataSize, Source, Sourced, TimeSpan};

/// Parameter counts of a text-generation model, in billions. Mixture-of-
/// experts models activate fewer parameters per token than they hold.
#[derive(Debug, Clone, Copy)]
pub struct ModelParams {
    pub active_billions: f64,
    pub total_billions: f64,
}

static MODELS: phf::Map<&'static str, ModelParams> = phf_map! {
    "huggingface/meta-llama-3-8b-instruct" => ModelParams { active_billions: 8.0, total_billions: 8.0 },
    "huggingface/mistral-7b-instruct" => ModelParams { active_billions: 7.2, total_billions: 7.2 },
    "huggingface/mixtral-8x7b-instruct" => ModelParams { active_billions: 12.9, total_billions: 46.7 },
    "mistralai/mistral-large" => ModelParams { active_billions: 123.0, total_billions: 123.0 },
    "openai/gpt-4o" => ModelParams { active_billions: 220.0, total_billions: 440.0 },
};

pub const BITS_PER_PARAMETER: f64 = 16.0;
pub const GPU_MEMORY_GB: f64 = 80.0;
/// Seconds of GPU latency per active parameter and output token.
pub const GPU_LATENCY_ALPHA: f64 = 8.02e-13;
/// Base seconds of GPU latency per output token.
pub const GPU_LATENCY_BETA: f64 = 2.23e-2;

const MEMORY_FACTOR: f64 = 1.2;
const TOKEN_WEIGHT_BITS: f64 = 24.0;
const CPU_CORES_PER_GPU: f64 = 1.0;

fn ecologits() -> Source {
    Source::Study {
        name: "Ecologits".to_string(),
        link: Some("https://github.com/genai-impact/ecologits".to_string()),
    }
}

/// A text-generation model hosted on a GPU server, resolved from the static
/// parameter table.
#[derive(Debug, Clone)]
pub struct GenAiModel {
    pub provider: String,
    pub model: String,
    params: ModelParams,
}

impl GenAiModel {
    pub fn lookup(provider: &str, model: &str) -> Result<GenAiModel> {
        let key = format!("{}/{}", provider, model).to_lowercase();
        let params = MODELS
            .get(key.as_str())
            .copied()
            .ok_or_else(|| anyhow!("unknown generative AI model '{}/{}'", provider, model))?;
        Ok(GenAiModel {
            provider: provider.to_string(),
            model: model.to_string(),
            params,
        })
    }

    pub fn active_parameters(&self) -> f64 {
        self.params.active_billions * 1e9
    }

    pub fn total_parameters(&self) -> f64 {
        self.params.total_billions * 1e9
    }

    /// RAM needed to hold the full model in GPU memory.
    pub fn ram_needed(&self) -> DataSize {
        DataSize::from_bytes(MEMORY_FACTOR * self.total_parameters() * BITS_PER_PARAMETER / 8.0)
    }

    /// GPUs required to serve one inference request.
    pub fn gpus_needed(&self) -> f64 {
        MEMORY_FACTOR * self.active_parameters() * BITS_PER_PARAMETER
            / 8.0
            / (GPU_MEMORY_GB * 1e9)
    }

    /// GPU time to generate the given number of output tokens.
    pub fn request_duration(&self, output_tokens: f64) -> TimeSpan {
        TimeSpan::from_seconds(
            output_tokens * (GPU_LATENCY_ALPHA * self.active_parameters() + GPU_LATENCY_BETA),
        )
    }

    /// Wire weight of the generated tokens.
    pub fn token_weight(output_tokens: f64) -> DataSize {
        DataSize::from_bytes(output_tokens * TOKEN_WEIGHT_BITS / 8.0)
    }

    /// Builds the job a chat request against this model places on its
    /// server. Explicit spec fields override the derived values.
    pub fn job(&self, spec: &JobSpec, genai: &GenAiSpec, server: Rc<Server>, trials: f64) -> Job {
        let tokens = genai.output_tokens.value;
        let payload = DataSize::from_kilobytes(100.0);
        let answer = payload + Self::token_weight(tokens);

        Job {
            name: spec.name.clone(),
            server,
            data_upload: spec
                .data_upload
                .clone()
                .unwrap_or_else(|| Sourced::hypothesis(payload)),
            data_download: spec
                .data_download
                .clone()
                .unwrap_or_else(|| Sourced::new(answer, ecologits())),
            data_stored: spec
                .data_stored
                .clone()
                .unwrap_or_else(|| Sourced::new(answer, ecologits())),
            request_duration: spec.request_duration.clone().unwrap_or_else(|| {
                Sourced::new(self.request_duration(tokens), ecologits())
                    .labelled(&format!("request to {} on {}", self.model, self.provider))
            }),
            ram_needed: spec
                .ram_needed
                .clone()
                .unwrap_or_else(|| Sourced::hypothesis(DataSize::zero())),
            cpu_needed: spec
                .cpu_needed
                .clone()
                .unwrap_or_else(|| Sourced::new(self.gpus_needed() * CPU_CORES_PER_GPU, ecologits())),
            trials,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() -> Result<()> {
        let model = GenAiModel::lookup("HuggingFace", "Mistral-7B-Instruct")?;
        assert_eq!(model.active_parameters(), 7.2e9);
        Ok(())
    }

    #[test]
    fn unknown_models_are_rejected() {
        assert!(GenAiModel::lookup("acme", "frontier-1t").is_err());
    }

    #[test]
    fn request_duration_grows_with_model_size_and_tokens() -> Result<()> {
        let model = GenAiModel::lookup("huggingface", "meta-llama-3-8b-instruct")?;
        let duration = model.request_duration(1000.0);
        // 1000 tokens x (8.02e-13 s x 8e9 params + 2.23e-2 s)
        assert!((duration.seconds() - 28.716).abs() < 1e-3);

        let bigger = GenAiModel::lookup("openai", "gpt-4o")?;
        assert!(bigger.request_duration(1000.0) > duration);
        Ok(())
    }

    #[test]
    fn mixture_of_experts_needs_less_compute_than_memory() -> Result<()> {
        let model = GenAiModel::lookup("huggingface", "mixtral-8x7b-instruct")?;
        // Full weights must fit in RAM ...
        assert!((model.ram_needed().gigabytes() - 1.2 * 46.7 * 2.0).abs() < 1e-6);
        // ... but only the active experts occupy GPUs per request.
        assert!((model.gpus_needed() - 1.2 * 12.9 * 2.0 / 80.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn token_weight_is_three_bytes_per_token() {
        assert_eq!(
            GenAiModel::token_weight(1000.0),
            DataSize::from_bytes(3000.0)
        );
    }
}
