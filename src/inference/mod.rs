//! Image editing through a hosted inference provider.
//!
//! The router depends only on the [`ImageEditor`] trait. The production
//! implementation, [`ReplicateClient`], runs an SDXL ControlNet LoRA model on
//! Replicate with the fixed hyperparameters in [`InferenceSettings`].

mod replicate;

pub use replicate::{Prediction, PredictionStatus, ReplicateClient, DEFAULT_REPLICATE_API_URL};

use std::time::Duration;

use async_trait::async_trait;

use crate::error::InferenceError;

/// Model run for every image edit.
pub const DEFAULT_MODEL: &str = "fermatresearch/sdxl-controlnet-lora";

/// Pinned model version.
pub const DEFAULT_MODEL_VERSION: &str =
    "3bb13fe1c33c35987b33792b01b71ed6529d03f165d1c2416375859f09ca9fef";

/// Fine-tuned LoRA weights applied on top of the base model.
pub const DEFAULT_LORA_WEIGHTS: &str =
    "https://pbxt.replicate.delivery/mwN3AFyYZyouOB03Uhw8ubKW9rpqMgdtL9zYV9GF2WGDiwbE/trained_model.tar";

pub const DEFAULT_REFINE_STEPS: u32 = 20;

pub const DEFAULT_CONDITION_SCALE: f64 = 0.5;

pub const DEFAULT_INFERENCE_STEPS: u32 = 40;

/// Delay between status polls while a prediction is running.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Longest time to wait for a prediction before giving up.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(300);

/// Fixed model configuration for image edits.
///
/// These values are not tunable per request; every call to
/// [`ImageEditor::process`] uses the same settings.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    /// Model identifier (`owner/name`)
    pub model: String,

    /// Model version hash
    pub version: String,

    /// URL of the LoRA weights archive
    pub lora_weights: String,

    /// Refiner steps after the base pass
    pub refine_steps: u32,

    /// ControlNet conditioning scale (0.0 - 1.0)
    pub condition_scale: f64,

    /// Denoising steps
    pub num_inference_steps: u32,

    pub poll_interval: Duration,

    pub max_wait: Duration,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            version: DEFAULT_MODEL_VERSION.to_string(),
            lora_weights: DEFAULT_LORA_WEIGHTS.to_string(),
            refine_steps: DEFAULT_REFINE_STEPS,
            condition_scale: DEFAULT_CONDITION_SCALE,
            num_inference_steps: DEFAULT_INFERENCE_STEPS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }
}

impl InferenceSettings {
    /// `owner/name:version` reference, as shown in logs.
    pub fn model_ref(&self) -> String {
        format!("{}:{}", self.model, self.version)
    }
}

/// Edits an image according to a text prompt.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Run one edit and return a URL for the resulting image.
    async fn process(&self, image: &str, prompt: &str) -> Result<String, InferenceError>;
}

/// Check that both image and prompt are present and non-blank.
pub fn validate_input<'a>(
    image: Option<&'a str>,
    prompt: Option<&'a str>,
) -> Result<(&'a str, &'a str), InferenceError> {
    match (image, prompt) {
        (Some(image), Some(prompt)) if !image.trim().is_empty() && !prompt.trim().is_empty() => {
            Ok((image, prompt))
        }
        _ => Err(InferenceError::MissingInput),
    }
}
