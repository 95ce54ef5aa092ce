//! Replicate-backed image editor.
//!
//! A prediction is created with `Prefer: wait` so short runs finish within
//! the creating request. Longer runs are polled until they reach a terminal
//! state or `max_wait` elapses, at which point the prediction is canceled so
//! it stops running on the provider. A failed prediction is reported, never
//! resubmitted.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use super::{validate_input, ImageEditor, InferenceSettings};
use crate::error::InferenceError;

/// Default Replicate API base URL.
pub const DEFAULT_REPLICATE_API_URL: &str = "https://api.replicate.com/v1";

/// Seconds the provider may hold the create request open.
const PREFER_WAIT_SECS: u64 = 60;

/// Per-request timeout; must exceed the `Prefer: wait` window.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(PREFER_WAIT_SECS + 30);

#[derive(Debug, Serialize)]
struct PredictionInput<'a> {
    image: &'a str,
    prompt: &'a str,
    lora_weights: &'a str,
    refine_steps: u32,
    condition_scale: f64,
    num_inference_steps: u32,
}

#[derive(Debug, Serialize)]
struct CreatePrediction<'a> {
    version: &'a str,
    input: PredictionInput<'a>,
}

/// Lifecycle state of a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    #[serde(other)]
    Unknown,
}

impl PredictionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PredictionStatus::Succeeded | PredictionStatus::Failed | PredictionStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Unknown => "unknown",
        }
    }
}

/// Prediction resource as returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,

    pub status: PredictionStatus,

    /// Model output; an array of file URLs for this model
    #[serde(default)]
    pub output: Option<Value>,

    #[serde(default)]
    pub error: Option<Value>,
}

impl Prediction {
    /// URL of the first output file.
    pub fn first_output_url(&self) -> Result<String, InferenceError> {
        let first = match &self.output {
            Some(Value::Array(items)) => items.first(),
            Some(value @ Value::String(_)) => Some(value),
            _ => None,
        };

        first
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                InferenceError::MalformedResponse(format!(
                    "prediction {} has no output URL",
                    self.id
                ))
            })
    }

    fn error_message(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(message)) => Some(message.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProblemDetail {
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    username: String,
}

/// Client for the Replicate predictions API.
#[derive(Clone)]
pub struct ReplicateClient {
    http: reqwest::Client,
    api_url: String,
    api_token: String,
    settings: InferenceSettings,
}

impl ReplicateClient {
    /// Create a client with its own HTTP connection pool.
    pub fn new(
        api_token: impl Into<String>,
        api_url: impl Into<String>,
        settings: InferenceSettings,
    ) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::Request(e.to_string()))?;

        Ok(Self::with_http_client(http, api_token, api_url, settings))
    }

    /// Create a client on top of an existing `reqwest::Client`.
    pub fn with_http_client(
        http: reqwest::Client,
        api_token: impl Into<String>,
        api_url: impl Into<String>,
        settings: InferenceSettings,
    ) -> Self {
        Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            api_token: api_token.into(),
            settings,
        }
    }

    /// Model and polling settings this client runs with.
    pub fn settings(&self) -> &InferenceSettings {
        &self.settings
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Check the API token by fetching the account it belongs to.
    ///
    /// Returns the account username.
    pub async fn verify_credentials(&self) -> Result<String, InferenceError> {
        let response = self
            .http
            .get(self.endpoint(&["account"])?)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(request_error)?;

        let account: Account = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| InferenceError::MalformedResponse(e.to_string()))?;

        Ok(account.username)
    }

    async fn create_prediction(&self, image: &str, prompt: &str) -> Result<Prediction, InferenceError> {
        let body = CreatePrediction {
            version: &self.settings.version,
            input: PredictionInput {
                image,
                prompt,
                lora_weights: &self.settings.lora_weights,
                refine_steps: self.settings.refine_steps,
                condition_scale: self.settings.condition_scale,
                num_inference_steps: self.settings.num_inference_steps,
            },
        };

        let response = self
            .http
            .post(self.endpoint(&["predictions"])?)
            .header(AUTHORIZATION, self.bearer())
            .header("Prefer", format!("wait={}", PREFER_WAIT_SECS))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;

        parse_prediction(check_status(response).await?).await
    }

    async fn get_prediction(&self, id: &str) -> Result<Prediction, InferenceError> {
        let response = self
            .http
            .get(self.endpoint(&["predictions", id])?)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(request_error)?;

        parse_prediction(check_status(response).await?).await
    }

    async fn cancel_prediction(&self, id: &str) -> Result<(), InferenceError> {
        let response = self
            .http
            .post(self.endpoint(&["predictions", id, "cancel"])?)
            .header(AUTHORIZATION, self.bearer())
            .send()
            .await
            .map_err(request_error)?;

        check_status(response).await.map(|_| ())
    }

    /// Poll until the prediction is terminal or `max_wait` elapses.
    ///
    /// A prediction still running at `max_wait` is canceled before the
    /// timeout is returned.
    async fn wait_for(&self, mut prediction: Prediction) -> Result<Prediction, InferenceError> {
        let started = Instant::now();

        while !prediction.status.is_terminal() {
            if started.elapsed() >= self.settings.max_wait {
                match self.cancel_prediction(&prediction.id).await {
                    Ok(()) => info!(prediction_id = %prediction.id, "Canceled timed-out prediction"),
                    Err(e) => warn!(
                        prediction_id = %prediction.id,
                        error = %e,
                        "Failed to cancel timed-out prediction"
                    ),
                }
                return Err(InferenceError::Timeout {
                    waited_secs: started.elapsed().as_secs(),
                });
            }

            tokio::time::sleep(self.settings.poll_interval).await;

            prediction = self.get_prediction(&prediction.id).await?;
            debug!(
                prediction_id = %prediction.id,
                status = prediction.status.as_str(),
                "Polled prediction"
            );
        }

        Ok(prediction)
    }

    /// Join path segments onto the API base URL, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, InferenceError> {
        let mut url = Url::parse(&self.api_url)
            .map_err(|e| InferenceError::Request(format!("invalid API URL {}: {}", self.api_url, e)))?;

        url.path_segments_mut()
            .map_err(|_| InferenceError::Request(format!("API URL {} cannot take a path", self.api_url)))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_token)
    }
}

#[async_trait]
impl ImageEditor for ReplicateClient {
    async fn process(&self, image: &str, prompt: &str) -> Result<String, InferenceError> {
        let (image, prompt) = validate_input(Some(image), Some(prompt))?;

        let started = Instant::now();
        let created = self.create_prediction(image, prompt).await?;
        debug!(
            prediction_id = %created.id,
            status = created.status.as_str(),
            model = %self.settings.model,
            "Created prediction"
        );

        let prediction = self.wait_for(created).await?;

        if prediction.status != PredictionStatus::Succeeded {
            return Err(InferenceError::PredictionFailed {
                status: prediction.status.as_str().to_string(),
                error: prediction.error_message(),
            });
        }

        let url = prediction.first_output_url()?;
        info!(
            prediction_id = %prediction.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Image edit completed"
        );

        Ok(url)
    }
}

fn request_error(err: reqwest::Error) -> InferenceError {
    if err.is_timeout() {
        InferenceError::Timeout {
            waited_secs: REQUEST_TIMEOUT.as_secs(),
        }
    } else {
        InferenceError::Request(err.to_string())
    }
}

/// Turn a non-success response into a provider error carrying its detail.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, InferenceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ProblemDetail>(&body)
        .ok()
        .and_then(|p| p.detail)
        .unwrap_or(body);

    Err(InferenceError::Provider {
        status: status.as_u16(),
        detail,
    })
}

async fn parse_prediction(response: reqwest::Response) -> Result<Prediction, InferenceError> {
    response
        .json::<Prediction>()
        .await
        .map_err(|e| InferenceError::MalformedResponse(e.to_string()))
}
