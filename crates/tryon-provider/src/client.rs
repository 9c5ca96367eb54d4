//! The provider HTTP client: submit, status, download.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use tryon_core::{GarmentCategory, JobId, TaskState, TryOnMode};

use crate::error::ProviderError;
use crate::status::{clamp_progress, estimate_progress, map_provider_status};

/// Default timeout for status and download calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Task creation takes longer on the provider side.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Bounded retry for submit: 3 attempts, 1s base delay doubling.
const SUBMIT_ATTEMPTS: u32 = 3;
const SUBMIT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// One garment input image for a submission.
#[derive(Debug, Clone)]
pub struct GarmentImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Everything the provider needs to start a try-on job.
#[derive(Debug, Clone)]
pub struct SubmitJob {
    pub model_image: Vec<u8>,
    pub model_file_name: String,

    /// One image in single mode; upper then lower in combo mode.
    pub garment_images: Vec<GarmentImage>,

    pub category: GarmentCategory,
    pub mode: TryOnMode,
    pub hd_mode: bool,
}

/// Provider-reported status of a job, mapped into our vocabulary.
#[derive(Debug, Clone)]
pub struct JobStatus {
    /// Internal state mapped from the provider's open status vocabulary.
    pub state: TaskState,

    /// 0-100, provider-reported or estimated from the state.
    pub progress: u8,

    /// Signed URL for the result image, present on terminal success.
    pub download_url: Option<String>,

    /// Quality score of the composition, when the provider reports one.
    pub quality_score: Option<f32>,

    /// The raw status payload, kept for failure inspection.
    pub raw: Value,
}

/// The remote generation API, abstracted for testing.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Submit a new job. Returns the provider-issued job id.
    async fn submit(&self, job: &SubmitJob) -> Result<JobId, ProviderError>;

    /// Query the status of a job by its provider id.
    async fn status(&self, job_id: &JobId) -> Result<JobStatus, ProviderError>;

    /// Download result bytes from a signed URL.
    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}

/// reqwest-backed provider client.
pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpProvider {
    /// Create a client against the given base URL.
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(CALL_TIMEOUT)
            .user_agent("tryon-orchestrator/0.1")
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn submit_form(job: &SubmitJob) -> Result<reqwest::multipart::Form, ProviderError> {
        use reqwest::multipart::{Form, Part};

        let image_part = |bytes: &[u8], name: &str| -> Result<Part, ProviderError> {
            Part::bytes(bytes.to_vec())
                .file_name(name.to_string())
                .mime_str("image/jpeg")
                .map_err(|e| ProviderError::Decode(e.to_string()))
        };

        let mut form = Form::new().part(
            "model_image",
            image_part(&job.model_image, &job.model_file_name)?,
        );

        match job.mode {
            TryOnMode::Combo if job.garment_images.len() == 2 => {
                form = form
                    .part(
                        "upper_cloth_image",
                        image_part(&job.garment_images[0].bytes, &job.garment_images[0].file_name)?,
                    )
                    .part(
                        "lower_cloth_image",
                        image_part(&job.garment_images[1].bytes, &job.garment_images[1].file_name)?,
                    );
            }
            _ => {
                let garment = job
                    .garment_images
                    .first()
                    .ok_or_else(|| ProviderError::Decode("submission has no garment image".into()))?;
                form = form.part("cloth_image", image_part(&garment.bytes, &garment.file_name)?);
            }
        }

        form = form
            .text("cloth_type", job.category.as_str())
            .text("hd_mode", job.hd_mode.to_string());
        if job.mode == TryOnMode::Combo {
            form = form.text("mode", "combo");
        }

        Ok(form)
    }

    async fn submit_once(&self, job: &SubmitJob) -> Result<JobId, ProviderError> {
        let url = format!("{}/api/tryon/v2/tasks", self.base_url);
        debug!(url = %url, mode = %job.mode, category = %job.category, "Submitting try-on job");

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .multipart(Self::submit_form(job)?)
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await?;

        let body: Value = Self::check(response).await?.json().await?;
        body.get("task_id")
            .and_then(Value::as_str)
            .map(JobId::new)
            .ok_or_else(|| ProviderError::Decode(format!("submit response without task_id: {body}")))
    }

    /// Split an error response into permanent (4xx) vs retryable (5xx).
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status.is_client_error() {
            Err(ProviderError::Rejected {
                status: status.as_u16(),
                body,
            })
        } else {
            Err(ProviderError::Transport(format!("HTTP {status}: {body}")))
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn submit(&self, job: &SubmitJob) -> Result<JobId, ProviderError> {
        let mut delay = SUBMIT_BACKOFF_BASE;
        let mut last_err = None;

        for attempt in 1..=SUBMIT_ATTEMPTS {
            match self.submit_once(job).await {
                Ok(job_id) => return Ok(job_id),
                Err(e) if e.is_retryable() && attempt < SUBMIT_ATTEMPTS => {
                    warn!(
                        attempt,
                        max_attempts = SUBMIT_ATTEMPTS,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Submit failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        // Loop always returns before falling through with attempts >= 1.
        Err(last_err.unwrap_or(ProviderError::Timeout))
    }

    async fn status(&self, job_id: &JobId) -> Result<JobStatus, ProviderError> {
        let url = format!("{}/api/tryon/v2/tasks/{}", self.base_url, job_id);

        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .send()
            .await?;

        let raw: Value = Self::check(response).await?.json().await?;

        let state = raw
            .get("status")
            .and_then(Value::as_str)
            .map(map_provider_status)
            .unwrap_or(TaskState::Created);

        let progress = raw
            .get("progress")
            .and_then(Value::as_f64)
            .map(clamp_progress)
            .unwrap_or_else(|| estimate_progress(state));

        let download_url = raw
            .get("download_signed_url")
            .and_then(Value::as_str)
            .map(str::to_owned);

        let quality_score = raw
            .get("quality_score")
            .and_then(Value::as_f64)
            .map(|v| v as f32);

        debug!(job_id = %job_id, state = %state, progress, "Provider status");

        Ok(JobStatus {
            state,
            progress,
            download_url,
            quality_score,
            raw,
        })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        // Signed URL: no API key, plain GET.
        let response = self.client.get(url).send().await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(mode: TryOnMode, garments: usize) -> SubmitJob {
        SubmitJob {
            model_image: vec![1, 2, 3],
            model_file_name: "model.jpg".into(),
            garment_images: (0..garments)
                .map(|i| GarmentImage {
                    bytes: vec![9],
                    file_name: format!("garment-{i}.jpg"),
                })
                .collect(),
            category: GarmentCategory::Combo,
            mode,
            hd_mode: false,
        }
    }

    #[test]
    fn test_submit_form_builds_for_both_modes() {
        assert!(HttpProvider::submit_form(&job(TryOnMode::Single, 1)).is_ok());
        assert!(HttpProvider::submit_form(&job(TryOnMode::Combo, 2)).is_ok());
    }

    #[test]
    fn test_submit_form_rejects_missing_garment() {
        let err = HttpProvider::submit_form(&job(TryOnMode::Single, 0)).unwrap_err();
        assert!(matches!(err, ProviderError::Decode(_)));
    }
}
