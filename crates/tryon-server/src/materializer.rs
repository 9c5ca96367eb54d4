//! Result materialization: download, re-encode, persist, exactly once.

use std::sync::Arc;

use chrono::Utc;
use image::codecs::jpeg::JpegEncoder;
use thiserror::Error;
use tracing::debug;

use tryon_core::{Asset, ImageMeta, Task};
use tryon_provider::{Provider, ProviderError};

use crate::assets::AssetStore;

/// Canonical output quality. Re-encoding normalizes size and strips
/// any pass-through metadata from the provider.
const JPEG_QUALITY: u8 = 90;

/// Failure anywhere in the download -> decode -> persist pipeline.
///
/// The reconciliation loop records any of these on the task as
/// `RESULT_PROCESSING_FAILED`.
#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("result download failed: {0}")]
    Download(#[from] ProviderError),

    #[error("result image decode failed: {0}")]
    Decode(String),

    #[error("result persistence failed: {0}")]
    Persist(String),
}

/// Turns a provider result handle into a stored result asset.
pub struct Materializer {
    provider: Arc<dyn Provider>,
    assets: Arc<AssetStore>,
}

impl Materializer {
    pub fn new(provider: Arc<dyn Provider>, assets: Arc<AssetStore>) -> Self {
        Self { provider, assets }
    }

    /// Download the result from the signed URL, re-encode it to
    /// canonical JPEG, and persist it as a result asset for the task's
    /// owner. Linking the asset into the task is the caller's final
    /// step, so a failure here leaves no half-linked task.
    pub async fn materialize(
        &self,
        task: &Task,
        download_url: &str,
    ) -> Result<Asset, MaterializeError> {
        let bytes = self.provider.download(download_url).await?;
        debug!(task_id = %task.id, size = bytes.len(), "Result image downloaded");

        let img =
            image::load_from_memory(&bytes).map_err(|e| MaterializeError::Decode(e.to_string()))?;

        let mut encoded = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
        img.write_with_encoder(encoder)
            .map_err(|e| MaterializeError::Decode(e.to_string()))?;

        let meta = ImageMeta {
            width: img.width(),
            height: img.height(),
            category: Some(task.garment_category),
        };
        let file_stem = format!("result-{}-{}", task.job_id, Utc::now().timestamp_millis());

        self.assets
            .create_result(task.owner.clone(), encoded, meta, &file_stem)
            .await
            .map_err(|e| MaterializeError::Persist(e.to_string()))
    }
}
