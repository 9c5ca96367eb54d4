//! The try-on task orchestrator.
//!
//! Validates and submits new tasks, applies provider status to the
//! task state machine during reconciliation, triggers result
//! materialization on terminal success, and implements the bounded
//! user-triggered retry.
//!
//! Concurrency discipline: provider calls always happen outside the
//! task store lock. Status is fetched first, then applied via one
//! short atomic update; transition validity makes racing writers
//! (reconciliation tick vs. user cancel, or two concurrent ticks)
//! converge on a single terminal state.

use std::sync::Arc;

use tracing::{debug, info, warn};

use tryon_core::{
    Asset, AssetId, AssetKind, ErrorDetail, GarmentCategory, Task, TaskId, TaskInputs, TaskResult,
    TaskState, TryOnError, TryOnMode, UserId, MAX_RETRIES,
};
use tryon_provider::{GarmentImage, Provider, ProviderError, SubmitJob};

use crate::assets::AssetStore;
use crate::materializer::Materializer;
use crate::store::TaskStore;
use crate::usage::UsageRecorder;

/// Error code recorded when the provider reports a failed job.
const CODE_PROVIDER_FAILED: &str = "PROVIDER_PROCESSING_FAILED";
/// Error code recorded when the provider cancelled the job on its side.
const CODE_PROVIDER_CANCELLED: &str = "PROVIDER_CANCELLED";
/// Error code recorded when materialization fails after provider success.
const CODE_RESULT_FAILED: &str = "RESULT_PROCESSING_FAILED";
/// Error code recorded when a task exceeds the stale-poll cap.
const CODE_POLL_LIMIT: &str = "POLL_LIMIT_EXCEEDED";

/// A validated submission request.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub owner: UserId,
    pub model_asset_id: AssetId,
    pub garment_asset_ids: Vec<AssetId>,
    pub garment_category: GarmentCategory,
    pub mode: TryOnMode,
    pub hd_mode: bool,
}

/// Result bytes ready to stream back to the user.
#[derive(Debug)]
pub struct ResultDownload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

/// What one applied poll asks the caller to do next.
enum PollOutcome {
    /// Nothing further; task stays in flight or was already terminal.
    Settled,
    /// Provider success observed: materialize, then complete or fail.
    Materialize(Box<Task>),
}

/// The task lifecycle engine.
pub struct Orchestrator {
    store: Arc<TaskStore>,
    assets: Arc<AssetStore>,
    provider: Arc<dyn Provider>,
    materializer: Materializer,
    usage: Arc<dyn UsageRecorder>,
    stale_poll_limit: u32,
}

impl Orchestrator {
    pub fn new(
        store: Arc<TaskStore>,
        assets: Arc<AssetStore>,
        provider: Arc<dyn Provider>,
        usage: Arc<dyn UsageRecorder>,
        stale_poll_limit: u32,
    ) -> Self {
        let materializer = Materializer::new(provider.clone(), assets.clone());
        Self {
            store,
            assets,
            provider,
            materializer,
            usage,
            stale_poll_limit,
        }
    }

    /// Validate inputs, submit to the provider, and persist a new task
    /// in CREATED state. Provider rejection creates no task.
    pub async fn submit(&self, req: SubmitRequest) -> Result<Task, TryOnError> {
        let (model, garments, job) = self
            .load_job_inputs(
                &req.owner,
                &req.model_asset_id,
                &req.garment_asset_ids,
                req.mode,
                req.garment_category,
                req.hd_mode,
            )
            .await?;

        let job_id = self.provider.submit(&job).await.map_err(submit_error)?;

        let task = Task::new(
            job_id,
            req.owner.clone(),
            req.mode,
            req.garment_category,
            req.hd_mode,
            TaskInputs {
                model_asset_id: model.id.clone(),
                garment_asset_ids: garments.iter().map(|g| g.id.clone()).collect(),
                model_image_url: model.file_url.clone(),
                garment_image_urls: garments.iter().map(|g| g.file_url.clone()).collect(),
            },
        );

        self.store.insert(task.clone()).await;
        self.usage.record_submission(&req.owner).await;

        info!(
            task_id = %task.id,
            job_id = %task.job_id,
            owner = %task.owner,
            mode = %task.mode,
            category = %task.garment_category,
            "Try-on task created"
        );
        Ok(task)
    }

    /// Current state of a task. For non-terminal tasks this also runs an
    /// out-of-band reconciliation so manual refreshes see fresh status.
    pub async fn status(&self, id: &TaskId, owner: &UserId) -> Result<Task, TryOnError> {
        let task = self.store.get_owned(id, owner).await?;

        if task.state.is_active() {
            if let Err(e) = self.reconcile_task(id).await {
                warn!(task_id = %id, error = %e, "Out-of-band reconciliation failed");
            }
        }

        self.store.get_owned(id, owner).await
    }

    /// Re-submit a FAILED task under a fresh provider job.
    ///
    /// Inputs are re-validated: a retry is not guaranteed if the user
    /// deleted them in the meantime.
    pub async fn retry(&self, id: &TaskId, owner: &UserId) -> Result<Task, TryOnError> {
        let task = self.store.get_owned(id, owner).await?;
        if task.state != TaskState::Failed {
            return Err(TryOnError::InvalidStateTransition {
                from: task.state,
                to: "CREATED",
            });
        }
        if task.retry_count >= MAX_RETRIES {
            return Err(TryOnError::RetryLimitExceeded);
        }

        let (_, _, job) = self
            .load_job_inputs(
                owner,
                &task.inputs.model_asset_id,
                &task.inputs.garment_asset_ids,
                task.mode,
                task.garment_category,
                task.hd_mode,
            )
            .await?;

        let job_id = self.provider.submit(&job).await.map_err(submit_error)?;

        // reset_for_retry re-checks state and bound, so a concurrent
        // retry or reconciliation cannot double-apply.
        let updated = self
            .store
            .update(id, move |t| {
                t.reset_for_retry(job_id)?;
                Ok(t.clone())
            })
            .await?;

        info!(
            task_id = %id,
            job_id = %updated.job_id,
            retry_count = updated.retry_count,
            "Try-on task resubmitted"
        );
        Ok(updated)
    }

    /// User-initiated cancel. Rejected if the task is already terminal;
    /// the abandoned provider job is simply no longer polled.
    pub async fn cancel(&self, id: &TaskId, owner: &UserId) -> Result<Task, TryOnError> {
        let owner = owner.clone();
        let task = self
            .store
            .update(id, move |t| {
                if t.deleted || t.owner != owner {
                    return Err(TryOnError::TaskNotFound(t.id.to_string()));
                }
                t.cancel()?;
                Ok(t.clone())
            })
            .await?;

        info!(task_id = %id, "Try-on task cancelled");
        Ok(task)
    }

    /// Soft-delete a task and cascade to its result asset.
    pub async fn delete(&self, id: &TaskId, owner: &UserId) -> Result<(), TryOnError> {
        let owner = owner.clone();
        let result_asset = self
            .store
            .update(id, move |t| {
                if t.deleted || t.owner != owner {
                    return Err(TryOnError::TaskNotFound(t.id.to_string()));
                }
                t.soft_delete();
                Ok(t.result.as_ref().map(|r| r.result_asset_id.clone()))
            })
            .await?;

        if let Some(asset_id) = result_asset {
            self.assets.soft_delete(&asset_id).await;
        }

        info!(task_id = %id, "Try-on task deleted");
        Ok(())
    }

    /// Read the materialized result of a COMPLETED task.
    pub async fn download(&self, id: &TaskId, owner: &UserId) -> Result<ResultDownload, TryOnError> {
        let task = self.store.get_owned(id, owner).await?;
        if task.state != TaskState::Completed {
            return Err(TryOnError::ResultNotAvailable);
        }
        let result = task.result.as_ref().ok_or(TryOnError::ResultNotAvailable)?;
        let asset = self
            .assets
            .get(&result.result_asset_id)
            .await
            .ok_or(TryOnError::ResultNotAvailable)?;
        let bytes = self.assets.read_file(&asset).await?;

        Ok(ResultDownload {
            bytes,
            mime_type: asset.mime_type.clone(),
            file_name: format!("tryon-result-{}.jpg", task.job_id),
        })
    }

    /// One reconciliation tick over the in-flight snapshot. Each task is
    /// handled independently; one task's failure never aborts the batch.
    pub async fn reconcile_all(&self) {
        let ids = self.store.in_flight().await;
        if ids.is_empty() {
            return;
        }
        debug!(count = ids.len(), "Reconciling in-flight tasks");

        for id in ids {
            if let Err(e) = self.reconcile_task(&id).await {
                warn!(task_id = %id, error = %e, "Task reconciliation failed");
            }
        }
    }

    /// Reconcile one task against the provider.
    ///
    /// The status call runs without holding the store lock; the observed
    /// status is then applied in one atomic update. Transient poll
    /// errors are absorbed and retried next tick, never recorded on the
    /// task.
    pub async fn reconcile_task(&self, id: &TaskId) -> Result<(), TryOnError> {
        let Some(task) = self.store.get(id).await else {
            return Ok(());
        };
        if task.deleted || task.is_terminal() {
            return Ok(());
        }

        let job_id = task.job_id.clone();
        let status = match self.provider.status(&job_id).await {
            Ok(s) => s,
            Err(e) => {
                warn!(task_id = %id, job_id = %job_id, error = %e, "Status poll failed, retrying next tick");
                return Ok(());
            }
        };

        let download_url = status.download_url.clone();
        let quality_score = status.quality_score;
        let stale_limit = self.stale_poll_limit;

        let outcome = self
            .store
            .update(id, move |t| {
                if t.deleted || t.is_terminal() {
                    // A cancel or a concurrent pass won; terminal wins.
                    return Ok(PollOutcome::Settled);
                }
                if t.job_id != job_id {
                    // Retried mid-poll; this status is for an abandoned job.
                    return Ok(PollOutcome::Settled);
                }

                t.record_poll(status.progress);

                if status.state.is_active() && t.timing.poll_count >= stale_limit {
                    t.fail(ErrorDetail::new(
                        CODE_POLL_LIMIT,
                        format!("no terminal provider status after {} polls", t.timing.poll_count),
                    ))?;
                    return Ok(PollOutcome::Settled);
                }

                match status.state {
                    TaskState::Created => Ok(PollOutcome::Settled),
                    TaskState::Processing => {
                        t.begin_processing();
                        Ok(PollOutcome::Settled)
                    }
                    TaskState::Completed => Ok(PollOutcome::Materialize(Box::new(t.clone()))),
                    TaskState::Failed => {
                        t.fail(
                            ErrorDetail::new(CODE_PROVIDER_FAILED, "provider processing failed")
                                .with_payload(status.raw),
                        )?;
                        Ok(PollOutcome::Settled)
                    }
                    // The loop never sets CANCELLED itself; a provider-side
                    // cancellation is recorded as a failure.
                    TaskState::Cancelled => {
                        t.fail(
                            ErrorDetail::new(CODE_PROVIDER_CANCELLED, "provider cancelled the job")
                                .with_payload(status.raw),
                        )?;
                        Ok(PollOutcome::Settled)
                    }
                }
            })
            .await?;

        match outcome {
            PollOutcome::Settled => Ok(()),
            PollOutcome::Materialize(snapshot) => {
                self.finish_completed(id, &snapshot, download_url, quality_score)
                    .await
            }
        }
    }

    /// Provider success observed: materialize the result, then apply
    /// COMPLETED (or FAILED on materialization error). Linking the new
    /// asset into the task is the final step.
    async fn finish_completed(
        &self,
        id: &TaskId,
        snapshot: &Task,
        download_url: Option<String>,
        quality_score: Option<f32>,
    ) -> Result<(), TryOnError> {
        let materialized = match download_url.as_deref() {
            Some(url) => self
                .materializer
                .materialize(snapshot, url)
                .await
                .map_err(|e| e.to_string()),
            None => Err("provider reported success without a result handle".to_string()),
        };

        match materialized {
            Ok(asset) => {
                let result = TaskResult {
                    result_asset_id: asset.id.clone(),
                    download_signed_url: download_url,
                    result_image_url: asset.file_url.clone(),
                    quality_score,
                    processing_secs: None,
                };
                self.store
                    .update(id, move |t| {
                        if t.is_terminal() {
                            // Lost the race to another terminal transition.
                            return Ok(());
                        }
                        t.complete(result)
                    })
                    .await?;
                info!(task_id = %id, "Try-on task completed");
            }
            Err(msg) => {
                self.store
                    .update(id, move |t| {
                        if t.is_terminal() {
                            return Ok(());
                        }
                        t.fail(ErrorDetail::new(CODE_RESULT_FAILED, msg))
                    })
                    .await?;
                warn!(task_id = %id, "Result materialization failed");
            }
        }
        Ok(())
    }

    /// Resolve and read all input assets for a submission or retry.
    async fn load_job_inputs(
        &self,
        owner: &UserId,
        model_asset_id: &AssetId,
        garment_asset_ids: &[AssetId],
        mode: TryOnMode,
        category: GarmentCategory,
        hd_mode: bool,
    ) -> Result<(Asset, Vec<Asset>, SubmitJob), TryOnError> {
        let model = self
            .assets
            .get_usable(model_asset_id, owner, AssetKind::Model)
            .await?;

        let expected = mode.garment_count();
        if garment_asset_ids.len() != expected {
            return Err(TryOnError::GarmentCardinality {
                mode,
                expected,
                actual: garment_asset_ids.len(),
            });
        }

        let mut garments = Vec::with_capacity(expected);
        for id in garment_asset_ids {
            garments.push(self.assets.get_usable(id, owner, AssetKind::Garment).await?);
        }

        let model_image = self.assets.read_file(&model).await?;
        let mut garment_images = Vec::with_capacity(garments.len());
        for garment in &garments {
            garment_images.push(GarmentImage {
                bytes: self.assets.read_file(garment).await?,
                file_name: garment.file_name.clone(),
            });
        }

        let job = SubmitJob {
            model_image,
            model_file_name: model.file_name.clone(),
            garment_images,
            category,
            mode,
            hd_mode,
        };
        Ok((model, garments, job))
    }
}

/// Map provider submit failures onto the synchronous rejection taxonomy.
fn submit_error(e: ProviderError) -> TryOnError {
    match e {
        ProviderError::Rejected { status, body } => {
            TryOnError::ProviderRejected(format!("HTTP {status}: {body}"))
        }
        other => TryOnError::ProviderUnavailable(other.to_string()),
    }
}
