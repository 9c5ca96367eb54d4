//! The Task entity and its state machine.
//!
//! All mutation goes through the transition methods below so the
//! invariants hold after every change:
//! - `result` is populated iff the state is COMPLETED,
//! - `error_detail` is populated iff the state is FAILED,
//! - terminal timestamps are stamped exactly once per attempt,
//! - progress never decreases within one attempt.

use crate::{AssetId, GarmentCategory, JobId, TaskId, TaskState, TryOnError, TryOnMode, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hard bound on user-triggered retries per task.
pub const MAX_RETRIES: u32 = 3;

/// References to the input assets plus URLs denormalized at submission
/// time, so task history survives asset deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskInputs {
    pub model_asset_id: AssetId,
    pub garment_asset_ids: Vec<AssetId>,
    pub model_image_url: String,
    pub garment_image_urls: Vec<String>,
}

/// Materialized result of a completed task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// The result asset persisted by the materializer.
    pub result_asset_id: AssetId,

    /// Provider-issued signed download URL (time-limited).
    pub download_signed_url: Option<String>,

    /// Local URL of the persisted result image.
    pub result_image_url: String,

    /// Quality score reported by the provider, when present.
    pub quality_score: Option<f32>,

    /// Seconds between started_at and completed_at. None when the task
    /// jumped straight to terminal without an observed PROCESSING phase.
    pub processing_secs: Option<i64>,
}

/// Structured failure detail, present only in FAILED state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Stable failure code, e.g. `PROVIDER_PROCESSING_FAILED`.
    pub code: String,
    pub message: String,
    /// Raw provider payload captured for inspection.
    pub provider_payload: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            provider_payload: None,
        }
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.provider_payload = Some(payload);
        self
    }
}

/// Timing bookkeeping for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_polled_at: Option<DateTime<Utc>>,
    pub poll_count: u32,
}

impl TaskTiming {
    fn new() -> Self {
        Self {
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            last_polled_at: None,
            poll_count: 0,
        }
    }
}

/// A Task tracks one try-on job end-to-end: provider submission,
/// polling, and result materialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable internal identifier, immutable.
    pub id: TaskId,

    /// Provider-issued job id. Replaced by a fresh id on retry.
    pub job_id: JobId,

    /// Owning user, immutable.
    pub owner: UserId,

    pub mode: TryOnMode,
    pub garment_category: GarmentCategory,
    pub hd_mode: bool,

    pub state: TaskState,

    /// 0-100, monotonically non-decreasing within one attempt.
    pub progress: u8,

    pub inputs: TaskInputs,
    pub result: Option<TaskResult>,
    pub error_detail: Option<ErrorDetail>,
    pub timing: TaskTiming,

    /// User-triggered retries so far, independent of poll_count.
    pub retry_count: u32,

    pub deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,

    /// Bumped by the task store on every write; used to detect and
    /// serialize concurrent mutation.
    pub version: u64,
}

impl Task {
    /// Create a new task in CREATED state for an accepted submission.
    pub fn new(
        job_id: JobId,
        owner: UserId,
        mode: TryOnMode,
        garment_category: GarmentCategory,
        hd_mode: bool,
        inputs: TaskInputs,
    ) -> Self {
        Self {
            id: TaskId::generate(),
            job_id,
            owner,
            mode,
            garment_category,
            hd_mode,
            state: TaskState::Created,
            progress: 0,
            inputs,
            result: None,
            error_detail: None,
            timing: TaskTiming::new(),
            retry_count: 0,
            deleted: false,
            deleted_at: None,
            version: 0,
        }
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether a retry is currently allowed.
    pub fn can_retry(&self) -> bool {
        self.state == TaskState::Failed && self.retry_count < MAX_RETRIES
    }

    /// Record one reconciliation poll: stamp last_polled_at, bump
    /// poll_count, and raise progress if the provider reported more.
    pub fn record_poll(&mut self, progress: u8) {
        self.timing.last_polled_at = Some(Utc::now());
        self.timing.poll_count += 1;
        self.progress = self.progress.max(progress.min(100));
    }

    /// CREATED -> PROCESSING, stamping started_at the first time.
    pub fn begin_processing(&mut self) {
        if self.state == TaskState::Created {
            self.state = TaskState::Processing;
        }
        if self.state == TaskState::Processing && self.timing.started_at.is_none() {
            self.timing.started_at = Some(Utc::now());
        }
    }

    /// Transition to COMPLETED with a materialized result.
    ///
    /// Rejected if the task is already terminal, making concurrent
    /// reconciliation passes converge on a single terminal state.
    pub fn complete(&mut self, mut result: TaskResult) -> Result<(), TryOnError> {
        if self.is_terminal() {
            return Err(TryOnError::InvalidStateTransition {
                from: self.state,
                to: "COMPLETED",
            });
        }
        let now = self.finish();
        result.processing_secs = self
            .timing
            .started_at
            .map(|started| (now - started).num_seconds());
        self.state = TaskState::Completed;
        self.progress = 100;
        self.result = Some(result);
        self.error_detail = None;
        Ok(())
    }

    /// Transition to FAILED with structured error detail.
    pub fn fail(&mut self, detail: ErrorDetail) -> Result<(), TryOnError> {
        if self.is_terminal() {
            return Err(TryOnError::InvalidStateTransition {
                from: self.state,
                to: "FAILED",
            });
        }
        self.finish();
        self.state = TaskState::Failed;
        self.error_detail = Some(detail);
        self.result = None;
        Ok(())
    }

    /// User-initiated cancellation. Rejected once terminal, so a cancel
    /// racing a reconciliation tick that just went terminal loses.
    pub fn cancel(&mut self) -> Result<(), TryOnError> {
        if self.is_terminal() {
            return Err(TryOnError::InvalidStateTransition {
                from: self.state,
                to: "CANCELLED",
            });
        }
        self.finish();
        self.state = TaskState::Cancelled;
        Ok(())
    }

    /// FAILED -> CREATED under a fresh provider job.
    ///
    /// Resets per-attempt fields and abandons the old job id; the old id
    /// is never polled again. `poll_count` is per-attempt too, so the
    /// new job gets a full stale-poll budget. Caller must have checked
    /// `can_retry`.
    pub fn reset_for_retry(&mut self, job_id: JobId) -> Result<(), TryOnError> {
        if self.state != TaskState::Failed {
            return Err(TryOnError::InvalidStateTransition {
                from: self.state,
                to: "CREATED",
            });
        }
        if self.retry_count >= MAX_RETRIES {
            return Err(TryOnError::RetryLimitExceeded);
        }
        self.job_id = job_id;
        self.state = TaskState::Created;
        self.progress = 0;
        self.error_detail = None;
        self.result = None;
        self.retry_count += 1;
        self.timing.submitted_at = Utc::now();
        self.timing.started_at = None;
        self.timing.completed_at = None;
        self.timing.last_polled_at = None;
        self.timing.poll_count = 0;
        Ok(())
    }

    /// Soft-delete the task. It stays in the store but is excluded from
    /// reconciliation and listings.
    pub fn soft_delete(&mut self) {
        self.deleted = true;
        self.deleted_at = Some(Utc::now());
    }

    /// Stamp completed_at once and return the completion instant.
    fn finish(&mut self) -> DateTime<Utc> {
        match self.timing.completed_at {
            Some(at) => at,
            None => {
                let now = Utc::now();
                self.timing.completed_at = Some(now);
                now
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> TaskInputs {
        TaskInputs {
            model_asset_id: AssetId::generate(),
            garment_asset_ids: vec![AssetId::generate()],
            model_image_url: "/uploads/models/m.jpg".into(),
            garment_image_urls: vec!["/uploads/garments/g.jpg".into()],
        }
    }

    fn task() -> Task {
        Task::new(
            JobId::new("job-1"),
            UserId::generate(),
            TryOnMode::Single,
            GarmentCategory::Upper,
            false,
            inputs(),
        )
    }

    fn result() -> TaskResult {
        TaskResult {
            result_asset_id: AssetId::generate(),
            download_signed_url: Some("https://signed.example/r.jpg".into()),
            result_image_url: "/uploads/results/r.jpg".into(),
            quality_score: Some(92.0),
            processing_secs: None,
        }
    }

    /// Invariants from the data model, checked after every transition.
    fn assert_invariants(t: &Task) {
        assert_eq!(t.result.is_some(), t.state == TaskState::Completed);
        assert_eq!(t.error_detail.is_some(), t.state == TaskState::Failed);
        assert!(t.progress <= 100);
    }

    #[test]
    fn test_new_task_starts_created() {
        let t = task();
        assert_eq!(t.state, TaskState::Created);
        assert_eq!(t.progress, 0);
        assert_eq!(t.retry_count, 0);
        assert!(t.timing.started_at.is_none());
        assert_invariants(&t);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut t = task();
        t.record_poll(50);
        assert_eq!(t.progress, 50);
        t.record_poll(20);
        assert_eq!(t.progress, 50);
        t.record_poll(200);
        assert_eq!(t.progress, 100);
        assert_eq!(t.timing.poll_count, 3);
        assert!(t.timing.last_polled_at.is_some());
    }

    #[test]
    fn test_begin_processing_stamps_started_once() {
        let mut t = task();
        t.begin_processing();
        assert_eq!(t.state, TaskState::Processing);
        let started = t.timing.started_at.expect("started_at set");
        t.begin_processing();
        assert_eq!(t.timing.started_at, Some(started));
        assert_invariants(&t);
    }

    #[test]
    fn test_complete_sets_result_and_duration() {
        let mut t = task();
        t.begin_processing();
        t.complete(result()).expect("complete");
        assert_eq!(t.state, TaskState::Completed);
        assert_eq!(t.progress, 100);
        assert!(t.timing.completed_at.is_some());
        let r = t.result.as_ref().expect("result");
        assert!(r.processing_secs.is_some());
        assert_invariants(&t);
    }

    #[test]
    fn test_duration_undefined_without_started_at() {
        // Provider jumped straight from pending to completed.
        let mut t = task();
        t.complete(result()).expect("complete");
        assert_eq!(t.result.as_ref().unwrap().processing_secs, None);
    }

    #[test]
    fn test_second_terminal_transition_rejected() {
        let mut t = task();
        t.complete(result()).expect("first transition");
        let err = t.fail(ErrorDetail::new("X", "y")).unwrap_err();
        assert!(matches!(err, TryOnError::InvalidStateTransition { .. }));
        assert_eq!(t.state, TaskState::Completed);
        assert_invariants(&t);
    }

    #[test]
    fn test_fail_sets_error_detail_only() {
        let mut t = task();
        t.fail(ErrorDetail::new("PROVIDER_PROCESSING_FAILED", "boom"))
            .expect("fail");
        assert_eq!(t.state, TaskState::Failed);
        assert!(t.result.is_none());
        assert_eq!(
            t.error_detail.as_ref().unwrap().code,
            "PROVIDER_PROCESSING_FAILED"
        );
        assert_invariants(&t);
    }

    #[test]
    fn test_cancel_rejected_when_terminal() {
        let mut t = task();
        t.fail(ErrorDetail::new("E", "e")).expect("fail");
        assert!(t.cancel().is_err());
        assert_eq!(t.state, TaskState::Failed);

        let mut t2 = task();
        t2.begin_processing();
        t2.cancel().expect("cancel in-flight");
        assert_eq!(t2.state, TaskState::Cancelled);
        assert_invariants(&t2);
    }

    #[test]
    fn test_reset_for_retry() {
        let mut t = task();
        t.record_poll(10);
        t.begin_processing();
        t.record_poll(40);
        t.fail(ErrorDetail::new("E", "e")).expect("fail");

        let before = t.inputs.clone();
        t.reset_for_retry(JobId::new("job-2")).expect("retry");

        assert_eq!(t.state, TaskState::Created);
        assert_eq!(t.job_id, JobId::new("job-2"));
        assert_eq!(t.progress, 0);
        assert_eq!(t.retry_count, 1);
        assert!(t.error_detail.is_none());
        assert!(t.timing.started_at.is_none());
        assert!(t.timing.completed_at.is_none());
        assert_eq!(t.timing.poll_count, 0);
        assert!(t.timing.last_polled_at.is_none());
        assert_eq!(t.inputs, before);
        assert_invariants(&t);
    }

    #[test]
    fn test_retry_bound() {
        let mut t = task();
        t.fail(ErrorDetail::new("E", "e")).expect("fail");
        t.retry_count = MAX_RETRIES;
        assert!(!t.can_retry());
        let err = t.reset_for_retry(JobId::new("job-9")).unwrap_err();
        assert!(matches!(err, TryOnError::RetryLimitExceeded));
    }

    #[test]
    fn test_retry_rejected_unless_failed() {
        let mut t = task();
        let err = t.reset_for_retry(JobId::new("job-2")).unwrap_err();
        assert!(matches!(err, TryOnError::InvalidStateTransition { .. }));
    }
}
