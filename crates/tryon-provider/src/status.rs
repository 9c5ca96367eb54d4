//! Mapping the provider's open status vocabulary to task states.
//!
//! The provider's status strings are an open, loosely-specified set
//! from an external system. Anything unrecognized maps to CREATED
//! ("still pending"), never to FAILED, so vocabulary drift on the
//! provider side cannot produce false failures.

use tryon_core::TaskState;

/// Map a raw provider status string to the internal task state.
pub fn map_provider_status(raw: &str) -> TaskState {
    match raw.to_ascii_lowercase().as_str() {
        "created" | "pending" => TaskState::Created,
        "processing" | "in_progress" => TaskState::Processing,
        "completed" | "success" => TaskState::Completed,
        "failed" | "error" => TaskState::Failed,
        "cancelled" => TaskState::Cancelled,
        _ => TaskState::Created,
    }
}

/// Coarse progress estimate when the provider reports no percentage.
pub fn estimate_progress(state: TaskState) -> u8 {
    match state {
        TaskState::Created => 0,
        TaskState::Processing => 50,
        TaskState::Completed => 100,
        TaskState::Failed | TaskState::Cancelled => 0,
    }
}

/// Clamp a provider-reported progress value into 0-100.
pub fn clamp_progress(raw: f64) -> u8 {
    raw.clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vocabulary() {
        assert_eq!(map_provider_status("created"), TaskState::Created);
        assert_eq!(map_provider_status("pending"), TaskState::Created);
        assert_eq!(map_provider_status("processing"), TaskState::Processing);
        assert_eq!(map_provider_status("in_progress"), TaskState::Processing);
        assert_eq!(map_provider_status("completed"), TaskState::Completed);
        assert_eq!(map_provider_status("success"), TaskState::Completed);
        assert_eq!(map_provider_status("failed"), TaskState::Failed);
        assert_eq!(map_provider_status("error"), TaskState::Failed);
        assert_eq!(map_provider_status("cancelled"), TaskState::Cancelled);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(map_provider_status("COMPLETED"), TaskState::Completed);
        assert_eq!(map_provider_status("In_Progress"), TaskState::Processing);
    }

    #[test]
    fn test_unknown_maps_to_pending_not_failed() {
        assert_eq!(map_provider_status("queued_v2"), TaskState::Created);
        assert_eq!(map_provider_status(""), TaskState::Created);
        assert_eq!(map_provider_status("???"), TaskState::Created);
    }

    #[test]
    fn test_progress_estimates() {
        assert_eq!(estimate_progress(TaskState::Created), 0);
        assert_eq!(estimate_progress(TaskState::Processing), 50);
        assert_eq!(estimate_progress(TaskState::Completed), 100);
        assert_eq!(estimate_progress(TaskState::Failed), 0);
    }

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-5.0), 0);
        assert_eq!(clamp_progress(42.7), 42);
        assert_eq!(clamp_progress(250.0), 100);
    }
}
