//! Try-On Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network/HTTP
//! - Database
//! - Runtime specifics
//!
//! All types here represent the core business domain of the try-on
//! orchestrator: the Task entity and its state machine, asset records,
//! and the domain error taxonomy.

pub mod asset;
pub mod error;
pub mod ids;
pub mod status;
pub mod task;

// Re-export commonly used types
pub use asset::{Asset, AssetKind, ImageMeta};
pub use error::TryOnError;
pub use ids::{AssetId, JobId, TaskId, UserId};
pub use status::{GarmentCategory, TaskState, TryOnMode};
pub use task::{ErrorDetail, Task, TaskInputs, TaskResult, TaskTiming, MAX_RETRIES};
