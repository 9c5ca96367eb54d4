//! Try-on orchestrator service.
//!
//! Owns the task lifecycle end-to-end: submission against the asset
//! store and provider, the background reconciliation scheduler that
//! polls in-flight jobs, result materialization, and the user-facing
//! retry/cancel/download operations.

pub mod assets;
pub mod config;
pub mod http;
pub mod materializer;
pub mod orchestrator;
pub mod scheduler;
pub mod store;
pub mod usage;

pub use assets::AssetStore;
pub use config::Config;
pub use materializer::{MaterializeError, Materializer};
pub use orchestrator::{Orchestrator, SubmitRequest};
pub use scheduler::Scheduler;
pub use store::TaskStore;
pub use usage::{InMemoryUsage, UsageRecorder};
