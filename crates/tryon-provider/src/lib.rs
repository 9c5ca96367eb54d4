//! Provider client for the remote try-on generation API.
//!
//! A thin, stateless-per-call HTTP abstraction: submit a job
//! (multipart), poll its status by job id, download the result from a
//! signed URL. Submission retries transient failures with exponential
//! backoff; status and download calls never self-retry because the
//! owning caller (the 5s reconciliation tick, or a single
//! materialization attempt) provides the retry cadence.

pub mod client;
pub mod error;
pub mod status;

pub use client::{GarmentImage, HttpProvider, JobStatus, Provider, SubmitJob};
pub use error::ProviderError;
pub use status::{estimate_progress, map_provider_status};
