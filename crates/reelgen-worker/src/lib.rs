//! Video generation worker.
//!
//! This crate provides:
//! - The job orchestrator and its stage pipeline
//! - The job store and per-job workspaces
//! - Worker configuration and structured job logging

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod script;
pub mod store;
pub mod workspace;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use orchestrator::Orchestrator;
pub use pipeline::{image_duration, Stage, MIN_IMAGE_DURATION};
pub use store::{InMemoryJobStore, JobStore};
pub use workspace::TempWorkspace;
