//! Task orchestration: records, registry, submission, workers, retention.
//!
//! Core components:
//! - `model` — Task record and its state machine (queued → processing → completed/error)
//! - `registry` — Concurrent map of task ID to record
//! - `submitter` — Persists uploads and dispatches workers
//! - `runner` — Per-job worker execution
//! - `sweeper` — Periodic eviction of expired tasks

pub mod model;
pub mod registry;
pub mod runner;
pub mod submitter;
pub mod sweeper;

pub use model::{AnalysisResult, JobParameters, Label, TaskKind, TaskRecord, TaskStatus};
pub use registry::TaskRegistry;
pub use runner::{Job, TaskRunner};
pub use submitter::JobSubmitter;
pub use sweeper::{spawn_retention_sweeper, sweep_expired};
