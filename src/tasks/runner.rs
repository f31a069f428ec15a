//! Worker execution: runs one job to its terminal state.
//!
//! Each job gets its own tokio task. The worker:
//! 1. marks the record `processing`
//! 2. calls the analyzer for the job's kind
//! 3. removes the input file (best-effort, exactly once)
//! 4. publishes `completed` or `error`
//!
//! The file is removed before the terminal status is published, so a poller
//! that observes a terminal status never finds the input still on disk.
//! Analyzer panics are caught here and never reach other jobs.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::{Analyzer, AudioVerdict, VideoVerdict};
use crate::error::AnalysisError;
use crate::tasks::model::{AnalysisResult, AudioDetails, JobParameters, Label};
use crate::tasks::registry::TaskRegistry;

/// Failure message for audio that does not pass the loadability pre-check.
pub const INVALID_AUDIO_MESSAGE: &str = "Invalid audio file or format not supported.";

/// A job handed from the submitter to a worker.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub parameters: JobParameters,
    pub input_path: PathBuf,
    /// Prefix for artifact URLs, e.g. `http://localhost:5000`.
    pub base_url: String,
}

/// How an analysis ended, before it is written to the record.
enum Verdict {
    Completed(AnalysisResult),
    Rejected(String),
}

/// Spawns and runs workers against a shared registry.
#[derive(Clone)]
pub struct TaskRunner {
    registry: Arc<TaskRegistry>,
    analyzer: Arc<dyn Analyzer>,
    limiter: Option<Arc<Semaphore>>,
}

impl TaskRunner {
    /// Create a runner with no cap on concurrent analyses.
    pub fn new(registry: Arc<TaskRegistry>, analyzer: Arc<dyn Analyzer>) -> Self {
        Self {
            registry,
            analyzer,
            limiter: None,
        }
    }

    /// Cap concurrently running analyses. Jobs beyond the cap stay `queued`
    /// until a slot frees up; nothing is rejected.
    pub fn with_concurrency_limit(mut self, max: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Run `job` on its own tokio task.
    pub fn spawn(&self, job: Job) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(job).await })
    }

    /// Drive one job to its terminal state. Never returns an error: every
    /// failure ends up on the record.
    pub async fn run(&self, job: Job) {
        let _permit = match &self.limiter {
            Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
            None => None,
        };

        match self.registry.update(job.id, |r| r.mark_processing()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(task_id = %job.id, error = %e, "Task not startable, dropping job");
                remove_input(&job.input_path).await;
                return;
            }
            Err(_) => {
                warn!(task_id = %job.id, "Task evicted before its worker started");
                remove_input(&job.input_path).await;
                return;
            }
        }

        debug!(task_id = %job.id, kind = %job.parameters.kind(), "Worker started");

        let verdict = match AssertUnwindSafe(self.analyze(&job)).catch_unwind().await {
            Ok(Ok(verdict)) => verdict,
            Ok(Err(e)) => {
                error!(task_id = %job.id, error = %e, "Analysis failed");
                Verdict::Rejected(e.to_string())
            }
            Err(panic) => {
                let reason = panic_message(&*panic);
                error!(task_id = %job.id, reason = %reason, "Analyzer panicked");
                Verdict::Rejected(format!("Unexpected analysis failure: {reason}"))
            }
        };

        remove_input(&job.input_path).await;
        self.finish(job.id, verdict).await;
    }

    async fn analyze(&self, job: &Job) -> Result<Verdict, AnalysisError> {
        match job.parameters {
            JobParameters::Video { frames } => {
                match self.analyzer.analyze_video(&job.input_path, frames).await? {
                    VideoVerdict::Rejected { error } => Ok(Verdict::Rejected(error)),
                    VideoVerdict::Prediction {
                        prediction,
                        confidence,
                    } => Ok(Verdict::Completed(AnalysisResult {
                        prediction,
                        confidence: normalize_confidence(prediction, confidence)?,
                        audio: None,
                    })),
                }
            }
            JobParameters::Audio {} => {
                if !self.analyzer.check_audio(&job.input_path).await {
                    return Ok(Verdict::Rejected(INVALID_AUDIO_MESSAGE.to_string()));
                }

                match self.analyzer.analyze_audio(&job.input_path).await? {
                    AudioVerdict::Rejected { error } => Ok(Verdict::Rejected(error)),
                    AudioVerdict::Prediction(p) => Ok(Verdict::Completed(AnalysisResult {
                        prediction: p.prediction,
                        confidence: normalize_confidence(p.prediction, p.confidence)?,
                        audio: Some(AudioDetails {
                            message: p.message,
                            spectrogram_url: p
                                .spectrogram_path
                                .as_deref()
                                .filter(|path| !path.is_empty())
                                .map(|path| artifact_url(&job.base_url, path)),
                            features: p.features,
                        }),
                    })),
                }
            }
        }
    }

    async fn finish(&self, id: Uuid, verdict: Verdict) {
        let update = self
            .registry
            .update(id, |record| match verdict {
                Verdict::Completed(result) => record.complete(result),
                Verdict::Rejected(reason) => {
                    warn!(task_id = %id, reason = %reason, "Task failed");
                    record.fail(reason)
                }
            })
            .await;

        match update {
            Ok(Ok(())) => info!(task_id = %id, "Task reached terminal state"),
            Ok(Err(e)) => warn!(task_id = %id, error = %e, "Terminal transition rejected"),
            Err(_) => warn!(task_id = %id, "Task evicted while running, result dropped"),
        }
    }
}

/// Clamp a detector confidence into `[0, 100]`. Non-finite values are
/// treated as broken detector output.
fn normalize_confidence(prediction: Label, confidence: f64) -> Result<f64, AnalysisError> {
    if !confidence.is_finite() {
        return Err(AnalysisError::InvalidOutput {
            program: "analyzer".to_string(),
            reason: format!("non-finite confidence for {prediction}"),
        });
    }
    Ok(confidence.clamp(0.0, 100.0))
}

/// Join the public base URL with an artifact path under `/static`.
pub fn artifact_url(base_url: &str, artifact_path: &str) -> String {
    format!(
        "{}/static/{}",
        base_url.trim_end_matches('/'),
        artifact_path.trim_start_matches('/')
    )
}

/// Best-effort removal of a job's input file. Failures are logged only.
pub(crate) async fn remove_input(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed input file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Input file already gone");
        }
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete input file"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
