//! Task record model: kinds, statuses, results, and the record state machine.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;

/// Kind of media a task analyzes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Video,
    Audio,
}

impl TaskKind {
    /// File extensions accepted for this kind (lowercase, without the dot).
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Video => &["mp4", "avi", "mov", "mkv", "webm"],
            Self::Audio => &["mp3", "wav", "ogg", "flac", "m4a"],
        }
    }

    /// Check whether a client-supplied filename carries an accepted extension.
    pub fn accepts_filename(&self, filename: &str) -> bool {
        match filename.rsplit_once('.') {
            Some((_, ext)) => {
                let ext = ext.to_ascii_lowercase();
                self.allowed_extensions().contains(&ext.as_str())
            }
            None => false,
        }
    }

    fn queued_message(&self) -> &'static str {
        match self {
            Self::Video => "Uploading video...",
            Self::Audio => "Uploading audio...",
        }
    }

    fn processing_message(&self) -> &'static str {
        match self {
            Self::Video => "Analyzing video frames...",
            Self::Audio => "Analyzing audio patterns...",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted, waiting for its worker to start.
    Queued,
    /// The analysis collaborator is running.
    Processing,
    /// Analysis produced a prediction.
    Completed,
    /// Analysis failed or declined.
    Error,
}

impl TaskStatus {
    /// Check if this status allows transitioning to another one.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Queued, Processing) | (Processing, Completed) | (Processing, Error)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// A recorded status change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
}

/// Classification label produced by a detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Real,
    Fake,
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "REAL"),
            Self::Fake => write!(f, "FAKE"),
        }
    }
}

/// A named signal feature: either a single number or a vector (e.g. MFCC means).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    Series(Vec<f64>),
}

/// Audio-specific part of a completed result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AudioDetails {
    pub message: String,
    /// Caller-resolvable URL of the rendered spectrogram.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spectrogram_url: Option<String>,
    pub features: BTreeMap<String, FeatureValue>,
}

/// Normalized analysis result stored on a completed task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub prediction: Label,
    /// Percentage in `[0, 100]`.
    pub confidence: f64,
    #[serde(flatten)]
    pub audio: Option<AudioDetails>,
}

/// Validated job parameters, fixed at submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobParameters {
    Video { frames: u32 },
    Audio {},
}

impl JobParameters {
    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Video { .. } => TaskKind::Video,
            Self::Audio {} => TaskKind::Audio,
        }
    }
}

/// Outcome slot of a task. Only the terminal statuses carry a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Pending,
    Completed(AnalysisResult),
    Failed(String),
}

/// One submitted analysis job.
#[derive(Debug, Clone)]
pub struct TaskRecord {
    pub id: Uuid,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Human-readable progress message.
    pub message: String,
    /// Sanitized client filename.
    pub filename: String,
    pub parameters: JobParameters,
    pub outcome: TaskOutcome,
    /// Backing input file; cleared once the worker has removed it.
    pub input_path: Option<PathBuf>,
    pub history: Vec<StatusTransition>,
}

impl TaskRecord {
    /// Create a queued record.
    pub fn new(
        id: Uuid,
        filename: impl Into<String>,
        parameters: JobParameters,
        input_path: PathBuf,
    ) -> Self {
        let kind = parameters.kind();
        let now = Utc::now();
        Self {
            id,
            kind,
            status: TaskStatus::Queued,
            created_at: now,
            updated_at: now,
            message: kind.queued_message().to_string(),
            filename: filename.into(),
            parameters,
            outcome: TaskOutcome::Pending,
            input_path: Some(input_path),
            history: Vec::new(),
        }
    }

    fn transition_to(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        if !self.status.can_transition_to(to) {
            return Err(TaskError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }

        let now = Utc::now();
        self.history.push(StatusTransition {
            from: self.status,
            to,
            at: now,
        });
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Move from `queued` to `processing`.
    pub fn mark_processing(&mut self) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Processing)?;
        self.message = self.kind.processing_message().to_string();
        Ok(())
    }

    /// Move to `completed`, storing the result. The input file is expected to
    /// be gone already, so the reference is dropped.
    pub fn complete(&mut self, result: AnalysisResult) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Completed)?;
        self.message = match result.audio.as_ref() {
            Some(audio) if !audio.message.is_empty() => audio.message.clone(),
            _ => "Analysis complete".to_string(),
        };
        self.outcome = TaskOutcome::Completed(result);
        self.input_path = None;
        Ok(())
    }

    /// Move to `error`, storing the failure description.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Error)?;
        self.message = "Analysis failed".to_string();
        self.outcome = TaskOutcome::Failed(error.into());
        self.input_path = None;
        Ok(())
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.outcome {
            TaskOutcome::Completed(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            TaskOutcome::Failed(error) => Some(error.as_str()),
            _ => None,
        }
    }

    /// Whether the record has outlived `retention` at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        now.signed_duration_since(self.created_at)
            .to_std()
            .map(|age| age > retention)
            .unwrap_or(false)
    }
}

/// Client-facing shape of a record.
#[derive(Serialize)]
struct TaskView<'a> {
    id: Uuid,
    #[serde(rename = "type")]
    kind: TaskKind,
    status: TaskStatus,
    message: &'a str,
    filename: &'a str,
    parameters: &'a JobParameters,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    history: &'a [StatusTransition],
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl Serialize for TaskRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        TaskView {
            id: self.id,
            kind: self.kind,
            status: self.status,
            message: &self.message,
            filename: &self.filename,
            parameters: &self.parameters,
            created_at: self.created_at,
            updated_at: self.updated_at,
            history: &self.history,
            result: self.result(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_record() -> TaskRecord {
        TaskRecord::new(
            Uuid::new_v4(),
            "clip.mp4",
            JobParameters::Video { frames: 20 },
            PathBuf::from("uploads/clip.mp4"),
        )
    }

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            prediction: Label::Fake,
            confidence: 87.5,
            audio: None,
        }
    }

    #[test]
    fn status_transitions_valid() {
        assert!(TaskStatus::Queued.can_transition_to(TaskStatus::Processing));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Processing.can_transition_to(TaskStatus::Error));
    }

    #[test]
    fn status_transitions_invalid() {
        assert!(!TaskStatus::Queued.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Queued.can_transition_to(TaskStatus::Error));
        assert!(!TaskStatus::Processing.can_transition_to(TaskStatus::Queued));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Error));
        assert!(!TaskStatus::Error.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Queued));
    }

    #[test]
    fn new_record_is_queued_without_outcome() {
        let record = video_record();
        assert_eq!(record.status, TaskStatus::Queued);
        assert_eq!(record.kind, TaskKind::Video);
        assert_eq!(record.message, "Uploading video...");
        assert!(record.result().is_none());
        assert!(record.error().is_none());
        assert!(record.input_path.is_some());
    }

    #[test]
    fn completion_sets_result_only() {
        let mut record = video_record();
        record.mark_processing().unwrap();
        assert_eq!(record.message, "Analyzing video frames...");

        record.complete(sample_result()).unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert!(record.result().is_some());
        assert!(record.error().is_none());
        assert!(record.input_path.is_none());
        assert_eq!(record.history.len(), 2);
    }

    #[test]
    fn cannot_complete_without_processing() {
        let mut record = video_record();
        let err = record.complete(sample_result()).unwrap_err();
        assert!(matches!(err, TaskError::InvalidTransition { .. }));
        assert_eq!(record.status, TaskStatus::Queued);
        assert!(record.result().is_none());
    }

    #[test]
    fn terminal_states_are_final() {
        let mut record = video_record();
        record.mark_processing().unwrap();
        record.fail("decoder exploded").unwrap();

        assert!(record.complete(sample_result()).is_err());
        assert!(record.mark_processing().is_err());
        assert_eq!(record.error(), Some("decoder exploded"));
        assert!(record.result().is_none());
    }

    #[test]
    fn audio_message_wins_on_completion() {
        let mut record = TaskRecord::new(
            Uuid::new_v4(),
            "voice.wav",
            JobParameters::Audio {},
            PathBuf::from("uploads/voice.wav"),
        );
        record.mark_processing().unwrap();
        record
            .complete(AnalysisResult {
                prediction: Label::Real,
                confidence: 80.0,
                audio: Some(AudioDetails {
                    message: "No manipulation patterns detected.".into(),
                    spectrogram_url: None,
                    features: BTreeMap::new(),
                }),
            })
            .unwrap();
        assert_eq!(record.message, "No manipulation patterns detected.");
    }

    #[test]
    fn accepts_filename_by_extension() {
        assert!(TaskKind::Video.accepts_filename("movie.MP4"));
        assert!(TaskKind::Audio.accepts_filename("a.b.flac"));
        assert!(!TaskKind::Audio.accepts_filename("movie.mp4"));
        assert!(!TaskKind::Video.accepts_filename("noextension"));
    }

    #[test]
    fn expiry_uses_created_at() {
        let mut record = video_record();
        let now = Utc::now();
        assert!(!record.is_expired(now, Duration::from_secs(3600)));

        record.created_at = now - chrono::Duration::seconds(3601);
        assert!(record.is_expired(now, Duration::from_secs(3600)));
    }

    #[test]
    fn serialized_shape_hides_input_path() {
        let mut record = video_record();
        record.mark_processing().unwrap();
        record.complete(sample_result()).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["parameters"]["frames"], 20);
        assert_eq!(json["result"]["prediction"], "FAKE");
        assert_eq!(json["result"]["confidence"], 87.5);
        assert!(json.get("error").is_none());
        assert!(json.get("input_path").is_none());
        assert_eq!(json["history"][0]["from"], "queued");
        assert_eq!(json["history"][1]["to"], "completed");
    }

    #[test]
    fn serialized_audio_result_is_flat() {
        let result = AnalysisResult {
            prediction: Label::Real,
            confidence: 91.0,
            audio: Some(AudioDetails {
                message: "ok".into(),
                spectrogram_url: Some("http://host/static/spectrograms/x.png".into()),
                features: BTreeMap::from([
                    ("length".to_string(), FeatureValue::Scalar(3.5)),
                    ("mfccs".to_string(), FeatureValue::Series(vec![1.0, 2.0])),
                ]),
            }),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["prediction"], "REAL");
        assert_eq!(json["spectrogram_url"], "http://host/static/spectrograms/x.png");
        assert_eq!(json["features"]["length"], 3.5);
        assert_eq!(json["features"]["mfccs"][1], 2.0);
    }

    #[test]
    fn status_display() {
        assert_eq!(TaskStatus::Processing.to_string(), "processing");
        assert_eq!(TaskKind::Audio.to_string(), "audio");
        assert_eq!(Label::Fake.to_string(), "FAKE");
    }
}
