//! Analysis collaborators: the contract the worker uses to run detectors.
//!
//! The detectors themselves are opaque. An [`Analyzer`] takes a path to the
//! uploaded media and returns either an explicit rejection (`{"error": ...}`)
//! or a prediction. Infrastructure failures (detector missing, crashed,
//! garbled output) are reported as [`AnalysisError`] instead.

pub mod command;
#[cfg(test)]
pub(crate) mod stub;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::AnalysisError;
use crate::tasks::model::{FeatureValue, Label};

pub use command::{CommandAnalyzer, CommandSpec};

/// Output of the video detector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum VideoVerdict {
    Rejected { error: String },
    Prediction { prediction: Label, confidence: f64 },
}

/// A successful audio prediction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AudioPrediction {
    pub prediction: Label,
    pub confidence: f64,
    #[serde(default)]
    pub message: String,
    /// Artifact path relative to the static directory, e.g. `spectrograms/x.png`.
    #[serde(default)]
    pub spectrogram_path: Option<String>,
    #[serde(default)]
    pub features: BTreeMap<String, FeatureValue>,
}

/// Output of the audio detector.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AudioVerdict {
    Rejected { error: String },
    Prediction(AudioPrediction),
}

/// Media analysis backend.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Classify a video, sampling `frames` frames.
    async fn analyze_video(&self, input: &Path, frames: u32)
    -> Result<VideoVerdict, AnalysisError>;

    /// Whether the audio file can be loaded at all.
    async fn check_audio(&self, input: &Path) -> bool;

    /// Classify an audio file.
    async fn analyze_audio(&self, input: &Path) -> Result<AudioVerdict, AnalysisError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_verdict_parses_error_first() {
        let verdict: VideoVerdict =
            serde_json::from_str(r#"{"error": "No faces detected"}"#).unwrap();
        assert_eq!(
            verdict,
            VideoVerdict::Rejected {
                error: "No faces detected".into()
            }
        );

        let verdict: VideoVerdict =
            serde_json::from_str(r#"{"prediction": "REAL", "confidence": 72.5}"#).unwrap();
        assert_eq!(
            verdict,
            VideoVerdict::Prediction {
                prediction: Label::Real,
                confidence: 72.5
            }
        );
    }

    #[test]
    fn audio_verdict_with_features() {
        let json = r#"{
            "prediction": "FAKE",
            "confidence": 88.1,
            "message": "Detected unnatural patterns",
            "spectrogram_path": "spectrograms/spectrogram_1.png",
            "features": {"zero_crossing_rate": 0.05, "mfccs": [1.5, -2.0], "length": 4.0}
        }"#;
        let verdict: AudioVerdict = serde_json::from_str(json).unwrap();
        let AudioVerdict::Prediction(prediction) = verdict else {
            panic!("expected prediction");
        };
        assert_eq!(prediction.prediction, Label::Fake);
        assert_eq!(
            prediction.spectrogram_path.as_deref(),
            Some("spectrograms/spectrogram_1.png")
        );
        assert_eq!(
            prediction.features["mfccs"],
            FeatureValue::Series(vec![1.5, -2.0])
        );
    }

    #[test]
    fn audio_verdict_minimal_prediction() {
        let verdict: AudioVerdict =
            serde_json::from_str(r#"{"prediction": "REAL", "confidence": 90}"#).unwrap();
        let AudioVerdict::Prediction(prediction) = verdict else {
            panic!("expected prediction");
        };
        assert!(prediction.message.is_empty());
        assert!(prediction.spectrogram_path.is_none());
        assert!(prediction.features.is_empty());
    }

    #[test]
    fn unknown_label_is_rejected() {
        let parsed = serde_json::from_str::<VideoVerdict>(r#"{"prediction": "MAYBE", "confidence": 1}"#);
        assert!(parsed.is_err());
    }
}
