//! Scripted analyzer for unit tests.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Analyzer, AudioPrediction, AudioVerdict, VideoVerdict};
use crate::error::AnalysisError;
use crate::tasks::model::Label;

/// What a stubbed detector does when called.
#[derive(Debug, Clone)]
pub(crate) enum Reply<T> {
    Verdict(T),
    Fail,
    Panic,
}

impl<T: Clone> Reply<T> {
    fn produce(&self) -> Result<T, AnalysisError> {
        match self {
            Self::Verdict(v) => Ok(v.clone()),
            Self::Fail => Err(AnalysisError::InvalidOutput {
                program: "stub".into(),
                reason: "boom".into(),
            }),
            Self::Panic => panic!("detector crashed"),
        }
    }
}

/// A call observed by the stub.
#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub input: PathBuf,
    pub frames: Option<u32>,
    /// Whether the input file existed when the detector ran.
    pub input_existed: bool,
}

pub(crate) struct StubAnalyzer {
    pub video: Reply<VideoVerdict>,
    pub audio: Reply<AudioVerdict>,
    pub audio_loadable: bool,
    /// Per-filename delays, matched on the end of the input file name.
    pub delays: Vec<(String, Duration)>,
    pub calls: Mutex<Vec<Call>>,
}

impl Default for StubAnalyzer {
    fn default() -> Self {
        Self {
            video: Reply::Verdict(VideoVerdict::Prediction {
                prediction: Label::Fake,
                confidence: 91.0,
            }),
            audio: Reply::Verdict(AudioVerdict::Prediction(AudioPrediction {
                prediction: Label::Real,
                confidence: 77.0,
                message: "No manipulation patterns detected in the audio spectrogram.".into(),
                spectrogram_path: Some("spectrograms/spectrogram_test.png".into()),
                features: Default::default(),
            })),
            audio_loadable: true,
            delays: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl StubAnalyzer {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn observe(&self, input: &Path, frames: Option<u32>) {
        let input_existed = tokio::fs::try_exists(input).await.unwrap_or(false);
        self.calls.lock().unwrap().push(Call {
            input: input.to_path_buf(),
            frames,
            input_existed,
        });

        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if let Some((_, delay)) = self.delays.iter().find(|(key, _)| name.ends_with(key.as_str())) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl Analyzer for StubAnalyzer {
    async fn analyze_video(
        &self,
        input: &Path,
        frames: u32,
    ) -> Result<VideoVerdict, AnalysisError> {
        self.observe(input, Some(frames)).await;
        self.video.produce()
    }

    async fn check_audio(&self, _input: &Path) -> bool {
        self.audio_loadable
    }

    async fn analyze_audio(&self, input: &Path) -> Result<AudioVerdict, AnalysisError> {
        self.observe(input, None).await;
        self.audio.produce()
    }
}
