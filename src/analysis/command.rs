//! Analyzer backed by external detector programs.
//!
//! Each detector is a program that receives the media path as an argument and
//! prints a JSON verdict on stdout:
//! - video: `<program> <args..> <input_path> <frames>`
//! - audio: `<program> <args..> <input_path>`
//! - audio pre-check: `<program> <args..> <input_path>`, exit status 0 means loadable

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::process::Command;

use super::{Analyzer, AudioVerdict, VideoVerdict};
use crate::config::AnalyzerConfig;
use crate::error::AnalysisError;
use crate::tasks::model::TaskKind;

/// Maximum stderr kept in an error message.
const MAX_STDERR_SIZE: usize = 2 * 1024;

/// A program plus its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Parse a whitespace-separated command line. Returns `None` if blank.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    fn command(&self, input: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

/// Runs configured detector programs.
pub struct CommandAnalyzer {
    config: AnalyzerConfig,
}

impl CommandAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    async fn run_json<T: DeserializeOwned>(
        spec: &CommandSpec,
        mut command: Command,
    ) -> Result<T, AnalysisError> {
        let output = command.output().await.map_err(|e| AnalysisError::Spawn {
            program: spec.program.clone(),
            source: e,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::CommandFailed {
                program: spec.program.clone(),
                code: output.status.code(),
                stderr: truncate(stderr.trim(), MAX_STDERR_SIZE),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| AnalysisError::InvalidOutput {
            program: spec.program.clone(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Analyzer for CommandAnalyzer {
    async fn analyze_video(
        &self,
        input: &Path,
        frames: u32,
    ) -> Result<VideoVerdict, AnalysisError> {
        let spec = self
            .config
            .video
            .as_ref()
            .ok_or(AnalysisError::NotConfigured {
                kind: TaskKind::Video,
            })?;
        let mut command = spec.command(input);
        command.arg(frames.to_string());
        Self::run_json(spec, command).await
    }

    async fn check_audio(&self, input: &Path) -> bool {
        let Some(spec) = self.config.audio_check.as_ref() else {
            return match tokio::fs::metadata(input).await {
                Ok(meta) => meta.is_file() && meta.len() > 0,
                Err(_) => false,
            };
        };

        match spec.command(input).status().await {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::warn!(program = %spec.program, error = %e, "Audio pre-check failed to run");
                false
            }
        }
    }

    async fn analyze_audio(&self, input: &Path) -> Result<AudioVerdict, AnalysisError> {
        let spec = self
            .config
            .audio
            .as_ref()
            .ok_or(AnalysisError::NotConfigured {
                kind: TaskKind::Audio,
            })?;
        Self::run_json(spec, spec.command(input)).await
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}
