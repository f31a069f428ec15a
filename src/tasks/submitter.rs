//! Job submission: persist the upload, register a queued task, hand it off.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::tasks::model::{JobParameters, TaskRecord};
use crate::tasks::runner::{Job, TaskRunner, remove_input};

/// Smallest accepted frame-sample count for video analysis.
pub const MIN_FRAMES: u32 = 10;
/// Largest accepted frame-sample count for video analysis.
pub const MAX_FRAMES: u32 = 50;
/// Frame-sample count used when the client value is missing or invalid.
pub const DEFAULT_FRAMES: u32 = 20;

/// Coerce a client-supplied frame count. Anything unparseable or outside
/// `MIN_FRAMES..=MAX_FRAMES` becomes `DEFAULT_FRAMES`.
pub fn parse_frames(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|n| (MIN_FRAMES..=MAX_FRAMES).contains(n))
        .unwrap_or(DEFAULT_FRAMES)
}

/// Reduce a client filename to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Accepts uploads and dispatches them to workers.
#[derive(Clone)]
pub struct JobSubmitter {
    runner: TaskRunner,
    upload_dir: PathBuf,
}

impl JobSubmitter {
    pub fn new(runner: TaskRunner, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Submit a video. `frames` is the raw client value.
    pub async fn submit_video(
        &self,
        filename: &str,
        contents: &[u8],
        frames: Option<&str>,
        base_url: &str,
    ) -> Result<Uuid> {
        let parameters = JobParameters::Video {
            frames: parse_frames(frames),
        };
        self.submit(parameters, filename, contents, base_url).await
    }

    /// Submit an audio file.
    pub async fn submit_audio(
        &self,
        filename: &str,
        contents: &[u8],
        base_url: &str,
    ) -> Result<Uuid> {
        self.submit(JobParameters::Audio {}, filename, contents, base_url)
            .await
    }

    /// Persist `contents` as `{id}_{filename}`, insert a queued record, and
    /// start its worker. Returns as soon as the worker is spawned.
    pub async fn submit(
        &self,
        parameters: JobParameters,
        filename: &str,
        contents: &[u8],
        base_url: &str,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        let filename = sanitize_filename(filename);
        let input_path = self.upload_dir.join(format!("{id}_{filename}"));

        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&input_path)
            .await?;
        let written = match file.write_all(contents).await {
            Ok(()) => file.flush().await,
            Err(e) => Err(e),
        };
        drop(file);
        if let Err(e) = written {
            remove_input(&input_path).await;
            return Err(e.into());
        }

        let record = TaskRecord::new(id, filename.clone(), parameters.clone(), input_path.clone());
        if let Err(e) = self.runner.registry().insert(record).await {
            remove_input(&input_path).await;
            return Err(e.into());
        }

        info!(
            task_id = %id,
            kind = %parameters.kind(),
            filename = %filename,
            bytes = contents.len(),
            "Task queued"
        );

        self.runner.spawn(Job {
            id,
            parameters,
            input_path,
            base_url: base_url.to_string(),
        });

        Ok(id)
    }
}
