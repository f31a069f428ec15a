//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use crate::analysis::CommandSpec;

/// Service configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port.
    pub port: u16,
    /// Directory where uploaded inputs are persisted.
    pub upload_dir: PathBuf,
    /// Directory served under `/static` (rendered artifacts live here).
    pub static_dir: PathBuf,
    /// Fixed prefix for artifact URLs. Derived from the request host when unset.
    pub public_base_url: Option<String>,
    /// Upload size limit in megabytes.
    pub max_upload_mb: usize,
    /// Records older than this are reclaimed by the sweeper.
    pub retention: Duration,
    /// Sweeper wake-up period.
    pub sweep_interval: Duration,
    /// Cap on concurrently running analyses (`None` = unbounded).
    pub max_concurrent_analyses: Option<usize>,
    pub analyzers: AnalyzerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            public_base_url: None,
            max_upload_mb: 100,
            retention: Duration::from_secs(3600), // 1 hour
            sweep_interval: Duration::from_secs(300), // 5 minutes
            max_concurrent_analyses: None,
            analyzers: AnalyzerConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Build config from environment variables, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = env_parse::<u16>("DEEPFAKE_PORT").unwrap_or(defaults.port);

        let upload_dir = std::env::var("DEEPFAKE_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.upload_dir);

        let static_dir = std::env::var("DEEPFAKE_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.static_dir);

        let public_base_url = std::env::var("DEEPFAKE_PUBLIC_BASE_URL")
            .ok()
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty());

        let max_upload_mb = env_parse::<usize>("DEEPFAKE_MAX_UPLOAD_MB")
            .filter(|mb| *mb > 0)
            .unwrap_or(defaults.max_upload_mb);

        let retention = env_parse::<u64>("DEEPFAKE_RETENTION_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.retention);

        let sweep_interval = env_parse::<u64>("DEEPFAKE_SWEEP_INTERVAL_SECS")
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.sweep_interval);

        let max_concurrent_analyses =
            env_parse::<usize>("DEEPFAKE_MAX_CONCURRENT_ANALYSES").filter(|n| *n > 0);

        Self {
            port,
            upload_dir,
            static_dir,
            public_base_url,
            max_upload_mb,
            retention,
            sweep_interval,
            max_concurrent_analyses,
            analyzers: AnalyzerConfig::from_env(),
        }
    }

    /// Upload size limit in bytes.
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// External detector commands.
#[derive(Debug, Clone, Default)]
pub struct AnalyzerConfig {
    pub video: Option<CommandSpec>,
    pub audio: Option<CommandSpec>,
    /// Audio loadability check. Without it only existence and size are checked.
    pub audio_check: Option<CommandSpec>,
}

impl AnalyzerConfig {
    pub fn from_env() -> Self {
        let command = |key: &str| {
            std::env::var(key)
                .ok()
                .and_then(|line| CommandSpec::parse(&line))
        };

        Self {
            video: command("DEEPFAKE_VIDEO_CMD"),
            audio: command("DEEPFAKE_AUDIO_CMD"),
            audio_check: command("DEEPFAKE_AUDIO_CHECK_CMD"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}
