use std::sync::Arc;

use anyhow::Context;

use deepfake_tasks::analysis::{Analyzer, CommandAnalyzer};
use deepfake_tasks::api::{ApiConfig, api_routes};
use deepfake_tasks::config::ServiceConfig;
use deepfake_tasks::tasks::{JobSubmitter, TaskRegistry, TaskRunner, spawn_retention_sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env();

    eprintln!("🔎 Deepfake Tasks v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/task/<task_id>", config.port);
    eprintln!("   Uploads: {}", config.upload_dir.display());
    eprintln!("   Static: {}", config.static_dir.display());
    eprintln!(
        "   Retention: {}s (sweep every {}s)",
        config.retention.as_secs(),
        config.sweep_interval.as_secs()
    );
    match config.max_concurrent_analyses {
        Some(max) => eprintln!("   Analyses: max {} concurrent", max),
        None => eprintln!("   Analyses: unbounded"),
    }
    for (kind, command) in [
        ("video", &config.analyzers.video),
        ("audio", &config.analyzers.audio),
        ("audio check", &config.analyzers.audio_check),
    ] {
        match command {
            Some(spec) => eprintln!("   Detector ({}): {}", kind, spec.program),
            None => eprintln!("   Detector ({}): not configured", kind),
        }
    }

    // ── Directories ─────────────────────────────────────────────────────
    tokio::fs::create_dir_all(&config.upload_dir)
        .await
        .with_context(|| format!("creating upload dir {}", config.upload_dir.display()))?;
    let spectrogram_dir = config.static_dir.join("spectrograms");
    tokio::fs::create_dir_all(&spectrogram_dir)
        .await
        .with_context(|| format!("creating static dir {}", spectrogram_dir.display()))?;

    // ── Task core ───────────────────────────────────────────────────────
    let registry = Arc::new(TaskRegistry::new());
    let analyzer: Arc<dyn Analyzer> = Arc::new(CommandAnalyzer::new(config.analyzers.clone()));

    let mut runner = TaskRunner::new(Arc::clone(&registry), analyzer);
    if let Some(max) = config.max_concurrent_analyses {
        runner = runner.with_concurrency_limit(max);
    }
    let submitter = JobSubmitter::new(runner, config.upload_dir.clone());

    let _sweeper = spawn_retention_sweeper(
        Arc::clone(&registry),
        config.retention,
        config.sweep_interval,
    );

    // ── HTTP ────────────────────────────────────────────────────────────
    let app = api_routes(submitter, registry, ApiConfig::from(&config));

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    tracing::info!(port = config.port, "Task API started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
