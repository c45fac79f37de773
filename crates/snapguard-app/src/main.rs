//! Snapguard application binary - composition root.
//!
//! Ties together all Snapguard crates into a single executable:
//! 1. Load configuration from TOML
//! 2. Open storage (SQLite) and the managed screenshot directory
//! 3. Build the upload chain from configured backends
//! 4. Start the directory watcher and the lifecycle orchestrator
//! 5. Start the retention scheduler
//! 6. Start the axum REST API server

mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use snapguard_api::{routes, AppState};
use snapguard_classify::{Classifier, EngineInvoker};
use snapguard_core::config::SnapguardConfig;
use snapguard_core::rules::load_rules;
use snapguard_pipeline::{Orchestrator, PipelineSettings};
use snapguard_retention::RetentionScheduler;
use snapguard_storage::{Database, ScanRepository};
use snapguard_upload::{CloudinaryBackend, ImgurBackend, UploadChain};
use snapguard_watch::DirectoryWatcher;

/// Expand a leading ~ to the home directory.
fn resolve_path(path: &str) -> PathBuf {
    if path.starts_with("~/") || path.starts_with("~\\") {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&path[2..])
    } else {
        PathBuf::from(path)
    }
}

/// Build the upload chain from the backends that carry credentials.
fn build_upload_chain(config: &SnapguardConfig) -> UploadChain {
    let mut chain = UploadChain::new();
    if let Some(cloudinary) = &config.upload.cloudinary {
        if !cloudinary.cloud_name.is_empty() {
            tracing::info!("Upload backend enabled: cloudinary");
            chain = chain.with_backend(Box::new(CloudinaryBackend::new(cloudinary.clone())));
        }
    }
    if let Some(imgur) = &config.upload.imgur {
        if !imgur.client_id.is_empty() {
            tracing::info!("Upload backend enabled: imgur");
            chain = chain.with_backend(Box::new(ImgurBackend::new(imgur.clone())));
        }
    }
    if chain.is_empty() {
        tracing::warn!("No upload backends configured, all scans will use local URLs");
    }
    chain
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();

    // Config first; the log level may come from it.
    let config_file = args.resolve_config_path();
    let config = SnapguardConfig::load_or_default(&config_file);

    let log_level = args
        .resolve_log_level()
        .unwrap_or_else(|| config.general.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Snapguard v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Storage.
    let data_dir = args
        .data_dir
        .clone()
        .unwrap_or_else(|| resolve_path(&config.general.data_dir));
    std::fs::create_dir_all(&data_dir)?;

    let uploads_dir = data_dir.join("uploads");
    std::fs::create_dir_all(&uploads_dir)?;

    let db_path = data_dir.join("snapguard.db");
    let db = Arc::new(Database::new(&db_path)?);
    let repository = Arc::new(ScanRepository::new(db));
    tracing::info!(path = %db_path.display(), "SQLite database opened");

    // Classification engine.
    let staging_dir = resolve_path(&config.classify.staging_dir);
    std::fs::create_dir_all(&staging_dir)?;
    let classifier: Arc<dyn Classifier> =
        Arc::new(EngineInvoker::new(&config.classify, staging_dir));

    // Rules snapshot for all scans opened by this process.
    let rules_text = load_rules(
        config
            .rules
            .rules_file
            .as_ref()
            .map(|p| resolve_path(p))
            .as_deref(),
    );

    // Lifecycle orchestrator.
    let settings = PipelineSettings {
        storage_dir: uploads_dir.clone(),
        fallback_host: config.upload.fallback_host.clone(),
        rules_text,
        quiet_period: Duration::from_millis(config.watch.quiet_period_ms),
        stability_checks: config.watch.stability_checks,
        dedup_capacity: config.watch.dedup_capacity,
        dedup_ttl: Duration::from_secs(config.watch.dedup_ttl_secs),
    };
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::clone(&repository),
        build_upload_chain(&config),
        classifier,
        settings,
    ));

    // Directory watcher feeding the orchestrator.
    let watch_dirs: Vec<PathBuf> = if args.watch_dirs.is_empty() {
        config
            .watch
            .directories
            .iter()
            .map(|d| resolve_path(d))
            .collect()
    } else {
        args.watch_dirs.clone()
    };
    let watcher = DirectoryWatcher::new(
        watch_dirs,
        Duration::from_secs(config.watch.poll_interval_secs),
    );

    let (detect_tx, detect_rx) = tokio::sync::mpsc::channel::<PathBuf>(256);
    tokio::spawn(watcher.run(detect_tx));
    tokio::spawn(Arc::clone(&orchestrator).run(detect_rx));

    // Retention scheduler.
    let scheduler = Arc::new(RetentionScheduler::new(
        Arc::clone(&repository),
        Duration::from_secs(config.retention.sweep_interval_secs),
    ));
    {
        let scheduler = Arc::clone(&scheduler);
        tokio::spawn(async move { scheduler.run().await });
    }

    // API server.
    let port = args.resolve_port(config.general.port);
    let state = AppState::new(Arc::clone(&repository), uploads_dir);
    routes::start_server(port, state).await?;

    Ok(())
}
