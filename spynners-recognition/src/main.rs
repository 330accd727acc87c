//! spynners-recognition - audio track recognition service
//!
//! Identifies short audio samples with an external fingerprint service and
//! links them to the SPYNNERS track catalog.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spynners_common::config::{load_toml_config, CONFIG_ENV_VAR};
use spynners_recognition::config::{RecognitionConfig, CONFIG_FILE_NAME};
use spynners_recognition::db::{self, SqliteHistoryStore};
use spynners_recognition::services::{
    AudioTranscoder, CatalogClient, CatalogMatcher, FingerprintClient, RecognitionOrchestrator,
};
use spynners_recognition::AppState;

/// Command-line arguments for spynners-recognition
#[derive(Parser, Debug)]
#[command(name = "spynners-recognition")]
#[command(about = "Audio track recognition service for SPYNNERS")]
#[command(version)]
struct Args {
    /// Path to recognition.toml
    #[arg(short, long, env = CONFIG_ENV_VAR)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "SPYNNERS_PORT")]
    port: Option<u16>,

    /// SQLite database path (overrides config)
    #[arg(short, long, env = "SPYNNERS_DATABASE")]
    database: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, config_path) =
        load_toml_config::<RecognitionConfig>(args.config.as_deref(), CONFIG_FILE_NAME)
            .context("Failed to load configuration")?;
    config.apply_env_overrides();
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(database) = args.database {
        config.database.path = database;
    }

    // Initialize tracing; RUST_LOG wins over the configured level
    let default_filter = config.logging.filter_directive(&[
        "spynners_recognition",
        "spynners_common",
        "tower_http",
    ]);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting spynners-recognition v{}", env!("CARGO_PKG_VERSION"));
    match &config_path {
        Some(path) => info!("Config file: {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    let credentials = config.resolve_fingerprint_credentials();
    if credentials.is_none() {
        warn!("Recognition endpoints will answer 503 until fingerprint credentials are set");
    }

    info!("Database: {}", config.database.path.display());
    let pool = db::init_database_pool(&config.database.path)
        .await
        .context("Failed to initialize database")?;
    let history = Arc::new(SqliteHistoryStore::new(pool));

    let transcoder = Arc::new(AudioTranscoder::new(&config.transcoder));
    let fingerprint = Arc::new(
        FingerprintClient::new(&config.fingerprint, credentials)
            .context("Failed to build fingerprint client")?,
    );
    let catalog = Arc::new(
        CatalogClient::new(&config.catalog).context("Failed to build catalog client")?,
    );
    let matcher = Arc::new(CatalogMatcher::new(catalog.clone(), &config.matching));

    let orchestrator = Arc::new(RecognitionOrchestrator::new(
        transcoder.clone(),
        fingerprint,
        matcher,
        catalog,
        history.clone(),
        &config.batch,
    ));

    let state = AppState::new(orchestrator, transcoder, history);
    let app = spynners_recognition::build_router(state, config.server.max_body_bytes);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/api/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
