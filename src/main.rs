//! DocForge Server: document and image conversion over HTTP
//!
//! Main entry point that wires the crates together and starts the server.

use std::sync::Arc;

use tracing_subscriber::{EnvFilter, fmt};

use docforge_api::AppState;
use docforge_converter::{ConversionExecutor, ConversionMetrics, JobOrchestrator, ProfileRegistry};
use docforge_core::config::AppConfig;
use docforge_core::AppResult;
use docforge_core::error::AppError;

#[tokio::main]
async fn main() {
    let env = std::env::var("DOCFORGE_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!("Configuration loaded (env: {})", env);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Main server run function
async fn run(config: AppConfig) -> AppResult<()> {
    tracing::info!("Starting DocForge v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Scratch directory ────────────────────────────────
    let scratch_dir = config.conversion.effective_scratch_dir();
    tokio::fs::create_dir_all(&scratch_dir).await.map_err(|e| {
        AppError::internal(format!(
            "Failed to create scratch dir '{}': {}",
            scratch_dir.display(),
            e
        ))
    })?;
    let scratch_dir = tokio::fs::canonicalize(&scratch_dir).await?;
    tracing::info!("Scratch directory: {}", scratch_dir.display());

    // ── Step 2: Converter registry ───────────────────────────────
    let registry = ProfileRegistry::from_config(&config.conversion);
    tracing::info!(
        operations = ?registry.operations().iter().map(|op| op.id()).collect::<Vec<_>>(),
        "Converter registry initialized"
    );

    // ── Step 3: Converter availability ───────────────────────────
    for program in registry.programs() {
        if ConversionExecutor::check_command_available(&program).await {
            tracing::info!(program = %program, "Converter available");
        } else {
            tracing::warn!(
                program = %program,
                "Converter not found; operations using it will fail"
            );
        }
    }

    // ── Step 4: Orchestrator ─────────────────────────────────────
    let executor = ConversionExecutor::new(&config.conversion);
    if config.conversion.timeout_seconds.is_none() {
        tracing::warn!("No converter timeout configured; a hung converter blocks its request");
    }
    let orchestrator = Arc::new(JobOrchestrator::new(
        Arc::new(registry),
        executor,
        scratch_dir,
        Arc::new(ConversionMetrics::new()),
    ));

    // ── Step 5: Build and start HTTP server ──────────────────────
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = docforge_api::build_router(AppState::new(Arc::new(config), orchestrator));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("DocForge server listening on {}", addr);

    // ── Step 6: Graceful shutdown ────────────────────────────────
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, draining in-flight requests...");
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    tracing::info!("DocForge server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
