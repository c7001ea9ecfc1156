//! Markdown to PDF Service
//!
//! Serves the conversion API over HTTP, or converts a single file with
//! `mdpdf convert`.
//!
//! ## Configuration
//!
//! Defaults, then the optional `--config-file` TOML, then environment:
//! - `MDPDF_HOST` / `MDPDF_PORT`: listen address (default: 0.0.0.0:3000)
//! - `MDPDF_SKELETON_PATH`: Typst skeleton template (default: ./exam-template.typ)
//! - `MDPDF_TEMP_DIR`: scratch directory for renders (default: ./temp)
//! - `MDPDF_MAX_FILE_SIZE`: maximum content size in bytes (default: 50 MiB)
//! - `MDPDF_TIMEOUT_DURATION`: render deadline (default: 30s)
//! - `MDPDF_TYPST_BIN`: typst executable (default: typst)
//! - `MDPDF_OTLP_ENDPOINT`: OTLP collector endpoint (telemetry off when unset)
//! - `RUST_LOG`: Log level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use mdpdf_service::{
    cli::{self, CliArgs, Command},
    config::Config,
    converter::TypstCliRenderer,
    http::{build_router, AppState},
    registry::JobRegistry,
    service::ConversionService,
    telemetry,
    template::TemplateSource,
};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    let config = Config::load(args.config_file.as_deref()).context("Failed to load configuration")?;

    telemetry::init_logging(config.log_json);

    if let Some(endpoint) = config.otlp_endpoint.as_deref() {
        if let Err(e) = telemetry::init_telemetry(endpoint) {
            warn!("Failed to initialize telemetry: {}", e);
        }
    }

    let result = match args.command {
        Some(Command::Convert(convert)) => cli::run_convert(convert, &config).await.map(|output| {
            info!("PDF generated successfully: {}", output.display());
        }),
        Some(Command::Serve) | None => serve(config).await,
    };

    telemetry::shutdown_telemetry();
    result
}

async fn serve(config: Config) -> Result<()> {
    info!("Starting markdown to PDF service");

    if let Err(e) = tokio::fs::create_dir_all(&config.temp_dir).await {
        warn!(
            "Could not create temp directory {}: {}",
            config.temp_dir.display(),
            e
        );
    }

    let template = TemplateSource::new(&config.skeleton_path);
    let renderer = TypstCliRenderer::new(&config.typst_bin, template.root_dir(), &config.temp_dir);
    let registry = Arc::new(JobRegistry::new());
    let service = Arc::new(ConversionService::new(
        Arc::new(renderer),
        Arc::clone(&registry),
        template,
        config.limits(),
    ));

    info!(
        "Configuration: template={}, max_file_size={}, timeout={:?}",
        service.template().path().display(),
        config.max_file_size,
        config.timeout_duration
    );

    match service.validate_template().await {
        Ok(()) => info!("Skeleton template validated"),
        Err(e) => warn!("Skeleton template is not usable yet: {}", e),
    }

    let app = build_router(AppState::new(service));
    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Service listening on http://{}", addr);
    info!("Use POST /api/convert-to-pdf to convert markdown to PDF");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(registry))
        .await
        .context("HTTP server failed")?;

    info!("Service shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C and cancels renders that are still running.
async fn shutdown_signal(registry: Arc<JobRegistry>) {
    if let Err(e) = signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }

    let cancelled = registry.cancel_all();
    info!(
        "Received shutdown signal, cancelled {} active conversions",
        cancelled
    );
}
