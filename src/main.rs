use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tumorseg::config::Cli;
use tumorseg::server::{self, AppState};
use tumorseg::{OnnxSegmenter, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tumorseg=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.pipeline_config().context("invalid configuration")?;

    let slices = config.resample.slices;
    let model_path = cli.model.clone();
    let model = tokio::task::spawn_blocking(move || OnnxSegmenter::load(&model_path, slices))
        .await?
        .with_context(|| format!("failed to load model from {}", cli.model.display()))?;
    tracing::info!(path = %model.path().display(), "model loaded");

    let pipeline = Pipeline::new(Arc::new(model), config);
    let config = pipeline.config();
    tracing::info!(
        threshold = config.extractor.threshold,
        connectivity = %config.extractor.connectivity,
        mask_mode = %config.extractor.mask_mode,
        interpolation = %config.resample.interpolation,
        overlay_slice = config.overlay_slice,
        "pipeline configured"
    );
    let state = AppState::new(pipeline);
    let app = server::router(state, cli.max_upload_bytes());

    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;
    tracing::info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::warn!("failed to listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!("failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
