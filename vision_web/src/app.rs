use crate::{
    config::Config,
    overlay::Overlay,
    server::{HttpServer, SharedState},
    storage::MediaStorage,
    telemetry::Metrics,
};
use anyhow::Context;
use std::sync::Arc;
use tokio::{signal, sync::broadcast};
use vision_inference::{DetrModelService, LabelMap, MaskRcnnModelService};

pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let labels = LabelMap::new(&config.labels).map_err(anyhow::Error::msg)?;
    tracing::info!("Loaded {} class labels", labels.num_classes());

    let detector = DetrModelService::new(&config.detection, labels.clone())
        .context("failed to load detection model")?;
    let segmenter = MaskRcnnModelService::new(&config.segmentation, labels)
        .context("failed to load segmentation model")?;

    let state = SharedState {
        detector: Arc::new(detector),
        segmenter: Arc::new(segmenter),
        storage: MediaStorage::new(&config.media.root)?,
        overlay: Arc::new(Overlay::new(&config.render)?),
        metrics: Arc::new(Metrics::new()?),
    };

    let server = HttpServer::new(state, &config).await?;

    let (shutdown_tx, _) = broadcast::channel(1);
    let server_handle = server.run(shutdown_tx.subscribe()).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown.");

    let _ = shutdown_tx.send(());
    server_handle.await??;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
