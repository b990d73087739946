//! Frame streaming process: capture pipeline plus TCP forwarder.
//!
//! Takes an optional YAML config path as its only argument. Exits non-zero
//! on startup failure (bad config, bind/listen/accept); a lost peer is not
//! fatal - the server keeps accepting until a session completes the
//! configured frame limit.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use framewire::{CaptureConfig, FrameServer, Framewire};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config file {path}"))?;
            CaptureConfig::from_yaml(&raw)
                .with_context(|| format!("failed to parse config file {path}"))?
        }
        None => CaptureConfig::default(),
    };

    info!(
        frame_size = config.frame_size(),
        period_ms = config.period_ms,
        port = config.port,
        frame_limit = config.frame_limit,
        "starting frame streamer"
    );

    let pipeline = Framewire::start(config.clone()).context("failed to start capture pipeline")?;
    let server = FrameServer::bind(&config, pipeline.reader())
        .await
        .context("failed to start frame server")?;

    let sent = server.run().await.context("frame streaming failed")?;
    info!(frames = sent, "streaming complete");

    let published = pipeline.shutdown().await;
    info!(published, "capture pipeline stopped");

    Ok(())
}
