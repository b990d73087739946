//! Event-driven frame capture channel with TCP streaming.
//!
//! Framewire models a live camera feed: a periodic producer publishes
//! fixed-size frames into a single-slot channel with latest-wins delivery,
//! consumers claim frames through blocking, non-blocking, and stream
//! interfaces, and a forwarder drains the channel to a TCP peer.
//!
//! # Features
//!
//! - **Single-slot channel**: at most one unread frame; a fresh frame
//!   overwrites a stale one, never queues behind it
//! - **Race-free wakeups**: readiness registration and slot checks are
//!   ordered so a publish can never slip between "check" and "sleep"
//! - **Claim exclusivity**: one winner per publish, no matter how many
//!   readers race
//! - **Lossless transport**: the forwarder retries partial writes until
//!   every frame byte is on the wire
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use framewire::{CaptureConfig, FrameServer, Framewire};
//!
//! #[tokio::main]
//! async fn main() -> framewire::Result<()> {
//!     let config = CaptureConfig::default();
//!     let pipeline = Framewire::start(config.clone())?;
//!
//!     let server = FrameServer::bind(&config, pipeline.reader()).await?;
//!     let sent = server.run().await?;
//!     println!("streamed {sent} frames");
//!
//!     pipeline.shutdown().await;
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use tracing::{debug, info};

// Core types and error handling
pub mod config;
mod error;
pub mod types;

// Capture pipeline
pub mod channel;
pub mod producer;
pub mod reader;
pub mod source;
pub mod sources;

// Network forwarding
pub mod net;

// Core exports
pub use channel::{ClaimError, FrameChannel, TryClaimError};
pub use config::CaptureConfig;
pub use error::{Result, StreamError};
pub use types::Frame;

// Pipeline exports
pub use producer::Producer;
pub use reader::FrameReader;
pub use source::FrameSource;
pub use sources::TestPattern;

// Network exports
pub use net::{FrameServer, PeerSession};

/// Unified entry point for capture pipelines.
///
/// # Examples
///
/// ## Built-in test pattern
/// ```rust,no_run
/// use framewire::{CaptureConfig, Framewire};
///
/// # fn main() -> framewire::Result<()> {
/// # let rt = tokio::runtime::Runtime::new().unwrap();
/// # rt.block_on(async {
/// let pipeline = Framewire::start(CaptureConfig::default())?;
/// let reader = pipeline.reader();
/// # Ok(())
/// # })
/// # }
/// ```
///
/// ## Custom frame source
/// ```rust,ignore
/// let pipeline = Framewire::start_with_source(config, MySensor::open()?)?;
/// ```
pub struct Framewire;

impl Framewire {
    /// Start a capture pipeline fed by the built-in [`TestPattern`] source.
    ///
    /// Must be called within a tokio runtime; the producer task is spawned
    /// immediately and the first frame lands one period later.
    pub fn start(config: CaptureConfig) -> Result<Pipeline> {
        let source = TestPattern::new(config.frame_width, config.frame_height);
        Self::start_with_source(config, source)
    }

    /// Start a capture pipeline fed by a custom [`FrameSource`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the config is degenerate or the
    /// source's frame size does not match the channel slot.
    pub fn start_with_source<S>(config: CaptureConfig, source: S) -> Result<Pipeline>
    where
        S: FrameSource,
    {
        config.validate()?;
        if source.frame_size() != config.frame_size() {
            return Err(StreamError::config(format!(
                "source produces {} byte frames but the channel slot holds {}",
                source.frame_size(),
                config.frame_size()
            )));
        }

        let channel = Arc::new(FrameChannel::new(config.frame_size()));
        let producer = Producer::spawn(source, Arc::clone(&channel), config.period());

        info!(
            frame_size = config.frame_size(),
            period_ms = config.period_ms,
            "capture pipeline started"
        );

        Ok(Pipeline { channel, producer: Some(producer) })
    }
}

/// A running capture pipeline: the channel and the producer feeding it.
///
/// The pipeline exclusively owns both; everything else holds readers.
/// Lifecycle is construct, run, [`shutdown`](Self::shutdown) - stopping the
/// producer first, then closing the channel so blocked readers wake with
/// `Closed` rather than hanging.
pub struct Pipeline {
    channel: Arc<FrameChannel>,
    producer: Option<Producer>,
}

impl Pipeline {
    /// Hand out a new reader over the pipeline's channel.
    pub fn reader(&self) -> FrameReader {
        FrameReader::new(Arc::clone(&self.channel))
    }

    /// The underlying channel.
    pub fn channel(&self) -> &Arc<FrameChannel> {
        &self.channel
    }

    /// Stop the producer, then close the channel. Returns the number of
    /// frames published over the pipeline's lifetime.
    pub async fn shutdown(mut self) -> u64 {
        let published = match self.producer.take() {
            Some(producer) => producer.stop().await,
            None => 0,
        };
        self.channel.close();
        debug!(published, "pipeline shut down");
        published
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Close on drop so readers never hang on an abandoned pipeline;
        // the producer's own Drop cancels its task.
        self.channel.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> CaptureConfig {
        CaptureConfig {
            frame_width: 16,
            frame_height: 8,
            bytes_per_pixel: 2,
            period_ms: 10,
            port: 0,
            frame_limit: 5,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pipeline_produces_and_shuts_down() {
        let pipeline = Framewire::start(test_config()).expect("pipeline should start");
        assert_eq!(pipeline.channel().frame_size(), 16 * 8 * 2);
        let reader = pipeline.reader();

        let frame = reader
            .read_blocking(Some(Duration::from_secs(1)))
            .await
            .expect("a frame within one period");
        assert_eq!(frame.len(), 16 * 8 * 2);

        let published = pipeline.shutdown().await;
        assert!(published >= 1);

        // Shutdown closed the channel: terminal signal, not a hang
        assert_eq!(reader.read_blocking(None).await.unwrap_err(), ClaimError::Closed);
    }

    #[tokio::test]
    async fn mismatched_source_is_rejected() {
        let config = test_config();
        // Pattern sized for different geometry than the channel slot
        let source = TestPattern::new(4, 4);
        let result = Framewire::start_with_source(config, source);
        assert!(matches!(result, Err(StreamError::Config { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_the_pipeline_releases_blocked_readers() {
        let pipeline = Framewire::start(test_config()).expect("pipeline should start");
        let reader = pipeline.reader();

        let blocked = tokio::spawn(async move { reader.read_blocking(None).await });
        // Claim whatever the producer gets out before the drop, then drop
        drop(pipeline);

        let result = tokio::time::timeout(Duration::from_secs(1), blocked)
            .await
            .expect("drop must unblock the reader")
            .expect("reader must not panic");
        // Either the reader won a frame before the close landed, or it
        // observed the close; it must not hang.
        if let Err(e) = result {
            assert_eq!(e, ClaimError::Closed);
        }
    }
}
