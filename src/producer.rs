//! Periodic frame producer driving the channel

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::channel::FrameChannel;
use crate::source::FrameSource;

/// Periodic producer task: the stand-in for a hardware interrupt source.
///
/// Each period it advances the sequence counter, asks its [`FrameSource`]
/// to fill a reused scratch buffer, stamps the capture instant, and
/// publishes into the channel. The first frame lands one full period after
/// start.
///
/// Stopping is synchronous: once [`stop`](Self::stop) returns, no further
/// publish can occur.
pub struct Producer {
    handle: Option<JoinHandle<u64>>,
    cancel: CancellationToken,
}

impl Producer {
    /// Spawn the producer task.
    pub fn spawn<S>(source: S, channel: Arc<FrameChannel>, period: Duration) -> Self
    where
        S: FrameSource,
    {
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            Self::capture_task(source, channel, period, task_cancel).await
        });

        Self { handle: Some(handle), cancel }
    }

    /// Capture task - fills and publishes one frame per period.
    async fn capture_task<S>(
        mut source: S,
        channel: Arc<FrameChannel>,
        period: Duration,
        cancel: CancellationToken,
    ) -> u64
    where
        S: FrameSource,
    {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // Scratch buffer reused every tick; the publish path never allocates.
        let mut scratch = vec![0u8; channel.frame_size()].into_boxed_slice();
        let mut sequence = 0u64;
        let mut published = 0u64;

        info!(period_ms = period.as_millis() as u64, "producer started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("producer cancelled");
                    break;
                }
                _ = ticker.tick() => {}
            }

            sequence += 1;
            if let Err(e) = source.fill(sequence, &mut scratch).await {
                // One lost tick, never a dead schedule
                warn!(sequence, error = %e, "frame capture failed, skipping tick");
                continue;
            }

            let captured_at = Instant::now();
            if !channel.publish(sequence, captured_at, &scratch) {
                debug!(sequence, "channel closed, stopping producer");
                break;
            }
            published += 1;
            trace!(sequence, bytes = scratch.len(), "frame published");
        }

        info!(published, "producer stopped");
        published
    }

    /// Stop the producer and wait for its task to finish.
    ///
    /// After this returns no further publishes occur. Returns the number of
    /// frames published over the producer's lifetime.
    pub async fn stop(mut self) -> u64 {
        self.cancel.cancel();
        match self.handle.take() {
            Some(handle) => match handle.await {
                Ok(published) => published,
                Err(e) => {
                    warn!(error = %e, "producer task did not shut down cleanly");
                    0
                }
            },
            None => 0,
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        // Best-effort cancellation when dropped without an explicit stop
        self.cancel.cancel();
    }
}
