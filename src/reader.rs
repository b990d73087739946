//! Consumer-facing reader over the frame channel

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use crate::channel::{ClaimError, FrameChannel, TryClaimError};
use crate::types::Frame;

/// Cloneable consumer handle over a [`FrameChannel`].
///
/// Any number of readers may exist; a claim clears the slot, so at most one
/// reader obtains a given published frame. That exclusivity is a property of
/// the channel, not an artifact of this handle.
#[derive(Debug, Clone)]
pub struct FrameReader {
    channel: Arc<FrameChannel>,
}

impl FrameReader {
    /// Create a reader over `channel`.
    pub fn new(channel: Arc<FrameChannel>) -> Self {
        Self { channel }
    }

    /// Block until a frame is claimed, the timeout elapses, or the channel
    /// closes. `None` waits forever.
    ///
    /// [`ClaimError::Timeout`] is a "no data yet" signal - retry.
    /// [`ClaimError::Closed`] is terminal - do not retry.
    pub async fn read_blocking(&self, timeout: Option<Duration>) -> Result<Frame, ClaimError> {
        self.channel.wait_and_claim(timeout).await
    }

    /// Claim a frame without blocking. [`TryClaimError::Empty`] is the
    /// would-block signal.
    pub fn read_nonblocking(&self) -> Result<Frame, TryClaimError> {
        self.channel.try_claim()
    }

    /// Non-blocking readiness check, without consuming the frame.
    pub fn poll_ready(&self) -> bool {
        self.channel.poll_ready()
    }

    /// Stream of claimed frames.
    ///
    /// Each publish wakes the stream, which then claims whatever is in the
    /// slot. Latest-wins applies: frames overwritten between polls are never
    /// yielded, and a frame claimed by a competing reader is simply skipped.
    /// The stream ends when the channel closes.
    pub fn frames(&self) -> impl Stream<Item = Frame> + 'static {
        let reader = self.clone();
        WatchStream::from_changes(self.channel.publish_events())
            .map(move |_| reader.read_nonblocking())
            .take_while(|claim| {
                // A Closed claim means the wake was the close signal
                let open = !matches!(claim, Err(TryClaimError::Closed));
                async move { open }
            })
            .filter_map(|claim| async move { claim.ok() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const FRAME_SIZE: usize = 32;

    fn pair() -> (Arc<FrameChannel>, FrameReader) {
        let channel = Arc::new(FrameChannel::new(FRAME_SIZE));
        let reader = FrameReader::new(Arc::clone(&channel));
        (channel, reader)
    }

    #[tokio::test]
    async fn nonblocking_read_surfaces_would_block() {
        let (channel, reader) = pair();
        assert_eq!(reader.read_nonblocking().unwrap_err(), TryClaimError::Empty);

        channel.publish(1, Instant::now(), &[9u8; FRAME_SIZE]);
        assert!(reader.poll_ready());
        assert_eq!(reader.read_nonblocking().unwrap().sequence, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn frame_stream_yields_publishes_and_ends_on_close() {
        let (channel, reader) = pair();
        let mut stream = Box::pin(reader.frames());

        let publisher = {
            let channel = Arc::clone(&channel);
            tokio::spawn(async move {
                for sequence in 1..=3u64 {
                    channel.publish(sequence, Instant::now(), &[sequence as u8; FRAME_SIZE]);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                }
                channel.close();
            })
        };

        let mut sequences = Vec::new();
        while let Some(frame) =
            tokio::time::timeout(Duration::from_secs(1), stream.next()).await.expect("stream stuck")
        {
            sequences.push(frame.sequence);
        }

        publisher.await.expect("publisher must not panic");
        // Slow enough pacing that nothing is overwritten: all three arrive,
        // in publish order, and the stream terminated on close.
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn blocking_read_reports_closed_channel() {
        let (channel, reader) = pair();
        channel.close();
        assert_eq!(reader.read_blocking(None).await.unwrap_err(), ClaimError::Closed);
        assert_eq!(reader.read_nonblocking().unwrap_err(), TryClaimError::Closed);
    }
}
