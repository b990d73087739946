//! Frame source trait for capture collaborators

use crate::Result;

/// Trait for frame-producing devices.
///
/// A source stands in for the capture hardware behind the pipeline: each
/// tick the producer asks it to fill the next frame. Implementations must
/// write into the caller-owned buffer and do only bounded work - the fill
/// path runs on the capture schedule, so unbounded latency here delays
/// frames for every consumer.
///
/// A fill failure loses that tick only; the producer logs it and keeps the
/// schedule running.
#[async_trait::async_trait]
pub trait FrameSource: Send + 'static {
    /// Size of the frames this source produces, in bytes.
    fn frame_size(&self) -> usize;

    /// Fill `buf` with the frame for `sequence`.
    ///
    /// `buf` is exactly [`frame_size`](Self::frame_size) bytes and is reused
    /// across ticks; the implementation must overwrite it fully.
    async fn fill(&mut self, sequence: u64, buf: &mut [u8]) -> Result<()>;
}
