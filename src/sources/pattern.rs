//! Synthetic test-pattern source

use crate::source::FrameSource;
use crate::{Result, StreamError};

/// Bytes per pixel for the RAW12-as-16-bit pattern.
const BYTES_PER_PIXEL: usize = 2;

/// Synthetic gradient source standing in for a real sensor.
///
/// Produces 12-bit RAW values stored as little-endian 16-bit pixels: a
/// gradient from top-left (dark) to bottom-right (bright), shifted by the
/// sequence number so every frame differs. Deterministic per sequence and
/// allocation-free on the fill path.
#[derive(Debug, Clone)]
pub struct TestPattern {
    width: usize,
    height: usize,
}

impl TestPattern {
    /// Create a pattern source for `width` x `height` frames.
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Pixel value at `(row, col)` for a given sequence. 12-bit range.
    fn pixel(&self, sequence: u64, row: usize, col: usize) -> u16 {
        (((row + col) as u64 + sequence * 10) * 16 % 4096) as u16
    }
}

#[async_trait::async_trait]
impl FrameSource for TestPattern {
    fn frame_size(&self) -> usize {
        self.width * self.height * BYTES_PER_PIXEL
    }

    async fn fill(&mut self, sequence: u64, buf: &mut [u8]) -> Result<()> {
        if buf.len() != self.frame_size() {
            return Err(StreamError::source(format!(
                "buffer holds {} bytes but the pattern needs {}",
                buf.len(),
                self.frame_size()
            )));
        }

        for row in 0..self.height {
            for col in 0..self.width {
                let at = (row * self.width + col) * BYTES_PER_PIXEL;
                buf[at..at + BYTES_PER_PIXEL]
                    .copy_from_slice(&self.pixel(sequence, row, col).to_le_bytes());
            }
        }
        Ok(())
    }
}
