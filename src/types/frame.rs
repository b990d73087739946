//! Frame type for the capture pipeline

use std::sync::Arc;
use std::time::Instant;

/// One captured frame.
///
/// This is the fundamental data unit that flows through the system: an
/// opaque fixed-size payload stamped by the producer. The payload is shared
/// zero-copy via `Arc`, so cloning a frame is cheap.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw frame payload, exactly one frame size long.
    pub data: Arc<[u8]>,

    /// Monotonic frame counter, producer-owned.
    pub sequence: u64,

    /// Monotonic clock reading taken by the producer at capture time.
    pub captured_at: Instant,
}

impl Frame {
    /// Create a new frame.
    pub fn new(data: Vec<u8>, sequence: u64, captured_at: Instant) -> Self {
        Self { data: data.into(), sequence, captured_at }
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clone_shares_the_payload() {
        let frame = Frame::new(vec![1, 2, 3], 7, Instant::now());
        let copy = frame.clone();

        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
        assert_eq!(copy.sequence, 7);
        // Zero-copy: both frames point at the same allocation
        assert!(Arc::ptr_eq(&frame.data, &copy.data));
    }
}
