//! Single-slot frame channel with latest-wins delivery.
//!
//! The channel owns exactly one frame slot plus a ready flag. A producer
//! overwrites the slot on every publish; consumers claim the slot and clear
//! the flag. An unread frame is worthless once a fresher one exists, so the
//! channel never queues - publishing over an unclaimed frame discards it.
//!
//! ## Wakeup protocol
//!
//! The classic bug in this pattern is the check-then-sleep race: a consumer
//! observes "not ready", a publish lands, and the consumer goes to sleep
//! having missed its wakeup. Here the wake primitive is a
//! [`tokio::sync::watch`] publish counter, and [`FrameChannel::wait_and_claim`]
//! snapshots the counter *before* re-checking the slot. A publish that races
//! with the check advances the counter, so the subsequent `changed()` await
//! completes immediately instead of sleeping forever.
//!
//! ## Publish context
//!
//! `publish` models an interrupt-context hand-off: it performs one bounded
//! copy into a pre-allocated slot buffer under a short mutex section and one
//! counter bump. No allocation, no unbounded blocking, no await.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::watch;

use crate::types::Frame;

/// Outcome of a blocking claim that did not produce a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimError {
    /// The timeout elapsed before a frame was published. Retryable.
    #[error("timed out waiting for a frame")]
    Timeout,

    /// The channel was closed. Terminal, do not retry.
    #[error("frame channel is closed")]
    Closed,
}

/// Outcome of a non-blocking claim that did not produce a frame.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryClaimError {
    /// No unclaimed frame in the slot right now. The would-block signal.
    #[error("no frame available")]
    Empty,

    /// The channel was closed. Terminal, do not retry.
    #[error("frame channel is closed")]
    Closed,
}

struct Slot {
    buf: Box<[u8]>,
    sequence: u64,
    captured_at: Instant,
    ready: bool,
    closed: bool,
}

impl Slot {
    /// Copy the slot out and clear the ready flag. Caller checked `ready`.
    fn take_frame(&mut self) -> Frame {
        self.ready = false;
        Frame { data: (&self.buf[..]).into(), sequence: self.sequence, captured_at: self.captured_at }
    }
}

/// Shared single-slot hand-off point between one producer and any number of
/// consumers.
///
/// At most one unread frame is held at a time; `ready` is true iff the slot
/// holds a frame no consumer has claimed yet. All slot access goes through
/// [`publish`](Self::publish), [`poll_ready`](Self::poll_ready),
/// [`wait_and_claim`](Self::wait_and_claim), [`try_claim`](Self::try_claim),
/// and [`close`](Self::close).
pub struct FrameChannel {
    state: Mutex<Slot>,
    /// Publish counter; bumped on every publish and on close. Waking is a
    /// side effect of the bump - every subscribed waiter observes it.
    publishes: watch::Sender<u64>,
    frame_size: usize,
}

impl FrameChannel {
    /// Create a channel with a pre-allocated slot for `frame_size` byte
    /// frames.
    pub fn new(frame_size: usize) -> Self {
        let (publishes, _) = watch::channel(0);
        Self {
            state: Mutex::new(Slot {
                buf: vec![0u8; frame_size].into_boxed_slice(),
                sequence: 0,
                captured_at: Instant::now(),
                ready: false,
                closed: false,
            }),
            publishes,
            frame_size,
        }
    }

    /// Size of one frame in bytes.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    // The mutex guards only bounded copies; a poisoned lock means a panic
    // mid-copy, and the slot is still structurally valid for overwriting.
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a frame: overwrite the slot, set `ready`, wake every waiter.
    ///
    /// Latest-wins: an unclaimed frame already in the slot is discarded.
    /// Returns `false` if the channel is closed; the frame is dropped.
    ///
    /// # Panics
    ///
    /// Panics if `payload.len() != frame_size`. The producer's scratch
    /// buffer and the slot are sized from the same configuration, so this
    /// is a programming-contract violation, not a runtime condition.
    pub fn publish(&self, sequence: u64, captured_at: Instant, payload: &[u8]) -> bool {
        {
            let mut slot = self.slot();
            if slot.closed {
                return false;
            }
            slot.buf.copy_from_slice(payload);
            slot.sequence = sequence;
            slot.captured_at = captured_at;
            slot.ready = true;
        }
        // Bump outside the lock; waiters re-check the slot on wake anyway.
        self.publishes.send_modify(|n| *n = n.wrapping_add(1));
        true
    }

    /// Non-blocking readiness check: is there an unclaimed frame?
    ///
    /// Returns `false` once the channel is closed. A publish landing between
    /// a `false` result and a subsequent [`wait_and_claim`](Self::wait_and_claim)
    /// is never lost: the blocking path re-checks the slot after registering
    /// for wakeups.
    pub fn poll_ready(&self) -> bool {
        let slot = self.slot();
        slot.ready && !slot.closed
    }

    /// Block until a frame can be claimed, the timeout elapses, or the
    /// channel closes. `None` means wait forever.
    ///
    /// On success the frame is copied out and the slot cleared: exactly one
    /// concurrent claimant wins per publish, the rest re-wait. The calling
    /// task is genuinely suspended while waiting, never spinning.
    pub async fn wait_and_claim(&self, timeout: Option<Duration>) -> Result<Frame, ClaimError> {
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        let mut publishes = self.publishes.subscribe();

        loop {
            // Mark the current publish count seen BEFORE inspecting the
            // slot: a publish racing with the check below advances the
            // counter, and the changed() await then returns immediately.
            publishes.borrow_and_update();

            {
                let mut slot = self.slot();
                if slot.closed {
                    return Err(ClaimError::Closed);
                }
                if slot.ready {
                    return Ok(slot.take_frame());
                }
            }

            let changed = publishes.changed();
            let result = match deadline {
                Some(at) => match tokio::time::timeout_at(at, changed).await {
                    Ok(result) => result,
                    Err(_) => return Err(ClaimError::Timeout),
                },
                None => changed.await,
            };
            if result.is_err() {
                // Sender dropped, channel is gone
                return Err(ClaimError::Closed);
            }
        }
    }

    /// Non-blocking claim. Returns [`TryClaimError::Empty`] as the
    /// would-block signal when no frame is ready.
    pub fn try_claim(&self) -> Result<Frame, TryClaimError> {
        let mut slot = self.slot();
        if slot.closed {
            return Err(TryClaimError::Closed);
        }
        if slot.ready {
            return Ok(slot.take_frame());
        }
        Err(TryClaimError::Empty)
    }

    /// Close the channel permanently and wake all waiters with
    /// [`ClaimError::Closed`]. Idempotent. Publishes after close are
    /// dropped; claims after close fail fast.
    pub fn close(&self) {
        {
            let mut slot = self.slot();
            if slot.closed {
                return;
            }
            slot.closed = true;
        }
        self.publishes.send_modify(|n| *n = n.wrapping_add(1));
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.slot().closed
    }

    /// Receiver on the publish counter, for stream adapters.
    pub(crate) fn publish_events(&self) -> watch::Receiver<u64> {
        self.publishes.subscribe()
    }
}

impl std::fmt::Debug for FrameChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot();
        f.debug_struct("FrameChannel")
            .field("frame_size", &self.frame_size)
            .field("sequence", &slot.sequence)
            .field("ready", &slot.ready)
            .field("closed", &slot.closed)
            .finish()
    }
}
