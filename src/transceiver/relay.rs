//! Interrupt-to-task frame relay.
//!
//! ```text
//!  receive_done ISR ──▶ RawFrame + FrameInfo ──try_send──▶ ┌──────────────┐
//!                       (stack copy, ≤128 B)               │ RxQueue (8)  │──▶ dispatch task
//!  release_rx_buffer ◀── always, exactly once              └──────────────┘
//! ```
//!
//! The producer side never blocks, never allocates and never retries:
//! when the queue is closed or full the frame is counted as dropped.
//! No waker is ever registered on the channel (the consumer polls with
//! `try_receive`), so `try_send` never runs a wake path from interrupt
//! context.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use core::time::Duration;
use std::time::Instant;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use super::Shared;
use crate::error::{Error, Result};
use crate::frame::{FrameCodec, MAX_FRAME_LEN};
use crate::radio::{FrameInfo, RadioDriver};

/// Receive queue depth. Fixed at compile time; the queue never grows.
pub const RX_QUEUE_DEPTH: usize = 8;

/// Sleep granularity of the consumer's bounded dequeue.
const POLL_SLICE: Duration = Duration::from_millis(1);

/// A received PHY buffer, copied out of the driver's receive buffer.
#[derive(Clone, Copy)]
pub struct RawFrame {
    bytes: [u8; MAX_FRAME_LEN],
    len: u8,
}

impl RawFrame {
    /// Copy PHR + MPDU. The length comes from byte 0, clamped to both the
    /// input and the 128-byte buffer.
    pub fn copy_from(raw: &[u8]) -> Self {
        let mut bytes = [0u8; MAX_FRAME_LEN];
        let len = raw
            .first()
            .map_or(0, |&phr| (phr as usize + 1).min(MAX_FRAME_LEN).min(raw.len()));
        bytes[..len].copy_from_slice(&raw[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// One queue element: a raw frame and the metadata it arrived with.
#[derive(Clone, Copy)]
pub struct QueueSlot {
    pub frame: RawFrame,
    pub info: FrameInfo,
}

/// Receive path counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelayStats {
    /// Frames accepted into the queue.
    pub received: u32,
    /// Frames dropped because the queue was closed or full.
    pub dropped: u32,
    /// Dequeued frames the codec rejected.
    pub decode_failures: u32,
}

pub(crate) struct RxQueue {
    slots: Channel<CriticalSectionRawMutex, QueueSlot, RX_QUEUE_DEPTH>,
    open: AtomicBool,
    received: AtomicU32,
    dropped: AtomicU32,
    decode_failures: AtomicU32,
}

impl RxQueue {
    pub(super) const fn new() -> Self {
        Self {
            slots: Channel::new(),
            open: AtomicBool::new(false),
            received: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            decode_failures: AtomicU32::new(0),
        }
    }

    pub(super) fn open(&self) {
        self.drain();
        self.open.store(true, Ordering::Release);
    }

    /// Stop accepting frames and discard anything still queued.
    pub(super) fn close(&self) {
        self.open.store(false, Ordering::Release);
        self.drain();
    }

    pub(super) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Non-blocking enqueue. Interrupt context.
    pub(super) fn push(&self, raw: &[u8], info: &FrameInfo) -> Result<()> {
        if !self.is_open() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(Error::QueueFull);
        }
        let slot = QueueSlot {
            frame: RawFrame::copy_from(raw),
            info: *info,
        };
        if self.slots.try_send(slot).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return Err(Error::QueueFull);
        }
        self.received.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Dequeue with a bounded wait. Task context.
    pub(super) fn recv_timeout(&self, timeout: Duration) -> Option<QueueSlot> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(slot) = self.slots.try_receive() {
                return Some(slot);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep(POLL_SLICE.min(deadline - now));
        }
    }

    pub(super) fn note_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn stats(&self) -> RelayStats {
        RelayStats {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }

    fn drain(&self) {
        while self.slots.try_receive().is_ok() {}
    }
}

impl<R: RadioDriver, C: FrameCodec> Shared<R, C> {
    /// Move one received frame out of interrupt context.
    ///
    /// The driver's receive buffer is released on every path, whether or
    /// not the frame was queued.
    pub(super) fn relay(&self, raw: &[u8], info: &FrameInfo) -> Result<()> {
        let queued = self.rx.push(raw, info);
        self.radio.release_rx_buffer(raw);
        queued
    }
}
