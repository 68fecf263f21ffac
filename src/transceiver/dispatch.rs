//! Receive dispatch task.
//!
//! Drains the receive queue, decodes each raw frame and hands the result to
//! the registered callback. Runs on its own thread so the callback may block
//! or call back into the transceiver (including `transmit`).

use core::sync::atomic::Ordering;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use log::{debug, info, warn};

use super::Shared;
use super::relay::QueueSlot;
use crate::error::Error;
use crate::frame::{FrameCodec, HexDump};
use crate::radio::{FrameInfo, RadioDriver};

/// Receive callback: decoded frame plus its radio metadata.
pub type RxCallback<F> = Box<dyn FnMut(&F, &FrameInfo) + Send>;

/// Holds the registered callback.
///
/// The callback is taken out of the slot while it runs so the lock is never
/// held across user code. `generation` bumps on every registration; a
/// callback is only put back if no registration happened meanwhile.
pub(crate) struct CallbackSlot<F> {
    inner: Mutex<SlotInner<F>>,
}

struct SlotInner<F> {
    callback: Option<RxCallback<F>>,
    generation: u64,
}

impl<F> CallbackSlot<F> {
    pub(super) const fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                callback: None,
                generation: 0,
            }),
        }
    }

    /// Install (or clear) the callback. Returns the previous one so it is
    /// dropped outside the lock.
    pub(super) fn replace(&self, callback: Option<RxCallback<F>>) -> Option<RxCallback<F>> {
        let mut inner = self.lock();
        inner.generation = inner.generation.wrapping_add(1);
        core::mem::replace(&mut inner.callback, callback)
    }

    #[cfg(test)]
    fn is_set(&self) -> bool {
        self.lock().callback.is_some()
    }

    fn take(&self) -> Option<(RxCallback<F>, u64)> {
        let mut inner = self.lock();
        let generation = inner.generation;
        inner.callback.take().map(|cb| (cb, generation))
    }

    fn restore(&self, callback: RxCallback<F>, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation && inner.callback.is_none() {
            inner.callback = Some(callback);
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotInner<F>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: RadioDriver, C: FrameCodec> Shared<R, C> {
    /// Decode one queued frame and deliver it. Returns `true` if the
    /// callback ran.
    pub(super) fn dispatch(&self, slot: &QueueSlot) -> bool {
        let frame = match self.codec.decode(slot.frame.as_bytes()) {
            Ok(frame) => frame,
            Err(e) => {
                self.rx.note_decode_failure();
                warn!(
                    "transceiver: {} ({} bytes, ch {}): {}",
                    Error::DecodeFailed(e),
                    slot.frame.len(),
                    slot.info.channel,
                    HexDump(slot.frame.as_bytes())
                );
                return false;
            }
        };

        let Some((mut callback, generation)) = self.callback.take() else {
            debug!("transceiver: no receive callback, frame discarded");
            return false;
        };
        callback(&frame, &slot.info);
        self.callback.restore(callback, generation);
        true
    }
}

/// Dispatch task body. Returns once `running` is cleared.
pub(super) fn run<R: RadioDriver, C: FrameCodec>(shared: &Shared<R, C>) {
    let poll = shared.config.rx_poll_interval();
    let mut reported_drops = shared.rx.stats().dropped;
    info!("transceiver: receive dispatch running (poll {:?})", poll);

    while shared.running.load(Ordering::Acquire) {
        let dropped = shared.rx.stats().dropped;
        if dropped != reported_drops {
            warn!(
                "transceiver: {} frame(s) dropped (queue full or closed)",
                dropped.wrapping_sub(reported_drops)
            );
            reported_drops = dropped;
        }

        let Some(slot) = shared.rx.recv_timeout(poll) else {
            continue;
        };
        shared.dispatch(&slot);
        thread::yield_now();
    }

    info!("transceiver: receive dispatch stopped");
}
