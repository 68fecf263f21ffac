//! Transmit path, channel control and completion tracking.
//!
//! At most one transmit is in flight. The completion interrupt moves the
//! state `Transmitting → TxComplete` with a compare-exchange, so each
//! transmit is completed exactly once no matter whether the radio or a
//! timed-out waiter gets there first. That transition and the outcome it
//! publishes happen inside one critical section, so a waiter that observes
//! `TxComplete` always sees the matching outcome. The outcome stays
//! readable until the next transmit. The receiver stays idle after a
//! completion until `set_channel` or `resume_listening` re-arms it.

use core::cell::Cell;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use core::time::Duration;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Instant;

use embassy_sync::blocking_mutex::Mutex as CsMutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, error, warn};

use super::{Shared, State, StateCell};
use crate::adapters::time;
use crate::error::{Error, Result};
use crate::frame::{FrameCodec, MAX_FRAME_LEN};
use crate::radio::{Channel, RadioDriver, RadioOp, TxOutcome};

/// Transmit latency, issue to completion interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxLatency {
    /// Most recent sample (µs).
    pub last_us: u32,
    /// Mean of the last full window (µs), once one has completed.
    pub average_us: Option<u32>,
    /// Samples collected in the current window.
    pub samples: u32,
}

/// Fixed-window latency accumulator. Written from interrupt context only
/// while a transmit is in flight, so there is a single writer at a time.
struct LatencyWindow {
    window: u32,
    total_us: AtomicU64,
    samples: AtomicU32,
    last_us: AtomicU32,
    average_us: AtomicU32,
}

impl LatencyWindow {
    fn new(window: u16) -> Self {
        Self {
            window: u32::from(window.max(1)),
            total_us: AtomicU64::new(0),
            samples: AtomicU32::new(0),
            last_us: AtomicU32::new(0),
            average_us: AtomicU32::new(u32::MAX),
        }
    }

    fn record(&self, elapsed_us: u64) {
        let sample = u32::try_from(elapsed_us).unwrap_or(u32::MAX);
        self.last_us.store(sample, Ordering::Relaxed);
        let total = self
            .total_us
            .fetch_add(elapsed_us, Ordering::Relaxed)
            .wrapping_add(elapsed_us);
        let samples = self.samples.fetch_add(1, Ordering::Relaxed) + 1;
        if samples >= self.window {
            let mean = u32::try_from(total / u64::from(samples)).unwrap_or(u32::MAX - 1);
            self.average_us.store(mean.min(u32::MAX - 1), Ordering::Relaxed);
            self.total_us.store(0, Ordering::Relaxed);
            self.samples.store(0, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> TxLatency {
        let average = self.average_us.load(Ordering::Relaxed);
        TxLatency {
            last_us: self.last_us.load(Ordering::Relaxed),
            average_us: (average != u32::MAX).then_some(average),
            samples: self.samples.load(Ordering::Relaxed),
        }
    }
}

/// Transmit-side shared state.
pub(crate) struct TxPath {
    /// Serialises task-context radio control and owns the frame buffer,
    /// which must stay untouched until the completion interrupt.
    control: Mutex<[u8; MAX_FRAME_LEN]>,
    /// Outcome of the last transmit. `None` while in flight, or after the
    /// wait abandoned it.
    outcome: CsMutex<CriticalSectionRawMutex, Cell<Option<TxOutcome>>>,
    issued_at_us: AtomicU64,
    latency: LatencyWindow,
}

impl TxPath {
    pub(super) fn new(latency_window: u16) -> Self {
        Self {
            control: Mutex::new([0; MAX_FRAME_LEN]),
            outcome: CsMutex::new(Cell::new(None)),
            issued_at_us: AtomicU64::new(0),
            latency: LatencyWindow::new(latency_window),
        }
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, [u8; MAX_FRAME_LEN]> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn latency(&self) -> TxLatency {
        self.latency.snapshot()
    }

    /// Clear the outcome and enter `Transmitting`. Returns the outcome that
    /// was cleared so a rejected transmit can put it back.
    fn arm(&self, state: &StateCell) -> Option<TxOutcome> {
        self.outcome.lock(|slot| {
            state.store(State::Transmitting);
            slot.take()
        })
    }

    fn disarm(&self, state: &StateCell, prev: State, outcome: Option<TxOutcome>) {
        self.outcome.lock(|slot| {
            slot.set(outcome);
            state.store(prev);
        });
    }

    /// `Transmitting → TxComplete` publishing `outcome`. `false` if nothing
    /// was in flight.
    fn finish(&self, state: &StateCell, outcome: Option<TxOutcome>) -> bool {
        self.outcome.lock(|slot| {
            let won = state.transition(State::Transmitting, State::TxComplete);
            if won {
                slot.set(outcome);
            }
            won
        })
    }

    /// Result of the last transmit, or `None` while it is still in flight.
    fn settled(&self, state: &StateCell) -> Option<Result<TxOutcome>> {
        self.outcome.lock(|slot| match state.load() {
            State::Transmitting => None,
            State::TxComplete => Some(slot.get().ok_or(Error::Timeout)),
            other => Some(Err(Error::InvalidState(other))),
        })
    }
}

/// States from which a new transmit or retune may start.
fn ready(state: State) -> Result<State> {
    match state {
        State::Listening | State::TxComplete => Ok(state),
        State::Transmitting => Err(Error::Busy),
        other => Err(Error::InvalidState(other)),
    }
}

impl<R: RadioDriver, C: FrameCodec> Shared<R, C> {
    /// Encode `frame` and start an asynchronous transmit, optionally
    /// retuning first.
    pub(super) fn transmit(&self, frame: &C::Frame, channel: Option<Channel>) -> Result<()> {
        let mut buf = self.tx.lock();
        let prev = ready(self.state.load())?;

        let len = self.codec.encode(frame, &mut buf).map_err(|e| {
            error!("transceiver: failed to encode frame: {}", e);
            Error::EncodingFailed(e)
        })?;

        if let Some(channel) = channel {
            self.channel.switch(&self.radio, channel).inspect_err(|e| {
                error!("transceiver: retune to {} before transmit failed: {}", channel, e);
            })?;
        }

        self.tx.issued_at_us.store(time::uptime_us(), Ordering::Release);
        let last = self.tx.arm(&self.state);

        if let Err(e) = self.radio.transmit(&buf[..len], self.config.cca_before_transmit) {
            self.tx.disarm(&self.state, prev, last);
            let e = e.during(RadioOp::Transmit);
            error!("transceiver: {}", e);
            return Err(e);
        }

        debug!(
            "transceiver: transmitting {} bytes on {}",
            len,
            self.channel.current().map_or(0, Channel::get)
        );
        Ok(())
    }

    /// Retune and re-arm receive.
    pub(super) fn set_channel(&self, channel: Channel) -> Result<()> {
        let _guard = self.tx.lock();
        ready(self.state.load())?;
        self.channel.switch_and_listen(&self.radio, channel)?;
        self.state.store(State::Listening);
        Ok(())
    }

    /// Re-arm receive on the current channel.
    pub(super) fn resume_listening(&self) -> Result<()> {
        let _guard = self.tx.lock();
        ready(self.state.load())?;
        self.radio
            .receive()
            .map_err(|e| e.during(RadioOp::Receive))?;
        self.state.store(State::Listening);
        Ok(())
    }

    /// Transmit completion. Interrupt context.
    pub(super) fn complete(&self, outcome: TxOutcome) {
        let issued = self.tx.issued_at_us.load(Ordering::Acquire);
        if self.tx.finish(&self.state, Some(outcome)) {
            self.tx
                .latency
                .record(time::uptime_us().saturating_sub(issued));
        }
    }

    /// Block until the in-flight transmit completes or `timeout` passes.
    ///
    /// In `TxComplete` the last outcome is returned straight away, any
    /// number of times. On timeout the transmit is abandoned: the state
    /// moves to `TxComplete` and a completion arriving afterwards is
    /// ignored. Later waits for an abandoned transmit return `Timeout`
    /// without waiting.
    pub(super) fn wait_transmit_done(&self, timeout: Duration) -> Result<TxOutcome> {
        let poll = self.config.tx_poll_interval();
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(result) = self.tx.settled(&self.state) {
                return result;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep(poll.min(deadline - now));
        }

        if self.tx.finish(&self.state, None) {
            warn!(
                "transceiver: no transmit completion within {:?}, abandoning",
                timeout
            );
            return Err(Error::Timeout);
        }
        // The completion (or a deinitialize) won the race against the deadline.
        self.tx.settled(&self.state).unwrap_or(Err(Error::Timeout))
    }
}
