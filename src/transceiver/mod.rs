//! Transceiver lifecycle and public API.
//!
//! ```text
//!                  ┌──────────── Shared (Arc) ────────────┐
//!  radio ISR ────▶ │ InterruptSink ─▶ relay ─▶ RxQueue ───┼──▶ dispatch task ─▶ callback
//!                  │               └▶ complete ─▶ outcome ┼──▶ wait_transmit_done
//!  Transceiver ──▶ │ control Mutex ─▶ transmit / retune   │
//!  Handle(s)   ──▶ │ state: AtomicU8                      │
//!                  └──────────────────────────────────────┘
//! ```
//!
//! [`Transceiver`] owns the lifecycle (initialize / deinitialize) and the
//! dispatch thread. [`Handle`] is a cheap clone for other tasks, and for the
//! receive callback itself, that exposes every runtime operation but cannot
//! tear the transceiver down.

mod dispatch;
mod relay;
mod transmit;

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{error, info, warn};

use crate::config::TransceiverConfig;
use crate::drivers::task_pin::{self, Core};
use crate::error::{Error, Result};
use crate::frame::{FrameCodec, MacFrameCodec};
use crate::radio::{
    Channel, ChannelState, FrameInfo, InterruptSink, RadioDriver, RadioOp, TxError, TxOutcome,
};

use dispatch::CallbackSlot;
pub use dispatch::RxCallback;
use relay::RxQueue;
pub use relay::{QueueSlot, RX_QUEUE_DEPTH, RawFrame, RelayStats};
use transmit::TxPath;
pub use transmit::TxLatency;

// ───────────────────────────────────────────────────────────────
// State
// ───────────────────────────────────────────────────────────────

/// Transceiver state.
///
/// ```text
/// Uninitialized ─initialize─▶ Listening ─transmit─▶ Transmitting
///                               ▲    ▲                  │ done / failed / timeout
///                               │    └─set_channel──── TxComplete
///                               │      resume_listening
///   Disabled ◀─deinitialize─ (any) ; Disabled ─initialize─▶ Listening
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Uninitialized = 0,
    Listening = 1,
    Transmitting = 2,
    /// Last transmit finished; receiver idle until re-armed.
    TxComplete = 3,
    Disabled = 4,
}

impl State {
    const fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Listening,
            2 => Self::Transmitting,
            3 => Self::TxComplete,
            4 => Self::Disabled,
            _ => Self::Uninitialized,
        }
    }
}

/// Atomic cell shared between task and interrupt context.
struct StateCell(AtomicU8);

impl StateCell {
    const fn new(state: State) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Compare-and-swap; `true` if the state was `from`.
    fn transition(&self, from: State, to: State) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

// ───────────────────────────────────────────────────────────────
// Shared context
// ───────────────────────────────────────────────────────────────

/// Everything both contexts touch. Lives behind an `Arc` handed to the
/// radio (as the interrupt sink), the dispatch thread and every [`Handle`].
pub(crate) struct Shared<R: RadioDriver, C: FrameCodec> {
    radio: R,
    codec: C,
    config: TransceiverConfig,
    state: StateCell,
    channel: ChannelState,
    rx: RxQueue,
    callback: CallbackSlot<C::Frame>,
    tx: TxPath,
    running: AtomicBool,
}

impl<R: RadioDriver, C: FrameCodec> InterruptSink for Shared<R, C> {
    fn receive_done(&self, frame: &[u8], info: &FrameInfo) {
        // Drops are counted and reported by the dispatch task.
        let _ = self.relay(frame, info);
    }

    fn transmit_done(&self, _frame: &[u8], ack: Option<(&[u8], &FrameInfo)>) {
        self.complete(TxOutcome::Sent {
            ack: ack.map(|(_, info)| *info),
        });
    }

    fn transmit_failed(&self, _frame: &[u8], error: TxError) {
        self.complete(TxOutcome::Failed(error));
    }
}

// ───────────────────────────────────────────────────────────────
// Transceiver
// ───────────────────────────────────────────────────────────────

/// The IEEE 802.15.4 transceiver: radio bring-up, receive relay and
/// dispatch, and transmit.
pub struct Transceiver<R: RadioDriver, C: FrameCodec = MacFrameCodec> {
    handle: Handle<R, C>,
    rx_task: Option<JoinHandle<()>>,
    radio_enabled: bool,
}

impl<R: RadioDriver> Transceiver<R> {
    /// Create an uninitialized transceiver using the 802.15.4 MAC codec.
    pub fn new(radio: R, config: TransceiverConfig) -> Self {
        Self::with_codec(radio, MacFrameCodec, config)
    }
}

impl<R: RadioDriver, C: FrameCodec> Transceiver<R, C> {
    pub fn with_codec(radio: R, codec: C, config: TransceiverConfig) -> Self {
        let tx = TxPath::new(config.tx_latency_window);
        let shared = Shared {
            radio,
            codec,
            config,
            state: StateCell::new(State::Uninitialized),
            channel: ChannelState::new(),
            rx: RxQueue::new(),
            callback: CallbackSlot::new(),
            tx,
            running: AtomicBool::new(false),
        };
        Self {
            handle: Handle {
                shared: Arc::new(shared),
            },
            rx_task: None,
            radio_enabled: false,
        }
    }

    /// Bring the radio up on `channel` and start receive dispatch.
    ///
    /// The channel is validated before anything is touched. On any later
    /// failure every resource acquired so far is released in reverse order
    /// and the state is left as it was.
    pub fn initialize(&mut self, channel: u8) -> Result<()> {
        let channel = Channel::new(channel).inspect_err(|_| {
            error!("transceiver: invalid channel {}", channel);
        })?;

        let before = {
            let _control = self.shared().tx.lock();
            let before = self.state();
            if !matches!(before, State::Uninitialized | State::Disabled) {
                return Err(Error::InvalidState(before));
            }
            before
        };
        self.shared().config.validate()?;

        // The control lock is not held across bring-up: the dispatch task
        // may already be running callbacks that take it.
        if let Err(e) = self.bring_up(channel) {
            error!("transceiver: initialize failed: {}", e);
            if let Err(cleanup) = self.tear_down() {
                warn!("transceiver: rollback incomplete: {}", cleanup);
            }
            self.set_state(before);
            return Err(e);
        }

        self.set_state(State::Listening);
        info!("transceiver: initialized on channel {} ({} MHz)", channel, channel.frequency_mhz());
        Ok(())
    }

    /// Stop dispatch, release the queue and interrupt routing, and disable
    /// the radio. Safe to call in any state; calling it twice is a no-op.
    ///
    /// Must not be called from the receive callback (use a [`Handle`] there,
    /// which cannot deinitialize).
    pub fn deinitialize(&mut self) -> Result<()> {
        if self.rx_task.is_none() && !self.radio_enabled {
            return Ok(());
        }
        // Waits out any transmit or retune already past its state check, so
        // nothing re-arms the radio once it is torn down.
        self.set_state(State::Disabled);
        self.tear_down()?;
        info!("transceiver: deinitialized");
        Ok(())
    }

    /// Cloneable runtime handle.
    pub fn handle(&self) -> Handle<R, C> {
        self.handle.clone()
    }

    /// The sink the radio's interrupt callbacks feed. Drivers get it via
    /// [`RadioDriver::attach_interrupts`]; exposed for tests and custom
    /// glue.
    pub fn interrupt_sink(&self) -> Arc<dyn InterruptSink> {
        self.handle.shared.clone()
    }

    pub fn radio(&self) -> &R {
        &self.shared().radio
    }

    pub fn set_rx_callback<F>(&self, callback: Option<F>)
    where
        F: FnMut(&C::Frame, &FrameInfo) + Send + 'static,
    {
        self.handle.set_rx_callback(callback);
    }

    pub fn transmit(&self, frame: &C::Frame) -> Result<()> {
        self.handle.transmit(frame)
    }

    pub fn transmit_on_channel(&self, frame: &C::Frame, channel: u8) -> Result<()> {
        self.handle.transmit_on_channel(frame, channel)
    }

    pub fn transmit_and_wait(
        &self,
        frame: &C::Frame,
        channel: Option<u8>,
        timeout: Duration,
    ) -> Result<TxOutcome> {
        self.handle.transmit_and_wait(frame, channel, timeout)
    }

    pub fn wait_transmit_done(&self, timeout: Duration) -> Result<TxOutcome> {
        self.handle.wait_transmit_done(timeout)
    }

    pub fn set_channel(&self, channel: u8) -> Result<()> {
        self.handle.set_channel(channel)
    }

    pub fn resume_listening(&self) -> Result<()> {
        self.handle.resume_listening()
    }

    pub fn state(&self) -> State {
        self.handle.state()
    }

    pub fn channel(&self) -> Option<Channel> {
        self.handle.channel()
    }

    pub fn is_transmitting(&self) -> bool {
        self.handle.is_transmitting()
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.handle.relay_stats()
    }

    pub fn tx_latency(&self) -> TxLatency {
        self.handle.tx_latency()
    }

    fn shared(&self) -> &Shared<R, C> {
        &self.handle.shared
    }

    /// Store a lifecycle state under the control lock.
    fn set_state(&self, state: State) {
        let _control = self.shared().tx.lock();
        self.shared().state.store(state);
    }

    fn bring_up(&mut self, channel: Channel) -> Result<()> {
        let shared = Arc::clone(&self.handle.shared);
        let radio = &shared.radio;
        let cfg = &shared.config;

        shared.rx.open();

        radio.enable().map_err(|e| e.during(RadioOp::Enable))?;
        self.radio_enabled = true;
        radio
            .set_coordinator(cfg.coordinator)
            .map_err(|e| e.during(RadioOp::SetCoordinator))?;
        radio
            .set_promiscuous(cfg.promiscuous)
            .map_err(|e| e.during(RadioOp::SetPromiscuous))?;
        radio
            .set_rx_when_idle(cfg.rx_when_idle)
            .map_err(|e| e.during(RadioOp::SetRxWhenIdle))?;

        radio.attach_interrupts(shared.clone());
        shared.channel.switch_and_listen(radio, channel)?;

        shared.running.store(true, Ordering::Release);
        let task_shared = Arc::clone(&shared);
        let task = task_pin::spawn_on_core(
            Core::Any,
            cfg.rx_task_priority,
            usize::from(cfg.rx_task_stack_kb),
            "rx\0",
            move || dispatch::run(&task_shared),
        )?;
        self.rx_task = Some(task);
        Ok(())
    }

    /// Release everything `bring_up` may have acquired, newest first.
    fn tear_down(&mut self) -> Result<()> {
        let shared = &self.handle.shared;

        shared.running.store(false, Ordering::Release);
        if let Some(task) = self.rx_task.take() {
            if task.thread().id() == thread::current().id() {
                warn!("transceiver: deinitialize called from the dispatch task, not joining");
            } else if task.join().is_err() {
                warn!("transceiver: receive dispatch task panicked");
            }
        }

        shared.radio.detach_interrupts();
        shared.channel.clear();
        shared.rx.close();

        if self.radio_enabled {
            shared.radio.disable().map_err(|e| {
                let e = e.during(RadioOp::Disable);
                error!("transceiver: {}", e);
                e
            })?;
            self.radio_enabled = false;
        }
        Ok(())
    }
}

impl<R: RadioDriver, C: FrameCodec> Drop for Transceiver<R, C> {
    fn drop(&mut self) {
        if self.rx_task.is_some() || self.radio_enabled {
            if let Err(e) = self.deinitialize() {
                warn!("transceiver: deinitialize on drop failed: {}", e);
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Handle
// ───────────────────────────────────────────────────────────────

/// Cloneable access to a [`Transceiver`]'s runtime operations.
pub struct Handle<R: RadioDriver, C: FrameCodec = MacFrameCodec> {
    shared: Arc<Shared<R, C>>,
}

impl<R: RadioDriver, C: FrameCodec> Clone for Handle<R, C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R: RadioDriver, C: FrameCodec> Handle<R, C> {
    /// Register, replace (`Some`) or clear (`None`) the receive callback.
    ///
    /// Takes effect for the next dispatched frame. May be called from
    /// inside the callback.
    pub fn set_rx_callback<F>(&self, callback: Option<F>)
    where
        F: FnMut(&C::Frame, &FrameInfo) + Send + 'static,
    {
        let callback = callback.map(|f| Box::new(f) as RxCallback<C::Frame>);
        let registered = callback.is_some();
        let previous = self.shared.callback.replace(callback);
        drop(previous);
        if registered {
            info!("transceiver: receive callback set");
        } else {
            info!("transceiver: receive callback cleared");
        }
    }

    /// Transmit on the current channel. Returns once the radio accepted
    /// the frame; completion is reported asynchronously.
    pub fn transmit(&self, frame: &C::Frame) -> Result<()> {
        self.shared.transmit(frame, None)
    }

    /// Retune to `channel` (without re-arming receive) and transmit.
    pub fn transmit_on_channel(&self, frame: &C::Frame, channel: u8) -> Result<()> {
        let channel = Channel::new(channel)?;
        self.shared.transmit(frame, Some(channel))
    }

    /// Transmit and block until the completion interrupt or `timeout`.
    pub fn transmit_and_wait(
        &self,
        frame: &C::Frame,
        channel: Option<u8>,
        timeout: Duration,
    ) -> Result<TxOutcome> {
        let channel = channel.map(Channel::new).transpose()?;
        self.shared.transmit(frame, channel)?;
        self.shared.wait_transmit_done(timeout)
    }

    /// Wait for the in-flight transmit to finish.
    ///
    /// Returns [`Error::Timeout`] if nothing arrives within `timeout`, in
    /// which case the transmit is abandoned and a late completion ignored.
    /// Once finished, the outcome is returned immediately until the next
    /// transmit.
    pub fn wait_transmit_done(&self, timeout: Duration) -> Result<TxOutcome> {
        self.shared.wait_transmit_done(timeout)
    }

    /// Retune and re-arm receive.
    pub fn set_channel(&self, channel: u8) -> Result<()> {
        let channel = Channel::new(channel)?;
        self.shared.set_channel(channel)
    }

    /// Re-arm receive after a transmit.
    pub fn resume_listening(&self) -> Result<()> {
        self.shared.resume_listening()
    }

    pub fn state(&self) -> State {
        self.shared.state.load()
    }

    pub fn channel(&self) -> Option<Channel> {
        self.shared.channel.current()
    }

    pub fn is_transmitting(&self) -> bool {
        self.state() == State::Transmitting
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.shared.rx.stats()
    }

    pub fn tx_latency(&self) -> TxLatency {
        self.shared.tx.latency()
    }
}
