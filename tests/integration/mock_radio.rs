//! Mock radio for integration tests.
//!
//! Records every driver call and keeps the attached interrupt sink so tests
//! can play the role of the radio ISR: inject received frames and transmit
//! completions from any thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use ieee802154_transceiver::frame::{Frame, FrameCodec, MAX_FRAME_LEN, MacFrameCodec};
use ieee802154_transceiver::radio::{
    Channel, FrameInfo, InterruptSink, RadioDriver, RadioError, RadioOp, TxError,
};

// ── Driver call record ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Enable,
    Disable,
    SetCoordinator(bool),
    SetPromiscuous(bool),
    SetRxWhenIdle(bool),
    SetChannel(u8),
    Receive,
    Transmit { bytes: Vec<u8>, cca: bool },
}

// ── MockRadio ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRadio {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<Vec<(RadioOp, i32)>>,
    released: AtomicUsize,
    sink: Mutex<Option<Arc<dyn InterruptSink>>>,
    set_channel_delay: Mutex<Duration>,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later call of `op` returns `code`.
    pub fn fail(&self, op: RadioOp, code: i32) {
        self.failing.lock().unwrap().push((op, code));
    }

    /// `set_channel` records the call, then blocks for `delay`.
    pub fn slow_set_channel(&self, delay: Duration) {
        *self.set_channel_delay.lock().unwrap() = delay;
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn transmits(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Transmit { bytes, .. } => Some(bytes),
                _ => None,
            })
            .collect()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn is_attached(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    fn sink(&self) -> Option<Arc<dyn InterruptSink>> {
        self.sink.lock().unwrap().clone()
    }

    // ── ISR simulation ────────────────────────────────────────

    /// Deliver a raw PHY buffer as the receive-done interrupt would. Frames
    /// arriving while detached are released straight away.
    pub fn inject_raw(&self, raw: &[u8], channel: u8) {
        let info = FrameInfo {
            channel,
            rssi: -52,
            lqi: 200,
            ..FrameInfo::default()
        };
        match self.sink() {
            Some(sink) => sink.receive_done(raw, &info),
            None => self.release_rx_buffer(raw),
        }
    }

    pub fn inject(&self, frame: &Frame, channel: u8) {
        self.inject_raw(&encode(frame), channel);
    }

    pub fn complete_tx(&self) {
        if let Some(sink) = self.sink() {
            sink.transmit_done(&[], None);
        }
    }

    pub fn fail_tx(&self, error: TxError) {
        if let Some(sink) = self.sink() {
            sink.transmit_failed(&[], error);
        }
    }

    fn record(&self, op: RadioOp, call: Call) -> Result<(), RadioError> {
        self.calls.lock().unwrap().push(call);
        match self.failing.lock().unwrap().iter().find(|(o, _)| *o == op) {
            Some(&(_, code)) => Err(RadioError(code)),
            None => Ok(()),
        }
    }
}

impl RadioDriver for MockRadio {
    fn enable(&self) -> Result<(), RadioError> {
        self.record(RadioOp::Enable, Call::Enable)
    }

    fn disable(&self) -> Result<(), RadioError> {
        self.record(RadioOp::Disable, Call::Disable)
    }

    fn set_coordinator(&self, enable: bool) -> Result<(), RadioError> {
        self.record(RadioOp::SetCoordinator, Call::SetCoordinator(enable))
    }

    fn set_promiscuous(&self, enable: bool) -> Result<(), RadioError> {
        self.record(RadioOp::SetPromiscuous, Call::SetPromiscuous(enable))
    }

    fn set_rx_when_idle(&self, enable: bool) -> Result<(), RadioError> {
        self.record(RadioOp::SetRxWhenIdle, Call::SetRxWhenIdle(enable))
    }

    fn set_channel(&self, channel: Channel) -> Result<(), RadioError> {
        let result = self.record(RadioOp::SetChannel, Call::SetChannel(channel.get()));
        let delay = *self.set_channel_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        result
    }

    fn receive(&self) -> Result<(), RadioError> {
        self.record(RadioOp::Receive, Call::Receive)
    }

    fn transmit(&self, frame: &[u8], cca: bool) -> Result<(), RadioError> {
        self.record(RadioOp::Transmit, Call::Transmit {
            bytes: frame.to_vec(),
            cca,
        })
    }

    fn release_rx_buffer(&self, _frame: &[u8]) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn attach_interrupts(&self, sink: Arc<dyn InterruptSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn detach_interrupts(&self) {
        let previous = self.sink.lock().unwrap().take();
        drop(previous);
    }
}

// ── Helpers ───────────────────────────────────────────────────

pub fn encode(frame: &Frame) -> Vec<u8> {
    let mut buf = [0u8; MAX_FRAME_LEN];
    let len = MacFrameCodec.encode(frame, &mut buf).unwrap();
    buf[..len].to_vec()
}

pub fn data_frame(seq: u8, payload: &[u8]) -> Frame {
    Frame::data(0x1234, 0xABCD, 0xFFFF, seq, payload).unwrap()
}
