//! Recording radio used by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{Channel, InterruptSink, RadioDriver, RadioError, RadioOp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RadioCall {
    Enable,
    Disable,
    SetCoordinator(bool),
    SetPromiscuous(bool),
    SetRxWhenIdle(bool),
    SetChannel(u8),
    Receive,
    Transmit { len: usize, cca: bool },
}

#[derive(Default)]
pub struct MockRadio {
    calls: Mutex<Vec<RadioCall>>,
    failures: Mutex<Vec<(RadioOp, RadioError)>>,
    released: AtomicUsize,
    last_tx: Mutex<Vec<u8>>,
    sink: Mutex<Option<Arc<dyn InterruptSink>>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call of `op` fail with `err`.
    pub fn fail_on(&self, op: RadioOp, err: RadioError) {
        self.failures.lock().unwrap().push((op, err));
    }

    pub fn calls(&self) -> Vec<RadioCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn last_tx(&self) -> Vec<u8> {
        self.last_tx.lock().unwrap().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }

    fn record(&self, op: RadioOp, call: RadioCall) -> Result<(), RadioError> {
        self.calls.lock().unwrap().push(call);
        match self.failures.lock().unwrap().iter().find(|(o, _)| *o == op) {
            Some((_, err)) => Err(*err),
            None => Ok(()),
        }
    }
}

impl RadioDriver for MockRadio {
    fn enable(&self) -> Result<(), RadioError> {
        self.record(RadioOp::Enable, RadioCall::Enable)
    }

    fn disable(&self) -> Result<(), RadioError> {
        self.record(RadioOp::Disable, RadioCall::Disable)
    }

    fn set_coordinator(&self, enable: bool) -> Result<(), RadioError> {
        self.record(RadioOp::SetCoordinator, RadioCall::SetCoordinator(enable))
    }

    fn set_promiscuous(&self, enable: bool) -> Result<(), RadioError> {
        self.record(RadioOp::SetPromiscuous, RadioCall::SetPromiscuous(enable))
    }

    fn set_rx_when_idle(&self, enable: bool) -> Result<(), RadioError> {
        self.record(RadioOp::SetRxWhenIdle, RadioCall::SetRxWhenIdle(enable))
    }

    fn set_channel(&self, channel: Channel) -> Result<(), RadioError> {
        self.record(RadioOp::SetChannel, RadioCall::SetChannel(channel.get()))
    }

    fn receive(&self) -> Result<(), RadioError> {
        self.record(RadioOp::Receive, RadioCall::Receive)
    }

    fn transmit(&self, frame: &[u8], cca: bool) -> Result<(), RadioError> {
        *self.last_tx.lock().unwrap() = frame.to_vec();
        self.record(
            RadioOp::Transmit,
            RadioCall::Transmit {
                len: frame.len(),
                cca,
            },
        )
    }

    fn release_rx_buffer(&self, _frame: &[u8]) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }

    fn attach_interrupts(&self, sink: Arc<dyn InterruptSink>) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn detach_interrupts(&self) {
        self.sink.lock().unwrap().take();
    }
}
