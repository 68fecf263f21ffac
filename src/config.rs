//! Transceiver configuration parameters
//!
//! Radio mode flags, dispatch-task placement and polling cadence.
//! Values can be persisted as a compact postcard blob (e.g. in NVS) and
//! are validated on load.

use core::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Core transceiver configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransceiverConfig {
    // --- Radio mode (applied at initialize) ---
    /// Receive every frame regardless of address filtering
    pub promiscuous: bool,
    /// Act as PAN coordinator
    pub coordinator: bool,
    /// Keep the receiver on whenever the radio is idle
    pub rx_when_idle: bool,
    /// Perform clear channel assessment before each transmit
    pub cca_before_transmit: bool,

    // --- Dispatch task ---
    /// FreeRTOS priority of the receive dispatch task
    pub rx_task_priority: u8,
    /// Stack size of the receive dispatch task (KiB)
    pub rx_task_stack_kb: u16,

    // --- Timing ---
    /// Bounded dequeue timeout of the dispatch loop (milliseconds)
    pub rx_poll_interval_ms: u32,
    /// Completion polling interval while waiting for a transmit (milliseconds)
    pub tx_poll_interval_ms: u32,
    /// Number of transmit latency samples per published average
    pub tx_latency_window: u16,
}

impl Default for TransceiverConfig {
    fn default() -> Self {
        Self {
            // Radio mode
            promiscuous: true,
            coordinator: false,
            rx_when_idle: true,
            cca_before_transmit: false,

            // Dispatch task
            rx_task_priority: 5,
            rx_task_stack_kb: 5,

            // Timing
            rx_poll_interval_ms: 10,
            tx_poll_interval_ms: 1,
            tx_latency_window: 100,
        }
    }
}

impl TransceiverConfig {
    /// Reject values that would stall the dispatch task or starve the
    /// scheduler.
    pub fn validate(&self) -> Result<()> {
        if !(1..=24).contains(&self.rx_task_priority) {
            return Err(Error::InvalidArgument("rx_task_priority must be within 1..=24"));
        }
        if self.rx_task_stack_kb < 2 {
            return Err(Error::InvalidArgument("rx_task_stack_kb must be at least 2"));
        }
        if !(1..=1000).contains(&self.rx_poll_interval_ms) {
            return Err(Error::InvalidArgument("rx_poll_interval_ms must be within 1..=1000"));
        }
        if self.tx_poll_interval_ms == 0 || self.tx_poll_interval_ms > self.rx_poll_interval_ms {
            return Err(Error::InvalidArgument(
                "tx_poll_interval_ms must be within 1..=rx_poll_interval_ms",
            ));
        }
        if self.tx_latency_window == 0 {
            return Err(Error::InvalidArgument("tx_latency_window must be non-zero"));
        }
        Ok(())
    }

    pub fn rx_poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.rx_poll_interval_ms))
    }

    pub fn tx_poll_interval(&self) -> Duration {
        Duration::from_millis(u64::from(self.tx_poll_interval_ms))
    }

    /// Serialise for persistent storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| Error::InvalidArgument("config serialisation failed"))
    }

    /// Load a persisted blob; the result is validated.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Self =
            postcard::from_bytes(bytes).map_err(|_| Error::InvalidArgument("config blob corrupted"))?;
        config.validate()?;
        Ok(config)
    }
}
