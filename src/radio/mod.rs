//! Radio port: the boundary between the transceiver core and the driver.
//!
//! ```text
//!            RadioDriver (outbound)
//!  Transceiver ──────────────────────▶ esp_ieee802154 / mock
//!            ◀──────────────────────
//!            InterruptSink (inbound, ISR context)
//! ```
//!
//! [`RadioDriver`] is implemented by `adapters::esp_radio::EspRadio`
//! on target and by recording mocks in tests. [`InterruptSink`] is
//! implemented by the transceiver and invoked by the driver's interrupt
//! callbacks.

pub mod channel;

use core::fmt;
use std::sync::Arc;

pub use channel::{Channel, ChannelState};

// ───────────────────────────────────────────────────────────────
// Driver status
// ───────────────────────────────────────────────────────────────

/// Which driver call failed. Carried by
/// [`Error::HardwareRejected`](crate::Error::HardwareRejected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioOp {
    Enable,
    Disable,
    SetCoordinator,
    SetPromiscuous,
    SetRxWhenIdle,
    SetChannel,
    Receive,
    Transmit,
}

impl RadioOp {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Enable => "enable",
            Self::Disable => "disable",
            Self::SetCoordinator => "set_coordinator",
            Self::SetPromiscuous => "set_promiscuous",
            Self::SetRxWhenIdle => "set_rx_when_idle",
            Self::SetChannel => "set_channel",
            Self::Receive => "receive",
            Self::Transmit => "transmit",
        }
    }
}

impl fmt::Display for RadioOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw non-OK status code returned by the driver (`esp_err_t` on ESP-IDF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioError(pub i32);

impl RadioError {
    /// Attach the failing operation, producing the crate error.
    pub fn during(self, op: RadioOp) -> crate::Error {
        crate::Error::HardwareRejected { op, code: self.0 }
    }
}

// ───────────────────────────────────────────────────────────────
// Frame metadata
// ───────────────────────────────────────────────────────────────

/// Per-frame metadata produced by the radio (`esp_ieee802154_frame_info_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameInfo {
    /// Frame-pending bit of the ACK sent for this frame.
    pub pending: bool,
    /// Frame passed address filtering and was processed by the MAC.
    pub process: bool,
    /// Channel the frame was received on.
    pub channel: u8,
    /// Received signal strength, dBm.
    pub rssi: i8,
    /// Link quality indicator.
    pub lqi: u8,
    /// Receive timestamp, microseconds since boot.
    pub timestamp: u64,
}

// ───────────────────────────────────────────────────────────────
// Transmit completion
// ───────────────────────────────────────────────────────────────

/// Reason carried by the transmit-failed interrupt
/// (`esp_ieee802154_tx_error_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxError {
    /// Clear channel assessment found the channel busy.
    CcaBusy,
    /// Transmission aborted by the driver.
    Abort,
    /// ACK requested but none received.
    NoAck,
    /// ACK received but malformed or mismatched.
    InvalidAck,
    /// Lost arbitration to Wi-Fi/BLE coexistence.
    Coexist,
    /// Security processing failed.
    Security,
    /// Any code not known to this crate.
    Other(i32),
}

impl TxError {
    pub const fn from_raw(code: i32) -> Self {
        match code {
            1 => Self::CcaBusy,
            2 => Self::Abort,
            3 => Self::NoAck,
            4 => Self::InvalidAck,
            5 => Self::Coexist,
            6 => Self::Security,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CcaBusy => write!(f, "CCA busy"),
            Self::Abort => write!(f, "aborted"),
            Self::NoAck => write!(f, "no ACK"),
            Self::InvalidAck => write!(f, "invalid ACK"),
            Self::Coexist => write!(f, "coexistence arbitration lost"),
            Self::Security => write!(f, "security failure"),
            Self::Other(code) => write!(f, "error {code}"),
        }
    }
}

/// How an in-flight transmit ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Frame left the radio. `ack` carries the ACK frame's metadata when one
    /// was requested and received.
    Sent { ack: Option<FrameInfo> },
    /// The radio reported a transmit failure.
    Failed(TxError),
}

impl TxOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

// ───────────────────────────────────────────────────────────────
// Ports
// ───────────────────────────────────────────────────────────────

/// Outbound port: every hardware operation the transceiver core needs.
///
/// All methods take `&self` because the driver is shared between task
/// context and interrupt context. Only [`release_rx_buffer`] is called from
/// interrupt context and must therefore be non-blocking.
///
/// [`release_rx_buffer`]: RadioDriver::release_rx_buffer
pub trait RadioDriver: Send + Sync + 'static {
    fn enable(&self) -> Result<(), RadioError>;
    fn disable(&self) -> Result<(), RadioError>;
    fn set_coordinator(&self, enable: bool) -> Result<(), RadioError>;
    fn set_promiscuous(&self, enable: bool) -> Result<(), RadioError>;
    fn set_rx_when_idle(&self, enable: bool) -> Result<(), RadioError>;
    fn set_channel(&self, channel: Channel) -> Result<(), RadioError>;

    /// Arm receive mode. Transmits and channel changes leave the radio
    /// non-listening until this is called again.
    fn receive(&self) -> Result<(), RadioError>;

    /// Start an asynchronous transmit of `frame` (byte 0 = PHR). The buffer
    /// stays valid and unmodified until the completion interrupt fires.
    fn transmit(&self, frame: &[u8], cca: bool) -> Result<(), RadioError>;

    /// Hand the receive buffer back to the driver. Interrupt context.
    fn release_rx_buffer(&self, frame: &[u8]);

    /// Route the driver's interrupt callbacks to `sink`.
    fn attach_interrupts(&self, _sink: Arc<dyn InterruptSink>) {}

    /// Stop routing interrupt callbacks; frames arriving afterwards are
    /// released by the driver itself.
    fn detach_interrupts(&self) {}
}

/// Inbound port: hardware interrupt callbacks consumed by the core.
///
/// Every method runs in interrupt context: no blocking, no allocation, no
/// logging.
pub trait InterruptSink: Send + Sync {
    /// A frame was received. `frame[0]` is the PHR (MPDU length).
    fn receive_done(&self, frame: &[u8], info: &FrameInfo);

    /// Transmit succeeded. `ack` is the ACK frame and its metadata, if any.
    fn transmit_done(&self, frame: &[u8], ack: Option<(&[u8], &FrameInfo)>);

    /// Transmit failed with `error`.
    fn transmit_failed(&self, frame: &[u8], error: TxError);

    /// SFD of an incoming frame was detected.
    fn receive_sfd_done(&self) {}

    /// SFD of the outgoing frame was sent.
    fn transmit_sfd_done(&self, _frame: &[u8]) {}
}

#[cfg(test)]
pub(crate) mod testing;
