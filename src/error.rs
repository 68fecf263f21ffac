//! Unified error types for the transceiver.
//!
//! A single `Error` enum that every operation funnels into. All variants are
//! `Copy` so they can cross the task boundary and be stored in counters or
//! logs without allocation.

use core::fmt;

use crate::frame::CodecError;
use crate::radio::RadioOp;
use crate::transceiver::State;

// ---------------------------------------------------------------------------
// Top-level transceiver error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// An argument was rejected before anything was touched
    /// (channel outside 11..=26, invalid config field).
    InvalidArgument(&'static str),
    /// The operation is not permitted in the current transceiver state.
    InvalidState(State),
    /// Queue or task creation failed.
    ResourceExhausted(&'static str),
    /// An underlying radio driver call returned a non-OK status.
    HardwareRejected { op: RadioOp, code: i32 },
    /// The frame could not be serialised (e.g. exceeds the maximum size).
    EncodingFailed(CodecError),
    /// Received bytes could not be parsed into a frame.
    DecodeFailed(CodecError),
    /// A received frame was dropped under backpressure.
    QueueFull,
    /// A transmit is already in flight.
    Busy,
    /// No transmit completion arrived before the caller's deadline.
    Timeout,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::InvalidState(state) => write!(f, "not permitted while {state:?}"),
            Self::ResourceExhausted(what) => write!(f, "resource exhausted: {what}"),
            Self::HardwareRejected { op, code } => {
                write!(f, "radio rejected {op} (rc={code})")
            }
            Self::EncodingFailed(e) => write!(f, "frame encoding failed: {e}"),
            Self::DecodeFailed(e) => write!(f, "frame decoding failed: {e}"),
            Self::QueueFull => write!(f, "receive queue full"),
            Self::Busy => write!(f, "transmit already in flight"),
            Self::Timeout => write!(f, "transmit completion timed out"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
