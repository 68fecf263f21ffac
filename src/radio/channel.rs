//! Channel validation and the currently tuned channel.
//!
//! IEEE 802.15.4 O-QPSK in the 2.4 GHz band uses channels 11–26. On this
//! class of radio a channel change (or a transmit) silently leaves the
//! receiver idle, so every retune done on behalf of the application is
//! followed by an explicit re-arm.

use core::fmt;
use core::sync::atomic::{AtomicU8, Ordering};

use log::debug;

use super::{RadioDriver, RadioOp};
use crate::error::{Error, Result};

/// Lowest valid 2.4 GHz channel.
pub const MIN_CHANNEL: u8 = 11;
/// Highest valid 2.4 GHz channel.
pub const MAX_CHANNEL: u8 = 26;

/// A validated 2.4 GHz IEEE 802.15.4 channel number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u8);

impl Channel {
    pub const fn new(number: u8) -> Result<Self> {
        if number < MIN_CHANNEL || number > MAX_CHANNEL {
            return Err(Error::InvalidArgument("channel must be within 11..=26"));
        }
        Ok(Self(number))
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Centre frequency in MHz (2405 + 5 × (k − 11)).
    pub const fn frequency_mhz(self) -> u16 {
        2405 + 5 * (self.0 as u16 - MIN_CHANNEL as u16)
    }
}

impl TryFrom<u8> for Channel {
    type Error = Error;

    fn try_from(number: u8) -> Result<Self> {
        Self::new(number)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tracks the channel the radio is tuned to.
///
/// `0` means "not tuned" (before initialize / after deinitialize).
pub struct ChannelState {
    current: AtomicU8,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelState {
    pub const fn new() -> Self {
        Self {
            current: AtomicU8::new(0),
        }
    }

    pub fn current(&self) -> Option<Channel> {
        Channel::new(self.current.load(Ordering::Acquire)).ok()
    }

    /// Tune the radio and re-arm receive.
    pub fn switch_and_listen(&self, radio: &impl RadioDriver, channel: Channel) -> Result<()> {
        self.switch(radio, channel)?;
        radio.receive().map_err(|e| e.during(RadioOp::Receive))?;
        debug!("channel: listening on {}", channel);
        Ok(())
    }

    /// Tune the radio without re-arming receive (used right before a
    /// transmit, which would leave the receiver idle anyway).
    pub fn switch(&self, radio: &impl RadioDriver, channel: Channel) -> Result<()> {
        radio
            .set_channel(channel)
            .map_err(|e| e.during(RadioOp::SetChannel))?;
        self.current.store(channel.get(), Ordering::Release);
        Ok(())
    }

    pub fn clear(&self) {
        self.current.store(0, Ordering::Release);
    }
}
