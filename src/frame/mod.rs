//! IEEE 802.15.4 MAC frames.
//!
//! The radio hands frames around as a PHY buffer:
//!
//! ```text
//! ┌─────┬──────────┬──────┬──────────────────────┬─────────┬─────┐
//! │ PHR │ FCF (2B) │ Seq  │ PANs + addresses     │ Payload │ FCS │
//! │ 1B  │ LE       │ 0/1B │ 0..20B               │ N B     │ 2B  │
//! └─────┴──────────┴──────┴──────────────────────┴─────────┴─────┘
//!        ◀──────────────────── MPDU, PHR bytes (≤ 127) ──────────▶
//! ```
//!
//! The FCS is computed by the radio on transmit and replaced by link
//! metadata on receive, so the codec writes zeros and ignores it.

mod codec;

use core::fmt;

use serde::{Deserialize, Serialize};

pub use codec::{CodecError, FrameCodec, MacFrameCodec};

/// Size of a PHY buffer: PHR byte + the largest MPDU.
pub const MAX_FRAME_LEN: usize = 128;

/// Largest MPDU (aMaxPhyPacketSize).
pub const MAX_PSDU_LEN: usize = 127;

/// Trailing frame check sequence.
pub const FCS_LEN: usize = 2;

/// Frame payload storage (bounded by the MPDU size).
pub type Payload = heapless::Vec<u8, MAX_PSDU_LEN>;

/// Frame type subfield (FCF bits 0–2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameType {
    Beacon = 0,
    Data = 1,
    Ack = 2,
    MacCommand = 3,
    Reserved = 4,
    Multipurpose = 5,
    Fragment = 6,
    Extended = 7,
}

impl FrameType {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Self::Beacon,
            1 => Self::Data,
            2 => Self::Ack,
            3 => Self::MacCommand,
            4 => Self::Reserved,
            5 => Self::Multipurpose,
            6 => Self::Fragment,
            _ => Self::Extended,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beacon => "Beacon",
            Self::Data => "Data",
            Self::Ack => "Ack",
            Self::MacCommand => "MAC Command",
            Self::Reserved => "Reserved",
            Self::Multipurpose => "Multipurpose",
            Self::Fragment => "Fragment",
            Self::Extended => "Extended",
        }
    }
}

/// Frame version subfield (FCF bits 12–13).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum FrameVersion {
    V2003 = 0,
    V2006 = 1,
    V2015 = 2,
    Reserved = 3,
}

impl FrameVersion {
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Self::V2003,
            1 => Self::V2006,
            2 => Self::V2015,
            _ => Self::Reserved,
        }
    }
}

/// Device address as selected by an address-mode subfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Address {
    /// Address mode 0: not present.
    None,
    /// Address mode 2: 16-bit short address.
    Short(u16),
    /// Address mode 3: 64-bit extended address.
    Extended(u64),
}

impl Address {
    pub(crate) const fn mode(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Short(_) => 2,
            Self::Extended(_) => 3,
        }
    }

    pub(crate) const fn len(self) -> usize {
        match self {
            Self::None => 0,
            Self::Short(_) => 2,
            Self::Extended(_) => 8,
        }
    }

    pub const fn is_present(self) -> bool {
        !matches!(self, Self::None)
    }

    pub const fn is_broadcast(self) -> bool {
        matches!(self, Self::Short(0xFFFF))
    }
}

/// A parsed MAC frame.
///
/// PAN ID presence follows the 2006 rules: the destination PAN ID is present
/// with a destination address; the source PAN ID is present with a source
/// address unless `pan_id_compression` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    pub frame_type: FrameType,
    pub security_enabled: bool,
    pub frame_pending: bool,
    pub ack_request: bool,
    pub pan_id_compression: bool,
    pub ie_present: bool,
    pub version: FrameVersion,
    /// `None` when sequence number suppression is set.
    pub sequence_number: Option<u8>,
    pub dst_pan_id: Option<u16>,
    pub dst_addr: Address,
    pub src_pan_id: Option<u16>,
    pub src_addr: Address,
    /// Everything between the addressing fields and the FCS, including any
    /// auxiliary security header or IEs.
    pub payload: Payload,
}

impl Frame {
    /// Data frame with short addressing on a single PAN.
    pub fn data(pan_id: u16, src: u16, dst: u16, sequence_number: u8, payload: &[u8]) -> Option<Self> {
        Some(Self {
            frame_type: FrameType::Data,
            security_enabled: false,
            frame_pending: false,
            ack_request: false,
            pan_id_compression: true,
            ie_present: false,
            version: FrameVersion::V2006,
            sequence_number: Some(sequence_number),
            dst_pan_id: Some(pan_id),
            dst_addr: Address::Short(dst),
            src_pan_id: None,
            src_addr: Address::Short(src),
            payload: Payload::from_slice(payload).ok()?,
        })
    }

    /// Source PAN ID, resolving PAN ID compression.
    pub fn effective_src_pan_id(&self) -> Option<u16> {
        if self.pan_id_compression && self.src_addr.is_present() {
            self.dst_pan_id
        } else {
            self.src_pan_id
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "frameType: {}", self.frame_type.as_str())?;
        if let Some(seq) = self.sequence_number {
            write!(f, ", seqNum: {seq:02x}")?;
        }
        if let Some(pan) = self.dst_pan_id {
            write!(f, ", dstPanId: {pan:04x}")?;
        }
        write!(f, ", dstAddr: {}", AddressDisplay(self.dst_addr))?;
        write!(f, ", srcAddr: {}", AddressDisplay(self.src_addr))?;
        write!(f, ", payload: {}", HexDump(&self.payload))
    }
}

struct AddressDisplay(Address);

impl fmt::Display for AddressDisplay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Address::None => Ok(()),
            Address::Short(a) => write!(f, "{}", HexDump(&a.to_le_bytes())),
            Address::Extended(a) => write!(f, "{}", HexDump(&a.to_le_bytes())),
        }
    }
}

/// One-line hex rendering: bytes separated by a space, groups of eight
/// separated by two.
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(if i % 8 == 0 { "  " } else { " " })?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}
