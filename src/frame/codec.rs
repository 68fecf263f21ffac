//! MAC frame build/parse.

use core::fmt;

use super::{Address, FCS_LEN, Frame, FrameType, FrameVersion, MAX_FRAME_LEN, MAX_PSDU_LEN, Payload};

/// FCF (2) + FCS (2): the smallest MPDU the parser accepts.
const MIN_MPDU_LEN: usize = 2 + FCS_LEN;

// Frame control field layout.
const FCF_SECURITY: u16 = 1 << 3;
const FCF_PENDING: u16 = 1 << 4;
const FCF_ACK_REQUEST: u16 = 1 << 5;
const FCF_PAN_ID_COMPRESSION: u16 = 1 << 6;
const FCF_SEQ_SUPPRESSION: u16 = 1 << 8;
const FCF_IE_PRESENT: u16 = 1 << 9;
const FCF_DST_MODE_SHIFT: u16 = 10;
const FCF_VERSION_SHIFT: u16 = 12;
const FCF_SRC_MODE_SHIFT: u16 = 14;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// Header + payload + FCS exceed the 127-byte MPDU.
    FrameTooLong,
    /// PAN ID presence does not match the address fields.
    InconsistentAddressing,
    /// PHR is zero, too small for a frame, or above 127.
    InvalidLength(u8),
    /// Buffer ends before the PHR or a header field says it should.
    Truncated,
    /// Address mode 1 is reserved.
    ReservedAddressMode,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameTooLong => write!(f, "frame exceeds {MAX_PSDU_LEN}-byte MPDU"),
            Self::InconsistentAddressing => write!(f, "PAN ID presence inconsistent with addresses"),
            Self::InvalidLength(len) => write!(f, "invalid PHR length {len}"),
            Self::Truncated => write!(f, "frame truncated"),
            Self::ReservedAddressMode => write!(f, "reserved address mode"),
        }
    }
}

/// Frame encoder/decoder the transceiver delegates to.
///
/// `encode` writes a PHY buffer (PHR first) into `out` and returns the
/// number of bytes used; `decode` parses one.
pub trait FrameCodec: Send + Sync + 'static {
    type Frame: Send + 'static;

    fn encode(&self, frame: &Self::Frame, out: &mut [u8; MAX_FRAME_LEN]) -> Result<usize, CodecError>;

    fn decode(&self, raw: &[u8]) -> Result<Self::Frame, CodecError>;
}

/// IEEE 802.15.4 MAC codec for [`Frame`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MacFrameCodec;

impl FrameCodec for MacFrameCodec {
    type Frame = Frame;

    fn encode(&self, frame: &Frame, out: &mut [u8; MAX_FRAME_LEN]) -> Result<usize, CodecError> {
        check_addressing(frame)?;

        let header_len = 2
            + usize::from(frame.sequence_number.is_some())
            + frame.dst_pan_id.map_or(0, |_| 2)
            + frame.dst_addr.len()
            + frame.src_pan_id.map_or(0, |_| 2)
            + frame.src_addr.len();
        let mpdu_len = header_len + frame.payload.len() + FCS_LEN;
        if mpdu_len > MAX_PSDU_LEN {
            return Err(CodecError::FrameTooLong);
        }

        out.fill(0);
        out[0] = mpdu_len as u8;
        let mut w = Writer { buf: &mut out[1..], pos: 0 };

        w.put(&frame_control(frame).to_le_bytes());
        if let Some(seq) = frame.sequence_number {
            w.put(&[seq]);
        }
        if let Some(pan) = frame.dst_pan_id {
            w.put(&pan.to_le_bytes());
        }
        w.put_address(frame.dst_addr);
        if let Some(pan) = frame.src_pan_id {
            w.put(&pan.to_le_bytes());
        }
        w.put_address(frame.src_addr);
        w.put(&frame.payload);
        // FCS left zeroed: the radio computes it.

        Ok(1 + mpdu_len)
    }

    fn decode(&self, raw: &[u8]) -> Result<Frame, CodecError> {
        let (&phr, rest) = raw.split_first().ok_or(CodecError::Truncated)?;
        let mpdu_len = phr as usize;
        if !(MIN_MPDU_LEN..=MAX_PSDU_LEN).contains(&mpdu_len) {
            return Err(CodecError::InvalidLength(phr));
        }
        let mpdu = rest.get(..mpdu_len).ok_or(CodecError::Truncated)?;
        let mut r = Reader {
            buf: &mpdu[..mpdu_len - FCS_LEN],
            pos: 0,
        };

        let fcf = r.u16()?;
        let pan_id_compression = fcf & FCF_PAN_ID_COMPRESSION != 0;
        let dst_mode = ((fcf >> FCF_DST_MODE_SHIFT) & 0b11) as u8;
        let src_mode = ((fcf >> FCF_SRC_MODE_SHIFT) & 0b11) as u8;

        let sequence_number = if fcf & FCF_SEQ_SUPPRESSION == 0 {
            Some(r.u8()?)
        } else {
            None
        };

        let dst_pan_id = if dst_mode != 0 { Some(r.u16()?) } else { None };
        let dst_addr = r.address(dst_mode)?;
        let src_pan_id = if src_mode != 0 && !pan_id_compression {
            Some(r.u16()?)
        } else {
            None
        };
        let src_addr = r.address(src_mode)?;

        let payload = Payload::from_slice(r.rest()).map_err(|()| CodecError::FrameTooLong)?;

        Ok(Frame {
            frame_type: FrameType::from_bits(fcf as u8),
            security_enabled: fcf & FCF_SECURITY != 0,
            frame_pending: fcf & FCF_PENDING != 0,
            ack_request: fcf & FCF_ACK_REQUEST != 0,
            pan_id_compression,
            ie_present: fcf & FCF_IE_PRESENT != 0,
            version: FrameVersion::from_bits((fcf >> FCF_VERSION_SHIFT) as u8),
            sequence_number,
            dst_pan_id,
            dst_addr,
            src_pan_id,
            src_addr,
            payload,
        })
    }
}

fn check_addressing(frame: &Frame) -> Result<(), CodecError> {
    let src_pan_expected = frame.src_addr.is_present() && !frame.pan_id_compression;
    if frame.dst_pan_id.is_some() != frame.dst_addr.is_present()
        || frame.src_pan_id.is_some() != src_pan_expected
    {
        return Err(CodecError::InconsistentAddressing);
    }
    Ok(())
}

fn frame_control(frame: &Frame) -> u16 {
    let mut fcf = frame.frame_type as u16;
    for (set, bit) in [
        (frame.security_enabled, FCF_SECURITY),
        (frame.frame_pending, FCF_PENDING),
        (frame.ack_request, FCF_ACK_REQUEST),
        (frame.pan_id_compression, FCF_PAN_ID_COMPRESSION),
        (frame.sequence_number.is_none(), FCF_SEQ_SUPPRESSION),
        (frame.ie_present, FCF_IE_PRESENT),
    ] {
        if set {
            fcf |= bit;
        }
    }
    fcf |= u16::from(frame.dst_addr.mode()) << FCF_DST_MODE_SHIFT;
    fcf |= (frame.version as u16) << FCF_VERSION_SHIFT;
    fcf |= u16::from(frame.src_addr.mode()) << FCF_SRC_MODE_SHIFT;
    fcf
}

// ── Cursor helpers ────────────────────────────────────────────
//
// Bounds are established by the length check in `encode`, so the writer
// indexes directly.

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn put_address(&mut self, addr: Address) {
        match addr {
            Address::None => {}
            Address::Short(a) => self.put(&a.to_le_bytes()),
            Address::Extended(a) => self.put(&a.to_le_bytes()),
        }
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + N)
            .ok_or(CodecError::Truncated)?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        self.take::<1>().map(|[b]| b)
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        self.take::<2>().map(u16::from_le_bytes)
    }

    fn address(&mut self, mode: u8) -> Result<Address, CodecError> {
        match mode {
            0 => Ok(Address::None),
            2 => self.u16().map(Address::Short),
            3 => self.take::<8>().map(|b| Address::Extended(u64::from_le_bytes(b))),
            _ => Err(CodecError::ReservedAddressMode),
        }
    }

    fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }
}
