//! Wire packet codec.
//!
//! Wire format (one GATT write or notification):
//! ```text
//! ┌──────┬─────┬────────────┬──────────────┬─────┬──────────────┐
//! │ Ctrl │ Seq │ Frag (2B)  │ Total (2B)   │ Len │ Payload      │
//! │ (1B) │(1B) │ LE u16     │ LE u16,      │(1B) │ (Len bytes)  │
//! │      │     │            │ index 0 only │     │              │
//! └──────┴─────┴────────────┴──────────────┴─────┴──────────────┘
//! ```
//!
//! Ctrl: bit 0 retry, bit 1 fragmented, bit 2 protected, bit 3 ack
//! requested, bits 4-5 frame type, bits 6-7 version.
//! Frag: bits 0-14 fragment index, bit 15 last fragment.

use crate::error::ProError;

/// Retransmission of an earlier packet.
pub const CTRL_RETRY: u8 = 0x01;
/// Message spans more than one packet.
pub const CTRL_FRAG: u8 = 0x02;
/// Message body carries an integrity tag.
pub const CTRL_PROTECT: u8 = 0x04;
/// Sender requests an acknowledgement.
pub const CTRL_ACK: u8 = 0x08;

const TYPE_SHIFT: u8 = 4;
const TYPE_MASK: u8 = 0x30;
const VERSION_SHIFT: u8 = 6;

/// The only protocol version this codec speaks.
pub const PROTOCOL_VERSION: u8 = 0;

/// Fragment-field bit marking the final fragment.
pub const FRAG_LAST: u16 = 0x8000;
const FRAG_INDEX_MASK: u16 = 0x7FFF;

/// ctrl + seq + frag + len.
pub const BASE_HEADER_SIZE: usize = 5;
/// Extra bytes carried by the first fragment.
pub const TOTAL_LEN_SIZE: usize = 2;
/// ATT opcode + handle overhead subtracted from the MTU.
pub const ATT_OVERHEAD: usize = 3;

/// Frame type carried in ctrl bits 4-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    Command = 0,
    Data = 1,
    Ack = 2,
}

impl FrameType {
    fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(Self::Command),
            1 => Some(Self::Data),
            2 => Some(Self::Ack),
            _ => None,
        }
    }
}

/// Decoded packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub frame_type: FrameType,
    /// Raw flag bits (`CTRL_*`), type and version excluded.
    pub flags: u8,
    pub seq: u8,
    pub index: u16,
    pub last: bool,
    /// Present only on fragment index 0.
    pub total_len: Option<u16>,
}

impl FrameHeader {
    pub fn is_retry(&self) -> bool {
        self.flags & CTRL_RETRY != 0
    }

    pub fn is_fragmented(&self) -> bool {
        self.flags & CTRL_FRAG != 0
    }

    pub fn is_protected(&self) -> bool {
        self.flags & CTRL_PROTECT != 0
    }

    pub fn wants_ack(&self) -> bool {
        self.flags & CTRL_ACK != 0
    }

    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    fn ctrl_byte(&self) -> u8 {
        (self.flags & 0x0F)
            | ((self.frame_type as u8) << TYPE_SHIFT)
            | (PROTOCOL_VERSION << VERSION_SHIFT)
    }

    /// Header length on the wire.
    pub fn encoded_len(&self) -> usize {
        BASE_HEADER_SIZE + if self.index == 0 { TOTAL_LEN_SIZE } else { 0 }
    }
}

/// A decoded packet borrowing its payload from the receive buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub header: FrameHeader,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Parse one packet. The payload length byte must account for every
    /// remaining byte.
    pub fn decode(data: &'a [u8]) -> Result<Self, ProError> {
        if data.len() < BASE_HEADER_SIZE {
            return Err(ProError::Malformed("packet shorter than header"));
        }

        let ctrl = data[0];
        if ctrl >> VERSION_SHIFT != PROTOCOL_VERSION {
            return Err(ProError::Malformed("unsupported version"));
        }
        let frame_type = FrameType::from_bits((ctrl & TYPE_MASK) >> TYPE_SHIFT)
            .ok_or(ProError::Malformed("reserved frame type"))?;

        let seq = data[1];
        let frag = u16::from_le_bytes([data[2], data[3]]);
        let index = frag & FRAG_INDEX_MASK;
        let last = frag & FRAG_LAST != 0;

        let mut offset = 4;
        let total_len = if index == 0 {
            if data.len() < BASE_HEADER_SIZE + TOTAL_LEN_SIZE {
                return Err(ProError::Malformed("first fragment missing total length"));
            }
            let total = u16::from_le_bytes([data[4], data[5]]);
            offset += TOTAL_LEN_SIZE;
            Some(total)
        } else {
            None
        };

        let len = data[offset] as usize;
        offset += 1;
        let payload = &data[offset..];
        if payload.len() != len {
            return Err(ProError::Malformed("payload length field"));
        }

        Ok(Self {
            header: FrameHeader {
                frame_type,
                flags: ctrl & 0x0F,
                seq,
                index,
                last,
                total_len,
            },
            payload,
        })
    }
}

/// Encode a header and payload into `out`.
///
/// Returns the number of bytes written, or `None` when `out` is too small
/// or the payload does not fit the 1-byte length field.
pub fn encode_frame(header: &FrameHeader, payload: &[u8], out: &mut [u8]) -> Option<usize> {
    if payload.len() > u8::MAX as usize {
        return None;
    }
    let total = header.encoded_len() + payload.len();
    if total > out.len() {
        return None;
    }

    let mut frag = header.index & FRAG_INDEX_MASK;
    if header.last {
        frag |= FRAG_LAST;
    }

    out[0] = header.ctrl_byte();
    out[1] = header.seq;
    out[2..4].copy_from_slice(&frag.to_le_bytes());
    let mut offset = 4;
    if header.index == 0 {
        let total_len = header.total_len.unwrap_or(0);
        out[4..6].copy_from_slice(&total_len.to_le_bytes());
        offset += TOTAL_LEN_SIZE;
    }
    out[offset] = payload.len() as u8;
    offset += 1;
    out[offset..offset + payload.len()].copy_from_slice(payload);

    Some(total)
}

/// Build the ack packet for `seq`.
pub fn ack_packet(seq: u8) -> [u8; BASE_HEADER_SIZE + TOTAL_LEN_SIZE] {
    let header = FrameHeader {
        frame_type: FrameType::Ack,
        flags: 0,
        seq,
        index: 0,
        last: true,
        total_len: Some(0),
    };
    let mut out = [0u8; BASE_HEADER_SIZE + TOTAL_LEN_SIZE];
    // Fixed-size header with an empty payload always fits.
    let _ = encode_frame(&header, &[], &mut out);
    out
}
