//! Split a message body into MTU-sized packets.
//!
//! ```text
//! Packet 0: [ctrl FRAG?][seq][idx 0     ][total][len] body part 1
//! Packet 1: [ctrl FRAG ][seq][idx 1     ]       [len] body part 2
//! Packet N: [ctrl FRAG ][seq][idx N|LAST]       [len] body part N
//! ```
//!
//! Sequence numbers are assigned at transmit time so that a retransmitted
//! packet carries a fresh `seq` with the `RETRY` bit set.

use core::ops::Range;

use crate::error::ProError;

use super::frame::{
    self, ATT_OVERHEAD, BASE_HEADER_SIZE, CTRL_ACK, CTRL_FRAG, CTRL_PROTECT, CTRL_RETRY,
    FrameHeader, TOTAL_LEN_SIZE,
};
use super::payload::MessageKind;

const MAX_FRAGMENTS: usize = 0x7FFF;

/// A body prepared for transmission as one or more packets.
#[derive(Debug, Clone)]
pub struct Fragmenter {
    body: Vec<u8>,
    kind: MessageKind,
    flags: u8,
    chunks: Vec<Range<usize>>,
}

impl Fragmenter {
    /// Plan the packets for `body` at the given ATT MTU.
    ///
    /// `body` already includes the integrity tag when `protected` is set.
    pub fn new(
        body: Vec<u8>,
        kind: MessageKind,
        mtu: usize,
        protected: bool,
        ack: bool,
    ) -> Result<Self, ProError> {
        if body.is_empty() {
            return Err(ProError::Malformed("empty message"));
        }
        if body.len() > u16::MAX as usize {
            return Err(ProError::NoMem);
        }

        let room = mtu.saturating_sub(ATT_OVERHEAD);
        let first_cap = room
            .saturating_sub(BASE_HEADER_SIZE + TOTAL_LEN_SIZE)
            .min(u8::MAX as usize);
        let rest_cap = room.saturating_sub(BASE_HEADER_SIZE).min(u8::MAX as usize);
        if first_cap == 0 {
            return Err(ProError::Malformed("MTU too small for one payload byte"));
        }

        let mut chunks = Vec::new();
        let first_end = body.len().min(first_cap);
        chunks.push(0..first_end);
        let mut start = first_end;
        while start < body.len() {
            let end = body.len().min(start + rest_cap);
            chunks.push(start..end);
            start = end;
            if chunks.len() > MAX_FRAGMENTS {
                return Err(ProError::Malformed("too many fragments"));
            }
        }

        let mut flags = 0;
        if chunks.len() > 1 {
            flags |= CTRL_FRAG;
        }
        if protected {
            flags |= CTRL_PROTECT;
        }
        if ack {
            flags |= CTRL_ACK;
        }

        Ok(Self {
            body,
            kind,
            flags,
            chunks,
        })
    }

    /// Number of packets in the message.
    pub fn count(&self) -> usize {
        self.chunks.len()
    }

    /// Total body length declared in the first packet.
    pub fn total_len(&self) -> u16 {
        self.body.len() as u16
    }

    /// Encode packet `index` with sequence number `seq`.
    pub fn packet(&self, index: usize, seq: u8, retry: bool) -> Vec<u8> {
        let range = self.chunks[index].clone();
        let mut flags = self.flags;
        if retry {
            flags |= CTRL_RETRY;
        }
        let header = FrameHeader {
            frame_type: self.kind.frame_type(),
            flags,
            seq,
            index: index as u16,
            last: index + 1 == self.chunks.len(),
            total_len: (index == 0).then(|| self.total_len()),
        };

        let payload = &self.body[range];
        let mut out = vec![0u8; header.encoded_len() + payload.len()];
        // Sized exactly from the header and a chunk capped at 255 bytes.
        let _ = frame::encode_frame(&header, payload, &mut out);
        out
    }
}
