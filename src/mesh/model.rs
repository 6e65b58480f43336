//! Access-layer message shapes and per-model opcode tables.

use heapless::Vec;
use log::warn;

/// Largest status payload any of our server models sends.
pub const MAX_REPLY_LEN: usize = 8;
/// Opcode plus status payload.
pub const MAX_PDU_LEN: usize = MAX_REPLY_LEN + 3;

/// Addressing context of a received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgCtx {
    pub src: u16,
    pub dst: u16,
    pub app_idx: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshMessage<'a> {
    pub opcode: u32,
    pub ctx: MsgCtx,
    pub payload: &'a [u8],
}

/// A status message to send back to `dst` (the request's source).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshReply {
    pub opcode: u32,
    pub dst: u16,
    pub app_idx: u16,
    pub payload: Vec<u8, MAX_REPLY_LEN>,
}

impl MeshReply {
    pub fn to(ctx: &MsgCtx, opcode: u32, payload: &[u8]) -> Self {
        let mut buf = Vec::new();
        // Callers build payloads well under MAX_REPLY_LEN.
        let _ = buf.extend_from_slice(&payload[..payload.len().min(MAX_REPLY_LEN)]);
        Self {
            opcode,
            dst: ctx.src,
            app_idx: ctx.app_idx,
            payload: buf,
        }
    }

    /// Access PDU: opcode then parameters.
    pub fn to_pdu(&self) -> Vec<u8, MAX_PDU_LEN> {
        let mut pdu = Vec::new();
        if encode_opcode(self.opcode, &mut pdu) {
            let _ = pdu.extend_from_slice(&self.payload);
        }
        pdu
    }
}

pub type OpHandler<S> = fn(&mut S, &MsgCtx, &[u8], u64) -> Option<MeshReply>;

/// One row of a model's opcode table.
pub struct OpEntry<S: 'static> {
    pub opcode: u32,
    pub min_len: usize,
    pub handler: OpHandler<S>,
}

/// Look up `msg.opcode` in `table` and run its handler at `now_ms`.
///
/// Unknown opcodes and short payloads are dropped.
pub fn dispatch<S>(
    table: &[OpEntry<S>],
    server: &mut S,
    msg: &MeshMessage<'_>,
    now_ms: u64,
) -> Option<MeshReply> {
    let Some(entry) = table.iter().find(|e| e.opcode == msg.opcode) else {
        warn!("mesh: unhandled opcode 0x{:04x}", msg.opcode);
        return None;
    };
    if msg.payload.len() < entry.min_len {
        warn!(
            "mesh: opcode 0x{:04x} payload too short ({} < {})",
            msg.opcode,
            msg.payload.len(),
            entry.min_len
        );
        return None;
    }
    (entry.handler)(server, &msg.ctx, msg.payload, now_ms)
}

/// A SIG server model bound to an element.
pub trait ServerModel: Sized + 'static {
    const MODEL_ID: u16;

    fn op_table() -> &'static [OpEntry<Self>];

    fn handle(&mut self, msg: &MeshMessage<'_>, now_ms: u64) -> Option<MeshReply> {
        dispatch(Self::op_table(), self, msg, now_ms)
    }

    /// Advance any in-flight transition. Returns `true` when the
    /// present state changed.
    fn tick(&mut self, now_ms: u64) -> bool;
}

// ── Opcode wire format ───────────────────────────────────────

/// Split an access PDU into `(opcode, parameters)`.
///
/// 1-byte `0xxxxxxx` (0x7F reserved), 2-byte `10xxxxxx`, 3-byte `11xxxxxx`.
pub fn decode_opcode(pdu: &[u8]) -> Option<(u32, &[u8])> {
    let first = *pdu.first()?;
    let len = match first >> 6 {
        0b00 | 0b01 if first == 0x7F => return None,
        0b00 | 0b01 => 1,
        0b10 => 2,
        _ => 3,
    };
    if pdu.len() < len {
        return None;
    }
    let opcode = pdu[..len].iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b));
    Some((opcode, &pdu[len..]))
}

pub fn encode_opcode(opcode: u32, out: &mut Vec<u8, MAX_PDU_LEN>) -> bool {
    let bytes = opcode.to_be_bytes();
    let skip = if opcode < 0x80 {
        3
    } else if opcode <= 0xFFFF {
        2
    } else {
        1
    };
    out.extend_from_slice(&bytes[skip..]).is_ok()
}
