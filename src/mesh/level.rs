//! Generic Level server.
//!
//! Delta Set messages that share a transaction (same `tid`, `src`,
//! `dst` within the window) are applied relative to the level at the
//! start of that transaction, so a retransmitted or refined delta does
//! not accumulate.

use log::{debug, info, warn};

use super::dedup::DuplicateFilter;
use super::model::{MeshReply, MsgCtx, OpEntry, ServerModel};
use super::transition::{Transition, TransitionTime};

pub const MODEL_ID_GEN_LEVEL_SRV: u16 = 0x1002;

pub const OP_GEN_LEVEL_GET: u32 = 0x8205;
pub const OP_GEN_LEVEL_SET: u32 = 0x8206;
pub const OP_GEN_LEVEL_SET_UNACK: u32 = 0x8207;
pub const OP_GEN_LEVEL_STATUS: u32 = 0x8208;
pub const OP_GEN_DELTA_SET: u32 = 0x8209;
pub const OP_GEN_DELTA_SET_UNACK: u32 = 0x820A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeltaTxn {
    tid: u8,
    src: u16,
    dst: u16,
    at_ms: u64,
    base: i16,
}

pub struct GenLevelServer {
    present: i16,
    target: i16,
    start: i16,
    transition: Option<Transition>,
    dedup: DuplicateFilter,
    delta: Option<DeltaTxn>,
    window_ms: u32,
}

fn parse_transition(rest: &[u8]) -> Option<(TransitionTime, u8)> {
    match rest {
        [] => Some((TransitionTime::INSTANT, 0)),
        [time, delay] => Some((TransitionTime(*time), *delay)),
        _ => None,
    }
}

impl GenLevelServer {
    pub fn new(dedup_window_ms: u32) -> Self {
        Self {
            present: 0,
            target: 0,
            start: 0,
            transition: None,
            dedup: DuplicateFilter::new(dedup_window_ms),
            delta: None,
            window_ms: dedup_window_ms,
        }
    }

    pub fn present(&self) -> i16 {
        self.present
    }

    pub fn target(&self) -> i16 {
        self.target
    }

    /// Local change (CLI); cancels any transition.
    pub fn set_local(&mut self, level: i16) {
        self.present = level;
        self.target = level;
        self.transition = None;
    }

    fn status(&self, ctx: &MsgCtx, now_ms: u64) -> MeshReply {
        let [p0, p1] = self.present.to_le_bytes();
        match &self.transition {
            Some(t) => {
                let [t0, t1] = self.target.to_le_bytes();
                MeshReply::to(
                    ctx,
                    OP_GEN_LEVEL_STATUS,
                    &[p0, p1, t0, t1, t.remaining(now_ms).0],
                )
            }
            None => MeshReply::to(ctx, OP_GEN_LEVEL_STATUS, &[p0, p1]),
        }
    }

    fn move_to(&mut self, level: i16, time: TransitionTime, delay: u8, now_ms: u64) {
        self.target = level;
        self.start = self.present;
        self.transition = Transition::new(now_ms, time, delay);
        if self.transition.is_none() {
            self.present = level;
        }
        info!("mesh: level → {}", level);
    }

    /// `[level i16][tid]([transition][delay])`
    fn set(&mut self, ctx: &MsgCtx, p: &[u8], now_ms: u64, acked: bool) -> Option<MeshReply> {
        let level = i16::from_le_bytes([p[0], p[1]]);
        let tid = p[2];
        let Some((time, delay)) = parse_transition(&p[3..]) else {
            warn!("mesh: level set with {} byte(s)", p.len());
            return None;
        };
        if self.dedup.is_duplicate(tid, ctx.src, ctx.dst, now_ms) {
            debug!("mesh: duplicate level tid {} from 0x{:04x}", tid, ctx.src);
        } else {
            self.delta = None;
            self.move_to(level, time, delay, now_ms);
        }
        acked.then(|| self.status(ctx, now_ms))
    }

    /// `[delta i32][tid]([transition][delay])`
    fn delta_set(&mut self, ctx: &MsgCtx, p: &[u8], now_ms: u64, acked: bool) -> Option<MeshReply> {
        let delta = i32::from_le_bytes([p[0], p[1], p[2], p[3]]);
        let tid = p[4];
        let Some((time, delay)) = parse_transition(&p[5..]) else {
            warn!("mesh: delta set with {} byte(s)", p.len());
            return None;
        };

        let base = match self.delta {
            Some(txn)
                if txn.tid == tid
                    && txn.src == ctx.src
                    && txn.dst == ctx.dst
                    && now_ms.saturating_sub(txn.at_ms) <= u64::from(self.window_ms) =>
            {
                txn.base
            }
            _ => {
                self.delta = Some(DeltaTxn {
                    tid,
                    src: ctx.src,
                    dst: ctx.dst,
                    at_ms: now_ms,
                    base: self.present,
                });
                self.present
            }
        };

        let level = (i32::from(base) + delta).clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        self.move_to(level, time, delay, now_ms);
        acked.then(|| self.status(ctx, now_ms))
    }
}

fn op_get(s: &mut GenLevelServer, ctx: &MsgCtx, _p: &[u8], now_ms: u64) -> Option<MeshReply> {
    Some(s.status(ctx, now_ms))
}

fn op_set(s: &mut GenLevelServer, ctx: &MsgCtx, p: &[u8], now_ms: u64) -> Option<MeshReply> {
    s.set(ctx, p, now_ms, true)
}

fn op_set_unack(s: &mut GenLevelServer, ctx: &MsgCtx, p: &[u8], now_ms: u64) -> Option<MeshReply> {
    s.set(ctx, p, now_ms, false)
}

fn op_delta(s: &mut GenLevelServer, ctx: &MsgCtx, p: &[u8], now_ms: u64) -> Option<MeshReply> {
    s.delta_set(ctx, p, now_ms, true)
}

fn op_delta_unack(s: &mut GenLevelServer, ctx: &MsgCtx, p: &[u8], now_ms: u64) -> Option<MeshReply> {
    s.delta_set(ctx, p, now_ms, false)
}

const GEN_LEVEL_OPS: &[OpEntry<GenLevelServer>] = &[
    OpEntry {
        opcode: OP_GEN_LEVEL_GET,
        min_len: 0,
        handler: op_get,
    },
    OpEntry {
        opcode: OP_GEN_LEVEL_SET,
        min_len: 3,
        handler: op_set,
    },
    OpEntry {
        opcode: OP_GEN_LEVEL_SET_UNACK,
        min_len: 3,
        handler: op_set_unack,
    },
    OpEntry {
        opcode: OP_GEN_DELTA_SET,
        min_len: 5,
        handler: op_delta,
    },
    OpEntry {
        opcode: OP_GEN_DELTA_SET_UNACK,
        min_len: 5,
        handler: op_delta_unack,
    },
];

impl ServerModel for GenLevelServer {
    const MODEL_ID: u16 = MODEL_ID_GEN_LEVEL_SRV;

    fn op_table() -> &'static [OpEntry<Self>] {
        GEN_LEVEL_OPS
    }

    /// Linear interpolation from the level at Set time to the target.
    fn tick(&mut self, now_ms: u64) -> bool {
        let Some(t) = self.transition else {
            return false;
        };
        let before = self.present;
        if t.is_done(now_ms) {
            self.present = self.target;
            self.transition = None;
        } else if t.has_started(now_ms) {
            let (elapsed, duration) = t.progress(now_ms);
            let span = i64::from(self.target) - i64::from(self.start);
            let step = span * i64::from(elapsed) / i64::from(duration.max(1));
            self.present = (i64::from(self.start) + step) as i16;
        }
        before != self.present
    }
}
