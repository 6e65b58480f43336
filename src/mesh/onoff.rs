//! Generic OnOff server.

use log::{debug, info, warn};

use super::dedup::DuplicateFilter;
use super::model::{MeshReply, MsgCtx, OpEntry, ServerModel};
use super::transition::{Transition, TransitionTime};

pub const MODEL_ID_GEN_ONOFF_SRV: u16 = 0x1000;

pub const OP_GEN_ONOFF_GET: u32 = 0x8201;
pub const OP_GEN_ONOFF_SET: u32 = 0x8202;
pub const OP_GEN_ONOFF_SET_UNACK: u32 = 0x8203;
pub const OP_GEN_ONOFF_STATUS: u32 = 0x8204;

pub struct GenOnOffServer {
    present: bool,
    target: bool,
    transition: Option<Transition>,
    dedup: DuplicateFilter,
}

impl GenOnOffServer {
    pub fn new(dedup_window_ms: u32) -> Self {
        Self {
            present: false,
            target: false,
            transition: None,
            dedup: DuplicateFilter::new(dedup_window_ms),
        }
    }

    pub fn present(&self) -> bool {
        self.present
    }

    pub fn target(&self) -> bool {
        self.target
    }

    /// Local change (button, CLI); cancels any transition.
    pub fn set_local(&mut self, on: bool) {
        self.present = on;
        self.target = on;
        self.transition = None;
    }

    fn status(&self, ctx: &MsgCtx, now_ms: u64) -> MeshReply {
        match &self.transition {
            Some(t) => MeshReply::to(
                ctx,
                OP_GEN_ONOFF_STATUS,
                &[
                    u8::from(self.present),
                    u8::from(self.target),
                    t.remaining(now_ms).0,
                ],
            ),
            None => MeshReply::to(ctx, OP_GEN_ONOFF_STATUS, &[u8::from(self.present)]),
        }
    }

    /// `[onoff][tid]([transition][delay])`
    fn set(&mut self, ctx: &MsgCtx, p: &[u8], now_ms: u64, acked: bool) -> Option<MeshReply> {
        let (onoff, tid) = (p[0], p[1]);
        if onoff > 1 {
            warn!("mesh: onoff value {} out of range", onoff);
            return None;
        }
        let (time, delay) = match p.len() {
            2 => (TransitionTime::INSTANT, 0),
            4 => (TransitionTime(p[2]), p[3]),
            n => {
                warn!("mesh: onoff set with {} byte(s)", n);
                return None;
            }
        };

        if self.dedup.is_duplicate(tid, ctx.src, ctx.dst, now_ms) {
            debug!("mesh: duplicate onoff tid {} from 0x{:04x}", tid, ctx.src);
            return acked.then(|| self.status(ctx, now_ms));
        }

        let on = onoff == 1;
        self.target = on;
        self.transition = Transition::new(now_ms, time, delay);
        if self.transition.is_none() {
            self.present = on;
        } else {
            self.tick(now_ms);
        }
        info!("mesh: onoff → {} (from 0x{:04x})", on, ctx.src);
        acked.then(|| self.status(ctx, now_ms))
    }
}

fn op_get(s: &mut GenOnOffServer, ctx: &MsgCtx, _p: &[u8], now_ms: u64) -> Option<MeshReply> {
    Some(s.status(ctx, now_ms))
}

fn op_set(s: &mut GenOnOffServer, ctx: &MsgCtx, p: &[u8], now_ms: u64) -> Option<MeshReply> {
    s.set(ctx, p, now_ms, true)
}

fn op_set_unack(s: &mut GenOnOffServer, ctx: &MsgCtx, p: &[u8], now_ms: u64) -> Option<MeshReply> {
    s.set(ctx, p, now_ms, false)
}

const GEN_ONOFF_OPS: &[OpEntry<GenOnOffServer>] = &[
    OpEntry {
        opcode: OP_GEN_ONOFF_GET,
        min_len: 0,
        handler: op_get,
    },
    OpEntry {
        opcode: OP_GEN_ONOFF_SET,
        min_len: 2,
        handler: op_set,
    },
    OpEntry {
        opcode: OP_GEN_ONOFF_SET_UNACK,
        min_len: 2,
        handler: op_set_unack,
    },
];

impl ServerModel for GenOnOffServer {
    const MODEL_ID: u16 = MODEL_ID_GEN_ONOFF_SRV;

    fn op_table() -> &'static [OpEntry<Self>] {
        GEN_ONOFF_OPS
    }

    /// Turning on takes effect when the transition starts, turning off
    /// when it ends.
    fn tick(&mut self, now_ms: u64) -> bool {
        let Some(t) = self.transition else {
            return false;
        };
        let before = self.present;
        if t.is_done(now_ms) {
            self.present = self.target;
            self.transition = None;
        } else if self.target && t.has_started(now_ms) {
            self.present = true;
        }
        before != self.present
    }
}
