//! BLE mesh server model glue.
//!
//! The mesh stack itself (network, transport, provisioning) is external.
//! This module owns the model state that the stack's access layer
//! dispatches into:
//!
//! ```text
//!  access PDU ──▶ decode_opcode ──▶ MeshNode::handle ──▶ OpEntry table
//!                                         │                  │
//!                                         ▼                  ▼
//!                                   MeshReply (status)   model state
//! ```

pub mod dedup;
pub mod level;
pub mod model;
pub mod onoff;
pub mod transition;

use crate::config::MeshConfig;

pub use level::GenLevelServer;
pub use model::{MeshMessage, MeshReply, MsgCtx, ServerModel};
pub use onoff::GenOnOffServer;

/// The models on the node's primary element.
pub struct MeshNode {
    pub onoff: GenOnOffServer,
    pub level: GenLevelServer,
}

impl MeshNode {
    pub fn new(config: &MeshConfig) -> Self {
        Self {
            onoff: GenOnOffServer::new(config.dedup_window_ms),
            level: GenLevelServer::new(config.dedup_window_ms),
        }
    }

    /// Route a message to the model that owns its opcode.
    pub fn handle(&mut self, msg: &MeshMessage<'_>, now_ms: u64) -> Option<MeshReply> {
        match msg.opcode {
            onoff::OP_GEN_ONOFF_GET..=onoff::OP_GEN_ONOFF_STATUS => self.onoff.handle(msg, now_ms),
            level::OP_GEN_LEVEL_GET..=level::OP_GEN_DELTA_SET_UNACK => {
                self.level.handle(msg, now_ms)
            }
            other => {
                log::warn!("mesh: no model for opcode 0x{:04x}", other);
                None
            }
        }
    }

    /// Advance transitions; `true` when any present state changed.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        let onoff = self.onoff.tick(now_ms);
        let level = self.level.tick(now_ms);
        onoff || level
    }
}
