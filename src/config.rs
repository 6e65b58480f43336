//! Node configuration parameters
//!
//! All tunable parameters for the BLE sync transport, the mesh server
//! models and the button driver. Values can be overridden from the board
//! description or a persisted blob; `validate()` must pass before use.

use serde::{Deserialize, Serialize};

/// BLE sync transport timing and sizing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// How long the sender waits for each ack (milliseconds)
    pub ack_timeout_ms: u32,
    /// Retransmissions per packet after the first attempt
    pub max_retries: u8,
    /// Receive window re-armed by every accepted fragment (milliseconds)
    pub reassembly_timeout_ms: u32,
    /// Largest message body the receiver will allocate for
    pub max_message_len: u16,
    /// ATT MTU assumed until the central negotiates a larger one
    pub default_mtu: u16,
    /// Cap on APs reported in one scan result message
    pub max_scan_results: u8,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: 3000,
            max_retries: 1,
            reassembly_timeout_ms: 5000,
            max_message_len: 1024,
            default_mtu: 23,
            max_scan_results: 16,
        }
    }
}

/// Press-window thresholds, measured from the initial edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub debounce_ms: u32,
    /// Releases before this are short presses
    pub short_press_end_ms: u32,
    pub long_press_start_ms: u32,
    /// Holding past this posts the long press without waiting for release
    pub long_press_end_ms: u32,
    pub long_long_press_ms: u32,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            short_press_end_ms: 3000,
            long_press_start_ms: 3000,
            long_press_end_ms: 10_000,
            long_long_press_ms: 15_000,
        }
    }
}

impl ButtonConfig {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.debounce_ms == 0 {
            return Err("button debounce must be non-zero");
        }
        if self.short_press_end_ms <= self.debounce_ms {
            return Err("short press window ends inside debounce");
        }
        if self.long_press_start_ms < self.short_press_end_ms {
            return Err("long press starts inside the short press window");
        }
        if self.long_press_end_ms <= self.long_press_start_ms {
            return Err("long press window is empty");
        }
        if self.long_long_press_ms <= self.long_press_end_ms {
            return Err("long-long press must follow the long press window");
        }
        Ok(())
    }
}

/// Mesh server model parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshConfig {
    /// Window in which an identical (tid, src, dst) is not reapplied
    pub dedup_window_ms: u32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 6000,
        }
    }
}

/// Core node configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub protocol: ProtocolConfig,
    pub button: ButtonConfig,
    pub mesh: MeshConfig,
}

impl NodeConfig {
    /// Range-check every field. Rejects rather than clamps.
    pub fn validate(&self) -> Result<(), &'static str> {
        let p = &self.protocol;
        if p.ack_timeout_ms == 0 {
            return Err("ack timeout must be non-zero");
        }
        if p.reassembly_timeout_ms < p.ack_timeout_ms {
            return Err("reassembly window shorter than one ack timeout");
        }
        if p.default_mtu < 23 {
            return Err("MTU below the BLE minimum of 23");
        }
        if p.max_message_len == 0 {
            return Err("max message length must be non-zero");
        }
        if self.mesh.dedup_window_ms == 0 {
            return Err("mesh dedup window must be non-zero");
        }
        self.button.validate()
    }
}
