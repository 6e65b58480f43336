//! Inbound commands to the node service.
//!
//! Local actions (CLI, debug console) that the
//! [`NodeService`](super::service::NodeService) interprets and acts upon.

use core::fmt;

use crate::provisioning::WifiState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Report provisioning and station state.
    ShowState,

    /// Erase stored credentials and disconnect.
    ClearCredentials,

    MeshOnOffGet,
    MeshOnOffSet(bool),
    MeshLevelGet,
    MeshLevelSet(i16),
}

/// Result of an [`AppCommand`], printable on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandReply {
    Done,
    State {
        wifi: WifiState,
        ip: [u8; 4],
        provisioned: bool,
        advertising: bool,
    },
    OnOff(bool),
    Level(i16),
    Failed(&'static str),
}

impl fmt::Display for CommandReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "ok"),
            Self::State {
                wifi,
                ip,
                provisioned,
                advertising,
            } => write!(
                f,
                "wifi={:?} ip={}.{}.{}.{} provisioned={} advertising={}",
                wifi, ip[0], ip[1], ip[2], ip[3], provisioned, advertising
            ),
            Self::OnOff(on) => write!(f, "onoff={}", u8::from(*on)),
            Self::Level(level) => write!(f, "level={level}"),
            Self::Failed(what) => write!(f, "failed: {what}"),
        }
    }
}
