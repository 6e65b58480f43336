//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, drive the status LED,
//! and so on.

use crate::provisioning::WifiState;

/// Structured events emitted by the node core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The service has started; `provisioned` when stored credentials exist.
    Started { provisioned: bool },

    /// Provisioning advertisement started or stopped.
    ProvisioningStarted,
    ProvisioningStopped,

    /// A central connected to or left the provisioning service.
    CentralConnected,
    CentralDisconnected,

    /// The station state changed.
    WifiStateChanged(WifiState),

    CredentialsStored,
    CredentialsCleared,

    /// A scan finished with this many APs.
    ScanComplete(usize),

    /// A mesh model's present state changed.
    MeshChanged { onoff: bool, level: i16 },

    /// A request failed; the string names the operation.
    Failed(&'static str),
}
