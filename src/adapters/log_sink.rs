//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the logger (UART on the board, stderr in the simulator).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { provisioned } => {
                info!("START | provisioned={}", provisioned);
            }
            AppEvent::ProvisioningStarted => info!("PROV  | advertising"),
            AppEvent::ProvisioningStopped => info!("PROV  | stopped"),
            AppEvent::CentralConnected => info!("BLE   | central connected"),
            AppEvent::CentralDisconnected => info!("BLE   | central disconnected"),
            AppEvent::WifiStateChanged(state) => info!("WIFI  | {:?}", state),
            AppEvent::CredentialsStored => info!("CRED  | stored"),
            AppEvent::CredentialsCleared => info!("CRED  | cleared"),
            AppEvent::ScanComplete(count) => info!("WIFI  | scan found {} APs", count),
            AppEvent::MeshChanged { onoff, level } => {
                info!("MESH  | onoff={} level={}", u8::from(*onoff), level);
            }
            AppEvent::Failed(what) => warn!("FAIL  | {}", what),
        }
    }
}
