//! Node service: the hexagonal core.
//!
//! [`NodeService`] owns the provisioning GATT server, the credential
//! handler and the mesh models. All platform I/O flows through port
//! traits passed in at call sites, so the whole service runs against
//! mock adapters in tests.
//!
//! ```text
//!  GATT writes ──▶ ┌──────────────────────────┐ ──▶ EventSink
//!  Event queue ──▶ │       NodeService        │
//!  Mesh access ──▶ │  BlsyncServer · MeshNode │ ──▶ outbox ──▶ Sender
//!                  └──────────────────────────┘
//!                               │
//!                               ▼
//!            WifiPort · AdvertisingPort · StoragePort
//! ```

use std::collections::VecDeque;

use log::{info, warn};

use crate::config::NodeConfig;
use crate::drivers::button::ButtonEvent;
use crate::error::{Error, Result};
use crate::events::Event;
use crate::gatt::BlsyncServer;
use crate::mesh::{MeshMessage, MeshNode, MeshReply};
use crate::protocol::payload::Message;
use crate::protocol::transfer::AckPacket;
use crate::provisioning::{ProvisionRequest, WifiCredentials, WifiProvisioner, WifiState};

use super::commands::{AppCommand, CommandReply};
use super::events::AppEvent;
use super::ports::{AdvertisingPort, EventSink, StoragePort, WifiPort};

/// Storage location of the provisioned station credentials.
pub const CRED_NAMESPACE: &str = "blsync";
pub const CRED_KEY: &str = "wifi";
const CRED_BUF_LEN: usize = 128;

/// Every platform port the service drives.
pub trait NodePorts: WifiPort + AdvertisingPort + StoragePort {}

impl<T: WifiPort + AdvertisingPort + StoragePort> NodePorts for T {}

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService {
    server: BlsyncServer<WifiProvisioner>,
    mesh: MeshNode,
    outbox: VecDeque<Message>,
    provisioned: bool,
    wifi_state: WifiState,
    mesh_state: (bool, i16),
}

impl NodeService {
    /// Construct from validated configuration.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate().map_err(Error::Config)?;
        let provisioner = WifiProvisioner::new(config.protocol.max_scan_results);
        Ok(Self {
            server: BlsyncServer::new(&config.protocol, provisioner),
            mesh: MeshNode::new(&config.mesh),
            outbox: VecDeque::new(),
            provisioned: false,
            wifi_state: WifiState::Idle,
            mesh_state: (false, 0),
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load stored credentials and join the network if there are any.
    pub fn start(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        match load_credentials(&*hw) {
            Some(creds) => {
                info!("NodeService: stored credentials for '{}'", creds.ssid);
                self.provisioned = true;
                if let Err(e) = hw.connect(&creds) {
                    warn!("NodeService: connect failed: {}", e);
                    sink.emit(&AppEvent::Failed("connect"));
                }
            }
            None => info!("NodeService: not provisioned; long press to start"),
        }
        sink.emit(&AppEvent::Started {
            provisioned: self.provisioned,
        });
        self.poll_wifi(hw, sink);
    }

    // ── Event handling ────────────────────────────────────────

    /// Process one event from the ISR queue.
    pub fn handle_event(
        &mut self,
        event: Event,
        hw: &mut impl NodePorts,
        sink: &mut impl EventSink,
    ) {
        match event {
            Event::Button(ButtonEvent::ShortPress) => {
                let on = !self.mesh.onoff.present();
                self.mesh.onoff.set_local(on);
                self.report_mesh(sink);
            }
            Event::Button(ButtonEvent::LongPress) => self.start_provisioning(hw, sink),
            Event::Button(ButtonEvent::LongLongPress) => self.clear_credentials(hw, sink),
            Event::BleConnected => {
                self.server.on_connect();
                sink.emit(&AppEvent::CentralConnected);
            }
            Event::BleDisconnected => {
                self.server.on_disconnect();
                self.outbox.clear();
                sink.emit(&AppEvent::CentralDisconnected);
            }
            Event::ProvisioningComplete => self.stop_provisioning(hw, sink),
            Event::MeshStateChanged => self.report_mesh(sink),
        }
    }

    /// A GATT write from the central at `now_ms`.
    ///
    /// Returns the ack to notify back. Completed messages are handled
    /// before returning; replies are queued in the outbox.
    pub fn on_gatt_write(
        &mut self,
        data: &[u8],
        now_ms: u64,
        hw: &mut impl NodePorts,
        sink: &mut impl EventSink,
    ) -> Result<Option<AckPacket>> {
        let outcome = self.server.on_write(data, now_ms)?;
        if let Some(reply) = outcome.reply {
            self.outbox.push_back(reply);
        }
        if outcome.event.is_some() {
            self.process_requests(hw, sink);
        }
        Ok(outcome.ack)
    }

    /// A mesh access message for one of our models.
    pub fn on_mesh_message(
        &mut self,
        msg: &MeshMessage<'_>,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> Option<MeshReply> {
        let reply = self.mesh.handle(msg, now_ms);
        self.report_mesh(sink);
        reply
    }

    /// Periodic housekeeping: mesh transitions and station state.
    pub fn tick(&mut self, now_ms: u64, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        if self.mesh.tick(now_ms) {
            self.report_mesh(sink);
        }
        self.poll_wifi(hw, sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a local command (CLI).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl NodePorts,
        sink: &mut impl EventSink,
    ) -> CommandReply {
        match cmd {
            AppCommand::ShowState => {
                let (wifi, ip) = hw.state();
                CommandReply::State {
                    wifi,
                    ip,
                    provisioned: self.provisioned,
                    advertising: hw.is_advertising(),
                }
            }
            AppCommand::ClearCredentials => {
                self.clear_credentials(hw, sink);
                CommandReply::Done
            }
            AppCommand::MeshOnOffGet => CommandReply::OnOff(self.mesh.onoff.present()),
            AppCommand::MeshOnOffSet(on) => {
                self.mesh.onoff.set_local(on);
                self.report_mesh(sink);
                CommandReply::OnOff(on)
            }
            AppCommand::MeshLevelGet => CommandReply::Level(self.mesh.level.present()),
            AppCommand::MeshLevelSet(level) => {
                self.mesh.level.set_local(level);
                self.report_mesh(sink);
                CommandReply::Level(level)
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Next message to send to the central.
    pub fn take_outbound(&mut self) -> Option<Message> {
        self.outbox.pop_front()
    }

    pub fn is_provisioned(&self) -> bool {
        self.provisioned
    }

    pub fn server(&self) -> &BlsyncServer<WifiProvisioner> {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut BlsyncServer<WifiProvisioner> {
        &mut self.server
    }

    pub fn mesh(&self) -> &MeshNode {
        &self.mesh
    }

    // ── Internal ──────────────────────────────────────────────

    fn start_provisioning(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        if hw.is_advertising() {
            return;
        }
        match hw.start() {
            Ok(()) => {
                info!("NodeService: provisioning advertisement started");
                sink.emit(&AppEvent::ProvisioningStarted);
            }
            Err(e) => {
                warn!("NodeService: advertising failed: {}", e);
                sink.emit(&AppEvent::Failed("advertising"));
            }
        }
    }

    fn stop_provisioning(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        if hw.is_advertising() {
            hw.stop();
            sink.emit(&AppEvent::ProvisioningStopped);
        }
    }

    fn clear_credentials(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        if let Err(e) = hw.delete(CRED_NAMESPACE, CRED_KEY) {
            warn!("NodeService: credential erase failed: {}", e);
            sink.emit(&AppEvent::Failed("erase"));
            return;
        }
        if let Err(e) = hw.disconnect() {
            warn!("NodeService: disconnect failed: {}", e);
        }
        self.server.handler_mut().clear();
        self.provisioned = false;
        info!("NodeService: credentials cleared");
        sink.emit(&AppEvent::CredentialsCleared);
        self.poll_wifi(hw, sink);
    }

    fn process_requests(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        while let Some(request) = self.server.handler_mut().take_request() {
            match request {
                ProvisionRequest::Connect(creds) => self.connect(&creds, hw, sink),
                ProvisionRequest::Disconnect => {
                    if let Err(e) = hw.disconnect() {
                        warn!("NodeService: disconnect failed: {}", e);
                        sink.emit(&AppEvent::Failed("disconnect"));
                    }
                }
                ProvisionRequest::Scan => match hw.scan() {
                    Ok(aps) => {
                        sink.emit(&AppEvent::ScanComplete(aps.len()));
                        let msg = self.server.handler().scan_results_message(&aps);
                        self.outbox.push_back(msg);
                    }
                    Err(e) => {
                        warn!("NodeService: scan failed: {}", e);
                        sink.emit(&AppEvent::Failed("scan"));
                    }
                },
                ProvisionRequest::ClearCredentials => self.clear_credentials(hw, sink),
            }
            self.poll_wifi(hw, sink);
        }
    }

    fn connect(&mut self, creds: &WifiCredentials, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        info!("NodeService: joining '{}'", creds.ssid);
        if let Err(e) = hw.connect(creds) {
            warn!("NodeService: connect failed: {}", e);
            self.server.handler_mut().set_state(WifiState::Failed, [0; 4]);
            sink.emit(&AppEvent::Failed("connect"));
            return;
        }
        match postcard::to_allocvec(creds) {
            Ok(blob) => match hw.write(CRED_NAMESPACE, CRED_KEY, &blob) {
                Ok(()) => {
                    self.provisioned = true;
                    sink.emit(&AppEvent::CredentialsStored);
                }
                Err(e) => {
                    warn!("NodeService: credential store failed: {}", e);
                    sink.emit(&AppEvent::Failed("store"));
                }
            },
            Err(e) => warn!("NodeService: credential encode failed: {}", e),
        }
    }

    /// Mirror the station state into the provisioner and react to changes.
    fn poll_wifi(&mut self, hw: &mut impl NodePorts, sink: &mut impl EventSink) {
        let (state, ip) = hw.state();
        self.server.handler_mut().set_state(state, ip);
        if state == self.wifi_state {
            return;
        }
        self.wifi_state = state;
        sink.emit(&AppEvent::WifiStateChanged(state));
        if state == WifiState::Connected && self.provisioned {
            self.stop_provisioning(hw, sink);
        }
    }

    fn report_mesh(&mut self, sink: &mut impl EventSink) {
        let now = (self.mesh.onoff.present(), self.mesh.level.present());
        if now != self.mesh_state {
            self.mesh_state = now;
            sink.emit(&AppEvent::MeshChanged {
                onoff: now.0,
                level: now.1,
            });
        }
    }
}

fn load_credentials(hw: &impl StoragePort) -> Option<WifiCredentials> {
    if !hw.exists(CRED_NAMESPACE, CRED_KEY) {
        return None;
    }
    let mut buf = [0u8; CRED_BUF_LEN];
    let len = match hw.read(CRED_NAMESPACE, CRED_KEY, &mut buf) {
        Ok(len) => len,
        Err(e) => {
            warn!("NodeService: credential read failed: {}", e);
            return None;
        }
    };
    match postcard::from_bytes(&buf[..len]) {
        Ok(creds) => Some(creds),
        Err(e) => {
            warn!("NodeService: stored credentials corrupt: {}", e);
            None
        }
    }
}
