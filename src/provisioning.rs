//! Wi-Fi / Zigbee credential provisioning over BLE sync.
//!
//! [`WifiProvisioner`] is the receive handler registered with the
//! transport. Data messages stage credentials; commands queue
//! [`ProvisionRequest`]s for the application task, except `GetState`
//! which is answered immediately.

use heapless::{Deque, String};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::ProvisioningError;
use crate::protocol::payload::{Command, DataId, Message, ProHandler};

// ── Constants ────────────────────────────────────────────────

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;
const MIN_WPA2_PASSWORD_LEN: usize = 8;
pub const BSSID_LEN: usize = 6;
pub const LINK_KEY_LEN: usize = 16;

const REQUEST_QUEUE_CAP: usize = 4;

// ── Types ────────────────────────────────────────────────────

/// Station credentials, persisted by the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String<MAX_SSID_LEN>,
    pub password: String<MAX_PASSWORD_LEN>,
    pub bssid: Option<[u8; BSSID_LEN]>,
}

/// Work for the application task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionRequest {
    Connect(WifiCredentials),
    Disconnect,
    Scan,
    ClearCredentials,
}

/// Station state as reported to the central.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum WifiState {
    #[default]
    Idle = 0,
    Connecting = 1,
    Connected = 2,
    Disconnected = 3,
    Failed = 4,
}

impl WifiState {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::Idle),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::Disconnected),
            4 => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One access point from a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApRecord {
    pub ssid: String<MAX_SSID_LEN>,
    pub bssid: [u8; BSSID_LEN],
    pub rssi: i8,
    pub channel: u8,
    pub auth: u8,
}

// ── Validation ───────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn parse_ssid(raw: &[u8]) -> Result<String<MAX_SSID_LEN>, ProvisioningError> {
    let s = core::str::from_utf8(raw).map_err(|_| ProvisioningError::InvalidUtf8)?;
    if s.is_empty() || !is_printable_ascii(s) {
        return Err(ProvisioningError::InvalidSsid);
    }
    String::try_from(s).map_err(|_| ProvisioningError::InvalidSsid)
}

fn parse_password(raw: &[u8]) -> Result<String<MAX_PASSWORD_LEN>, ProvisioningError> {
    let s = core::str::from_utf8(raw).map_err(|_| ProvisioningError::InvalidUtf8)?;
    if !s.is_empty() && s.len() < MIN_WPA2_PASSWORD_LEN {
        return Err(ProvisioningError::InvalidPassword);
    }
    String::try_from(s).map_err(|_| ProvisioningError::InvalidPassword)
}

fn parse_fixed<const N: usize>(raw: &[u8], err: ProvisioningError) -> Result<[u8; N], ProvisioningError> {
    <[u8; N]>::try_from(raw).map_err(|_| err)
}

// ── Provisioner ──────────────────────────────────────────────

pub struct WifiProvisioner {
    ssid: Option<String<MAX_SSID_LEN>>,
    password: String<MAX_PASSWORD_LEN>,
    bssid: Option<[u8; BSSID_LEN]>,
    link_key: Option<[u8; LINK_KEY_LEN]>,
    state: WifiState,
    ip: [u8; 4],
    requests: Deque<ProvisionRequest, REQUEST_QUEUE_CAP>,
    max_scan_results: u8,
}

impl WifiProvisioner {
    pub fn new(max_scan_results: u8) -> Self {
        Self {
            ssid: None,
            password: String::new(),
            bssid: None,
            link_key: None,
            state: WifiState::Idle,
            ip: [0; 4],
            requests: Deque::new(),
            max_scan_results,
        }
    }

    /// Stage one data value. Rejected input leaves state unchanged.
    pub fn apply_data(&mut self, id: u8, data: &[u8]) -> Result<(), ProvisioningError> {
        match DataId::from_id(id) {
            Some(DataId::Ssid) => self.ssid = Some(parse_ssid(data)?),
            Some(DataId::Password) => self.password = parse_password(data)?,
            Some(DataId::Bssid) => {
                self.bssid = Some(parse_fixed(data, ProvisioningError::InvalidBssid)?);
            }
            Some(DataId::ZigbeeLinkKey) => {
                self.link_key = Some(parse_fixed(data, ProvisioningError::InvalidLinkKey)?);
            }
            // Node → central only.
            Some(DataId::ScanResults | DataId::State) | None => {
                return Err(ProvisioningError::UnknownId(id));
            }
        }
        Ok(())
    }

    /// Run one command; `GetState` yields its reply.
    pub fn apply_command(&mut self, id: u8) -> Result<Option<Message>, ProvisioningError> {
        let request = match Command::from_id(id) {
            Some(Command::GetState) => return Ok(Some(self.state_message())),
            Some(Command::Connect) => ProvisionRequest::Connect(self.credentials()?),
            Some(Command::Disconnect) => ProvisionRequest::Disconnect,
            Some(Command::Scan) => ProvisionRequest::Scan,
            Some(Command::ClearCredentials) => {
                self.clear();
                ProvisionRequest::ClearCredentials
            }
            None => return Err(ProvisioningError::UnknownId(id)),
        };
        if let Err(dropped) = self.requests.push_back(request) {
            warn!("provisioning: request queue full, dropping {:?}", dropped);
        }
        Ok(None)
    }

    /// Staged credentials, if an SSID has been received.
    pub fn credentials(&self) -> Result<WifiCredentials, ProvisioningError> {
        let ssid = self.ssid.clone().ok_or(ProvisioningError::MissingSsid)?;
        Ok(WifiCredentials {
            ssid,
            password: self.password.clone(),
            bssid: self.bssid,
        })
    }

    /// Forget everything staged so far.
    pub fn clear(&mut self) {
        self.ssid = None;
        self.password.clear();
        self.bssid = None;
        self.link_key = None;
    }

    pub fn take_request(&mut self) -> Option<ProvisionRequest> {
        self.requests.pop_front()
    }

    pub fn link_key(&self) -> Option<&[u8; LINK_KEY_LEN]> {
        self.link_key.as_ref()
    }

    pub fn set_state(&mut self, state: WifiState, ip: [u8; 4]) {
        self.state = state;
        self.ip = ip;
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    /// `[wifi_state][ipv4 0..4]`
    pub fn state_message(&self) -> Message {
        let [a, b, c, d] = self.ip;
        Message::data(DataId::State, &[self.state as u8, a, b, c, d])
    }

    /// `[count]` then per AP `[ssid_len][ssid][bssid 6][rssi][channel][auth]`.
    pub fn scan_results_message(&self, aps: &[ApRecord]) -> Message {
        let count = aps.len().min(usize::from(self.max_scan_results));
        let mut data = Vec::with_capacity(1 + count * (MAX_SSID_LEN + 10));
        data.push(count as u8);
        for ap in &aps[..count] {
            data.push(ap.ssid.len() as u8);
            data.extend_from_slice(ap.ssid.as_bytes());
            data.extend_from_slice(&ap.bssid);
            data.push(ap.rssi as u8);
            data.push(ap.channel);
            data.push(ap.auth);
        }
        Message::data(DataId::ScanResults, &data)
    }
}

impl ProHandler for WifiProvisioner {
    fn on_command(&mut self, id: u8, _data: &[u8]) -> Option<Message> {
        match self.apply_command(id) {
            Ok(reply) => {
                info!("provisioning: command 0x{:02x}", id);
                reply
            }
            Err(e) => {
                warn!("provisioning: command rejected: {}", e);
                None
            }
        }
    }

    fn on_data(&mut self, id: u8, data: &[u8]) -> Option<Message> {
        if let Err(e) = self.apply_data(id, data) {
            warn!("provisioning: data rejected: {}", e);
        }
        None
    }
}

// ── Tests ────────────────────────────────────────────────────
