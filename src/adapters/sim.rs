//! Host platform simulation.
//!
//! [`SimPlatform`] stands in for the Wi-Fi station, the BLE advertiser
//! and the flash key/value store when running on a development machine.
//! Networks are registered up front with [`SimPlatform::add_network`];
//! joining one completes immediately.

use std::collections::HashMap;

use log::{info, warn};

use crate::app::ports::{
    AdvertisingError, AdvertisingPort, StorageError, StoragePort, WifiError, WifiPort,
};
use crate::provisioning::{ApRecord, WifiCredentials, WifiState, BSSID_LEN, MAX_SSID_LEN};

/// Largest blob a single key may hold.
pub const MAX_VALUE_LEN: usize = 4000;
/// Keys across all namespaces.
pub const MAX_ENTRIES: usize = 64;

/// Address handed out on a successful join.
const SIM_IP: [u8; 4] = [192, 168, 1, 100];

/// A network the simulated station can see.
#[derive(Debug, Clone)]
pub struct SimNetwork {
    pub ssid: heapless::String<MAX_SSID_LEN>,
    pub password: String,
    pub bssid: [u8; BSSID_LEN],
    pub rssi: i8,
    pub channel: u8,
}

impl SimNetwork {
    /// Auth mode byte as reported in scan results: 0 open, 3 WPA2-PSK.
    fn auth(&self) -> u8 {
        if self.password.is_empty() { 0 } else { 3 }
    }
}

#[derive(Debug, Default)]
pub struct SimPlatform {
    store: HashMap<String, Vec<u8>>,
    networks: Vec<SimNetwork>,
    state: WifiState,
    ip: [u8; 4],
    advertising: bool,
    /// Make the next `AdvertisingPort::start` fail.
    pub fail_advertising: bool,
}

impl SimPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a visible network. SSIDs longer than 32 bytes are ignored.
    pub fn add_network(&mut self, ssid: &str, password: &str, rssi: i8, channel: u8) {
        let Ok(name) = heapless::String::try_from(ssid) else {
            warn!("SimPlatform: SSID '{}' too long", ssid);
            return;
        };
        let index = self.networks.len() as u8;
        self.networks.push(SimNetwork {
            ssid: name,
            password: password.into(),
            bssid: [0x02, 0x00, 0x00, 0x00, 0x00, index],
            rssi,
            channel,
        });
    }

    /// Drop the association as if the AP went away.
    pub fn lose_link(&mut self) {
        if self.state == WifiState::Connected {
            info!("WiFi(sim): link lost");
            self.state = WifiState::Disconnected;
            self.ip = [0; 4];
        }
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }
}

// ── WifiPort ─────────────────────────────────────────────────

impl WifiPort for SimPlatform {
    fn connect(&mut self, credentials: &WifiCredentials) -> Result<(), WifiError> {
        self.state = WifiState::Connecting;
        self.ip = [0; 4];

        let found = self.networks.iter().find(|n| {
            n.ssid == credentials.ssid && credentials.bssid.is_none_or(|b| b == n.bssid)
        });
        let Some(network) = found else {
            warn!("WiFi(sim): '{}' not in range", credentials.ssid);
            self.state = WifiState::Failed;
            return Err(WifiError::NotFound);
        };
        if network.password != credentials.password.as_str() {
            warn!("WiFi(sim): wrong password for '{}'", credentials.ssid);
            self.state = WifiState::Failed;
            return Err(WifiError::AuthFailed);
        }

        info!("WiFi(sim): connected to '{}'", credentials.ssid);
        self.state = WifiState::Connected;
        self.ip = SIM_IP;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), WifiError> {
        if self.state != WifiState::Idle {
            info!("WiFi(sim): disconnected");
            self.state = WifiState::Disconnected;
        }
        self.ip = [0; 4];
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<ApRecord>, WifiError> {
        if self.state == WifiState::Connecting {
            return Err(WifiError::Busy);
        }
        let mut aps: Vec<ApRecord> = self
            .networks
            .iter()
            .map(|n| ApRecord {
                ssid: n.ssid.clone(),
                bssid: n.bssid,
                rssi: n.rssi,
                channel: n.channel,
                auth: n.auth(),
            })
            .collect();
        aps.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        Ok(aps)
    }

    fn state(&self) -> (WifiState, [u8; 4]) {
        (self.state, self.ip)
    }
}

// ── AdvertisingPort ──────────────────────────────────────────

impl AdvertisingPort for SimPlatform {
    fn start(&mut self) -> Result<(), AdvertisingError> {
        if std::mem::take(&mut self.fail_advertising) {
            return Err(AdvertisingError::Unavailable);
        }
        self.advertising = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.advertising = false;
    }

    fn is_advertising(&self) -> bool {
        self.advertising
    }
}

// ── StoragePort ──────────────────────────────────────────────

impl StoragePort for SimPlatform {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self
            .store
            .get(&Self::composite_key(namespace, key))
            .ok_or(StorageError::NotFound)?;
        if data.len() > buf.len() {
            return Err(StorageError::TooLarge);
        }
        buf[..data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_VALUE_LEN {
            return Err(StorageError::TooLarge);
        }
        let composite = Self::composite_key(namespace, key);
        if !self.store.contains_key(&composite) && self.store.len() >= MAX_ENTRIES {
            return Err(StorageError::Full);
        }
        self.store.insert(composite, data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&Self::composite_key(namespace, key))
    }
}
