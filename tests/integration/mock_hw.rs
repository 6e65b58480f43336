//! Mock platform adapter for integration tests.
//!
//! Records every Wi-Fi and advertising call so tests can assert on the
//! full command history without a radio.

use std::collections::HashMap;

use blsync::app::events::AppEvent;
use blsync::app::ports::{
    AdvertisingError, AdvertisingPort, EventSink, StorageError, StoragePort, WifiError, WifiPort,
};
use blsync::provisioning::{ApRecord, WifiCredentials, WifiState};

// ── Platform call record ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum PlatformCall {
    Connect { ssid: String, password: String },
    Disconnect,
    Scan,
    StartAdvertising,
    StopAdvertising,
}

// ── MockPlatform ──────────────────────────────────────────────

pub struct MockPlatform {
    pub calls: Vec<PlatformCall>,
    pub store: HashMap<String, Vec<u8>>,
    pub advertising: bool,
    pub state: WifiState,
    pub ip: [u8; 4],
    /// Outcome of the next `connect`; `Ok` moves straight to Connected.
    pub connect_result: Result<(), WifiError>,
    pub scan_results: Vec<ApRecord>,
    pub advertising_fails: bool,
    pub storage_full: bool,
}

#[allow(dead_code)]
impl MockPlatform {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            store: HashMap::new(),
            advertising: false,
            state: WifiState::Idle,
            ip: [0; 4],
            connect_result: Ok(()),
            scan_results: Vec::new(),
            advertising_fails: false,
            storage_full: false,
        }
    }

    pub fn connects(&self) -> Vec<(String, String)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                PlatformCall::Connect { ssid, password } => Some((ssid.clone(), password.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &PlatformCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }

    pub fn has_key(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{}::{}", namespace, key))
    }

    pub fn ap(ssid: &str, rssi: i8) -> ApRecord {
        ApRecord {
            ssid: ssid.try_into().unwrap(),
            bssid: [0x11, 0x22, 0x33, 0x44, 0x55, 0x66],
            rssi,
            channel: 6,
            auth: 3,
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiPort for MockPlatform {
    fn connect(&mut self, credentials: &WifiCredentials) -> Result<(), WifiError> {
        self.calls.push(PlatformCall::Connect {
            ssid: credentials.ssid.to_string(),
            password: credentials.password.to_string(),
        });
        match self.connect_result {
            Ok(()) => {
                self.state = WifiState::Connected;
                self.ip = [10, 0, 0, 7];
                Ok(())
            }
            Err(e) => {
                self.state = WifiState::Failed;
                Err(e)
            }
        }
    }

    fn disconnect(&mut self) -> Result<(), WifiError> {
        self.calls.push(PlatformCall::Disconnect);
        self.state = WifiState::Disconnected;
        self.ip = [0; 4];
        Ok(())
    }

    fn scan(&mut self) -> Result<Vec<ApRecord>, WifiError> {
        self.calls.push(PlatformCall::Scan);
        Ok(self.scan_results.clone())
    }

    fn state(&self) -> (WifiState, [u8; 4]) {
        (self.state, self.ip)
    }
}

impl AdvertisingPort for MockPlatform {
    fn start(&mut self) -> Result<(), AdvertisingError> {
        self.calls.push(PlatformCall::StartAdvertising);
        if self.advertising_fails {
            return Err(AdvertisingError::Unavailable);
        }
        self.advertising = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.push(PlatformCall::StopAdvertising);
        self.advertising = false;
    }

    fn is_advertising(&self) -> bool {
        self.advertising
    }
}

impl StoragePort for MockPlatform {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{}::{}", namespace, key)) {
            Some(v) if v.len() > buf.len() => Err(StorageError::TooLarge),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.storage_full {
            return Err(StorageError::Full);
        }
        self.store
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.has_key(namespace, key)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

/// Event sink that keeps everything it is given.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: &AppEvent) -> bool {
        self.events.contains(event)
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
