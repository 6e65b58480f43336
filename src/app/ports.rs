//! Port traits: the hexagonal boundary between the node core and the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (Wi-Fi station, BLE advertiser, flash storage, event
//! sinks) implement these traits. The [`NodeService`](super::service::NodeService)
//! consumes them via generics, so the core never touches a vendor SDK.
//!
//! ## Security notes
//!
//! - **StoragePort** implementations SHOULD encrypt the credential namespace.
//! - All port errors are typed; callers handle every variant explicitly.

use crate::provisioning::{ApRecord, WifiCredentials, WifiState};

// ───────────────────────────────────────────────────────────────
// Wi-Fi station port
// ───────────────────────────────────────────────────────────────

pub trait WifiPort {
    /// Start joining the network. Completion is reported by [`state`](Self::state).
    fn connect(&mut self, credentials: &WifiCredentials) -> Result<(), WifiError>;

    fn disconnect(&mut self) -> Result<(), WifiError>;

    /// Blocking scan.
    fn scan(&mut self) -> Result<Vec<ApRecord>, WifiError>;

    /// Current station state and IPv4 address (zero when unassigned).
    fn state(&self) -> (WifiState, [u8; 4]);
}

// ───────────────────────────────────────────────────────────────
// BLE advertising port
// ───────────────────────────────────────────────────────────────

/// Controls the provisioning service advertisement.
pub trait AdvertisingPort {
    fn start(&mut self) -> Result<(), AdvertisingError>;
    fn stop(&mut self);
    fn is_advertising(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Event sink port
// ───────────────────────────────────────────────────────────────

/// The core emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Storage port
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage, namespaced per subsystem.
///
/// Writes MUST be atomic; no partial values on power loss.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiError {
    /// The requested network was not found.
    NotFound,
    /// Association or 4-way handshake failed.
    AuthFailed,
    /// The station is busy or the driver refused the request.
    Busy,
    IoError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisingError {
    /// The controller is not ready or out of advertising sets.
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NotFound,
    Full,
    /// Value larger than the caller's buffer.
    TooLarge,
    IoError,
}

impl core::fmt::Display for WifiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "network not found"),
            Self::AuthFailed => write!(f, "authentication failed"),
            Self::Busy => write!(f, "station busy"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for AdvertisingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Unavailable => write!(f, "advertising unavailable"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::TooLarge => write!(f, "value too large"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
