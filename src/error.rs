//! Unified error types for the blsync node.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! top-level event loop's error handling uniform. All variants are `Copy`
//! so they can be passed through the transport and service layers without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The BLE sync transport aborted a message.
    Proto(ProError),
    /// Provisioning input was rejected.
    Provisioning(ProvisioningError),
    /// Board description or factory data is unusable.
    Board(BoardError),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proto(e) => write!(f, "transport: {e}"),
            Self::Provisioning(e) => write!(f, "provisioning: {e}"),
            Self::Board(e) => write!(f, "board: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Reasons a BLE sync message is aborted.
///
/// Any of these clears the partial reassembly buffer on the receive side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProError {
    /// The message does not fit the reassembly allowance or allocation failed.
    NoMem,
    /// A length, index or header field is inconsistent.
    Malformed(&'static str),
    /// No ack arrived in time, or a fragment arrived after the window closed.
    Timeout,
    /// The sender's stop flag was raised.
    Cancelled,
    /// The integrity tag is missing, unexpected or wrong.
    Integrity,
    /// No central is connected or notifications are not enabled.
    NotConnected,
    /// The underlying link refused the write.
    Link,
}

impl fmt::Display for ProError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMem => write!(f, "out of memory"),
            Self::Malformed(what) => write!(f, "malformed packet: {what}"),
            Self::Timeout => write!(f, "timed out"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Integrity => write!(f, "integrity check failed"),
            Self::NotConnected => write!(f, "no subscribed central"),
            Self::Link => write!(f, "link write failed"),
        }
    }
}

impl From<ProError> for Error {
    fn from(e: ProError) -> Self {
        Self::Proto(e)
    }
}

// ---------------------------------------------------------------------------
// Provisioning errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningError {
    InvalidUtf8,
    InvalidSsid,
    InvalidPassword,
    InvalidBssid,
    InvalidLinkKey,
    /// `Connect` arrived before an SSID.
    MissingSsid,
    UnknownId(u8),
}

impl fmt::Display for ProvisioningError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUtf8 => write!(f, "value is not valid UTF-8"),
            Self::InvalidSsid => write!(f, "SSID invalid (1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (8-64 bytes for WPA2 or empty)"),
            Self::InvalidBssid => write!(f, "BSSID must be exactly 6 bytes"),
            Self::InvalidLinkKey => write!(f, "Zigbee link key must be exactly 16 bytes"),
            Self::MissingSsid => write!(f, "connect requested without an SSID"),
            Self::UnknownId(id) => write!(f, "unknown message id 0x{id:02x}"),
        }
    }
}

impl From<ProvisioningError> for Error {
    fn from(e: ProvisioningError) -> Self {
        Self::Provisioning(e)
    }
}

// ---------------------------------------------------------------------------
// Board errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardError {
    /// The board description could not be parsed.
    Parse,
    /// A field is out of range; the string names it.
    Invalid(&'static str),
    /// Two features claim the same pin.
    DuplicatePin(u8),
    /// None of the configured MAC sources holds a usable address.
    NoValidMac,
}

impl fmt::Display for BoardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse => write!(f, "board description parse failed"),
            Self::Invalid(field) => write!(f, "invalid {field}"),
            Self::DuplicatePin(pin) => write!(f, "GPIO{pin} assigned twice"),
            Self::NoValidMac => write!(f, "no valid MAC address in any source"),
        }
    }
}

impl From<BoardError> for Error {
    fn from(e: BoardError) -> Self {
        Self::Board(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
