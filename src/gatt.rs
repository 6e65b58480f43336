//! Wi-Fi provisioning GATT service glue.
//!
//! The central writes protocol packets to the write characteristic; the
//! node answers (acks and replies) with notifications on the
//! read/notify characteristic once the central has enabled them through
//! the CCC descriptor.
//!
//! ## GATT Service Layout
//!
//! | Item           | UUID                                   | Perms        |
//! |----------------|----------------------------------------|--------------|
//! | Service        | `07af27a5-9c22-11ea-9afe-02fcdc4e7412` |              |
//! | Write          | `07af27a6-9c22-11ea-9afe-02fcdc4e7412` | Write        |
//! | Read / Notify  | `07af27a7-9c22-11ea-9afe-02fcdc4e7412` | Read+Notify  |
//! | CCC descriptor | `0x2902`                               | Read+Write   |

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::error::ProError;
use crate::protocol::link::Link;
use crate::protocol::payload::ProHandler;
use crate::protocol::protect::ProtectKey;
use crate::protocol::transfer::{AckSlot, AckTimer, Receiver, RxOutcome, Sender};

// ── Constants ────────────────────────────────────────────────

pub const SERVICE_UUID: u128 = 0x07af27a5_9c22_11ea_9afe_02fcdc4e7412;
pub const CHAR_WRITE: u128 = 0x07af27a6_9c22_11ea_9afe_02fcdc4e7412;
pub const CHAR_READ_NOTIFY: u128 = 0x07af27a7_9c22_11ea_9afe_02fcdc4e7412;
pub const DESC_CCC: u16 = 0x2902;

/// CCC value bit enabling notifications.
const CCC_NOTIFY: u16 = 0x0001;

// ── Connection state ─────────────────────────────────────────

/// Connection facts shared between the server and its links.
///
/// Written from the BLE stack callbacks, read by the sending task.
#[derive(Debug)]
pub struct ConnState {
    connected: AtomicBool,
    subscribed: AtomicBool,
    mtu: AtomicU16,
}

impl ConnState {
    fn new(mtu: u16) -> Self {
        Self {
            connected: AtomicBool::new(false),
            subscribed: AtomicBool::new(false),
            mtu: AtomicU16::new(mtu),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed.load(Ordering::Acquire)
    }

    pub fn mtu(&self) -> u16 {
        self.mtu.load(Ordering::Acquire)
    }
}

// ── Platform notify hook ─────────────────────────────────────

/// Sends one notification on the read/notify characteristic.
///
/// Implemented by the platform BLE stack binding.
pub trait Notifier {
    type Error: core::fmt::Debug;

    fn notify(&mut self, value: &[u8]) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattLinkError<E> {
    /// No central, or notifications not enabled.
    NotConnected,
    /// The stack refused the notification.
    Stack(E),
}

impl<E: core::fmt::Debug> core::fmt::Display for GattLinkError<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotConnected => write!(f, "GATT: no subscribed central"),
            Self::Stack(e) => write!(f, "GATT: notify failed: {e:?}"),
        }
    }
}

/// [`Link`] over GATT notifications.
pub struct GattLink<N: Notifier> {
    state: Arc<ConnState>,
    notifier: N,
}

impl<N: Notifier> Link for GattLink<N> {
    type Error = GattLinkError<N::Error>;

    fn notify(&mut self, packet: &[u8]) -> Result<(), Self::Error> {
        if !self.state.is_connected() || !self.state.is_subscribed() {
            return Err(GattLinkError::NotConnected);
        }
        self.notifier.notify(packet).map_err(GattLinkError::Stack)
    }

    fn mtu(&self) -> usize {
        usize::from(self.state.mtu())
    }
}

// ── Server ───────────────────────────────────────────────────

/// Provisioning GATT server: one central at a time.
pub struct BlsyncServer<H: ProHandler> {
    receiver: Receiver<H>,
    state: Arc<ConnState>,
    ack: Arc<AckSlot>,
    stop: Arc<AtomicBool>,
    config: ProtocolConfig,
}

impl<H: ProHandler> BlsyncServer<H> {
    pub fn new(config: &ProtocolConfig, handler: H) -> Self {
        Self {
            receiver: Receiver::new(config, handler),
            state: Arc::new(ConnState::new(config.default_mtu)),
            ack: Arc::new(AckSlot::new()),
            stop: Arc::new(AtomicBool::new(false)),
            config: config.clone(),
        }
    }

    /// Central connected. The MTU is the default until exchanged.
    pub fn on_connect(&mut self) {
        self.receiver.reset();
        self.ack.reset();
        self.state.mtu.store(self.config.default_mtu, Ordering::Release);
        self.state.subscribed.store(false, Ordering::Release);
        self.state.connected.store(true, Ordering::Release);
        self.stop.store(false, Ordering::Release);
        info!("blsync: central connected");
    }

    pub fn on_mtu_exchange(&mut self, mtu: u16) {
        let mtu = mtu.max(self.config.default_mtu);
        self.state.mtu.store(mtu, Ordering::Release);
        debug!("blsync: MTU {}", mtu);
    }

    /// Central gone: drop partial input and cancel any send in flight.
    pub fn on_disconnect(&mut self) {
        self.state.connected.store(false, Ordering::Release);
        self.state.subscribed.store(false, Ordering::Release);
        self.stop.store(true, Ordering::Release);
        self.receiver.reset();
        info!("blsync: central disconnected");
    }

    /// Write to the CCC descriptor.
    pub fn on_ccc_write(&mut self, value: &[u8]) -> Result<(), ProError> {
        let [lo, hi] = value else {
            return Err(ProError::Malformed("CCC value must be 2 bytes"));
        };
        let enabled = u16::from_le_bytes([*lo, *hi]) & CCC_NOTIFY != 0;
        self.state.subscribed.store(enabled, Ordering::Release);
        info!(
            "blsync: notifications {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Write to the write characteristic at `now_ms`.
    ///
    /// Acks from the central release the local sender; the returned
    /// outcome carries the ack and reply to send back.
    pub fn on_write(&mut self, data: &[u8], now_ms: u64) -> Result<RxOutcome, ProError> {
        if !self.state.is_connected() {
            warn!("blsync: write without a connection");
            return Err(ProError::NotConnected);
        }
        let outcome = self.receiver.on_packet(data, now_ms)?;
        if let Some(seq) = outcome.acked {
            self.ack.signal(seq);
        }
        Ok(outcome)
    }

    /// Tag and verify messages with `key` in both directions.
    pub fn set_key(&mut self, key: Option<ProtectKey>) {
        self.receiver.set_key(key);
    }

    /// A link that notifies through `notifier` while a central is subscribed.
    pub fn link<N: Notifier>(&self, notifier: N) -> GattLink<N> {
        GattLink {
            state: self.state.clone(),
            notifier,
        }
    }

    /// A sender released by acks arriving at this server.
    pub fn sender<T: AckTimer>(&self, timer: T) -> Sender<T> {
        Sender::new(&self.config, self.ack.clone(), self.stop.clone(), timer)
    }

    pub fn state(&self) -> &ConnState {
        &self.state
    }

    pub fn handler(&self) -> &H {
        self.receiver.handler()
    }

    pub fn handler_mut(&mut self) -> &mut H {
        self.receiver.handler_mut()
    }
}

// ── Tests ────────────────────────────────────────────────────
