//! Stop-and-wait transfer over a [`Link`].
//!
//! ```text
//!  Sender                                   Receiver
//!  ──────                                   ────────
//!  packet i (seq s, ACK) ─────────────────▶ Reassembler::feed
//!  AckSlot::wait_for(s) ◀── ack(seq s) ──── RxOutcome::ack
//!  timeout → packet i (seq s+1, RETRY) ───▶ duplicate: re-ack, re-arm window
//! ```
//!
//! One peer, one message in flight per direction. The sender parks on a
//! binary semaphore ([`AckSlot`]) after every packet; the receive path
//! signals it when an ack frame arrives. A cooperative stop flag is
//! checked before each packet.

use core::future::Future;
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use log::{debug, info, warn};

use crate::config::ProtocolConfig;
use crate::error::ProError;

use super::fragment::Fragmenter;
use super::frame::{self, Frame, FrameType};
use super::link::Link;
use super::payload::{Message, ProEvent, ProHandler};
use super::protect::ProtectKey;
use super::reassembly::{Feed, Reassembler};

/// Encoded ack packet.
pub type AckPacket = [u8; frame::BASE_HEADER_SIZE + frame::TOTAL_LEN_SIZE];

// ── Ack semaphore ────────────────────────────────────────────

/// Binary semaphore carrying the most recently acknowledged `seq`.
pub struct AckSlot {
    signal: Signal<CriticalSectionRawMutex, u8>,
}

impl AckSlot {
    pub const fn new() -> Self {
        Self {
            signal: Signal::new(),
        }
    }

    /// Give: record an ack for `seq`. Safe from the BLE task context.
    pub fn signal(&self, seq: u8) {
        self.signal.signal(seq);
    }

    /// Drop any stale ack before a new packet goes out.
    pub fn reset(&self) {
        self.signal.reset();
    }

    /// An ack is waiting to be taken.
    pub fn signal_pending(&self) -> bool {
        self.signal.signaled()
    }

    /// Take: wait until `seq` is acknowledged or `timeout` elapses.
    /// Acks for other sequence numbers are discarded.
    pub async fn wait_for(&self, seq: u8, timeout: Duration, timer: &impl AckTimer) -> bool {
        let matched = async {
            loop {
                let acked = self.signal.wait().await;
                if acked == seq {
                    return true;
                }
                debug!("blsync: stale ack {} (waiting for {})", acked, seq);
            }
        };
        futures_lite::future::or(matched, async {
            timer.sleep(timeout).await;
            false
        })
        .await
    }
}

impl Default for AckSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of the ack timeout.
pub trait AckTimer {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

/// Reactor-driven timer (no busy-spinning).
pub struct ReactorTimer;

impl AckTimer for ReactorTimer {
    async fn sleep(&self, duration: Duration) {
        async_io_mini::Timer::after(duration).await;
    }
}

// ── Sender ───────────────────────────────────────────────────

/// Outbound half: fragments a message and waits for each ack.
pub struct Sender<T: AckTimer> {
    ack: Arc<AckSlot>,
    stop: Arc<AtomicBool>,
    timer: T,
    seq: u8,
    ack_timeout: Duration,
    max_retries: u8,
    key: Option<ProtectKey>,
}

impl<T: AckTimer> Sender<T> {
    pub fn new(config: &ProtocolConfig, ack: Arc<AckSlot>, stop: Arc<AtomicBool>, timer: T) -> Self {
        Self {
            ack,
            stop,
            timer,
            seq: 0,
            ack_timeout: Duration::from_millis(u64::from(config.ack_timeout_ms)),
            max_retries: config.max_retries,
            key: None,
        }
    }

    /// Tag every outbound message with `key`.
    pub fn set_key(&mut self, key: Option<ProtectKey>) {
        self.key = key;
    }

    fn next_seq(&mut self) -> u8 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }

    /// Send `msg` packet by packet, waiting for an ack after each.
    pub async fn send<L: Link>(&mut self, link: &mut L, msg: &Message) -> Result<(), ProError> {
        let mut body = msg.body();
        let protected = self.key.is_some();
        if let Some(key) = &self.key {
            key.seal(msg.kind, &mut body);
        }

        let plan = Fragmenter::new(body, msg.kind, link.mtu(), protected, true)?;
        debug!(
            "blsync: sending {:?} 0x{:02x} as {} packet(s), {} bytes",
            msg.kind,
            msg.id,
            plan.count(),
            plan.total_len()
        );

        for index in 0..plan.count() {
            let mut attempt: u8 = 0;
            loop {
                if self.stop.load(Ordering::Acquire) {
                    info!("blsync: send cancelled at packet {}", index);
                    return Err(ProError::Cancelled);
                }

                let seq = self.next_seq();
                self.ack.reset();
                link.notify(&plan.packet(index, seq, attempt > 0))
                    .map_err(|e| {
                        warn!("blsync: link write failed: {:?}", e);
                        ProError::Link
                    })?;

                if self.ack.wait_for(seq, self.ack_timeout, &self.timer).await {
                    break;
                }

                attempt += 1;
                if attempt > self.max_retries {
                    warn!(
                        "blsync: packet {} unacknowledged after {} attempt(s)",
                        index, attempt
                    );
                    return Err(ProError::Timeout);
                }
                debug!("blsync: retrying packet {} (attempt {})", index, attempt + 1);
            }
        }
        Ok(())
    }
}

// ── Receiver ─────────────────────────────────────────────────

/// What the caller must do after one inbound packet.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RxOutcome {
    /// The packet was an ack for this `seq`; signal the local [`AckSlot`].
    pub acked: Option<u8>,
    /// Ack to notify back to the peer.
    pub ack: Option<AckPacket>,
    /// A message completed with this packet.
    pub event: Option<ProEvent>,
    /// The handler's reply to `event`, to be sent with a [`Sender`].
    pub reply: Option<Message>,
}

/// Inbound half: reassembles packets and dispatches complete messages.
pub struct Receiver<H: ProHandler> {
    reassembler: Reassembler,
    handler: H,
}

impl<H: ProHandler> Receiver<H> {
    pub fn new(config: &ProtocolConfig, handler: H) -> Self {
        Self {
            reassembler: Reassembler::new(config.max_message_len, config.reassembly_timeout_ms),
            handler,
        }
    }

    /// Verify protected messages with `key`.
    pub fn set_key(&mut self, key: Option<ProtectKey>) {
        self.reassembler.set_key(key);
    }

    /// Process one packet written by the peer at `now_ms`.
    ///
    /// Errors abort the message in progress; no ack is produced so the
    /// peer's retry logic sees the failure.
    pub fn on_packet(&mut self, packet: &[u8], now_ms: u64) -> Result<RxOutcome, ProError> {
        let frame = Frame::decode(packet)?;
        let hdr = frame.header;

        if hdr.frame_type == FrameType::Ack {
            return Ok(RxOutcome {
                acked: Some(hdr.seq),
                ..RxOutcome::default()
            });
        }

        let ack = hdr.wants_ack().then(|| frame::ack_packet(hdr.seq));
        match self.reassembler.feed(&frame, now_ms) {
            Ok(Feed::Pending | Feed::Duplicate) => Ok(RxOutcome {
                ack,
                ..RxOutcome::default()
            }),
            Ok(Feed::Complete(event)) => {
                info!(
                    "blsync: received {:?} 0x{:02x} ({} bytes)",
                    event.kind,
                    event.id,
                    event.data.len()
                );
                let reply = self.handler.dispatch(&event);
                Ok(RxOutcome {
                    acked: None,
                    ack,
                    event: Some(event),
                    reply,
                })
            }
            Err(e) => {
                warn!("blsync: message aborted: {}", e);
                Err(e)
            }
        }
    }

    /// Drop any partial message (e.g. on disconnect).
    pub fn reset(&mut self) {
        self.reassembler.reset();
    }

    pub fn is_receiving(&self) -> bool {
        self.reassembler.is_active()
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

// ── Tests ────────────────────────────────────────────────────
