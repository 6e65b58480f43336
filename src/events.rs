//! ISR-to-task event queue.
//!
//! Events are produced by:
//! - GPIO / timer ISRs (button gestures)
//! - BLE stack callbacks (connect, disconnect)
//! - Software (provisioning finished, mesh state changed)
//!
//! and consumed by the application task, one at a time in FIFO order.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Button tick │────▶│              │     │              │
//! │ BLE stack   │────▶│  Event Queue │────▶│  App task    │
//! │ Mesh access │────▶│  (mpmc, 32)  │     │  (consumer)  │
//! │ Software    │────▶│              │     │              │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```

use heapless::mpmc::Q32;

use crate::drivers::button::ButtonEvent;

/// Node events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // ── User input ────────────────────────────────────────
    Button(ButtonEvent),

    // ── BLE ───────────────────────────────────────────────
    BleConnected,
    BleDisconnected,

    // ── Application ───────────────────────────────────────
    /// The station connected with provisioned credentials.
    ProvisioningComplete,
    /// A mesh model's present state changed.
    MeshStateChanged,
}

/// Bounded lock-free queue; capacity 32.
pub struct EventQueue {
    queue: Q32<Event>,
}

impl EventQueue {
    pub const fn new() -> Self {
        Self { queue: Q32::new() }
    }

    /// Safe from ISR context. Returns `false` if full (event dropped).
    pub fn push(&self, event: Event) -> bool {
        self.queue.enqueue(event).is_ok()
    }

    pub fn pop(&self) -> Option<Event> {
        self.queue.dequeue()
    }

    /// Drain all pending events in FIFO order.
    pub fn drain(&self, mut handler: impl FnMut(Event)) {
        while let Some(event) = self.pop() {
            handler(event);
        }
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

static EVENTS: EventQueue = EventQueue::new();

/// Push onto the global queue. Returns `false` if full.
pub fn push_event(event: Event) -> bool {
    let ok = EVENTS.push(event);
    if !ok {
        log::warn!("events: queue full, dropped {:?}", event);
    }
    ok
}

pub fn pop_event() -> Option<Event> {
    EVENTS.pop()
}

pub fn drain_events(handler: impl FnMut(Event)) {
    EVENTS.drain(handler);
}
