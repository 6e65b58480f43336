//! Property and fuzz-style tests for robustness of the wire codec and
//! the input state machines.
//!
//! Runs on the host only; proptest is not built for bare-metal targets.

#![cfg(not(target_os = "none"))]

use std::cell::Cell;
use std::convert::Infallible;
use std::rc::Rc;

use blsync::config::ButtonConfig;
use blsync::drivers::button::{ButtonDriver, ButtonEvent};
use blsync::mesh::dedup::DuplicateFilter;
use blsync::mesh::transition::TransitionTime;
use blsync::protocol::fragment::Fragmenter;
use blsync::protocol::frame::ATT_OVERHEAD;
use blsync::protocol::reassembly::{Feed, Reassembler};
use blsync::protocol::{Frame, MessageKind, ProtectKey};
use blsync::ProError;
use embedded_hal::digital::{ErrorType, InputPin};
use proptest::prelude::*;

fn kind() -> impl Strategy<Value = MessageKind> {
    prop_oneof![Just(MessageKind::Command), Just(MessageKind::Data)]
}

// ── Framing ───────────────────────────────────────────────────

proptest! {
    /// Any body survives fragmentation at any usable MTU, and no packet
    /// exceeds the MTU's ATT payload.
    #[test]
    fn fragments_reassemble_to_the_original(
        body in proptest::collection::vec(any::<u8>(), 1..=1024),
        mtu in 23usize..=247,
        kind in kind(),
        seq0 in any::<u8>(),
    ) {
        let plan = Fragmenter::new(body.clone(), kind, mtu, false, true).unwrap();
        let mut rx = Reassembler::new(1024, 5000);
        let mut delivered = None;

        for i in 0..plan.count() {
            let packet = plan.packet(i, seq0.wrapping_add(i as u8), false);
            prop_assert!(packet.len() <= mtu - ATT_OVERHEAD);
            let frame = Frame::decode(&packet).unwrap();
            prop_assert_eq!(frame.header.last, i + 1 == plan.count());
            match rx.feed(&frame, i as u64).unwrap() {
                Feed::Complete(event) => delivered = Some(event),
                Feed::Pending => prop_assert!(i + 1 < plan.count()),
                Feed::Duplicate => prop_assert!(false, "unexpected duplicate"),
            }
        }

        let event = delivered.unwrap();
        prop_assert_eq!(event.kind, kind);
        prop_assert_eq!(event.id, body[0]);
        prop_assert_eq!(&event.data[..], &body[1..]);
        prop_assert!(!rx.is_active());
    }

    /// Arbitrary bytes never panic the decoder, and an accepted frame's
    /// payload always accounts for the rest of the packet.
    #[test]
    fn decode_never_panics(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        if let Ok(frame) = Frame::decode(&data) {
            let header_len = if frame.header.index == 0 { 7 } else { 5 };
            prop_assert_eq!(frame.payload.len() + header_len, data.len());
        }
    }

    /// A stream of arbitrary packets never grows the buffer past the
    /// configured limit.
    #[test]
    fn reassembler_respects_its_limit(
        packets in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 5..40), 0..32),
    ) {
        let mut rx = Reassembler::new(64, 5000);
        for (t, packet) in packets.iter().enumerate() {
            if let Ok(frame) = Frame::decode(packet) {
                let _ = rx.feed(&frame, t as u64 * 100);
            }
            prop_assert!(rx.buffered_len() <= 64);
        }
    }

    /// Flipping any bit of a sealed body breaks verification.
    #[test]
    fn tampered_body_fails_integrity(
        body in proptest::collection::vec(any::<u8>(), 1..200),
        key in any::<[u8; 32]>(),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = ProtectKey::new(key);
        let mut sealed = body.clone();
        key.seal(MessageKind::Data, &mut sealed);

        let at = flip.index(sealed.len());
        sealed[at] ^= 1 << bit;
        let result: Result<Vec<u8>, ProError> = key.open(MessageKind::Data, sealed);
        prop_assert_eq!(result, Err(ProError::Integrity));
    }
}

// ── Mesh ──────────────────────────────────────────────────────

proptest! {
    /// Every representable duration encodes to the nearest step at or
    /// above it, never a whole step over.
    #[test]
    fn transition_time_rounds_up_within_one_step(ms in 0u32..=37_200_000) {
        let tt = TransitionTime::from_ms(ms);
        let decoded = tt.duration_ms().unwrap();
        let step = [100, 1_000, 10_000, 600_000][usize::from(tt.0 >> 6)];
        prop_assert!(decoded >= ms);
        prop_assert!(decoded - ms < step);
    }

    /// The same (tid, src, dst) inside the window is always a duplicate;
    /// after the window it never is.
    #[test]
    fn dedup_window_is_exact(
        tid in any::<u8>(),
        src in 1u16..0x8000,
        dst in any::<u16>(),
        gap in 0u64..20_000,
    ) {
        let mut filter = DuplicateFilter::new(6000);
        prop_assert!(!filter.is_duplicate(tid, src, dst, 1000));
        prop_assert_eq!(filter.is_duplicate(tid, src, dst, 1000 + gap), gap <= 6000);
    }
}

// ── Button ────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Pin(Rc<Cell<bool>>);

impl ErrorType for Pin {
    type Error = Infallible;
}

impl InputPin for Pin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }
    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

proptest! {
    /// However long the press, the driver reports at most one gesture of
    /// each kind, never a short press once the long window was reached,
    /// and always returns to idle.
    #[test]
    fn one_press_one_classification(hold_ms in 0u64..20_000) {
        let cfg = ButtonConfig::default();
        let pin = Pin::default();
        let mut btn = ButtonDriver::new(pin.clone(), false, cfg);

        pin.0.set(true);
        btn.on_edge();
        let mut events = Vec::new();
        let mut t = 0;
        while t < hold_ms {
            events.extend(btn.tick(t));
            t += 10;
        }
        pin.0.set(false);
        events.extend(btn.tick(t));
        events.extend(btn.tick(t + 10));

        prop_assert!(btn.is_idle());
        let shorts = events.iter().filter(|e| **e == ButtonEvent::ShortPress).count();
        let longs = events.iter().filter(|e| **e == ButtonEvent::LongPress).count();
        let long_longs = events.iter().filter(|e| **e == ButtonEvent::LongLongPress).count();
        prop_assert!(shorts <= 1 && longs <= 1 && long_longs <= 1);
        // Last pressed sample at t - 10.
        if t >= u64::from(cfg.long_press_start_ms) + 10 {
            prop_assert_eq!(shorts, 0);
        }
        if t < u64::from(cfg.debounce_ms) {
            prop_assert!(events.is_empty());
        }
    }
}
