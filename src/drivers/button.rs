//! Edge-armed button driver with short, long and long-long press detection.
//!
//! ## Hardware
//!
//! Momentary switch on any `embedded_hal` input. The GPIO interrupt only
//! calls [`ButtonDriver::on_edge`] (a lock-free flag); the periodic
//! `tick()` samples the pin level and runs the state machine.
//!
//! ## Gestures
//!
//! All windows are measured from the initial edge.
//!
//! ```text
//!  Idle ─edge─▶ Debounce ─debounce_ms─▶ ShortWindow ─long_press_start─▶ LongWindow
//!                  │                        │                               │
//!               release                  release                     long_press_end
//!               (none)                (ShortPress if                 (LongPress)
//!                                    < short_press_end)                     ▼
//!                                                      LongLongWindow ─long_long_press─▶ WaitRelease
//!                                                                         (LongLongPress)
//! ```
//!
//! Released in `LongWindow` posts `LongPress`; released in
//! `LongLongWindow` posts nothing more.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use embedded_hal::digital::InputPin;
use log::warn;

use crate::config::ButtonConfig;

/// Button events emitted on state exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ShortPress,
    LongPress,
    LongLongPress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Idle,
    Debounce { since_ms: u64 },
    ShortWindow { since_ms: u64 },
    LongWindow { since_ms: u64 },
    LongLongWindow { since_ms: u64 },
    WaitRelease,
}

pub struct ButtonDriver<P: InputPin> {
    pin: P,
    active_low: bool,
    config: ButtonConfig,
    state: PressState,
    edge: Arc<AtomicBool>,
}

impl<P: InputPin> ButtonDriver<P> {
    pub fn new(pin: P, active_low: bool, config: ButtonConfig) -> Self {
        Self {
            pin,
            active_low,
            config,
            state: PressState::Idle,
            edge: Arc::new(AtomicBool::new(false)),
        }
    }

    /// ISR entry point. Safe from interrupt context.
    pub fn on_edge(&self) {
        self.edge.store(true, Ordering::Release);
    }

    /// Flag handle for ISR registration closures.
    pub fn edge_handle(&self) -> Arc<AtomicBool> {
        self.edge.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.state == PressState::Idle
    }

    fn is_pressed(&mut self) -> bool {
        let level = if self.active_low {
            self.pin.is_low()
        } else {
            self.pin.is_high()
        };
        level.unwrap_or_else(|e| {
            warn!("button: pin read failed: {:?}", e);
            false
        })
    }

    fn release(&mut self) {
        self.state = PressState::Idle;
        // Bounces during the press are not a new press.
        self.edge.store(false, Ordering::Release);
    }

    /// Call periodically (timer tick). Returns a classified event, if any.
    pub fn tick(&mut self, now_ms: u64) -> Option<ButtonEvent> {
        let c = self.config;

        if self.state == PressState::Idle {
            if self.edge.swap(false, Ordering::AcqRel) {
                self.state = PressState::Debounce { since_ms: now_ms };
            }
            return None;
        }

        let pressed = self.is_pressed();
        match self.state {
            PressState::Idle => None,

            PressState::Debounce { since_ms } => {
                if !pressed {
                    self.release();
                } else if now_ms.saturating_sub(since_ms) >= u64::from(c.debounce_ms) {
                    self.state = PressState::ShortWindow { since_ms };
                }
                None
            }

            PressState::ShortWindow { since_ms } => {
                let held = now_ms.saturating_sub(since_ms);
                if !pressed {
                    self.release();
                    return (held < u64::from(c.short_press_end_ms)).then_some(ButtonEvent::ShortPress);
                }
                if held >= u64::from(c.long_press_start_ms) {
                    self.state = PressState::LongWindow { since_ms };
                }
                None
            }

            PressState::LongWindow { since_ms } => {
                if !pressed {
                    self.release();
                    return Some(ButtonEvent::LongPress);
                }
                if now_ms.saturating_sub(since_ms) >= u64::from(c.long_press_end_ms) {
                    self.state = PressState::LongLongWindow { since_ms };
                    return Some(ButtonEvent::LongPress);
                }
                None
            }

            PressState::LongLongWindow { since_ms } => {
                if !pressed {
                    self.release();
                    return None;
                }
                if now_ms.saturating_sub(since_ms) >= u64::from(c.long_long_press_ms) {
                    self.state = PressState::WaitRelease;
                    return Some(ButtonEvent::LongLongPress);
                }
                None
            }

            PressState::WaitRelease => {
                if !pressed {
                    self.release();
                }
                None
            }
        }
    }
}
