//! Generic Default Transition Time encoding and in-flight transitions.
//!
//! ```text
//!  bit 7..6  resolution   00 = 100 ms, 01 = 1 s, 10 = 10 s, 11 = 10 min
//!  bit 5..0  steps        0x00 = instant, 0x3F = unknown
//! ```
//!
//! The optional delay byte counts 5 ms units.

const STEP_MASK: u8 = 0x3F;
const STEPS_UNKNOWN: u8 = 0x3F;
const MAX_STEPS: u32 = 0x3E;
const RESOLUTION_MS: [u32; 4] = [100, 1_000, 10_000, 600_000];
const DELAY_UNIT_MS: u32 = 5;

/// Encoded transition time byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionTime(pub u8);

impl TransitionTime {
    pub const INSTANT: Self = Self(0);
    pub const UNKNOWN: Self = Self(STEPS_UNKNOWN);

    /// Duration in milliseconds; `None` when the steps field is unknown.
    pub fn duration_ms(self) -> Option<u32> {
        let steps = self.0 & STEP_MASK;
        if steps == STEPS_UNKNOWN {
            return None;
        }
        Some(u32::from(steps) * RESOLUTION_MS[usize::from(self.0 >> 6)])
    }

    /// Smallest resolution that represents `ms`, rounding up.
    /// Longer than the largest encodable span reads as unknown.
    pub fn from_ms(ms: u32) -> Self {
        for (res, unit) in RESOLUTION_MS.iter().enumerate() {
            let steps = ms.div_ceil(*unit);
            if steps <= MAX_STEPS {
                return Self(((res as u8) << 6) | steps as u8);
            }
        }
        Self::UNKNOWN
    }
}

/// A state change scheduled by a Set message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// When the change starts (after the message delay).
    pub starts_at_ms: u64,
    pub duration_ms: u32,
}

impl Transition {
    /// `None` means the change applies immediately.
    pub fn new(now_ms: u64, time: TransitionTime, delay: u8) -> Option<Self> {
        let duration_ms = time.duration_ms().unwrap_or(0);
        let delay_ms = u32::from(delay) * DELAY_UNIT_MS;
        if duration_ms == 0 && delay_ms == 0 {
            return None;
        }
        Some(Self {
            starts_at_ms: now_ms + u64::from(delay_ms),
            duration_ms,
        })
    }

    fn ends_at_ms(&self) -> u64 {
        self.starts_at_ms + u64::from(self.duration_ms)
    }

    pub fn has_started(&self, now_ms: u64) -> bool {
        now_ms >= self.starts_at_ms
    }

    pub fn is_done(&self, now_ms: u64) -> bool {
        now_ms >= self.ends_at_ms()
    }

    /// Elapsed share of the transition as `(elapsed_ms, duration_ms)`.
    pub fn progress(&self, now_ms: u64) -> (u32, u32) {
        let elapsed = now_ms.saturating_sub(self.starts_at_ms).min(u64::from(self.duration_ms));
        (elapsed as u32, self.duration_ms)
    }

    /// Remaining time for status messages.
    pub fn remaining(&self, now_ms: u64) -> TransitionTime {
        let left = self.ends_at_ms().saturating_sub(now_ms);
        TransitionTime::from_ms(u32::try_from(left).unwrap_or(u32::MAX))
    }
}
