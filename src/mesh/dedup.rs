//! Mesh message duplicate suppression.
//!
//! A server remembers the last `(tid, src, dst)` it acted on. The same
//! triple arriving again within the window is a retransmission and must
//! not be reapplied.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastMessage {
    tid: u8,
    src: u16,
    dst: u16,
    at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct DuplicateFilter {
    last: Option<LastMessage>,
    window_ms: u32,
}

impl DuplicateFilter {
    pub const fn new(window_ms: u32) -> Self {
        Self {
            last: None,
            window_ms,
        }
    }

    /// Returns `true` for a duplicate. Anything else becomes the new
    /// last-message record.
    pub fn is_duplicate(&mut self, tid: u8, src: u16, dst: u16, now_ms: u64) -> bool {
        if let Some(last) = self.last {
            if last.tid == tid
                && last.src == src
                && last.dst == dst
                && now_ms.saturating_sub(last.at_ms) <= u64::from(self.window_ms)
            {
                return true;
            }
        }
        self.last = Some(LastMessage {
            tid,
            src,
            dst,
            at_ms: now_ms,
        });
        false
    }
}
