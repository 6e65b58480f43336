//! Fragment reassembly with a receive deadline.
//!
//! ```text
//!            index 0                  index n (in order)
//!  ┌──────┐ ─────────▶ ┌────────────┐ ───────────────┐
//!  │ Idle │            │ Assembling │ ◀──────────────┘
//!  └──────┘ ◀───────── └────────────┘
//!      ▲   last fragment     │ window elapsed / bad field
//!      └─────────────────────┘ (partial buffer discarded)
//! ```
//!
//! The buffer is allocated once from the total length carried by the
//! first fragment. Every accepted fragment re-arms the window. A copy of
//! the last accepted fragment is never appended: with a changed `seq` it
//! is a retransmission and re-arms the window, with the same `seq` it is
//! ignored. For index 0 only the immediate retry (`seq` advanced by one,
//! `RETRY` set) counts as a copy; any other index 0 starts a new message.

use log::{debug, warn};

use crate::error::ProError;

use super::frame::Frame;
use super::payload::{MessageKind, ProEvent};
use super::protect::ProtectKey;

/// Result of feeding one fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// Accepted; more fragments expected.
    Pending,
    /// Copy of a fragment already accepted; nothing appended.
    Duplicate,
    /// Last fragment accepted; the message is complete.
    Complete(ProEvent),
}

#[derive(Debug)]
struct Partial {
    buf: Vec<u8>,
    total: usize,
    next_index: u16,
    deadline_ms: u64,
    kind: MessageKind,
    protected: bool,
}

/// Receive-side reassembly buffer for a single peer.
#[derive(Debug)]
pub struct Reassembler {
    partial: Option<Partial>,
    /// (index, seq) of the last accepted fragment, kept across completion
    /// so a late retransmission of a finished message is recognised.
    last: Option<(u16, u8)>,
    max_message_len: usize,
    timeout_ms: u32,
    key: Option<ProtectKey>,
}

impl Reassembler {
    pub fn new(max_message_len: u16, timeout_ms: u32) -> Self {
        Self {
            partial: None,
            last: None,
            max_message_len: max_message_len as usize,
            timeout_ms,
            key: None,
        }
    }

    /// Accept protected messages verified with `key`.
    pub fn set_key(&mut self, key: Option<ProtectKey>) {
        self.key = key;
    }

    /// Feed one decoded data or command packet received at `now_ms`.
    pub fn feed(&mut self, frame: &Frame<'_>, now_ms: u64) -> Result<Feed, ProError> {
        let hdr = &frame.header;
        let kind = MessageKind::from_frame_type(hdr.frame_type)
            .ok_or(ProError::Malformed("ack is not a message fragment"))?;

        if let Some(p) = &self.partial {
            if now_ms > p.deadline_ms {
                warn!(
                    "blsync: reassembly window elapsed ({} of {} bytes), discarding",
                    p.buf.len(),
                    p.total
                );
                self.reset();
                if !hdr.is_first() {
                    return Err(ProError::Timeout);
                }
            }
        }

        if let Some((last_index, last_seq)) = self.last {
            if hdr.index == last_index {
                let changed = hdr.seq != last_seq;
                // Index 0 with a fresh seq is normally a new message; only the
                // sender's immediate retry of it counts as a copy.
                let repeat = !hdr.is_first()
                    || !changed
                    || (hdr.is_retry() && hdr.seq == last_seq.wrapping_add(1));
                if repeat {
                    debug!("blsync: duplicate fragment {} (seq {})", hdr.index, hdr.seq);
                    if changed {
                        self.last = Some((last_index, hdr.seq));
                        if let Some(p) = &mut self.partial {
                            p.deadline_ms = now_ms + u64::from(self.timeout_ms);
                        }
                    }
                    return Ok(Feed::Duplicate);
                }
            }
        }

        if hdr.is_first() {
            if let Some(p) = &self.partial {
                warn!(
                    "blsync: new message while {} of {} bytes pending, discarding",
                    p.buf.len(),
                    p.total
                );
            }
            self.partial = None;
            self.start(kind, hdr.total_len.unwrap_or(0), hdr.is_protected(), now_ms)?;
        } else {
            match self.partial.as_ref().map(|p| p.next_index) {
                None => {
                    self.last = None;
                    return Err(ProError::Malformed("fragment without a first fragment"));
                }
                Some(next) if next != hdr.index => {
                    self.reset();
                    return Err(ProError::Malformed("fragment out of order"));
                }
                Some(_) => {}
            }
        }

        self.append(frame, now_ms)
    }

    fn start(
        &mut self,
        kind: MessageKind,
        total: u16,
        protected: bool,
        now_ms: u64,
    ) -> Result<(), ProError> {
        let total = total as usize;
        if total == 0 {
            self.reset();
            return Err(ProError::Malformed("zero total length"));
        }
        if total > self.max_message_len {
            warn!(
                "blsync: message of {} bytes exceeds limit {}",
                total, self.max_message_len
            );
            self.reset();
            return Err(ProError::NoMem);
        }

        let mut buf = Vec::new();
        if buf.try_reserve_exact(total).is_err() {
            self.reset();
            return Err(ProError::NoMem);
        }

        self.partial = Some(Partial {
            buf,
            total,
            next_index: 0,
            deadline_ms: now_ms + u64::from(self.timeout_ms),
            kind,
            protected,
        });
        Ok(())
    }

    fn append(&mut self, frame: &Frame<'_>, now_ms: u64) -> Result<Feed, ProError> {
        let hdr = &frame.header;
        let timeout_ms = u64::from(self.timeout_ms);
        let Some(p) = self.partial.as_mut() else {
            return Err(ProError::Malformed("fragment without a first fragment"));
        };

        if p.buf.len() + frame.payload.len() > p.total {
            self.reset();
            return Err(ProError::Malformed("fragment overruns total length"));
        }

        p.buf.extend_from_slice(frame.payload);
        p.next_index = p.next_index.wrapping_add(1);
        p.deadline_ms = now_ms + timeout_ms;

        if !hdr.last {
            self.last = Some((hdr.index, hdr.seq));
            return Ok(Feed::Pending);
        }

        if p.buf.len() != p.total {
            self.reset();
            return Err(ProError::Malformed("message shorter than total length"));
        }

        let Some(done) = self.partial.take() else {
            return Err(ProError::Malformed("fragment without a first fragment"));
        };
        match self.finish(done) {
            Ok(event) => {
                self.last = Some((hdr.index, hdr.seq));
                Ok(Feed::Complete(event))
            }
            Err(e) => {
                // A retry of a rejected message must not be taken for a copy.
                self.reset();
                Err(e)
            }
        }
    }

    fn finish(&self, done: Partial) -> Result<ProEvent, ProError> {
        let body = if done.protected {
            match &self.key {
                Some(key) => key.open(done.kind, done.buf)?,
                None => {
                    warn!("blsync: protected message but no key configured");
                    return Err(ProError::Integrity);
                }
            }
        } else {
            done.buf
        };

        ProEvent::from_body(done.kind, body).ok_or(ProError::Malformed("message has no id"))
    }

    /// Discard any partial message.
    pub fn reset(&mut self) {
        self.partial = None;
        self.last = None;
    }

    /// Whether a message is partially received.
    pub fn is_active(&self) -> bool {
        self.partial.is_some()
    }

    /// Bytes buffered for the message in progress.
    pub fn buffered_len(&self) -> usize {
        self.partial.as_ref().map_or(0, |p| p.buf.len())
    }
}
