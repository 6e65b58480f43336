//! Optional per-message integrity tag.
//!
//! A protected message body is followed by the first [`TAG_LEN`] bytes of
//! `HMAC-SHA256(key, kind || body)`. The tag is counted in the total
//! length carried by the first fragment.

use crate::error::ProError;

use super::payload::MessageKind;

/// Truncated tag length on the wire.
pub const TAG_LEN: usize = 8;

/// Shared key used to tag and verify protected messages.
#[derive(Clone, PartialEq, Eq)]
pub struct ProtectKey([u8; 32]);

impl ProtectKey {
    pub fn new(key: [u8; 32]) -> Self {
        Self(key)
    }

    fn tag(&self, kind: MessageKind, body: &[u8]) -> [u8; TAG_LEN] {
        let mut mac = hmac_sha256::HMAC::new(self.0);
        mac.update([kind_byte(kind)]);
        mac.update(body);
        let full = mac.finalize();
        let mut tag = [0u8; TAG_LEN];
        tag.copy_from_slice(&full[..TAG_LEN]);
        tag
    }

    /// Append the tag to `body`.
    pub fn seal(&self, kind: MessageKind, body: &mut Vec<u8>) {
        let tag = self.tag(kind, body);
        body.extend_from_slice(&tag);
    }

    /// Verify and strip the trailing tag.
    pub fn open(&self, kind: MessageKind, mut sealed: Vec<u8>) -> Result<Vec<u8>, ProError> {
        if sealed.len() < TAG_LEN {
            return Err(ProError::Integrity);
        }
        let split = sealed.len() - TAG_LEN;
        let expected = self.tag(kind, &sealed[..split]);
        if !constant_time_eq(&expected, &sealed[split..]) {
            return Err(ProError::Integrity);
        }
        sealed.truncate(split);
        Ok(sealed)
    }
}

// Key bytes stay out of logs.
impl core::fmt::Debug for ProtectKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ProtectKey(..)")
    }
}

fn kind_byte(kind: MessageKind) -> u8 {
    kind.frame_type() as u8
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_then_open_restores_body() {
        let key = ProtectKey::new([0x5A; 32]);
        let mut body = b"\x01home-net".to_vec();
        key.seal(MessageKind::Data, &mut body);
        assert_eq!(body.len(), 9 + TAG_LEN);

        let opened = key.open(MessageKind::Data, body).unwrap();
        assert_eq!(opened, b"\x01home-net");
    }

    #[test]
    fn tampered_body_rejected() {
        let key = ProtectKey::new([0x5A; 32]);
        let mut body = b"\x01home-net".to_vec();
        key.seal(MessageKind::Data, &mut body);
        body[2] ^= 0x01;
        assert_eq!(key.open(MessageKind::Data, body), Err(ProError::Integrity));
    }

    #[test]
    fn kind_is_bound_into_tag() {
        let key = ProtectKey::new([0x11; 32]);
        let mut body = vec![0x01];
        key.seal(MessageKind::Command, &mut body);
        assert_eq!(key.open(MessageKind::Data, body), Err(ProError::Integrity));
    }

    #[test]
    fn wrong_key_rejected() {
        let mut body = vec![0x04];
        ProtectKey::new([1; 32]).seal(MessageKind::Command, &mut body);
        assert!(ProtectKey::new([2; 32]).open(MessageKind::Command, body).is_err());
    }

    #[test]
    fn short_input_rejected() {
        let key = ProtectKey::new([0; 32]);
        assert_eq!(key.open(MessageKind::Data, vec![1, 2, 3]), Err(ProError::Integrity));
    }
}
