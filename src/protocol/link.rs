//! Link abstraction: any packet-oriented channel to the peer.
//!
//! Concrete implementations:
//! - GATT notifications on the read/notify characteristic (`gatt::GattLink`)
//! - In-memory loopback (simulator and tests)
//!
//! The sender is generic over `Link`, so adding a new bearer requires
//! zero changes to the transfer logic.

/// Packet-oriented outbound channel.
pub trait Link {
    /// Error type for this link.
    type Error: core::fmt::Debug;

    /// Send one complete packet to the peer.
    fn notify(&mut self, packet: &[u8]) -> Result<(), Self::Error>;

    /// Current ATT MTU.
    fn mtu(&self) -> usize;
}

/// A null link that discards all packets.
/// Useful as a default when no central is connected.
pub struct NullLink;

impl Link for NullLink {
    type Error = ();

    fn notify(&mut self, _packet: &[u8]) -> Result<(), ()> {
        Ok(())
    }

    fn mtu(&self) -> usize {
        23
    }
}

impl<L: Link + ?Sized> Link for &mut L {
    type Error = L::Error;

    fn notify(&mut self, packet: &[u8]) -> Result<(), Self::Error> {
        (**self).notify(packet)
    }

    fn mtu(&self) -> usize {
        (**self).mtu()
    }
}
