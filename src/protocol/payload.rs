//! Typed message bodies and the receive callback table.
//!
//! A message body is `[id][data ...]`. The frame type (command or data)
//! and the id together select the handler.

use super::frame::FrameType;

/// Whether a message is a command or a data transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Command,
    Data,
}

impl MessageKind {
    pub fn frame_type(self) -> FrameType {
        match self {
            Self::Command => FrameType::Command,
            Self::Data => FrameType::Data,
        }
    }

    pub fn from_frame_type(t: FrameType) -> Option<Self> {
        match t {
            FrameType::Command => Some(Self::Command),
            FrameType::Data => Some(Self::Data),
            FrameType::Ack => None,
        }
    }
}

/// Command ids (central → node).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Connect = 0x01,
    Disconnect = 0x02,
    Scan = 0x03,
    GetState = 0x04,
    ClearCredentials = 0x05,
}

impl Command {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Self::Connect),
            0x02 => Some(Self::Disconnect),
            0x03 => Some(Self::Scan),
            0x04 => Some(Self::GetState),
            0x05 => Some(Self::ClearCredentials),
            _ => None,
        }
    }
}

/// Data ids, both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataId {
    Ssid = 0x01,
    Password = 0x02,
    Bssid = 0x03,
    ZigbeeLinkKey = 0x04,
    ScanResults = 0x10,
    State = 0x11,
}

impl DataId {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0x01 => Some(Self::Ssid),
            0x02 => Some(Self::Password),
            0x03 => Some(Self::Bssid),
            0x04 => Some(Self::ZigbeeLinkKey),
            0x10 => Some(Self::ScanResults),
            0x11 => Some(Self::State),
            _ => None,
        }
    }
}

/// An outbound logical message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: MessageKind,
    pub id: u8,
    pub data: Vec<u8>,
}

impl Message {
    pub fn command(cmd: Command) -> Self {
        Self {
            kind: MessageKind::Command,
            id: cmd as u8,
            data: Vec::new(),
        }
    }

    pub fn data(id: DataId, data: &[u8]) -> Self {
        Self {
            kind: MessageKind::Data,
            id: id as u8,
            data: data.to_vec(),
        }
    }

    /// `[id][data ...]`
    pub fn body(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(1 + self.data.len());
        body.push(self.id);
        body.extend_from_slice(&self.data);
        body
    }
}

/// One fully reassembled inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProEvent {
    pub kind: MessageKind,
    pub id: u8,
    pub data: Vec<u8>,
}

impl ProEvent {
    /// Split a reassembled body into `(id, data)`. Empty bodies carry no id.
    pub fn from_body(kind: MessageKind, mut body: Vec<u8>) -> Option<Self> {
        if body.is_empty() {
            return None;
        }
        let id = body.remove(0);
        Some(Self { kind, id, data: body })
    }
}

/// Receive-side callback table.
///
/// Exactly one handler is registered with a receiver. Either method may
/// return a reply to be sent back over the same link.
pub trait ProHandler {
    fn on_command(&mut self, id: u8, data: &[u8]) -> Option<Message>;
    fn on_data(&mut self, id: u8, data: &[u8]) -> Option<Message>;

    /// Route an event to the matching method.
    fn dispatch(&mut self, event: &ProEvent) -> Option<Message> {
        match event.kind {
            MessageKind::Command => self.on_command(event.id, &event.data),
            MessageKind::Data => self.on_data(event.id, &event.data),
        }
    }
}
