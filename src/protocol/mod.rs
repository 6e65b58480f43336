//! BLE sync transport.
//!
//! Stop-and-wait messaging over GATT writes (central → node) and
//! notifications (node → central).
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    BLE sync stack                          │
//! │                                                            │
//! │  ┌──────────┐   ┌──────────┐   ┌───────────────────────┐   │
//! │  │  GATT    │──▶│  Frame   │──▶│  Reassembler          │   │
//! │  │  write   │   │  decode  │   │  → ProHandler         │   │
//! │  └──────────┘   └──────────┘   └───────────────────────┘   │
//! │       ▲                                    │               │
//! │       │              ┌─────────────────────┘ reply         │
//! │       │              ▼                                     │
//! │  ┌──────────┐   ┌────────────┐   ┌──────────┐              │
//! │  │  Link    │◀──│ Fragmenter │◀──│  Sender  │◀── AckSlot   │
//! │  │ (notify) │   └────────────┘   └──────────┘              │
//! │  └──────────┘                                              │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod fragment;
pub mod frame;
pub mod link;
pub mod payload;
pub mod protect;
pub mod reassembly;
pub mod transfer;

pub use frame::{Frame, FrameHeader, FrameType};
pub use link::{Link, NullLink};
pub use payload::{Command, DataId, Message, MessageKind, ProEvent, ProHandler};
pub use protect::ProtectKey;
pub use transfer::{AckSlot, AckTimer, ReactorTimer, Receiver, RxOutcome, Sender};
