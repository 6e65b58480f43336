//! blsync node library.
//!
//! BLE sync provisioning transport, Wi-Fi credential handling, BLE mesh
//! server models and the board-level drivers of a BL602/BL702 node.
//! Every module here is pure logic over port traits, so the whole crate
//! builds and tests on the host; the `blsync-sim` binary wires it to
//! the simulated platform in [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod board;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod events;
pub mod gatt;
pub mod mesh;
pub mod protocol;
pub mod provisioning;

mod error;

pub use error::{BoardError, Error, ProError, ProvisioningError, Result};
