//! Application core: node logic, zero I/O.
//!
//! Provisioning request handling, credential persistence, button gesture
//! policy and mesh state reporting. All interaction with the platform
//! happens through **port traits** defined in [`ports`], keeping this
//! layer testable without a radio.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
