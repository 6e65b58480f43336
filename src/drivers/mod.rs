//! Board peripheral drivers.

pub mod button;
