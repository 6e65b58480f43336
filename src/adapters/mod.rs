//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements       | Connects to                  |
//! |------------|------------------|------------------------------|
//! | `log_sink` | EventSink        | Serial log output            |
//! | `sim`      | WifiPort         | In-memory station simulation |
//! |            | AdvertisingPort  |                              |
//! |            | StoragePort      | In-memory key/value store    |
//! | `time`     | (clock)          | Monotonic host timer         |

pub mod log_sink;
pub mod sim;
pub mod time;
