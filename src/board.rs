//! Board description: radio calibration, MAC sourcing and GPIO roles.
//!
//! Loaded once at boot from a JSON document (the host stand-in for the
//! device-tree blob). A board that fails validation is a boot error; the
//! caller logs it and halts.

use heapless::{String, Vec};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::ButtonConfig;
use crate::error::BoardError;

pub const XTAL_TRIM_LEN: usize = 5;
pub const POWER_CHANNELS: usize = 14;
pub const MAX_GPIO_PIN: u8 = 31;
const MAX_XTAL_TRIM: u8 = 63;
const POWER_OFFSET_RANGE: core::ops::RangeInclusive<i8> = -32..=31;
const MAX_GPIO_FEATURES: usize = 8;

/// Where a MAC address may be read from, tried in configured order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacSource {
    Efuse,
    Flash,
    Factory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum GpioFeature {
    Led {
        pin: u8,
        active_low: bool,
    },
    Button {
        pin: u8,
        active_low: bool,
        #[serde(default)]
        timing: ButtonConfig,
    },
}

impl GpioFeature {
    pub fn pin(&self) -> u8 {
        match self {
            Self::Led { pin, .. } | Self::Button { pin, .. } => *pin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub mac_order: Vec<MacSource, 3>,
    pub xtal_trim: [u8; XTAL_TRIM_LEN],
    pub power_offset: [i8; POWER_CHANNELS],
    pub country_code: String<2>,
    pub gpio: Vec<GpioFeature, MAX_GPIO_FEATURES>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        let mut mac_order = Vec::new();
        let _ = mac_order.extend_from_slice(&[MacSource::Efuse, MacSource::Flash, MacSource::Factory]);
        let mut gpio = Vec::new();
        let _ = gpio.push(GpioFeature::Led {
            pin: 5,
            active_low: false,
        });
        let _ = gpio.push(GpioFeature::Button {
            pin: 8,
            active_low: true,
            timing: ButtonConfig::default(),
        });
        let mut country_code = String::new();
        let _ = country_code.push_str("CN");
        Self {
            mac_order,
            xtal_trim: [40; XTAL_TRIM_LEN],
            power_offset: [0; POWER_CHANNELS],
            country_code,
            gpio,
        }
    }
}

impl BoardConfig {
    /// Parse and validate a board description.
    pub fn from_json(json: &str) -> Result<Self, BoardError> {
        let board: Self = serde_json::from_str(json).map_err(|e| {
            warn!("board: parse failed: {}", e);
            BoardError::Parse
        })?;
        board.validate()?;
        info!(
            "board: country {}, {} GPIO feature(s)",
            board.country_code,
            board.gpio.len()
        );
        Ok(board)
    }

    pub fn validate(&self) -> Result<(), BoardError> {
        if self.mac_order.is_empty() {
            return Err(BoardError::Invalid("mac_order is empty"));
        }
        for (i, src) in self.mac_order.iter().enumerate() {
            if self.mac_order[..i].contains(src) {
                return Err(BoardError::Invalid("mac_order repeats a source"));
            }
        }
        if self.xtal_trim.iter().any(|t| *t > MAX_XTAL_TRIM) {
            return Err(BoardError::Invalid("xtal_trim"));
        }
        if self.power_offset.iter().any(|p| !POWER_OFFSET_RANGE.contains(p)) {
            return Err(BoardError::Invalid("power_offset"));
        }
        if self.country_code.len() != 2 || !self.country_code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Err(BoardError::Invalid("country_code"));
        }

        for (i, feature) in self.gpio.iter().enumerate() {
            let pin = feature.pin();
            if pin > MAX_GPIO_PIN {
                return Err(BoardError::Invalid("gpio pin"));
            }
            if self.gpio[..i].iter().any(|f| f.pin() == pin) {
                return Err(BoardError::DuplicatePin(pin));
            }
            if let GpioFeature::Button { timing, .. } = feature {
                timing.validate().map_err(BoardError::Invalid)?;
            }
        }
        Ok(())
    }

    /// First configured button: `(pin, active_low, timing)`.
    pub fn button(&self) -> Option<(u8, bool, ButtonConfig)> {
        self.gpio.iter().find_map(|f| match f {
            GpioFeature::Button {
                pin,
                active_low,
                timing,
            } => Some((*pin, *active_low, *timing)),
            GpioFeature::Led { .. } => None,
        })
    }

    /// Configured LEDs: `(pin, active_low)`.
    pub fn leds(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        self.gpio.iter().filter_map(|f| match f {
            GpioFeature::Led { pin, active_low } => Some((*pin, *active_low)),
            GpioFeature::Button { .. } => None,
        })
    }

    /// First usable MAC in `mac_order`.
    pub fn resolve_mac(&self, reader: &mut impl MacReader) -> Result<[u8; 6], BoardError> {
        for src in &self.mac_order {
            match reader.read_mac(*src) {
                Some(mac) if is_usable_mac(&mac) => {
                    info!("board: MAC from {:?}", src);
                    return Ok(mac);
                }
                Some(_) => warn!("board: {:?} MAC unusable", src),
                None => {}
            }
        }
        Err(BoardError::NoValidMac)
    }
}

/// Platform access to the MAC storage locations.
pub trait MacReader {
    fn read_mac(&mut self, source: MacSource) -> Option<[u8; 6]>;
}

/// Not all-zero, not broadcast, not multicast.
fn is_usable_mac(mac: &[u8; 6]) -> bool {
    *mac != [0; 6] && *mac != [0xFF; 6] && mac[0] & 0x01 == 0
}
