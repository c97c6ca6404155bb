//! Requested and realized bulb states.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;
use crate::types::{Color, Mode, Percent};

type Result<T> = std::result::Result<T, Error>;

/// A validated operating point of a bulb.
///
/// Only the fields of the active mode exist, so a `DeviceState` can never
/// carry out-of-range values: it is built either from range-checked value
/// types or by validating a [`StateRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum DeviceState {
    White {
        brightness: Percent,
        temperature: Percent,
    },
    Colour {
        #[serde(flatten)]
        color: Color,
    },
}

impl DeviceState {
    pub fn white(brightness: Percent, temperature: Percent) -> Self {
        DeviceState::White {
            brightness,
            temperature,
        }
    }

    pub fn colour(color: Color) -> Self {
        DeviceState::Colour { color }
    }

    pub fn mode(&self) -> Mode {
        match self {
            DeviceState::White { .. } => Mode::White,
            DeviceState::Colour { .. } => Mode::Colour,
        }
    }

    pub fn brightness(&self) -> Option<Percent> {
        match self {
            DeviceState::White { brightness, .. } => Some(*brightness),
            DeviceState::Colour { .. } => None,
        }
    }

    pub fn temperature(&self) -> Option<Percent> {
        match self {
            DeviceState::White { temperature, .. } => Some(*temperature),
            DeviceState::Colour { .. } => None,
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self {
            DeviceState::White { .. } => None,
            DeviceState::Colour { color } => Some(*color),
        }
    }
}

/// An untrusted state change as submitted by a caller.
///
/// Values are wide signed integers so that out-of-range input (negative or
/// above the channel maximum) reaches validation instead of failing at
/// decode time. Missing values take the full-scale defaults.
///
/// # Examples
///
/// ```
/// use tuya_lights_rs::{DeviceState, StateRequest};
///
/// let req: StateRequest = serde_json::from_str(r#"{"mode": "white", "brightness": 50}"#).unwrap();
/// let state = DeviceState::try_from(&req).unwrap();
/// assert_eq!(state.brightness().unwrap().value(), 50);
/// assert_eq!(state.temperature().unwrap().value(), 100);
///
/// let bad: StateRequest = serde_json::from_str(r#"{"mode": "colour", "red": 300}"#).unwrap();
/// assert!(DeviceState::try_from(&bad).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRequest {
    pub mode: String,
    #[serde(default = "StateRequest::full_percent", alias = "bright")]
    pub brightness: i64,
    #[serde(default = "StateRequest::full_percent", alias = "temp")]
    pub temperature: i64,
    #[serde(default = "StateRequest::full_channel", alias = "r")]
    pub red: i64,
    #[serde(default = "StateRequest::full_channel", alias = "g")]
    pub green: i64,
    #[serde(default = "StateRequest::full_channel", alias = "b")]
    pub blue: i64,
}

impl StateRequest {
    fn full_percent() -> i64 {
        100
    }

    fn full_channel() -> i64 {
        255
    }

    /// A white-mode request; colour fields take their defaults.
    pub fn white(brightness: i64, temperature: i64) -> Self {
        StateRequest {
            mode: Mode::White.to_string(),
            brightness,
            temperature,
            red: Self::full_channel(),
            green: Self::full_channel(),
            blue: Self::full_channel(),
        }
    }

    /// A colour-mode request; white fields take their defaults.
    pub fn colour(red: i64, green: i64, blue: i64) -> Self {
        StateRequest {
            mode: Mode::Colour.to_string(),
            brightness: Self::full_percent(),
            temperature: Self::full_percent(),
            red,
            green,
            blue,
        }
    }

    /// Check this request against the range rules of its mode.
    ///
    /// Only the active mode's fields are inspected.
    pub fn validate(&self) -> Result<DeviceState> {
        let mode = Mode::from_str(&self.mode).map_err(|_| {
            Error::InvalidState(format!(
                "unknown mode {:?}; use \"white\" or \"colour\"",
                self.mode
            ))
        })?;

        match mode {
            Mode::White => {
                let brightness = Percent::create(self.brightness).ok_or_else(|| {
                    Error::InvalidState(format!(
                        "brightness {} is outside 0-100",
                        self.brightness
                    ))
                })?;
                let temperature = Percent::create(self.temperature).ok_or_else(|| {
                    Error::InvalidState(format!(
                        "color temperature {} is outside 0-100",
                        self.temperature
                    ))
                })?;
                Ok(DeviceState::white(brightness, temperature))
            }
            Mode::Colour => Color::create(self.red, self.green, self.blue)
                .map(DeviceState::colour)
                .ok_or_else(|| {
                    Error::InvalidState(format!(
                        "color ({}, {}, {}) has a channel outside 0-255",
                        self.red, self.green, self.blue
                    ))
                }),
        }
    }
}

impl TryFrom<&StateRequest> for DeviceState {
    type Error = Error;

    fn try_from(req: &StateRequest) -> Result<Self> {
        req.validate()
    }
}

impl From<&DeviceState> for StateRequest {
    fn from(state: &DeviceState) -> Self {
        match state {
            DeviceState::White {
                brightness,
                temperature,
            } => StateRequest::white(brightness.value().into(), temperature.value().into()),
            DeviceState::Colour { color } => StateRequest::colour(
                color.red().into(),
                color.green().into(),
                color.blue().into(),
            ),
        }
    }
}
