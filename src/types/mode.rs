//! Bulb operating modes.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// The operating mode of a bulb.
///
/// String forms use the vendor's spelling (`"white"`, `"colour"`), and
/// parsing is exact.
///
/// ```
/// use std::str::FromStr;
/// use tuya_lights_rs::Mode;
///
/// assert_eq!(Mode::from_str("colour").unwrap(), Mode::Colour);
/// assert!(Mode::from_str("color").is_err());
/// assert!(Mode::from_str("White").is_err());
/// assert_eq!(Mode::White.to_string(), "white");
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Mode {
    /// Tunable white: brightness and color temperature.
    White,
    /// RGB color.
    Colour,
}
