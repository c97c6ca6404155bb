//! Percentage sliders (brightness and color temperature).

use serde::{Deserialize, Serialize};

/// A slider position from 0 to 100 percent.
///
/// Brightness and color temperature are both exposed by the bulbs as
/// percentages of their hardware range, so they share this type.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "i64", into = "u8")]
pub struct Percent {
    pub(crate) value: u8,
}

impl Percent {
    const MIN: i64 = 0;
    const MAX: i64 = 100;

    /// Create a new Percent at full scale (100%).
    ///
    /// # Examples
    ///
    /// ```
    /// use tuya_lights_rs::Percent;
    ///
    /// assert_eq!(Percent::new().value(), 100);
    /// ```
    pub fn new() -> Self {
        Percent {
            value: Self::MAX as u8,
        }
    }

    /// A slider at 0%. At zero brightness the bulb is dark.
    pub fn zero() -> Self {
        Percent { value: 0 }
    }

    /// Get the percentage value.
    pub fn value(&self) -> u8 {
        self.value
    }

    /// Create a new Percent with the given value.
    ///
    /// Returns `None` if value is outside the valid range (0-100).
    ///
    /// # Examples
    ///
    /// ```
    /// use tuya_lights_rs::Percent;
    ///
    /// assert!(Percent::create(-1).is_none());
    /// assert!(Percent::create(0).is_some());
    /// assert!(Percent::create(100).is_some());
    /// assert!(Percent::create(101).is_none());
    /// ```
    pub fn create(value: i64) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Some(Percent { value: value as u8 })
        } else {
            None
        }
    }
}

impl TryFrom<i64> for Percent {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, String> {
        Percent::create(value).ok_or_else(|| format!("{value} is outside 0-100"))
    }
}

impl From<Percent> for u8 {
    fn from(p: Percent) -> Self {
        p.value
    }
}
