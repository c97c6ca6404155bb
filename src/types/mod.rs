//! Value types for bulb state parameters.

mod color;
mod mode;
mod percent;

pub use color::Color;
pub use mode::Mode;
pub use percent::Percent;
