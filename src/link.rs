//! The device link boundary.
//!
//! The vendor protocol (session negotiation, encryption, data-point
//! framing) lives behind these traits. A link is a stateful, persistent
//! connection to one bulb and is not safe for concurrent use, which is why
//! every method takes `&mut self`; the registry guards each link with its
//! own lock.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::descriptor::DeviceDescriptor;
use crate::runtime::BoxFuture;
use crate::types::{Color, Mode, Percent};

/// A single command pushed to a bulb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "value", rename_all = "snake_case")]
pub enum LinkCommand {
    SetMode(Mode),
    Brightness(Percent),
    Temperature(Percent),
    Colour(Color),
}

impl LinkCommand {
    pub fn method(&self) -> &'static str {
        match self {
            LinkCommand::SetMode(_) => "set_mode",
            LinkCommand::Brightness(_) => "brightness",
            LinkCommand::Temperature(_) => "temperature",
            LinkCommand::Colour(_) => "colour",
        }
    }
}

/// Coarse category of a link failure, when the link knows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkErrorKind {
    /// Nothing more specific is known; the message is all there is.
    #[default]
    Other,
    /// Bad local key or undecryptable response.
    Credential,
    /// The operation hit its deadline.
    TimedOut,
    /// Socket-level failure.
    Io,
}

/// An opaque failure reported by a [`DeviceLink`] or [`LinkConnector`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct LinkError {
    kind: LinkErrorKind,
    message: String,
}

impl LinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(LinkErrorKind::Other, message)
    }

    pub fn with_kind(kind: LinkErrorKind, message: impl Into<String>) -> Self {
        LinkError {
            kind,
            message: message.into(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::with_kind(LinkErrorKind::Credential, message)
    }

    pub fn timed_out() -> Self {
        Self::with_kind(LinkErrorKind::TimedOut, "link operation timed out")
    }

    pub fn kind(&self) -> LinkErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        Self::with_kind(LinkErrorKind::Io, err.to_string())
    }
}

/// A live connection to one bulb.
pub trait DeviceLink: Send {
    /// Read the bulb's current raw state.
    ///
    /// Some firmware answers a failed read with a payload carrying an
    /// `Err`/`Error` member instead of failing the call; callers must
    /// inspect the payload.
    fn read_state(&mut self) -> BoxFuture<'_, Result<Value, LinkError>>;

    /// Push one command.
    fn send(&mut self, command: LinkCommand) -> BoxFuture<'_, Result<(), LinkError>>;
}

/// Opens links from discovered descriptors.
///
/// Connecting is expected to be cheap and local (building the session
/// object); the first network round-trip happens on the first read or send.
pub trait LinkConnector: Send + Sync {
    fn connect(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeviceLink>, LinkError>;
}

impl<F> LinkConnector for F
where
    F: Fn(&DeviceDescriptor) -> Result<Box<dyn DeviceLink>, LinkError> + Send + Sync,
{
    fn connect(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeviceLink>, LinkError> {
        self(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_serializes_with_method() {
        let cmd = LinkCommand::SetMode(Mode::Colour);
        assert_eq!(
            serde_json::to_value(cmd).unwrap(),
            json!({"method": "set_mode", "value": "colour"})
        );
        let cmd = LinkCommand::Colour(Color::rgb(1, 2, 3));
        assert_eq!(
            serde_json::to_value(cmd).unwrap(),
            json!({"method": "colour", "value": {"red": 1, "green": 2, "blue": 3}})
        );
    }

    #[test]
    fn test_method_matches_serialized_tag() {
        for cmd in [
            LinkCommand::SetMode(Mode::White),
            LinkCommand::Brightness(Percent::new()),
            LinkCommand::Temperature(Percent::new()),
            LinkCommand::Colour(Color::rgb(0, 0, 0)),
        ] {
            let value = serde_json::to_value(cmd).unwrap();
            assert_eq!(value["method"], cmd.method());
        }
    }

    #[test]
    fn test_io_error_conversion() {
        let err = LinkError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert_eq!(err.kind(), LinkErrorKind::Io);
        assert_eq!(err.message(), "refused");
    }
}
