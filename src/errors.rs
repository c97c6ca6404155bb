use std::time::Duration;

use strum_macros::{Display, EnumIter, IntoStaticStr};

/// All error kinds surfaced by the registry to its callers.
///
/// Validation errors ([`Error::NotFound`], [`Error::MissingCredential`],
/// [`Error::InvalidState`]) are raised before any network I/O. The
/// network-derived ones are only raised after a device link call failed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The id was never produced by a discovery.
    #[error("controller {0} not found")]
    NotFound(String),

    /// Nothing has been discovered yet.
    #[error("no controllers discovered yet; run a discovery first")]
    EmptyRegistry,

    /// The requested mode or values violate the mode's range rules.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The device is known but has no local key.
    #[error(
        "device {0} has no local key; re-discovery with a provided key is required"
    )]
    MissingCredential(String),

    /// The link reported a credential or decryption problem.
    #[error("authentication with device {id} failed, check its local key: {cause}")]
    AuthenticationFailure { id: String, cause: String },

    /// The apply failed and a follow-up probe found the device unreachable.
    #[error("device {0} is unreachable; check its network connection and try again")]
    ConnectionLost(String),

    /// The apply failed for a reason that is neither credential- nor
    /// connectivity-related.
    #[error("failed to apply state to device {id}: {cause}")]
    ApplyFailed { id: String, cause: String },

    /// The scanner did not complete in time.
    #[error("network scan did not complete within {0:?}")]
    ScanTimeout(Duration),

    /// The scan failed or the descriptor source was unreadable or malformed.
    #[error("discovery source error: {0}")]
    DiscoverySource(String),
}

/// Stable category of an [`Error`], for presentation layers to map onto
/// their own conventions (status codes, dialogs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    EmptyRegistry,
    InvalidState,
    MissingCredential,
    AuthenticationFailure,
    ConnectionLost,
    ApplyFailed,
    ScanTimeout,
    DiscoverySourceError,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::EmptyRegistry => ErrorKind::EmptyRegistry,
            Error::InvalidState(_) => ErrorKind::InvalidState,
            Error::MissingCredential(_) => ErrorKind::MissingCredential,
            Error::AuthenticationFailure { .. } => ErrorKind::AuthenticationFailure,
            Error::ConnectionLost(_) => ErrorKind::ConnectionLost,
            Error::ApplyFailed { .. } => ErrorKind::ApplyFailed,
            Error::ScanTimeout(_) => ErrorKind::ScanTimeout,
            Error::DiscoverySource(_) => ErrorKind::DiscoverySourceError,
        }
    }

    /// True for errors detected before touching the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NotFound | ErrorKind::MissingCredential | ErrorKind::InvalidState
        )
    }

    pub(crate) fn authentication(id: &str, cause: impl ToString) -> Self {
        Error::AuthenticationFailure {
            id: id.to_string(),
            cause: cause.to_string(),
        }
    }

    pub(crate) fn apply_failed(id: &str, cause: impl ToString) -> Self {
        Error::ApplyFailed {
            id: id.to_string(),
            cause: cause.to_string(),
        }
    }
}
