//! Classification of opaque link failures.
//!
//! Vendor libraries rarely expose a structured error taxonomy, so
//! credential problems are recognized by message. Keep every pattern here.

use crate::link::{LinkError, LinkErrorKind};

const CREDENTIAL_PATTERNS: &[&str] = &["device key", "local key", "decrypt"];

/// True if the failure points at a bad or missing local key.
pub fn is_credential_failure(err: &LinkError) -> bool {
    if err.kind() == LinkErrorKind::Credential {
        return true;
    }
    let msg = err.message().to_lowercase();
    CREDENTIAL_PATTERNS.iter().any(|p| msg.contains(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structured_credential_kind() {
        assert!(is_credential_failure(&LinkError::credential("nope")));
    }

    #[test]
    fn test_patterns_are_case_insensitive() {
        for msg in [
            "Check device key or version",
            "LOCAL KEY mismatch",
            "Unable to Decrypt payload",
        ] {
            assert!(is_credential_failure(&LinkError::new(msg)), "{msg}");
        }
    }

    #[test]
    fn test_other_failures() {
        assert!(!is_credential_failure(&LinkError::new("Network Error: Unable to Connect")));
        assert!(!is_credential_failure(&LinkError::timed_out()));
    }
}
