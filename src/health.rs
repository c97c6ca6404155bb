//! Connection health probing.

use std::time::Duration;

use log::debug;
use serde_json::Value;

use crate::controller::{ControllerHandle, Session};

/// Check whether a bulb answers a state read.
///
/// Takes the handle's link, so it waits for any operation in flight on the
/// same device. Never fails: every link failure counts as unreachable.
/// The handle's connectivity flag is left to the caller.
pub async fn probe(handle: &ControllerHandle, limit: Duration) -> bool {
    let mut session = handle.session().await;
    probe_session(handle.id(), &mut *session, limit).await
}

/// Probe through a link the caller already holds.
pub(crate) async fn probe_session(id: &str, session: &mut Session, limit: Duration) -> bool {
    match session.read_state(limit).await {
        Ok(state) if is_healthy_payload(&state) => true,
        Ok(state) => {
            debug!("probe of {id} returned an error payload: {state}");
            false
        }
        Err(e) => {
            debug!("probe of {id} failed: {e}");
            false
        }
    }
}

/// A state read is healthy when it carries something and no vendor error
/// member (`Err` / `Error`).
///
/// "Something" and "set" both mean non-empty: null, `false`, zero and
/// empty strings, arrays or objects count as nothing.
pub fn is_healthy_payload(state: &Value) -> bool {
    if !is_set(state) {
        return false;
    }
    match state {
        Value::Object(map) => !["Err", "Error"]
            .iter()
            .any(|k| map.get(*k).is_some_and(is_set)),
        _ => true,
    }
}

fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockLink, descriptor};
    use serde_json::json;

    #[test]
    fn test_healthy_payloads() {
        assert!(is_healthy_payload(&json!({"dps": {"20": true}})));
        assert!(is_healthy_payload(&json!({"dps": {}, "Error": null})));
        assert!(is_healthy_payload(&json!({"dps": {}, "Err": 0, "Error": ""})));
        assert!(is_healthy_payload(&json!({"dps": {}, "Err": {}, "Error": []})));
        assert!(is_healthy_payload(&json!(1)));
    }

    #[test]
    fn test_unhealthy_payloads() {
        assert!(!is_healthy_payload(&Value::Null));
        assert!(!is_healthy_payload(&json!({})));
        assert!(!is_healthy_payload(&json!({"Err": "901", "Error": "Network Error"})));
        assert!(!is_healthy_payload(&json!({"dps": {}, "Error": "Unexpected Payload"})));
        assert!(!is_healthy_payload(&json!(false)));
        assert!(!is_healthy_payload(&json!(0)));
        assert!(!is_healthy_payload(&json!([])));
        assert!(!is_healthy_payload(&json!({"dps": {}, "Err": 905})));
    }

    #[tokio::test]
    async fn test_probe_reachable() {
        let handle = ControllerHandle::new(&descriptor("A", "k"), MockLink::healthy().boxed(), 10);
        assert!(probe(&handle, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_probe_absorbs_failures() {
        for link in [MockLink::unreachable(), MockLink::error_payload()] {
            let handle = ControllerHandle::new(&descriptor("A", "k"), link.boxed(), 10);
            assert!(!probe(&handle, Duration::from_secs(1)).await);
        }
    }

    #[tokio::test]
    async fn test_probe_times_out() {
        let link = MockLink::healthy().with_delay(Duration::from_millis(300));
        let handle = ControllerHandle::new(&descriptor("A", "k"), link.boxed(), 10);
        assert!(!probe(&handle, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_probe_does_not_touch_flags() {
        let handle = ControllerHandle::new(&descriptor("A", "k"), MockLink::healthy().boxed(), 10);
        assert!(probe(&handle, Duration::from_secs(1)).await);
        assert!(!handle.is_connected());
        assert!(handle.current_state().await.is_none());
    }
}
