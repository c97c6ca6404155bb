//! Per-device controller handles.

use std::fmt;
use std::ops::DerefMut;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::descriptor::DeviceDescriptor;
use crate::history::{CommandHistory, Direction, HistorySummary};
use crate::link::{DeviceLink, LinkCommand, LinkError};
use crate::runtime::{self, Mutex};
use crate::state::DeviceState;
use crate::types::Mode;

/// Exclusive access to one bulb's link.
///
/// Holding a `Session` is what serializes probes and applies against the
/// same device.
pub(crate) struct Session {
    link: Box<dyn DeviceLink>,
    history: CommandHistory,
}

impl Session {
    /// Read raw state, bounded by `limit`.
    pub(crate) async fn read_state(&mut self, limit: Duration) -> Result<Value, LinkError> {
        let res = runtime::timeout(limit, self.link.read_state())
            .await
            .unwrap_or_else(|_| Err(LinkError::timed_out()));

        match &res {
            Ok(state) => self.history.record(
                Direction::Receive,
                &json!({"method": "read_state", "value": state}),
            ),
            Err(e) => self.history.record_error(&e.to_string()),
        }
        res
    }

    /// Push one command, bounded by `limit`.
    pub(crate) async fn send(
        &mut self,
        command: LinkCommand,
        limit: Duration,
    ) -> Result<(), LinkError> {
        if let Ok(msg) = serde_json::to_value(command) {
            self.history.record(Direction::Send, &msg);
        }

        let res = runtime::timeout(limit, self.link.send(command))
            .await
            .unwrap_or_else(|_| Err(LinkError::timed_out()));

        if let Err(e) = &res {
            debug!("{} failed: {}", command.method(), e);
            self.history.record_error(&e.to_string());
        }
        res
    }
}

/// The live handle for one discovered bulb.
///
/// Exactly one handle exists per device id for the lifetime of a
/// [`Registry`](crate::Registry). Reading the recorded state or the
/// connectivity flag never waits for network I/O in progress on the link.
pub struct ControllerHandle {
    id: String,
    display_name: String,
    address: String,
    protocol_version: String,
    has_key: AtomicBool,
    connected: AtomicBool,
    current_state: Mutex<Option<DeviceState>>,
    session: Mutex<Session>,
}

impl ControllerHandle {
    pub(crate) fn new(
        descriptor: &DeviceDescriptor,
        link: Box<dyn DeviceLink>,
        history_capacity: usize,
    ) -> Self {
        ControllerHandle {
            id: descriptor.id.clone(),
            display_name: descriptor.display_name.clone(),
            address: descriptor.address.clone(),
            protocol_version: descriptor.protocol_version.clone(),
            has_key: AtomicBool::new(descriptor.has_key()),
            connected: AtomicBool::new(false),
            current_state: Mutex::new(None),
            session: Mutex::new(Session {
                link,
                history: CommandHistory::with_max_entries(history_capacity),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn protocol_version(&self) -> &str {
        &self.protocol_version
    }

    /// Whether the bulb has a local key and can therefore be commanded.
    pub fn has_key(&self) -> bool {
        self.has_key.load(Ordering::SeqCst)
    }

    /// Result of the most recent probe or apply.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// The last successfully applied state, if any.
    pub async fn current_state(&self) -> Option<DeviceState> {
        *self.current_state.lock().await
    }

    /// Read model of this handle, suitable for serialization.
    pub async fn summary(&self) -> ControllerSummary {
        let state = self.current_state().await;
        ControllerSummary {
            id: self.id.clone(),
            name: self.display_name.clone(),
            mode: state.map(|s| s.mode()),
            brightness: state.and_then(|s| s.brightness()).map(|p| p.value()),
            temperature: state.and_then(|s| s.temperature()).map(|p| p.value()),
            red: state.and_then(|s| s.color()).map(|c| c.red()),
            green: state.and_then(|s| s.color()).map(|c| c.green()),
            blue: state.and_then(|s| s.color()).map(|c| c.blue()),
            connected: self.is_connected(),
        }
    }

    /// Counters and last error of the link exchanges.
    ///
    /// Waits for any in-flight link operation on this device.
    pub async fn history(&self) -> HistorySummary {
        self.session.lock().await.history.summary()
    }

    pub(crate) async fn session(&self) -> impl DerefMut<Target = Session> + '_ {
        self.session.lock().await
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub(crate) async fn record_state(&self, state: DeviceState) {
        *self.current_state.lock().await = Some(state);
    }

    /// Swap in a link opened with a newly supplied key.
    pub(crate) async fn rekey(&self, link: Box<dyn DeviceLink>) {
        let mut session = self.session.lock().await;
        session.link = link;
        self.has_key.store(true, Ordering::SeqCst);
        debug!("controller {} re-keyed", self.id);
    }
}

impl fmt::Debug for ControllerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHandle")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("address", &self.address)
            .field("has_key", &self.has_key())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Flat view of a controller as presentation layers show it.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSummary {
    pub id: String,
    pub name: String,
    pub mode: Option<Mode>,
    pub brightness: Option<u8>,
    pub temperature: Option<u8>,
    pub red: Option<u8>,
    pub green: Option<u8>,
    pub blue: Option<u8>,
    pub connected: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockLink, descriptor};
    use crate::types::{Color, Percent};

    #[tokio::test]
    async fn test_new_handle_is_disconnected_and_empty() {
        let handle = ControllerHandle::new(&descriptor("A", ""), MockLink::healthy().boxed(), 10);
        assert_eq!(handle.id(), "A");
        assert!(!handle.has_key());
        assert!(!handle.is_connected());
        assert!(handle.current_state().await.is_none());
    }

    #[tokio::test]
    async fn test_summary_of_colour_state() {
        let handle = ControllerHandle::new(&descriptor("A", "k"), MockLink::healthy().boxed(), 10);
        handle.record_state(DeviceState::colour(Color::rgb(9, 8, 7))).await;
        handle.set_connected(true);

        let summary = handle.summary().await;
        assert_eq!(summary.mode, Some(Mode::Colour));
        assert_eq!((summary.red, summary.green, summary.blue), (Some(9), Some(8), Some(7)));
        assert_eq!(summary.brightness, None);
        assert!(summary.connected);

        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("brightness").is_none());
    }

    #[tokio::test]
    async fn test_summary_of_white_state() {
        let handle = ControllerHandle::new(&descriptor("B", "k"), MockLink::healthy().boxed(), 10);
        let state = DeviceState::white(Percent::create(50).unwrap(), Percent::create(30).unwrap());
        handle.record_state(state).await;

        let summary = handle.summary().await;
        assert_eq!(summary.mode, Some(Mode::White));
        assert_eq!(summary.brightness, Some(50));
        assert_eq!(summary.temperature, Some(30));
        assert_eq!(summary.red, None);
    }

    #[tokio::test]
    async fn test_session_records_history() {
        let link = MockLink::healthy();
        let handle = ControllerHandle::new(&descriptor("A", "k"), link.clone().boxed(), 10);
        {
            let mut session = handle.session().await;
            session.read_state(Duration::from_secs(1)).await.unwrap();
            session
                .send(LinkCommand::SetMode(Mode::White), Duration::from_secs(1))
                .await
                .unwrap();
        }
        let history = handle.history().await;
        assert_eq!(history.send_count, 1);
        assert_eq!(history.receive_count, 1);
        assert_eq!(history.last_error, None);
    }

    #[tokio::test]
    async fn test_session_times_out_slow_link() {
        let link = MockLink::healthy().with_delay(Duration::from_millis(200));
        let handle = ControllerHandle::new(&descriptor("A", "k"), link.boxed(), 10);
        let err = handle
            .session()
            .await
            .send(LinkCommand::SetMode(Mode::White), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err, LinkError::timed_out());
        assert_eq!(handle.history().await.failure_count, 1);
    }

    #[tokio::test]
    async fn test_rekey_swaps_link() {
        let handle =
            ControllerHandle::new(&descriptor("A", ""), MockLink::unreachable().boxed(), 10);
        let fresh = MockLink::healthy();
        handle.rekey(fresh.clone().boxed()).await;
        assert!(handle.has_key());
        assert!(handle.session().await.read_state(Duration::from_secs(1)).await.is_ok());
        assert_eq!(fresh.reads(), 1);
    }
}
