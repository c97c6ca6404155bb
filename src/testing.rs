//! In-memory links, connectors, scanners, and sources for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::sync::Barrier;

use crate::descriptor::{DescriptorSource, DeviceDescriptor, SourceError};
use crate::link::{DeviceLink, LinkCommand, LinkConnector, LinkError};
use crate::runtime::{self, BoxFuture};
use crate::scanner::{NetworkScanner, ScanError};

pub(crate) fn descriptor(id: &str, key: &str) -> DeviceDescriptor {
    DeviceDescriptor {
        id: id.to_string(),
        address: "10.0.0.5".to_string(),
        secret_key: key.to_string(),
        protocol_version: "3.3".to_string(),
        display_name: format!("Bulb {id}"),
    }
}

/// Tracks how many reads are in flight across a set of links.
#[derive(Debug, Default)]
pub(crate) struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub(crate) fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct MockState {
    unreachable: bool,
    error_payload: bool,
    send_error: Option<LinkError>,
    delay: Duration,
    barrier: Option<Arc<Barrier>>,
    gauge: Option<Arc<Gauge>>,
    reads: usize,
    sent: Vec<LinkCommand>,
}

/// A scripted link. Clones share state, so a test can keep one clone and
/// hand the other to a handle.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockLink(Arc<Mutex<MockState>>);

impl MockLink {
    pub(crate) fn healthy() -> Self {
        Self::default()
    }

    pub(crate) fn unreachable() -> Self {
        let link = Self::default();
        link.set_reachable(false);
        link
    }

    /// Reads succeed but carry a vendor error member.
    pub(crate) fn error_payload() -> Self {
        let link = Self::default();
        link.0.lock().unwrap().error_payload = true;
        link
    }

    pub(crate) fn failing_sends(self, err: LinkError) -> Self {
        self.0.lock().unwrap().send_error = Some(err);
        self
    }

    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        self.0.lock().unwrap().delay = delay;
        self
    }

    /// The first send waits on `barrier` before completing.
    pub(crate) fn with_barrier(self, barrier: Arc<Barrier>) -> Self {
        self.0.lock().unwrap().barrier = Some(barrier);
        self
    }

    /// Reads report themselves to `gauge` while in flight.
    pub(crate) fn with_gauge(self, gauge: Arc<Gauge>) -> Self {
        self.0.lock().unwrap().gauge = Some(gauge);
        self
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.0.lock().unwrap().unreachable = !reachable;
    }

    pub(crate) fn reads(&self) -> usize {
        self.0.lock().unwrap().reads
    }

    pub(crate) fn sent(&self) -> Vec<LinkCommand> {
        self.0.lock().unwrap().sent.clone()
    }

    pub(crate) fn clear_sent(&self) {
        self.0.lock().unwrap().sent.clear();
    }

    pub(crate) fn boxed(self) -> Box<dyn DeviceLink> {
        Box::new(self)
    }
}

impl DeviceLink for MockLink {
    fn read_state(&mut self) -> BoxFuture<'_, Result<Value, LinkError>> {
        let state = Arc::clone(&self.0);
        Box::pin(async move {
            let (delay, gauge) = {
                let s = state.lock().unwrap();
                (s.delay, s.gauge.clone())
            };
            if let Some(g) = &gauge {
                g.enter();
            }
            if !delay.is_zero() {
                runtime::sleep(delay).await;
            }
            if let Some(g) = &gauge {
                g.exit();
            }

            let mut s = state.lock().unwrap();
            s.reads += 1;
            if s.unreachable {
                Err(LinkError::new("Network Error: Unable to Connect"))
            } else if s.error_payload {
                Ok(json!({"Err": "905", "Error": "Network Error: Device Unreachable"}))
            } else {
                Ok(json!({"dps": {"20": true, "21": "white"}}))
            }
        })
    }

    fn send(&mut self, command: LinkCommand) -> BoxFuture<'_, Result<(), LinkError>> {
        let state = Arc::clone(&self.0);
        Box::pin(async move {
            let (delay, barrier) = {
                let mut s = state.lock().unwrap();
                s.sent.push(command);
                (s.delay, s.barrier.take())
            };
            if let Some(barrier) = barrier {
                barrier.wait().await;
            }
            if !delay.is_zero() {
                runtime::sleep(delay).await;
            }

            let s = state.lock().unwrap();
            if let Some(err) = &s.send_error {
                Err(err.clone())
            } else if s.unreachable {
                Err(LinkError::new("Network Error: Unable to Connect"))
            } else {
                Ok(())
            }
        })
    }
}

/// Hands out pre-registered links by device id; unknown ids get a healthy
/// link, ids marked as rejected fail to connect.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockConnector {
    links: Arc<Mutex<HashMap<String, MockLink>>>,
    rejected: Arc<Mutex<HashSet<String>>>,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_link(self, id: &str, link: MockLink) -> Self {
        self.links.lock().unwrap().insert(id.to_string(), link);
        self
    }

    pub(crate) fn rejecting(self, id: &str) -> Self {
        self.rejected.lock().unwrap().insert(id.to_string());
        self
    }

    /// The link handed out (or to be handed out) for `id`.
    pub(crate) fn link(&self, id: &str) -> MockLink {
        self.links
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl LinkConnector for MockConnector {
    fn connect(&self, descriptor: &DeviceDescriptor) -> Result<Box<dyn DeviceLink>, LinkError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.rejected.lock().unwrap().contains(&descriptor.id) {
            return Err(LinkError::new(format!("invalid address {}", descriptor.address)));
        }
        Ok(self.link(&descriptor.id).boxed())
    }
}

/// A descriptor list that tests can replace between scans.
#[derive(Debug, Clone)]
pub(crate) struct MockSource(Arc<Mutex<Result<Vec<DeviceDescriptor>, String>>>);

impl MockSource {
    pub(crate) fn new(devices: Vec<DeviceDescriptor>) -> Self {
        MockSource(Arc::new(Mutex::new(Ok(devices))))
    }

    pub(crate) fn set(&self, devices: Vec<DeviceDescriptor>) {
        *self.0.lock().unwrap() = Ok(devices);
    }

    pub(crate) fn corrupt(&self, reason: &str) {
        *self.0.lock().unwrap() = Err(reason.to_string());
    }
}

impl DescriptorSource for MockSource {
    fn read(&self) -> Result<Vec<DeviceDescriptor>, SourceError> {
        self.0
            .lock()
            .unwrap()
            .clone()
            .map_err(|reason| SourceError::Malformed {
                path: "memory".into(),
                reason,
            })
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockScanner {
    delay: Duration,
    fail: bool,
    scans: Arc<AtomicUsize>,
}

impl MockScanner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub(crate) fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl NetworkScanner for MockScanner {
    fn scan(&self) -> BoxFuture<'_, Result<(), ScanError>> {
        Box::pin(async move {
            self.scans.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                runtime::sleep(self.delay).await;
            }
            if self.fail {
                return Err(ScanError::Socket {
                    action: "bind".to_string(),
                    err: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
                });
            }
            Ok(())
        })
    }
}
