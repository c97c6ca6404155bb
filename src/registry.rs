//! The device registry: discovery, lookup, and connectivity tracking.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::RegistryConfig;
use crate::controller::{ControllerHandle, ControllerSummary};
use crate::descriptor::{DescriptorSource, DeviceDescriptor, SnapshotFile};
use crate::engine;
use crate::errors::Error;
use crate::health;
use crate::link::{DeviceLink, LinkConnector};
use crate::runtime::{self, RwLock};
use crate::scanner::{BroadcastScanner, NetworkScanner};
use crate::state::{DeviceState, StateRequest};

type Result<T> = std::result::Result<T, Error>;

struct Entry {
    handle: Arc<ControllerHandle>,
    /// The descriptor the current link was opened from.
    descriptor: DeviceDescriptor,
}

#[derive(Default)]
struct Controllers {
    entries: Vec<Entry>,
    by_id: HashMap<String, usize>,
}

impl Controllers {
    fn get(&self, id: &str) -> Option<&Entry> {
        self.by_id.get(id).map(|&i| &self.entries[i])
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Entry> {
        self.by_id.get(id).map(|&i| &mut self.entries[i])
    }

    fn insert(&mut self, entry: Entry) {
        self.by_id
            .insert(entry.handle.id().to_string(), self.entries.len());
        self.entries.push(entry);
    }

    fn handles(&self) -> Vec<Arc<ControllerHandle>> {
        self.entries.iter().map(|e| Arc::clone(&e.handle)).collect()
    }
}

/// A descriptor whose link could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedDevice {
    pub id: String,
    pub reason: String,
}

/// Outcome of [`Registry::refresh_from_discovery`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Newly registered ids, in registration order.
    pub added: Vec<String>,
    /// Known keyless ids that received a key from this discovery.
    pub rekeyed: Vec<String>,
    /// Ids already registered and left untouched.
    pub known: Vec<String>,
    pub rejected: Vec<RejectedDevice>,
    /// Added or re-keyed ids that answered their first probe.
    pub reachable: Vec<String>,
}

/// Outcome of [`Registry::check_connectivity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub reachable: Vec<String>,
    pub unreachable: Vec<String>,
}

/// The single source of truth for which bulbs are known and reachable.
///
/// A registry is an ordinary value: build one per process and share it
/// (usually behind an `Arc`) with every front end. Structural changes are
/// serialized by one lock; operations on different devices never wait on
/// each other's network I/O, while operations on the same device are
/// serialized by that device's handle.
///
/// # Example
///
/// ```ignore
/// use tuya_lights_rs::{Registry, RegistryConfig, StateRequest};
///
/// let registry = Registry::with_snapshot(RegistryConfig::default(), "snapshot.json", my_connector);
/// registry.refresh_from_discovery().await?;
/// for summary in registry.summaries().await? {
///     println!("{} connected={}", summary.name, summary.connected);
/// }
/// registry.apply_state("bf0123", &StateRequest::white(80, 40)).await?;
/// ```
pub struct Registry {
    config: RegistryConfig,
    scanner: Box<dyn NetworkScanner>,
    source: Box<dyn DescriptorSource>,
    connector: Box<dyn LinkConnector>,
    controllers: RwLock<Controllers>,
}

impl Registry {
    pub fn new(
        config: RegistryConfig,
        scanner: impl NetworkScanner + 'static,
        source: impl DescriptorSource + 'static,
        connector: impl LinkConnector + 'static,
    ) -> Self {
        Registry {
            config,
            scanner: Box::new(scanner),
            source: Box::new(source),
            connector: Box::new(connector),
            controllers: RwLock::new(Controllers::default()),
        }
    }

    /// A registry that scans with a [`BroadcastScanner`] and reads the
    /// snapshot file it maintains.
    pub fn with_snapshot(
        config: RegistryConfig,
        snapshot_path: impl Into<PathBuf>,
        connector: impl LinkConnector + 'static,
    ) -> Self {
        let path = snapshot_path.into();
        Self::new(
            config,
            BroadcastScanner::new(&path),
            SnapshotFile::new(path),
            connector,
        )
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Scan the network and register every newly seen bulb.
    ///
    /// Blocks until the scan completes (or its timeout elapses) and until
    /// every new bulb has been probed once. Registration is additive: a
    /// known id keeps its handle and link, except that a keyless handle is
    /// re-keyed in place when the discovery supplies a key.
    pub async fn refresh_from_discovery(&self) -> Result<DiscoveryReport> {
        let scan_timeout = self.config.scan_timeout;
        match runtime::timeout(scan_timeout, self.scanner.scan()).await {
            Err(_) => return Err(Error::ScanTimeout(scan_timeout)),
            Ok(Err(e)) => return Err(Error::DiscoverySource(format!("scan failed: {e}"))),
            Ok(Ok(())) => {}
        }

        let descriptors = self
            .source
            .read()
            .map_err(|e| Error::DiscoverySource(e.to_string()))?;

        let mut report = DiscoveryReport::default();
        let mut to_probe = Vec::new();
        let mut rekeys = Vec::new();

        {
            let mut controllers = self.controllers.write().await;
            let mut seen = HashSet::new();

            for descriptor in descriptors {
                if !seen.insert(descriptor.id.clone()) {
                    debug!("duplicate descriptor for {} ignored", descriptor.id);
                    continue;
                }

                if let Some(entry) = controllers.get_mut(&descriptor.id) {
                    match self.merge_known(entry, descriptor) {
                        Merge::Keep(id) => report.known.push(id),
                        Merge::Rekey(handle, link) => {
                            report.rekeyed.push(handle.id().to_string());
                            rekeys.push((handle, link));
                        }
                        Merge::Rejected(rejected) => report.rejected.push(rejected),
                    }
                    continue;
                }

                match self.connector.connect(&descriptor) {
                    Ok(link) => {
                        let handle = Arc::new(ControllerHandle::new(
                            &descriptor,
                            link,
                            self.config.history_capacity,
                        ));
                        report.added.push(descriptor.id.clone());
                        to_probe.push(Arc::clone(&handle));
                        controllers.insert(Entry { handle, descriptor });
                    }
                    Err(e) => {
                        warn!("could not open a link to {}: {}", descriptor.id, e);
                        report.rejected.push(RejectedDevice {
                            id: descriptor.id,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        for (handle, link) in rekeys {
            handle.rekey(link).await;
            to_probe.push(handle);
        }

        report.reachable = self
            .probe_all(to_probe)
            .await
            .into_iter()
            .filter_map(|(id, ok)| ok.then_some(id))
            .collect();

        info!(
            "discovery: {} added, {} re-keyed, {} known, {} rejected, {} reachable",
            report.added.len(),
            report.rekeyed.len(),
            report.known.len(),
            report.rejected.len(),
            report.reachable.len()
        );
        Ok(report)
    }

    fn merge_known(&self, entry: &mut Entry, descriptor: DeviceDescriptor) -> Merge {
        let id = descriptor.id.clone();

        // The stored descriptor is updated under the registry lock, while the
        // handle's own flag only flips once the new link is swapped in.
        if !entry.descriptor.has_key() && descriptor.has_key() {
            return match self.connector.connect(&descriptor) {
                Ok(link) => {
                    entry.descriptor = descriptor;
                    Merge::Rekey(Arc::clone(&entry.handle), link)
                }
                Err(e) => {
                    warn!("could not re-open a link to {id}: {e}");
                    Merge::Rejected(RejectedDevice {
                        id,
                        reason: e.to_string(),
                    })
                }
            };
        }

        if descriptor.has_key() && descriptor.secret_key != entry.descriptor.secret_key {
            warn!("discovery reported a new key for {id}; keeping the current link");
        } else if descriptor != entry.descriptor {
            debug!("discovery reported changed metadata for {id}; ignored");
        }
        Merge::Keep(id)
    }

    /// Probe handles with a bounded number in flight and record the results.
    async fn probe_all(&self, handles: Vec<Arc<ControllerHandle>>) -> Vec<(String, bool)> {
        let limit = self.config.link_timeout;
        stream::iter(handles)
            .map(|handle| async move {
                let reachable = health::probe(&handle, limit).await;
                handle.set_connected(reachable);
                (handle.id().to_string(), reachable)
            })
            .buffer_unordered(self.config.pool_width())
            .collect()
            .await
    }

    /// All known controllers in registration order.
    pub async fn list_controllers(&self) -> Result<Vec<Arc<ControllerHandle>>> {
        let handles = self.controllers.read().await.handles();
        if handles.is_empty() {
            return Err(Error::EmptyRegistry);
        }
        Ok(handles)
    }

    pub async fn get_controller(&self, id: &str) -> Result<Arc<ControllerHandle>> {
        self.controllers
            .read()
            .await
            .get(id)
            .map(|e| Arc::clone(&e.handle))
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Read models of all controllers in registration order.
    pub async fn summaries(&self) -> Result<Vec<ControllerSummary>> {
        let handles = self.list_controllers().await?;
        Ok(futures::future::join_all(handles.iter().map(|h| h.summary())).await)
    }

    pub async fn len(&self) -> usize {
        self.controllers.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Validate `request` and apply it to the bulb `id`.
    ///
    /// Returns the state now recorded on the controller.
    pub async fn apply_state(&self, id: &str, request: &StateRequest) -> Result<DeviceState> {
        let handle = self.get_controller(id).await?;
        engine::apply(&handle, request, self.config.link_timeout).await
    }

    /// Turn the bulb `id` dark without forgetting its recorded state.
    pub async fn power_off(&self, id: &str) -> Result<()> {
        let handle = self.get_controller(id).await?;
        engine::power_off(&handle, self.config.link_timeout).await
    }

    /// Push the controller's recorded state to the bulb again, e.g. after it
    /// was power-cycled. `Ok(None)` when nothing was ever applied.
    pub async fn restore_state(&self, id: &str) -> Result<Option<DeviceState>> {
        let handle = self.get_controller(id).await?;
        let Some(state) = handle.current_state().await else {
            return Ok(None);
        };
        engine::apply(&handle, &StateRequest::from(&state), self.config.link_timeout)
            .await
            .map(Some)
    }

    /// Probe every known controller and refresh its connectivity flag.
    pub async fn check_connectivity(&self) -> Result<ConnectivityReport> {
        let handles = self.list_controllers().await?;
        let mut report = ConnectivityReport::default();
        for (id, reachable) in self.probe_all(handles).await {
            if reachable {
                report.reachable.push(id);
            } else {
                report.unreachable.push(id);
            }
        }
        Ok(report)
    }
}

enum Merge {
    Keep(String),
    Rekey(Arc<ControllerHandle>, Box<dyn DeviceLink>),
    Rejected(RejectedDevice),
}
