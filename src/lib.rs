//! # tuya_lights_rs
//!
//! A device registry and state-sync engine for Tuya smart bulbs on the local
//! network.
//!
//! The [`Registry`] discovers bulbs, keeps exactly one [`ControllerHandle`]
//! per device id, tracks whether each bulb is reachable, and applies
//! validated [`StateRequest`]s to them. Failures come back as a typed
//! [`Error`] whose [`ErrorKind`] front ends can map to their own responses.
//!
//! ## Quick Start
//!
//! ```ignore
//! use tuya_lights_rs::{Registry, RegistryConfig, StateRequest};
//!
//! async fn run(connector: impl tuya_lights_rs::LinkConnector + 'static) -> Result<(), tuya_lights_rs::Error> {
//!     let registry = Registry::with_snapshot(RegistryConfig::default(), "snapshot.json", connector);
//!     let report = registry.refresh_from_discovery().await?;
//!     println!("{} new bulb(s)", report.added.len());
//!
//!     registry.apply_state("bf0123", &StateRequest::white(80, 40)).await?;
//!     registry.apply_state("bf4567", &StateRequest::colour(255, 120, 0)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Device links
//!
//! The wire session with a bulb (its encryption and command framing) is
//! supplied by the caller through [`LinkConnector`] and [`DeviceLink`]. The
//! crate only decides *when* links are used and how their failures are
//! classified.
//!
//! ## Discovery
//!
//! [`BroadcastScanner`] listens for the bulbs' UDP presence broadcasts on
//! port 6666 and merges them into a JSON snapshot file, which
//! [`SnapshotFile`] reads back as [`DeviceDescriptor`]s. Either side can be
//! replaced through [`NetworkScanner`] and [`DescriptorSource`].
//!
//! ## Runtime Selection
//!
//! This library is runtime-agnostic. Select your preferred runtime using feature flags:
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime
//!
//! ```toml
//! [dependencies]
//! tuya-lights-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! ```

mod config;
mod controller;
mod descriptor;
mod engine;
mod errors;
mod health;
mod history;
mod link;
mod registry;
pub mod runtime;
mod scanner;
mod state;
mod triage;
mod types;

#[cfg(test)]
mod testing;

pub use config::RegistryConfig;
pub use controller::{ControllerHandle, ControllerSummary};
pub use descriptor::{DescriptorSource, DeviceDescriptor, SnapshotFile, SourceError};
pub use errors::{Error, ErrorKind};
pub use health::{is_healthy_payload, probe};
pub use history::{CommandHistory, Direction, HistoryEntry, HistorySummary};
pub use link::{DeviceLink, LinkCommand, LinkConnector, LinkError, LinkErrorKind};
pub use registry::{ConnectivityReport, DiscoveryReport, RejectedDevice, Registry};
pub use scanner::{
    Broadcast, BroadcastScanner, NetworkScanner, ScanError, decode_broadcast, merge_into_snapshot,
};
pub use state::{DeviceState, StateRequest};
pub use triage::is_credential_failure;
pub use types::{Color, Mode, Percent};
