//! Discovered device descriptors and the snapshot file they are read from.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What discovery learned about one bulb.
///
/// Descriptors are never mutated; a later discovery of the same `id`
/// produces a new descriptor, which the registry may ignore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Stable device identifier (the vendor's `gwId`).
    pub id: String,
    /// IPv4 address or host name on the local network.
    pub address: String,
    /// Local key; empty when unknown, in which case the bulb cannot be
    /// commanded.
    pub secret_key: String,
    /// Vendor protocol version, e.g. `"3.3"`.
    pub protocol_version: String,
    pub display_name: String,
}

impl DeviceDescriptor {
    pub fn has_key(&self) -> bool {
        !self.secret_key.is_empty()
    }
}

/// Errors raised while reading a descriptor source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("snapshot file {0} was not found")]
    NotFound(PathBuf),

    #[error("failed to read snapshot file {path}: {err}")]
    Io { path: PathBuf, err: io::Error },

    #[error("snapshot file {path} has an invalid format: {reason}")]
    Malformed { path: PathBuf, reason: String },
}

/// A read-only list of discoverable devices.
pub trait DescriptorSource: Send + Sync {
    fn read(&self) -> Result<Vec<DeviceDescriptor>, SourceError>;
}

/// One entry of the `devices` array as scanners write it.
#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    id: Option<String>,
    ip: Option<String>,
    key: Option<String>,
    local_key: Option<String>,
    ver: Option<Value>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotDocument {
    #[serde(default)]
    devices: Vec<SnapshotEntry>,
}

/// A JSON snapshot file of the form `{"devices": [{"id", "ip", "key", "ver", "name"}, ...]}`.
///
/// `key` falls back to `local_key` and then to an empty key, a missing
/// `name` falls back to the id, and `ver` may be a string or a number.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub const DEFAULT_FILE_NAME: &'static str = "snapshot.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        SnapshotFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Decode a snapshot document held in memory.
    pub fn parse(&self, text: &str) -> Result<Vec<DeviceDescriptor>, SourceError> {
        let doc: SnapshotDocument =
            serde_json::from_str(text).map_err(|e| self.malformed(e.to_string()))?;

        doc.devices
            .into_iter()
            .enumerate()
            .map(|(i, entry)| self.descriptor(i, entry))
            .collect()
    }

    fn descriptor(
        &self,
        index: usize,
        entry: SnapshotEntry,
    ) -> Result<DeviceDescriptor, SourceError> {
        let id = entry
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| self.malformed(format!("device #{index} has no id")))?;
        let address = entry
            .ip
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| self.malformed(format!("device {id} has no ip")))?;
        let protocol_version = match entry.ver {
            Some(Value::String(v)) if !v.is_empty() => v,
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(self.malformed(format!("device {id} has no protocol version"))),
        };
        let secret_key = entry
            .key
            .filter(|k| !k.is_empty())
            .or(entry.local_key)
            .unwrap_or_default();
        let display_name = entry
            .name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.clone());

        Ok(DeviceDescriptor {
            id,
            address,
            secret_key,
            protocol_version,
            display_name,
        })
    }

    fn malformed(&self, reason: String) -> SourceError {
        SourceError::Malformed {
            path: self.path.clone(),
            reason,
        }
    }
}

impl DescriptorSource for SnapshotFile {
    fn read(&self) -> Result<Vec<DeviceDescriptor>, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound(self.path.clone()),
            _ => SourceError::Io {
                path: self.path.clone(),
                err,
            },
        })?;
        self.parse(&text)
    }
}

impl DescriptorSource for Vec<DeviceDescriptor> {
    fn read(&self) -> Result<Vec<DeviceDescriptor>, SourceError> {
        Ok(self.clone())
    }
}
