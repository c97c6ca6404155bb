//! Network scanning for bulbs.
//!
//! A scan is observed only through its effect: when it completes, the
//! descriptor source has been refreshed.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, info};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::runtime::{self, BoxFuture, BroadcastSocket, Instant, UdpListener};

/// Errors raised by a scanner.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: io::Error },

    #[error("failed to update snapshot {path}: {err}")]
    Snapshot { path: PathBuf, err: io::Error },

    #[error("snapshot {path} is not a device list: {reason}")]
    SnapshotFormat { path: PathBuf, reason: String },
}

impl ScanError {
    pub fn socket(action: &str, err: io::Error) -> Self {
        ScanError::Socket {
            action: action.to_string(),
            err,
        }
    }
}

/// Something that can refresh the descriptor source.
pub trait NetworkScanner: Send + Sync {
    /// Run one sweep. Resolves once the descriptor source reflects it.
    fn scan(&self) -> BoxFuture<'_, Result<(), ScanError>>;
}

/// A presence announcement heard on the network.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Broadcast {
    #[serde(rename = "gwId")]
    pub id: String,
    pub ip: String,
    #[serde(default = "Broadcast::legacy_version")]
    pub version: String,
}

impl Broadcast {
    fn legacy_version() -> String {
        "3.1".to_string()
    }
}

const FRAME_PREFIX: u32 = 0x0000_55AA;
const FRAME_SUFFIX: u32 = 0x0000_AA99;
const HEADER_LEN: usize = 16;
const TRAILER_LEN: usize = 8;

/// Decode a plaintext presence frame.
///
/// Layout: prefix, sequence, command, length (big-endian u32 each), then
/// `length` bytes holding an optional 4-byte return code, the JSON payload,
/// a CRC and the suffix. The CRC is not verified. Encrypted payloads yield
/// `None`.
pub fn decode_broadcast(datagram: &[u8]) -> Option<Broadcast> {
    let word = |at: usize| -> Option<u32> {
        let bytes = datagram.get(at..at + 4)?;
        Some(u32::from_be_bytes(bytes.try_into().ok()?))
    };

    if word(0)? != FRAME_PREFIX {
        return None;
    }
    let total = usize::try_from(word(12)?).ok()?.checked_add(HEADER_LEN)?;
    if total < HEADER_LEN + TRAILER_LEN || word(total.checked_sub(4)?)? != FRAME_SUFFIX {
        return None;
    }

    let mut payload = datagram.get(HEADER_LEN..total - TRAILER_LEN)?;
    if payload.first() != Some(&b'{') && payload.get(4) == Some(&b'{') {
        payload = &payload[4..];
    }
    serde_json::from_slice(payload).ok()
}

/// Listens for the bulbs' periodic UDP presence broadcasts and merges what
/// it hears into a snapshot file.
///
/// Only plaintext (protocol 3.1) announcements can be read; others are
/// skipped. Bulbs already in the snapshot keep their key and name, new
/// bulbs are added without a key.
#[derive(Debug, Clone)]
pub struct BroadcastScanner {
    snapshot_path: PathBuf,
    port: u16,
    listen_window: Duration,
}

impl BroadcastScanner {
    pub const DEFAULT_PORT: u16 = 6666;
    pub const DEFAULT_LISTEN_WINDOW: Duration = Duration::from_secs(10);

    pub fn new(snapshot_path: impl Into<PathBuf>) -> Self {
        BroadcastScanner {
            snapshot_path: snapshot_path.into(),
            port: Self::DEFAULT_PORT,
            listen_window: Self::DEFAULT_LISTEN_WINDOW,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_listen_window(mut self, window: Duration) -> Self {
        self.listen_window = window;
        self
    }

    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Collect announcements for the listen window, deduplicated by id.
    pub async fn listen(&self) -> Result<Vec<Broadcast>, ScanError> {
        let socket = UdpListener::bind(self.port)
            .await
            .map_err(|e| ScanError::socket("bind", e))?;

        let mut heard: HashMap<String, Broadcast> = HashMap::new();
        let start = Instant::now();
        let mut buffer = [0u8; 4096];
        let recv_timeout = Duration::from_millis(500);

        while start.elapsed() < self.listen_window {
            match runtime::timeout(recv_timeout, socket.recv_from(&mut buffer)).await {
                Ok(Ok((size, addr))) => match decode_broadcast(&buffer[..size]) {
                    Some(bc) => {
                        debug!("heard {} at {}", bc.id, bc.ip);
                        heard.insert(bc.id.clone(), bc);
                    }
                    None => debug!("skipping unreadable broadcast from {}", source_ip(addr)),
                },
                Ok(Err(e)) => debug!("receive failed: {e}"),
                Err(_) => continue,
            }
        }

        Ok(heard.into_values().collect())
    }
}

impl NetworkScanner for BroadcastScanner {
    fn scan(&self) -> BoxFuture<'_, Result<(), ScanError>> {
        Box::pin(async move {
            let heard = self.listen().await?;
            let added = merge_into_snapshot(&self.snapshot_path, &heard)?;
            info!(
                "scan heard {} bulb(s), {} new, snapshot {}",
                heard.len(),
                added,
                self.snapshot_path.display()
            );
            Ok(())
        })
    }
}

fn source_ip(addr: SocketAddr) -> String {
    addr.ip().to_string()
}

/// Merge announcements into the snapshot at `path`, creating it if needed.
///
/// Returns the number of devices that were not in the snapshot before.
pub fn merge_into_snapshot(path: &Path, heard: &[Broadcast]) -> Result<usize, ScanError> {
    let format_err = |reason: &str| ScanError::SnapshotFormat {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let io_err = |err: io::Error| ScanError::Snapshot {
        path: path.to_path_buf(),
        err,
    };

    let mut doc = match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str::<Value>(&text).map_err(|e| format_err(&e.to_string()))?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => json!({"devices": []}),
        Err(e) => return Err(io_err(e)),
    };

    let root = doc.as_object_mut().ok_or_else(|| format_err("not an object"))?;
    let devices = root
        .entry("devices")
        .or_insert_with(|| json!([]))
        .as_array_mut()
        .ok_or_else(|| format_err("devices is not an array"))?;

    let mut added = 0;
    for bc in heard {
        let known = devices
            .iter_mut()
            .find(|d| d.get("id").and_then(Value::as_str) == Some(bc.id.as_str()));
        match known {
            Some(entry) => {
                entry["ip"] = json!(bc.ip);
                entry["ver"] = json!(bc.version);
            }
            None => {
                devices.push(json!({
                    "id": bc.id,
                    "ip": bc.ip,
                    "key": "",
                    "ver": bc.version,
                    "name": bc.id,
                }));
                added += 1;
            }
        }
    }

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    root.insert("timestamp".to_string(), json!(now));

    let text = serde_json::to_string_pretty(&doc).map_err(|e| format_err(&e.to_string()))?;
    let staging = path.with_extension("json.tmp");
    fs::write(&staging, text).map_err(io_err)?;
    fs::rename(&staging, path).map_err(io_err)?;

    Ok(added)
}
