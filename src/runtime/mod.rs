//! Runtime-agnostic async abstractions.
//!
//! The registry never spawns tasks: concurrency comes from polling futures
//! together, so the only things a runtime has to provide are timers, locks,
//! and the UDP socket the broadcast scanner listens on.
//!
//! # Feature Flags
//!
//! Enable exactly one of the following features to select your runtime:
//!
//! - `runtime-tokio` (default) - Use the tokio runtime
//! - `runtime-async-std` - Use the async-std runtime
//! - `runtime-smol` - Use the smol runtime
//!
//! ```toml
//! [dependencies]
//! tuya-lights-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

#[cfg(feature = "runtime-tokio")]
mod tokio_impl;

#[cfg(feature = "runtime-async-std")]
mod async_std_impl;

#[cfg(feature = "runtime-smol")]
mod smol_impl;

#[cfg(feature = "runtime-tokio")]
pub use tokio_impl::*;

#[cfg(feature = "runtime-async-std")]
pub use async_std_impl::*;

#[cfg(feature = "runtime-smol")]
pub use smol_impl::*;

/// A boxed, sendable future. Used at the object-safe trait seams
/// ([`DeviceLink`](crate::DeviceLink), [`NetworkScanner`](crate::NetworkScanner)).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A UDP socket bound to a local port that receives broadcast datagrams.
pub trait BroadcastSocket: Send + Sync + Sized {
    /// Bind to `0.0.0.0:port` with broadcast reception enabled.
    fn bind(port: u16) -> impl Future<Output = io::Result<Self>> + Send;

    /// Receive one datagram and its source address.
    fn recv_from(
        &self,
        buf: &mut [u8],
    ) -> impl Future<Output = io::Result<(usize, SocketAddr)>> + Send;
}

/// Sleep for the specified duration.
pub async fn sleep(duration: Duration) {
    sleep_impl(duration).await
}

/// Run a future with a deadline.
///
/// Returns `Err(TimedOut)` if the deadline passes before the future completes.
/// The future is dropped at that point.
pub async fn timeout<F, T>(duration: Duration, future: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    timeout_impl(duration, future).await
}

/// Error returned when a deadline passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("operation timed out")]
pub struct TimedOut;

/// A measurement of monotonically increasing time.
#[derive(Debug, Clone, Copy)]
pub struct Instant(InstantInner);

impl Instant {
    /// Returns the current instant.
    pub fn now() -> Self {
        Instant(InstantInner::now())
    }

    /// Returns the duration elapsed since this instant was created.
    pub fn elapsed(&self) -> Duration {
        self.0.elapsed()
    }
}

// Async lock re-exports
#[cfg(feature = "runtime-tokio")]
pub use tokio::sync::{Mutex, RwLock};

#[cfg(feature = "runtime-async-std")]
pub use async_std::sync::{Mutex, RwLock};

#[cfg(feature = "runtime-smol")]
pub use async_lock::{Mutex, RwLock};

// Compile-time check to ensure exactly one runtime is selected
#[cfg(not(any(
    feature = "runtime-tokio",
    feature = "runtime-async-std",
    feature = "runtime-smol"
)))]
compile_error!(
    "One of \"runtime-tokio\", \"runtime-async-std\", or \"runtime-smol\" features must be enabled"
);

#[cfg(all(feature = "runtime-tokio", feature = "runtime-async-std"))]
compile_error!("Features \"runtime-tokio\" and \"runtime-async-std\" are mutually exclusive");

#[cfg(all(feature = "runtime-tokio", feature = "runtime-smol"))]
compile_error!("Features \"runtime-tokio\" and \"runtime-smol\" are mutually exclusive");

#[cfg(all(feature = "runtime-async-std", feature = "runtime-smol"))]
compile_error!("Features \"runtime-async-std\" and \"runtime-smol\" are mutually exclusive");

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_elapses() {
        let res = timeout(Duration::from_millis(10), sleep(Duration::from_secs(5))).await;
        assert_eq!(res, Err(TimedOut));
    }

    #[tokio::test]
    async fn test_timeout_completes() {
        let res = timeout(Duration::from_secs(5), async { 7 }).await;
        assert_eq!(res, Ok(7));
    }

    #[test]
    fn test_instant_elapsed_is_monotonic() {
        let start = Instant::now();
        let first = start.elapsed();
        assert!(start.elapsed() >= first);
    }
}
