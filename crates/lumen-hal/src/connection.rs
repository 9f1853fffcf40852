//! Generic `Connection` trait for the stateful link to the device.
//!
//! The link is opened lazily. Retry and backoff, if any, live inside the
//! implementation; callers make at most one `connect()` attempt per call.

use async_trait::async_trait;
use lumen_types::BridgeError;

/// A lazily-established link to the device.
///
/// All methods take `&self`: one connection is shared by both front-ends, so
/// implementations keep their state behind interior mutability and must
/// tolerate concurrent or duplicate `connect()` calls.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Whether the link is currently up.
    fn is_connected(&self) -> bool;

    /// Open the link, suspending until it is ready or has failed.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ConnectionFailed`] when the link cannot be
    /// established.
    async fn connect(&self) -> Result<(), BridgeError>;

    /// Close the link.
    async fn disconnect(&self) -> Result<(), BridgeError>;

    /// Send `bytes` on the control channel.
    async fn write_all(&self, bytes: &[u8]) -> Result<(), BridgeError>;

    /// Send `bytes` on the bulk-binary channel.
    async fn write_image(&self, bytes: &[u8]) -> Result<(), BridgeError>;
}
