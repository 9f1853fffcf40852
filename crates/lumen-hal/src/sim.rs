//! In-process simulation doubles for headless runs and tests.
//!
//! [`SimDevice`] encodes every command as a small JSON envelope and folds the
//! supplied settings into its reported configuration. [`SimConnection`]
//! records every write together with the channel it used, counts connect and
//! disconnect calls, and can be told to fail or stall on `connect()`.
//!
//! # Example
//!
//! ```rust
//! use lumen_hal::{Connection, Device, SimConnection, SimDevice};
//! use lumen_types::Settings;
//!
//! # tokio_test_block(async {
//! let device = SimDevice::new();
//! let connection = SimConnection::new().connected(true);
//!
//! let mut settings = Settings::new();
//! settings.insert("level", 40);
//! let msg = device.brightness(&settings).unwrap();
//! connection.write_all(&msg).await.unwrap();
//!
//! assert_eq!(connection.writes().len(), 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use lumen_types::{BridgeError, Channel, Settings};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::connection::Connection;
use crate::device::Device;

// ────────────────────────────────────────────────────────────────────────────
// Simulated device
// ────────────────────────────────────────────────────────────────────────────

/// A simulated display that encodes commands as JSON envelopes of the form
/// `{"command": <name>, "settings": {..}}` and remembers the last settings
/// applied per command as its configuration.
#[derive(Default)]
pub struct SimDevice {
    config: Mutex<Map<String, Value>>,
}

impl SimDevice {
    /// Create a simulated device with an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an envelope produced by this device back into
    /// `(command, settings)`. Returns `None` for foreign payloads.
    pub fn decode(bytes: &[u8]) -> Option<(String, Settings)> {
        let value: Value = serde_json::from_slice(bytes).ok()?;
        let command = value.get("command")?.as_str()?.to_string();
        let settings = value.get("settings")?.as_object()?.clone();
        Some((command, Settings::from(settings)))
    }

    fn encode(&self, command: &str, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        let envelope = json!({ "command": command, "settings": settings });
        let bytes = serde_json::to_vec(&envelope).map_err(|e| BridgeError::Encode {
            command: command.to_string(),
            details: e.to_string(),
        })?;

        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = config
            .entry(command.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(fields) = entry {
            for (name, value) in settings.iter() {
                fields.insert(name.clone(), value.clone());
            }
        }
        Ok(bytes)
    }
}

#[async_trait]
impl Device for SimDevice {
    fn brightness(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("brightness", settings)
    }

    fn fullday(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("fullday", settings)
    }

    fn datetime(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("datetime", settings)
    }

    fn lighting(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("lighting", settings)
    }

    fn clock(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("clock", settings)
    }

    fn climate(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("climate", settings)
    }

    fn effect(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("effect", settings)
    }

    fn visualization(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("visualization", settings)
    }

    fn score(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("score", settings)
    }

    fn power_screen(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError> {
        self.encode("screenOff", settings)
    }

    async fn render_image(&self, path: Option<&str>) -> Result<Vec<u8>, BridgeError> {
        let path = path.ok_or_else(|| BridgeError::Render("no image path given".to_string()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BridgeError::Render(format!("cannot load {path}: {e}")))?;

        let mut config = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        config.insert("image".to_string(), json!({ "path": path, "bytes": bytes.len() }));
        Ok(bytes)
    }

    fn config(&self) -> Value {
        Value::Object(self.config.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated connection
// ────────────────────────────────────────────────────────────────────────────

/// One recorded write on a [`SimConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct SimWrite {
    pub channel: Channel,
    pub bytes: Vec<u8>,
}

/// A simulated link that records traffic instead of transmitting it.
///
/// Writes issued while the link is down are rejected with
/// [`BridgeError::Transport`] and counted in
/// [`rejected_writes`][Self::rejected_writes].
#[derive(Default)]
pub struct SimConnection {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    connect_delay: Duration,
    connect_calls: AtomicUsize,
    disconnect_calls: AtomicUsize,
    rejected_writes: AtomicUsize,
    writes: Mutex<Vec<SimWrite>>,
}

impl SimConnection {
    /// Create a disconnected link that connects successfully on demand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial link state (builder-style).
    pub fn connected(self, connected: bool) -> Self {
        self.connected.store(connected, Ordering::SeqCst);
        self
    }

    /// Make every `connect()` call fail (builder-style).
    pub fn failing_connect(self) -> Self {
        self.fail_connect.store(true, Ordering::SeqCst);
        self
    }

    /// Stall every `connect()` call for `delay` before it settles.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    /// Number of `connect()` calls made so far, successful or not.
    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Number of `disconnect()` calls made so far.
    pub fn disconnect_calls(&self) -> usize {
        self.disconnect_calls.load(Ordering::SeqCst)
    }

    /// Number of writes refused because the link was down.
    pub fn rejected_writes(&self) -> usize {
        self.rejected_writes.load(Ordering::SeqCst)
    }

    /// Snapshot of every accepted write, in order.
    pub fn writes(&self) -> Vec<SimWrite> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Accepted writes decoded as [`SimDevice`] envelopes, in order.
    pub fn decoded_writes(&self) -> Vec<(String, Settings)> {
        self.writes()
            .iter()
            .filter_map(|w| SimDevice::decode(&w.bytes))
            .collect()
    }

    fn record(&self, channel: Channel, bytes: &[u8]) -> Result<(), BridgeError> {
        if !self.connected.load(Ordering::SeqCst) {
            self.rejected_writes.fetch_add(1, Ordering::SeqCst);
            return Err(BridgeError::Transport("link is not connected".to_string()));
        }
        debug!(?channel, len = bytes.len(), "sim write");
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SimWrite {
                channel,
                bytes: bytes.to_vec(),
            });
        Ok(())
    }
}

#[async_trait]
impl Connection for SimConnection {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<(), BridgeError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(BridgeError::ConnectionFailed(
                "simulated link refused the connection".to_string(),
            ));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        self.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn write_all(&self, bytes: &[u8]) -> Result<(), BridgeError> {
        self.record(Channel::Control, bytes)
    }

    async fn write_image(&self, bytes: &[u8]) -> Result<(), BridgeError> {
        self.record(Channel::Bulk, bytes)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn score_settings(red: i64, blue: i64) -> Settings {
        let mut settings = Settings::new();
        settings.insert("red", red);
        settings.insert("blue", blue);
        settings
    }

    #[test]
    fn sim_device_envelope_roundtrips_through_decode() {
        let device = SimDevice::new();
        let bytes = device.score(&score_settings(10, 20)).unwrap();
        let (command, settings) = SimDevice::decode(&bytes).expect("own envelope decodes");
        assert_eq!(command, "score");
        assert_eq!(settings.get_i64("red"), Some(10));
        assert_eq!(settings.get_i64("blue"), Some(20));
    }

    #[test]
    fn sim_device_config_tracks_last_settings() {
        let device = SimDevice::new();
        device.score(&score_settings(1, 2)).unwrap();
        let mut update = Settings::new();
        update.insert("red", 7);
        device.score(&update).unwrap();

        let config = device.config();
        assert_eq!(config["score"]["red"], 7);
        assert_eq!(config["score"]["blue"], 2);
    }

    #[test]
    fn power_screen_is_reported_as_screen_off() {
        let device = SimDevice::new();
        let mut settings = Settings::new();
        settings.insert("enable", true);
        let bytes = device.power_screen(&settings).unwrap();
        let (command, _) = SimDevice::decode(&bytes).unwrap();
        assert_eq!(command, "screenOff");
    }

    #[tokio::test]
    async fn render_image_without_path_fails() {
        let device = SimDevice::new();
        let result = device.render_image(None).await;
        assert!(matches!(result, Err(BridgeError::Render(_))));
    }

    #[tokio::test]
    async fn render_image_reads_file_and_updates_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("frame.bin");
        std::fs::write(&path, [1u8, 2, 3, 4]).expect("write fixture");

        let device = SimDevice::new();
        let bytes = device
            .render_image(Some(&path.to_string_lossy()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
        assert_eq!(device.config()["image"]["bytes"], 4);
    }

    #[tokio::test]
    async fn sim_connection_records_channel_per_write() {
        let connection = SimConnection::new().connected(true);
        connection.write_all(b"ctl").await.unwrap();
        connection.write_image(b"img").await.unwrap();

        let writes = connection.writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].channel, Channel::Control);
        assert_eq!(writes[1].channel, Channel::Bulk);
        assert_eq!(writes[1].bytes, b"img");
    }

    #[tokio::test]
    async fn sim_connection_rejects_writes_while_down() {
        let connection = SimConnection::new();
        let result = connection.write_all(b"ctl").await;
        assert!(matches!(result, Err(BridgeError::Transport(_))));
        assert_eq!(connection.rejected_writes(), 1);
        assert!(connection.writes().is_empty());
    }

    #[tokio::test]
    async fn sim_connection_connect_and_disconnect_toggle_state() {
        let connection = SimConnection::new();
        assert!(!connection.is_connected());
        connection.connect().await.unwrap();
        assert!(connection.is_connected());
        connection.disconnect().await.unwrap();
        assert!(!connection.is_connected());
        assert_eq!(connection.connect_calls(), 1);
        assert_eq!(connection.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn failing_connect_keeps_link_down() {
        let connection = SimConnection::new().failing_connect();
        let result = connection.connect().await;
        assert!(matches!(result, Err(BridgeError::ConnectionFailed(_))));
        assert!(!connection.is_connected());
        assert_eq!(connection.connect_calls(), 1);
    }
}
