//! [`Bridge`] – table-driven command dispatcher shared by both front-ends.
//!
//! One generic [`Bridge::execute`] runs any [`Command`] from the
//! [`CommandTable`]; the two pipelines around it differ only in how they
//! normalize input and how they gate the connection:
//!
//! | Pipeline | Input | Normalizer | Gate | Result |
//! |---|---|---|---|---|
//! | [`Bridge::handle_request`] | query parameters | [`from_query`] | gate-then-proceed | [`StatusSnapshot`] |
//! | [`Bridge::handle_payload`] | JSON bytes | [`from_json`] | reconnect-or-dispatch | task handle |
//!
//! The bridge holds no lock of its own around device writes. Concurrent
//! callers may interleave on the control channel; ordering is left to the
//! transport.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use lumen_hal::{Connection, Device};
use lumen_types::{BridgeError, Settings, StatusSnapshot};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::command_table::{Action, Command, CommandTable, Encoder};
use crate::gatekeeper::ConnectionGate;
use crate::normalizer::{from_json, from_query};

/// The dispatch core: one device, one connection, one gate, one table.
pub struct Bridge {
    table: CommandTable,
    gate: ConnectionGate,
    device: Arc<dyn Device>,
    connection: Arc<dyn Connection>,
}

impl Bridge {
    /// Wire a bridge over the given collaborators.
    pub fn new(device: Arc<dyn Device>, connection: Arc<dyn Connection>, auto_connect: bool) -> Self {
        Self {
            table: CommandTable::new(),
            gate: ConnectionGate::new(Arc::clone(&connection), auto_connect),
            device,
            connection,
        }
    }

    pub fn table(&self) -> &CommandTable {
        &self.table
    }

    pub fn gate(&self) -> &ConnectionGate {
        &self.gate
    }

    /// Current `{connected, config}` projection. Computed fresh on every call.
    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            connected: self.connection.is_connected(),
            config: self.device.config(),
        }
    }

    /// Run `command` with already-normalized `settings`.
    ///
    /// Does not gate; callers pick the gating pattern for their surface.
    ///
    /// # Errors
    ///
    /// Propagates encoder, render and transport failures unchanged.
    pub async fn execute(&self, command: &'static Command, mut settings: Settings) -> Result<(), BridgeError> {
        if let Some(field) = command.fill_now
            && !settings.contains(field)
        {
            settings.insert(field, Utc::now().to_rfc3339());
        }

        match command.action {
            Action::Write(encoder) => {
                self.write_control(command.name, encoder, &settings).await?;
                if let Some(follow) = command.follow_up
                    && let Some(value) = settings.get(follow.field)
                {
                    let next = self.table.lookup(follow.command)?;
                    if let Action::Write(next_encoder) = next.action {
                        let mut follow_settings = Settings::new();
                        follow_settings.insert(follow.as_field, value.clone());
                        self.write_control(next.name, next_encoder, &follow_settings)
                            .await?;
                    }
                }
                Ok(())
            }
            Action::RenderImage { path_field } => {
                let bytes = self
                    .device
                    .render_image(settings.get_str(path_field))
                    .await?;
                debug!(command = command.name, len = bytes.len(), "image rendered");
                self.connection.write_image(&bytes).await
            }
            Action::Connect => {
                if !self.connection.is_connected() {
                    info!("connecting on request");
                    self.connection.connect().await?;
                }
                Ok(())
            }
            Action::Disconnect => {
                if self.connection.is_connected() {
                    info!("disconnecting on request");
                    self.connection.disconnect().await?;
                }
                Ok(())
            }
            Action::Status => Ok(()),
        }
    }

    async fn write_control(&self, name: &str, encoder: Encoder, settings: &Settings) -> Result<(), BridgeError> {
        let message = encoder.encode(self.device.as_ref(), settings)?;
        debug!(command = name, len = message.len(), "control write");
        self.connection.write_all(&message).await
    }

    /// Request pipeline: gate, normalize, execute, snapshot.
    ///
    /// A request with no recognised fields still performs its write with
    /// empty settings. Execution failures are logged and never prevent the
    /// snapshot from being returned.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::UnknownCommand`] only.
    #[instrument(skip(self, params), fields(command = %name))]
    pub async fn handle_request(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<StatusSnapshot, BridgeError> {
        let command = self.table.lookup(name)?;
        if command.gated {
            let outcome = self.gate.gate().await;
            debug!(?outcome, "gate settled");
        }

        let settings = from_query(command.fields, params);
        if let Err(e) = self.execute(command, settings).await {
            warn!(error = %e, "command failed");
        }
        Ok(self.status())
    }

    /// Message pipeline: parse, normalize, then dispatch on a spawned task.
    ///
    /// Connection-control and status commands ignore the payload and run
    /// ungated. Every other command requires a JSON payload and runs through
    /// [`ConnectionGate::reconnect_then`]. The message loop is never blocked;
    /// the returned handle resolves once the device write has completed or
    /// failed.
    ///
    /// # Errors
    ///
    /// [`BridgeError::UnknownCommand`] for names not in the table, and
    /// [`BridgeError::Serialization`] for a malformed payload. Nothing is
    /// dispatched in either case.
    pub fn handle_payload(
        self: &Arc<Self>,
        name: &str,
        payload: &[u8],
    ) -> Result<JoinHandle<Result<(), BridgeError>>, BridgeError> {
        let command = self.table.lookup(name)?;
        let bridge = Arc::clone(self);

        if !command.gated {
            return Ok(tokio::spawn(async move {
                bridge.execute(command, Settings::new()).await
            }));
        }

        let parsed: Value = serde_json::from_slice(payload)
            .map_err(|e| BridgeError::Serialization(format!("{name} payload: {e}")))?;
        let settings = from_json(command.fields, &parsed);
        Ok(self
            .gate
            .reconnect_then(move || async move { bridge.execute(command, settings).await }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_hal::{SimConnection, SimDevice};
    use lumen_types::Channel;
    use serde_json::json;

    fn bridge_with(link: SimConnection, auto_connect: bool) -> (Arc<Bridge>, Arc<SimConnection>) {
        let link = Arc::new(link);
        let bridge = Bridge::new(Arc::new(SimDevice::new()), link.clone(), auto_connect);
        (Arc::new(bridge), link)
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn score_request_writes_once_and_reports_snapshot() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        let snapshot = bridge
            .handle_request("score", &params(&[("red", "10"), ("blue", "20")]))
            .await
            .unwrap();

        let writes = link.decoded_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "score");
        assert_eq!(writes[0].1.get_i64("red"), Some(10));
        assert_eq!(writes[0].1.get_i64("blue"), Some(20));

        assert!(snapshot.connected);
        assert_eq!(snapshot.config["score"], json!({"red": 10, "blue": 20}));
    }

    #[tokio::test]
    async fn every_command_without_fields_still_returns_snapshot() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        let names: Vec<_> = bridge.table().commands().iter().map(|c| c.name).collect();

        for name in names {
            let snapshot = bridge.handle_request(name, &HashMap::new()).await.unwrap();
            assert_eq!(snapshot.connected, link.is_connected(), "{name}");
        }
    }

    #[tokio::test]
    async fn empty_request_still_performs_a_write() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        bridge.handle_request("brightness", &HashMap::new()).await.unwrap();

        let writes = link.decoded_writes();
        assert_eq!(writes.len(), 1);
        assert!(writes[0].1.is_empty());
    }

    #[tokio::test]
    async fn zero_level_is_written_as_absent() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        bridge
            .handle_request("brightness", &params(&[("level", "0")]))
            .await
            .unwrap();
        bridge.handle_request("brightness", &HashMap::new()).await.unwrap();

        let writes = link.decoded_writes();
        assert_eq!(writes[0].1, writes[1].1);
        assert!(!writes[0].1.contains("level"));
    }

    #[tokio::test]
    async fn clock_color_of_wrong_length_never_reaches_device() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        for color in ["fff", "fffffff", "ff00ff00"] {
            bridge
                .handle_request("clock", &params(&[("color", color), ("mode", "2")]))
                .await
                .unwrap();
        }
        for (_, settings) in link.decoded_writes() {
            assert!(!settings.contains("color"));
            assert_eq!(settings.get_i64("mode"), Some(2));
        }
    }

    #[tokio::test]
    async fn datetime_with_fullday_mode_writes_twice() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        bridge
            .handle_request("datetime", &params(&[("fulldayMode", "true")]))
            .await
            .unwrap();

        let writes = link.decoded_writes();
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0].0, "datetime");
        assert!(writes[0].1.contains("date"), "missing date is filled with now");
        assert_eq!(writes[1].0, "fullday");
        assert_eq!(writes[1].1.get_bool("enable"), Some(true));
    }

    #[tokio::test]
    async fn datetime_without_fullday_mode_writes_once() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        bridge
            .handle_request("datetime", &params(&[("date", "2024-03-01")]))
            .await
            .unwrap();

        let writes = link.decoded_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1.get_str("date"), Some("2024-03-01T00:00:00+00:00"));
    }

    #[tokio::test]
    async fn gated_request_connects_first() {
        let (bridge, link) = bridge_with(SimConnection::new(), true);
        let snapshot = bridge
            .handle_request("effect", &params(&[("mode", "3")]))
            .await
            .unwrap();

        assert!(snapshot.connected);
        assert_eq!(link.connect_calls(), 1);
        assert_eq!(link.decoded_writes().len(), 1);
    }

    #[tokio::test]
    async fn failed_connect_still_attempts_the_write() {
        let (bridge, link) = bridge_with(SimConnection::new().failing_connect(), true);
        let snapshot = bridge
            .handle_request("effect", &params(&[("mode", "3")]))
            .await
            .unwrap();

        assert!(!snapshot.connected);
        assert_eq!(link.rejected_writes(), 1);
    }

    #[tokio::test]
    async fn auto_connect_disabled_leaves_link_alone() {
        let (bridge, link) = bridge_with(SimConnection::new(), false);
        bridge.handle_request("score", &params(&[("red", "1")])).await.unwrap();

        assert_eq!(link.connect_calls(), 0);
        assert_eq!(link.rejected_writes(), 1);
    }

    #[tokio::test]
    async fn status_and_link_commands_are_not_gated() {
        let (bridge, link) = bridge_with(SimConnection::new(), true);
        let snapshot = bridge.handle_request("status", &HashMap::new()).await.unwrap();
        assert!(!snapshot.connected);

        let snapshot = bridge.handle_request("disconnect", &HashMap::new()).await.unwrap();
        assert!(!snapshot.connected);
        assert_eq!(link.connect_calls(), 0);
        assert_eq!(link.disconnect_calls(), 0, "disconnect is guarded by is_connected");

        let snapshot = bridge.handle_request("connect", &HashMap::new()).await.unwrap();
        assert!(snapshot.connected);
        assert_eq!(link.connect_calls(), 1);

        bridge.handle_request("connect", &HashMap::new()).await.unwrap();
        assert_eq!(link.connect_calls(), 1, "connect is guarded by is_connected");
    }

    #[tokio::test]
    async fn unknown_command_is_rejected_before_any_traffic() {
        let (bridge, link) = bridge_with(SimConnection::new(), true);
        let result = bridge.handle_request("warp", &HashMap::new()).await;
        assert_eq!(result, Err(BridgeError::UnknownCommand("warp".to_string())));
        assert_eq!(link.connect_calls(), 0);
    }

    #[tokio::test]
    async fn set_img_renders_then_writes_on_bulk_channel() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("logo.png");
        std::fs::write(&path, [9u8; 16]).expect("write fixture");

        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        let path = path.to_string_lossy().into_owned();
        let snapshot = bridge
            .handle_request("img", &params(&[("path", &path)]))
            .await
            .unwrap();

        let writes = link.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].channel, Channel::Bulk);
        assert_eq!(writes[0].bytes, vec![9u8; 16]);
        assert_eq!(snapshot.config["image"]["bytes"], 16);
    }

    #[tokio::test]
    async fn set_img_render_failure_skips_write_but_returns_snapshot() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        let snapshot = bridge
            .handle_request("setImg", &params(&[("path", "/no/such/file.png")]))
            .await
            .unwrap();
        assert!(snapshot.connected);
        assert!(link.writes().is_empty());
    }

    #[tokio::test]
    async fn payload_while_disconnected_connects_then_writes_once() {
        let (bridge, link) = bridge_with(SimConnection::new(), true);
        let handle = bridge.handle_payload("score", br#"{"red":3,"blue":5}"#).unwrap();
        handle.await.unwrap().unwrap();

        assert_eq!(link.connect_calls(), 1);
        let writes = link.decoded_writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, "score");
        assert_eq!(writes[0].1.get_i64("red"), Some(3));
        assert_eq!(writes[0].1.get_i64("blue"), Some(5));
    }

    #[tokio::test]
    async fn malformed_payload_dispatches_nothing() {
        let (bridge, link) = bridge_with(SimConnection::new(), true);
        let result = bridge.handle_payload("score", b"{red:3");
        assert!(matches!(result, Err(BridgeError::Serialization(_))));
        tokio::task::yield_now().await;
        assert_eq!(link.connect_calls(), 0);
        assert!(link.writes().is_empty());
    }

    #[tokio::test]
    async fn payload_values_are_passed_through_uncoerced() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        let handle = bridge
            .handle_payload("brightness", br#"{"level":0,"extra":1}"#)
            .unwrap();
        handle.await.unwrap().unwrap();

        let writes = link.decoded_writes();
        assert_eq!(writes[0].1.get_i64("level"), Some(0));
        assert!(!writes[0].1.contains("extra"));
    }

    #[tokio::test]
    async fn payload_alias_resolves_like_canonical_name() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        let handle = bridge
            .handle_payload("lightning", br#"{"color":"ff0000"}"#)
            .unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(link.decoded_writes()[0].0, "lighting");
    }

    #[tokio::test]
    async fn disconnect_payload_ignores_body_and_skips_reconnect() {
        let (bridge, link) = bridge_with(SimConnection::new().connected(true), true);
        bridge
            .handle_payload("disconnect", b"")
            .unwrap()
            .await
            .unwrap()
            .unwrap();
        assert!(!link.is_connected());

        bridge
            .handle_payload("disconnect", b"not json")
            .unwrap()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(link.connect_calls(), 0);
        assert_eq!(link.disconnect_calls(), 1);
    }

    #[tokio::test]
    async fn payload_reconnect_failure_is_observable() {
        let (bridge, link) = bridge_with(SimConnection::new().failing_connect(), true);
        let handle = bridge.handle_payload("score", br#"{"red":1}"#).unwrap();
        let result = handle.await.unwrap();
        assert!(matches!(result, Err(BridgeError::ConnectionFailed(_))));
        assert_eq!(link.rejected_writes(), 0, "write is skipped after failed reconnect");
    }
}
