//! [`MqttLink`] – the broker connection behind the message front-end.
//!
//! The link owns the `rumqttc` client and event loop for the life of the
//! process. It is built once at startup, subscribes every inbound topic in a
//! single request, and then drives the event loop in [`MqttLink::run`]:
//!
//! * `ConnAck` and broker-side close are logged.
//! * Each `Publish` is handed to the [`MessageFrontEnd`]; the resulting task
//!   is watched in the background so a failed dispatch is logged.
//! * Any event-loop error tears the link down. It is not reopened.
//!
//! [`MqttHandle::close`] is the explicit teardown used on shutdown.

use std::sync::Arc;
use std::time::Duration;

use lumen_kernel::Bridge;
use lumen_types::BridgeError;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS, SubscribeFilter};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::front_end::MessageFrontEnd;

const DEFAULT_PORT: u16 = 1883;
const KEEP_ALIVE: Duration = Duration::from_secs(30);
const REQUEST_CAPACITY: usize = 10;

/// Broker connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct MqttSettings {
    /// `mqtt://host:port`, `tcp://host:port` or bare `host[:port]`.
    pub address: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Base topic; inbound topics live under `<topic>/set/`.
    pub topic: String,
    pub client_id: String,
}

impl std::fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttSettings")
            .field("address", &self.address)
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_some() { &"<redacted>" } else { &"<not set>" },
            )
            .field("topic", &self.topic)
            .field("client_id", &self.client_id)
            .finish()
    }
}

/// Split a broker address into host and port.
///
/// # Errors
///
/// Returns [`BridgeError::Broker`] for an unsupported scheme, an empty host
/// or an invalid port.
pub fn parse_address(address: &str) -> Result<(String, u16), BridgeError> {
    let rest = match address.split_once("://") {
        Some(("mqtt" | "tcp", rest)) => rest,
        Some((scheme, _)) => {
            return Err(BridgeError::Broker(format!("unsupported scheme '{scheme}' in {address}")));
        }
        None => address,
    };
    let rest = rest.trim_end_matches('/');
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|e| BridgeError::Broker(format!("invalid port in {address}: {e}")))?;
            (host, port)
        }
        None => (rest, DEFAULT_PORT),
    };
    if host.is_empty() {
        return Err(BridgeError::Broker(format!("missing host in {address}")));
    }
    Ok((host.to_string(), port))
}

/// Build `rumqttc` options from [`MqttSettings`].
pub fn mqtt_options(settings: &MqttSettings) -> Result<MqttOptions, BridgeError> {
    let (host, port) = parse_address(&settings.address)?;
    let mut options = MqttOptions::new(settings.client_id.clone(), host, port);
    options.set_keep_alive(KEEP_ALIVE);
    if let Some(username) = &settings.username {
        options.set_credentials(username.clone(), settings.password.clone().unwrap_or_default());
    }
    Ok(options)
}

/// Cloneable handle used to shut the link down from outside [`MqttLink::run`].
#[derive(Clone)]
pub struct MqttHandle {
    client: AsyncClient,
}

impl MqttHandle {
    /// Ask the broker connection to close. `run` returns once it has.
    pub async fn close(&self) -> Result<(), BridgeError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| BridgeError::Broker(format!("disconnect: {e}")))
    }
}

/// Process-scoped broker connection.
pub struct MqttLink {
    client: AsyncClient,
    eventloop: EventLoop,
    front_end: MessageFrontEnd,
}

impl MqttLink {
    /// Create the client and queue the subscription for every inbound topic.
    ///
    /// No network traffic happens until [`run`][Self::run] polls the event
    /// loop.
    pub async fn connect(settings: &MqttSettings, bridge: Arc<Bridge>) -> Result<Self, BridgeError> {
        let options = mqtt_options(settings)?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let front_end = MessageFrontEnd::new(bridge, &settings.topic, Arc::new(client.clone()));

        let filters: Vec<SubscribeFilter> = front_end
            .routes()
            .subscriptions()
            .into_iter()
            .map(|topic| SubscribeFilter::new(topic, QoS::AtMostOnce))
            .collect();
        info!(
            address = %settings.address,
            topics = filters.len(),
            base = front_end.routes().base(),
            "subscribing to command topics"
        );
        client
            .subscribe_many(filters)
            .await
            .map_err(|e| BridgeError::Broker(format!("subscribe: {e}")))?;

        Ok(Self {
            client,
            eventloop,
            front_end,
        })
    }

    pub fn handle(&self) -> MqttHandle {
        MqttHandle {
            client: self.client.clone(),
        }
    }

    pub fn front_end(&self) -> &MessageFrontEnd {
        &self.front_end
    }

    /// Drive the broker connection until it closes or fails.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Broker`] when the event loop reports an error.
    /// The link is torn down before returning.
    pub async fn run(mut self) -> Result<(), BridgeError> {
        loop {
            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!(code = ?ack.code, "connected to broker");
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    if let Some(task) = self.front_end.handle_message(&publish.topic, &publish.payload) {
                        watch(publish.topic, task);
                    }
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    info!("broker closed the connection");
                    return Ok(());
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("broker connection closed");
                    return Ok(());
                }
                Ok(event) => debug!(?event, "broker event"),
                Err(e) => {
                    error!(error = %e, "broker error; tearing down the link");
                    // The event loop is gone; the queued disconnect only
                    // releases the client side.
                    let _ = self.client.try_disconnect();
                    return Err(BridgeError::Broker(e.to_string()));
                }
            }
        }
    }
}

fn watch(topic: String, task: JoinHandle<Result<(), BridgeError>>) {
    tokio::spawn(async move {
        match task.await {
            Ok(Ok(())) => debug!(%topic, "message handled"),
            Ok(Err(e)) => warn!(%topic, error = %e, "message handling failed"),
            Err(e) => error!(%topic, error = %e, "message task panicked"),
        }
    });
}
