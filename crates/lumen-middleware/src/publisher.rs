//! The outbound seam of the message front-end.
//!
//! [`MessageFrontEnd`][crate::front_end::MessageFrontEnd] never talks to a
//! broker client directly. It hands outbound messages to a [`Publisher`],
//! which the MQTT link implements over `rumqttc` and tests implement with a
//! recorder.

use async_trait::async_trait;
use lumen_types::BridgeError;
use rumqttc::{AsyncClient, QoS};

/// Anything that can deliver a payload to a topic.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `payload` on `topic`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Broker`] when the message cannot be queued.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError>;
}

#[async_trait]
impl Publisher for AsyncClient {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BridgeError> {
        AsyncClient::publish(self, topic, QoS::AtMostOnce, false, payload)
            .await
            .map_err(|e| BridgeError::Broker(format!("publish to {topic}: {e}")))
    }
}
