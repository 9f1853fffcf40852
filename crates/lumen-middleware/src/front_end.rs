//! [`MessageFrontEnd`] – turns inbound broker messages into bridge commands.
//!
//! Every handled message yields a task handle; the caller's receive loop
//! never waits on a device write or a reconnect. Messages that cannot be
//! handled (unknown topic, malformed JSON) are logged and dropped without
//! any device traffic and without publishing anything back.

use std::sync::Arc;

use lumen_kernel::{Action, Bridge};
use lumen_types::BridgeError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::publisher::Publisher;
use crate::topics::TopicRoutes;

/// Message front-end bound to one topic namespace.
#[derive(Clone)]
pub struct MessageFrontEnd {
    bridge: Arc<Bridge>,
    routes: Arc<TopicRoutes>,
    publisher: Arc<dyn Publisher>,
}

impl MessageFrontEnd {
    pub fn new(bridge: Arc<Bridge>, base_topic: &str, publisher: Arc<dyn Publisher>) -> Self {
        let routes = TopicRoutes::new(base_topic, bridge.table());
        Self {
            bridge,
            routes: Arc::new(routes),
            publisher,
        }
    }

    pub fn routes(&self) -> &TopicRoutes {
        &self.routes
    }

    /// Handle one inbound message.
    ///
    /// Returns `None` when the message was dropped. Otherwise the handle
    /// resolves once the command (or the status publish) has finished.
    pub fn handle_message(&self, topic: &str, payload: &[u8]) -> Option<JoinHandle<Result<(), BridgeError>>> {
        let Some(command) = self.routes.resolve(topic) else {
            debug!(topic, "message on unrouted topic ignored");
            return None;
        };
        debug!(topic, command = command.name, len = payload.len(), "message received");

        if command.action == Action::Status {
            return Some(self.publish_status());
        }

        match self.bridge.handle_payload(command.name, payload) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(topic, error = %e, "message dropped");
                None
            }
        }
    }

    /// Publish the current snapshot on the status topic.
    pub fn publish_status(&self) -> JoinHandle<Result<(), BridgeError>> {
        let bridge = Arc::clone(&self.bridge);
        let publisher = Arc::clone(&self.publisher);
        let routes = Arc::clone(&self.routes);
        tokio::spawn(async move {
            let snapshot = bridge.status();
            let body = serde_json::to_vec(&snapshot)
                .map_err(|e| BridgeError::Serialization(e.to_string()))?;
            publisher.publish(routes.status_topic(), body).await
        })
    }
}
