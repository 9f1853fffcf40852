//! [`ConnectionGate`] – makes sure the link is up before a device write.
//!
//! The two front-ends gate differently, so the gate offers two entry points:
//!
//! 1. **Gate-then-proceed** ([`ConnectionGate::gate`]): used by the request
//!    front-end before every gated command. With auto-connect enabled and the
//!    link down, the current request is suspended until `connect()` settles.
//!    The caller proceeds whatever the outcome; a failed connect surfaces
//!    later as the transport's own write error.
//!
//! 2. **Reconnect-or-dispatch** ([`ConnectionGate::reconnect_then`]): used by
//!    the message front-end. The action runs on a spawned task, after a
//!    `connect()` when the link is down, so the inbound message loop is never
//!    blocked. The returned handle makes completion and failure observable.
//!
//! No retries, timeouts or queueing happen here. Two messages arriving during
//! one reconnect each issue their own `connect()`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lumen_hal::{Connection, SimConnection};
//! use lumen_kernel::{ConnectionGate, GateOutcome};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let link = Arc::new(SimConnection::new());
//! let gate = ConnectionGate::new(link.clone(), true);
//!
//! assert_eq!(gate.gate().await, GateOutcome::Connected);
//! assert!(link.is_connected());
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;

use lumen_hal::Connection;
use lumen_types::BridgeError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// What [`ConnectionGate::gate`] found and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The link was already up.
    AlreadyConnected,
    /// The link was down and `connect()` succeeded.
    Connected,
    /// The link was down and `connect()` failed with the given reason.
    ConnectFailed(String),
    /// The link was down but auto-connect is disabled.
    Bypassed,
}

/// Connection gatekeeper shared by both front-ends. Clone it cheaply.
#[derive(Clone)]
pub struct ConnectionGate {
    connection: Arc<dyn Connection>,
    auto_connect: bool,
}

impl ConnectionGate {
    /// Create a gate over `connection`.
    ///
    /// `auto_connect` only affects [`gate`][Self::gate]; the
    /// reconnect-or-dispatch path always reconnects.
    pub fn new(connection: Arc<dyn Connection>, auto_connect: bool) -> Self {
        Self {
            connection,
            auto_connect,
        }
    }

    pub fn auto_connect(&self) -> bool {
        self.auto_connect
    }

    /// Gate-then-proceed.
    ///
    /// Suspends until a needed `connect()` settles and reports what happened.
    /// Never fails: the caller continues regardless of the outcome.
    pub async fn gate(&self) -> GateOutcome {
        if self.connection.is_connected() {
            return GateOutcome::AlreadyConnected;
        }
        if !self.auto_connect {
            debug!("link down and auto-connect disabled; proceeding ungated");
            return GateOutcome::Bypassed;
        }
        info!("link down; connecting before request");
        match self.connection.connect().await {
            Ok(()) => GateOutcome::Connected,
            Err(e) => {
                warn!(error = %e, "connect failed; proceeding with request anyway");
                GateOutcome::ConnectFailed(e.to_string())
            }
        }
    }

    /// Reconnect-or-dispatch.
    ///
    /// Spawns a task that connects first when the link is down, then runs
    /// `action`. A failed `connect()` skips the action and resolves the
    /// handle with that error.
    pub fn reconnect_then<F, Fut>(&self, action: F) -> JoinHandle<Result<(), BridgeError>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BridgeError>> + Send + 'static,
    {
        let connection = Arc::clone(&self.connection);
        tokio::spawn(async move {
            if !connection.is_connected() {
                debug!("link down; reconnecting before dispatch");
                connection.connect().await.inspect_err(|e| {
                    warn!(error = %e, "reconnect failed; dispatch skipped");
                })?;
            }
            action().await
        })
    }
}
