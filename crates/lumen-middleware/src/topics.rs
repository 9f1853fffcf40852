//! Topic namespace of the message front-end.
//!
//! | Direction | Topic | Meaning |
//! |---|---|---|
//! | inbound | `<base>/set/<command>` | run `<command>` with the JSON payload |
//! | inbound | `<base>/set/status` | publish a status snapshot |
//! | inbound | `<base>/set/connect`, `<base>/set/disconnect` | toggle the link |
//! | outbound | `<base>/get/status` | serialized status snapshot |
//!
//! Legacy aliases (`img`, `lightning`) get their own inbound topic and
//! resolve to the same command as the canonical name.

use std::collections::HashMap;

use lumen_kernel::{Command, CommandTable};

const SET: &str = "set";
const GET: &str = "get";

/// Inbound topic → command lookup, built once from the command table.
#[derive(Debug, Clone)]
pub struct TopicRoutes {
    base: String,
    inbound: HashMap<String, &'static Command>,
    status_topic: String,
}

impl TopicRoutes {
    /// Build the routes for every name in `table` under `base`.
    ///
    /// Trailing slashes on `base` are ignored.
    pub fn new(base: &str, table: &CommandTable) -> Self {
        let base = base.trim_end_matches('/').to_string();
        let mut inbound = HashMap::new();
        for command in table.commands() {
            for name in std::iter::once(command.name).chain(command.aliases.iter().copied()) {
                inbound.insert(format!("{base}/{SET}/{name}"), command);
            }
        }
        let status_topic = format!("{base}/{GET}/status");
        Self {
            base,
            inbound,
            status_topic,
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// The command an inbound topic routes to, if any.
    pub fn resolve(&self, topic: &str) -> Option<&'static Command> {
        self.inbound.get(topic).copied()
    }

    /// Every inbound topic to subscribe, sorted for stable output.
    pub fn subscriptions(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.inbound.keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    /// Outbound topic for status snapshots.
    pub fn status_topic(&self) -> &str {
        &self.status_topic
    }
}
