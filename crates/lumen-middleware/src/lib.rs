//! `lumen-middleware` – Message Front-End
//!
//! Carries commands in from an MQTT broker and status snapshots back out,
//! without caring what the commands mean.
//!
//! # Modules
//!
//! - [`topics`] – the `<base>/set/<command>` / `<base>/get/status` namespace.
//! - [`publisher`] – [`Publisher`][publisher::Publisher], the outbound seam.
//! - [`front_end`] – [`MessageFrontEnd`][front_end::MessageFrontEnd]: parses
//!   inbound payloads and dispatches through the reconnect-or-dispatch gate.
//! - [`mqtt`] – [`MqttLink`][mqtt::MqttLink]: the `rumqttc` client and its
//!   event loop.

pub mod front_end;
pub mod mqtt;
pub mod publisher;
pub mod topics;

pub use front_end::MessageFrontEnd;
pub use mqtt::{MqttHandle, MqttLink, MqttSettings, parse_address};
pub use publisher::Publisher;
pub use topics::TopicRoutes;
