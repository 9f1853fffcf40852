//! `lumen-kernel` – Command Dispatch & Connection Gatekeeping
//!
//! The part of the bridge both front-ends share. It owns no sockets and no
//! protocol; it turns a command name plus raw input into device writes.
//!
//! # Modules
//!
//! - [`normalizer`] – turns query parameters or JSON payloads into canonical
//!   [`Settings`][lumen_types::Settings].
//! - [`gatekeeper`] – [`ConnectionGate`][gatekeeper::ConnectionGate]:
//!   gate-then-proceed for requests, reconnect-or-dispatch for messages.
//! - [`command_table`] – [`CommandTable`][command_table::CommandTable]:
//!   the static registry of commands, their fields and their actions.
//! - [`dispatch`] – [`Bridge`][dispatch::Bridge]: the single generic
//!   dispatcher and the two pipelines built on it.
//! - [`scenario`] – the scripted integration run behind `/test`.

pub mod command_table;
pub mod dispatch;
pub mod gatekeeper;
pub mod normalizer;
pub mod scenario;

pub use command_table::{Action, COMMANDS, Command, CommandTable, Encoder, FollowUp};
pub use dispatch::Bridge;
pub use gatekeeper::{ConnectionGate, GateOutcome};
pub use scenario::{DEFAULT_STEP_DELAY, ScenarioReport, Step, integration_steps, run_integration};
