//! `lumen-hal` – device and transport seams.
//!
//! The bridge never encodes device messages or drives a radio itself. It
//! talks to two collaborators through traits so that real drivers can be
//! swapped in without touching dispatch logic:
//!
//! - [`device`] – [`Device`]: pure encoders that turn a [`Settings`] record
//!   into an opaque device message, plus the asynchronous image renderer and
//!   the device's current configuration.
//! - [`connection`] – [`Connection`]: the lazily-established link with its
//!   control (`write_all`) and bulk-binary (`write_image`) channels.
//! - [`sim`] – in-process recording doubles for both traits, used by tests
//!   and for running the bridge without hardware.
//!
//! [`Settings`]: lumen_types::Settings

pub mod connection;
pub mod device;
pub mod sim;

pub use connection::Connection;
pub use device::Device;
pub use sim::{SimConnection, SimDevice, SimWrite};
