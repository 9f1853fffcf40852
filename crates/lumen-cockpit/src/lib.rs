//! `lumen-cockpit` – Request Front-End
//!
//! Boots an axum HTTP server (default port `8000`) that:
//!
//! 1. **Runs** one bridge command per `GET /api/<command>` request. Query
//!    parameters are normalized, the connection is gated, the device message
//!    is written and the response is always a `{connected, config}` snapshot.
//!
//! 2. **Stores** image uploads (`POST /api/upload`) under the uploads
//!    directory so a later `setImg` can reference them.
//!
//! 3. **Serves** the static web UI from the public directory and the
//!    `/test` integration run for manual checks on real hardware.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use server::{CockpitServer, DEFAULT_PORT};
