//! Generic `Device` trait for the display/lighting encoder.
//!
//! Implementations map a canonical [`Settings`] record to the binary message
//! the device understands. Encoders are expected to be deterministic and free
//! of side effects on the link; they may validate or default any field the
//! bridge did not supply.

use async_trait::async_trait;
use lumen_types::{BridgeError, Settings};
use serde_json::Value;

/// Encoder and configuration source for one physical device.
///
/// Every synchronous method returns the encoded control-channel message for
/// its command. [`render_image`][Device::render_image] is the exception: the
/// device has to fetch and rasterise the image before bytes exist, and the
/// result travels over the bulk-binary channel.
#[async_trait]
pub trait Device: Send + Sync {
    /// `{level}`
    fn brightness(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{enable}`
    fn fullday(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{date, fulldayMode}`
    fn datetime(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{color, brightness, mode, powerScreen}`
    fn lighting(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{mode, showTime, showWeather, showTemperature, showCalendar, color}`
    fn clock(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{weather, temperature}`
    fn climate(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{mode}`
    fn effect(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{mode}`
    fn visualization(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{red, blue}`
    fn score(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// `{enable}` – switches the screen off (or back on).
    fn power_screen(&self, settings: &Settings) -> Result<Vec<u8>, BridgeError>;

    /// Fetch and render the image at `path` into a bulk-channel payload.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Render`] when no path was supplied or the image
    /// cannot be loaded.
    async fn render_image(&self, path: Option<&str>) -> Result<Vec<u8>, BridgeError>;

    /// The device's current configuration, as reported in status snapshots.
    fn config(&self) -> Value;
}
