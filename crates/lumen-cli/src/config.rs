//! Configuration Vault – reads/writes `~/.lumen/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use lumen_middleware::MqttSettings;

/// `[service]` – the request front-end and connection gating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// HTTP port of the request front-end.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Open the device link before a request when it is down.
    #[serde(default = "default_true")]
    pub auto_connect: bool,

    /// Static web UI served for every non-API path.
    #[serde(default = "default_public_dir")]
    pub public_dir: PathBuf,

    /// Where `POST /api/upload` stores files.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            auto_connect: true,
            public_dir: default_public_dir(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

/// `[mqtt]` – the message front-end.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Start the message front-end at all.
    #[serde(default)]
    pub on: bool,

    #[serde(default = "default_mqtt_address")]
    pub address: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,

    /// Broker password (stored as plain text; the file is owner-only).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,

    /// Base topic; commands arrive on `<topic>/set/<command>`.
    #[serde(default = "default_topic")]
    pub topic: String,

    #[serde(default = "default_client_id")]
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            on: false,
            address: default_mqtt_address(),
            username: String::new(),
            password: String::new(),
            topic: default_topic(),
            client_id: default_client_id(),
        }
    }
}

impl std::fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MqttConfig")
            .field("on", &self.on)
            .field("address", &self.address)
            .field("username", &self.username)
            .field(
                "password",
                if self.password.is_empty() { &"<not set>" } else { &"<redacted>" },
            )
            .field("topic", &self.topic)
            .field("client_id", &self.client_id)
            .finish()
    }
}

impl MqttConfig {
    /// Broker settings for the message front-end. Credentials are only sent
    /// when both username and password are set.
    pub fn to_settings(&self) -> MqttSettings {
        let with_credentials = !self.username.is_empty() && !self.password.is_empty();
        MqttSettings {
            address: self.address.clone(),
            username: with_credentials.then(|| self.username.clone()),
            password: with_credentials.then(|| self.password.clone()),
            topic: self.topic.clone(),
            client_id: self.client_id.clone(),
        }
    }
}

/// Persisted configuration stored in `~/.lumen/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub mqtt: MqttConfig,
}

fn default_port() -> u16 {
    8000
}
fn default_true() -> bool {
    true
}
fn default_public_dir() -> PathBuf {
    PathBuf::from("public")
}
fn default_uploads_dir() -> PathBuf {
    PathBuf::from("public/uploads")
}
fn default_mqtt_address() -> String {
    "mqtt://localhost:1883".to_string()
}
fn default_topic() -> String {
    "lumen".to_string()
}
fn default_client_id() -> String {
    "lumen-bridge".to_string()
}

/// Return the config path: `$LUMEN_CONFIG` when set, else
/// `~/.lumen/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("LUMEN_CONFIG")
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".lumen").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

/// Load the config from a specific path and apply environment overrides.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `LUMEN_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `LUMEN_PORT` | `service.port` |
/// | `LUMEN_AUTO_CONNECT` | `service.auto_connect` |
/// | `LUMEN_MQTT_ON` | `mqtt.on` |
/// | `LUMEN_MQTT_ADDRESS` | `mqtt.address` |
/// | `LUMEN_MQTT_TOPIC` | `mqtt.topic` |
/// | `LUMEN_MQTT_USERNAME` | `mqtt.username` |
/// | `LUMEN_MQTT_PASSWORD` | `mqtt.password` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("LUMEN_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.service.port = port;
    }
    if let Some(flag) = env_flag("LUMEN_AUTO_CONNECT") {
        cfg.service.auto_connect = flag;
    }
    if let Some(flag) = env_flag("LUMEN_MQTT_ON") {
        cfg.mqtt.on = flag;
    }
    if let Ok(v) = std::env::var("LUMEN_MQTT_ADDRESS") {
        cfg.mqtt.address = v;
    }
    if let Ok(v) = std::env::var("LUMEN_MQTT_TOPIC") {
        cfg.mqtt.topic = v;
    }
    if let Ok(v) = std::env::var("LUMEN_MQTT_USERNAME") {
        cfg.mqtt.username = v;
    }
    if let Ok(v) = std::env::var("LUMEN_MQTT_PASSWORD") {
        cfg.mqtt.password = v;
    }
}

fn env_flag(name: &str) -> Option<bool> {
    parse_flag(&std::env::var(name).ok()?)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.lumen/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        let created = !parent.exists();
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Only a directory created here is restricted to the owner (rwx------).
        #[cfg(unix)]
        if created {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    // Owner-only read/write (rw-------) on Unix; the file may hold a broker password.
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
