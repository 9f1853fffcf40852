//! `lumen-cli` – Lumen Bridge entry point
//!
//! This binary wires the bridge together and runs it until Ctrl-C:
//!
//! 1. Installs the `tracing` subscriber (and the OTLP exporter when
//!    configured).
//! 2. Loads `~/.lumen/config.toml`, writing the defaults on first run.
//! 3. Builds one device, one connection and one [`Bridge`] shared by both
//!    front-ends. The device and connection are the in-process simulators
//!    from `lumen-hal`; a hardware driver plugs in through the same `Device`
//!    and `Connection` traits.
//! 4. Starts the MQTT message front-end when `[mqtt] on = true`.
//! 5. Serves the HTTP request front-end until Ctrl-C, then tears the broker
//!    link down.

mod config;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tracing::{debug, error, info, warn};

use lumen_cockpit::CockpitServer;
use lumen_hal::{SimConnection, SimDevice};
use lumen_kernel::Bridge;
use lumen_middleware::{MqttHandle, MqttLink};
use lumen_types::BridgeError;

const MQTT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

fn main() -> ExitCode {
    // The simple OTLP exporter is built before any Tokio runtime exists.
    let _guard = telemetry::init_tracing("lumen");

    print_banner();
    let cfg = load_config();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to start the async runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(cfg)) {
        Ok(()) => {
            println!("{}", "  ✓ Lumen stopped.".green());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "lumen stopped with an error");
            ExitCode::FAILURE
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

fn load_config() -> config::Config {
    let path = config::config_path();
    match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", path.display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let mut cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    path.display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            config::apply_env_overrides(&mut cfg);
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            let mut cfg = config::Config::default();
            config::apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wiring
// ─────────────────────────────────────────────────────────────────────────────

async fn serve(cfg: config::Config) -> Result<(), BridgeError> {
    info!(?cfg, "starting bridge");

    let device = Arc::new(SimDevice::new());
    let connection = Arc::new(SimConnection::new());
    let bridge = Arc::new(Bridge::new(device, connection, cfg.service.auto_connect));

    let mqtt = if cfg.mqtt.on {
        start_message_front_end(&cfg.mqtt, Arc::clone(&bridge)).await
    } else {
        debug!("message front-end disabled");
        None
    };

    let port = cfg.service.port;
    let server = CockpitServer::new(bridge)
        .with_port(port)
        .with_public_dir(cfg.service.public_dir)
        .with_uploads_dir(cfg.service.uploads_dir);
    println!(
        "  Listening on {}\n",
        format!("http://localhost:{port}").bold().cyan()
    );

    let result = server.run_until(shutdown_signal()).await;

    if let Some((handle, task)) = mqtt {
        if let Err(e) = handle.close().await {
            debug!(error = %e, "broker link already closed");
        }
        if tokio::time::timeout(MQTT_CLOSE_TIMEOUT, task).await.is_err() {
            warn!("broker link did not close in time");
        }
    }
    result
}

async fn start_message_front_end(
    mqtt: &config::MqttConfig,
    bridge: Arc<Bridge>,
) -> Option<(MqttHandle, tokio::task::JoinHandle<()>)> {
    let link = match MqttLink::connect(&mqtt.to_settings(), bridge).await {
        Ok(link) => link,
        Err(e) => {
            error!(error = %e, "message front-end not started");
            return None;
        }
    };
    let handle = link.handle();
    let task = tokio::spawn(async move {
        if let Err(e) = link.run().await {
            error!(error = %e, "message front-end stopped");
        }
    });
    println!("  MQTT topics under {}", format!("{}/set/", mqtt.topic).bold());
    Some((handle, task))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler; graceful shutdown unavailable");
        std::future::pending::<()>().await;
    }
    println!();
    println!("{}", "⚠  Ctrl-C received – shutting down …".yellow().bold());
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   __                         "#.bold().cyan());
    println!("{}", r#"  / /  __ ____ _  ___ ___     "#.bold().cyan());
    println!("{}", r#" / /__/ // /  ' \/ -_) _ \    "#.bold().cyan());
    println!("{}", r#"/____/\_,_/_/_/_/\__/_//_/    "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "Lumen".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  HTTP + MQTT bridge for display and lighting devices");
    println!();
}
