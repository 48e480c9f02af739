//! Modbus Bridge entry point.
//!
//! This binary serves one of two HTTP surfaces, chosen at every boot from the
//! stored Wi-Fi credentials:
//!
//! - **Provisioning** (no credentials): an access point, a captive DNS
//!   responder and a setup page where the user picks a network and enters
//!   its password.
//! - **Operational** (credentials stored): `GET /?a=<address>&l=<length>`
//!   reads holding registers from a Modbus RTU slave and returns them as
//!   text.
//!
//! # Usage
//!
//! ```text
//! modbus-bridge [OPTIONS]
//!
//! Options:
//!   --config       <PATH>  Configuration file [default: modbus-bridge.toml]
//!   --serial-port  <PATH>  Serial device of the RS-485 line
//!   --baud-rate    <BAUD>  Line speed
//!   --http-port    <PORT>  HTTP listener port
//!   --log-level    <LEVEL> Log level used when RUST_LOG is unset
//!   --write-default-config Write the default configuration to --config and exit
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable                      | Overrides          |
//! |-------------------------------|--------------------|
//! | `MODBUS_BRIDGE_CONFIG`        | `--config`         |
//! | `MODBUS_BRIDGE_SERIAL_PORT`   | `bus.serial_port`  |
//! | `MODBUS_BRIDGE_BAUD_RATE`     | `bus.baud_rate`    |
//! | `MODBUS_BRIDGE_HTTP_PORT`     | `http.port`        |
//! | `MODBUS_BRIDGE_LOG_LEVEL`     | `log_level`        |

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use modbus_bridge::domain::GatewayConfig;
use modbus_bridge::infrastructure::run_supervisor;
use modbus_bridge::infrastructure::storage::{load_config, save_config};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// HTTP-to-Modbus RTU bridge.
///
/// Values given here override the configuration file.
#[derive(Debug, Parser)]
#[command(
    name = "modbus-bridge",
    about = "HTTP-to-Modbus RTU bridge with captive-portal provisioning",
    version
)]
struct Cli {
    /// Path to the TOML configuration file.  A missing file means defaults.
    #[arg(long, default_value = "modbus-bridge.toml", env = "MODBUS_BRIDGE_CONFIG")]
    config: PathBuf,

    /// Serial device connected to the RS-485 transceiver.
    #[arg(long, env = "MODBUS_BRIDGE_SERIAL_PORT")]
    serial_port: Option<String>,

    /// Line speed of the serial port.
    #[arg(long, env = "MODBUS_BRIDGE_BAUD_RATE")]
    baud_rate: Option<u32>,

    /// TCP port of the HTTP server (both modes).
    #[arg(long, env = "MODBUS_BRIDGE_HTTP_PORT")]
    http_port: Option<u16>,

    /// Log level used when `RUST_LOG` is not set.
    #[arg(long, env = "MODBUS_BRIDGE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Write the effective configuration to `--config` and exit.
    #[arg(long)]
    write_default_config: bool,
}

impl Cli {
    /// Applies the command-line overrides on top of `config`.
    fn apply_overrides(&self, mut config: GatewayConfig) -> GatewayConfig {
        if let Some(port) = &self.serial_port {
            config.bus.serial_port = port.clone();
        }
        if let Some(baud) = self.baud_rate {
            config.bus.baud_rate = baud;
        }
        if let Some(port) = self.http_port {
            config.http.port = port;
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        config
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and the configuration file is loaded.
/// 2. `tracing_subscriber` is initialised.  `RUST_LOG` wins; otherwise the
///    configured `log_level` applies.
/// 3. A Ctrl+C handler is spawned; it clears a shared `AtomicBool`.
/// 4. [`run_supervisor`] boots into provisioning or operational mode and
///    reboots after every restart request until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let config = cli.apply_overrides(config);

    if cli.write_default_config {
        save_config(&cli.config, &config)
            .with_context(|| format!("failed to write {}", cli.config.display()))?;
        println!("wrote {}", cli.config.display());
        return Ok(());
    }

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!(
        serial = %config.bus.serial_port,
        baud = config.bus.baud_rate,
        http = %config.http.socket_addr(),
        "Modbus bridge starting"
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_supervisor(config, running).await?;

    info!("Modbus bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default_config_path() {
        // Arrange: parse with no arguments (all defaults apply)
        let cli = Cli::parse_from(["modbus-bridge"]);

        // Assert
        assert_eq!(cli.config, PathBuf::from("modbus-bridge.toml"));
        assert!(!cli.write_default_config);
    }

    #[test]
    fn test_no_overrides_keep_file_values() {
        // Arrange
        let cli = Cli::parse_from(["modbus-bridge"]);
        let file = GatewayConfig::default();

        // Act
        let config = cli.apply_overrides(file.clone());

        // Assert
        assert_eq!(config, file);
    }

    #[test]
    fn test_serial_overrides() {
        let cli = Cli::parse_from([
            "modbus-bridge",
            "--serial-port",
            "/dev/ttyAMA0",
            "--baud-rate",
            "19200",
        ]);

        let config = cli.apply_overrides(GatewayConfig::default());

        assert_eq!(config.bus.serial_port, "/dev/ttyAMA0");
        assert_eq!(config.bus.baud_rate, 19200);
    }

    #[test]
    fn test_http_port_override() {
        let cli = Cli::parse_from(["modbus-bridge", "--http-port", "8080"]);
        let config = cli.apply_overrides(GatewayConfig::default());
        assert_eq!(config.http.port, 8080);
    }

    #[test]
    fn test_log_level_override() {
        let cli = Cli::parse_from(["modbus-bridge", "--log-level", "debug"]);
        let config = cli.apply_overrides(GatewayConfig::default());
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_invalid_http_port_is_rejected() {
        let result = Cli::try_parse_from(["modbus-bridge", "--http-port", "70000"]);
        assert!(result.is_err());
    }
}
