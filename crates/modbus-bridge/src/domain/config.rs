//! Gateway configuration schema.
//!
//! [`GatewayConfig`] is the single source of truth for all runtime settings.
//! It is read from a TOML file by the infrastructure layer (see
//! `infrastructure::storage::config_file`) and then overridden by CLI flags.
//!
//! # Example file
//!
//! ```toml
//! log_level = "info"
//!
//! [http]
//! bind_address = "0.0.0.0"
//! port = 80
//!
//! [bus]
//! serial_port = "/dev/ttyUSB0"
//! baud_rate = 9600
//! device_id = 1
//! timeout_ms = 2000
//!
//! [provisioning]
//! ap_ssid = "modbus-bridge-setup"
//! ap_address = "192.168.4.1"
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = ...)]`, so a missing file, a
//! missing section, or a missing key all fall back to the values documented
//! on each `default_*` helper.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP listener settings, shared by both modes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpConfig {
    /// Address to bind to.  `0.0.0.0` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// TCP port.  Captive-portal detection only works on port 80.
    #[serde(default = "default_http_port")]
    pub port: u16,
}

/// Modbus RTU serial line settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BusConfig {
    /// Serial device connected to the RS-485 transceiver.
    #[serde(default = "default_serial_port")]
    pub serial_port: String,
    /// Line speed; the frame format is fixed at 8N1.
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Device addressed when a request does not name one.
    #[serde(default = "default_device_id")]
    pub device_id: u8,
    /// How long the driver waits for a reply before reporting a timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Maximum number of transactions queued behind the one on the wire.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

/// Captive-portal settings used while no credentials are stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisioningConfig {
    /// SSID of the isolated access point.
    #[serde(default = "default_ap_ssid")]
    pub ap_ssid: String,
    /// The device's own address on the access point network.
    #[serde(default = "default_ap_address")]
    pub ap_address: Ipv4Addr,
    /// Prefix length of the access point network.
    #[serde(default = "default_ap_prefix_len")]
    pub ap_prefix_len: u8,
    /// UDP port of the captive DNS responder.
    #[serde(default = "default_dns_port")]
    pub dns_port: u16,
    /// Wireless interface used for the access point and for scanning.
    #[serde(default = "default_interface")]
    pub interface: String,
    /// Which Wi-Fi backend drives the interface.
    #[serde(default)]
    pub wifi_backend: WifiBackendKind,
}

/// Selects the Wi-Fi backend implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WifiBackendKind {
    /// NetworkManager via the `nmcli` command-line tool.
    #[default]
    Nmcli,
    /// No Wi-Fi control: scans are empty, AP and join requests are logged only.
    None,
}

/// Paths of persisted state and static assets.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// File holding the Wi-Fi credentials.
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    /// Directory served as the static asset store.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: PathBuf,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}
fn default_http_port() -> u16 {
    80
}
fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}
fn default_baud_rate() -> u32 {
    9600
}
fn default_device_id() -> u8 {
    1
}
fn default_timeout_ms() -> u64 {
    2000
}
fn default_queue_depth() -> usize {
    16
}
fn default_ap_ssid() -> String {
    "modbus-bridge-setup".to_string()
}
fn default_ap_address() -> Ipv4Addr {
    Ipv4Addr::new(192, 168, 4, 1)
}
fn default_ap_prefix_len() -> u8 {
    24
}
fn default_dns_port() -> u16 {
    53
}
fn default_interface() -> String {
    "wlan0".to_string()
}
fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.toml")
}
fn default_assets_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            http: HttpConfig::default(),
            bus: BusConfig::default(),
            provisioning: ProvisioningConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_http_port(),
        }
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            serial_port: default_serial_port(),
            baud_rate: default_baud_rate(),
            device_id: default_device_id(),
            timeout_ms: default_timeout_ms(),
            queue_depth: default_queue_depth(),
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            ap_ssid: default_ap_ssid(),
            ap_address: default_ap_address(),
            ap_prefix_len: default_ap_prefix_len(),
            dns_port: default_dns_port(),
            interface: default_interface(),
            wifi_backend: WifiBackendKind::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
            assets_dir: default_assets_dir(),
        }
    }
}

impl HttpConfig {
    /// The socket address the HTTP server binds to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

impl BusConfig {
    /// The transaction timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl ProvisioningConfig {
    /// Returns `true` if `ip` lies on the access point network.
    ///
    /// Loopback peers are accepted too, so the portal can be inspected
    /// from the device itself.
    pub fn is_on_ap_network(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) if v4.is_loopback() => true,
            IpAddr::V4(v4) => {
                let prefix = u32::from(self.ap_prefix_len.min(32));
                // `checked_shl` keeps a /0 prefix from overflowing the shift.
                let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
                u32::from(v4) & mask == u32::from(self.ap_address) & mask
            }
            IpAddr::V6(v6) => v6.is_loopback(),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
