//! Wi-Fi backends.
//!
//! [`NmcliBackend`] drives NetworkManager through its command-line client.
//! Every operation is one or two `nmcli` invocations run with
//! `tokio::process`, so the async runtime never blocks on them.
//!
//! # Parsing `nmcli -t` output (for beginners)
//!
//! In terse mode (`-t`) nmcli prints one line per network with fields joined
//! by `:`.  A colon *inside* a value is escaped as `\:`, which matters for
//! BSSIDs:
//!
//! ```text
//! home:AA\:BB\:CC\:DD\:EE\:FF:6:78:WPA2
//! ```
//!
//! [`split_terse`] undoes the escaping while splitting.

use std::net::Ipv4Addr;
use std::process::Output;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::application::ports::{WifiBackend, WifiError};
use crate::domain::{Credentials, NetworkInfo, WifiBackendKind};

/// NetworkManager connection profile used for the access point.
const AP_CONNECTION_NAME: &str = "modbus-bridge-ap";

/// Builds the backend selected in the configuration.
pub fn backend_for(kind: WifiBackendKind, interface: &str) -> Arc<dyn WifiBackend> {
    match kind {
        WifiBackendKind::Nmcli => Arc::new(NmcliBackend::new(interface)),
        WifiBackendKind::None => Arc::new(NullWifiBackend),
    }
}

// ── nmcli ─────────────────────────────────────────────────────────────────────

/// [`WifiBackend`] backed by NetworkManager.
#[derive(Debug, Clone)]
pub struct NmcliBackend {
    interface: String,
}

impl NmcliBackend {
    pub fn new(interface: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
        }
    }

    /// Runs `nmcli` with `args`.  `label` names the command in errors and
    /// logs, so secrets passed as arguments never appear there.
    async fn nmcli(&self, label: &str, args: &[&str]) -> Result<Output, WifiError> {
        debug!(command = label, "Running nmcli");
        let output = Command::new("nmcli")
            .args(args)
            .output()
            .await
            .map_err(|source| WifiError::Spawn {
                command: label.to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(WifiError::CommandFailed {
                command: label.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

#[async_trait]
impl WifiBackend for NmcliBackend {
    async fn start_access_point(
        &self,
        ssid: &str,
        address: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<(), WifiError> {
        // A profile left over from the previous boot would make `add` fail.
        if self
            .nmcli("nmcli connection delete", &["connection", "delete", AP_CONNECTION_NAME])
            .await
            .is_ok()
        {
            debug!("Removed stale access point profile");
        }

        let cidr = format!("{address}/{prefix_len}");
        self.nmcli(
            "nmcli connection add",
            &[
                "connection",
                "add",
                "type",
                "wifi",
                "ifname",
                &self.interface,
                "con-name",
                AP_CONNECTION_NAME,
                "autoconnect",
                "no",
                "ssid",
                ssid,
                "mode",
                "ap",
                "ipv4.method",
                "shared",
                "ipv4.addresses",
                &cidr,
            ],
        )
        .await?;
        self.nmcli("nmcli connection up", &["connection", "up", AP_CONNECTION_NAME])
            .await?;
        info!(ssid, address = %cidr, "Access point started");
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<NetworkInfo>, WifiError> {
        let output = self
            .nmcli(
                "nmcli device wifi list",
                &[
                    "-t",
                    "-f",
                    "SSID,BSSID,CHAN,SIGNAL,SECURITY",
                    "device",
                    "wifi",
                    "list",
                    "--rescan",
                    "yes",
                    "ifname",
                    &self.interface,
                ],
            )
            .await?;
        Ok(parse_scan_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn join(&self, credentials: &Credentials) -> Result<(), WifiError> {
        if self
            .nmcli("nmcli connection down", &["connection", "down", AP_CONNECTION_NAME])
            .await
            .is_ok()
        {
            debug!("Access point taken down before joining");
        }
        self.nmcli(
            "nmcli device wifi connect",
            &[
                "device",
                "wifi",
                "connect",
                &credentials.ssid,
                "password",
                &credentials.password,
                "ifname",
                &self.interface,
            ],
        )
        .await?;
        info!(ssid = %credentials.ssid, "Joined Wi-Fi network");
        Ok(())
    }
}

/// Parses `nmcli -t -f SSID,BSSID,CHAN,SIGNAL,SECURITY device wifi list`.
///
/// Hidden networks (empty SSID) and malformed lines are skipped.
pub fn parse_scan_output(stdout: &str) -> Vec<NetworkInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields = split_terse(line);
            let [ssid, bssid, chan, signal, security] = fields.as_slice() else {
                return None;
            };
            if ssid.is_empty() {
                return None;
            }
            let signal: i32 = signal.parse().ok()?;
            Some(NetworkInfo {
                rssi: signal_to_dbm(signal),
                ssid: ssid.clone(),
                bssid: bssid.clone(),
                channel: chan.parse().unwrap_or(0),
                secure: !security.is_empty() && security != "--",
            })
        })
        .collect()
}

/// Splits one terse line on unescaped `:` and removes the escapes.
pub fn split_terse(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            ':' => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields
}

/// nmcli reports signal quality as 0–100 %; the UI expects dBm.
fn signal_to_dbm(quality: i32) -> i32 {
    quality.clamp(0, 100) / 2 - 100
}

// ── null backend ──────────────────────────────────────────────────────────────

/// Backend for hosts whose network is configured elsewhere.
///
/// Access point and join requests are logged and succeed; scans find nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWifiBackend;

#[async_trait]
impl WifiBackend for NullWifiBackend {
    async fn start_access_point(
        &self,
        ssid: &str,
        address: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<(), WifiError> {
        warn!(ssid, %address, prefix_len, "No Wi-Fi backend; access point not started");
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<NetworkInfo>, WifiError> {
        Ok(Vec::new())
    }

    async fn join(&self, credentials: &Credentials) -> Result<(), WifiError> {
        info!(ssid = %credentials.ssid, "No Wi-Fi backend; assuming network is up");
        Ok(())
    }
}
