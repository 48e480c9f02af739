//! Wi-Fi scan result records, serialised as the `/scan` JSON array.

use serde::{Deserialize, Serialize};

/// One network seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Signal strength in dBm (negative; closer to zero is stronger).
    pub rssi: i32,
    pub ssid: String,
    /// Access point MAC address, `AA:BB:CC:DD:EE:FF`.
    pub bssid: String,
    pub channel: u8,
    /// `false` for open networks.
    pub secure: bool,
}
