//! Network infrastructure used by provisioning mode.
//!
//! # Sub-modules
//!
//! - **`dns`** – Captive DNS responder.  Answers every query with the access
//!   point's own address, so whatever hostname a freshly joined phone looks
//!   up lands on the provisioning page.
//!
//! - **`wifi`** – [`WifiBackend`](crate::application::WifiBackend)
//!   implementations: NetworkManager via `nmcli`, and a null backend for
//!   hosts whose network is managed elsewhere.

pub mod dns;
pub mod wifi;

pub use dns::{start_captive_dns, CaptiveDns, DnsError};
pub use wifi::{backend_for, NmcliBackend, NullWifiBackend};
