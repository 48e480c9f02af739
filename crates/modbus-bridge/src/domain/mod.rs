//! Domain layer for modbus-bridge.
//!
//! The domain layer contains pure business-logic types that have no
//! dependencies on I/O, networking, or external frameworks.
//!
//! # What belongs in the domain layer?
//!
//! - Configuration structures
//! - Network credentials and the bridge mode enumeration
//! - The reply a waiting HTTP caller eventually receives
//! - Wi-Fi scan result records
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `axum`, or serial port types
//! - File I/O or environment variable reading

pub mod config;
pub mod credentials;
pub mod mode;
pub mod network;
pub mod reply;

pub use config::{GatewayConfig, WifiBackendKind};
pub use credentials::Credentials;
pub use mode::BridgeMode;
pub use network::NetworkInfo;
pub use reply::{BridgeReply, ReplyStatus};
