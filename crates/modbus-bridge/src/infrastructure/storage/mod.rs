//! Storage infrastructure: files the bridge reads and writes.
//!
//! - **`config_file`** – Loads and saves the [`GatewayConfig`] TOML file,
//!   falling back to defaults when the file does not exist yet (first run).
//! - **`credentials`** – The Wi-Fi credentials store, a small TOML file that
//!   decides the boot mode.
//! - **`assets`** – The read-only directory of static pages served by both
//!   HTTP surfaces.
//!
//! [`GatewayConfig`]: crate::domain::GatewayConfig

pub mod assets;
pub mod config_file;
pub mod credentials;

pub use assets::{AssetEntry, AssetError, AssetStore};
pub use config_file::{load_config, save_config, ConfigError};
pub use credentials::TomlCredentialStore;
