//! Infrastructure layer for the bridge.
//!
//! Contains the I/O-facing adapters: the Modbus RTU bus driver, file-system
//! storage, the captive DNS responder and Wi-Fi backend, the axum HTTP
//! surfaces, and the supervisor that wires them together at boot.
//!
//! **Dependency rule**: this layer may depend on `application`, `domain` and
//! `modbus_bridge_core`, but MUST NOT be imported by the `application` or
//! domain layers.

pub mod bus;
pub mod http;
pub mod network;
pub mod storage;
pub mod supervisor;

pub use supervisor::{run_supervisor, SessionEnd, Supervisor};
