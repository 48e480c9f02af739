//! modbus-bridge library crate.
//!
//! This crate provides an HTTP-to-Modbus RTU bridge plus the captive-portal
//! provisioning mode a device runs before it has network credentials.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! HTTP client  (GET /?a=<address>&l=<length>)
//!         ↕
//! [modbus-bridge]
//!   ├── domain/           Pure types: GatewayConfig, Credentials, BridgeMode, replies
//!   ├── application/      Translator, dispatcher, device state machine, scan cache
//!   └── infrastructure/
//!         ├── bus/        Bus driver (tokio-modbus RTU worker, in-memory mock)
//!         ├── storage/    Config file, credentials store, static assets
//!         ├── network/    Captive DNS responder, Wi-Fi backend
//!         ├── http/       axum routers for both modes
//!         └── supervisor  Boot loop: evaluate credentials, run, restart
//!         ↕
//! Modbus RTU serial line (RS-485)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O, no async, no frameworks.
//! - `application` depends on `domain` and `modbus-bridge-core`, and talks to
//!   the outside world only through the traits it defines.
//! - `infrastructure` implements those traits with `tokio`, `axum` and
//!   `tokio-modbus`.

/// Domain layer: pure business-logic types (no I/O).
pub mod domain;

/// Application layer: request translation, reply dispatch, mode state machine.
pub mod application;

/// Infrastructure layer: bus driver, storage, network services, HTTP.
pub mod infrastructure;
