//! Bus infrastructure: the Modbus RTU transaction driver.
//!
//! # Sub-modules
//!
//! - **`link`** – [`RegisterLink`], one register read on a physical line,
//!   and [`RtuLink`], its `tokio-modbus` implementation over a serial port.
//!
//! - **`rtu`** – [`RtuBusDriver`], the asynchronous driver the application
//!   submits to.  A single worker task owns the link and performs queued
//!   transactions one at a time, then reports each outcome through the
//!   registered [`ResponseHandler`](crate::application::ResponseHandler).
//!
//! - **`mock`** – [`MockBusDriver`], an in-memory driver for tests that
//!   records submissions and lets the test fire the callbacks.

pub mod link;
pub mod mock;
pub mod rtu;

pub use link::{RegisterLink, RtuLink, SerialSettings};
pub use mock::MockBusDriver;
pub use rtu::RtuBusDriver;
