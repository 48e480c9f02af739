//! # modbus-bridge-core
//!
//! Shared library for the Modbus HTTP bridge containing the correlation token
//! registry, transaction descriptors, the bus error taxonomy, and the text
//! formatting of bus replies.
//!
//! This crate has zero dependencies on sockets, serial ports, or an async
//! runtime.  Everything in it can be exercised from a plain `#[test]`.
//!
//! # Architecture overview (for beginners)
//!
//! The bridge exposes a request/response HTTP interface in front of Modbus
//! RTU, a serial field bus where every exchange is asynchronous: the driver
//! accepts a request now and calls back later with the reply.  The only thing
//! that ties a callback to the HTTP caller waiting for it is an opaque
//! number, the *token*.
//!
//! - **`protocol::token`** – Mints tokens and keeps the token → caller map.
//! - **`protocol::transaction`** – What one bus read looks like (device,
//!   function code, start address, quantity) and the limits it must respect.
//! - **`protocol::error_code`** – One-byte error codes reported by the bus
//!   driver, including the distinguished timeout code `0xE0`.
//! - **`protocol::response`** – The raw RTU reply frame and the text the
//!   HTTP caller receives.

pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `modbus_bridge_core::Token` instead of `modbus_bridge_core::protocol::token::Token`.
pub use protocol::error_code::BusErrorCode;
pub use protocol::response::{
    format_error_reply, format_submission_error, format_success_reply, BusResponse,
};
pub use protocol::token::{Token, TokenRegistry};
pub use protocol::transaction::{DescriptorError, FunctionCode, TransactionDescriptor};
