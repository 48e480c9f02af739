//! Raw bus replies and the text bodies the HTTP caller receives.
//!
//! Wire format of a "read holding registers" reply (CRC already stripped):
//! ```text
//! [device_id:1][function_code:1][byte_count:1][register_hi:1][register_lo:1]...
//! ```
//! The success body echoes every one of these bytes as two hex digits, so a
//! four-register reply shows 11 byte groups: three header bytes and eight
//! payload bytes.

use std::fmt::Write as _;

use crate::protocol::error_code::{BusErrorCode, CodeAndDescription};
use crate::protocol::token::Token;

/// A successful reply frame as delivered by the bus driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusResponse {
    frame: Vec<u8>,
}

impl BusResponse {
    /// Wraps an already-assembled reply frame.
    ///
    /// The frame must start with the device id and function code; shorter
    /// frames are accepted but report `0` for the missing header fields.
    pub fn from_frame(frame: Vec<u8>) -> Self {
        Self { frame }
    }

    /// Assembles the reply frame for a register read from decoded values.
    ///
    /// Registers are written big-endian, as they travel on the wire.
    pub fn from_registers(device_id: u8, function_code: u8, registers: &[u16]) -> Self {
        let byte_count = registers.len() * 2;
        let mut frame = Vec::with_capacity(3 + byte_count);
        frame.push(device_id);
        frame.push(function_code);
        // A read is capped at 125 registers, so the byte count fits in a u8.
        frame.push(u8::try_from(byte_count).unwrap_or(u8::MAX));
        for value in registers {
            frame.extend_from_slice(&value.to_be_bytes());
        }
        Self { frame }
    }

    /// The responding device identifier.
    pub fn server_id(&self) -> u8 {
        self.frame.first().copied().unwrap_or(0)
    }

    /// The function code echoed by the device.
    pub fn function_code(&self) -> u8 {
        self.frame.get(1).copied().unwrap_or(0)
    }

    /// Total frame length in bytes.
    pub fn len(&self) -> usize {
        self.frame.len()
    }

    /// `true` for an empty frame.
    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }

    /// The complete frame.
    pub fn as_bytes(&self) -> &[u8] {
        &self.frame
    }

    /// Decodes the register payload back into values.
    ///
    /// Ignores a trailing odd byte.
    pub fn registers(&self) -> Vec<u16> {
        self.frame
            .get(3..)
            .unwrap_or_default()
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }
}

/// Formats the success body for `response`, correlated by `token`.
///
/// ```text
/// Response: serverID=1, FC=3, Token=00000001, length=7:
/// 01 03 04 00 0A 00 0B
/// ```
/// (The hex groups follow the header line directly, each followed by a
/// single space.)
pub fn format_success_reply(response: &BusResponse, token: Token) -> String {
    // Header line plus three characters per byte.
    let mut out = String::with_capacity(64 + 3 * response.len());
    // Writing into a String cannot fail.
    let _ = writeln!(
        out,
        "Response: serverID={}, FC={}, Token={}, length={}:",
        response.server_id(),
        response.function_code(),
        token,
        response.len()
    );
    for byte in response.as_bytes() {
        let _ = write!(out, "{byte:02X} ");
    }
    out
}

/// Formats the error body for a failed transaction: `Error response: E0 - Timeout`.
pub fn format_error_reply(code: BusErrorCode) -> String {
    format!("Error response: {}\n", CodeAndDescription(code))
}

/// Formats the body returned when the driver refuses a submission.
pub fn format_submission_error(code: BusErrorCode) -> String {
    format!("Error creating request: {}\n", CodeAndDescription(code))
}
