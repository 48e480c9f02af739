//! One-byte error codes reported by the bus driver.
//!
//! Codes `0x01`–`0x0B` are the exception codes a Modbus slave can return in
//! an exception reply.  Codes from `0xE0` upwards are raised locally by the
//! driver (timeouts, frame errors, parameter checks).  The HTTP reply shows
//! the code as two hex digits followed by [`BusErrorCode::description`].

use std::fmt;

use thiserror::Error;

/// Error code attached to a failed or rejected bus transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u8)]
pub enum BusErrorCode {
    // ── Exception codes returned by the slave ─────────────────────────────────
    #[error("Illegal function code")]
    IllegalFunction = 0x01,
    #[error("Illegal data address")]
    IllegalDataAddress = 0x02,
    #[error("Illegal data value")]
    IllegalDataValue = 0x03,
    #[error("Server device failure")]
    ServerDeviceFailure = 0x04,
    #[error("Acknowledge")]
    Acknowledge = 0x05,
    #[error("Server device busy")]
    ServerDeviceBusy = 0x06,
    #[error("Negative acknowledge")]
    NegativeAcknowledge = 0x07,
    #[error("Memory parity error")]
    MemoryParityError = 0x08,
    #[error("Gateway path unavailable")]
    GatewayPathUnavailable = 0x0A,
    #[error("Gateway target no response")]
    GatewayTargetNoResponse = 0x0B,

    // ── Errors raised by the driver itself ────────────────────────────────────
    /// No reply arrived within the driver's transaction timeout.
    #[error("Timeout")]
    Timeout = 0xE0,
    #[error("Invalid server")]
    InvalidServer = 0xE1,
    #[error("CRC check error")]
    CrcError = 0xE2,
    #[error("Function code mismatch")]
    FunctionCodeMismatch = 0xE3,
    #[error("Server ID mismatch")]
    ServerIdMismatch = 0xE4,
    #[error("Packet length error")]
    PacketLengthError = 0xE5,
    #[error("Wrong # of parameters")]
    ParameterCountError = 0xE6,
    #[error("Parameter out of bounds")]
    ParameterLimitError = 0xE7,
    #[error("Request queue full")]
    RequestQueueFull = 0xE8,
    #[error("Incomplete request")]
    EmptyMessage = 0xEC,
    #[error("Unspecified error")]
    UndefinedError = 0xFF,
}

impl BusErrorCode {
    /// Returns the raw one-byte code.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Returns the human-readable description shown in reply bodies.
    pub fn description(self) -> String {
        self.to_string()
    }

    /// `true` for the distinguished "request timed out" code.
    ///
    /// The dispatcher answers a timeout with a gateway-timeout status and
    /// every other code with bad-gateway.
    pub fn is_timeout(self) -> bool {
        self == BusErrorCode::Timeout
    }

    /// Maps a slave exception code byte to its enum value.
    ///
    /// Unknown exception bytes map to [`BusErrorCode::UndefinedError`].
    pub fn from_exception(code: u8) -> Self {
        match code {
            0x01 => Self::IllegalFunction,
            0x02 => Self::IllegalDataAddress,
            0x03 => Self::IllegalDataValue,
            0x04 => Self::ServerDeviceFailure,
            0x05 => Self::Acknowledge,
            0x06 => Self::ServerDeviceBusy,
            0x07 => Self::NegativeAcknowledge,
            0x08 => Self::MemoryParityError,
            0x0A => Self::GatewayPathUnavailable,
            0x0B => Self::GatewayTargetNoResponse,
            _ => Self::UndefinedError,
        }
    }
}

/// Renders a code the way reply bodies and logs show it: `E0 - Timeout`.
pub struct CodeAndDescription(pub BusErrorCode);

impl fmt::Display for CodeAndDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} - {}", self.0.code(), self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_code_is_e0() {
        assert_eq!(BusErrorCode::Timeout.code(), 0xE0);
        assert!(BusErrorCode::Timeout.is_timeout());
    }

    #[test]
    fn test_only_timeout_is_timeout() {
        let others = [
            BusErrorCode::IllegalDataAddress,
            BusErrorCode::CrcError,
            BusErrorCode::RequestQueueFull,
            BusErrorCode::UndefinedError,
        ];
        for code in others {
            assert!(!code.is_timeout(), "{code:?} must not count as a timeout");
        }
    }

    #[test]
    fn test_from_exception_maps_known_codes() {
        assert_eq!(
            BusErrorCode::from_exception(0x02),
            BusErrorCode::IllegalDataAddress
        );
        assert_eq!(
            BusErrorCode::from_exception(0x0B),
            BusErrorCode::GatewayTargetNoResponse
        );
    }

    #[test]
    fn test_from_exception_unknown_maps_to_undefined() {
        assert_eq!(BusErrorCode::from_exception(0x09), BusErrorCode::UndefinedError);
        assert_eq!(BusErrorCode::from_exception(0x7F), BusErrorCode::UndefinedError);
    }

    #[test]
    fn test_code_and_description_format() {
        let rendered = CodeAndDescription(BusErrorCode::Timeout).to_string();
        assert_eq!(rendered, "E0 - Timeout");
    }

    #[test]
    fn test_code_and_description_pads_single_digit_codes() {
        let rendered = CodeAndDescription(BusErrorCode::IllegalFunction).to_string();
        assert_eq!(rendered, "01 - Illegal function code");
    }
}
