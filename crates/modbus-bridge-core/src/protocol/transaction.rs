//! Transaction descriptors: what a single bus read asks for.
//!
//! A [`TransactionDescriptor`] is built by the request translator from the
//! HTTP parameters and handed to the bus driver together with a token.  The
//! driver calls [`TransactionDescriptor::validate`] before queuing it and
//! rejects descriptors the protocol cannot express.

use thiserror::Error;

use crate::protocol::error_code::BusErrorCode;

/// Lowest unicast device identifier on a Modbus serial line.
pub const MIN_DEVICE_ID: u8 = 1;
/// Highest unicast device identifier on a Modbus serial line.
pub const MAX_DEVICE_ID: u8 = 247;
/// Largest quantity a single "read holding registers" request may ask for.
///
/// 125 registers × 2 bytes = 250 data bytes, which together with the frame
/// overhead fills the 256-byte RTU frame.
pub const MAX_READ_REGISTERS: u16 = 125;

/// Modbus function codes the bridge knows how to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FunctionCode {
    /// Read holding registers (0x03).
    ReadHoldingRegisters = 0x03,
}

impl FunctionCode {
    /// Returns the function code byte as sent on the wire.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Reasons a descriptor cannot be expressed on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// The device identifier is outside the unicast range 1–247.
    #[error("device id {0} is outside 1..=247")]
    InvalidDevice(u8),

    /// Address or quantity is zero.
    #[error("address and quantity must be non-zero")]
    Zero,

    /// The quantity exceeds what a single request may read.
    #[error("quantity {quantity} exceeds the limit of {limit}")]
    QuantityTooLarge { quantity: u16, limit: u16 },

    /// `address + quantity` runs past the end of the 16-bit register space.
    #[error("register range {address}+{quantity} exceeds the 16-bit register space")]
    RangeOverflow { address: u16, quantity: u16 },
}

impl From<DescriptorError> for BusErrorCode {
    fn from(e: DescriptorError) -> Self {
        match e {
            DescriptorError::InvalidDevice(_) => BusErrorCode::InvalidServer,
            DescriptorError::Zero
            | DescriptorError::QuantityTooLarge { .. }
            | DescriptorError::RangeOverflow { .. } => BusErrorCode::ParameterLimitError,
        }
    }
}

/// One bus-level read addressed to a device, start register and count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionDescriptor {
    /// Unicast device identifier (1–247).
    pub device_id: u8,
    /// Function code to issue.
    pub function: FunctionCode,
    /// First register to read.
    pub address: u16,
    /// Number of registers to read.
    pub quantity: u16,
}

impl TransactionDescriptor {
    /// Builds a "read holding registers" descriptor.
    pub fn read_holding_registers(device_id: u8, address: u16, quantity: u16) -> Self {
        Self {
            device_id,
            function: FunctionCode::ReadHoldingRegisters,
            address,
            quantity,
        }
    }

    /// Checks the descriptor against the protocol's limits.
    ///
    /// # Errors
    ///
    /// Returns the first [`DescriptorError`] found.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if !(MIN_DEVICE_ID..=MAX_DEVICE_ID).contains(&self.device_id) {
            return Err(DescriptorError::InvalidDevice(self.device_id));
        }
        if self.address == 0 || self.quantity == 0 {
            return Err(DescriptorError::Zero);
        }
        let limit = match self.function {
            FunctionCode::ReadHoldingRegisters => MAX_READ_REGISTERS,
        };
        if self.quantity > limit {
            return Err(DescriptorError::QuantityTooLarge {
                quantity: self.quantity,
                limit,
            });
        }
        // The last register read is address + quantity - 1, which must still
        // fit in a u16.
        if u32::from(self.address) + u32::from(self.quantity) - 1 > u32::from(u16::MAX) {
            return Err(DescriptorError::RangeOverflow {
                address: self.address,
                quantity: self.quantity,
            });
        }
        Ok(())
    }
}
