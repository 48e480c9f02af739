//! RequestTranslator: turns one inbound query into one bus transaction.
//!
//! # Order of operations
//!
//! ```text
//! parse a/l/d ──► driver running? ──► allocate ──► register ──► submit
//!      │                │                                         │
//!      ▼                ▼                                         ▼
//!     400              500                          500 + release on reject
//! ```
//!
//! Registration happens *before* submission.  The driver may complete the
//! transaction on its worker task before `submit` even returns, and the
//! dispatcher must find the caller in the registry when that happens.  A
//! rejected submission takes the entry straight back out again, so a failed
//! request never leaves a token behind.
//!
//! The translator never waits for the reply.  Once the transaction is
//! accepted the caller context belongs to the registry, and the dispatcher
//! delivers the answer later.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use modbus_bridge_core::protocol::transaction::{MAX_DEVICE_ID, MIN_DEVICE_ID};
use modbus_bridge_core::{Token, TokenRegistry, TransactionDescriptor};

use crate::application::ports::{BusDriver, SubmitError};

/// The query parameters of an inbound bridge request, still unparsed.
///
/// `None` means the parameter was absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawRequest<'a> {
    /// `a`: first register to read.
    pub address: Option<&'a str>,
    /// `l`: number of registers.
    pub length: Option<&'a str>,
    /// `d`: device identifier; falls back to the configured default.
    pub device: Option<&'a str>,
}

/// Why a request did not reach the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// `a` or `l` missing, non-numeric, zero or outside the 16-bit range.
    #[error("Invalid address or length")]
    InvalidParameters,

    /// `d` present but not a unicast device identifier.
    #[error("Invalid device id")]
    InvalidDevice,

    /// The driver refused the transaction (or is disabled).
    #[error("submission rejected: {0}")]
    Submission(SubmitError),
}

impl TranslateError {
    /// `true` for the synchronous parameter failures answered with 400.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidParameters | Self::InvalidDevice)
    }
}

/// Validates requests and hands them to the bus driver.
///
/// `C` is the caller context stored in the registry until the dispatcher
/// takes it out.
pub struct RequestTranslator<C> {
    registry: Arc<TokenRegistry<C>>,
    driver: Arc<dyn BusDriver>,
    default_device: u8,
}

impl<C> RequestTranslator<C> {
    pub fn new(registry: Arc<TokenRegistry<C>>, driver: Arc<dyn BusDriver>, default_device: u8) -> Self {
        Self {
            registry,
            driver,
            default_device,
        }
    }

    /// Submits the read described by `request` on behalf of `caller`.
    ///
    /// On success the returned token identifies the pending transaction and
    /// `caller` is owned by the registry.  On failure `caller` has been
    /// dropped and nothing is registered.
    ///
    /// # Errors
    ///
    /// [`TranslateError::InvalidParameters`] / [`TranslateError::InvalidDevice`]
    /// before any token exists; [`TranslateError::Submission`] when the driver
    /// is stopped or refuses the descriptor.
    pub fn handle(&self, request: &RawRequest<'_>, caller: C) -> Result<Token, TranslateError> {
        let (Some(address), Some(quantity)) = (
            parse_register_param(request.address),
            parse_register_param(request.length),
        ) else {
            debug!(?request, "Rejecting request: invalid address or length");
            return Err(TranslateError::InvalidParameters);
        };

        let device_id = match request.device {
            None => self.default_device,
            Some(raw) => parse_device_param(raw).ok_or(TranslateError::InvalidDevice)?,
        };

        // A disabled bridge fails fast without consuming a token.
        if !self.driver.is_running() {
            debug!("Rejecting request: bus driver is disabled");
            return Err(TranslateError::Submission(SubmitError::Disabled));
        }

        let descriptor = TransactionDescriptor::read_holding_registers(device_id, address, quantity);
        let token = self.registry.allocate();
        self.registry.register(token, caller);

        match self.driver.submit(token, descriptor) {
            Ok(()) => {
                debug!(%token, device_id, address, quantity, "Transaction submitted");
                Ok(token)
            }
            Err(e) => {
                self.registry.release(token);
                warn!(%token, error = %e, "Bus driver rejected transaction");
                Err(TranslateError::Submission(e))
            }
        }
    }
}

/// Parses `a` or `l`: an integer in `1..=65535`.
fn parse_register_param(raw: Option<&str>) -> Option<u16> {
    raw?.trim().parse::<u16>().ok().filter(|v| *v != 0)
}

/// Parses `d`: a unicast device identifier.
fn parse_device_param(raw: &str) -> Option<u8> {
    raw.trim()
        .parse::<u8>()
        .ok()
        .filter(|id| (MIN_DEVICE_ID..=MAX_DEVICE_ID).contains(id))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
