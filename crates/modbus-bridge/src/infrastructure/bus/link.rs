//! Physical register reads over a Modbus RTU serial line.
//!
//! # What is Modbus RTU? (for beginners)
//!
//! Modbus RTU is a master/slave protocol on a shared RS-485 pair.  The master
//! (us) sends a request frame addressed to one slave id; only that slave
//! answers.  The line is half-duplex, so the next request may only go out
//! once the previous reply arrived or timed out.
//!
//! `tokio-modbus` does the framing and CRC work.  A read returns a nested
//! result:
//!
//! ```text
//! Result<Result<Vec<u16>, ExceptionCode>, Error>
//!        │       │          │              └─ transport failure (I/O, framing)
//!        │       │          └─ the slave answered with an exception
//!        │       └─ the register values
//! ```
//!
//! [`RtuLink`] maps both failure layers onto [`BusErrorCode`].

use async_trait::async_trait;
use tokio_modbus::client::Context;
use tokio_modbus::prelude::{rtu, Reader, Slave, SlaveContext};
use tokio_serial::{DataBits, Parity, SerialStream, StopBits};
use tracing::{debug, info, warn};

use modbus_bridge_core::{BusErrorCode, BusResponse, TransactionDescriptor};

use crate::domain::config::BusConfig;

/// One register read on a physical line.
///
/// Implementations are owned by the driver's worker task and used strictly
/// sequentially.
#[async_trait]
pub trait RegisterLink: Send {
    /// Performs the read described by `descriptor`.
    ///
    /// # Errors
    ///
    /// The slave's exception code, or [`BusErrorCode::UndefinedError`] for
    /// transport failures.
    async fn read_holding_registers(
        &mut self,
        descriptor: &TransactionDescriptor,
    ) -> Result<BusResponse, BusErrorCode>;

    /// Releases the underlying port.  The next read reopens it.
    fn close(&mut self);
}

/// Serial line parameters.  The frame format is always 8N1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub path: String,
    pub baud_rate: u32,
}

impl From<&BusConfig> for SerialSettings {
    fn from(cfg: &BusConfig) -> Self {
        Self {
            path: cfg.serial_port.clone(),
            baud_rate: cfg.baud_rate,
        }
    }
}

/// [`RegisterLink`] over a serial port, opened on first use.
pub struct RtuLink {
    settings: SerialSettings,
    ctx: Option<Context>,
}

impl RtuLink {
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            settings,
            ctx: None,
        }
    }

    fn open(&self) -> Result<Context, BusErrorCode> {
        let builder = tokio_serial::new(&self.settings.path, self.settings.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One);
        let port = SerialStream::open(&builder).map_err(|e| {
            warn!(port = %self.settings.path, error = %e, "Cannot open serial port");
            BusErrorCode::UndefinedError
        })?;
        info!(
            port = %self.settings.path,
            baud = self.settings.baud_rate,
            "Serial port opened (8N1)"
        );
        Ok(rtu::attach(port))
    }

    fn connection(&mut self) -> Result<&mut Context, BusErrorCode> {
        if self.ctx.is_none() {
            self.ctx = Some(self.open()?);
        }
        self.ctx.as_mut().ok_or(BusErrorCode::UndefinedError)
    }
}

#[async_trait]
impl RegisterLink for RtuLink {
    async fn read_holding_registers(
        &mut self,
        descriptor: &TransactionDescriptor,
    ) -> Result<BusResponse, BusErrorCode> {
        let ctx = self.connection()?;
        ctx.set_slave(Slave(descriptor.device_id));

        let result = ctx
            .read_holding_registers(descriptor.address, descriptor.quantity)
            .await;
        match result {
            Ok(Ok(registers)) => Ok(BusResponse::from_registers(
                descriptor.device_id,
                descriptor.function.code(),
                &registers,
            )),
            Ok(Err(exception)) => {
                debug!(device = descriptor.device_id, ?exception, "Exception reply");
                Err(BusErrorCode::from_exception(u8::from(exception)))
            }
            Err(e) => {
                // The framing state is unknown after a transport error.
                warn!(device = descriptor.device_id, error = %e, "Serial transport error");
                self.ctx = None;
                Err(BusErrorCode::UndefinedError)
            }
        }
    }

    fn close(&mut self) {
        if self.ctx.take().is_some() {
            info!(port = %self.settings.path, "Serial port closed");
        }
    }
}
