//! Mock bus driver for unit and integration testing.
//!
//! Records every accepted submission and lets the test decide when and how
//! each one completes, without a serial port or a worker task.  The
//! acceptance rules are the real driver's: refused while stopped, refused
//! for descriptors that fail validation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modbus_bridge_core::{BusErrorCode, BusResponse, Token, TransactionDescriptor};

use crate::application::ports::{BusDriver, ResponseHandler, SubmitError};

/// A mock implementation of [`BusDriver`] driven by the test.
pub struct MockBusDriver {
    running: AtomicBool,
    timeout: Mutex<Option<Duration>>,
    submissions: Mutex<Vec<(Token, TransactionDescriptor)>>,
    handler: Mutex<Option<Arc<dyn ResponseHandler>>>,
    reject_with: Mutex<Option<BusErrorCode>>,
}

impl MockBusDriver {
    /// Creates a stopped mock driver with no handler attached.
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            timeout: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
            reject_with: Mutex::new(None),
        }
    }

    /// Sets the handler that [`complete_with_registers`](Self::complete_with_registers)
    /// and [`fail`](Self::fail) report to.
    pub fn attach_handler(&self, handler: Arc<dyn ResponseHandler>) {
        *self.handler.lock().expect("lock poisoned") = Some(handler);
    }

    /// Makes every following submission fail with `code` (or accept again
    /// with `None`).
    pub fn reject_with(&self, code: Option<BusErrorCode>) {
        *self.reject_with.lock().expect("lock poisoned") = code;
    }

    /// Snapshot of the accepted submissions, oldest first.
    pub fn submissions(&self) -> Vec<(Token, TransactionDescriptor)> {
        self.submissions.lock().expect("lock poisoned").clone()
    }

    /// The last value passed to [`BusDriver::set_timeout`].
    pub fn timeout(&self) -> Option<Duration> {
        *self.timeout.lock().expect("lock poisoned")
    }

    /// Waits until at least `count` submissions were accepted and returns
    /// them.  Polls; wrap in `tokio::time::timeout` to bound the wait.
    pub async fn wait_for_submissions(&self, count: usize) -> Vec<(Token, TransactionDescriptor)> {
        loop {
            let seen = self.submissions();
            if seen.len() >= count {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Completes `token` with a reply carrying `registers`, as the slave
    /// addressed at submission would.
    ///
    /// Panics if no handler is attached or `token` was never submitted.
    pub fn complete_with_registers(&self, token: Token, registers: &[u16]) {
        let descriptor = self
            .submissions()
            .into_iter()
            .find(|(t, _)| *t == token)
            .map(|(_, d)| d)
            .expect("token was never submitted");
        let response = BusResponse::from_registers(
            descriptor.device_id,
            descriptor.function.code(),
            registers,
        );
        self.handler().on_data(response, token);
    }

    /// Completes `token` with an error.
    ///
    /// Panics if no handler is attached.
    pub fn fail(&self, token: Token, code: BusErrorCode) {
        self.handler().on_error(code, token);
    }

    fn handler(&self) -> Arc<dyn ResponseHandler> {
        self.handler
            .lock()
            .expect("lock poisoned")
            .clone()
            .expect("attach_handler() must be called first")
    }
}

impl Default for MockBusDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl BusDriver for MockBusDriver {
    fn submit(&self, token: Token, descriptor: TransactionDescriptor) -> Result<(), SubmitError> {
        if !self.is_running() {
            return Err(SubmitError::Disabled);
        }
        descriptor
            .validate()
            .map_err(|e| SubmitError::Rejected(e.into()))?;
        if let Some(code) = *self.reject_with.lock().expect("lock poisoned") {
            return Err(SubmitError::Rejected(code));
        }
        self.submissions
            .lock()
            .expect("lock poisoned")
            .push((token, descriptor));
        Ok(())
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn set_timeout(&self, timeout: Duration) {
        *self.timeout.lock().expect("lock poisoned") = Some(timeout);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder(Mutex<Vec<(Token, Result<Vec<u16>, BusErrorCode>)>>);

    impl ResponseHandler for Recorder {
        fn on_data(&self, response: BusResponse, token: Token) {
            self.0.lock().unwrap().push((token, Ok(response.registers())));
        }
        fn on_error(&self, code: BusErrorCode, token: Token) {
            self.0.lock().unwrap().push((token, Err(code)));
        }
    }

    #[test]
    fn test_mock_driver_starts_stopped() {
        let driver = MockBusDriver::new();
        assert!(!driver.is_running());
        assert_eq!(
            driver.submit(Token(1), TransactionDescriptor::read_holding_registers(1, 1, 1)),
            Err(SubmitError::Disabled)
        );
    }

    #[test]
    fn test_mock_driver_records_and_completes_submissions() {
        // Arrange
        let driver = MockBusDriver::new();
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        driver.attach_handler(recorder.clone());
        driver.start();

        // Act
        driver
            .submit(Token(4), TransactionDescriptor::read_holding_registers(1, 10, 2))
            .expect("accepted");
        driver.complete_with_registers(Token(4), &[0xAAAA, 0x5555]);
        driver.fail(Token(4), BusErrorCode::Timeout);

        // Assert
        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen[0], (Token(4), Ok(vec![0xAAAA, 0x5555])));
        assert_eq!(seen[1], (Token(4), Err(BusErrorCode::Timeout)));
    }

    #[test]
    fn test_mock_driver_reject_with_refuses_submissions() {
        let driver = MockBusDriver::new();
        driver.start();
        driver.reject_with(Some(BusErrorCode::RequestQueueFull));

        let result =
            driver.submit(Token(1), TransactionDescriptor::read_holding_registers(1, 10, 2));

        assert_eq!(
            result,
            Err(SubmitError::Rejected(BusErrorCode::RequestQueueFull))
        );
        assert!(driver.submissions().is_empty());
    }
}
