//! Asynchronous bus driver with a single worker task.
//!
//! # How transactions flow (for beginners)
//!
//! ```text
//!  HTTP handler                         worker task (owns the link)
//!  ─────────────                        ───────────────────────────
//!  submit(T, d) ──► bounded queue ──►  recv ─► timeout(link.read(d))
//!   returns at once                          ├─ Ok(resp)  ─► handler.on_data(resp, T)
//!                                            ├─ Err(code) ─► handler.on_error(code, T)
//!                                            └─ elapsed   ─► close port, on_error(Timeout, T)
//! ```
//!
//! The queue is drained by exactly one task, so at most one transaction is
//! ever on the half-duplex line.  `submit` only validates and enqueues; it
//! never touches the serial port, so it is safe to call from any thread.
//!
//! # Stopping
//!
//! [`BusDriver::stop`] clears the running flag (new submissions are refused)
//! and queues a suspend marker behind the transactions already accepted.
//! Those still run and still report; the port is closed when the marker is
//! reached.  [`BusDriver::start`] just sets the flag again: the link reopens
//! the port on the next read.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use modbus_bridge_core::{BusErrorCode, Token, TransactionDescriptor};

use crate::application::ports::{BusDriver, ResponseHandler, SubmitError};
use crate::infrastructure::bus::link::RegisterLink;

/// Reply timeout used until [`BusDriver::set_timeout`] is called.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(2000);

/// Work items for the worker task.
#[derive(Debug)]
enum Command {
    Transact {
        token: Token,
        descriptor: TransactionDescriptor,
    },
    /// Close the port once everything queued before it has run.
    Suspend,
}

/// [`BusDriver`] that performs transactions on a [`RegisterLink`].
///
/// Created stopped; call [`BusDriver::start`] before submitting.
pub struct RtuBusDriver {
    commands: mpsc::Sender<Command>,
    running: Arc<AtomicBool>,
    timeout_ms: Arc<AtomicU64>,
    worker: JoinHandle<()>,
}

impl RtuBusDriver {
    /// Spawns the worker task that owns `link`.
    ///
    /// Every accepted transaction is reported to `handler` exactly once.
    /// `queue_depth` bounds how many transactions may wait behind the one in
    /// flight; further submissions are refused with
    /// [`BusErrorCode::RequestQueueFull`].
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<L>(link: L, handler: Arc<dyn ResponseHandler>, queue_depth: usize) -> Self
    where
        L: RegisterLink + 'static,
    {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let running = Arc::new(AtomicBool::new(false));
        let timeout_ms = Arc::new(AtomicU64::new(DEFAULT_TIMEOUT.as_millis() as u64));

        let worker = tokio::spawn(run_worker(
            link,
            rx,
            handler,
            Arc::clone(&running),
            Arc::clone(&timeout_ms),
        ));

        Self {
            commands: tx,
            running,
            timeout_ms,
            worker,
        }
    }

    /// The currently configured reply timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }
}

impl Drop for RtuBusDriver {
    fn drop(&mut self) {
        // Transactions still queued are lost with the driver.
        self.worker.abort();
    }
}

impl BusDriver for RtuBusDriver {
    fn submit(&self, token: Token, descriptor: TransactionDescriptor) -> Result<(), SubmitError> {
        if !self.is_running() {
            return Err(SubmitError::Disabled);
        }
        descriptor
            .validate()
            .map_err(|e| SubmitError::Rejected(BusErrorCode::from(e)))?;

        match self.commands.try_send(Command::Transact { token, descriptor }) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SubmitError::Rejected(BusErrorCode::RequestQueueFull)),
            Err(TrySendError::Closed(_)) => {
                warn!(%token, "Bus worker has stopped; rejecting transaction");
                Err(SubmitError::Rejected(BusErrorCode::UndefinedError))
            }
        }
    }

    fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            info!("Bus driver started");
        }
    }

    fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!("Bus driver stopped");
            // A full queue is fine: the worker closes the port when it
            // drains the queue while stopped.
            let _ = self.commands.try_send(Command::Suspend);
        }
    }

    fn set_timeout(&self, timeout: Duration) {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.timeout_ms.store(ms, Ordering::Relaxed);
        debug!(timeout_ms = ms, "Bus timeout set");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// The worker loop.  Runs until every sender is dropped.
async fn run_worker<L: RegisterLink>(
    mut link: L,
    mut commands: mpsc::Receiver<Command>,
    handler: Arc<dyn ResponseHandler>,
    running: Arc<AtomicBool>,
    timeout_ms: Arc<AtomicU64>,
) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Transact { token, descriptor } => {
                let timeout = Duration::from_millis(timeout_ms.load(Ordering::Relaxed));
                debug!(%token, ?descriptor, "Transaction on the wire");
                let result =
                    tokio::time::timeout(timeout, link.read_holding_registers(&descriptor)).await;
                match result {
                    Ok(Ok(response)) => handler.on_data(response, token),
                    Ok(Err(code)) => handler.on_error(code, token),
                    Err(_elapsed) => {
                        // A late reply would corrupt the next exchange.
                        link.close();
                        handler.on_error(BusErrorCode::Timeout, token);
                    }
                }
            }
            Command::Suspend => link.close(),
        }

        if !running.load(Ordering::SeqCst) && commands.is_empty() {
            link.close();
        }
    }
    debug!("Bus worker exiting");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use modbus_bridge_core::BusResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// What the scripted link does for one read.
    enum Step {
        Reply(Vec<u16>),
        Fail(BusErrorCode),
        Hang,
    }

    /// Link that plays back a script and counts closes.
    struct ScriptedLink {
        script: Arc<Mutex<VecDeque<Step>>>,
        closes: Arc<AtomicU64>,
    }

    #[async_trait]
    impl RegisterLink for ScriptedLink {
        async fn read_holding_registers(
            &mut self,
            descriptor: &TransactionDescriptor,
        ) -> Result<BusResponse, BusErrorCode> {
            let step = self.script.lock().unwrap().pop_front();
            match step {
                Some(Step::Reply(regs)) => Ok(BusResponse::from_registers(
                    descriptor.device_id,
                    descriptor.function.code(),
                    &regs,
                )),
                Some(Step::Fail(code)) => Err(code),
                Some(Step::Hang) | None => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Err(BusErrorCode::UndefinedError)
                }
            }
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, PartialEq)]
    enum Outcome {
        Data(Token, Vec<u16>),
        Error(Token, BusErrorCode),
    }

    /// Handler that forwards outcomes to a channel.
    struct ChannelHandler(mpsc::UnboundedSender<Outcome>);

    impl ResponseHandler for ChannelHandler {
        fn on_data(&self, response: BusResponse, token: Token) {
            let _ = self.0.send(Outcome::Data(token, response.registers()));
        }
        fn on_error(&self, code: BusErrorCode, token: Token) {
            let _ = self.0.send(Outcome::Error(token, code));
        }
    }

    fn spawn_driver(
        steps: Vec<Step>,
        queue_depth: usize,
    ) -> (RtuBusDriver, mpsc::UnboundedReceiver<Outcome>, Arc<AtomicU64>) {
        let closes = Arc::new(AtomicU64::new(0));
        let link = ScriptedLink {
            script: Arc::new(Mutex::new(steps.into())),
            closes: Arc::clone(&closes),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        let driver = RtuBusDriver::spawn(link, Arc::new(ChannelHandler(tx)), queue_depth);
        (driver, rx, closes)
    }

    fn read(address: u16, quantity: u16) -> TransactionDescriptor {
        TransactionDescriptor::read_holding_registers(1, address, quantity)
    }

    #[tokio::test]
    async fn test_new_driver_is_stopped_and_refuses_submissions() {
        let (driver, _rx, _closes) = spawn_driver(vec![], 4);

        assert!(!driver.is_running());
        assert_eq!(driver.submit(Token(1), read(10, 4)), Err(SubmitError::Disabled));
    }

    #[tokio::test]
    async fn test_reply_is_reported_with_submitted_token() {
        // Arrange
        let (driver, mut rx, _closes) = spawn_driver(vec![Step::Reply(vec![1, 2, 3, 4])], 4);
        driver.start();

        // Act
        driver.submit(Token(7), read(10, 4)).expect("accepted");
        let outcome = rx.recv().await.expect("outcome");

        // Assert
        assert_eq!(outcome, Outcome::Data(Token(7), vec![1, 2, 3, 4]));
    }

    #[tokio::test]
    async fn test_exception_is_reported_as_error() {
        let (driver, mut rx, _closes) =
            spawn_driver(vec![Step::Fail(BusErrorCode::IllegalDataAddress)], 4);
        driver.start();

        driver.submit(Token(3), read(10, 4)).expect("accepted");

        assert_eq!(
            rx.recv().await.expect("outcome"),
            Outcome::Error(Token(3), BusErrorCode::IllegalDataAddress)
        );
    }

    #[tokio::test]
    async fn test_timeout_reports_e0_and_closes_port() {
        // Arrange
        let (driver, mut rx, closes) = spawn_driver(vec![Step::Hang], 4);
        driver.set_timeout(Duration::from_millis(50));
        driver.start();

        // Act
        driver.submit(Token(9), read(10, 4)).expect("accepted");
        let outcome = rx.recv().await.expect("outcome");

        // Assert
        assert_eq!(outcome, Outcome::Error(Token(9), BusErrorCode::Timeout));
        assert!(closes.load(Ordering::SeqCst) >= 1);
        assert_eq!(driver.timeout(), Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_transactions_complete_in_submission_order() {
        let (driver, mut rx, _closes) = spawn_driver(
            vec![Step::Reply(vec![1]), Step::Reply(vec![2]), Step::Reply(vec![3])],
            4,
        );
        driver.start();

        for t in 1..=3 {
            driver.submit(Token(t), read(10, 1)).expect("accepted");
        }

        for t in 1..=3u32 {
            assert_eq!(
                rx.recv().await.expect("outcome"),
                Outcome::Data(Token(t), vec![t as u16])
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_descriptor_is_rejected_synchronously() {
        let (driver, _rx, _closes) = spawn_driver(vec![], 4);
        driver.start();

        assert_eq!(
            driver.submit(Token(1), read(10, 126)),
            Err(SubmitError::Rejected(BusErrorCode::ParameterLimitError))
        );
        assert_eq!(
            driver.submit(
                Token(2),
                TransactionDescriptor::read_holding_registers(0, 10, 4)
            ),
            Err(SubmitError::Rejected(BusErrorCode::InvalidServer))
        );
    }

    #[tokio::test]
    async fn test_full_queue_is_rejected() {
        // Arrange – the first transaction hangs on the wire, the second fills the queue
        let (driver, _rx, _closes) = spawn_driver(vec![Step::Hang, Step::Hang], 1);
        driver.set_timeout(Duration::from_secs(60));
        driver.start();
        driver.submit(Token(1), read(10, 1)).expect("first accepted");
        // Give the worker a chance to take the first one off the queue.
        tokio::task::yield_now().await;
        driver.submit(Token(2), read(10, 1)).expect("second queued");

        // Act
        let result = driver.submit(Token(3), read(10, 1));

        // Assert
        assert_eq!(
            result,
            Err(SubmitError::Rejected(BusErrorCode::RequestQueueFull))
        );
    }

    #[tokio::test]
    async fn test_stop_lets_accepted_transactions_finish() {
        // Arrange
        let (driver, mut rx, closes) = spawn_driver(vec![Step::Reply(vec![5])], 4);
        driver.start();
        driver.submit(Token(1), read(10, 1)).expect("accepted");

        // Act
        driver.stop();

        // Assert – the accepted transaction still reports, new ones are refused
        assert_eq!(
            rx.recv().await.expect("outcome"),
            Outcome::Data(Token(1), vec![5])
        );
        assert_eq!(driver.submit(Token(2), read(10, 1)), Err(SubmitError::Disabled));
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(closes.load(Ordering::SeqCst) >= 1, "port closed after draining");

        driver.start();
        assert!(driver.is_running());
    }
}
