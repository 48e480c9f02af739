//! Traits the application layer uses to reach the outside world.
//!
//! The infrastructure layer implements each of these; tests substitute
//! in-memory versions.  Keeping them here (rather than next to their
//! implementations) means the translator, dispatcher and state machine never
//! import anything from `infrastructure`.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use modbus_bridge_core::protocol::response::format_submission_error;
use modbus_bridge_core::{BusErrorCode, BusResponse, Token, TransactionDescriptor};

use crate::domain::{BridgeReply, Credentials, NetworkInfo};

// ── Bus driver ────────────────────────────────────────────────────────────────

/// Why the driver refused a transaction at submission time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The driver is stopped (bridge disabled).
    #[error("bus driver is disabled")]
    Disabled,

    /// The descriptor was malformed or the queue could not take it.
    #[error("{0}")]
    Rejected(BusErrorCode),
}

impl SubmitError {
    /// The text/plain body returned to the HTTP caller.
    pub fn reply_body(&self) -> String {
        match self {
            Self::Disabled => "Error creating request: bus driver is disabled\n".to_string(),
            Self::Rejected(code) => format_submission_error(*code),
        }
    }
}

/// Receives the outcome of every accepted transaction.
///
/// The driver invokes exactly one of the two methods per accepted
/// submission, on its own execution context, with the token it was given.
pub trait ResponseHandler: Send + Sync {
    /// The slave answered.
    fn on_data(&self, response: BusResponse, token: Token);
    /// The transaction failed: exception reply, timeout or line error.
    fn on_error(&self, code: BusErrorCode, token: Token);
}

/// A bus transaction driver that performs exchanges asynchronously.
pub trait BusDriver: Send + Sync {
    /// Queues a transaction.  Returns immediately; the outcome arrives later
    /// through the [`ResponseHandler`] registered with the driver.
    ///
    /// # Errors
    ///
    /// [`SubmitError::Disabled`] while stopped, [`SubmitError::Rejected`] for
    /// descriptors the protocol cannot express or a full queue.
    fn submit(&self, token: Token, descriptor: TransactionDescriptor) -> Result<(), SubmitError>;

    /// Starts (or restarts) accepting transactions.
    fn start(&self);

    /// Stops accepting transactions.  Transactions already accepted still
    /// complete and still report through the handler.
    fn stop(&self);

    /// Sets the per-transaction reply timeout.
    fn set_timeout(&self, timeout: Duration);

    /// `true` while the driver accepts submissions.
    fn is_running(&self) -> bool;
}

// ── Caller context ────────────────────────────────────────────────────────────

/// The handle through which a reply reaches the caller that is waiting for
/// it.  Consumed on delivery, so a caller can be answered at most once.
pub trait ReplySink: Send + 'static {
    /// Hands `reply` to the caller.  Returns `false` when the caller is gone.
    fn deliver(self, reply: BridgeReply) -> bool;
}

// ── Credentials store ─────────────────────────────────────────────────────────

/// Failure reading or writing persisted credentials.
#[derive(Debug, Error)]
pub enum CredentialStoreError {
    #[error("I/O error accessing credentials at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse credentials: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize credentials: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Persistent storage of the Wi-Fi credentials.
pub trait CredentialStore: Send + Sync {
    /// Returns the stored credentials, or empty ones if nothing is stored.
    fn load(&self) -> Result<Credentials, CredentialStoreError>;
    /// Replaces the stored credentials.
    fn save(&self, credentials: &Credentials) -> Result<(), CredentialStoreError>;
    /// Erases the stored credentials.  Erasing nothing is not an error.
    fn clear(&self) -> Result<(), CredentialStoreError>;
}

// ── Wi-Fi ─────────────────────────────────────────────────────────────────────

/// Failure of a Wi-Fi backend operation.
#[derive(Debug, Error)]
pub enum WifiError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Platform Wi-Fi control: access point, scanning, joining a network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WifiBackend: Send + Sync {
    /// Starts an open access point with the device at `address/prefix_len`.
    async fn start_access_point(
        &self,
        ssid: &str,
        address: Ipv4Addr,
        prefix_len: u8,
    ) -> Result<(), WifiError>;

    /// Performs one scan and returns every network seen.
    async fn scan(&self) -> Result<Vec<NetworkInfo>, WifiError>;

    /// Joins the network named by `credentials`.
    async fn join(&self, credentials: &Credentials) -> Result<(), WifiError>;
}
