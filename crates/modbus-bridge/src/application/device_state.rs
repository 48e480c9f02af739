//! The provisioning / operational state machine.
//!
//! # How the modes map onto types (for beginners)
//!
//! At boot the stored credentials decide which *session* the device runs:
//!
//! ```text
//!                    evaluate_boot(store)
//!                   /                    \
//!     BootDecision::Provisioning    BootDecision::Operational(creds)
//!              │                                  │
//!     ProvisioningSession                OperationalSession
//!       list_networks()                    enable() / disable()
//!       configure(ssid, pw) ──┐            reset() ──┐
//!                             ▼                      ▼
//!                       RestartRequest         RestartRequest
//! ```
//!
//! Each session only has the transitions that are legal in its mode, so
//! "save credentials while operational" or "disable the bridge while
//! provisioning" cannot be written at all.  Transitions that need a restart
//! return a [`RestartRequest`]; the supervisor performs the restart and calls
//! [`evaluate_boot`] again.
//!
//! `Operational` and `OperationalDisabled` are the same session: the mode is
//! read straight from the bus driver's running flag, so the two can never
//! disagree.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::ports::{BusDriver, CredentialStore, CredentialStoreError};
use crate::application::scan_cache::ScanCache;
use crate::domain::{BridgeMode, Credentials, NetworkInfo};

// ── Boot ──────────────────────────────────────────────────────────────────────

/// Which session the device runs after evaluating the stored credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootDecision {
    /// No usable credentials: run the captive portal.
    Provisioning,
    /// Both fields present: run the bridge.
    Operational(Credentials),
}

impl BootDecision {
    /// The mode the device will be in once this boot completes.
    pub fn mode(&self) -> BridgeMode {
        match self {
            Self::Provisioning => BridgeMode::Provisioning,
            Self::Operational(_) => BridgeMode::Operational,
        }
    }
}

/// Decides the boot mode from the credentials store.
///
/// An unreadable store counts as empty, so a corrupted file sends the device
/// to provisioning rather than leaving it unreachable.
pub fn evaluate_boot(store: &dyn CredentialStore) -> BootDecision {
    let credentials = match store.load() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "Cannot read stored credentials; treating as empty");
            Credentials::default()
        }
    };

    if credentials.is_complete() {
        info!(ssid = %credentials.ssid, "Credentials present; booting into operational mode");
        BootDecision::Operational(credentials)
    } else {
        info!("No credentials stored; booting into provisioning mode");
        BootDecision::Provisioning
    }
}

// ── Restart ───────────────────────────────────────────────────────────────────

/// Why a restart was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// New credentials were saved from the provisioning portal.
    CredentialsSaved,
    /// The operator erased the credentials.
    FactoryReset,
}

/// Returned by transitions that end the current session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequest {
    pub reason: RestartReason,
}

impl RestartRequest {
    pub fn new(reason: RestartReason) -> Self {
        Self { reason }
    }
}

// ── Operational ───────────────────────────────────────────────────────────────

/// The bridge session: bus driver running, bridge endpoints exposed.
pub struct OperationalSession {
    credentials: Credentials,
    driver: Arc<dyn BusDriver>,
    store: Arc<dyn CredentialStore>,
}

impl OperationalSession {
    /// Configures the driver's transaction timeout and starts it.
    pub fn start(
        credentials: Credentials,
        driver: Arc<dyn BusDriver>,
        store: Arc<dyn CredentialStore>,
        timeout: Duration,
    ) -> Self {
        driver.set_timeout(timeout);
        driver.start();
        info!(timeout_ms = timeout.as_millis() as u64, "Bridge operational");
        Self {
            credentials,
            driver,
            store,
        }
    }

    /// The credentials this session booted with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// `Operational` while the driver runs, `OperationalDisabled` otherwise.
    pub fn mode(&self) -> BridgeMode {
        if self.driver.is_running() {
            BridgeMode::Operational
        } else {
            BridgeMode::OperationalDisabled
        }
    }

    /// Restarts the bus driver.  Harmless when already enabled.
    pub fn enable(&self) -> BridgeMode {
        self.driver.start();
        info!("Modbus connection started");
        self.mode()
    }

    /// Stops the bus driver.  Accepted transactions still complete.
    pub fn disable(&self) -> BridgeMode {
        self.driver.stop();
        info!("Modbus connection disabled");
        self.mode()
    }

    /// Erases the stored credentials and asks for a restart into
    /// provisioning.
    ///
    /// # Errors
    ///
    /// Returns the store error if the credentials could not be erased; the
    /// session then keeps running.
    pub fn reset(&self) -> Result<RestartRequest, CredentialStoreError> {
        self.store.clear()?;
        info!("Credentials erased; restarting into provisioning mode");
        Ok(RestartRequest::new(RestartReason::FactoryReset))
    }
}

// ── Provisioning ──────────────────────────────────────────────────────────────

/// Why a configuration attempt was refused.
#[derive(Debug, Error)]
pub enum ProvisioningError {
    /// `ssid` or `password` missing or empty.
    #[error("Missing parameters")]
    MissingParameters,

    #[error("failed to store credentials: {0}")]
    Store(#[from] CredentialStoreError),
}

/// The captive-portal session.
pub struct ProvisioningSession {
    store: Arc<dyn CredentialStore>,
    scans: ScanCache,
}

impl ProvisioningSession {
    /// Creates the session and kicks off the first background scan.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(store: Arc<dyn CredentialStore>, scans: ScanCache) -> Self {
        scans.start_scan();
        info!("Provisioning mode active");
        Self { store, scans }
    }

    /// Networks seen by the most recent completed scan (see [`ScanCache`]).
    pub fn list_networks(&self) -> Vec<NetworkInfo> {
        self.scans.list_networks()
    }

    /// Validates and persists new credentials, then asks for a restart.
    ///
    /// # Errors
    ///
    /// [`ProvisioningError::MissingParameters`] if either field is missing or
    /// empty; [`ProvisioningError::Store`] if saving failed.
    pub fn configure(
        &self,
        ssid: Option<&str>,
        password: Option<&str>,
    ) -> Result<RestartRequest, ProvisioningError> {
        let (Some(ssid), Some(password)) = (ssid, password) else {
            return Err(ProvisioningError::MissingParameters);
        };
        let credentials = Credentials::new(ssid, password);
        if !credentials.is_complete() {
            return Err(ProvisioningError::MissingParameters);
        }

        self.store.save(&credentials)?;
        info!(ssid = %credentials.ssid, "Credentials saved; restarting into operational mode");
        Ok(RestartRequest::new(RestartReason::CredentialsSaved))
    }
}
