//! Background Wi-Fi scan results for the provisioning UI.
//!
//! A scan takes several seconds, far longer than the provisioning page is
//! willing to wait on `GET /scan`.  The cache therefore answers immediately
//! with whatever it has and keeps a scan running in the background:
//!
//! ```text
//!   Idle ──list──► Running ──scan done──► Complete(results)
//!    ▲   (returns [])   │ (list returns [])        │
//!    │                  │ scan failed              │ list: return results,
//!    └──────────────────┘                          │ start a fresh scan
//!                              Running ◄───────────┘
//! ```
//!
//! Each completed result set is handed out once; the page polls again and
//! picks up the next one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::ports::WifiBackend;
use crate::domain::NetworkInfo;

#[derive(Debug)]
enum ScanState {
    Idle,
    Running,
    Complete(Vec<NetworkInfo>),
}

/// Caches the most recent scan and drives the next one.
#[derive(Clone)]
pub struct ScanCache {
    backend: Arc<dyn WifiBackend>,
    state: Arc<Mutex<ScanState>>,
}

impl ScanCache {
    pub fn new(backend: Arc<dyn WifiBackend>) -> Self {
        Self {
            backend,
            state: Arc::new(Mutex::new(ScanState::Idle)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ScanState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `true` while a background scan is in progress.
    pub fn is_scanning(&self) -> bool {
        matches!(*self.lock(), ScanState::Running)
    }

    /// Starts a background scan unless one is already running.
    ///
    /// Returns the task handle of the new scan, or `None` if one was already
    /// in progress.  Must be called from within a tokio runtime.
    pub fn start_scan(&self) -> Option<JoinHandle<()>> {
        {
            let mut state = self.lock();
            if matches!(*state, ScanState::Running) {
                return None;
            }
            *state = ScanState::Running;
        }

        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        Some(tokio::spawn(async move {
            let outcome = backend.scan().await;
            let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
            match outcome {
                Ok(networks) => {
                    info!(count = networks.len(), "Wi-Fi scan complete");
                    *guard = ScanState::Complete(networks);
                }
                Err(e) => {
                    // Back to idle so the next poll retries.
                    warn!(error = %e, "Wi-Fi scan failed");
                    *guard = ScanState::Idle;
                }
            }
        }))
    }

    /// Returns completed scan results, if any, and keeps scanning.
    ///
    /// - nothing scanned yet: starts a scan and returns an empty list
    /// - scan in progress: returns an empty list
    /// - results available: returns them, clears them and starts a new scan
    pub fn list_networks(&self) -> Vec<NetworkInfo> {
        let taken = {
            let mut state = self.lock();
            match std::mem::replace(&mut *state, ScanState::Idle) {
                ScanState::Complete(networks) => Some(networks),
                ScanState::Running => {
                    *state = ScanState::Running;
                    debug!("Scan in progress; returning no networks yet");
                    return Vec::new();
                }
                ScanState::Idle => None,
            }
        };

        self.start_scan();
        taken.unwrap_or_default()
    }
}
