//! The boot loop.
//!
//! The device has no "switch mode" operation: every mode change is a
//! restart.  [`Supervisor::run`] plays the part of the boot sequence:
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────┐
//!   │ mount assets → evaluate_boot(store)                      │
//!   │      ├─ Provisioning → AP + captive DNS + portal router  │
//!   │      └─ Operational  → join Wi-Fi + bus driver + bridge  │
//!   │ serve HTTP until a RestartRequest or shutdown            │
//!   └───────────── RestartRequest: tear everything down ───────┘
//! ```
//!
//! A restart drops every session object (registry, bus driver, DNS
//! responder, routers) and boots again from the stored credentials, so no
//! state leaks from one mode into the next.
//!
//! Failing to start the access point, the DNS responder or the Wi-Fi join
//! is logged and the session carries on degraded.  Failing to bind the HTTP
//! listener is fatal.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use modbus_bridge_core::TokenRegistry;

use crate::application::{
    evaluate_boot, BootDecision, BusDriver, CredentialStore, OperationalSession,
    ProvisioningSession, RequestTranslator, ResponseDispatcher, RestartRequest, ScanCache,
    WifiBackend,
};
use crate::domain::{Credentials, GatewayConfig};
use crate::infrastructure::bus::{RtuBusDriver, RtuLink, SerialSettings};
use crate::infrastructure::http::{
    bridge_router, portal_router, BridgeState, PendingReply, PortalState,
};
use crate::infrastructure::network::{backend_for, start_captive_dns};
use crate::infrastructure::storage::{AssetStore, TomlCredentialStore};

/// How often the shutdown flag is checked while serving.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Boot again.
    Restart(RestartRequest),
    /// The process is shutting down.
    Shutdown,
}

/// Owns the long-lived pieces that survive restarts.
pub struct Supervisor {
    config: GatewayConfig,
    store: Arc<dyn CredentialStore>,
    wifi: Arc<dyn WifiBackend>,
}

impl Supervisor {
    /// Builds the credential store and Wi-Fi backend named in `config`.
    pub fn new(config: GatewayConfig) -> Self {
        let store = Arc::new(TomlCredentialStore::new(&config.storage.credentials_path));
        let wifi = backend_for(
            config.provisioning.wifi_backend,
            &config.provisioning.interface,
        );
        Self::with_backends(config, store, wifi)
    }

    /// Uses the given store and backend instead of the configured ones.
    pub fn with_backends(
        config: GatewayConfig,
        store: Arc<dyn CredentialStore>,
        wifi: Arc<dyn WifiBackend>,
    ) -> Self {
        Self {
            config,
            store,
            wifi,
        }
    }

    /// Boots, serves, and boots again after every restart request, until
    /// `running` is cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP listener cannot be bound or the server
    /// fails.
    pub async fn run(&self, running: Arc<AtomicBool>) -> anyhow::Result<()> {
        let mut boots: u32 = 0;
        while running.load(Ordering::Relaxed) {
            boots += 1;
            let assets = AssetStore::mount_or_degraded(&self.config.storage.assets_dir);

            let decision = evaluate_boot(self.store.as_ref());
            info!(boot = boots, mode = %decision.mode(), "Booting");
            let end = match decision {
                BootDecision::Provisioning => {
                    self.run_provisioning(assets, Arc::clone(&running)).await?
                }
                BootDecision::Operational(credentials) => {
                    self.run_operational(credentials, assets, Arc::clone(&running))
                        .await?
                }
            };

            match end {
                SessionEnd::Restart(request) => {
                    info!(reason = ?request.reason, "Restarting");
                }
                SessionEnd::Shutdown => break,
            }
        }
        info!("Supervisor stopped");
        Ok(())
    }

    async fn run_provisioning(
        &self,
        assets: AssetStore,
        running: Arc<AtomicBool>,
    ) -> anyhow::Result<SessionEnd> {
        let ap = &self.config.provisioning;
        if let Err(e) = self
            .wifi
            .start_access_point(&ap.ap_ssid, ap.ap_address, ap.ap_prefix_len)
            .await
        {
            warn!(error = %e, "Access point failed to start; portal only reachable locally");
        }

        // Dropped at the end of this function, which stops the responder.
        let _dns = match start_captive_dns(ap.dns_port, ap.ap_address) {
            Ok(dns) => Some(dns),
            Err(e) => {
                warn!(error = %e, "Captive DNS unavailable");
                None
            }
        };

        let session = Arc::new(ProvisioningSession::start(
            Arc::clone(&self.store),
            ScanCache::new(Arc::clone(&self.wifi)),
        ));
        let (restart, restart_rx) = mpsc::unbounded_channel();
        let router = portal_router(PortalState {
            session,
            assets,
            provisioning: Arc::new(ap.clone()),
            restart,
        });
        self.serve(router, restart_rx, running).await
    }

    async fn run_operational(
        &self,
        credentials: Credentials,
        assets: AssetStore,
        running: Arc<AtomicBool>,
    ) -> anyhow::Result<SessionEnd> {
        if let Err(e) = self.wifi.join(&credentials).await {
            warn!(error = %e, ssid = %credentials.ssid, "Joining Wi-Fi failed; serving on existing interfaces");
        }

        let bus = &self.config.bus;
        let registry = Arc::new(TokenRegistry::<PendingReply>::new());
        let dispatcher = Arc::new(ResponseDispatcher::new(Arc::clone(&registry)));
        let driver: Arc<dyn BusDriver> = Arc::new(RtuBusDriver::spawn(
            RtuLink::new(SerialSettings::from(bus)),
            dispatcher,
            bus.queue_depth,
        ));
        let session = Arc::new(OperationalSession::start(
            credentials,
            Arc::clone(&driver),
            Arc::clone(&self.store),
            bus.timeout(),
        ));
        let translator = Arc::new(RequestTranslator::new(registry, driver, bus.device_id));

        let (restart, restart_rx) = mpsc::unbounded_channel();
        let router = bridge_router(BridgeState {
            translator,
            session,
            assets,
            restart,
        });
        self.serve(router, restart_rx, running).await
    }

    /// Serves `router` until a restart request arrives or `running` is
    /// cleared, then shuts the server down gracefully.
    async fn serve(
        &self,
        router: Router,
        mut restart_rx: mpsc::UnboundedReceiver<RestartRequest>,
        running: Arc<AtomicBool>,
    ) -> anyhow::Result<SessionEnd> {
        let addr = self.config.http.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))?;
        info!(
            "HTTP server listening on {}",
            listener.local_addr().unwrap_or(addr)
        );

        let (end_tx, end_rx) = oneshot::channel();
        let shutdown = async move {
            let mut poll = tokio::time::interval(SHUTDOWN_POLL);
            let end = loop {
                tokio::select! {
                    Some(request) = restart_rx.recv() => break SessionEnd::Restart(request),
                    _ = poll.tick() => {
                        if !running.load(Ordering::Relaxed) {
                            break SessionEnd::Shutdown;
                        }
                    }
                }
            };
            if end_tx.send(end).is_err() {
                warn!("Session outcome lost");
            }
        };

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

        Ok(end_rx.await.unwrap_or(SessionEnd::Shutdown))
    }
}

/// Runs the supervisor built from `config` until `running` is cleared.
///
/// # Errors
///
/// See [`Supervisor::run`].
pub async fn run_supervisor(config: GatewayConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    Supervisor::new(config).run(running).await
}
