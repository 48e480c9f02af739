//! The provisioning (captive portal) HTTP surface.
//!
//! | Route          | Effect                                                   |
//! |----------------|----------------------------------------------------------|
//! | `GET /`        | The provisioning page (`index.html`)                     |
//! | `GET /scan`    | JSON array of networks from the last completed scan      |
//! | `POST /config` | Save `ssid` + `password`, then restart                   |
//! | `GET /_files`  | HTML listing of the asset store                          |
//! | anything else  | The matching static asset for `GET`, else the 404 page   |
//!
//! Static files are served by `tower-http` (see [`super::responses`]).
//!
//! # Access point filter (for beginners)
//!
//! Every route sits behind [`ap_filter`], an `axum` middleware that reads
//! the peer address from `ConnectInfo<SocketAddr>`.  Only peers on the
//! access point network get through; everyone else gets the 404 page.  The
//! server must therefore be started with
//! `into_make_service_with_connect_info::<SocketAddr>()` (tests use
//! `MockConnectInfo` instead).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, Form, Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::application::{ProvisioningError, ProvisioningSession, RestartRequest};
use crate::domain::config::ProvisioningConfig;
use crate::domain::NetworkInfo;
use crate::infrastructure::storage::AssetStore;

use super::responses::{
    file_listing, json_error, not_found, page, static_asset, text, INDEX_PAGE,
};

/// Shared state of the provisioning router.
#[derive(Clone)]
pub struct PortalState {
    pub session: Arc<ProvisioningSession>,
    pub assets: AssetStore,
    /// Access point settings, used by the peer filter.
    pub provisioning: Arc<ProvisioningConfig>,
    /// Receives the restart request issued by `/config`.
    pub restart: mpsc::UnboundedSender<RestartRequest>,
}

/// Builds the provisioning router.
pub fn portal_router(state: PortalState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/scan", get(scan))
        .route("/config", post(configure))
        .route("/_files", get(list_files))
        .fallback(static_or_not_found)
        .layer(middleware::from_fn_with_state(state.clone(), ap_filter))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Middleware ────────────────────────────────────────────────────────────────

/// Lets only peers on the access point network reach the portal.
async fn ap_filter(
    State(state): State<PortalState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if state.provisioning.is_on_ap_network(peer.ip()) {
        next.run(request).await
    } else {
        debug!(%peer, path = %request.uri().path(), "Peer outside access point network");
        not_found(&state.assets).await
    }
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn index(State(state): State<PortalState>) -> Response {
    match page(&state.assets, INDEX_PAGE, StatusCode::OK).await {
        Some(response) => response,
        None => not_found(&state.assets).await,
    }
}

async fn scan(State(state): State<PortalState>) -> Json<Vec<NetworkInfo>> {
    Json(state.session.list_networks())
}

async fn configure(
    State(state): State<PortalState>,
    form: Result<Form<HashMap<String, String>>, FormRejection>,
) -> Response {
    // An unreadable body carries no fields at all.
    let params = match form {
        Ok(Form(params)) => params,
        Err(rejection) => {
            debug!(%rejection, "Config form not readable");
            HashMap::new()
        }
    };
    let ssid = params.get("ssid").map(String::as_str);
    let password = params.get("password").map(String::as_str);

    match state.session.configure(ssid, password) {
        Ok(request) => {
            if state.restart.send(request).is_err() {
                warn!("Supervisor is gone; restart request dropped");
            }
            text(StatusCode::OK, "OK")
        }
        Err(ProvisioningError::MissingParameters) => {
            json_error(StatusCode::BAD_REQUEST, "Missing parameters")
        }
        Err(e) => {
            error!(error = %e, "Saving credentials failed");
            text(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn list_files(State(state): State<PortalState>) -> Response {
    file_listing(&state.assets)
}

async fn static_or_not_found(State(state): State<PortalState>, request: Request) -> Response {
    if request.method() == Method::GET {
        if let Some(found) = static_asset(&state.assets, request).await {
            return found;
        }
    }
    not_found(&state.assets).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::Mutex;

    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::header;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::application::ports::{CredentialStore, CredentialStoreError, MockWifiBackend};
    use crate::application::ScanCache;
    use crate::domain::Credentials;

    #[derive(Default)]
    struct MemoryStore(Mutex<Credentials>);

    impl CredentialStore for MemoryStore {
        fn load(&self) -> Result<Credentials, CredentialStoreError> {
            Ok(self.0.lock().unwrap().clone())
        }
        fn save(&self, credentials: &Credentials) -> Result<(), CredentialStoreError> {
            *self.0.lock().unwrap() = credentials.clone();
            Ok(())
        }
        fn clear(&self) -> Result<(), CredentialStoreError> {
            *self.0.lock().unwrap() = Credentials::default();
            Ok(())
        }
    }

    struct Fixture {
        router: Router,
        store: Arc<MemoryStore>,
        restart: mpsc::UnboundedReceiver<RestartRequest>,
    }

    fn fixture(peer: [u8; 4]) -> Fixture {
        let mut wifi = MockWifiBackend::new();
        wifi.expect_scan().returning(|| Ok(Vec::new()));
        let store = Arc::new(MemoryStore::default());
        let session = Arc::new(ProvisioningSession::start(
            store.clone(),
            ScanCache::new(Arc::new(wifi)),
        ));
        let (restart, restart_rx) = mpsc::unbounded_channel();
        let router = portal_router(PortalState {
            session,
            assets: AssetStore::unmounted(),
            provisioning: Arc::new(ProvisioningConfig::default()),
            restart,
        })
        .layer(MockConnectInfo(SocketAddr::from((Ipv4Addr::from(peer), 50000))));
        Fixture {
            router,
            store,
            restart: restart_rx,
        }
    }

    fn form(body: &str) -> Request {
        axum::http::Request::post("/config")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: Router, request: Request) -> (StatusCode, String) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_config_saves_credentials_and_requests_restart() {
        // Arrange
        let mut fx = fixture([192, 168, 4, 20]);

        // Act
        let (status, body) = send(fx.router, form("ssid=home&password=secret1")).await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "OK");
        assert_eq!(fx.store.load().unwrap(), Credentials::new("home", "secret1"));
        assert!(fx.restart.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_config_without_password_is_rejected() {
        let mut fx = fixture([192, 168, 4, 20]);

        let (status, body) = send(fx.router, form("ssid=home")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Missing parameters"}"#);
        assert!(!fx.store.load().unwrap().is_complete());
        assert!(fx.restart.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_config_without_body_is_rejected() {
        // Arrange: no body and no content type at all
        let mut fx = fixture([192, 168, 4, 20]);
        let request = axum::http::Request::post("/config")
            .body(Body::empty())
            .unwrap();

        // Act
        let (status, body) = send(fx.router, request).await;

        // Assert
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Missing parameters"}"#);
        assert!(fx.restart.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_config_with_multipart_body_is_rejected() {
        let mut fx = fixture([192, 168, 4, 20]);
        let request = axum::http::Request::post("/config")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=x")
            .body(Body::from("--x\r\nContent-Disposition: form-data; name=\"ssid\"\r\n\r\nhome\r\n--x--\r\n"))
            .unwrap();

        let (status, body) = send(fx.router, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, r#"{"error":"Missing parameters"}"#);
        assert!(!fx.store.load().unwrap().is_complete());
        assert!(fx.restart.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_scan_returns_json_array() {
        let fx = fixture([192, 168, 4, 20]);
        let request = axum::http::Request::get("/scan")
            .body(Body::empty())
            .unwrap();

        let (status, body) = send(fx.router, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "[]");
    }

    #[tokio::test]
    async fn test_peer_outside_ap_network_gets_404() {
        // Arrange: a peer on some other LAN
        let fx = fixture([10, 0, 0, 7]);

        // Act
        let (status, _) = send(fx.router, form("ssid=home&password=secret1")).await;

        // Assert
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!fx.store.load().unwrap().is_complete());
    }
}
