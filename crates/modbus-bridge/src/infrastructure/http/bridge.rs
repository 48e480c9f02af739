//! The operational HTTP surface.
//!
//! | Route           | Effect                                                    |
//! |-----------------|-----------------------------------------------------------|
//! | `GET /?a=&l=&d=`| One read-holding-registers transaction, reply as text     |
//! | `GET /enable`   | Start the bus driver                                      |
//! | `GET /disable`  | Stop the bus driver                                       |
//! | `GET /reset`    | Erase credentials and restart into provisioning           |
//! | `GET /_files`   | HTML listing of the asset store                           |
//! | anything else   | The 404 page                                              |
//!
//! # Status codes of `GET /`
//!
//! - `400` JSON `{"error": ...}` when `a`, `l` or `d` is missing or invalid.
//! - `500` text when the driver refused the transaction (disabled, bad
//!   descriptor, full queue).
//! - `200`, `502` or `504` text once the transaction completes, taken from
//!   the [`ReplyStatus`](crate::domain::ReplyStatus) the dispatcher chose.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::application::{OperationalSession, RawRequest, RequestTranslator, RestartRequest, TranslateError};
use crate::infrastructure::storage::AssetStore;

use super::responses::{file_listing, json_error, not_found, text};
use super::PendingReply;

/// Shared state of the operational router.
#[derive(Clone)]
pub struct BridgeState {
    pub translator: Arc<RequestTranslator<PendingReply>>,
    pub session: Arc<OperationalSession>,
    pub assets: AssetStore,
    /// Receives the restart request issued by `/reset`.
    pub restart: mpsc::UnboundedSender<RestartRequest>,
}

/// Builds the operational router.
pub fn bridge_router(state: BridgeState) -> Router {
    Router::new()
        .route("/", get(bridge_request))
        .route("/enable", get(enable))
        .route("/disable", get(disable))
        .route("/reset", get(reset))
        .route("/_files", get(list_files))
        .fallback(fallback)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Handlers ──────────────────────────────────────────────────────────────────

async fn bridge_request(
    State(state): State<BridgeState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let request = RawRequest {
        address: params.get("a").map(String::as_str),
        length: params.get("l").map(String::as_str),
        device: params.get("d").map(String::as_str),
    };
    let (reply_tx, reply_rx) = oneshot::channel();

    let token = match state.translator.handle(&request, reply_tx) {
        Ok(token) => token,
        Err(e) if e.is_validation() => {
            debug!(error = %e, "Rejected bridge request");
            return json_error(StatusCode::BAD_REQUEST, &e.to_string());
        }
        Err(TranslateError::Submission(e)) => {
            warn!(error = %e, "Bus driver refused transaction");
            return text(StatusCode::INTERNAL_SERVER_ERROR, e.reply_body());
        }
        Err(e) => return json_error(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    match reply_rx.await {
        Ok(reply) => {
            let status =
                StatusCode::from_u16(reply.status.http_code()).unwrap_or(StatusCode::BAD_GATEWAY);
            text(status, reply.body)
        }
        Err(_) => {
            // The registry was torn down (restart) before the worker replied.
            error!(%token, "Transaction abandoned without a reply");
            text(StatusCode::SERVICE_UNAVAILABLE, "Bridge restarting\n")
        }
    }
}

async fn enable(State(state): State<BridgeState>) -> Response {
    let mode = state.session.enable();
    debug!(%mode, "Enable requested");
    text(StatusCode::OK, "Modbus connection started")
}

async fn disable(State(state): State<BridgeState>) -> Response {
    let mode = state.session.disable();
    debug!(%mode, "Disable requested");
    text(StatusCode::OK, "Modbus connection disabled")
}

async fn reset(State(state): State<BridgeState>) -> Response {
    match state.session.reset() {
        Ok(request) => {
            if state.restart.send(request).is_err() {
                warn!("Supervisor is gone; restart request dropped");
            }
            text(
                StatusCode::OK,
                "Device resetting to default settings and restarting",
            )
        }
        Err(e) => {
            error!(error = %e, "Factory reset failed");
            text(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Reset failed: {e}"),
            )
        }
    }
}

async fn list_files(State(state): State<BridgeState>) -> Response {
    file_listing(&state.assets)
}

async fn fallback(State(state): State<BridgeState>) -> Response {
    not_found(&state.assets).await
}
