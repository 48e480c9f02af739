//! HTTP surfaces, built on `axum`.
//!
//! # Sub-modules
//!
//! - **`bridge`** – The operational router: `GET /?a=&l=` bridged requests
//!   plus the `/enable`, `/disable` and `/reset` control endpoints.
//!
//! - **`portal`** – The provisioning router: the captive-portal page, the
//!   `/scan` network list and the `/config` credentials form.
//!
//! - **`responses`** – Response builders both routers share: text bodies,
//!   static assets, the 404 page and the `/_files` listing.
//!
//! # How a bridged request waits for its reply (for beginners)
//!
//! The handler for `GET /` creates a `tokio::sync::oneshot` channel and hands
//! the *sender* to the request translator as the caller context.  The
//! translator stores it in the token registry under the transaction's token
//! and returns immediately.  The handler then `.await`s the *receiver*.
//!
//! When the bus worker finishes, the response dispatcher resolves the token,
//! gets the sender back and calls [`ReplySink::deliver`] on it, which
//! completes the handler's `.await`.  If the HTTP client hung up first, axum
//! has already dropped the handler future together with the receiver, so
//! `deliver` simply returns `false`.

pub mod bridge;
pub mod portal;
pub mod responses;

pub use bridge::{bridge_router, BridgeState};
pub use portal::{portal_router, PortalState};

use tokio::sync::oneshot;

use crate::application::ports::ReplySink;
use crate::domain::BridgeReply;

/// The caller context stored in the token registry for each HTTP request.
pub type PendingReply = oneshot::Sender<BridgeReply>;

impl ReplySink for oneshot::Sender<BridgeReply> {
    fn deliver(self, reply: BridgeReply) -> bool {
        self.send(reply).is_ok()
    }
}
