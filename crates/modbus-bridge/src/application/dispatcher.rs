//! ResponseDispatcher: routes driver callbacks back to the waiting caller.
//!
//! The bus driver knows nothing about HTTP.  It calls
//! [`ResponseHandler::on_data`] or [`ResponseHandler::on_error`] with the
//! token it was given at submission, on its own worker task.  The dispatcher
//! closes over the token registry, so that token is all it needs:
//!
//! ```text
//! resolve(T) ──► None ──────────────────────────────► discard (stale)
//!      │
//!      └──► Some(caller) ──► format ──► deliver ──► release(T)
//! ```
//!
//! `resolve` moves the caller context out of the registry, so a duplicate
//! or late callback for the same token finds nothing and is discarded.  This
//! is how a reply that arrives after a timeout was already reported is
//! dropped without reaching anybody.

use std::sync::Arc;

use tracing::{debug, info, warn};

use modbus_bridge_core::protocol::error_code::CodeAndDescription;
use modbus_bridge_core::{
    format_error_reply, format_success_reply, BusErrorCode, BusResponse, Token, TokenRegistry,
};

use crate::application::ports::{ReplySink, ResponseHandler};
use crate::domain::{BridgeReply, ReplyStatus};

/// Delivers bus outcomes to the callers recorded in the registry.
pub struct ResponseDispatcher<C> {
    registry: Arc<TokenRegistry<C>>,
}

impl<C: ReplySink> ResponseDispatcher<C> {
    pub fn new(registry: Arc<TokenRegistry<C>>) -> Self {
        Self { registry }
    }

    fn deliver(&self, token: Token, reply: BridgeReply) {
        let Some(caller) = self.registry.resolve(token) else {
            debug!(%token, "Discarding reply for unknown token");
            return;
        };
        let status = reply.status;
        if caller.deliver(reply) {
            info!(%token, ?status, "Reply delivered");
        } else {
            warn!(%token, "Caller disconnected before its reply arrived");
        }
        self.registry.release(token);
    }
}

impl<C: ReplySink> ResponseHandler for ResponseDispatcher<C> {
    fn on_data(&self, response: BusResponse, token: Token) {
        // Skip formatting entirely for stale tokens.
        if !self.registry.is_pending(token) {
            debug!(%token, "Discarding data for unknown token");
            return;
        }
        let body = format_success_reply(&response, token);
        self.deliver(token, BridgeReply::new(ReplyStatus::Ok, body));
    }

    fn on_error(&self, code: BusErrorCode, token: Token) {
        let status = if code.is_timeout() {
            ReplyStatus::GatewayTimeout
        } else {
            ReplyStatus::BadGateway
        };
        debug!(%token, error = %CodeAndDescription(code), "Bus transaction failed");
        self.deliver(token, BridgeReply::new(status, format_error_reply(code)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Caller context that records what it was handed.
    struct RecordingSink {
        inbox: Arc<Mutex<Vec<BridgeReply>>>,
        connected: bool,
    }

    impl ReplySink for RecordingSink {
        fn deliver(self, reply: BridgeReply) -> bool {
            if self.connected {
                self.inbox.lock().unwrap().push(reply);
            }
            self.connected
        }
    }

    fn setup() -> (
        ResponseDispatcher<RecordingSink>,
        Arc<TokenRegistry<RecordingSink>>,
        Arc<Mutex<Vec<BridgeReply>>>,
    ) {
        let registry = Arc::new(TokenRegistry::new());
        let dispatcher = ResponseDispatcher::new(Arc::clone(&registry));
        (dispatcher, registry, Arc::new(Mutex::new(Vec::new())))
    }

    fn register(
        registry: &TokenRegistry<RecordingSink>,
        inbox: &Arc<Mutex<Vec<BridgeReply>>>,
    ) -> Token {
        let token = registry.allocate();
        registry.register(
            token,
            RecordingSink {
                inbox: Arc::clone(inbox),
                connected: true,
            },
        );
        token
    }

    #[test]
    fn test_on_data_delivers_success_and_releases_token() {
        // Arrange
        let (dispatcher, registry, inbox) = setup();
        let token = register(&registry, &inbox);
        let response = BusResponse::from_registers(1, 0x03, &[1, 2, 3, 4]);

        // Act
        dispatcher.on_data(response, token);

        // Assert
        let replies = inbox.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, ReplyStatus::Ok);
        assert!(replies[0]
            .body
            .starts_with("Response: serverID=1, FC=3, Token=00000001, length=11:\n"));
        assert!(!registry.is_pending(token));
    }

    #[test]
    fn test_timeout_maps_to_gateway_timeout() {
        // Arrange
        let (dispatcher, registry, inbox) = setup();
        let token = register(&registry, &inbox);

        // Act
        dispatcher.on_error(BusErrorCode::Timeout, token);

        // Assert
        let replies = inbox.lock().unwrap();
        assert_eq!(replies[0].status, ReplyStatus::GatewayTimeout);
        assert_eq!(replies[0].body, "Error response: E0 - Timeout\n");
    }

    #[test]
    fn test_other_errors_map_to_bad_gateway() {
        let (dispatcher, registry, inbox) = setup();
        let codes = [
            BusErrorCode::IllegalDataAddress,
            BusErrorCode::CrcError,
            BusErrorCode::UndefinedError,
        ];
        for code in codes {
            let token = register(&registry, &inbox);
            dispatcher.on_error(code, token);
        }

        let replies = inbox.lock().unwrap();
        assert_eq!(replies.len(), 3);
        assert!(replies.iter().all(|r| r.status == ReplyStatus::BadGateway));
        assert_eq!(replies[0].body, "Error response: 02 - Illegal data address\n");
    }

    #[test]
    fn test_late_data_after_timeout_is_discarded() {
        // Arrange
        let (dispatcher, registry, inbox) = setup();
        let token = register(&registry, &inbox);

        // Act
        dispatcher.on_error(BusErrorCode::Timeout, token);
        dispatcher.on_data(BusResponse::from_registers(1, 0x03, &[7]), token);

        // Assert – exactly one reply, the timeout
        let replies = inbox.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].status, ReplyStatus::GatewayTimeout);
    }

    #[test]
    fn test_duplicate_error_callback_is_a_no_op() {
        let (dispatcher, registry, inbox) = setup();
        let token = register(&registry, &inbox);

        dispatcher.on_error(BusErrorCode::CrcError, token);
        dispatcher.on_error(BusErrorCode::CrcError, token);

        assert_eq!(inbox.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_token_is_ignored() {
        let (dispatcher, registry, inbox) = setup();
        let _pending = register(&registry, &inbox);

        dispatcher.on_data(BusResponse::from_registers(1, 0x03, &[7]), Token(999));
        dispatcher.on_error(BusErrorCode::Timeout, Token(999));

        assert!(inbox.lock().unwrap().is_empty());
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_disconnected_caller_still_releases_token() {
        // Arrange
        let (dispatcher, registry, inbox) = setup();
        let token = registry.allocate();
        registry.register(
            token,
            RecordingSink {
                inbox: Arc::clone(&inbox),
                connected: false,
            },
        );

        // Act
        dispatcher.on_error(BusErrorCode::Timeout, token);

        // Assert
        assert!(inbox.lock().unwrap().is_empty());
        assert_eq!(registry.pending_count(), 0);
    }
}
