//! The reply a waiting HTTP caller eventually receives.
//!
//! Replies are produced asynchronously by the response dispatcher and carry
//! their own status so the HTTP layer only has to translate
//! [`ReplyStatus`] into a status code.

/// Outcome class of a bridged transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    /// The slave answered (HTTP 200).
    Ok,
    /// The driver's timeout elapsed (HTTP 504).
    GatewayTimeout,
    /// Any other bus failure (HTTP 502).
    BadGateway,
}

impl ReplyStatus {
    /// The HTTP status code for this outcome.
    pub fn http_code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::GatewayTimeout => 504,
            Self::BadGateway => 502,
        }
    }
}

/// A formatted text/plain reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReply {
    pub status: ReplyStatus,
    pub body: String,
}

impl BridgeReply {
    pub fn new(status: ReplyStatus, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}
