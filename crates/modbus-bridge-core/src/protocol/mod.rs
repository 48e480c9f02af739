//! Protocol module containing tokens, transactions, error codes and replies.

pub mod error_code;
pub mod response;
pub mod token;
pub mod transaction;

pub use error_code::BusErrorCode;
pub use response::BusResponse;
pub use token::{Token, TokenRegistry};
pub use transaction::{FunctionCode, TransactionDescriptor};
