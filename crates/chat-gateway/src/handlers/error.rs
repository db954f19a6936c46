//! Handler error types

use chat_common::{Classify, ErrorKind};
use thiserror::Error;

use crate::protocol::{CloseCode, OpCode};

/// Handler error type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HandlerError {
    /// Invalid payload received
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// The server sent an op code only clients may send, or one handled elsewhere
    #[error("Unexpected op code: {0}")]
    UnexpectedOpcode(OpCode),
}

impl HandlerError {
    /// Close code to use when dropping the connection over this error
    pub fn to_close_code(&self) -> CloseCode {
        match self {
            Self::InvalidPayload(_) => CloseCode::DecodeError,
            Self::UnexpectedOpcode(_) => CloseCode::UnknownOpcode,
        }
    }
}

impl Classify for HandlerError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Protocol
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;
