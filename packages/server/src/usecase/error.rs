//! UseCase 層のエラー定義

use thiserror::Error;

use crate::domain::{AuthError, GatewayError, ProtocolError};

use super::room_session::SessionState;

/// Errors surfaced by a [`RoomSession`](super::RoomSession) operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("operation is not valid in the {state} state")]
    InvalidState { state: SessionState },
}

impl SessionError {
    /// Whether the connection has to be closed.
    ///
    /// Unknown users/rooms, store write failures and unacceptable message
    /// bodies only drop the offending message.
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Auth(_) => true,
            SessionError::Protocol(ProtocolError::Malformed(_)) => true,
            SessionError::Protocol(ProtocolError::InvalidContent(_)) => false,
            SessionError::Gateway(_) => false,
            SessionError::InvalidState { .. } => true,
        }
    }
}
