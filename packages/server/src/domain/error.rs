//! ドメイン層のエラー定義
//!
//! Each external collaborator has its own error type so callers can decide
//! per concern whether a failure closes the connection, drops a message, or
//! only degrades presence accuracy.

use thiserror::Error;

/// Value object validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueObjectError {
    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("room id is too long (max {max}, got {actual})")]
    RoomIdTooLong { max: usize, actual: usize },

    #[error("room id contains invalid character {0:?}")]
    InvalidRoomIdChar(char),

    #[error("user id must be positive, got {0}")]
    NonPositiveUserId(i64),

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("username is too long (max {max}, got {actual})")]
    UsernameTooLong { max: usize, actual: usize },

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("message is too long (max {max} characters, got {actual})")]
    MessageTooLong { max: usize, actual: usize },
}

/// Credential check failures. The connection is rejected before joining.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("no token was supplied")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token has expired")]
    Expired,

    #[error("unexpected token type {0:?}")]
    WrongTokenType(String),

    #[error("token carries an invalid user id {0}")]
    InvalidUserId(i64),
}

/// Inbound frame errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Frame could not be decoded. Fatal for the connection.
    #[error("malformed frame: {0}")]
    Malformed(String),

    /// Frame decoded but the message body is not acceptable.
    #[error("invalid message content: {0}")]
    InvalidContent(ValueObjectError),
}

/// Message Gateway errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store failure: {0}")]
    Store(String),
}

/// Presence Store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresenceError {
    #[error("presence store unavailable: {0}")]
    Store(String),

    #[error("presence store call timed out")]
    Timeout,
}

/// Broadcast Bus errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("publish failed: {0}")]
    Publish(String),

    #[error("subscribe failed: {0}")]
    Subscribe(String),

    #[error("event codec error: {0}")]
    Codec(String),

    #[error("broadcast bus call timed out")]
    Timeout,
}
