//! Auth collaborator port.

use async_trait::async_trait;

use super::{error::AuthError, value_object::UserId};

/// Resolves the credential carried on a connection handshake to a user.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Validate `token` and return the user it was issued for.
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError>;
}
