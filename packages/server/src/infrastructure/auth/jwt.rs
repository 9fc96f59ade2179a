//! JWT access-token authenticator (HS256).

use async_trait::async_trait;
use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};

use crate::domain::{AuthError, Authenticator, UserId};

/// Only tokens of this type may open a connection.
pub const ACCESS_TOKEN_TYPE: &str = "access";

/// Claims carried by an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    pub user_id: i64,
    pub token_type: String,
    pub exp: i64,
    pub iat: i64,
}

pub struct JwtAuthenticator {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Mint an access token for `user_id` valid for `ttl`.
    pub fn issue(&self, user_id: UserId, ttl: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        self.sign(&AccessClaims {
            user_id: user_id.value(),
            token_type: ACCESS_TOKEN_TYPE.to_string(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        })
    }

    fn sign(&self, claims: &AccessClaims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl Authenticator for JwtAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<UserId, AuthError> {
        let claims = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::InvalidToken(e.to_string()),
            })?
            .claims;

        if claims.token_type != ACCESS_TOKEN_TYPE {
            return Err(AuthError::WrongTokenType(claims.token_type));
        }

        UserId::new(claims.user_id).map_err(|_| AuthError::InvalidUserId(claims.user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    fn claims(user_id: i64, token_type: &str, exp_offset: Duration) -> AccessClaims {
        let now = Utc::now();
        AccessClaims {
            user_id,
            token_type: token_type.to_string(),
            exp: (now + exp_offset).timestamp(),
            iat: now.timestamp(),
        }
    }

    #[tokio::test]
    async fn test_issued_token_authenticates() {
        // テスト項目: 発行したアクセストークンで認証できる
        // given (前提条件):
        let authenticator = JwtAuthenticator::new(SECRET);
        let token = authenticator
            .issue(UserId::new(7).unwrap(), Duration::minutes(60))
            .unwrap();

        // when (操作):
        let result = authenticator.authenticate(&token).await;

        // then (期待する結果):
        assert_eq!(result, Ok(UserId::new(7).unwrap()));
    }

    #[tokio::test]
    async fn test_token_signed_with_other_secret_is_rejected() {
        // テスト項目: 別の秘密鍵で署名されたトークンは拒否される
        // given (前提条件):
        let issuer = JwtAuthenticator::new("another-secret");
        let token = issuer
            .issue(UserId::new(7).unwrap(), Duration::minutes(60))
            .unwrap();
        let authenticator = JwtAuthenticator::new(SECRET);

        // when (操作):
        let result = authenticator.authenticate(&token).await;

        // then (期待する結果):
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_expired_token_is_rejected() {
        // テスト項目: 有効期限切れのトークンは Expired エラーになる
        // given (前提条件):
        let authenticator = JwtAuthenticator::new(SECRET);
        let token = authenticator
            .sign(&claims(7, ACCESS_TOKEN_TYPE, Duration::hours(-2)))
            .unwrap();

        // when (操作):
        let result = authenticator.authenticate(&token).await;

        // then (期待する結果):
        assert_eq!(result, Err(AuthError::Expired));
    }

    #[tokio::test]
    async fn test_refresh_token_is_rejected() {
        // テスト項目: access 以外のトークン種別は拒否される
        // given (前提条件):
        let authenticator = JwtAuthenticator::new(SECRET);
        let token = authenticator
            .sign(&claims(7, "refresh", Duration::minutes(60)))
            .unwrap();

        // when (操作):
        let result = authenticator.authenticate(&token).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(AuthError::WrongTokenType("refresh".to_string()))
        );
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        // テスト項目: JWT 形式でない文字列は拒否される
        // given (前提条件):
        let authenticator = JwtAuthenticator::new(SECRET);

        // when (操作):
        let result = authenticator.authenticate("invalidtoken").await;

        // then (期待する結果):
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[tokio::test]
    async fn test_non_positive_user_id_is_rejected() {
        // テスト項目: user_id が 0 以下のトークンは拒否される
        // given (前提条件):
        let authenticator = JwtAuthenticator::new(SECRET);
        let token = authenticator
            .sign(&claims(0, ACCESS_TOKEN_TYPE, Duration::minutes(60)))
            .unwrap();

        // when (操作):
        let result = authenticator.authenticate(&token).await;

        // then (期待する結果):
        assert_eq!(result, Err(AuthError::InvalidUserId(0)));
    }
}
