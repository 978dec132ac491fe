use crate::domain_model::*;
use crate::domain_port::CredentialStoreError;
use chrono::{Duration, Utc};

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AuthError {
    #[error("session expired")]
    Expired,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<CredentialStoreError> for AuthError {
    fn from(e: CredentialStoreError) -> Self {
        AuthError::Store(e.to_string())
    }
}

/// Single owner of the credential pair.
///
/// Reads go through an in-memory cache backed by durable storage. At most
/// one refresh runs at a time; concurrent callers share its outcome.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    async fn get(&self) -> Result<Option<TokenPair>, AuthError>;

    async fn set(&self, pair: TokenPair) -> Result<(), AuthError>;

    async fn clear(&self) -> Result<(), AuthError>;

    /// Exchanges the stored refresh token for a new pair. Any failure
    /// clears the stored credentials and yields [`AuthError::Expired`].
    async fn refresh(&self) -> Result<AccessToken, AuthError>;

    async fn is_authenticated(&self) -> bool {
        match self.get().await {
            Ok(Some(pair)) => !pair.access_token.is_expired_at(Utc::now(), Duration::zero()),
            _ => false,
        }
    }
}

/// Performs the network exchange of a refresh token for a new pair.
#[async_trait::async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthError>;
}
