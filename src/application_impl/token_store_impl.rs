use crate::application_port::{AuthError, TokenRefresher, TokenStore};
use crate::domain_model::*;
use crate::domain_port::CredentialStore;
use crate::logger::*;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, WeakShared};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

pub const ACCESS_TOKEN_KEY: &str = "auth_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

type RefreshOutcome = Result<AccessToken, AuthError>;

// Weak so that dropping every waiter also drops the exchange.
struct InFlightRefresh {
    id: u64,
    future: WeakShared<BoxFuture<'static, RefreshOutcome>>,
}

struct TokenStoreInner {
    storage: Arc<dyn CredentialStore>,
    refresher: Arc<dyn TokenRefresher>,
    // tokio mutex: held across the storage writes so cache and disk agree
    cache: tokio::sync::Mutex<Option<TokenPair>>,
    in_flight: Mutex<Option<InFlightRefresh>>,
    next_refresh_id: AtomicU64,
}

pub struct RealTokenStore {
    inner: Arc<TokenStoreInner>,
}

impl RealTokenStore {
    pub fn new(storage: Arc<dyn CredentialStore>, refresher: Arc<dyn TokenRefresher>) -> Self {
        RealTokenStore {
            inner: Arc::new(TokenStoreInner {
                storage,
                refresher,
                cache: tokio::sync::Mutex::new(None),
                in_flight: Mutex::new(None),
                next_refresh_id: AtomicU64::new(1),
            }),
        }
    }

    #[cfg(test)]
    fn refresh_in_flight(&self) -> bool {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

/// Clears the in-flight slot when the refresh future finishes, panics or is
/// dropped. Runs before the shared output becomes visible to waiters.
struct InFlightGuard {
    inner: Arc<TokenStoreInner>,
    id: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut slot = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|f| f.id == self.id) {
            *slot = None;
        }
    }
}

impl TokenStoreInner {
    async fn load(&self) -> Result<Option<TokenPair>, AuthError> {
        let mut cache = self.cache.lock().await;
        if let Some(pair) = cache.as_ref() {
            return Ok(Some(pair.clone()));
        }

        let access = self.storage.get(ACCESS_TOKEN_KEY).await?;
        let refresh = self.storage.get(REFRESH_TOKEN_KEY).await?;
        match (access, refresh) {
            (Some(access), Some(refresh)) => {
                let pair = TokenPair::new(access, refresh);
                *cache = Some(pair.clone());
                Ok(Some(pair))
            }
            (None, None) => Ok(None),
            _ => {
                warn!("durable storage holds only half of a token pair, ignoring it");
                Ok(None)
            }
        }
    }

    async fn store(&self, pair: TokenPair) -> Result<(), AuthError> {
        let mut cache = self.cache.lock().await;
        self.storage
            .set_many(&[
                (ACCESS_TOKEN_KEY, pair.access_token.as_str()),
                (REFRESH_TOKEN_KEY, pair.refresh_token.as_str()),
            ])
            .await?;
        *cache = Some(pair);
        Ok(())
    }

    async fn wipe(&self) -> Result<(), AuthError> {
        let mut cache = self.cache.lock().await;
        *cache = None;
        let access = self.storage.remove(ACCESS_TOKEN_KEY).await;
        let refresh = self.storage.remove(REFRESH_TOKEN_KEY).await;
        access?;
        refresh?;
        Ok(())
    }

    async fn exchange(&self) -> RefreshOutcome {
        let Some(current) = self.load().await? else {
            warn!("token refresh requested but no refresh token is stored");
            return Err(AuthError::Expired);
        };

        match self.refresher.refresh(&current.refresh_token).await {
            Ok(pair) => {
                let access_token = pair.access_token.clone();
                self.store(pair).await?;
                info!("access token refreshed");
                Ok(access_token)
            }
            Err(e) => {
                warn!(error = %e, "token refresh failed, clearing stored credentials");
                if let Err(e) = self.wipe().await {
                    error!(error = %e, "failed to clear credentials after refresh failure");
                }
                Err(AuthError::Expired)
            }
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for RealTokenStore {
    async fn get(&self) -> Result<Option<TokenPair>, AuthError> {
        self.inner.load().await
    }

    async fn set(&self, pair: TokenPair) -> Result<(), AuthError> {
        self.inner.store(pair).await
    }

    async fn clear(&self) -> Result<(), AuthError> {
        self.inner.wipe().await?;
        debug!("stored credentials cleared");
        Ok(())
    }

    async fn refresh(&self) -> Result<AccessToken, AuthError> {
        let future = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref().and_then(|in_flight| in_flight.future.upgrade()) {
                Some(future) => {
                    debug!("joining in-flight token refresh");
                    future
                }
                None => {
                    let id = self.inner.next_refresh_id.fetch_add(1, Ordering::Relaxed);
                    let inner = self.inner.clone();
                    let future = async move {
                        let _guard = InFlightGuard {
                            inner: inner.clone(),
                            id,
                        };
                        inner.exchange().await
                    }
                    .boxed()
                    .shared();
                    *slot = future
                        .downgrade()
                        .map(|weak| InFlightRefresh { id, future: weak });
                    future
                }
            }
        };
        future.await
    }
}
