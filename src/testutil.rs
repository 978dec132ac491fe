//! Deterministic doubles for the ports. Compiled for tests only.

use crate::application_impl::RealTokenStore;
use crate::application_port::{AuthError, TokenRefresher};
use crate::domain_model::*;
use crate::domain_port::{CredentialStore, CredentialStoreError};
use crate::http::*;
use crate::infra_memory::MemoryCredentialStore;
use crate::realtime::*;
use anyhow::anyhow;
use reqwest::Url;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

// region storage

/// Memory storage whose next write of one armed key fails. Batched writes go
/// through the key-by-key fallback so rollback is exercised.
pub(crate) struct FlakyCredentialStore {
    inner: MemoryCredentialStore,
    fail_next_set: Mutex<Option<String>>,
}

impl FlakyCredentialStore {
    pub fn new() -> Self {
        FlakyCredentialStore {
            inner: MemoryCredentialStore::new(),
            fail_next_set: Mutex::new(None),
        }
    }

    pub fn fail_next_set_of(&self, key: &str) {
        *self.fail_next_set.lock().unwrap() = Some(key.to_owned());
    }
}

#[async_trait::async_trait]
impl CredentialStore for FlakyCredentialStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CredentialStoreError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CredentialStoreError> {
        {
            let mut armed = self.fail_next_set.lock().unwrap();
            if armed.as_deref() == Some(key) {
                *armed = None;
                return Err(CredentialStoreError::Corrupt("disk full".to_owned()));
            }
        }
        self.inner.set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), CredentialStoreError> {
        self.inner.remove(key).await
    }
}

// endregion

// region refresher

/// Replays queued outcomes in order and records every refresh token seen.
/// An empty queue answers with `AuthError::Expired`.
pub(crate) struct CountingRefresher {
    calls: AtomicUsize,
    outcomes: Mutex<VecDeque<Result<TokenPair, AuthError>>>,
    seen: Mutex<Vec<String>>,
    delay: Duration,
}

impl CountingRefresher {
    pub fn new() -> Self {
        CountingRefresher {
            calls: AtomicUsize::new(0),
            outcomes: Mutex::new(VecDeque::new()),
            seen: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn then_ok(self, access: &str, refresh: &str) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .push_back(Ok(TokenPair::new(access, refresh)));
        self
    }

    pub fn then_fail(self, error: AuthError) -> Self {
        self.outcomes.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TokenRefresher for CountingRefresher {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(refresh_token.as_str().to_owned());
        let outcome = self
            .outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(AuthError::Expired));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        outcome
    }
}

// endregion

// region http transport

pub(crate) fn json_response(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("application/json; charset=utf-8".to_owned()),
        body: body.to_string(),
    }
}

pub(crate) fn text_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        content_type: Some("text/plain".to_owned()),
        body: body.to_owned(),
    }
}

/// Client over `transport` with no stored credentials and no retries.
pub(crate) fn scripted_client(transport: &Arc<ScriptedTransport>) -> Arc<ApiClient> {
    let tokens = Arc::new(RealTokenStore::new(
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(CountingRefresher::new()),
    ));
    let config = ApiClientConfig {
        base_url: "https://api.test/v1".to_owned(),
        timeout: Duration::from_secs(30),
        retry_attempts: 0,
        retry_delay: Duration::from_millis(10),
    };
    Arc::new(ApiClient::new(config, transport.clone(), tokens))
}

/// Answers requests from a script and keeps every request it was given.
pub(crate) struct ScriptedTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Duration,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        ScriptedTransport {
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn then(self, response: HttpResponse) -> Self {
        self.script.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn then_err(self, error: TransportError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("script exhausted".to_owned())));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        next
    }
}

// endregion

// region realtime connector

/// Server side of a scripted connection.
pub(crate) struct RemoteEnd {
    pub to_client: mpsc::Sender<ConnMessage>,
    pub from_client: mpsc::Receiver<ConnMessage>,
}

impl RemoteEnd {
    pub async fn push(&self, message: ConnMessage) {
        self.to_client.send(message).await.unwrap();
    }

    pub async fn push_text(&self, text: &str) {
        self.push(ConnMessage::Text(text.to_owned())).await;
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) enum ConnectOutcome {
    Accept,
    Refuse,
}

/// Opens in-memory connections built on mpsc channels. Attempts beyond the
/// script are refused.
pub(crate) struct ScriptedConnector {
    script: Mutex<VecDeque<ConnectOutcome>>,
    remotes: Mutex<VecDeque<RemoteEnd>>,
    attempts: Mutex<Vec<(tokio::time::Instant, String)>>,
    delay: Duration,
}

impl ScriptedConnector {
    pub fn new(script: impl IntoIterator<Item = ConnectOutcome>) -> Self {
        ScriptedConnector {
            script: Mutex::new(script.into_iter().collect()),
            remotes: Mutex::new(VecDeque::new()),
            attempts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub fn attempt_times(&self) -> Vec<tokio::time::Instant> {
        self.attempts.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.attempts.lock().unwrap().iter().map(|(_, u)| u.clone()).collect()
    }

    pub fn take_remote(&self) -> RemoteEnd {
        self.remotes
            .lock()
            .unwrap()
            .pop_front()
            .expect("no accepted connection to take")
    }
}

#[async_trait::async_trait]
impl RealtimeConnector for ScriptedConnector {
    async fn connect(&self, url: &Url) -> anyhow::Result<Connection> {
        self.attempts
            .lock()
            .unwrap()
            .push((tokio::time::Instant::now(), url.to_string()));
        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ConnectOutcome::Refuse);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match outcome {
            ConnectOutcome::Refuse => Err(anyhow!("connection refused")),
            ConnectOutcome::Accept => {
                let (to_client, client_rx) = mpsc::channel(64);
                let (client_tx, from_client) = mpsc::channel(64);
                self.remotes.lock().unwrap().push_back(RemoteEnd {
                    to_client,
                    from_client,
                });
                Ok(Connection {
                    sender: Box::new(client_tx),
                    receiver: Box::new(client_rx),
                })
            }
        }
    }
}

// endregion
