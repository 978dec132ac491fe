use crate::application_port::TokenStore;
use crate::domain_model::*;
use crate::logger::*;
use crate::realtime::*;
use crate::settings;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    pub url: String,
    pub token_param: String,
    pub connect_timeout: Duration,
    pub backoff: Backoff,
}

impl From<&settings::Realtime> for RealtimeConfig {
    fn from(realtime: &settings::Realtime) -> Self {
        RealtimeConfig {
            url: realtime.url.clone(),
            token_param: realtime.token_param.clone(),
            connect_timeout: Duration::from_millis(realtime.connect_timeout_ms),
            backoff: Backoff {
                base_delay: Duration::from_millis(realtime.base_delay_ms),
                growth_factor: realtime.growth_factor,
                max_delay: Duration::from_millis(realtime.max_delay_ms),
                max_attempts: realtime.max_reconnect_attempts,
            },
        }
    }
}

type SharedConnect = Shared<BoxFuture<'static, bool>>;

struct PendingConnect {
    id: u64,
    future: SharedConnect,
}

#[derive(Default)]
struct SessionState {
    /// Bumped by `disconnect()`. Work started under an older epoch is void.
    epoch: u64,
    attempts: u32,
    current: Option<u64>,
    next_session_id: u64,
    outbound: Option<mpsc::UnboundedSender<ConnMessage>>,
    writer: Option<JoinHandle<()>>,
    reader_cancel: Option<CancellationToken>,
    reconnect_timer: Option<CancellationToken>,
}

struct ClientInner {
    config: RealtimeConfig,
    connector: Arc<dyn RealtimeConnector>,
    tokens: Arc<dyn TokenStore>,
    registry: Arc<ListenerRegistry>,
    session: Mutex<SessionState>,
    state: watch::Sender<ConnectionState>,
    pending_connect: Mutex<Option<PendingConnect>>,
    next_connect_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Realtime session with the backend.
///
/// Keeps at most one transport open, reconnects with capped exponential
/// backoff after abnormal closes, and fans inbound events out to listeners
/// registered per [`EventKind`]. Cloning yields another handle to the same
/// session. Background tasks end on [`disconnect`](Self::disconnect).
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

struct PendingConnectGuard {
    inner: Arc<ClientInner>,
    id: u64,
}

impl Drop for PendingConnectGuard {
    fn drop(&mut self) {
        let mut pending = lock(&self.inner.pending_connect);
        if pending.as_ref().is_some_and(|p| p.id == self.id) {
            *pending = None;
        }
    }
}

impl RealtimeClient {
    pub fn new(
        config: RealtimeConfig,
        connector: Arc<dyn RealtimeConnector>,
        tokens: Arc<dyn TokenStore>,
    ) -> RealtimeClient {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        RealtimeClient {
            inner: Arc::new(ClientInner {
                config,
                connector,
                tokens,
                registry: Arc::new(ListenerRegistry::new()),
                session: Mutex::new(SessionState::default()),
                state,
                pending_connect: Mutex::new(None),
                next_connect_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn reconnect_attempts(&self) -> u32 {
        lock(&self.inner.session).attempts
    }

    /// Opens the session if it is not open yet. Concurrent calls share one
    /// attempt. Returns whether the session is open when the attempt ends.
    pub async fn connect(&self) -> bool {
        if self.state() == ConnectionState::Connected {
            return true;
        }

        let future = {
            let mut pending = lock(&self.inner.pending_connect);
            match pending.as_ref() {
                Some(p) => p.future.clone(),
                None => {
                    let id = self.inner.next_connect_id.fetch_add(1, Ordering::Relaxed);
                    let inner = self.inner.clone();
                    let task = tokio::spawn(async move {
                        let _guard = PendingConnectGuard {
                            inner: inner.clone(),
                            id,
                        };
                        inner.open_session().await
                    });
                    let future = async move { task.await.unwrap_or(false) }
                        .boxed()
                        .shared();
                    *pending = Some(PendingConnect {
                        id,
                        future: future.clone(),
                    });
                    future
                }
            }
        };
        future.await
    }

    pub fn disconnect(&self) {
        let was_open = {
            let mut session = lock(&self.inner.session);
            session.epoch += 1;
            session.attempts = 0;
            if let Some(timer) = session.reconnect_timer.take() {
                timer.cancel();
            }
            if let Some(reader) = session.reader_cancel.take() {
                reader.cancel();
            }
            if let Some(outbound) = session.outbound.take() {
                let _ = outbound.send(ConnMessage::Close(Some(NORMAL_CLOSURE)));
            }
            self.inner
                .state
                .send_replace(ConnectionState::Disconnected);
            session.current.take().is_some()
        };
        lock(&self.inner.pending_connect).take();

        if was_open {
            info!("realtime session closed by client");
            self.inner.emit_status(LinkStatus::Disconnected);
        }
    }

    /// Disconnects, then waits until the writer has handed the close frame to
    /// the transport.
    pub async fn shutdown(&self) {
        let writer = lock(&self.inner.session).writer.take();
        self.disconnect();
        if let Some(writer) = writer {
            if let Err(e) = writer.await {
                warn!(error = %e, "realtime writer ended abnormally");
            }
        }
    }

    /// Queues `{type, data}` on the open session. Returns false, without
    /// queueing, when no session is open.
    pub fn send(&self, kind: EventKind, data: impl Serialize) -> bool {
        let frame = match serde_json::to_value(data).and_then(|data| {
            serde_json::to_string(&RealtimeEvent { kind, data })
        }) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(kind = %kind, error = %e, "realtime payload is not serializable");
                return false;
            }
        };

        let session = lock(&self.inner.session);
        let connected = *self.inner.state.borrow() == ConnectionState::Connected;
        let queued = connected
            && session
                .outbound
                .as_ref()
                .is_some_and(|outbound| outbound.send(ConnMessage::Text(frame)).is_ok());
        if !queued {
            warn!(kind = %kind, error = %RealtimeError::ConnectionUnavailable, "realtime message dropped");
        }
        queued
    }

    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_shared(kind, Arc::new(listener))
    }

    pub fn on_shared(&self, kind: EventKind, listener: Arc<Listener>) -> Subscription {
        let id = self.inner.registry.add(kind, listener);
        Subscription::new(&self.inner.registry, kind, id)
    }

    /// Like [`on`](Self::on) but decodes `data` first. Payloads that do not
    /// decode into `T` are logged and skipped.
    pub fn on_typed<T, F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on(kind, move |data| match T::deserialize(data) {
            Ok(payload) => listener(payload),
            Err(e) => warn!(kind = %kind, error = %e, "realtime payload has unexpected shape"),
        })
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.registry.count(kind)
    }
}

impl ClientInner {
    fn pending_connect(&self) -> Option<SharedConnect> {
        lock(&self.pending_connect)
            .as_ref()
            .map(|p| p.future.clone())
    }

    /// Moves to `state` unless `disconnect()` ran since `epoch` was read.
    fn settle(&self, epoch: u64, state: ConnectionState) -> bool {
        let session = lock(&self.session);
        if session.epoch != epoch {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    fn endpoint(&self, token: &AccessToken) -> Result<Url, RealtimeError> {
        let mut url =
            Url::parse(&self.config.url).map_err(|e| RealtimeError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair(&self.config.token_param, token.as_str());
        Ok(url)
    }

    fn emit_status(&self, status: LinkStatus) {
        self.registry
            .dispatch(EventKind::ConnectionStatus, &json!({ "status": status }));
    }

    async fn open_session(self: &Arc<Self>) -> bool {
        let epoch = {
            let session = lock(&self.session);
            if *self.state.borrow() == ConnectionState::Connected {
                return true;
            }
            session.epoch
        };

        let token = match self.tokens.get().await {
            Ok(Some(pair)) => pair.access_token,
            Ok(None) => {
                warn!("no access token stored, realtime session not opened");
                self.settle(epoch, ConnectionState::Disconnected);
                return false;
            }
            Err(e) => {
                warn!(error = %e, "token store unavailable, realtime session not opened");
                self.settle(epoch, ConnectionState::Disconnected);
                return false;
            }
        };
        let url = match self.endpoint(&token) {
            Ok(url) => url,
            Err(e) => {
                error!(error = %e, "realtime session not opened");
                self.settle(epoch, ConnectionState::Disconnected);
                return false;
            }
        };
        if !self.settle(epoch, ConnectionState::Connecting) {
            return false;
        }

        info!(
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            "opening realtime session"
        );
        let opened =
            tokio::time::timeout(self.config.connect_timeout, self.connector.connect(&url)).await;
        let connection = match opened {
            Ok(Ok(connection)) => connection,
            Ok(Err(e)) => {
                warn!(error = %RealtimeError::Transport(e.to_string()), "realtime connect failed");
                self.schedule_reconnect(epoch);
                return false;
            }
            Err(_) => {
                warn!(error = %RealtimeError::Timeout, "realtime connect failed");
                self.schedule_reconnect(epoch);
                return false;
            }
        };
        self.install(connection, epoch)
    }

    fn install(self: &Arc<Self>, connection: Connection, epoch: u64) -> bool {
        let Connection { sender, receiver } = connection;
        let reader_cancel = CancellationToken::new();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        let session_id = {
            let mut session = lock(&self.session);
            if session.epoch != epoch {
                drop(session);
                debug!("realtime transport opened after disconnect, closing it");
                let _ = outbound_tx.send(ConnMessage::Close(Some(NORMAL_CLOSURE)));
                tokio::spawn(outbound_writer(sender, outbound_rx));
                return false;
            }
            if let Some(timer) = session.reconnect_timer.take() {
                timer.cancel();
            }
            if let Some(previous) = session.reader_cancel.replace(reader_cancel.clone()) {
                previous.cancel();
            }
            session.next_session_id += 1;
            let id = session.next_session_id;
            session.current = Some(id);
            session.attempts = 0;
            session.outbound = Some(outbound_tx.clone());
            session.writer = Some(tokio::spawn(outbound_writer(sender, outbound_rx)));
            self.state.send_replace(ConnectionState::Connected);
            id
        };

        info!("realtime session connected");
        self.emit_status(LinkStatus::Connected);

        tokio::spawn(inbound_reader(
            self.clone(),
            receiver,
            outbound_tx,
            reader_cancel,
            session_id,
        ));
        true
    }

    fn on_closed(self: &Arc<Self>, session_id: u64, code: Option<u16>) {
        let epoch = {
            let mut session = lock(&self.session);
            if session.current != Some(session_id) {
                return;
            }
            session.current = None;
            session.outbound = None;
            session.writer = None;
            session.reader_cancel = None;
            session.epoch
        };

        info!(code = ?code, "realtime session closed");
        self.emit_status(LinkStatus::Disconnected);
        if code == Some(NORMAL_CLOSURE) {
            self.settle(epoch, ConnectionState::Disconnected);
        } else {
            self.schedule_reconnect(epoch);
        }
    }

    fn schedule_reconnect(self: &Arc<Self>, epoch: u64) {
        let backoff = self.config.backoff;
        let mut session = lock(&self.session);
        if session.epoch != epoch {
            return;
        }
        if backoff.exhausted(session.attempts) {
            if let Some(timer) = session.reconnect_timer.take() {
                timer.cancel();
            }
            self.state.send_replace(ConnectionState::Disconnected);
            info!(attempts = session.attempts, "maximum reconnect attempts reached");
            return;
        }

        let delay = backoff.delay_for(session.attempts);
        session.attempts += 1;
        let attempt = session.attempts;
        let timer = CancellationToken::new();
        if let Some(previous) = session.reconnect_timer.replace(timer.clone()) {
            previous.cancel();
        }
        self.state.send_replace(ConnectionState::Reconnecting);
        drop(session);

        info!(
            attempt,
            max_attempts = backoff.max_attempts,
            delay_ms = delay.as_millis() as u64,
            "scheduling realtime reconnect"
        );
        let inner = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = timer.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            // the attempt that armed this timer may still be finishing
            while let Some(pending) = inner.pending_connect() {
                pending.await;
            }
            {
                let mut session = lock(&inner.session);
                if session.epoch != epoch || timer.is_cancelled() {
                    return;
                }
                session.reconnect_timer = None;
            }
            debug!(attempt, "reconnect timer fired");
            RealtimeClient { inner }.connect().await;
        });
    }

    fn handle_text(&self, text: &str) {
        match serde_json::from_str::<RealtimeEvent>(text) {
            Ok(event) => {
                let listeners = self.registry.dispatch(event.kind, &event.data);
                trace!(kind = %event.kind, listeners, "realtime event dispatched");
            }
            Err(e) => {
                warn!(error = %RealtimeError::MalformedMessage(e.to_string()), "dropping realtime frame");
            }
        }
    }
}

async fn outbound_writer(
    mut sender: Box<dyn ConnSender>,
    mut outbound_rx: mpsc::UnboundedReceiver<ConnMessage>,
) {
    while let Some(message) = outbound_rx.recv().await {
        trace!(?message, "realtime outbound");
        let closing = matches!(message, ConnMessage::Close(_));
        if let Err(e) = sender.send(message).await {
            debug!(error = %e, "realtime writer stopped");
            break;
        }
        if closing {
            break;
        }
    }
}

async fn inbound_reader(
    inner: Arc<ClientInner>,
    mut receiver: Box<dyn ConnReceiver>,
    outbound: mpsc::UnboundedSender<ConnMessage>,
    cancel: CancellationToken,
    session_id: u64,
) {
    let code = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            m = receiver.next() => m,
        };
        match next {
            Some(Ok(ConnMessage::Text(text))) => inner.handle_text(&text),
            Some(Ok(ConnMessage::Binary(bytes))) => {
                debug!(len = bytes.len(), "ignoring binary realtime frame");
            }
            Some(Ok(ConnMessage::Ping)) => {
                let _ = outbound.send(ConnMessage::Pong);
            }
            Some(Ok(ConnMessage::Pong)) => {}
            Some(Ok(ConnMessage::Close(code))) => break code,
            Some(Err(e)) => {
                warn!(error = %e, "realtime stream error");
                break None;
            }
            None => break None,
        }
    };
    drop(outbound);
    inner.on_closed(session_id, code);
}
