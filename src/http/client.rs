use crate::application_port::TokenStore;
use crate::domain_model::AccessToken;
use crate::http::*;
use crate::logger::*;
use crate::settings;
use nanoid::nanoid;
use reqwest::Url;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub retry_attempts: u32,
    pub retry_delay: Duration,
}

impl From<&settings::Http> for ApiClientConfig {
    fn from(http: &settings::Http) -> Self {
        ApiClientConfig {
            base_url: http.base_url.clone(),
            timeout: Duration::from_millis(http.timeout_ms),
            retry_attempts: http.retry_attempts,
            retry_delay: Duration::from_millis(http.retry_delay_ms),
        }
    }
}

/// JSON API client that attaches the stored bearer token, retries transient
/// failures with exponential backoff, and recovers from a 401 with at most
/// one credential refresh per request.
pub struct ApiClient {
    config: ApiClientConfig,
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<dyn TokenStore>,
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

fn parse_body(response: &HttpResponse) -> Result<ResponseBody, ApiError> {
    if !response.is_json() {
        return Ok(ResponseBody::Text(response.body.clone()));
    }
    if response.body.trim().is_empty() {
        return Ok(ResponseBody::Json(serde_json::Value::Null));
    }
    serde_json::from_str(&response.body)
        .map(ResponseBody::Json)
        .map_err(|e| ApiError::transport(format!("invalid JSON response: {e}")))
}

impl ApiClient {
    pub fn new(
        config: ApiClientConfig,
        transport: Arc<dyn HttpTransport>,
        tokens: Arc<dyn TokenStore>,
    ) -> ApiClient {
        ApiClient {
            config,
            transport,
            tokens,
        }
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    pub async fn request(&self, mut envelope: RequestEnvelope) -> Result<ResponseBody, ApiError> {
        let request_id = nanoid!(10);

        match self.send_with_backoff(&envelope, &request_id).await {
            Err(err) if err.is_unauthorized() && !envelope.refresh_retried => {
                envelope.refresh_retried = true;
                debug!(%request_id, "unauthorized, refreshing credentials");
                match self.tokens.refresh().await {
                    Ok(_) => self.send_with_backoff(&envelope, &request_id).await,
                    Err(e) => {
                        warn!(%request_id, error = %e, "credential refresh failed");
                        Err(err)
                    }
                }
            }
            other => other,
        }
    }

    pub async fn fetch<T: DeserializeOwned>(&self, envelope: RequestEnvelope) -> Result<T, ApiError> {
        self.request(envelope).await?.decode()
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(RequestEnvelope::get(path)).await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.fetch(RequestEnvelope::post(path).json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.fetch(RequestEnvelope::put(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(RequestEnvelope::delete(path)).await
    }

    async fn send_with_backoff(
        &self,
        envelope: &RequestEnvelope,
        request_id: &str,
    ) -> Result<ResponseBody, ApiError> {
        let retry_attempts = envelope.retry_attempts.unwrap_or(self.config.retry_attempts);
        let retry_delay = envelope.retry_delay.unwrap_or(self.config.retry_delay);

        let mut attempt = 0;
        loop {
            match self.send_once(envelope, request_id).await {
                Ok(body) => return Ok(body),
                Err(err) if !err.is_retryable() || attempt >= retry_attempts => return Err(err),
                Err(err) => {
                    let delay = backoff_delay(retry_delay, attempt);
                    attempt += 1;
                    warn!(
                        %request_id,
                        status = err.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn send_once(
        &self,
        envelope: &RequestEnvelope,
        request_id: &str,
    ) -> Result<ResponseBody, ApiError> {
        let url = self.url_for(envelope)?;

        // Read on every attempt so a retry picks up a refreshed token.
        let token = match self.tokens.get().await {
            Ok(pair) => pair.map(|p| p.access_token),
            Err(e) => {
                warn!(%request_id, error = %e, "token store unavailable, sending without credentials");
                None
            }
        };

        let timeout = envelope.timeout.unwrap_or(self.config.timeout);
        let body = if envelope.method == Method::GET {
            None
        } else {
            envelope.body.clone()
        };
        let request = HttpRequest {
            method: envelope.method.clone(),
            url: url.to_string(),
            headers: self.headers_for(envelope, request_id, token.as_ref()),
            body,
            timeout,
        };

        debug!(%request_id, method = %envelope.method, path = %url.path(), "sending request");
        let response = match tokio::time::timeout(timeout, self.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(TransportError::Timeout.into()),
        };
        debug!(%request_id, status = response.status, "response received");

        let body = parse_body(&response)?;
        if response.is_success() {
            Ok(body)
        } else {
            Err(ApiError::from_response(response.status, body.into_value()))
        }
    }

    fn url_for(&self, envelope: &RequestEnvelope) -> Result<Url, ApiError> {
        let base = self.config.base_url.trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}{}", envelope.path))
            .map_err(|e| ApiError::transport(format!("invalid request url: {e}")))?;

        if !envelope.segments.is_empty() {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ApiError::transport("base url cannot carry a path"))?;
            segments.pop_if_empty().extend(&envelope.segments);
        }
        if !envelope.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&envelope.query);
        }
        Ok(url)
    }

    fn headers_for(
        &self,
        envelope: &RequestEnvelope,
        request_id: &str,
        token: Option<&AccessToken>,
    ) -> Vec<(String, String)> {
        let mut headers = vec![
            ("Content-Type".to_owned(), "application/json".to_owned()),
            ("Accept".to_owned(), "application/json".to_owned()),
            ("x-request-id".to_owned(), request_id.to_owned()),
        ];
        if let Some(token) = token {
            headers.push((
                "Authorization".to_owned(),
                format!("Bearer {}", token.as_str()),
            ));
        }
        for (name, value) in &envelope.headers {
            headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::RealTokenStore;
    use crate::application_port::AuthError;
    use crate::domain_model::TokenPair;
    use crate::infra_memory::MemoryCredentialStore;
    use crate::testutil::*;
    use serde_json::{Value, json};
    use tokio::time::Instant;

    fn config() -> ApiClientConfig {
        ApiClientConfig {
            base_url: "https://api.test/v1".to_owned(),
            timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }

    async fn client_with(
        transport: &Arc<ScriptedTransport>,
        refresher: &Arc<CountingRefresher>,
        tokens: Option<TokenPair>,
    ) -> (ApiClient, Arc<RealTokenStore>) {
        let store = Arc::new(RealTokenStore::new(
            Arc::new(MemoryCredentialStore::new()),
            refresher.clone(),
        ));
        if let Some(pair) = tokens {
            store.set(pair).await.unwrap();
        }
        let client = ApiClient::new(config(), transport.clone(), store.clone());
        (client, store)
    }

    #[tokio::test]
    async fn attaches_bearer_token_and_default_headers() {
        let transport = Arc::new(ScriptedTransport::new().then(json_response(200, json!({}))));
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, Some(TokenPair::new("A1", "R1"))).await;

        client.get::<Value>("/users/me").await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://api.test/v1/users/me");
        assert_eq!(requests[0].header("authorization"), Some("Bearer A1"));
        assert_eq!(requests[0].header("accept"), Some("application/json"));
        assert!(requests[0].header("x-request-id").is_some());
    }

    #[tokio::test]
    async fn omits_authorization_without_token() {
        let transport = Arc::new(ScriptedTransport::new().then(json_response(200, json!({}))));
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        client.get::<Value>("/users/me").await.unwrap();

        assert_eq!(transport.requests()[0].header("Authorization"), None);
    }

    #[tokio::test]
    async fn caller_headers_override_defaults() {
        let transport = Arc::new(ScriptedTransport::new().then(text_response(200, "ok")));
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        let envelope = RequestEnvelope::get("/health").header("accept", "text/plain");
        let body = client.request(envelope).await.unwrap();

        assert_eq!(body, ResponseBody::Text("ok".into()));
        let request = &transport.requests()[0];
        assert_eq!(request.header("Accept"), Some("text/plain"));
        assert_eq!(
            request.headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case("accept")).count(),
            1
        );
    }

    #[tokio::test]
    async fn unauthorized_request_is_replayed_with_refreshed_token() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .then(json_response(401, json!({ "message": "token expired" })))
                .then(json_response(200, json!({ "messages": [], "hasMore": false }))),
        );
        let refresher = Arc::new(CountingRefresher::new().then_ok("A2", "R2"));
        let (client, store) =
            client_with(&transport, &refresher, Some(TokenPair::new("A1", "R1"))).await;

        let body: Value = client
            .fetch(RequestEnvelope::get("/messages").segment("c1"))
            .await
            .unwrap();

        assert_eq!(body["hasMore"], json!(false));
        assert_eq!(refresher.calls(), 1);
        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].header("Authorization"), Some("Bearer A1"));
        assert_eq!(requests[1].header("Authorization"), Some("Bearer A2"));
        assert_eq!(store.get().await.unwrap(), Some(TokenPair::new("A2", "R2")));
    }

    #[tokio::test]
    async fn second_unauthorized_is_not_refreshed_again() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .then(json_response(401, json!({})))
                .then(json_response(401, json!({ "message": "still no" }))),
        );
        let refresher = Arc::new(CountingRefresher::new().then_ok("A2", "R2").then_ok("A3", "R3"));
        let (client, _) = client_with(&transport, &refresher, Some(TokenPair::new("A1", "R1"))).await;

        let err = client.get::<Value>("/users/me").await.unwrap_err();

        assert_eq!(err.status, 401);
        assert_eq!(err.message, "still no");
        assert_eq!(refresher.calls(), 1);
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_original_unauthorized() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .then(json_response(401, json!({ "error": { "message": "expired" } }))),
        );
        let refresher = Arc::new(CountingRefresher::new().then_fail(AuthError::Expired));
        let (client, store) =
            client_with(&transport, &refresher, Some(TokenPair::new("A1", "R1"))).await;

        let err = client.get::<Value>("/users/me").await.unwrap_err();

        assert_eq!(err.status, 401);
        assert_eq!(err.message, "expired");
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(store.get().await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_unauthorized_requests_share_one_refresh() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .then(json_response(401, json!({})))
                .then(json_response(401, json!({})))
                .then(json_response(200, json!({ "n": 1 })))
                .then(json_response(200, json!({ "n": 2 }))),
        );
        let refresher = Arc::new(
            CountingRefresher::new()
                .with_delay(Duration::from_millis(100))
                .then_ok("A2", "R2"),
        );
        let (client, _) = client_with(&transport, &refresher, Some(TokenPair::new("A1", "R1"))).await;

        let (a, b) = tokio::join!(
            client.get::<Value>("/presence/partner"),
            client.get::<Value>("/connections/partner"),
        );

        assert!(a.is_ok() && b.is_ok());
        assert_eq!(refresher.calls(), 1);
        let requests = transport.requests();
        assert_eq!(requests[2].header("Authorization"), Some("Bearer A2"));
        assert_eq!(requests[3].header("Authorization"), Some("Bearer A2"));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let transport = Arc::new(
            ScriptedTransport::new().then(json_response(404, json!({ "message": "no such user" }))),
        );
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        let err = client.get::<Value>("/users/phone/123").await.unwrap_err();

        assert_eq!(err.status, 404);
        assert_eq!(err.message, "no such user");
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn server_errors_back_off_exponentially() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .then(json_response(500, json!({})))
                .then(json_response(503, json!({})))
                .then(json_response(200, json!({ "ok": true }))),
        );
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        let start = Instant::now();
        let body: Value = client.get("/presence/partner").await.unwrap();
        let elapsed = start.elapsed();

        assert_eq!(body, json!({ "ok": true }));
        assert_eq!(transport.requests().len(), 3);
        assert!(elapsed >= Duration::from_millis(3000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(3100), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn retries_stop_after_the_configured_attempts() {
        let mut script = ScriptedTransport::new();
        for _ in 0..4 {
            script = script.then(json_response(503, json!({ "message": "busy" })));
        }
        let transport = Arc::new(script);
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        let err = client.get::<Value>("/presence/partner").await.unwrap_err();

        assert_eq!(err.status, 503);
        assert_eq!(transport.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_maps_to_status_zero() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .with_delay(Duration::from_secs(60))
                .then(json_response(200, json!({}))),
        );
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        let start = Instant::now();
        let envelope = RequestEnvelope::get("/users/me")
            .timeout(Duration::from_secs(5))
            .retry(0, Duration::ZERO);
        let err = client.request(envelope).await.unwrap_err();

        assert!(err.is_transport());
        assert!(start.elapsed() < Duration::from_secs(6));
    }

    #[tokio::test]
    async fn network_failure_maps_to_status_zero() {
        let transport = Arc::new(
            ScriptedTransport::new().then_err(TransportError::Network("connection refused".into())),
        );
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        let err = client
            .request(RequestEnvelope::get("/users/me").retry(0, Duration::ZERO))
            .await
            .unwrap_err();

        assert_eq!(err.status, 0);
        assert!(err.message.contains("connection refused"));
    }

    #[tokio::test]
    async fn invalid_json_is_a_transport_failure() {
        let mut response = json_response(200, Value::Null);
        response.body = "{not json".to_owned();
        let transport = Arc::new(ScriptedTransport::new().then(response));
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        let err = client
            .request(RequestEnvelope::get("/users/me").retry(0, Duration::ZERO))
            .await
            .unwrap_err();

        assert_eq!(err.status, 0);
    }

    #[tokio::test]
    async fn segments_and_query_are_percent_encoded() {
        let transport = Arc::new(ScriptedTransport::new().then(json_response(200, json!({}))));
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        let envelope = RequestEnvelope::get("/messages")
            .segment("c 1/2")
            .query("before", "2024-01-01T00:00:00+00:00");
        client.request(envelope).await.unwrap();

        assert_eq!(
            transport.requests()[0].url,
            "https://api.test/v1/messages/c%201%2F2?before=2024-01-01T00%3A00%3A00%2B00%3A00"
        );
    }

    #[tokio::test]
    async fn get_requests_carry_no_body() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .then(json_response(200, json!({})))
                .then(json_response(200, json!({}))),
        );
        let refresher = Arc::new(CountingRefresher::new());
        let (client, _) = client_with(&transport, &refresher, None).await;

        client
            .request(RequestEnvelope::get("/users/me").body(json!({ "x": 1 })))
            .await
            .unwrap();
        client
            .post::<Value, _>("/presence", &json!({ "status": "online" }))
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].body, None);
        assert_eq!(requests[1].body, Some(json!({ "status": "online" })));
    }
}
