use crate::api::v1::routes::AUTH_REFRESH;
use crate::application_port::{AuthError, TokenRefresher};
use crate::domain_model::*;
use crate::http::{HttpRequest, HttpTransport, Method};
use crate::logger::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    success: Option<bool>,
    #[serde(alias = "token")]
    access_token: Option<String>,
    refresh_token: Option<String>,
}

/// Calls the refresh endpoint directly on the transport. It must not go
/// through `ApiClient`, whose 401 handling would recurse into the store.
pub struct HttpTokenRefresher {
    transport: Arc<dyn HttpTransport>,
    url: String,
    timeout: Duration,
}

impl HttpTokenRefresher {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: &str, timeout: Duration) -> Self {
        HttpTokenRefresher {
            transport,
            url: format!("{}{}", base_url.trim_end_matches('/'), AUTH_REFRESH),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl TokenRefresher for HttpTokenRefresher {
    async fn refresh(&self, refresh_token: &RefreshToken) -> Result<TokenPair, AuthError> {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: refresh_token.as_str(),
        })
        .map_err(|e| AuthError::Internal(e.to_string()))?;
        let request = HttpRequest {
            method: Method::POST,
            url: self.url.clone(),
            headers: vec![
                ("Content-Type".to_owned(), "application/json".to_owned()),
                ("Accept".to_owned(), "application/json".to_owned()),
            ],
            body: Some(body),
            timeout: self.timeout,
        };

        let response = tokio::time::timeout(self.timeout, self.transport.send(request))
            .await
            .map_err(|_| AuthError::Internal("refresh request timed out".to_owned()))?
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        match response.status {
            401 | 403 => return Err(AuthError::Expired),
            status if !response.is_success() => {
                return Err(AuthError::Internal(format!(
                    "refresh endpoint answered {status}"
                )));
            }
            _ => {}
        }

        let parsed: RefreshResponse = serde_json::from_str(&response.body)
            .map_err(|e| AuthError::Internal(format!("malformed refresh response: {e}")))?;
        match parsed {
            RefreshResponse {
                success: Some(true) | None,
                access_token: Some(access),
                refresh_token: Some(refresh),
            } => Ok(TokenPair::new(access, refresh)),
            _ => {
                debug!("refresh endpoint rejected the refresh token");
                Err(AuthError::Expired)
            }
        }
    }
}
