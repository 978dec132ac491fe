use super::SuccessResponse;
use super::routes::*;
use crate::application_port::AuthError;
use crate::domain_model::*;
use crate::http::{ApiClient, ApiError, RequestEnvelope};
use crate::logger::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub phone_number: String,
    pub name: String,
    pub device_id: DeviceId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub verification_sent: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub phone_number: String,
    pub device_id: DeviceId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    #[serde(default)]
    pub verification_sent: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub phone_number: String,
    pub verification_code: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    #[serde(alias = "accessToken")]
    pub token: Option<AccessToken>,
    pub refresh_token: Option<RefreshToken>,
    pub user: Option<User>,
}

pub struct AuthApi {
    client: Arc<ApiClient>,
}

impl AuthApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        AuthApi { client }
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse, ApiError> {
        self.client.post(AUTH_REGISTER, request).await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ApiError> {
        self.client.post(AUTH_LOGIN, request).await
    }

    /// Confirms the verification code. A successful answer carrying both
    /// tokens replaces the stored credentials.
    pub async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, ApiError> {
        let response: VerifyResponse = self.client.post(AUTH_VERIFY, request).await?;

        if response.success {
            match (&response.token, &response.refresh_token) {
                (Some(access), Some(refresh)) => {
                    let pair = TokenPair {
                        access_token: access.clone(),
                        refresh_token: refresh.clone(),
                    };
                    self.client
                        .tokens()
                        .set(pair)
                        .await
                        .map_err(|e| ApiError::transport(format!("could not store credentials: {e}")))?;
                    info!("phone number verified, credentials stored");
                }
                _ => warn!("verification succeeded without a token pair"),
            }
        }
        Ok(response)
    }

    pub async fn refresh(&self) -> Result<AccessToken, AuthError> {
        self.client.tokens().refresh().await
    }

    /// Tells the backend to end the session, then clears local credentials
    /// whatever the outcome of the call.
    pub async fn logout(&self) -> Result<SuccessResponse, ApiError> {
        let result = self
            .client
            .fetch(RequestEnvelope::post(AUTH_LOGOUT).body(serde_json::json!({})))
            .await;
        if let Err(e) = &result {
            warn!(error = %e, "logout call failed, clearing credentials anyway");
        }
        if let Err(e) = self.client.tokens().clear().await {
            error!(error = %e, "failed to clear credentials on logout");
        }
        result
    }

    pub async fn is_authenticated(&self) -> bool {
        self.client.tokens().is_authenticated().await
    }
}
