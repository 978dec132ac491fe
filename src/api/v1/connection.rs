use super::SuccessResponse;
use super::routes::*;
use crate::domain_model::*;
use crate::http::{ApiClient, ApiError, RequestEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionRequestStatus {
    Pending,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub id: ConnectionRequestId,
    pub from_user_id: UserId,
    pub to_user_id: UserId,
    pub status: ConnectionRequestStatus,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionActivity {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub user_id1: UserId,
    pub user_id2: UserId,
    pub status: ConnectionActivity,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendConnectionRequest {
    pub target_user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendConnectionResponse {
    pub success: bool,
    pub connection_request: Option<ConnectionRequest>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AcceptConnectionResponse {
    pub success: bool,
    pub connection: Option<ConnectionRecord>,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Connected,
    Pending,
    NotConnected,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatusResponse {
    pub status: LinkState,
    pub connection_id: Option<ConnectionId>,
    pub request_id: Option<ConnectionRequestId>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Partner {
    #[serde(flatten)]
    pub user: User,
    pub connection_id: ConnectionId,
}

pub struct ConnectionApi {
    client: Arc<ApiClient>,
}

impl ConnectionApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        ConnectionApi { client }
    }

    pub async fn send_request(
        &self,
        request: &SendConnectionRequest,
    ) -> Result<SendConnectionResponse, ApiError> {
        self.client.post(CONNECTIONS_REQUEST, request).await
    }

    pub async fn accept(
        &self,
        request_id: &ConnectionRequestId,
    ) -> Result<AcceptConnectionResponse, ApiError> {
        let envelope = RequestEnvelope::post(CONNECTIONS_ACCEPT)
            .segment(request_id.as_str())
            .body(json!({}));
        self.client.fetch(envelope).await
    }

    pub async fn reject(&self, request_id: &ConnectionRequestId) -> Result<SuccessResponse, ApiError> {
        let envelope = RequestEnvelope::post(CONNECTIONS_REJECT)
            .segment(request_id.as_str())
            .body(json!({}));
        self.client.fetch(envelope).await
    }

    pub async fn status(&self, user_id: &UserId) -> Result<ConnectionStatusResponse, ApiError> {
        let envelope = RequestEnvelope::get(CONNECTIONS_STATUS).segment(user_id.as_str());
        self.client.fetch(envelope).await
    }

    pub async fn partner(&self) -> Result<Partner, ApiError> {
        self.client.get(CONNECTIONS_PARTNER).await
    }
}
