use super::SuccessResponse;
use super::routes::*;
use crate::domain_model::PresenceStatus;
use crate::http::{ApiClient, ApiError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Serialize)]
struct UpdatePresenceRequest {
    status: PresenceStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    pub status: PresenceStatus,
    pub last_seen: Option<String>,
}

pub struct PresenceApi {
    client: Arc<ApiClient>,
}

impl PresenceApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        PresenceApi { client }
    }

    pub async fn update(&self, status: PresenceStatus) -> Result<SuccessResponse, ApiError> {
        self.client
            .post(PRESENCE, &UpdatePresenceRequest { status })
            .await
    }

    pub async fn partner(&self) -> Result<Presence, ApiError> {
        self.client.get(PRESENCE_PARTNER).await
    }
}
