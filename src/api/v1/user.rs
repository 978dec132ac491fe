use super::routes::*;
use crate::domain_model::*;
use crate::http::{ApiClient, ApiError, RequestEnvelope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateProfileResponse {
    #[serde(default)]
    pub success: bool,
    pub user: Option<User>,
}

#[derive(Serialize)]
struct ContactsRequest<'a> {
    contacts: &'a [String],
}

#[derive(Deserialize)]
struct ContactsResponse {
    #[serde(default)]
    users: Vec<User>,
}

pub struct UserApi {
    client: Arc<ApiClient>,
}

impl UserApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        UserApi { client }
    }

    pub async fn profile(&self) -> Result<User, ApiError> {
        self.client.get(USERS_ME).await
    }

    pub async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> Result<UpdateProfileResponse, ApiError> {
        self.client.put(USERS_ME, request).await
    }

    pub async fn by_phone(&self, phone_number: &str) -> Result<User, ApiError> {
        let envelope =
            RequestEnvelope::get(USERS_BY_PHONE).segment(normalize_phone_number(phone_number));
        self.client.fetch(envelope).await
    }

    /// Looks up which of the given phone numbers belong to registered users.
    pub async fn contacts(&self, phone_numbers: &[String]) -> Result<Vec<User>, ApiError> {
        let normalized: Vec<String> = phone_numbers
            .iter()
            .map(|p| normalize_phone_number(p))
            .collect();
        let response: ContactsResponse = self
            .client
            .post(USERS_CONTACTS, &ContactsRequest {
                contacts: &normalized,
            })
            .await?;
        Ok(response.users)
    }
}
