use super::SuccessResponse;
use super::routes::*;
use crate::domain_model::DeviceId;
use crate::http::{ApiClient, ApiError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Web,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    pub device_id: DeviceId,
    pub device_token: String,
    pub platform: Platform,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoNotDisturb {
    pub enabled: bool,
    /// `HH:MM`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub message_notifications: bool,
    pub presence_notifications: bool,
    pub connection_request_notifications: bool,
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    #[serde(default)]
    pub do_not_disturb: DoNotDisturb,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateSettingsResponse {
    #[serde(default)]
    pub success: bool,
    pub settings: Option<NotificationSettings>,
}

pub struct NotificationApi {
    client: Arc<ApiClient>,
}

impl NotificationApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        NotificationApi { client }
    }

    pub async fn register_device(
        &self,
        request: &RegisterDeviceRequest,
    ) -> Result<SuccessResponse, ApiError> {
        self.client.post(NOTIFICATIONS_DEVICES, request).await
    }

    pub async fn settings(&self) -> Result<NotificationSettings, ApiError> {
        self.client.get(NOTIFICATIONS_SETTINGS).await
    }

    pub async fn update_settings(
        &self,
        settings: &NotificationSettings,
    ) -> Result<UpdateSettingsResponse, ApiError> {
        self.client.put(NOTIFICATIONS_SETTINGS, settings).await
    }
}
