use super::routes::*;
use crate::domain_model::SparkId;
use crate::http::{ApiClient, ApiError, RequestEnvelope};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoveSpark {
    pub id: SparkId,
    pub content: String,
    pub category: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoveSparkList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub sparks: Vec<LoveSpark>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateLoveSparkRequest {
    pub content: String,
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateLoveSparkResponse {
    #[serde(default)]
    pub success: bool,
    pub spark: Option<LoveSpark>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoveSparkAck {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

pub struct LoveSparkApi {
    client: Arc<ApiClient>,
}

impl LoveSparkApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        LoveSparkApi { client }
    }

    pub async fn list(&self, category: &str) -> Result<LoveSparkList, ApiError> {
        let envelope = RequestEnvelope::get(LOVE_SPARKS).query("category", category);
        self.client.fetch(envelope).await
    }

    pub async fn personalized(&self) -> Result<LoveSparkList, ApiError> {
        self.client.get(LOVE_SPARKS_PERSONALIZED).await
    }

    /// `rating` runs from 1 to 5; the server rejects anything else.
    pub async fn rate(&self, spark_id: &SparkId, rating: u8) -> Result<LoveSparkAck, ApiError> {
        let envelope = RequestEnvelope::post(LOVE_SPARKS)
            .segment(spark_id.as_str())
            .segment("rate")
            .json(&serde_json::json!({ "rating": rating }))?;
        self.client.fetch(envelope).await
    }

    pub async fn create(
        &self,
        request: &CreateLoveSparkRequest,
    ) -> Result<CreateLoveSparkResponse, ApiError> {
        self.client.post(LOVE_SPARKS, request).await
    }

    pub async fn delete(&self, spark_id: &SparkId) -> Result<LoveSparkAck, ApiError> {
        let envelope = RequestEnvelope::delete(LOVE_SPARKS).segment(spark_id.as_str());
        self.client.fetch(envelope).await
    }
}
