use super::SuccessResponse;
use super::routes::*;
use crate::domain_model::*;
use crate::http::{ApiClient, ApiError, RequestEnvelope};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    Video,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub connection_id: ConnectionId,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageResponse {
    pub success: bool,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStatus {
    pub is_typing: bool,
    pub user_id: UserId,
    pub timestamp: Option<String>,
}

pub struct MessageApi {
    client: Arc<ApiClient>,
}

impl MessageApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        MessageApi { client }
    }

    /// One page of history, newest first. `before` is the cursor returned
    /// by the server (a message timestamp).
    pub async fn list(
        &self,
        connection_id: &ConnectionId,
        limit: Option<u32>,
        before: Option<&str>,
    ) -> Result<MessagePage, ApiError> {
        let mut envelope = RequestEnvelope::get(MESSAGES)
            .segment(connection_id.as_str())
            .query("limit", limit.unwrap_or(DEFAULT_PAGE_SIZE));
        if let Some(before) = before {
            envelope = envelope.query("before", before);
        }
        self.client.fetch(envelope).await
    }

    pub async fn send(&self, request: &SendMessageRequest) -> Result<SendMessageResponse, ApiError> {
        self.client.post(MESSAGES, request).await
    }

    pub async fn mark_read(&self, message_id: &MessageId) -> Result<SuccessResponse, ApiError> {
        let envelope = RequestEnvelope::post(MESSAGES)
            .segment(message_id.as_str())
            .segment("read")
            .body(json!({}));
        self.client.fetch(envelope).await
    }

    pub async fn typing_status(&self, connection_id: &ConnectionId) -> Result<TypingStatus, ApiError> {
        let envelope = RequestEnvelope::get(MESSAGES_TYPING).segment(connection_id.as_str());
        self.client.fetch(envelope).await
    }

    pub async fn set_typing(
        &self,
        connection_id: &ConnectionId,
        is_typing: bool,
    ) -> Result<SuccessResponse, ApiError> {
        let envelope = RequestEnvelope::post(MESSAGES_TYPING)
            .segment(connection_id.as_str())
            .body(json!({ "isTyping": is_typing }));
        self.client.fetch(envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::RealTokenStore;
    use crate::http::ApiClientConfig;
    use crate::infra_memory::MemoryCredentialStore;
    use crate::testutil::*;
    use std::time::Duration;

    fn message_api(transport: &Arc<ScriptedTransport>) -> MessageApi {
        let store = Arc::new(RealTokenStore::new(
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(CountingRefresher::new()),
        ));
        let config = ApiClientConfig {
            base_url: "https://api.test/v1".to_owned(),
            timeout: Duration::from_secs(30),
            retry_attempts: 0,
            retry_delay: Duration::from_millis(10),
        };
        MessageApi::new(Arc::new(ApiClient::new(config, transport.clone(), store)))
    }

    #[tokio::test]
    async fn list_builds_paged_url() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .then(json_response(200, json!({ "messages": [], "hasMore": false })))
                .then(json_response(200, json!({
                    "messages": [{
                        "id": "m1", "connectionId": "c1", "senderId": "u1",
                        "content": "hi", "createdAt": "2024-05-01T10:00:00Z"
                    }],
                    "hasMore": true
                }))),
        );
        let api = message_api(&transport);

        api.list(&ConnectionId::from("c1"), None, None).await.unwrap();
        let page = api
            .list(&ConnectionId::from("c1"), Some(20), Some("2024-05-01T10:00:00Z"))
            .await
            .unwrap();

        assert!(page.has_more);
        assert_eq!(page.messages[0].id, MessageId::from("m1"));
        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://api.test/v1/messages/c1?limit=50");
        assert_eq!(
            requests[1].url,
            "https://api.test/v1/messages/c1?limit=20&before=2024-05-01T10%3A00%3A00Z"
        );
    }

    #[tokio::test]
    async fn mark_read_and_typing_hit_their_paths() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .then(json_response(200, json!({ "success": true })))
                .then(json_response(200, json!({ "success": true }))),
        );
        let api = message_api(&transport);

        let read = api.mark_read(&MessageId::from("m1")).await.unwrap();
        api.set_typing(&ConnectionId::from("c1"), true).await.unwrap();

        assert!(read.success);
        let requests = transport.requests();
        assert_eq!(requests[0].url, "https://api.test/v1/messages/m1/read");
        assert_eq!(requests[1].url, "https://api.test/v1/messages/typing/c1");
        assert_eq!(requests[1].body, Some(json!({ "isTyping": true })));
    }
}
