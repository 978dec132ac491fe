use crate::http::TransportError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decoded response payload. JSON content types are parsed, anything else
/// is kept as text.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Json(Value),
    Text(String),
}

impl ResponseBody {
    pub fn into_value(self) -> Value {
        match self {
            ResponseBody::Json(value) => value,
            ResponseBody::Text(text) => Value::String(text),
        }
    }

    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        let value = self.into_value();
        serde_json::from_value(value.clone()).map_err(|e| ApiError {
            status: 0,
            data: value,
            message: format!("unexpected response shape: {e}"),
        })
    }
}

/// Failure of an API request. `status` is 0 when no usable HTTP response
/// was received (network failure, timeout, undecodable body).
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message} (status {status})")]
pub struct ApiError {
    pub status: u16,
    pub data: Value,
    pub message: String,
}

const DEFAULT_ERROR_MESSAGE: &str = "Request failed";

impl ApiError {
    pub fn from_response(status: u16, data: Value) -> Self {
        let message = data
            .pointer("/error/message")
            .and_then(Value::as_str)
            .or_else(|| data.get("message").and_then(Value::as_str))
            .unwrap_or(DEFAULT_ERROR_MESSAGE)
            .to_owned();
        ApiError {
            status,
            data,
            message,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        ApiError {
            status: 0,
            data: Value::Null,
            message: message.into(),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_transport(&self) -> bool {
        self.status == 0
    }

    /// Client errors that a retry cannot fix.
    pub fn is_retryable(&self) -> bool {
        !matches!(self.status, 400 | 401 | 403 | 404)
    }
}

impl From<TransportError> for ApiError {
    fn from(e: TransportError) -> Self {
        ApiError::transport(e.to_string())
    }
}
