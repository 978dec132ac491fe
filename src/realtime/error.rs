#[derive(Debug, thiserror::Error)]
pub enum RealtimeError {
    #[error("malformed realtime message: {0}")]
    MalformedMessage(String),
    #[error("realtime connection unavailable")]
    ConnectionUnavailable,
    #[error("realtime transport error: {0}")]
    Transport(String),
    #[error("realtime connect timed out")]
    Timeout,
    #[error("invalid realtime url: {0}")]
    InvalidUrl(String),
}
