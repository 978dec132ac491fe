use crate::domain_model::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Every event kind the realtime channel carries. Frames naming anything
/// else are rejected at parse time.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Emitted locally when the session opens or closes.
    ConnectionStatus,
    PartnerPresence,
    NewMessage,
    MessageStatus,
    TypingStatus,
    ConnectionRequest,
    ConnectionUpdate,
    ConnectionAccepted,
    ConnectionRejected,
    ConnectionRemoved,
}

impl EventKind {
    pub const ALL: [EventKind; 10] = [
        EventKind::ConnectionStatus,
        EventKind::PartnerPresence,
        EventKind::NewMessage,
        EventKind::MessageStatus,
        EventKind::TypingStatus,
        EventKind::ConnectionRequest,
        EventKind::ConnectionUpdate,
        EventKind::ConnectionAccepted,
        EventKind::ConnectionRejected,
        EventKind::ConnectionRemoved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::ConnectionStatus => "connection_status",
            EventKind::PartnerPresence => "partner_presence",
            EventKind::NewMessage => "new_message",
            EventKind::MessageStatus => "message_status",
            EventKind::TypingStatus => "typing_status",
            EventKind::ConnectionRequest => "connection_request",
            EventKind::ConnectionUpdate => "connection_update",
            EventKind::ConnectionAccepted => "connection_accepted",
            EventKind::ConnectionRejected => "connection_rejected",
            EventKind::ConnectionRemoved => "connection_removed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire envelope in both directions: `{"type": ..., "data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatusEvent {
    pub status: LinkStatus,
}

// region typed payloads

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerPresenceEvent {
    pub user_id: UserId,
    pub status: PresenceStatus,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessageEvent {
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatusEvent {
    pub message_id: MessageId,
    pub status: DeliveryStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingStatusEvent {
    pub connection_id: ConnectionId,
    pub user_id: UserId,
    pub is_typing: bool,
}

// endregion
