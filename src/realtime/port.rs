use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const NORMAL_CLOSURE: u16 = 1000;

// region conn message

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ConnMessage {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    /// Close with the peer's code, `None` when the frame carried none.
    Close(Option<u16>),
}

impl From<Message> for ConnMessage {
    fn from(message: Message) -> Self {
        match message {
            Message::Text(t) => ConnMessage::Text(t),
            Message::Binary(b) => ConnMessage::Binary(b),
            Message::Ping(_) => ConnMessage::Ping,
            Message::Pong(_) => ConnMessage::Pong,
            Message::Close(frame) => ConnMessage::Close(frame.map(|f| u16::from(f.code))),
            frame @ Message::Frame(_) => ConnMessage::Binary(frame.into_data()),
        }
    }
}

impl From<ConnMessage> for Message {
    fn from(message: ConnMessage) -> Message {
        match message {
            ConnMessage::Text(t) => Message::Text(t),
            ConnMessage::Binary(b) => Message::Binary(b),
            ConnMessage::Ping => Message::Ping(Vec::new()),
            ConnMessage::Pong => Message::Pong(Vec::new()),
            ConnMessage::Close(code) => Message::Close(code.map(|code| CloseFrame {
                code: CloseCode::from(code),
                reason: "".into(),
            })),
        }
    }
}

// endregion

// region conn sender

#[async_trait::async_trait]
pub trait ConnSender: Send + Sync {
    async fn send(&mut self, message: ConnMessage) -> anyhow::Result<()>;
}

#[async_trait::async_trait]
impl ConnSender for SplitSink<WsStream, Message> {
    async fn send(&mut self, message: ConnMessage) -> anyhow::Result<()> {
        SinkExt::send(self, Message::from(message)).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConnSender for Sender<ConnMessage> {
    async fn send(&mut self, message: ConnMessage) -> anyhow::Result<()> {
        Sender::<ConnMessage>::send(self, message).await?;
        Ok(())
    }
}

// endregion

// region conn receiver

#[async_trait::async_trait]
pub trait ConnReceiver: Send + Sync {
    async fn next(&mut self) -> Option<anyhow::Result<ConnMessage>>;
}

#[async_trait::async_trait]
impl ConnReceiver for SplitStream<WsStream> {
    async fn next(&mut self) -> Option<anyhow::Result<ConnMessage>> {
        StreamExt::next(self)
            .await
            .map(|result| result.map(ConnMessage::from).map_err(anyhow::Error::from))
    }
}

#[async_trait::async_trait]
impl ConnReceiver for Receiver<ConnMessage> {
    async fn next(&mut self) -> Option<anyhow::Result<ConnMessage>> {
        Some(Ok(Receiver::<ConnMessage>::recv(&mut *self).await?))
    }
}

// endregion

pub struct Connection {
    pub sender: Box<dyn ConnSender>,
    pub receiver: Box<dyn ConnReceiver>,
}

/// Opens one realtime transport. The URL already carries the credentials.
#[async_trait::async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self, url: &Url) -> anyhow::Result<Connection>;
}
