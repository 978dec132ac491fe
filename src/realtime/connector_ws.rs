use crate::logger::*;
use crate::realtime::*;
use futures_util::StreamExt;
use reqwest::Url;

/// WebSocket connector over tokio-tungstenite with rustls.
pub struct WsConnector;

#[async_trait::async_trait]
impl RealtimeConnector for WsConnector {
    async fn connect(&self, url: &Url) -> anyhow::Result<Connection> {
        let (stream, response) = tokio_tungstenite::connect_async(url.as_str()).await?;
        debug!(status = %response.status(), "websocket handshake complete");

        let (sink, stream) = stream.split();
        Ok(Connection {
            sender: Box::new(sink),
            receiver: Box::new(stream),
        })
    }
}
