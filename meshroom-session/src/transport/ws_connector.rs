use crate::error::TransportError;
use crate::transport::connector::{Connector, Delivery, SignalingLink};
use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use meshroom_core::{Channel, ClientFrame, Destination, ServerFrame, UserId};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

pub const USER_ID_HEADER: &str = "X-User-Id";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connects to a relay over WebSocket, identifying with the `X-User-Id` header.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, user_id: &UserId) -> Result<Box<dyn SignalingLink>, TransportError> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

        let header = HeaderValue::from_str(user_id.as_str())
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        request.headers_mut().insert(USER_ID_HEADER, header);

        let (socket, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        debug!("WebSocket open to {} as {}", self.url, user_id);

        let (sender, receiver) = socket.split();
        Ok(Box::new(WsLink { sender, receiver }))
    }
}

struct WsLink {
    sender: SplitSink<WsStream, Message>,
    receiver: SplitStream<WsStream>,
}

impl WsLink {
    async fn send_frame(&mut self, frame: &ClientFrame) -> Result<(), String> {
        let json = serde_json::to_string(frame).map_err(|e| e.to_string())?;
        self.sender
            .send(Message::text(json))
            .await
            .map_err(|e| e.to_string())
    }
}

#[async_trait]
impl SignalingLink for WsLink {
    async fn subscribe(&mut self, channel: &Channel) -> Result<(), TransportError> {
        let frame = ClientFrame::Subscribe {
            channel: channel.clone(),
        };
        self.send_frame(&frame)
            .await
            .map_err(|reason| TransportError::Subscribe {
                channel: channel.clone(),
                reason,
            })
    }

    async fn publish(&mut self, destination: Destination, body: Value) -> Result<(), TransportError> {
        let frame = ClientFrame::Publish { destination, body };
        self.send_frame(&frame).await.map_err(TransportError::Publish)
    }

    async fn next_frame(&mut self) -> Option<Delivery> {
        while let Some(msg) = self.receiver.next().await {
            let text = match msg {
                Ok(Message::Text(text)) => text,
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => {
                    warn!("WebSocket read error: {}", e);
                    return None;
                }
            };

            match serde_json::from_str::<ServerFrame>(text.as_str()) {
                Ok(ServerFrame::Deliver { channel, body }) => {
                    return Some(Delivery { channel, body });
                }
                Ok(ServerFrame::Error { reason }) => {
                    warn!("Relay rejected a frame: {}", reason);
                }
                Err(e) => {
                    warn!("Unparseable server frame: {}", e);
                }
            }
        }
        None
    }

    async fn close(&mut self) {
        let _ = self.sender.close().await;
    }
}
