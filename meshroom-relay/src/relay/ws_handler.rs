use crate::relay::relay_error::RelayError;
use crate::relay::relay_service::RelayService;
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt};
use meshroom_core::{ClientFrame, ProtocolError, UserId};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

pub const USER_ID_HEADER: &str = "x-user-id";

/// `GET /ws` on the given relay.
pub fn router(service: RelayService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws_handler))
        .layer(cors)
        .with_state(service)
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(service): State<RelayService>,
) -> Response {
    let user = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(UserId::from);

    let Some(user) = user else {
        warn!("WebSocket upgrade without {} header", USER_ID_HEADER);
        return (StatusCode::BAD_REQUEST, "missing X-User-Id header").into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, user, service))
}

async fn handle_socket(socket: WebSocket, user: UserId, service: RelayService) {
    info!("New WebSocket connection: {}", user);

    let (mut sender, mut receiver) = socket.split();
    let (conn_id, mut rx) = service.connect(user.clone());

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize server frame: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn({
        let service = service.clone();
        let user = user.clone();

        async move {
            while let Some(Ok(msg)) = receiver.next().await {
                match msg {
                    Message::Text(text) => {
                        let result = serde_json::from_str::<ClientFrame>(text.as_str())
                            .map_err(|e| RelayError::Protocol(ProtocolError::from(e)))
                            .and_then(|frame| service.handle_frame(&user, frame));

                        if let Err(e) = result {
                            service.reject(&user, &e);
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    };

    service.disconnect(&user, conn_id);
    info!("WebSocket disconnected: {}", user);
}
