use crate::room::ClientConnection;
use crate::signaling::{ClientSession, Coordinator};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tracing::{error, info};

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(coordinator): State<Coordinator>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, coordinator))
}

pub async fn health() -> &'static str {
    "ok"
}

async fn handle_socket(socket: WebSocket, coordinator: Coordinator) {
    info!("New WebSocket connection");

    let (mut sender, mut receiver) = socket.split();
    let (connection, mut rx) = ClientConnection::channel();

    let mut send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize signal message: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = ClientSession::new(connection);

    let recv_loop = async {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    coordinator.dispatch(&mut session, text.as_str()).await;
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = (&mut send_task) => {}
        _ = recv_loop => {}
    };

    send_task.abort();
    coordinator.disconnect(&mut session).await;
    info!("WebSocket disconnected");
}
