use beam_core::SignalMessage;
use beam_server::Coordinator;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{SIGNAL_TIMEOUT_MS, new_coordinator};

/// Starts a coordinator on an ephemeral local port.
pub async fn spawn_server() -> (SocketAddr, Coordinator) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    let coordinator = new_coordinator();

    tokio::spawn(beam_server::serve_on(listener, coordinator.clone()));
    (addr, coordinator)
}

/// A real WebSocket client speaking the control protocol.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        let url = format!("ws://{}/ws", addr);
        let (stream, _) = connect_async(url.as_str())
            .await
            .expect("websocket connect");
        Self { stream }
    }

    pub async fn send(&mut self, message: &SignalMessage) {
        let text = serde_json::to_string(message).expect("serialize signal");
        self.send_raw(&text).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string()))
            .await
            .expect("websocket send");
    }

    pub async fn recv(&mut self) -> SignalMessage {
        let deadline = Duration::from_millis(SIGNAL_TIMEOUT_MS * 2);
        tokio::time::timeout(deadline, async {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => {
                        return serde_json::from_str::<SignalMessage>(&text)
                            .expect("server sent invalid signal");
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => panic!("websocket error: {}", e),
                    None => panic!("websocket closed"),
                }
            }
        })
        .await
        .expect("timed out waiting for websocket signal")
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}
