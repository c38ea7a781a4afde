use anyhow::{Context, Result};
use beam_core::SignalMessage;
use beam_peer::SignalingOutput;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Opens the coordinator socket and returns the engine's two signaling ends:
/// where to send, and what arrives. The inbound stream ends when the socket
/// closes.
pub async fn connect(
    url: &str,
) -> Result<(Arc<dyn SignalingOutput>, mpsc::UnboundedReceiver<SignalMessage>)> {
    let (ws_stream, _) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to coordinator at {}", url))?;
    info!("Connected to coordinator at {}", url);

    let (mut write, mut read) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<SignalMessage>();
    let (in_tx, in_rx) = mpsc::unbounded_channel::<SignalMessage>();

    tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize {}: {}", msg.kind(), e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(text)).await {
                error!("Failed to send to coordinator: {}", e);
                break;
            }
        }
        let _ = write.close().await;
        debug!("Coordinator writer stopped");
    });

    tokio::spawn(async move {
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<SignalMessage>(&text) {
                    Ok(msg) => {
                        if in_tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Ignoring unparseable coordinator message: {}", e),
                },
                Ok(Message::Close(_)) => {
                    info!("Coordinator closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Coordinator socket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
        debug!("Coordinator reader stopped");
    });

    Ok((Arc::new(out_tx), in_rx))
}
