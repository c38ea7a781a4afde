use crate::transport::{
    DataChannel, PeerTransport, TransportConfig, TransportConnector, TransportEvent,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use beam_core::{ClientId, Role};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::{API, APIBuilder};
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_init::RTCDataChannelInit;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::data_channel::data_channel_state::RTCDataChannelState;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const CHANNEL_LABEL: &str = "beam";

/// Builds webrtc-rs peer connections sharing one API instance.
pub struct WebRtcConnector {
    api: API,
    config: TransportConfig,
}

impl WebRtcConnector {
    pub fn new(config: TransportConfig) -> Result<Self> {
        // Codecs are registered even though only data channels are used.
        let mut media = MediaEngine::default();
        media.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut media)?;

        let api = APIBuilder::new()
            .with_media_engine(media)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, config })
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = self
            .config
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransportConnector for WebRtcConnector {
    async fn connect(
        &self,
        local: &ClientId,
        peer: &ClientId,
        role: Role,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn PeerTransport>> {
        debug!("Creating peer connection {} -> {} as {}", local, peer, role);
        let transport =
            WebRtcTransport::new(&self.api, self.rtc_configuration(), peer.clone(), role, events)
                .await?;
        Ok(Box::new(transport))
    }
}

pub struct WebRtcTransport {
    pub peer_id: ClientId,
    pub peer_connection: Arc<RTCPeerConnection>,
}

impl WebRtcTransport {
    /// Creates the peer connection and hooks its callbacks to `event_tx`.
    /// The initiator opens the ordered data channel; the responder waits for it.
    pub async fn new(
        api: &API,
        rtc_config: RTCConfiguration,
        peer_id: ClientId,
        role: Role,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = event_tx.clone();
        let state_peer = peer_id.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let peer = state_peer.clone();

                Box::pin(async move {
                    info!("Peer connection state for {} changed: {}", peer, s);
                    match s {
                        RTCPeerConnectionState::Failed
                        | RTCPeerConnectionState::Disconnected
                        | RTCPeerConnectionState::Closed => {
                            let _ = tx.send(TransportEvent::Disconnected(peer)).await;
                        }
                        _ => {}
                    }
                })
            },
        ));

        let ice_tx = event_tx.clone();
        let ice_peer = peer_id.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let peer = ice_peer.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let Ok(value) = serde_json::to_value(&init) else {
                    return;
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(peer, value))
                    .await;
            })
        }));

        match role {
            Role::Initiator => {
                let init = RTCDataChannelInit {
                    ordered: Some(true),
                    ..Default::default()
                };
                let channel = peer_connection
                    .create_data_channel(CHANNEL_LABEL, Some(init))
                    .await
                    .context("Failed to create data channel")?;
                wire_data_channel(channel, peer_id.clone(), event_tx);
            }
            Role::Responder => {
                let dc_peer = peer_id.clone();
                peer_connection.on_data_channel(Box::new(move |channel: Arc<RTCDataChannel>| {
                    let tx = event_tx.clone();
                    let peer = dc_peer.clone();

                    Box::pin(async move {
                        debug!("Remote opened data channel '{}' for {}", channel.label(), peer);
                        wire_data_channel(channel, peer, tx);
                    })
                }));
            }
        }

        Ok(Self {
            peer_id,
            peer_connection,
        })
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn create_offer(&self) -> Result<Value> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(serde_json::to_value(&offer)?)
    }

    async fn accept_offer(&self, offer: Value) -> Result<Value> {
        let offer: RTCSessionDescription =
            serde_json::from_value(offer).context("Failed to parse offer description")?;
        self.peer_connection.set_remote_description(offer).await?;

        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(serde_json::to_value(&answer)?)
    }

    async fn apply_answer(&self, answer: Value) -> Result<()> {
        let answer: RTCSessionDescription =
            serde_json::from_value(answer).context("Failed to parse answer description")?;
        self.peer_connection.set_remote_description(answer).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: Value) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_value(candidate).context("Failed to parse ICE candidate JSON")?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

fn wire_data_channel(
    channel: Arc<RTCDataChannel>,
    peer_id: ClientId,
    event_tx: mpsc::Sender<TransportEvent>,
) {
    let open_channel = channel.clone();
    let open_tx = event_tx.clone();
    let open_peer = peer_id.clone();
    channel.on_open(Box::new(move || {
        Box::pin(async move {
            info!("DataChannel open for peer {}", open_peer);
            let ready: Arc<dyn DataChannel> = open_channel;
            let _ = open_tx
                .send(TransportEvent::DataChannelReady(open_peer, ready))
                .await;
        })
    }));

    channel.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = event_tx.clone();
        let peer = peer_id.clone();
        Box::pin(async move {
            let _ = tx.send(TransportEvent::Message(peer, msg.data)).await;
        })
    }));
}

#[async_trait]
impl DataChannel for RTCDataChannel {
    fn label(&self) -> String {
        RTCDataChannel::label(self).to_owned()
    }

    fn is_open(&self) -> bool {
        self.ready_state() == RTCDataChannelState::Open
    }

    async fn buffered_amount(&self) -> usize {
        RTCDataChannel::buffered_amount(self).await
    }

    async fn send(&self, frame: Bytes) -> Result<()> {
        RTCDataChannel::send(self, &frame).await?;
        Ok(())
    }
}

impl std::fmt::Debug for WebRtcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebRtcTransport")
            .field("peer_id", &self.peer_id)
            .finish_non_exhaustive()
    }
}
