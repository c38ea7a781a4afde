mod progress;
mod receive;
mod send;
mod signaling_client;

use anyhow::Result;
use beam_core::RoomId;
use beam_peer::{EngineConfig, PeerEngine, PeerEngineHandle, PeerEvent, WebRtcConnector};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beam")]
#[command(about = "Send files straight to another machine over a WebRTC data channel")]
struct Cli {
    /// Coordinator WebSocket URL
    #[arg(long, env = "BEAM_SERVER", default_value = "ws://localhost:8080/ws", global = true)]
    server: String,

    #[arg(long = "log", env = "RUST_LOG", default_value = "warn", global = true)]
    log_filter: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Offer files to whoever joins the room
    Send {
        /// Room code to use; a fresh one is generated if omitted
        #[arg(short, long)]
        room: Option<String>,

        /// Exit after this many peers received every file
        #[arg(long, default_value_t = 1)]
        peers: usize,

        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Join a room and save whatever arrives
    Receive {
        #[arg(short, long)]
        room: String,

        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// Exit after this many files; runs until Ctrl-C if omitted
        #[arg(long)]
        count: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log_filter))
        .init();

    match cli.command {
        Commands::Send { room, peers, files } => {
            let room_id = room.map(RoomId::from).unwrap_or_else(RoomId::generate);
            send::run(&cli.server, room_id, files, peers).await
        }
        Commands::Receive { room, out, count } => {
            receive::run(&cli.server, RoomId::from(room), out, count).await
        }
    }
}

pub(crate) struct RunningEngine {
    pub handle: PeerEngineHandle,
    pub events: mpsc::UnboundedReceiver<PeerEvent>,
    task: JoinHandle<()>,
}

impl RunningEngine {
    /// Connects to the coordinator and starts a webrtc-backed engine in
    /// `room_id`.
    pub async fn start(server: &str, room_id: &RoomId) -> Result<Self> {
        let config = EngineConfig::default();
        let connector = WebRtcConnector::new(config.transport.clone())?;
        let (signaling, inbound) = signaling_client::connect(server).await?;

        let (engine, handle, events) = PeerEngine::new(
            room_id.clone(),
            Arc::new(connector),
            signaling,
            inbound,
            config,
        );

        Ok(Self {
            handle,
            events,
            task: tokio::spawn(engine.run()),
        })
    }

    pub async fn stop(self) -> Result<()> {
        self.handle.shutdown().await;
        self.task.await?;
        Ok(())
    }
}
