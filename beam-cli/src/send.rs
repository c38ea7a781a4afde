use crate::{RunningEngine, progress};
use anyhow::Result;
use beam_core::format::format_size;
use beam_core::{ClientId, RoomId, SessionState, TransferId, TransferStatus};
use beam_peer::{OutgoingFile, PeerEngineHandle, PeerEvent};
use colored::*;
use std::collections::VecDeque;
use std::path::PathBuf;

/// Files going to one peer, strictly one after another.
struct Delivery {
    peer: ClientId,
    next_file: usize,
    in_flight: Option<TransferId>,
}

struct Dispatcher {
    files: Vec<OutgoingFile>,
    waiting: VecDeque<ClientId>,
    current: Option<Delivery>,
    served: usize,
}

impl Dispatcher {
    fn new(files: Vec<OutgoingFile>) -> Self {
        Self {
            files,
            waiting: VecDeque::new(),
            current: None,
            served: 0,
        }
    }

    fn peer_ready(&mut self, peer: ClientId) {
        if !self.waiting.contains(&peer) {
            self.waiting.push_back(peer);
        }
    }

    fn peer_gone(&mut self, peer: &ClientId) {
        self.waiting.retain(|p| p != peer);
        if self.current.as_ref().is_some_and(|d| &d.peer == peer) {
            self.current = None;
        }
    }

    fn transfer_finished(&mut self, id: &TransferId, status: TransferStatus) {
        let Some(delivery) = self.current.as_mut() else {
            return;
        };
        if delivery.in_flight.as_ref() != Some(id) {
            return;
        }
        delivery.in_flight = None;

        if status == TransferStatus::Error {
            println!("{}", format!("✗ Giving up on {}", delivery.peer).red());
            self.current = None;
        }
    }

    /// Starts the next file if nothing is in flight.
    async fn pump(&mut self, handle: &PeerEngineHandle) {
        loop {
            if self.current.is_none() {
                let Some(peer) = self.waiting.pop_front() else {
                    return;
                };
                println!("{} {}", "🤝 Sending to".cyan(), peer);
                self.current = Some(Delivery {
                    peer,
                    next_file: 0,
                    in_flight: None,
                });
            }

            let Some(delivery) = self.current.as_mut() else {
                return;
            };
            if delivery.in_flight.is_some() {
                return;
            }

            let Some(file) = self.files.get(delivery.next_file) else {
                println!("{} {}", "✨ All files delivered to".green().bold(), delivery.peer);
                self.served += 1;
                self.current = None;
                continue;
            };

            match handle.send_file(&delivery.peer, file.clone()).await {
                Ok(id) => {
                    delivery.in_flight = Some(id);
                    delivery.next_file += 1;
                    return;
                }
                Err(e) => {
                    println!("{}", format!("✗ Cannot send to {}: {}", delivery.peer, e).red());
                    self.current = None;
                }
            }
        }
    }
}

pub async fn run(server: &str, room_id: RoomId, paths: Vec<PathBuf>, peers: usize) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        files.push(OutgoingFile::from_path(path).await?);
    }
    let total: u64 = files.iter().map(|f| f.data.len() as u64).sum();

    println!("{}", "🚀 Starting beam...".green().bold());
    println!(
        "   📦 {} file(s), {}",
        files.len(),
        format_size(total)
    );
    println!("   🔑 Room code: {}", room_id.as_str().yellow().bold());
    println!("   On the other machine run: beam receive --room {}", room_id);

    let mut engine = RunningEngine::start(server, &room_id).await?;
    let mut dispatcher = Dispatcher::new(files);

    loop {
        tokio::select! {
            event = engine.events.recv() => {
                let Some(event) = event else { break };
                match event {
                    PeerEvent::Joined { peer_count, .. } => {
                        let line = format!("📡 Joined room ({} peer(s) waiting)", peer_count);
                        println!("{}", line.cyan());
                    }
                    PeerEvent::SessionChanged { peer_id, state: SessionState::Open } => {
                        dispatcher.peer_ready(peer_id);
                    }
                    PeerEvent::SessionChanged { peer_id, state } if state.is_terminal() => {
                        dispatcher.peer_gone(&peer_id);
                    }
                    PeerEvent::Transfer { transfer, .. } => {
                        progress::render(&transfer);
                        if transfer.is_terminal() {
                            dispatcher.transfer_finished(&transfer.id, transfer.status);
                        }
                    }
                    PeerEvent::ServerError { message } => {
                        println!("{}", format!("⚠ Coordinator: {}", message).yellow());
                    }
                    _ => {}
                }

                dispatcher.pump(&engine.handle).await;
                if dispatcher.served >= peers {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    engine.stop().await
}
