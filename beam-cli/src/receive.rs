use crate::{RunningEngine, progress};
use anyhow::{Context, Result};
use beam_core::RoomId;
use beam_core::format::format_size;
use beam_peer::{PeerEvent, ReceivedFile};
use colored::*;
use std::path::{Path, PathBuf};

const FALLBACK_NAME: &str = "received.bin";

pub async fn run(server: &str, room_id: RoomId, out: PathBuf, count: Option<usize>) -> Result<()> {
    tokio::fs::create_dir_all(&out)
        .await
        .with_context(|| format!("Failed to create {}", out.display()))?;

    println!("{}", "🚀 Waiting for files...".green().bold());
    println!("   🔑 Room code: {}", room_id.as_str().yellow().bold());
    println!("   📂 Saving to: {}", out.display());

    let mut engine = RunningEngine::start(server, &room_id).await?;
    let mut saved = 0;

    loop {
        tokio::select! {
            event = engine.events.recv() => {
                let Some(event) = event else { break };
                match event {
                    PeerEvent::PeerDiscovered { peer_id, .. } => {
                        println!("{} {}", "🤝 Found peer".cyan(), peer_id);
                    }
                    PeerEvent::Transfer { transfer, .. } => progress::render(&transfer),
                    PeerEvent::FileReceived { file, .. } => {
                        let path = save(&out, &file).await?;
                        println!(
                            "   📥 {} ({})",
                            path.display(),
                            format_size(file.metadata.size)
                        );
                        saved += 1;
                        if count.is_some_and(|count| saved >= count) {
                            break;
                        }
                    }
                    PeerEvent::PeerLeft { peer_id } => {
                        println!("{} {}", "👋 Peer left:".dimmed(), peer_id);
                    }
                    PeerEvent::ServerError { message } => {
                        println!("{}", format!("⚠ Coordinator: {}", message).yellow());
                    }
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        }
    }

    println!("{}", format!("✨ Received {} file(s)", saved).green().bold());
    engine.stop().await
}

async fn save(out: &Path, file: &ReceivedFile) -> Result<PathBuf> {
    let name = safe_file_name(&file.metadata.name);
    let mut target = out.join(&name);
    let mut attempt = 1;
    while tokio::fs::try_exists(&target).await? {
        target = out.join(numbered(&name, attempt));
        attempt += 1;
    }

    tokio::fs::write(&target, &file.data)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(target)
}

/// Strips any directory part the sender put in the name.
fn safe_file_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty() && n != "." && n != "..")
        .unwrap_or_else(|| FALLBACK_NAME.to_owned())
}

fn numbered(name: &str, attempt: usize) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{} ({}).{}", stem, attempt, ext),
        _ => format!("{} ({})", name, attempt),
    }
}
