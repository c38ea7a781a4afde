use beam_core::format::{format_size, format_speed};
use beam_core::{Transfer, TransferDirection, TransferStatus};
use colored::*;
use std::io::Write;

const BAR_WIDTH: usize = 30;

/// Redraws the progress line for `transfer`, ending it once the transfer is
/// terminal.
pub fn render(transfer: &Transfer) {
    let arrow = match transfer.direction {
        TransferDirection::Outgoing => "⬆",
        TransferDirection::Incoming => "⬇",
    };

    let filled = ((transfer.progress / 100.0) * BAR_WIDTH as f64).round() as usize;
    let bar = format!(
        "{}{}",
        "█".repeat(filled.min(BAR_WIDTH)),
        "░".repeat(BAR_WIDTH - filled.min(BAR_WIDTH))
    );

    let line = format!(
        "\r{} {} [{}] {:>5.1}%  {} / {}  {}",
        arrow,
        transfer.file_name.bold(),
        bar.cyan(),
        transfer.progress,
        format_size(transfer.bytes_moved),
        format_size(transfer.total_size),
        format_speed(transfer.speed).dimmed(),
    );

    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "{}", line);

    match transfer.status {
        TransferStatus::Completed => {
            let _ = writeln!(stdout, "  {}", "done".green().bold());
        }
        TransferStatus::Error => {
            let reason = transfer.error.as_deref().unwrap_or("unknown error");
            let _ = writeln!(stdout, "  {}", format!("failed: {}", reason).red().bold());
        }
        TransferStatus::Pending | TransferStatus::Transferring => {}
    }
    let _ = stdout.flush();
}
