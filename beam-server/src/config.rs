use clap::Parser;
use std::net::{IpAddr, SocketAddr};

/// Listener settings for the coordinator.
#[derive(Parser, Debug, Clone)]
#[command(name = "beam-server", version, about = "Room rendezvous and signaling relay")]
pub struct ServerConfig {
    #[arg(long, env = "BEAM_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Log filter, e.g. `info` or `beam_server=debug`.
    #[arg(long = "log", env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

impl ServerConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
            log_filter: "info".into(),
        }
    }
}
