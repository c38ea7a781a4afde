use crate::transport::TransportConfig;
use std::time::Duration;

/// Sender backpressure thresholds. Sending pauses once the channel buffers
/// more than `high_water_mark` bytes and resumes at or below `low_water_mark`.
#[derive(Debug, Clone)]
pub struct PacingConfig {
    pub high_water_mark: usize,
    pub low_water_mark: usize,
    pub poll_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            high_water_mark: 1024 * 1024,
            low_water_mark: 256 * 1024,
            poll_interval: Duration::from_millis(10),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Bound on each negotiation phase: waiting for an answer after an offer,
    /// and waiting for the channel once descriptions are exchanged.
    pub negotiation_timeout: Duration,
    pub pacing: PacingConfig,
    pub transport: TransportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            negotiation_timeout: Duration::from_secs(30),
            pacing: PacingConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}
