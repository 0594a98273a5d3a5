//! Centralized configuration for Rivulet.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::RivuletError;

/// Central configuration for all Rivulet components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct RivuletConfig {
    pub server: ServerConfig,
    pub streaming: StreamingConfig,
    pub simulation: SimulationConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server binds to
    pub bind_address: IpAddr,
    /// Port the HTTP server listens on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 9000,
        }
    }
}

impl ServerConfig {
    /// Socket address assembled from bind address and port.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}

/// Byte stream configuration for file reads.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Upper bound on the size of a single body chunk
    pub chunk_size: u32,
    /// How long one stream may stay suspended on a single missing piece
    pub idle_timeout: Duration,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,                   // 64 KiB
            idle_timeout: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Simulated swarm configuration for development and testing.
///
/// Controls how quickly and in which order the simulated swarm delivers
/// wanted pieces into the in-memory piece store.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Piece length used when building torrents from local directories
    pub piece_length: u32,
    /// Delay between delivery rounds
    pub tick_interval: Duration,
    /// Maximum pieces delivered per round
    pub pieces_per_tick: u32,
    /// Number of leading candidates a round picks from at random
    pub arrival_window: u32,
    /// Deterministic seed for reproducible arrival order
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            piece_length: 256 * 1024, // 256 KiB
            tick_interval: Duration::from_millis(100),
            pieces_per_tick: 4,
            arrival_window: 8,
            seed: None,
        }
    }
}

impl SimulationConfig {
    /// Creates a configuration for deterministic testing.
    pub fn deterministic_testing() -> Self {
        Self {
            piece_length: 16,
            tick_interval: Duration::from_millis(1),
            pieces_per_tick: 1,
            arrival_window: 1, // Strictly in-order arrival
            seed: Some(42),
        }
    }
}

impl RivuletConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary key lookup.
    ///
    /// Unparsable values are ignored with a warning and the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(address) = parse_var::<IpAddr>(&lookup, "RIVULET_BIND") {
            config.server.bind_address = address;
        }
        if let Some(port) = parse_var::<u16>(&lookup, "RIVULET_PORT") {
            config.server.port = port;
        }

        if let Some(chunk_size) = parse_var::<u32>(&lookup, "RIVULET_CHUNK_SIZE") {
            config.streaming.chunk_size = chunk_size;
        }
        if let Some(seconds) = parse_var::<u64>(&lookup, "RIVULET_IDLE_TIMEOUT_SECS") {
            config.streaming.idle_timeout = Duration::from_secs(seconds);
        }

        if let Some(piece_length) = parse_var::<u32>(&lookup, "RIVULET_PIECE_LENGTH") {
            config.simulation.piece_length = piece_length;
        }
        if let Some(millis) = parse_var::<u64>(&lookup, "RIVULET_TICK_MS") {
            config.simulation.tick_interval = Duration::from_millis(millis);
        }
        if let Some(count) = parse_var::<u32>(&lookup, "RIVULET_PIECES_PER_TICK") {
            config.simulation.pieces_per_tick = count;
        }
        if let Some(seed) = parse_var::<u64>(&lookup, "RIVULET_SEED") {
            config.simulation.seed = Some(seed);
        }

        config
    }

    /// Rejects settings that would stall or break streaming.
    ///
    /// # Errors
    ///
    /// - `RivuletError::Configuration` - If a size, count or interval is zero
    pub fn validate(&self) -> Result<(), RivuletError> {
        let checks = [
            (self.streaming.chunk_size == 0, "streaming chunk size must be positive"),
            (
                self.streaming.idle_timeout.is_zero(),
                "streaming idle timeout must be positive",
            ),
            (self.simulation.piece_length == 0, "piece length must be positive"),
            (
                self.simulation.tick_interval.is_zero(),
                "simulation tick interval must be positive",
            ),
            (
                self.simulation.pieces_per_tick == 0,
                "pieces per tick must be positive",
            ),
            (
                self.simulation.arrival_window == 0,
                "arrival window must be positive",
            ),
        ];

        match checks.iter().find(|(failed, _)| *failed) {
            Some((_, reason)) => Err(RivuletError::Configuration {
                reason: (*reason).to_string(),
            }),
            None => Ok(()),
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration override");
            None
        }
    }
}
