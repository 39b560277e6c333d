//! Configuration sections.
//!
//! Each section carries its own defaults and validation so the top-level
//! [`IngestConfig`](super::IngestConfig) only aggregates.

use quicd_wire::packet::DEFAULT_MAX_PAYLOAD_SIZE;
use quicd_wire::pool::{DEFAULT_BUFFER_SIZE, DEFAULT_MAX_RETAINED};
use quicd_wire::{PacketEncoder, PoolSettings};
use serde::{Deserialize, Serialize};

use super::validation::ConfigValidator;

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_UDP_PAYLOAD: usize = 65_527;

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    ///
    /// **Default:** `Info`
    pub level: LogLevel,

    /// Enable ANSI color codes in logs.
    ///
    /// Disable when logging to files or non-TTY outputs.
    ///
    /// **Default:** `true`
    pub enable_colors: bool,

    /// Include source file and line number in logs.
    ///
    /// **Default:** `false`
    pub include_file_line: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_colors: true,
            include_file_line: false,
        }
    }
}

/// Log level enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Buffer and object pool sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Capacity of every receive buffer in bytes.
    ///
    /// Datagrams larger than this are rejected before decoding.
    ///
    /// **Default:** `1500`
    pub buffer_size: usize,

    /// Maximum idle receive buffers kept for reuse.
    ///
    /// **Default:** `2048`
    pub max_retained_buffers: usize,

    /// Maximum idle header and packet objects kept per pool.
    ///
    /// **Default:** `2048`
    pub max_retained_objects: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_retained_buffers: DEFAULT_MAX_RETAINED,
            max_retained_objects: DEFAULT_MAX_RETAINED,
        }
    }
}

impl PoolConfig {
    pub fn settings(&self) -> PoolSettings {
        PoolSettings {
            buffer_size: self.buffer_size,
            max_retained_buffers: self.max_retained_buffers,
            max_retained_objects: self.max_retained_objects,
        }
    }
}

impl ConfigValidator for PoolConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.buffer_size == 0 {
            errors.push("pool.buffer_size must be > 0".to_string());
        }

        if self.buffer_size > MAX_UDP_PAYLOAD {
            errors.push(format!(
                "pool.buffer_size ({}) exceeds the maximum UDP payload ({})",
                self.buffer_size, MAX_UDP_PAYLOAD
            ));
        }

        if self.max_retained_buffers == 0 {
            errors.push("pool.max_retained_buffers must be > 0".to_string());
        }

        if self.max_retained_objects == 0 {
            errors.push("pool.max_retained_objects must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Encode path limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeConfig {
    /// Largest payload the packet encoder accepts.
    ///
    /// **Default:** `1024`
    pub max_payload_size: usize,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

impl EncodeConfig {
    pub fn encoder(&self) -> PacketEncoder {
        PacketEncoder::new(self.max_payload_size)
    }
}

impl ConfigValidator for EncodeConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        if self.max_payload_size == 0 {
            return Err(vec!["encode.max_payload_size must be > 0".to_string()]);
        }
        Ok(())
    }
}
