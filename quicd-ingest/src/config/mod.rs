//! Ingest configuration module.
//!
//! # Example
//!
//! ```toml
//! [logging]
//! level = "debug"
//! enable_colors = false
//!
//! [pool]
//! buffer_size = 1500
//! max_retained_buffers = 2048
//! max_retained_objects = 2048
//!
//! [encode]
//! max_payload_size = 1024
//! ```

pub mod loader;
pub mod settings;
pub mod validation;

pub use loader::{load_config, CliArgs};
pub use settings::{EncodeConfig, LogLevel, LoggingConfig, PoolConfig};
pub use validation::ConfigValidator;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the ingest pipeline and replay tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub logging: LoggingConfig,

    pub pool: PoolConfig,

    pub encode: EncodeConfig,
}

impl IngestConfig {
    /// Validate every section plus cross-section constraints.
    ///
    /// All violations are collected before returning.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = self.pool.validate() {
            errors.extend(e);
        }

        if let Err(e) = self.encode.validate() {
            errors.extend(e);
        }

        if let Err(e) = validation::validate_cross_section(self) {
            errors.extend(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
