//! Configuration validation utilities.

use super::IngestConfig;

/// Configuration validator trait.
pub trait ConfigValidator {
    /// Validate the configuration.
    ///
    /// Returns `Ok(())` if valid, or a list of error messages if invalid.
    fn validate(&self) -> Result<(), Vec<String>>;
}

/// Cross-section checks that no single section can make on its own.
pub fn validate_cross_section(config: &IngestConfig) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    // Re-encoded packets are written into pooled receive buffers.
    if config.encode.max_payload_size >= config.pool.buffer_size {
        errors.push(format!(
            "encode.max_payload_size ({}) must be smaller than pool.buffer_size ({})",
            config.encode.max_payload_size, config.pool.buffer_size
        ));
    }

    if config.pool.max_retained_objects < config.pool.max_retained_buffers / 4 {
        tracing::warn!(
            objects = config.pool.max_retained_objects,
            buffers = config.pool.max_retained_buffers,
            "pool.max_retained_objects is much smaller than pool.max_retained_buffers; \
             packet objects will be reallocated under bursts"
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
