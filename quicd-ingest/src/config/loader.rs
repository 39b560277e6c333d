//! Configuration loading and parsing.
//!
//! This module handles loading configuration from files, environment variables,
//! and command-line arguments, with proper precedence handling.

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config as ConfigLoader, Environment};
use std::path::{Path, PathBuf};

use super::IngestConfig;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "QUICD_INGEST";

/// Command-line interface for the replay tool.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to configuration file (TOML format)
    #[arg(long, short = 'c', default_value = "quicd-ingest.toml")]
    pub config: PathBuf,

    /// Datagram capture to replay, one `[ip:port] <hex>` record per line (stdin if omitted)
    #[arg(long, short = 'i')]
    pub input: Option<PathBuf>,

    /// Log level (overrides config file)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Decode headers only, skipping packet numbers, payloads and frames
    #[arg(long)]
    pub headers_only: bool,

    /// Re-encode every decoded packet and report whether it matches the input
    #[arg(long)]
    pub verify_roundtrip: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub validate: bool,

    /// Print default configuration and exit
    #[arg(long)]
    pub print_default_config: bool,
}

/// Load and validate configuration for already-parsed CLI arguments.
///
/// Precedence, lowest first:
/// 1. Default values
/// 2. Configuration file
/// 3. Environment variables (`QUICD_INGEST_` prefix, `__` between sections)
/// 4. Command-line arguments
pub fn load_config(cli: &CliArgs) -> Result<IngestConfig> {
    let mut config = load_config_file(&cli.config)?;

    apply_env_overrides(&mut config, Environment::with_prefix(ENV_PREFIX))?;
    apply_cli_overrides(&mut config, cli);

    config.validate().map_err(|errors| {
        anyhow::anyhow!("Configuration validation failed:\n{}", errors.join("\n"))
    })?;

    Ok(config)
}

/// Load configuration from a TOML file.
///
/// A missing file yields the defaults.
pub fn load_config_file(path: &Path) -> Result<IngestConfig> {
    if !path.exists() {
        tracing::warn!(
            config_path = %path.display(),
            "Configuration file not found, using defaults"
        );
        return Ok(IngestConfig::default());
    }

    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
}

/// Apply environment variable overrides.
///
/// Examples:
/// - `QUICD_INGEST_LOGGING__LEVEL=debug`
/// - `QUICD_INGEST_POOL__BUFFER_SIZE=9000`
pub fn apply_env_overrides(config: &mut IngestConfig, env: Environment) -> Result<()> {
    let env_config = ConfigLoader::builder()
        .add_source(env.prefix_separator("_").separator("__"))
        .build()
        .context("Failed to load environment variables")?;

    if let Ok(level) = env_config.get_string("logging.level") {
        match level.parse() {
            Ok(parsed) => config.logging.level = parsed,
            Err(e) => tracing::warn!(error = %e, "Ignoring logging.level from environment"),
        }
    }
    if let Ok(colors) = env_config.get_bool("logging.enable_colors") {
        config.logging.enable_colors = colors;
    }
    if let Ok(file_line) = env_config.get_bool("logging.include_file_line") {
        config.logging.include_file_line = file_line;
    }

    if let Some(v) = get_usize(&env_config, "pool.buffer_size")? {
        config.pool.buffer_size = v;
    }
    if let Some(v) = get_usize(&env_config, "pool.max_retained_buffers")? {
        config.pool.max_retained_buffers = v;
    }
    if let Some(v) = get_usize(&env_config, "pool.max_retained_objects")? {
        config.pool.max_retained_objects = v;
    }
    if let Some(v) = get_usize(&env_config, "encode.max_payload_size")? {
        config.encode.max_payload_size = v;
    }

    Ok(())
}

fn get_usize(env_config: &ConfigLoader, key: &str) -> Result<Option<usize>> {
    let Ok(raw) = env_config.get_string(key) else {
        return Ok(None);
    };
    let value = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {} in environment: {:?}", key, raw))?;
    Ok(Some(value))
}

/// Apply command-line argument overrides.
fn apply_cli_overrides(config: &mut IngestConfig, cli: &CliArgs) {
    if let Some(ref level_str) = cli.log_level {
        if let Ok(level) = level_str.parse() {
            config.logging.level = level;
        } else {
            tracing::warn!(level = %level_str, "Invalid log level specified, ignoring");
        }
    }
}

/// Render the default configuration in TOML format.
pub fn default_config_toml() -> Result<String> {
    toml::to_string_pretty(&IngestConfig::default()).context("Failed to serialize default config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    fn env_from(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        let mut config = IngestConfig::default();
        apply_env_overrides(
            &mut config,
            env_from(&[
                ("QUICD_INGEST_LOGGING__LEVEL", "trace"),
                ("QUICD_INGEST_POOL__BUFFER_SIZE", "9000"),
                ("QUICD_INGEST_ENCODE__MAX_PAYLOAD_SIZE", "4096"),
                ("UNRELATED_POOL__BUFFER_SIZE", "1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.logging.level, LogLevel::Trace);
        assert_eq!(config.pool.buffer_size, 9000);
        assert_eq!(config.encode.max_payload_size, 4096);
        assert_eq!(config.pool.max_retained_buffers, 2048);
    }

    #[test]
    fn test_env_invalid_number_is_an_error() {
        let mut config = IngestConfig::default();
        let err = apply_env_overrides(
            &mut config,
            env_from(&[("QUICD_INGEST_POOL__BUFFER_SIZE", "large")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("pool.buffer_size"));
    }

    #[test]
    fn test_cli_log_level_wins() {
        let mut config = IngestConfig::default();
        let cli = CliArgs {
            log_level: Some("error".to_string()),
            ..CliArgs::default()
        };
        apply_cli_overrides(&mut config, &cli);
        assert_eq!(config.logging.level, LogLevel::Error);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config_file(Path::new("/nonexistent/quicd-ingest.toml")).unwrap();
        assert_eq!(config.pool.buffer_size, 1500);
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = CliArgs::try_parse_from([
            "quicd-ingest",
            "-c",
            "custom.toml",
            "-i",
            "capture.txt",
            "--log-level",
            "debug",
            "--verify-roundtrip",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.input, Some(PathBuf::from("capture.txt")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.verify_roundtrip);
        assert!(!cli.headers_only);
    }

    #[test]
    fn test_default_config_toml_roundtrips() {
        let text = default_config_toml().unwrap();
        let parsed: IngestConfig = toml::from_str(&text).unwrap();
        assert!(parsed.validate().is_ok());
    }
}
