use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Engine section exists (enforced by serde)
/// - Engine URL is not empty
/// - Server port is not 0
/// - Worker poll interval is not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.engine.url.is_empty() {
        return Err(ConfigError::ValidationError(
            "engine.url cannot be empty".to_string(),
        ));
    }

    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.worker.enabled && config.worker.poll_interval_ms == 0 {
        return Err(ConfigError::ValidationError(
            "worker.poll_interval_ms cannot be 0".to_string(),
        ));
    }

    Ok(())
}
