use super::*;
use anyhow::{anyhow, Result};

/// Validate the complete configuration
pub fn validate_config(config: &SupervisorConfig) -> Result<()> {
    validate_timing(config)?;
    validate_environment(&config.environment)?;
    Ok(())
}

fn validate_timing(config: &SupervisorConfig) -> Result<()> {
    if config.startup_timeout.is_zero() {
        return Err(anyhow!("Startup timeout must be greater than 0"));
    }

    if config.poll_interval.is_zero() {
        return Err(anyhow!("Health poll interval must be greater than 0"));
    }

    if config.probe_timeout.is_zero() {
        return Err(anyhow!("Health probe timeout must be greater than 0"));
    }

    if config.probe_timeout > config.startup_timeout {
        return Err(anyhow!(
            "Health probe timeout ({:?}) must not exceed the startup timeout ({:?})",
            config.probe_timeout,
            config.startup_timeout
        ));
    }

    Ok(())
}

fn validate_environment(environment: &BTreeMap<String, String>) -> Result<()> {
    for (key, value) in environment {
        if key.is_empty() {
            return Err(anyhow!("Environment variable name cannot be empty"));
        }
        if key.contains('=') || key.contains('\0') {
            return Err(anyhow!("Invalid environment variable name: {:?}", key));
        }
        if value.contains('\0') {
            return Err(anyhow!("Environment variable {} contains a NUL byte", key));
        }
    }
    Ok(())
}
