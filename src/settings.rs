//! Layered configuration.
//!
//! | Layer (low → high) | Source                                            |
//! |--------------------|---------------------------------------------------|
//! | defaults           | `Default` impls in `types.rs`                     |
//! | file               | optional TOML file                                |
//! | environment        | `AGENT_<SECTION>__<KEY>`, e.g. `AGENT_CONNECT__WS_URL` |
//!
//! CLI flags are applied on top by the binary.

use crate::error::{AgentError, Result};
use crate::types::AgentConfig;
use config::{Config, Environment, File, FileFormat};
use std::path::Path;

pub const ENV_PREFIX: &str = "AGENT";

pub fn load_config(path: Option<&Path>) -> Result<AgentConfig> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }
    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    let config: AgentConfig = config.try_deserialize()?;
    validate(&config)?;
    Ok(config)
}

/// Reject numeric settings the runtime cannot schedule with.
pub fn validate(config: &AgentConfig) -> Result<()> {
    let hz = config.runtime.tick_rate_hz;
    if !hz.is_finite() || hz <= 0.0 {
        return Err(AgentError::InvalidArgument(format!(
            "runtime.tick_rate_hz must be a positive number, got {}",
            hz
        )));
    }
    let radius = config.random_walk.max_distance;
    if !radius.is_finite() || radius <= 0.0 {
        return Err(AgentError::InvalidArgument(format!(
            "random_walk.max_distance must be a positive number, got {}",
            radius
        )));
    }
    Ok(())
}
