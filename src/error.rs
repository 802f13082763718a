//! Error types for the engine seams, the physics seams and the public API.

use thiserror::Error;

/// Failures reported by the world engine or the asset loader.
#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("engine init failed: {0}")]
    Init(String),

    #[error("tick fault: {0}")]
    Tick(String),

    #[error("asset load failed for {url}: {reason}")]
    Asset { url: String, reason: String },

    #[error("announcement rejected: {0}")]
    Announce(String),

    #[error("{0}")]
    Other(String),
}

/// Failures reported by the external physics solver or scene.
#[derive(Debug, Clone, Error)]
pub enum PhysicsError {
    #[error("mesh cooking failed: {0}")]
    Cooking(String),

    #[error("shape creation failed: {0}")]
    Shape(String),

    #[error("actor creation failed: {0}")]
    Actor(String),

    #[error("scene rejected actor: {0}")]
    Scene(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    /// No active session, no agent body, no physics handles.
    #[error("prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The session being built was torn down before it finished connecting.
    #[error("session was superseded while connecting")]
    SessionSuperseded,

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T, E = AgentError> = std::result::Result<T, E>;
