//! Session status and engine event vocabulary.
//!
//! This module owns the names that cross the boundary between the agent
//! and the embedding world engine, and the status record reported to
//! whoever drives the agent (CLI, supervisor, tests).
//!
//! ## Event names
//!
//! | Name             | Direction        | Payload                                |
//! |------------------|------------------|----------------------------------------|
//! | `entityAdded`    | engine → agent   | live entity                            |
//! | `entityModified` | engine → agent   | id, changed fields, live entity (opt.) |
//! | `entityRemoved`  | engine → agent   | id                                     |
//! | `disconnect`     | engine → agent   | reason string                          |
//!
//! The remote wire protocol behind the engine is not modelled here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Connection lifecycle
// ---------------------------------------------------------------------------

/// `Disconnected → Connecting → Bootstrapping → Connected → Disconnecting → Disconnected`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Bootstrapping,
    Connected,
    Disconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Bootstrapping => "bootstrapping",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub world_id: Option<String>,
    /// Session id assigned by the remote server, once known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_for_ms: Option<u64>,
    /// Reason of the most recent teardown or failed connect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub mod events {
    pub const ENTITY_ADDED: &str = "entityAdded";
    pub const ENTITY_MODIFIED: &str = "entityModified";
    pub const ENTITY_REMOVED: &str = "entityRemoved";
    pub const DISCONNECT: &str = "disconnect";
}

/// Loader asset kinds.
pub mod assets {
    pub const MODEL: &str = "model";
}
