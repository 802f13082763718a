//! Core agent types shared across all modules.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

/// Entity `type` carried by avatars controlled by a human or another agent.
pub const PLAYER_KIND: &str = "player";

// ---------------------------------------------------------------------------
// Entity snapshots
// ---------------------------------------------------------------------------

/// Plain-data snapshot of a live engine object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: Option<String>,
    pub position: [f32; 3],
    /// Quaternion, `[x, y, z, w]`.
    pub rotation: [f32; 4],
}

impl EntityState {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn is_player(&self) -> bool {
        self.kind == PLAYER_KIND
    }

    pub fn position_vec(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }
}

// ---------------------------------------------------------------------------
// Pose & navigation
// ---------------------------------------------------------------------------

/// World-space pose of the agent body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Body facing a yaw angle (radians, counter-clockwise seen from +Y).
    pub fn facing_yaw(position: Vec3, yaw: f32) -> Self {
        Self::new(position, Quat::from_rotation_y(yaw))
    }

    /// Forward axis. Avatars face -Z in their local frame.
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }
}

/// Ground-plane goal of a navigation leg.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavigationTarget {
    pub x: f32,
    pub z: f32,
}

impl NavigationTarget {
    pub fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.z.is_finite()
    }
}

impl std::fmt::Display for NavigationTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.z)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ConnectionSession {
    pub ws_url: String,
    pub world_id: String,
    pub auth_token: Option<String>,
    pub is_connected: bool,
    pub connected_at: Option<SystemTime>,
}

impl ConnectionSession {
    pub fn new(connect: &ConnectConfig) -> Self {
        Self {
            ws_url: connect.ws_url.clone(),
            world_id: connect.world_id.clone(),
            auth_token: connect.auth_token.clone(),
            is_connected: false,
            connected_at: None,
        }
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("ws_url", &self.ws_url)
            .field("world_id", &self.world_id)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("is_connected", &self.is_connected)
            .field("connected_at", &self.connected_at)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub entities: usize,
    pub named_players: usize,
    pub ticks_faulted: u64,
    pub appearance_announced: bool,
    pub bootstrap: Option<crate::bootstrap::BootstrapReport>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub connect: ConnectConfig,
    pub runtime: RuntimeConfig,
    pub navigation: NavigationConfig,
    pub random_walk: RandomWalkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectConfig {
    /// Websocket endpoint of the remote simulation server.
    pub ws_url: String,
    /// World / session to join.
    pub world_id: String,
    /// Optional bearer token handed to engine init.
    pub auth_token: Option<String>,
    /// Environment model registered as static collision geometry.
    pub environment_url: Option<String>,
    pub identity: AgentIdentity,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://localhost:3000/ws".into(),
            world_id: "default".into(),
            auth_token: None,
            environment_url: None,
            identity: AgentIdentity::default(),
        }
    }
}

/// Name and appearance announced once the agent body exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentIdentity {
    pub name: String,
    pub avatar_url: Option<String>,
}

impl Default for AgentIdentity {
    fn default() -> Self {
        Self {
            name: "agent".into(),
            avatar_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// World tick rate in Hz.
    pub tick_rate_hz: f32,
    /// Period of the entity/pose consistency resync.
    pub entity_sync_interval_ms: u64,
    /// Retry period of the identity/appearance announcement.
    pub appearance_retry_ms: u64,
    /// How long bootstrap waits for the engine's physics handles.
    pub physics_ready_timeout_ms: u64,
    pub physics_poll_ms: u64,
    /// Substrings identifying tick faults that are known to be harmless.
    pub benign_tick_errors: Vec<String>,
    /// At most one benign-fault report per window.
    pub benign_log_window_ms: u64,
}

impl RuntimeConfig {
    /// Non-finite rates fall back to the default.
    pub fn tick_period(&self) -> Duration {
        let hz = if self.tick_rate_hz.is_finite() {
            self.tick_rate_hz
        } else {
            RuntimeConfig::default().tick_rate_hz
        };
        Duration::from_secs_f32(1.0 / hz.clamp(1.0, 240.0))
    }

    pub fn entity_sync_interval(&self) -> Duration {
        Duration::from_millis(self.entity_sync_interval_ms.max(1))
    }

    pub fn appearance_retry(&self) -> Duration {
        Duration::from_millis(self.appearance_retry_ms.max(1))
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30.0,
            entity_sync_interval_ms: 1_000,
            appearance_retry_ms: 2_000,
            physics_ready_timeout_ms: 10_000,
            physics_poll_ms: 50,
            benign_tick_errors: vec!["matrixWorld".into(), "not ready".into()],
            benign_log_window_ms: 10_000,
        }
    }
}

/// How a leg turns the body toward its heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStrategy {
    /// Turn in place past `turn_threshold_deg`, nudge while walking past
    /// `forward_tolerance_deg`.
    #[default]
    SignedAngle,
    /// Rotate the body to face the heading outright, then walk.
    Snap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub tick_interval_ms: u64,
    /// Planar distance at which a leg counts as arrived.
    pub stop_distance: f32,
    pub turn_threshold_deg: f32,
    pub forward_tolerance_deg: f32,
    pub strategy: TurnStrategy,
}

impl NavigationConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            stop_distance: 1.0,
            turn_threshold_deg: 45.0,
            forward_tolerance_deg: 10.0,
            strategy: TurnStrategy::SignedAngle,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomWalkConfig {
    /// Pause between legs.
    pub interval_ms: u64,
    /// Upper bound of the sampled radius.
    pub max_distance: f32,
}

impl RandomWalkConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RandomWalkConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            max_distance: 7.0,
        }
    }
}
