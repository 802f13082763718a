//! Collaborator seams: the embedding world engine, its entity registry, the
//! agent body and the asset loader.
//!
//! Nothing here is implemented by this crate except the headless surface
//! stand-ins; production builds plug in the real engine, tests and the
//! sandbox binary use [`crate::sim`].

use crate::error::EngineError;
use crate::input::InputEmulation;
use crate::physics::{ModelNode, PhysicsHandles};
use crate::protocol::{assets, events};
use crate::types::{AgentIdentity, Pose};
use futures::future::BoxFuture;
use glam::{Quat, Vec3};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A live object in the engine's entity registry.
///
/// Engines differ in what they expose: some hand out rich vector/quaternion
/// accessors, others only the raw data record. The rich accessors default
/// to `None` and the cache falls back to [`LiveEntity::data`].
pub trait LiveEntity: Send + Sync {
    fn id(&self) -> String;

    fn kind(&self) -> Option<String> {
        None
    }

    fn name(&self) -> Option<String> {
        None
    }

    fn position(&self) -> Option<Vec3> {
        None
    }

    fn rotation(&self) -> Option<Quat> {
        None
    }

    /// Underlying data record (`type`, `name`, `position`, `quaternion`, …).
    fn data(&self) -> serde_json::Value;
}

pub type EntityRef = Arc<dyn LiveEntity>;

#[derive(Clone)]
pub enum EntityEvent {
    Added(EntityRef),
    Modified {
        id: String,
        /// Only the fields that changed.
        changes: serde_json::Value,
        live: Option<EntityRef>,
    },
    Removed {
        id: String,
    },
}

impl EntityEvent {
    pub fn kind(&self) -> EntityEventKind {
        match self {
            EntityEvent::Added(_) => EntityEventKind::Added,
            EntityEvent::Modified { .. } => EntityEventKind::Modified,
            EntityEvent::Removed { .. } => EntityEventKind::Removed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityEventKind {
    Added,
    Modified,
    Removed,
}

impl EntityEventKind {
    pub const ALL: [EntityEventKind; 3] = [
        EntityEventKind::Added,
        EntityEventKind::Modified,
        EntityEventKind::Removed,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EntityEventKind::Added => events::ENTITY_ADDED,
            EntityEventKind::Modified => events::ENTITY_MODIFIED,
            EntityEventKind::Removed => events::ENTITY_REMOVED,
        }
    }
}

pub type EntityListener = Arc<dyn Fn(&EntityEvent) + Send + Sync>;
pub type DisconnectListener = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

// ---------------------------------------------------------------------------
// Agent body
// ---------------------------------------------------------------------------

/// The avatar this agent controls.
pub trait AgentBody: Send + Sync {
    /// World-space pose, `None` while the body does not exist.
    fn pose(&self) -> Option<Pose>;

    fn set_rotation(&self, rotation: Quat);
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Model,
}

impl AssetKind {
    pub fn name(self) -> &'static str {
        match self {
            AssetKind::Model => assets::MODEL,
        }
    }
}

pub trait Loader: Send + Sync {
    fn load<'a>(&'a self, kind: AssetKind, url: &'a str) -> BoxFuture<'a, Result<ModelNode, EngineError>>;
}

// ---------------------------------------------------------------------------
// Headless surface
// ---------------------------------------------------------------------------

/// Viewport and UI stand-ins for engines that expect a DOM to render into.
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessSurface {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    pub ui_enabled: bool,
}

impl Default for HeadlessSurface {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            pixel_ratio: 1.0,
            ui_enabled: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub ws_url: String,
    pub world_id: String,
    pub auth_token: Option<String>,
}

/// One engine instance per session.
pub trait WorldEngine: Send + Sync {
    fn install_input(&self, input: Arc<InputEmulation>);
    fn install_loader(&self, loader: Arc<dyn Loader>);
    fn install_surface(&self, surface: HeadlessSurface);

    fn init<'a>(&'a self, options: &'a InitOptions) -> BoxFuture<'a, Result<(), EngineError>>;

    /// Advance one frame. `now` is seconds since the session started.
    fn tick(&self, now: f64) -> Result<(), EngineError>;

    fn entities(&self) -> Vec<EntityRef>;
    fn entity(&self, id: &str) -> Option<EntityRef>;

    fn subscribe(&self, kind: EntityEventKind, listener: EntityListener) -> ListenerId;
    fn on_disconnect(&self, listener: DisconnectListener) -> ListenerId;
    fn unsubscribe(&self, id: ListenerId);

    /// Solver, scene and default material, once physics is ready.
    fn physics(&self) -> Option<PhysicsHandles>;

    fn agent_body(&self) -> Option<Arc<dyn AgentBody>>;

    /// Assigned by the remote server some time after init.
    fn session_id(&self) -> Option<String>;

    fn announce_identity<'a>(&'a self, identity: &'a AgentIdentity) -> BoxFuture<'a, Result<(), EngineError>>;

    /// Ask the network layer to close gracefully.
    fn close_network(&self);

    fn destroy(&self);
}

pub trait EngineFactory: Send + Sync {
    fn create(&self) -> Arc<dyn WorldEngine>;
}
