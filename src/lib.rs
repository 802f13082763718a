//! Agent Body
//!
//! Gives an autonomous agent a persistent avatar inside a live multiplayer
//! 3D world: one session against the remote simulation server, a local
//! mirror of world entities, and movement driven purely by emulated input
//! buttons that the embedding engine's locomotion reads every tick.
//!
//! ## Architecture
//!
//! ```text
//! AgentLink  (lifecycle.rs)          ← session state machine, periodic tasks
//!   ├── WorldEngine  (engine.rs)     ← external collaborator, one per session
//!   │     ├── InputEmulation  (input.rs)
//!   │     └── Loader ──► bootstrap.rs ──► PhysicsSolver / PhysicsScene  (physics.rs)
//!   ├── EntityCache  (cache.rs)      ← fed by engine entity events + resync
//!   └── Navigator  (navigation.rs)   ← goto / random walk, writes InputEmulation
//! ```
//!
//! The `sandbox` feature (on by default) adds [`sim`], a headless local
//! engine used by the binary and the integration tests.

pub mod bootstrap;
pub mod cache;
pub mod cancel;
pub mod engine;
pub mod error;
pub mod input;
pub mod lifecycle;
pub mod navigation;
pub mod physics;
pub mod protocol;
pub mod settings;
pub mod types;

#[cfg(feature = "sandbox")]
pub mod sim;

// Convenience re-exports
pub use bootstrap::{bootstrap_static_physics, BootstrapReport};
pub use cache::{EntityCache, PlayerNameMap};
pub use cancel::CancelToken;
pub use engine::{AgentBody, EngineFactory, LiveEntity, Loader, WorldEngine};
pub use error::{AgentError, EngineError, PhysicsError, Result};
pub use input::{ButtonState, InputEmulation, MovementKey};
pub use lifecycle::AgentLink;
pub use navigation::{LegOutcome, Navigator};
pub use protocol::{ConnectionState, ConnectionStatus};
pub use settings::load_config;
pub use types::{
    AgentConfig, ConnectionSession, EntityState, NavigationTarget, Pose, SessionStats,
    TurnStrategy,
};
