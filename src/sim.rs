//! Headless sandbox engine.
//!
//! A small local world that satisfies every collaborator seam the agent
//! needs, so the binary and the tests can run a full session without a
//! remote server:
//!
//! - [`SimEngine`]: entity registry with listener dispatch, kinematic agent
//!   body driven by the installed input buttons, delayed session id, and
//!   injectable init / announce / tick faults.
//! - [`SimPhysics`]: in-memory solver and scene that record what bootstrap
//!   registered and track cooked-mesh references.
//! - [`SimLoader`]: url → model map.

use crate::engine::{
    AgentBody, AssetKind, DisconnectListener, EngineFactory, EntityEvent, EntityEventKind,
    EntityListener, EntityRef, HeadlessSurface, InitOptions, ListenerId, LiveEntity, Loader,
    WorldEngine,
};
use crate::error::{EngineError, PhysicsError};
use crate::input::{InputEmulation, MovementKey};
use crate::physics::{
    ActorHandle, MaterialHandle, MeshGeometry, MeshHandle, ModelNode, PhysicsHandles,
    PhysicsScene, PhysicsSolver, ShapeDesc, ShapeHandle, Transform,
};
use crate::types::{AgentIdentity, Pose};
use futures::future::{BoxFuture, FutureExt};
use glam::{Quat, Vec3};
use log::debug;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Kinematics of the sandbox avatar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Locomotion {
    /// Units per second while forward/backward is held.
    pub walk_speed: f32,
    /// Radians per second while a turn button is held.
    pub turn_rate: f32,
}

impl Default for Locomotion {
    fn default() -> Self {
        Self {
            walk_speed: 4.0,
            turn_rate: std::f32::consts::PI,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub locomotion: Locomotion,
    pub spawn: Pose,
    /// Expose physics handles after init.
    pub physics: bool,
    pub init_delay: Duration,
    /// Make `init` fail with this reason.
    pub fail_init: Option<String>,
    /// Ticks before the server "assigns" a session id.
    pub session_delay_ticks: u64,
    /// Announcements rejected before one succeeds.
    pub announce_failures: u32,
    /// Present in the registry as soon as init completes.
    pub initial_entities: Vec<SimEntity>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            locomotion: Locomotion::default(),
            spawn: Pose::new(Vec3::ZERO, Quat::IDENTITY),
            physics: true,
            init_delay: Duration::ZERO,
            fail_init: None,
            session_delay_ticks: 0,
            announce_failures: 0,
            initial_entities: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct SimEntity {
    pub id: String,
    pub kind: String,
    pub name: Option<String>,
    pub position: Vec3,
    pub rotation: Quat,
    /// Expose vector/quaternion accessors; otherwise only the data record.
    pub rich: bool,
}

impl SimEntity {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            name: None,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            rich: true,
        }
    }

    pub fn player(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, crate::types::PLAYER_KIND).named(name)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotated(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn data_only(mut self) -> Self {
        self.rich = false;
        self
    }
}

impl LiveEntity for SimEntity {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> Option<String> {
        self.rich.then(|| self.kind.clone())
    }

    fn name(&self) -> Option<String> {
        if self.rich {
            self.name.clone()
        } else {
            None
        }
    }

    fn position(&self) -> Option<Vec3> {
        self.rich.then_some(self.position)
    }

    fn rotation(&self) -> Option<Quat> {
        self.rich.then_some(self.rotation)
    }

    fn data(&self) -> Value {
        json!({
            "type": self.kind,
            "name": self.name,
            "position": self.position.to_array(),
            "quaternion": {
                "x": self.rotation.x,
                "y": self.rotation.y,
                "z": self.rotation.z,
                "w": self.rotation.w,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Agent body
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct SimBody {
    pose: Mutex<Pose>,
}

impl SimBody {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose: Mutex::new(pose),
        }
    }

    pub fn current(&self) -> Pose {
        *self.pose.lock()
    }

    pub fn set_pose(&self, pose: Pose) {
        *self.pose.lock() = pose;
    }
}

impl AgentBody for SimBody {
    fn pose(&self) -> Option<Pose> {
        Some(self.current())
    }

    fn set_rotation(&self, rotation: Quat) {
        self.pose.lock().rotation = rotation;
    }
}

/// Advance `body` by `dt` seconds from the held movement buttons. Turning
/// is applied before translation; translation stays on the ground plane.
pub fn drive_body(body: &SimBody, input: &InputEmulation, dt: f32, locomotion: Locomotion) {
    if dt <= 0.0 {
        return;
    }
    let mut pose = body.current();

    let mut yaw = 0.0;
    if input.movement_down(MovementKey::TurnLeft) {
        yaw += locomotion.turn_rate * dt;
    }
    if input.movement_down(MovementKey::TurnRight) {
        yaw -= locomotion.turn_rate * dt;
    }
    if yaw != 0.0 {
        pose.rotation = (Quat::from_rotation_y(yaw) * pose.rotation).normalize();
    }

    let mut step = 0.0;
    if input.movement_down(MovementKey::Forward) {
        step += locomotion.walk_speed * dt;
    }
    if input.movement_down(MovementKey::Backward) {
        step -= locomotion.walk_speed * dt;
    }
    if step != 0.0 {
        let forward = pose.forward();
        let planar = Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero();
        pose.position += planar * step;
    }

    body.set_pose(pose);
}

// ---------------------------------------------------------------------------
// Physics
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct PhysicsState {
    next_handle: u64,
    /// Mesh → outstanding references (cooking + shapes).
    meshes: HashMap<MeshHandle, usize>,
    shapes: HashMap<ShapeHandle, ShapeDesc>,
    actors: HashMap<ActorHandle, SimActor>,
    scene: Vec<ActorHandle>,
    cooked: usize,
    released: usize,
}

impl PhysicsState {
    fn handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimActor {
    pub transform: Transform,
    pub shapes: Vec<ShapeDesc>,
}

#[derive(Debug, Default)]
pub struct SimPhysics {
    state: Mutex<PhysicsState>,
}

impl SimPhysics {
    pub const DEFAULT_MATERIAL: MaterialHandle = MaterialHandle(1);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn handles(self: &Arc<Self>) -> PhysicsHandles {
        PhysicsHandles {
            solver: self.clone(),
            scene: self.clone(),
            default_material: Self::DEFAULT_MATERIAL,
        }
    }

    /// Cooking references not yet given back.
    pub fn outstanding_cooks(&self) -> usize {
        let state = self.state.lock();
        state.cooked - state.released
    }

    pub fn cooked(&self) -> usize {
        self.state.lock().cooked
    }

    /// Shapes created and not released.
    pub fn live_shapes(&self) -> usize {
        self.state.lock().shapes.len()
    }

    /// Actors created and not released, in the scene or not.
    pub fn live_actors(&self) -> usize {
        self.state.lock().actors.len()
    }

    /// Meshes still referenced by a cooking guard or a shape.
    pub fn live_meshes(&self) -> usize {
        self.state.lock().meshes.len()
    }

    /// Actors registered with the scene, in registration order.
    pub fn scene_actors(&self) -> Vec<SimActor> {
        let state = self.state.lock();
        state
            .scene
            .iter()
            .filter_map(|handle| state.actors.get(handle).cloned())
            .collect()
    }
}

impl PhysicsSolver for SimPhysics {
    fn cook_triangle_mesh(&self, geometry: &MeshGeometry) -> Result<MeshHandle, PhysicsError> {
        if geometry.vertices.is_empty() || geometry.indices.is_empty() {
            return Err(PhysicsError::Cooking("empty geometry".into()));
        }
        if geometry.indices.len() % 3 != 0 {
            return Err(PhysicsError::Cooking(format!(
                "{} indices is not a triangle list",
                geometry.indices.len()
            )));
        }
        let vertex_count = geometry.vertices.len();
        if let Some(bad) = geometry.indices.iter().find(|&&i| i as usize >= vertex_count) {
            return Err(PhysicsError::Cooking(format!(
                "index {} out of range ({} vertices)",
                bad, vertex_count
            )));
        }

        let mut state = self.state.lock();
        let handle = MeshHandle(state.handle());
        state.meshes.insert(handle, 1);
        state.cooked += 1;
        Ok(handle)
    }

    fn release_mesh(&self, mesh: MeshHandle) {
        let mut state = self.state.lock();
        state.released += 1;
        if let Some(refs) = state.meshes.get_mut(&mesh) {
            *refs -= 1;
            if *refs == 0 {
                state.meshes.remove(&mesh);
            }
        }
    }

    fn create_shape(&self, desc: &ShapeDesc) -> Result<ShapeHandle, PhysicsError> {
        if !desc.geometry.scale.is_finite() || desc.geometry.scale.min_element() <= 0.0 {
            return Err(PhysicsError::Shape(format!(
                "invalid scale {}",
                desc.geometry.scale
            )));
        }
        let mut state = self.state.lock();
        let Some(refs) = state.meshes.get_mut(&desc.geometry.mesh) else {
            return Err(PhysicsError::Shape(format!(
                "unknown mesh {:?}",
                desc.geometry.mesh
            )));
        };
        *refs += 1;
        let handle = ShapeHandle(state.handle());
        state.shapes.insert(handle, *desc);
        Ok(handle)
    }

    fn create_static_actor(&self, transform: &Transform) -> Result<ActorHandle, PhysicsError> {
        if !transform.position.is_finite() || !transform.rotation.is_finite() {
            return Err(PhysicsError::Actor("non-finite transform".into()));
        }
        let mut state = self.state.lock();
        let handle = ActorHandle(state.handle());
        state.actors.insert(
            handle,
            SimActor {
                transform: *transform,
                shapes: Vec::new(),
            },
        );
        Ok(handle)
    }

    fn attach_shape(&self, actor: ActorHandle, shape: ShapeHandle) -> Result<(), PhysicsError> {
        let mut state = self.state.lock();
        let Some(desc) = state.shapes.get(&shape).copied() else {
            return Err(PhysicsError::Shape(format!("unknown shape {:?}", shape)));
        };
        let Some(actor) = state.actors.get_mut(&actor) else {
            return Err(PhysicsError::Actor(format!("unknown actor {:?}", actor)));
        };
        actor.shapes.push(desc);
        Ok(())
    }

    fn release_shape(&self, shape: ShapeHandle) {
        let mut state = self.state.lock();
        let Some(desc) = state.shapes.remove(&shape) else {
            return;
        };
        if let Some(refs) = state.meshes.get_mut(&desc.geometry.mesh) {
            *refs -= 1;
            if *refs == 0 {
                state.meshes.remove(&desc.geometry.mesh);
            }
        }
    }

    fn release_actor(&self, actor: ActorHandle) {
        let mut state = self.state.lock();
        state.actors.remove(&actor);
        state.scene.retain(|a| *a != actor);
    }
}

impl PhysicsScene for SimPhysics {
    fn add_actor(&self, actor: ActorHandle) -> Result<(), PhysicsError> {
        let mut state = self.state.lock();
        if !state.actors.contains_key(&actor) {
            return Err(PhysicsError::Scene(format!("unknown actor {:?}", actor)));
        }
        if state.scene.contains(&actor) {
            return Err(PhysicsError::Scene(format!("actor {:?} already in scene", actor)));
        }
        state.scene.push(actor);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct SimLoader {
    models: RwLock<HashMap<String, ModelNode>>,
    requests: AtomicUsize,
}

impl SimLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(self, url: impl Into<String>, model: ModelNode) -> Self {
        self.insert(url, model);
        self
    }

    pub fn insert(&self, url: impl Into<String>, model: ModelNode) {
        self.models.write().insert(url.into(), model);
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }
}

impl Loader for SimLoader {
    fn load<'a>(&'a self, kind: AssetKind, url: &'a str) -> BoxFuture<'a, Result<ModelNode, EngineError>> {
        async move {
            self.requests.fetch_add(1, Ordering::Relaxed);
            debug!("Loading {} asset {}", kind.name(), url);
            match kind {
                AssetKind::Model => self.models.read().get(url).cloned().ok_or_else(|| {
                    EngineError::Asset {
                        url: url.to_string(),
                        reason: "not found".into(),
                    }
                }),
            }
        }
        .boxed()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Fault raised by the next tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimFault {
    Error(String),
    Panic(String),
}

#[derive(Default)]
struct EngineState {
    input: Option<Arc<InputEmulation>>,
    loader: Option<Arc<dyn Loader>>,
    surface: Option<HeadlessSurface>,
    init_options: Option<InitOptions>,
    initialized: bool,
    destroyed: bool,
    network_open: bool,
    session_id: Option<String>,
    entities: HashMap<String, EntityRef>,
    listeners: HashMap<ListenerId, (EntityEventKind, EntityListener)>,
    disconnect_listeners: HashMap<ListenerId, DisconnectListener>,
    next_listener: u64,
    last_tick: Option<f64>,
    tick_count: u64,
    announce_attempts: u32,
    announced: Option<AgentIdentity>,
    pending_faults: VecDeque<SimFault>,
}

impl EngineState {
    fn listener_id(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }

    fn listeners_for(&self, kind: EntityEventKind) -> Vec<EntityListener> {
        self.listeners
            .values()
            .filter(|(k, _)| *k == kind)
            .map(|(_, l)| l.clone())
            .collect()
    }
}

pub struct SimEngine {
    config: SimConfig,
    body: Arc<SimBody>,
    physics: Arc<SimPhysics>,
    state: Mutex<EngineState>,
}

impl SimEngine {
    pub fn new(config: SimConfig) -> Self {
        Self {
            body: Arc::new(SimBody::new(config.spawn)),
            physics: Arc::new(SimPhysics::new()),
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn body(&self) -> Arc<SimBody> {
        self.body.clone()
    }

    pub fn sim_physics(&self) -> Arc<SimPhysics> {
        self.physics.clone()
    }

    // -----------------------------------------------------------------------
    // Registry mutations (dispatched like remote updates)
    // -----------------------------------------------------------------------

    pub fn spawn_entity(&self, entity: SimEntity) {
        let live: EntityRef = Arc::new(entity);
        let listeners = {
            let mut state = self.state.lock();
            state.entities.insert(live.id(), live.clone());
            state.listeners_for(EntityEventKind::Added)
        };
        dispatch(&listeners, &EntityEvent::Added(live));
    }

    /// Replace the live entity and report `changes` alongside it.
    pub fn modify_entity(&self, entity: SimEntity, changes: Value) {
        let live: EntityRef = Arc::new(entity);
        let id = live.id();
        let listeners = {
            let mut state = self.state.lock();
            state.entities.insert(id.clone(), live.clone());
            state.listeners_for(EntityEventKind::Modified)
        };
        dispatch(
            &listeners,
            &EntityEvent::Modified {
                id,
                changes,
                live: Some(live),
            },
        );
    }

    /// A modify whose live object could not be resolved.
    pub fn modify_detached(&self, id: &str, changes: Value) {
        let listeners = self.state.lock().listeners_for(EntityEventKind::Modified);
        dispatch(
            &listeners,
            &EntityEvent::Modified {
                id: id.to_string(),
                changes,
                live: None,
            },
        );
    }

    pub fn remove_entity(&self, id: &str) {
        let listeners = {
            let mut state = self.state.lock();
            state.entities.remove(id);
            state.listeners_for(EntityEventKind::Removed)
        };
        dispatch(&listeners, &EntityEvent::Removed { id: id.to_string() });
    }

    /// Drop an entity without telling anyone (a lost remove event).
    pub fn remove_silently(&self, id: &str) -> bool {
        self.state.lock().entities.remove(id).is_some()
    }

    // -----------------------------------------------------------------------
    // Fault injection
    // -----------------------------------------------------------------------

    pub fn inject_tick_fault(&self, fault: SimFault) {
        self.state.lock().pending_faults.push_back(fault);
    }

    /// The server dropped the connection.
    pub fn emit_disconnect(&self, reason: &str) {
        let listeners: Vec<DisconnectListener> = {
            let mut state = self.state.lock();
            state.network_open = false;
            state.disconnect_listeners.values().cloned().collect()
        };
        for listener in listeners {
            listener(reason);
        }
    }

    // -----------------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------------

    pub fn listener_count(&self, kind: EntityEventKind) -> usize {
        self.state
            .lock()
            .listeners
            .values()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    pub fn disconnect_listener_count(&self) -> usize {
        self.state.lock().disconnect_listeners.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock().initialized
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.lock().destroyed
    }

    pub fn network_open(&self) -> bool {
        self.state.lock().network_open
    }

    pub fn tick_count(&self) -> u64 {
        self.state.lock().tick_count
    }

    pub fn announce_attempts(&self) -> u32 {
        self.state.lock().announce_attempts
    }

    pub fn announced_identity(&self) -> Option<AgentIdentity> {
        self.state.lock().announced.clone()
    }

    pub fn init_options(&self) -> Option<InitOptions> {
        self.state.lock().init_options.clone()
    }

    pub fn surface(&self) -> Option<HeadlessSurface> {
        self.state.lock().surface.clone()
    }

    pub fn has_loader(&self) -> bool {
        self.state.lock().loader.is_some()
    }

    pub fn input(&self) -> Option<Arc<InputEmulation>> {
        self.state.lock().input.clone()
    }

    fn live(&self) -> bool {
        let state = self.state.lock();
        state.initialized && !state.destroyed
    }
}

fn dispatch(listeners: &[EntityListener], event: &EntityEvent) {
    for listener in listeners {
        listener(event);
    }
}

impl WorldEngine for SimEngine {
    fn install_input(&self, input: Arc<InputEmulation>) {
        self.state.lock().input = Some(input);
    }

    fn install_loader(&self, loader: Arc<dyn Loader>) {
        self.state.lock().loader = Some(loader);
    }

    fn install_surface(&self, surface: HeadlessSurface) {
        self.state.lock().surface = Some(surface);
    }

    fn init<'a>(&'a self, options: &'a InitOptions) -> BoxFuture<'a, Result<(), EngineError>> {
        async move {
            if self.config.init_delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(self.config.init_delay).await;
            }
            if let Some(reason) = &self.config.fail_init {
                return Err(EngineError::Init(reason.clone()));
            }

            let mut state = self.state.lock();
            if state.destroyed {
                return Err(EngineError::Init("engine already destroyed".into()));
            }
            state.initialized = true;
            state.network_open = true;
            state.init_options = Some(options.clone());
            if self.config.session_delay_ticks == 0 {
                state.session_id = Some(format!("sim-{}", options.world_id));
            }
            for entity in &self.config.initial_entities {
                state
                    .entities
                    .insert(entity.id.clone(), Arc::new(entity.clone()));
            }
            debug!("Sandbox engine initialised for world '{}'", options.world_id);
            Ok(())
        }
        .boxed()
    }

    fn tick(&self, now: f64) -> Result<(), EngineError> {
        let (input, dt, fault) = {
            let mut state = self.state.lock();
            if !state.initialized || state.destroyed {
                return Err(EngineError::Tick("engine not ready".into()));
            }
            let dt = state.last_tick.map(|last| (now - last).max(0.0)).unwrap_or(0.0) as f32;
            state.last_tick = Some(now);
            state.tick_count += 1;
            if state.session_id.is_none() && state.tick_count >= self.config.session_delay_ticks {
                let world_id = state
                    .init_options
                    .as_ref()
                    .map(|o| o.world_id.clone())
                    .unwrap_or_default();
                state.session_id = Some(format!("sim-{}", world_id));
            }
            (state.input.clone(), dt, state.pending_faults.pop_front())
        };

        match fault {
            Some(SimFault::Error(message)) => return Err(EngineError::Tick(message)),
            Some(SimFault::Panic(message)) => panic!("{}", message),
            None => {}
        }

        if let Some(input) = input {
            drive_body(&self.body, &input, dt, self.config.locomotion);
        }
        Ok(())
    }

    fn entities(&self) -> Vec<EntityRef> {
        self.state.lock().entities.values().cloned().collect()
    }

    fn entity(&self, id: &str) -> Option<EntityRef> {
        self.state.lock().entities.get(id).cloned()
    }

    fn subscribe(&self, kind: EntityEventKind, listener: EntityListener) -> ListenerId {
        let mut state = self.state.lock();
        let id = state.listener_id();
        state.listeners.insert(id, (kind, listener));
        id
    }

    fn on_disconnect(&self, listener: DisconnectListener) -> ListenerId {
        let mut state = self.state.lock();
        let id = state.listener_id();
        state.disconnect_listeners.insert(id, listener);
        id
    }

    fn unsubscribe(&self, id: ListenerId) {
        let mut state = self.state.lock();
        state.listeners.remove(&id);
        state.disconnect_listeners.remove(&id);
    }

    fn physics(&self) -> Option<PhysicsHandles> {
        (self.config.physics && self.live()).then(|| self.physics.handles())
    }

    fn agent_body(&self) -> Option<Arc<dyn AgentBody>> {
        if self.live() {
            Some(self.body.clone())
        } else {
            None
        }
    }

    fn session_id(&self) -> Option<String> {
        self.state.lock().session_id.clone()
    }

    fn announce_identity<'a>(&'a self, identity: &'a AgentIdentity) -> BoxFuture<'a, Result<(), EngineError>> {
        async move {
            let mut state = self.state.lock();
            state.announce_attempts += 1;
            if state.announce_attempts <= self.config.announce_failures {
                return Err(EngineError::Announce(format!(
                    "avatar upload failed (attempt {})",
                    state.announce_attempts
                )));
            }
            state.announced = Some(identity.clone());
            Ok(())
        }
        .boxed()
    }

    fn close_network(&self) {
        self.state.lock().network_open = false;
    }

    fn destroy(&self) {
        let mut state = self.state.lock();
        state.destroyed = true;
        state.network_open = false;
        state.entities.clear();
        state.input = None;
        state.loader = None;
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Creates one [`SimEngine`] per session and keeps them for inspection.
#[derive(Default)]
pub struct SimEngineFactory {
    config: SimConfig,
    engines: Mutex<Vec<Arc<SimEngine>>>,
}

impl SimEngineFactory {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            engines: Mutex::new(Vec::new()),
        }
    }

    pub fn engines(&self) -> Vec<Arc<SimEngine>> {
        self.engines.lock().clone()
    }

    pub fn latest(&self) -> Option<Arc<SimEngine>> {
        self.engines.lock().last().cloned()
    }
}

impl EngineFactory for SimEngineFactory {
    fn create(&self) -> Arc<dyn WorldEngine> {
        let engine = Arc::new(SimEngine::new(self.config.clone()));
        self.engines.lock().push(engine.clone());
        engine
    }
}
