//! AgentLink – session lifecycle for the agent body.
//!
//! ## Connect sequence
//!
//! | Step | State           | Action                                                     |
//! |------|-----------------|------------------------------------------------------------|
//! | 1    | `connecting`    | tear down any existing session, create the engine          |
//! | 2    | `connecting`    | install input, loader and headless surface; `init`         |
//! | 3    | `bootstrapping` | await physics handles, run the static physics bootstrap    |
//! | 4    | `bootstrapping` | subscribe entity + disconnect listeners, replay entities   |
//! | 5    | `connected`     | spawn tick loop, entity resync and appearance poller       |
//!
//! A failure at any step runs the same teardown as [`AgentLink::disconnect`]
//! before the error reaches the caller.
//!
//! ## Session scoping
//!
//! Every session carries a generation number and a [`SessionGuard`]. Engine
//! callbacks, periodic tasks and the navigator's body view check the guard
//! before touching anything, so a late callback from a torn-down engine is a
//! no-op. `disconnect` bumps the generation, which makes an in-flight
//! `connect` fail with [`AgentError::SessionSuperseded`] at its next
//! suspension point. Teardown also fires the session's [`CancelToken`], which
//! ends a pending physics wait or bootstrap immediately.

use crate::bootstrap::{bootstrap_static_physics, BootstrapReport};
use crate::cache::EntityCache;
use crate::cancel::CancelToken;
use crate::engine::{
    AgentBody, EngineFactory, EntityEvent, EntityEventKind, HeadlessSurface, InitOptions,
    ListenerId, Loader, WorldEngine,
};
use crate::error::{AgentError, Result};
use crate::input::InputEmulation;
use crate::navigation::{validate_pose, LegOutcome, Navigator};
use crate::physics::PhysicsHandles;
use crate::protocol::{ConnectionState, ConnectionStatus};
use crate::types::{
    AgentConfig, AgentIdentity, ConnectionSession, EntityState, Pose, RuntimeConfig,
    SessionStats,
};
use glam::Quat;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

// ---------------------------------------------------------------------------
// Session guard
// ---------------------------------------------------------------------------

/// Shared "is this session still active" flag.
#[derive(Debug, Clone)]
pub struct SessionGuard(Arc<AtomicBool>);

impl SessionGuard {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn deactivate(&self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Default for SessionGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// The engine's agent body, seen through the session guard.
struct SessionBody {
    engine: Arc<dyn WorldEngine>,
    guard: SessionGuard,
}

impl AgentBody for SessionBody {
    fn pose(&self) -> Option<Pose> {
        if !self.guard.is_active() {
            return None;
        }
        self.engine.agent_body()?.pose()
    }

    fn set_rotation(&self, rotation: Quat) {
        if !self.guard.is_active() {
            return;
        }
        if let Some(body) = self.engine.agent_body() {
            body.set_rotation(rotation);
        }
    }
}

// ---------------------------------------------------------------------------
// Tick fault throttle
// ---------------------------------------------------------------------------

/// Rate-limits reports of tick faults whose message contains one of the
/// known-benign substrings. Other faults are always reported.
#[derive(Debug)]
pub struct FaultThrottle {
    benign: Vec<String>,
    window: Duration,
    last_report: Option<Instant>,
    suppressed: u64,
}

impl FaultThrottle {
    pub fn new(benign: Vec<String>, window: Duration) -> Self {
        Self {
            benign,
            window,
            last_report: None,
            suppressed: 0,
        }
    }

    pub fn is_benign(&self, message: &str) -> bool {
        self.benign.iter().any(|pattern| message.contains(pattern.as_str()))
    }

    /// Log `message` unless a benign fault was already reported within the
    /// window. Returns whether it was logged.
    pub fn report(&mut self, message: &str) -> bool {
        if !self.is_benign(message) {
            error!("World tick fault: {}", message);
            return true;
        }

        let now = Instant::now();
        if let Some(at) = self.last_report {
            if now.duration_since(at) < self.window {
                self.suppressed += 1;
                return false;
            }
        }
        warn!(
            "Benign tick fault: {} ({} suppressed since last report)",
            message, self.suppressed
        );
        self.suppressed = 0;
        self.last_report = Some(now);
        true
    }

    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }
}

// ---------------------------------------------------------------------------
// Active session
// ---------------------------------------------------------------------------

struct ActiveSession {
    generation: u64,
    config: AgentConfig,
    info: ConnectionSession,
    connected_since: Option<Instant>,
    engine: Arc<dyn WorldEngine>,
    input: Arc<InputEmulation>,
    cache: Arc<EntityCache>,
    navigator: Navigator,
    guard: SessionGuard,
    /// Cancels connect-time waits (physics poll, bootstrap).
    cancel: CancelToken,
    listeners: Vec<ListenerId>,
    tasks: Vec<JoinHandle<()>>,
    bootstrap: Option<BootstrapReport>,
    announced: Arc<AtomicBool>,
    last_pose: Arc<Mutex<Option<Pose>>>,
    ticks_faulted: Arc<AtomicU64>,
}

struct LinkInner {
    factory: Arc<dyn EngineFactory>,
    loader: Arc<dyn Loader>,
    /// Serializes connects.
    connect_lock: tokio::sync::Mutex<()>,
    state: Mutex<ConnectionState>,
    slot: Mutex<Option<ActiveSession>>,
    generation: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl LinkInner {
    fn set_state(&self, next: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.lock(), next);
        if previous != next {
            info!("Connection state: {} → {}", previous, next);
        }
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        let current = self.generation.load(Ordering::SeqCst) == generation
            && matches!(&*self.slot.lock(), Some(s) if s.generation == generation);
        if current {
            Ok(())
        } else {
            Err(AgentError::SessionSuperseded)
        }
    }

    /// Run `f` on the session if it still belongs to `generation`.
    fn with_session<R>(&self, generation: u64, f: impl FnOnce(&mut ActiveSession) -> R) -> Option<R> {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(session) if session.generation == generation => Some(f(session)),
            _ => None,
        }
    }

    /// Move `items` into the session's list, or hand them back if the
    /// session was torn down meanwhile.
    fn adopt<T>(
        &self,
        generation: u64,
        field: impl FnOnce(&mut ActiveSession) -> &mut Vec<T>,
        items: Vec<T>,
    ) -> std::result::Result<(), Vec<T>> {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(session) if session.generation == generation && session.guard.is_active() => {
                field(session).extend(items);
                Ok(())
            }
            _ => Err(items),
        }
    }

    /// Idempotent. With `Some(generation)` only that session is torn down.
    /// Returns whether a session was torn down.
    fn teardown(&self, generation: Option<u64>, reason: &str) -> bool {
        let session = {
            let mut slot = self.slot.lock();
            match (slot.as_ref(), generation) {
                (None, _) => return false,
                (Some(s), Some(g)) if s.generation != g => return false,
                _ => slot.take(),
            }
        };
        let Some(session) = session else {
            return false;
        };

        self.set_state(ConnectionState::Disconnecting);
        info!(
            "Tearing down session for world '{}': {}",
            session.info.world_id, reason
        );

        session.guard.deactivate();
        session.cancel.cancel();
        for task in &session.tasks {
            task.abort();
        }
        session.navigator.shutdown();
        for id in &session.listeners {
            session.engine.unsubscribe(*id);
        }
        session.engine.close_network();
        session.engine.destroy();
        session.cache.clear();

        self.set_state(ConnectionState::Disconnected);
        true
    }
}

impl Drop for LinkInner {
    fn drop(&mut self) {
        self.teardown(None, "agent link dropped");
    }
}

// ---------------------------------------------------------------------------
// AgentLink
// ---------------------------------------------------------------------------

/// Owns at most one session at a time. Cheap to clone.
#[derive(Clone)]
pub struct AgentLink {
    inner: Arc<LinkInner>,
}

impl AgentLink {
    pub fn new(factory: Arc<dyn EngineFactory>, loader: Arc<dyn Loader>) -> Self {
        Self {
            inner: Arc::new(LinkInner {
                factory,
                loader,
                connect_lock: tokio::sync::Mutex::new(()),
                state: Mutex::new(ConnectionState::Disconnected),
                slot: Mutex::new(None),
                generation: AtomicU64::new(0),
                last_error: Mutex::new(None),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Connect / disconnect
    // -----------------------------------------------------------------------

    pub async fn connect(&self, config: AgentConfig) -> Result<()> {
        let _connecting = self.inner.connect_lock.lock().await;

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if self.inner.teardown(None, "replaced by a new connect") {
            debug!("Previous session torn down before reconnect");
        }
        *self.inner.last_error.lock() = None;
        self.inner.set_state(ConnectionState::Connecting);
        info!(
            "Connecting to world '{}' at {}",
            config.connect.world_id, config.connect.ws_url
        );

        match self.establish(generation, config).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Connect failed: {}", e);
                self.inner.teardown(Some(generation), &e.to_string());
                self.inner.set_state(ConnectionState::Disconnected);
                *self.inner.last_error.lock() = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Idempotent; also aborts a connect still in flight.
    pub async fn disconnect(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        if !self.inner.teardown(None, "disconnect requested") {
            debug!("Disconnect with no active session");
        }
    }

    async fn establish(&self, generation: u64, config: AgentConfig) -> Result<()> {
        let inner = &self.inner;

        let engine = inner.factory.create();
        let input = Arc::new(InputEmulation::new());
        engine.install_input(input.clone());
        engine.install_loader(inner.loader.clone());
        engine.install_surface(HeadlessSurface::default());

        let guard = SessionGuard::new();
        let cancel = CancelToken::new();
        let body: Arc<dyn AgentBody> = Arc::new(SessionBody {
            engine: engine.clone(),
            guard: guard.clone(),
        });
        let navigator = Navigator::new(input.clone(), body.clone(), config.navigation.clone());
        let cache = Arc::new(EntityCache::new());
        let announced = Arc::new(AtomicBool::new(false));
        let last_pose = Arc::new(Mutex::new(None));
        let ticks_faulted = Arc::new(AtomicU64::new(0));

        {
            let mut slot = inner.slot.lock();
            if inner.generation.load(Ordering::SeqCst) != generation {
                return Err(AgentError::SessionSuperseded);
            }
            *slot = Some(ActiveSession {
                generation,
                config: config.clone(),
                info: ConnectionSession::new(&config.connect),
                connected_since: None,
                engine: engine.clone(),
                input: input.clone(),
                cache: cache.clone(),
                navigator,
                guard: guard.clone(),
                cancel: cancel.clone(),
                listeners: Vec::new(),
                tasks: Vec::new(),
                bootstrap: None,
                announced: announced.clone(),
                last_pose: last_pose.clone(),
                ticks_faulted: ticks_faulted.clone(),
            });
        }

        let options = InitOptions {
            ws_url: config.connect.ws_url.clone(),
            world_id: config.connect.world_id.clone(),
            auth_token: config.connect.auth_token.clone(),
        };
        let initialized = engine.init(&options).await;
        inner.ensure_current(generation)?;
        initialized?;

        // -------------------------------------------------------------------
        // Static physics, before anything can query the scene
        // -------------------------------------------------------------------

        inner.set_state(ConnectionState::Bootstrapping);
        let report = match wait_for_physics(engine.as_ref(), &config.runtime, &cancel).await {
            Some(handles) => {
                let bootstrap = bootstrap_static_physics(
                    inner.loader.as_ref(),
                    &handles,
                    config.connect.environment_url.as_deref(),
                );
                tokio::select! {
                    report = bootstrap => report,
                    _ = cancel.cancelled() => return Err(AgentError::SessionSuperseded),
                }
            }
            None => {
                inner.ensure_current(generation)?;
                warn!(
                    "Physics not ready after {}ms – continuing without static colliders",
                    config.runtime.physics_ready_timeout_ms
                );
                BootstrapReport::skipped("physics handles not ready")
            }
        };
        inner.ensure_current(generation)?;
        inner.with_session(generation, |s| s.bootstrap = Some(report));

        // -------------------------------------------------------------------
        // Listeners + replay
        // -------------------------------------------------------------------

        let mut listeners = Vec::with_capacity(EntityEventKind::ALL.len() + 1);
        for kind in EntityEventKind::ALL {
            let cache = cache.clone();
            let guard = guard.clone();
            listeners.push(engine.subscribe(
                kind,
                Arc::new(move |event: &EntityEvent| {
                    if guard.is_active() {
                        cache.apply(event);
                    }
                }),
            ));
        }

        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel::<String>();
        {
            let guard = guard.clone();
            listeners.push(engine.on_disconnect(Arc::new(move |reason: &str| {
                if guard.is_active() {
                    let _ = disconnect_tx.send(reason.to_string());
                }
            })));
        }
        // Ids are handed to the session so teardown unsubscribes them; if the
        // session is already gone nobody else will.
        if let Err(listeners) = inner.adopt(generation, |s| &mut s.listeners, listeners) {
            for id in listeners {
                engine.unsubscribe(id);
            }
            return Err(AgentError::SessionSuperseded);
        }

        // The initial snapshot may have landed before the listeners did.
        let mut replayed = 0;
        for live in engine.entities() {
            if cache.add(live.as_ref()).is_some() {
                replayed += 1;
            }
        }
        debug!("Replayed {} entities present at attach time", replayed);

        // -------------------------------------------------------------------
        // Connected: start the periodic tasks
        // -------------------------------------------------------------------

        let runtime = &config.runtime;
        let tasks = vec![
            spawn_tick_loop(
                engine.clone(),
                input.clone(),
                guard.clone(),
                runtime,
                ticks_faulted,
            ),
            spawn_entity_sync(
                engine.clone(),
                cache.clone(),
                body.clone(),
                guard.clone(),
                last_pose,
                runtime.entity_sync_interval(),
            ),
            spawn_appearance_poller(
                engine.clone(),
                body,
                guard,
                announced,
                config.connect.identity.clone(),
                runtime.appearance_retry(),
            ),
            spawn_disconnect_watcher(Arc::downgrade(inner), generation, disconnect_rx),
        ];

        if let Err(tasks) = inner.adopt(generation, |s| &mut s.tasks, tasks) {
            for task in tasks {
                task.abort();
            }
            return Err(AgentError::SessionSuperseded);
        }
        inner.with_session(generation, |s| {
            s.info.is_connected = true;
            s.info.connected_at = Some(SystemTime::now());
            s.connected_since = Some(Instant::now());
        });
        inner.set_state(ConnectionState::Connected);
        info!(
            "Connected to world '{}' ({} entities mirrored)",
            config.connect.world_id,
            cache.len()
        );
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    pub fn is_connected(&self) -> bool {
        self.inner
            .slot
            .lock()
            .as_ref()
            .map(|s| s.info.is_connected)
            .unwrap_or(false)
    }

    pub fn session(&self) -> Option<ConnectionSession> {
        self.inner.slot.lock().as_ref().map(|s| s.info.clone())
    }

    pub fn status(&self) -> ConnectionStatus {
        let state = self.state();
        let (world_id, engine, connected_for_ms) = {
            let slot = self.inner.slot.lock();
            match slot.as_ref() {
                Some(s) => (
                    Some(s.info.world_id.clone()),
                    Some(s.engine.clone()),
                    s.connected_since
                        .map(|since| since.elapsed().as_millis() as u64),
                ),
                None => (None, None, None),
            }
        };
        ConnectionStatus {
            state,
            world_id,
            session_id: engine.and_then(|e| e.session_id()),
            connected_for_ms,
            last_error: self.inner.last_error.lock().clone(),
        }
    }

    pub fn stats(&self) -> Option<SessionStats> {
        let slot = self.inner.slot.lock();
        let s = slot.as_ref()?;
        Some(SessionStats {
            entities: s.cache.len(),
            named_players: s.cache.names().len(),
            ticks_faulted: s.ticks_faulted.load(Ordering::Relaxed),
            appearance_announced: s.announced.load(Ordering::Relaxed),
            bootstrap: s.bootstrap.clone(),
        })
    }

    pub fn bootstrap_report(&self) -> Option<BootstrapReport> {
        self.inner.slot.lock().as_ref()?.bootstrap.clone()
    }

    pub fn appearance_announced(&self) -> bool {
        self.inner
            .slot
            .lock()
            .as_ref()
            .map(|s| s.announced.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    /// Pose stored by the last entity resync.
    pub fn agent_pose(&self) -> Option<Pose> {
        let last_pose = self.inner.slot.lock().as_ref()?.last_pose.clone();
        let pose = *last_pose.lock();
        pose
    }

    pub fn input(&self) -> Option<Arc<InputEmulation>> {
        self.inner.slot.lock().as_ref().map(|s| s.input.clone())
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    pub fn entity(&self, id: &str) -> Option<EntityState> {
        self.cache()?.get(id)
    }

    pub fn entities(&self) -> Vec<EntityState> {
        self.cache().map(|c| c.entities()).unwrap_or_default()
    }

    pub fn resolve_name(&self, id: &str) -> Option<String> {
        let (cache, engine) = {
            let slot = self.inner.slot.lock();
            let s = slot.as_ref()?;
            (s.cache.clone(), s.engine.clone())
        };
        let live = engine.entity(id);
        cache.resolve_name(id, live.as_deref())
    }

    fn cache(&self) -> Option<Arc<EntityCache>> {
        self.inner.slot.lock().as_ref().map(|s| s.cache.clone())
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    fn navigator(&self) -> Result<Navigator> {
        self.inner
            .slot
            .lock()
            .as_ref()
            .filter(|s| s.info.is_connected)
            .map(|s| s.navigator.clone())
            .ok_or_else(|| AgentError::PrerequisiteMissing("no active session".into()))
    }

    pub async fn goto(&self, x: f32, z: f32) -> Result<LegOutcome> {
        self.navigator()?.goto(x, z).await
    }

    /// No-op without a session.
    pub fn stop_navigation(&self, reason: &str) {
        if let Ok(navigator) = self.navigator() {
            navigator.stop_navigation(reason);
        }
    }

    /// `None` picks the configured interval / radius.
    pub fn start_random_walk(
        &self,
        interval: Option<Duration>,
        max_distance: Option<f32>,
    ) -> Result<()> {
        let navigator = self.navigator()?;
        let walk = self
            .inner
            .slot
            .lock()
            .as_ref()
            .map(|s| s.config.random_walk.clone())
            .unwrap_or_default();
        navigator.start_random_walk(
            interval.unwrap_or_else(|| walk.interval()),
            max_distance.unwrap_or(walk.max_distance),
        )
    }

    pub fn stop_random_walk(&self) {
        if let Ok(navigator) = self.navigator() {
            navigator.stop_random_walk();
        }
    }

    pub fn is_navigating(&self) -> bool {
        self.navigator().map(|n| n.is_navigating()).unwrap_or(false)
    }

    pub fn random_walk_active(&self) -> bool {
        self.navigator()
            .map(|n| n.random_walk_active())
            .unwrap_or(false)
    }
}

// ---------------------------------------------------------------------------
// Bootstrap helpers
// ---------------------------------------------------------------------------

/// `None` on timeout or once `cancel` fires.
async fn wait_for_physics(
    engine: &dyn WorldEngine,
    runtime: &RuntimeConfig,
    cancel: &CancelToken,
) -> Option<PhysicsHandles> {
    let deadline = Instant::now() + Duration::from_millis(runtime.physics_ready_timeout_ms);
    let poll = Duration::from_millis(runtime.physics_poll_ms.max(1));
    loop {
        if cancel.is_cancelled() {
            return None;
        }
        if let Some(handles) = engine.physics() {
            return Some(handles);
        }
        if Instant::now() >= deadline || !cancel.sleep(poll).await {
            return None;
        }
    }
}

// ---------------------------------------------------------------------------
// Periodic tasks
// ---------------------------------------------------------------------------

fn spawn_tick_loop(
    engine: Arc<dyn WorldEngine>,
    input: Arc<InputEmulation>,
    guard: SessionGuard,
    runtime: &RuntimeConfig,
    faults: Arc<AtomicU64>,
) -> JoinHandle<()> {
    let period = runtime.tick_period();
    let mut throttle = FaultThrottle::new(
        runtime.benign_tick_errors.clone(),
        Duration::from_millis(runtime.benign_log_window_ms),
    );

    tokio::spawn(async move {
        let started = Instant::now();
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            timer.tick().await;
            if !guard.is_active() {
                break;
            }
            let now = started.elapsed().as_secs_f64();

            let fault = match std::panic::catch_unwind(AssertUnwindSafe(|| engine.tick(now))) {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(payload) => Some(panic_message(payload.as_ref())),
            };
            if let Some(message) = fault {
                faults.fetch_add(1, Ordering::Relaxed);
                throttle.report(&message);
            }

            input.end_frame();
        }
    })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic in engine tick".into()
    }
}

fn spawn_entity_sync(
    engine: Arc<dyn WorldEngine>,
    cache: Arc<EntityCache>,
    body: Arc<dyn AgentBody>,
    guard: SessionGuard,
    last_pose: Arc<Mutex<Option<Pose>>>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            timer.tick().await;
            if !guard.is_active() {
                break;
            }

            let mut live_ids = HashSet::new();
            for live in engine.entities() {
                if let Some(snapshot) = cache.refresh(live.as_ref()) {
                    live_ids.insert(snapshot.id);
                }
            }
            let pruned = cache.retain_live(&live_ids);
            if pruned > 0 {
                debug!("Resync pruned {} stale entities", pruned);
            }

            *last_pose.lock() = body.pose().and_then(validate_pose).map(|(pose, _)| pose);
        }
    })
}

fn spawn_appearance_poller(
    engine: Arc<dyn WorldEngine>,
    body: Arc<dyn AgentBody>,
    guard: SessionGuard,
    announced: Arc<AtomicBool>,
    identity: AgentIdentity,
    retry: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(retry);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            if !guard.is_active() {
                break;
            }

            let Some(session_id) = engine.session_id() else {
                debug!("Identity announcement deferred: no session id yet");
                continue;
            };
            if body.pose().is_none() {
                debug!("Identity announcement deferred: agent body not instantiated");
                continue;
            }

            match engine.announce_identity(&identity).await {
                Ok(()) => {
                    announced.store(true, Ordering::Relaxed);
                    info!(
                        "Announced identity '{}' (session {})",
                        identity.name, session_id
                    );
                    break;
                }
                Err(e) => warn!(
                    "Identity announcement failed, retrying in {:?}: {}",
                    retry, e
                ),
            }
        }
    })
}

fn spawn_disconnect_watcher(
    inner: Weak<LinkInner>,
    generation: u64,
    mut reasons: mpsc::UnboundedReceiver<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let Some(reason) = reasons.recv().await else {
            return;
        };
        let Some(inner) = inner.upgrade() else {
            return;
        };
        warn!("Remote disconnect: {}", reason);
        if inner.teardown(Some(generation), &reason) {
            *inner.last_error.lock() = Some(format!("remote disconnect: {}", reason));
        }
    })
}
