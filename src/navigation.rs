//! Navigation controller: goal-seeking legs and random exploration, both
//! expressed purely as held movement buttons plus (for the snap strategy)
//! direct rotation writes to the agent body.
//!
//! ## Leg state machine
//!
//! ```text
//! goto ──► begin_leg ──► step ──► arrived? ──yes──► release inputs, Arrived
//!   │          │           ▲  │
//!   │          │           │  └─ steer → set only the buttons that changed
//!   │          │           └──── sleep(tick_interval) unless cancelled
//!   │          └─ cancels the previous leg and releases its buttons
//!   └─ cancels any random walk first
//! ```
//!
//! Exactly one leg owns the buttons at a time. A leg that is superseded,
//! force-stopped or dropped mid-flight never writes input again.

use crate::cancel::CancelToken;
use crate::engine::AgentBody;
use crate::error::{AgentError, Result};
use crate::input::{InputEmulation, MovementKey};
use crate::types::{NavigationConfig, NavigationTarget, Pose, TurnStrategy};
use glam::{Quat, Vec2, Vec3};
use log::{debug, info, warn};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Allowed deviation of the orientation quaternion from unit length.
const UNIT_TOLERANCE: f32 = 0.01;

/// Planar vectors shorter than this have no usable direction.
const DEGENERATE_LENGTH: f32 = 1e-4;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LegOutcome {
    /// Reached the stop distance; buttons released.
    Arrived,
    /// Superseded by another leg or by a walk being stopped.
    Cancelled,
    /// Force-stopped (invalid pose, lost body).
    Stopped(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Turn {
    Left,
    Right,
}

/// What one leg step wants held.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Steering {
    pub forward: bool,
    pub turn: Option<Turn>,
    /// Rotation to write to the body (snap strategy only).
    pub face: Option<Quat>,
}

impl Steering {
    /// Hold position: nothing pressed.
    pub fn hold() -> Self {
        Self {
            forward: false,
            turn: None,
            face: None,
        }
    }

    pub fn holds(&self, key: MovementKey) -> bool {
        match key {
            MovementKey::Forward => self.forward,
            MovementKey::Backward => false,
            MovementKey::TurnLeft => self.turn == Some(Turn::Left),
            MovementKey::TurnRight => self.turn == Some(Turn::Right),
        }
    }
}

// ---------------------------------------------------------------------------
// Pure steering math
// ---------------------------------------------------------------------------

/// Reject non-finite poses and degenerate orientations; renormalize an
/// orientation that drifted from unit length. The flag reports whether a
/// renormalization happened.
pub fn validate_pose(pose: Pose) -> Option<(Pose, bool)> {
    if !pose.position.is_finite() || !pose.rotation.is_finite() {
        return None;
    }
    let length = pose.rotation.length();
    if length < f32::EPSILON {
        return None;
    }
    if (length - 1.0).abs() > UNIT_TOLERANCE {
        return Some((Pose::new(pose.position, pose.rotation.normalize()), true));
    }
    Some((pose, false))
}

/// Signed angle on the XZ plane from `forward` to `heading` (both given as
/// `(x, z)`). Positive means the heading lies to the left, seen from +Y.
pub fn signed_angle(forward: Vec2, heading: Vec2) -> f32 {
    let cross = forward.y * heading.x - forward.x * heading.y;
    cross.atan2(forward.dot(heading))
}

/// Yaw rotation whose forward axis (-Z) points along `heading` `(x, z)`.
pub fn facing(heading: Vec2) -> Quat {
    Quat::from_rotation_y((-heading.x).atan2(-heading.y))
}

fn planar_unit(v: Vec2) -> Option<Vec2> {
    let length = v.length();
    (length.is_finite() && length > DEGENERATE_LENGTH).then(|| v / length)
}

pub fn steer(pose: &Pose, target: NavigationTarget, config: &NavigationConfig) -> Steering {
    let to_target = Vec2::new(target.x - pose.position.x, target.z - pose.position.z);
    let Some(heading) = planar_unit(to_target) else {
        return Steering::hold();
    };
    let forward = pose.forward();
    let Some(forward) = planar_unit(Vec2::new(forward.x, forward.z)) else {
        return Steering::hold();
    };

    match config.strategy {
        TurnStrategy::Snap => Steering {
            forward: true,
            turn: None,
            face: Some(facing(heading)),
        },
        TurnStrategy::SignedAngle => {
            let angle = signed_angle(forward, heading);
            if !angle.is_finite() {
                return Steering::hold();
            }
            let turn = if angle > 0.0 { Turn::Left } else { Turn::Right };
            let magnitude = angle.abs();
            if magnitude > config.turn_threshold_deg.to_radians() {
                // Turn in place.
                Steering {
                    forward: false,
                    turn: Some(turn),
                    face: None,
                }
            } else {
                Steering {
                    forward: true,
                    turn: (magnitude > config.forward_tolerance_deg.to_radians()).then_some(turn),
                    face: None,
                }
            }
        }
    }
}

/// Uniform angle, uniform radius in `(0, max_distance]`. Radius-uniform
/// sampling favours points near the origin.
pub fn sample_walk_target<R: Rng + ?Sized>(
    rng: &mut R,
    origin: Vec3,
    max_distance: f32,
) -> NavigationTarget {
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let radius = max_distance - rng.gen_range(0.0..max_distance);
    NavigationTarget::new(
        origin.x + radius * angle.cos(),
        origin.z + radius * angle.sin(),
    )
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegOwner {
    Caller,
    Walk(u64),
}

struct ActiveLeg {
    id: u64,
    target: NavigationTarget,
    owner: LegOwner,
    token: CancelToken,
}

struct ActiveWalk {
    id: u64,
    token: CancelToken,
    task: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct NavState {
    leg: Option<ActiveLeg>,
    walk: Option<ActiveWalk>,
    /// Buttons this controller currently holds down.
    held: HashSet<MovementKey>,
}

struct NavInner {
    input: Arc<InputEmulation>,
    body: Arc<dyn AgentBody>,
    config: NavigationConfig,
    next_id: AtomicU64,
    state: Mutex<NavState>,
}

/// Cheap to clone; all clones drive the same legs.
#[derive(Clone)]
pub struct Navigator {
    inner: Arc<NavInner>,
}

impl Navigator {
    pub fn new(
        input: Arc<InputEmulation>,
        body: Arc<dyn AgentBody>,
        config: NavigationConfig,
    ) -> Self {
        Self {
            inner: Arc::new(NavInner {
                input,
                body,
                config,
                next_id: AtomicU64::new(1),
                state: Mutex::new(NavState::default()),
            }),
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.inner.config
    }

    pub fn target(&self) -> Option<NavigationTarget> {
        self.inner.state.lock().leg.as_ref().map(|leg| leg.target)
    }

    pub fn is_navigating(&self) -> bool {
        self.inner.state.lock().leg.is_some()
    }

    pub fn random_walk_active(&self) -> bool {
        self.inner.state.lock().walk.is_some()
    }

    // -----------------------------------------------------------------------
    // Single leg
    // -----------------------------------------------------------------------

    /// Walk to `(x, z)`. Cancels any random walk and any in-flight leg
    /// first; resolves when this leg ends for whatever reason.
    pub async fn goto(&self, x: f32, z: f32) -> Result<LegOutcome> {
        let target = NavigationTarget::new(x, z);
        if !target.is_finite() {
            return Err(AgentError::InvalidArgument(format!(
                "navigation target {} is not finite",
                target
            )));
        }
        if self.inner.body.pose().is_none() {
            return Err(AgentError::PrerequisiteMissing(
                "agent body not instantiated".into(),
            ));
        }

        self.stop_random_walk();
        info!("Navigating to {}", target);
        let outcome = self.run_leg(target, LegOwner::Caller).await;
        debug!("Leg to {} ended: {:?}", target, outcome);
        Ok(outcome)
    }

    /// Idempotent. Buttons are released before returning.
    pub fn stop_navigation(&self, reason: &str) {
        let mut state = self.inner.state.lock();
        if self.stop_locked(&mut state, reason) {
            info!("Navigation stopped: {}", reason);
        }
    }

    async fn run_leg(&self, target: NavigationTarget, owner: LegOwner) -> LegOutcome {
        let Some((id, token)) = self.begin_leg(target, owner) else {
            return LegOutcome::Cancelled;
        };
        let _guard = LegGuard { nav: self, id };
        let interval = self.inner.config.tick_interval();

        loop {
            if let Some(outcome) = self.step(id) {
                return outcome;
            }
            if !token.sleep(interval).await {
                return LegOutcome::Cancelled;
            }
        }
    }

    fn begin_leg(&self, target: NavigationTarget, owner: LegOwner) -> Option<(u64, CancelToken)> {
        let mut state = self.inner.state.lock();

        if let LegOwner::Walk(walk_id) = owner {
            let walk_live = matches!(
                &state.walk,
                Some(walk) if walk.id == walk_id && !walk.token.is_cancelled()
            );
            if !walk_live {
                return None;
            }
        }

        if let Some(previous) = state.leg.take() {
            previous.token.cancel();
            debug!("Leg {} to {} superseded", previous.id, previous.target);
        }
        self.release_locked(&mut state);

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new();
        state.leg = Some(ActiveLeg {
            id,
            target,
            owner,
            token: token.clone(),
        });
        Some((id, token))
    }

    /// One iteration. `Some` ends the leg.
    fn step(&self, id: u64) -> Option<LegOutcome> {
        let mut state = self.inner.state.lock();
        let target = match &state.leg {
            Some(leg) if leg.id == id => leg.target,
            _ => return Some(LegOutcome::Cancelled),
        };

        let Some((pose, renormalized)) = self.inner.body.pose().and_then(validate_pose) else {
            let reason = "agent pose missing or invalid";
            warn!("Stopping leg to {}: {}", target, reason);
            self.stop_locked(&mut state, reason);
            return Some(LegOutcome::Stopped(reason.into()));
        };
        if renormalized {
            self.inner.body.set_rotation(pose.rotation);
        }

        let distance = Vec2::new(target.x - pose.position.x, target.z - pose.position.z).length();
        if distance <= self.inner.config.stop_distance {
            self.stop_locked(&mut state, "arrived");
            return Some(LegOutcome::Arrived);
        }

        let steering = steer(&pose, target, &self.inner.config);
        if let Some(face) = steering.face {
            self.inner.body.set_rotation(face);
        }
        self.apply_locked(&mut state, &steering);
        None
    }

    /// Only buttons whose desired level differs from last step are written.
    fn apply_locked(&self, state: &mut NavState, steering: &Steering) {
        for key in MovementKey::ALL {
            let want = steering.holds(key);
            if want == state.held.contains(&key) {
                continue;
            }
            self.inner.input.set_movement(key, want);
            if want {
                state.held.insert(key);
            } else {
                state.held.remove(&key);
            }
        }
    }

    fn release_locked(&self, state: &mut NavState) {
        state.held.clear();
        self.inner.input.release_movement();
    }

    /// Returns whether a leg was active.
    fn stop_locked(&self, state: &mut NavState, reason: &str) -> bool {
        let stopped = match state.leg.take() {
            Some(leg) => {
                leg.token.cancel();
                debug!("Leg {} to {} stopped: {}", leg.id, leg.target, reason);
                true
            }
            None => false,
        };
        self.release_locked(state);
        stopped
    }

    fn abandon_leg(&self, id: u64) {
        let mut state = self.inner.state.lock();
        if matches!(&state.leg, Some(leg) if leg.id == id) {
            self.stop_locked(&mut state, "leg abandoned");
        }
    }

    // -----------------------------------------------------------------------
    // Random walk
    // -----------------------------------------------------------------------

    /// Start exploring. A walk already running is cancelled first.
    pub fn start_random_walk(&self, interval: Duration, max_distance: f32) -> Result<()> {
        if !(max_distance.is_finite() && max_distance > 0.0) {
            return Err(AgentError::InvalidArgument(format!(
                "random walk radius must be positive, got {}",
                max_distance
            )));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new();
        let previous = {
            let mut state = self.inner.state.lock();
            let previous = self.end_walk_locked(&mut state);
            state.walk = Some(ActiveWalk {
                id,
                token: token.clone(),
                task: None,
            });
            previous
        };
        if let Some(task) = previous {
            task.abort();
        }

        let nav = self.clone();
        let task = tokio::spawn(async move {
            nav.walk_loop(id, token, interval, max_distance).await;
        });

        let mut state = self.inner.state.lock();
        match state.walk.as_mut() {
            Some(walk) if walk.id == id => walk.task = Some(task),
            _ => task.abort(),
        }
        info!(
            "Random walk started (interval {:?}, radius {:.1})",
            interval, max_distance
        );
        Ok(())
    }

    /// Cancels the walk and force-stops the leg it owns, if any.
    pub fn stop_random_walk(&self) {
        let (was_active, task) = {
            let mut state = self.inner.state.lock();
            let was_active = state.walk.is_some();
            (was_active, self.end_walk_locked(&mut state))
        };
        if let Some(task) = task {
            task.abort();
        }
        if was_active {
            info!("Random walk stopped");
        }
    }

    /// Stop everything (session teardown).
    pub fn shutdown(&self) {
        self.stop_random_walk();
        self.stop_navigation("session closed");
    }

    /// Hands back the walk task so it can be aborted outside the lock.
    fn end_walk_locked(&self, state: &mut NavState) -> Option<JoinHandle<()>> {
        let walk = state.walk.take()?;
        walk.token.cancel();
        if matches!(&state.leg, Some(leg) if leg.owner == LegOwner::Walk(walk.id)) {
            self.stop_locked(state, "random walk stopped");
        }
        walk.task
    }

    async fn walk_loop(self, id: u64, token: CancelToken, interval: Duration, max_distance: f32) {
        let mut rng = StdRng::from_entropy();

        while !token.is_cancelled() {
            match self.inner.body.pose().and_then(validate_pose) {
                Some((pose, _)) => {
                    let target = sample_walk_target(&mut rng, pose.position, max_distance);
                    debug!("Random walk leg to {}", target);
                    let outcome = self.run_leg(target, LegOwner::Walk(id)).await;
                    debug!("Random walk leg to {} ended: {:?}", target, outcome);
                }
                None => debug!("Random walk waiting for agent body"),
            }
            if !token.sleep(interval).await {
                break;
            }
        }

        let mut state = self.inner.state.lock();
        if matches!(&state.walk, Some(walk) if walk.id == id) {
            state.walk = None;
        }
    }
}

/// Stops its leg if the leg future is dropped while still current.
struct LegGuard<'a> {
    nav: &'a Navigator,
    id: u64,
}

impl Drop for LegGuard<'_> {
    fn drop(&mut self) {
        self.nav.abandon_leg(self.id);
    }
}
