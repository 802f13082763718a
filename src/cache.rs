//! `EntityCache` – local mirror of remote entities.
//!
//! The cache is fed from two directions:
//! - engine entity events (add / modify / remove), dispatched synchronously
//!   during a tick;
//! - the periodic resync, which re-extracts every live entity and prunes
//!   ids the engine no longer reports.
//!
//! Every write is an overwrite keyed by id, so replays and re-entrant
//! dispatch are harmless.
//!
//! Names resolve in this order: [`PlayerNameMap`] → cached snapshot →
//! live object → `None`.

use crate::engine::{EntityEvent, LiveEntity};
use crate::types::EntityState;
use log::debug;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

// ---------------------------------------------------------------------------
// Player names
// ---------------------------------------------------------------------------

/// Player id → display name. Authoritative over names in cached snapshots.
#[derive(Debug, Default)]
pub struct PlayerNameMap {
    names: RwLock<HashMap<String, String>>,
}

impl PlayerNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<String> {
        self.names.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.names.read().contains_key(id)
    }

    pub fn set(&self, id: &str, name: &str) {
        self.names.write().insert(id.to_string(), name.to_string());
    }

    /// Record a name only if the id has none yet. Returns whether it was
    /// recorded.
    pub fn insert_if_absent(&self, id: &str, name: &str) -> bool {
        let mut names = self.names.write();
        if names.contains_key(id) {
            return false;
        }
        names.insert(id.to_string(), name.to_string());
        true
    }

    pub fn remove(&self, id: &str) -> Option<String> {
        self.names.write().remove(id)
    }

    pub fn len(&self) -> usize {
        self.names.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.read().is_empty()
    }

    pub fn clear(&self) {
        self.names.write().clear();
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct EntityCache {
    entities: RwLock<HashMap<String, EntityState>>,
    names: PlayerNameMap,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn names(&self) -> &PlayerNameMap {
        &self.names
    }

    /// Route one engine event to the matching operation.
    pub fn apply(&self, event: &EntityEvent) {
        match event {
            EntityEvent::Added(live) => {
                self.add(live.as_ref());
            }
            EntityEvent::Modified { id, changes, live } => {
                self.modify(id, changes, live.as_deref());
            }
            EntityEvent::Removed { id } => {
                self.remove(id);
            }
        }
    }

    // ------------------------------------------------------------------
    // Event operations
    // ------------------------------------------------------------------

    pub fn add(&self, live: &dyn LiveEntity) -> Option<EntityState> {
        let Some(snapshot) = extract_snapshot(live) else {
            debug!("Ignoring entity without id");
            return None;
        };
        if snapshot.is_player() {
            if let Some(name) = &snapshot.name {
                self.names.insert_if_absent(&snapshot.id, name);
            }
        }
        self.entities
            .write()
            .insert(snapshot.id.clone(), snapshot.clone());
        Some(snapshot)
    }

    /// Apply a modify event. With the live object at hand the full snapshot
    /// is re-extracted; without it `changes` is merged onto the previous
    /// snapshot. An id that is neither cached nor live is ignored.
    pub fn modify(
        &self,
        id: &str,
        changes: &Value,
        live: Option<&dyn LiveEntity>,
    ) -> Option<EntityState> {
        let changed = changes.as_object();

        let updated = match live.and_then(extract_snapshot) {
            Some(snapshot) => snapshot,
            None => {
                let Some(mut snapshot) = self.get(id) else {
                    debug!("Modify for unknown entity {} without live object – ignored", id);
                    return None;
                };
                if let Some(changed) = changed {
                    merge_changes(&mut snapshot, changed);
                }
                debug!("Merged partial update for {} (no live object)", id);
                snapshot
            }
        };

        let renamed = changed
            .and_then(|c| c.get("name"))
            .and_then(Value::as_str);
        if let Some(name) = renamed {
            if updated.is_player() {
                self.names.set(id, name);
            }
        }

        self.entities.write().insert(id.to_string(), updated.clone());
        Some(updated)
    }

    pub fn remove(&self, id: &str) -> Option<EntityState> {
        self.names.remove(id);
        self.entities.write().remove(id)
    }

    // ------------------------------------------------------------------
    // Resync
    // ------------------------------------------------------------------

    /// Overwrite the snapshot of a polled live entity.
    pub fn refresh(&self, live: &dyn LiveEntity) -> Option<EntityState> {
        self.add(live)
    }

    /// Drop every entity (and player name) whose id is not in `live_ids`.
    /// Returns how many were dropped.
    pub fn retain_live(&self, live_ids: &HashSet<String>) -> usize {
        let stale: Vec<String> = self
            .entities
            .read()
            .keys()
            .filter(|id| !live_ids.contains(*id))
            .cloned()
            .collect();
        for id in &stale {
            self.remove(id);
        }
        stale.len()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get(&self, id: &str) -> Option<EntityState> {
        self.entities.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.read().contains_key(id)
    }

    pub fn entities(&self) -> Vec<EntityState> {
        self.entities.read().values().cloned().collect()
    }

    pub fn resolve_name(&self, id: &str, live: Option<&dyn LiveEntity>) -> Option<String> {
        self.names
            .get(id)
            .or_else(|| self.get(id).and_then(|e| e.name))
            .or_else(|| live.and_then(live_name))
    }

    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }

    /// Clear all state (e.g. after disconnect).
    pub fn clear(&self) {
        self.entities.write().clear();
        self.names.clear();
    }
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Snapshot a live entity, preferring its rich accessors and falling back to
/// its data record. `None` when the entity has no id.
pub fn extract_snapshot(live: &dyn LiveEntity) -> Option<EntityState> {
    let id = live.id();
    if id.is_empty() {
        return None;
    }
    let data = live.data();

    let kind = live
        .kind()
        .or_else(|| data.get("type").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| "unknown".into());

    let mut snapshot = EntityState::new(id, kind);
    snapshot.name = live_name(live);
    snapshot.position = live
        .position()
        .map(|p| p.to_array())
        .or_else(|| data.get("position").and_then(vec3_from_value))
        .unwrap_or(snapshot.position);
    snapshot.rotation = live
        .rotation()
        .map(|q| q.to_array())
        .or_else(|| rotation_from_record(&data))
        .unwrap_or(snapshot.rotation);
    Some(snapshot)
}

fn live_name(live: &dyn LiveEntity) -> Option<String> {
    live.name().or_else(|| {
        live.data()
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_string)
    })
}

fn merge_changes(snapshot: &mut EntityState, changes: &Map<String, Value>) {
    if let Some(kind) = changes.get("type").and_then(Value::as_str) {
        snapshot.kind = kind.to_string();
    }
    if let Some(name) = changes.get("name") {
        snapshot.name = name.as_str().map(str::to_string);
    }
    if let Some(position) = changes.get("position").and_then(vec3_from_value) {
        snapshot.position = position;
    }
    if let Some(rotation) = changes
        .get("quaternion")
        .or_else(|| changes.get("rotation"))
        .and_then(quat_from_value)
    {
        snapshot.rotation = rotation;
    }
}

fn rotation_from_record(data: &Value) -> Option<[f32; 4]> {
    data.get("quaternion")
        .or_else(|| data.get("rotation"))
        .and_then(quat_from_value)
}

/// `[x, y, z]` or `{ "x": .., "y": .., "z": .. }`.
pub fn vec3_from_value(value: &Value) -> Option<[f32; 3]> {
    match value {
        Value::Array(items) if items.len() >= 3 => {
            Some([num(&items[0])?, num(&items[1])?, num(&items[2])?])
        }
        Value::Object(map) => Some([
            num(map.get("x")?)?,
            num(map.get("y")?)?,
            num(map.get("z")?)?,
        ]),
        _ => None,
    }
}

/// `[x, y, z, w]` or `{ "x": .., "y": .., "z": .., "w": .. }`.
pub fn quat_from_value(value: &Value) -> Option<[f32; 4]> {
    match value {
        Value::Array(items) if items.len() >= 4 => Some([
            num(&items[0])?,
            num(&items[1])?,
            num(&items[2])?,
            num(&items[3])?,
        ]),
        Value::Object(map) => Some([
            num(map.get("x")?)?,
            num(map.get("y")?)?,
            num(map.get("z")?)?,
            num(map.get("w")?)?,
        ]),
        _ => None,
    }
}

fn num(value: &Value) -> Option<f32> {
    value.as_f64().map(|v| v as f32)
}
