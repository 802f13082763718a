//! Static physics bootstrap: turns the environment model into static
//! collision actors registered with the engine's physics scene.
//!
//! Runs once per session, after the engine reports its physics handles and
//! before the session is marked connected. A missing or unloadable asset is
//! tolerated: the report is still marked complete.

use crate::engine::{AssetKind, Loader};
use crate::error::PhysicsError;
use crate::physics::{
    visible_meshes, ActorHandle, CookedMesh, FilterData, PhysicsHandles, ShapeDesc, ShapeFlags,
    Transform, TriangleMeshGeometry, VisibleMesh,
};
use log::{debug, info, warn};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    /// Visible meshes attempted.
    pub meshes_processed: usize,
    /// Static actors registered with the scene.
    pub actors_added: usize,
    pub failures: usize,
    /// Why nothing was attempted, if so.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    pub complete: bool,
}

impl BootstrapReport {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            skipped: Some(reason.into()),
            complete: true,
            ..Default::default()
        }
    }
}

pub async fn bootstrap_static_physics(
    loader: &dyn Loader,
    handles: &PhysicsHandles,
    environment_url: Option<&str>,
) -> BootstrapReport {
    let Some(url) = environment_url else {
        warn!("No environment asset configured – continuing without static colliders");
        return BootstrapReport::skipped("no environment asset configured");
    };

    let root = match loader.load(AssetKind::Model, url).await {
        Ok(root) => root,
        Err(e) => {
            warn!("Environment load failed – continuing without static colliders: {}", e);
            return BootstrapReport::skipped(e.to_string());
        }
    };

    let mut report = BootstrapReport::default();
    for mesh in visible_meshes(&root) {
        report.meshes_processed += 1;
        match register_static_mesh(handles, &mesh) {
            Ok(actor) => {
                debug!("Registered static actor {:?} for mesh '{}'", actor, mesh.name);
                report.actors_added += 1;
            }
            Err(e) => {
                warn!("Skipping mesh '{}': {}", mesh.name, e);
                report.failures += 1;
            }
        }
    }
    report.complete = true;

    info!(
        "Static physics ready: {} meshes, {} actors, {} failures",
        report.meshes_processed, report.actors_added, report.failures
    );
    report
}

fn register_static_mesh(
    handles: &PhysicsHandles,
    mesh: &VisibleMesh<'_>,
) -> Result<ActorHandle, PhysicsError> {
    let solver = handles.solver.as_ref();
    // Released on every exit path below.
    let cooked = CookedMesh::cook(solver, mesh.geometry)?;

    let shape = solver.create_shape(&ShapeDesc {
        geometry: TriangleMeshGeometry {
            mesh: cooked.handle(),
            scale: mesh.world_scale,
        },
        material: handles.default_material,
        flags: ShapeFlags::STATIC_COLLIDER,
        filter: FilterData::environment(),
    })?;

    let actor = match solver.create_static_actor(&Transform {
        position: mesh.world_position,
        rotation: mesh.world_rotation,
    }) {
        Ok(actor) => actor,
        Err(e) => {
            solver.release_shape(shape);
            return Err(e);
        }
    };

    // Once in the scene, the actor and its shape belong to the engine.
    let registered = solver
        .attach_shape(actor, shape)
        .and_then(|()| handles.scene.add_actor(actor));
    if let Err(e) = registered {
        solver.release_actor(actor);
        solver.release_shape(shape);
        return Err(e);
    }
    Ok(actor)
}
