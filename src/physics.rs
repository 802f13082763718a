//! Physics seams: the handle bundle the engine exposes once its physics is
//! ready, the solver/scene operations static bootstrap needs, collision
//! layers, and the environment model's scene graph.

use crate::error::PhysicsError;
use glam::{Mat4, Quat, Vec3};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActorHandle(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialHandle(pub u64);

/// Physics objects owned by the engine. Valid only while the session that
/// obtained them is active.
#[derive(Clone)]
pub struct PhysicsHandles {
    pub solver: Arc<dyn PhysicsSolver>,
    pub scene: Arc<dyn PhysicsScene>,
    pub default_material: MaterialHandle,
}

impl std::fmt::Debug for PhysicsHandles {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsHandles")
            .field("default_material", &self.default_material)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Collision layers
// ---------------------------------------------------------------------------

/// Static world geometry (walls, floors, terrain meshes).
pub const COLLISION_LAYER_ENVIRONMENT: u32 = 0b01;

/// Default layer of dynamic bodies (avatars, props).
pub const COLLISION_LAYER_DYNAMIC: u32 = 0b10;

/// Environment collides with dynamic bodies, not with itself.
pub const COLLISION_MASK_ENVIRONMENT: u32 = COLLISION_LAYER_DYNAMIC;

/// Query/simulation filter attached to a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterData {
    /// Layer the shape lives on.
    pub layer: u32,
    /// Layers it collides with.
    pub mask: u32,
}

impl FilterData {
    pub fn environment() -> Self {
        Self {
            layer: COLLISION_LAYER_ENVIRONMENT,
            mask: COLLISION_MASK_ENVIRONMENT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeFlags {
    pub scene_query: bool,
    pub simulation: bool,
}

impl ShapeFlags {
    pub const STATIC_COLLIDER: ShapeFlags = ShapeFlags {
        scene_query: true,
        simulation: true,
    };
}

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Raw triangle soup of one mesh node, in the node's local space.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshGeometry {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshGeometry {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Non-convex triangle mesh scaled into world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleMeshGeometry {
    pub mesh: MeshHandle,
    pub scale: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeDesc {
    pub geometry: TriangleMeshGeometry,
    pub material: MaterialHandle,
    pub flags: ShapeFlags,
    pub filter: FilterData,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// Object factory side of the external physics library.
pub trait PhysicsSolver: Send + Sync {
    fn cook_triangle_mesh(&self, geometry: &MeshGeometry) -> Result<MeshHandle, PhysicsError>;

    /// Drop one reference to a cooked mesh.
    fn release_mesh(&self, mesh: MeshHandle);

    fn create_shape(&self, desc: &ShapeDesc) -> Result<ShapeHandle, PhysicsError>;

    fn create_static_actor(&self, transform: &Transform) -> Result<ActorHandle, PhysicsError>;

    fn attach_shape(&self, actor: ActorHandle, shape: ShapeHandle) -> Result<(), PhysicsError>;

    /// Free a shape that never made it into the scene.
    fn release_shape(&self, shape: ShapeHandle);

    /// Free an actor that never made it into the scene, with anything
    /// attached to it.
    fn release_actor(&self, actor: ActorHandle);
}

pub trait PhysicsScene: Send + Sync {
    fn add_actor(&self, actor: ActorHandle) -> Result<(), PhysicsError>;
}

// ---------------------------------------------------------------------------
// Cooked mesh guard
// ---------------------------------------------------------------------------

/// A cooked triangle mesh reference, released when dropped.
///
/// Shapes built from the mesh take their own reference, so the cooking
/// reference is always given back whether or not the shape was created.
pub struct CookedMesh<'a> {
    solver: &'a dyn PhysicsSolver,
    handle: MeshHandle,
}

impl<'a> CookedMesh<'a> {
    pub fn cook(solver: &'a dyn PhysicsSolver, geometry: &MeshGeometry) -> Result<Self, PhysicsError> {
        let handle = solver.cook_triangle_mesh(geometry)?;
        Ok(Self { solver, handle })
    }

    pub fn handle(&self) -> MeshHandle {
        self.handle
    }
}

impl Drop for CookedMesh<'_> {
    fn drop(&mut self) {
        self.solver.release_mesh(self.handle);
    }
}

// ---------------------------------------------------------------------------
// Model scene graph
// ---------------------------------------------------------------------------

/// One node of a loaded model, with its transform relative to the parent.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelNode {
    pub name: String,
    pub visible: bool,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub mesh: Option<MeshGeometry>,
    pub children: Vec<ModelNode>,
}

impl ModelNode {
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visible: true,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            mesh: None,
            children: Vec::new(),
        }
    }

    pub fn mesh(name: impl Into<String>, geometry: MeshGeometry) -> Self {
        Self {
            mesh: Some(geometry),
            ..Self::group(name)
        }
    }

    pub fn with_translation(mut self, translation: Vec3) -> Self {
        self.translation = translation;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    pub fn with_child(mut self, child: ModelNode) -> Self {
        self.children.push(child);
        self
    }

    fn local_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A visible mesh node with its world-space transform decomposed.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleMesh<'a> {
    pub name: &'a str,
    pub geometry: &'a MeshGeometry,
    pub world_position: Vec3,
    pub world_rotation: Quat,
    pub world_scale: Vec3,
}

/// Depth-first walk of every visible mesh. A hidden node hides its whole
/// subtree.
pub fn visible_meshes(root: &ModelNode) -> Vec<VisibleMesh<'_>> {
    let mut out = Vec::new();
    collect_visible(root, Mat4::IDENTITY, &mut out);
    out
}

fn collect_visible<'a>(node: &'a ModelNode, parent: Mat4, out: &mut Vec<VisibleMesh<'a>>) {
    if !node.visible {
        return;
    }
    let world = parent * node.local_matrix();
    if let Some(geometry) = &node.mesh {
        let (scale, rotation, position) = world.to_scale_rotation_translation();
        out.push(VisibleMesh {
            name: &node.name,
            geometry,
            world_position: position,
            world_rotation: rotation,
            world_scale: scale,
        });
    }
    for child in &node.children {
        collect_visible(child, world, out);
    }
}
