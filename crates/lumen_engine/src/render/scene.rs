//! Thin bindings to the scene model the renderer consumes
//!
//! Scene-graph traversal, transform hierarchies, and resource loading live in
//! the embedding application. The renderer core only sees the handful of
//! values specified here: stable identities, world/view matrices, render
//! order, and fog settings.

use crate::foundation::math::{Mat4, Vec3};

/// Stable identity of a scene, assigned by the embedding scene model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneId(pub u32);

/// Stable identity of a camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(pub u32);

/// Stable identity of a drawable object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DrawableId(pub u32);

/// Stable identity of a geometry resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub u32);

/// Camera state the core needs: identity plus the view matrix
///
/// The view matrix is the inverse of the camera's world matrix; light
/// positions and directions are transformed by it into camera space.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Stable camera identity
    pub id: CameraId,
    /// Inverse of the camera's world matrix
    pub view_matrix: Mat4,
    /// Projection matrix applied after the view transform
    pub projection: Mat4,
}

impl Camera {
    /// Build a camera from its world matrix, inverting it into a view matrix
    ///
    /// The projection starts as identity; returns `None` for a singular world
    /// matrix (degenerate scale).
    pub fn from_world_matrix(id: CameraId, world_matrix: &Mat4) -> Option<Self> {
        world_matrix.try_inverse().map(|view_matrix| Self {
            id,
            view_matrix,
            projection: Mat4::identity(),
        })
    }

    /// Replace the projection matrix
    pub fn with_projection(mut self, projection: Mat4) -> Self {
        self.projection = projection;
        self
    }
}

/// Sub-range of a geometry drawn with its own material slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryGroup {
    /// First index of the range
    pub start: u32,
    /// Number of indices in the range
    pub count: u32,
}

/// Per-drawable values consumed when queueing a render item
#[derive(Debug, Clone)]
pub struct Drawable {
    /// Stable drawable identity
    pub id: DrawableId,
    /// Geometry resource to draw
    pub geometry: GeometryId,
    /// Application-controlled draw ordering; sorts before depth
    pub render_order: i32,
    /// World matrix produced by the transform hierarchy
    pub world_matrix: Mat4,
    /// Bone count when the drawable is skinned
    pub bone_count: Option<u32>,
}

/// Scene fog settings
///
/// The fog kind participates in program cache keys (switching kinds changes
/// generated shader text); fog values are plain uniform data.
#[derive(Debug, Clone, PartialEq)]
pub enum Fog {
    /// Linear fog between two view-space distances
    Linear {
        /// Fog color
        color: Vec3,
        /// Distance where fog starts
        near: f32,
        /// Distance of full fog
        far: f32,
    },
    /// Exponential-squared fog
    ExponentialSquared {
        /// Fog color
        color: Vec3,
        /// Density coefficient
        density: f32,
    },
}

impl Fog {
    /// Token identifying the fog kind in program cache keys
    pub fn kind_token(&self) -> &'static str {
        match self {
            Self::Linear { .. } => "fog_linear",
            Self::ExponentialSquared { .. } => "fog_exp2",
        }
    }
}
