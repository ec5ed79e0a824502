//! Light model and per-frame light state aggregation
//!
//! [`Light`] is the thin binding to the scene's light objects: color,
//! intensity, world transform, and kind-specific fields. The per-frame
//! machinery that buckets visible lights by kind and produces uniform-ready
//! records lives in [`state`].
//!
//! Kind-specific behavior is dispatched by exhaustive `match` on
//! [`LightKind`].

pub mod state;

pub use state::{
    DirectionalLightUniforms, HemisphereLightUniforms, LightBuckets, LightShadowUniforms,
    LightState, LightsHash, PointLightUniforms, RectAreaLightUniforms, SpotLightUniforms,
};

use crate::foundation::math::{Mat4, Vec2, Vec3};
use crate::render::device::TextureId;

/// Stable light identity, assigned by the embedding scene model
///
/// Uniform records are cached per identity, not per traversal position, so a
/// light that moves around in traversal order keeps its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightId(pub u32);

/// Kind-specific light fields
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    /// Omnidirectional constant illumination; accumulated, never bucketed
    Ambient,
    /// Parallel rays from an infinitely distant source
    Directional {
        /// World-space direction the light travels, toward the scene
        direction: Vec3,
    },
    /// Omnidirectional emission from a point
    Point {
        /// Cutoff distance; 0 means unbounded
        distance: f32,
        /// Attenuation exponent
        decay: f32,
    },
    /// Cone of light from a point
    Spot {
        /// World-space direction the cone opens toward
        direction: Vec3,
        /// Cutoff distance; 0 means unbounded
        distance: f32,
        /// Attenuation exponent
        decay: f32,
        /// Half-angle of the cone, radians
        angle: f32,
        /// Fraction of the cone that fades out, in `[0, 1]`
        penumbra: f32,
    },
    /// Rectangular area emitter
    RectArea {
        /// Rectangle width in world units
        width: f32,
        /// Rectangle height in world units
        height: f32,
    },
    /// Sky/ground gradient light
    Hemisphere {
        /// World-space up direction of the gradient
        direction: Vec3,
        /// Color at the ground pole
        ground_color: Vec3,
    },
}

/// Shadow parameters a shadow-casting light exposes
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowDescriptor {
    /// Depth bias applied when sampling the shadow map
    pub bias: f32,
    /// Blur radius for soft shadow edges
    pub radius: f32,
    /// Shadow map resolution in texels
    pub map_size: Vec2,
    /// World-to-shadow-map projection matrix
    pub matrix: Mat4,
    /// Rendered shadow map, if the shadow pass has produced one
    pub map: Option<TextureId>,
}

/// One light as seen by the renderer core
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Stable identity
    pub id: LightId,
    /// Light color
    pub color: Vec3,
    /// Light intensity; multiplied into the color for uniform records
    pub intensity: f32,
    /// World matrix from the transform hierarchy
    pub world_matrix: Mat4,
    /// Kind and kind-specific fields
    pub kind: LightKind,
    /// Whether this light contributes to the shadow pass
    pub cast_shadow: bool,
    /// Shadow parameters; present when `cast_shadow` is set
    pub shadow: Option<ShadowDescriptor>,
}

impl Light {
    /// Create an ambient light
    pub fn ambient(id: LightId, color: Vec3, intensity: f32) -> Self {
        Self::with_kind(id, color, intensity, LightKind::Ambient)
    }

    /// Create a directional light traveling along `direction`
    pub fn directional(id: LightId, color: Vec3, intensity: f32, direction: Vec3) -> Self {
        Self::with_kind(id, color, intensity, LightKind::Directional { direction })
    }

    /// Create a point light; position comes from the world matrix
    pub fn point(id: LightId, color: Vec3, intensity: f32, distance: f32, decay: f32) -> Self {
        Self::with_kind(id, color, intensity, LightKind::Point { distance, decay })
    }

    /// Create a spot light opening toward `direction`
    pub fn spot(
        id: LightId,
        color: Vec3,
        intensity: f32,
        direction: Vec3,
        distance: f32,
        decay: f32,
        angle: f32,
        penumbra: f32,
    ) -> Self {
        Self::with_kind(
            id,
            color,
            intensity,
            LightKind::Spot {
                direction,
                distance,
                decay,
                angle,
                penumbra,
            },
        )
    }

    /// Create a rectangular area light; orientation comes from the world matrix
    pub fn rect_area(id: LightId, color: Vec3, intensity: f32, width: f32, height: f32) -> Self {
        Self::with_kind(id, color, intensity, LightKind::RectArea { width, height })
    }

    /// Create a hemisphere light with separate sky and ground colors
    pub fn hemisphere(
        id: LightId,
        sky_color: Vec3,
        ground_color: Vec3,
        intensity: f32,
        direction: Vec3,
    ) -> Self {
        Self::with_kind(
            id,
            sky_color,
            intensity,
            LightKind::Hemisphere {
                direction,
                ground_color,
            },
        )
    }

    fn with_kind(id: LightId, color: Vec3, intensity: f32, kind: LightKind) -> Self {
        Self {
            id,
            color,
            intensity,
            world_matrix: Mat4::identity(),
            kind,
            cast_shadow: false,
            shadow: None,
        }
    }

    /// Color scaled by intensity, the form uniform records carry
    pub fn scaled_color(&self) -> Vec3 {
        self.color * self.intensity
    }
}
