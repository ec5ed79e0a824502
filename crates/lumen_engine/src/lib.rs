//! # Lumen Engine
//!
//! The runtime core of a real-time 3D renderer: shader variant caching,
//! uniform binding with change detection, light state aggregation, and
//! ordered draw-list assembly. The GPU is an opaque collaborator behind the
//! [`render::GraphicsDevice`] trait; scene traversal, resource loading, and
//! windowing live in the embedding application.
//!
//! ## Per-frame flow
//!
//! ```rust,no_run
//! use lumen_engine::prelude::*;
//!
//! # fn frame(renderer: &mut Renderer, device: &mut dyn GraphicsDevice,
//! #          camera: &Camera, lights: &[Light], material: &Material,
//! #          drawable: &Drawable) -> Result<(), RenderError> {
//! let scene = SceneId(1);
//! let state = renderer.render_state(scene, camera.id);
//! state.init();
//! for light in lights {
//!     state.push_light(light);
//! }
//! state.setup_lights(camera);
//! let lights_hash = state.lights_hash();
//! state.list_mut().push(drawable, material, None, 4.0, None);
//! state.list_mut().sort();
//!
//! let program = renderer.prepare_material(
//!     device, material, &lights_hash, None, ClippingState::default(), drawable,
//! )?;
//! renderer.upload_item_uniforms(device, program, material, drawable, scene, camera, None)?;
//! // ... issue the draw call on the device ...
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod core;
pub mod foundation;
pub mod render;

pub use render::{RenderError, RenderResult};

/// Common imports for engine users
pub mod prelude {
    pub use crate::core::config::{
        ColorSpace, DeviceLimits, Precision, RendererConfig, ToneMapping,
    };
    pub use crate::foundation::math::{Mat3, Mat4, Vec2, Vec3, Vec4};
    pub use crate::render::{
        Camera, CameraId, ClippingState, Drawable, DrawableId, FallbackTextures, Fog,
        GeometryGroup, GeometryId, GraphicsDevice, Light, LightId, LightKind, LightsHash,
        Material, MaterialId, MaterialKind, ProgramHandle, RenderError, RenderResult, Renderer,
        SceneId, ShadowDescriptor, TextureId, UniformValue, UniformValueMap,
    };
}
