//! # Rendering Core
//!
//! The frame-driven runtime core of the engine: given a scene's lights and
//! drawables, a camera, and materials, it selects or compiles GPU program
//! variants, binds and diffs their uniform inputs, and assembles ordered draw
//! lists. The GPU itself is behind the [`device::GraphicsDevice`] trait.
//!
//! ## Architecture
//!
//! - **uniforms**: reflects a program's uniform interface into a tree of
//!   typed setters and uploads only changed values
//! - **programs**: derives deterministic cache keys and reference-counts
//!   compiled program variants
//! - **lighting**: buckets visible lights per (scene, camera) and hashes the
//!   population so data-only changes never force a relink
//! - **list**: classifies and sorts drawable items for opaque/transparent
//!   compositing
//! - **state**: owns the per-(scene, camera) light and list state across
//!   frames
//! - **renderer**: the facade driving the per-frame flow in order
//!
//! ## Frame protocol
//!
//! Within one frame: `init` -> population (`push`, `push_light`) ->
//! `setup`/`sort` -> program acquisition and uniform upload. Everything is
//! single-threaded and synchronous; see the concurrency notes on
//! [`renderer::Renderer`].

pub mod device;
pub mod lighting;
pub mod list;
pub mod materials;
pub mod programs;
pub mod renderer;
pub mod scene;
pub mod state;
pub mod uniforms;

pub use device::{
    DeviceProgram, GraphicsDevice, LinkedProgram, ShaderHandle, ShaderStage, TextureDimension,
    TextureId, UniformAddress, UniformData, UniformDeclaration, UniformKind,
};
pub use lighting::{Light, LightId, LightKind, LightState, LightsHash, ShadowDescriptor};
pub use list::{RenderItem, RenderList};
pub use materials::{
    CustomShader, Material, MaterialFeatures, MaterialId, MaterialKind, ShaderId, TextureSlots,
};
pub use programs::{
    ClippingState, ProgramHandle, ProgramVariant, ProgramVariantCache, ShaderParameters,
};
pub use renderer::Renderer;
pub use scene::{Camera, CameraId, Drawable, DrawableId, Fog, GeometryGroup, GeometryId, SceneId};
pub use state::{RenderState, RenderStateRegistry};
pub use uniforms::{
    FallbackTextures, ScratchPool, TextureUnits, UniformBindingTree, UniformValue,
    UniformValueMap, UploadContext,
};

use thiserror::Error;

/// Errors raised by the rendering core
///
/// Everything here indicates a programming or configuration error in the
/// embedding application, not a transient runtime condition; nothing is
/// retried. Link failures are *not* errors; see
/// [`programs::ProgramDiagnostics`].
#[derive(Error, Debug)]
pub enum RenderError {
    /// Shader text was requested for a tone-mapping operator the core has no
    /// generator for
    #[error("unsupported tone mapping operator (code {0})")]
    UnsupportedToneMapping(u32),

    /// Shader text was requested for an output color space the core has no
    /// generator for
    #[error("unsupported output color space (code {0})")]
    UnsupportedColorSpace(u32),

    /// A reflected uniform name could not be decomposed into path segments
    ///
    /// Indicates a mismatch between the compiled program and this binding
    /// layer's parser.
    #[error("malformed uniform path: {name:?}")]
    MalformedUniformPath {
        /// The reflected name as reported by the device
        name: String,
    },

    /// A reflected uniform has a primitive kind this core has no setter for
    #[error("no setter for uniform {name:?} (device type code {code})")]
    UnsupportedUniformKind {
        /// Uniform path
        name: String,
        /// Raw device type code
        code: u32,
    },

    /// A structured value was missing an entry for a declared member
    #[error("no value supplied for uniform {name:?}")]
    MissingUniformValue {
        /// Uniform path of the member without a value
        name: String,
    },

    /// A supplied value does not match the declared kind of a uniform
    #[error("value for uniform {name:?} does not match its declared kind")]
    UniformTypeMismatch {
        /// Uniform path
        name: String,
    },
}

/// Result alias for rendering-core operations
pub type RenderResult<T> = Result<T, RenderError>;
