//! Graphics device abstraction
//!
//! The renderer core never talks to a GPU API directly. Everything it needs
//! from the device (shader compilation, program linking, uniform reflection,
//! uniform upload, and texture binding) goes through the [`GraphicsDevice`]
//! trait. A Vulkan, GL, or wgpu backend implements this trait; tests use a
//! recording mock.
//!
//! The trait is deliberately narrow: the core decides *which* program and
//! *which* uniform values to use and *when*, and the device does the rest.

use std::collections::BTreeMap;

/// Handle to a compiled (not yet linked) shader stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderHandle(pub u32);

/// Handle to a linked GPU program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceProgram(pub u32);

/// Handle to a device texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Address of an active uniform within a linked program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformAddress(pub u32);

/// Shader pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
}

/// Dimensionality of a texture binding point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureDimension {
    /// 2D texture
    D2,
    /// 3D (volume) texture
    D3,
    /// Cube map
    Cube,
}

/// Primitive kind of an active uniform, as reported by program reflection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    /// 32-bit float scalar
    Float,
    /// 2-component float vector
    Vec2,
    /// 3-component float vector
    Vec3,
    /// 4-component float vector
    Vec4,
    /// 32-bit signed integer scalar
    Int,
    /// 2-component integer vector
    IntVec2,
    /// 3-component integer vector
    IntVec3,
    /// 4-component integer vector
    IntVec4,
    /// Boolean scalar (uploaded as an integer)
    Bool,
    /// 2x2 float matrix
    Mat2,
    /// 3x3 float matrix
    Mat3,
    /// 4x4 float matrix
    Mat4,
    /// 2D texture sampler
    Sampler2D,
    /// 3D texture sampler
    Sampler3D,
    /// Cube map sampler
    SamplerCube,
    /// A kind this core has no setter for; carries the device's raw type code
    Unsupported(u32),
}

impl UniformKind {
    /// Number of float (or int) components one element of this kind occupies
    pub fn block_len(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::Bool => 1,
            Self::Vec2 | Self::IntVec2 => 2,
            Self::Vec3 | Self::IntVec3 => 3,
            Self::Vec4 | Self::IntVec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
            Self::Sampler2D | Self::Sampler3D | Self::SamplerCube => 1,
            Self::Unsupported(_) => 0,
        }
    }

    /// The texture dimensionality a sampler kind binds, if any
    pub fn sampler_dimension(self) -> Option<TextureDimension> {
        match self {
            Self::Sampler2D => Some(TextureDimension::D2),
            Self::Sampler3D => Some(TextureDimension::D3),
            Self::SamplerCube => Some(TextureDimension::Cube),
            _ => None,
        }
    }
}

/// One active uniform reported by program reflection
///
/// Array uniforms are reported once with `count > 1` and the GL-style
/// `name[0]` suffix on the name.
#[derive(Debug, Clone)]
pub struct UniformDeclaration {
    /// Full dotted/bracketed uniform path, e.g. `pointLights[0].color`
    pub name: String,
    /// Primitive kind of one element
    pub kind: UniformKind,
    /// Element count; 1 for non-arrays
    pub count: usize,
    /// Upload address within the program
    pub addr: UniformAddress,
}

/// Result of linking a program
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    /// Device handle for the linked program
    pub handle: DeviceProgram,
    /// Whether the link succeeded; a non-runnable program is still returned
    pub runnable: bool,
    /// Device diagnostic log, empty on success
    pub log: String,
}

/// Raw data handed to the device for one uniform upload
#[derive(Debug, Clone, Copy)]
pub enum UniformData<'a> {
    /// Float components (scalars, vectors, matrices, flattened arrays)
    Floats(&'a [f32]),
    /// Integer components (ints, bools, sampler units)
    Ints(&'a [i32]),
}

/// The opaque graphics device the renderer core drives
///
/// Implementations are expected to be cheap to call; the core already
/// minimizes calls by diffing uniform values before upload.
pub trait GraphicsDevice {
    /// Compile one shader stage from final source text
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> ShaderHandle;

    /// Link compiled stages into a program
    ///
    /// A failed link still yields a handle so the caller can attach
    /// diagnostics; rendering with it is the caller's responsibility.
    fn link_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> LinkedProgram;

    /// Reflect the active uniforms of a linked program, in declaration order
    fn active_uniforms(&self, program: DeviceProgram) -> Vec<UniformDeclaration>;

    /// Reflect the active vertex attributes of a linked program
    fn active_attributes(&self, program: DeviceProgram) -> BTreeMap<String, u32>;

    /// Release a linked program and its shaders
    fn delete_program(&mut self, program: DeviceProgram);

    /// Upload one uniform value
    fn upload_uniform(&mut self, addr: UniformAddress, kind: UniformKind, data: UniformData<'_>);

    /// Bind a texture (or unbind with `None`) to a texture unit
    fn bind_texture(&mut self, unit: u32, dimension: TextureDimension, texture: Option<TextureId>);
}
