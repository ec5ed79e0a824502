//! Uniform binding layer
//!
//! Reflects a compiled program's uniform declarations into a tree of typed
//! setter nodes, then diffs values against a per-node cache so only changed
//! data reaches the device.
//!
//! ## Tree shape
//!
//! Reflected names decompose into path segments: `fog.near` produces a
//! struct node `fog` with a leaf `near`; `pointLights[0].color` produces an
//! array-of-structs; a trailing `[N]` (`boneMatrices[0]`) produces a "pure"
//! bottom-level array uploaded with a single flattened device call. The tree
//! shape is fixed at construction and never changes for the lifetime of the
//! owning program.
//!
//! ## Upload contract
//!
//! Every set call compares the flattened value against the node's
//! last-uploaded cache and skips the device entirely when nothing changed.
//! Flattening goes through [`ScratchPool`] buffers reused across calls.
//! Sampler leaves allocate a texture unit per upload pass and bind either
//! the supplied texture or the fallback of their dimensionality.

pub mod values;

pub use values::{ScratchPool, UniformValue, UniformValueMap};

use std::collections::HashMap;

use crate::render::device::{
    GraphicsDevice, TextureDimension, TextureId, UniformAddress, UniformData, UniformDeclaration,
    UniformKind,
};
use crate::render::{RenderError, RenderResult};

/// Identity of a node within its parent: a member name or an array index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UniformIdent {
    /// Named member
    Name(String),
    /// Array element
    Index(usize),
}

/// Per-draw texture unit counter
///
/// Reset once per uniform upload pass; not shared across passes. Exceeding
/// the device budget logs a warning and keeps counting, matching the
/// graceful-degradation policy for resource exhaustion.
#[derive(Debug)]
pub struct TextureUnits {
    next: u32,
    max: u32,
}

impl TextureUnits {
    /// Create a counter with the device's texture unit budget
    pub fn new(max: u32) -> Self {
        Self { next: 0, max }
    }

    /// Start a new upload pass at unit zero
    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Claim the next unit
    pub fn allocate(&mut self) -> u32 {
        let unit = self.next;
        if unit >= self.max {
            log::warn!(
                "texture unit {} exceeds the device budget of {}",
                unit,
                self.max
            );
        }
        self.next += 1;
        unit
    }
}

/// Shared empty textures bound when a sampler receives no texture
///
/// Created once by the embedding application from its device and handed to
/// the renderer; binding a fallback instead of erroring keeps a frame alive
/// when a texture has not finished loading.
#[derive(Debug, Clone, Copy)]
pub struct FallbackTextures {
    /// 1x1 empty 2D texture
    pub d2: TextureId,
    /// 1x1x1 empty 3D texture
    pub d3: TextureId,
    /// 1x1 empty cube map
    pub cube: TextureId,
}

impl FallbackTextures {
    fn for_dimension(&self, dimension: TextureDimension) -> TextureId {
        match dimension {
            TextureDimension::D2 => self.d2,
            TextureDimension::D3 => self.d3,
            TextureDimension::Cube => self.cube,
        }
    }
}

/// Everything a set call needs besides the value: the device, the scratch
/// pool, the texture unit counter, and the fallback textures
pub struct UploadContext<'a> {
    /// Device receiving uploads and bindings
    pub device: &'a mut dyn GraphicsDevice,
    /// Flatten-buffer pool shared across trees
    pub scratch: &'a mut ScratchPool,
    /// Per-pass texture unit counter
    pub units: &'a mut TextureUnits,
    /// Fallback textures for null sampler inputs
    pub fallbacks: &'a FallbackTextures,
}

fn is_int_kind(kind: UniformKind) -> bool {
    matches!(
        kind,
        UniformKind::Int
            | UniformKind::IntVec2
            | UniformKind::IntVec3
            | UniformKind::IntVec4
            | UniformKind::Bool
    )
}

struct LeafUniform {
    ident: UniformIdent,
    path: String,
    addr: UniformAddress,
    kind: UniformKind,
    float_cache: Vec<f32>,
    int_cache: Vec<i32>,
}

impl LeafUniform {
    fn set(&mut self, ctx: &mut UploadContext<'_>, value: &UniformValue) -> RenderResult<()> {
        if let Some(dimension) = self.kind.sampler_dimension() {
            return self.set_texture(ctx, dimension, value);
        }
        match self.kind {
            UniformKind::Unsupported(code) => Err(RenderError::UnsupportedUniformKind {
                name: self.path.clone(),
                code,
            }),
            kind if is_int_kind(kind) => {
                let mut ints = Vec::with_capacity(kind.block_len());
                if !value.write_ints(&mut ints) || ints.len() != kind.block_len() {
                    return Err(RenderError::UniformTypeMismatch {
                        name: self.path.clone(),
                    });
                }
                if ints != self.int_cache {
                    ctx.device
                        .upload_uniform(self.addr, kind, UniformData::Ints(&ints));
                    self.int_cache = ints;
                }
                Ok(())
            }
            kind => {
                let mut floats = ctx.scratch.take(kind.block_len());
                if !value.write_floats(&mut floats) || floats.len() != kind.block_len() {
                    ctx.scratch.give_back(floats);
                    return Err(RenderError::UniformTypeMismatch {
                        name: self.path.clone(),
                    });
                }
                if floats[..] != self.float_cache[..] {
                    ctx.device
                        .upload_uniform(self.addr, kind, UniformData::Floats(&floats));
                    self.float_cache.clear();
                    self.float_cache.extend_from_slice(&floats);
                }
                ctx.scratch.give_back(floats);
                Ok(())
            }
        }
    }

    fn set_texture(
        &mut self,
        ctx: &mut UploadContext<'_>,
        dimension: TextureDimension,
        value: &UniformValue,
    ) -> RenderResult<()> {
        let texture = match value {
            UniformValue::Texture(texture) => *texture,
            _ => {
                return Err(RenderError::UniformTypeMismatch {
                    name: self.path.clone(),
                })
            }
        };
        let unit = ctx.units.allocate();
        let unit_value = unit as i32;
        if self.int_cache.first() != Some(&unit_value) {
            ctx.device
                .upload_uniform(self.addr, self.kind, UniformData::Ints(&[unit_value]));
            self.int_cache.clear();
            self.int_cache.push(unit_value);
        }
        let bound = texture.unwrap_or_else(|| ctx.fallbacks.for_dimension(dimension));
        ctx.device.bind_texture(unit, dimension, Some(bound));
        Ok(())
    }
}

struct PureArrayUniform {
    ident: UniformIdent,
    path: String,
    addr: UniformAddress,
    kind: UniformKind,
    len: usize,
    float_cache: Vec<f32>,
    int_cache: Vec<i32>,
}

impl PureArrayUniform {
    fn set(&mut self, ctx: &mut UploadContext<'_>, value: &UniformValue) -> RenderResult<()> {
        if let Some(dimension) = self.kind.sampler_dimension() {
            return self.set_textures(ctx, dimension, value);
        }
        match self.kind {
            UniformKind::Unsupported(code) => Err(RenderError::UnsupportedUniformKind {
                name: self.path.clone(),
                code,
            }),
            kind if is_int_kind(kind) => {
                let expected = self.len * kind.block_len();
                let mut ints = Vec::with_capacity(expected);
                if !value.write_ints(&mut ints) || ints.len() != expected {
                    return Err(RenderError::UniformTypeMismatch {
                        name: self.path.clone(),
                    });
                }
                if ints != self.int_cache {
                    ctx.device
                        .upload_uniform(self.addr, kind, UniformData::Ints(&ints));
                    self.int_cache = ints;
                }
                Ok(())
            }
            kind => {
                let expected = self.len * kind.block_len();
                let mut floats = ctx.scratch.take(expected);
                if !value.write_floats(&mut floats) || floats.len() != expected {
                    ctx.scratch.give_back(floats);
                    return Err(RenderError::UniformTypeMismatch {
                        name: self.path.clone(),
                    });
                }
                if floats[..] != self.float_cache[..] {
                    ctx.device
                        .upload_uniform(self.addr, kind, UniformData::Floats(&floats));
                    self.float_cache.clear();
                    self.float_cache.extend_from_slice(&floats);
                }
                ctx.scratch.give_back(floats);
                Ok(())
            }
        }
    }

    fn set_textures(
        &mut self,
        ctx: &mut UploadContext<'_>,
        dimension: TextureDimension,
        value: &UniformValue,
    ) -> RenderResult<()> {
        let UniformValue::TextureArray(textures) = value else {
            return Err(RenderError::UniformTypeMismatch {
                name: self.path.clone(),
            });
        };
        let mut units = Vec::with_capacity(self.len);
        for _ in 0..self.len {
            units.push(ctx.units.allocate() as i32);
        }
        if units != self.int_cache {
            ctx.device
                .upload_uniform(self.addr, self.kind, UniformData::Ints(&units));
            self.int_cache = units.clone();
        }
        for (slot, unit) in units.iter().enumerate() {
            let texture = textures
                .get(slot)
                .copied()
                .flatten()
                .unwrap_or_else(|| ctx.fallbacks.for_dimension(dimension));
            ctx.device
                .bind_texture(*unit as u32, dimension, Some(texture));
        }
        Ok(())
    }
}

struct StructUniform {
    ident: UniformIdent,
    path: String,
    children: Vec<UniformNode>,
    index: HashMap<String, usize>,
}

impl StructUniform {
    fn new(ident: UniformIdent, path: String) -> Self {
        Self {
            ident,
            path,
            children: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn index_key(ident: &UniformIdent) -> String {
        match ident {
            UniformIdent::Name(name) => name.clone(),
            UniformIdent::Index(index) => index.to_string(),
        }
    }

    fn child_path(&self, ident: &UniformIdent) -> String {
        match ident {
            UniformIdent::Name(name) if self.path.is_empty() => name.clone(),
            UniformIdent::Name(name) => format!("{}.{}", self.path, name),
            UniformIdent::Index(index) => format!("{}[{}]", self.path, index),
        }
    }

    fn child_struct(
        &mut self,
        ident: UniformIdent,
        declared: &str,
    ) -> RenderResult<&mut StructUniform> {
        let key = Self::index_key(&ident);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                let slot = self.children.len();
                let path = self.child_path(&ident);
                self.index.insert(key, slot);
                self.children
                    .push(UniformNode::Struct(StructUniform::new(ident, path)));
                slot
            }
        };
        match &mut self.children[slot] {
            UniformNode::Struct(child) => Ok(child),
            _ => Err(RenderError::MalformedUniformPath {
                name: declared.to_string(),
            }),
        }
    }

    fn insert(&mut self, node: UniformNode) {
        let key = Self::index_key(node.ident());
        if self.index.contains_key(&key) {
            return;
        }
        self.index.insert(key, self.children.len());
        self.children.push(node);
    }

    fn set(&mut self, ctx: &mut UploadContext<'_>, value: &UniformValue) -> RenderResult<()> {
        match value {
            UniformValue::Struct(members) => {
                for child in &mut self.children {
                    let supplied = match child.ident() {
                        UniformIdent::Name(name) => members.get(name.as_str()),
                        UniformIdent::Index(_) => None,
                    };
                    match supplied {
                        Some(member) => child.set(ctx, member)?,
                        None => {
                            return Err(RenderError::MissingUniformValue {
                                name: child.path().to_string(),
                            })
                        }
                    }
                }
                Ok(())
            }
            UniformValue::List(elements) => {
                for child in &mut self.children {
                    let supplied = match child.ident() {
                        UniformIdent::Index(index) => elements.get(*index),
                        UniformIdent::Name(_) => None,
                    };
                    match supplied {
                        Some(element) => child.set(ctx, element)?,
                        None => {
                            return Err(RenderError::MissingUniformValue {
                                name: child.path().to_string(),
                            })
                        }
                    }
                }
                Ok(())
            }
            _ => Err(RenderError::UniformTypeMismatch {
                name: self.path.clone(),
            }),
        }
    }
}

enum UniformNode {
    Leaf(LeafUniform),
    PureArray(PureArrayUniform),
    Struct(StructUniform),
}

impl UniformNode {
    fn ident(&self) -> &UniformIdent {
        match self {
            Self::Leaf(leaf) => &leaf.ident,
            Self::PureArray(array) => &array.ident,
            Self::Struct(child) => &child.ident,
        }
    }

    fn path(&self) -> &str {
        match self {
            Self::Leaf(leaf) => &leaf.path,
            Self::PureArray(array) => &array.path,
            Self::Struct(child) => &child.path,
        }
    }

    fn set(&mut self, ctx: &mut UploadContext<'_>, value: &UniformValue) -> RenderResult<()> {
        match self {
            Self::Leaf(leaf) => leaf.set(ctx, value),
            Self::PureArray(array) => array.set(ctx, value),
            Self::Struct(child) => child.set(ctx, value),
        }
    }
}

/// Navigable tree of typed uniform setters for one compiled program
///
/// The shape is fully determined by the program's reflected uniform names at
/// construction and immutable afterwards.
pub struct UniformBindingTree {
    root: StructUniform,
    inert: Vec<String>,
}

impl UniformBindingTree {
    /// Build the tree from a program's reflected uniform declarations
    ///
    /// Fails on names the path parser cannot decompose; declarations with an
    /// unsupported primitive kind are kept (and listed in
    /// [`UniformBindingTree::inert`]) but error when set.
    pub fn from_declarations(declarations: &[UniformDeclaration]) -> RenderResult<Self> {
        let mut root = StructUniform::new(UniformIdent::Name(String::new()), String::new());
        let mut inert = Vec::new();
        for declaration in declarations {
            if let UniformKind::Unsupported(code) = declaration.kind {
                log::warn!(
                    "uniform {:?} has no setter for device type code {}; values for it are rejected",
                    declaration.name,
                    code
                );
                inert.push(declaration.name.clone());
            }
            Self::insert_declaration(&mut root, declaration)?;
        }
        Ok(Self { root, inert })
    }

    fn insert_declaration(
        root: &mut StructUniform,
        declaration: &UniformDeclaration,
    ) -> RenderResult<()> {
        let declared = declaration.name.as_str();
        let malformed = || RenderError::MalformedUniformPath {
            name: declared.to_string(),
        };

        let mut container = &mut *root;
        let mut rest = declared;
        loop {
            let ident_len = rest
                .bytes()
                .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
                .count();
            if ident_len == 0 {
                return Err(malformed());
            }
            let (ident, tail) = rest.split_at(ident_len);

            if tail.is_empty() {
                let ident = UniformIdent::Name(ident.to_string());
                let path = container.child_path(&ident);
                container.insert(Self::new_terminal(
                    ident,
                    path,
                    declaration,
                    declaration.count.max(1),
                ));
                return Ok(());
            }

            if let Some(tail) = tail.strip_prefix('.') {
                if tail.is_empty() {
                    return Err(malformed());
                }
                container =
                    container.child_struct(UniformIdent::Name(ident.to_string()), declared)?;
                rest = tail;
                continue;
            }

            let Some(tail) = tail.strip_prefix('[') else {
                return Err(malformed());
            };
            let digit_len = tail.bytes().take_while(u8::is_ascii_digit).count();
            if digit_len == 0 {
                return Err(malformed());
            }
            let (digits, tail) = tail.split_at(digit_len);
            let element: usize = digits.parse().map_err(|_| malformed())?;
            let Some(tail) = tail.strip_prefix(']') else {
                return Err(malformed());
            };

            if tail.is_empty() {
                // Trailing [N]: a pure bottom-level array. Reflection reports
                // the element count; a nonzero suffix index also bounds it.
                let ident = UniformIdent::Name(ident.to_string());
                let path = container.child_path(&ident);
                let len = declaration.count.max(element.max(1));
                container.insert(Self::new_terminal(ident, path, declaration, len));
                return Ok(());
            }

            let Some(tail) = tail.strip_prefix('.') else {
                return Err(malformed());
            };
            if tail.is_empty() {
                return Err(malformed());
            }
            let outer = container.child_struct(UniformIdent::Name(ident.to_string()), declared)?;
            container = outer.child_struct(UniformIdent::Index(element), declared)?;
            rest = tail;
        }
    }

    fn new_terminal(
        ident: UniformIdent,
        path: String,
        declaration: &UniformDeclaration,
        len: usize,
    ) -> UniformNode {
        if len > 1 {
            UniformNode::PureArray(PureArrayUniform {
                ident,
                path,
                addr: declaration.addr,
                kind: declaration.kind,
                len,
                float_cache: Vec::new(),
                int_cache: Vec::new(),
            })
        } else {
            UniformNode::Leaf(LeafUniform {
                ident,
                path,
                addr: declaration.addr,
                kind: declaration.kind,
                float_cache: Vec::new(),
                int_cache: Vec::new(),
            })
        }
    }

    /// Set one top-level uniform by name
    ///
    /// Setting a name the program does not declare is a no-op, so shared
    /// refresh code can write values that only some variants consume.
    pub fn set_value(
        &mut self,
        ctx: &mut UploadContext<'_>,
        name: &str,
        value: &UniformValue,
    ) -> RenderResult<()> {
        let StructUniform {
            index, children, ..
        } = &mut self.root;
        match index.get(name) {
            Some(&slot) => children[slot].set(ctx, value),
            None => Ok(()),
        }
    }

    /// Set a uniform from a value map when the map has an entry for it
    pub fn set_optional(
        &mut self,
        ctx: &mut UploadContext<'_>,
        values: &UniformValueMap,
        name: &str,
    ) -> RenderResult<()> {
        match values.get(name) {
            Some(value) => self.set_value(ctx, name, value),
            None => Ok(()),
        }
    }

    /// Upload every value whose name the program declares
    ///
    /// The intersection semantics run both ways: values for undeclared
    /// uniforms are skipped, declared uniforms without values are left alone.
    pub fn upload_from(
        &mut self,
        ctx: &mut UploadContext<'_>,
        values: &UniformValueMap,
    ) -> RenderResult<()> {
        let StructUniform {
            index, children, ..
        } = &mut self.root;
        for (name, value) in values {
            if let Some(&slot) = index.get(name.as_str()) {
                children[slot].set(ctx, value)?;
            }
        }
        Ok(())
    }

    /// Whether the program declares a top-level uniform with this name
    pub fn contains(&self, name: &str) -> bool {
        self.root.index.contains_key(name)
    }

    /// Declared uniforms that have no setter (unsupported primitive kind)
    pub fn inert(&self) -> &[String] {
        &self.inert
    }
}
