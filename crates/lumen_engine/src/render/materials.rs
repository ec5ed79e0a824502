//! Material model for the renderer core
//!
//! Materials describe *what* a surface looks like; the program variant cache
//! turns a material plus derived parameters into *which* compiled program
//! draws it. Everything here that can alter generated shader text (the kind,
//! the active texture slots, custom defines, the custom shader override)
//! participates in program cache keys.
//!
//! Kind-specific behavior is dispatched by exhaustive `match` on
//! [`MaterialKind`] rather than open-ended subtyping.

use std::collections::BTreeMap;

use crate::foundation::math::Vec3;
use crate::render::device::TextureId;

/// Stable material identity, assigned by the embedding material registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

bitflags::bitflags! {
    /// Feature flags derived from material state
    ///
    /// Each flag corresponds to one `#define` in generated shader text, so
    /// the set of active flags is structural: toggling one forces a new
    /// program variant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MaterialFeatures: u32 {
        /// Base color texture
        const MAP = 1 << 0;
        /// Tangent-space normal map
        const NORMAL_MAP = 1 << 1;
        /// Height-based bump map
        const BUMP_MAP = 1 << 2;
        /// Vertex displacement map
        const DISPLACEMENT_MAP = 1 << 3;
        /// Roughness channel texture
        const ROUGHNESS_MAP = 1 << 4;
        /// Metalness channel texture
        const METALNESS_MAP = 1 << 5;
        /// Emissive color texture
        const EMISSIVE_MAP = 1 << 6;
        /// Alpha channel texture
        const ALPHA_MAP = 1 << 7;
        /// Environment cube map
        const ENV_MAP = 1 << 8;
        /// Ambient occlusion texture
        const AO_MAP = 1 << 9;
        /// Per-vertex colors
        const VERTEX_COLORS = 1 << 10;
        /// Faceted normals instead of interpolated ones
        const FLAT_SHADING = 1 << 11;
    }
}

/// Built-in shader programs shipped with the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderId {
    /// Unshaded flat color/texture
    Unlit,
    /// Diffuse-only lighting
    Lambert,
    /// Metallic-roughness shading
    Standard,
}

impl ShaderId {
    /// Token identifying this shader in program cache keys
    pub fn name(self) -> &'static str {
        match self {
            Self::Unlit => "unlit",
            Self::Lambert => "lambert",
            Self::Standard => "standard",
        }
    }

    /// Vertex stage template; the generated prologue is prepended
    pub fn vertex_source(self) -> &'static str {
        match self {
            Self::Unlit => include_str!("shaders/unlit.vert"),
            Self::Lambert => include_str!("shaders/lambert.vert"),
            Self::Standard => include_str!("shaders/standard.vert"),
        }
    }

    /// Fragment stage template; the generated prologue is prepended
    pub fn fragment_source(self) -> &'static str {
        match self {
            Self::Unlit => include_str!("shaders/unlit.frag"),
            Self::Lambert => include_str!("shaders/lambert.frag"),
            Self::Standard => include_str!("shaders/standard.frag"),
        }
    }
}

/// Raw shader source a material supplies instead of a built-in
///
/// The source text itself becomes part of the program cache key, so two
/// materials sharing identical custom source share one variant.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomShader {
    /// Display name for logs and diagnostics
    pub name: String,
    /// Vertex stage source
    pub vertex: String,
    /// Fragment stage source
    pub fragment: String,
}

/// Texture slots a material may populate
///
/// Which slots are occupied is structural (it changes generated text); which
/// texture occupies a slot is plain uniform data.
#[derive(Debug, Clone, Default)]
pub struct TextureSlots {
    /// Base color texture
    pub map: Option<TextureId>,
    /// Tangent-space normal map
    pub normal_map: Option<TextureId>,
    /// Height-based bump map
    pub bump_map: Option<TextureId>,
    /// Vertex displacement map
    pub displacement_map: Option<TextureId>,
    /// Roughness channel texture
    pub roughness_map: Option<TextureId>,
    /// Metalness channel texture
    pub metalness_map: Option<TextureId>,
    /// Emissive color texture
    pub emissive_map: Option<TextureId>,
    /// Alpha channel texture
    pub alpha_map: Option<TextureId>,
    /// Environment cube map
    pub env_map: Option<TextureId>,
    /// Ambient occlusion texture
    pub ao_map: Option<TextureId>,
}

impl TextureSlots {
    fn features(&self) -> MaterialFeatures {
        let mut features = MaterialFeatures::empty();
        features.set(MaterialFeatures::MAP, self.map.is_some());
        features.set(MaterialFeatures::NORMAL_MAP, self.normal_map.is_some());
        features.set(MaterialFeatures::BUMP_MAP, self.bump_map.is_some());
        features.set(
            MaterialFeatures::DISPLACEMENT_MAP,
            self.displacement_map.is_some(),
        );
        features.set(
            MaterialFeatures::ROUGHNESS_MAP,
            self.roughness_map.is_some(),
        );
        features.set(
            MaterialFeatures::METALNESS_MAP,
            self.metalness_map.is_some(),
        );
        features.set(MaterialFeatures::EMISSIVE_MAP, self.emissive_map.is_some());
        features.set(MaterialFeatures::ALPHA_MAP, self.alpha_map.is_some());
        features.set(MaterialFeatures::ENV_MAP, self.env_map.is_some());
        features.set(MaterialFeatures::AO_MAP, self.ao_map.is_some());
        features
    }
}

/// Shading model and its parameters
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialKind {
    /// Unshaded flat color; ignores scene lights
    Unlit {
        /// Base color
        color: Vec3,
        /// Alpha value
        opacity: f32,
    },
    /// Diffuse-only lighting
    Lambert {
        /// Diffuse color
        color: Vec3,
        /// Alpha value
        opacity: f32,
        /// Self-illumination color
        emissive: Vec3,
    },
    /// Metallic-roughness shading
    Standard {
        /// Base color
        color: Vec3,
        /// Alpha value
        opacity: f32,
        /// Metalness factor in `[0, 1]`
        metalness: f32,
        /// Roughness factor in `[0, 1]`
        roughness: f32,
        /// Self-illumination color
        emissive: Vec3,
    },
}

impl MaterialKind {
    /// Built-in shader this kind compiles against
    pub fn shader_id(&self) -> ShaderId {
        match self {
            Self::Unlit { .. } => ShaderId::Unlit,
            Self::Lambert { .. } => ShaderId::Lambert,
            Self::Standard { .. } => ShaderId::Standard,
        }
    }

    /// Whether programs for this kind consume the aggregated light state
    pub fn needs_lights(&self) -> bool {
        match self {
            Self::Unlit { .. } => false,
            Self::Lambert { .. } | Self::Standard { .. } => true,
        }
    }
}

/// A surface description consumed by the program cache and uniform layer
#[derive(Debug, Clone)]
pub struct Material {
    /// Stable material identity
    pub id: MaterialId,
    /// Display name for logs and diagnostics
    pub name: String,
    /// Shading model and parameters
    pub kind: MaterialKind,
    /// Occupied texture slots
    pub textures: TextureSlots,
    /// Vertex displacement strength when a displacement map is bound
    pub displacement_scale: f32,
    /// Bump perturbation strength when a bump map is bound
    pub bump_scale: f32,
    /// Whether items using this material go to the transparent bucket
    pub transparent: bool,
    /// Whether this material participates in scene fog
    pub fog: bool,
    /// Faceted normals instead of interpolated ones
    pub flat_shading: bool,
    /// Whether geometry vertex colors modulate the base color
    pub vertex_colors: bool,
    /// Whether the configured tone-mapping operator applies
    pub tone_mapped: bool,
    /// Custom preprocessor defines, keyed deterministically
    pub defines: BTreeMap<String, String>,
    /// Raw shader source override; replaces the built-in for this material
    pub custom_shader: Option<CustomShader>,
    /// Cache-key contribution of an application pre-compile hook
    ///
    /// An application that rewrites generated source before compilation must
    /// set a key that distinguishes its rewrite, or unrelated materials will
    /// share the rewritten variant.
    pub custom_cache_key: Option<String>,
}

impl Material {
    /// Create a material with the given identity, name, and kind
    pub fn new(id: MaterialId, name: impl Into<String>, kind: MaterialKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            textures: TextureSlots::default(),
            displacement_scale: 1.0,
            bump_scale: 1.0,
            transparent: false,
            fog: true,
            flat_shading: false,
            vertex_colors: false,
            tone_mapped: true,
            defines: BTreeMap::new(),
            custom_shader: None,
            custom_cache_key: None,
        }
    }

    /// Feature flags derived from the current material state
    pub fn features(&self) -> MaterialFeatures {
        let mut features = self.textures.features();
        features.set(MaterialFeatures::VERTEX_COLORS, self.vertex_colors);
        features.set(MaterialFeatures::FLAT_SHADING, self.flat_shading);
        features
    }

    /// Whether programs for this material consume the aggregated light state
    pub fn needs_lights(&self) -> bool {
        self.kind.needs_lights()
    }

    /// Token identifying the shader source in program cache keys
    ///
    /// A custom shader contributes its full source text; two materials with
    /// textually identical custom source therefore share one variant.
    pub fn shader_token(&self) -> String {
        match &self.custom_shader {
            Some(custom) => format!("custom:{}\u{1}{}", custom.vertex, custom.fragment),
            None => self.kind.shader_id().name().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn features_follow_texture_slots() {
        let mut material = Material::new(
            MaterialId(1),
            "crate",
            MaterialKind::Standard {
                color: Vec3::new(1.0, 1.0, 1.0),
                opacity: 1.0,
                metalness: 0.0,
                roughness: 0.5,
                emissive: Vec3::zeros(),
            },
        );
        assert_eq!(material.features(), MaterialFeatures::empty());

        material.textures.map = Some(TextureId(7));
        material.textures.normal_map = Some(TextureId(8));
        let features = material.features();
        assert!(features.contains(MaterialFeatures::MAP));
        assert!(features.contains(MaterialFeatures::NORMAL_MAP));
        assert!(!features.contains(MaterialFeatures::ROUGHNESS_MAP));
    }

    #[test]
    fn unlit_materials_ignore_lights() {
        let unlit = MaterialKind::Unlit {
            color: Vec3::new(1.0, 0.0, 0.0),
            opacity: 1.0,
        };
        assert!(!unlit.needs_lights());
        assert_eq!(unlit.shader_id(), ShaderId::Unlit);

        let lambert = MaterialKind::Lambert {
            color: Vec3::new(1.0, 0.0, 0.0),
            opacity: 1.0,
            emissive: Vec3::zeros(),
        };
        assert!(lambert.needs_lights());
    }

    #[test]
    fn custom_shader_token_embeds_source_text() {
        let mut material = Material::new(
            MaterialId(2),
            "sky",
            MaterialKind::Unlit {
                color: Vec3::new(0.1, 0.2, 0.8),
                opacity: 1.0,
            },
        );
        assert_eq!(material.shader_token(), "unlit");

        material.custom_shader = Some(CustomShader {
            name: "sky".to_string(),
            vertex: "void main() {}".to_string(),
            fragment: "void main() {}".to_string(),
        });
        assert!(material.shader_token().starts_with("custom:"));
    }
}
