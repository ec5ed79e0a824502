//! Shader parameter derivation and program cache keys
//!
//! [`ShaderParameters`] is a pure function of material, light population,
//! fog, clipping, drawable, and renderer configuration. Determinism matters:
//! the parameter set feeds [`program_code`], and the central correctness
//! property of the variant cache is that two materials produce equal keys iff
//! they would compile to textually identical shaders.

use std::collections::BTreeMap;

use crate::core::config::{ColorSpace, Precision, RendererConfig, ToneMapping};
use crate::render::lighting::LightsHash;
use crate::render::materials::{Material, MaterialFeatures};
use crate::render::scene::{Drawable, Fog};

/// Clipping plane configuration for one render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClippingState {
    /// Number of active clipping planes
    pub num_planes: usize,
    /// How many of them clip by intersection rather than union
    pub num_intersection: usize,
}

/// Everything that shapes generated shader text for one material draw
///
/// Component-wise equality of two parameter sets implies equal program cache
/// keys, and vice versa.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderParameters {
    /// Shader identity: a built-in token or the material's raw source text
    pub shader_token: String,
    /// Requested precision
    pub precision: Precision,
    /// Feature flags derived from material state
    pub features: MaterialFeatures,
    /// Material custom defines, deterministically ordered
    pub defines: BTreeMap<String, String>,
    /// Whether the generated program consumes the aggregated light state
    pub lights: bool,
    /// Directional light count unrolled into the light loop
    pub num_directional_lights: usize,
    /// Point light count unrolled into the light loop
    pub num_point_lights: usize,
    /// Spot light count unrolled into the light loop
    pub num_spot_lights: usize,
    /// Rect-area light count unrolled into the light loop
    pub num_rect_area_lights: usize,
    /// Hemisphere light count unrolled into the light loop
    pub num_hemisphere_lights: usize,
    /// Shadow-casting light count
    pub num_shadows: usize,
    /// Whether fog code is generated
    pub fog: bool,
    /// Fog kind token when fog code is generated
    pub fog_kind: Option<String>,
    /// Whether skinning code is generated
    pub skinning: bool,
    /// Bone matrix budget for skinned drawables
    pub max_bones: u32,
    /// Active clipping plane count
    pub num_clipping_planes: usize,
    /// Clipping planes applied by intersection
    pub num_clip_intersection: usize,
    /// Tone-mapping operator compiled into the fragment stage
    pub tone_mapping: ToneMapping,
    /// Output color space conversion compiled into the fragment stage
    pub output_color_space: ColorSpace,
    /// Cache-key contribution of an application pre-compile hook
    pub custom_cache_key: String,
}

/// Derive the parameter set for one (material, light state, drawable) draw
///
/// Deterministic given identical inputs. Materials that do not consume
/// lights get zeroed light counts so scene light churn never invalidates
/// their variants.
pub fn derive_parameters(
    config: &RendererConfig,
    material: &Material,
    lights: &LightsHash,
    fog: Option<&Fog>,
    clipping: ClippingState,
    drawable: &Drawable,
) -> ShaderParameters {
    let needs_lights = material.needs_lights();
    let fog_active = material.fog && fog.is_some();

    let skinning = drawable.bone_count.is_some();
    let max_bones = match drawable.bone_count {
        Some(bones) => {
            let budget = config.limits.max_bones();
            if bones > budget {
                log::warn!(
                    "drawable {:?} wants {} bones but the device budget is {}; capping",
                    drawable.id,
                    bones,
                    budget
                );
            }
            bones.min(budget)
        }
        None => 0,
    };

    ShaderParameters {
        shader_token: material.shader_token(),
        precision: config.precision,
        features: material.features(),
        defines: material.defines.clone(),
        lights: needs_lights,
        num_directional_lights: if needs_lights { lights.directional_len } else { 0 },
        num_point_lights: if needs_lights { lights.point_len } else { 0 },
        num_spot_lights: if needs_lights { lights.spot_len } else { 0 },
        num_rect_area_lights: if needs_lights { lights.rect_area_len } else { 0 },
        num_hemisphere_lights: if needs_lights { lights.hemisphere_len } else { 0 },
        num_shadows: if needs_lights { lights.shadows_len } else { 0 },
        fog: fog_active,
        fog_kind: fog.filter(|_| fog_active).map(|f| f.kind_token().to_string()),
        skinning,
        max_bones,
        num_clipping_planes: clipping.num_planes,
        num_clip_intersection: clipping.num_intersection,
        tone_mapping: if material.tone_mapped {
            config.tone_mapping
        } else {
            ToneMapping::None
        },
        output_color_space: config.output_color_space,
        custom_cache_key: material.custom_cache_key.clone().unwrap_or_default(),
    }
}

/// Build the deterministic cache key for one material + parameter set
///
/// Concatenates, in fixed order: the shader token, every custom define pair,
/// every parameter in a fixed enumerated order, the pre-compile hook key,
/// and the global color management settings. Order is part of the key.
pub fn program_code(material: &Material, parameters: &ShaderParameters) -> String {
    let mut chunks: Vec<String> = Vec::with_capacity(24 + material.defines.len() * 2);

    chunks.push(parameters.shader_token.clone());

    for (name, value) in &material.defines {
        chunks.push(name.clone());
        chunks.push(value.clone());
    }

    chunks.push(parameters.precision.token().to_string());
    chunks.push(parameters.features.bits().to_string());
    chunks.push(parameters.lights.to_string());
    chunks.push(parameters.num_directional_lights.to_string());
    chunks.push(parameters.num_point_lights.to_string());
    chunks.push(parameters.num_spot_lights.to_string());
    chunks.push(parameters.num_rect_area_lights.to_string());
    chunks.push(parameters.num_hemisphere_lights.to_string());
    chunks.push(parameters.num_shadows.to_string());
    chunks.push(parameters.fog.to_string());
    chunks.push(parameters.fog_kind.clone().unwrap_or_default());
    chunks.push(parameters.skinning.to_string());
    chunks.push(parameters.max_bones.to_string());
    chunks.push(parameters.num_clipping_planes.to_string());
    chunks.push(parameters.num_clip_intersection.to_string());
    chunks.push(parameters.custom_cache_key.clone());
    chunks.push(format!("{:?}", parameters.tone_mapping));
    chunks.push(format!("{:?}", parameters.output_color_space));

    chunks.join("\u{1f}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::device::TextureId;
    use crate::render::materials::{MaterialId, MaterialKind};
    use crate::render::scene::{DrawableId, GeometryId};

    fn standard_material(id: u32) -> Material {
        Material::new(
            MaterialId(id),
            "test",
            MaterialKind::Standard {
                color: Vec3::new(1.0, 1.0, 1.0),
                opacity: 1.0,
                metalness: 0.0,
                roughness: 0.5,
                emissive: Vec3::zeros(),
            },
        )
    }

    fn drawable() -> Drawable {
        Drawable {
            id: DrawableId(1),
            geometry: GeometryId(1),
            render_order: 0,
            world_matrix: Mat4::identity(),
            bone_count: None,
        }
    }

    fn lights(directional: usize, point: usize) -> LightsHash {
        LightsHash {
            state_id: 1,
            directional_len: directional,
            point_len: point,
            ..LightsHash::default()
        }
    }

    #[test]
    fn identical_inputs_produce_identical_codes() {
        let config = RendererConfig::default();
        let m1 = standard_material(1);
        let m2 = standard_material(2);
        let hash = lights(2, 1);

        let p1 = derive_parameters(&config, &m1, &hash, None, ClippingState::default(), &drawable());
        let p2 = derive_parameters(&config, &m2, &hash, None, ClippingState::default(), &drawable());
        assert_eq!(p1, p2);
        assert_eq!(program_code(&m1, &p1), program_code(&m2, &p2));
    }

    #[test]
    fn structural_differences_change_the_code() {
        let config = RendererConfig::default();
        let base = standard_material(1);
        let hash = lights(1, 0);
        let params =
            derive_parameters(&config, &base, &hash, None, ClippingState::default(), &drawable());
        let code = program_code(&base, &params);

        // A texture slot flips a feature flag.
        let mut mapped = standard_material(2);
        mapped.textures.map = Some(TextureId(3));
        let mapped_params =
            derive_parameters(&config, &mapped, &hash, None, ClippingState::default(), &drawable());
        assert_ne!(program_code(&mapped, &mapped_params), code);

        // A light count feeds the unroll bounds.
        let more_lights =
            derive_parameters(&config, &base, &lights(2, 0), None, ClippingState::default(), &drawable());
        assert_ne!(program_code(&base, &more_lights), code);

        // A custom define pair.
        let mut defined = standard_material(3);
        defined
            .defines
            .insert("USE_DITHER".to_string(), "1".to_string());
        let defined_params =
            derive_parameters(&config, &defined, &hash, None, ClippingState::default(), &drawable());
        assert_ne!(program_code(&defined, &defined_params), code);
    }

    #[test]
    fn unlit_materials_ignore_light_population() {
        let config = RendererConfig::default();
        let unlit = Material::new(
            MaterialId(1),
            "unlit",
            MaterialKind::Unlit {
                color: Vec3::new(1.0, 0.0, 0.0),
                opacity: 1.0,
            },
        );
        let p1 =
            derive_parameters(&config, &unlit, &lights(0, 0), None, ClippingState::default(), &drawable());
        let p2 =
            derive_parameters(&config, &unlit, &lights(5, 3), None, ClippingState::default(), &drawable());
        assert_eq!(program_code(&unlit, &p1), program_code(&unlit, &p2));
    }

    #[test]
    fn bone_count_caps_at_the_device_budget() {
        let config = RendererConfig::default();
        let budget = config.limits.max_bones();
        let mut skinned = drawable();
        skinned.bone_count = Some(budget + 100);

        let params = derive_parameters(
            &config,
            &standard_material(1),
            &lights(0, 0),
            None,
            ClippingState::default(),
            &skinned,
        );
        assert!(params.skinning);
        assert_eq!(params.max_bones, budget);
    }

    #[test]
    fn fog_only_applies_to_fogged_materials() {
        let config = RendererConfig::default();
        let fog = Fog::Linear {
            color: Vec3::new(0.5, 0.5, 0.5),
            near: 1.0,
            far: 100.0,
        };
        let mut unfogged = standard_material(1);
        unfogged.fog = false;

        let fogged_params = derive_parameters(
            &config,
            &standard_material(2),
            &lights(0, 0),
            Some(&fog),
            ClippingState::default(),
            &drawable(),
        );
        let unfogged_params = derive_parameters(
            &config,
            &unfogged,
            &lights(0, 0),
            Some(&fog),
            ClippingState::default(),
            &drawable(),
        );
        assert!(fogged_params.fog);
        assert_eq!(fogged_params.fog_kind.as_deref(), Some("fog_linear"));
        assert!(!unfogged_params.fog);
        assert!(unfogged_params.fog_kind.is_none());
    }
}
