//! Generated shader text assembly
//!
//! A parameter set becomes the prologue prepended to a shader template:
//! precision header, feature `#define`s, numeric unroll bounds, and (for the
//! fragment stage) the tone-mapping and output color-space functions.
//!
//! Unrecognized tone-mapping or color-space enumerants are fatal here: they
//! mean parameter derivation produced a configuration this generator cannot
//! express, which is a programming error, not a runtime condition.

use std::fmt::Write;

use crate::core::config::{ColorSpace, ToneMapping};
use crate::render::device::ShaderStage;
use crate::render::programs::parameters::ShaderParameters;
use crate::render::{RenderError, RenderResult};

/// GLSL body of the `toneMapping` function for an operator
pub fn tone_mapping_function(tone_mapping: ToneMapping) -> RenderResult<&'static str> {
    match tone_mapping {
        ToneMapping::None => Ok("vec4 toneMapping(vec4 color) { return color; }"),
        ToneMapping::Linear => Ok(
            "uniform float toneMappingExposure;\n\
             vec4 toneMapping(vec4 color) { return vec4(color.rgb * toneMappingExposure, color.a); }",
        ),
        ToneMapping::Reinhard => Ok(
            "uniform float toneMappingExposure;\n\
             vec4 toneMapping(vec4 color) {\n\
                 vec3 c = color.rgb * toneMappingExposure;\n\
                 return vec4(c / (vec3(1.0) + c), color.a);\n\
             }",
        ),
        ToneMapping::Filmic => Ok(
            "uniform float toneMappingExposure;\n\
             vec3 filmicCurve(vec3 x) {\n\
                 return ((x * (0.15 * x + 0.05) + 0.004) / (x * (0.15 * x + 0.5) + 0.06)) - 0.0667;\n\
             }\n\
             vec4 toneMapping(vec4 color) {\n\
                 vec3 c = filmicCurve(color.rgb * toneMappingExposure * 2.0);\n\
                 return vec4(c / filmicCurve(vec3(11.2)), color.a);\n\
             }",
        ),
        ToneMapping::AcesFilmic => Ok(
            "uniform float toneMappingExposure;\n\
             vec4 toneMapping(vec4 color) {\n\
                 vec3 c = color.rgb * toneMappingExposure;\n\
                 c = (c * (2.51 * c + 0.03)) / (c * (2.43 * c + 0.59) + 0.14);\n\
                 return vec4(clamp(c, 0.0, 1.0), color.a);\n\
             }",
        ),
        ToneMapping::Custom(code) => Err(RenderError::UnsupportedToneMapping(code)),
    }
}

/// GLSL body of the `outputColorSpace` function for a color space
pub fn color_space_function(color_space: ColorSpace) -> RenderResult<&'static str> {
    match color_space {
        ColorSpace::Linear => Ok("vec4 outputColorSpace(vec4 color) { return color; }"),
        ColorSpace::Srgb => Ok(
            "vec4 outputColorSpace(vec4 color) {\n\
                 return vec4(mix(color.rgb * 12.92,\n\
                     1.055 * pow(color.rgb, vec3(1.0 / 2.4)) - 0.055,\n\
                     step(vec3(0.0031308), color.rgb)), color.a);\n\
             }",
        ),
        ColorSpace::Custom(code) => Err(RenderError::UnsupportedColorSpace(code)),
    }
}

/// Assemble the prologue prepended to one stage's template
pub fn build_prologue(parameters: &ShaderParameters, stage: ShaderStage) -> RenderResult<String> {
    let mut text = String::with_capacity(512);

    let _ = writeln!(text, "precision {} float;", parameters.precision.token());

    for (name, _) in parameters.features.iter_names() {
        let _ = writeln!(text, "#define USE_{name}");
    }
    for (name, value) in &parameters.defines {
        let _ = writeln!(text, "#define {name} {value}");
    }

    if parameters.lights {
        let _ = writeln!(
            text,
            "#define NUM_DIR_LIGHTS {}",
            parameters.num_directional_lights
        );
        let _ = writeln!(text, "#define NUM_POINT_LIGHTS {}", parameters.num_point_lights);
        let _ = writeln!(text, "#define NUM_SPOT_LIGHTS {}", parameters.num_spot_lights);
        let _ = writeln!(
            text,
            "#define NUM_RECT_AREA_LIGHTS {}",
            parameters.num_rect_area_lights
        );
        let _ = writeln!(text, "#define NUM_HEMI_LIGHTS {}", parameters.num_hemisphere_lights);
        let _ = writeln!(text, "#define NUM_SHADOWS {}", parameters.num_shadows);
    }

    if parameters.fog {
        let _ = writeln!(text, "#define USE_FOG");
        if parameters.fog_kind.as_deref() == Some("fog_exp2") {
            let _ = writeln!(text, "#define FOG_EXP2");
        }
    }

    if parameters.skinning {
        let _ = writeln!(text, "#define USE_SKINNING");
        let _ = writeln!(text, "#define MAX_BONES {}", parameters.max_bones);
    }

    if parameters.num_clipping_planes > 0 {
        let _ = writeln!(
            text,
            "#define NUM_CLIPPING_PLANES {}",
            parameters.num_clipping_planes
        );
        let _ = writeln!(
            text,
            "#define NUM_CLIP_INTERSECTION {}",
            parameters.num_clip_intersection
        );
    }

    if stage == ShaderStage::Fragment {
        text.push_str(tone_mapping_function(parameters.tone_mapping)?);
        text.push('\n');
        text.push_str(color_space_function(parameters.output_color_space)?);
        text.push('\n');
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{Precision, RendererConfig};
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::lighting::LightsHash;
    use crate::render::materials::{Material, MaterialId, MaterialKind};
    use crate::render::programs::parameters::{derive_parameters, ClippingState};
    use crate::render::scene::{Drawable, DrawableId, GeometryId};

    fn parameters_for(config: &RendererConfig) -> ShaderParameters {
        let material = Material::new(
            MaterialId(1),
            "test",
            MaterialKind::Lambert {
                color: Vec3::new(1.0, 1.0, 1.0),
                opacity: 1.0,
                emissive: Vec3::zeros(),
            },
        );
        let drawable = Drawable {
            id: DrawableId(1),
            geometry: GeometryId(1),
            render_order: 0,
            world_matrix: Mat4::identity(),
            bone_count: None,
        };
        let lights = LightsHash {
            state_id: 1,
            directional_len: 2,
            ..LightsHash::default()
        };
        derive_parameters(config, &material, &lights, None, ClippingState::default(), &drawable)
    }

    #[test]
    fn prologue_carries_precision_and_light_bounds() {
        let config = RendererConfig {
            precision: Precision::Medium,
            ..RendererConfig::default()
        };
        let parameters = parameters_for(&config);
        let text = build_prologue(&parameters, ShaderStage::Vertex).expect("prologue");
        assert!(text.contains("precision mediump float;"));
        assert!(text.contains("#define NUM_DIR_LIGHTS 2"));
        assert!(text.contains("#define NUM_POINT_LIGHTS 0"));
        // Tone mapping only exists in the fragment stage.
        assert!(!text.contains("toneMapping"));
    }

    #[test]
    fn fragment_prologue_selects_tone_mapping_text() {
        let config = RendererConfig {
            tone_mapping: ToneMapping::AcesFilmic,
            ..RendererConfig::default()
        };
        let parameters = parameters_for(&config);
        let text = build_prologue(&parameters, ShaderStage::Fragment).expect("prologue");
        assert!(text.contains("toneMappingExposure"));
        assert!(text.contains("outputColorSpace"));
    }

    #[test]
    fn custom_enumerants_are_fatal() {
        let config = RendererConfig {
            tone_mapping: ToneMapping::Custom(7),
            ..RendererConfig::default()
        };
        let parameters = parameters_for(&config);
        let result = build_prologue(&parameters, ShaderStage::Fragment);
        assert!(matches!(result, Err(RenderError::UnsupportedToneMapping(7))));

        let config = RendererConfig {
            output_color_space: ColorSpace::Custom(3),
            ..RendererConfig::default()
        };
        let parameters = parameters_for(&config);
        let result = build_prologue(&parameters, ShaderStage::Fragment);
        assert!(matches!(result, Err(RenderError::UnsupportedColorSpace(3))));
    }
}
