//! Renderer facade: per-frame orchestration over the core subsystems
//!
//! Owns the process-wide pieces the subsystems share (the program variant
//! cache, the render state registry, the material side-table, the scratch
//! buffer pool, the texture unit counter, and the fallback textures) and
//! drives the per-frame flow in order: state `init`, population, light
//! `setup` and list `sort` (done by the caller through [`RenderState`]),
//! then per-item program resolution and uniform upload here.
//!
//! Everything is single-threaded and frame-driven: one call runs to
//! completion, nothing suspends, and the renderer is mutated only by the
//! owning frame loop. On an aborted frame the per-frame state is simply
//! reset by the next `init`; nothing is partially committed.
//!
//! ## Rebuild policy
//!
//! A material's program is rebuilt when it has none yet, or when the
//! freshly derived cache key differs from the key its bound program was
//! compiled for. Every structural input (feature flags, custom defines,
//! fog kind, light population counts, shadow count, skinning budget,
//! clipping, tone mapping, color space) feeds the key, so "key differs"
//! and "generated source text differs" are the same condition. Light
//! *value* changes never touch the key; they only re-upload uniforms.

use std::collections::HashMap;

use crate::core::config::RendererConfig;
use crate::foundation::math::Mat3;
use crate::render::device::GraphicsDevice;
use crate::render::lighting::state::LightBuckets;
use crate::render::lighting::LightsHash;
use crate::render::materials::{Material, MaterialId, MaterialKind};
use crate::render::programs::{ClippingState, ProgramHandle, ProgramVariantCache};
use crate::render::scene::{Camera, CameraId, Drawable, Fog, SceneId};
use crate::render::state::{RenderState, RenderStateRegistry};
use crate::render::uniforms::{
    FallbackTextures, ScratchPool, TextureUnits, UniformValue, UniformValueMap, UploadContext,
};
use crate::render::RenderResult;

#[derive(Default)]
struct MaterialProperties {
    program: Option<ProgramHandle>,
    lights_hash: Option<LightsHash>,
}

/// The renderer core's top-level entry point
pub struct Renderer {
    programs: ProgramVariantCache,
    states: RenderStateRegistry,
    properties: HashMap<MaterialId, MaterialProperties>,
    scratch: ScratchPool,
    units: TextureUnits,
    fallbacks: FallbackTextures,
    frame_values: UniformValueMap,
}

impl Renderer {
    /// Create a renderer for one configuration and one set of fallback
    /// textures (created by the embedding application from its device)
    pub fn new(config: RendererConfig, fallbacks: FallbackTextures) -> Self {
        let max_textures = config.limits.max_textures;
        Self {
            programs: ProgramVariantCache::new(config),
            states: RenderStateRegistry::new(),
            properties: HashMap::new(),
            scratch: ScratchPool::new(),
            units: TextureUnits::new(max_textures),
            fallbacks,
            frame_values: UniformValueMap::new(),
        }
    }

    /// The render state for a (scene, camera) pair, created on first access
    pub fn render_state(&mut self, scene: SceneId, camera: CameraId) -> &mut RenderState {
        self.states.get(scene, camera)
    }

    /// The program variant cache
    pub fn programs(&self) -> &ProgramVariantCache {
        &self.programs
    }

    /// Resolve a material to a program per the rebuild policy
    ///
    /// Returns the handle to bind; on a structural change the old variant is
    /// released and a new one acquired, on a data-only change the existing
    /// handle is returned and only the lights-hash bookkeeping refreshes.
    pub fn prepare_material(
        &mut self,
        device: &mut dyn GraphicsDevice,
        material: &Material,
        lights: &LightsHash,
        fog: Option<&Fog>,
        clipping: ClippingState,
        drawable: &Drawable,
    ) -> RenderResult<ProgramHandle> {
        let parameters = self
            .programs
            .get_parameters(material, lights, fog, clipping, drawable);
        let code = self.programs.program_code(material, &parameters);

        let props = self.properties.entry(material.id).or_default();
        let current = props.program.filter(|handle| {
            self.programs
                .get(*handle)
                .is_some_and(|variant| variant.code() == code)
        });

        let handle = match current {
            Some(handle) => handle,
            None => {
                if let Some(stale) = props.program.take() {
                    log::debug!(
                        "material {:?} changed structurally; rebuilding its program",
                        material.name
                    );
                    self.programs.release_program(device, stale);
                }
                self.programs
                    .acquire_program(device, material, &parameters, code)?
            }
        };

        props.program = Some(handle);
        props.lights_hash = Some(*lights);
        Ok(handle)
    }

    /// The program currently bound to a material, if any
    pub fn material_program(&self, material: MaterialId) -> Option<ProgramHandle> {
        self.properties.get(&material).and_then(|p| p.program)
    }

    /// The light population a material's bookkeeping last saw
    pub fn material_lights_hash(&self, material: MaterialId) -> Option<LightsHash> {
        self.properties.get(&material).and_then(|p| p.lights_hash)
    }

    /// Release a material's program reference, for material disposal
    pub fn release_material(&mut self, device: &mut dyn GraphicsDevice, material: MaterialId) {
        if let Some(props) = self.properties.remove(&material) {
            if let Some(handle) = props.program {
                self.programs.release_program(device, handle);
            }
        }
    }

    /// Populate and upload one item's uniforms, diffing against caches
    ///
    /// Resets the texture unit counter (one upload pass per draw), refreshes
    /// transform, material, light, and fog values into the shared value map,
    /// and uploads the intersection the program declares. Light values come
    /// from the (scene, camera) state set up earlier this frame.
    pub fn upload_item_uniforms(
        &mut self,
        device: &mut dyn GraphicsDevice,
        handle: ProgramHandle,
        material: &Material,
        drawable: &Drawable,
        scene: SceneId,
        camera: &Camera,
        fog: Option<&Fog>,
    ) -> RenderResult<()> {
        self.units.reset();
        self.frame_values.clear();

        refresh_transform_uniforms(&mut self.frame_values, drawable, camera);
        refresh_material_uniforms(&mut self.frame_values, material);
        if material.tone_mapped {
            self.frame_values.insert(
                "toneMappingExposure".to_string(),
                UniformValue::Float(self.programs.config().tone_mapping_exposure),
            );
        }
        if material.needs_lights() {
            let buckets = self.states.get(scene, camera.id).lights().buckets();
            refresh_light_uniforms(&mut self.frame_values, buckets);
        }
        if material.fog {
            if let Some(fog) = fog {
                refresh_fog_uniforms(&mut self.frame_values, fog);
            }
        }

        let Some(variant) = self.programs.get_mut(handle) else {
            log::warn!(
                "upload requested for a released program (material {:?})",
                material.name
            );
            return Ok(());
        };
        let tree = variant.uniforms(&*device)?;
        let mut ctx = UploadContext {
            device,
            scratch: &mut self.scratch,
            units: &mut self.units,
            fallbacks: &self.fallbacks,
        };
        tree.upload_from(&mut ctx, &self.frame_values)
    }

    /// Drop all per-pair state and release every material's program
    ///
    /// For context loss or teardown; compiled variants referenced by other
    /// holders stay alive until their counts reach zero.
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        self.states.dispose();
        let handles: Vec<ProgramHandle> = self
            .properties
            .drain()
            .filter_map(|(_, props)| props.program)
            .collect();
        for handle in handles {
            self.programs.release_program(device, handle);
        }
    }
}

fn refresh_transform_uniforms(values: &mut UniformValueMap, drawable: &Drawable, camera: &Camera) {
    let model_view = camera.view_matrix * drawable.world_matrix;
    let normal_matrix = model_view
        .fixed_view::<3, 3>(0, 0)
        .into_owned()
        .try_inverse()
        .map_or_else(Mat3::identity, |inverse| inverse.transpose());

    values.insert(
        "modelViewMatrix".to_string(),
        UniformValue::Mat4(model_view),
    );
    values.insert(
        "projectionMatrix".to_string(),
        UniformValue::Mat4(camera.projection),
    );
    values.insert(
        "normalMatrix".to_string(),
        UniformValue::Mat3(normal_matrix),
    );
}

fn refresh_material_uniforms(values: &mut UniformValueMap, material: &Material) {
    match &material.kind {
        MaterialKind::Unlit { color, opacity } => {
            values.insert("diffuse".to_string(), UniformValue::Vec3(*color));
            values.insert("opacity".to_string(), UniformValue::Float(*opacity));
        }
        MaterialKind::Lambert {
            color,
            opacity,
            emissive,
        } => {
            values.insert("diffuse".to_string(), UniformValue::Vec3(*color));
            values.insert("opacity".to_string(), UniformValue::Float(*opacity));
            values.insert("emissive".to_string(), UniformValue::Vec3(*emissive));
        }
        MaterialKind::Standard {
            color,
            opacity,
            metalness,
            roughness,
            emissive,
        } => {
            values.insert("diffuse".to_string(), UniformValue::Vec3(*color));
            values.insert("opacity".to_string(), UniformValue::Float(*opacity));
            values.insert("metalness".to_string(), UniformValue::Float(*metalness));
            values.insert("roughness".to_string(), UniformValue::Float(*roughness));
            values.insert("emissive".to_string(), UniformValue::Vec3(*emissive));
        }
    }

    let slots = &material.textures;
    let named = [
        ("map", slots.map),
        ("normalMap", slots.normal_map),
        ("bumpMap", slots.bump_map),
        ("displacementMap", slots.displacement_map),
        ("roughnessMap", slots.roughness_map),
        ("metalnessMap", slots.metalness_map),
        ("emissiveMap", slots.emissive_map),
        ("alphaMap", slots.alpha_map),
        ("envMap", slots.env_map),
        ("aoMap", slots.ao_map),
    ];
    for (name, slot) in named {
        if slot.is_some() {
            values.insert(name.to_string(), UniformValue::Texture(slot));
        }
    }
    if slots.displacement_map.is_some() {
        values.insert(
            "displacementScale".to_string(),
            UniformValue::Float(material.displacement_scale),
        );
    }
    if slots.bump_map.is_some() {
        values.insert(
            "bumpScale".to_string(),
            UniformValue::Float(material.bump_scale),
        );
    }
}

fn light_struct(fields: Vec<(&str, UniformValue)>) -> UniformValue {
    UniformValue::Struct(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

fn refresh_light_uniforms(values: &mut UniformValueMap, buckets: &LightBuckets) {
    values.insert(
        "ambientLightColor".to_string(),
        UniformValue::Vec3(buckets.ambient),
    );

    if !buckets.directional.is_empty() {
        let list = buckets
            .directional
            .iter()
            .map(|light| {
                light_struct(vec![
                    ("direction", UniformValue::Vec3(light.direction)),
                    ("color", UniformValue::Vec3(light.color)),
                ])
            })
            .collect();
        values.insert("directionalLights".to_string(), UniformValue::List(list));
    }

    if !buckets.point.is_empty() {
        let list = buckets
            .point
            .iter()
            .map(|light| {
                light_struct(vec![
                    ("position", UniformValue::Vec3(light.position)),
                    ("color", UniformValue::Vec3(light.color)),
                    ("distance", UniformValue::Float(light.distance)),
                    ("decay", UniformValue::Float(light.decay)),
                ])
            })
            .collect();
        values.insert("pointLights".to_string(), UniformValue::List(list));
    }

    if !buckets.spot.is_empty() {
        let list = buckets
            .spot
            .iter()
            .map(|light| {
                light_struct(vec![
                    ("position", UniformValue::Vec3(light.position)),
                    ("direction", UniformValue::Vec3(light.direction)),
                    ("color", UniformValue::Vec3(light.color)),
                    ("distance", UniformValue::Float(light.distance)),
                    ("decay", UniformValue::Float(light.decay)),
                    ("coneCos", UniformValue::Float(light.cone_cos)),
                    ("penumbraCos", UniformValue::Float(light.penumbra_cos)),
                ])
            })
            .collect();
        values.insert("spotLights".to_string(), UniformValue::List(list));
    }

    if !buckets.rect_area.is_empty() {
        let list = buckets
            .rect_area
            .iter()
            .map(|light| {
                light_struct(vec![
                    ("position", UniformValue::Vec3(light.position)),
                    ("color", UniformValue::Vec3(light.color)),
                    ("halfWidth", UniformValue::Vec3(light.half_width)),
                    ("halfHeight", UniformValue::Vec3(light.half_height)),
                ])
            })
            .collect();
        values.insert("rectAreaLights".to_string(), UniformValue::List(list));
    }

    if !buckets.hemisphere.is_empty() {
        let list = buckets
            .hemisphere
            .iter()
            .map(|light| {
                light_struct(vec![
                    ("direction", UniformValue::Vec3(light.direction)),
                    ("skyColor", UniformValue::Vec3(light.sky_color)),
                    ("groundColor", UniformValue::Vec3(light.ground_color)),
                ])
            })
            .collect();
        values.insert("hemisphereLights".to_string(), UniformValue::List(list));
    }

    let shadow_groups = [
        (
            "directionalLightShadows",
            "directionalShadowMap",
            "directionalShadowMatrix",
            &buckets.directional_shadow,
            &buckets.directional_shadow_map,
            &buckets.directional_shadow_matrix,
        ),
        (
            "pointLightShadows",
            "pointShadowMap",
            "pointShadowMatrix",
            &buckets.point_shadow,
            &buckets.point_shadow_map,
            &buckets.point_shadow_matrix,
        ),
        (
            "spotLightShadows",
            "spotShadowMap",
            "spotShadowMatrix",
            &buckets.spot_shadow,
            &buckets.spot_shadow_map,
            &buckets.spot_shadow_matrix,
        ),
    ];
    for (shadows_name, maps_name, matrices_name, shadows, maps, matrices) in shadow_groups {
        if shadows.is_empty() {
            continue;
        }
        let list = shadows
            .iter()
            .map(|shadow| {
                light_struct(vec![
                    ("bias", UniformValue::Float(shadow.bias)),
                    ("radius", UniformValue::Float(shadow.radius)),
                    ("mapSize", UniformValue::Vec2(shadow.map_size)),
                ])
            })
            .collect();
        values.insert(shadows_name.to_string(), UniformValue::List(list));
        values.insert(
            maps_name.to_string(),
            UniformValue::TextureArray(maps.clone()),
        );
        values.insert(
            matrices_name.to_string(),
            UniformValue::Mat4Array(matrices.clone()),
        );
    }
}

fn refresh_fog_uniforms(values: &mut UniformValueMap, fog: &Fog) {
    match fog {
        Fog::Linear { color, near, far } => {
            values.insert("fogColor".to_string(), UniformValue::Vec3(*color));
            values.insert("fogNear".to_string(), UniformValue::Float(*near));
            values.insert("fogFar".to_string(), UniformValue::Float(*far));
        }
        Fog::ExponentialSquared { color, density } => {
            values.insert("fogColor".to_string(), UniformValue::Vec3(*color));
            values.insert("fogDensity".to_string(), UniformValue::Float(*density));
        }
    }
}
