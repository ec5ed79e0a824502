//! Program variant cache
//!
//! Every distinct combination of shader source, custom defines, and derived
//! parameters is one compiled program variant, identified by a deterministic
//! string key. Variants are reference-counted: acquisition bumps the count,
//! release drops it, and a variant whose count reaches zero is removed and
//! its device resource freed.
//!
//! Lookup is a linear scan over the live set. Variant counts are small (tens,
//! not thousands) and the keys are already fully reduced strings, so the scan
//! beats hash-map bookkeeping in practice.

pub mod parameters;
pub mod prologue;

pub use parameters::{derive_parameters, program_code, ClippingState, ShaderParameters};

use std::collections::BTreeMap;

use crate::core::config::RendererConfig;
use crate::render::device::{DeviceProgram, GraphicsDevice, ShaderStage};
use crate::render::lighting::LightsHash;
use crate::render::materials::Material;
use crate::render::scene::{Drawable, Fog};
use crate::render::uniforms::UniformBindingTree;
use crate::render::RenderResult;

/// Stable reference to a live program variant
///
/// Handles order by variant id, which the opaque draw sort exploits to group
/// items sharing a program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramHandle(u32);

/// Link diagnostics attached to a variant that failed to link
///
/// The variant is still returned to the caller; rendering with a
/// non-runnable program is undefined at the device level, and it is the
/// caller's responsibility to inspect this record and act.
#[derive(Debug, Clone)]
pub struct ProgramDiagnostics {
    /// Always `false`; present for symmetry with device link output
    pub runnable: bool,
    /// Device link log
    pub log: String,
    /// Prologue prepended to the vertex template
    pub vertex_prologue: String,
    /// Prologue prepended to the fragment template
    pub fragment_prologue: String,
}

/// One compiled program variant
pub struct ProgramVariant {
    id: u32,
    code: String,
    device_program: DeviceProgram,
    attributes: BTreeMap<String, u32>,
    uniforms: Option<UniformBindingTree>,
    used_times: u32,
    diagnostics: Option<ProgramDiagnostics>,
}

impl ProgramVariant {
    /// Monotonic variant id, unique per cache
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The deterministic cache key this variant was compiled for
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Device handle of the linked program
    pub fn device_program(&self) -> DeviceProgram {
        self.device_program
    }

    /// Attribute name to location table reflected at link time
    pub fn attributes(&self) -> &BTreeMap<String, u32> {
        &self.attributes
    }

    /// Current reference count
    pub fn used_times(&self) -> u32 {
        self.used_times
    }

    /// Link diagnostics; present only when the link failed
    pub fn diagnostics(&self) -> Option<&ProgramDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// The uniform binding tree, reflected lazily on first access
    pub fn uniforms(&mut self, device: &dyn GraphicsDevice) -> RenderResult<&mut UniformBindingTree> {
        if self.uniforms.is_none() {
            let declarations = device.active_uniforms(self.device_program);
            self.uniforms = Some(UniformBindingTree::from_declarations(&declarations)?);
        }
        // Populated just above.
        Ok(self.uniforms.as_mut().expect("uniform tree just built"))
    }
}

/// Reference-counted cache of live program variants
pub struct ProgramVariantCache {
    config: RendererConfig,
    variants: Vec<ProgramVariant>,
    next_id: u32,
}

impl ProgramVariantCache {
    /// Create an empty cache for one renderer configuration
    pub fn new(config: RendererConfig) -> Self {
        Self {
            config,
            variants: Vec::new(),
            next_id: 0,
        }
    }

    /// The configuration variants are derived against
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Derive the parameter set for one material draw
    ///
    /// Pure function of its inputs; see [`parameters::derive_parameters`].
    pub fn get_parameters(
        &self,
        material: &Material,
        lights: &LightsHash,
        fog: Option<&Fog>,
        clipping: ClippingState,
        drawable: &Drawable,
    ) -> ShaderParameters {
        derive_parameters(&self.config, material, lights, fog, clipping, drawable)
    }

    /// Build the cache key for a material + parameter set
    pub fn program_code(&self, material: &Material, parameters: &ShaderParameters) -> String {
        program_code(material, parameters)
    }

    /// Resolve a cache key to a live variant, compiling on miss
    ///
    /// A hit increments the variant's reference count. A miss assembles the
    /// final shader text, compiles and links through the device, reflects the
    /// attribute table, and appends the new variant, with diagnostics
    /// attached instead of an error if the link fails.
    pub fn acquire_program(
        &mut self,
        device: &mut dyn GraphicsDevice,
        material: &Material,
        parameters: &ShaderParameters,
        code: String,
    ) -> RenderResult<ProgramHandle> {
        if let Some(variant) = self.variants.iter_mut().find(|v| v.code == code) {
            variant.used_times += 1;
            log::debug!(
                "program cache hit for material {:?} (variant {}, used {} times)",
                material.name,
                variant.id,
                variant.used_times
            );
            return Ok(ProgramHandle(variant.id));
        }

        let vertex_prologue = prologue::build_prologue(parameters, ShaderStage::Vertex)?;
        let fragment_prologue = prologue::build_prologue(parameters, ShaderStage::Fragment)?;

        let (vertex_body, fragment_body) = match &material.custom_shader {
            Some(custom) => (custom.vertex.as_str(), custom.fragment.as_str()),
            None => {
                let shader = material.kind.shader_id();
                (shader.vertex_source(), shader.fragment_source())
            }
        };

        let vertex =
            device.compile_shader(ShaderStage::Vertex, &format!("{vertex_prologue}\n{vertex_body}"));
        let fragment = device.compile_shader(
            ShaderStage::Fragment,
            &format!("{fragment_prologue}\n{fragment_body}"),
        );
        let linked = device.link_program(vertex, fragment);
        let attributes = device.active_attributes(linked.handle);

        let diagnostics = if linked.runnable {
            None
        } else {
            log::error!(
                "program link failed for material {:?}: {}",
                material.name,
                linked.log
            );
            Some(ProgramDiagnostics {
                runnable: false,
                log: linked.log,
                vertex_prologue,
                fragment_prologue,
            })
        };

        let id = self.next_id;
        self.next_id += 1;
        log::debug!(
            "compiled program variant {} for material {:?} ({} live variants)",
            id,
            material.name,
            self.variants.len() + 1
        );
        self.variants.push(ProgramVariant {
            id,
            code,
            device_program: linked.handle,
            attributes,
            uniforms: None,
            used_times: 1,
            diagnostics,
        });
        Ok(ProgramHandle(id))
    }

    /// Drop one reference to a variant, destroying it at zero
    ///
    /// Removal swaps with the last live variant, keeping release O(1).
    pub fn release_program(&mut self, device: &mut dyn GraphicsDevice, handle: ProgramHandle) {
        let Some(slot) = self.variants.iter().position(|v| v.id == handle.0) else {
            return;
        };
        let variant = &mut self.variants[slot];
        variant.used_times = variant.used_times.saturating_sub(1);
        if variant.used_times == 0 {
            let variant = self.variants.swap_remove(slot);
            device.delete_program(variant.device_program);
            log::debug!(
                "destroyed program variant {} ({} live variants)",
                variant.id,
                self.variants.len()
            );
        }
    }

    /// Look up a live variant
    pub fn get(&self, handle: ProgramHandle) -> Option<&ProgramVariant> {
        self.variants.iter().find(|v| v.id == handle.0)
    }

    /// Look up a live variant mutably
    pub fn get_mut(&mut self, handle: ProgramHandle) -> Option<&mut ProgramVariant> {
        self.variants.iter_mut().find(|v| v.id == handle.0)
    }

    /// Number of live variants
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether the cache holds no live variants
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::device::mock::RecordingDevice;
    use crate::render::materials::{MaterialId, MaterialKind};
    use crate::render::scene::{DrawableId, GeometryId};

    fn material(id: u32) -> Material {
        Material::new(
            MaterialId(id),
            "cache-test",
            MaterialKind::Lambert {
                color: Vec3::new(1.0, 1.0, 1.0),
                opacity: 1.0,
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

    fn acquire(
        cache: &mut ProgramVariantCache,
        device: &mut RecordingDevice,
        material: &Material,
        lights: &LightsHash,
    ) -> ProgramHandle {
        let parameters =
            cache.get_parameters(material, lights, None, ClippingState::default(), &drawable());
        let code = cache.program_code(material, &parameters);
        cache
            .acquire_program(device, material, &parameters, code)
            .expect("acquire")
    }

    #[test]
    fn equal_codes_share_one_variant() {
        let mut cache = ProgramVariantCache::new(RendererConfig::default());
        let mut device = RecordingDevice::new();
        let lights = LightsHash::default();

        let first = acquire(&mut cache, &mut device, &material(1), &lights);
        let second = acquire(&mut cache, &mut device, &material(2), &lights);

        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(first).unwrap().used_times(), 2);
        // Two stages compiled once, not twice.
        assert_eq!(device.compiled_sources.len(), 2);
    }

    #[test]
    fn release_to_zero_destroys_the_variant() {
        let mut cache = ProgramVariantCache::new(RendererConfig::default());
        let mut device = RecordingDevice::new();
        let lights = LightsHash::default();

        let handle = acquire(&mut cache, &mut device, &material(1), &lights);
        acquire(&mut cache, &mut device, &material(2), &lights);
        assert_eq!(cache.get(handle).unwrap().used_times(), 2);

        cache.release_program(&mut device, handle);
        assert_eq!(cache.get(handle).unwrap().used_times(), 1);
        assert!(device.deleted_programs.is_empty());

        cache.release_program(&mut device, handle);
        assert!(cache.get(handle).is_none());
        assert!(cache.is_empty());
        assert_eq!(device.deleted_programs.len(), 1);
    }

    #[test]
    fn different_light_counts_compile_different_variants() {
        let mut cache = ProgramVariantCache::new(RendererConfig::default());
        let mut device = RecordingDevice::new();

        let none = LightsHash::default();
        let one_directional = LightsHash {
            directional_len: 1,
            ..LightsHash::default()
        };

        let a = acquire(&mut cache, &mut device, &material(1), &none);
        let b = acquire(&mut cache, &mut device, &material(1), &one_directional);
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_link_returns_a_diagnosable_variant() {
        let mut cache = ProgramVariantCache::new(RendererConfig::default());
        let mut device = RecordingDevice::new();
        device.fail_link_with = Some("type mismatch in varying".to_string());

        let handle = acquire(&mut cache, &mut device, &material(1), &LightsHash::default());
        let variant = cache.get(handle).expect("variant returned despite failure");
        let diagnostics = variant.diagnostics().expect("diagnostics attached");
        assert!(!diagnostics.runnable);
        assert!(diagnostics.log.contains("type mismatch"));
        assert!(diagnostics.fragment_prologue.contains("precision"));
    }

    #[test]
    fn uniform_tree_is_reflected_lazily_and_once() {
        use crate::render::device::{UniformAddress, UniformDeclaration, UniformKind};

        let mut cache = ProgramVariantCache::new(RendererConfig::default());
        let mut device = RecordingDevice::new();
        device.uniforms = vec![UniformDeclaration {
            name: "diffuse".to_string(),
            kind: UniformKind::Vec3,
            count: 1,
            addr: UniformAddress(0),
        }];

        let handle = acquire(&mut cache, &mut device, &material(1), &LightsHash::default());
        let variant = cache.get_mut(handle).unwrap();
        assert!(variant.uniforms.is_none());
        {
            let tree = variant.uniforms(&device).expect("tree builds");
            assert!(tree.contains("diffuse"));
        }
        assert!(variant.uniforms.is_some());
    }

    #[test]
    fn generated_source_carries_the_prologue() {
        let mut cache = ProgramVariantCache::new(RendererConfig::default());
        let mut device = RecordingDevice::new();
        let lights = LightsHash {
            directional_len: 3,
            ..LightsHash::default()
        };

        acquire(&mut cache, &mut device, &material(1), &lights);
        let (_, vertex_source) = &device.compiled_sources[0];
        assert!(vertex_source.contains("#define NUM_DIR_LIGHTS 3"));
        assert!(vertex_source.contains("precision highp float;"));
    }
}
