//! Per-(scene, camera) light aggregation
//!
//! Scene traversal pushes every visible light into a [`LightState`]; `setup`
//! then partitions them by kind into uniform-ready buckets, transforms
//! positions and directions into camera space, and snapshots a [`LightsHash`]
//! describing the population. The hash is the *only* signal the program layer
//! uses to decide whether a shader variant must be rebuilt: light value
//! changes never touch it, population changes always do.
//!
//! Uniform records are cached per light identity so a light that changes
//! traversal position between frames reuses its record.

use std::collections::HashMap;

use crate::foundation::math::{basis_column, translation_of, Mat4, Point3, Vec2, Vec3};
use crate::render::device::TextureId;
use crate::render::lighting::{Light, LightId, LightKind};
use crate::render::scene::Camera;

/// Uniform record for one directional light
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DirectionalLightUniforms {
    /// Camera-space direction the light travels
    pub direction: Vec3,
    /// Color scaled by intensity
    pub color: Vec3,
}

/// Uniform record for one point light
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointLightUniforms {
    /// Camera-space position
    pub position: Vec3,
    /// Color scaled by intensity
    pub color: Vec3,
    /// Cutoff distance; 0 means unbounded
    pub distance: f32,
    /// Attenuation exponent
    pub decay: f32,
}

/// Uniform record for one spot light
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpotLightUniforms {
    /// Camera-space position
    pub position: Vec3,
    /// Camera-space direction the cone opens toward
    pub direction: Vec3,
    /// Color scaled by intensity
    pub color: Vec3,
    /// Cutoff distance; 0 means unbounded
    pub distance: f32,
    /// Attenuation exponent
    pub decay: f32,
    /// Cosine of the cone half-angle
    pub cone_cos: f32,
    /// Cosine of the penumbra-adjusted half-angle
    pub penumbra_cos: f32,
}

/// Uniform record for one rectangular area light
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RectAreaLightUniforms {
    /// Camera-space position of the rectangle center
    pub position: Vec3,
    /// Color scaled by intensity
    pub color: Vec3,
    /// Camera-space half-width vector of the rectangle
    pub half_width: Vec3,
    /// Camera-space half-height vector of the rectangle
    pub half_height: Vec3,
}

/// Uniform record for one hemisphere light
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HemisphereLightUniforms {
    /// Camera-space up direction of the gradient
    pub direction: Vec3,
    /// Sky color scaled by intensity
    pub sky_color: Vec3,
    /// Ground color scaled by intensity
    pub ground_color: Vec3,
}

/// Shadow sampling parameters copied from a light's shadow descriptor
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LightShadowUniforms {
    /// Depth bias applied when sampling
    pub bias: f32,
    /// Blur radius for soft edges
    pub radius: f32,
    /// Shadow map resolution in texels
    pub map_size: Vec2,
}

/// Persistent uniform records keyed by light identity
///
/// Records survive across frames so a light keeps its record regardless of
/// traversal order; `setup` rewrites the fields in place and copies the
/// result into the frame's bucket.
#[derive(Debug, Default)]
struct UniformRecordCache {
    directional: HashMap<LightId, DirectionalLightUniforms>,
    point: HashMap<LightId, PointLightUniforms>,
    spot: HashMap<LightId, SpotLightUniforms>,
    rect_area: HashMap<LightId, RectAreaLightUniforms>,
    hemisphere: HashMap<LightId, HemisphereLightUniforms>,
    shadow: HashMap<LightId, LightShadowUniforms>,
}

impl UniformRecordCache {
    fn len(&self) -> usize {
        self.directional.len()
            + self.point.len()
            + self.spot.len()
            + self.rect_area.len()
            + self.hemisphere.len()
    }
}

/// Population snapshot of one aggregation pass
///
/// Equality of two snapshots is the sole signal used elsewhere to skip
/// shader relinking: identical hashes mean the generated light loops are
/// textually identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LightsHash {
    /// Identity of the aggregator instance that produced the snapshot
    pub state_id: u32,
    /// Directional bucket length
    pub directional_len: usize,
    /// Point bucket length
    pub point_len: usize,
    /// Spot bucket length
    pub spot_len: usize,
    /// Rect-area bucket length
    pub rect_area_len: usize,
    /// Hemisphere bucket length
    pub hemisphere_len: usize,
    /// Total shadow-casting lights pushed this frame
    pub shadows_len: usize,
}

/// Uniform-ready light data for one (scene, camera) pair
///
/// Bucket vectors are reused across frames; their logical length is whatever
/// the last `setup` populated.
#[derive(Debug, Default)]
pub struct LightBuckets {
    /// Accumulated ambient contribution, color x intensity summed
    pub ambient: Vec3,
    /// Directional light records
    pub directional: Vec<DirectionalLightUniforms>,
    /// Shadow parameters for shadow-casting directional lights
    pub directional_shadow: Vec<LightShadowUniforms>,
    /// Shadow maps aligned with `directional_shadow`
    pub directional_shadow_map: Vec<Option<TextureId>>,
    /// Shadow matrices aligned with `directional_shadow`
    pub directional_shadow_matrix: Vec<Mat4>,
    /// Point light records
    pub point: Vec<PointLightUniforms>,
    /// Shadow parameters for shadow-casting point lights
    pub point_shadow: Vec<LightShadowUniforms>,
    /// Shadow maps aligned with `point_shadow`
    pub point_shadow_map: Vec<Option<TextureId>>,
    /// Shadow matrices aligned with `point_shadow`
    pub point_shadow_matrix: Vec<Mat4>,
    /// Spot light records
    pub spot: Vec<SpotLightUniforms>,
    /// Shadow parameters for shadow-casting spot lights
    pub spot_shadow: Vec<LightShadowUniforms>,
    /// Shadow maps aligned with `spot_shadow`
    pub spot_shadow_map: Vec<Option<TextureId>>,
    /// Shadow matrices aligned with `spot_shadow`
    pub spot_shadow_matrix: Vec<Mat4>,
    /// Rect-area light records
    pub rect_area: Vec<RectAreaLightUniforms>,
    /// Hemisphere light records
    pub hemisphere: Vec<HemisphereLightUniforms>,
}

fn write_slot<T: Copy>(bucket: &mut Vec<T>, index: usize, value: T) {
    if index < bucket.len() {
        bucket[index] = value;
    } else {
        bucket.push(value);
    }
}

/// Aggregates visible lights for one (scene, camera) pair
///
/// Frame protocol: `init` -> `push_light`/`push_shadow` per visible light ->
/// `setup` -> read `buckets`/`hash`. Backing storage survives across frames.
pub struct LightState {
    state_id: u32,
    lights: Vec<Light>,
    shadows: Vec<Light>,
    buckets: LightBuckets,
    cache: UniformRecordCache,
    hash: LightsHash,
}

impl LightState {
    /// Create an aggregator with the given instance identity
    pub fn new(state_id: u32) -> Self {
        Self {
            state_id,
            lights: Vec::new(),
            shadows: Vec::new(),
            buckets: LightBuckets::default(),
            cache: UniformRecordCache::default(),
            hash: LightsHash {
                state_id,
                ..LightsHash::default()
            },
        }
    }

    /// Reset the working sequences for a new frame, retaining storage
    pub fn init(&mut self) {
        self.lights.clear();
        self.shadows.clear();
    }

    /// Record one visible light
    pub fn push_light(&mut self, light: &Light) {
        self.lights.push(light.clone());
    }

    /// Record one shadow-casting light (in addition to `push_light`)
    pub fn push_shadow(&mut self, light: &Light) {
        self.shadows.push(light.clone());
    }

    /// Partition accumulated lights into buckets and snapshot the hash
    pub fn setup(&mut self, camera: &Camera) {
        let view = &camera.view_matrix;

        let mut ambient = Vec3::zeros();
        let mut directional_len = 0;
        let mut directional_shadow_len = 0;
        let mut point_len = 0;
        let mut point_shadow_len = 0;
        let mut spot_len = 0;
        let mut spot_shadow_len = 0;
        let mut rect_area_len = 0;
        let mut hemisphere_len = 0;

        // Shadow-casting lights sort to the front of each bucket so shadow
        // arrays align with the head of the light arrays.
        self.lights
            .sort_by_key(|light| !(light.cast_shadow && light.shadow.is_some()));

        for index in 0..self.lights.len() {
            let light = self.lights[index].clone();
            let color = light.scaled_color();
            let has_shadow = light.cast_shadow && light.shadow.is_some();

            match &light.kind {
                LightKind::Ambient => {
                    ambient += color;
                }
                LightKind::Directional { direction } => {
                    let record = self.cache.directional.entry(light.id).or_default();
                    record.direction = view_direction(view, direction);
                    record.color = color;
                    let record = *record;
                    write_slot(&mut self.buckets.directional, directional_len, record);
                    directional_len += 1;

                    if has_shadow {
                        self.push_shadow_records(
                            &light,
                            directional_shadow_len,
                            ShadowBucket::Directional,
                        );
                        directional_shadow_len += 1;
                    }
                }
                LightKind::Point { distance, decay } => {
                    let record = self.cache.point.entry(light.id).or_default();
                    record.position = view_position(view, &light.world_matrix);
                    record.color = color;
                    record.distance = *distance;
                    record.decay = *decay;
                    let record = *record;
                    write_slot(&mut self.buckets.point, point_len, record);
                    point_len += 1;

                    if has_shadow {
                        self.push_shadow_records(&light, point_shadow_len, ShadowBucket::Point);
                        point_shadow_len += 1;
                    }
                }
                LightKind::Spot {
                    direction,
                    distance,
                    decay,
                    angle,
                    penumbra,
                } => {
                    let record = self.cache.spot.entry(light.id).or_default();
                    record.position = view_position(view, &light.world_matrix);
                    record.direction = view_direction(view, direction);
                    record.color = color;
                    record.distance = *distance;
                    record.decay = *decay;
                    record.cone_cos = angle.cos();
                    record.penumbra_cos = (angle * (1.0 - penumbra)).cos();
                    let record = *record;
                    write_slot(&mut self.buckets.spot, spot_len, record);
                    spot_len += 1;

                    if has_shadow {
                        self.push_shadow_records(&light, spot_shadow_len, ShadowBucket::Spot);
                        spot_shadow_len += 1;
                    }
                }
                LightKind::RectArea { width, height } => {
                    let half_width = basis_column(&light.world_matrix, 0) * (*width * 0.5);
                    let half_height = basis_column(&light.world_matrix, 1) * (*height * 0.5);
                    let record = self.cache.rect_area.entry(light.id).or_default();
                    record.position = view_position(view, &light.world_matrix);
                    record.color = color;
                    record.half_width = view.transform_vector(&half_width);
                    record.half_height = view.transform_vector(&half_height);
                    let record = *record;
                    write_slot(&mut self.buckets.rect_area, rect_area_len, record);
                    rect_area_len += 1;
                }
                LightKind::Hemisphere {
                    direction,
                    ground_color,
                } => {
                    let record = self.cache.hemisphere.entry(light.id).or_default();
                    record.direction = view_direction(view, direction);
                    record.sky_color = color;
                    record.ground_color = ground_color * light.intensity;
                    let record = *record;
                    write_slot(&mut self.buckets.hemisphere, hemisphere_len, record);
                    hemisphere_len += 1;
                }
            }
        }

        self.buckets.ambient = ambient;
        self.buckets.directional.truncate(directional_len);
        self.buckets.directional_shadow.truncate(directional_shadow_len);
        self.buckets
            .directional_shadow_map
            .truncate(directional_shadow_len);
        self.buckets
            .directional_shadow_matrix
            .truncate(directional_shadow_len);
        self.buckets.point.truncate(point_len);
        self.buckets.point_shadow.truncate(point_shadow_len);
        self.buckets.point_shadow_map.truncate(point_shadow_len);
        self.buckets.point_shadow_matrix.truncate(point_shadow_len);
        self.buckets.spot.truncate(spot_len);
        self.buckets.spot_shadow.truncate(spot_shadow_len);
        self.buckets.spot_shadow_map.truncate(spot_shadow_len);
        self.buckets.spot_shadow_matrix.truncate(spot_shadow_len);
        self.buckets.rect_area.truncate(rect_area_len);
        self.buckets.hemisphere.truncate(hemisphere_len);

        let hash = LightsHash {
            state_id: self.state_id,
            directional_len,
            point_len,
            spot_len,
            rect_area_len,
            hemisphere_len,
            shadows_len: self.shadows.len(),
        };
        if hash != self.hash {
            log::debug!(
                "light population changed for state {}: {} directional, {} point, {} spot, {} rect-area, {} hemisphere, {} shadows",
                self.state_id,
                directional_len,
                point_len,
                spot_len,
                rect_area_len,
                hemisphere_len,
                self.shadows.len()
            );
        }
        self.hash = hash;
    }

    fn push_shadow_records(&mut self, light: &Light, index: usize, bucket: ShadowBucket) {
        // Callers check shadow presence before entering a shadow bucket.
        let Some(descriptor) = &light.shadow else {
            return;
        };
        let record = self.cache.shadow.entry(light.id).or_default();
        record.bias = descriptor.bias;
        record.radius = descriptor.radius;
        record.map_size = descriptor.map_size;
        let record = *record;

        let (shadow, map, matrix) = match bucket {
            ShadowBucket::Directional => (
                &mut self.buckets.directional_shadow,
                &mut self.buckets.directional_shadow_map,
                &mut self.buckets.directional_shadow_matrix,
            ),
            ShadowBucket::Point => (
                &mut self.buckets.point_shadow,
                &mut self.buckets.point_shadow_map,
                &mut self.buckets.point_shadow_matrix,
            ),
            ShadowBucket::Spot => (
                &mut self.buckets.spot_shadow,
                &mut self.buckets.spot_shadow_map,
                &mut self.buckets.spot_shadow_matrix,
            ),
        };
        write_slot(shadow, index, record);
        write_slot(map, index, descriptor.map);
        write_slot(matrix, index, descriptor.matrix);
    }

    /// Uniform-ready buckets from the last `setup`
    pub fn buckets(&self) -> &LightBuckets {
        &self.buckets
    }

    /// Population snapshot from the last `setup`
    pub fn hash(&self) -> LightsHash {
        self.hash
    }

    /// Number of per-identity light uniform records currently cached
    pub fn cached_records(&self) -> usize {
        self.cache.len()
    }
}

#[derive(Clone, Copy)]
enum ShadowBucket {
    Directional,
    Point,
    Spot,
}

fn view_direction(view: &Mat4, direction: &Vec3) -> Vec3 {
    view.transform_vector(direction)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| -Vec3::z())
}

fn view_position(view: &Mat4, world_matrix: &Mat4) -> Vec3 {
    let world = translation_of(world_matrix);
    let transformed = view.transform_point(&Point3::new(world.x, world.y, world.z));
    Vec3::new(transformed.x, transformed.y, transformed.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::lighting::ShadowDescriptor;
    use crate::render::scene::CameraId;
    use approx::assert_relative_eq;

    fn identity_camera() -> Camera {
        Camera {
            id: CameraId(1),
            view_matrix: Mat4::identity(),
            projection: Mat4::identity(),
        }
    }

    fn white() -> Vec3 {
        Vec3::new(1.0, 1.0, 1.0)
    }

    #[test]
    fn ambient_plus_directional_scenario() {
        let mut state = LightState::new(1);
        state.init();
        state.push_light(&Light::ambient(LightId(1), white(), 1.0));
        state.push_light(&Light::directional(
            LightId(2),
            white(),
            1.0,
            Vec3::new(0.0, -1.0, 0.0),
        ));
        state.setup(&identity_camera());

        assert_eq!(state.buckets().ambient, white());
        assert_eq!(state.buckets().directional.len(), 1);
        assert_eq!(state.hash().directional_len, 1);
        assert_eq!(state.hash().point_len, 0);
    }

    #[test]
    fn hash_ignores_value_changes_but_not_population() {
        let mut state = LightState::new(3);
        let mut light = Light::directional(LightId(1), white(), 1.0, -Vec3::y());

        state.init();
        state.push_light(&light);
        state.setup(&identity_camera());
        let before = state.hash();

        // Color and intensity are data, not structure.
        light.color = Vec3::new(0.2, 0.4, 0.8);
        light.intensity = 7.0;
        state.init();
        state.push_light(&light);
        state.setup(&identity_camera());
        assert_eq!(state.hash(), before);

        // Population is structure.
        state.init();
        state.push_light(&light);
        state.push_light(&Light::point(LightId(2), white(), 1.0, 0.0, 2.0));
        state.setup(&identity_camera());
        assert_ne!(state.hash(), before);
        assert_eq!(state.hash().point_len, 1);
    }

    #[test]
    fn hashes_from_distinct_states_differ() {
        let mut a = LightState::new(1);
        let mut b = LightState::new(2);
        a.setup(&identity_camera());
        b.setup(&identity_camera());
        assert_ne!(a.hash(), b.hash());
    }

    #[test]
    fn point_position_is_transformed_into_camera_space() {
        // Camera sitting at +10 z, looking down -z: view = inverse(translation).
        let camera_world = Mat4::new_translation(&Vec3::new(0.0, 0.0, 10.0));
        let camera = Camera::from_world_matrix(CameraId(1), &camera_world).unwrap();

        let mut light = Light::point(LightId(1), white(), 2.0, 50.0, 2.0);
        light.world_matrix = Mat4::new_translation(&Vec3::new(0.0, 0.0, 4.0));

        let mut state = LightState::new(1);
        state.init();
        state.push_light(&light);
        state.setup(&camera);

        let record = state.buckets().point[0];
        assert_relative_eq!(record.position.z, -6.0, epsilon = 1e-5);
        assert_eq!(record.color, white() * 2.0);
        assert_eq!(record.distance, 50.0);
    }

    #[test]
    fn spot_cone_cosines() {
        let angle = std::f32::consts::FRAC_PI_4;
        let penumbra = 0.5;
        let light = Light::spot(
            LightId(1),
            white(),
            1.0,
            -Vec3::z(),
            0.0,
            2.0,
            angle,
            penumbra,
        );

        let mut state = LightState::new(1);
        state.init();
        state.push_light(&light);
        state.setup(&identity_camera());

        let record = state.buckets().spot[0];
        assert_relative_eq!(record.cone_cos, angle.cos(), epsilon = 1e-6);
        assert_relative_eq!(
            record.penumbra_cos,
            (angle * 0.5).cos(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn rect_area_half_vectors_follow_world_rotation() {
        let mut light = Light::rect_area(LightId(1), white(), 1.0, 4.0, 2.0);
        light.world_matrix = Mat4::identity();

        let mut state = LightState::new(1);
        state.init();
        state.push_light(&light);
        state.setup(&identity_camera());

        let record = state.buckets().rect_area[0];
        assert_relative_eq!(record.half_width.x, 2.0, epsilon = 1e-6);
        assert_relative_eq!(record.half_height.y, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn shadow_records_copy_descriptor_fields() {
        let mut light = Light::directional(LightId(1), white(), 1.0, -Vec3::y());
        light.cast_shadow = true;
        light.shadow = Some(ShadowDescriptor {
            bias: 0.005,
            radius: 2.0,
            map_size: Vec2::new(1024.0, 1024.0),
            matrix: Mat4::identity(),
            map: Some(TextureId(42)),
        });

        let mut state = LightState::new(1);
        state.init();
        state.push_light(&light);
        state.push_shadow(&light);
        state.setup(&identity_camera());

        assert_eq!(state.hash().shadows_len, 1);
        let shadow = state.buckets().directional_shadow[0];
        assert_relative_eq!(shadow.bias, 0.005);
        assert_eq!(state.buckets().directional_shadow_map[0], Some(TextureId(42)));
    }

    #[test]
    fn records_are_cached_per_identity_across_frames() {
        let mut state = LightState::new(1);
        let a = Light::point(LightId(10), white(), 1.0, 0.0, 2.0);
        let b = Light::point(LightId(11), white(), 1.0, 0.0, 2.0);

        state.init();
        state.push_light(&a);
        state.push_light(&b);
        state.setup(&identity_camera());
        assert_eq!(state.cached_records(), 2);

        // Reversed traversal order reuses the same two records.
        state.init();
        state.push_light(&b);
        state.push_light(&a);
        state.setup(&identity_camera());
        assert_eq!(state.cached_records(), 2);
        assert_eq!(state.buckets().point.len(), 2);
    }
}
