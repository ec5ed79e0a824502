//! Per-(scene, camera) render state, owned across frames
//!
//! Each (scene, camera) pair gets exactly one [`RenderState`] holding its
//! light aggregation state and its draw list. The registry creates states
//! lazily on first access and returns the same instance every frame after,
//! so pooled storage inside them actually gets reused.

use std::collections::HashMap;

use crate::render::lighting::{Light, LightState, LightsHash};
use crate::render::list::RenderList;
use crate::render::scene::{Camera, CameraId, SceneId};

/// Light state plus draw list for one (scene, camera) pair
pub struct RenderState {
    lights: LightState,
    list: RenderList,
}

impl RenderState {
    fn new(state_id: u32) -> Self {
        Self {
            lights: LightState::new(state_id),
            list: RenderList::new(),
        }
    }

    /// Reset per-frame state, retaining backing storage
    pub fn init(&mut self) {
        self.lights.init();
        self.list.init();
    }

    /// Record one visible light
    pub fn push_light(&mut self, light: &Light) {
        self.lights.push_light(light);
    }

    /// Record one shadow-casting light (in addition to `push_light`)
    pub fn push_shadow(&mut self, light: &Light) {
        self.lights.push_shadow(light);
    }

    /// Partition accumulated lights and snapshot the population hash
    pub fn setup_lights(&mut self, camera: &Camera) {
        self.lights.setup(camera);
    }

    /// The aggregated light state
    pub fn lights(&self) -> &LightState {
        &self.lights
    }

    /// Population hash from the last `setup_lights`
    pub fn lights_hash(&self) -> LightsHash {
        self.lights.hash()
    }

    /// The draw list
    pub fn list(&self) -> &RenderList {
        &self.list
    }

    /// The draw list, for population and sorting
    pub fn list_mut(&mut self) -> &mut RenderList {
        &mut self.list
    }
}

/// Two-level lookup of render states keyed by (scene, camera)
#[derive(Default)]
pub struct RenderStateRegistry {
    states: HashMap<SceneId, HashMap<CameraId, RenderState>>,
    next_state_id: u32,
}

impl RenderStateRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The state for a (scene, camera) pair, created on first access
    pub fn get(&mut self, scene: SceneId, camera: CameraId) -> &mut RenderState {
        let cameras = self.states.entry(scene).or_default();
        cameras.entry(camera).or_insert_with(|| {
            self.next_state_id += 1;
            log::debug!(
                "created render state {} for scene {:?}, camera {:?}",
                self.next_state_id,
                scene,
                camera
            );
            RenderState::new(self.next_state_id)
        })
    }

    /// Number of (scene, camera) pairs currently tracked
    pub fn len(&self) -> usize {
        self.states.values().map(HashMap::len).sum()
    }

    /// Whether no states are tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every state, for context loss or teardown
    pub fn dispose(&mut self) {
        self.states.clear();
        log::debug!("render state registry disposed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_created_lazily_per_pair() {
        let mut registry = RenderStateRegistry::new();
        assert!(registry.is_empty());

        registry.get(SceneId(1), CameraId(1));
        registry.get(SceneId(1), CameraId(2));
        registry.get(SceneId(2), CameraId(1));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn the_same_pair_returns_the_same_state() {
        let mut registry = RenderStateRegistry::new();
        let first_id = registry.get(SceneId(1), CameraId(1)).lights_hash().state_id;
        let second_id = registry.get(SceneId(1), CameraId(1)).lights_hash().state_id;
        let other_id = registry.get(SceneId(1), CameraId(9)).lights_hash().state_id;

        assert_eq!(first_id, second_id);
        assert_ne!(first_id, other_id);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn dispose_drops_everything() {
        let mut registry = RenderStateRegistry::new();
        registry.get(SceneId(1), CameraId(1));
        registry.dispose();
        assert!(registry.is_empty());

        // A fresh state after dispose gets a fresh identity.
        let id = registry.get(SceneId(1), CameraId(1)).lights_hash().state_id;
        assert_eq!(registry.len(), 1);
        assert!(id > 1);
    }
}
