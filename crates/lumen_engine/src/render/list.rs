//! Per-frame draw list assembly
//!
//! Scene traversal pushes one [`RenderItem`] per drawable (or per geometry
//! group); the list splits them into opaque and transparent buckets and
//! sorts each with its own comparator: front-to-back for opaque to minimize
//! overdraw, back-to-front for transparent so alpha blending composites
//! correctly.
//!
//! Items live in a growable pool indexed by insertion order and are
//! overwritten in place on the next frame's `init`; slots are never freed,
//! only the logical length resets. Item identity within the pool therefore
//! follows traversal insertion order, not sorted order.

use std::cmp::Ordering;

use crate::render::materials::{Material, MaterialId};
use crate::render::programs::ProgramHandle;
use crate::render::scene::{Drawable, DrawableId, GeometryGroup, GeometryId};

/// One drawable unit queued for a single frame
#[derive(Debug, Clone)]
pub struct RenderItem {
    /// Drawable identity; final sort tie-break
    pub id: DrawableId,
    /// Geometry to draw
    pub geometry: GeometryId,
    /// Material to draw with
    pub material: MaterialId,
    /// Program assigned to the material, when one has been compiled
    pub program: Option<ProgramHandle>,
    /// Application-controlled ordering; sorts before everything else
    pub render_order: i32,
    /// View-space depth
    pub z: f32,
    /// Geometry sub-range for multi-material geometries
    pub group: Option<GeometryGroup>,
}

fn opaque_order(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then_with(|| match (a.program, b.program) {
            (Some(pa), Some(pb)) => pa.cmp(&pb),
            _ => Ordering::Equal,
        })
        .then_with(|| a.material.cmp(&b.material))
        .then_with(|| a.z.partial_cmp(&b.z).unwrap_or(Ordering::Equal))
        .then_with(|| a.id.cmp(&b.id))
}

fn transparent_order(a: &RenderItem, b: &RenderItem) -> Ordering {
    a.render_order
        .cmp(&b.render_order)
        .then_with(|| b.z.partial_cmp(&a.z).unwrap_or(Ordering::Equal))
        .then_with(|| a.id.cmp(&b.id))
}

/// Draw list for one (scene, camera) pair
///
/// Frame protocol: `init` -> `push`/`unshift` per drawable -> `sort` ->
/// iterate `opaque` then `transparent`.
#[derive(Default)]
pub struct RenderList {
    items: Vec<RenderItem>,
    used: usize,
    opaque: Vec<usize>,
    transparent: Vec<usize>,
}

impl RenderList {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a list with pre-allocated pool capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            used: 0,
            opaque: Vec::with_capacity(capacity),
            // Transparent items are typically a small fraction of a scene.
            transparent: Vec::with_capacity(capacity / 4),
        }
    }

    /// Reset logical lengths for a new frame, retaining the item pool
    pub fn init(&mut self) {
        self.used = 0;
        self.opaque.clear();
        self.transparent.clear();
    }

    fn next_item(
        &mut self,
        drawable: &Drawable,
        material: &Material,
        program: Option<ProgramHandle>,
        z: f32,
        group: Option<GeometryGroup>,
    ) -> usize {
        let item = RenderItem {
            id: drawable.id,
            geometry: drawable.geometry,
            material: material.id,
            program,
            render_order: drawable.render_order,
            z,
            group,
        };
        let slot = self.used;
        if slot < self.items.len() {
            self.items[slot] = item;
        } else {
            self.items.push(item);
        }
        self.used += 1;
        slot
    }

    /// Append one item to the bucket its material selects
    pub fn push(
        &mut self,
        drawable: &Drawable,
        material: &Material,
        program: Option<ProgramHandle>,
        z: f32,
        group: Option<GeometryGroup>,
    ) {
        let transparent = material.transparent;
        let slot = self.next_item(drawable, material, program, z, group);
        if transparent {
            self.transparent.push(slot);
        } else {
            self.opaque.push(slot);
        }
    }

    /// Prepend one item, for drawables that must draw first (backgrounds)
    pub fn unshift(
        &mut self,
        drawable: &Drawable,
        material: &Material,
        program: Option<ProgramHandle>,
        z: f32,
        group: Option<GeometryGroup>,
    ) {
        let transparent = material.transparent;
        let slot = self.next_item(drawable, material, program, z, group);
        if transparent {
            self.transparent.insert(0, slot);
        } else {
            self.opaque.insert(0, slot);
        }
    }

    /// Sort both buckets; a bucket with one item or fewer is left untouched
    pub fn sort(&mut self) {
        let Self {
            items,
            opaque,
            transparent,
            ..
        } = self;
        if opaque.len() > 1 {
            opaque.sort_by(|&a, &b| opaque_order(&items[a], &items[b]));
        }
        if transparent.len() > 1 {
            transparent.sort_by(|&a, &b| transparent_order(&items[a], &items[b]));
        }
    }

    /// Opaque items in current (post-`sort`: front-to-back) order
    pub fn opaque(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.opaque.iter().map(move |&slot| &self.items[slot])
    }

    /// Transparent items in current (post-`sort`: back-to-front) order
    pub fn transparent(&self) -> impl Iterator<Item = &RenderItem> + '_ {
        self.transparent.iter().map(move |&slot| &self.items[slot])
    }

    /// Items queued this frame
    pub fn len(&self) -> usize {
        self.used
    }

    /// Whether nothing was queued this frame
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Pool capacity in items, grown over the life of the list
    pub fn pool_size(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Mat4, Vec3};
    use crate::render::materials::MaterialKind;

    fn drawable(id: u32, render_order: i32) -> Drawable {
        Drawable {
            id: DrawableId(id),
            geometry: GeometryId(id),
            render_order,
            world_matrix: Mat4::identity(),
            bone_count: None,
        }
    }

    fn material(id: u32, transparent: bool) -> Material {
        let mut material = Material::new(
            MaterialId(id),
            "list-test",
            MaterialKind::Unlit {
                color: Vec3::new(1.0, 1.0, 1.0),
                opacity: 1.0,
            },
        );
        material.transparent = transparent;
        material
    }

    #[test]
    fn opaque_sorts_front_to_back() {
        let mut list = RenderList::new();
        let opaque = material(1, false);
        list.init();
        list.push(&drawable(1, 0), &opaque, None, 5.0, None);
        list.push(&drawable(2, 0), &opaque, None, 2.0, None);
        list.sort();

        let order: Vec<_> = list.opaque().map(|item| item.id).collect();
        assert_eq!(order, vec![DrawableId(2), DrawableId(1)]);
    }

    #[test]
    fn transparent_sorts_back_to_front() {
        let mut list = RenderList::new();
        let glass = material(1, true);
        list.init();
        list.push(&drawable(1, 0), &glass, None, 5.0, None);
        list.push(&drawable(2, 0), &glass, None, 2.0, None);
        list.sort();

        assert_eq!(list.opaque().count(), 0);
        let order: Vec<_> = list.transparent().map(|item| item.id).collect();
        assert_eq!(order, vec![DrawableId(1), DrawableId(2)]);
    }

    #[test]
    fn render_order_dominates_depth() {
        let mut list = RenderList::new();
        let opaque = material(1, false);
        list.init();
        list.push(&drawable(1, 1), &opaque, None, 1.0, None);
        list.push(&drawable(2, 0), &opaque, None, 9.0, None);
        list.sort();

        let order: Vec<_> = list.opaque().map(|item| item.id).collect();
        assert_eq!(order, vec![DrawableId(2), DrawableId(1)]);
    }

    #[test]
    fn equal_keys_fall_back_to_insertion_id() {
        let mut list = RenderList::new();
        let opaque = material(1, false);
        list.init();
        list.push(&drawable(3, 0), &opaque, None, 4.0, None);
        list.push(&drawable(1, 0), &opaque, None, 4.0, None);
        list.push(&drawable(2, 0), &opaque, None, 4.0, None);
        list.sort();

        let order: Vec<_> = list.opaque().map(|item| item.id).collect();
        assert_eq!(order, vec![DrawableId(1), DrawableId(2), DrawableId(3)]);
    }

    #[test]
    fn opaque_groups_by_material_before_depth() {
        let mut list = RenderList::new();
        let a = material(1, false);
        let b = material(2, false);
        list.init();
        list.push(&drawable(1, 0), &b, None, 1.0, None);
        list.push(&drawable(2, 0), &a, None, 9.0, None);
        list.push(&drawable(3, 0), &b, None, 2.0, None);
        list.sort();

        let order: Vec<_> = list.opaque().map(|item| item.material).collect();
        assert_eq!(
            order,
            vec![MaterialId(1), MaterialId(2), MaterialId(2)]
        );
    }

    #[test]
    fn unshift_prepends_before_sorting() {
        let mut list = RenderList::new();
        let opaque = material(1, false);
        list.init();
        list.push(&drawable(1, 0), &opaque, None, 1.0, None);
        list.unshift(&drawable(2, 0), &opaque, None, 9.0, None);

        let order: Vec<_> = list.opaque().map(|item| item.id).collect();
        assert_eq!(order, vec![DrawableId(2), DrawableId(1)]);
    }

    #[test]
    fn pool_slots_are_reused_across_frames() {
        let mut list = RenderList::new();
        let opaque = material(1, false);

        list.init();
        for id in 0..8 {
            list.push(&drawable(id, 0), &opaque, None, 1.0, None);
        }
        assert_eq!(list.pool_size(), 8);

        list.init();
        assert!(list.is_empty());
        list.push(&drawable(99, 0), &opaque, None, 1.0, None);
        assert_eq!(list.len(), 1);
        // The pool did not shrink or grow; the first slot was overwritten.
        assert_eq!(list.pool_size(), 8);
        assert_eq!(list.opaque().next().unwrap().id, DrawableId(99));
    }
}
