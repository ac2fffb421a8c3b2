// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scene storage: object slots, geometry queries, setters, and observers.

use alloc::{boxed::Box, rc::Rc, vec::Vec};
use hashbrown::HashMap;
use kurbo::{Affine, Point, Rect, Size};

use crate::context::{
    LayoutBeforeEvent, LayoutContext, LayoutEvent, LayoutObserver, LayoutPass, LayoutResult,
    LayoutTrigger, ModifiedEvent,
};
use crate::strategy::LayoutStrategy;
use crate::surface::Surface;
use crate::types::{Geometry, ModifiedKeys, ObjectId, ObserverId, OriginX, OriginY, SurfaceId};
use crate::util::transform_rect_bbox;

/// A 2D scene of transformable objects and the groups that contain them.
///
/// Objects live in generational slots and are addressed by [`ObjectId`].
/// A group owns its members through an ordered member list; each member only
/// keeps a handle back to its owner. Every structural change (adding or
/// removing members, swapping the layout strategy, resizing the bound
/// surface) runs the layout protocol synchronously before the call returns.
///
/// ## Example
///
/// ```rust
/// use kurbo::{Point, Rect};
/// use understory_group::{Geometry, GroupOptions, Scene};
///
/// let mut scene = Scene::new();
/// let a = scene.insert(Geometry::from_rect(Rect::new(0.0, 0.0, 10.0, 10.0)));
/// let b = scene.insert(Geometry::from_rect(Rect::new(90.0, 40.0, 100.0, 50.0)));
///
/// // The default strategy shrink-wraps the group around its members.
/// let group = scene.create_group(&[a, b], GroupOptions::default()).unwrap();
/// let g = scene.geometry(group).unwrap();
/// assert_eq!((g.width, g.height), (100.0, 50.0));
/// assert_eq!(g.center, Point::new(50.0, 25.0));
///
/// // Members keep their place on the surface.
/// assert_eq!(scene.absolute_center(b), Some(Point::new(95.0, 45.0)));
/// ```
pub struct Scene {
    /// slots
    objects: Vec<Option<Object>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    pub(crate) surfaces: HashMap<SurfaceId, Surface>,
    pub(crate) next_surface: u32,
    observers: Vec<ObserverSlot>,
    next_observer: u32,
    pub(crate) cycle_aborts: u64,
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.objects.len();
        let alive = self.objects.iter().filter(|n| n.is_some()).count();
        let groups = self
            .objects
            .iter()
            .flatten()
            .filter(|n| n.group.is_some())
            .count();
        f.debug_struct("Scene")
            .field("objects_total", &total)
            .field("objects_alive", &alive)
            .field("groups", &groups)
            .field("surfaces", &self.surfaces.len())
            .field("observers", &self.observers.len())
            .field("cycle_aborts", &self.cycle_aborts)
            .finish_non_exhaustive()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub(crate) struct Object {
    generation: u32,
    pub(crate) geometry: Geometry,
    pub(crate) owner: Option<ObjectId>,
    pub(crate) surface: Option<SurfaceId>,
    pub(crate) group: Option<GroupData>,
}

#[derive(Debug)]
pub(crate) struct GroupData {
    pub(crate) members: Vec<ObjectId>,
    pub(crate) strategy: Rc<dyn LayoutStrategy>,
    /// strategy used on the previous pass
    pub(crate) last_strategy: Option<Rc<dyn LayoutStrategy>>,
    pub(crate) objects_relative_to_group: bool,
    /// surface whose resizes this group reacts to
    pub(crate) subscription: Option<SurfaceId>,
}

impl GroupData {
    pub(crate) fn new(strategy: Rc<dyn LayoutStrategy>, objects_relative_to_group: bool) -> Self {
        Self {
            members: Vec::new(),
            strategy,
            last_strategy: None,
            objects_relative_to_group,
            subscription: None,
        }
    }
}

struct ObserverSlot {
    id: ObserverId,
    target: Option<ObjectId>,
    observer: Box<dyn LayoutObserver>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self {
            objects: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            surfaces: HashMap::new(),
            next_surface: 0,
            observers: Vec::new(),
            next_observer: 0,
            cycle_aborts: 0,
        }
    }

    /// Insert a standalone object. It has no owner and no surface.
    pub fn insert(&mut self, geometry: Geometry) -> ObjectId {
        self.alloc(geometry, None)
    }

    pub(crate) fn alloc(&mut self, geometry: Geometry, group: Option<GroupData>) -> ObjectId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.objects[idx] = Some(Object::new(generation, geometry, group));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ObjectId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.objects
                .push(Some(Object::new(generation, geometry, group)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "ObjectId uses 32-bit indices by design."
            )]
            ((self.objects.len() - 1) as u32, generation)
        };
        ObjectId::new(idx, generation)
    }

    pub(crate) fn free(&mut self, id: ObjectId) {
        self.objects[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Returns true if `id` refers to a live object.
    pub fn is_alive(&self, id: ObjectId) -> bool {
        self.objects
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .is_some_and(|n| n.generation == id.1)
    }

    /// Returns true if `id` refers to a live group.
    pub fn is_group(&self, id: ObjectId) -> bool {
        self.object(id).is_some_and(|n| n.group.is_some())
    }

    /// Geometry of a live object, in its owner's plane.
    pub fn geometry(&self, id: ObjectId) -> Option<&Geometry> {
        self.object(id).map(|n| &n.geometry)
    }

    /// The group that owns `id`, or `None` for roots or stale ids.
    pub fn owner_of(&self, id: ObjectId) -> Option<ObjectId> {
        self.object(id).and_then(|n| n.owner)
    }

    /// The surface `id` is bound to, directly or through its owners.
    pub fn surface_of(&self, id: ObjectId) -> Option<SurfaceId> {
        self.object(id).and_then(|n| n.surface)
    }

    /// Members of a group in paint order, or an empty slice for leaves and stale ids.
    pub fn members(&self, id: ObjectId) -> &[ObjectId] {
        self.group(id).map_or(&[][..], |g| g.members.as_slice())
    }

    /// The active layout strategy of a group.
    pub fn layout_strategy(&self, id: ObjectId) -> Option<Rc<dyn LayoutStrategy>> {
        self.group(id).map(|g| g.strategy.clone())
    }

    /// Whether the group's initial members were supplied in group-relative coordinates.
    pub fn objects_relative_to_group(&self, id: ObjectId) -> Option<bool> {
        self.group(id).map(|g| g.objects_relative_to_group)
    }

    /// Live objects without an owner, in slot order.
    pub fn roots(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.objects.iter().enumerate().filter_map(|(i, n)| match n {
            Some(n) if n.owner.is_none() =>
            {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "ObjectId uses 32-bit indices by design."
                )]
                Some(ObjectId::new(i as u32, n.generation))
            }
            _ => None,
        })
    }

    /// Whether `ancestor` contains `id`, directly or through nested groups.
    pub fn is_ancestor(&self, ancestor: ObjectId, id: ObjectId) -> bool {
        let mut current = self.owner_of(id);
        while let Some(owner) = current {
            if owner == ancestor {
                return true;
            }
            current = self.owner_of(owner);
        }
        false
    }

    /// Whether `group` contains `id`, as a direct member or (with `deep`) anywhere below.
    pub fn contains(&self, group: ObjectId, id: ObjectId, deep: bool) -> bool {
        if deep {
            self.is_ancestor(group, id)
        } else {
            self.owner_of(id) == Some(group)
        }
    }

    /// Transform from the object's local plane to the surface plane.
    ///
    /// Composes each owner's transform from the root down. Returns `None` for
    /// stale identifiers.
    pub fn world_transform(&self, id: ObjectId) -> Option<Affine> {
        let node = self.object(id)?;
        Some(self.parent_transform(node.owner) * node.geometry.own_transform())
    }

    /// Transform from an owner's local plane to the surface plane (identity for roots).
    pub(crate) fn parent_transform(&self, owner: Option<ObjectId>) -> Affine {
        let mut tf = Affine::IDENTITY;
        let mut current = owner;
        while let Some(id) = current {
            let node = self.node(id);
            tf = node.geometry.own_transform() * tf;
            current = node.owner;
        }
        tf
    }

    /// Center of the object on the surface.
    pub fn absolute_center(&self, id: ObjectId) -> Option<Point> {
        let node = self.object(id)?;
        Some(self.parent_transform(node.owner) * node.geometry.center)
    }

    /// Axis-aligned box of the object's transformed corners on the surface.
    pub fn absolute_bounds(&self, id: ObjectId) -> Option<Rect> {
        let node = self.object(id)?;
        Some(transform_rect_bbox(
            self.world_transform(id)?,
            node.geometry.local_bounds(),
        ))
    }

    /// Number of propagation branches aborted because a group reappeared on its own path.
    ///
    /// Containment cycles cannot be built through [`Scene::add`], so a non-zero
    /// value points at a caller passing an inconsistent path to
    /// [`Scene::perform_layout`].
    pub fn cycle_aborts(&self) -> u64 {
        self.cycle_aborts
    }

    // --- geometry setters ---

    /// Replace the geometry of an object and report the changed keys to its owner.
    ///
    /// Stale identifiers are ignored.
    pub fn set_geometry(&mut self, id: ObjectId, geometry: Geometry) {
        let Some(n) = self.object_mut(id) else {
            return;
        };
        let keys = diff_keys(&n.geometry, &geometry);
        if keys.is_empty() {
            return;
        }
        n.geometry = geometry;
        self.notify_modified(id, keys);
    }

    /// Move an object's center (in its owner's plane).
    pub fn set_center(&mut self, id: ObjectId, center: Point) {
        self.update_geometry(id, |g| g.center = center);
    }

    /// Move an object so its own anchor lands on `point` (in its owner's plane).
    pub fn set_position(&mut self, id: ObjectId, point: Point) {
        self.update_geometry(id, |g| g.set_position(point));
    }

    /// Update width and height.
    pub fn set_size(&mut self, id: ObjectId, size: Size) {
        self.update_geometry(id, |g| {
            g.width = size.width;
            g.height = size.height;
        });
    }

    /// Update both scale factors.
    pub fn set_scale(&mut self, id: ObjectId, scale_x: f64, scale_y: f64) {
        self.update_geometry(id, |g| {
            g.scale_x = scale_x;
            g.scale_y = scale_y;
        });
    }

    /// Update the rotation (degrees).
    pub fn set_angle(&mut self, id: ObjectId, angle: f64) {
        self.update_geometry(id, |g| g.angle = angle);
    }

    /// Update both skew angles (degrees).
    pub fn set_skew(&mut self, id: ObjectId, skew_x: f64, skew_y: f64) {
        self.update_geometry(id, |g| {
            g.skew_x = skew_x;
            g.skew_y = skew_y;
        });
    }

    /// Update the anchor. The center does not move.
    pub fn set_origin(&mut self, id: ObjectId, origin_x: OriginX, origin_y: OriginY) {
        self.update_geometry(id, |g| {
            g.origin_x = origin_x;
            g.origin_y = origin_y;
        });
    }

    fn update_geometry(&mut self, id: ObjectId, f: impl FnOnce(&mut Geometry)) {
        let Some(n) = self.object(id) else {
            return;
        };
        let mut next = n.geometry;
        f(&mut next);
        self.set_geometry(id, next);
    }

    /// Report that the geometry of `id` changed.
    ///
    /// This is the entry point for property-change notifiers: it runs a
    /// member-modified layout pass on the object's owner, which then
    /// propagates upward. Returns `None` when the object has no owner.
    pub fn notify_modified(&mut self, id: ObjectId, keys: ModifiedKeys) -> Option<LayoutPass> {
        let owner = self.owner_of(id)?;
        let trigger = LayoutTrigger::MemberModified(ModifiedEvent { target: id, keys });
        Some(self.run_layout(owner, trigger, None, &[]))
    }

    // --- observers ---

    /// Register an observer for layout passes of `target`, or of every group when `None`.
    pub fn observe(
        &mut self,
        target: Option<ObjectId>,
        observer: impl LayoutObserver + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer = self.next_observer.wrapping_add(1);
        self.observers.push(ObserverSlot {
            id,
            target,
            observer: Box::new(observer),
        });
        id
    }

    /// Remove an observer. Returns `false` if it was not registered.
    pub fn unobserve(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|slot| slot.id != id);
        self.observers.len() != before
    }

    pub(crate) fn drop_observers_of(&mut self, target: ObjectId) {
        self.observers.retain(|slot| slot.target != Some(target));
    }

    pub(crate) fn emit_before(&mut self, context: &LayoutContext) {
        let event = LayoutBeforeEvent { context };
        for slot in &mut self.observers {
            if slot.target.is_none_or(|t| t == context.target.id) {
                slot.observer.before_layout(&event);
            }
        }
    }

    pub(crate) fn emit_after(&mut self, context: &LayoutContext, layout: &LayoutResult) {
        let event = LayoutEvent { context, layout };
        for slot in &mut self.observers {
            if slot.target.is_none_or(|t| t == context.target.id) {
                slot.observer.after_layout(&event);
            }
        }
    }

    // --- internals ---

    pub(crate) fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects
            .get(id.idx())
            .and_then(|slot| slot.as_ref())
            .filter(|n| n.generation == id.1)
    }

    pub(crate) fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects
            .get_mut(id.idx())
            .and_then(|slot| slot.as_mut())
            .filter(|n| n.generation == id.1)
    }

    pub(crate) fn group(&self, id: ObjectId) -> Option<&GroupData> {
        self.object(id).and_then(|n| n.group.as_ref())
    }

    pub(crate) fn group_mut(&mut self, id: ObjectId) -> Option<&mut GroupData> {
        self.object_mut(id).and_then(|n| n.group.as_mut())
    }

    /// Access an object; panics if `id` is stale.
    pub(crate) fn node(&self, id: ObjectId) -> &Object {
        self.objects[id.idx()].as_ref().expect("dangling ObjectId")
    }

    /// Access an object mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: ObjectId) -> &mut Object {
        self.objects[id.idx()].as_mut().expect("dangling ObjectId")
    }

    /// Live object ids, in slot order.
    pub(crate) fn live_ids(&self) -> Vec<ObjectId> {
        self.objects
            .iter()
            .enumerate()
            .filter_map(|(i, n)| {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "ObjectId uses 32-bit indices by design."
                )]
                n.as_ref().map(|n| ObjectId::new(i as u32, n.generation))
            })
            .collect()
    }
}

impl Object {
    fn new(generation: u32, geometry: Geometry, group: Option<GroupData>) -> Self {
        Self {
            generation,
            geometry,
            owner: None,
            surface: None,
            group,
        }
    }
}

fn diff_keys(a: &Geometry, b: &Geometry) -> ModifiedKeys {
    let mut keys = ModifiedKeys::empty();
    keys.set(ModifiedKeys::CENTER, a.center != b.center);
    keys.set(ModifiedKeys::WIDTH, a.width != b.width);
    keys.set(ModifiedKeys::HEIGHT, a.height != b.height);
    keys.set(
        ModifiedKeys::SCALE,
        a.scale_x != b.scale_x || a.scale_y != b.scale_y,
    );
    keys.set(ModifiedKeys::ANGLE, a.angle != b.angle);
    keys.set(ModifiedKeys::SKEW, a.skew_x != b.skew_x || a.skew_y != b.skew_y);
    keys.set(
        ModifiedKeys::ORIGIN,
        a.origin_x != b.origin_x || a.origin_y != b.origin_y,
    );
    keys
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use core::cell::RefCell;

    use super::*;
    use crate::group::GroupOptions;
    use crate::util::approx_point;

    #[test]
    fn liveness_insert_free_reuse() {
        let mut scene = Scene::new();
        let a = scene.insert(Geometry::default());
        assert!(scene.is_alive(a));
        assert!(!scene.is_group(a));

        scene.destroy(a).unwrap();
        assert!(!scene.is_alive(a));
        assert_eq!(scene.geometry(a), None);

        let b = scene.insert(Geometry::default());
        assert!(scene.is_alive(b));
        assert!(!scene.is_alive(a));
        if a.0 == b.0 {
            assert!(b.1 > a.1, "generation must increase on reuse");
        }
    }

    #[test]
    fn world_transform_composes_owner_chain() {
        let mut scene = Scene::new();
        let leaf = scene.insert(Geometry::from_center_size((10.0, 0.0), (2.0, 2.0)));
        let inner = scene
            .create_group(&[leaf], GroupOptions::default())
            .unwrap();
        let outer = scene
            .create_group(&[inner], GroupOptions::default())
            .unwrap();
        scene.set_scale(outer, 2.0, 2.0);

        // Scaling the outer group about its center (10, 0) doubles the leaf's
        // distance from it, which is zero here.
        assert!(approx_point(
            scene.absolute_center(leaf).unwrap(),
            Point::new(10.0, 0.0)
        ));
        let bounds = scene.absolute_bounds(leaf).unwrap();
        assert!(
            (bounds.width() - 4.0) * (bounds.width() - 4.0) < 1e-12,
            "got {bounds:?}"
        );
        assert!(scene.is_ancestor(outer, leaf));
        assert!(scene.contains(outer, leaf, true));
        assert!(!scene.contains(outer, leaf, false));
        assert_eq!(scene.roots().collect::<Vec<_>>(), vec![outer]);
    }

    #[test]
    fn setters_report_changed_keys_to_owner() {
        struct Keys(Rc<RefCell<Vec<ModifiedKeys>>>);
        impl LayoutObserver for Keys {
            fn before_layout(&mut self, event: &LayoutBeforeEvent<'_>) {
                if let LayoutTrigger::MemberModified(m) = &event.context.trigger {
                    self.0.borrow_mut().push(m.keys);
                }
            }
        }

        let mut scene = Scene::new();
        let a = scene.insert(Geometry::from_center_size((0.0, 0.0), (10.0, 10.0)));
        let group = scene.create_group(&[a], GroupOptions::default()).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        scene.observe(Some(group), Keys(seen.clone()));

        scene.set_angle(a, 30.0);
        scene.set_angle(a, 30.0);
        scene.set_size(a, Size::new(10.0, 20.0));
        scene.set_origin(a, OriginX::Left, OriginY::Top);

        assert_eq!(
            *seen.borrow(),
            vec![ModifiedKeys::ANGLE, ModifiedKeys::HEIGHT, ModifiedKeys::ORIGIN]
        );
    }

    #[test]
    fn setters_ignore_stale_ids() {
        let mut scene = Scene::new();
        let a = scene.insert(Geometry::default());
        scene.destroy(a).unwrap();
        scene.set_center(a, Point::new(1.0, 1.0));
        assert_eq!(scene.notify_modified(a, ModifiedKeys::CENTER), None);
    }

    #[test]
    fn notify_without_owner_is_none() {
        let mut scene = Scene::new();
        let a = scene.insert(Geometry::default());
        assert_eq!(scene.notify_modified(a, ModifiedKeys::CENTER), None);
    }

    #[test]
    fn unobserve_stops_delivery() {
        struct Count(Rc<RefCell<usize>>);
        impl LayoutObserver for Count {
            fn after_layout(&mut self, _event: &LayoutEvent<'_>) {
                *self.0.borrow_mut() += 1;
            }
        }

        let mut scene = Scene::new();
        let a = scene.insert(Geometry::from_center_size((0.0, 0.0), (10.0, 10.0)));
        let group = scene.create_group(&[a], GroupOptions::default()).unwrap();
        let count = Rc::new(RefCell::new(0));
        let observer = scene.observe(None, Count(count.clone()));

        scene.set_center(a, Point::new(5.0, 5.0));
        assert_eq!(*count.borrow(), 1);

        assert!(scene.unobserve(observer));
        assert!(!scene.unobserve(observer));
        scene.set_center(a, Point::new(7.0, 7.0));
        assert_eq!(*count.borrow(), 1);
        assert!(scene.is_alive(group));
    }
}
