// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Groups: membership changes and the layout protocol.
//!
//! A layout pass runs in a fixed order:
//!
//! 1. Resolve a [`LayoutContext`] and guard against revisiting a group on the
//!    current propagation path.
//! 2. Notify observers ([`LayoutObserver::before_layout`](crate::LayoutObserver::before_layout)).
//! 3. Ask the strategy (or take imperative overrides).
//! 4. Measure the previous and next centers in surface coordinates.
//! 5. Shift members so none of them moves on the surface, then adopt the new
//!    center and size.
//! 6. Notify observers ([`LayoutObserver::after_layout`](crate::LayoutObserver::after_layout)).
//! 7. Run a member-modified pass on the owner, if any, with the extended path.
//!
//! Members are fully corrected before the owner's pass begins, so an owner's
//! strategy always sees consistent descendants.

use alloc::{rc::Rc, vec::Vec};
use kurbo::{Point, Vec2};
use tracing::{debug, trace, warn};

use crate::context::{
    LayoutContext, LayoutPass, LayoutResult, LayoutTarget, LayoutTrigger, ModifiedEvent,
    ObjectList, TriggerKind,
};
use crate::error::SceneError;
use crate::scene::{GroupData, Scene};
use crate::strategy::{FitContentLayout, LayoutStrategy, LayoutStrategyResult, Member};
use crate::types::{Geometry, ModifiedKeys, ObjectId};
use crate::util::{apply_transform, is_invertible, is_translation, transform_vector};

/// Options for [`Scene::create_group`].
#[derive(Clone, Debug)]
pub struct GroupOptions {
    /// Initial geometry of the group itself.
    ///
    /// With the default strategy only the transform part matters for fresh
    /// groups: center and size are recomputed from the members.
    pub geometry: Geometry,
    /// Layout policy.
    pub strategy: Rc<dyn LayoutStrategy>,
    /// When `true`, members are taken to already be in the group's local
    /// plane (as when rebuilding a group from a serialized form); otherwise
    /// they are in surface coordinates and get re-expressed on entry.
    pub objects_relative_to_group: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            geometry: Geometry::default(),
            strategy: Rc::new(FitContentLayout),
            objects_relative_to_group: false,
        }
    }
}

impl GroupOptions {
    /// Default options with a different strategy.
    pub fn with_strategy(strategy: impl LayoutStrategy + 'static) -> Self {
        Self {
            strategy: Rc::new(strategy),
            ..Self::default()
        }
    }
}

/// An explicit layout request for [`Scene::trigger_layout`].
#[derive(Clone, Debug, Default)]
pub struct ImperativeLayout {
    /// Strategy to use for this pass only.
    pub strategy: Option<Rc<dyn LayoutStrategy>>,
    /// Result to apply instead of asking a strategy.
    pub overrides: Option<LayoutStrategyResult>,
}

impl Scene {
    /// Create a group around `members` and run its initialization pass.
    ///
    /// The member list is copied; duplicates are ignored. Members that belong
    /// to another group leave it first.
    pub fn create_group(
        &mut self,
        members: &[ObjectId],
        options: GroupOptions,
    ) -> Result<ObjectId, SceneError> {
        let targets = self.collect_targets(None, members)?;
        let relative = options.objects_relative_to_group;
        if !relative && !targets.is_empty() && !is_invertible(options.geometry.own_transform()) {
            return Err(SceneError::SingularTransform(None));
        }
        // Every target leaves its old owner before the new group links any of
        // them, so those removal passes cannot reach the new group.
        for &member in &targets {
            if let Some(owner) = self.owner_of(member) {
                self.remove(owner, &[member])?;
            }
        }
        let id = self.alloc(
            options.geometry,
            Some(GroupData::new(options.strategy, relative)),
        );
        for &member in &targets {
            if relative {
                self.link(id, member);
            } else {
                self.enter(id, member);
            }
            if let Some(data) = self.group_mut(id) {
                data.members.push(member);
            }
        }
        debug!(group = ?id, members = targets.len(), relative, "group created");
        self.run_layout(
            id,
            LayoutTrigger::Initialization {
                objects_relative_to_group: relative,
            },
            None,
            &[],
        );
        Ok(id)
    }

    /// Append objects to a group, on top of the existing members.
    pub fn add(&mut self, group: ObjectId, objects: &[ObjectId]) -> Result<(), SceneError> {
        self.insert_at(group, usize::MAX, objects)
    }

    /// Insert objects into a group at a paint-order position.
    ///
    /// Objects owned by another group leave it first (with a removal pass on
    /// that group). Every object keeps its place on the surface: its geometry
    /// is re-expressed in this group's local plane, including the group's
    /// scale, rotation, and skew. Objects that are already members move to
    /// the new position. One `Added` pass runs afterwards.
    pub fn insert_at(
        &mut self,
        group: ObjectId,
        index: usize,
        objects: &[ObjectId],
    ) -> Result<(), SceneError> {
        let targets = self.collect_targets(Some(group), objects)?;
        if targets.is_empty() {
            return Ok(());
        }
        if targets.iter().any(|&id| self.owner_of(id) != Some(group))
            && !is_invertible(self.parent_transform(Some(group)))
        {
            return Err(SceneError::SingularTransform(Some(group)));
        }
        // Foreign owners may sit inside `group`; their removal passes reach
        // `group` and must still see the members being reordered.
        for &id in &targets {
            if let Some(owner) = self.owner_of(id)
                && owner != group
            {
                self.remove(owner, &[id])?;
            }
        }
        for &id in &targets {
            if self.owner_of(id) == Some(group) {
                self.unlink_member(group, id);
            }
        }
        let mut at = index.min(self.members(group).len());
        for &id in &targets {
            if self.owner_of(id) != Some(group) {
                self.enter(group, id);
            }
            if let Some(data) = self.group_mut(group) {
                data.members.insert(at, id);
            }
            at += 1;
        }
        self.run_layout(group, LayoutTrigger::Added { targets }, None, &[]);
        Ok(())
    }

    /// Remove objects from a group and return the ones that were members.
    ///
    /// Removed objects keep their place on the surface and become roots
    /// without a surface. Objects that are not members are ignored. One
    /// `Removed` pass runs if anything was removed.
    pub fn remove(
        &mut self,
        group: ObjectId,
        objects: &[ObjectId],
    ) -> Result<ObjectList, SceneError> {
        self.require_group(group)?;
        let mut removed = ObjectList::new();
        for &id in objects {
            if self.owner_of(id) != Some(group) || removed.contains(&id) {
                continue;
            }
            self.exit(id);
            self.unlink_member(group, id);
            removed.push(id);
        }
        if !removed.is_empty() {
            self.run_layout(
                group,
                LayoutTrigger::Removed {
                    targets: removed.clone(),
                },
                None,
                &[],
            );
        }
        Ok(removed)
    }

    /// Replace a group's strategy and run one pass that reports the change.
    pub fn set_layout_strategy(
        &mut self,
        group: ObjectId,
        strategy: Rc<dyn LayoutStrategy>,
    ) -> Result<LayoutPass, SceneError> {
        self.require_group(group)?;
        if let Some(data) = self.group_mut(group) {
            data.strategy = strategy;
        }
        Ok(self.run_layout(
            group,
            LayoutTrigger::Imperative { overrides: None },
            None,
            &[],
        ))
    }

    /// Run an imperative pass, optionally with a one-off strategy or a fixed result.
    pub fn trigger_layout(
        &mut self,
        group: ObjectId,
        request: ImperativeLayout,
    ) -> Result<LayoutPass, SceneError> {
        self.require_group(group)?;
        Ok(self.run_layout(
            group,
            LayoutTrigger::Imperative {
                overrides: request.overrides,
            },
            request.strategy,
            &[],
        ))
    }

    /// Run the layout protocol on `group` with an explicit trigger and path.
    ///
    /// `path` lists groups already visited by the caller's propagation. If
    /// `group` is on it, nothing runs and [`LayoutPass::CycleDetected`] is
    /// returned. The returned pass is the one that ran on `group`; passes on
    /// its owners follow before this returns.
    pub fn perform_layout(
        &mut self,
        group: ObjectId,
        trigger: LayoutTrigger,
        path: &[ObjectId],
    ) -> Result<LayoutPass, SceneError> {
        self.require_group(group)?;
        Ok(self.run_layout(group, trigger, None, path))
    }

    /// Detach a group from its surface and release its members.
    ///
    /// Members keep their place on the surface and become roots; they are not
    /// destroyed. The group stays alive and empty. Calling this twice is a
    /// no-op the second time.
    pub fn dispose(&mut self, group: ObjectId) -> Result<(), SceneError> {
        self.require_group(group)?;
        self.unsubscribe(group);
        if self.owner_of(group).is_none() {
            self.node_mut(group).surface = None;
        }
        let members = self
            .group(group)
            .map(|g| g.members.clone())
            .unwrap_or_default();
        for &member in &members {
            self.exit(member);
        }
        if let Some(data) = self.group_mut(group) {
            data.members.clear();
        }
        if !members.is_empty() {
            debug!(group = ?group, released = members.len(), "group disposed");
        }
        Ok(())
    }

    /// Destroy an object.
    ///
    /// The object leaves its owner (with a removal pass there). A group is
    /// disposed first, so its members survive as roots. The handle becomes
    /// stale.
    pub fn destroy(&mut self, id: ObjectId) -> Result<(), SceneError> {
        if !self.is_alive(id) {
            return Err(SceneError::StaleObject(id));
        }
        if let Some(owner) = self.owner_of(id) {
            self.remove(owner, &[id])?;
        }
        if self.is_group(id) {
            self.dispose(id)?;
        }
        self.drop_observers_of(id);
        self.free(id);
        Ok(())
    }

    // --- internals ---

    fn group_error(&self, id: ObjectId) -> SceneError {
        if self.is_alive(id) {
            SceneError::NotAGroup(id)
        } else {
            SceneError::StaleObject(id)
        }
    }

    pub(crate) fn require_group(&self, id: ObjectId) -> Result<(), SceneError> {
        if self.is_group(id) {
            Ok(())
        } else {
            Err(self.group_error(id))
        }
    }

    /// Validate and copy caller-supplied ids, dropping duplicates.
    fn collect_targets(
        &self,
        group: Option<ObjectId>,
        objects: &[ObjectId],
    ) -> Result<ObjectList, SceneError> {
        if let Some(group) = group {
            self.require_group(group)?;
        }
        let mut targets = ObjectList::new();
        for &id in objects {
            if !self.is_alive(id) {
                return Err(SceneError::StaleObject(id));
            }
            if let Some(group) = group
                && (id == group || self.is_ancestor(id, group))
            {
                return Err(SceneError::WouldCycle { group, member: id });
            }
            if !targets.contains(&id) {
                targets.push(id);
            }
        }
        Ok(targets)
    }

    fn unlink_member(&mut self, group: ObjectId, id: ObjectId) {
        if let Some(data) = self.group_mut(group) {
            data.members.retain(|m| *m != id);
        }
    }

    /// Make `group` the owner of a free object without touching its geometry.
    fn link(&mut self, group: ObjectId, id: ObjectId) {
        self.unsubscribe(id);
        let surface = self.node(group).surface;
        self.node_mut(id).owner = Some(group);
        self.set_subtree_surface(id, surface);
    }

    /// Re-express a free object in `group`'s local plane and link it.
    fn enter(&mut self, group: ObjectId, id: ObjectId) {
        let to_local = self.parent_transform(Some(group)).inverse();
        let node = self.node_mut(id);
        if is_translation(to_local) {
            node.geometry.center = to_local * node.geometry.center;
        } else {
            let own = node.geometry.own_transform();
            apply_transform(&mut node.geometry, to_local * own);
        }
        trace!(object = ?id, group = ?group, center = ?node.geometry.center, "enter group");
        self.link(group, id);
    }

    /// Re-express an object in surface coordinates and clear its owner and surface.
    pub(crate) fn exit(&mut self, id: ObjectId) {
        let Some(owner) = self.owner_of(id) else {
            return;
        };
        let to_surface = self.parent_transform(Some(owner));
        let node = self.node_mut(id);
        if is_translation(to_surface) {
            node.geometry.center = to_surface * node.geometry.center;
        } else {
            let own = node.geometry.own_transform();
            apply_transform(&mut node.geometry, to_surface * own);
        }
        node.owner = None;
        trace!(object = ?id, group = ?owner, center = ?node.geometry.center, "exit group");
        self.set_subtree_surface(id, None);
    }

    /// Run a pass on `group` and propagate it to every owner above.
    pub(crate) fn run_layout(
        &mut self,
        group: ObjectId,
        trigger: LayoutTrigger,
        strategy: Option<Rc<dyn LayoutStrategy>>,
        path: &[ObjectId],
    ) -> LayoutPass {
        let mut path: ObjectList = path.iter().copied().collect();
        let first = self.layout_once(group, trigger, strategy, &mut path);
        let mut pass = first;
        let mut current = group;
        while pass != LayoutPass::CycleDetected {
            let Some(owner) = self.owner_of(current) else {
                break;
            };
            let keys = if pass.applied().is_some() {
                ModifiedKeys::CENTER | ModifiedKeys::SIZE
            } else {
                ModifiedKeys::empty()
            };
            let trigger = LayoutTrigger::MemberModified(ModifiedEvent {
                target: current,
                keys,
            });
            pass = self.layout_once(owner, trigger, None, &mut path);
            current = owner;
        }
        first
    }

    fn layout_once(
        &mut self,
        group: ObjectId,
        trigger: LayoutTrigger,
        strategy: Option<Rc<dyn LayoutStrategy>>,
        path: &mut ObjectList,
    ) -> LayoutPass {
        if path.contains(&group) {
            self.cycle_aborts += 1;
            warn!(group = ?group, path = ?path, "group is already on the layout path; propagation aborted");
            return LayoutPass::CycleDetected;
        }
        path.push(group);
        let context = self.layout_context(group, trigger, strategy, path);
        debug!(
            group = ?group,
            trigger = ?context.trigger.kind(),
            strategy = context.strategy.name(),
            strategy_change = context.strategy_change,
            depth = context.depth(),
            "layout pass"
        );
        self.emit_before(&context);

        let computed = match &context.trigger {
            LayoutTrigger::Imperative {
                overrides: Some(overrides),
            } => Some(*overrides),
            _ => {
                let members = self.member_snapshot(group);
                context.strategy.compute_layout(&members, &context)
            }
        };
        if let Some(data) = self.group_mut(group) {
            data.last_strategy = Some(context.strategy.clone());
        }
        let result = match computed {
            Some(result) => result,
            None if context.trigger.kind() == TriggerKind::Initialization => {
                LayoutStrategyResult::unchanged(&context.target.geometry)
            }
            None => {
                trace!(group = ?group, "strategy kept the current geometry");
                return LayoutPass::Unchanged;
            }
        };
        if result.width < 0.0 || result.height < 0.0 {
            warn!(
                group = ?group,
                strategy = context.strategy.name(),
                width = result.width,
                height = result.height,
                "strategy produced negative extents"
            );
        }

        let layout = self.apply_layout(&context, result);
        self.emit_after(&context, &layout);
        LayoutPass::Applied(layout)
    }

    fn layout_context(
        &self,
        group: ObjectId,
        trigger: LayoutTrigger,
        strategy: Option<Rc<dyn LayoutStrategy>>,
        path: &ObjectList,
    ) -> LayoutContext {
        let node = self.node(group);
        let data = node.group.as_ref().expect("layout runs on groups");
        let strategy = strategy.unwrap_or_else(|| data.strategy.clone());
        let prev_strategy = data.last_strategy.clone();
        let strategy_change = prev_strategy
            .as_ref()
            .is_some_and(|prev| !Rc::ptr_eq(prev, &strategy));
        LayoutContext {
            target: LayoutTarget {
                id: group,
                geometry: node.geometry,
                world_transform: self.parent_transform(node.owner)
                    * node.geometry.own_transform(),
                owner: node.owner,
                surface: node
                    .surface
                    .and_then(|s| self.surfaces.get(&s))
                    .map(|s| s.size),
            },
            trigger,
            strategy,
            prev_strategy,
            strategy_change,
            path: path.clone(),
        }
    }

    fn member_snapshot(&self, group: ObjectId) -> Vec<Member> {
        self.members(group)
            .iter()
            .map(|&id| Member {
                id,
                geometry: self.node(id).geometry,
            })
            .collect()
    }

    /// Steps 4 and 5: measure, correct members, adopt the result.
    fn apply_layout(&mut self, context: &LayoutContext, result: LayoutStrategyResult) -> LayoutResult {
        let target = &context.target;
        let world = target.world_transform;
        let prev_center = world * Point::ZERO;
        let next_center = world * result.center;

        // Moving the local origin to `result.center` would drag every member
        // along; shifting them back by the same amount cancels that.
        let mut shift = -result.center.to_vec2();
        if let Some(correction) = result.correction {
            shift -= correction;
        }
        if let Some(correction) = result.relative_correction {
            shift -= transform_vector(world.inverse(), correction);
        }
        if shift != Vec2::ZERO {
            let members = self.members(target.id).to_vec();
            for id in members {
                self.node_mut(id).geometry.center += shift;
            }
        }

        let own = target.geometry.own_transform();
        let node = self.node_mut(target.id);
        node.geometry.center = own * result.center;
        node.geometry.width = result.width;
        node.geometry.height = result.height;

        LayoutResult {
            result,
            prev_center,
            next_center,
            offset: next_center - prev_center,
        }
    }
}
