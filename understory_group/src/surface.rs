// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rendering surfaces and the bindings of root objects to them.
//!
//! A surface is a size plus the root groups that react to its resizes. Nested
//! objects inherit their owner's surface and never subscribe themselves.

use alloc::vec::Vec;
use kurbo::Size;
use smallvec::SmallVec;
use tracing::trace;

use crate::context::{INLINE, LayoutPass, LayoutTrigger};
use crate::error::SceneError;
use crate::scene::Scene;
use crate::types::{ObjectId, SurfaceId};

#[derive(Debug)]
pub(crate) struct Surface {
    pub(crate) size: Size,
    /// root groups bound to this surface, in attach order
    pub(crate) subscribers: SmallVec<[ObjectId; INLINE]>,
}

impl Scene {
    /// Create a rendering surface of the given size.
    pub fn create_surface(&mut self, size: Size) -> SurfaceId {
        let id = SurfaceId(self.next_surface);
        self.next_surface = self.next_surface.wrapping_add(1);
        self.surfaces.insert(
            id,
            Surface {
                size,
                subscribers: SmallVec::new(),
            },
        );
        id
    }

    /// Current size of a surface.
    pub fn surface_size(&self, surface: SurfaceId) -> Option<Size> {
        self.surfaces.get(&surface).map(|s| s.size)
    }

    /// Change a surface's size and run a resize pass on every root group bound to it.
    pub fn resize_surface(&mut self, surface: SurfaceId, size: Size) -> Result<(), SceneError> {
        let entry = self
            .surfaces
            .get_mut(&surface)
            .ok_or(SceneError::UnknownSurface(surface))?;
        let previous = core::mem::replace(&mut entry.size, size);
        if previous == size {
            return Ok(());
        }
        let subscribers = entry.subscribers.clone();
        trace!(surface = ?surface, ?previous, current = ?size, groups = subscribers.len(), "surface resized");
        for group in subscribers {
            // A subscriber may have been nested or destroyed by an earlier pass.
            if self.owner_of(group).is_some()
                || self.group(group).and_then(|g| g.subscription) != Some(surface)
            {
                continue;
            }
            self.run_layout(
                group,
                LayoutTrigger::SurfaceResized {
                    previous,
                    current: size,
                },
                None,
                &[],
            );
        }
        Ok(())
    }

    /// Bind a root object (and its subtree) to a surface.
    ///
    /// Any previous binding is dropped first. For a group this subscribes it
    /// to resizes and runs a `SurfaceAttached` pass, which is returned.
    pub fn attach(
        &mut self,
        id: ObjectId,
        surface: SurfaceId,
    ) -> Result<Option<LayoutPass>, SceneError> {
        if !self.is_alive(id) {
            return Err(SceneError::StaleObject(id));
        }
        let size = self
            .surface_size(surface)
            .ok_or(SceneError::UnknownSurface(surface))?;
        if self.owner_of(id).is_some() {
            return Err(SceneError::Nested(id));
        }
        self.unsubscribe(id);
        self.set_subtree_surface(id, Some(surface));
        trace!(object = ?id, surface = ?surface, "attach");
        if !self.is_group(id) {
            return Ok(None);
        }
        self.subscribe(id, surface);
        Ok(Some(self.run_layout(
            id,
            LayoutTrigger::SurfaceAttached { size },
            None,
            &[],
        )))
    }

    /// Unbind a root object (and its subtree) from its surface.
    pub fn detach(&mut self, id: ObjectId) -> Result<(), SceneError> {
        if !self.is_alive(id) {
            return Err(SceneError::StaleObject(id));
        }
        if self.owner_of(id).is_some() {
            return Err(SceneError::Nested(id));
        }
        self.unsubscribe(id);
        self.set_subtree_surface(id, None);
        trace!(object = ?id, "detach");
        Ok(())
    }

    /// Delete a surface. Every object bound to it becomes unbound.
    pub fn remove_surface(&mut self, surface: SurfaceId) -> Result<(), SceneError> {
        let removed = self
            .surfaces
            .remove(&surface)
            .ok_or(SceneError::UnknownSurface(surface))?;
        for id in self.live_ids() {
            let Some(node) = self.object_mut(id) else {
                continue;
            };
            if node.surface == Some(surface) {
                node.surface = None;
            }
            if let Some(data) = node.group.as_mut()
                && data.subscription == Some(surface)
            {
                data.subscription = None;
            }
        }
        trace!(surface = ?surface, subscribers = removed.subscribers.len(), "surface removed");
        Ok(())
    }

    /// Root groups currently subscribed to a surface's resizes.
    pub fn subscribers(&self, surface: SurfaceId) -> &[ObjectId] {
        self.surfaces
            .get(&surface)
            .map_or(&[][..], |s| s.subscribers.as_slice())
    }

    pub(crate) fn subscribe(&mut self, group: ObjectId, surface: SurfaceId) {
        let Some(entry) = self.surfaces.get_mut(&surface) else {
            return;
        };
        if !entry.subscribers.contains(&group) {
            entry.subscribers.push(group);
        }
        if let Some(data) = self.group_mut(group) {
            data.subscription = Some(surface);
        }
    }

    /// Drop the resize subscription of `id`, if it has one.
    pub(crate) fn unsubscribe(&mut self, id: ObjectId) {
        let Some(surface) = self.group_mut(id).and_then(|g| g.subscription.take()) else {
            return;
        };
        if let Some(entry) = self.surfaces.get_mut(&surface) {
            entry.subscribers.retain(|g| *g != id);
        }
    }

    /// Set the surface of `id` and everything below it.
    pub(crate) fn set_subtree_surface(&mut self, id: ObjectId, surface: Option<SurfaceId>) {
        let mut stack: Vec<ObjectId> = Vec::new();
        stack.push(id);
        while let Some(current) = stack.pop() {
            let node = self.node_mut(current);
            node.surface = surface;
            if let Some(data) = node.group.as_ref() {
                stack.extend(data.members.iter().copied());
            }
        }
    }
}
