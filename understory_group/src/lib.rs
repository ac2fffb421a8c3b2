// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_group --heading-base-level=0

//! Understory Group: grouping and layout for transformable 2D objects.
//!
//! Understory Group is a building block for canvas and vector editors, whiteboards, and diagram tools.
//!
//! - Represents objects with a center, size, scale, rotation, skew, and anchor in their owner's plane.
//! - Lets groups contain objects (and other groups) and re-expresses geometry on entry and exit, so
//!   nothing moves on screen when it is grouped, ungrouped, or moved between groups.
//! - Recomputes a group's box through a pluggable [`LayoutStrategy`] whenever membership, a member,
//!   the strategy, or the bound surface changes, and keeps members visually stable while doing so.
//!
//! ## The layout protocol
//!
//! Every structural change runs a synchronous layout pass on the affected group. A pass asks the
//! strategy for a new center (in the group's local plane) and size, shifts the members by the
//! opposite amount so their on-surface positions do not change, adopts the new box, notifies
//! observers, and then runs a pass on the owner with the path extended. The path guards against
//! revisiting a group, so propagation always terminates.
//!
//! Passes are triggered explicitly: structural calls on [`Scene`] run them, and property changes
//! go through [`Scene::notify_modified`] (the geometry setters call it for you).
//!
//! ## API overview
//!
//! - [`Scene`]: owns objects, groups, surfaces, and observers.
//! - [`Geometry`]: per-object transform data; see [`Geometry::own_transform`].
//! - [`GroupOptions`]: strategy, initial geometry, and coordinate convention of a new group.
//! - [`LayoutStrategy`]: the policy seam, with [`FitContentLayout`], [`FixedLayout`], and
//!   [`ClipPathLayout`] provided.
//! - [`LayoutTrigger`] and [`LayoutContext`]: why a pass runs and what it knows.
//! - [`LayoutObserver`]: before/after notifications, registered with [`Scene::observe`].
//!
//! Key operations:
//! - [`Scene::insert`] → [`ObjectId`], [`Scene::create_group`] → [`ObjectId`]
//! - [`Scene::add`] / [`Scene::insert_at`] / [`Scene::remove`]
//! - [`Scene::set_layout_strategy`] / [`Scene::trigger_layout`] / [`Scene::perform_layout`]
//! - [`Scene::create_surface`] / [`Scene::attach`] / [`Scene::resize_surface`]
//! - [`Scene::dispose`] / [`Scene::destroy`]
//!
//! Containment cycles are rejected by [`Scene::add`] with [`SceneError::WouldCycle`].
//!
//! This crate is `no_std` and uses `alloc`. Logging goes through `tracing`; no subscriber is installed.

#![no_std]

extern crate alloc;

mod context;
mod error;
mod group;
mod scene;
mod strategy;
mod surface;
mod types;
mod util;

pub use context::{
    LayoutBeforeEvent, LayoutContext, LayoutEvent, LayoutObserver, LayoutPass, LayoutResult,
    LayoutTarget, LayoutTrigger, ModifiedEvent, ObjectList, TriggerKind,
};
pub use error::SceneError;
pub use group::{GroupOptions, ImperativeLayout};
pub use scene::Scene;
pub use strategy::{
    ClipPathLayout, FitContentLayout, FixedLayout, LayoutStrategy, LayoutStrategyResult, Member,
    members_bounding_box,
};
pub use types::{
    Geometry, ModifiedKeys, ObjectId, ObserverId, OriginX, OriginY, SurfaceId, resolve_origin,
};
