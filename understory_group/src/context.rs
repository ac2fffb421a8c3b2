// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout triggers, per-pass context, results, and the observer contract.

use alloc::rc::Rc;
use kurbo::{Affine, Point, Size, Vec2};
use smallvec::SmallVec;

use crate::strategy::{LayoutStrategy, LayoutStrategyResult};
use crate::types::{Geometry, ModifiedKeys, ObjectId};

/// Inline capacity for target lists and propagation paths.
pub(crate) const INLINE: usize = 4;

/// A short list of object ids, stored inline when small.
pub type ObjectList = SmallVec<[ObjectId; INLINE]>;

/// A geometry change reported for one object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModifiedEvent {
    /// The object whose geometry changed.
    pub target: ObjectId,
    /// Which geometry keys changed. Empty when a nested group ran a pass that
    /// left its own geometry untouched.
    pub keys: ModifiedKeys,
}

/// Why a layout pass runs.
#[derive(Clone, Debug, PartialEq)]
pub enum LayoutTrigger {
    /// The group is being constructed.
    Initialization {
        /// Whether the members were supplied in group-relative coordinates.
        objects_relative_to_group: bool,
    },
    /// Objects entered the group.
    Added {
        /// The objects that entered, in insertion order.
        targets: ObjectList,
    },
    /// Objects left the group.
    Removed {
        /// The objects that left.
        targets: ObjectList,
    },
    /// A member's geometry changed, or a nested group finished its own pass.
    MemberModified(ModifiedEvent),
    /// Layout was requested explicitly.
    Imperative {
        /// When set, used as the pass result instead of asking the strategy.
        overrides: Option<LayoutStrategyResult>,
    },
    /// The group became bound to a surface.
    SurfaceAttached {
        /// Size of the surface at attach time.
        size: Size,
    },
    /// The surface the group is bound to changed size.
    SurfaceResized {
        /// Size before the resize.
        previous: Size,
        /// Size after the resize.
        current: Size,
    },
}

/// The kind of a [`LayoutTrigger`], without its payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TriggerKind {
    /// See [`LayoutTrigger::Initialization`].
    Initialization,
    /// See [`LayoutTrigger::Added`].
    Added,
    /// See [`LayoutTrigger::Removed`].
    Removed,
    /// See [`LayoutTrigger::MemberModified`].
    MemberModified,
    /// See [`LayoutTrigger::Imperative`].
    Imperative,
    /// See [`LayoutTrigger::SurfaceAttached`].
    SurfaceAttached,
    /// See [`LayoutTrigger::SurfaceResized`].
    SurfaceResized,
}

impl LayoutTrigger {
    /// The payload-free kind of this trigger.
    pub fn kind(&self) -> TriggerKind {
        match self {
            Self::Initialization { .. } => TriggerKind::Initialization,
            Self::Added { .. } => TriggerKind::Added,
            Self::Removed { .. } => TriggerKind::Removed,
            Self::MemberModified(_) => TriggerKind::MemberModified,
            Self::Imperative { .. } => TriggerKind::Imperative,
            Self::SurfaceAttached { .. } => TriggerKind::SurfaceAttached,
            Self::SurfaceResized { .. } => TriggerKind::SurfaceResized,
        }
    }

    /// Whether this trigger comes from the bound surface.
    pub fn is_surface(&self) -> bool {
        matches!(
            self,
            Self::SurfaceAttached { .. } | Self::SurfaceResized { .. }
        )
    }
}

/// Snapshot of the group a pass runs on, taken before the pass changes anything.
#[derive(Clone, Debug)]
pub struct LayoutTarget {
    /// The group.
    pub id: ObjectId,
    /// The group's geometry in its owner plane.
    pub geometry: Geometry,
    /// Transform from the group's local plane to the surface plane.
    pub world_transform: Affine,
    /// The group's owner, if nested.
    pub owner: Option<ObjectId>,
    /// Size of the surface the group is bound to, if any.
    pub surface: Option<Size>,
}

impl LayoutTarget {
    /// Whether the group is a root bound to a surface.
    pub fn is_surface_root(&self) -> bool {
        self.owner.is_none() && self.surface.is_some()
    }
}

/// Everything a strategy and the observers know about one pass.
#[derive(Clone, Debug)]
pub struct LayoutContext {
    /// The group being laid out.
    pub target: LayoutTarget,
    /// Why the pass runs.
    pub trigger: LayoutTrigger,
    /// The strategy used for this pass.
    pub strategy: Rc<dyn LayoutStrategy>,
    /// The strategy used on the group's previous pass, if any.
    pub prev_strategy: Option<Rc<dyn LayoutStrategy>>,
    /// Whether `strategy` differs from `prev_strategy`.
    pub strategy_change: bool,
    /// Groups visited by the current propagation, ending with the target.
    pub path: ObjectList,
}

impl LayoutContext {
    /// Depth of this pass within the current propagation (`0` for the group
    /// that received the original trigger).
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

/// What a pass changed, in surface coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutResult {
    /// The applied strategy result.
    pub result: LayoutStrategyResult,
    /// Center of the group before the pass.
    pub prev_center: Point,
    /// Center of the group after the pass.
    pub next_center: Point,
    /// `next_center - prev_center`.
    pub offset: Vec2,
}

/// Outcome of running the layout protocol on one group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LayoutPass {
    /// The group adopted a new result.
    Applied(LayoutResult),
    /// The strategy produced no result; geometry is untouched.
    Unchanged,
    /// The group was already on the propagation path; nothing ran.
    CycleDetected,
}

impl LayoutPass {
    /// The applied result, if any.
    pub fn applied(&self) -> Option<&LayoutResult> {
        match self {
            Self::Applied(r) => Some(r),
            _ => None,
        }
    }
}

/// Payload of the notification emitted before a strategy runs.
#[derive(Clone, Copy, Debug)]
pub struct LayoutBeforeEvent<'a> {
    /// The resolved context.
    pub context: &'a LayoutContext,
}

/// Payload of the notification emitted after a result is applied.
#[derive(Clone, Copy, Debug)]
pub struct LayoutEvent<'a> {
    /// The resolved context.
    pub context: &'a LayoutContext,
    /// What changed.
    pub layout: &'a LayoutResult,
}

/// Receives layout notifications inline, during the pass.
///
/// Observers see immutable data and cannot influence the pass.
pub trait LayoutObserver {
    /// Called after the context is resolved and before the strategy runs.
    fn before_layout(&mut self, event: &LayoutBeforeEvent<'_>) {
        let _ = event;
    }

    /// Called after the group and its members have been updated.
    fn after_layout(&mut self, event: &LayoutEvent<'_>) {
        let _ = event;
    }
}
