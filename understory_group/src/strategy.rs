// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layout strategies: policies that compute a group's bounding geometry.
//!
//! A strategy sees the group's members (with their geometry in the group's
//! local plane) and the [`LayoutContext`] of the pass, and answers with a
//! [`LayoutStrategyResult`], or `None` when the group should keep its current
//! geometry. The group applies the result and takes care of keeping every
//! member visually in place.

use core::fmt::Debug;

use kurbo::{Point, Rect, Vec2};

use crate::context::{LayoutContext, LayoutTrigger};
use crate::types::{Geometry, ObjectId};
use crate::util::transform_rect_bbox;

/// New geometry for a group, as computed by a [`LayoutStrategy`].
///
/// `center` is measured in the group's local plane as it was before the pass,
/// so a result centered on [`Point::ZERO`] keeps the group where it is.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayoutStrategyResult {
    /// New center, in the group's pre-pass local plane.
    pub center: Point,
    /// New width.
    pub width: f64,
    /// New height.
    pub height: f64,
    /// Extra translation applied to members on top of the frame compensation,
    /// in the group's local plane. Members move by its negation.
    pub correction: Option<Vec2>,
    /// Extra translation applied to members, measured in the surface plane.
    /// Members move by its negation.
    pub relative_correction: Option<Vec2>,
}

impl LayoutStrategyResult {
    /// A result adopting `rect` (in the group's local plane) as the new box.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            center: rect.center(),
            width: rect.width(),
            height: rect.height(),
            correction: None,
            relative_correction: None,
        }
    }

    /// A result that keeps the group exactly as it is.
    pub fn unchanged(geometry: &Geometry) -> Self {
        Self {
            center: Point::ZERO,
            width: geometry.width,
            height: geometry.height,
            correction: None,
            relative_correction: None,
        }
    }

    /// Set the local correction.
    #[must_use]
    pub fn with_correction(mut self, correction: Vec2) -> Self {
        self.correction = Some(correction);
        self
    }

    /// Set the surface-relative correction.
    #[must_use]
    pub fn with_relative_correction(mut self, correction: Vec2) -> Self {
        self.relative_correction = Some(correction);
        self
    }
}

/// A member as seen by a strategy.
#[derive(Clone, Copy, Debug)]
pub struct Member {
    /// The member.
    pub id: ObjectId,
    /// Geometry in the group's local plane.
    pub geometry: Geometry,
}

impl Member {
    /// Axis-aligned box of the member's transformed corners, in the group's local plane.
    pub fn bounding_box(&self) -> Rect {
        self.geometry.bounding_box()
    }
}

/// The box enclosing every member, or `None` for an empty slice.
pub fn members_bounding_box(members: &[Member]) -> Option<Rect> {
    let mut it = members.iter().map(Member::bounding_box);
    let first = it.next()?;
    Some(it.fold(first, |acc, r| acc.union(r)))
}

/// A layout policy.
///
/// Implementations must be deterministic for a given input and should never
/// produce negative extents; the group applies whatever is returned.
/// Strategies are shared through `Rc` handles, and a group detects a policy
/// change by handle identity, so assigning a fresh handle of the same type
/// still counts as a change.
pub trait LayoutStrategy: Debug {
    /// Short name used in logs.
    fn name(&self) -> &'static str {
        core::any::type_name::<Self>()
    }

    /// Compute the group's new geometry, or `None` to keep it.
    fn compute_layout(
        &self,
        members: &[Member],
        context: &LayoutContext,
    ) -> Option<LayoutStrategyResult>;
}

/// Shrink-wraps the group around its members.
#[derive(Clone, Copy, Debug, Default)]
pub struct FitContentLayout;

impl LayoutStrategy for FitContentLayout {
    fn name(&self) -> &'static str {
        "fit-content"
    }

    fn compute_layout(
        &self,
        members: &[Member],
        context: &LayoutContext,
    ) -> Option<LayoutStrategyResult> {
        let bbox = members_bounding_box(members);
        match &context.trigger {
            LayoutTrigger::Initialization {
                objects_relative_to_group: true,
            } => {
                // Deserialized members already sit at their final offsets.
                let own = &context.target.geometry;
                let extent = bbox.unwrap_or(Rect::ZERO);
                let width = if own.width > 0.0 { own.width } else { extent.width() };
                let height = if own.height > 0.0 { own.height } else { extent.height() };
                Some(LayoutStrategyResult {
                    width,
                    height,
                    ..LayoutStrategyResult::unchanged(own)
                })
            }
            trigger if trigger.is_surface() && bbox.is_none() => None,
            _ => Some(match bbox {
                Some(rect) => LayoutStrategyResult::from_rect(rect),
                None => LayoutStrategyResult::from_rect(Rect::ZERO),
            }),
        }
    }
}

/// Fills the bound surface.
///
/// Only a root group bound to a surface is sized by this strategy; anywhere
/// else it keeps the group's configured geometry and leaves nested effects to
/// the owner's own pass.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedLayout;

impl LayoutStrategy for FixedLayout {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn compute_layout(
        &self,
        _members: &[Member],
        context: &LayoutContext,
    ) -> Option<LayoutStrategyResult> {
        let target = &context.target;
        if !target.is_surface_root() {
            return None;
        }
        let surface = target.surface?;
        let to_local = target.world_transform.inverse();
        let center = to_local * Point::new(surface.width / 2.0, surface.height / 2.0);
        Some(LayoutStrategyResult {
            center,
            width: surface.width,
            height: surface.height,
            correction: None,
            relative_correction: None,
        })
    }
}

/// Bounds the group by an externally supplied clip rectangle.
///
/// The members do not contribute to the box; the clip overrides it.
#[derive(Clone, Copy, Debug)]
pub struct ClipPathLayout {
    /// The clip boundary.
    pub clip: Rect,
    /// When `true`, `clip` is in surface coordinates; otherwise it is in the
    /// group's local plane.
    pub absolute: bool,
}

impl ClipPathLayout {
    /// A clip expressed in the group's local plane.
    pub fn local(clip: Rect) -> Self {
        Self {
            clip,
            absolute: false,
        }
    }

    /// A clip expressed in surface coordinates.
    pub fn absolute(clip: Rect) -> Self {
        Self {
            clip,
            absolute: true,
        }
    }
}

impl LayoutStrategy for ClipPathLayout {
    fn name(&self) -> &'static str {
        "clip-path"
    }

    fn compute_layout(
        &self,
        _members: &[Member],
        context: &LayoutContext,
    ) -> Option<LayoutStrategyResult> {
        let local = if self.absolute {
            transform_rect_bbox(context.target.world_transform.inverse(), self.clip)
        } else {
            self.clip
        };
        Some(LayoutStrategyResult::from_rect(local))
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use kurbo::{Affine, Size};

    use super::*;
    use crate::context::{LayoutTarget, ObjectList};

    fn context(trigger: LayoutTrigger, geometry: Geometry, surface: Option<Size>) -> LayoutContext {
        LayoutContext {
            target: LayoutTarget {
                id: ObjectId::new(0, 1),
                geometry,
                world_transform: geometry.own_transform(),
                owner: None,
                surface,
            },
            trigger,
            strategy: Rc::new(FitContentLayout),
            prev_strategy: None,
            strategy_change: false,
            path: ObjectList::new(),
        }
    }

    fn member(idx: u32, rect: Rect) -> Member {
        Member {
            id: ObjectId::new(idx, 1),
            geometry: Geometry::from_rect(rect),
        }
    }

    fn imperative() -> LayoutTrigger {
        LayoutTrigger::Imperative { overrides: None }
    }

    #[test]
    fn fit_content_encloses_members() {
        let members = vec![
            member(1, Rect::new(0.0, 0.0, 10.0, 10.0)),
            member(2, Rect::new(90.0, 40.0, 100.0, 50.0)),
        ];
        let ctx = context(imperative(), Geometry::default(), None);
        let r = FitContentLayout.compute_layout(&members, &ctx).unwrap();
        assert_eq!(r.center, Point::new(50.0, 25.0));
        assert_eq!((r.width, r.height), (100.0, 50.0));
    }

    #[test]
    fn fit_content_empty_is_zero_size_at_previous_center() {
        let geometry = Geometry::from_center_size((40.0, 40.0), (20.0, 20.0));
        let ctx = context(imperative(), geometry, None);
        let r = FitContentLayout.compute_layout(&[], &ctx).unwrap();
        assert_eq!(r.center, Point::ZERO);
        assert_eq!((r.width, r.height), (0.0, 0.0));
        assert!(!r.center.x.is_nan());
    }

    #[test]
    fn fit_content_holds_on_empty_surface_resize() {
        let ctx = context(
            LayoutTrigger::SurfaceResized {
                previous: Size::new(800.0, 600.0),
                current: Size::new(1000.0, 600.0),
            },
            Geometry::default(),
            Some(Size::new(1000.0, 600.0)),
        );
        assert!(FitContentLayout.compute_layout(&[], &ctx).is_none());
    }

    #[test]
    fn fit_content_relative_initialization_keeps_center() {
        let members = vec![member(1, Rect::new(-20.0, -5.0, 30.0, 5.0))];
        let ctx = context(
            LayoutTrigger::Initialization {
                objects_relative_to_group: true,
            },
            Geometry::from_center_size((100.0, 100.0), (0.0, 0.0)),
            None,
        );
        let r = FitContentLayout.compute_layout(&members, &ctx).unwrap();
        assert_eq!(r.center, Point::ZERO);
        assert_eq!((r.width, r.height), (50.0, 10.0));
    }

    #[test]
    fn fixed_fills_surface_only_at_root() {
        let geometry = Geometry::from_center_size((0.0, 0.0), (10.0, 10.0));
        let ctx = context(imperative(), geometry, Some(Size::new(800.0, 600.0)));
        let r = FixedLayout.compute_layout(&[], &ctx).unwrap();
        assert_eq!(r.center, Point::new(400.0, 300.0));
        assert_eq!((r.width, r.height), (800.0, 600.0));

        let mut nested = ctx.clone();
        nested.target.owner = Some(ObjectId::new(9, 1));
        assert!(FixedLayout.compute_layout(&[], &nested).is_none());

        let unbound = context(imperative(), geometry, None);
        assert!(FixedLayout.compute_layout(&[], &unbound).is_none());
    }

    #[test]
    fn clip_path_overrides_member_box() {
        let members = vec![member(1, Rect::new(0.0, 0.0, 500.0, 500.0))];
        let ctx = context(imperative(), Geometry::default(), None);
        let r = ClipPathLayout::local(Rect::new(-10.0, -10.0, 30.0, 10.0))
            .compute_layout(&members, &ctx)
            .unwrap();
        assert_eq!(r.center, Point::new(10.0, 0.0));
        assert_eq!((r.width, r.height), (40.0, 20.0));
    }

    #[test]
    fn absolute_clip_path_is_mapped_into_local_plane() {
        let geometry = Geometry {
            scale_x: 2.0,
            scale_y: 2.0,
            ..Geometry::from_center_size((100.0, 100.0), (0.0, 0.0))
        };
        let mut ctx = context(imperative(), geometry, None);
        ctx.target.world_transform = Affine::translate((100.0, 100.0)) * Affine::scale(2.0);
        let r = ClipPathLayout::absolute(Rect::new(100.0, 100.0, 140.0, 120.0))
            .compute_layout(&[], &ctx)
            .unwrap();
        assert_eq!(r.center, Point::new(10.0, 5.0));
        assert_eq!((r.width, r.height), (20.0, 10.0));
    }

    #[test]
    fn reasonable_strategies_never_produce_negative_extents() {
        let members = vec![
            member(1, Rect::new(-50.0, 0.0, -40.0, 10.0)),
            member(2, Rect::new(5.0, -7.0, 6.0, -1.0)),
        ];
        let triggers = [
            imperative(),
            LayoutTrigger::Initialization {
                objects_relative_to_group: false,
            },
            LayoutTrigger::SurfaceAttached {
                size: Size::new(10.0, 10.0),
            },
        ];
        let strategies: [&dyn LayoutStrategy; 3] = [
            &FitContentLayout,
            &FixedLayout,
            &ClipPathLayout::local(Rect::new(0.0, 0.0, 3.0, 3.0)),
        ];
        for trigger in triggers {
            let ctx = context(trigger, Geometry::default(), Some(Size::new(10.0, 10.0)));
            for strategy in strategies {
                if let Some(r) = strategy.compute_layout(&members, &ctx) {
                    assert!(r.width >= 0.0 && r.height >= 0.0, "{}", strategy.name());
                }
            }
        }
    }
}
