// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the scene: handles, anchors, and per-object geometry.

use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::util::{tan_degrees, transform_rect_bbox};

/// Identifier for an object in a [`Scene`](crate::Scene) (generational).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ObjectId(pub(crate) u32, pub(crate) u32);

impl ObjectId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Identifier for a rendering surface registered with a [`Scene`](crate::Scene).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct SurfaceId(pub(crate) u32);

/// Identifier for a registered [`LayoutObserver`](crate::LayoutObserver).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ObserverId(pub(crate) u32);

/// Horizontal anchor of an object.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OriginX {
    /// Left edge.
    Left,
    /// Horizontal center.
    Center,
    /// Right edge.
    Right,
    /// Fraction of the width measured from the left edge (`0.0` is left, `1.0` is right).
    Fraction(f64),
}

/// Vertical anchor of an object.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum OriginY {
    /// Top edge.
    Top,
    /// Vertical center.
    Center,
    /// Bottom edge.
    Bottom,
    /// Fraction of the height measured from the top edge (`0.0` is top, `1.0` is bottom).
    Fraction(f64),
}

impl OriginX {
    /// Offset of this anchor from the center, as a fraction of the width in `[-0.5, 0.5]`.
    pub const fn resolve(self) -> f64 {
        match self {
            Self::Left => -0.5,
            Self::Center => 0.0,
            Self::Right => 0.5,
            Self::Fraction(f) => f - 0.5,
        }
    }
}

impl OriginY {
    /// Offset of this anchor from the center, as a fraction of the height in `[-0.5, 0.5]`.
    pub const fn resolve(self) -> f64 {
        match self {
            Self::Top => -0.5,
            Self::Center => 0.0,
            Self::Bottom => 0.5,
            Self::Fraction(f) => f - 0.5,
        }
    }
}

/// Map an anchor pair to its offset from the center, in fractions of the object's size.
///
/// Every conversion between an anchor point and an object's geometric center
/// goes through this function.
///
/// ```
/// use kurbo::Vec2;
/// use understory_group::{OriginX, OriginY, resolve_origin};
///
/// assert_eq!(resolve_origin(OriginX::Left, OriginY::Bottom), Vec2::new(-0.5, 0.5));
/// assert_eq!(resolve_origin(OriginX::Fraction(0.25), OriginY::Center), Vec2::new(-0.25, 0.0));
/// ```
pub const fn resolve_origin(origin_x: OriginX, origin_y: OriginY) -> Vec2 {
    Vec2::new(origin_x.resolve(), origin_y.resolve())
}

bitflags::bitflags! {
    /// Geometry keys reported by a member-modified signal.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ModifiedKeys: u8 {
        /// Position of the center changed.
        const CENTER = 0b0000_0001;
        /// Width changed.
        const WIDTH  = 0b0000_0010;
        /// Height changed.
        const HEIGHT = 0b0000_0100;
        /// `scale_x` or `scale_y` changed.
        const SCALE  = 0b0000_1000;
        /// Rotation changed.
        const ANGLE  = 0b0001_0000;
        /// `skew_x` or `skew_y` changed.
        const SKEW   = 0b0010_0000;
        /// Anchor changed.
        const ORIGIN = 0b0100_0000;
    }
}

impl ModifiedKeys {
    /// Keys that change the extent of an object in its owner's plane.
    pub const SIZE: Self = Self::WIDTH.union(Self::HEIGHT);

    /// Keys that change the transform of an object (and with it the frame of its members).
    pub const TRANSFORM: Self = Self::CENTER
        .union(Self::SCALE)
        .union(Self::ANGLE)
        .union(Self::SKEW);
}

/// Geometry of an object, expressed in its owner's local plane.
///
/// For an object without an owner the owner plane is the surface plane. For a
/// member of a group the plane's origin is the group's center, before the
/// group's own scale, rotation, and skew are applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Geometry {
    /// Center of the object in the owner plane.
    pub center: Point,
    /// Untransformed width.
    pub width: f64,
    /// Untransformed height.
    pub height: f64,
    /// Horizontal scale factor.
    pub scale_x: f64,
    /// Vertical scale factor.
    pub scale_y: f64,
    /// Rotation in degrees, clockwise in a y-down plane.
    pub angle: f64,
    /// Horizontal skew in degrees.
    pub skew_x: f64,
    /// Vertical skew in degrees.
    pub skew_y: f64,
    /// Horizontal anchor used by [`Geometry::position`].
    pub origin_x: OriginX,
    /// Vertical anchor used by [`Geometry::position`].
    pub origin_y: OriginY,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            center: Point::ZERO,
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
            skew_x: 0.0,
            skew_y: 0.0,
            origin_x: OriginX::Center,
            origin_y: OriginY::Center,
        }
    }
}

impl Geometry {
    /// Geometry of an unscaled, unrotated box of `size` centered at `center`.
    pub fn from_center_size(center: impl Into<Point>, size: impl Into<Size>) -> Self {
        let size = size.into();
        Self {
            center: center.into(),
            width: size.width,
            height: size.height,
            ..Self::default()
        }
    }

    /// Geometry of an unscaled, unrotated box covering `rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self::from_center_size(rect.center(), rect.size())
    }

    /// Untransformed size.
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Scale, rotation, and skew, without the translation to `center`.
    pub fn linear_transform(&self) -> Affine {
        let mut tf = Affine::rotate(self.angle.to_radians())
            * Affine::scale_non_uniform(self.scale_x, self.scale_y);
        if self.skew_x != 0.0 {
            tf *= Affine::skew(tan_degrees(self.skew_x), 0.0);
        }
        if self.skew_y != 0.0 {
            tf *= Affine::skew(0.0, tan_degrees(self.skew_y));
        }
        tf
    }

    /// Transform from this object's local plane into its owner's plane.
    pub fn own_transform(&self) -> Affine {
        self.linear_transform()
            .then_translate(self.center.to_vec2())
    }

    /// Untransformed bounds, centered on the local origin.
    pub fn local_bounds(&self) -> Rect {
        Rect::from_center_size(Point::ZERO, self.size())
    }

    /// Axis-aligned box enclosing the transformed corners, in the owner plane.
    pub fn bounding_box(&self) -> Rect {
        transform_rect_bbox(self.own_transform(), self.local_bounds())
    }

    /// The point of this object at the given anchor, in the owner plane.
    pub fn position_by_origin(&self, origin_x: OriginX, origin_y: OriginY) -> Point {
        let offset = resolve_origin(origin_x, origin_y);
        let local = Point::new(offset.x * self.width, offset.y * self.height);
        self.center + (self.linear_transform() * local).to_vec2()
    }

    /// Move the object so the given anchor lands on `point` (in the owner plane).
    pub fn set_position_by_origin(&mut self, point: Point, origin_x: OriginX, origin_y: OriginY) {
        let anchor = self.position_by_origin(origin_x, origin_y);
        self.center += point - anchor;
    }

    /// The point at this object's own anchor (`origin_x`, `origin_y`).
    pub fn position(&self) -> Point {
        self.position_by_origin(self.origin_x, self.origin_y)
    }

    /// Move the object so its own anchor lands on `point`.
    pub fn set_position(&mut self, point: Point) {
        self.set_position_by_origin(point, self.origin_x, self.origin_y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::approx_eq;

    #[test]
    fn origin_tags_resolve_to_half_extents() {
        assert_eq!(resolve_origin(OriginX::Left, OriginY::Top), Vec2::new(-0.5, -0.5));
        assert_eq!(resolve_origin(OriginX::Center, OriginY::Center), Vec2::ZERO);
        assert_eq!(resolve_origin(OriginX::Right, OriginY::Bottom), Vec2::new(0.5, 0.5));
        assert_eq!(
            resolve_origin(OriginX::Fraction(1.0), OriginY::Fraction(0.0)),
            Vec2::new(0.5, -0.5)
        );
    }

    #[test]
    fn position_by_origin_unrotated() {
        let g = Geometry::from_center_size((50.0, 50.0), (20.0, 10.0));
        assert_eq!(g.position_by_origin(OriginX::Left, OriginY::Top), Point::new(40.0, 45.0));
        assert_eq!(g.position_by_origin(OriginX::Right, OriginY::Bottom), Point::new(60.0, 55.0));
    }

    #[test]
    fn position_by_origin_follows_rotation_and_scale() {
        let g = Geometry {
            angle: 90.0,
            scale_x: 2.0,
            ..Geometry::from_center_size((0.0, 0.0), (10.0, 10.0))
        };
        // Local (-5, 0) scaled to (-10, 0), rotated 90 degrees to (0, -10).
        let p = g.position_by_origin(OriginX::Left, OriginY::Center);
        assert!(approx_eq(p.x, 0.0) && approx_eq(p.y, -10.0), "got {p:?}");
    }

    #[test]
    fn set_position_moves_anchor_onto_point() {
        let mut g = Geometry {
            origin_x: OriginX::Left,
            origin_y: OriginY::Top,
            ..Geometry::from_center_size((0.0, 0.0), (10.0, 4.0))
        };
        g.set_position(Point::new(100.0, 100.0));
        assert_eq!(g.center, Point::new(105.0, 102.0));
        assert_eq!(g.position(), Point::new(100.0, 100.0));
    }

    #[test]
    fn bounding_box_of_rotated_square_grows() {
        let g = Geometry {
            angle: 45.0,
            ..Geometry::from_center_size((0.0, 0.0), (10.0, 10.0))
        };
        let bbox = g.bounding_box();
        let half_diagonal = 5.0 * core::f64::consts::SQRT_2;
        assert!(approx_eq(bbox.x1, half_diagonal), "got {bbox:?}");
        assert!(approx_eq(bbox.y0, -half_diagonal), "got {bbox:?}");
    }

    #[test]
    fn own_transform_composes_translate_last() {
        let g = Geometry {
            scale_x: 2.0,
            scale_y: 3.0,
            ..Geometry::from_center_size((10.0, 20.0), (1.0, 1.0))
        };
        assert_eq!(g.own_transform() * Point::new(1.0, 1.0), Point::new(12.0, 23.0));
    }
}
