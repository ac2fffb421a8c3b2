// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use kurbo::{Affine, Point, Rect, Vec2};
use tracing::warn;

use crate::types::Geometry;

/// Transform an axis-aligned `Rect` by an `Affine` and return a conservative
/// axis-aligned bounding box in the target space.
pub(crate) fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let min_x = (a * rect.x0).min(a * rect.x1) + (c * rect.y0).min(c * rect.y1);
    let max_x = (a * rect.x0).max(a * rect.x1) + (c * rect.y0).max(c * rect.y1);
    let min_y = (b * rect.x0).min(b * rect.x1) + (d * rect.y0).min(d * rect.y1);
    let max_y = (b * rect.x0).max(b * rect.x1) + (d * rect.y0).max(d * rect.y1);
    Rect::new(min_x + e, min_y + f, max_x + e, max_y + f)
}

/// Tangent of an angle in degrees, routed through kurbo so `libm` builds work.
pub(crate) fn tan_degrees(degrees: f64) -> f64 {
    let v = Vec2::from_angle(degrees.to_radians());
    v.y / v.x
}

/// Apply only the linear part of `affine` to a vector.
pub(crate) fn transform_vector(affine: Affine, v: Vec2) -> Vec2 {
    (affine.with_translation(Vec2::ZERO) * v.to_point()).to_vec2()
}

/// Rewrite the transform fields of `geometry` so that its own transform equals `affine`.
///
/// Width, height, and anchors are kept. Any skew ends up in `skew_x`; `skew_y`
/// is reset to zero, which describes the same matrix.
pub(crate) fn apply_transform(geometry: &mut Geometry, affine: Affine) {
    let [a, b, c, d, e, f] = affine.as_coeffs();
    let column = Vec2::new(a, b);
    let denom = a * a + b * b;
    let scale_x = column.hypot();
    geometry.center = Point::new(e, f);
    if scale_x == 0.0 {
        // Collapsed x axis: put the remaining column on the rotated y axis.
        warn!(?affine, "decomposing a transform with a collapsed x axis");
        let column = Vec2::new(c, d);
        geometry.angle = Vec2::new(d, -c).atan2().to_degrees();
        geometry.scale_x = 0.0;
        geometry.scale_y = column.hypot();
        geometry.skew_x = 0.0;
        geometry.skew_y = 0.0;
        return;
    }
    geometry.angle = column.atan2().to_degrees();
    geometry.scale_x = scale_x;
    geometry.scale_y = (a * d - c * b) / scale_x;
    geometry.skew_x = Vec2::new(denom, a * c + b * d).atan2().to_degrees();
    geometry.skew_y = 0.0;
}

/// Whether `affine` can be inverted without producing non-finite values.
pub(crate) fn is_invertible(affine: Affine) -> bool {
    let det = affine.determinant();
    det != 0.0 && det.is_finite()
}

/// Whether the linear part of `affine` is the identity.
pub(crate) fn is_translation(affine: Affine) -> bool {
    let [a, b, c, d, _, _] = affine.as_coeffs();
    a == 1.0 && b == 0.0 && c == 0.0 && d == 1.0
}

#[cfg(test)]
pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    let d = a - b;
    d < 1e-9 && d > -1e-9
}

#[cfg(test)]
pub(crate) fn approx_point(a: Point, b: Point) -> bool {
    approx_eq(a.x, b.x) && approx_eq(a.y, b.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_transform_recovers_components() {
        let source = Geometry {
            angle: 30.0,
            scale_x: 2.0,
            scale_y: 0.5,
            skew_x: 10.0,
            ..Geometry::from_center_size((7.0, -3.0), (4.0, 4.0))
        };
        let mut out = Geometry::from_center_size((0.0, 0.0), (4.0, 4.0));
        apply_transform(&mut out, source.own_transform());
        assert!(approx_point(out.center, source.center), "center {out:?}");
        assert!(approx_eq(out.angle, 30.0), "angle {out:?}");
        assert!(approx_eq(out.scale_x, 2.0), "scale_x {out:?}");
        assert!(approx_eq(out.scale_y, 0.5), "scale_y {out:?}");
        assert!(approx_eq(out.skew_x, 10.0), "skew_x {out:?}");
    }

    #[test]
    fn apply_transform_folds_skew_y_into_same_matrix() {
        let source = Geometry {
            skew_y: 20.0,
            ..Geometry::from_center_size((0.0, 0.0), (4.0, 4.0))
        };
        let mut out = source;
        apply_transform(&mut out, source.own_transform());
        let probe = Point::new(3.0, -2.0);
        assert!(approx_point(
            out.own_transform() * probe,
            source.own_transform() * probe
        ));
    }

    #[test]
    fn apply_transform_handles_collapsed_x_axis() {
        let mut out = Geometry::from_center_size((0.0, 0.0), (4.0, 4.0));
        let affine = Affine::new([0.0, 0.0, -3.0, 0.0, 5.0, 6.0]);
        apply_transform(&mut out, affine);
        assert!(out.angle.is_finite() && out.scale_y.is_finite(), "{out:?}");
        assert_eq!(out.scale_x, 0.0);
        let probe = Point::new(1.5, -2.0);
        assert!(approx_point(out.own_transform() * probe, affine * probe));
    }

    #[test]
    fn invertibility_follows_determinant() {
        assert!(is_invertible(Affine::scale_non_uniform(2.0, 0.5)));
        assert!(!is_invertible(Affine::scale_non_uniform(0.0, 1.0)));
        assert!(!is_invertible(Affine::new([1.0, 1.0, 1.0, 1.0, 0.0, 0.0])));
    }

    #[test]
    fn tan_of_45_degrees() {
        assert!(approx_eq(tan_degrees(45.0), 1.0));
    }

    #[test]
    fn transform_vector_ignores_translation() {
        let tf = Affine::translate((100.0, 100.0)) * Affine::scale(2.0);
        assert_eq!(transform_vector(tf, Vec2::new(1.0, 2.0)), Vec2::new(2.0, 4.0));
    }
}
