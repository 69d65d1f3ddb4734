//! 2D math built on `glam`.
//!
//! Transforms are [`Affine2`]s. Composition follows glam's column-vector
//! convention: `b * a` applies `a` first.

pub use glam::{Affine2, Mat2, UVec2, Vec2, Vec4};

use std::f32::consts::SQRT_2;

/// Affine transform mapping pixel coordinates of a `width` x `height`
/// target to normalized device coordinates (y up).
pub fn screen_transform(width: f32, height: f32) -> Affine2 {
    let width = width.max(1.0);
    let height = height.max(1.0);
    Affine2::from_cols(
        Vec2::new(2.0 / width, 0.0),
        Vec2::new(0.0, -2.0 / height),
        Vec2::new(-1.0, 1.0),
    )
}

/// Approximate uniform scale factor of a transform.
///
/// Used to pick tessellation quality for curved shapes: a circle drawn under
/// a 2x zoom needs as many segments as a circle of twice the radius.
pub fn max_scaling(transform: &Affine2) -> f32 {
    let m = transform.matrix2;
    (m.x_axis + m.y_axis).length() / SQRT_2
}

/// Packs an affine transform into two shader rows:
/// `row.x * p.x + row.y * p.y + row.z`.
pub fn pack_affine_rows(transform: &Affine2) -> [Vec4; 2] {
    let m = transform.matrix2;
    let t = transform.translation;
    [
        Vec4::new(m.x_axis.x, m.y_axis.x, t.x, 0.0),
        Vec4::new(m.x_axis.y, m.y_axis.y, t.y, 1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_scaling_identity() {
        assert!((max_scaling(&Affine2::IDENTITY) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_max_scaling_uniform_scale() {
        let t = Affine2::from_scale(Vec2::splat(3.0));
        assert!((max_scaling(&t) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_max_scaling_ignores_translation() {
        let t = Affine2::from_scale_angle_translation(Vec2::splat(2.0), 0.0, Vec2::new(100.0, -50.0));
        assert!((max_scaling(&t) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_screen_transform_corners() {
        let screen = screen_transform(800.0, 600.0);
        let top_left = screen.transform_point2(Vec2::ZERO);
        let bottom_right = screen.transform_point2(Vec2::new(800.0, 600.0));
        assert!((top_left - Vec2::new(-1.0, 1.0)).length() < 1e-6);
        assert!((bottom_right - Vec2::new(1.0, -1.0)).length() < 1e-6);
    }

    #[test]
    fn test_pack_affine_rows_matches_transform() {
        let t = Affine2::from_scale_angle_translation(Vec2::new(2.0, 3.0), 0.5, Vec2::new(7.0, -4.0));
        let rows = pack_affine_rows(&t);
        let p = Vec2::new(1.5, -2.5);
        let expected = t.transform_point2(p);
        let x = rows[0].x * p.x + rows[0].y * p.y + rows[0].z;
        let y = rows[1].x * p.x + rows[1].y * p.y + rows[1].z;
        assert!((Vec2::new(x, y) - expected).length() < 1e-5);
    }
}
