//! Shape tessellation into batch regions.
//!
//! Each builder fills a [`BufferRegion`] of exactly the size reported by its
//! `*_SIZE` constant (or size function) and returns nothing; allocation and
//! command recording are the renderer's job.

use std::f32::consts::TAU;

use vellum_core::geometry::FRect;
use vellum_core::math::{Vec2, Vec4};

use crate::{BufferRegion, IndexType, Vertex2D};

/// `(vertices, indices)` of a rect, quad, line or textured rect.
pub const QUAD_SIZE: (u16, u32) = (4, 6);

/// `(vertices, indices)` of a triangle.
pub const TRIANGLE_SIZE: (u16, u32) = (3, 3);

/// Two triangles over corners `0 1 / 2 3` (TL, TR, BL, BR).
const QUAD_INDICES: [IndexType; 6] = [0, 1, 2, 2, 1, 3];

fn write_indices(region: &mut BufferRegion<'_>, local: &[IndexType]) {
    let offset = region.index_offset;
    for (dst, src) in region.indices.iter_mut().zip(local) {
        *dst = offset + src;
    }
}

pub fn build_triangle(region: &mut BufferRegion<'_>, points: [Vec2; 3], color: Vec4) {
    for (vertex, p) in region.vertices.iter_mut().zip(points) {
        *vertex = Vertex2D::colored(p, color);
    }
    write_indices(region, &[0, 1, 2]);
}

pub fn build_rect(region: &mut BufferRegion<'_>, rect: FRect, color: Vec4) {
    let corners = rect_corners(rect);
    for (vertex, p) in region.vertices.iter_mut().zip(corners) {
        *vertex = Vertex2D::colored(p, color);
    }
    write_indices(region, &QUAD_INDICES);
}

/// `uv` selects the texture sub-rectangle in normalized coordinates.
pub fn build_textured_rect(region: &mut BufferRegion<'_>, rect: FRect, uv: FRect, color: Vec4) {
    let corners = rect_corners(rect);
    let tex = rect_corners(uv);
    for ((vertex, p), t) in region.vertices.iter_mut().zip(corners).zip(tex) {
        *vertex = Vertex2D::new(p, t, color);
    }
    write_indices(region, &QUAD_INDICES);
}

/// `points` in clockwise order starting at the top-left.
pub fn build_quad(region: &mut BufferRegion<'_>, points: [Vec2; 4], color: Vec4) {
    // clockwise -> TL, TR, BL, BR
    let ordered = [points[0], points[1], points[3], points[2]];
    for (vertex, p) in region.vertices.iter_mut().zip(ordered) {
        *vertex = Vertex2D::colored(p, color);
    }
    write_indices(region, &QUAD_INDICES);
}

/// A segment expanded to a quad `thickness` wide.
pub fn build_line(region: &mut BufferRegion<'_>, begin: Vec2, end: Vec2, thickness: f32, color: Vec4) {
    let dir = (end - begin).normalize_or_zero();
    let normal = Vec2::new(-dir.y, dir.x) * (thickness * 0.5);
    let corners = [begin + normal, begin - normal, end + normal, end - normal];
    for (vertex, p) in region.vertices.iter_mut().zip(corners) {
        *vertex = Vertex2D::colored(p, color);
    }
    write_indices(region, &QUAD_INDICES);
}

/// Number of outer segments used for a circle of `radius` under a transform
/// with max scaling `scale`.
pub fn circle_quality(radius: f32, scale: f32) -> u16 {
    let size = radius.abs() * scale;
    if size <= 1.0 {
        4
    } else if size <= 6.0 {
        7
    } else if size <= 8.0 {
        8
    } else {
        (size * 0.225 + 18.0).min(255.0) as u16
    }
}

/// `(vertices, indices)` of a circle of the given quality.
pub fn circle_size(quality: u16) -> (u16, u32) {
    (quality + 1, quality as u32 * 3)
}

/// A triangle fan around `center`; the first rim vertex is straight up.
pub fn build_circle(region: &mut BufferRegion<'_>, center: Vec2, radius: f32, quality: u16, color: Vec4) {
    region.vertices[0] = Vertex2D::colored(center, color);
    let step = TAU / quality as f32;
    for (i, vertex) in region.vertices[1..].iter_mut().enumerate() {
        let (sin, cos) = (step * i as f32).sin_cos();
        *vertex = Vertex2D::colored(center + Vec2::new(sin, -cos) * radius, color);
    }

    let offset = region.index_offset;
    for (i, tri) in region.indices.chunks_exact_mut(3).enumerate() {
        let i = i as IndexType;
        let next = (i + 1) % quality;
        tri[0] = offset;
        tri[1] = offset + i + 1;
        tri[2] = offset + next + 1;
    }
}

/// Copies a pre-triangulated polygon. `indices` are local to `vertices`.
pub fn build_polygon(region: &mut BufferRegion<'_>, vertices: &[Vec2], indices: &[IndexType], color: Vec4) {
    for (vertex, p) in region.vertices.iter_mut().zip(vertices) {
        *vertex = Vertex2D::colored(*p, color);
    }
    write_indices(region, indices);
}

fn rect_corners(rect: FRect) -> [Vec2; 4] {
    [
        Vec2::new(rect.left(), rect.top()),
        Vec2::new(rect.right(), rect.top()),
        Vec2::new(rect.left(), rect.bottom()),
        Vec2::new(rect.right(), rect.bottom()),
    ]
}
