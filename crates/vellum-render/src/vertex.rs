use bytemuck::{Pod, Zeroable};
use vellum_core::math::{Vec2, Vec4};

/// Index type used by the streaming index buffer.
///
/// Indices are relative to the start of their batch, so a batch can never
/// address more than `IndexType::MAX + 1` vertices.
pub type IndexType = u16;

/// A single 2D vertex: position, texture coordinate and colour.
///
/// 32 bytes, matching the `Vertex2D` input of the standard shaders.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex2D {
    pub pos: [f32; 2],
    pub tex: [f32; 2],
    pub color: [f32; 4],
}

impl Vertex2D {
    pub fn new(pos: Vec2, tex: Vec2, color: Vec4) -> Self {
        Self {
            pos: pos.to_array(),
            tex: tex.to_array(),
            color: color.to_array(),
        }
    }

    /// Untextured vertex.
    pub fn colored(pos: Vec2, color: Vec4) -> Self {
        Self::new(pos, Vec2::ZERO, color)
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
            0 => Float32x2,  // pos
            1 => Float32x2,  // tex
            2 => Float32x4,  // color
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex2D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: ATTRS,
        }
    }

    /// Size of a vertex in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}
