use vellum_core::geometry::{FRect, IRect};
use vellum_core::math::{UVec2, Vec4};

use crate::{
    BlendState, IndexType, PixelShaderId, RasterizerState, RenderError, SamplerState, ShaderStage,
    StandardShaders, TextureId, Vertex2D, VertexShaderId,
};

/// How a streaming buffer write treats data already in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// The buffer's previous contents may be thrown away; writing restarts
    /// at offset 0.
    Discard,
    /// Append after data the GPU may still be reading.
    NoOverwrite,
}

/// A stateful 2D GPU context.
///
/// The renderer drives a device like an immediate-mode context: every
/// `set_*` call changes one piece of bound state, and draws use whatever is
/// bound at that moment. Resources are referred to by ID; an `Option::None`
/// ID unbinds.
///
/// Offsets and counts are in elements (vertices or indices), not bytes.
pub trait RenderDevice2D {
    /// Shaders the device always provides.
    fn standard_shaders(&self) -> StandardShaders;

    /// Size of the surface drawn to when no render target is bound.
    fn back_buffer_size(&self) -> UVec2;

    /// Binds the streaming vertex and index buffers.
    fn set_buffers(&mut self);

    fn upload_vertices(
        &mut self,
        mode: MapMode,
        offset: u32,
        vertices: &[Vertex2D],
    ) -> Result<(), RenderError>;

    fn upload_indices(
        &mut self,
        mode: MapMode,
        offset: u32,
        indices: &[IndexType],
    ) -> Result<(), RenderError>;

    fn set_blend_state(&mut self, state: BlendState);

    fn set_rasterizer_state(&mut self, state: RasterizerState);

    fn set_sampler_state(&mut self, stage: ShaderStage, slot: u32, state: SamplerState);

    fn set_scissor_rect(&mut self, rect: IRect);

    fn set_viewport(&mut self, viewport: FRect);

    fn set_vertex_shader(&mut self, shader: Option<VertexShaderId>);

    fn set_pixel_shader(&mut self, shader: Option<PixelShaderId>);

    fn set_texture(&mut self, stage: ShaderStage, slot: u32, texture: Option<TextureId>);

    /// `None` binds the back buffer.
    fn set_render_target(&mut self, target: Option<TextureId>);

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, data: &[Vec4]);

    /// Draws `index_count` indices starting at `start_index`, adding
    /// `base_vertex` to every index.
    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);

    /// Draws `vertex_count` vertices with no vertex buffer.
    fn draw(&mut self, vertex_count: u32);
}
