//! Recording implementation of [`RenderDevice2D`].

use vellum_render::{
    BlendState, FRect, IRect, IndexType, MapMode, PixelShader, PixelShaderId, RasterizerState,
    RenderDevice2D, RenderError, SamplerState, ShaderStage, StandardShaders, Texture, TextureId,
    UVec2, Vec4, Vertex2D, VertexShader, VertexShaderId,
};

use crate::{CallLog, DeviceCall};

/// A device that records every call into a [`CallLog`] and draws nothing.
///
/// # Example
///
/// ```rust
/// use vellum_render::{RenderDevice2D, ShaderStage};
/// use vellum_test_utils::{DeviceCall, MockDevice2D};
///
/// let mut mock = MockDevice2D::new();
/// mock.draw(3);
///
/// assert_eq!(mock.log().calls(), vec![DeviceCall::Draw { vertex_count: 3 }]);
/// ```
#[derive(Debug)]
pub struct MockDevice2D {
    log: CallLog,
    back_buffer_size: UVec2,
    standard: StandardShaders,
    fail_uploads: bool,
    next_id: u32,
}

impl Default for MockDevice2D {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDevice2D {
    /// Standard shaders get IDs 0 to 3; created resources start at 100.
    pub fn new() -> Self {
        Self {
            log: CallLog::new(),
            back_buffer_size: UVec2::new(800, 600),
            standard: StandardShaders {
                sprite_vs: VertexShaderId(0),
                full_screen_triangle_vs: VertexShaderId(1),
                shape_ps: PixelShaderId(2),
                texture_ps: PixelShaderId(3),
            },
            fail_uploads: false,
            next_id: 100,
        }
    }

    pub fn with_back_buffer_size(mut self, size: UVec2) -> Self {
        self.back_buffer_size = size;
        self
    }

    /// A handle to the shared call log.
    pub fn log(&self) -> CallLog {
        self.log.clone()
    }

    /// Make every following upload return [`RenderError::BufferMap`]. The
    /// call is still recorded.
    pub fn set_fail_uploads(&mut self, fail: bool) {
        self.fail_uploads = fail;
    }

    fn next_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn create_texture(&mut self, size: UVec2) -> Texture {
        let id = TextureId(self.next_id());
        Texture::new(id, size, false, Some("mock_texture"))
    }

    pub fn create_render_texture(&mut self, size: UVec2) -> Texture {
        let id = TextureId(self.next_id());
        Texture::new(id, size, true, Some("mock_render_texture"))
    }

    pub fn create_vertex_shader(&mut self, label: &str) -> VertexShader {
        VertexShader::new(VertexShaderId(self.next_id()), label)
    }

    pub fn create_pixel_shader(&mut self, label: &str) -> PixelShader {
        PixelShader::new(PixelShaderId(self.next_id()), label)
    }

    fn upload_result(&self) -> Result<(), RenderError> {
        if self.fail_uploads {
            Err(RenderError::BufferMap("mock upload failure".into()))
        } else {
            Ok(())
        }
    }
}

impl RenderDevice2D for MockDevice2D {
    fn standard_shaders(&self) -> StandardShaders {
        self.standard
    }

    fn back_buffer_size(&self) -> UVec2 {
        self.back_buffer_size
    }

    fn set_buffers(&mut self) {
        self.log.push(DeviceCall::SetBuffers);
    }

    fn upload_vertices(&mut self, mode: MapMode, offset: u32, vertices: &[Vertex2D]) -> Result<(), RenderError> {
        self.log.push(DeviceCall::UploadVertices {
            mode,
            offset,
            vertices: vertices.to_vec(),
        });
        self.upload_result()
    }

    fn upload_indices(&mut self, mode: MapMode, offset: u32, indices: &[IndexType]) -> Result<(), RenderError> {
        self.log.push(DeviceCall::UploadIndices {
            mode,
            offset,
            indices: indices.to_vec(),
        });
        self.upload_result()
    }

    fn set_blend_state(&mut self, state: BlendState) {
        self.log.push(DeviceCall::SetBlendState(state));
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.log.push(DeviceCall::SetRasterizerState(state));
    }

    fn set_sampler_state(&mut self, stage: ShaderStage, slot: u32, state: SamplerState) {
        self.log.push(DeviceCall::SetSamplerState { stage, slot, state });
    }

    fn set_scissor_rect(&mut self, rect: IRect) {
        self.log.push(DeviceCall::SetScissorRect(rect));
    }

    fn set_viewport(&mut self, viewport: FRect) {
        self.log.push(DeviceCall::SetViewport(viewport));
    }

    fn set_vertex_shader(&mut self, shader: Option<VertexShaderId>) {
        self.log.push(DeviceCall::SetVertexShader(shader));
    }

    fn set_pixel_shader(&mut self, shader: Option<PixelShaderId>) {
        self.log.push(DeviceCall::SetPixelShader(shader));
    }

    fn set_texture(&mut self, stage: ShaderStage, slot: u32, texture: Option<TextureId>) {
        self.log.push(DeviceCall::SetTexture { stage, slot, texture });
    }

    fn set_render_target(&mut self, target: Option<TextureId>) {
        self.log.push(DeviceCall::SetRenderTarget(target));
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, data: &[Vec4]) {
        self.log.push(DeviceCall::SetConstantBuffer {
            stage,
            slot,
            data: data.to_vec(),
        });
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.log.push(DeviceCall::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        });
    }

    fn draw(&mut self, vertex_count: u32) {
        self.log.push(DeviceCall::Draw { vertex_count });
    }
}
