use std::sync::Arc;

use parking_lot::Mutex;
use vellum_render::{
    BlendState, FRect, IRect, IndexType, MapMode, PixelShaderId, RasterizerState, SamplerState,
    ShaderStage, TextureId, Vec4, Vertex2D, VertexShaderId,
};

/// One call made on a recording device.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    SetBuffers,
    UploadVertices {
        mode: MapMode,
        offset: u32,
        vertices: Vec<Vertex2D>,
    },
    UploadIndices {
        mode: MapMode,
        offset: u32,
        indices: Vec<IndexType>,
    },
    SetBlendState(BlendState),
    SetRasterizerState(RasterizerState),
    SetSamplerState {
        stage: ShaderStage,
        slot: u32,
        state: SamplerState,
    },
    SetScissorRect(IRect),
    SetViewport(FRect),
    SetVertexShader(Option<VertexShaderId>),
    SetPixelShader(Option<PixelShaderId>),
    SetTexture {
        stage: ShaderStage,
        slot: u32,
        texture: Option<TextureId>,
    },
    SetRenderTarget(Option<TextureId>),
    SetConstantBuffer {
        stage: ShaderStage,
        slot: u32,
        data: Vec<Vec4>,
    },
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    },
    Draw {
        vertex_count: u32,
    },
}

impl DeviceCall {
    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawIndexed { .. } | Self::Draw { .. })
    }
}

/// Shared list of [`DeviceCall`]s.
///
/// Cloning is cheap and every clone sees the same calls.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<DeviceCall>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, call: DeviceCall) {
        self.calls.lock().push(call);
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.lock().is_empty()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    /// Count calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&DeviceCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    /// `(index_count, start_index, base_vertex)` of every indexed draw.
    pub fn draw_indexed_calls(&self) -> Vec<(u32, u32, i32)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::DrawIndexed {
                    index_count,
                    start_index,
                    base_vertex,
                } => Some((*index_count, *start_index, *base_vertex)),
                _ => None,
            })
            .collect()
    }

    /// `(mode, offset, len)` of every vertex upload.
    pub fn vertex_uploads(&self) -> Vec<(MapMode, u32, usize)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::UploadVertices {
                    mode,
                    offset,
                    vertices,
                } => Some((*mode, *offset, vertices.len())),
                _ => None,
            })
            .collect()
    }

    /// `(mode, offset, len)` of every index upload.
    pub fn index_uploads(&self) -> Vec<(MapMode, u32, usize)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::UploadIndices {
                    mode,
                    offset,
                    indices,
                } => Some((*mode, *offset, indices.len())),
                _ => None,
            })
            .collect()
    }

    /// Texture bind calls for `stage`/`slot`, in order.
    pub fn texture_binds(&self, stage: ShaderStage, slot: u32) -> Vec<Option<TextureId>> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                DeviceCall::SetTexture {
                    stage: s,
                    slot: n,
                    texture,
                } if *s == stage && *n == slot => Some(*texture),
                _ => None,
            })
            .collect()
    }
}
