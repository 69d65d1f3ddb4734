use vellum_core::geometry::{FRect, IRect};
use vellum_core::math::{Affine2, Vec2, Vec4, pack_affine_rows, screen_transform};
use vellum_core::profiling::{profile_function, profile_scope};

use crate::builder::{self, QUAD_SIZE, TRIANGLE_SIZE};
use crate::{
    BatchConfig, BatchInfo, BlendState, BufferRegion, Color, CommandManager, CommandType,
    IndexType, PixelShader, RasterizerState, RenderDevice2D, SamplerState, SdfParams, ShaderStage,
    Texture, TextureId, Vertex2DBatch, VertexShader,
};

/// Configuration for [`Renderer2D`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Renderer2DConfig {
    pub batch: BatchConfig,
}

impl Renderer2DConfig {
    pub fn with_batch_config(mut self, batch: BatchConfig) -> Self {
        self.batch = batch;
        self
    }
}

/// Counters for the last replayed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Renderer2DStats {
    pub draw_calls: u32,
    pub triangle_count: u32,
}

/// Engine constant block of the vertex stage (slot 0).
const VS_TRANSFORM_ROW0: usize = 0;
const VS_TRANSFORM_ROW1: usize = 1;
const VS_COLOR_MUL: usize = 2;
const VS_BLOCK_LEN: usize = 3;

/// Engine constant block of the pixel stage (slot 0).
const PS_COLOR_ADD: usize = 0;
const PS_SDF_PARAM: usize = 1;
const PS_INTERNAL: usize = 4;
const PS_BLOCK_LEN: usize = 5;

/// Constant buffer slot reserved for the engine blocks. User constant
/// buffers should use slot 1 and up.
pub const ENGINE_CONSTANT_SLOT: u32 = 0;

#[derive(Debug)]
struct EngineConstants {
    vs: [Vec4; VS_BLOCK_LEN],
    ps: [Vec4; PS_BLOCK_LEN],
    vs_dirty: bool,
    ps_dirty: bool,
}

impl EngineConstants {
    fn new() -> Self {
        Self {
            vs: [Vec4::ZERO; VS_BLOCK_LEN],
            ps: [Vec4::ZERO; PS_BLOCK_LEN],
            vs_dirty: true,
            ps_dirty: true,
        }
    }

    fn set_transform(&mut self, transform: &Affine2) {
        let rows = pack_affine_rows(transform);
        self.vs[VS_TRANSFORM_ROW0] = rows[0];
        self.vs[VS_TRANSFORM_ROW1] = rows[1];
        self.vs_dirty = true;
    }

    fn set_vs(&mut self, index: usize, value: Vec4) {
        self.vs[index] = value;
        self.vs_dirty = true;
    }

    fn set_ps(&mut self, index: usize, value: Vec4) {
        self.ps[index] = value;
        self.ps_dirty = true;
    }

    /// Forces the block of `stage` to be sent again before the next draw.
    fn invalidate(&mut self, stage: ShaderStage) {
        match stage {
            ShaderStage::Vertex => self.vs_dirty = true,
            ShaderStage::Pixel => self.ps_dirty = true,
        }
    }

    fn upload<D: RenderDevice2D>(&mut self, device: &mut D) {
        if self.vs_dirty {
            device.set_constant_buffer(ShaderStage::Vertex, ENGINE_CONSTANT_SLOT, &self.vs);
            self.vs_dirty = false;
        }
        if self.ps_dirty {
            device.set_constant_buffer(ShaderStage::Pixel, ENGINE_CONSTANT_SLOT, &self.ps);
            self.ps_dirty = false;
        }
    }
}

/// Screen-space state tracked while replaying.
struct ReplayState {
    batch_info: BatchInfo,
    target_size: Vec2,
    viewport: Option<FRect>,
    screen: Affine2,
    transform: Affine2,
}

impl ReplayState {
    fn viewport_rect(&self) -> FRect {
        self.viewport
            .unwrap_or(FRect::new(0.0, 0.0, self.target_size.x, self.target_size.y))
    }
}

/// The 2D renderer: shape API on top, command replay underneath.
///
/// `add_*` calls tessellate into the batch and record state and draws in the
/// [`CommandManager`]. Nothing reaches the device until [`flush`](Self::flush),
/// which replays the frame and prepares the next one.
///
/// # Example
///
/// ```ignore
/// let mut renderer = Renderer2D::new(device, Renderer2DConfig::default());
/// renderer.add_rect(FRect::new(0.0, 0.0, 32.0, 32.0), Color::RED);
/// renderer.add_rect(FRect::new(40.0, 0.0, 32.0, 32.0), Color::GREEN);
/// renderer.flush(); // one draw_indexed(12, ..)
/// ```
pub struct Renderer2D<D: RenderDevice2D> {
    device: D,
    config: Renderer2DConfig,
    batch: Vertex2DBatch,
    commands: CommandManager,
    engine: EngineConstants,
    current_custom_vs: Option<VertexShader>,
    current_custom_ps: Option<PixelShader>,
    stats: Renderer2DStats,
}

impl<D: RenderDevice2D> Renderer2D<D> {
    pub fn new(device: D, config: Renderer2DConfig) -> Self {
        tracing::debug!("Creating Renderer2D with {:?}", config.batch);
        Self {
            device,
            batch: Vertex2DBatch::new(config.batch),
            commands: CommandManager::new(),
            engine: EngineConstants::new(),
            current_custom_vs: None,
            current_custom_ps: None,
            stats: Renderer2DStats::default(),
            config,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn into_device(self) -> D {
        self.device
    }

    pub fn config(&self) -> &Renderer2DConfig {
        &self.config
    }

    /// The stream recorded so far this frame.
    pub fn commands(&self) -> &CommandManager {
        &self.commands
    }

    pub fn batch(&self) -> &Vertex2DBatch {
        &self.batch
    }

    /// Statistics of the last [`flush`](Self::flush).
    pub fn stats(&self) -> Renderer2DStats {
        self.stats
    }

    // --- Shapes ---

    fn build(
        &mut self,
        vertex_size: u16,
        index_size: u32,
        fill: impl FnOnce(&mut BufferRegion<'_>),
    ) -> Option<u32> {
        let mut region = self
            .batch
            .request_buffer(vertex_size, index_size, &mut self.commands)?;
        fill(&mut region);
        Some(index_size)
    }

    fn push_shape_shaders(&mut self, textured: bool) {
        let shaders = self.device.standard_shaders();
        if self.current_custom_vs.is_none() {
            self.commands.push_standard_vs(shaders.sprite_vs);
        }
        if self.current_custom_ps.is_none() {
            let ps = if textured {
                shaders.texture_ps
            } else {
                shaders.shape_ps
            };
            self.commands.push_standard_ps(ps);
        }
    }

    fn finish_shape(&mut self, index_count: Option<u32>) {
        if let Some(count) = index_count {
            self.push_shape_shaders(false);
            self.commands.push_draw(count);
        }
    }

    pub fn add_triangle(&mut self, points: [Vec2; 3], color: Color) {
        let (vs, is) = TRIANGLE_SIZE;
        let count = self.build(vs, is, |r| builder::build_triangle(r, points, color.to_vec4()));
        self.finish_shape(count);
    }

    pub fn add_rect(&mut self, rect: FRect, color: Color) {
        let (vs, is) = QUAD_SIZE;
        let count = self.build(vs, is, |r| builder::build_rect(r, rect, color.to_vec4()));
        self.finish_shape(count);
    }

    /// `points` clockwise from the top-left.
    pub fn add_quad(&mut self, points: [Vec2; 4], color: Color) {
        let (vs, is) = QUAD_SIZE;
        let count = self.build(vs, is, |r| builder::build_quad(r, points, color.to_vec4()));
        self.finish_shape(count);
    }

    pub fn add_line(&mut self, begin: Vec2, end: Vec2, thickness: f32, color: Color) {
        let (vs, is) = QUAD_SIZE;
        let count = self.build(vs, is, |r| {
            builder::build_line(r, begin, end, thickness, color.to_vec4())
        });
        self.finish_shape(count);
    }

    /// Tessellation follows the on-screen size: the current max scaling is
    /// taken into account.
    pub fn add_circle(&mut self, center: Vec2, radius: f32, color: Color) {
        let quality = builder::circle_quality(radius, self.commands.current_max_scaling());
        let (vs, is) = builder::circle_size(quality);
        let count = self.build(vs, is, |r| {
            builder::build_circle(r, center, radius, quality, color.to_vec4())
        });
        self.finish_shape(count);
    }

    /// Draws a pre-triangulated polygon. `indices` refer to `vertices`.
    /// Malformed input (not a triangle list, indices out of range, more
    /// vertices than a batch holds) is logged and skipped.
    pub fn add_polygon(&mut self, vertices: &[Vec2], indices: &[IndexType], color: Color) {
        if vertices.is_empty() || indices.is_empty() {
            return;
        }
        if indices.len() % 3 != 0 {
            tracing::warn!("Polygon index count {} is not a multiple of 3", indices.len());
            return;
        }
        let Ok(vertex_size) = u16::try_from(vertices.len()) else {
            tracing::warn!("Polygon with {} vertices does not fit a batch", vertices.len());
            return;
        };
        if indices.iter().any(|&i| i >= vertex_size) {
            tracing::warn!("Polygon index out of range ({} vertices)", vertex_size);
            return;
        }

        let count = self.build(vertex_size, indices.len() as u32, |r| {
            builder::build_polygon(r, vertices, indices, color.to_vec4())
        });
        self.finish_shape(count);
    }

    /// Draws `texture` into `rect`. `uv` selects the source region in
    /// normalized texture coordinates; `color` tints it.
    pub fn add_textured_rect(&mut self, rect: FRect, uv: FRect, texture: &Texture, color: Color) {
        let (vs, is) = QUAD_SIZE;
        let count = self.build(vs, is, |r| {
            builder::build_textured_rect(r, rect, uv, color.to_vec4())
        });
        if let Some(count) = count {
            self.push_shape_shaders(true);
            self.commands.push_ps_texture(0, texture);
            self.commands.push_draw(count);
        }
    }

    /// A triangle covering the whole viewport, generated in the vertex
    /// shader. With a texture, it is sampled from PS slot 0.
    pub fn add_full_screen_triangle(&mut self, texture: Option<&Texture>) {
        let shaders = self.device.standard_shaders();
        if self.current_custom_vs.is_none() {
            self.commands.push_standard_vs(shaders.full_screen_triangle_vs);
        }
        if self.current_custom_ps.is_none() {
            let ps = match texture {
                Some(_) => shaders.texture_ps,
                None => shaders.shape_ps,
            };
            self.commands.push_standard_ps(ps);
        }
        if let Some(texture) = texture {
            self.commands.push_ps_texture(0, texture);
        }
        self.commands.push_null_vertices(3);
    }

    // --- State ---

    pub fn set_color_mul(&mut self, color: Color) {
        self.commands.push_color_mul(color.to_vec4());
    }

    pub fn color_mul(&self) -> Color {
        self.commands.current_color_mul().into()
    }

    pub fn set_color_add(&mut self, color: Color) {
        self.commands.push_color_add(color.to_vec4());
    }

    pub fn color_add(&self) -> Color {
        self.commands.current_color_add().into()
    }

    pub fn set_blend_state(&mut self, state: BlendState) {
        self.commands.push_blend_state(state);
    }

    pub fn blend_state(&self) -> BlendState {
        self.commands.current_blend_state()
    }

    pub fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.commands.push_rasterizer_state(state);
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.commands.current_rasterizer_state()
    }

    pub fn set_sampler_state(&mut self, stage: ShaderStage, slot: usize, state: SamplerState) {
        self.commands.push_sampler_state(stage, slot, state);
    }

    pub fn sampler_state(&self, stage: ShaderStage, slot: usize) -> SamplerState {
        self.commands.current_sampler_state(stage, slot)
    }

    /// Only applied while the rasterizer state has `scissor_enable` set.
    pub fn set_scissor_rect(&mut self, rect: IRect) {
        self.commands.push_scissor_rect(rect);
    }

    pub fn scissor_rect(&self) -> IRect {
        self.commands.current_scissor_rect()
    }

    /// Restricts drawing to `viewport`; coordinates become relative to its
    /// top-left corner. `None` restores the full render target.
    pub fn set_viewport(&mut self, viewport: Option<FRect>) {
        self.commands.push_viewport(viewport);
    }

    pub fn viewport(&self) -> Option<FRect> {
        self.commands.current_viewport()
    }

    pub fn set_sdf_params(&mut self, params: SdfParams) {
        self.commands.push_sdf_params(params);
    }

    pub fn sdf_params(&self) -> SdfParams {
        self.commands.current_sdf_params()
    }

    pub fn set_internal_ps_constants(&mut self, value: Vec4) {
        self.commands.push_internal_ps_constants(value);
    }

    /// Draw into `target`, or the back buffer for `None`.
    pub fn set_render_target(&mut self, target: Option<&Texture>) {
        self.commands.push_render_target(target);
    }

    /// `TextureId::INVALID` while drawing to the back buffer.
    pub fn render_target(&self) -> TextureId {
        self.commands.current_render_target()
    }

    pub fn set_local_transform(&mut self, transform: Affine2) {
        self.commands.push_local_transform(transform);
    }

    pub fn local_transform(&self) -> Affine2 {
        self.commands.current_local_transform()
    }

    pub fn set_camera_transform(&mut self, transform: Affine2) {
        self.commands.push_camera_transform(transform);
    }

    pub fn camera_transform(&self) -> Affine2 {
        self.commands.current_camera_transform()
    }

    pub fn max_scaling(&self) -> f32 {
        self.commands.current_max_scaling()
    }

    pub fn set_vs_texture(&mut self, slot: usize, texture: &Texture) {
        self.commands.push_vs_texture(slot, texture);
    }

    pub fn set_ps_texture(&mut self, slot: usize, texture: &Texture) {
        self.commands.push_ps_texture(slot, texture);
    }

    pub fn unbind_vs_texture(&mut self, slot: usize) {
        self.commands.push_vs_texture_unbind(slot);
    }

    pub fn unbind_ps_texture(&mut self, slot: usize) {
        self.commands.push_ps_texture_unbind(slot);
    }

    pub fn vs_texture(&self, slot: usize) -> TextureId {
        self.commands.current_vs_texture(slot)
    }

    pub fn ps_texture(&self, slot: usize) -> TextureId {
        self.commands.current_ps_texture(slot)
    }

    /// Replaces the standard vertex shader for subsequent shapes until
    /// cleared or the frame ends. An invalid shader clears it.
    pub fn set_custom_vs(&mut self, shader: Option<&VertexShader>) {
        match shader {
            Some(shader) if shader.id().is_valid() => {
                self.commands.push_custom_vs(shader);
                self.current_custom_vs = Some(shader.clone());
            }
            _ => self.current_custom_vs = None,
        }
    }

    pub fn custom_vs(&self) -> Option<&VertexShader> {
        self.current_custom_vs.as_ref()
    }

    /// Replaces the standard pixel shader for subsequent shapes until
    /// cleared or the frame ends. An invalid shader clears it.
    pub fn set_custom_ps(&mut self, shader: Option<&PixelShader>) {
        match shader {
            Some(shader) if shader.id().is_valid() => {
                self.commands.push_custom_ps(shader);
                self.current_custom_ps = Some(shader.clone());
            }
            _ => self.current_custom_ps = None,
        }
    }

    pub fn custom_ps(&self) -> Option<&PixelShader> {
        self.current_custom_ps.as_ref()
    }

    /// Uploads `data` to constant buffer `slot` of `stage` at this point of
    /// the frame. Slot 0 holds the engine constants, so an upload there only
    /// reaches draws issued before the engine block is sent again, which
    /// happens before the next draw.
    pub fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, data: &[Vec4]) {
        self.commands.push_constant_buffer(stage, slot, data);
    }

    // --- Frame ---

    /// Replays the recorded frame against the device, then resets the batch
    /// and command stream for the next frame. Custom shaders are cleared.
    pub fn flush(&mut self) {
        profile_function!();

        self.stats = Renderer2DStats::default();
        self.commands.flush();
        self.replay();

        self.batch.reset();
        self.commands.reset();
        self.current_custom_vs = None;
        self.current_custom_ps = None;
    }

    fn replay(&mut self) {
        profile_scope!("replay");

        let Self {
            device,
            batch,
            commands,
            engine,
            stats,
            ..
        } = self;

        let back_buffer = device.back_buffer_size().as_vec2();
        let mut state = ReplayState {
            batch_info: BatchInfo::default(),
            target_size: back_buffer,
            viewport: None,
            screen: screen_transform(back_buffer.x, back_buffer.y),
            transform: Affine2::IDENTITY,
        };
        engine.vs_dirty = true;
        engine.ps_dirty = true;

        for command in commands.commands() {
            let index = command.index;
            tracing::trace!("replay {:?}[{}]", command.ty, index);

            match command.ty {
                CommandType::Null => {}
                CommandType::SetBuffers => batch.set_buffers(device),
                CommandType::UpdateBuffers => {
                    state.batch_info = batch.update_buffers(index, device);
                }
                CommandType::Draw => {
                    let count = commands.get_draw(index);
                    engine.upload(device);
                    device.draw_indexed(
                        count,
                        state.batch_info.start_index_location,
                        state.batch_info.base_vertex_location as i32,
                    );
                    state.batch_info.start_index_location += count;
                    stats.draw_calls += 1;
                    stats.triangle_count += count / 3;
                }
                CommandType::DrawNull => {
                    let count = commands.get_null_draw(index);
                    engine.upload(device);
                    device.draw(count);
                    stats.draw_calls += 1;
                    stats.triangle_count += count / 3;
                }
                CommandType::ColorMul => {
                    engine.set_vs(VS_COLOR_MUL, commands.get_color_mul(index));
                }
                CommandType::ColorAdd => {
                    engine.set_ps(PS_COLOR_ADD, commands.get_color_add(index));
                }
                CommandType::BlendState => device.set_blend_state(commands.get_blend_state(index)),
                CommandType::RasterizerState => {
                    device.set_rasterizer_state(commands.get_rasterizer_state(index));
                }
                CommandType::ScissorRect => device.set_scissor_rect(commands.get_scissor_rect(index)),
                CommandType::Viewport => {
                    state.viewport = commands.get_viewport(index);
                    apply_viewport(device, engine, &mut state);
                }
                CommandType::SdfParams => {
                    let params = commands.get_sdf_params(index).to_vec4s();
                    for (i, value) in params.into_iter().enumerate() {
                        engine.set_ps(PS_SDF_PARAM + i, value);
                    }
                }
                CommandType::InternalPsConstants => {
                    engine.set_ps(PS_INTERNAL, commands.get_internal_ps_constants(index));
                }
                CommandType::SetRenderTarget => {
                    let target = commands.get_render_target(index);
                    state.target_size = match target.valid() {
                        Some(id) => match commands.reserved_texture(id) {
                            Some(texture) => texture.size().as_vec2(),
                            None => {
                                tracing::warn!("Render target {:?} is not reserved", id);
                                back_buffer
                            }
                        },
                        None => back_buffer,
                    };
                    device.set_render_target(target.valid());
                    apply_viewport(device, engine, &mut state);
                }
                CommandType::SetVs => device.set_vertex_shader(commands.get_vs(index).valid()),
                CommandType::SetPs => device.set_pixel_shader(commands.get_ps(index).valid()),
                CommandType::Transform => {
                    state.transform = commands.get_combined_transform(index);
                    engine.set_transform(&(state.screen * state.transform));
                }
                CommandType::SetConstantBuffer => {
                    let (cb, data) = commands.get_constant_buffer(index);
                    device.set_constant_buffer(cb.stage, cb.slot, data);
                    if cb.slot == ENGINE_CONSTANT_SLOT {
                        engine.invalidate(cb.stage);
                    }
                }
                ty => {
                    if let Some((stage, slot)) = ty.sampler_slot() {
                        let sampler = commands.get_sampler_state(stage, slot, index);
                        device.set_sampler_state(stage, slot as u32, sampler);
                    } else if let Some((stage, slot)) = ty.texture_slot() {
                        let texture = commands.get_texture(stage, slot, index);
                        device.set_texture(stage, slot as u32, texture.valid());
                    }
                }
            }
        }
    }
}

fn apply_viewport<D: RenderDevice2D>(device: &mut D, engine: &mut EngineConstants, state: &mut ReplayState) {
    let rect = state.viewport_rect();
    device.set_viewport(rect);
    state.screen = screen_transform(rect.width, rect.height);
    engine.set_transform(&(state.screen * state.transform));
}

impl<D: RenderDevice2D + std::fmt::Debug> std::fmt::Debug for Renderer2D<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer2D")
            .field("device", &self.device)
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("batch_count", &self.batch.batch_count())
            .field("command_count", &self.commands.commands().len())
            .finish()
    }
}
