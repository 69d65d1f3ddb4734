//! wgpu implementation of [`RenderDevice2D`].
//!
//! wgpu has no immediate-mode context, so the device keeps the bound state
//! itself and turns every draw into a recorded draw that captures the
//! pipeline, bind groups, viewport and scissor in effect. Recorded draws are
//! encoded into render passes (one per run of draws on the same target) when
//! [`WgpuDevice2D::submit`] is called.
//!
//! Only PS texture/sampler slot 0 and constant buffer slots 0 and 1 reach
//! the shaders; other slots are tracked but not bound.

mod convert;
mod pipeline;
mod ring;
mod sampler;

use std::sync::Arc;

use vellum_core::alloc::HashMap;
use vellum_core::geometry::{FRect, IRect};
use vellum_core::math::{UVec2, Vec4};
use vellum_core::profiling::{profile_function, profile_scope};

use crate::{
    BatchConfig, BlendState, Color, GraphicsContext, IndexType, MapMode, PixelShader,
    PixelShaderId, RasterizerState, RenderDevice2D, RenderError, SamplerState, ShaderStage,
    StandardShaders, Texture, TextureId, Vertex2D, VertexShader, VertexShaderId,
};
use pipeline::{
    CONSTANT_BINDINGS, CONSTANT_SLOTS, PipelineCache, PipelineKey, ShaderStageRef,
    constant_binding, create_constant_bind_group, create_constant_bind_group_layout,
    create_pipeline, create_texture_bind_group, create_texture_bind_group_layout,
};
use ring::{CONSTANT_BLOCK_VECTORS, ConstantRing, fit_block};
use sampler::SamplerCache;

const STANDARD_SHADER_SOURCE: &str = include_str!("../shaders/standard2d.wgsl");

/// Default size of the constant ring in bytes.
const DEFAULT_CONSTANT_RING_SIZE: u64 = 1 << 20;

/// Runs `f` inside a validation error scope.
fn with_validation<T>(device: &wgpu::Device, what: &str, f: impl FnOnce() -> T) -> Result<T, RenderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    match pollster::block_on(device.pop_error_scope()) {
        Some(err) => Err(RenderError::Initialization(format!("{what}: {err}"))),
        None => Ok(value),
    }
}

/// Rejects a streaming buffer the device cannot allocate.
fn check_buffer_size(what: &str, bytes: u64, max: u64) -> Result<(), RenderError> {
    if bytes > max {
        return Err(RenderError::Initialization(format!(
            "{what} needs {bytes} bytes but the device allows at most {max}"
        )));
    }
    Ok(())
}

/// Who owns a shader. User shaders are collected once only the device
/// holds their handle.
enum ShaderOwner {
    Standard,
    Vertex(VertexShader),
    Pixel(PixelShader),
}

struct ShaderEntry {
    module: Arc<wgpu::ShaderModule>,
    entry_point: String,
    owner: ShaderOwner,
}

impl ShaderEntry {
    fn stage(&self) -> ShaderStageRef<'_> {
        ShaderStageRef {
            module: &self.module,
            entry_point: &self.entry_point,
        }
    }

    fn is_unused(&self) -> bool {
        match &self.owner {
            ShaderOwner::Standard => false,
            ShaderOwner::Vertex(handle) => handle.handle_count() <= 1,
            ShaderOwner::Pixel(handle) => handle.handle_count() <= 1,
        }
    }
}

struct TextureEntry {
    handle: Texture,
    view: wgpu::TextureView,
    _texture: wgpu::Texture,
}

#[derive(Debug, Clone, Copy)]
enum DrawKind {
    Indexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    },
    Vertices {
        vertex_count: u32,
    },
}

#[derive(Debug, Clone, Copy)]
struct RecordedDraw {
    target: Option<TextureId>,
    pipeline: PipelineKey,
    texture: (TextureId, SamplerState),
    constant_offsets: [u32; CONSTANT_BINDINGS],
    viewport: FRect,
    scissor: IRect,
    kind: DrawKind,
}

/// A [`RenderDevice2D`] drawing with wgpu.
///
/// # Example
///
/// ```ignore
/// let device = WgpuDevice2D::new(context, surface_format, BatchConfig::default())?;
/// let mut renderer = Renderer2D::new(device, Renderer2DConfig::default());
///
/// // each frame
/// renderer.device_mut().begin_frame(view, size, Some(Color::BLACK));
/// // ... add_* calls ...
/// renderer.flush();
/// renderer.device_mut().submit();
/// ```
pub struct WgpuDevice2D {
    context: Arc<GraphicsContext>,
    format: wgpu::TextureFormat,
    line_mode: bool,

    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    vertex_capacity: u32,
    index_capacity: u32,
    index_scratch: Vec<u32>,
    buffers_bound: bool,

    _constant_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    constant_bind_group: wgpu::BindGroup,
    constant_ring: ConstantRing,
    constant_offsets: [u32; CONSTANT_BINDINGS],
    constant_shadow: [Vec<Vec4>; CONSTANT_BINDINGS],

    pipelines: PipelineCache,
    samplers: SamplerCache,
    texture_bind_groups: HashMap<(TextureId, SamplerState), wgpu::BindGroup>,

    standard: StandardShaders,
    vertex_shaders: HashMap<VertexShaderId, ShaderEntry>,
    pixel_shaders: HashMap<PixelShaderId, ShaderEntry>,
    textures: HashMap<TextureId, TextureEntry>,
    fallback_view: wgpu::TextureView,
    _fallback_texture: wgpu::Texture,
    next_id: u32,

    // bound state
    blend: BlendState,
    rasterizer: RasterizerState,
    ps_sampler0: SamplerState,
    ps_texture0: Option<TextureId>,
    scissor: IRect,
    viewport: FRect,
    vs: Option<VertexShaderId>,
    ps: Option<PixelShaderId>,
    target: Option<TextureId>,

    frame_view: Option<wgpu::TextureView>,
    back_buffer_size: UVec2,
    pending_clears: HashMap<Option<TextureId>, Color>,
    recorded: Vec<RecordedDraw>,
}

impl WgpuDevice2D {
    /// Creates the device, its streaming buffers and the standard shaders.
    ///
    /// `format` is the format of the surface (and of render textures created
    /// through this device). Buffer capacities come from `batch`, which
    /// should be the same config the renderer uses.
    pub fn new(
        context: Arc<GraphicsContext>,
        format: wgpu::TextureFormat,
        batch: BatchConfig,
    ) -> Result<Self, RenderError> {
        profile_function!();

        let batch = batch.sanitized();
        let device = context.device();

        let line_mode = context.has_feature(wgpu::Features::POLYGON_MODE_LINE);
        let border_supported = context.has_feature(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);

        let vertex_bytes = batch.vertex_buffer_size as u64 * Vertex2D::SIZE;
        let index_bytes = batch.index_buffer_size as u64 * std::mem::size_of::<u32>() as u64;
        check_buffer_size("vertex buffer", vertex_bytes, context.max_buffer_size())?;
        check_buffer_size("index buffer", index_bytes, context.max_buffer_size())?;

        let (vertex_buffer, index_buffer) = with_validation(device, "streaming buffers", || {
            let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("vellum_vertex_buffer"),
                size: vertex_bytes,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("vellum_index_buffer"),
                size: index_bytes,
                usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            (vertex_buffer, index_buffer)
        })?;

        let constant_layout = create_constant_bind_group_layout(device);
        let texture_layout = create_texture_bind_group_layout(device);
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("vellum_2d_pipeline_layout"),
            bind_group_layouts: &[&constant_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let constant_ring = ConstantRing::new(
            device,
            DEFAULT_CONSTANT_RING_SIZE,
            context.min_uniform_buffer_offset_alignment(),
        );
        let constant_bind_group = create_constant_bind_group(device, &constant_layout, constant_ring.buffer());

        let module = with_validation(device, "standard shaders", || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("vellum_standard2d"),
                source: wgpu::ShaderSource::Wgsl(STANDARD_SHADER_SOURCE.into()),
            })
        })?;
        let module = Arc::new(module);

        let (fallback_texture, fallback_view) = create_fallback_texture(&context);

        let standard = StandardShaders {
            sprite_vs: VertexShaderId(0),
            full_screen_triangle_vs: VertexShaderId(1),
            shape_ps: PixelShaderId(2),
            texture_ps: PixelShaderId(3),
        };
        let standard_entry = |entry_point: &str| ShaderEntry {
            module: Arc::clone(&module),
            entry_point: entry_point.to_owned(),
            owner: ShaderOwner::Standard,
        };
        let mut vertex_shaders = HashMap::default();
        vertex_shaders.insert(standard.sprite_vs, standard_entry("vs_sprite"));
        vertex_shaders.insert(standard.full_screen_triangle_vs, standard_entry("vs_full_screen_triangle"));
        let mut pixel_shaders = HashMap::default();
        pixel_shaders.insert(standard.shape_ps, standard_entry("ps_shape"));
        pixel_shaders.insert(standard.texture_ps, standard_entry("ps_texture"));

        let info = context.info();
        tracing::info!(
            "Created WgpuDevice2D on {} ({:?}, {:?}, {} vertices / {} indices, wireframe: {})",
            info.name,
            info.backend,
            format,
            batch.vertex_buffer_size,
            batch.index_buffer_size,
            line_mode
        );

        Ok(Self {
            format,
            line_mode,
            vertex_buffer,
            index_buffer,
            vertex_capacity: batch.vertex_buffer_size,
            index_capacity: batch.index_buffer_size,
            index_scratch: Vec::new(),
            buffers_bound: false,
            _constant_layout: constant_layout,
            texture_layout,
            pipeline_layout,
            constant_bind_group,
            constant_ring,
            constant_offsets: [0; CONSTANT_BINDINGS],
            constant_shadow: Default::default(),
            pipelines: PipelineCache::default(),
            samplers: SamplerCache::new(border_supported),
            texture_bind_groups: HashMap::default(),
            standard,
            vertex_shaders,
            pixel_shaders,
            textures: HashMap::default(),
            fallback_view,
            _fallback_texture: fallback_texture,
            next_id: 4,
            blend: BlendState::DEFAULT_2D,
            rasterizer: RasterizerState::DEFAULT_2D,
            ps_sampler0: SamplerState::DEFAULT_2D,
            ps_texture0: None,
            scissor: IRect::default(),
            viewport: FRect::default(),
            vs: None,
            ps: None,
            target: None,
            frame_view: None,
            back_buffer_size: UVec2::ZERO,
            pending_clears: HashMap::default(),
            recorded: Vec::new(),
            context,
        })
    }

    pub fn context(&self) -> &Arc<GraphicsContext> {
        &self.context
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Sets the surface view drawn to while no render target is bound.
    /// With `clear`, the first pass on the back buffer clears it.
    pub fn begin_frame(&mut self, view: wgpu::TextureView, size: UVec2, clear: Option<Color>) {
        self.frame_view = Some(view);
        self.back_buffer_size = size;
        if let Some(color) = clear {
            self.pending_clears.insert(None, color);
        }
    }

    /// Clears `target` (or the back buffer) before the next draw on it.
    pub fn clear_target(&mut self, target: Option<&Texture>, color: Color) {
        self.pending_clears.insert(target.map(Texture::id), color);
    }

    /// Compiles a WGSL vertex shader using the standard binding layout.
    pub fn create_vertex_shader(
        &mut self,
        source: &str,
        entry_point: &str,
        label: &str,
    ) -> Result<VertexShader, RenderError> {
        let module = self.create_module(source, label)?;
        let id = VertexShaderId(self.allocate_id());
        let handle = VertexShader::new(id, label);
        self.vertex_shaders.insert(
            id,
            ShaderEntry {
                module: Arc::new(module),
                entry_point: entry_point.to_owned(),
                owner: ShaderOwner::Vertex(handle.clone()),
            },
        );
        tracing::debug!("Created vertex shader {:?} ({})", id, label);
        Ok(handle)
    }

    /// Compiles a WGSL fragment shader using the standard binding layout.
    pub fn create_pixel_shader(
        &mut self,
        source: &str,
        entry_point: &str,
        label: &str,
    ) -> Result<PixelShader, RenderError> {
        let module = self.create_module(source, label)?;
        let id = PixelShaderId(self.allocate_id());
        let handle = PixelShader::new(id, label);
        self.pixel_shaders.insert(
            id,
            ShaderEntry {
                module: Arc::new(module),
                entry_point: entry_point.to_owned(),
                owner: ShaderOwner::Pixel(handle.clone()),
            },
        );
        tracing::debug!("Created pixel shader {:?} ({})", id, label);
        Ok(handle)
    }

    fn create_module(&self, source: &str, label: &str) -> Result<wgpu::ShaderModule, RenderError> {
        let device = self.context.device();
        with_validation(device, label, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        })
    }

    fn check_dimensions(&self, size: UVec2) -> Result<(), RenderError> {
        let max = self.context.max_texture_dimension_2d();
        if size.x == 0 || size.y == 0 || size.x > max || size.y > max {
            return Err(RenderError::InvalidDimensions {
                width: size.x,
                height: size.y,
            });
        }
        Ok(())
    }

    /// Creates an RGBA8 (sRGB) texture from tightly packed pixels.
    pub fn create_texture(&mut self, size: UVec2, rgba: &[u8], label: &str) -> Result<Texture, RenderError> {
        profile_function!();
        self.check_dimensions(size)?;
        let expected = size.x as usize * size.y as usize * 4;
        if rgba.len() != expected {
            return Err(RenderError::Initialization(format!(
                "{label}: expected {expected} bytes of RGBA data, got {}",
                rgba.len()
            )));
        }

        let extent = wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        };
        let device = self.context.device();
        let texture = with_validation(device, label, || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        })?;
        self.context.queue().write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.x),
                rows_per_image: Some(size.y),
            },
            extent,
        );

        Ok(self.register_texture(texture, size, false, label))
    }

    /// Creates a texture that can be bound as a render target. It uses the
    /// device's surface format.
    pub fn create_render_texture(&mut self, size: UVec2, label: &str) -> Result<Texture, RenderError> {
        profile_function!();
        self.check_dimensions(size)?;

        let device = self.context.device();
        let format = self.format;
        let texture = with_validation(device, label, || {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size.x,
                    height: size.y,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
        })?;

        Ok(self.register_texture(texture, size, true, label))
    }

    fn register_texture(&mut self, texture: wgpu::Texture, size: UVec2, render_target: bool, label: &str) -> Texture {
        let id = TextureId(self.allocate_id());
        let handle = Texture::new(id, size, render_target, Some(label));
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        self.textures.insert(
            id,
            TextureEntry {
                handle: handle.clone(),
                view,
                _texture: texture,
            },
        );
        tracing::debug!("Created texture {:?} ({}x{}, {})", id, size.x, size.y, label);
        handle
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn recorded_draw_count(&self) -> usize {
        self.recorded.len()
    }

    fn target_size(&self, target: Option<TextureId>) -> UVec2 {
        target
            .and_then(|id| self.textures.get(&id))
            .map(|entry| entry.handle.size())
            .unwrap_or(self.back_buffer_size)
    }

    fn target_format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Resolves the pipeline for the bound state, creating it on first use.
    fn prepare_pipeline(&mut self) -> Option<PipelineKey> {
        let (Some(vs), Some(ps)) = (self.vs, self.ps) else {
            tracing::warn!("Draw without a bound shader skipped");
            return None;
        };

        let key = PipelineKey {
            blend: self.blend,
            fill: self.rasterizer.fill_mode,
            cull: self.rasterizer.cull_mode,
            vs,
            ps,
            format: self.target_format(),
        };
        if self.pipelines.contains(&key) {
            return Some(key);
        }

        let (Some(vs_entry), Some(ps_entry)) = (self.vertex_shaders.get(&vs), self.pixel_shaders.get(&ps)) else {
            tracing::warn!("Draw with unknown shader {:?}/{:?} skipped", vs, ps);
            return None;
        };

        let device = self.context.device();
        let result = with_validation(device, "2D pipeline", || {
            create_pipeline(
                device,
                &self.pipeline_layout,
                &key,
                vs_entry.stage(),
                ps_entry.stage(),
                self.line_mode,
            )
        });
        match result {
            Ok(pipeline) => {
                self.pipelines.insert(key, pipeline);
                Some(key)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                None
            }
        }
    }

    /// Resolves the texture bind group for PS slot 0.
    fn prepare_texture(&mut self) -> (TextureId, SamplerState) {
        let id = match self.ps_texture0 {
            Some(id) if self.textures.contains_key(&id) && Some(id) != self.target => id,
            _ => TextureId::INVALID,
        };
        let key = (id, self.ps_sampler0);
        if !self.texture_bind_groups.contains_key(&key) {
            let device = self.context.device();
            let sampler = self.samplers.get_or_create(device, self.ps_sampler0);
            let view = self
                .textures
                .get(&id)
                .map(|entry| &entry.view)
                .unwrap_or(&self.fallback_view);
            let bind_group = create_texture_bind_group(device, &self.texture_layout, view, &sampler);
            self.texture_bind_groups.insert(key, bind_group);
        }
        key
    }

    /// Pixel-space scissor for the bound state, clamped to the target.
    fn effective_scissor(&self, target_size: UVec2) -> IRect {
        let full = IRect::new(0, 0, target_size.x as i32, target_size.y as i32);
        if self.rasterizer.scissor_enable {
            self.scissor.intersect(&full)
        } else {
            full
        }
    }

    fn record(&mut self, kind: DrawKind) {
        let Some(pipeline) = self.prepare_pipeline() else {
            return;
        };
        let texture = self.prepare_texture();
        let target_size = self.target_size(self.target);
        let scissor = self.effective_scissor(target_size);
        if scissor.width <= 0 || scissor.height <= 0 {
            return;
        }

        self.recorded.push(RecordedDraw {
            target: self.target,
            pipeline,
            texture,
            constant_offsets: self.constant_offsets,
            viewport: self.viewport,
            scissor,
            kind,
        });
    }

    /// Encodes and submits every recorded draw and pending clear.
    pub fn submit(&mut self) {
        profile_function!();
        self.flush_recorded();
        self.frame_view = None;
        self.collect_unused();
    }

    fn flush_recorded(&mut self) {
        if self.recorded.is_empty() && self.pending_clears.is_empty() {
            return;
        }

        let mut encoder = self
            .context
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("vellum_2d_encoder"),
            });

        {
            profile_scope!("encode_passes");
            let recorded = std::mem::take(&mut self.recorded);
            let mut start = 0;
            while start < recorded.len() {
                let target = recorded[start].target;
                let end = recorded[start..]
                    .iter()
                    .position(|draw| draw.target != target)
                    .map_or(recorded.len(), |n| start + n);
                self.encode_pass(&mut encoder, target, &recorded[start..end]);
                start = end;
            }

            // clears without draws
            let targets: Vec<_> = self.pending_clears.keys().copied().collect();
            for target in targets {
                self.encode_pass(&mut encoder, target, &[]);
            }
        }

        self.context.queue().submit(std::iter::once(encoder.finish()));
        self.constant_ring.rewind();
        self.restore_constants();
    }

    fn encode_pass(&mut self, encoder: &mut wgpu::CommandEncoder, target: Option<TextureId>, draws: &[RecordedDraw]) {
        let view = match target {
            Some(id) => self.textures.get(&id).map(|entry| &entry.view),
            None => self.frame_view.as_ref(),
        };
        let Some(view) = view else {
            tracing::warn!("No view for target {:?}; {} draws dropped", target, draws.len());
            self.pending_clears.remove(&target);
            return;
        };

        let load = match self.pending_clears.get(&target) {
            Some(color) => wgpu::LoadOp::Clear(color.to_wgpu()),
            None => wgpu::LoadOp::Load,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("vellum_2d_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

        let mut current_pipeline = None;
        for draw in draws {
            let Some(pipeline) = self.pipelines.get(&draw.pipeline) else {
                continue;
            };
            let Some(texture_group) = self.texture_bind_groups.get(&draw.texture) else {
                continue;
            };

            if current_pipeline != Some(draw.pipeline) {
                pass.set_pipeline(pipeline);
                current_pipeline = Some(draw.pipeline);
            }
            pass.set_bind_group(0, &self.constant_bind_group, &draw.constant_offsets);
            pass.set_bind_group(1, texture_group, &[]);

            let vp = draw.viewport;
            pass.set_viewport(vp.x, vp.y, vp.width.max(1.0), vp.height.max(1.0), 0.0, 1.0);
            let s = draw.scissor;
            pass.set_scissor_rect(s.x as u32, s.y as u32, s.width as u32, s.height as u32);

            match draw.kind {
                DrawKind::Indexed {
                    index_count,
                    start_index,
                    base_vertex,
                } => pass.draw_indexed(start_index..start_index + index_count, base_vertex, 0..1),
                DrawKind::Vertices { vertex_count } => pass.draw(0..vertex_count, 0..1),
            }
        }

        drop(pass);
        self.pending_clears.remove(&target);
    }

    /// After a rewind, bound constant blocks may be overwritten; upload them
    /// again so later draws keep seeing the same data.
    fn restore_constants(&mut self) {
        for binding in 0..CONSTANT_BINDINGS {
            if self.constant_offsets[binding] == 0 {
                continue;
            }
            let data = std::mem::take(&mut self.constant_shadow[binding]);
            self.constant_offsets[binding] = self
                .constant_ring
                .push(self.context.queue(), &data)
                .unwrap_or(0);
            self.constant_shadow[binding] = data;
        }
    }

    /// Drops user resources only this device still refers to.
    fn collect_unused(&mut self) {
        profile_scope!("collect_unused");

        let before = self.textures.len();
        self.textures.retain(|_, entry| entry.handle.handle_count() > 1);
        if self.textures.len() != before {
            let textures = &self.textures;
            self.texture_bind_groups
                .retain(|(id, _), _| !id.is_valid() || textures.contains_key(id));
            tracing::debug!("Collected {} unused textures", before - self.textures.len());
        }

        let vs_before = self.vertex_shaders.len();
        let ps_before = self.pixel_shaders.len();
        self.vertex_shaders.retain(|_, entry| !entry.is_unused());
        self.pixel_shaders.retain(|_, entry| !entry.is_unused());
        if self.vertex_shaders.len() != vs_before || self.pixel_shaders.len() != ps_before {
            let vertex_shaders = &self.vertex_shaders;
            let pixel_shaders = &self.pixel_shaders;
            self.pipelines.retain_shaders(|key| {
                vertex_shaders.contains_key(&key.vs) && pixel_shaders.contains_key(&key.ps)
            });
        }
    }

    fn write_checked(&self, what: &str, offset: u32, len: usize, capacity: u32) -> Result<(), RenderError> {
        if offset as u64 + len as u64 > capacity as u64 {
            return Err(RenderError::BufferMap(format!(
                "{what} write of {len} at {offset} exceeds capacity {capacity}"
            )));
        }
        Ok(())
    }
}

impl RenderDevice2D for WgpuDevice2D {
    fn standard_shaders(&self) -> StandardShaders {
        self.standard
    }

    fn back_buffer_size(&self) -> UVec2 {
        self.back_buffer_size
    }

    fn set_buffers(&mut self) {
        self.buffers_bound = true;
    }

    fn upload_vertices(&mut self, mode: MapMode, offset: u32, vertices: &[Vertex2D]) -> Result<(), RenderError> {
        self.write_checked("vertex", offset, vertices.len(), self.vertex_capacity)?;
        if mode == MapMode::Discard {
            // queue writes land before the next submission; flush draws reading the old data
            self.flush_recorded();
        }
        self.context.queue().write_buffer(
            &self.vertex_buffer,
            offset as u64 * Vertex2D::SIZE,
            bytemuck::cast_slice(vertices),
        );
        Ok(())
    }

    fn upload_indices(&mut self, mode: MapMode, offset: u32, indices: &[IndexType]) -> Result<(), RenderError> {
        self.write_checked("index", offset, indices.len(), self.index_capacity)?;
        if mode == MapMode::Discard {
            self.flush_recorded();
        }
        self.index_scratch.clear();
        self.index_scratch.extend(indices.iter().map(|&i| i as u32));
        self.context.queue().write_buffer(
            &self.index_buffer,
            offset as u64 * std::mem::size_of::<u32>() as u64,
            bytemuck::cast_slice(&self.index_scratch),
        );
        Ok(())
    }

    fn set_blend_state(&mut self, state: BlendState) {
        self.blend = state;
    }

    fn set_rasterizer_state(&mut self, state: RasterizerState) {
        if state.fill_mode == crate::FillMode::Wireframe && !self.line_mode {
            tracing::warn!("POLYGON_MODE_LINE unavailable; wireframe drawn filled");
        }
        self.rasterizer = state;
    }

    fn set_sampler_state(&mut self, stage: ShaderStage, slot: u32, state: SamplerState) {
        if stage == ShaderStage::Pixel && slot == 0 {
            self.ps_sampler0 = state;
        }
    }

    fn set_scissor_rect(&mut self, rect: IRect) {
        self.scissor = rect;
    }

    fn set_viewport(&mut self, viewport: FRect) {
        self.viewport = viewport;
    }

    fn set_vertex_shader(&mut self, shader: Option<VertexShaderId>) {
        self.vs = shader;
    }

    fn set_pixel_shader(&mut self, shader: Option<PixelShaderId>) {
        self.ps = shader;
    }

    fn set_texture(&mut self, stage: ShaderStage, slot: u32, texture: Option<TextureId>) {
        if stage == ShaderStage::Pixel && slot == 0 {
            self.ps_texture0 = texture;
        } else if texture.is_some() {
            tracing::trace!("{:?} texture slot {} is not bound by the wgpu device", stage, slot);
        }
    }

    fn set_render_target(&mut self, target: Option<TextureId>) {
        self.target = match target {
            Some(id) if self.textures.get(&id).is_some_and(|e| e.handle.is_render_target()) => Some(id),
            Some(id) => {
                tracing::warn!("{:?} is not a render texture; drawing to the back buffer", id);
                None
            }
            None => None,
        };
    }

    fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, data: &[Vec4]) {
        if slot >= CONSTANT_SLOTS {
            tracing::warn!("Constant buffer slot {} is not supported by the wgpu device", slot);
            return;
        }
        let binding = constant_binding(stage == ShaderStage::Pixel, slot);

        let (data, dropped) = fit_block(data);
        if dropped > 0 {
            tracing::warn!(
                "Constant buffer upload to {:?} slot {} exceeds {} vectors; dropping the last {}",
                stage,
                slot,
                CONSTANT_BLOCK_VECTORS,
                dropped
            );
        }

        let offset = match self.constant_ring.push(self.context.queue(), data) {
            Some(offset) => offset,
            None => {
                tracing::debug!("Constant ring full; submitting early");
                self.flush_recorded();
                self.constant_ring.rewind();
                self.restore_constants();
                match self.constant_ring.push(self.context.queue(), data) {
                    Some(offset) => offset,
                    None => {
                        tracing::warn!("Constant ring too small for upload");
                        return;
                    }
                }
            }
        };

        self.constant_offsets[binding] = offset;
        self.constant_shadow[binding].clear();
        self.constant_shadow[binding].extend_from_slice(data);
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        if !self.buffers_bound {
            tracing::warn!("draw_indexed before set_buffers skipped");
            return;
        }
        self.record(DrawKind::Indexed {
            index_count,
            start_index,
            base_vertex,
        });
    }

    fn draw(&mut self, vertex_count: u32) {
        self.record(DrawKind::Vertices { vertex_count });
    }
}

impl std::fmt::Debug for WgpuDevice2D {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice2D")
            .field("format", &self.format)
            .field("back_buffer_size", &self.back_buffer_size)
            .field("textures", &self.textures.len())
            .field("pipelines", &self.pipelines.len())
            .field("samplers", &self.samplers.len())
            .field("recorded", &self.recorded.len())
            .finish()
    }
}

/// A 1x1 white texture bound when no texture is set.
fn create_fallback_texture(context: &GraphicsContext) -> (wgpu::Texture, wgpu::TextureView) {
    let extent = wgpu::Extent3d {
        width: 1,
        height: 1,
        depth_or_array_layers: 1,
    };
    let texture = context.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("vellum_fallback_texture"),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    context.queue().write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &[255, 255, 255, 255],
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4),
            rows_per_image: Some(1),
        },
        extent,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}
