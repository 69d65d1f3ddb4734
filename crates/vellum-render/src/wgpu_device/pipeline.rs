//! Bind group layouts and the render pipeline cache.
//!
//! Every pipeline shares one layout:
//!
//! | group | binding | resource |
//! |-------|---------|----------|
//! | 0 | 0 | VS constant buffer 0 (engine) |
//! | 0 | 1 | PS constant buffer 0 (engine) |
//! | 0 | 2 | VS constant buffer 1 |
//! | 0 | 3 | PS constant buffer 1 |
//! | 1 | 0 | PS texture 0 |
//! | 1 | 1 | PS sampler 0 |
//!
//! All constant bindings use dynamic offsets into the constant ring.

use std::num::NonZeroU64;

use vellum_core::alloc::HashMap;
use vellum_core::profiling::profile_function;

use super::convert::{color_target_state, primitive_state};
use super::ring::CONSTANT_BLOCK_SIZE;
use crate::{BlendState, CullMode, FillMode, PixelShaderId, Vertex2D, VertexShaderId};

/// Number of dynamic constant bindings in group 0.
pub(crate) const CONSTANT_BINDINGS: usize = 4;

/// Constant buffer slots wired to the pipeline layout, per stage.
pub(crate) const CONSTANT_SLOTS: u32 = 2;

/// Binding of `slot` of a stage within group 0.
pub(crate) fn constant_binding(pixel_stage: bool, slot: u32) -> usize {
    (slot as usize) * 2 + pixel_stage as usize
}

pub(crate) fn create_constant_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    let entries: Vec<_> = (0..CONSTANT_BINDINGS as u32)
        .map(|binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(CONSTANT_BLOCK_SIZE),
            },
            count: None,
        })
        .collect();

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("vellum_constant_layout"),
        entries: &entries,
    })
}

pub(crate) fn create_constant_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    ring: &wgpu::Buffer,
) -> wgpu::BindGroup {
    let entries: Vec<_> = (0..CONSTANT_BINDINGS as u32)
        .map(|binding| wgpu::BindGroupEntry {
            binding,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: ring,
                offset: 0,
                size: NonZeroU64::new(CONSTANT_BLOCK_SIZE),
            }),
        })
        .collect();

    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("vellum_constant_bg"),
        layout,
        entries: &entries,
    })
}

/// Texture + sampler layout (group 1).
pub(crate) fn create_texture_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("vellum_texture_layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

pub(crate) fn create_texture_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    view: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("vellum_texture_bg"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Everything a cached pipeline depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct PipelineKey {
    pub blend: BlendState,
    pub fill: FillMode,
    pub cull: CullMode,
    pub vs: VertexShaderId,
    pub ps: PixelShaderId,
    pub format: wgpu::TextureFormat,
}

/// A shader stage entry: module plus entry point.
pub(crate) struct ShaderStageRef<'a> {
    pub module: &'a wgpu::ShaderModule,
    pub entry_point: &'a str,
}

#[derive(Debug, Default)]
pub(crate) struct PipelineCache {
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
}

impl PipelineCache {
    pub fn contains(&self, key: &PipelineKey) -> bool {
        self.pipelines.contains_key(key)
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&wgpu::RenderPipeline> {
        self.pipelines.get(key)
    }

    pub fn insert(&mut self, key: PipelineKey, pipeline: wgpu::RenderPipeline) {
        self.pipelines.insert(key, pipeline);
    }

    /// Drops pipelines built from a shader that no longer exists.
    pub fn retain_shaders(&mut self, keep: impl Fn(&PipelineKey) -> bool) {
        self.pipelines.retain(|key, _| keep(key));
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }
}

pub(crate) fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    key: &PipelineKey,
    vs: ShaderStageRef<'_>,
    ps: ShaderStageRef<'_>,
    line_mode: bool,
) -> wgpu::RenderPipeline {
    profile_function!();

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("vellum_2d_pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: vs.module,
            entry_point: Some(vs.entry_point),
            buffers: &[Vertex2D::layout()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: ps.module,
            entry_point: Some(ps.entry_point),
            targets: &[Some(color_target_state(&key.blend, key.format))],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: primitive_state(key.fill, key.cull, line_mode),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_binding_layout() {
        assert_eq!(constant_binding(false, 0), 0);
        assert_eq!(constant_binding(true, 0), 1);
        assert_eq!(constant_binding(false, 1), 2);
        assert_eq!(constant_binding(true, 1), 3);
    }
}
