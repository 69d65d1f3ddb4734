//! Graphics context and wgpu device tests.

use std::sync::Arc;

use vellum_render::{
    BatchConfig, Color, FRect, GraphicsContext, GraphicsContextDescriptor, RenderError, Renderer2D,
    Renderer2DConfig, UVec2, Vec2, WgpuDevice2D, wgpu,
};

const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

fn offscreen_view(context: &GraphicsContext, size: UVec2) -> wgpu::TextureView {
    let texture = context.device().create_texture(&wgpu::TextureDescriptor {
        label: Some("test_back_buffer"),
        size: wgpu::Extent3d {
            width: size.x,
            height: size.y,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[test]
#[ignore] // Requires GPU - run with: cargo test --test context_tests -- --ignored
fn test_context_creation_sync() {
    match GraphicsContext::new_owned_sync() {
        Ok(ctx) => {
            assert_eq!(Arc::strong_count(&ctx), 1);
            assert!(ctx.max_texture_dimension_2d() > 0);
            assert!(ctx.min_uniform_buffer_offset_alignment() <= 256);
            assert!(ctx.max_buffer_size() >= ctx.limits().max_uniform_buffer_binding_size as u64);
            assert!(format!("{ctx:?}").contains(&ctx.info().name));
            assert!(ctx.features().contains(wgpu::Features::empty()));
        }
        Err(e) => {
            // Allow test to pass if no GPU (CI environments)
            println!("GPU not available: {:?}", e);
        }
    }
}

#[test]
#[ignore] // Requires GPU
fn test_context_without_optional_features() {
    let descriptor = GraphicsContextDescriptor::new().with_requested_features(wgpu::Features::empty());
    if let Ok(ctx) = GraphicsContext::new_owned_sync_with_descriptor(descriptor) {
        assert!(!ctx.has_feature(wgpu::Features::POLYGON_MODE_LINE));
    }
}

#[test]
#[ignore] // Requires GPU
fn test_device_creation() {
    let Ok(ctx) = GraphicsContext::new_owned_sync() else {
        return;
    };
    let device = WgpuDevice2D::new(ctx.clone(), FORMAT, BatchConfig::default()).unwrap();
    assert_eq!(device.format(), FORMAT);
    assert_eq!(device.pipeline_count(), 0);
    assert_eq!(Arc::strong_count(&ctx), 2);
}

#[test]
#[ignore] // Requires GPU
fn test_frame_renders_to_offscreen_target() {
    let Ok(ctx) = GraphicsContext::new_owned_sync() else {
        return;
    };
    let size = UVec2::new(64, 64);
    let device = WgpuDevice2D::new(ctx.clone(), FORMAT, BatchConfig::default()).unwrap();
    let mut renderer = Renderer2D::new(device, Renderer2DConfig::default());

    for _ in 0..2 {
        renderer
            .device_mut()
            .begin_frame(offscreen_view(&ctx, size), size, Some(Color::BLACK));
        renderer.add_rect(FRect::new(4.0, 4.0, 16.0, 16.0), Color::RED);
        renderer.add_circle(Vec2::new(40.0, 40.0), 10.0, Color::CYAN);
        renderer.flush();
        assert!(renderer.device().recorded_draw_count() > 0);

        renderer.device_mut().submit();
        assert_eq!(renderer.device().recorded_draw_count(), 0);
    }

    // Same state every frame, so the pipeline is built once.
    assert_eq!(renderer.device().pipeline_count(), 1);
}

#[test]
#[ignore] // Requires GPU
fn test_render_texture_round_trip() {
    let Ok(ctx) = GraphicsContext::new_owned_sync() else {
        return;
    };
    let size = UVec2::new(32, 32);
    let mut device = WgpuDevice2D::new(ctx.clone(), FORMAT, BatchConfig::default()).unwrap();
    let target = device.create_render_texture(UVec2::new(16, 16), "offscreen").unwrap();
    let mut renderer = Renderer2D::new(device, Renderer2DConfig::default());

    renderer
        .device_mut()
        .begin_frame(offscreen_view(&ctx, size), size, None);
    renderer.set_render_target(Some(&target));
    renderer.add_rect(FRect::new(0.0, 0.0, 16.0, 16.0), Color::GREEN);
    renderer.set_render_target(None);
    renderer.add_full_screen_triangle(Some(&target));
    renderer.flush();
    renderer.device_mut().submit();

    // handle held by the device, the renderer's baseline and the test
    assert!(target.handle_count() >= 2);
    let textures = renderer.device().texture_count();
    drop(target);
    renderer.flush();
    renderer.device_mut().submit();
    assert!(renderer.device().texture_count() <= textures);
}

#[test]
#[ignore] // Requires GPU
fn test_invalid_texture_dimensions() {
    let Ok(ctx) = GraphicsContext::new_owned_sync() else {
        return;
    };
    let mut device = WgpuDevice2D::new(ctx, FORMAT, BatchConfig::default()).unwrap();
    let err = device.create_texture(UVec2::new(0, 4), &[], "empty").unwrap_err();
    assert_eq!(err, RenderError::InvalidDimensions { width: 0, height: 4 });
}

#[test]
fn test_render_error_display() {
    let err = RenderError::NoAdapter;
    let display = format!("{:?}", err);
    assert!(display.contains("NoAdapter"));
    assert_eq!(err.to_string(), "No suitable GPU adapter found");
}
