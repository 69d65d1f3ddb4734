//! End-to-end replay tests for `Renderer2D` against the recording mock
//! device (no GPU required).

use vellum_render::{
    BatchConfig, BlendState, Color, FRect, IRect, MapMode, RasterizerState, Renderer2D,
    Renderer2DConfig, Renderer2DStats, SamplerState, ShaderStage, TextureId, UVec2, Vec2, Vec4,
};
use vellum_test_utils::{CallLog, DeviceCall, MockDevice2D};

fn renderer() -> (Renderer2D<MockDevice2D>, CallLog) {
    renderer_with(Renderer2DConfig::default())
}

fn renderer_with(config: Renderer2DConfig) -> (Renderer2D<MockDevice2D>, CallLog) {
    let device = MockDevice2D::new();
    let log = device.log();
    (Renderer2D::new(device, config), log)
}

fn rect(x: f32) -> FRect {
    FRect::new(x, 0.0, 10.0, 10.0)
}

fn engine_vs_blocks(log: &CallLog) -> Vec<Vec<Vec4>> {
    log.calls()
        .into_iter()
        .filter_map(|call| match call {
            DeviceCall::SetConstantBuffer {
                stage: ShaderStage::Vertex,
                slot: 0,
                data,
            } => Some(data),
            _ => None,
        })
        .collect()
}

#[test]
fn test_two_rects_become_one_draw() {
    let (mut renderer, log) = renderer();

    renderer.add_rect(rect(0.0), Color::RED);
    renderer.add_rect(rect(20.0), Color::GREEN);
    renderer.flush();

    assert_eq!(log.draw_indexed_calls(), vec![(12, 0, 0)]);
    assert_eq!(
        renderer.stats(),
        Renderer2DStats {
            draw_calls: 1,
            triangle_count: 4,
        }
    );
    assert_eq!(log.vertex_uploads(), vec![(MapMode::NoOverwrite, 0, 8)]);
}

#[test]
fn test_state_change_splits_draw() {
    let (mut renderer, log) = renderer();

    renderer.add_rect(rect(0.0), Color::RED);
    renderer.set_blend_state(BlendState::ADDITIVE);
    renderer.add_rect(rect(20.0), Color::RED);
    renderer.flush();

    assert_eq!(log.draw_indexed_calls(), vec![(6, 0, 0), (6, 6, 0)]);

    let calls = log.calls();
    let additive = calls
        .iter()
        .position(|c| *c == DeviceCall::SetBlendState(BlendState::ADDITIVE))
        .unwrap();
    let draws: Vec<_> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_draw())
        .map(|(i, _)| i)
        .collect();
    assert!(draws[0] < additive && additive < draws[1]);
}

#[test]
fn test_round_trip_state_keeps_single_draw() {
    let (mut renderer, log) = renderer();

    renderer.add_rect(rect(0.0), Color::RED);
    renderer.set_color_mul(Color::BLUE);
    renderer.set_color_mul(Color::WHITE);
    renderer.add_rect(rect(20.0), Color::RED);
    renderer.flush();

    assert_eq!(log.draw_indexed_calls(), vec![(12, 0, 0)]);
}

#[test]
fn test_every_frame_starts_from_same_baseline() {
    let (mut renderer, log) = renderer();

    renderer.set_blend_state(BlendState::ADDITIVE);
    renderer.add_rect(rect(0.0), Color::RED);
    renderer.flush();

    log.clear();
    renderer.flush();
    let second = log.calls();

    log.clear();
    renderer.flush();
    let third = log.calls();

    assert_eq!(second, third);
    assert_eq!(second[0], DeviceCall::SetBuffers);
    // state from the previous frame is rebound by the baseline
    assert!(second.contains(&DeviceCall::SetBlendState(BlendState::ADDITIVE)));
    assert!(!second.iter().any(DeviceCall::is_draw));
    assert_eq!(renderer.stats(), Renderer2DStats::default());
}

#[test]
fn test_baseline_binds_every_slot() {
    let (mut renderer, log) = renderer();
    renderer.flush();

    for slot in 0..8 {
        assert_eq!(log.texture_binds(ShaderStage::Vertex, slot), vec![None]);
        assert_eq!(log.texture_binds(ShaderStage::Pixel, slot), vec![None]);
    }
    let samplers = log.count(|c| matches!(c, DeviceCall::SetSamplerState { .. }));
    assert_eq!(samplers, 16);
    assert_eq!(log.count(|c| *c == DeviceCall::SetRenderTarget(None)), 1);
    assert_eq!(log.count(|c| matches!(c, DeviceCall::SetRasterizerState(_))), 1);
}

#[test]
fn test_unbind_texture_emits_single_bind() {
    let (mut renderer, log) = renderer();
    let texture = renderer.device_mut().create_texture(UVec2::new(8, 8));

    renderer.set_ps_texture(0, &texture);
    renderer.add_rect(rect(0.0), Color::RED);
    renderer.unbind_ps_texture(0);
    assert_eq!(renderer.ps_texture(0), TextureId::INVALID);
    renderer.add_rect(rect(20.0), Color::RED);
    renderer.flush();

    assert_eq!(
        log.texture_binds(ShaderStage::Pixel, 0),
        vec![None, Some(texture.id()), None]
    );
    assert_eq!(log.draw_indexed_calls().len(), 2);
}

#[test]
fn test_textured_rect_uses_texture_shader() {
    let (mut renderer, log) = renderer();
    let texture = renderer.device_mut().create_texture(UVec2::new(8, 8));
    let shaders = vellum_render::RenderDevice2D::standard_shaders(renderer.device());

    renderer.add_textured_rect(rect(0.0), FRect::new(0.0, 0.0, 1.0, 1.0), &texture, Color::WHITE);
    assert_eq!(texture.handle_count(), 2);
    renderer.flush();

    assert!(log.calls().contains(&DeviceCall::SetPixelShader(Some(shaders.texture_ps))));
    assert!(log.calls().contains(&DeviceCall::SetVertexShader(Some(shaders.sprite_vs))));
    assert_eq!(log.texture_binds(ShaderStage::Pixel, 0).last(), Some(&Some(texture.id())));
}

#[test]
fn test_custom_shaders_replace_standard_until_flush() {
    let (mut renderer, log) = renderer();
    let vs = renderer.device_mut().create_vertex_shader("wave");
    let ps = renderer.device_mut().create_pixel_shader("tint");

    renderer.set_custom_vs(Some(&vs));
    renderer.set_custom_ps(Some(&ps));
    renderer.add_rect(rect(0.0), Color::RED);
    assert_eq!(renderer.custom_vs().map(|s| s.id()), Some(vs.id()));
    renderer.flush();

    assert!(log.calls().contains(&DeviceCall::SetVertexShader(Some(vs.id()))));
    assert!(log.calls().contains(&DeviceCall::SetPixelShader(Some(ps.id()))));
    assert!(renderer.custom_vs().is_none());
    assert!(renderer.custom_ps().is_none());

    // Next frame falls back to the standard shaders.
    log.clear();
    renderer.add_rect(rect(0.0), Color::RED);
    renderer.flush();
    let shaders = vellum_render::RenderDevice2D::standard_shaders(renderer.device());
    assert!(log.calls().contains(&DeviceCall::SetVertexShader(Some(shaders.sprite_vs))));
    assert!(log.calls().contains(&DeviceCall::SetPixelShader(Some(shaders.shape_ps))));
}

#[test]
fn test_clearing_custom_shader() {
    let (mut renderer, _log) = renderer();
    let vs = renderer.device_mut().create_vertex_shader("wave");

    renderer.set_custom_vs(Some(&vs));
    renderer.set_custom_vs(None);
    assert!(renderer.custom_vs().is_none());
}

#[test]
fn test_full_screen_triangle_is_null_draw() {
    let (mut renderer, log) = renderer();
    let shaders = vellum_render::RenderDevice2D::standard_shaders(renderer.device());

    renderer.add_full_screen_triangle(None);
    renderer.add_full_screen_triangle(None);
    renderer.flush();

    assert_eq!(log.count(|c| *c == DeviceCall::Draw { vertex_count: 3 }), 2);
    assert!(log.calls().contains(&DeviceCall::SetVertexShader(Some(shaders.full_screen_triangle_vs))));
    assert_eq!(renderer.stats().draw_calls, 2);
}

#[test]
fn test_viewport_defaults_to_back_buffer() {
    let (mut renderer, log) = renderer();

    renderer.set_viewport(Some(FRect::new(10.0, 20.0, 100.0, 50.0)));
    renderer.add_rect(rect(0.0), Color::RED);
    renderer.set_viewport(None);
    renderer.add_rect(rect(0.0), Color::RED);
    renderer.flush();

    let viewports: Vec<_> = log
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            DeviceCall::SetViewport(rect) => Some(rect),
            _ => None,
        })
        .collect();
    let full = FRect::new(0.0, 0.0, 800.0, 600.0);
    assert_eq!(
        viewports,
        vec![
            // baseline, render target baseline, then the two explicit ones
            full,
            full,
            FRect::new(10.0, 20.0, 100.0, 50.0),
            full,
        ]
    );
}

#[test]
fn test_render_target_resizes_viewport() {
    let (mut renderer, log) = renderer();
    let target = renderer.device_mut().create_render_texture(UVec2::new(256, 128));

    renderer.set_render_target(Some(&target));
    renderer.add_rect(rect(0.0), Color::RED);
    renderer.set_render_target(None);
    renderer.add_rect(rect(0.0), Color::RED);
    renderer.flush();

    let calls = log.calls();
    let bound = calls
        .iter()
        .position(|c| *c == DeviceCall::SetRenderTarget(Some(target.id())))
        .unwrap();
    assert_eq!(
        calls[bound + 1],
        DeviceCall::SetViewport(FRect::new(0.0, 0.0, 256.0, 128.0))
    );

    let unbound = calls
        .iter()
        .rposition(|c| *c == DeviceCall::SetRenderTarget(None))
        .unwrap();
    assert!(unbound > bound);
    assert_eq!(
        calls[unbound + 1],
        DeviceCall::SetViewport(FRect::new(0.0, 0.0, 800.0, 600.0))
    );
}

#[test]
fn test_engine_constants_follow_color_mul() {
    let (mut renderer, log) = renderer();

    renderer.set_color_mul(Color::RED);
    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.flush();

    let blocks = engine_vs_blocks(&log);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0][2], Color::RED.to_vec4());
    assert_eq!(renderer.color_mul(), Color::RED);
}

#[test]
fn test_engine_constants_upload_only_when_changed() {
    let (mut renderer, log) = renderer();

    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.set_blend_state(BlendState::OPAQUE);
    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.flush();

    // Blend changes do not touch the engine blocks.
    assert_eq!(engine_vs_blocks(&log).len(), 1);
    assert_eq!(log.draw_indexed_calls().len(), 2);
}

#[test]
fn test_transform_maps_screen_to_clip_space() {
    let (mut renderer, log) = renderer();

    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.flush();

    let block = &engine_vs_blocks(&log)[0];
    let row0 = block[0];
    let row1 = block[1];
    let corner = Vec2::new(800.0, 600.0);
    let x = row0.x * corner.x + row0.y * corner.y + row0.z;
    let y = row1.x * corner.x + row1.y * corner.y + row1.z;
    assert!((x - 1.0).abs() < 1e-5);
    assert!((y + 1.0).abs() < 1e-5);
}

#[test]
fn test_user_constant_buffer_is_ordered_with_draws() {
    let (mut renderer, log) = renderer();

    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.set_constant_buffer(ShaderStage::Pixel, 1, &[Vec4::ONE]);
    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.flush();

    let calls = log.calls();
    let user = calls
        .iter()
        .position(|c| {
            *c == DeviceCall::SetConstantBuffer {
                stage: ShaderStage::Pixel,
                slot: 1,
                data: vec![Vec4::ONE],
            }
        })
        .unwrap();
    let draws: Vec<_> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_draw())
        .map(|(i, _)| i)
        .collect();
    assert_eq!(draws.len(), 2);
    assert!(draws[0] < user && user < draws[1]);
}

#[test]
fn test_batch_rollover_during_replay() {
    let config = Renderer2DConfig::default().with_batch_config(
        BatchConfig::default()
            .with_vertex_buffer_size(8)
            .with_index_buffer_size(12),
    );
    let (mut renderer, log) = renderer_with(config);

    for i in 0..3 {
        renderer.add_rect(rect(i as f32 * 20.0), Color::WHITE);
    }
    renderer.flush();

    assert_eq!(log.draw_indexed_calls(), vec![(12, 0, 0), (6, 0, 0)]);
    assert_eq!(
        log.vertex_uploads(),
        vec![(MapMode::NoOverwrite, 0, 8), (MapMode::Discard, 0, 4)]
    );

    // The ring keeps appending in the next frame.
    log.clear();
    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.flush();
    assert_eq!(log.draw_indexed_calls(), vec![(6, 6, 4)]);
}

#[test]
fn test_invalid_polygons_are_skipped() {
    let (mut renderer, log) = renderer();
    let points = [Vec2::ZERO, Vec2::X, Vec2::Y];

    renderer.add_polygon(&points, &[0, 1], Color::RED);
    renderer.add_polygon(&points, &[0, 1, 3], Color::RED);
    renderer.add_polygon(&points, &[], Color::RED);
    let many = vec![Vec2::ZERO; 70000];
    renderer.add_polygon(&many, &[0, 1, 2], Color::RED);
    renderer.flush();

    assert!(log.draw_indexed_calls().is_empty());
}

#[test]
fn test_polygon_and_shapes() {
    let (mut renderer, log) = renderer();
    let square = [Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y];

    renderer.add_polygon(&square, &[0, 1, 2, 0, 2, 3], Color::RED);
    renderer.add_triangle([Vec2::ZERO, Vec2::X, Vec2::Y], Color::RED);
    renderer.add_line(Vec2::ZERO, Vec2::new(10.0, 0.0), 2.0, Color::RED);
    renderer.add_quad([Vec2::ZERO, Vec2::X, Vec2::ONE, Vec2::Y], Color::RED);
    renderer.flush();

    assert_eq!(log.draw_indexed_calls(), vec![(6 + 3 + 6 + 6, 0, 0)]);
    assert_eq!(renderer.stats().triangle_count, 7);
}

#[test]
fn test_circle_tessellation_follows_scale() {
    let (mut renderer, log) = renderer();

    renderer.add_circle(Vec2::ZERO, 10.0, Color::RED);
    renderer.flush();
    let small = log.draw_indexed_calls()[0].0;

    log.clear();
    renderer.set_camera_transform(vellum_render::Affine2::from_scale(Vec2::splat(8.0)));
    renderer.add_circle(Vec2::ZERO, 10.0, Color::RED);
    renderer.flush();
    let large = log.draw_indexed_calls()[0].0;

    assert!(large > small);
    assert!((renderer.max_scaling() - 8.0).abs() < 1e-4);
}

#[test]
fn test_scissor_and_rasterizer_state() {
    let (mut renderer, log) = renderer();
    let scissor = IRect::new(4, 4, 32, 32);

    renderer.set_rasterizer_state(RasterizerState::SOLID_SCISSOR);
    renderer.set_scissor_rect(scissor);
    renderer.set_sampler_state(ShaderStage::Pixel, 0, SamplerState::CLAMP_NEAREST);
    renderer.add_rect(rect(0.0), Color::RED);
    renderer.flush();

    let calls = log.calls();
    assert!(calls.contains(&DeviceCall::SetScissorRect(scissor)));
    assert!(calls.contains(&DeviceCall::SetRasterizerState(RasterizerState::SOLID_SCISSOR)));
    assert!(calls.contains(&DeviceCall::SetSamplerState {
        stage: ShaderStage::Pixel,
        slot: 0,
        state: SamplerState::CLAMP_NEAREST,
    }));
    assert_eq!(renderer.scissor_rect(), scissor);
}

#[test]
fn test_upload_failure_does_not_abort_frame() {
    let (mut renderer, log) = renderer();
    renderer.device_mut().set_fail_uploads(true);

    renderer.add_rect(rect(0.0), Color::RED);
    renderer.flush();

    assert_eq!(log.draw_indexed_calls(), vec![(6, 0, 0)]);
}

#[test]
fn test_engine_slot_upload_is_restored_before_next_draw() {
    let (mut renderer, log) = renderer();

    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.set_constant_buffer(ShaderStage::Vertex, 0, &[Vec4::ONE]);
    renderer.add_rect(rect(20.0), Color::WHITE);
    renderer.flush();

    // engine block, user block, engine block again
    let blocks = engine_vs_blocks(&log);
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[1], vec![Vec4::ONE]);
    assert_eq!(blocks[2], blocks[0]);

    let calls = log.calls();
    let second_draw = calls
        .iter()
        .rposition(|c| matches!(c, DeviceCall::DrawIndexed { .. }))
        .unwrap();
    let last_vs_slot0 = calls
        .iter()
        .rposition(|c| {
            matches!(
                c,
                DeviceCall::SetConstantBuffer {
                    stage: ShaderStage::Vertex,
                    slot: 0,
                    ..
                }
            )
        })
        .unwrap();
    assert!(last_vs_slot0 < second_draw);
    assert_eq!(log.draw_indexed_calls().len(), 2);
}

#[test]
fn test_user_slot_upload_leaves_engine_blocks_alone() {
    let (mut renderer, log) = renderer();

    renderer.add_rect(rect(0.0), Color::WHITE);
    renderer.set_constant_buffer(ShaderStage::Vertex, 1, &[Vec4::ONE]);
    renderer.add_rect(rect(20.0), Color::WHITE);
    renderer.flush();

    assert_eq!(engine_vs_blocks(&log).len(), 1);
}
