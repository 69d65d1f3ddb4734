//! Coalescing behaviour of the command stream (no GPU required).

use vellum_render::{
    BlendState, Color, Command, CommandManager, CommandType, ShaderStage, Texture, TextureId, UVec2,
    Vec4,
};

const BASELINE_LEN: usize = 46;

fn recorded(manager: &CommandManager) -> Vec<Command> {
    manager.commands()[BASELINE_LEN..].to_vec()
}

#[test]
fn test_consecutive_draws_merge() {
    let mut manager = CommandManager::new();
    manager.push_draw(6);
    manager.push_draw(6);
    manager.push_draw(3);
    manager.flush();

    let commands = recorded(&manager);
    assert_eq!(commands, vec![Command::new(CommandType::Draw, 0)]);
    assert_eq!(manager.get_draw(0), 15);
}

#[test]
fn test_state_change_splits_draws() {
    let mut manager = CommandManager::new();
    manager.push_draw(6);
    manager.push_blend_state(BlendState::ADDITIVE);
    manager.push_draw(6);
    manager.flush();

    let commands = recorded(&manager);
    assert_eq!(
        commands,
        vec![
            Command::new(CommandType::Draw, 0),
            Command::new(CommandType::BlendState, 1),
            Command::new(CommandType::Draw, 1),
        ]
    );
    assert_eq!(manager.get_blend_state(1), BlendState::ADDITIVE);
    assert_eq!(manager.get_blend_state(0), BlendState::DEFAULT_2D);
}

#[test]
fn test_round_trip_emits_nothing() {
    let mut manager = CommandManager::new();
    manager.push_draw(6);
    manager.push_color_mul(Color::RED.to_vec4());
    manager.push_color_mul(Color::GREEN.to_vec4());
    manager.push_color_mul(Vec4::ONE);
    assert!(!manager.has_state_change());
    manager.push_draw(6);
    manager.flush();

    assert_eq!(recorded(&manager), vec![Command::new(CommandType::Draw, 0)]);
    assert_eq!(manager.get_draw(0), 12);
}

#[test]
fn test_redundant_push_on_clean_slot() {
    let mut manager = CommandManager::new();
    manager.push_blend_state(BlendState::DEFAULT_2D);
    assert!(!manager.has_state_change());
}

#[test]
fn test_only_last_value_is_committed() {
    let mut manager = CommandManager::new();
    manager.push_color_add(Vec4::splat(0.1));
    manager.push_color_add(Vec4::splat(0.2));
    manager.push_color_add(Vec4::splat(0.3));
    manager.push_draw(3);
    manager.flush();

    let commands = recorded(&manager);
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0], Command::new(CommandType::ColorAdd, 1));
    assert_eq!(manager.get_color_add(1), Vec4::splat(0.3));
}

#[test]
fn test_dirty_slots_commit_in_type_order() {
    let mut manager = CommandManager::new();
    manager.push_draw(3);
    manager.push_ps_texture_unbind(0);
    manager.push_sdf_params(vellum_render::SdfParams {
        param: Vec4::ONE,
        ..Default::default()
    });
    manager.push_color_mul(Vec4::ZERO);
    manager.push_draw(3);

    let types: Vec<_> = recorded(&manager).iter().map(|c| c.ty).collect();
    // ps texture 0 never changed from INVALID, so it is not emitted
    assert_eq!(
        types,
        vec![CommandType::Draw, CommandType::ColorMul, CommandType::SdfParams]
    );
}

#[test]
fn test_update_buffers_flushes_pending_draw() {
    let mut manager = CommandManager::new();
    manager.push_draw(6);
    manager.push_update_buffers(1);
    manager.push_draw(6);
    manager.flush();

    assert_eq!(
        recorded(&manager),
        vec![
            Command::new(CommandType::Draw, 0),
            Command::new(CommandType::UpdateBuffers, 1),
            Command::new(CommandType::Draw, 1),
        ]
    );
}

#[test]
fn test_null_draw_is_never_merged() {
    let mut manager = CommandManager::new();
    manager.push_draw(6);
    manager.push_null_vertices(3);
    manager.push_null_vertices(3);

    assert_eq!(
        recorded(&manager),
        vec![
            Command::new(CommandType::Draw, 0),
            Command::new(CommandType::DrawNull, 0),
            Command::new(CommandType::DrawNull, 1),
        ]
    );
    assert_eq!(manager.get_null_draw(1), 3);
}

#[test]
fn test_constant_buffer_lands_after_pending_work() {
    let mut manager = CommandManager::new();
    manager.push_draw(6);
    manager.push_color_mul(Vec4::ZERO);
    manager.push_constant_buffer(ShaderStage::Pixel, 1, &[Vec4::ONE, Vec4::ZERO]);
    manager.push_constant_buffer(ShaderStage::Vertex, 2, &[Vec4::X]);

    let types: Vec<_> = recorded(&manager).iter().map(|c| c.ty).collect();
    assert_eq!(
        types,
        vec![
            CommandType::Draw,
            CommandType::ColorMul,
            CommandType::SetConstantBuffer,
            CommandType::SetConstantBuffer,
        ]
    );

    let (cb, data) = manager.get_constant_buffer(0);
    assert_eq!(cb.stage, ShaderStage::Pixel);
    assert_eq!(cb.slot, 1);
    assert_eq!(data, &[Vec4::ONE, Vec4::ZERO]);

    let (cb, data) = manager.get_constant_buffer(1);
    assert_eq!(cb.offset, 2);
    assert_eq!(cb.num_vectors, 1);
    assert_eq!(data, &[Vec4::X]);
}

#[test]
fn test_reset_reseeds_last_committed_values() {
    let mut manager = CommandManager::new();
    manager.push_blend_state(BlendState::ADDITIVE);
    manager.push_draw(6);
    manager.flush();

    manager.reset();
    assert_eq!(manager.commands().len(), BASELINE_LEN);
    assert_eq!(manager.get_blend_state(0), BlendState::ADDITIVE);

    // Same value again is not a change in the new frame.
    manager.push_blend_state(BlendState::ADDITIVE);
    assert!(!manager.has_state_change());
}

#[test]
fn test_baseline_is_identical_across_frames() {
    let mut manager = CommandManager::new();
    let first = manager.commands().to_vec();

    for _ in 0..3 {
        manager.push_color_mul(Vec4::splat(0.5));
        manager.push_draw(3);
        manager.flush();
        manager.reset();
        assert_eq!(manager.commands(), first.as_slice());
    }
}

#[test]
fn test_unbind_texture_emits_one_command() {
    let mut manager = CommandManager::new();
    let texture = Texture::new(TextureId(3), UVec2::new(4, 4), false, Some("sprite"));

    manager.push_ps_texture(2, &texture);
    manager.push_draw(6);
    manager.push_ps_texture_unbind(2);
    manager.push_draw(6);
    manager.flush();

    let unbinds: Vec<_> = recorded(&manager)
        .into_iter()
        .filter(|c| c.ty == CommandType::PsTexture2)
        .collect();
    assert_eq!(unbinds.len(), 2);
    assert_eq!(manager.get_texture(ShaderStage::Pixel, 2, unbinds[1].index), TextureId::INVALID);
    assert_eq!(manager.current_ps_texture(2), TextureId::INVALID);
}

#[test]
fn test_textures_are_reserved_for_the_frame() {
    let mut manager = CommandManager::new();
    let texture = Texture::new(TextureId(11), UVec2::new(4, 4), false, None);

    manager.push_vs_texture(0, &texture);
    assert_eq!(texture.handle_count(), 2);
    assert!(manager.reserved_texture(TextureId(11)).is_some());

    manager.push_vs_texture_unbind(0);
    manager.flush();
    manager.reset();
    assert_eq!(texture.handle_count(), 1);
}
