//! Render-state value objects to wgpu descriptors.

use crate::{
    AddressMode, BlendFactor, BlendOp, BlendState, BorderColor, CullMode, FillMode, FilterMode,
    SamplerState,
};

fn blend_factor(factor: BlendFactor) -> wgpu::BlendFactor {
    match factor {
        BlendFactor::Zero => wgpu::BlendFactor::Zero,
        BlendFactor::One => wgpu::BlendFactor::One,
        BlendFactor::SrcColor => wgpu::BlendFactor::Src,
        BlendFactor::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
        BlendFactor::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        BlendFactor::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        BlendFactor::DestColor => wgpu::BlendFactor::Dst,
        BlendFactor::InvDestColor => wgpu::BlendFactor::OneMinusDst,
        BlendFactor::DestAlpha => wgpu::BlendFactor::DstAlpha,
        BlendFactor::InvDestAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        BlendFactor::SrcAlphaSat => wgpu::BlendFactor::SrcAlphaSaturated,
    }
}

fn blend_op(op: BlendOp) -> wgpu::BlendOperation {
    match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::RevSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOp::Min => wgpu::BlendOperation::Min,
        BlendOp::Max => wgpu::BlendOperation::Max,
    }
}

/// wgpu requires `One` factors for min/max operations.
fn blend_component(src: BlendFactor, dst: BlendFactor, op: BlendOp) -> wgpu::BlendComponent {
    let (src, dst) = match op {
        BlendOp::Min | BlendOp::Max => (BlendFactor::One, BlendFactor::One),
        _ => (src, dst),
    };
    wgpu::BlendComponent {
        src_factor: blend_factor(src),
        dst_factor: blend_factor(dst),
        operation: blend_op(op),
    }
}

pub(crate) fn color_target_state(
    state: &BlendState,
    format: wgpu::TextureFormat,
) -> wgpu::ColorTargetState {
    let blend = state.enabled.then(|| wgpu::BlendState {
        color: blend_component(state.src, state.dst, state.op),
        alpha: blend_component(state.src_alpha, state.dst_alpha, state.op_alpha),
    });

    wgpu::ColorTargetState {
        format,
        blend,
        write_mask: wgpu::ColorWrites::from_bits_truncate(state.write_mask.bits() as u32),
    }
}

pub(crate) fn primitive_state(fill: FillMode, cull: CullMode, line_mode: bool) -> wgpu::PrimitiveState {
    let polygon_mode = match fill {
        FillMode::Wireframe if line_mode => wgpu::PolygonMode::Line,
        _ => wgpu::PolygonMode::Fill,
    };
    let cull_mode = match cull {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    };

    wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode,
        polygon_mode,
        unclipped_depth: false,
        conservative: false,
    }
}

fn address_mode(mode: AddressMode, border_supported: bool) -> wgpu::AddressMode {
    match mode {
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        AddressMode::BorderColor if border_supported => wgpu::AddressMode::ClampToBorder,
        AddressMode::BorderColor => wgpu::AddressMode::ClampToEdge,
    }
}

fn filter_mode(mode: FilterMode) -> wgpu::FilterMode {
    match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    }
}

/// Sampler descriptor for `state`.
///
/// Border addressing degrades to clamping without
/// `ADDRESS_MODE_CLAMP_TO_BORDER`. Anisotropy is dropped unless every filter
/// is linear, as wgpu requires.
pub(crate) fn sampler_descriptor(
    state: &SamplerState,
    border_supported: bool,
) -> wgpu::SamplerDescriptor<'static> {
    let all_linear = [state.min, state.mag, state.mip]
        .iter()
        .all(|f| *f == FilterMode::Linear);
    let anisotropy_clamp = if all_linear {
        state.max_anisotropy.clamp(1, 16) as u16
    } else {
        1
    };
    let uses_border = [state.address_u, state.address_v, state.address_w]
        .contains(&AddressMode::BorderColor);
    let border_color = (uses_border && border_supported).then_some(match state.border_color {
        BorderColor::TransparentBlack => wgpu::SamplerBorderColor::TransparentBlack,
        BorderColor::OpaqueBlack => wgpu::SamplerBorderColor::OpaqueBlack,
        BorderColor::OpaqueWhite => wgpu::SamplerBorderColor::OpaqueWhite,
    });

    wgpu::SamplerDescriptor {
        label: Some("vellum_sampler"),
        address_mode_u: address_mode(state.address_u, border_supported),
        address_mode_v: address_mode(state.address_v, border_supported),
        address_mode_w: address_mode(state.address_w, border_supported),
        mag_filter: filter_mode(state.mag),
        min_filter: filter_mode(state.min),
        mipmap_filter: filter_mode(state.mip),
        lod_min_clamp: 0.0,
        lod_max_clamp: f32::MAX,
        compare: None,
        anisotropy_clamp,
        border_color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ColorWriteMask, RasterizerState};

    #[test]
    fn test_opaque_has_no_blend() {
        let target = color_target_state(&BlendState::OPAQUE, wgpu::TextureFormat::Rgba8Unorm);
        assert!(target.blend.is_none());
        assert_eq!(target.write_mask, wgpu::ColorWrites::ALL);
    }

    #[test]
    fn test_default_blend_is_alpha() {
        let target = color_target_state(&BlendState::DEFAULT_2D, wgpu::TextureFormat::Rgba8Unorm);
        let blend = target.blend.unwrap();
        assert_eq!(blend.color.src_factor, wgpu::BlendFactor::SrcAlpha);
        assert_eq!(blend.color.dst_factor, wgpu::BlendFactor::OneMinusSrcAlpha);
    }

    #[test]
    fn test_write_mask_bits_match() {
        let state = BlendState::DEFAULT_2D.with_write_mask(ColorWriteMask::RED | ColorWriteMask::ALPHA);
        let target = color_target_state(&state, wgpu::TextureFormat::Rgba8Unorm);
        assert_eq!(target.write_mask, wgpu::ColorWrites::RED | wgpu::ColorWrites::ALPHA);
    }

    #[test]
    fn test_wireframe_falls_back_to_fill() {
        let r = RasterizerState::WIREFRAME;
        assert_eq!(primitive_state(r.fill_mode, r.cull_mode, false).polygon_mode, wgpu::PolygonMode::Fill);
        assert_eq!(primitive_state(r.fill_mode, r.cull_mode, true).polygon_mode, wgpu::PolygonMode::Line);
    }

    #[test]
    fn test_anisotropy_requires_linear() {
        let desc = sampler_descriptor(&SamplerState::CLAMP_NEAREST.with_anisotropy(8), false);
        assert_eq!(desc.anisotropy_clamp, 1);
        let desc = sampler_descriptor(&SamplerState::DEFAULT_2D.with_anisotropy(8), false);
        assert_eq!(desc.anisotropy_clamp, 8);
    }
}
