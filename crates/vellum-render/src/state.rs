//! Render-state value objects.
//!
//! Every state is a small `Copy + Eq + Hash` value. The command manager
//! compares them to coalesce redundant pushes, and devices use them as
//! cache keys for pipelines and samplers.

use bitflags::bitflags;
use vellum_core::math::Vec4;

use crate::Color;

/// Blend factor applied to a source or destination term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendFactor {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestColor,
    InvDestColor,
    DestAlpha,
    InvDestAlpha,
    SrcAlphaSat,
}

/// Operation combining the weighted source and destination terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

bitflags! {
    /// Channels written to the render target.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const COLOR = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits();
        const ALL = Self::COLOR.bits() | Self::ALPHA.bits();
    }
}

/// Output-merger blend configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enabled: bool,
    pub src: BlendFactor,
    pub dst: BlendFactor,
    pub op: BlendOp,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
    pub op_alpha: BlendOp,
    pub write_mask: ColorWriteMask,
    pub alpha_to_coverage: bool,
}

impl BlendState {
    /// Straight alpha blending, the 2D default.
    pub const DEFAULT_2D: Self = Self {
        enabled: true,
        src: BlendFactor::SrcAlpha,
        dst: BlendFactor::InvSrcAlpha,
        op: BlendOp::Add,
        src_alpha: BlendFactor::Zero,
        dst_alpha: BlendFactor::One,
        op_alpha: BlendOp::Add,
        write_mask: ColorWriteMask::ALL,
        alpha_to_coverage: false,
    };

    /// Blending disabled; source replaces destination.
    pub const OPAQUE: Self = Self {
        enabled: false,
        ..Self::DEFAULT_2D
    };

    /// `src.rgb * src.a + dst.rgb`
    pub const ADDITIVE: Self = Self {
        dst: BlendFactor::One,
        ..Self::DEFAULT_2D
    };

    /// `dst.rgb - src.rgb * src.a`
    pub const SUBTRACTIVE: Self = Self {
        dst: BlendFactor::One,
        op: BlendOp::RevSubtract,
        ..Self::DEFAULT_2D
    };

    /// `src.rgb * dst.rgb`
    pub const MULTIPLICATIVE: Self = Self {
        src: BlendFactor::Zero,
        dst: BlendFactor::SrcColor,
        ..Self::DEFAULT_2D
    };

    /// Blending for premultiplied-alpha sources.
    pub const PREMULTIPLIED: Self = Self {
        src: BlendFactor::One,
        ..Self::DEFAULT_2D
    };

    pub const fn with_write_mask(self, write_mask: ColorWriteMask) -> Self {
        Self { write_mask, ..self }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::DEFAULT_2D
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Rasterizer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    /// When false, the scissor rect is ignored and the whole target is drawable.
    pub scissor_enable: bool,
    pub antialiased_line: bool,
    pub depth_bias: i32,
}

impl RasterizerState {
    pub const DEFAULT_2D: Self = Self {
        fill_mode: FillMode::Solid,
        cull_mode: CullMode::None,
        scissor_enable: false,
        antialiased_line: false,
        depth_bias: 0,
    };

    pub const SOLID_CULL_BACK: Self = Self {
        cull_mode: CullMode::Back,
        ..Self::DEFAULT_2D
    };

    pub const SOLID_CULL_FRONT: Self = Self {
        cull_mode: CullMode::Front,
        ..Self::DEFAULT_2D
    };

    pub const WIREFRAME: Self = Self {
        fill_mode: FillMode::Wireframe,
        ..Self::DEFAULT_2D
    };

    pub const SOLID_SCISSOR: Self = Self {
        scissor_enable: true,
        ..Self::DEFAULT_2D
    };

    pub const fn with_scissor(self, scissor_enable: bool) -> Self {
        Self {
            scissor_enable,
            ..self
        }
    }
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self::DEFAULT_2D
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    Mirror,
    Clamp,
    BorderColor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Border colours supported by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Texture sampler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerState {
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub min: FilterMode,
    pub mag: FilterMode,
    pub mip: FilterMode,
    /// 1 disables anisotropic filtering.
    pub max_anisotropy: u8,
    pub border_color: BorderColor,
}

impl SamplerState {
    pub const DEFAULT_2D: Self = Self {
        address_u: AddressMode::Clamp,
        address_v: AddressMode::Clamp,
        address_w: AddressMode::Clamp,
        min: FilterMode::Linear,
        mag: FilterMode::Linear,
        mip: FilterMode::Linear,
        max_anisotropy: 1,
        border_color: BorderColor::TransparentBlack,
    };

    pub const CLAMP_NEAREST: Self = Self {
        min: FilterMode::Nearest,
        mag: FilterMode::Nearest,
        mip: FilterMode::Nearest,
        ..Self::DEFAULT_2D
    };

    pub const REPEAT_LINEAR: Self = Self::with_address(Self::DEFAULT_2D, AddressMode::Repeat);

    pub const REPEAT_NEAREST: Self = Self::with_address(Self::CLAMP_NEAREST, AddressMode::Repeat);

    pub const MIRROR_LINEAR: Self = Self::with_address(Self::DEFAULT_2D, AddressMode::Mirror);

    pub const fn with_address(self, mode: AddressMode) -> Self {
        Self {
            address_u: mode,
            address_v: mode,
            address_w: mode,
            ..self
        }
    }

    pub const fn with_anisotropy(self, max_anisotropy: u8) -> Self {
        Self {
            max_anisotropy,
            ..self
        }
    }
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::DEFAULT_2D
    }
}

/// Signed-distance-field text parameters.
///
/// Packed into three constant vectors of the pixel stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SdfParams {
    /// `x`: edge threshold, `y`: smoothing, `z`/`w`: outline and shadow extents.
    pub param: Vec4,
    pub outline_color: Vec4,
    pub shadow_color: Vec4,
}

impl SdfParams {
    pub fn to_vec4s(&self) -> [Vec4; 3] {
        [self.param, self.outline_color, self.shadow_color]
    }
}

impl Default for SdfParams {
    fn default() -> Self {
        Self {
            param: Vec4::new(0.5, 0.5, 0.0, 0.0),
            outline_color: Color::BLACK.to_vec4(),
            shadow_color: Color::BLACK.with_alpha(0.5).to_vec4(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_blend_presets_are_distinct_keys() {
        let presets = [
            BlendState::DEFAULT_2D,
            BlendState::OPAQUE,
            BlendState::ADDITIVE,
            BlendState::SUBTRACTIVE,
            BlendState::MULTIPLICATIVE,
            BlendState::PREMULTIPLIED,
        ];
        let set: HashSet<_> = presets.iter().copied().collect();
        assert_eq!(set.len(), presets.len());
    }

    #[test]
    fn test_color_write_mask_all() {
        assert_eq!(ColorWriteMask::ALL.bits(), 0b1111);
        assert!(ColorWriteMask::ALL.contains(ColorWriteMask::COLOR));
    }

    #[test]
    fn test_defaults() {
        assert_eq!(RasterizerState::default(), RasterizerState::DEFAULT_2D);
        assert_eq!(RasterizerState::DEFAULT_2D.cull_mode, CullMode::None);
        assert_eq!(SamplerState::REPEAT_LINEAR.address_v, AddressMode::Repeat);
        assert_eq!(SamplerState::REPEAT_LINEAR.min, FilterMode::Linear);
        assert_eq!(SdfParams::default().param.x, 0.5);
    }
}
