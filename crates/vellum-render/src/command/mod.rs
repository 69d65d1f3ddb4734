//! The recorded command stream.
//!
//! A frame is a flat list of [`Command`]s. Each command is a [`CommandType`]
//! tag plus an index into a per-type side array owned by the
//! [`CommandManager`]: state commands index the slot's history, draws index
//! the draw-count list, and so on. Replay walks the list once, in order.

mod change_set;
mod manager;
mod tracked;

pub use change_set::ChangeSet;
pub use manager::CommandManager;
pub use tracked::{SlotStatus, TrackedSlot};

use static_assertions::const_assert;

use crate::ShaderStage;

/// Sampler slots per shader stage.
pub const SAMPLER_SLOT_COUNT: usize = 8;

/// Texture slots per shader stage.
pub const TEXTURE_SLOT_COUNT: usize = 8;

/// Kind of a recorded command.
///
/// The discriminant doubles as the bit position in [`ChangeSet`] and fixes
/// the order in which dirty slots are committed on flush.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandType {
    Null,
    SetBuffers,
    UpdateBuffers,
    Draw,
    DrawNull,
    ColorMul,
    ColorAdd,
    BlendState,
    RasterizerState,
    VsSamplerState0,
    VsSamplerState1,
    VsSamplerState2,
    VsSamplerState3,
    VsSamplerState4,
    VsSamplerState5,
    VsSamplerState6,
    VsSamplerState7,
    PsSamplerState0,
    PsSamplerState1,
    PsSamplerState2,
    PsSamplerState3,
    PsSamplerState4,
    PsSamplerState5,
    PsSamplerState6,
    PsSamplerState7,
    ScissorRect,
    Viewport,
    SdfParams,
    InternalPsConstants,
    SetRenderTarget,
    SetVs,
    SetPs,
    Transform,
    SetConstantBuffer,
    VsTexture0,
    VsTexture1,
    VsTexture2,
    VsTexture3,
    VsTexture4,
    VsTexture5,
    VsTexture6,
    VsTexture7,
    PsTexture0,
    PsTexture1,
    PsTexture2,
    PsTexture3,
    PsTexture4,
    PsTexture5,
    PsTexture6,
    PsTexture7,
}

impl CommandType {
    /// Number of command types.
    pub const COUNT: usize = Self::PsTexture7 as usize + 1;

    /// Every command type, in discriminant order.
    pub const ALL: [CommandType; Self::COUNT] = {
        use CommandType::*;
        [
            Null,
            SetBuffers,
            UpdateBuffers,
            Draw,
            DrawNull,
            ColorMul,
            ColorAdd,
            BlendState,
            RasterizerState,
            VsSamplerState0,
            VsSamplerState1,
            VsSamplerState2,
            VsSamplerState3,
            VsSamplerState4,
            VsSamplerState5,
            VsSamplerState6,
            VsSamplerState7,
            PsSamplerState0,
            PsSamplerState1,
            PsSamplerState2,
            PsSamplerState3,
            PsSamplerState4,
            PsSamplerState5,
            PsSamplerState6,
            PsSamplerState7,
            ScissorRect,
            Viewport,
            SdfParams,
            InternalPsConstants,
            SetRenderTarget,
            SetVs,
            SetPs,
            Transform,
            SetConstantBuffer,
            VsTexture0,
            VsTexture1,
            VsTexture2,
            VsTexture3,
            VsTexture4,
            VsTexture5,
            VsTexture6,
            VsTexture7,
            PsTexture0,
            PsTexture1,
            PsTexture2,
            PsTexture3,
            PsTexture4,
            PsTexture5,
            PsTexture6,
            PsTexture7,
        ]
    };

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The sampler command for `slot` of `stage`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= SAMPLER_SLOT_COUNT`.
    pub fn sampler(stage: ShaderStage, slot: usize) -> Self {
        assert!(slot < SAMPLER_SLOT_COUNT, "sampler slot {slot} out of range");
        let base = match stage {
            ShaderStage::Vertex => Self::VsSamplerState0,
            ShaderStage::Pixel => Self::PsSamplerState0,
        };
        Self::ALL[base.index() + slot]
    }

    /// The texture command for `slot` of `stage`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= TEXTURE_SLOT_COUNT`.
    pub fn texture(stage: ShaderStage, slot: usize) -> Self {
        assert!(slot < TEXTURE_SLOT_COUNT, "texture slot {slot} out of range");
        let base = match stage {
            ShaderStage::Vertex => Self::VsTexture0,
            ShaderStage::Pixel => Self::PsTexture0,
        };
        Self::ALL[base.index() + slot]
    }

    /// Stage and slot of a sampler command.
    pub fn sampler_slot(self) -> Option<(ShaderStage, usize)> {
        let i = self.index();
        let vs = Self::VsSamplerState0.index();
        let ps = Self::PsSamplerState0.index();
        if (vs..vs + SAMPLER_SLOT_COUNT).contains(&i) {
            Some((ShaderStage::Vertex, i - vs))
        } else if (ps..ps + SAMPLER_SLOT_COUNT).contains(&i) {
            Some((ShaderStage::Pixel, i - ps))
        } else {
            None
        }
    }

    /// Stage and slot of a texture command.
    pub fn texture_slot(self) -> Option<(ShaderStage, usize)> {
        let i = self.index();
        let vs = Self::VsTexture0.index();
        let ps = Self::PsTexture0.index();
        if (vs..vs + TEXTURE_SLOT_COUNT).contains(&i) {
            Some((ShaderStage::Vertex, i - vs))
        } else if (ps..ps + TEXTURE_SLOT_COUNT).contains(&i) {
            Some((ShaderStage::Pixel, i - ps))
        } else {
            None
        }
    }
}

const_assert!(CommandType::COUNT <= 64);
const_assert!(CommandType::COUNT == 50);

/// One entry in the command stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Command {
    pub ty: CommandType,
    /// Index into the side array for `ty`. For `UpdateBuffers` this is the
    /// batch index.
    pub index: u32,
}

impl Command {
    pub const fn new(ty: CommandType, index: u32) -> Self {
        Self { ty, index }
    }
}

/// A constant buffer upload recorded by `push_constant_buffer`.
///
/// `offset` and `num_vectors` address the manager's shared constant data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstantBufferCommand {
    pub stage: ShaderStage,
    pub slot: u32,
    pub offset: u32,
    pub num_vectors: u32,
}
