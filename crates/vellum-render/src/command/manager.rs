use vellum_core::alloc::HashMap;
use vellum_core::geometry::{FRect, IRect};
use vellum_core::math::{Affine2, Vec4, max_scaling};
use vellum_core::profiling::profile_function;

use super::{
    ChangeSet, Command, CommandType, ConstantBufferCommand, SAMPLER_SLOT_COUNT, SlotStatus,
    TEXTURE_SLOT_COUNT, TrackedSlot,
};
use crate::{
    BlendState, PixelShader, PixelShaderId, RasterizerState, SamplerState, SdfParams, ShaderStage,
    Texture, TextureId, VertexShader, VertexShaderId,
};

fn push_slot<T: Clone + PartialEq>(
    slot: &mut TrackedSlot<T>,
    changes: &mut ChangeSet,
    ty: CommandType,
    value: T,
) {
    let status = if changes.has(ty) {
        SlotStatus::Dirty
    } else {
        SlotStatus::Clean
    };

    match slot.push(value, status) {
        SlotStatus::Dirty => changes.set(ty),
        SlotStatus::Clean => changes.clear(ty),
    }
}

/// Records render state and draws into a coalesced command stream.
///
/// State pushes only touch the slot's current value. Nothing is emitted
/// until something forces a [`flush`](Self::flush): a draw after a state
/// change, a buffer roll-over, a null draw or a constant buffer upload. At
/// that point the accumulated draw is emitted first, then one command per
/// dirty slot. Consecutive draws with no state change in between merge into
/// a single `Draw`.
///
/// The stream is valid for one frame. [`reset`](Self::reset) starts the next
/// frame with a baseline that rebinds every slot, so replay never depends on
/// device state left over from the previous frame.
#[derive(Debug)]
pub struct CommandManager {
    commands: Vec<Command>,
    changes: ChangeSet,

    pending_draw: u32,
    draws: Vec<u32>,
    null_draws: Vec<u32>,
    constants: Vec<ConstantBufferCommand>,
    constant_data: Vec<Vec4>,

    color_mul: TrackedSlot<Vec4>,
    color_add: TrackedSlot<Vec4>,
    blend_state: TrackedSlot<BlendState>,
    rasterizer_state: TrackedSlot<RasterizerState>,
    vs_samplers: [TrackedSlot<SamplerState>; SAMPLER_SLOT_COUNT],
    ps_samplers: [TrackedSlot<SamplerState>; SAMPLER_SLOT_COUNT],
    scissor_rect: TrackedSlot<IRect>,
    viewport: TrackedSlot<Option<FRect>>,
    sdf_params: TrackedSlot<SdfParams>,
    internal_ps_constants: TrackedSlot<Vec4>,
    render_target: TrackedSlot<TextureId>,
    vs: TrackedSlot<VertexShaderId>,
    ps: TrackedSlot<PixelShaderId>,
    transform: TrackedSlot<Affine2>,
    vs_textures: [TrackedSlot<TextureId>; TEXTURE_SLOT_COUNT],
    ps_textures: [TrackedSlot<TextureId>; TEXTURE_SLOT_COUNT],

    local_transform: Affine2,
    camera_transform: Affine2,
    max_scaling: f32,

    reserved_vs: HashMap<VertexShaderId, VertexShader>,
    reserved_ps: HashMap<PixelShaderId, PixelShader>,
    reserved_textures: HashMap<TextureId, Texture>,
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandManager {
    /// Creates a manager with default 2D state and the baseline commands of
    /// an empty frame already recorded.
    pub fn new() -> Self {
        let mut manager = Self {
            commands: Vec::new(),
            changes: ChangeSet::new(),
            pending_draw: 0,
            draws: Vec::new(),
            null_draws: Vec::new(),
            constants: Vec::new(),
            constant_data: Vec::new(),
            color_mul: TrackedSlot::new(Vec4::ONE),
            color_add: TrackedSlot::new(Vec4::ZERO),
            blend_state: TrackedSlot::new(BlendState::DEFAULT_2D),
            rasterizer_state: TrackedSlot::new(RasterizerState::DEFAULT_2D),
            vs_samplers: std::array::from_fn(|_| TrackedSlot::new(SamplerState::DEFAULT_2D)),
            ps_samplers: std::array::from_fn(|_| TrackedSlot::new(SamplerState::DEFAULT_2D)),
            scissor_rect: TrackedSlot::new(IRect::default()),
            viewport: TrackedSlot::new(None),
            sdf_params: TrackedSlot::new(SdfParams::default()),
            internal_ps_constants: TrackedSlot::new(Vec4::ZERO),
            render_target: TrackedSlot::new(TextureId::INVALID),
            vs: TrackedSlot::new(VertexShaderId::INVALID),
            ps: TrackedSlot::new(PixelShaderId::INVALID),
            transform: TrackedSlot::new(Affine2::IDENTITY),
            vs_textures: std::array::from_fn(|_| TrackedSlot::new(TextureId::INVALID)),
            ps_textures: std::array::from_fn(|_| TrackedSlot::new(TextureId::INVALID)),
            local_transform: Affine2::IDENTITY,
            camera_transform: Affine2::IDENTITY,
            max_scaling: 1.0,
            reserved_vs: HashMap::default(),
            reserved_ps: HashMap::default(),
            reserved_textures: HashMap::default(),
        };
        manager.reset();
        manager
    }

    /// Clears the stream and records the baseline of a new frame.
    ///
    /// Every slot keeps the value it had at the end of the previous frame.
    /// The baseline is `SetBuffers`, `UpdateBuffers(0)` and one command per
    /// state slot, all at history index 0, so it is identical every frame.
    /// Textures and shaders stay reserved only while a slot still binds them.
    pub fn reset(&mut self) {
        profile_function!();

        self.commands.clear();
        self.changes.clear_all();
        self.pending_draw = 0;
        self.draws.clear();
        self.null_draws.clear();
        self.constants.clear();
        self.constant_data.clear();

        self.commands.push(Command::new(CommandType::SetBuffers, 0));
        self.commands.push(Command::new(CommandType::UpdateBuffers, 0));

        for ty in CommandType::ALL {
            if self.reseed(ty) {
                self.commands.push(Command::new(ty, 0));
            }
        }

        self.resync_transforms();
        self.release_unbound();
    }

    /// Brings the local/camera split back in line with the reseeded
    /// transform slot. Uncommitted pushes from the last frame are gone.
    fn resync_transforms(&mut self) {
        let combined = *self.transform.current();
        if self.camera_transform * self.local_transform != combined {
            self.local_transform = combined;
            self.camera_transform = Affine2::IDENTITY;
        }
        self.max_scaling = max_scaling(&combined);
    }

    /// Drops reservations the baseline no longer references.
    fn release_unbound(&mut self) {
        let vs = *self.vs.current();
        let ps = *self.ps.current();
        self.reserved_vs.retain(|id, _| *id == vs);
        self.reserved_ps.retain(|id, _| *id == ps);

        let render_target = *self.render_target.current();
        let Self {
            vs_textures,
            ps_textures,
            reserved_textures,
            ..
        } = self;
        reserved_textures.retain(|id, _| {
            *id == render_target
                || vs_textures.iter().any(|slot| slot.current() == id)
                || ps_textures.iter().any(|slot| slot.current() == id)
        });
    }

    /// Emits the pending draw and commits every dirty slot.
    pub fn flush(&mut self) {
        if self.pending_draw > 0 {
            self.commands
                .push(Command::new(CommandType::Draw, self.draws.len() as u32));
            self.draws.push(self.pending_draw);
            self.pending_draw = 0;
        }

        for ty in self.changes.iter() {
            let index = self.commit(ty);
            self.commands.push(Command::new(ty, index));
        }
        self.changes.clear_all();
    }

    fn reseed(&mut self, ty: CommandType) -> bool {
        use CommandType as C;
        match ty {
            C::ColorMul => self.color_mul.reseed(),
            C::ColorAdd => self.color_add.reseed(),
            C::BlendState => self.blend_state.reseed(),
            C::RasterizerState => self.rasterizer_state.reseed(),
            C::ScissorRect => self.scissor_rect.reseed(),
            C::Viewport => self.viewport.reseed(),
            C::SdfParams => self.sdf_params.reseed(),
            C::InternalPsConstants => self.internal_ps_constants.reseed(),
            C::SetRenderTarget => self.render_target.reseed(),
            C::SetVs => self.vs.reseed(),
            C::SetPs => self.ps.reseed(),
            C::Transform => self.transform.reseed(),
            _ => {
                if let Some((stage, slot)) = ty.sampler_slot() {
                    self.sampler_slot_mut(stage, slot).reseed();
                } else if let Some((stage, slot)) = ty.texture_slot() {
                    self.texture_slot_mut(stage, slot).reseed();
                } else {
                    return false;
                }
            }
        }
        true
    }

    fn commit(&mut self, ty: CommandType) -> u32 {
        use CommandType as C;
        match ty {
            C::ColorMul => self.color_mul.commit(),
            C::ColorAdd => self.color_add.commit(),
            C::BlendState => self.blend_state.commit(),
            C::RasterizerState => self.rasterizer_state.commit(),
            C::ScissorRect => self.scissor_rect.commit(),
            C::Viewport => self.viewport.commit(),
            C::SdfParams => self.sdf_params.commit(),
            C::InternalPsConstants => self.internal_ps_constants.commit(),
            C::SetRenderTarget => self.render_target.commit(),
            C::SetVs => self.vs.commit(),
            C::SetPs => self.ps.commit(),
            C::Transform => self.transform.commit(),
            _ => {
                if let Some((stage, slot)) = ty.sampler_slot() {
                    self.sampler_slot_mut(stage, slot).commit()
                } else if let Some((stage, slot)) = ty.texture_slot() {
                    self.texture_slot_mut(stage, slot).commit()
                } else {
                    unreachable!("{ty:?} is not a state slot")
                }
            }
        }
    }

    fn sampler_slot_mut(&mut self, stage: ShaderStage, slot: usize) -> &mut TrackedSlot<SamplerState> {
        match stage {
            ShaderStage::Vertex => &mut self.vs_samplers[slot],
            ShaderStage::Pixel => &mut self.ps_samplers[slot],
        }
    }

    fn sampler_slot(&self, stage: ShaderStage, slot: usize) -> &TrackedSlot<SamplerState> {
        match stage {
            ShaderStage::Vertex => &self.vs_samplers[slot],
            ShaderStage::Pixel => &self.ps_samplers[slot],
        }
    }

    fn texture_slot_mut(&mut self, stage: ShaderStage, slot: usize) -> &mut TrackedSlot<TextureId> {
        match stage {
            ShaderStage::Vertex => &mut self.vs_textures[slot],
            ShaderStage::Pixel => &mut self.ps_textures[slot],
        }
    }

    fn texture_slot(&self, stage: ShaderStage, slot: usize) -> &TrackedSlot<TextureId> {
        match stage {
            ShaderStage::Vertex => &self.vs_textures[slot],
            ShaderStage::Pixel => &self.ps_textures[slot],
        }
    }

    /// The recorded stream.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Whether a state change is waiting to be committed.
    pub fn has_state_change(&self) -> bool {
        self.changes.any()
    }

    /// Whether draws have accumulated since the last flush.
    pub fn has_pending_draw(&self) -> bool {
        self.pending_draw > 0
    }

    pub fn pending_index_count(&self) -> u32 {
        self.pending_draw
    }

    // --- Draws ---

    /// Adds `index_count` indices to the pending draw. A zero count is ignored.
    pub fn push_draw(&mut self, index_count: u32) {
        if index_count == 0 {
            return;
        }
        if self.changes.any() {
            self.flush();
        }
        self.pending_draw += index_count;
    }

    pub fn get_draw(&self, index: u32) -> u32 {
        self.draws[index as usize]
    }

    /// Records a draw without vertex/index buffers (e.g. a full-screen
    /// triangle generated in the vertex shader).
    pub fn push_null_vertices(&mut self, count: u32) {
        self.flush();
        self.commands
            .push(Command::new(CommandType::DrawNull, self.null_draws.len() as u32));
        self.null_draws.push(count);
    }

    pub fn get_null_draw(&self, index: u32) -> u32 {
        self.null_draws[index as usize]
    }

    /// Records a switch to batch `batch_index`. Everything drawn so far
    /// belongs to the previous batch.
    pub fn push_update_buffers(&mut self, batch_index: u32) {
        self.flush();
        self.commands
            .push(Command::new(CommandType::UpdateBuffers, batch_index));
    }

    // --- Constant buffers ---

    /// Records an upload of `data` to constant buffer `slot` of `stage`.
    ///
    /// Uploads are never coalesced; the pending state is flushed first so the
    /// upload lands after every draw recorded before it.
    pub fn push_constant_buffer(&mut self, stage: ShaderStage, slot: u32, data: &[Vec4]) {
        if data.is_empty() {
            return;
        }
        self.flush();

        let offset = self.constant_data.len() as u32;
        self.constant_data.extend_from_slice(data);
        self.commands.push(Command::new(
            CommandType::SetConstantBuffer,
            self.constants.len() as u32,
        ));
        self.constants.push(ConstantBufferCommand {
            stage,
            slot,
            offset,
            num_vectors: data.len() as u32,
        });
    }

    /// The recorded upload and its data.
    pub fn get_constant_buffer(&self, index: u32) -> (ConstantBufferCommand, &[Vec4]) {
        let command = self.constants[index as usize];
        let start = command.offset as usize;
        let end = start + command.num_vectors as usize;
        (command, &self.constant_data[start..end])
    }

    // --- Colors ---

    pub fn push_color_mul(&mut self, color: Vec4) {
        push_slot(&mut self.color_mul, &mut self.changes, CommandType::ColorMul, color);
    }

    pub fn current_color_mul(&self) -> Vec4 {
        *self.color_mul.current()
    }

    pub fn get_color_mul(&self, index: u32) -> Vec4 {
        *self.color_mul.get(index)
    }

    pub fn push_color_add(&mut self, color: Vec4) {
        push_slot(&mut self.color_add, &mut self.changes, CommandType::ColorAdd, color);
    }

    pub fn current_color_add(&self) -> Vec4 {
        *self.color_add.current()
    }

    pub fn get_color_add(&self, index: u32) -> Vec4 {
        *self.color_add.get(index)
    }

    // --- Pipeline state ---

    pub fn push_blend_state(&mut self, state: BlendState) {
        push_slot(&mut self.blend_state, &mut self.changes, CommandType::BlendState, state);
    }

    pub fn current_blend_state(&self) -> BlendState {
        *self.blend_state.current()
    }

    pub fn get_blend_state(&self, index: u32) -> BlendState {
        *self.blend_state.get(index)
    }

    pub fn push_rasterizer_state(&mut self, state: RasterizerState) {
        push_slot(
            &mut self.rasterizer_state,
            &mut self.changes,
            CommandType::RasterizerState,
            state,
        );
    }

    pub fn current_rasterizer_state(&self) -> RasterizerState {
        *self.rasterizer_state.current()
    }

    pub fn get_rasterizer_state(&self, index: u32) -> RasterizerState {
        *self.rasterizer_state.get(index)
    }

    /// # Panics
    ///
    /// Panics if `slot >= SAMPLER_SLOT_COUNT`.
    pub fn push_sampler_state(&mut self, stage: ShaderStage, slot: usize, state: SamplerState) {
        let ty = CommandType::sampler(stage, slot);
        let tracked = match stage {
            ShaderStage::Vertex => &mut self.vs_samplers[slot],
            ShaderStage::Pixel => &mut self.ps_samplers[slot],
        };
        push_slot(tracked, &mut self.changes, ty, state);
    }

    pub fn push_vs_sampler_state(&mut self, slot: usize, state: SamplerState) {
        self.push_sampler_state(ShaderStage::Vertex, slot, state);
    }

    pub fn push_ps_sampler_state(&mut self, slot: usize, state: SamplerState) {
        self.push_sampler_state(ShaderStage::Pixel, slot, state);
    }

    pub fn current_sampler_state(&self, stage: ShaderStage, slot: usize) -> SamplerState {
        *self.sampler_slot(stage, slot).current()
    }

    pub fn get_sampler_state(&self, stage: ShaderStage, slot: usize, index: u32) -> SamplerState {
        *self.sampler_slot(stage, slot).get(index)
    }

    pub fn push_scissor_rect(&mut self, rect: IRect) {
        push_slot(&mut self.scissor_rect, &mut self.changes, CommandType::ScissorRect, rect);
    }

    pub fn current_scissor_rect(&self) -> IRect {
        *self.scissor_rect.current()
    }

    pub fn get_scissor_rect(&self, index: u32) -> IRect {
        *self.scissor_rect.get(index)
    }

    /// `None` covers the whole render target.
    pub fn push_viewport(&mut self, viewport: Option<FRect>) {
        push_slot(&mut self.viewport, &mut self.changes, CommandType::Viewport, viewport);
    }

    pub fn current_viewport(&self) -> Option<FRect> {
        *self.viewport.current()
    }

    pub fn get_viewport(&self, index: u32) -> Option<FRect> {
        *self.viewport.get(index)
    }

    pub fn push_sdf_params(&mut self, params: SdfParams) {
        push_slot(&mut self.sdf_params, &mut self.changes, CommandType::SdfParams, params);
    }

    pub fn current_sdf_params(&self) -> SdfParams {
        *self.sdf_params.current()
    }

    pub fn get_sdf_params(&self, index: u32) -> SdfParams {
        *self.sdf_params.get(index)
    }

    pub fn push_internal_ps_constants(&mut self, value: Vec4) {
        push_slot(
            &mut self.internal_ps_constants,
            &mut self.changes,
            CommandType::InternalPsConstants,
            value,
        );
    }

    pub fn current_internal_ps_constants(&self) -> Vec4 {
        *self.internal_ps_constants.current()
    }

    pub fn get_internal_ps_constants(&self, index: u32) -> Vec4 {
        *self.internal_ps_constants.get(index)
    }

    // --- Render target ---

    /// Binds `target`, or the back buffer for `None`. The texture is kept
    /// alive until the next reset.
    pub fn push_render_target(&mut self, target: Option<&Texture>) {
        let id = match target {
            Some(texture) => {
                self.reserve_texture(texture);
                texture.id()
            }
            None => TextureId::INVALID,
        };
        push_slot(&mut self.render_target, &mut self.changes, CommandType::SetRenderTarget, id);
    }

    /// `TextureId::INVALID` means the back buffer.
    pub fn current_render_target(&self) -> TextureId {
        *self.render_target.current()
    }

    pub fn get_render_target(&self, index: u32) -> TextureId {
        *self.render_target.get(index)
    }

    // --- Shaders ---

    pub fn push_standard_vs(&mut self, id: VertexShaderId) {
        push_slot(&mut self.vs, &mut self.changes, CommandType::SetVs, id);
    }

    pub fn push_custom_vs(&mut self, shader: &VertexShader) {
        let id = shader.id();
        if id.is_valid() {
            self.reserved_vs.entry(id).or_insert_with(|| shader.clone());
        }
        self.push_standard_vs(id);
    }

    pub fn current_vs(&self) -> VertexShaderId {
        *self.vs.current()
    }

    pub fn get_vs(&self, index: u32) -> VertexShaderId {
        *self.vs.get(index)
    }

    pub fn push_standard_ps(&mut self, id: PixelShaderId) {
        push_slot(&mut self.ps, &mut self.changes, CommandType::SetPs, id);
    }

    pub fn push_custom_ps(&mut self, shader: &PixelShader) {
        let id = shader.id();
        if id.is_valid() {
            self.reserved_ps.entry(id).or_insert_with(|| shader.clone());
        }
        self.push_standard_ps(id);
    }

    pub fn current_ps(&self) -> PixelShaderId {
        *self.ps.current()
    }

    pub fn get_ps(&self, index: u32) -> PixelShaderId {
        *self.ps.get(index)
    }

    // --- Transforms ---

    /// Sets the object-to-world transform. The committed transform is
    /// `camera * local`.
    pub fn push_local_transform(&mut self, local: Affine2) {
        self.local_transform = local;
        self.push_combined_transform();
    }

    /// Sets the world-to-screen transform.
    pub fn push_camera_transform(&mut self, camera: Affine2) {
        self.camera_transform = camera;
        self.push_combined_transform();
    }

    fn push_combined_transform(&mut self) {
        let combined = self.camera_transform * self.local_transform;
        self.max_scaling = max_scaling(&combined);
        push_slot(&mut self.transform, &mut self.changes, CommandType::Transform, combined);
    }

    pub fn current_local_transform(&self) -> Affine2 {
        self.local_transform
    }

    pub fn current_camera_transform(&self) -> Affine2 {
        self.camera_transform
    }

    pub fn current_combined_transform(&self) -> Affine2 {
        *self.transform.current()
    }

    pub fn get_combined_transform(&self, index: u32) -> Affine2 {
        *self.transform.get(index)
    }

    /// Scale factor of the current combined transform.
    pub fn current_max_scaling(&self) -> f32 {
        self.max_scaling
    }

    // --- Textures ---

    fn reserve_texture(&mut self, texture: &Texture) {
        let id = texture.id();
        if id.is_valid() {
            self.reserved_textures
                .entry(id)
                .or_insert_with(|| texture.clone());
        }
    }

    /// Binds `texture` to `slot` of `stage` and keeps it alive until the next
    /// reset.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= TEXTURE_SLOT_COUNT`.
    pub fn push_texture(&mut self, stage: ShaderStage, slot: usize, texture: &Texture) {
        self.reserve_texture(texture);
        self.push_texture_id(stage, slot, texture.id());
    }

    /// Unbinds `slot` of `stage`.
    pub fn push_texture_unbind(&mut self, stage: ShaderStage, slot: usize) {
        self.push_texture_id(stage, slot, TextureId::INVALID);
    }

    fn push_texture_id(&mut self, stage: ShaderStage, slot: usize, id: TextureId) {
        let ty = CommandType::texture(stage, slot);
        let tracked = match stage {
            ShaderStage::Vertex => &mut self.vs_textures[slot],
            ShaderStage::Pixel => &mut self.ps_textures[slot],
        };
        push_slot(tracked, &mut self.changes, ty, id);
    }

    pub fn push_vs_texture(&mut self, slot: usize, texture: &Texture) {
        self.push_texture(ShaderStage::Vertex, slot, texture);
    }

    pub fn push_ps_texture(&mut self, slot: usize, texture: &Texture) {
        self.push_texture(ShaderStage::Pixel, slot, texture);
    }

    pub fn push_vs_texture_unbind(&mut self, slot: usize) {
        self.push_texture_unbind(ShaderStage::Vertex, slot);
    }

    pub fn push_ps_texture_unbind(&mut self, slot: usize) {
        self.push_texture_unbind(ShaderStage::Pixel, slot);
    }

    pub fn current_texture(&self, stage: ShaderStage, slot: usize) -> TextureId {
        *self.texture_slot(stage, slot).current()
    }

    pub fn current_vs_texture(&self, slot: usize) -> TextureId {
        self.current_texture(ShaderStage::Vertex, slot)
    }

    pub fn current_ps_texture(&self, slot: usize) -> TextureId {
        self.current_texture(ShaderStage::Pixel, slot)
    }

    pub fn get_texture(&self, stage: ShaderStage, slot: usize, index: u32) -> TextureId {
        *self.texture_slot(stage, slot).get(index)
    }

    // --- Reserved resources ---

    /// A texture referenced by this frame's stream.
    pub fn reserved_texture(&self, id: TextureId) -> Option<&Texture> {
        self.reserved_textures.get(&id)
    }

    pub fn reserved_vs(&self, id: VertexShaderId) -> Option<&VertexShader> {
        self.reserved_vs.get(&id)
    }

    pub fn reserved_ps(&self, id: PixelShaderId) -> Option<&PixelShader> {
        self.reserved_ps.get(&id)
    }

    pub fn reserved_texture_count(&self) -> usize {
        self.reserved_textures.len()
    }
}
