//! Immediate device context: resource-state transitions and committing bindings to the native
//! context.
//!
//! The context keeps a shadow copy of every table it pushed to the native context (per stage
//! CBs, SRVs, samplers and UAVs, plus vertex/index buffers, render targets and shaders). A commit
//! only re-pushes the contiguous range of slots that differ from the shadow copy.
//!
//! Within one commit, UAVs of every stage are resolved before any input slot: a resource must
//! leave the unordered-access state before it can be bound as a shader input.

use std::sync::Arc;

use crate::binding_model::{
    ChangedSlotRange, D3D11_MAX_CONSTANT_BUFFER_SLOTS, D3D11_MAX_RENDER_TARGETS,
    D3D11_MAX_SAMPLER_SLOTS, D3D11_MAX_SRV_SLOTS, D3D11_MAX_UAV_SLOTS,
    D3D11_MAX_VERTEX_BUFFER_SLOTS,
};
use crate::config::EngineConfig;
use crate::native_context::{IndexType, NativeContext, OutputTargets, OutputUavs};
use crate::pipeline_state::{PipelineState, PipelineType};
use crate::resource_state::{ResourceState, TransitionMode};
use crate::resources::{BindFlags, Buffer, NativeHandle, Texture, TextureView};
use crate::shader_resource_binding::ShaderResourceBinding;
use crate::stage::ShaderStage;

#[cfg(feature = "development")]
use crate::shader_resources::CommittedStageView;

const MAX_CBS: usize = D3D11_MAX_CONSTANT_BUFFER_SLOTS as usize;
const MAX_SRVS: usize = D3D11_MAX_SRV_SLOTS as usize;
const MAX_SAMPLERS: usize = D3D11_MAX_SAMPLER_SLOTS as usize;
const MAX_UAVS: usize = D3D11_MAX_UAV_SLOTS as usize;
const MAX_RTS: usize = D3D11_MAX_RENDER_TARGETS as usize;
const MAX_VBS: usize = D3D11_MAX_VERTEX_BUFFER_SLOTS as usize;

/// Native handles last pushed to one shader stage.
///
/// `srv_resources` and `uav_resources` hold the handle of the buffer or texture behind each view
/// so a resource can be found and unbound without going through its views.
#[derive(Debug, Clone)]
struct CommittedStage {
    cbs: [Option<NativeHandle>; MAX_CBS],
    srvs: [Option<NativeHandle>; MAX_SRVS],
    srv_resources: [Option<NativeHandle>; MAX_SRVS],
    samplers: [Option<NativeHandle>; MAX_SAMPLERS],
    uavs: [Option<NativeHandle>; MAX_UAVS],
    uav_resources: [Option<NativeHandle>; MAX_UAVS],
    num_cbs: u32,
    num_srvs: u32,
    num_samplers: u32,
    num_uavs: u32,
}

impl Default for CommittedStage {
    fn default() -> Self {
        Self {
            cbs: [None; MAX_CBS],
            srvs: [None; MAX_SRVS],
            srv_resources: [None; MAX_SRVS],
            samplers: [None; MAX_SAMPLERS],
            uavs: [None; MAX_UAVS],
            uav_resources: [None; MAX_UAVS],
            num_cbs: 0,
            num_srvs: 0,
            num_samplers: 0,
            num_uavs: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ViewKind {
    ShaderResource,
    UnorderedAccess,
}

#[derive(Debug, Clone, Default)]
struct VertexStream {
    buffer: Option<Arc<Buffer>>,
    offset: u32,
}

/// Resource whose state an explicit barrier changes.
#[derive(Debug, Clone)]
pub enum TransitionResource {
    Texture(Arc<Texture>),
    Buffer(Arc<Buffer>),
}

/// One explicit state transition for [`DeviceContext::transition_resource_states`].
#[derive(Debug, Clone)]
pub struct StateTransitionDesc {
    pub resource: TransitionResource,
    /// `UNKNOWN` means "use the currently tracked state".
    pub old_state: ResourceState,
    pub new_state: ResourceState,
    /// Record `new_state` as the resource's tracked state.
    pub update_state: bool,
}

impl StateTransitionDesc {
    pub fn texture(texture: Arc<Texture>, new_state: ResourceState) -> Self {
        Self {
            resource: TransitionResource::Texture(texture),
            old_state: ResourceState::UNKNOWN,
            new_state,
            update_state: true,
        }
    }

    pub fn buffer(buffer: Arc<Buffer>, new_state: ResourceState) -> Self {
        Self {
            resource: TransitionResource::Buffer(buffer),
            old_state: ResourceState::UNKNOWN,
            new_state,
            update_state: true,
        }
    }
}

/// Drives one [`NativeContext`]. Not meant to be shared between threads.
#[derive(Debug)]
pub struct DeviceContext<C: NativeContext> {
    native: C,
    config: EngineConfig,

    pipeline_state: Option<Arc<PipelineState>>,
    committed_shaders: [Option<NativeHandle>; ShaderStage::COUNT],
    committed: [CommittedStage; ShaderStage::COUNT],

    bound_render_targets: Vec<Option<Arc<TextureView>>>,
    bound_depth_stencil: Option<Arc<TextureView>>,

    vertex_streams: Vec<VertexStream>,
    committed_vbs: [Option<NativeHandle>; MAX_VBS],
    committed_vb_strides: [u32; MAX_VBS],
    committed_vb_offsets: [u32; MAX_VBS],
    num_committed_vbs: u32,
    vbs_up_to_date: bool,

    index_buffer: Option<Arc<Buffer>>,
    index_buffer_offset: u32,
    committed_ib: Option<NativeHandle>,
    committed_ib_format: Option<IndexType>,
    committed_ib_offset: u32,
    ib_up_to_date: bool,
}

impl<C: NativeContext> DeviceContext<C> {
    pub fn new(native: C, config: EngineConfig) -> Self {
        Self {
            native,
            config,
            pipeline_state: None,
            committed_shaders: [None; ShaderStage::COUNT],
            committed: Default::default(),
            bound_render_targets: Vec::with_capacity(MAX_RTS),
            bound_depth_stencil: None,
            vertex_streams: Vec::new(),
            committed_vbs: [None; MAX_VBS],
            committed_vb_strides: [0; MAX_VBS],
            committed_vb_offsets: [0; MAX_VBS],
            num_committed_vbs: 0,
            vbs_up_to_date: false,
            index_buffer: None,
            index_buffer_offset: 0,
            committed_ib: None,
            committed_ib_format: None,
            committed_ib_offset: 0,
            ib_up_to_date: false,
        }
    }

    pub fn native(&self) -> &C {
        &self.native
    }

    /// Direct access to the native context. Bindings changed through it are not tracked.
    pub fn native_mut(&mut self) -> &mut C {
        &mut self.native
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Mode for callers that do not pick one explicitly.
    pub fn default_transition_mode(&self) -> TransitionMode {
        self.config.transition_mode
    }

    pub fn pipeline_state(&self) -> Option<&Arc<PipelineState>> {
        self.pipeline_state.as_ref()
    }

    pub fn set_pipeline_state(&mut self, pso: &Arc<PipelineState>) {
        if let Some(current) = &self.pipeline_state {
            if Arc::ptr_eq(current, pso) {
                return;
            }
        }

        let stages: &[ShaderStage] = match pso.pipeline_type() {
            PipelineType::Compute => &[ShaderStage::Compute],
            PipelineType::Graphics => &[
                ShaderStage::Vertex,
                ShaderStage::Pixel,
                ShaderStage::Geometry,
                ShaderStage::Hull,
                ShaderStage::Domain,
            ],
        };
        for &stage in stages {
            let shader = pso.shader(stage).map(|shader| shader.native_handle());
            let committed = &mut self.committed_shaders[stage.index()];
            if *committed != shader {
                self.native.set_shader(stage, shader);
                *committed = shader;
            }
        }

        self.pipeline_state = Some(Arc::clone(pso));
    }

    /// Transitions the resources of `srb` to the states their bindings require, without
    /// committing anything.
    pub fn transition_shader_resources(&mut self, pso: &PipelineState, srb: Option<&ShaderResourceBinding>) {
        self.transition_and_commit(pso, srb, true, false, false);
    }

    /// Commits the resources of `srb` for the bound pipeline state.
    ///
    /// In `Transition` mode resources are transitioned first; in `Verify` mode their states are
    /// checked (development builds only); in `None` mode they are committed as they are.
    pub fn commit_shader_resources(&mut self, srb: Option<&ShaderResourceBinding>, mode: TransitionMode) {
        let Some(pso) = self.pipeline_state.clone() else {
            tracing::error!("No pipeline state is bound to the pipeline");
            return;
        };

        if let Some(srb) = srb {
            if !pso.is_compatible_with(srb.pipeline_state()) {
                tracing::error!(
                    "Shader resource binding object is not compatible with the currently bound pipeline state '{}'",
                    pso.name()
                );
                return;
            }
        }

        match mode {
            TransitionMode::Transition => self.transition_and_commit(&pso, srb, true, true, false),
            TransitionMode::None | TransitionMode::Verify => {
                self.transition_and_commit(&pso, srb, false, true, mode == TransitionMode::Verify)
            }
        }
    }

    fn transition_and_commit(
        &mut self,
        pso: &PipelineState,
        srb: Option<&ShaderResourceBinding>,
        transition: bool,
        commit: bool,
        verify: bool,
    ) {
        let Some(srb) = srb else {
            if pso.has_shader_resources() {
                tracing::error!(
                    "Pipeline state '{}' requires shader resource binding object to {} resources, but none is provided.",
                    pso.name(),
                    if commit { "commit" } else { "transition" }
                );
            }
            return;
        };

        let srb_pso = Arc::clone(srb.pipeline_state());
        if !pso.is_compatible_with(&srb_pso) {
            tracing::error!("Shader resource binding does not match Pipeline State");
            return;
        }

        #[cfg(feature = "development")]
        if pso.has_static_resources() && !srb.static_resources_initialized() {
            tracing::error!(
                "Static resources have not been initialized in the shader resource binding object being committed for PSO '{}'. Initialize static resources of the binding object first.",
                pso.name()
            );
        }

        let stage_count = srb_pso.stage_count();

        // UAVs of every stage go first.
        let mut clear_ps_uavs = commit && self.committed[ShaderStage::Pixel.index()].num_uavs > 0;
        for i in 0..stage_count {
            let stage = srb_pso.active_stage(i);
            let cache = srb.cache(i);
            let num_uavs = cache.uav_count();
            if num_uavs == 0 {
                continue;
            }
            if stage == ShaderStage::Pixel {
                clear_ps_uavs = false;
            }

            let mut changed = ChangedSlotRange::new();
            for slot in 0..num_uavs {
                let entry = cache.uav(slot);
                if transition {
                    if let Some(texture) = entry.texture() {
                        if texture.is_in_known_state() && !texture.check_state(ResourceState::UNORDERED_ACCESS) {
                            if texture.check_any_state(ResourceState::SHADER_RESOURCE | ResourceState::INPUT_ATTACHMENT) {
                                self.unbind_texture_from_input(texture);
                            }
                            if texture.check_state(ResourceState::RENDER_TARGET) {
                                self.unbind_texture_from_render_target(texture);
                            }
                            if texture.check_state(ResourceState::DEPTH_WRITE) {
                                self.unbind_texture_from_depth_stencil(texture);
                            }
                            texture.set_state(ResourceState::UNORDERED_ACCESS);
                        }
                    } else if let Some(buffer) = entry.buffer() {
                        if buffer.is_in_known_state() && !buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                            if buffer.check_any_state(ResourceState::GENERIC_READ) {
                                self.unbind_buffer_from_input(buffer);
                            }
                            buffer.set_state(ResourceState::UNORDERED_ACCESS);
                        }
                    }
                } else if verify {
                    #[cfg(feature = "development")]
                    if let Some(texture) = entry.texture() {
                        if texture.is_in_known_state() && !texture.check_state(ResourceState::UNORDERED_ACCESS) {
                            tracing::error!(
                                "Texture '{}' has not been transitioned to Unordered Access state. Call TransitionShaderResources(), use RESOURCE_STATE_TRANSITION_MODE_TRANSITION mode or explicitly transition the texture to required state.",
                                texture.name()
                            );
                        }
                    } else if let Some(buffer) = entry.buffer() {
                        if buffer.is_in_known_state() && !buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                            tracing::error!(
                                "Buffer '{}' has not been transitioned to Unordered Access state. Call TransitionShaderResources(), use RESOURCE_STATE_TRANSITION_MODE_TRANSITION mode or explicitly transition the buffer to required state.",
                                buffer.name()
                            );
                        }
                    }
                }

                if commit {
                    let bindings = &mut self.committed[stage.index()];
                    let s = slot as usize;
                    if bindings.uavs[s] != entry.view_handle() {
                        changed.mark(slot);
                    }
                    bindings.uavs[s] = entry.view_handle();
                    bindings.uav_resources[s] = entry.resource_handle();
                }
            }

            if !commit {
                continue;
            }
            let bindings = &mut self.committed[stage.index()];
            if stage == ShaderStage::Pixel {
                if !changed.is_empty() || bindings.num_uavs != num_uavs {
                    // Pixel-shader UAVs start right after the bound render targets.
                    let start = self.bound_render_targets.len() as u32;
                    if num_uavs <= start {
                        tracing::error!(
                            "Pixel shader uses {} UAV slots, but slots below {} are occupied by render targets",
                            num_uavs,
                            start
                        );
                    }
                    let end = num_uavs.max(start);
                    bindings.uavs[..start.min(num_uavs) as usize].fill(None);
                    bindings.uav_resources[..start.min(num_uavs) as usize].fill(None);
                    self.native.set_render_targets_and_unordered_access_views(
                        None,
                        Some(OutputUavs {
                            start_slot: start,
                            views: &bindings.uavs[start as usize..end as usize],
                        }),
                    );
                    let stale = num_uavs as usize..(bindings.num_uavs as usize).max(num_uavs as usize);
                    bindings.uavs[stale.clone()].fill(None);
                    bindings.uav_resources[stale].fill(None);
                    bindings.num_uavs = num_uavs;
                }
            } else if let Some(range) = changed.range() {
                self.native.set_unordered_access_views(
                    stage,
                    range.start,
                    &bindings.uavs[range.start as usize..range.end as usize],
                );
                bindings.num_uavs = bindings.num_uavs.max(num_uavs);
            }
        }

        if clear_ps_uavs {
            let bindings = &mut self.committed[ShaderStage::Pixel.index()];
            let count = bindings.num_uavs as usize;
            bindings.uavs[..count].fill(None);
            bindings.uav_resources[..count].fill(None);
            self.native.set_render_targets_and_unordered_access_views(
                None,
                Some(OutputUavs {
                    start_slot: 0,
                    views: &[],
                }),
            );
            bindings.num_uavs = 0;
        }

        // Inputs: constant buffers, shader resource views, samplers.
        for i in 0..stage_count {
            let stage = srb_pso.active_stage(i);
            let cache = srb.cache(i);

            let num_cbs = cache.cb_count();
            if num_cbs > 0 {
                let mut changed = ChangedSlotRange::new();
                for slot in 0..num_cbs {
                    let buffer = cache.cb(slot).buffer();
                    if let Some(buffer) = buffer {
                        if transition {
                            if buffer.is_in_known_state() && !buffer.check_state(ResourceState::CONSTANT_BUFFER) {
                                if buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                                    self.unbind_resource_from_uav(buffer.native_handle());
                                    buffer.clear_state(ResourceState::UNORDERED_ACCESS);
                                }
                                buffer.add_state(ResourceState::CONSTANT_BUFFER);
                            }
                        } else if verify {
                            #[cfg(feature = "development")]
                            if buffer.is_in_known_state() && !buffer.check_state(ResourceState::CONSTANT_BUFFER) {
                                tracing::error!(
                                    "Buffer '{}' has not been transitioned to Constant Buffer state. Call TransitionShaderResources(), use RESOURCE_STATE_TRANSITION_MODE_TRANSITION mode or explicitly transition the buffer to required state.",
                                    buffer.name()
                                );
                            }
                        }
                    }

                    if commit {
                        let handle = buffer.map(|buffer| buffer.native_handle());
                        let bindings = &mut self.committed[stage.index()];
                        if bindings.cbs[slot as usize] != handle {
                            changed.mark(slot);
                            bindings.cbs[slot as usize] = handle;
                        }
                    }
                }

                if let Some(range) = changed.range() {
                    let bindings = &mut self.committed[stage.index()];
                    self.native.set_constant_buffers(
                        stage,
                        range.start,
                        &bindings.cbs[range.start as usize..range.end as usize],
                    );
                    bindings.num_cbs = bindings.num_cbs.max(num_cbs);
                }
            }

            let num_srvs = cache.srv_count();
            if num_srvs > 0 {
                let mut changed = ChangedSlotRange::new();
                for slot in 0..num_srvs {
                    let entry = cache.srv(slot);
                    if transition {
                        if let Some(texture) = entry.texture() {
                            if texture.is_in_known_state()
                                && !texture.check_any_state(ResourceState::SHADER_RESOURCE | ResourceState::INPUT_ATTACHMENT)
                            {
                                if texture.check_state(ResourceState::UNORDERED_ACCESS) {
                                    self.unbind_resource_from_uav(texture.native_handle());
                                    texture.clear_state(ResourceState::UNORDERED_ACCESS);
                                }
                                if texture.check_state(ResourceState::RENDER_TARGET) {
                                    self.unbind_texture_from_render_target(texture);
                                }
                                if texture.check_state(ResourceState::DEPTH_WRITE) {
                                    self.unbind_texture_from_depth_stencil(texture);
                                }
                                texture.set_state(ResourceState::SHADER_RESOURCE);
                            }
                        } else if let Some(buffer) = entry.buffer() {
                            if buffer.is_in_known_state() && !buffer.check_state(ResourceState::SHADER_RESOURCE) {
                                if buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                                    self.unbind_resource_from_uav(buffer.native_handle());
                                    buffer.clear_state(ResourceState::UNORDERED_ACCESS);
                                }
                                buffer.add_state(ResourceState::SHADER_RESOURCE);
                            }
                        }
                    } else if verify {
                        #[cfg(feature = "development")]
                        if let Some(texture) = entry.texture() {
                            if texture.is_in_known_state()
                                && !texture.check_any_state(ResourceState::SHADER_RESOURCE | ResourceState::INPUT_ATTACHMENT)
                            {
                                tracing::error!(
                                    "Texture '{}' has not been transitioned to Shader Resource state. Call TransitionShaderResources(), use RESOURCE_STATE_TRANSITION_MODE_TRANSITION mode or explicitly transition the texture to required state.",
                                    texture.name()
                                );
                            }
                        } else if let Some(buffer) = entry.buffer() {
                            if buffer.is_in_known_state() && !buffer.check_state(ResourceState::SHADER_RESOURCE) {
                                tracing::error!(
                                    "Buffer '{}' has not been transitioned to Shader Resource state. Call TransitionShaderResources(), use RESOURCE_STATE_TRANSITION_MODE_TRANSITION mode or explicitly transition the buffer to required state.",
                                    buffer.name()
                                );
                            }
                        }
                    }

                    if commit {
                        let bindings = &mut self.committed[stage.index()];
                        let s = slot as usize;
                        if bindings.srvs[s] != entry.view_handle() {
                            changed.mark(slot);
                        }
                        bindings.srvs[s] = entry.view_handle();
                        bindings.srv_resources[s] = entry.resource_handle();
                    }
                }

                if let Some(range) = changed.range() {
                    let bindings = &mut self.committed[stage.index()];
                    self.native.set_shader_resources(
                        stage,
                        range.start,
                        &bindings.srvs[range.start as usize..range.end as usize],
                    );
                    bindings.num_srvs = bindings.num_srvs.max(num_srvs);
                }
            }

            let num_samplers = cache.sampler_count();
            if commit && num_samplers > 0 {
                let mut changed = ChangedSlotRange::new();
                let bindings = &mut self.committed[stage.index()];
                for (slot, handle) in cache.sampler_handles().iter().enumerate() {
                    if bindings.samplers[slot] != *handle {
                        changed.mark(slot as u32);
                        bindings.samplers[slot] = *handle;
                    }
                }
                if let Some(range) = changed.range() {
                    self.native.set_samplers(
                        stage,
                        range.start,
                        &bindings.samplers[range.start as usize..range.end as usize],
                    );
                    bindings.num_samplers = bindings.num_samplers.max(num_samplers);
                }
            }

            #[cfg(feature = "development")]
            if commit && self.config.verify_committed {
                let bindings = &self.committed[stage.index()];
                srb.layout(i).resources().dvp_verify_committed_resources(
                    &CommittedStageView {
                        cbs: &bindings.cbs,
                        srvs: &bindings.srvs,
                        srv_resources: &bindings.srv_resources,
                        samplers: &bindings.samplers,
                        uavs: &bindings.uavs,
                        uav_resources: &bindings.uav_resources,
                    },
                    cache,
                );
            }
        }

        #[cfg(feature = "development")]
        if commit && self.config.verify_committed {
            self.dbg_verify_committed_state();
        }
    }

    /// Binds vertex buffers starting at `start_slot`. With `reset`, every slot outside the new
    /// range is unbound. Missing offsets default to zero; strides come from the pipeline's input
    /// layout when the buffers are committed at draw time.
    pub fn set_vertex_buffers(
        &mut self,
        start_slot: u32,
        buffers: &[Option<Arc<Buffer>>],
        offsets: &[u32],
        mode: TransitionMode,
        reset: bool,
    ) {
        let start = start_slot as usize;
        let mut buffers = buffers;
        if start + buffers.len() > MAX_VBS {
            tracing::error!(
                "Too many vertex buffer slots are being set: {} starting at slot {}. The maximum number of slots is {}",
                buffers.len(),
                start_slot,
                MAX_VBS
            );
            buffers = &buffers[..MAX_VBS.saturating_sub(start)];
        }

        if reset {
            self.vertex_streams.clear();
        }
        let end = start + buffers.len();
        if self.vertex_streams.len() < end {
            self.vertex_streams.resize_with(end, VertexStream::default);
        }
        for (i, buffer) in buffers.iter().enumerate() {
            if let Some(buffer) = buffer {
                if !buffer.desc().bind_flags.contains(BindFlags::VERTEX_BUFFER) {
                    tracing::error!(
                        "Buffer '{}' being bound as vertex buffer to slot {} was not created with BIND_VERTEX_BUFFER flag",
                        buffer.name(),
                        start + i
                    );
                }
            }
            self.vertex_streams[start + i] = VertexStream {
                buffer: buffer.clone(),
                offset: offsets.get(i).copied().unwrap_or(0),
            };
        }
        while self.vertex_streams.last().is_some_and(|stream| stream.buffer.is_none()) {
            self.vertex_streams.pop();
        }

        for slot in 0..self.vertex_streams.len() {
            let Some(buffer) = self.vertex_streams[slot].buffer.clone() else {
                continue;
            };
            match mode {
                TransitionMode::Transition => {
                    if buffer.is_in_known_state() && buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                        self.unbind_resource_from_uav(buffer.native_handle());
                        buffer.clear_state(ResourceState::UNORDERED_ACCESS);
                    }
                }
                TransitionMode::Verify => {
                    #[cfg(feature = "development")]
                    if buffer.is_in_known_state() && buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                        tracing::error!(
                            "Buffer '{}' used as vertex buffer at slot {} is in RESOURCE_STATE_UNORDERED_ACCESS state. Use RESOURCE_STATE_TRANSITION_MODE_TRANSITION mode or explicitly transition the buffer to RESOURCE_STATE_VERTEX_BUFFER state.",
                            buffer.name(),
                            slot
                        );
                    }
                }
                TransitionMode::None => {}
            }
        }

        self.vbs_up_to_date = false;
    }

    pub fn set_index_buffer(&mut self, buffer: Option<Arc<Buffer>>, offset: u32, mode: TransitionMode) {
        if let Some(buffer) = &buffer {
            if !buffer.desc().bind_flags.contains(BindFlags::INDEX_BUFFER) {
                tracing::error!(
                    "Buffer '{}' being bound as index buffer was not created with BIND_INDEX_BUFFER flag",
                    buffer.name()
                );
            }
            match mode {
                TransitionMode::Transition => {
                    if buffer.is_in_known_state() && buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                        self.unbind_resource_from_uav(buffer.native_handle());
                        buffer.clear_state(ResourceState::UNORDERED_ACCESS);
                    }
                }
                TransitionMode::Verify => {
                    #[cfg(feature = "development")]
                    if buffer.is_in_known_state() && buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                        tracing::error!(
                            "Buffer '{}' used as index buffer is in RESOURCE_STATE_UNORDERED_ACCESS state. Use RESOURCE_STATE_TRANSITION_MODE_TRANSITION mode or explicitly transition the buffer to RESOURCE_STATE_INDEX_BUFFER state.",
                            buffer.name()
                        );
                    }
                }
                TransitionMode::None => {}
            }
        }

        self.index_buffer = buffer;
        self.index_buffer_offset = offset;
        self.ib_up_to_date = false;
    }

    fn commit_vertex_buffers(&mut self, pso: &PipelineState) {
        let num_streams = self.vertex_streams.len().min(MAX_VBS);
        let mut bind = num_streams as u32 != self.num_committed_vbs;

        for (slot, stream) in self.vertex_streams.iter().take(num_streams).enumerate() {
            let handle = stream.buffer.as_ref().map(|buffer| buffer.native_handle());
            let stride = pso.buffer_stride(slot as u32);
            if self.committed_vbs[slot] != handle
                || self.committed_vb_strides[slot] != stride
                || self.committed_vb_offsets[slot] != stream.offset
            {
                self.committed_vbs[slot] = handle;
                self.committed_vb_strides[slot] = stride;
                self.committed_vb_offsets[slot] = stream.offset;
                bind = true;
            }
            if let Some(buffer) = &stream.buffer {
                buffer.add_state(ResourceState::VERTEX_BUFFER);
            }
        }

        // Slots past the new stream count are unbound by the same call.
        let max = num_streams.max(self.num_committed_vbs as usize);
        for slot in num_streams..max {
            self.committed_vbs[slot] = None;
            self.committed_vb_strides[slot] = 0;
            self.committed_vb_offsets[slot] = 0;
        }
        self.num_committed_vbs = num_streams as u32;

        if bind && max > 0 {
            self.native.set_vertex_buffers(
                0,
                &self.committed_vbs[..max],
                &self.committed_vb_strides[..max],
                &self.committed_vb_offsets[..max],
            );
        }
        self.vbs_up_to_date = true;
    }

    fn commit_index_buffer(&mut self, index_type: IndexType) {
        let Some(buffer) = &self.index_buffer else {
            tracing::error!("Index buffer is not set up for indexed draw command");
            return;
        };

        let handle = Some(buffer.native_handle());
        if self.committed_ib != handle
            || self.committed_ib_format != Some(index_type)
            || self.committed_ib_offset != self.index_buffer_offset
        {
            self.committed_ib = handle;
            self.committed_ib_format = Some(index_type);
            self.committed_ib_offset = self.index_buffer_offset;
            self.native.set_index_buffer(handle, index_type, self.index_buffer_offset);
        }

        buffer.add_state(ResourceState::INDEX_BUFFER);
        self.ib_up_to_date = true;
    }

    fn prepare_for_draw(&mut self) -> bool {
        let Some(pso) = self.pipeline_state.clone() else {
            tracing::error!("No pipeline state is bound to the pipeline");
            return false;
        };
        if pso.pipeline_type() != PipelineType::Graphics {
            tracing::error!("Pipeline state '{}' bound for a draw command is not a graphics pipeline", pso.name());
            return false;
        }

        if pso.has_input_layout() && !self.vbs_up_to_date {
            self.commit_vertex_buffers(&pso);
        }

        #[cfg(feature = "development")]
        if self.config.transition_mode == TransitionMode::Verify {
            for (slot, stream) in self.vertex_streams.iter().enumerate() {
                if let Some(buffer) = &stream.buffer {
                    if buffer.is_in_known_state() && buffer.check_state(ResourceState::UNORDERED_ACCESS) {
                        tracing::error!(
                            "Buffer '{}' used as vertex buffer at slot {} is in RESOURCE_STATE_UNORDERED_ACCESS state. Use RESOURCE_STATE_TRANSITION_MODE_TRANSITION mode or explicitly transition the buffer to RESOURCE_STATE_VERTEX_BUFFER state.",
                            buffer.name(),
                            slot
                        );
                    }
                }
            }
        }

        #[cfg(feature = "development")]
        if self.config.verify_committed {
            self.dbg_verify_committed_state();
        }

        true
    }

    pub fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        if self.prepare_for_draw() {
            self.native.draw(vertex_count, start_vertex);
        }
    }

    pub fn draw_indexed(&mut self, index_count: u32, index_type: IndexType, start_index: u32, base_vertex: i32) {
        if self.committed_ib_format != Some(index_type) {
            self.ib_up_to_date = false;
        }
        if !self.ib_up_to_date {
            self.commit_index_buffer(index_type);
        }
        if self.prepare_for_draw() {
            self.native.draw_indexed(index_count, start_index, base_vertex);
        }
    }

    pub fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        match &self.pipeline_state {
            None => {
                tracing::error!("No pipeline state is bound to the pipeline");
                return;
            }
            Some(pso) if pso.pipeline_type() != PipelineType::Compute => {
                tracing::error!("Pipeline state '{}' bound for a dispatch command is not a compute pipeline", pso.name());
                return;
            }
            Some(_) => {}
        }

        #[cfg(feature = "development")]
        if self.config.verify_committed {
            self.dbg_verify_committed_state();
        }

        self.native.dispatch(x, y, z);
    }

    /// Binds render targets and a depth-stencil view. An empty call unbinds every target.
    pub fn set_render_targets(
        &mut self,
        render_targets: &[Option<Arc<TextureView>>],
        depth_stencil: Option<Arc<TextureView>>,
        mode: TransitionMode,
    ) {
        let render_targets = if render_targets.len() > MAX_RTS {
            tracing::error!(
                "{} render targets are being set, but at most {} are supported",
                render_targets.len(),
                MAX_RTS
            );
            &render_targets[..MAX_RTS]
        } else {
            render_targets
        };

        if render_targets.is_empty() && depth_stencil.is_none() {
            self.bound_render_targets.clear();
            self.bound_depth_stencil = None;
            self.commit_render_targets();
            return;
        }

        let same_view = |a: &Option<Arc<TextureView>>, b: &Option<Arc<TextureView>>| match (a, b) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        let unchanged = render_targets.len() == self.bound_render_targets.len()
            && render_targets
                .iter()
                .zip(&self.bound_render_targets)
                .all(|(a, b)| same_view(a, b))
            && same_view(&depth_stencil, &self.bound_depth_stencil);
        if unchanged {
            return;
        }

        for view in render_targets.iter().flatten() {
            self.prepare_output_texture(view.texture(), ResourceState::RENDER_TARGET, "render targets", mode);
        }
        if let Some(view) = &depth_stencil {
            self.prepare_output_texture(view.texture(), ResourceState::DEPTH_WRITE, "depth-stencil buffer", mode);
        }

        self.bound_render_targets.clear();
        self.bound_render_targets.extend(render_targets.iter().cloned());
        self.bound_depth_stencil = depth_stencil;
        self.commit_render_targets();
    }

    #[cfg_attr(not(feature = "development"), allow(unused_variables))]
    fn prepare_output_texture(&mut self, texture: &Arc<Texture>, state: ResourceState, what: &str, mode: TransitionMode) {
        match mode {
            TransitionMode::Transition => {
                self.unbind_texture_from_input(texture);
                if texture.is_in_known_state() {
                    texture.set_state(state);
                }
            }
            TransitionMode::Verify => {
                #[cfg(feature = "development")]
                if texture.is_in_known_state() && !texture.check_state(state) {
                    tracing::error!(
                        "Setting {} requires texture '{}' to be transitioned to {} state. Actual texture state: {}. Use appropriate state transition flags or explicitly transition the texture using TransitionResourceStates() method.",
                        what,
                        texture.name(),
                        state,
                        texture.state()
                    );
                }
            }
            TransitionMode::None => {}
        }
    }

    fn commit_render_targets(&mut self) {
        let mut render_targets = [None; MAX_RTS];
        let num_rts = self.bound_render_targets.len();
        for (slot, view) in self.bound_render_targets.iter().enumerate() {
            render_targets[slot] = view.as_ref().map(|view| view.native_handle());
        }
        let depth_stencil = self.bound_depth_stencil.as_ref().map(|view| view.native_handle());

        let ps = &mut self.committed[ShaderStage::Pixel.index()];
        if ps.num_uavs > 0 {
            // A plain render-target call would drop the pixel-shader UAVs.
            self.native.set_render_targets_and_unordered_access_views(
                Some(OutputTargets {
                    render_targets: &render_targets[..num_rts],
                    depth_stencil,
                }),
                None,
            );
            let overlap = num_rts.min(MAX_UAVS);
            ps.uavs[..overlap].fill(None);
            ps.uav_resources[..overlap].fill(None);
            if num_rts >= ps.num_uavs as usize {
                ps.num_uavs = 0;
            }
        } else {
            self.native.set_render_targets(&render_targets[..num_rts], depth_stencil);
        }
    }

    pub fn bound_render_targets(&self) -> &[Option<Arc<TextureView>>] {
        &self.bound_render_targets
    }

    pub fn bound_depth_stencil(&self) -> Option<&Arc<TextureView>> {
        self.bound_depth_stencil.as_ref()
    }

    /// Records explicit state transitions, unbinding resources from slots that conflict with
    /// their new state.
    pub fn transition_resource_states(&mut self, barriers: &[StateTransitionDesc]) {
        for barrier in barriers {
            let new_state = barrier.new_state;
            match &barrier.resource {
                TransitionResource::Texture(texture) => {
                    let Some(old_state) =
                        resolve_old_state("texture", texture.name(), texture.state(), barrier.old_state)
                    else {
                        continue;
                    };

                    if new_state.contains(ResourceState::UNORDERED_ACCESS) {
                        self.unbind_texture_from_input(texture);
                        if old_state.contains(ResourceState::RENDER_TARGET) {
                            self.unbind_texture_from_render_target(texture);
                        }
                        if old_state.contains(ResourceState::DEPTH_WRITE) {
                            self.unbind_texture_from_depth_stencil(texture);
                        }
                    }
                    if new_state.intersects(ResourceState::GENERIC_READ | ResourceState::INPUT_ATTACHMENT) {
                        if old_state.contains(ResourceState::RENDER_TARGET) {
                            self.unbind_texture_from_render_target(texture);
                        }
                        if old_state.contains(ResourceState::DEPTH_WRITE) {
                            self.unbind_texture_from_depth_stencil(texture);
                        }
                        if old_state.contains(ResourceState::UNORDERED_ACCESS) {
                            self.unbind_resource_from_uav(texture.native_handle());
                            texture.clear_state(ResourceState::UNORDERED_ACCESS);
                        }
                    }
                    if barrier.update_state {
                        texture.set_state(new_state);
                    }
                }
                TransitionResource::Buffer(buffer) => {
                    let Some(old_state) =
                        resolve_old_state("buffer", buffer.name(), buffer.state(), barrier.old_state)
                    else {
                        continue;
                    };

                    if new_state.contains(ResourceState::UNORDERED_ACCESS) {
                        self.unbind_buffer_from_input(buffer);
                    }
                    if new_state.intersects(ResourceState::GENERIC_READ) && old_state.contains(ResourceState::UNORDERED_ACCESS) {
                        self.unbind_resource_from_uav(buffer.native_handle());
                        buffer.clear_state(ResourceState::UNORDERED_ACCESS);
                    }
                    if barrier.update_state {
                        buffer.set_state(new_state);
                    }
                }
            }
        }
    }

    /// Nulls every view of `resource` in the committed SRV or UAV tables of all stages.
    fn unbind_views(&mut self, kind: ViewKind, resource: NativeHandle) {
        let num_rts = self.bound_render_targets.len();
        for stage in ShaderStage::ALL {
            let bindings = &mut self.committed[stage.index()];
            let (views, resources, count): (&mut [Option<NativeHandle>], &mut [Option<NativeHandle>], &mut u32) =
                match kind {
                    ViewKind::ShaderResource => (&mut bindings.srvs[..], &mut bindings.srv_resources[..], &mut bindings.num_srvs),
                    ViewKind::UnorderedAccess => (&mut bindings.uavs[..], &mut bindings.uav_resources[..], &mut bindings.num_uavs),
                };

            let output_merger_uavs = kind == ViewKind::UnorderedAccess && stage == ShaderStage::Pixel;
            let mut unbound = false;
            for slot in 0..*count as usize {
                if resources[slot] != Some(resource) {
                    continue;
                }
                views[slot] = None;
                resources[slot] = None;
                unbound = true;
                if output_merger_uavs {
                    continue;
                }
                match kind {
                    ViewKind::ShaderResource => self.native.set_shader_resources(stage, slot as u32, &[None]),
                    ViewKind::UnorderedAccess => self.native.set_unordered_access_views(stage, slot as u32, &[None]),
                }
            }

            if unbound && output_merger_uavs {
                let end = *count as usize;
                let start = num_rts.min(end);
                self.native.set_render_targets_and_unordered_access_views(
                    None,
                    Some(OutputUavs {
                        start_slot: num_rts as u32,
                        views: &views[start..end],
                    }),
                );
            }

            while *count > 0 && resources[*count as usize - 1].is_none() {
                *count -= 1;
            }
        }
    }

    fn unbind_texture_from_input(&mut self, texture: &Texture) {
        self.unbind_views(ViewKind::ShaderResource, texture.native_handle());
        texture.clear_state(ResourceState::SHADER_RESOURCE | ResourceState::INPUT_ATTACHMENT);
    }

    fn unbind_buffer_from_input(&mut self, buffer: &Buffer) {
        if !buffer.is_in_known_state() {
            return;
        }
        let handle = buffer.native_handle();

        if buffer.check_state(ResourceState::SHADER_RESOURCE) {
            self.unbind_views(ViewKind::ShaderResource, handle);
            buffer.clear_state(ResourceState::SHADER_RESOURCE);
        }

        if buffer.check_state(ResourceState::INDEX_BUFFER) {
            if self.committed_ib == Some(handle) {
                self.committed_ib = None;
                self.committed_ib_format = None;
                self.committed_ib_offset = 0;
                self.ib_up_to_date = false;
                self.native.set_index_buffer(None, IndexType::U32, 0);
            }
            buffer.clear_state(ResourceState::INDEX_BUFFER);
        }

        if buffer.check_state(ResourceState::VERTEX_BUFFER) {
            for slot in 0..self.num_committed_vbs as usize {
                if self.committed_vbs[slot] == Some(handle) {
                    self.committed_vbs[slot] = None;
                    self.committed_vb_strides[slot] = 0;
                    self.committed_vb_offsets[slot] = 0;
                    self.vbs_up_to_date = false;
                    self.native.set_vertex_buffers(slot as u32, &[None], &[0], &[0]);
                }
            }
            buffer.clear_state(ResourceState::VERTEX_BUFFER);
        }

        if buffer.check_state(ResourceState::CONSTANT_BUFFER) {
            for stage in ShaderStage::ALL {
                let bindings = &mut self.committed[stage.index()];
                for slot in 0..bindings.num_cbs as usize {
                    if bindings.cbs[slot] == Some(handle) {
                        bindings.cbs[slot] = None;
                        self.native.set_constant_buffers(stage, slot as u32, &[None]);
                    }
                }
                while bindings.num_cbs > 0 && bindings.cbs[bindings.num_cbs as usize - 1].is_none() {
                    bindings.num_cbs -= 1;
                }
            }
            buffer.clear_state(ResourceState::CONSTANT_BUFFER);
        }
    }

    fn unbind_resource_from_uav(&mut self, resource: NativeHandle) {
        self.unbind_views(ViewKind::UnorderedAccess, resource);
    }

    fn unbind_texture_from_render_target(&mut self, texture: &Texture) {
        let handle = texture.native_handle();
        let mut unbound = false;
        for slot in self.bound_render_targets.iter_mut() {
            if slot.as_ref().is_some_and(|view| view.texture().native_handle() == handle) {
                *slot = None;
                unbound = true;
            }
        }
        if unbound {
            while self.bound_render_targets.last().is_some_and(Option::is_none) {
                self.bound_render_targets.pop();
            }
            self.commit_render_targets();
        }
        texture.clear_state(ResourceState::RENDER_TARGET);
    }

    fn unbind_texture_from_depth_stencil(&mut self, texture: &Texture) {
        let bound = self
            .bound_depth_stencil
            .as_ref()
            .is_some_and(|view| view.texture().native_handle() == texture.native_handle());
        if bound {
            self.bound_depth_stencil = None;
            self.commit_render_targets();
        }
        texture.clear_state(ResourceState::DEPTH_WRITE);
    }

    /// Unbinds every committed constant buffer, SRV, sampler and UAV of every stage. Vertex and
    /// index buffers stay bound.
    pub fn release_committed_shader_resources(&mut self) {
        for stage in ShaderStage::ALL {
            let bindings = &mut self.committed[stage.index()];

            if bindings.num_cbs > 0 {
                let count = bindings.num_cbs as usize;
                bindings.cbs[..count].fill(None);
                self.native.set_constant_buffers(stage, 0, &bindings.cbs[..count]);
            }
            if bindings.num_srvs > 0 {
                let count = bindings.num_srvs as usize;
                bindings.srvs[..count].fill(None);
                self.native.set_shader_resources(stage, 0, &bindings.srvs[..count]);
            }
            if bindings.num_samplers > 0 {
                let count = bindings.num_samplers as usize;
                bindings.samplers[..count].fill(None);
                self.native.set_samplers(stage, 0, &bindings.samplers[..count]);
            }
            if bindings.num_uavs > 0 {
                let count = bindings.num_uavs as usize;
                bindings.uavs[..count].fill(None);
                if stage == ShaderStage::Pixel {
                    self.native.set_render_targets_and_unordered_access_views(
                        None,
                        Some(OutputUavs {
                            start_slot: 0,
                            views: &[],
                        }),
                    );
                } else {
                    self.native.set_unordered_access_views(stage, 0, &bindings.uavs[..count]);
                }
            }

            bindings.srv_resources.fill(None);
            bindings.uav_resources.fill(None);
            bindings.num_cbs = 0;
            bindings.num_srvs = 0;
            bindings.num_samplers = 0;
            bindings.num_uavs = 0;
        }

        #[cfg(feature = "development")]
        if self.config.verify_committed {
            self.dbg_verify_committed_state();
        }
    }

    /// Unbinds everything: shader resources, shaders, render targets, vertex and index buffers,
    /// and forgets the bound pipeline state.
    pub fn invalidate_state(&mut self) {
        self.release_committed_shader_resources();

        for stage in ShaderStage::ALL {
            self.committed_shaders[stage.index()] = None;
            self.native.set_shader(stage, None);
        }

        self.native.set_render_targets(&[None], None);

        if self.num_committed_vbs > 0 {
            let count = self.num_committed_vbs as usize;
            self.committed_vbs[..count].fill(None);
            self.committed_vb_strides[..count].fill(0);
            self.committed_vb_offsets[..count].fill(0);
            self.native.set_vertex_buffers(
                0,
                &self.committed_vbs[..count],
                &self.committed_vb_strides[..count],
                &self.committed_vb_offsets[..count],
            );
            self.num_committed_vbs = 0;
        }
        self.vbs_up_to_date = false;

        if self.committed_ib.is_some() {
            self.native.set_index_buffer(None, IndexType::U32, 0);
            self.committed_ib = None;
        }
        self.committed_ib_format = None;
        self.committed_ib_offset = 0;
        self.ib_up_to_date = false;

        self.pipeline_state = None;
        self.bound_render_targets.clear();
        self.bound_depth_stencil = None;
    }

    /// Returns `true` if a UAV is committed at `slot` of `stage`.
    pub fn is_uav_bound(&self, stage: ShaderStage, slot: u32) -> bool {
        let bindings = &self.committed[stage.index()];
        slot < bindings.num_uavs && bindings.uavs[slot as usize].is_some()
    }

    pub fn committed_cbs(&self, stage: ShaderStage) -> &[Option<NativeHandle>] {
        let bindings = &self.committed[stage.index()];
        &bindings.cbs[..bindings.num_cbs as usize]
    }

    pub fn committed_srvs(&self, stage: ShaderStage) -> &[Option<NativeHandle>] {
        let bindings = &self.committed[stage.index()];
        &bindings.srvs[..bindings.num_srvs as usize]
    }

    pub fn committed_samplers(&self, stage: ShaderStage) -> &[Option<NativeHandle>] {
        let bindings = &self.committed[stage.index()];
        &bindings.samplers[..bindings.num_samplers as usize]
    }

    pub fn committed_uavs(&self, stage: ShaderStage) -> &[Option<NativeHandle>] {
        let bindings = &self.committed[stage.index()];
        &bindings.uavs[..bindings.num_uavs as usize]
    }

    pub fn committed_vertex_buffers(&self) -> &[Option<NativeHandle>] {
        &self.committed_vbs[..self.num_committed_vbs as usize]
    }

    pub fn committed_index_buffer(&self) -> Option<NativeHandle> {
        self.committed_ib
    }

    /// Compares every tracked table with what the native context reports. Logs each mismatch.
    #[cfg(feature = "development")]
    pub fn dbg_verify_committed_state(&self) -> bool {
        let mut ok = true;
        for stage in ShaderStage::ALL {
            let bindings = &self.committed[stage.index()];
            ok &= dbg_verify_table(
                "Constant buffer",
                stage,
                &bindings.cbs,
                bindings.num_cbs,
                &self.native.constant_buffers(stage),
            );
            ok &= dbg_verify_table(
                "Shader resource view",
                stage,
                &bindings.srvs,
                bindings.num_srvs,
                &self.native.shader_resources(stage),
            );
            ok &= dbg_verify_table(
                "Sampler",
                stage,
                &bindings.samplers,
                bindings.num_samplers,
                &self.native.samplers(stage),
            );
            ok &= dbg_verify_table(
                "Unordered access view",
                stage,
                &bindings.uavs,
                bindings.num_uavs,
                &self.native.unordered_access_views(stage),
            );

            let native_shader = self.native.shader(stage);
            if native_shader != self.committed_shaders[stage.index()] {
                tracing::error!("{} shader binding mismatch", stage);
                ok = false;
            }
        }

        let ib = self.native.index_buffer();
        if ib.buffer != self.committed_ib {
            tracing::error!("Index buffer binding mismatch detected");
            ok = false;
        }
        if let Some(format) = self.committed_ib_format {
            if self.committed_ib.is_some() && ib.index_type != format {
                tracing::error!("Index buffer format mismatch detected");
                ok = false;
            }
        }
        if self.committed_ib.is_some() && ib.offset != self.committed_ib_offset {
            tracing::error!("Index buffer offset mismatch detected");
            ok = false;
        }

        for (slot, stream) in self.native.vertex_buffers().iter().enumerate() {
            if slot < self.num_committed_vbs as usize {
                if stream.buffer != self.committed_vbs[slot] {
                    tracing::error!("Vertex buffer binding mismatch detected at slot {}", slot);
                    ok = false;
                }
                if stream.buffer.is_some()
                    && (stream.stride != self.committed_vb_strides[slot] || stream.offset != self.committed_vb_offsets[slot])
                {
                    tracing::error!("Vertex buffer stride or offset mismatch detected at slot {}", slot);
                    ok = false;
                }
            } else if stream.buffer.is_some() {
                tracing::error!("Unexpected non-null vertex buffer found at slot {}", slot);
                ok = false;
            }
        }

        ok
    }
}

fn resolve_old_state(kind: &str, name: &str, current: ResourceState, old: ResourceState) -> Option<ResourceState> {
    if old.is_unknown() {
        if current.is_unknown() {
            tracing::error!(
                "Failed to transition the state of {} '{}' because the {} state is unknown and is not explicitly specified",
                kind,
                name,
                kind
            );
            return None;
        }
        return Some(current);
    }
    if !current.is_unknown() && current != old {
        tracing::error!(
            "The state {} of {} '{}' does not match the old state {} specified by the barrier",
            current,
            kind,
            name,
            old
        );
    }
    Some(old)
}

#[cfg(feature = "development")]
fn dbg_verify_table(
    kind: &str,
    stage: ShaderStage,
    committed: &[Option<NativeHandle>],
    count: u32,
    native: &[Option<NativeHandle>],
) -> bool {
    let mut ok = true;
    for (slot, native) in native.iter().enumerate() {
        if slot < count as usize {
            if committed[slot] != *native {
                tracing::error!("{} binding mismatch found for {} shader type at slot {}", kind, stage, slot);
                ok = false;
            }
        } else if native.is_some() || committed.get(slot).copied().flatten().is_some() {
            tracing::error!("{} unexpected non-null resource found for {} shader type at slot {}", kind, stage, slot);
            ok = false;
        }
    }
    ok
}
