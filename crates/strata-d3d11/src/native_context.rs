//! The native graphics-context boundary.
//!
//! [`NativeContext`] mirrors the subset of `ID3D11DeviceContext` the committer drives: per-stage
//! "set resources at slot range" calls, output-merger and input-assembler bindings, shader
//! selection and draw/dispatch. The query methods return the full slot tables and back the
//! committed-state verification.
//!
//! [`RecordingContext`] keeps a shadow copy of native state and records every call. Tests and
//! benchmarks use it in place of a real device.

use crate::binding_model::{
    D3D11_MAX_CONSTANT_BUFFER_SLOTS, D3D11_MAX_RENDER_TARGETS, D3D11_MAX_SAMPLER_SLOTS,
    D3D11_MAX_SRV_SLOTS, D3D11_MAX_UAV_SLOTS, D3D11_MAX_VERTEX_BUFFER_SLOTS,
};
use crate::resources::NativeHandle;
use crate::stage::ShaderStage;

/// Index element type of an indexed draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexType {
    U16,
    U32,
}

/// Render targets and depth-stencil view for an output-merger call.
#[derive(Debug, Clone, Copy)]
pub struct OutputTargets<'a> {
    pub render_targets: &'a [Option<NativeHandle>],
    pub depth_stencil: Option<NativeHandle>,
}

/// Pixel-shader UAVs for an output-merger call, starting at `start_slot`.
#[derive(Debug, Clone, Copy)]
pub struct OutputUavs<'a> {
    pub start_slot: u32,
    pub views: &'a [Option<NativeHandle>],
}

/// A bound vertex stream as reported by the native context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VertexStreamBinding {
    pub buffer: Option<NativeHandle>,
    pub stride: u32,
    pub offset: u32,
}

/// The bound index buffer as reported by the native context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexBufferBinding {
    pub buffer: Option<NativeHandle>,
    pub index_type: IndexType,
    pub offset: u32,
}

pub trait NativeContext {
    fn set_constant_buffers(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        buffers: &[Option<NativeHandle>],
    );

    fn set_shader_resources(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        views: &[Option<NativeHandle>],
    );

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<NativeHandle>]);

    /// Sets UAVs of a stage that owns a separate UAV table (compute).
    fn set_unordered_access_views(
        &mut self,
        stage: ShaderStage,
        start_slot: u32,
        views: &[Option<NativeHandle>],
    );

    /// Binds render targets and pixel-shader UAVs together. `None` keeps the current
    /// binding of that half. Setting UAVs replaces every pixel-shader UAV slot.
    fn set_render_targets_and_unordered_access_views(
        &mut self,
        targets: Option<OutputTargets<'_>>,
        uavs: Option<OutputUavs<'_>>,
    );

    /// Binds render targets; pixel-shader UAVs overlapping the new targets are unbound.
    fn set_render_targets(
        &mut self,
        render_targets: &[Option<NativeHandle>],
        depth_stencil: Option<NativeHandle>,
    );

    fn set_vertex_buffers(
        &mut self,
        start_slot: u32,
        buffers: &[Option<NativeHandle>],
        strides: &[u32],
        offsets: &[u32],
    );

    fn set_index_buffer(&mut self, buffer: Option<NativeHandle>, index_type: IndexType, offset: u32);

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<NativeHandle>);

    fn draw(&mut self, vertex_count: u32, start_vertex: u32);

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32);

    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    fn constant_buffers(&self, stage: ShaderStage) -> Vec<Option<NativeHandle>>;

    fn shader_resources(&self, stage: ShaderStage) -> Vec<Option<NativeHandle>>;

    fn samplers(&self, stage: ShaderStage) -> Vec<Option<NativeHandle>>;

    fn unordered_access_views(&self, stage: ShaderStage) -> Vec<Option<NativeHandle>>;

    fn vertex_buffers(&self) -> Vec<VertexStreamBinding>;

    fn index_buffer(&self) -> IndexBufferBinding;

    fn shader(&self, stage: ShaderStage) -> Option<NativeHandle>;
}

/// One call made on a [`RecordingContext`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeCall {
    SetConstantBuffers {
        stage: ShaderStage,
        start_slot: u32,
        buffers: Vec<Option<NativeHandle>>,
    },
    SetShaderResources {
        stage: ShaderStage,
        start_slot: u32,
        views: Vec<Option<NativeHandle>>,
    },
    SetSamplers {
        stage: ShaderStage,
        start_slot: u32,
        samplers: Vec<Option<NativeHandle>>,
    },
    SetUnorderedAccessViews {
        stage: ShaderStage,
        start_slot: u32,
        views: Vec<Option<NativeHandle>>,
    },
    SetRenderTargetsAndUnorderedAccessViews {
        targets: Option<(Vec<Option<NativeHandle>>, Option<NativeHandle>)>,
        uavs: Option<(u32, Vec<Option<NativeHandle>>)>,
    },
    SetRenderTargets {
        render_targets: Vec<Option<NativeHandle>>,
        depth_stencil: Option<NativeHandle>,
    },
    SetVertexBuffers {
        start_slot: u32,
        buffers: Vec<Option<NativeHandle>>,
        strides: Vec<u32>,
        offsets: Vec<u32>,
    },
    SetIndexBuffer {
        buffer: Option<NativeHandle>,
        index_type: IndexType,
        offset: u32,
    },
    SetShader {
        stage: ShaderStage,
        shader: Option<NativeHandle>,
    },
    Draw {
        vertex_count: u32,
        start_vertex: u32,
    },
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: i32,
    },
    Dispatch {
        x: u32,
        y: u32,
        z: u32,
    },
}

impl NativeCall {
    /// Returns `true` for calls that change per-stage shader resource bindings.
    pub fn is_resource_binding(&self) -> bool {
        matches!(
            self,
            Self::SetConstantBuffers { .. }
                | Self::SetShaderResources { .. }
                | Self::SetSamplers { .. }
                | Self::SetUnorderedAccessViews { .. }
                | Self::SetRenderTargetsAndUnorderedAccessViews { uavs: Some(_), .. }
        )
    }
}

#[derive(Debug, Clone)]
struct StageTables {
    cbs: Vec<Option<NativeHandle>>,
    srvs: Vec<Option<NativeHandle>>,
    samplers: Vec<Option<NativeHandle>>,
    uavs: Vec<Option<NativeHandle>>,
    shader: Option<NativeHandle>,
}

impl Default for StageTables {
    fn default() -> Self {
        Self {
            cbs: vec![None; D3D11_MAX_CONSTANT_BUFFER_SLOTS as usize],
            srvs: vec![None; D3D11_MAX_SRV_SLOTS as usize],
            samplers: vec![None; D3D11_MAX_SAMPLER_SLOTS as usize],
            uavs: vec![None; D3D11_MAX_UAV_SLOTS as usize],
            shader: None,
        }
    }
}

/// A [`NativeContext`] that mirrors native binding state in memory and records every call.
///
/// Slot ranges outside the D3D11 limits are ignored the way the native runtime drops them.
#[derive(Debug, Clone)]
pub struct RecordingContext {
    stages: [StageTables; ShaderStage::COUNT],
    render_targets: Vec<Option<NativeHandle>>,
    depth_stencil: Option<NativeHandle>,
    vertex_buffers: Vec<VertexStreamBinding>,
    index_buffer: IndexBufferBinding,
    calls: Vec<NativeCall>,
    record: bool,
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

fn write_range<T: Copy>(table: &mut [T], start_slot: u32, values: &[T]) {
    for (i, value) in values.iter().enumerate() {
        if let Some(slot) = table.get_mut(start_slot as usize + i) {
            *slot = *value;
        }
    }
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            stages: Default::default(),
            render_targets: vec![None; D3D11_MAX_RENDER_TARGETS as usize],
            depth_stencil: None,
            vertex_buffers: vec![VertexStreamBinding::default(); D3D11_MAX_VERTEX_BUFFER_SLOTS as usize],
            index_buffer: IndexBufferBinding {
                buffer: None,
                index_type: IndexType::U32,
                offset: 0,
            },
            calls: Vec::new(),
            record: true,
        }
    }

    /// Keeps mirroring state but stops growing the call log. Used by benchmarks.
    pub fn without_call_log() -> Self {
        Self {
            record: false,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> &[NativeCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<NativeCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn render_targets(&self) -> &[Option<NativeHandle>] {
        &self.render_targets
    }

    pub fn depth_stencil(&self) -> Option<NativeHandle> {
        self.depth_stencil
    }

    fn push(&mut self, call: NativeCall) {
        if self.record {
            self.calls.push(call);
        }
    }

    fn bind_render_targets(&mut self, render_targets: &[Option<NativeHandle>], depth_stencil: Option<NativeHandle>) {
        self.render_targets.fill(None);
        write_range(&mut self.render_targets, 0, render_targets);
        self.depth_stencil = depth_stencil;

        // Render targets and pixel-shader UAVs share the output-merger slots.
        let ps = &mut self.stages[ShaderStage::Pixel.index()].uavs;
        let overlap = render_targets.len().min(ps.len());
        ps[..overlap].fill(None);
    }
}

impl NativeContext for RecordingContext {
    fn set_constant_buffers(&mut self, stage: ShaderStage, start_slot: u32, buffers: &[Option<NativeHandle>]) {
        write_range(&mut self.stages[stage.index()].cbs, start_slot, buffers);
        self.push(NativeCall::SetConstantBuffers {
            stage,
            start_slot,
            buffers: buffers.to_vec(),
        });
    }

    fn set_shader_resources(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeHandle>]) {
        write_range(&mut self.stages[stage.index()].srvs, start_slot, views);
        self.push(NativeCall::SetShaderResources {
            stage,
            start_slot,
            views: views.to_vec(),
        });
    }

    fn set_samplers(&mut self, stage: ShaderStage, start_slot: u32, samplers: &[Option<NativeHandle>]) {
        write_range(&mut self.stages[stage.index()].samplers, start_slot, samplers);
        self.push(NativeCall::SetSamplers {
            stage,
            start_slot,
            samplers: samplers.to_vec(),
        });
    }

    fn set_unordered_access_views(&mut self, stage: ShaderStage, start_slot: u32, views: &[Option<NativeHandle>]) {
        write_range(&mut self.stages[stage.index()].uavs, start_slot, views);
        self.push(NativeCall::SetUnorderedAccessViews {
            stage,
            start_slot,
            views: views.to_vec(),
        });
    }

    fn set_render_targets_and_unordered_access_views(
        &mut self,
        targets: Option<OutputTargets<'_>>,
        uavs: Option<OutputUavs<'_>>,
    ) {
        if let Some(targets) = targets {
            self.bind_render_targets(targets.render_targets, targets.depth_stencil);
        }
        if let Some(uavs) = uavs {
            let ps = &mut self.stages[ShaderStage::Pixel.index()].uavs;
            ps.fill(None);
            write_range(ps, uavs.start_slot, uavs.views);
        }
        self.push(NativeCall::SetRenderTargetsAndUnorderedAccessViews {
            targets: targets.map(|t| (t.render_targets.to_vec(), t.depth_stencil)),
            uavs: uavs.map(|u| (u.start_slot, u.views.to_vec())),
        });
    }

    fn set_render_targets(&mut self, render_targets: &[Option<NativeHandle>], depth_stencil: Option<NativeHandle>) {
        self.bind_render_targets(render_targets, depth_stencil);
        self.push(NativeCall::SetRenderTargets {
            render_targets: render_targets.to_vec(),
            depth_stencil,
        });
    }

    fn set_vertex_buffers(&mut self, start_slot: u32, buffers: &[Option<NativeHandle>], strides: &[u32], offsets: &[u32]) {
        for (i, buffer) in buffers.iter().enumerate() {
            if let Some(stream) = self.vertex_buffers.get_mut(start_slot as usize + i) {
                *stream = VertexStreamBinding {
                    buffer: *buffer,
                    stride: strides.get(i).copied().unwrap_or(0),
                    offset: offsets.get(i).copied().unwrap_or(0),
                };
            }
        }
        self.push(NativeCall::SetVertexBuffers {
            start_slot,
            buffers: buffers.to_vec(),
            strides: strides.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    fn set_index_buffer(&mut self, buffer: Option<NativeHandle>, index_type: IndexType, offset: u32) {
        self.index_buffer = IndexBufferBinding {
            buffer,
            index_type,
            offset,
        };
        self.push(NativeCall::SetIndexBuffer {
            buffer,
            index_type,
            offset,
        });
    }

    fn set_shader(&mut self, stage: ShaderStage, shader: Option<NativeHandle>) {
        self.stages[stage.index()].shader = shader;
        self.push(NativeCall::SetShader { stage, shader });
    }

    fn draw(&mut self, vertex_count: u32, start_vertex: u32) {
        self.push(NativeCall::Draw {
            vertex_count,
            start_vertex,
        });
    }

    fn draw_indexed(&mut self, index_count: u32, start_index: u32, base_vertex: i32) {
        self.push(NativeCall::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.push(NativeCall::Dispatch { x, y, z });
    }

    fn constant_buffers(&self, stage: ShaderStage) -> Vec<Option<NativeHandle>> {
        self.stages[stage.index()].cbs.clone()
    }

    fn shader_resources(&self, stage: ShaderStage) -> Vec<Option<NativeHandle>> {
        self.stages[stage.index()].srvs.clone()
    }

    fn samplers(&self, stage: ShaderStage) -> Vec<Option<NativeHandle>> {
        self.stages[stage.index()].samplers.clone()
    }

    fn unordered_access_views(&self, stage: ShaderStage) -> Vec<Option<NativeHandle>> {
        self.stages[stage.index()].uavs.clone()
    }

    fn vertex_buffers(&self) -> Vec<VertexStreamBinding> {
        self.vertex_buffers.clone()
    }

    fn index_buffer(&self) -> IndexBufferBinding {
        self.index_buffer
    }

    fn shader(&self, stage: ShaderStage) -> Option<NativeHandle> {
        self.stages[stage.index()].shader
    }
}
