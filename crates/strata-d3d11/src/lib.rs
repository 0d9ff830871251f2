//! Shader resource binding and resource-state tracking for a D3D11-style native context.
//!
//! Shaders are reflected from their `RDEF` chunk into per-class resource tables
//! ([`ShaderResources`]). Pipeline states and shader resource binding objects lay those
//! resources out into per-stage [`ShaderResourceCache`]s, and the [`DeviceContext`] transitions
//! the cached resources into the states their bindings require and pushes the changed slot
//! ranges to a [`NativeContext`].

#![forbid(unsafe_code)]

mod allocator;
mod binding_model;
mod config;
mod device;
mod device_context;
mod error;
mod layout_desc;
mod native_context;
mod pipeline_state;
mod resource_cache;
mod resource_layout;
mod resource_mapping;
mod resource_state;
mod resources;
mod shader;
mod shader_resource_binding;
mod shader_resources;
mod stage;

pub use crate::allocator::{Allocation, ResourceCacheAllocator};
pub use crate::binding_model::{
    CacheSlotCounts, ChangedSlotRange, D3D11_MAX_CONSTANT_BUFFER_SLOTS, D3D11_MAX_RENDER_TARGETS,
    D3D11_MAX_SAMPLER_SLOTS, D3D11_MAX_SRV_SLOTS, D3D11_MAX_UAV_SLOTS,
    D3D11_MAX_VERTEX_BUFFER_SLOTS,
};
pub use crate::config::{
    ConfigError, EngineConfig, DEFAULT_COMBINED_SAMPLER_SUFFIX, ENV_COMBINED_SAMPLER_SUFFIX,
    ENV_TRANSITION_MODE, ENV_VERIFY_COMMITTED,
};
pub use crate::device::RenderDevice;
pub use crate::device_context::{DeviceContext, StateTransitionDesc, TransitionResource};
pub use crate::error::{EngineError, Result};
pub use crate::layout_desc::{
    BindShaderResourcesFlags, ImmutableSamplerDesc, PipelineResourceLayoutDesc,
    ShaderVariableDesc, ShaderVariableType, ShaderVariableTypes,
};
pub use crate::native_context::{
    IndexBufferBinding, IndexType, NativeCall, NativeContext, OutputTargets, OutputUavs,
    RecordingContext, VertexStreamBinding,
};
pub use crate::pipeline_state::{
    ComputePipelineDesc, GraphicsPipelineDesc, PipelineState, PipelineType,
};
pub use crate::resource_cache::{
    CachedCB, CachedResource, CachedSampler, CachedView, ShaderResourceCache,
};
pub use crate::resource_layout::{ShaderResourceLayout, ShaderVariable};
pub use crate::resource_mapping::ResourceMapping;
pub use crate::resource_state::{ResourceState, TransitionMode};
pub use crate::resources::{
    AddressMode, BindFlags, Buffer, BufferDesc, BufferView, BufferViewType, DeviceObject,
    FilterType, NativeHandle, Sampler, SamplerDesc, Texture, TextureDesc, TextureView,
    TextureViewType,
};
pub use crate::shader::{Shader, ShaderCreateInfo};
pub use crate::shader_resource_binding::ShaderResourceBinding;
pub use crate::shader_resources::{
    CommittedStageView, ResourceAttributes, ResourceClass, ResourceCounters,
    ShaderResources,
};
pub use crate::stage::{ShaderStage, ShaderStages};
