//! Object factory: resources, views, samplers, shaders and pipeline states.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::allocator::ResourceCacheAllocator;
use crate::config::EngineConfig;
use crate::device_context::DeviceContext;
use crate::error::Result;
use crate::native_context::NativeContext;
use crate::pipeline_state::{ComputePipelineDesc, GraphicsPipelineDesc, PipelineState};
use crate::resource_state::ResourceState;
use crate::resources::{
    BindFlags, Buffer, BufferDesc, BufferView, BufferViewType, NativeHandle, Sampler, SamplerDesc,
    Texture, TextureDesc, TextureView, TextureViewType,
};
use crate::shader::{Shader, ShaderCreateInfo};

/// Creates device objects and hands out their native handles.
///
/// Handles are plain counters; a real backend would return the native object pointers instead.
#[derive(Debug)]
pub struct RenderDevice {
    config: EngineConfig,
    allocator: Arc<ResourceCacheAllocator>,
    next_handle: AtomicU64,
}

impl Default for RenderDevice {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl RenderDevice {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            allocator: Arc::new(ResourceCacheAllocator::new("render device")),
            next_handle: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Allocator backing every cache and layout created through this device.
    pub fn allocator(&self) -> &Arc<ResourceCacheAllocator> {
        &self.allocator
    }

    fn next_handle(&self) -> NativeHandle {
        loop {
            // Zero is skipped after a wrap-around.
            if let Some(handle) = NativeHandle::new(self.next_handle.fetch_add(1, Ordering::Relaxed)) {
                return handle;
            }
        }
    }

    pub fn create_buffer(&self, desc: BufferDesc, initial_state: ResourceState) -> Arc<Buffer> {
        tracing::debug!(buffer = %desc.name, size = desc.size, "created buffer");
        Arc::new(Buffer::new(desc, self.next_handle(), initial_state))
    }

    pub fn create_texture(&self, desc: TextureDesc, initial_state: ResourceState) -> Arc<Texture> {
        tracing::debug!(texture = %desc.name, width = desc.width, height = desc.height, "created texture");
        Arc::new(Texture::new(desc, self.next_handle(), initial_state))
    }

    /// Creates a view of `buffer`. The view is created even when the buffer lacks the matching
    /// bind flag; binding such a view to a shader variable is rejected later.
    pub fn create_buffer_view(
        &self,
        buffer: &Arc<Buffer>,
        view_type: BufferViewType,
        name: impl Into<String>,
    ) -> Arc<BufferView> {
        let required = match view_type {
            BufferViewType::ShaderResource => BindFlags::SHADER_RESOURCE,
            BufferViewType::UnorderedAccess => BindFlags::UNORDERED_ACCESS,
        };
        if !buffer.desc().bind_flags.contains(required) {
            tracing::warn!(
                "Buffer '{}' is not created with {:?} flag; its {} view cannot be bound",
                buffer.name(),
                required,
                view_type.literal_name()
            );
        }
        Arc::new(BufferView::new(name, view_type, Arc::clone(buffer), self.next_handle()))
    }

    pub fn create_texture_view(
        &self,
        texture: &Arc<Texture>,
        view_type: TextureViewType,
        name: impl Into<String>,
    ) -> Arc<TextureView> {
        let required = match view_type {
            TextureViewType::ShaderResource => BindFlags::SHADER_RESOURCE,
            TextureViewType::RenderTarget => BindFlags::RENDER_TARGET,
            TextureViewType::DepthStencil => BindFlags::DEPTH_STENCIL,
            TextureViewType::UnorderedAccess => BindFlags::UNORDERED_ACCESS,
        };
        if !texture.desc().bind_flags.contains(required) {
            tracing::warn!(
                "Texture '{}' is not created with {:?} flag; its {} view cannot be bound",
                texture.name(),
                required,
                view_type.literal_name()
            );
        }
        Arc::new(TextureView::new(name, view_type, Arc::clone(texture), self.next_handle()))
    }

    pub fn create_sampler(&self, desc: SamplerDesc) -> Arc<Sampler> {
        Arc::new(Sampler::new(desc, self.next_handle()))
    }

    /// Reflects the bytecode and creates the shader. The shader's own combined-sampler suffix
    /// takes precedence over the configured one.
    pub fn create_shader(&self, info: &ShaderCreateInfo<'_>) -> Result<Arc<Shader>> {
        let suffix = info
            .combined_sampler_suffix
            .or(self.config.combined_sampler_suffix.as_deref());
        Ok(Arc::new(Shader::new(info, suffix, self.next_handle())?))
    }

    /// Creates a graphics pipeline. Static resources are bound on the returned value before it
    /// is shared.
    pub fn create_graphics_pipeline_state(&self, desc: GraphicsPipelineDesc) -> Result<PipelineState> {
        PipelineState::new_graphics(self, desc)
    }

    pub fn create_compute_pipeline_state(&self, desc: ComputePipelineDesc) -> Result<PipelineState> {
        PipelineState::new_compute(self, desc)
    }

    /// Wraps a native context into an immediate device context using this device's config.
    pub fn create_device_context<C: NativeContext>(&self, native: C) -> DeviceContext<C> {
        DeviceContext::new(native, self.config.clone())
    }
}
