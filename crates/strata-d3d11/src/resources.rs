//! Device objects that can be bound to shader variables: buffers, textures, their views and
//! samplers.
//!
//! Every object carries the [`NativeHandle`] of the native API object it wraps. Buffers and
//! textures additionally track their [`ResourceState`].

use std::fmt;
use std::num::NonZeroU64;
use std::sync::{Arc, Mutex};

use bitflags::bitflags;

use crate::resource_state::{ResourceState, StateCell};

/// Opaque, non-null handle of a native API object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

bitflags! {
    /// Pipeline stages a buffer or texture may be bound to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const UNIFORM_BUFFER = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const STREAM_OUTPUT = 1 << 4;
        const RENDER_TARGET = 1 << 5;
        const DEPTH_STENCIL = 1 << 6;
        const UNORDERED_ACCESS = 1 << 7;
        const INDIRECT_DRAW_ARGS = 1 << 8;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BufferDesc {
    pub name: String,
    pub size: u64,
    pub bind_flags: BindFlags,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TextureDesc {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bind_flags: BindFlags,
}

macro_rules! impl_state_tracking {
    ($ty:ty) => {
        impl $ty {
            pub fn state(&self) -> ResourceState {
                self.state.get()
            }

            pub fn set_state(&self, state: ResourceState) {
                self.state.set(state);
            }

            pub fn add_state(&self, state: ResourceState) {
                self.state.add(state);
            }

            pub fn clear_state(&self, state: ResourceState) {
                self.state.clear(state);
            }

            /// Returns `true` if every bit of `state` is set.
            pub fn check_state(&self, state: ResourceState) -> bool {
                self.state.get().contains(state)
            }

            /// Returns `true` if any bit of `state` is set.
            pub fn check_any_state(&self, state: ResourceState) -> bool {
                self.state.get().intersects(state)
            }

            pub fn is_in_known_state(&self) -> bool {
                !self.state.get().is_unknown()
            }
        }
    };
}

#[derive(Debug)]
pub struct Buffer {
    desc: BufferDesc,
    native: NativeHandle,
    state: StateCell,
}

impl Buffer {
    pub fn new(desc: BufferDesc, native: NativeHandle, initial_state: ResourceState) -> Self {
        Self {
            desc,
            native,
            state: StateCell::new(initial_state),
        }
    }

    pub fn desc(&self) -> &BufferDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native
    }
}

impl_state_tracking!(Buffer);

#[derive(Debug)]
pub struct Texture {
    desc: TextureDesc,
    native: NativeHandle,
    state: StateCell,
}

impl Texture {
    pub fn new(desc: TextureDesc, native: NativeHandle, initial_state: ResourceState) -> Self {
        Self {
            desc,
            native,
            state: StateCell::new(initial_state),
        }
    }

    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native
    }
}

impl_state_tracking!(Texture);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferViewType {
    ShaderResource,
    UnorderedAccess,
}

impl BufferViewType {
    pub const fn literal_name(self) -> &'static str {
        match self {
            Self::ShaderResource => "BUFFER_VIEW_SHADER_RESOURCE",
            Self::UnorderedAccess => "BUFFER_VIEW_UNORDERED_ACCESS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureViewType {
    ShaderResource,
    RenderTarget,
    DepthStencil,
    UnorderedAccess,
}

impl TextureViewType {
    pub const fn literal_name(self) -> &'static str {
        match self {
            Self::ShaderResource => "TEXTURE_VIEW_SHADER_RESOURCE",
            Self::RenderTarget => "TEXTURE_VIEW_RENDER_TARGET",
            Self::DepthStencil => "TEXTURE_VIEW_DEPTH_STENCIL",
            Self::UnorderedAccess => "TEXTURE_VIEW_UNORDERED_ACCESS",
        }
    }
}

#[derive(Debug)]
pub struct BufferView {
    name: String,
    view_type: BufferViewType,
    buffer: Arc<Buffer>,
    native: NativeHandle,
}

impl BufferView {
    pub fn new(
        name: impl Into<String>,
        view_type: BufferViewType,
        buffer: Arc<Buffer>,
        native: NativeHandle,
    ) -> Self {
        Self {
            name: name.into(),
            view_type,
            buffer,
            native,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view_type(&self) -> BufferViewType {
        self.view_type
    }

    pub fn buffer(&self) -> &Arc<Buffer> {
        &self.buffer
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native
    }
}

/// A texture view. Shader-resource views may carry a sampler used for combined texture
/// samplers.
#[derive(Debug)]
pub struct TextureView {
    name: String,
    view_type: TextureViewType,
    texture: Arc<Texture>,
    native: NativeHandle,
    sampler: Mutex<Option<Arc<Sampler>>>,
}

impl TextureView {
    pub fn new(
        name: impl Into<String>,
        view_type: TextureViewType,
        texture: Arc<Texture>,
        native: NativeHandle,
    ) -> Self {
        Self {
            name: name.into(),
            view_type,
            texture,
            native,
            sampler: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view_type(&self) -> TextureViewType {
        self.view_type
    }

    pub fn texture(&self) -> &Arc<Texture> {
        &self.texture
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native
    }

    pub fn sampler(&self) -> Option<Arc<Sampler>> {
        self.sampler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn set_sampler(&self, sampler: Option<Arc<Sampler>>) {
        *self
            .sampler
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = sampler;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterType {
    Point,
    #[default]
    Linear,
    Anisotropic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AddressMode {
    #[default]
    Wrap,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SamplerDesc {
    pub name: String,
    pub filter: FilterType,
    pub address_mode: AddressMode,
    pub max_anisotropy: u32,
}

#[derive(Debug)]
pub struct Sampler {
    desc: SamplerDesc,
    native: NativeHandle,
}

impl Sampler {
    pub fn new(desc: SamplerDesc, native: NativeHandle) -> Self {
        Self { desc, native }
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }

    pub fn name(&self) -> &str {
        &self.desc.name
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native
    }
}

/// Any object that can be stored in a [`crate::ResourceMapping`] or bound to a shader variable.
#[derive(Debug, Clone)]
pub enum DeviceObject {
    Buffer(Arc<Buffer>),
    Texture(Arc<Texture>),
    BufferView(Arc<BufferView>),
    TextureView(Arc<TextureView>),
    Sampler(Arc<Sampler>),
}

impl DeviceObject {
    pub fn name(&self) -> &str {
        match self {
            Self::Buffer(b) => b.name(),
            Self::Texture(t) => t.name(),
            Self::BufferView(v) => v.name(),
            Self::TextureView(v) => v.name(),
            Self::Sampler(s) => s.name(),
        }
    }

    pub fn native_handle(&self) -> NativeHandle {
        match self {
            Self::Buffer(b) => b.native_handle(),
            Self::Texture(t) => t.native_handle(),
            Self::BufferView(v) => v.native_handle(),
            Self::TextureView(v) => v.native_handle(),
            Self::Sampler(s) => s.native_handle(),
        }
    }

    pub fn as_buffer(&self) -> Option<&Arc<Buffer>> {
        match self {
            Self::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_buffer_view(&self) -> Option<&Arc<BufferView>> {
        match self {
            Self::BufferView(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_texture_view(&self) -> Option<&Arc<TextureView>> {
        match self {
            Self::TextureView(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_sampler(&self) -> Option<&Arc<Sampler>> {
        match self {
            Self::Sampler(s) => Some(s),
            _ => None,
        }
    }

    /// Identity comparison: `true` only for the very same object.
    pub fn ptr_eq(&self, other: &DeviceObject) -> bool {
        match (self, other) {
            (Self::Buffer(a), Self::Buffer(b)) => Arc::ptr_eq(a, b),
            (Self::Texture(a), Self::Texture(b)) => Arc::ptr_eq(a, b),
            (Self::BufferView(a), Self::BufferView(b)) => Arc::ptr_eq(a, b),
            (Self::TextureView(a), Self::TextureView(b)) => Arc::ptr_eq(a, b),
            (Self::Sampler(a), Self::Sampler(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Arc<Buffer>> for DeviceObject {
    fn from(v: Arc<Buffer>) -> Self {
        Self::Buffer(v)
    }
}

impl From<Arc<Texture>> for DeviceObject {
    fn from(v: Arc<Texture>) -> Self {
        Self::Texture(v)
    }
}

impl From<Arc<BufferView>> for DeviceObject {
    fn from(v: Arc<BufferView>) -> Self {
        Self::BufferView(v)
    }
}

impl From<Arc<TextureView>> for DeviceObject {
    fn from(v: Arc<TextureView>) -> Self {
        Self::TextureView(v)
    }
}

impl From<Arc<Sampler>> for DeviceObject {
    fn from(v: Arc<Sampler>) -> Self {
        Self::Sampler(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(raw: u64) -> NativeHandle {
        NativeHandle::new(raw).unwrap()
    }

    #[test]
    fn native_handle_rejects_zero() {
        assert_eq!(NativeHandle::new(0), None);
        assert_eq!(handle(7).get(), 7);
    }

    #[test]
    fn buffer_state_tracking() {
        let buffer = Buffer::new(BufferDesc::default(), handle(1), ResourceState::UNKNOWN);
        assert!(!buffer.is_in_known_state());

        buffer.set_state(ResourceState::VERTEX_BUFFER);
        buffer.add_state(ResourceState::CONSTANT_BUFFER);
        assert!(buffer.check_state(ResourceState::VERTEX_BUFFER | ResourceState::CONSTANT_BUFFER));
        assert!(!buffer.check_state(ResourceState::VERTEX_BUFFER | ResourceState::INDEX_BUFFER));
        assert!(buffer.check_any_state(ResourceState::VERTEX_BUFFER | ResourceState::INDEX_BUFFER));

        buffer.clear_state(ResourceState::VERTEX_BUFFER);
        assert_eq!(buffer.state(), ResourceState::CONSTANT_BUFFER);
    }

    #[test]
    fn texture_view_sampler_can_be_replaced() {
        let texture = Arc::new(Texture::new(
            TextureDesc::default(),
            handle(1),
            ResourceState::UNDEFINED,
        ));
        let view = TextureView::new("srv", TextureViewType::ShaderResource, texture, handle(2));
        assert!(view.sampler().is_none());

        let sampler = Arc::new(Sampler::new(SamplerDesc::default(), handle(3)));
        view.set_sampler(Some(sampler.clone()));
        assert!(Arc::ptr_eq(&view.sampler().unwrap(), &sampler));

        view.set_sampler(None);
        assert!(view.sampler().is_none());
    }

    #[test]
    fn device_object_identity() {
        let sampler = Arc::new(Sampler::new(SamplerDesc::default(), handle(3)));
        let same = DeviceObject::from(sampler.clone());
        let other = DeviceObject::from(Arc::new(Sampler::new(SamplerDesc::default(), handle(3))));

        assert!(DeviceObject::from(sampler).ptr_eq(&same));
        assert!(!same.ptr_eq(&other));
    }
}
