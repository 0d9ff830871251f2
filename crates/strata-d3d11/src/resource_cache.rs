//! Live binding table of one shader stage.
//!
//! Each class keeps two parallel arrays: the cached entries, which own a reference to the bound
//! object, and the raw native handles the committer hands to the native context in one call.
//! Both halves of a slot are only ever written together.

use std::sync::Arc;

use crate::allocator::{Allocation, ResourceCacheAllocator};
use crate::binding_model::CacheSlotCounts;
use crate::resources::{
    BindFlags, Buffer, BufferView, NativeHandle, Sampler, Texture, TextureView,
};
use crate::shader_resources::ShaderResources;

#[derive(Debug, Clone, Default)]
pub struct CachedCB {
    buffer: Option<Arc<Buffer>>,
}

impl CachedCB {
    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        self.buffer.as_ref()
    }
}

/// View stored in an SRV or UAV slot.
#[derive(Debug, Clone)]
pub enum CachedView {
    Texture(Arc<TextureView>),
    Buffer(Arc<BufferView>),
}

impl CachedView {
    pub fn name(&self) -> &str {
        match self {
            Self::Texture(view) => view.name(),
            Self::Buffer(view) => view.name(),
        }
    }

    pub fn native_handle(&self) -> NativeHandle {
        match self {
            Self::Texture(view) => view.native_handle(),
            Self::Buffer(view) => view.native_handle(),
        }
    }

    /// Handle of the texture or buffer behind the view.
    pub fn resource_handle(&self) -> NativeHandle {
        match self {
            Self::Texture(view) => view.texture().native_handle(),
            Self::Buffer(view) => view.buffer().native_handle(),
        }
    }
}

/// SRV or UAV slot. `resource` caches the native handle of the viewed resource for identity
/// comparisons during unbinding.
#[derive(Debug, Clone, Default)]
pub struct CachedResource {
    view: Option<CachedView>,
    resource: Option<NativeHandle>,
}

impl CachedResource {
    fn new(view: Option<CachedView>) -> Self {
        let resource = view.as_ref().map(CachedView::resource_handle);
        Self { view, resource }
    }

    pub fn view(&self) -> Option<&CachedView> {
        self.view.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.view.is_some()
    }

    pub fn texture_view(&self) -> Option<&Arc<TextureView>> {
        match &self.view {
            Some(CachedView::Texture(view)) => Some(view),
            _ => None,
        }
    }

    pub fn buffer_view(&self) -> Option<&Arc<BufferView>> {
        match &self.view {
            Some(CachedView::Buffer(view)) => Some(view),
            _ => None,
        }
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture_view().map(|view| view.texture())
    }

    pub fn buffer(&self) -> Option<&Arc<Buffer>> {
        self.buffer_view().map(|view| view.buffer())
    }

    pub fn view_handle(&self) -> Option<NativeHandle> {
        self.view.as_ref().map(CachedView::native_handle)
    }

    pub fn resource_handle(&self) -> Option<NativeHandle> {
        self.resource
    }

    /// Name and bind flags of the viewed resource, plus the view and resource handles.
    pub fn describe(&self) -> Option<(&str, BindFlags, NativeHandle, NativeHandle)> {
        let view = self.view.as_ref()?;
        let (name, flags) = match view {
            CachedView::Texture(v) => (v.texture().name(), v.texture().desc().bind_flags),
            CachedView::Buffer(v) => (v.buffer().name(), v.buffer().desc().bind_flags),
        };
        Some((name, flags, view.native_handle(), view.resource_handle()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct CachedSampler {
    sampler: Option<Arc<Sampler>>,
}

impl CachedSampler {
    pub fn sampler(&self) -> Option<&Arc<Sampler>> {
        self.sampler.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheState {
    Uninitialized,
    Initialized,
    Destroyed,
}

/// Entries of one class together with their native handles.
#[derive(Debug)]
struct SlotTable<T> {
    entries: Vec<T>,
    handles: Vec<Option<NativeHandle>>,
}

impl<T> Default for SlotTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            handles: Vec::new(),
        }
    }
}

impl<T: Default + Clone> SlotTable<T> {
    fn with_len(len: u32) -> Self {
        Self {
            entries: vec![T::default(); len as usize],
            handles: vec![None; len as usize],
        }
    }

    fn len(&self) -> u32 {
        self.entries.len() as u32
    }

    fn set(&mut self, slot: u32, entry: T, handle: Option<NativeHandle>) {
        let slot = slot as usize;
        if let (Some(e), Some(h)) = (self.entries.get_mut(slot), self.handles.get_mut(slot)) {
            *e = entry;
            *h = handle;
        }
    }
}

#[derive(Debug)]
pub struct ShaderResourceCache {
    cbs: SlotTable<CachedCB>,
    srvs: SlotTable<CachedResource>,
    samplers: SlotTable<CachedSampler>,
    uavs: SlotTable<CachedResource>,
    allocation: Option<(Arc<ResourceCacheAllocator>, Allocation)>,
    state: CacheState,
}

impl Default for ShaderResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderResourceCache {
    /// Creates an empty cache. Nothing is allocated until [`Self::initialize`].
    pub fn new() -> Self {
        Self {
            cbs: SlotTable::default(),
            srvs: SlotTable::default(),
            samplers: SlotTable::default(),
            uavs: SlotTable::default(),
            allocation: None,
            state: CacheState::Uninitialized,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.state == CacheState::Initialized
    }

    /// Allocates the slot tables. A second call on the same cache logs an error and leaves the
    /// existing content untouched.
    pub fn initialize(&mut self, allocator: &Arc<ResourceCacheAllocator>, counts: CacheSlotCounts) {
        if self.state != CacheState::Uninitialized {
            tracing::error!("Resource cache is already initialized");
            return;
        }
        debug_assert!(counts.fits_d3d11_limits(), "cache slot counts exceed D3D11 limits: {counts:?}");

        self.cbs = SlotTable::with_len(counts.cbs);
        self.srvs = SlotTable::with_len(counts.srvs);
        self.samplers = SlotTable::with_len(counts.samplers);
        self.uavs = SlotTable::with_len(counts.uavs);
        self.allocation = Some((
            Arc::clone(allocator),
            allocator.allocate(counts.total() as usize),
        ));
        self.state = CacheState::Initialized;
    }

    /// Sizes the cache for every resource `resources` declares.
    pub fn initialize_from_resources(
        &mut self,
        allocator: &Arc<ResourceCacheAllocator>,
        resources: &ShaderResources,
    ) {
        self.initialize(allocator, resources.cache_slot_counts());
    }

    /// Releases every bound object and the slot storage. Must be called before the cache is
    /// dropped; repeated calls do nothing.
    pub fn destroy(&mut self) {
        if self.state == CacheState::Destroyed {
            return;
        }
        self.cbs = SlotTable::default();
        self.srvs = SlotTable::default();
        self.samplers = SlotTable::default();
        self.uavs = SlotTable::default();
        if let Some((allocator, allocation)) = self.allocation.take() {
            allocator.release(allocation);
        }
        self.state = CacheState::Destroyed;
    }

    pub fn slot_counts(&self) -> CacheSlotCounts {
        CacheSlotCounts {
            cbs: self.cb_count(),
            srvs: self.srv_count(),
            samplers: self.sampler_count(),
            uavs: self.uav_count(),
        }
    }

    pub fn cb_count(&self) -> u32 {
        self.cbs.len()
    }

    pub fn srv_count(&self) -> u32 {
        self.srvs.len()
    }

    pub fn sampler_count(&self) -> u32 {
        self.samplers.len()
    }

    pub fn uav_count(&self) -> u32 {
        self.uavs.len()
    }

    pub fn set_cb(&mut self, slot: u32, buffer: Option<Arc<Buffer>>) {
        debug_assert!(slot < self.cb_count(), "CB slot {slot} is out of range");
        let handle = buffer.as_ref().map(|b| b.native_handle());
        self.cbs.set(slot, CachedCB { buffer }, handle);
    }

    pub fn set_tex_srv(&mut self, slot: u32, view: Option<Arc<TextureView>>) {
        debug_assert!(slot < self.srv_count(), "SRV slot {slot} is out of range");
        self.set_view(ViewTable::Srv, slot, view.map(CachedView::Texture));
    }

    pub fn set_buf_srv(&mut self, slot: u32, view: Option<Arc<BufferView>>) {
        debug_assert!(slot < self.srv_count(), "SRV slot {slot} is out of range");
        self.set_view(ViewTable::Srv, slot, view.map(CachedView::Buffer));
    }

    pub fn set_tex_uav(&mut self, slot: u32, view: Option<Arc<TextureView>>) {
        debug_assert!(slot < self.uav_count(), "UAV slot {slot} is out of range");
        self.set_view(ViewTable::Uav, slot, view.map(CachedView::Texture));
    }

    pub fn set_buf_uav(&mut self, slot: u32, view: Option<Arc<BufferView>>) {
        debug_assert!(slot < self.uav_count(), "UAV slot {slot} is out of range");
        self.set_view(ViewTable::Uav, slot, view.map(CachedView::Buffer));
    }

    pub fn set_sampler(&mut self, slot: u32, sampler: Option<Arc<Sampler>>) {
        debug_assert!(slot < self.sampler_count(), "sampler slot {slot} is out of range");
        let handle = sampler.as_ref().map(|s| s.native_handle());
        self.samplers.set(slot, CachedSampler { sampler }, handle);
    }

    /// Copies a whole SRV entry, used when snapshotting one cache into another.
    pub(crate) fn set_srv_view(&mut self, slot: u32, view: Option<CachedView>) {
        debug_assert!(slot < self.srv_count(), "SRV slot {slot} is out of range");
        self.set_view(ViewTable::Srv, slot, view);
    }

    pub(crate) fn set_uav_view(&mut self, slot: u32, view: Option<CachedView>) {
        debug_assert!(slot < self.uav_count(), "UAV slot {slot} is out of range");
        self.set_view(ViewTable::Uav, slot, view);
    }

    fn set_view(&mut self, table: ViewTable, slot: u32, view: Option<CachedView>) {
        let handle = view.as_ref().map(CachedView::native_handle);
        let entry = CachedResource::new(view);
        match table {
            ViewTable::Srv => self.srvs.set(slot, entry, handle),
            ViewTable::Uav => self.uavs.set(slot, entry, handle),
        }
    }

    /// Panics if `slot` is out of range.
    pub fn cb(&self, slot: u32) -> &CachedCB {
        &self.cbs.entries[slot as usize]
    }

    pub fn srv(&self, slot: u32) -> &CachedResource {
        &self.srvs.entries[slot as usize]
    }

    pub fn uav(&self, slot: u32) -> &CachedResource {
        &self.uavs.entries[slot as usize]
    }

    pub fn sampler(&self, slot: u32) -> &CachedSampler {
        &self.samplers.entries[slot as usize]
    }

    pub fn cbs(&self) -> &[CachedCB] {
        &self.cbs.entries
    }

    pub fn srvs(&self) -> &[CachedResource] {
        &self.srvs.entries
    }

    pub fn uavs(&self) -> &[CachedResource] {
        &self.uavs.entries
    }

    pub fn samplers(&self) -> &[CachedSampler] {
        &self.samplers.entries
    }

    pub fn cb_handles(&self) -> &[Option<NativeHandle>] {
        &self.cbs.handles
    }

    pub fn srv_handles(&self) -> &[Option<NativeHandle>] {
        &self.srvs.handles
    }

    pub fn sampler_handles(&self) -> &[Option<NativeHandle>] {
        &self.samplers.handles
    }

    pub fn uav_handles(&self) -> &[Option<NativeHandle>] {
        &self.uavs.handles
    }

    pub fn is_cb_bound(&self, slot: u32) -> bool {
        self.cbs
            .entries
            .get(slot as usize)
            .is_some_and(|cb| cb.buffer.is_some())
    }

    pub fn is_srv_bound(&self, slot: u32) -> bool {
        self.srvs.entries.get(slot as usize).is_some_and(CachedResource::is_bound)
    }

    pub fn is_uav_bound(&self, slot: u32) -> bool {
        self.uavs.entries.get(slot as usize).is_some_and(CachedResource::is_bound)
    }

    pub fn is_sampler_bound(&self, slot: u32) -> bool {
        self.samplers
            .entries
            .get(slot as usize)
            .is_some_and(|s| s.sampler.is_some())
    }

    /// Checks that every slot's native handle is exactly the handle of the object it caches.
    ///
    /// Returns `true` if the cache is consistent.
    #[cfg(feature = "development")]
    pub fn dbg_verify_consistency(&self) -> bool {
        fn check(
            kind: &str,
            handles: &[Option<NativeHandle>],
            expected: impl Iterator<Item = Option<NativeHandle>>,
        ) -> bool {
            let mut ok = true;
            for (slot, (actual, expected)) in handles.iter().zip(expected).enumerate() {
                match (actual, expected) {
                    (None, None) => {}
                    (Some(_), None) => {
                        tracing::error!("{kind} slot {slot} holds a native handle but no object");
                        ok = false;
                    }
                    (None, Some(_)) => {
                        tracing::error!("{kind} slot {slot} holds an object but no native handle");
                        ok = false;
                    }
                    (Some(actual), Some(expected)) if *actual != expected => {
                        tracing::error!(
                            "{kind} slot {slot} holds native handle {actual} while the cached object owns {expected}"
                        );
                        ok = false;
                    }
                    _ => {}
                }
            }
            ok
        }

        let cbs = check(
            "Constant buffer",
            &self.cbs.handles,
            self.cbs.entries.iter().map(|e| e.buffer.as_ref().map(|b| b.native_handle())),
        );
        let srvs = check(
            "SRV",
            &self.srvs.handles,
            self.srvs.entries.iter().map(CachedResource::view_handle),
        );
        let samplers = check(
            "Sampler",
            &self.samplers.handles,
            self.samplers.entries.iter().map(|e| e.sampler.as_ref().map(|s| s.native_handle())),
        );
        let uavs = check(
            "UAV",
            &self.uavs.handles,
            self.uavs.entries.iter().map(CachedResource::view_handle),
        );
        let resources = self
            .srvs
            .entries
            .iter()
            .chain(&self.uavs.entries)
            .all(|e| e.resource == e.view.as_ref().map(CachedView::resource_handle));
        if !resources {
            tracing::error!("Cached resource handle does not match the resource of the cached view");
        }
        cbs && srvs && samplers && uavs && resources
    }
}

#[derive(Clone, Copy)]
enum ViewTable {
    Srv,
    Uav,
}

impl Drop for ShaderResourceCache {
    fn drop(&mut self) {
        if self.state == CacheState::Initialized {
            self.destroy();
            #[cfg(feature = "development")]
            {
                tracing::error!("Resource cache is dropped without being destroyed");
                // Unwinding drops caches whose owner never got to destroy them.
                debug_assert!(std::thread::panicking(), "resource cache is dropped without being destroyed");
            }
        }
    }
}
