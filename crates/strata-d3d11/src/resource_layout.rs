//! Addressable view over the resources of one stage whose variable type is in an allowed set.
//!
//! A layout owns no bindings. Every write goes into a [`ShaderResourceCache`] the caller passes
//! in: the pipeline state's static cache for static layouts, the binding object's cache for
//! mutable and dynamic ones.

use std::sync::Arc;

use crate::allocator::{Allocation, ResourceCacheAllocator};
use crate::binding_model::CacheSlotCounts;
use crate::error::{EngineError, Result};
use crate::layout_desc::{
    BindShaderResourcesFlags, PipelineResourceLayoutDesc, ShaderVariableType, ShaderVariableTypes,
};
use crate::resource_cache::{CachedView, ShaderResourceCache};
use crate::resource_mapping::ResourceMapping;
use crate::resources::{BindFlags, BufferViewType, DeviceObject, TextureViewType};
use crate::shader_resources::{ResourceAttributes, ResourceClass, ResourceCounters, ShaderResources};
use crate::stage::ShaderStage;

/// One bindable variable of a layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BindInfo {
    /// Index into the class list of the reflected resources.
    attribs: usize,
    var_type: ShaderVariableType,
    /// For combined texture SRVs: index of the layout's sampler bind info. `None` when the
    /// sampler is immutable.
    sampler: Option<usize>,
}

#[derive(Debug, Default)]
struct BindInfos {
    cbs: Vec<BindInfo>,
    tex_srvs: Vec<BindInfo>,
    tex_uavs: Vec<BindInfo>,
    buf_srvs: Vec<BindInfo>,
    buf_uavs: Vec<BindInfo>,
    samplers: Vec<BindInfo>,
}

impl BindInfos {
    fn list(&self, class: ResourceClass) -> &[BindInfo] {
        match class {
            ResourceClass::ConstantBuffer => &self.cbs,
            ResourceClass::TextureSrv => &self.tex_srvs,
            ResourceClass::TextureUav => &self.tex_uavs,
            ResourceClass::BufferSrv => &self.buf_srvs,
            ResourceClass::BufferUav => &self.buf_uavs,
            ResourceClass::Sampler => &self.samplers,
        }
    }

    fn list_mut(&mut self, class: ResourceClass) -> &mut Vec<BindInfo> {
        match class {
            ResourceClass::ConstantBuffer => &mut self.cbs,
            ResourceClass::TextureSrv => &mut self.tex_srvs,
            ResourceClass::TextureUav => &mut self.tex_uavs,
            ResourceClass::BufferSrv => &mut self.buf_srvs,
            ResourceClass::BufferUav => &mut self.buf_uavs,
            ResourceClass::Sampler => &mut self.samplers,
        }
    }
}

/// Variable index order: every class but samplers, then samplers unless they are combined.
const VARIABLE_ORDER: [ResourceClass; 6] = [
    ResourceClass::ConstantBuffer,
    ResourceClass::TextureSrv,
    ResourceClass::TextureUav,
    ResourceClass::BufferSrv,
    ResourceClass::BufferUav,
    ResourceClass::Sampler,
];

/// Bind-info construction order. Samplers come before textures so that a combined texture can
/// find its sampler's bind info.
const CONSTRUCTION_ORDER: [ResourceClass; 6] = [
    ResourceClass::ConstantBuffer,
    ResourceClass::Sampler,
    ResourceClass::TextureSrv,
    ResourceClass::TextureUav,
    ResourceClass::BufferSrv,
    ResourceClass::BufferUav,
];

#[derive(Debug)]
pub struct ShaderResourceLayout {
    resources: Arc<ShaderResources>,
    allowed: ShaderVariableTypes,
    infos: BindInfos,
    slot_counts: CacheSlotCounts,
    allocation: Option<(Arc<ResourceCacheAllocator>, Allocation)>,
}

impl ShaderResourceLayout {
    /// Builds the layout of every resource whose variable type is in `allowed` and initializes
    /// `cache` for those resources if nobody initialized it yet. Immutable samplers are left
    /// out: the pipeline state writes them into caches directly.
    pub fn new(
        resources: Arc<ShaderResources>,
        layout_desc: &PipelineResourceLayoutDesc,
        allowed: ShaderVariableTypes,
        cache: &mut ShaderResourceCache,
        allocator: &Arc<ResourceCacheAllocator>,
    ) -> Result<Self> {
        let expected = resources.count_resources(layout_desc, allowed, false);

        let mut infos = BindInfos::default();
        let mut slot_counts = CacheSlotCounts::default();
        for class in CONSTRUCTION_ORDER {
            for (index, attribs) in resources.resources(class).iter().enumerate() {
                let var_type = resources.find_variable_type(attribs, layout_desc);
                if !allowed.contains_type(var_type) {
                    continue;
                }
                let mut sampler = None;
                match class {
                    ResourceClass::Sampler => {
                        if resources.find_immutable_sampler(attribs, layout_desc, false).is_some() {
                            continue;
                        }
                    }
                    ResourceClass::TextureSrv => {
                        if let Some(sampler_index) = attribs.combined_sampler_index() {
                            let sampler_attribs = &resources.samplers()[sampler_index];
                            debug_assert_eq!(
                                resources.find_variable_type(sampler_attribs, layout_desc),
                                var_type,
                                "combined sampler '{}' must have the type of texture '{}'",
                                sampler_attribs.name(),
                                attribs.name()
                            );
                            sampler = infos
                                .samplers
                                .iter()
                                .position(|info| info.attribs == sampler_index);
                        }
                    }
                    _ => {}
                }

                let end = attribs.end_slot();
                match class {
                    ResourceClass::ConstantBuffer => slot_counts.cbs = slot_counts.cbs.max(end),
                    ResourceClass::TextureSrv | ResourceClass::BufferSrv => {
                        slot_counts.srvs = slot_counts.srvs.max(end)
                    }
                    ResourceClass::TextureUav | ResourceClass::BufferUav => {
                        slot_counts.uavs = slot_counts.uavs.max(end)
                    }
                    ResourceClass::Sampler => slot_counts.samplers = slot_counts.samplers.max(end),
                }
                infos.list_mut(class).push(BindInfo {
                    attribs: index,
                    var_type,
                    sampler,
                });
            }
        }

        for class in ResourceClass::ALL {
            let actual = infos.list(class).len();
            if actual != expected.get(class) {
                return Err(EngineError::LayoutCountMismatch {
                    shader: resources.shader_name().to_owned(),
                    class,
                    expected: expected.get(class),
                    actual,
                });
            }
        }

        // The binding object's cache is sized for every variable type before its
        // mutable/dynamic layout is built; only static caches are sized here.
        if !cache.is_initialized() {
            cache.initialize(allocator, slot_counts);
        }

        let total = expected.total();
        let allocation = (total > 0).then(|| (Arc::clone(allocator), allocator.allocate(total)));

        Ok(Self {
            resources,
            allowed,
            infos,
            slot_counts,
            allocation,
        })
    }

    pub fn resources(&self) -> &Arc<ShaderResources> {
        &self.resources
    }

    pub fn stage(&self) -> ShaderStage {
        self.resources.stage()
    }

    pub fn shader_name(&self) -> &str {
        self.resources.shader_name()
    }

    pub fn allowed_types(&self) -> ShaderVariableTypes {
        self.allowed
    }

    /// Cache slots the layout's own variables need.
    pub fn slot_counts(&self) -> CacheSlotCounts {
        self.slot_counts
    }

    /// Number of bind infos per class.
    pub fn counters(&self) -> ResourceCounters {
        ResourceCounters {
            cbs: self.infos.cbs.len(),
            tex_srvs: self.infos.tex_srvs.len(),
            tex_uavs: self.infos.tex_uavs.len(),
            buf_srvs: self.infos.buf_srvs.len(),
            buf_uavs: self.infos.buf_uavs.len(),
            samplers: self.infos.samplers.len(),
        }
    }

    fn variable_classes(&self) -> impl Iterator<Item = ResourceClass> + '_ {
        VARIABLE_ORDER.into_iter().filter(move |class| {
            *class != ResourceClass::Sampler || !self.resources.is_using_combined_samplers()
        })
    }

    /// Number of variables addressable by index.
    pub fn variable_count(&self) -> usize {
        self.variable_classes().map(|class| self.infos.list(class).len()).sum()
    }

    fn attribs(&self, class: ResourceClass, info: &BindInfo) -> &ResourceAttributes {
        &self.resources.resources(class)[info.attribs]
    }

    pub fn variable_by_name<'a>(
        &'a self,
        cache: &'a mut ShaderResourceCache,
        name: &str,
    ) -> Option<ShaderVariable<'a>> {
        let mut index = 0;
        for class in self.variable_classes() {
            let list = self.infos.list(class);
            if let Some(position) = list.iter().position(|info| self.attribs(class, info).name() == name) {
                return Some(ShaderVariable {
                    layout: self,
                    cache,
                    class,
                    info: position,
                    index: index + position,
                });
            }
            index += list.len();
        }
        None
    }

    pub fn variable_by_index<'a>(
        &'a self,
        cache: &'a mut ShaderResourceCache,
        index: usize,
    ) -> Option<ShaderVariable<'a>> {
        let mut remaining = index;
        for class in self.variable_classes() {
            let len = self.infos.list(class).len();
            if remaining < len {
                return Some(ShaderVariable {
                    layout: self,
                    cache,
                    class,
                    info: remaining,
                    index,
                });
            }
            remaining -= len;
        }
        tracing::error!(
            "{} is not a valid variable index. Total resource count: {}",
            index,
            self.variable_count()
        );
        None
    }

    /// Binds every variable whose name is found in `mapping`.
    pub fn bind_resources(
        &self,
        mapping: &ResourceMapping,
        mut flags: BindShaderResourcesFlags,
        cache: &mut ShaderResourceCache,
    ) {
        if !flags.intersects(BindShaderResourcesFlags::UPDATE_ALL) {
            flags |= BindShaderResourcesFlags::UPDATE_ALL;
        }

        for class in self.variable_classes() {
            for info in self.infos.list(class) {
                if !flags.updates(info.var_type) {
                    continue;
                }
                let attribs = self.attribs(class, info);
                for element in 0..attribs.bind_count() {
                    if flags.contains(BindShaderResourcesFlags::KEEP_EXISTING)
                        && self.is_bound(class, info, element, cache)
                    {
                        continue;
                    }
                    match mapping.get(attribs.name(), element) {
                        Some(object) => self.bind(class, info, element, Some(object), cache),
                        None => {
                            if flags.contains(BindShaderResourcesFlags::VERIFY_ALL_RESOLVED)
                                && !self.is_bound(class, info, element, cache)
                            {
                                tracing::error!(
                                    "Unable to bind resource to shader variable '{}': resource is not found in the resource mapping",
                                    attribs.name()
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    /// Copies every slot of this layout's variables from `src` into `dst`.
    pub fn copy_resources(&self, src: &ShaderResourceCache, dst: &mut ShaderResourceCache) {
        debug_assert!(dst.cb_count() >= src.cb_count().min(self.slot_counts.cbs));
        debug_assert!(dst.srv_count() >= src.srv_count().min(self.slot_counts.srvs));
        debug_assert!(dst.sampler_count() >= src.sampler_count().min(self.slot_counts.samplers));
        debug_assert!(dst.uav_count() >= src.uav_count().min(self.slot_counts.uavs));

        for class in ResourceClass::ALL {
            for info in self.infos.list(class) {
                let attribs = self.attribs(class, info);
                for slot in attribs.bind_point()..attribs.end_slot() {
                    match class {
                        ResourceClass::ConstantBuffer => dst.set_cb(slot, src.cb(slot).buffer().cloned()),
                        ResourceClass::TextureSrv | ResourceClass::BufferSrv => {
                            dst.set_srv_view(slot, src.srv(slot).view().cloned())
                        }
                        ResourceClass::TextureUav | ResourceClass::BufferUav => {
                            dst.set_uav_view(slot, src.uav(slot).view().cloned())
                        }
                        ResourceClass::Sampler => {
                            dst.set_sampler(slot, src.sampler(slot).sampler().cloned())
                        }
                    }
                }
            }
        }
    }

    fn is_bound(
        &self,
        class: ResourceClass,
        info: &BindInfo,
        element: u32,
        cache: &ShaderResourceCache,
    ) -> bool {
        let slot = self.attribs(class, info).bind_point() + element;
        match class {
            ResourceClass::ConstantBuffer => cache.is_cb_bound(slot),
            ResourceClass::TextureSrv | ResourceClass::BufferSrv => cache.is_srv_bound(slot),
            ResourceClass::TextureUav | ResourceClass::BufferUav => cache.is_uav_bound(slot),
            ResourceClass::Sampler => cache.is_sampler_bound(slot),
        }
    }

    fn bind(
        &self,
        class: ResourceClass,
        info: &BindInfo,
        element: u32,
        object: Option<&DeviceObject>,
        cache: &mut ShaderResourceCache,
    ) {
        let attribs = self.attribs(class, info);
        if element >= attribs.bind_count() {
            tracing::error!(
                "Array index ({}) is out of range for variable '{}'. Max allowed index: {}",
                element,
                attribs.name(),
                attribs.bind_count() - 1
            );
            return;
        }
        let slot = attribs.bind_point() + element;
        let binder = Binder {
            attribs,
            var_type: info.var_type,
            element,
            shader: self.shader_name(),
            object,
        };

        match class {
            ResourceClass::ConstantBuffer => {
                let buffer = binder.expect(object.and_then(DeviceObject::as_buffer), "buffer");
                if let Some(buffer) = buffer {
                    if !buffer.desc().bind_flags.contains(BindFlags::UNIFORM_BUFFER) {
                        tracing::error!(
                            "Error binding buffer '{}' to variable '{}' in shader '{}'. The buffer was not created with BIND_UNIFORM_BUFFER flag.",
                            buffer.name(),
                            attribs.print_name(element),
                            self.shader_name()
                        );
                        return;
                    }
                }
                if let Some(cached) = cache.cb(slot).buffer() {
                    if buffer.map_or(true, |b| !Arc::ptr_eq(b, cached)) {
                        binder.already_bound("constant (uniform) buffer", cached.name(), buffer.map(|b| b.name()));
                    }
                }
                cache.set_cb(slot, buffer.cloned());
            }
            ResourceClass::TextureSrv | ResourceClass::TextureUav => {
                let expected = match class {
                    ResourceClass::TextureSrv => TextureViewType::ShaderResource,
                    _ => TextureViewType::UnorderedAccess,
                };
                let view = binder.expect(object.and_then(DeviceObject::as_texture_view), "texture view");
                if let Some(view) = view {
                    if view.view_type() != expected {
                        binder.wrong_view_type("texture view", view.name(), expected.literal_name(), view.view_type().literal_name());
                        return;
                    }
                }
                let cached = match class {
                    ResourceClass::TextureSrv => cache.srv(slot),
                    _ => cache.uav(slot),
                };
                if let Some(cached) = cached.view() {
                    let same = matches!((cached, view), (CachedView::Texture(c), Some(v)) if Arc::ptr_eq(c, v));
                    if !same {
                        binder.already_bound("resource", cached.name(), view.map(|v| v.name()));
                    }
                }

                if class == ResourceClass::TextureSrv {
                    if let Some(sampler_info) = info.sampler {
                        self.bind_combined_sampler(sampler_info, info, element, view.map(Arc::as_ref), cache);
                    }
                    cache.set_tex_srv(slot, view.cloned());
                } else {
                    cache.set_tex_uav(slot, view.cloned());
                }
            }
            ResourceClass::BufferSrv | ResourceClass::BufferUav => {
                let expected = match class {
                    ResourceClass::BufferSrv => BufferViewType::ShaderResource,
                    _ => BufferViewType::UnorderedAccess,
                };
                let view = binder.expect(object.and_then(DeviceObject::as_buffer_view), "buffer view");
                if let Some(view) = view {
                    if view.view_type() != expected {
                        binder.wrong_view_type("buffer view", view.name(), expected.literal_name(), view.view_type().literal_name());
                        return;
                    }
                }
                let cached = match class {
                    ResourceClass::BufferSrv => cache.srv(slot),
                    _ => cache.uav(slot),
                };
                if let Some(cached) = cached.view() {
                    let same = matches!((cached, view), (CachedView::Buffer(c), Some(v)) if Arc::ptr_eq(c, v));
                    if !same {
                        binder.already_bound("resource", cached.name(), view.map(|v| v.name()));
                    }
                }

                if class == ResourceClass::BufferSrv {
                    cache.set_buf_srv(slot, view.cloned());
                } else {
                    cache.set_buf_uav(slot, view.cloned());
                }
            }
            ResourceClass::Sampler => {
                let sampler = binder.expect(object.and_then(DeviceObject::as_sampler), "sampler");
                if let Some(texture_index) = attribs.assigned_texture_index() {
                    let texture = self.resources.texture_srvs()[texture_index].name();
                    tracing::warn!(
                        "Texture sampler '{}' is assigned to texture SRV '{}' and should not be accessed directly. The sampler is initialized when texture SRV is set to '{}' variable.",
                        attribs.name(),
                        texture,
                        texture
                    );
                }
                if let Some(cached) = cache.sampler(slot).sampler() {
                    if sampler.map_or(true, |s| !Arc::ptr_eq(s, cached)) && info.var_type != ShaderVariableType::Dynamic {
                        tracing::error!(
                            "Non-null sampler is already bound to {} shader variable '{}' in shader '{}'. Attempting to bind another sampler or null is an error and may cause unpredicted behavior. Use another shader resource binding instance or label the variable as dynamic.",
                            info.var_type,
                            attribs.print_name(element),
                            self.shader_name()
                        );
                    }
                }
                cache.set_sampler(slot, sampler.cloned());
            }
        }
    }

    /// Writes the sampler carried by `view` into the slot of the sampler combined with a
    /// texture. One shared sampler is broadcast to every element; a sampler array is written
    /// per element.
    fn bind_combined_sampler(
        &self,
        sampler_info: usize,
        texture_info: &BindInfo,
        element: u32,
        view: Option<&crate::resources::TextureView>,
        cache: &mut ShaderResourceCache,
    ) {
        let info = &self.infos.samplers[sampler_info];
        let sampler_attribs = self.attribs(ResourceClass::Sampler, info);
        let texture_attribs = self.attribs(ResourceClass::TextureSrv, texture_info);
        debug_assert!(
            sampler_attribs.bind_count() == texture_attribs.bind_count() || sampler_attribs.bind_count() == 1
        );
        let sampler_element = if sampler_attribs.bind_count() != 1 { element } else { 0 };
        let slot = sampler_attribs.bind_point() + sampler_element;

        let sampler = view.and_then(|view| {
            let sampler = view.sampler();
            if sampler.is_none() {
                if sampler_attribs.bind_count() > 1 {
                    tracing::error!(
                        "Failed to bind sampler to variable '{}[{}]'. Sampler is not set in the texture view '{}'",
                        sampler_attribs.name(),
                        element,
                        view.name()
                    );
                } else {
                    tracing::error!(
                        "Failed to bind sampler to variable '{}'. Sampler is not set in the texture view '{}'",
                        sampler_attribs.name(),
                        view.name()
                    );
                }
            }
            sampler
        });

        if info.var_type != ShaderVariableType::Dynamic {
            if let Some(cached) = cache.sampler(slot).sampler() {
                if sampler.as_ref().map_or(true, |s| !Arc::ptr_eq(s, cached)) {
                    tracing::error!(
                        "Non-null sampler is already bound to {} shader variable '{}' in shader '{}'. Attempting to bind another sampler or null is an error and may cause unpredicted behavior. Use another shader resource binding instance or label the variable as dynamic.",
                        texture_info.var_type,
                        sampler_attribs.print_name(sampler_element),
                        self.shader_name()
                    );
                }
            }
        }
        cache.set_sampler(slot, sampler);
    }

    /// Reports every slot of the layout's variables that is still unbound in `cache`.
    ///
    /// Returns `true` if all variables are bound.
    #[cfg(feature = "development")]
    pub fn dvp_verify_bindings(&self, cache: &ShaderResourceCache) -> bool {
        cache.dbg_verify_consistency();

        let shader = self.shader_name();
        let mut ok = true;
        for class in ResourceClass::ALL {
            for info in self.infos.list(class) {
                let attribs = self.attribs(class, info);
                for slot in attribs.bind_point()..attribs.end_slot() {
                    let bound = match class {
                        ResourceClass::ConstantBuffer => cache.is_cb_bound(slot),
                        ResourceClass::TextureSrv => {
                            slot < cache.srv_count() && cache.srv(slot).texture_view().is_some()
                        }
                        ResourceClass::BufferSrv => {
                            slot < cache.srv_count() && cache.srv(slot).buffer_view().is_some()
                        }
                        ResourceClass::TextureUav => {
                            slot < cache.uav_count() && cache.uav(slot).texture_view().is_some()
                        }
                        ResourceClass::BufferUav => {
                            slot < cache.uav_count() && cache.uav(slot).buffer_view().is_some()
                        }
                        ResourceClass::Sampler => cache.is_sampler_bound(slot),
                    };
                    if !bound {
                        if attribs.bind_count() == 1 {
                            tracing::error!(
                                "No resource is bound to {} variable '{}' in shader '{}'",
                                class,
                                attribs.name(),
                                shader
                            );
                        } else {
                            tracing::error!(
                                "No resource is bound to {} variable '{}[{}]' in shader '{}'",
                                class,
                                attribs.name(),
                                slot - attribs.bind_point(),
                                shader
                            );
                        }
                        ok = false;
                    }

                    if class == ResourceClass::TextureSrv {
                        self.verify_shared_sampler(info, attribs, slot, cache);
                    }
                }
            }
        }
        ok
    }

    /// When one sampler serves a whole texture array, every view's own sampler has to agree
    /// with the bound one.
    #[cfg(feature = "development")]
    fn verify_shared_sampler(
        &self,
        info: &BindInfo,
        attribs: &ResourceAttributes,
        slot: u32,
        cache: &ShaderResourceCache,
    ) {
        let Some(sampler_info) = info.sampler else {
            return;
        };
        let sampler_attribs = self.attribs(ResourceClass::Sampler, &self.infos.samplers[sampler_info]);
        if attribs.bind_count() <= 1 || sampler_attribs.bind_count() != 1 {
            return;
        }
        if sampler_attribs.bind_point() >= cache.sampler_count() || slot >= cache.srv_count() {
            return;
        }
        let bound = cache.sampler(sampler_attribs.bind_point()).sampler();
        let Some(view) = cache.srv(slot).texture_view() else {
            return;
        };
        if let Some(view_sampler) = view.sampler() {
            if bound.map_or(true, |bound| !Arc::ptr_eq(bound, &view_sampler)) {
                tracing::error!(
                    "All elements of texture array '{}' in shader '{}' share the same sampler. However, the sampler set in view for element {} does not match bound sampler. This may cause incorrect behavior on GL platform.",
                    attribs.name(),
                    self.shader_name(),
                    slot - attribs.bind_point()
                );
            }
        }
    }
}

impl Drop for ShaderResourceLayout {
    fn drop(&mut self) {
        if let Some((allocator, allocation)) = self.allocation.take() {
            allocator.release(allocation);
        }
    }
}

/// Logging helpers shared by the per-class bind paths.
struct Binder<'a> {
    attribs: &'a ResourceAttributes,
    var_type: ShaderVariableType,
    element: u32,
    shader: &'a str,
    object: Option<&'a DeviceObject>,
}

impl Binder<'_> {
    /// Passes `cast` through, logging if a non-null object had the wrong type.
    fn expect<T>(&self, cast: Option<T>, expected: &str) -> Option<T> {
        if cast.is_none() {
            if let Some(object) = self.object {
                tracing::error!(
                    "Failed to bind resource '{}' to variable '{}' in shader '{}'. Invalid resource type: {} is expected.",
                    object.name(),
                    self.attribs.print_name(self.element),
                    self.shader,
                    expected
                );
            }
        }
        cast
    }

    fn wrong_view_type(&self, kind: &str, name: &str, expected: &str, actual: &str) {
        tracing::error!(
            "Error binding {} '{}' to variable '{}' in shader '{}'. Incorrect view type: {} is expected, {} is provided.",
            kind,
            name,
            self.attribs.print_name(self.element),
            self.shader,
            expected,
            actual
        );
    }

    fn already_bound(&self, kind: &str, cached: &str, new: Option<&str>) {
        if self.var_type == ShaderVariableType::Dynamic {
            return;
        }
        let attempt = match new {
            Some(name) => format!("another resource ('{name}')"),
            None => "null".to_owned(),
        };
        tracing::error!(
            "Non-null {} '{}' is already bound to {} shader variable '{}' in shader '{}'. Attempting to bind {} is an error and may cause unpredicted behavior. Use another shader resource binding instance or label the variable as dynamic.",
            kind,
            cached,
            self.var_type,
            self.attribs.print_name(self.element),
            self.shader,
            attempt
        );
    }
}

/// A variable of a layout bound to the cache it writes into.
pub struct ShaderVariable<'a> {
    layout: &'a ShaderResourceLayout,
    cache: &'a mut ShaderResourceCache,
    class: ResourceClass,
    info: usize,
    index: usize,
}

impl ShaderVariable<'_> {
    fn bind_info(&self) -> &BindInfo {
        &self.layout.infos.list(self.class)[self.info]
    }

    fn attribs(&self) -> &ResourceAttributes {
        self.layout.attribs(self.class, self.bind_info())
    }

    pub fn name(&self) -> &str {
        self.attribs().name()
    }

    pub fn resource_class(&self) -> ResourceClass {
        self.class
    }

    pub fn variable_type(&self) -> ShaderVariableType {
        self.bind_info().var_type
    }

    /// Position of the variable in the layout's index order.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn array_size(&self) -> u32 {
        self.attribs().bind_count()
    }

    /// Binds `object` to element 0. `None` unbinds.
    pub fn set(&mut self, object: Option<DeviceObject>) {
        let info = *self.bind_info();
        self.layout.bind(self.class, &info, 0, object.as_ref(), self.cache);
    }

    /// Binds `objects` to consecutive elements starting at `first_element`.
    pub fn set_array(&mut self, first_element: u32, objects: &[Option<DeviceObject>]) {
        let info = *self.bind_info();
        let size = self.array_size();
        let name = self.name().to_owned();

        if first_element >= size {
            tracing::error!(
                "SetArray arguments are invalid for '{}' variable: FirstElement ({}) is out of allowed range 0 .. {}",
                name,
                first_element,
                size - 1
            );
            return;
        }
        let mut count = objects.len() as u32;
        if first_element + count > size {
            tracing::error!(
                "SetArray arguments are invalid for '{}' variable: specified element range ({} .. {}) is out of array bounds 0 .. {}",
                name,
                first_element,
                first_element + count - 1,
                size - 1
            );
            count = size - first_element;
        }
        for (i, object) in objects.iter().take(count as usize).enumerate() {
            self.layout
                .bind(self.class, &info, first_element + i as u32, object.as_ref(), self.cache);
        }
    }

    pub fn is_bound(&self, array_index: u32) -> bool {
        if array_index >= self.array_size() {
            return false;
        }
        self.layout
            .is_bound(self.class, self.bind_info(), array_index, &*self.cache)
    }
}

impl std::fmt::Debug for ShaderVariable<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShaderVariable")
            .field("name", &self.name())
            .field("class", &self.class)
            .field("index", &self.index)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use strata_dxbc::test_utils::RdefBuilder;
    use strata_dxbc::ProgramType;

    use super::*;
    use crate::layout_desc::ShaderVariableDesc;
    use crate::resource_state::ResourceState;
    use crate::resources::{Buffer, BufferDesc, NativeHandle, Sampler, SamplerDesc, Texture, TextureDesc, TextureView};
    use crate::stage::ShaderStages;

    fn h(raw: u64) -> NativeHandle {
        NativeHandle::new(raw).unwrap()
    }

    fn resources(builder: RdefBuilder, suffix: Option<&str>) -> Arc<ShaderResources> {
        Arc::new(ShaderResources::from_bytecode(&builder.build_dxbc(), "ps", suffix).unwrap())
    }

    fn uniform_buffer(raw: u64) -> DeviceObject {
        Arc::new(Buffer::new(
            BufferDesc {
                name: format!("cb{raw}"),
                size: 64,
                bind_flags: BindFlags::UNIFORM_BUFFER,
            },
            h(raw),
            ResourceState::UNDEFINED,
        ))
        .into()
    }

    fn srv(raw: u64, sampler: Option<Arc<Sampler>>) -> Arc<TextureView> {
        let texture = Arc::new(Texture::new(
            TextureDesc {
                name: format!("tex{raw}"),
                bind_flags: BindFlags::SHADER_RESOURCE,
                ..TextureDesc::default()
            },
            h(raw),
            ResourceState::UNDEFINED,
        ));
        let view = Arc::new(TextureView::new(format!("srv{raw}"), TextureViewType::ShaderResource, texture, h(raw + 100)));
        view.set_sampler(sampler);
        view
    }

    fn sampler(raw: u64) -> Arc<Sampler> {
        Arc::new(Sampler::new(SamplerDesc::default(), h(raw)))
    }

    fn build(
        res: &Arc<ShaderResources>,
        desc: &PipelineResourceLayoutDesc,
        allowed: ShaderVariableTypes,
    ) -> (Arc<ResourceCacheAllocator>, ShaderResourceCache, ShaderResourceLayout) {
        let allocator = Arc::new(ResourceCacheAllocator::new("test"));
        let mut cache = ShaderResourceCache::new();
        let layout = ShaderResourceLayout::new(res.clone(), desc, allowed, &mut cache, &allocator).unwrap();
        (allocator, cache, layout)
    }

    #[test]
    fn layout_filters_by_variable_type() {
        let res = resources(
            RdefBuilder::new(ProgramType::Pixel)
                .constant_buffer("frame", 0)
                .constant_buffer("object", 1)
                .texture("albedo", 0, 1),
            None,
        );
        let desc = PipelineResourceLayoutDesc {
            default_variable_type: ShaderVariableType::Static,
            variables: vec![ShaderVariableDesc::new(ShaderStages::PIXEL, "object", ShaderVariableType::Mutable)],
            immutable_samplers: vec![],
        };

        let (_a, mut cache, layout) = build(&res, &desc, ShaderVariableTypes::MUTABLE);
        assert_eq!(layout.variable_count(), 1);
        assert_eq!(layout.counters(), res.count_resources(&desc, ShaderVariableTypes::MUTABLE, false));
        assert_eq!(cache.cb_count(), 2);
        assert_eq!(cache.srv_count(), 0);

        let var = layout.variable_by_name(&mut cache, "object").unwrap();
        assert_eq!(var.variable_type(), ShaderVariableType::Mutable);
        assert!(layout.variable_by_name(&mut cache, "frame").is_none());
        assert!(layout.variable_by_index(&mut cache, 1).is_none());
        cache.destroy();
    }

    #[test]
    fn combined_sampler_is_written_with_its_texture() {
        let res = resources(
            RdefBuilder::new(ProgramType::Pixel)
                .sampler("tex_sampler", 2, 1)
                .texture("tex", 0, 1),
            Some("_sampler"),
        );
        let (_a, mut cache, layout) = build(&res, &PipelineResourceLayoutDesc::default(), ShaderVariableTypes::all());
        // Combined samplers are not separate variables.
        assert_eq!(layout.variable_count(), 1);

        let s = sampler(9);
        let view = srv(1, Some(s.clone()));
        layout.variable_by_name(&mut cache, "tex").unwrap().set(Some(view.into()));

        assert!(Arc::ptr_eq(cache.sampler(2).sampler().unwrap(), &s));
        assert_eq!(cache.srv_handles()[0], Some(h(101)));
        cache.destroy();
    }

    #[test]
    fn sampler_arrays_are_written_per_element() {
        let res = resources(
            RdefBuilder::new(ProgramType::Pixel)
                .sampler("tex_sampler", 0, 3)
                .texture("tex", 0, 3),
            Some("_sampler"),
        );
        let (_a, mut cache, layout) = build(&res, &PipelineResourceLayoutDesc::default(), ShaderVariableTypes::all());

        let samplers: Vec<_> = (0..3).map(|i| sampler(50 + i)).collect();
        let views: Vec<Option<DeviceObject>> = samplers
            .iter()
            .enumerate()
            .map(|(i, s)| Some(srv(i as u64 + 1, Some(s.clone())).into()))
            .collect();
        layout.variable_by_name(&mut cache, "tex").unwrap().set_array(0, &views);

        assert_eq!(cache.sampler_handles(), &[Some(h(50)), Some(h(51)), Some(h(52))]);
        cache.destroy();
    }

    #[test]
    fn wrong_object_type_binds_null() {
        let res = resources(RdefBuilder::new(ProgramType::Pixel).constant_buffer("cb", 0), None);
        let (_a, mut cache, layout) = build(&res, &PipelineResourceLayoutDesc::default(), ShaderVariableTypes::all());

        let mut var = layout.variable_by_name(&mut cache, "cb").unwrap();
        var.set(Some(uniform_buffer(1)));
        assert!(var.is_bound(0));
        var.set(Some(sampler(2).into()));
        assert!(!var.is_bound(0));
        cache.destroy();
    }

    #[test]
    fn bind_resources_honors_keep_existing() {
        let res = resources(
            RdefBuilder::new(ProgramType::Vertex)
                .constant_buffer("a", 0)
                .constant_buffer("b", 1),
            None,
        );
        let desc = PipelineResourceLayoutDesc {
            default_variable_type: ShaderVariableType::Dynamic,
            ..Default::default()
        };
        let (_a, mut cache, layout) = build(&res, &desc, ShaderVariableTypes::DYNAMIC);

        let mut mapping = ResourceMapping::new();
        mapping.add("a", uniform_buffer(1), false);
        mapping.add("b", uniform_buffer(2), false);
        layout.bind_resources(&mapping, BindShaderResourcesFlags::empty(), &mut cache);
        assert_eq!(cache.cb_handles(), &[Some(h(1)), Some(h(2))]);

        let mut replacement = ResourceMapping::new();
        replacement.add("a", uniform_buffer(3), false);
        replacement.add("b", uniform_buffer(4), false);
        layout.bind_resources(
            &replacement,
            BindShaderResourcesFlags::UPDATE_DYNAMIC | BindShaderResourcesFlags::KEEP_EXISTING,
            &mut cache,
        );
        assert_eq!(cache.cb_handles(), &[Some(h(1)), Some(h(2))]);

        layout.bind_resources(&replacement, BindShaderResourcesFlags::UPDATE_STATIC, &mut cache);
        assert_eq!(cache.cb_handles(), &[Some(h(1)), Some(h(2))]);

        layout.bind_resources(&replacement, BindShaderResourcesFlags::UPDATE_DYNAMIC, &mut cache);
        assert_eq!(cache.cb_handles(), &[Some(h(3)), Some(h(4))]);
        cache.destroy();
    }

    #[test]
    fn copy_resources_snapshots_layout_slots() {
        let res = resources(
            RdefBuilder::new(ProgramType::Pixel)
                .constant_buffer("cb", 1)
                .texture("tex", 0, 1),
            None,
        );
        let (allocator, mut src, layout) = build(&res, &PipelineResourceLayoutDesc::default(), ShaderVariableTypes::STATIC);
        layout.variable_by_name(&mut src, "cb").unwrap().set(Some(uniform_buffer(7)));
        layout.variable_by_name(&mut src, "tex").unwrap().set(Some(srv(3, None).into()));

        let mut dst = ShaderResourceCache::new();
        dst.initialize_from_resources(&allocator, &res);
        layout.copy_resources(&src, &mut dst);
        assert_eq!(dst.cb_handles(), src.cb_handles());
        assert_eq!(dst.srv_handles(), src.srv_handles());
        dst.destroy();
        src.destroy();
    }

    #[cfg(feature = "development")]
    #[test]
    fn verify_bindings_reports_unbound_slots() {
        let res = resources(RdefBuilder::new(ProgramType::Pixel).texture("tex", 0, 2), None);
        let (_a, mut cache, layout) = build(&res, &PipelineResourceLayoutDesc::default(), ShaderVariableTypes::all());
        assert!(!layout.dvp_verify_bindings(&cache));

        layout
            .variable_by_name(&mut cache, "tex")
            .unwrap()
            .set_array(0, &[Some(srv(1, None).into()), Some(srv(2, None).into())]);
        assert!(layout.dvp_verify_bindings(&cache));
        cache.destroy();
    }
}
