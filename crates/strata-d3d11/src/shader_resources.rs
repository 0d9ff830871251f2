//! Reflection tables: the resources one compiled shader stage declares, partitioned by class.
//!
//! Built once from the shader's `RDEF` chunk and shared (`Arc`) by every layout, cache and
//! pipeline state that uses the shader.

use std::fmt;

use strata_dxbc::{DxbcFile, RdefChunk, RdefResourceBinding, ShaderInputType, ShaderTarget};

use crate::binding_model::{
    CacheSlotCounts, D3D11_MAX_CONSTANT_BUFFER_SLOTS, D3D11_MAX_SAMPLER_SLOTS, D3D11_MAX_SRV_SLOTS,
    D3D11_MAX_UAV_SLOTS,
};
use crate::error::{EngineError, Result};
use crate::layout_desc::{
    ImmutableSamplerDesc, PipelineResourceLayoutDesc, ShaderVariableType, ShaderVariableTypes,
};
use crate::stage::{ShaderStage, ShaderStages};

#[cfg(feature = "development")]
use crate::resource_cache::ShaderResourceCache;
#[cfg(feature = "development")]
use crate::resources::{BindFlags, NativeHandle};

/// The six binding classes of the D3D11 resource model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceClass {
    ConstantBuffer,
    TextureSrv,
    TextureUav,
    BufferSrv,
    BufferUav,
    Sampler,
}

impl ResourceClass {
    pub const ALL: [ResourceClass; 6] = [
        Self::ConstantBuffer,
        Self::TextureSrv,
        Self::TextureUav,
        Self::BufferSrv,
        Self::BufferUav,
        Self::Sampler,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::ConstantBuffer => "constant buffer",
            Self::TextureSrv => "texture",
            Self::TextureUav => "texture UAV",
            Self::BufferSrv => "buffer",
            Self::BufferUav => "buffer UAV",
            Self::Sampler => "sampler",
        }
    }

    /// Native register limit of the slot range this class is bound to.
    pub const fn slot_limit(self) -> u32 {
        match self {
            Self::ConstantBuffer => D3D11_MAX_CONSTANT_BUFFER_SLOTS,
            Self::TextureSrv | Self::BufferSrv => D3D11_MAX_SRV_SLOTS,
            Self::TextureUav | Self::BufferUav => D3D11_MAX_UAV_SLOTS,
            Self::Sampler => D3D11_MAX_SAMPLER_SLOTS,
        }
    }

    fn from_binding(binding: &RdefResourceBinding, shader: &str) -> Result<Self> {
        let unsupported = || EngineError::UnsupportedResourceType {
            shader: shader.to_owned(),
            name: binding.name.clone(),
            input_type: binding.input_type,
        };
        let input_type = binding.shader_input_type().ok_or_else(unsupported)?;
        Ok(match input_type {
            ShaderInputType::CBuffer => Self::ConstantBuffer,
            ShaderInputType::Texture if binding.is_buffer_dimension() => Self::BufferSrv,
            ShaderInputType::Texture => Self::TextureSrv,
            ShaderInputType::Sampler => Self::Sampler,
            ShaderInputType::UavRwTyped if binding.is_buffer_dimension() => Self::BufferUav,
            ShaderInputType::UavRwTyped => Self::TextureUav,
            ShaderInputType::Structured | ShaderInputType::ByteAddress => Self::BufferSrv,
            ShaderInputType::UavRwStructured | ShaderInputType::UavRwByteAddress => Self::BufferUav,
            ShaderInputType::TBuffer
            | ShaderInputType::UavAppendStructured
            | ShaderInputType::UavConsumeStructured
            | ShaderInputType::UavRwStructuredWithCounter => return Err(unsupported()),
        })
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One reflected resource.
///
/// For a texture SRV, `combined_index` is the index of the sampler it is combined with. For a
/// sampler it is the index of the texture SRV it is assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAttributes {
    name: String,
    bind_point: u32,
    bind_count: u32,
    class: ResourceClass,
    input_type: ShaderInputType,
    srv_dimension: u32,
    combined_index: Option<usize>,
}

impl ResourceAttributes {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bind_point(&self) -> u32 {
        self.bind_point
    }

    pub fn bind_count(&self) -> u32 {
        self.bind_count
    }

    /// One past the last slot this resource occupies.
    pub fn end_slot(&self) -> u32 {
        self.bind_point + self.bind_count
    }

    pub fn class(&self) -> ResourceClass {
        self.class
    }

    pub fn input_type(&self) -> ShaderInputType {
        self.input_type
    }

    pub fn srv_dimension(&self) -> u32 {
        self.srv_dimension
    }

    /// Index of the sampler a texture SRV is combined with.
    pub fn combined_sampler_index(&self) -> Option<usize> {
        match self.class {
            ResourceClass::TextureSrv => self.combined_index,
            _ => None,
        }
    }

    pub fn is_combined_with_sampler(&self) -> bool {
        self.combined_sampler_index().is_some()
    }

    /// Index of the texture SRV a sampler is assigned to.
    pub fn assigned_texture_index(&self) -> Option<usize> {
        match self.class {
            ResourceClass::Sampler => self.combined_index,
            _ => None,
        }
    }

    /// `name[i]` for arrays, `name` otherwise.
    pub fn print_name(&self, array_index: u32) -> String {
        debug_assert!(array_index < self.bind_count);
        if self.bind_count > 1 {
            format!("{}[{}]", self.name, array_index)
        } else {
            self.name.clone()
        }
    }

    /// Layout compatibility: everything but the name must agree.
    pub fn is_compatible_with(&self, other: &ResourceAttributes) -> bool {
        self.bind_point == other.bind_point
            && self.bind_count == other.bind_count
            && self.input_type == other.input_type
            && self.srv_dimension == other.srv_dimension
            && self.combined_index == other.combined_index
    }

    pub fn hash(&self) -> u64 {
        let mut seed = 0;
        hash_combine(&mut seed, u64::from(self.bind_point));
        hash_combine(&mut seed, u64::from(self.bind_count));
        hash_combine(&mut seed, self.input_type as u64);
        hash_combine(&mut seed, u64::from(self.srv_dimension));
        hash_combine(&mut seed, self.combined_index.map_or(u64::MAX, |i| i as u64));
        seed
    }
}

pub(crate) fn hash_combine(seed: &mut u64, value: u64) {
    *seed ^= value
        .wrapping_add(0x9e37_79b9)
        .wrapping_add(*seed << 6)
        .wrapping_add(*seed >> 2);
}

/// `reference == s + suffix`, or `reference == s` when no suffix is in use.
pub(crate) fn streq_suffix(reference: &str, s: &str, suffix: Option<&str>) -> bool {
    match suffix {
        Some(suffix) => reference
            .strip_prefix(s)
            .is_some_and(|rest| rest == suffix),
        None => reference == s,
    }
}

/// Per-class resource counts, in the order layouts construct bind infos.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ResourceCounters {
    pub cbs: usize,
    pub tex_srvs: usize,
    pub tex_uavs: usize,
    pub buf_srvs: usize,
    pub buf_uavs: usize,
    pub samplers: usize,
}

impl ResourceCounters {
    pub fn get(&self, class: ResourceClass) -> usize {
        match class {
            ResourceClass::ConstantBuffer => self.cbs,
            ResourceClass::TextureSrv => self.tex_srvs,
            ResourceClass::TextureUav => self.tex_uavs,
            ResourceClass::BufferSrv => self.buf_srvs,
            ResourceClass::BufferUav => self.buf_uavs,
            ResourceClass::Sampler => self.samplers,
        }
    }

    fn get_mut(&mut self, class: ResourceClass) -> &mut usize {
        match class {
            ResourceClass::ConstantBuffer => &mut self.cbs,
            ResourceClass::TextureSrv => &mut self.tex_srvs,
            ResourceClass::TextureUav => &mut self.tex_uavs,
            ResourceClass::BufferSrv => &mut self.buf_srvs,
            ResourceClass::BufferUav => &mut self.buf_uavs,
            ResourceClass::Sampler => &mut self.samplers,
        }
    }

    pub fn total(&self) -> usize {
        self.cbs + self.tex_srvs + self.tex_uavs + self.buf_srvs + self.buf_uavs + self.samplers
    }
}

/// Reflected resources of one shader stage.
#[derive(Debug, Clone)]
pub struct ShaderResources {
    stage: ShaderStage,
    shader_name: String,
    target: ShaderTarget,
    combined_sampler_suffix: Option<String>,
    cbs: Vec<ResourceAttributes>,
    tex_srvs: Vec<ResourceAttributes>,
    tex_uavs: Vec<ResourceAttributes>,
    buf_srvs: Vec<ResourceAttributes>,
    buf_uavs: Vec<ResourceAttributes>,
    samplers: Vec<ResourceAttributes>,
    slot_counts: CacheSlotCounts,
}

/// Splits `name[3]` into `("name", 3)`.
fn split_array_element(name: &str) -> Option<(&str, u32)> {
    let open = name.find('[')?;
    let index = name[open + 1..].strip_suffix(']')?.parse().ok()?;
    Some((&name[..open], index))
}

impl ShaderResources {
    /// Reflects a DXBC shader blob.
    pub fn from_bytecode(
        bytecode: &[u8],
        shader_name: &str,
        combined_sampler_suffix: Option<&str>,
    ) -> Result<Self> {
        let file = DxbcFile::parse(bytecode)?;
        let rdef = file
            .get_rdef()
            .ok_or_else(|| EngineError::MissingResourceDefinition {
                shader: shader_name.to_owned(),
            })??;
        Self::from_rdef(&rdef, shader_name, combined_sampler_suffix)
    }

    pub fn from_rdef(
        rdef: &RdefChunk,
        shader_name: &str,
        combined_sampler_suffix: Option<&str>,
    ) -> Result<Self> {
        let program = rdef
            .target
            .program_type
            .ok_or_else(|| EngineError::UnknownProgramType {
                shader: shader_name.to_owned(),
            })?;

        let mut resources = Self {
            stage: ShaderStage::from_program_type(program),
            shader_name: shader_name.to_owned(),
            target: rdef.target,
            combined_sampler_suffix: combined_sampler_suffix.map(str::to_owned),
            cbs: Vec::new(),
            tex_srvs: Vec::new(),
            tex_uavs: Vec::new(),
            buf_srvs: Vec::new(),
            buf_uavs: Vec::new(),
            samplers: Vec::new(),
            slot_counts: CacheSlotCounts::default(),
        };

        // Texture SRVs are added after every sampler so that they can find the sampler they
        // are combined with.
        let mut pending_tex_srvs = Vec::new();
        for attribs in collapse_arrays(&rdef.bound_resources, shader_name)? {
            let limit = attribs.class.slot_limit();
            if attribs.end_slot() > limit {
                let last_slot = attribs.end_slot() - 1;
                return Err(EngineError::SlotLimitExceeded {
                    shader: shader_name.to_owned(),
                    name: attribs.name,
                    class: attribs.class,
                    last_slot,
                    limit,
                });
            }
            match attribs.class {
                ResourceClass::ConstantBuffer => resources.cbs.push(attribs),
                ResourceClass::TextureSrv => pending_tex_srvs.push(attribs),
                ResourceClass::TextureUav => resources.tex_uavs.push(attribs),
                ResourceClass::BufferSrv => resources.buf_srvs.push(attribs),
                ResourceClass::BufferUav => resources.buf_uavs.push(attribs),
                ResourceClass::Sampler => resources.samplers.push(attribs),
            }
        }

        for mut tex in pending_tex_srvs {
            let tex_index = resources.tex_srvs.len();
            if let Some(sampler_index) = resources.find_assigned_sampler(&tex)? {
                tex.combined_index = Some(sampler_index);
                resources.samplers[sampler_index].combined_index = Some(tex_index);
            }
            resources.tex_srvs.push(tex);
        }

        if resources.combined_sampler_suffix.is_some() {
            for sampler in resources.samplers.iter().filter(|s| s.combined_index.is_none()) {
                tracing::error!(
                    "Shader '{}' uses combined texture samplers, but sampler '{}' is not assigned to any texture",
                    resources.shader_name,
                    sampler.name
                );
            }
        }

        resources.slot_counts = resources.compute_slot_counts();
        Ok(resources)
    }

    fn find_assigned_sampler(&self, tex: &ResourceAttributes) -> Result<Option<usize>> {
        let Some(suffix) = self.combined_sampler_suffix.as_deref() else {
            return Ok(None);
        };
        let Some(index) = self
            .samplers
            .iter()
            .position(|sampler| streq_suffix(&sampler.name, &tex.name, Some(suffix)))
        else {
            return Ok(None);
        };

        let sampler = &self.samplers[index];
        if sampler.bind_count != tex.bind_count && sampler.bind_count != 1 {
            return Err(EngineError::CombinedSamplerMismatch {
                shader: self.shader_name.clone(),
                sampler: sampler.name.clone(),
                texture: tex.name.clone(),
                sampler_count: sampler.bind_count,
                texture_count: tex.bind_count,
            });
        }
        Ok(Some(index))
    }

    fn compute_slot_counts(&self) -> CacheSlotCounts {
        let end = |list: &[ResourceAttributes]| list.iter().map(ResourceAttributes::end_slot).max().unwrap_or(0);
        CacheSlotCounts {
            cbs: end(&self.cbs),
            srvs: end(&self.tex_srvs).max(end(&self.buf_srvs)),
            samplers: end(&self.samplers),
            uavs: end(&self.tex_uavs).max(end(&self.buf_uavs)),
        }
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn shader_name(&self) -> &str {
        &self.shader_name
    }

    pub fn target(&self) -> ShaderTarget {
        self.target
    }

    pub fn combined_sampler_suffix(&self) -> Option<&str> {
        self.combined_sampler_suffix.as_deref()
    }

    pub fn is_using_combined_samplers(&self) -> bool {
        self.combined_sampler_suffix.is_some()
    }

    pub fn resources(&self, class: ResourceClass) -> &[ResourceAttributes] {
        match class {
            ResourceClass::ConstantBuffer => &self.cbs,
            ResourceClass::TextureSrv => &self.tex_srvs,
            ResourceClass::TextureUav => &self.tex_uavs,
            ResourceClass::BufferSrv => &self.buf_srvs,
            ResourceClass::BufferUav => &self.buf_uavs,
            ResourceClass::Sampler => &self.samplers,
        }
    }

    pub fn constant_buffers(&self) -> &[ResourceAttributes] {
        &self.cbs
    }

    pub fn texture_srvs(&self) -> &[ResourceAttributes] {
        &self.tex_srvs
    }

    pub fn texture_uavs(&self) -> &[ResourceAttributes] {
        &self.tex_uavs
    }

    pub fn buffer_srvs(&self) -> &[ResourceAttributes] {
        &self.buf_srvs
    }

    pub fn buffer_uavs(&self) -> &[ResourceAttributes] {
        &self.buf_uavs
    }

    pub fn samplers(&self) -> &[ResourceAttributes] {
        &self.samplers
    }

    pub fn counters(&self) -> ResourceCounters {
        ResourceCounters {
            cbs: self.cbs.len(),
            tex_srvs: self.tex_srvs.len(),
            tex_uavs: self.tex_uavs.len(),
            buf_srvs: self.buf_srvs.len(),
            buf_uavs: self.buf_uavs.len(),
            samplers: self.samplers.len(),
        }
    }

    pub fn total_resources(&self) -> usize {
        self.counters().total()
    }

    /// Cache slots this stage needs per class: `max(bind point + bind count)`.
    pub fn cache_slot_counts(&self) -> CacheSlotCounts {
        self.slot_counts
    }

    /// Iterates every resource with its class, in bind-info construction order.
    pub fn iter(&self) -> impl Iterator<Item = &ResourceAttributes> {
        self.cbs
            .iter()
            .chain(&self.samplers)
            .chain(&self.tex_srvs)
            .chain(&self.tex_uavs)
            .chain(&self.buf_srvs)
            .chain(&self.buf_uavs)
    }

    pub fn is_compatible_with(&self, other: &ShaderResources) -> bool {
        if self.counters() != other.counters() {
            return false;
        }
        ResourceClass::ALL.into_iter().all(|class| {
            self.resources(class)
                .iter()
                .zip(other.resources(class))
                .all(|(a, b)| a.is_compatible_with(b))
        })
    }

    pub fn hash(&self) -> u64 {
        let counters = self.counters();
        let mut seed = 0;
        for class in ResourceClass::ALL {
            hash_combine(&mut seed, counters.get(class) as u64);
        }
        for class in ResourceClass::ALL {
            for attribs in self.resources(class) {
                hash_combine(&mut seed, attribs.hash());
            }
        }
        seed
    }

    /// Mutability class of a resource under `layout`.
    ///
    /// Samplers are looked up through the texture they are combined with: with a suffix in use,
    /// a sampler named `tex_sampler` takes the type of variable `tex`.
    pub fn find_variable_type(
        &self,
        attribs: &ResourceAttributes,
        layout: &PipelineResourceLayoutDesc,
    ) -> ShaderVariableType {
        let suffix = match attribs.class {
            ResourceClass::Sampler => self.combined_sampler_suffix(),
            _ => None,
        };
        layout
            .variables
            .iter()
            .find(|var| {
                var.stages.contains_stage(self.stage) && streq_suffix(&attribs.name, &var.name, suffix)
            })
            .map_or(layout.default_variable_type, |var| var.var_type)
    }

    /// Index into `layout.immutable_samplers` of the immutable sampler that applies to
    /// `sampler`, if any.
    pub fn find_immutable_sampler(
        &self,
        sampler: &ResourceAttributes,
        layout: &PipelineResourceLayoutDesc,
        log_array_error: bool,
    ) -> Option<usize> {
        debug_assert_eq!(sampler.class, ResourceClass::Sampler);
        let index = find_immutable_sampler_desc(
            &layout.immutable_samplers,
            self.stage,
            &sampler.name,
            self.combined_sampler_suffix(),
        )?;

        if sampler.bind_count > 1 && self.target.is_sm51_or_later() {
            if log_array_error {
                tracing::error!(
                    "Immutable sampler '{}[{}]' will be ignored because static sampler arrays are not allowed in shader model 5.1 and above. Compile the shader using shader model 5.0 or use non-array sampler variable.",
                    sampler.name,
                    sampler.bind_count
                );
            }
            return None;
        }
        Some(index)
    }

    /// Counts resources whose variable type is in `allowed`. Immutable samplers are skipped
    /// unless `count_immutable_samplers` is set.
    pub fn count_resources(
        &self,
        layout: &PipelineResourceLayoutDesc,
        allowed: ShaderVariableTypes,
        count_immutable_samplers: bool,
    ) -> ResourceCounters {
        let mut counters = ResourceCounters::default();
        for attribs in self.iter() {
            if !allowed.contains_type(self.find_variable_type(attribs, layout)) {
                continue;
            }
            if attribs.class == ResourceClass::Sampler
                && !count_immutable_samplers
                && self.find_immutable_sampler(attribs, layout, false).is_some()
            {
                continue;
            }
            *counters.get_mut(attribs.class) += 1;
        }
        counters
    }

    /// Warns about layout variables and immutable samplers that match no resource in any of
    /// their designated stages.
    #[cfg(feature = "development")]
    pub fn dvp_verify_resource_layout(
        layout: &PipelineResourceLayoutDesc,
        shaders: &[&ShaderResources],
        verify_variables: bool,
        verify_immutable_samplers: bool,
    ) {
        let allowed_shaders = |stages: ShaderStages| -> String {
            stages
                .stages()
                .map(|stage| match shaders.iter().find(|res| res.stage == stage) {
                    Some(res) => format!("{stage} ('{}')", res.shader_name),
                    None => format!("{stage} (Not enabled in PSO)"),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };

        if verify_variables {
            for var in &layout.variables {
                if var.stages.is_empty() {
                    tracing::warn!(
                        "No allowed shader stages are specified for {} variable '{}'.",
                        var.var_type,
                        var.name
                    );
                    continue;
                }
                let found = shaders
                    .iter()
                    .filter(|res| var.stages.contains_stage(res.stage))
                    .any(|res| {
                        // Combined samplers are not independent variables.
                        res.iter()
                            .filter(|attribs| {
                                !(res.is_using_combined_samplers() && attribs.class == ResourceClass::Sampler)
                            })
                            .any(|attribs| attribs.name == var.name)
                    });
                if !found {
                    tracing::warn!(
                        "{} variable '{}' is not found in any of the designated shader stages: {}",
                        var.var_type,
                        var.name,
                        allowed_shaders(var.stages)
                    );
                }
            }
        }

        if verify_immutable_samplers {
            for desc in &layout.immutable_samplers {
                if desc.stages.is_empty() {
                    tracing::warn!(
                        "No allowed shader stages are specified for immutable sampler '{}'.",
                        desc.sampler_or_texture_name
                    );
                    continue;
                }
                let found = shaders
                    .iter()
                    .filter(|res| desc.stages.contains_stage(res.stage))
                    .any(|res| {
                        res.samplers.iter().any(|sampler| {
                            streq_suffix(
                                &sampler.name,
                                &desc.sampler_or_texture_name,
                                res.combined_sampler_suffix(),
                            )
                        })
                    });
                if !found {
                    tracing::warn!(
                        "Immutable sampler '{}' is not found in any of the designated shader stages: {}",
                        desc.sampler_or_texture_name,
                        allowed_shaders(desc.stages)
                    );
                }
            }
        }
    }

    /// Compares what the device context committed for this stage against `cache`.
    ///
    /// Returns `true` if no mismatch was found.
    #[cfg(feature = "development")]
    pub fn dvp_verify_committed_resources(
        &self,
        committed: &CommittedStageView<'_>,
        cache: &ShaderResourceCache,
    ) -> bool {
        let shader = &self.shader_name;
        let mut ok = true;
        let committed_at = |table: &[Option<NativeHandle>], slot: u32| table.get(slot as usize).copied().flatten();

        for cb in &self.cbs {
            for slot in cb.bind_point..cb.end_slot() {
                let name = cb.print_name(slot - cb.bind_point);
                if slot >= cache.cb_count() {
                    tracing::error!("Unable to find constant buffer '{name}' (slot {slot}) in the resource cache: the cache reserves {} CB slots only. This should never happen and may be the result of using wrong resource cache.", cache.cb_count());
                    ok = false;
                    continue;
                }
                let Some(buffer) = cache.cb(slot).buffer() else {
                    tracing::error!("Constant buffer '{name}' (slot {slot}) is not initialized in the resource cache.");
                    ok = false;
                    continue;
                };
                if !buffer.desc().bind_flags.contains(BindFlags::UNIFORM_BUFFER) {
                    tracing::error!("Buffer '{}' committed in the device context as constant buffer to variable '{name}' (slot {slot}) in shader '{shader}' was not created with BIND_UNIFORM_BUFFER flag", buffer.name());
                    ok = false;
                    continue;
                }
                match committed_at(committed.cbs, slot) {
                    None => {
                        tracing::error!("No D3D11 resource committed to constant buffer '{name}' (slot {slot}) in shader '{shader}'");
                        ok = false;
                    }
                    Some(handle) if handle != buffer.native_handle() => {
                        tracing::error!("D3D11 resource committed to constant buffer '{name}' (slot {slot}) in shader '{shader}' does not match the resource in the resource cache");
                        ok = false;
                    }
                    Some(_) => {}
                }
            }
        }

        for sam in &self.samplers {
            for slot in sam.bind_point..sam.end_slot() {
                let name = sam.print_name(slot - sam.bind_point);
                if slot >= cache.sampler_count() {
                    tracing::error!("Unable to find sampler '{name}' (slot {slot}) in the resource cache: the cache reserves {} Sampler slots only. This should never happen and may be the result of using wrong resource cache.", cache.sampler_count());
                    ok = false;
                    continue;
                }
                let Some(sampler) = cache.sampler(slot).sampler() else {
                    tracing::error!("Sampler '{name}' (slot {slot}) is not initialized in the resource cache.");
                    ok = false;
                    continue;
                };
                match committed_at(committed.samplers, slot) {
                    None => {
                        tracing::error!("No D3D11 sampler committed to variable '{name}' (slot {slot}) in shader '{shader}'");
                        ok = false;
                    }
                    Some(handle) if handle != sampler.native_handle() => {
                        tracing::error!("D3D11 sampler committed to variable '{name}' (slot {slot}) in shader '{shader}' does not match the resource in the resource cache");
                        ok = false;
                    }
                    Some(_) => {}
                }
            }
        }

        let views = [
            (&self.tex_srvs, true, false),
            (&self.buf_srvs, false, false),
            (&self.tex_uavs, true, true),
            (&self.buf_uavs, false, true),
        ];
        for (list, is_texture, is_uav) in views {
            let (kind, count, view_table, resource_table, flag, flag_name) = if is_uav {
                ("UAV", cache.uav_count(), committed.uavs, committed.uav_resources, BindFlags::UNORDERED_ACCESS, "BIND_UNORDERED_ACCESS")
            } else {
                ("SRV", cache.srv_count(), committed.srvs, committed.srv_resources, BindFlags::SHADER_RESOURCE, "BIND_SHADER_RESOURCE")
            };
            let (object, expected, unexpected) = if is_texture {
                ("texture", "Texture", "buffer")
            } else {
                ("buffer", "Buffer", "texture")
            };

            for attribs in list.iter() {
                for slot in attribs.bind_point..attribs.end_slot() {
                    let name = attribs.print_name(slot - attribs.bind_point);
                    if slot >= count {
                        tracing::error!("Unable to find {object} {kind} '{name}' (slot {slot}) in the resource cache: the cache reserves {count} {kind} slots only. This should never happen and may be the result of using wrong resource cache.");
                        ok = false;
                        continue;
                    }
                    let cached = if is_uav { cache.uav(slot) } else { cache.srv(slot) };
                    let bound_as_other = if is_texture {
                        cached.buffer().is_some()
                    } else {
                        cached.texture().is_some()
                    };
                    if bound_as_other {
                        tracing::error!("Unexpected {unexpected} bound to variable '{name}' (slot {slot}). {expected} is expected.");
                        ok = false;
                        continue;
                    }
                    let Some((resource_name, bind_flags, view, resource)) = cached.describe() else {
                        tracing::error!("{expected} '{name}' (slot {slot}) is not initialized in the resource cache.");
                        ok = false;
                        continue;
                    };
                    if !bind_flags.contains(flag) {
                        tracing::error!("{expected} '{resource_name}' committed in the device context as {kind} to variable '{name}' (slot {slot}) in shader '{shader}' was not created with {flag_name} flag");
                        ok = false;
                        continue;
                    }
                    let committed_view = committed_at(view_table, slot);
                    let committed_resource = committed_at(resource_table, slot);
                    if committed_view.is_none() {
                        tracing::error!("No D3D11 resource committed to {object} {kind} '{name}' (slot {slot}) in shader '{shader}'");
                        ok = false;
                    } else if committed_view != Some(view) || committed_resource != Some(resource) {
                        tracing::error!("D3D11 resource committed to {object} {kind} '{name}' (slot {slot}) in shader '{shader}' does not match the resource in the resource cache");
                        ok = false;
                    }
                }
            }
        }

        ok
    }
}

/// Tables the device context committed for one stage, handed to
/// [`ShaderResources::dvp_verify_committed_resources`].
#[cfg(feature = "development")]
#[derive(Debug, Clone, Copy)]
pub struct CommittedStageView<'a> {
    pub cbs: &'a [Option<NativeHandle>],
    pub srvs: &'a [Option<NativeHandle>],
    pub srv_resources: &'a [Option<NativeHandle>],
    pub samplers: &'a [Option<NativeHandle>],
    pub uavs: &'a [Option<NativeHandle>],
    pub uav_resources: &'a [Option<NativeHandle>],
}

pub(crate) fn find_immutable_sampler_desc(
    descs: &[ImmutableSamplerDesc],
    stage: ShaderStage,
    resource_name: &str,
    suffix: Option<&str>,
) -> Option<usize> {
    descs.iter().position(|desc| {
        desc.stages.contains_stage(stage)
            && streq_suffix(resource_name, &desc.sampler_or_texture_name, suffix)
    })
}

/// Folds SM5.0 per-element array entries (`tex[0]`, `tex[1]`, ...) into one resource each.
///
/// Elements of one array are enumerated back to back; unused elements may be missing, so the
/// bind count is the largest index seen plus one.
fn collapse_arrays(bindings: &[RdefResourceBinding], shader: &str) -> Result<Vec<ResourceAttributes>> {
    let mut out = Vec::with_capacity(bindings.len());
    let mut i = 0;
    while i < bindings.len() {
        let first = &bindings[i];
        let class = ResourceClass::from_binding(first, shader)?;
        let input_type = first
            .shader_input_type()
            .ok_or_else(|| EngineError::UnsupportedResourceType {
                shader: shader.to_owned(),
                name: first.name.clone(),
                input_type: first.input_type,
            })?;

        let mut name = first.name.as_str();
        let mut bind_count = first.bind_count;
        i += 1;

        if let Some((base, _)) = split_array_element(&first.name) {
            name = base;
            while let Some(next) = bindings.get(i) {
                let Some((next_base, index)) = split_array_element(&next.name) else {
                    break;
                };
                if next_base != base {
                    break;
                }
                let expected = first.bind_point + index;
                if next.bind_point != expected {
                    return Err(EngineError::NonContiguousArray {
                        shader: shader.to_owned(),
                        name: next.name.clone(),
                        expected,
                        actual: next.bind_point,
                    });
                }
                bind_count = bind_count.max(index + 1);
                i += 1;
            }
        }

        out.push(ResourceAttributes {
            name: name.to_owned(),
            bind_point: first.bind_point,
            bind_count,
            class,
            input_type,
            srv_dimension: first.dimension,
            combined_index: None,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use strata_dxbc::test_utils::RdefBuilder;
    use strata_dxbc::{parse_rdef_chunk, ProgramType};

    use super::*;
    use crate::layout_desc::ShaderVariableDesc;
    use crate::resources::SamplerDesc;

    fn reflect(builder: RdefBuilder, suffix: Option<&str>) -> Result<ShaderResources> {
        ShaderResources::from_bytecode(&builder.build_dxbc(), "test", suffix)
    }

    #[test]
    fn classifies_resources() {
        let res = reflect(
            RdefBuilder::new(ProgramType::Compute)
                .constant_buffer("cb", 2)
                .texture("tex", 0, 1)
                .buffer("typed", 1)
                .structured_buffer("structured", 2)
                .rw_texture("out_tex", 0)
                .rw_structured_buffer("out_buf", 1)
                .sampler("sam", 3, 1),
            None,
        )
        .unwrap();

        assert_eq!(res.stage(), ShaderStage::Compute);
        let counters = res.counters();
        assert_eq!(
            counters,
            ResourceCounters {
                cbs: 1,
                tex_srvs: 1,
                tex_uavs: 1,
                buf_srvs: 2,
                buf_uavs: 1,
                samplers: 1,
            }
        );
        assert_eq!(
            res.cache_slot_counts(),
            CacheSlotCounts {
                cbs: 3,
                srvs: 3,
                samplers: 4,
                uavs: 2,
            }
        );
    }

    #[test]
    fn collapses_array_elements() {
        let res = reflect(
            RdefBuilder::new(ProgramType::Pixel)
                .shader_model(5, 0)
                .texture_array_elements("diffuse", 4, 3)
                .texture("diffuse2", 8, 1),
            None,
        )
        .unwrap();

        let tex = res.texture_srvs();
        assert_eq!(tex.len(), 2);
        assert_eq!(tex[0].name(), "diffuse");
        assert_eq!((tex[0].bind_point(), tex[0].bind_count()), (4, 3));
        assert_eq!(tex[0].print_name(2), "diffuse[2]");
        assert_eq!(tex[1].print_name(0), "diffuse2");
    }

    #[test]
    fn non_contiguous_array_is_rejected() {
        let builder = RdefBuilder::new(ProgramType::Pixel)
            .resource("tex[0]", ShaderInputType::Texture as u32, 4, 0, 1)
            .resource("tex[1]", ShaderInputType::Texture as u32, 4, 5, 1);
        let err = reflect(builder, None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::NonContiguousArray { expected: 1, actual: 5, .. }
        ));
    }

    #[test]
    fn unsupported_types_are_rejected() {
        let builder = RdefBuilder::new(ProgramType::Compute).resource(
            "append",
            ShaderInputType::UavAppendStructured as u32,
            1,
            0,
            1,
        );
        assert!(matches!(
            reflect(builder, None),
            Err(EngineError::UnsupportedResourceType { .. })
        ));
    }

    #[test]
    fn slot_limits_are_enforced() {
        let builder = RdefBuilder::new(ProgramType::Pixel).constant_buffer("cb", 14);
        assert!(matches!(
            reflect(builder, None),
            Err(EngineError::SlotLimitExceeded {
                class: ResourceClass::ConstantBuffer,
                last_slot: 14,
                ..
            })
        ));
    }

    #[test]
    fn missing_rdef_is_an_error() {
        let blob = strata_dxbc::test_utils::build_container(&[]);
        assert!(matches!(
            ShaderResources::from_bytecode(&blob, "empty", None),
            Err(EngineError::MissingResourceDefinition { .. })
        ));
    }

    #[test]
    fn combines_textures_with_suffixed_samplers() {
        let res = reflect(
            RdefBuilder::new(ProgramType::Pixel)
                .sampler("tex_sampler", 1, 1)
                .texture("tex", 0, 4)
                .sampler("loose", 0, 1),
            Some("_sampler"),
        )
        .unwrap();

        let tex = &res.texture_srvs()[0];
        let sampler_index = tex.combined_sampler_index().unwrap();
        assert_eq!(res.samplers()[sampler_index].name(), "tex_sampler");
        assert_eq!(res.samplers()[sampler_index].assigned_texture_index(), Some(0));
        assert_eq!(res.samplers()[1].assigned_texture_index(), None);
    }

    #[test]
    fn combined_sampler_count_must_match() {
        let builder = RdefBuilder::new(ProgramType::Pixel)
            .sampler("tex_sampler", 0, 2)
            .texture("tex", 0, 4);
        assert!(matches!(
            reflect(builder, Some("_sampler")),
            Err(EngineError::CombinedSamplerMismatch {
                sampler_count: 2,
                texture_count: 4,
                ..
            })
        ));
    }

    #[test]
    fn compatibility_ignores_names() {
        let a = reflect(
            RdefBuilder::new(ProgramType::Vertex).constant_buffer("a", 0).texture("t", 1, 1),
            None,
        )
        .unwrap();
        let b = reflect(
            RdefBuilder::new(ProgramType::Vertex).constant_buffer("b", 0).texture("u", 1, 1),
            None,
        )
        .unwrap();
        let c = reflect(
            RdefBuilder::new(ProgramType::Vertex).constant_buffer("a", 1).texture("t", 1, 1),
            None,
        )
        .unwrap();

        assert!(a.is_compatible_with(&b));
        assert_eq!(a.hash(), b.hash());
        assert!(!a.is_compatible_with(&c));
        assert_ne!(a.hash(), c.hash());
    }

    #[test]
    fn variable_types_follow_layout() {
        let res = reflect(
            RdefBuilder::new(ProgramType::Pixel)
                .sampler("tex_sampler", 0, 1)
                .texture("tex", 0, 1)
                .constant_buffer("cb", 0),
            Some("_sampler"),
        )
        .unwrap();
        let layout = PipelineResourceLayoutDesc {
            default_variable_type: ShaderVariableType::Static,
            variables: vec![
                ShaderVariableDesc::new(ShaderStages::PIXEL, "tex", ShaderVariableType::Dynamic),
                ShaderVariableDesc::new(ShaderStages::VERTEX, "cb", ShaderVariableType::Mutable),
            ],
            immutable_samplers: vec![],
        };

        assert_eq!(
            res.find_variable_type(&res.texture_srvs()[0], &layout),
            ShaderVariableType::Dynamic
        );
        // The sampler inherits the type of its texture.
        assert_eq!(
            res.find_variable_type(&res.samplers()[0], &layout),
            ShaderVariableType::Dynamic
        );
        // Wrong stage falls back to the default.
        assert_eq!(
            res.find_variable_type(&res.constant_buffers()[0], &layout),
            ShaderVariableType::Static
        );

        let counted = res.count_resources(&layout, ShaderVariableTypes::DYNAMIC, true);
        assert_eq!((counted.tex_srvs, counted.samplers, counted.cbs), (1, 1, 0));
    }

    #[test]
    fn immutable_sampler_arrays_are_ignored_from_sm51() {
        let layout = PipelineResourceLayoutDesc {
            immutable_samplers: vec![ImmutableSamplerDesc::new(
                ShaderStages::PIXEL,
                "sam",
                SamplerDesc::default(),
            )],
            ..Default::default()
        };

        let sm50 = reflect(RdefBuilder::new(ProgramType::Pixel).shader_model(5, 0).sampler("sam", 0, 2), None).unwrap();
        assert_eq!(sm50.find_immutable_sampler(&sm50.samplers()[0], &layout, false), Some(0));
        let counted = sm50.count_resources(&layout, ShaderVariableTypes::all(), false);
        assert_eq!(counted.samplers, 0);

        let sm51 = ShaderResources::from_rdef(
            &parse_rdef_chunk(
                &RdefBuilder::new(ProgramType::Pixel)
                    .shader_model(5, 1)
                    .sampler("sam", 0, 2)
                    .build_chunk(),
            )
            .unwrap(),
            "sm51",
            None,
        )
        .unwrap();
        assert_eq!(sm51.find_immutable_sampler(&sm51.samplers()[0], &layout, false), None);
    }

    #[test]
    fn suffix_matching() {
        assert!(streq_suffix("tex_sampler", "tex", Some("_sampler")));
        assert!(!streq_suffix("tex", "tex", Some("_sampler")));
        assert!(streq_suffix("tex", "tex", None));
        assert!(!streq_suffix("tex_sampler", "tex", None));
    }
}
