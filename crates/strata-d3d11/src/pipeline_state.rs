//! Pipeline state: the active shaders, their static resources and immutable samplers.

use std::fmt;
use std::sync::Arc;

use crate::allocator::ResourceCacheAllocator;
use crate::device::RenderDevice;
use crate::error::{EngineError, Result};
use crate::layout_desc::{BindShaderResourcesFlags, PipelineResourceLayoutDesc, ShaderVariableTypes};
use crate::resource_cache::ShaderResourceCache;
use crate::resource_layout::{ShaderResourceLayout, ShaderVariable};
use crate::resource_mapping::ResourceMapping;
use crate::resources::Sampler;
use crate::shader::Shader;
use crate::shader_resource_binding::ShaderResourceBinding;
use crate::shader_resources::hash_combine;
use crate::stage::{ShaderStage, ShaderStages};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineType {
    Graphics,
    Compute,
}

impl PipelineType {
    pub fn literal_name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
        }
    }

    /// Whether `stage` can be part of a pipeline of this type.
    pub fn allows(self, stage: ShaderStage) -> bool {
        (stage == ShaderStage::Compute) == (self == Self::Compute)
    }
}

impl fmt::Display for PipelineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal_name())
    }
}

#[derive(Debug, Clone, Default)]
pub struct GraphicsPipelineDesc {
    pub name: String,
    pub resource_layout: PipelineResourceLayoutDesc,
    pub vertex_shader: Option<Arc<Shader>>,
    pub pixel_shader: Option<Arc<Shader>>,
    pub geometry_shader: Option<Arc<Shader>>,
    pub hull_shader: Option<Arc<Shader>>,
    pub domain_shader: Option<Arc<Shader>>,
    /// Per-slot vertex buffer strides of the input layout. Empty means no input layout.
    pub vertex_strides: Vec<u32>,
    /// Do not warn about layout variables that match no shader resource.
    pub ignore_missing_variables: bool,
    /// Do not warn about immutable samplers that match no shader resource.
    pub ignore_missing_immutable_samplers: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ComputePipelineDesc {
    pub name: String,
    pub resource_layout: PipelineResourceLayoutDesc,
    pub compute_shader: Option<Arc<Shader>>,
    pub ignore_missing_variables: bool,
    pub ignore_missing_immutable_samplers: bool,
}

/// Immutable sampler written into every cache of one stage.
#[derive(Debug)]
struct ImmutableSampler {
    bind_point: u32,
    bind_count: u32,
    sampler: Arc<Sampler>,
}

/// Per-stage static state. The cache holds static bindings and immutable samplers.
#[derive(Debug)]
struct StaticStage {
    shader: Arc<Shader>,
    layout: ShaderResourceLayout,
    cache: ShaderResourceCache,
    immutable_samplers: Vec<ImmutableSampler>,
}

impl Drop for StaticStage {
    fn drop(&mut self) {
        self.cache.destroy();
    }
}

#[derive(Debug)]
pub struct PipelineState {
    name: String,
    pipeline_type: PipelineType,
    resource_layout: PipelineResourceLayoutDesc,
    stages: Vec<StaticStage>,
    /// Position in `stages` per [`ShaderStage::index`].
    stage_index: [Option<usize>; ShaderStage::COUNT],
    vertex_strides: Vec<u32>,
    resource_layout_hash: u64,
    allocator: Arc<ResourceCacheAllocator>,
}

impl PipelineState {
    pub(crate) fn new_graphics(device: &RenderDevice, desc: GraphicsPipelineDesc) -> Result<Self> {
        let vertex_shader = desc
            .vertex_shader
            .ok_or(EngineError::MissingShader(ShaderStage::Vertex))?;
        let shaders = [
            (ShaderStage::Vertex, Some(vertex_shader)),
            (ShaderStage::Hull, desc.hull_shader),
            (ShaderStage::Domain, desc.domain_shader),
            (ShaderStage::Geometry, desc.geometry_shader),
            (ShaderStage::Pixel, desc.pixel_shader),
        ];
        let mut active = Vec::with_capacity(shaders.len());
        for (expected, shader) in shaders {
            let Some(shader) = shader else { continue };
            if shader.stage() != expected {
                return Err(EngineError::StageMismatch {
                    expected,
                    actual: shader.stage(),
                });
            }
            active.push(shader);
        }

        Self::new(
            device,
            desc.name,
            PipelineType::Graphics,
            desc.resource_layout,
            active,
            desc.vertex_strides,
            !desc.ignore_missing_variables,
            !desc.ignore_missing_immutable_samplers,
        )
    }

    pub(crate) fn new_compute(device: &RenderDevice, desc: ComputePipelineDesc) -> Result<Self> {
        let shader = desc
            .compute_shader
            .ok_or(EngineError::MissingShader(ShaderStage::Compute))?;
        if shader.stage() != ShaderStage::Compute {
            return Err(EngineError::StageMismatch {
                expected: ShaderStage::Compute,
                actual: shader.stage(),
            });
        }

        Self::new(
            device,
            desc.name,
            PipelineType::Compute,
            desc.resource_layout,
            vec![shader],
            Vec::new(),
            !desc.ignore_missing_variables,
            !desc.ignore_missing_immutable_samplers,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn new(
        device: &RenderDevice,
        name: String,
        pipeline_type: PipelineType,
        resource_layout: PipelineResourceLayoutDesc,
        shaders: Vec<Arc<Shader>>,
        vertex_strides: Vec<u32>,
        verify_variables: bool,
        verify_immutable_samplers: bool,
    ) -> Result<Self> {
        #[cfg(feature = "development")]
        {
            use crate::shader_resources::ShaderResources;

            let resources: Vec<&ShaderResources> = shaders.iter().map(|s| &**s.resources()).collect();
            ShaderResources::dvp_verify_resource_layout(
                &resource_layout,
                &resources,
                verify_variables,
                verify_immutable_samplers,
            );
        }
        #[cfg(not(feature = "development"))]
        let _ = (verify_variables, verify_immutable_samplers);

        let allocator = Arc::clone(device.allocator());
        // One sampler object per immutable sampler description, shared by every stage.
        let mut created: Vec<Option<Arc<Sampler>>> = vec![None; resource_layout.immutable_samplers.len()];
        let mut stage_index = [None; ShaderStage::COUNT];
        let mut stages = Vec::with_capacity(shaders.len());

        for shader in shaders {
            let resources = Arc::clone(shader.resources());

            let mut immutable_samplers = Vec::new();
            for attribs in resources.samplers() {
                let Some(desc_index) = resources.find_immutable_sampler(attribs, &resource_layout, true) else {
                    continue;
                };
                let sampler = created[desc_index]
                    .get_or_insert_with(|| {
                        device.create_sampler(resource_layout.immutable_samplers[desc_index].desc.clone())
                    })
                    .clone();
                immutable_samplers.push(ImmutableSampler {
                    bind_point: attribs.bind_point(),
                    bind_count: attribs.bind_count(),
                    sampler,
                });
            }

            let mut cache = ShaderResourceCache::new();
            let layout = match ShaderResourceLayout::new(
                resources,
                &resource_layout,
                ShaderVariableTypes::STATIC,
                &mut cache,
                &allocator,
            ) {
                Ok(layout) => layout,
                Err(err) => {
                    cache.destroy();
                    return Err(err);
                }
            };

            stage_index[shader.stage().index()] = Some(stages.len());
            let mut stage = StaticStage {
                shader,
                layout,
                cache,
                immutable_samplers,
            };
            Self::write_immutable_samplers(&stage.immutable_samplers, &mut stage.cache);
            stages.push(stage);
        }

        let resource_layout_hash = Self::compute_hash(pipeline_type, &stages, &stage_index);
        tracing::debug!(
            pso = %name,
            pipeline_type = %pipeline_type,
            stages = stages.len(),
            "created pipeline state"
        );

        Ok(Self {
            name,
            pipeline_type,
            resource_layout,
            stages,
            stage_index,
            vertex_strides,
            resource_layout_hash,
            allocator,
        })
    }

    fn compute_hash(
        pipeline_type: PipelineType,
        stages: &[StaticStage],
        stage_index: &[Option<usize>; ShaderStage::COUNT],
    ) -> u64 {
        let order: &[ShaderStage] = match pipeline_type {
            PipelineType::Compute => &[ShaderStage::Compute],
            PipelineType::Graphics => &[
                ShaderStage::Vertex,
                ShaderStage::Pixel,
                ShaderStage::Geometry,
                ShaderStage::Domain,
                ShaderStage::Hull,
            ],
        };
        let mut hash = 0;
        for stage in order {
            if let Some(i) = stage_index[stage.index()] {
                hash_combine(&mut hash, stages[i].shader.resources().hash());
            }
        }
        hash
    }

    /// Writes immutable samplers into `cache`, clipped to its sampler table.
    fn write_immutable_samplers(samplers: &[ImmutableSampler], cache: &mut ShaderResourceCache) {
        for immutable in samplers {
            let end = (immutable.bind_point + immutable.bind_count).min(cache.sampler_count());
            for slot in immutable.bind_point..end {
                cache.set_sampler(slot, Some(Arc::clone(&immutable.sampler)));
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pipeline_type(&self) -> PipelineType {
        self.pipeline_type
    }

    pub fn resource_layout(&self) -> &PipelineResourceLayoutDesc {
        &self.resource_layout
    }

    /// Hash of the resources of every active shader. Binding objects of pipelines with equal
    /// hashes are interchangeable.
    pub fn resource_layout_hash(&self) -> u64 {
        self.resource_layout_hash
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Stage of the `i`-th active shader.
    pub fn active_stage(&self, i: usize) -> ShaderStage {
        self.stages[i].shader.stage()
    }

    pub fn active_stages(&self) -> impl Iterator<Item = ShaderStage> + '_ {
        self.stages.iter().map(|stage| stage.shader.stage())
    }

    pub fn shader(&self, stage: ShaderStage) -> Option<&Arc<Shader>> {
        let i = self.stage_index[stage.index()]?;
        Some(&self.stages[i].shader)
    }

    pub(crate) fn stage_position(&self, stage: ShaderStage) -> Option<usize> {
        self.stage_index[stage.index()]
    }

    pub fn has_input_layout(&self) -> bool {
        !self.vertex_strides.is_empty()
    }

    /// Stride of vertex buffer `slot` from the input layout; 0 for slots it does not declare.
    pub fn buffer_stride(&self, slot: u32) -> u32 {
        self.vertex_strides.get(slot as usize).copied().unwrap_or(0)
    }

    pub(crate) fn allocator(&self) -> &Arc<ResourceCacheAllocator> {
        &self.allocator
    }

    /// True if any active stage has static variables.
    pub fn has_static_resources(&self) -> bool {
        self.stages.iter().any(|stage| stage.layout.counters().total() > 0)
    }

    /// True if any active shader declares resources at all.
    pub fn has_shader_resources(&self) -> bool {
        self.stages
            .iter()
            .any(|stage| stage.shader.resources().total_resources() > 0)
    }

    pub(crate) fn static_layout(&self, i: usize) -> &ShaderResourceLayout {
        &self.stages[i].layout
    }

    pub(crate) fn static_cache(&self, i: usize) -> &ShaderResourceCache {
        &self.stages[i].cache
    }

    /// Writes the immutable samplers of active stage `i` into a binding object's cache.
    pub(crate) fn set_immutable_samplers(&self, cache: &mut ShaderResourceCache, i: usize) {
        Self::write_immutable_samplers(&self.stages[i].immutable_samplers, cache);
    }

    /// Two pipelines are compatible when binding objects of one can be committed with the
    /// other: the same stages with compatible resources in each.
    pub fn is_compatible_with(&self, other: &PipelineState) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.resource_layout_hash != other.resource_layout_hash
            || self.stages.len() != other.stages.len()
        {
            return false;
        }
        self.stages.iter().zip(&other.stages).all(|(a, b)| {
            a.shader.stage() == b.shader.stage()
                && a.shader.resources().is_compatible_with(b.shader.resources())
        })
    }

    /// Binds static variables of `stages` from `mapping`.
    pub fn bind_static_resources(
        &mut self,
        stages: ShaderStages,
        mapping: &ResourceMapping,
        flags: BindShaderResourcesFlags,
    ) {
        for stage in &mut self.stages {
            if stages.contains_stage(stage.shader.stage()) {
                stage.layout.bind_resources(mapping, flags, &mut stage.cache);
            }
        }
    }

    /// Position of `stage` among active stages; logs a warning if the stage is invalid for this
    /// pipeline type or inactive.
    fn static_stage(&self, stage: ShaderStage, what: fmt::Arguments<'_>) -> Option<usize> {
        if !self.pipeline_type.allows(stage) {
            tracing::warn!(
                "Unable to {} in shader stage {} as the stage is invalid for {} pipeline '{}'",
                what,
                stage,
                self.pipeline_type,
                self.name
            );
            return None;
        }
        let index = self.stage_index[stage.index()];
        if index.is_none() {
            tracing::warn!(
                "Unable to {} in shader stage {} as the stage is inactive in PSO '{}'",
                what,
                stage,
                self.name
            );
        }
        index
    }

    pub fn static_variable_count(&self, stage: ShaderStage) -> usize {
        self.static_stage(stage, format_args!("get the number of static variables"))
            .map_or(0, |i| self.stages[i].layout.variable_count())
    }

    pub fn static_variable_by_name(&mut self, stage: ShaderStage, name: &str) -> Option<ShaderVariable<'_>> {
        let i = self.static_stage(stage, format_args!("find static variable '{name}'"))?;
        let stage = &mut self.stages[i];
        stage.layout.variable_by_name(&mut stage.cache, name)
    }

    pub fn static_variable_by_index(&mut self, stage: ShaderStage, index: usize) -> Option<ShaderVariable<'_>> {
        let i = self.static_stage(stage, format_args!("get static variable at index {index}"))?;
        let stage = &mut self.stages[i];
        stage.layout.variable_by_index(&mut stage.cache, index)
    }

    /// Creates a binding object for mutable and dynamic variables. With `init_static_resources`
    /// the pipeline's static bindings are copied into it right away.
    pub fn create_shader_resource_binding(
        self: &Arc<Self>,
        init_static_resources: bool,
    ) -> Result<ShaderResourceBinding> {
        let mut srb = ShaderResourceBinding::new(Arc::clone(self))?;
        if init_static_resources {
            srb.initialize_static_resources(None);
        }
        Ok(srb)
    }
}

#[cfg(test)]
mod tests {
    use strata_dxbc::test_utils::RdefBuilder;
    use strata_dxbc::ProgramType;

    use super::*;
    use crate::layout_desc::{ImmutableSamplerDesc, ShaderVariableDesc, ShaderVariableType};
    use crate::resource_state::ResourceState;
    use crate::resources::{BindFlags, BufferDesc, SamplerDesc};
    use crate::shader::ShaderCreateInfo;

    fn shader(device: &RenderDevice, name: &str, stage: ShaderStage, builder: RdefBuilder) -> Arc<Shader> {
        let bytecode = builder.build_dxbc();
        device
            .create_shader(&ShaderCreateInfo::new(name, stage, &bytecode).with_combined_sampler_suffix("_sampler"))
            .unwrap()
    }

    fn graphics(device: &RenderDevice, ps: RdefBuilder, layout: PipelineResourceLayoutDesc) -> Result<PipelineState> {
        device.create_graphics_pipeline_state(GraphicsPipelineDesc {
            name: "pso".into(),
            resource_layout: layout,
            vertex_shader: Some(shader(
                device,
                "vs",
                ShaderStage::Vertex,
                RdefBuilder::new(ProgramType::Vertex).constant_buffer("camera", 0),
            )),
            pixel_shader: Some(shader(device, "ps", ShaderStage::Pixel, ps)),
            ..Default::default()
        })
    }

    #[test]
    fn missing_or_misplaced_shaders_are_rejected() {
        let device = RenderDevice::default();
        let err = device
            .create_graphics_pipeline_state(GraphicsPipelineDesc::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingShader(ShaderStage::Vertex)));

        let ps = shader(&device, "ps", ShaderStage::Pixel, RdefBuilder::new(ProgramType::Pixel));
        let err = device
            .create_graphics_pipeline_state(GraphicsPipelineDesc {
                vertex_shader: Some(ps.clone()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::StageMismatch {
                expected: ShaderStage::Vertex,
                actual: ShaderStage::Pixel
            }
        ));

        let err = device
            .create_compute_pipeline_state(ComputePipelineDesc {
                compute_shader: Some(ps),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::StageMismatch { .. }));
    }

    #[test]
    fn immutable_samplers_fill_static_cache() {
        let device = RenderDevice::default();
        let layout = PipelineResourceLayoutDesc {
            immutable_samplers: vec![ImmutableSamplerDesc {
                stages: ShaderStages::PIXEL,
                sampler_or_texture_name: "tex".into(),
                desc: SamplerDesc::default(),
            }],
            ..Default::default()
        };
        let pso = graphics(
            &device,
            RdefBuilder::new(ProgramType::Pixel)
                .sampler("tex_sampler", 0, 1)
                .texture("tex", 0, 1),
            layout,
        )
        .unwrap();

        let ps = pso.stage_position(ShaderStage::Pixel).unwrap();
        // The static layout has no sampler variable, so the static cache holds no sampler slot.
        assert_eq!(pso.static_cache(ps).sampler_count(), 0);
        assert_eq!(pso.stages[ps].immutable_samplers.len(), 1);

        let mut cache = ShaderResourceCache::new();
        cache.initialize_from_resources(pso.allocator(), pso.shader(ShaderStage::Pixel).unwrap().resources());
        pso.set_immutable_samplers(&mut cache, ps);
        assert!(cache.is_sampler_bound(0));
        cache.destroy();
    }

    #[test]
    fn compatibility_follows_resource_layout() {
        let device = RenderDevice::default();
        let a = graphics(&device, RdefBuilder::new(ProgramType::Pixel).texture("tex", 0, 1), Default::default()).unwrap();
        let b = graphics(&device, RdefBuilder::new(ProgramType::Pixel).texture("tex", 0, 1), Default::default()).unwrap();
        let c = graphics(&device, RdefBuilder::new(ProgramType::Pixel).texture("tex", 0, 2), Default::default()).unwrap();

        assert!(a.is_compatible_with(&a));
        assert!(a.is_compatible_with(&b));
        assert_eq!(a.resource_layout_hash(), b.resource_layout_hash());
        assert!(!a.is_compatible_with(&c));
    }

    #[test]
    fn static_variables_are_looked_up_per_stage() {
        let device = RenderDevice::default();
        let layout = PipelineResourceLayoutDesc {
            variables: vec![ShaderVariableDesc::new(ShaderStages::PIXEL, "tex", ShaderVariableType::Mutable)],
            ..Default::default()
        };
        let mut pso = graphics(
            &device,
            RdefBuilder::new(ProgramType::Pixel)
                .constant_buffer("material", 1)
                .texture("tex", 0, 1),
            layout,
        )
        .unwrap();

        assert_eq!(pso.static_variable_count(ShaderStage::Vertex), 1);
        assert_eq!(pso.static_variable_count(ShaderStage::Pixel), 1);
        assert_eq!(pso.static_variable_count(ShaderStage::Compute), 0);
        assert!(pso.static_variable_by_name(ShaderStage::Pixel, "tex").is_none());
        assert!(pso.static_variable_by_name(ShaderStage::Geometry, "material").is_none());

        let buffer = device.create_buffer(
            BufferDesc {
                name: "material".into(),
                size: 16,
                bind_flags: BindFlags::UNIFORM_BUFFER,
            },
            ResourceState::UNDEFINED,
        );
        let mut mapping = ResourceMapping::new();
        mapping.add("material", buffer, false);
        pso.bind_static_resources(ShaderStages::all(), &mapping, BindShaderResourcesFlags::empty());

        let var = pso.static_variable_by_name(ShaderStage::Pixel, "material").unwrap();
        assert!(var.is_bound(0));
        assert!(pso.has_static_resources());
        assert!(pso.has_shader_resources());
    }
}
