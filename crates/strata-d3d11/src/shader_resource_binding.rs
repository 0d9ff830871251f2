//! Mutable and dynamic bindings of one pipeline state, plus a snapshot of its static ones.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::layout_desc::{BindShaderResourcesFlags, ShaderVariableTypes};
use crate::pipeline_state::PipelineState;
use crate::resource_cache::ShaderResourceCache;
use crate::resource_layout::{ShaderResourceLayout, ShaderVariable};
use crate::resource_mapping::ResourceMapping;
use crate::stage::{ShaderStage, ShaderStages};

/// One active stage: a cache sized for every resource of the shader and the layout of its
/// mutable and dynamic variables.
#[derive(Debug)]
struct SrbStage {
    cache: ShaderResourceCache,
    layout: ShaderResourceLayout,
}

impl Drop for SrbStage {
    fn drop(&mut self) {
        self.cache.destroy();
    }
}

#[derive(Debug)]
pub struct ShaderResourceBinding {
    pso: Arc<PipelineState>,
    /// Same order as the pipeline's active stages.
    stages: Vec<SrbStage>,
    static_resources_initialized: bool,
}

impl ShaderResourceBinding {
    pub(crate) fn new(pso: Arc<PipelineState>) -> Result<Self> {
        let mut stages = Vec::with_capacity(pso.stage_count());
        for i in 0..pso.stage_count() {
            let resources = pso.static_layout(i).resources();

            // Static, mutable and dynamic slots all live in this cache; static ones are copied
            // in from the pipeline.
            let mut cache = ShaderResourceCache::new();
            cache.initialize_from_resources(pso.allocator(), resources);

            let layout = match ShaderResourceLayout::new(
                Arc::clone(resources),
                pso.resource_layout(),
                ShaderVariableTypes::MUTABLE | ShaderVariableTypes::DYNAMIC,
                &mut cache,
                pso.allocator(),
            ) {
                Ok(layout) => layout,
                Err(err) => {
                    cache.destroy();
                    return Err(err);
                }
            };
            stages.push(SrbStage { cache, layout });
        }

        Ok(Self {
            pso,
            stages,
            static_resources_initialized: false,
        })
    }

    pub fn pipeline_state(&self) -> &Arc<PipelineState> {
        &self.pso
    }

    pub fn static_resources_initialized(&self) -> bool {
        self.static_resources_initialized
    }

    pub(crate) fn cache(&self, i: usize) -> &ShaderResourceCache {
        &self.stages[i].cache
    }

    pub(crate) fn layout(&self, i: usize) -> &ShaderResourceLayout {
        &self.stages[i].layout
    }

    /// Binds mutable and dynamic variables of `stages` from `mapping`.
    pub fn bind_resources(
        &mut self,
        stages: ShaderStages,
        mapping: &ResourceMapping,
        flags: BindShaderResourcesFlags,
    ) {
        for stage in &mut self.stages {
            if stages.contains_stage(stage.layout.stage()) {
                stage.layout.bind_resources(mapping, flags, &mut stage.cache);
            }
        }
    }

    fn stage_position(&self, stage: ShaderStage, what: fmt::Arguments<'_>) -> Option<usize> {
        let pipeline_type = self.pso.pipeline_type();
        if !pipeline_type.allows(stage) {
            tracing::warn!(
                "Unable to {} in shader stage {} as the stage is invalid for {} pipeline '{}'",
                what,
                stage,
                pipeline_type,
                self.pso.name()
            );
            return None;
        }
        let position = self.pso.stage_position(stage);
        if position.is_none() {
            tracing::warn!(
                "Unable to {} in shader stage {} as the stage is inactive in PSO '{}'",
                what,
                stage,
                self.pso.name()
            );
        }
        position
    }

    pub fn variable_count(&self, stage: ShaderStage) -> usize {
        self.stage_position(stage, format_args!("get the number of mutable/dynamic variables"))
            .map_or(0, |i| self.stages[i].layout.variable_count())
    }

    pub fn variable_by_name(&mut self, stage: ShaderStage, name: &str) -> Option<ShaderVariable<'_>> {
        let i = self.stage_position(stage, format_args!("find mutable/dynamic variable '{name}'"))?;
        let stage = &mut self.stages[i];
        stage.layout.variable_by_name(&mut stage.cache, name)
    }

    pub fn variable_by_index(&mut self, stage: ShaderStage, index: usize) -> Option<ShaderVariable<'_>> {
        let i = self.stage_position(stage, format_args!("get mutable/dynamic variable at index {index}"))?;
        let stage = &mut self.stages[i];
        stage.layout.variable_by_index(&mut stage.cache, index)
    }

    /// Copies static bindings and immutable samplers from `pso` (or the pipeline this object was
    /// created from) into every stage cache. Only the first call has an effect.
    pub fn initialize_static_resources(&mut self, pso: Option<&PipelineState>) {
        if self.static_resources_initialized {
            tracing::warn!(
                "Static resources have already been initialized in this shader resource binding object. The operation will be ignored."
            );
            return;
        }

        let pso = match pso {
            Some(pso) => {
                if !pso.is_compatible_with(&self.pso) {
                    tracing::error!(
                        "Pipeline state '{}' is not compatible with the pipeline state '{}' this shader resource binding was created from",
                        pso.name(),
                        self.pso.name()
                    );
                    return;
                }
                pso
            }
            None => &*self.pso,
        };

        for (i, stage) in self.stages.iter_mut().enumerate() {
            let static_layout = pso.static_layout(i);
            let static_cache = pso.static_cache(i);

            #[cfg(feature = "development")]
            if !static_layout.dvp_verify_bindings(static_cache) {
                tracing::error!(
                    "Static resources in SRB of PSO '{}' will not be successfully initialized because not all static resource bindings in shader '{}' are valid. Bind every static resource of the pipeline state before initializing static resources of a binding object.",
                    pso.name(),
                    static_layout.shader_name()
                );
            }

            static_layout.copy_resources(static_cache, &mut stage.cache);
            pso.set_immutable_samplers(&mut stage.cache, i);
        }

        self.static_resources_initialized = true;
    }
}
