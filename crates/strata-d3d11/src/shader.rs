use std::sync::Arc;

use crate::error::{EngineError, Result};
use crate::resources::NativeHandle;
use crate::shader_resources::ShaderResources;
use crate::stage::ShaderStage;

/// Parameters for [`crate::RenderDevice::create_shader`].
#[derive(Debug, Clone, Copy)]
pub struct ShaderCreateInfo<'a> {
    pub name: &'a str,
    /// Stage the shader is created for; must match the program type in the bytecode.
    pub stage: ShaderStage,
    pub bytecode: &'a [u8],
    /// Pair every texture `t` with a sampler named `t` + suffix. `None` falls back to the
    /// device's configured suffix.
    pub combined_sampler_suffix: Option<&'a str>,
}

impl<'a> ShaderCreateInfo<'a> {
    pub fn new(name: &'a str, stage: ShaderStage, bytecode: &'a [u8]) -> Self {
        Self {
            name,
            stage,
            bytecode,
            combined_sampler_suffix: None,
        }
    }

    pub fn with_combined_sampler_suffix(mut self, suffix: &'a str) -> Self {
        self.combined_sampler_suffix = Some(suffix);
        self
    }
}

/// A compiled shader and its reflected resources.
#[derive(Debug)]
pub struct Shader {
    name: String,
    stage: ShaderStage,
    native: NativeHandle,
    resources: Arc<ShaderResources>,
    /// Kept for vertex shaders only; input layouts are validated against it.
    bytecode: Option<Vec<u8>>,
}

impl Shader {
    pub(crate) fn new(info: &ShaderCreateInfo<'_>, suffix: Option<&str>, native: NativeHandle) -> Result<Self> {
        let resources = ShaderResources::from_bytecode(info.bytecode, info.name, suffix)?;
        if resources.stage() != info.stage {
            return Err(EngineError::StageMismatch {
                expected: info.stage,
                actual: resources.stage(),
            });
        }
        tracing::debug!(
            shader = info.name,
            stage = %info.stage,
            resources = resources.total_resources(),
            "created shader"
        );
        Ok(Self {
            name: info.name.to_owned(),
            stage: info.stage,
            native,
            resources: Arc::new(resources),
            bytecode: (info.stage == ShaderStage::Vertex).then(|| info.bytecode.to_vec()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.native
    }

    pub fn resources(&self) -> &Arc<ShaderResources> {
        &self.resources
    }

    pub fn bytecode(&self) -> Option<&[u8]> {
        self.bytecode.as_deref()
    }
}
