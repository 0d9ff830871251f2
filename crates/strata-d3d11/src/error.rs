use strata_dxbc::DxbcError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::shader_resources::ResourceClass;
use crate::stage::ShaderStage;

/// Construction-time failures: reflection, layout and pipeline creation.
///
/// Runtime binding and commit problems are never reported through this type; they are logged
/// and the offending operation is skipped.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Dxbc(#[from] DxbcError),

    #[error("shader '{shader}' has no resource definition chunk")]
    MissingResourceDefinition { shader: String },

    #[error("shader '{shader}' does not declare a program type the engine recognizes")]
    UnknownProgramType { shader: String },

    #[error("resource '{name}' in shader '{shader}' has unsupported shader input type {input_type}")]
    UnsupportedResourceType {
        shader: String,
        name: String,
        input_type: u32,
    },

    #[error("{class} '{name}' in shader '{shader}' uses slot {last_slot}, but only {limit} slots are available")]
    SlotLimitExceeded {
        shader: String,
        name: String,
        class: ResourceClass,
        last_slot: u32,
        limit: u32,
    },

    #[error("array element '{name}' in shader '{shader}' is bound to slot {actual}, expected slot {expected}")]
    NonContiguousArray {
        shader: String,
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("{class} layout of shader '{shader}' found {expected} resources but constructed {actual} bind infos")]
    LayoutCountMismatch {
        shader: String,
        class: ResourceClass,
        expected: usize,
        actual: usize,
    },

    #[error("sampler '{sampler}' assigned to texture '{texture}' in shader '{shader}' has bind count {sampler_count}; expected 1 or {texture_count}")]
    CombinedSamplerMismatch {
        shader: String,
        sampler: String,
        texture: String,
        sampler_count: u32,
        texture_count: u32,
    },

    #[error("{expected} shader is expected while {actual} provided")]
    StageMismatch {
        expected: ShaderStage,
        actual: ShaderStage,
    },

    #[error("{0} shader is null")]
    MissingShader(ShaderStage),

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),
}

pub type Result<T, E = EngineError> = std::result::Result<T, E>;
