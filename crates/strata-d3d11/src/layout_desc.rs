//! Application-facing description of how shader variables are grouped by update frequency.

use std::fmt;

use bitflags::bitflags;

use crate::resources::SamplerDesc;
use crate::stage::ShaderStages;

/// Mutability class of a shader variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ShaderVariableType {
    /// Bound once through the pipeline state and copied into every binding object.
    #[default]
    Static,
    /// Bound once per binding object.
    Mutable,
    /// May be rebound on a binding object at any time.
    Dynamic,
}

impl ShaderVariableType {
    pub const ALL: [ShaderVariableType; 3] = [Self::Static, Self::Mutable, Self::Dynamic];

    pub const fn flag(self) -> ShaderVariableTypes {
        match self {
            Self::Static => ShaderVariableTypes::STATIC,
            Self::Mutable => ShaderVariableTypes::MUTABLE,
            Self::Dynamic => ShaderVariableTypes::DYNAMIC,
        }
    }

    pub const fn literal_name(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Mutable => "mutable",
            Self::Dynamic => "dynamic",
        }
    }
}

impl fmt::Display for ShaderVariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.literal_name())
    }
}

bitflags! {
    /// A set of variable mutability classes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderVariableTypes: u32 {
        const STATIC = 1 << 0;
        const MUTABLE = 1 << 1;
        const DYNAMIC = 1 << 2;
    }
}

impl ShaderVariableTypes {
    pub fn contains_type(self, ty: ShaderVariableType) -> bool {
        self.contains(ty.flag())
    }
}

bitflags! {
    /// Flags controlling `bind_resources`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BindShaderResourcesFlags: u32 {
        const UPDATE_STATIC = 1 << 0;
        const UPDATE_MUTABLE = 1 << 1;
        const UPDATE_DYNAMIC = 1 << 2;
        const UPDATE_ALL = Self::UPDATE_STATIC.bits()
            | Self::UPDATE_MUTABLE.bits()
            | Self::UPDATE_DYNAMIC.bits();
        /// Leave already bound slots untouched.
        const KEEP_EXISTING = 1 << 3;
        /// Log every variable that is still unbound after the mapping was applied.
        const VERIFY_ALL_RESOLVED = 1 << 4;
    }
}

impl BindShaderResourcesFlags {
    pub fn updates(self, ty: ShaderVariableType) -> bool {
        let bit = match ty {
            ShaderVariableType::Static => Self::UPDATE_STATIC,
            ShaderVariableType::Mutable => Self::UPDATE_MUTABLE,
            ShaderVariableType::Dynamic => Self::UPDATE_DYNAMIC,
        };
        self.contains(bit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderVariableDesc {
    pub stages: ShaderStages,
    pub name: String,
    pub var_type: ShaderVariableType,
}

impl ShaderVariableDesc {
    pub fn new(stages: ShaderStages, name: impl Into<String>, var_type: ShaderVariableType) -> Self {
        Self {
            stages,
            name: name.into(),
            var_type,
        }
    }
}

/// A sampler baked into the pipeline state instead of being bound at run time.
///
/// `sampler_or_texture_name` matches either a sampler variable directly or, with combined
/// samplers, the texture the sampler is assigned to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmutableSamplerDesc {
    pub stages: ShaderStages,
    pub sampler_or_texture_name: String,
    pub desc: SamplerDesc,
}

impl ImmutableSamplerDesc {
    pub fn new(stages: ShaderStages, sampler_or_texture_name: impl Into<String>, desc: SamplerDesc) -> Self {
        Self {
            stages,
            sampler_or_texture_name: sampler_or_texture_name.into(),
            desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineResourceLayoutDesc {
    pub default_variable_type: ShaderVariableType,
    pub variables: Vec<ShaderVariableDesc>,
    pub immutable_samplers: Vec<ImmutableSamplerDesc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_flags_select_variable_types() {
        let flags = BindShaderResourcesFlags::UPDATE_MUTABLE | BindShaderResourcesFlags::KEEP_EXISTING;
        assert!(flags.updates(ShaderVariableType::Mutable));
        assert!(!flags.updates(ShaderVariableType::Static));
        assert!(BindShaderResourcesFlags::UPDATE_ALL.updates(ShaderVariableType::Dynamic));
    }

    #[test]
    fn variable_type_sets() {
        let set = ShaderVariableType::Mutable.flag() | ShaderVariableType::Dynamic.flag();
        assert!(set.contains_type(ShaderVariableType::Dynamic));
        assert!(!set.contains_type(ShaderVariableType::Static));
    }
}
