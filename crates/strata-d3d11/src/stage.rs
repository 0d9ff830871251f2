use std::fmt;

use bitflags::bitflags;
use strata_dxbc::ProgramType;

/// Shader stages of the D3D11 pipeline.
///
/// The discriminant order matches the native per-stage method tables (`VS`, `PS`, `GS`, `HS`,
/// `DS`, `CS`) and indexes all per-stage committed-state arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    Pixel,
    Geometry,
    Hull,
    Domain,
    Compute,
}

impl ShaderStage {
    pub const COUNT: usize = 6;

    pub const ALL: [ShaderStage; Self::COUNT] = [
        Self::Vertex,
        Self::Pixel,
        Self::Geometry,
        Self::Hull,
        Self::Domain,
        Self::Compute,
    ];

    pub const fn index(self) -> usize {
        match self {
            Self::Vertex => 0,
            Self::Pixel => 1,
            Self::Geometry => 2,
            Self::Hull => 3,
            Self::Domain => 4,
            Self::Compute => 5,
        }
    }

    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Vertex),
            1 => Some(Self::Pixel),
            2 => Some(Self::Geometry),
            3 => Some(Self::Hull),
            4 => Some(Self::Domain),
            5 => Some(Self::Compute),
            _ => None,
        }
    }

    pub const fn flag(self) -> ShaderStages {
        match self {
            Self::Vertex => ShaderStages::VERTEX,
            Self::Pixel => ShaderStages::PIXEL,
            Self::Geometry => ShaderStages::GEOMETRY,
            Self::Hull => ShaderStages::HULL,
            Self::Domain => ShaderStages::DOMAIN,
            Self::Compute => ShaderStages::COMPUTE,
        }
    }

    pub const fn from_program_type(program: ProgramType) -> Self {
        match program {
            ProgramType::Vertex => Self::Vertex,
            ProgramType::Pixel => Self::Pixel,
            ProgramType::Geometry => Self::Geometry,
            ProgramType::Hull => Self::Hull,
            ProgramType::Domain => Self::Domain,
            ProgramType::Compute => Self::Compute,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Vertex => "Vertex",
            Self::Pixel => "Pixel",
            Self::Geometry => "Geometry",
            Self::Hull => "Hull",
            Self::Domain => "Domain",
            Self::Compute => "Compute",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// A set of shader stages.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShaderStages: u32 {
        const VERTEX = 1 << 0;
        const PIXEL = 1 << 1;
        const GEOMETRY = 1 << 2;
        const HULL = 1 << 3;
        const DOMAIN = 1 << 4;
        const COMPUTE = 1 << 5;
        const ALL_GRAPHICS = Self::VERTEX.bits()
            | Self::PIXEL.bits()
            | Self::GEOMETRY.bits()
            | Self::HULL.bits()
            | Self::DOMAIN.bits();
    }
}

impl ShaderStages {
    pub fn contains_stage(self, stage: ShaderStage) -> bool {
        self.contains(stage.flag())
    }

    /// Iterates the individual stages in pipeline order.
    pub fn stages(self) -> impl Iterator<Item = ShaderStage> {
        ShaderStage::ALL
            .into_iter()
            .filter(move |stage| self.contains(stage.flag()))
    }
}

impl fmt::Display for ShaderStages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("<none>");
        }
        for (i, stage) in self.stages().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(stage.name())?;
        }
        Ok(())
    }
}
