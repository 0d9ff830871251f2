//! Parser for the resource definition chunk (`RDEF`) of SM4/SM5 shaders.
//!
//! The chunk starts with a 28-byte header:
//!
//! | offset | field                         |
//! |--------|-------------------------------|
//! | 0      | constant buffer count         |
//! | 4      | constant buffer table offset  |
//! | 8      | bound resource count          |
//! | 12     | bound resource table offset   |
//! | 16     | target (version + program)    |
//! | 20     | compile flags                 |
//! | 24     | creator string offset         |
//!
//! Bound resource entries are 32 bytes for shader models up to 5.0 and 40
//! bytes for 5.1 and later, which append the register space and range id.
//! All offsets are relative to the start of the chunk payload.

use crate::dxbc::read_u32_le;
use crate::DxbcError;

const RDEF_HEADER_LEN: usize = 28;
const RESOURCE_ENTRY_LEN_SM50: usize = 32;
const RESOURCE_ENTRY_LEN_SM51: usize = 40;

/// Program type encoded in the high 16 bits of the `RDEF` target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramType {
    /// Pixel shader (`0xFFFF`).
    Pixel,
    /// Vertex shader (`0xFFFE`).
    Vertex,
    /// Geometry shader (`0x4753`, "GS").
    Geometry,
    /// Hull shader (`0x4853`, "HS").
    Hull,
    /// Domain shader (`0x4453`, "DS").
    Domain,
    /// Compute shader (`0x4353`, "CS").
    Compute,
}

impl ProgramType {
    /// Decodes the program type from the high half of the target field.
    pub const fn from_u16(v: u16) -> Option<Self> {
        match v {
            0xFFFF => Some(Self::Pixel),
            0xFFFE => Some(Self::Vertex),
            0x4753 => Some(Self::Geometry),
            0x4853 => Some(Self::Hull),
            0x4453 => Some(Self::Domain),
            0x4353 => Some(Self::Compute),
            _ => None,
        }
    }

    /// Encodes the program type as stored in the target field.
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Pixel => 0xFFFF,
            Self::Vertex => 0xFFFE,
            Self::Geometry => 0x4753,
            Self::Hull => 0x4853,
            Self::Domain => 0x4453,
            Self::Compute => 0x4353,
        }
    }
}

/// Decoded `RDEF` target field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShaderTarget {
    /// Raw 32-bit target value.
    pub raw: u32,
    /// Program type, if recognized.
    pub program_type: Option<ProgramType>,
    /// Shader model major version.
    pub major: u8,
    /// Shader model minor version.
    pub minor: u8,
}

impl ShaderTarget {
    /// Decodes a raw target value.
    pub const fn from_raw(raw: u32) -> Self {
        let version = (raw & 0xFFFF) as u16;
        Self {
            raw,
            program_type: ProgramType::from_u16((raw >> 16) as u16),
            major: ((version >> 4) & 0xF) as u8,
            minor: (version & 0xF) as u8,
        }
    }

    /// Returns `true` for shader model 5.1 and later.
    ///
    /// SM5.1 reflects resource arrays as a single entry and adds register
    /// spaces to each bound resource.
    pub const fn is_sm51_or_later(&self) -> bool {
        self.major > 5 || (self.major == 5 && self.minor >= 1)
    }
}

/// `D3D_SHADER_INPUT_TYPE` values stored in bound resource entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ShaderInputType {
    /// Constant buffer (`b#`).
    CBuffer = 0,
    /// Texture buffer (`t#`, `tbuffer`).
    TBuffer = 1,
    /// Texture or typed buffer SRV (`t#`).
    Texture = 2,
    /// Sampler state (`s#`).
    Sampler = 3,
    /// Typed read/write UAV (`u#`).
    UavRwTyped = 4,
    /// Structured buffer SRV.
    Structured = 5,
    /// Read/write structured buffer UAV.
    UavRwStructured = 6,
    /// Byte-address buffer SRV.
    ByteAddress = 7,
    /// Read/write byte-address buffer UAV.
    UavRwByteAddress = 8,
    /// Append structured buffer.
    UavAppendStructured = 9,
    /// Consume structured buffer.
    UavConsumeStructured = 10,
    /// Read/write structured buffer with a hidden counter.
    UavRwStructuredWithCounter = 11,
}

impl ShaderInputType {
    /// Decodes a raw `D3D_SHADER_INPUT_TYPE`.
    pub const fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::CBuffer,
            1 => Self::TBuffer,
            2 => Self::Texture,
            3 => Self::Sampler,
            4 => Self::UavRwTyped,
            5 => Self::Structured,
            6 => Self::UavRwStructured,
            7 => Self::ByteAddress,
            8 => Self::UavRwByteAddress,
            9 => Self::UavAppendStructured,
            10 => Self::UavConsumeStructured,
            11 => Self::UavRwStructuredWithCounter,
            _ => return None,
        })
    }
}

/// `D3D_SRV_DIMENSION_BUFFER`.
pub const SRV_DIMENSION_BUFFER: u32 = 1;
/// `D3D_SRV_DIMENSION_BUFFEREX`.
pub const SRV_DIMENSION_BUFFEREX: u32 = 11;

/// A single bound resource from an `RDEF` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefResourceBinding {
    /// Resource name as declared in the shader source.
    ///
    /// Up to SM5.0, arrays of textures/samplers are reported one element at a
    /// time as `name[index]`.
    pub name: String,
    /// Raw `D3D_SHADER_INPUT_TYPE`.
    pub input_type: u32,
    /// Raw `D3D_RESOURCE_RETURN_TYPE`.
    pub return_type: u32,
    /// Raw `D3D_SRV_DIMENSION`.
    pub dimension: u32,
    /// Sample count for multisampled textures.
    pub num_samples: u32,
    /// First register this resource is bound to.
    pub bind_point: u32,
    /// Number of contiguous registers.
    pub bind_count: u32,
    /// Raw `D3D_SHADER_INPUT_FLAGS`.
    pub flags: u32,
    /// Register space (SM5.1+ only; zero otherwise).
    pub space: u32,
}

impl RdefResourceBinding {
    /// Returns the decoded input type, if recognized.
    pub fn shader_input_type(&self) -> Option<ShaderInputType> {
        ShaderInputType::from_u32(self.input_type)
    }

    /// Returns `true` if the view dimension denotes a buffer.
    pub fn is_buffer_dimension(&self) -> bool {
        self.dimension == SRV_DIMENSION_BUFFER || self.dimension == SRV_DIMENSION_BUFFEREX
    }
}

/// A parsed `RDEF` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdefChunk {
    /// Decoded target (shader model and program type).
    pub target: ShaderTarget,
    /// Raw compile flags.
    pub flags: u32,
    /// Compiler identification string, if present.
    pub creator: Option<String>,
    /// Number of constant buffer descriptions (not parsed further).
    pub constant_buffer_count: u32,
    /// Bound resources in declaration order.
    pub bound_resources: Vec<RdefResourceBinding>,
}

/// Parses an `RDEF` chunk payload.
pub fn parse_rdef_chunk(bytes: &[u8]) -> Result<RdefChunk, DxbcError> {
    if bytes.len() < RDEF_HEADER_LEN {
        return Err(DxbcError::invalid_chunk(format!(
            "RDEF chunk is truncated: need {RDEF_HEADER_LEN} bytes for header, got {}",
            bytes.len()
        )));
    }

    let constant_buffer_count = read_field(bytes, 0, "cb_count")?;
    let resource_count = read_field(bytes, 8, "resource_count")? as usize;
    let resource_offset = read_field(bytes, 12, "resource_offset")? as usize;
    let target = ShaderTarget::from_raw(read_field(bytes, 16, "target")?);
    let flags = read_field(bytes, 20, "flags")?;
    let creator_offset = read_field(bytes, 24, "creator_offset")? as usize;

    let creator = if creator_offset == 0 {
        None
    } else {
        Some(read_cstring(bytes, creator_offset, "creator")?.to_owned())
    };

    let entry_len = if target.is_sm51_or_later() {
        RESOURCE_ENTRY_LEN_SM51
    } else {
        RESOURCE_ENTRY_LEN_SM50
    };

    let table_end = resource_count
        .checked_mul(entry_len)
        .and_then(|len| resource_offset.checked_add(len))
        .ok_or_else(|| DxbcError::invalid_chunk("resource table size overflows"))?;
    if resource_count > 0 && (resource_offset < RDEF_HEADER_LEN || table_end > bytes.len()) {
        return Err(DxbcError::invalid_chunk(format!(
            "resource table at {resource_offset}..{table_end} is outside chunk bounds {RDEF_HEADER_LEN}..{}",
            bytes.len()
        )));
    }

    let mut bound_resources = Vec::new();
    bound_resources.try_reserve_exact(resource_count).map_err(|_| {
        DxbcError::invalid_chunk(format!(
            "resource count {resource_count} is too large to allocate"
        ))
    })?;

    for index in 0..resource_count {
        let base = resource_offset + index * entry_len;
        let entry = |field_offset: usize, field: &'static str| {
            read_field(bytes, base + field_offset, field)
                .map_err(|e| DxbcError::invalid_chunk(format!("resource {index}: {}", e.context())))
        };

        let name_offset = entry(0, "name_offset")? as usize;
        let name = read_cstring(bytes, name_offset, "resource name")
            .map_err(|e| DxbcError::invalid_chunk(format!("resource {index}: {}", e.context())))?
            .to_owned();

        bound_resources.push(RdefResourceBinding {
            name,
            input_type: entry(4, "type")?,
            return_type: entry(8, "return_type")?,
            dimension: entry(12, "dimension")?,
            num_samples: entry(16, "num_samples")?,
            bind_point: entry(20, "bind_point")?,
            bind_count: entry(24, "bind_count")?,
            flags: entry(28, "flags")?,
            space: if entry_len == RESOURCE_ENTRY_LEN_SM51 {
                entry(32, "space")?
            } else {
                0
            },
        });
    }

    Ok(RdefChunk {
        target,
        flags,
        creator,
        constant_buffer_count,
        bound_resources,
    })
}

fn read_field(bytes: &[u8], offset: usize, field: &str) -> Result<u32, DxbcError> {
    read_u32_le(bytes, offset).map_err(|_| {
        DxbcError::invalid_chunk(format!(
            "need 4 bytes for {field} at {offset}, but chunk length is {}",
            bytes.len()
        ))
    })
}

fn read_cstring<'a>(bytes: &'a [u8], offset: usize, what: &str) -> Result<&'a str, DxbcError> {
    let tail = bytes.get(offset..).ok_or_else(|| {
        DxbcError::invalid_chunk(format!(
            "{what} offset {offset} is outside chunk length {}",
            bytes.len()
        ))
    })?;
    let nul = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        DxbcError::invalid_chunk(format!("{what} at offset {offset} is missing a null terminator"))
    })?;
    core::str::from_utf8(&tail[..nul])
        .map_err(|_| DxbcError::invalid_chunk(format!("{what} at offset {offset} is not valid UTF-8")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_decodes_program_and_version() {
        let ps_5_0 = ShaderTarget::from_raw(0xFFFF_0050);
        assert_eq!(ps_5_0.program_type, Some(ProgramType::Pixel));
        assert_eq!((ps_5_0.major, ps_5_0.minor), (5, 0));
        assert!(!ps_5_0.is_sm51_or_later());

        let cs_5_1 = ShaderTarget::from_raw(0x4353_0051);
        assert_eq!(cs_5_1.program_type, Some(ProgramType::Compute));
        assert!(cs_5_1.is_sm51_or_later());

        assert_eq!(ShaderTarget::from_raw(0x1234_0040).program_type, None);
    }

    #[test]
    fn unknown_input_types_are_rejected() {
        assert_eq!(ShaderInputType::from_u32(2), Some(ShaderInputType::Texture));
        assert_eq!(ShaderInputType::from_u32(12), None);
    }

    #[test]
    fn truncated_header_is_an_error() {
        let err = parse_rdef_chunk(&[0u8; 12]).unwrap_err();
        assert!(matches!(err, DxbcError::InvalidChunk { .. }));
        assert!(err.context().contains("truncated"));
    }
}
