use crate::rdef::{ProgramType, ShaderInputType, SRV_DIMENSION_BUFFER};
use crate::FourCC;

/// `D3D_SRV_DIMENSION_TEXTURE2D`, used for texture resources built by [`RdefBuilder`].
pub const SRV_DIMENSION_TEXTURE2D: u32 = 4;

/// Wraps `chunks` in a `DXBC` container with a consistent offset table and `total_size`.
///
/// The checksum stays zeroed since the parser never checks it.
pub fn build_container(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    fn le(value: usize) -> [u8; 4] {
        u32::try_from(value).expect("container field exceeds u32").to_le_bytes()
    }

    let table_end = 32 + 4 * chunks.len();
    let mut offsets = Vec::with_capacity(chunks.len());
    let mut body = Vec::new();
    for (fourcc, data) in chunks {
        offsets.push(table_end + body.len());
        body.extend_from_slice(&fourcc.0);
        body.extend_from_slice(&le(data.len()));
        body.extend_from_slice(data);
    }

    let mut out = Vec::with_capacity(table_end + body.len());
    out.extend_from_slice(b"DXBC");
    out.extend_from_slice(&[0; 16]);
    out.extend_from_slice(&le(1));
    out.extend_from_slice(&le(table_end + body.len()));
    out.extend_from_slice(&le(chunks.len()));
    for offset in offsets {
        out.extend_from_slice(&le(offset));
    }
    out.extend_from_slice(&body);
    out
}

#[derive(Debug, Clone)]
struct ResourceEntry {
    name: String,
    input_type: u32,
    dimension: u32,
    bind_point: u32,
    bind_count: u32,
    space: u32,
}

/// Builds synthetic `RDEF` chunks (and shader containers wrapping them).
///
/// Resources are emitted in the order they are added, which mirrors how the
/// HLSL compiler reports them. Shader model 5.1 targets produce 40-byte
/// resource entries, earlier targets 32-byte entries.
///
/// ```ignore
/// use strata_dxbc::rdef::ProgramType;
/// use strata_dxbc::test_utils::RdefBuilder;
///
/// let dxbc = RdefBuilder::new(ProgramType::Pixel)
///     .constant_buffer("cbFrame", 0)
///     .texture("g_Albedo", 0, 1)
///     .sampler("g_Albedo_sampler", 0, 1)
///     .build_dxbc();
/// let file = strata_dxbc::DxbcFile::parse(&dxbc).unwrap();
/// assert_eq!(file.get_rdef().unwrap().unwrap().bound_resources.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct RdefBuilder {
    program: ProgramType,
    major: u8,
    minor: u8,
    creator: Option<String>,
    resources: Vec<ResourceEntry>,
}

impl RdefBuilder {
    /// Starts a shader model 5.0 resource definition for `program`.
    pub fn new(program: ProgramType) -> Self {
        Self {
            program,
            major: 5,
            minor: 0,
            creator: None,
            resources: Vec::new(),
        }
    }

    /// Overrides the shader model version.
    pub fn shader_model(mut self, major: u8, minor: u8) -> Self {
        self.major = major;
        self.minor = minor;
        self
    }

    /// Sets the creator string.
    pub fn creator(mut self, creator: &str) -> Self {
        self.creator = Some(creator.to_owned());
        self
    }

    /// Adds a raw bound-resource entry.
    pub fn resource(
        mut self,
        name: &str,
        input_type: u32,
        dimension: u32,
        bind_point: u32,
        bind_count: u32,
    ) -> Self {
        self.resources.push(ResourceEntry {
            name: name.to_owned(),
            input_type,
            dimension,
            bind_point,
            bind_count,
            space: 0,
        });
        self
    }

    /// Adds a constant buffer at `b{bind_point}`.
    pub fn constant_buffer(self, name: &str, bind_point: u32) -> Self {
        self.resource(name, ShaderInputType::CBuffer as u32, 0, bind_point, 1)
    }

    /// Adds a 2D texture SRV.
    pub fn texture(self, name: &str, bind_point: u32, bind_count: u32) -> Self {
        let ty = ShaderInputType::Texture as u32;
        self.resource(name, ty, SRV_DIMENSION_TEXTURE2D, bind_point, bind_count)
    }

    /// Adds a 2D texture SRV array the way SM5.0 compilers report it: one
    /// `name[i]` entry per element at consecutive registers.
    pub fn texture_array_elements(mut self, name: &str, bind_point: u32, count: u32) -> Self {
        for i in 0..count {
            self = self.texture(&format!("{name}[{i}]"), bind_point + i, 1);
        }
        self
    }

    /// Adds a typed buffer SRV (`Buffer<T>`).
    pub fn buffer(self, name: &str, bind_point: u32) -> Self {
        let ty = ShaderInputType::Texture as u32;
        self.resource(name, ty, SRV_DIMENSION_BUFFER, bind_point, 1)
    }

    /// Adds a structured buffer SRV.
    pub fn structured_buffer(self, name: &str, bind_point: u32) -> Self {
        let ty = ShaderInputType::Structured as u32;
        self.resource(name, ty, SRV_DIMENSION_BUFFER, bind_point, 1)
    }

    /// Adds a sampler.
    pub fn sampler(self, name: &str, bind_point: u32, bind_count: u32) -> Self {
        self.resource(name, ShaderInputType::Sampler as u32, 0, bind_point, bind_count)
    }

    /// Adds a read/write 2D texture UAV.
    pub fn rw_texture(self, name: &str, bind_point: u32) -> Self {
        let ty = ShaderInputType::UavRwTyped as u32;
        self.resource(name, ty, SRV_DIMENSION_TEXTURE2D, bind_point, 1)
    }

    /// Adds a read/write structured buffer UAV.
    pub fn rw_structured_buffer(self, name: &str, bind_point: u32) -> Self {
        let ty = ShaderInputType::UavRwStructured as u32;
        self.resource(name, ty, SRV_DIMENSION_BUFFER, bind_point, 1)
    }

    /// Serializes the `RDEF` chunk payload.
    pub fn build_chunk(&self) -> Vec<u8> {
        let entry_len = if self.major > 5 || (self.major == 5 && self.minor >= 1) {
            40
        } else {
            32
        };
        let header_len = 28;
        let table_len = self.resources.len() * entry_len;

        // String table follows the resource table: resource names, then creator.
        let mut strings = Vec::new();
        let mut name_offsets = Vec::with_capacity(self.resources.len());
        for res in &self.resources {
            name_offsets.push((header_len + table_len + strings.len()) as u32);
            strings.extend_from_slice(res.name.as_bytes());
            strings.push(0);
        }
        let creator_offset = match &self.creator {
            Some(creator) => {
                let offset = (header_len + table_len + strings.len()) as u32;
                strings.extend_from_slice(creator.as_bytes());
                strings.push(0);
                offset
            }
            None => 0,
        };

        let target = (u32::from(self.program.as_u16()) << 16)
            | (u32::from(self.major) << 4)
            | u32::from(self.minor);
        let cb_count = self
            .resources
            .iter()
            .filter(|r| r.input_type == ShaderInputType::CBuffer as u32)
            .count() as u32;

        let mut out = Vec::with_capacity(header_len + table_len + strings.len());
        push_u32(&mut out, cb_count);
        push_u32(&mut out, 0); // cb offset (descriptions are not emitted)
        push_u32(&mut out, self.resources.len() as u32);
        push_u32(&mut out, header_len as u32);
        push_u32(&mut out, target);
        push_u32(&mut out, 0); // flags
        push_u32(&mut out, creator_offset);

        for (res, name_offset) in self.resources.iter().zip(name_offsets) {
            push_u32(&mut out, name_offset);
            push_u32(&mut out, res.input_type);
            push_u32(&mut out, 0); // return type
            push_u32(&mut out, res.dimension);
            push_u32(&mut out, 0); // num samples
            push_u32(&mut out, res.bind_point);
            push_u32(&mut out, res.bind_count);
            push_u32(&mut out, 0); // flags
            if entry_len == 40 {
                push_u32(&mut out, res.space);
                push_u32(&mut out, 0); // range id
            }
        }
        out.extend_from_slice(&strings);
        out
    }

    /// Wraps the `RDEF` chunk and an empty `SHEX` chunk in a `DXBC` container.
    pub fn build_dxbc(&self) -> Vec<u8> {
        let rdef = self.build_chunk();
        build_container(&[(FourCC::RDEF, &rdef), (FourCC::SHEX, &[])])
    }
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DxbcFile;

    #[test]
    fn build_container_roundtrips_through_parser() {
        let shex = [1u8, 2, 3, 4];
        let bytes = build_container(&[(FourCC::SHEX, &shex)]);

        let file = DxbcFile::parse(&bytes).expect("built container should parse");
        assert_eq!(file.header().magic, FourCC(*b"DXBC"));
        assert_eq!(file.header().total_size as usize, bytes.len());
        assert_eq!(file.header().chunk_count, 1);
        assert_eq!(file.get_chunk(FourCC::SHEX).expect("missing SHEX").data, &shex);
    }

    #[test]
    fn sm51_builder_emits_wide_entries() {
        let chunk = RdefBuilder::new(ProgramType::Compute)
            .shader_model(5, 1)
            .rw_structured_buffer("g_Out", 2)
            .build_chunk();
        // header + one 40-byte entry + "g_Out\0"
        assert_eq!(chunk.len(), 28 + 40 + 6);
    }
}
