use crate::rdef::{ProgramType, ShaderInputType};
use crate::test_utils::{build_container, RdefBuilder};
use crate::{parse_rdef_chunk, DxbcError, DxbcFile, FourCC};

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Minimal SM5.0 pixel shader RDEF with a single texture bound at t3.
fn single_texture_rdef() -> Vec<u8> {
    let mut chunk = Vec::new();
    push_u32(&mut chunk, 0); // cb count
    push_u32(&mut chunk, 0); // cb offset
    push_u32(&mut chunk, 1); // resource count
    push_u32(&mut chunk, 28); // resource offset (header size)
    push_u32(&mut chunk, 0xFFFF_0050); // ps_5_0
    push_u32(&mut chunk, 0); // flags
    push_u32(&mut chunk, 0); // creator offset

    // Resource entry (32 bytes).
    push_u32(&mut chunk, 60); // name offset
    push_u32(&mut chunk, 2); // type (texture)
    push_u32(&mut chunk, 5); // return type
    push_u32(&mut chunk, 4); // dimension (texture2d)
    push_u32(&mut chunk, 0); // num samples
    push_u32(&mut chunk, 3); // bind point
    push_u32(&mut chunk, 1); // bind count
    push_u32(&mut chunk, 0); // flags

    chunk.extend_from_slice(b"tex0\0");
    chunk
}

#[test]
fn parse_rdef_resource_bindings_minimal() {
    let rdef = parse_rdef_chunk(&single_texture_rdef()).unwrap();
    assert_eq!(rdef.creator, None);
    assert_eq!(rdef.constant_buffer_count, 0);
    assert_eq!(rdef.target.program_type, Some(ProgramType::Pixel));
    assert_eq!(rdef.bound_resources.len(), 1);

    let tex = &rdef.bound_resources[0];
    assert_eq!(tex.name, "tex0");
    assert_eq!(tex.shader_input_type(), Some(ShaderInputType::Texture));
    assert!(!tex.is_buffer_dimension());
    assert_eq!(tex.bind_point, 3);
    assert_eq!(tex.bind_count, 1);
    assert_eq!(tex.space, 0);
}

#[test]
fn parse_rdef_reads_creator_string() {
    let mut chunk = single_texture_rdef();
    let creator_offset = chunk.len() as u32;
    chunk[24..28].copy_from_slice(&creator_offset.to_le_bytes());
    chunk.extend_from_slice(b"Microsoft (R) HLSL Shader Compiler\0");

    let rdef = parse_rdef_chunk(&chunk).unwrap();
    assert_eq!(rdef.creator.as_deref(), Some("Microsoft (R) HLSL Shader Compiler"));
}

#[test]
fn parse_rdef_rejects_table_past_chunk_end() {
    let mut chunk = single_texture_rdef();
    chunk[8..12].copy_from_slice(&4u32.to_le_bytes()); // claims four entries

    let err = parse_rdef_chunk(&chunk).unwrap_err();
    assert!(matches!(err, DxbcError::InvalidChunk { .. }), "{err}");
    assert!(err.context().contains("resource table"));
}

#[test]
fn parse_rdef_rejects_unterminated_name() {
    let mut chunk = single_texture_rdef();
    chunk.pop(); // drop the NUL terminator of "tex0"

    let err = parse_rdef_chunk(&chunk).unwrap_err();
    assert!(err.context().contains("null terminator"), "{err}");
}

#[test]
fn dxbc_get_rdef_parses_chunk() {
    let chunk = single_texture_rdef();
    let dxbc_bytes = build_container(&[(FourCC::RDEF, &chunk)]);
    let dxbc = DxbcFile::parse(&dxbc_bytes).expect("DXBC parse should succeed");

    let rdef = dxbc
        .get_rdef()
        .expect("missing RDEF")
        .expect("RDEF parse should succeed");
    assert_eq!(rdef.bound_resources[0].name, "tex0");
    assert_eq!(rdef.bound_resources[0].bind_point, 3);
}

#[test]
fn dxbc_get_rdef_falls_back_to_rd11_chunk_id() {
    let chunk = single_texture_rdef();
    let dxbc_bytes = build_container(&[(FourCC::RD11, &chunk)]);
    let dxbc = DxbcFile::parse(&dxbc_bytes).expect("DXBC parse should succeed");

    let rdef = dxbc.get_rdef().expect("missing RDEF").unwrap();
    assert_eq!(rdef.bound_resources.len(), 1);
}

#[test]
fn dxbc_get_rdef_prefers_valid_rd11_over_broken_rdef() {
    let good = single_texture_rdef();
    let broken = [0u8; 8];
    let dxbc_bytes = build_container(&[(FourCC::RDEF, &broken), (FourCC::RD11, &good)]);
    let dxbc = DxbcFile::parse(&dxbc_bytes).unwrap();

    assert!(dxbc.get_rdef().unwrap().is_ok());
}

#[test]
fn dxbc_get_rdef_reports_error_when_only_broken_chunk_exists() {
    let broken = [0u8; 8];
    let dxbc_bytes = build_container(&[(FourCC::RDEF, &broken)]);
    let dxbc = DxbcFile::parse(&dxbc_bytes).unwrap();

    let err = dxbc.get_rdef().unwrap().unwrap_err();
    assert!(err.context().starts_with("RDEF chunk:"), "{err}");
}

#[test]
fn dxbc_without_rdef_returns_none() {
    let dxbc_bytes = build_container(&[(FourCC::SHEX, &[0u8; 4])]);
    let dxbc = DxbcFile::parse(&dxbc_bytes).unwrap();
    assert!(dxbc.get_rdef().is_none());
    assert_eq!(dxbc.find_first_shader_chunk().unwrap().fourcc, FourCC::SHEX);
}

#[test]
fn dxbc_parse_rejects_bad_magic_and_truncation() {
    let mut bytes = build_container(&[(FourCC::SHEX, &[0u8; 4])]);
    assert!(matches!(
        DxbcFile::parse(&bytes[..16]),
        Err(DxbcError::MalformedHeader { .. })
    ));

    bytes[0] = b'X';
    assert!(matches!(
        DxbcFile::parse(&bytes),
        Err(DxbcError::MalformedHeader { .. })
    ));
}

#[test]
fn dxbc_parse_rejects_chunk_offset_into_header() {
    let mut bytes = build_container(&[(FourCC::SHEX, &[0u8; 4])]);
    bytes[32..36].copy_from_slice(&8u32.to_le_bytes());
    assert!(matches!(
        DxbcFile::parse(&bytes),
        Err(DxbcError::MalformedOffsets { .. })
    ));
}

#[test]
fn debug_summary_lists_chunks() {
    let bytes = build_container(&[(FourCC::RDEF, &single_texture_rdef()), (FourCC::SHEX, &[])]);
    let summary = DxbcFile::parse(&bytes).unwrap().debug_summary();
    assert!(summary.contains("chunk_count=2"), "{summary}");
    assert!(summary.contains("[01] SHEX 0 bytes"), "{summary}");
}

#[test]
fn builder_output_reflects_every_resource_in_order() {
    let dxbc = RdefBuilder::new(ProgramType::Pixel)
        .creator("strata test")
        .constant_buffer("cbCamera", 2)
        .sampler("g_Tex_sampler", 0, 1)
        .texture("g_Tex", 0, 1)
        .rw_texture("g_Output", 1)
        .structured_buffer("g_Lights", 4)
        .build_dxbc();

    let file = DxbcFile::parse(&dxbc).unwrap();
    let rdef = file.get_rdef().unwrap().unwrap();
    assert_eq!(rdef.creator.as_deref(), Some("strata test"));
    assert_eq!(rdef.constant_buffer_count, 1);

    let kinds: Vec<_> = rdef
        .bound_resources
        .iter()
        .map(|r| (r.name.as_str(), r.shader_input_type().unwrap(), r.bind_point))
        .collect();
    assert_eq!(
        kinds,
        [
            ("cbCamera", ShaderInputType::CBuffer, 2),
            ("g_Tex_sampler", ShaderInputType::Sampler, 0),
            ("g_Tex", ShaderInputType::Texture, 0),
            ("g_Output", ShaderInputType::UavRwTyped, 1),
            ("g_Lights", ShaderInputType::Structured, 4),
        ]
    );
    assert!(rdef.bound_resources[4].is_buffer_dimension());
}

#[test]
fn sm50_arrays_are_reported_per_element() {
    let chunk = RdefBuilder::new(ProgramType::Pixel)
        .texture_array_elements("g_Layers", 4, 3)
        .build_chunk();
    let rdef = parse_rdef_chunk(&chunk).unwrap();

    let names: Vec<_> = rdef.bound_resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["g_Layers[0]", "g_Layers[1]", "g_Layers[2]"]);
    assert_eq!(rdef.bound_resources[2].bind_point, 6);
}

#[test]
fn sm51_entries_carry_register_space() {
    let chunk = RdefBuilder::new(ProgramType::Compute)
        .shader_model(5, 1)
        .texture("g_Bindless", 0, 64)
        .rw_structured_buffer("g_Out", 0)
        .build_chunk();
    let rdef = parse_rdef_chunk(&chunk).unwrap();

    assert!(rdef.target.is_sm51_or_later());
    assert_eq!(rdef.bound_resources.len(), 2);
    assert_eq!(rdef.bound_resources[0].bind_count, 64);
    assert_eq!(rdef.bound_resources[1].name, "g_Out");
}
