use proptest::prelude::*;
use strata_dxbc::{parse_rdef_chunk, DxbcFile};

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Vertex shader RDEF with `cbObject` at b0 and `g_HeightMap` at t1.
fn two_resource_rdef() -> Vec<u8> {
    let mut chunk = Vec::new();
    push_u32(&mut chunk, 1); // cb count
    push_u32(&mut chunk, 0); // cb offset
    push_u32(&mut chunk, 2); // resource count
    push_u32(&mut chunk, 28); // resource offset
    push_u32(&mut chunk, 0xFFFE_0050); // vs_5_0
    push_u32(&mut chunk, 0); // flags
    push_u32(&mut chunk, 0); // creator offset

    let names_start = 28 + 2 * 32;
    for (name_offset, ty, dim, bind_point) in [(names_start, 0, 0, 0), (names_start + 9, 2, 4, 1)] {
        push_u32(&mut chunk, name_offset);
        push_u32(&mut chunk, ty);
        push_u32(&mut chunk, 0); // return type
        push_u32(&mut chunk, dim);
        push_u32(&mut chunk, 0); // num samples
        push_u32(&mut chunk, bind_point);
        push_u32(&mut chunk, 1); // bind count
        push_u32(&mut chunk, 0); // flags
    }
    chunk.extend_from_slice(b"cbObject\0");
    chunk.extend_from_slice(b"g_HeightMap\0");
    chunk
}

#[test]
fn hand_built_chunk_parses() {
    let rdef = parse_rdef_chunk(&two_resource_rdef()).unwrap();
    let names: Vec<_> = rdef.bound_resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, ["cbObject", "g_HeightMap"]);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 512,
        rng_algorithm: proptest::test_runner::RngAlgorithm::ChaCha,
        rng_seed: proptest::test_runner::RngSeed::Fixed(0x5D_BC_51),
        .. ProptestConfig::default()
    })]

    #[test]
    fn rdef_parser_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..=512)) {
        let res = std::panic::catch_unwind(|| parse_rdef_chunk(&bytes));
        prop_assert!(res.is_ok(), "parse_rdef_chunk panicked (len={})", bytes.len());
    }

    #[test]
    fn container_parser_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..=512)) {
        let res = std::panic::catch_unwind(|| {
            DxbcFile::parse(&bytes).map(|file| file.chunks().count())
        });
        prop_assert!(res.is_ok(), "DxbcFile::parse panicked (len={})", bytes.len());
    }

    #[test]
    fn truncated_valid_chunks_fail_cleanly(cut in 0usize..200) {
        let chunk = two_resource_rdef();
        let cut = cut.min(chunk.len());
        let res = parse_rdef_chunk(&chunk[..cut]);
        if cut < chunk.len() {
            prop_assert!(res.is_err());
        } else {
            prop_assert!(res.is_ok());
        }
    }
}
