//! A safe, zero-copy parser for DirectX shader bytecode containers (`DXBC`)
//! and the resource definition (`RDEF`) chunk used for shader reflection.
//!
//! Shader blobs are treated as untrusted input: every offset and size is
//! bounds-checked and malformed data is reported as a [`DxbcError`] instead of
//! a panic.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod dxbc;
mod error;
mod fourcc;
/// Parser for DXBC resource definition chunks (`RDEF`).
pub mod rdef;

/// Helpers for building synthetic DXBC blobs in tests.
///
/// Only available when compiling this crate's own tests, or when the
/// `test-utils` feature is enabled. Not part of the stable parsing API.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests_rdef;

pub use crate::dxbc::{DxbcChunk, DxbcFile, DxbcHeader};
pub use crate::error::DxbcError;
pub use crate::fourcc::FourCC;
pub use crate::rdef::{
    parse_rdef_chunk, ProgramType, RdefChunk, RdefResourceBinding, ShaderInputType, ShaderTarget,
};
