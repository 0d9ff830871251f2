use core::fmt;
use core::ops::Range;

use crate::error::DxbcError;
use crate::fourcc::FourCC;
use crate::rdef::{parse_rdef_chunk, RdefChunk};

const MAGIC: FourCC = FourCC(*b"DXBC");
/// magic, 16-byte checksum, reserved word, total size, chunk count.
const HEADER_SIZE: usize = 32;
/// fourcc and payload size.
const CHUNK_HEADER_SIZE: usize = 8;
/// Shader compilers emit well under a dozen chunks.
const MAX_CHUNKS: u32 = 4096;

/// The fixed header of a `DXBC` container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DxbcHeader {
    /// Always `DXBC` once parsed.
    pub magic: FourCC,
    /// Stored checksum; never verified.
    pub checksum: [u8; 16],
    /// Size of the container in bytes, as declared by the header.
    pub total_size: u32,
    /// Number of entries in the chunk offset table.
    pub chunk_count: u32,
}

/// A chunk of a `DXBC` container, borrowed from the container bytes.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DxbcChunk<'a> {
    /// Chunk tag such as `RDEF` or `SHEX`.
    pub fourcc: FourCC,
    /// Chunk payload, without the 8-byte chunk header.
    pub data: &'a [u8],
}

impl fmt::Debug for DxbcChunk<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DxbcChunk({} {} bytes)", self.fourcc, self.data.len())
    }
}

#[derive(Debug, Clone)]
struct ChunkEntry {
    fourcc: FourCC,
    payload: Range<usize>,
}

/// A validated `DXBC` container.
///
/// The chunk table is resolved once by [`DxbcFile::parse`]; the accessors only hand out
/// sub-slices of ranges that were checked against the declared container size.
#[derive(Debug, Clone)]
pub struct DxbcFile<'a> {
    bytes: &'a [u8],
    header: DxbcHeader,
    chunks: Vec<ChunkEntry>,
}

impl<'a> DxbcFile<'a> {
    /// Parses and validates a container. Shader blobs are untrusted input, so every malformed
    /// field is reported as an error.
    pub fn parse(bytes: &'a [u8]) -> Result<DxbcFile<'a>, DxbcError> {
        let header = parse_header(bytes)?;
        // `parse_header` checked total_size against the input length.
        let bytes = &bytes[..header.total_size as usize];

        let table_end = HEADER_SIZE + header.chunk_count as usize * 4;
        if table_end > bytes.len() {
            return Err(DxbcError::malformed_offsets(format!(
                "offset table of {} chunks ends at byte {table_end}, past total_size {}",
                header.chunk_count,
                bytes.len()
            )));
        }

        let chunks = (0..header.chunk_count as usize)
            .map(|index| {
                let offset = read_u32_le(bytes, HEADER_SIZE + index * 4)? as usize;
                resolve_chunk(bytes, index, offset, table_end)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DxbcFile { bytes, header, chunks })
    }

    /// The container header.
    pub fn header(&self) -> &DxbcHeader {
        &self.header
    }

    /// Container bytes, truncated to the declared `total_size`.
    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// All chunks in offset-table order.
    pub fn chunks(&self) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        let bytes = self.bytes;
        self.chunks.iter().map(move |entry| DxbcChunk {
            fourcc: entry.fourcc,
            data: &bytes[entry.payload.clone()],
        })
    }

    /// The first chunk tagged `fourcc`.
    pub fn get_chunk(&self, fourcc: FourCC) -> Option<DxbcChunk<'a>> {
        self.get_chunks(fourcc).next()
    }

    /// Every chunk tagged `fourcc`.
    pub fn get_chunks(&self, fourcc: FourCC) -> impl Iterator<Item = DxbcChunk<'a>> + '_ {
        self.chunks().filter(move |chunk| chunk.fourcc == fourcc)
    }

    /// Parses the resource definition chunk.
    ///
    /// The first `RDEF` chunk that parses wins, then the first `RD11`. When neither parses, the
    /// `RDEF` error is preferred. `None` means the container has no resource definitions at all.
    pub fn get_rdef(&self) -> Option<Result<RdefChunk, DxbcError>> {
        let rdef = self.first_parsed_rdef(FourCC::RDEF);
        if let Some(Ok(_)) = rdef {
            return rdef;
        }
        match (rdef, self.first_parsed_rdef(FourCC::RD11)) {
            (_, Some(Ok(rd11))) => Some(Ok(rd11)),
            (Some(err), _) => Some(err),
            (None, rd11) => rd11,
        }
    }

    fn first_parsed_rdef(&self, fourcc: FourCC) -> Option<Result<RdefChunk, DxbcError>> {
        let mut error = None;
        for chunk in self.get_chunks(fourcc) {
            match parse_rdef_chunk(chunk.data) {
                Ok(rdef) => return Some(Ok(rdef)),
                Err(err) if error.is_none() => {
                    error = Some(DxbcError::invalid_chunk(format!("{fourcc} chunk: {}", err.context())));
                }
                Err(_) => {}
            }
        }
        error.map(Err)
    }

    /// The shader program chunk (`SHEX` or `SHDR`), whichever comes first.
    pub fn find_first_shader_chunk(&self) -> Option<DxbcChunk<'a>> {
        self.chunks()
            .find(|chunk| matches!(chunk.fourcc, FourCC::SHEX | FourCC::SHDR))
    }

    /// One line for the header, then one line per chunk. Used in diagnostics.
    pub fn debug_summary(&self) -> String {
        let mut lines = vec![format!(
            "{} total_size={} chunk_count={}",
            self.header.magic, self.header.total_size, self.header.chunk_count
        )];
        lines.extend(
            self.chunks()
                .enumerate()
                .map(|(i, chunk)| format!("  [{i:02}] {} {} bytes", chunk.fourcc, chunk.data.len())),
        );
        lines.join("\n")
    }
}

fn parse_header(bytes: &[u8]) -> Result<DxbcHeader, DxbcError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DxbcError::malformed_header(format!(
            "container is {} bytes, shorter than the {HEADER_SIZE}-byte header",
            bytes.len()
        )));
    }

    let magic = FourCC(read_array(bytes, 0)?);
    if magic != MAGIC {
        return Err(DxbcError::malformed_header(format!("magic is {magic:?}, not {MAGIC:?}")));
    }
    let checksum = read_array(bytes, 4)?;
    let total_size = read_u32_le(bytes, 24)?;
    let chunk_count = read_u32_le(bytes, 28)?;

    if (total_size as usize) < HEADER_SIZE {
        return Err(DxbcError::malformed_header(format!(
            "total_size {total_size} does not cover the header"
        )));
    }
    if total_size as usize > bytes.len() {
        return Err(DxbcError::out_of_bounds(format!(
            "total_size {total_size} is larger than the {}-byte input",
            bytes.len()
        )));
    }
    if chunk_count > MAX_CHUNKS {
        return Err(DxbcError::malformed_offsets(format!(
            "chunk_count {chunk_count} is above the limit of {MAX_CHUNKS}"
        )));
    }

    Ok(DxbcHeader {
        magic,
        checksum,
        total_size,
        chunk_count,
    })
}

/// Checks that chunk `index` starts after the offset table and that its header and payload
/// lie inside `bytes`.
fn resolve_chunk(bytes: &[u8], index: usize, offset: usize, table_end: usize) -> Result<ChunkEntry, DxbcError> {
    if offset < table_end {
        return Err(DxbcError::malformed_offsets(format!(
            "chunk {index} starts at {offset}, inside the header or offset table (ends at {table_end})"
        )));
    }

    let fourcc = FourCC(read_array(bytes, offset).map_err(|_| {
        DxbcError::out_of_bounds(format!("chunk {index} header at {offset} is past total_size {}", bytes.len()))
    })?);
    let size = read_u32_le(bytes, offset.saturating_add(4)).map_err(|_| {
        DxbcError::out_of_bounds(format!("chunk {index} header at {offset} is past total_size {}", bytes.len()))
    })? as usize;

    let start = offset.saturating_add(CHUNK_HEADER_SIZE);
    let end = start
        .checked_add(size)
        .ok_or_else(|| DxbcError::malformed_offsets(format!("chunk {index} size {size} overflows")))?;
    if end > bytes.len() {
        return Err(DxbcError::out_of_bounds(format!(
            "chunk {index} ({fourcc}) payload {start}..{end} is past total_size {}",
            bytes.len()
        )));
    }

    Ok(ChunkEntry {
        fourcc,
        payload: start..end,
    })
}

fn read_array<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N], DxbcError> {
    offset
        .checked_add(N)
        .and_then(|end| bytes.get(offset..end))
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| {
            DxbcError::out_of_bounds(format!(
                "reading {N} bytes at offset {offset} of a {}-byte buffer",
                bytes.len()
            ))
        })
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32, DxbcError> {
    read_array(bytes, offset).map(u32::from_le_bytes)
}
