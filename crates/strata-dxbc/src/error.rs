use thiserror::Error;

/// Errors produced while parsing a `DXBC` container or one of its chunks.
///
/// Every variant carries a human-readable context string describing which
/// field or offset failed validation. Use [`DxbcError::context`] to retrieve it
/// without the variant prefix, e.g. when nesting one error inside another.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DxbcError {
    /// The fixed container header is truncated or contains invalid values.
    #[error("malformed DXBC header: {context}")]
    MalformedHeader {
        /// Description of the failing header field.
        context: String,
    },

    /// An offset or size points outside the container's declared bounds.
    #[error("DXBC out of bounds: {context}")]
    OutOfBounds {
        /// Description of the out-of-range access.
        context: String,
    },

    /// The chunk offset table is malformed.
    #[error("malformed DXBC chunk offsets: {context}")]
    MalformedOffsets {
        /// Description of the invalid offset.
        context: String,
    },

    /// A chunk payload could not be parsed.
    #[error("invalid DXBC chunk: {context}")]
    InvalidChunk {
        /// Description of the parse failure.
        context: String,
    },
}

impl DxbcError {
    pub(crate) fn malformed_header(context: impl Into<String>) -> Self {
        Self::MalformedHeader {
            context: context.into(),
        }
    }

    pub(crate) fn out_of_bounds(context: impl Into<String>) -> Self {
        Self::OutOfBounds {
            context: context.into(),
        }
    }

    pub(crate) fn malformed_offsets(context: impl Into<String>) -> Self {
        Self::MalformedOffsets {
            context: context.into(),
        }
    }

    pub(crate) fn invalid_chunk(context: impl Into<String>) -> Self {
        Self::InvalidChunk {
            context: context.into(),
        }
    }

    /// Returns the context string without the error-kind prefix.
    pub fn context(&self) -> &str {
        match self {
            Self::MalformedHeader { context }
            | Self::OutOfBounds { context }
            | Self::MalformedOffsets { context }
            | Self::InvalidChunk { context } => context,
        }
    }
}
