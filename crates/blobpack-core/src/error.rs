//! Error types for the blobpack-core library.
//!
//! This module provides error handling using the `thiserror` crate. Read-side
//! failures (schema mismatches, absent fields) are deliberately not errors:
//! the validator answers `false` and getters fall back to zero values.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for blobpack operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all blobpack operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The allocator could not satisfy a buffer growth request
    #[error("failed to allocate {requested} bytes for blob buffer")]
    AllocationFailure {
        /// Capacity that was requested
        requested: usize,
    },

    /// A requested length is zero or beyond the configured ceiling
    #[error("requested size {requested} is outside the allowed range 1..={limit}")]
    SizeLimitExceeded {
        /// Length that was requested
        requested: usize,
        /// Largest length allowed
        limit: usize,
    },

    /// Bytes handed to the buffer do not describe a valid blob
    #[error("malformed blob buffer at offset {offset}: {details}")]
    MalformedBuffer {
        /// Byte offset where the problem was detected
        offset: usize,
        /// Description of the issue
        details: String,
    },

    /// A signature string could not be parsed
    #[error("invalid signature '{signature}' at position {position}: {details}")]
    InvalidSignature {
        /// The offending signature
        signature: String,
        /// Character position of the problem
        position: usize,
        /// Description of the issue
        details: String,
    },

    /// JSON text could not be decoded
    #[error("failed to decode JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Creates a new allocation failure error
    pub fn allocation_failure(requested: usize) -> Self {
        Self::AllocationFailure { requested }
    }

    /// Creates a new size limit error
    pub fn size_limit(requested: usize, limit: usize) -> Self {
        Self::SizeLimitExceeded { requested, limit }
    }

    /// Creates a new malformed buffer error
    pub fn malformed(offset: usize, details: impl Into<String>) -> Self {
        Self::MalformedBuffer {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new signature error
    pub fn invalid_signature(
        signature: impl Into<String>,
        position: usize,
        details: impl Into<String>,
    ) -> Self {
        Self::InvalidSignature {
            signature: signature.into(),
            position,
            details: details.into(),
        }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Returns true if the buffer is still usable after this error
    ///
    /// Growth failures leave the buffer in its last committed state, so the
    /// caller may reset and retry with smaller input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AllocationFailure { .. } | Self::SizeLimitExceeded { .. } | Self::Json(_)
        )
    }
}
