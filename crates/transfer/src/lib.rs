//! Chunked upload sessions with ordered, size-checked assembly.
//!
//! A client declares a file (name, total size, chunk size, chunk count),
//! sends its chunks in any order and any number of times, then asks for
//! completion. The [`UploadSessionManager`] records each chunk once, checks
//! that every index arrived, concatenates chunks in index order into the
//! destination, and only exposes the artifact if its size matches.

mod assembler;
mod checksum;
mod config;
mod manager;
mod registry;
mod store;
mod sweeper;
mod types;
mod validation;

pub use assembler::{AssembledArtifact, Assembler};
pub use checksum::{checksum_bytes, verify_checksum};
pub use config::TransferConfig;
pub use manager::UploadSessionManager;
pub use registry::{ClaimedSession, SessionRegistry};
pub use store::{ChunkStore, FsChunkStore, StoreFuture, chunk_key};
pub use sweeper::ExpirySweeper;
pub use types::{ChunkRef, UploadSession};
pub use validation::validate_file_name;

use chunkyard_file_ops::DestinationError;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("invalid chunk count: expected {expected}, got {actual}")]
    InvalidChunkCount { expected: u64, actual: u64 },

    #[error("too many chunks: {total_chunks} exceeds the limit of {max}")]
    TooManyChunks { total_chunks: u32, max: u32 },

    #[error("invalid upload size: {0}")]
    InvalidSize(String),

    #[error("upload session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid chunk index {index}: expected 0-{}", .total_chunks.saturating_sub(1))]
    InvalidChunkIndex { index: i64, total_chunks: u32 },

    #[error("incomplete upload, missing chunks: {missing:?}")]
    IncompleteUpload { missing: Vec<u32> },

    #[error("file size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("checksum mismatch for chunk {index}")]
    ChecksumMismatch { index: u32 },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Protocol(#[from] chunkyard_protocol::ProtocolError),

    #[error("storage failure: {0}")]
    Storage(#[from] std::io::Error),

    #[error("destination error: {0}")]
    Destination(DestinationError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl TransferError {
    /// Returns `true` for I/O-class failures (chunk or artifact storage).
    ///
    /// Everything else is a validation error the caller can act on.
    pub fn is_storage_failure(&self) -> bool {
        matches!(
            self,
            TransferError::Storage(_) | TransferError::Destination(DestinationError::Io(_))
        )
    }
}

impl From<DestinationError> for TransferError {
    fn from(e: DestinationError) -> Self {
        match e {
            DestinationError::InvalidScopeId(msg) => TransferError::InvalidPath(msg),
            other => TransferError::Destination(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_failures_are_classified() {
        let io = std::io::Error::other("disk full");
        assert!(TransferError::Storage(io).is_storage_failure());

        let dest = DestinationError::Io(std::io::Error::other("read-only"));
        assert!(TransferError::from(dest).is_storage_failure());

        assert!(!TransferError::SessionNotFound("u1".into()).is_storage_failure());
    }

    #[test]
    fn invalid_scope_id_maps_to_invalid_path() {
        let err = TransferError::from(DestinationError::InvalidScopeId("..".into()));
        assert!(matches!(err, TransferError::InvalidPath(_)));
    }

    #[test]
    fn error_messages_name_the_details() {
        let err = TransferError::IncompleteUpload { missing: vec![1, 3] };
        assert_eq!(err.to_string(), "incomplete upload, missing chunks: [1, 3]");

        let err = TransferError::SizeMismatch {
            expected: 300,
            actual: 250,
        };
        assert_eq!(err.to_string(), "file size mismatch: expected 300, got 250");

        let err = TransferError::InvalidChunkIndex {
            index: 5,
            total_chunks: 3,
        };
        assert_eq!(err.to_string(), "invalid chunk index 5: expected 0-2");

        let err = TransferError::TooManyChunks {
            total_chunks: 20,
            max: 10,
        };
        assert_eq!(err.to_string(), "too many chunks: 20 exceeds the limit of 10");
    }
}
