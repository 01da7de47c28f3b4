//! Request/response payloads exchanged between the HTTP layer and the
//! chunked-upload core.
//!
//! Field names are camelCase on the wire to match the browser upload client.

pub mod messages;
pub mod types;

pub use messages::{
    CancelUploadResponse, CompleteUploadRequest, CompleteUploadResponse, InitUploadRequest,
    InitUploadResponse, UploadChunkRequest, UploadChunkResponse, UploadStatusResponse,
};
pub use types::{UploadScope, UploadStatus};

/// Errors produced while interpreting protocol payloads.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("projectId and folderId are mutually exclusive")]
    ConflictingScope,
}
