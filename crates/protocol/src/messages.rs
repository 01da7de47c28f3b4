use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::types::{UploadScope, UploadStatus};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Starts a new chunked upload session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadRequest {
    pub file_name: String,
    pub total_size: u64,
    pub chunk_size: u64,
    pub total_chunks: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
}

impl InitUploadRequest {
    /// Resolves the destination scope named by this request.
    pub fn scope(&self) -> Result<UploadScope, ProtocolError> {
        UploadScope::from_ids(self.project_id.as_deref(), self.folder_id.as_deref())
    }
}

/// Metadata accompanying one chunk payload.
///
/// The chunk bytes travel separately (multipart body); this is the form part.
/// `chunk_index` is signed because it arrives unvalidated from the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkRequest {
    pub upload_id: String,
    pub chunk_index: i64,
    /// SHA-256 hex digest of the chunk (absent means no verification).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Finalizes an upload.
///
/// `chunks` is the client's own list of chunk ids. It is only a hint; the
/// server's record of received chunks is authoritative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub upload_id: String,
    pub file_name: String,
    #[serde(default)]
    pub chunks: Vec<String>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Reply to [`InitUploadRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitUploadResponse {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_chunks: u32,
    /// RFC 3339 UTC timestamp.
    pub expires_at: String,
}

/// Acknowledges one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadChunkResponse {
    pub chunk_index: u32,
    /// Byte length stored for this index.
    pub chunk_size: u64,
    pub accepted: bool,
    /// `true` when the index had already been received and nothing was written.
    #[serde(default)]
    pub duplicate: bool,
    pub message: String,
}

/// Result of a successful assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadResponse {
    pub artifact_id: String,
    pub final_name: String,
    /// Reference the static file server resolves to a public URL.
    pub location_ref: String,
    pub size: u64,
    /// SHA-256 hex digest of the assembled artifact.
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub message: String,
}

/// Read-only snapshot of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatusResponse {
    pub upload_id: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    pub total_chunks: u32,
    pub received_count: u32,
    pub received_bytes: u64,
    pub missing_chunks: Vec<u32>,
    pub status: UploadStatus,
    pub progress_percent: f64,
    pub created_at: String,
    pub expires_at: String,
}

/// Reply to a cancel request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelUploadResponse {
    pub message: String,
}
