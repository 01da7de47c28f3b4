use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use chunkyard_protocol::{UploadScope, UploadStatus, UploadStatusResponse};

use crate::TransferError;

/// Reference to one stored chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRef {
    /// ChunkStore key the bytes were written under.
    pub key: String,
    /// Byte length of the stored chunk.
    pub size: u64,
}

/// One in-flight chunked transfer.
///
/// Everything except the received-chunk map is fixed at creation.
#[derive(Debug, Clone)]
pub struct UploadSession {
    id: String,
    file_name: String,
    file_type: Option<String>,
    total_size: u64,
    chunk_size: u64,
    total_chunks: u32,
    scope: UploadScope,
    status: UploadStatus,
    /// Index -> stored chunk. Keys are always within `0..total_chunks`.
    received: BTreeMap<u32, ChunkRef>,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl UploadSession {
    /// Creates a new session with no chunks received.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        file_name: String,
        file_type: Option<String>,
        total_size: u64,
        chunk_size: u64,
        total_chunks: u32,
        scope: UploadScope,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            file_name,
            file_type,
            total_size,
            chunk_size,
            total_chunks,
            scope,
            status: UploadStatus::Initialized,
            received: BTreeMap::new(),
            created_at,
            expires_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn file_type(&self) -> Option<&str> {
        self.file_type.as_deref()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }

    pub fn scope(&self) -> &UploadScope {
        &self.scope
    }

    pub fn status(&self) -> UploadStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Checks a client-supplied index against `0..total_chunks`.
    pub fn validate_index(&self, index: i64) -> Result<u32, TransferError> {
        u32::try_from(index)
            .ok()
            .filter(|i| *i < self.total_chunks)
            .ok_or(TransferError::InvalidChunkIndex {
                index,
                total_chunks: self.total_chunks,
            })
    }

    /// Returns the stored chunk for `index`, if received.
    pub fn chunk(&self, index: u32) -> Option<&ChunkRef> {
        self.received.get(&index)
    }

    /// Records a received chunk. Returns `false` (and keeps the existing
    /// record) if the index was already present.
    pub fn record_chunk(&mut self, index: u32, chunk: ChunkRef) -> bool {
        debug_assert!(index < self.total_chunks);
        if self.received.contains_key(&index) {
            return false;
        }
        self.received.insert(index, chunk);
        true
    }

    /// Received chunks in ascending index order.
    pub fn chunks(&self) -> impl Iterator<Item = (u32, &ChunkRef)> {
        self.received.iter().map(|(i, c)| (*i, c))
    }

    pub fn received_count(&self) -> u32 {
        self.received.len() as u32
    }

    /// Sum of stored chunk sizes.
    pub fn received_bytes(&self) -> u64 {
        self.received.values().map(|c| c.size).sum()
    }

    /// Indices in `0..total_chunks` not yet received, ascending.
    pub fn missing_chunks(&self) -> Vec<u32> {
        (0..self.total_chunks)
            .filter(|i| !self.received.contains_key(i))
            .collect()
    }

    /// `true` when the received set equals `0..total_chunks`.
    pub fn is_complete(&self) -> bool {
        self.received.len() == self.total_chunks as usize
            && self.received.keys().copied().eq(0..self.total_chunks)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Received chunks as a percentage of `total_chunks`.
    pub fn progress_percent(&self) -> f64 {
        if self.total_chunks == 0 {
            return 0.0;
        }
        f64::from(self.received_count()) / f64::from(self.total_chunks) * 100.0
    }

    /// Read-only snapshot for status queries.
    pub fn status_response(&self) -> UploadStatusResponse {
        UploadStatusResponse {
            upload_id: self.id.clone(),
            file_name: self.file_name.clone(),
            file_type: self.file_type.clone(),
            total_chunks: self.total_chunks,
            received_count: self.received_count(),
            received_bytes: self.received_bytes(),
            missing_chunks: self.missing_chunks(),
            status: self.status,
            progress_percent: self.progress_percent(),
            created_at: format_timestamp(self.created_at),
            expires_at: format_timestamp(self.expires_at),
        }
    }
}

/// Formats a timestamp as RFC 3339 UTC with millisecond precision.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
