//! Upload session lifecycle: initiate, ingest, complete, cancel, status.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use chunkyard_file_ops::{DestinationResolver, artifact_file_name, validate_scope};
use chunkyard_protocol::{
    CancelUploadResponse, CompleteUploadRequest, CompleteUploadResponse, InitUploadRequest,
    InitUploadResponse, UploadChunkRequest, UploadChunkResponse, UploadStatusResponse,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::TransferError;
use crate::assembler::Assembler;
use crate::checksum::verify_checksum;
use crate::config::{DEFAULT_MAX_CHUNKS, TransferConfig};
use crate::registry::SessionRegistry;
use crate::store::{ChunkStore, delete_chunks};
use crate::types::{ChunkRef, UploadSession, format_timestamp};
use crate::validation::validate_file_name;

/// Owns every in-flight upload session.
///
/// All operations may be called concurrently from any number of tasks.
/// No lock is held across chunk or artifact I/O.
pub struct UploadSessionManager {
    registry: Arc<SessionRegistry>,
    store: Arc<dyn ChunkStore>,
    resolver: DestinationResolver,
    session_ttl: chrono::Duration,
    max_chunks: u32,
}

impl UploadSessionManager {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        resolver: DestinationResolver,
        session_ttl: chrono::Duration,
    ) -> Self {
        Self {
            registry: Arc::new(SessionRegistry::new()),
            store,
            resolver,
            session_ttl,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }

    /// Sets the largest `total_chunks` a session may declare.
    pub fn with_max_chunks(mut self, max_chunks: u32) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    /// Builds a manager backed by the filesystem stores named in `config`.
    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(
            Arc::new(config.chunk_store()),
            config.destination_resolver(),
            config.session_ttl(),
        )
        .with_max_chunks(config.max_chunks)
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Opens a session after checking the declared layout.
    ///
    /// `total_chunks` must equal `ceil(total_size / chunk_size)` and stay
    /// within the configured chunk limit.
    pub async fn initiate(
        &self,
        req: &InitUploadRequest,
    ) -> Result<InitUploadResponse, TransferError> {
        if req.total_size == 0 {
            return Err(TransferError::InvalidSize(
                "totalSize must be greater than 0".into(),
            ));
        }
        if req.chunk_size == 0 {
            return Err(TransferError::InvalidSize(
                "chunkSize must be greater than 0".into(),
            ));
        }
        validate_file_name(&req.file_name)?;

        let scope = req.scope()?;
        validate_scope(&scope)?;

        let expected = req.total_size.div_ceil(req.chunk_size);
        if expected != u64::from(req.total_chunks) {
            return Err(TransferError::InvalidChunkCount {
                expected,
                actual: u64::from(req.total_chunks),
            });
        }
        if req.total_chunks > self.max_chunks {
            return Err(TransferError::TooManyChunks {
                total_chunks: req.total_chunks,
                max: self.max_chunks,
            });
        }

        let upload_id = Uuid::new_v4().to_string();
        let created_at = Utc::now();
        let expires_at = created_at + self.session_ttl;
        let session = UploadSession::new(
            upload_id.clone(),
            req.file_name.clone(),
            req.file_type.clone(),
            req.total_size,
            req.chunk_size,
            req.total_chunks,
            scope,
            created_at,
            expires_at,
        );
        self.registry.insert(session).await;

        info!(
            upload_id = %upload_id,
            file_name = %req.file_name,
            total_size = req.total_size,
            total_chunks = req.total_chunks,
            "upload initiated"
        );

        Ok(InitUploadResponse {
            upload_id,
            chunk_size: req.chunk_size,
            total_chunks: req.total_chunks,
            expires_at: format_timestamp(expires_at),
        })
    }

    /// Stores one chunk. Re-sending an already received index is accepted
    /// without touching storage.
    pub async fn ingest_chunk(
        &self,
        req: &UploadChunkRequest,
        data: &[u8],
    ) -> Result<UploadChunkResponse, TransferError> {
        let upload_id = req.upload_id.as_str();
        let (index, existing) = self
            .registry
            .inspect(upload_id, |s| {
                s.validate_index(req.chunk_index)
                    .map(|i| (i, s.chunk(i).map(|c| c.size)))
            })
            .await??;

        if let Some(size) = existing {
            debug!(upload_id, chunk_index = index, "chunk already received");
            return Ok(chunk_response(index, size, true));
        }

        if let Some(expected) = req.checksum.as_deref().filter(|c| !c.trim().is_empty())
            && !verify_checksum(data, expected)
        {
            warn!(upload_id, chunk_index = index, "chunk checksum mismatch");
            return Err(TransferError::ChecksumMismatch { index });
        }

        let key = self
            .store
            .write(upload_id, index, data)
            .await
            .inspect_err(|e| {
                warn!(upload_id, chunk_index = index, error = %e, "failed to store chunk");
            })?;

        let chunk = ChunkRef {
            key,
            size: data.len() as u64,
        };
        // Size of the chunk recorded first, if this write lost the race.
        let previous = self
            .registry
            .update(upload_id, |s| {
                if s.record_chunk(index, chunk.clone()) {
                    None
                } else {
                    s.chunk(index).map(|c| c.size)
                }
            })
            .await;

        match previous {
            Ok(None) => {
                debug!(
                    upload_id,
                    chunk_index = index,
                    bytes = chunk.size,
                    "chunk stored"
                );
                Ok(chunk_response(index, chunk.size, false))
            }
            Ok(Some(size)) => {
                self.discard_chunk(upload_id, index, &chunk.key).await;
                debug!(upload_id, chunk_index = index, "chunk already received");
                Ok(chunk_response(index, size, true))
            }
            Err(e) => {
                // Cancelled, expired, or claimed for completion meanwhile.
                self.discard_chunk(upload_id, index, &chunk.key).await;
                Err(e)
            }
        }
    }

    /// Deletes a chunk this ingest wrote but did not record (best-effort).
    async fn discard_chunk(&self, upload_id: &str, index: u32, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            warn!(
                upload_id,
                chunk_index = index,
                error = %e,
                "failed to delete unrecorded chunk"
            );
        }
    }

    /// Assembles a fully received session into its destination.
    ///
    /// On success the session is gone and its chunks are deleted. On any
    /// failure after the completeness check the session and its chunks are
    /// kept, so the caller can retry or cancel. While assembly runs the
    /// session is invisible to other operations.
    pub async fn complete(
        &self,
        req: &CompleteUploadRequest,
    ) -> Result<CompleteUploadResponse, TransferError> {
        let mut claim = self.registry.take_complete(&req.upload_id).await?;
        let session = claim.session();

        if !req.chunks.is_empty() && req.chunks.len() != session.total_chunks() as usize {
            warn!(
                upload_id = %req.upload_id,
                listed = req.chunks.len(),
                total_chunks = session.total_chunks(),
                "client chunk list disagrees with session, using server record"
            );
        }

        match self.assemble(session).await {
            Ok(response) => {
                claim.disarm();
                let session = claim.session();
                let failed = delete_chunks(self.store.as_ref(), session).await;
                info!(
                    upload_id = session.id(),
                    artifact_id = %response.artifact_id,
                    location = %response.location_ref,
                    size = response.size,
                    undeleted_chunks = failed,
                    "upload completed"
                );
                Ok(response)
            }
            Err(e) => {
                error!(
                    upload_id = %req.upload_id,
                    error = %e,
                    "upload assembly failed, session kept"
                );
                claim.restore().await;
                Err(e)
            }
        }
    }

    async fn assemble(
        &self,
        session: &UploadSession,
    ) -> Result<CompleteUploadResponse, TransferError> {
        let dest = self.resolver.resolve(session.scope()).await?;
        let artifact_id = Uuid::new_v4().to_string();
        let final_name = artifact_file_name(&artifact_id, session.file_name());

        let artifact = Assembler::new(self.store.as_ref())
            .assemble(session, &dest, &final_name)
            .await?;

        Ok(CompleteUploadResponse {
            location_ref: dest.location_ref(&final_name),
            artifact_id,
            final_name,
            size: artifact.size,
            checksum: artifact.checksum,
            file_type: session.file_type().map(str::to_string),
            message: format!(
                "File '{}' uploaded successfully via chunked upload",
                session.file_name()
            ),
        })
    }

    /// Read-only snapshot of a session.
    pub async fn status(&self, upload_id: &str) -> Result<UploadStatusResponse, TransferError> {
        self.registry
            .inspect(upload_id, UploadSession::status_response)
            .await
    }

    /// Drops a session and deletes its stored chunks (best-effort).
    pub async fn cancel(&self, upload_id: &str) -> Result<CancelUploadResponse, TransferError> {
        let session = self.registry.remove(upload_id).await?;
        let failed = delete_chunks(self.store.as_ref(), &session).await;
        info!(
            upload_id,
            chunks = session.received_count(),
            undeleted_chunks = failed,
            "upload cancelled"
        );
        Ok(CancelUploadResponse {
            message: format!("Upload {upload_id} cancelled successfully"),
        })
    }

    /// Cancels every session that expired at or before `now`.
    ///
    /// Returns the ids that were removed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut removed = Vec::new();
        for upload_id in self.registry.expired_ids(now).await {
            match self.cancel(&upload_id).await {
                Ok(_) => {
                    info!(upload_id = %upload_id, "expired upload removed");
                    removed.push(upload_id);
                }
                // Completed or cancelled since the scan.
                Err(TransferError::SessionNotFound(_)) => {}
                Err(e) => {
                    warn!(upload_id = %upload_id, error = %e, "failed to remove expired upload");
                }
            }
        }
        removed
    }
}

fn chunk_response(index: u32, size: u64, duplicate: bool) -> UploadChunkResponse {
    let message = if duplicate {
        format!("Chunk {index} already received")
    } else {
        format!("Chunk {index} uploaded successfully")
    };
    UploadChunkResponse {
        chunk_index: index,
        chunk_size: size,
        accepted: true,
        duplicate,
        message,
    }
}
