//! Ordered reassembly of a completed session.

use std::path::PathBuf;

use chunkyard_file_ops::{Destination, PartialArtifact};
use sha2::{Digest, Sha256};

use crate::TransferError;
use crate::store::ChunkStore;
use crate::types::UploadSession;

/// A published artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledArtifact {
    pub path: PathBuf,
    pub size: u64,
    /// SHA-256 hex digest of the artifact contents.
    pub checksum: String,
}

/// Concatenates a session's chunks, in ascending index order, into one file.
///
/// Source chunks are left in the store; the caller deletes them once the
/// artifact is published, so a failed assembly can be retried or inspected.
pub struct Assembler<'a> {
    store: &'a dyn ChunkStore,
}

impl<'a> Assembler<'a> {
    pub fn new(store: &'a dyn ChunkStore) -> Self {
        Self { store }
    }

    /// Writes the artifact `final_name` into `dest`.
    ///
    /// Fails with [`TransferError::SizeMismatch`] if the concatenated size
    /// differs from the session's declared total. On any failure the
    /// partially written artifact is removed and nothing appears under
    /// `final_name`.
    pub async fn assemble(
        &self,
        session: &UploadSession,
        dest: &Destination,
        final_name: &str,
    ) -> Result<AssembledArtifact, TransferError> {
        let mut artifact = PartialArtifact::create(dest, final_name).await?;
        let mut hasher = Sha256::new();

        if let Err(e) = self.copy_chunks(session, &mut artifact, &mut hasher).await {
            artifact.discard().await;
            return Err(e);
        }

        let actual = artifact.written();
        if actual != session.total_size() {
            tracing::warn!(
                upload_id = session.id(),
                expected = session.total_size(),
                actual,
                "assembled size mismatch, discarding artifact"
            );
            artifact.discard().await;
            return Err(TransferError::SizeMismatch {
                expected: session.total_size(),
                actual,
            });
        }

        let path = artifact.publish().await?;
        Ok(AssembledArtifact {
            path,
            size: actual,
            checksum: hex::encode(hasher.finalize()),
        })
    }

    async fn copy_chunks(
        &self,
        session: &UploadSession,
        artifact: &mut PartialArtifact,
        hasher: &mut Sha256,
    ) -> Result<(), TransferError> {
        for (index, chunk) in session.chunks() {
            let data = self.store.read(&chunk.key).await?;
            artifact.write(&data).await?;
            hasher.update(&data);
            tracing::trace!(
                upload_id = session.id(),
                chunk_index = index,
                bytes = data.len(),
                "chunk appended"
            );
        }
        Ok(())
    }
}
