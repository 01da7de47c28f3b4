//! Raw chunk persistence.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::io::AsyncWriteExt;

use crate::types::UploadSession;

/// A boxed future returned by [`ChunkStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = io::Result<T>> + Send + 'a>>;

/// Key a chunk is stored under: `<uploadId>_chunk_<index>_<writeId>`.
///
/// `write_id` is unique per write, so two writes for the same index never
/// share a key and deleting one never touches the other.
pub fn chunk_key(upload_id: &str, index: u32, write_id: &str) -> String {
    format!("{upload_id}_chunk_{index}_{write_id}")
}

/// Persists raw chunk bytes for `(upload id, chunk index)`.
///
/// Every `write` returns a fresh key. Implementations must make a write
/// atomic: a concurrent `read` of the returned key observes either no chunk
/// or the complete payload.
pub trait ChunkStore: Send + Sync + 'static {
    /// Stores `data` under a new key and returns it.
    fn write<'a>(
        &'a self,
        upload_id: &'a str,
        index: u32,
        data: &'a [u8],
    ) -> StoreFuture<'a, String>;

    /// Reads a previously written chunk.
    fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>>;

    /// Deletes a chunk. Deleting a missing key succeeds.
    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Deletes every chunk recorded in `session` (best-effort).
///
/// Failures are logged and skipped. Returns the number of chunks that
/// could not be deleted.
pub(crate) async fn delete_chunks(store: &dyn ChunkStore, session: &UploadSession) -> usize {
    let mut failed = 0;
    for (index, chunk) in session.chunks() {
        if let Err(e) = store.delete(&chunk.key).await {
            failed += 1;
            tracing::warn!(
                upload_id = session.id(),
                chunk_index = index,
                error = %e,
                "failed to delete chunk"
            );
        }
    }
    failed
}

// ---------------------------------------------------------------------------
// FsChunkStore
// ---------------------------------------------------------------------------

/// Stores each chunk as a file under a root directory.
///
/// Writes go to a `.tmp` file first and are renamed into place, so readers
/// never see a torn chunk.
#[derive(Debug, Clone)]
pub struct FsChunkStore {
    root: PathBuf,
}

impl FsChunkStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn write_file(&self, key: &str, data: &[u8]) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;

        let final_path = self.path_for(key);
        let tmp_path = self.path_for(&format!("{key}.tmp"));

        let result = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &final_path).await
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&tmp_path).await;
        }
        result
    }
}

impl ChunkStore for FsChunkStore {
    fn write<'a>(
        &'a self,
        upload_id: &'a str,
        index: u32,
        data: &'a [u8],
    ) -> StoreFuture<'a, String> {
        Box::pin(async move {
            let write_id = uuid::Uuid::new_v4().simple().to_string();
            let key = chunk_key(upload_id, index, &write_id);
            self.write_file(&key, data).await?;
            Ok(key)
        })
    }

    fn read<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Vec<u8>> {
        Box::pin(async move { tokio::fs::read(self.path_for(key)).await })
    }

    fn delete<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            match tokio::fs::remove_file(self.path_for(key)).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            }
        })
    }
}
