//! Periodic removal of expired upload sessions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::manager::UploadSessionManager;

/// Background task that cancels expired sessions every `period`.
///
/// Dropping the sweeper stops it; [`stop`](Self::stop) also waits for an
/// in-progress sweep to finish.
pub struct ExpirySweeper {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweeper {
    /// Spawns the sweep loop on the current runtime. The first sweep runs
    /// immediately.
    pub fn start(manager: Arc<UploadSessionManager>, period: Duration) -> Self {
        // `interval` panics on a zero period.
        let period = period.max(Duration::from_millis(1));
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(sweep_loop(manager, period, cancel.clone()));
        tracing::info!(period_secs = period.as_secs_f64(), "expiry sweeper started");
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop and waits for it to exit.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "expiry sweeper task failed");
        }
        tracing::info!("expiry sweeper stopped");
    }
}

impl Drop for ExpirySweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn sweep_loop(
    manager: Arc<UploadSessionManager>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let removed = manager.sweep_expired(chrono::Utc::now()).await;
                if !removed.is_empty() {
                    tracing::info!(count = removed.len(), "expired uploads swept");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chunkyard_file_ops::DestinationResolver;
    use chunkyard_protocol::{InitUploadRequest, UploadChunkRequest};
    use tempfile::TempDir;

    use super::*;
    use crate::store::FsChunkStore;

    fn manager(dir: &TempDir, ttl: chrono::Duration) -> Arc<UploadSessionManager> {
        Arc::new(UploadSessionManager::new(
            Arc::new(FsChunkStore::new(dir.path().join("chunks"))),
            DestinationResolver::new(dir.path().join("static"), "static"),
            ttl,
        ))
    }

    fn init_req() -> InitUploadRequest {
        InitUploadRequest {
            file_name: "e.bin".into(),
            total_size: 2,
            chunk_size: 1,
            total_chunks: 2,
            file_type: None,
            project_id: None,
            folder_id: None,
        }
    }

    #[tokio::test]
    async fn sweeps_expired_sessions_in_background() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, chrono::Duration::zero());
        let init = manager.initiate(&init_req()).await.unwrap();
        manager
            .ingest_chunk(
                &UploadChunkRequest {
                    upload_id: init.upload_id.clone(),
                    chunk_index: 0,
                    checksum: None,
                },
                b"a",
            )
            .await
            .unwrap();

        let sweeper = ExpirySweeper::start(Arc::clone(&manager), Duration::from_millis(10));
        assert!(sweeper.is_running());

        let mut swept = false;
        for _ in 0..200 {
            if manager.registry().is_empty().await {
                swept = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        sweeper.stop().await;

        assert!(swept, "expired session was not swept");
        let leftovers = std::fs::read_dir(dir.path().join("chunks")).unwrap().count();
        assert_eq!(leftovers, 0, "chunks of {} were not deleted", init.upload_id);
    }

    #[tokio::test]
    async fn live_sessions_survive_sweeps() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, chrono::Duration::hours(1));
        let init = manager.initiate(&init_req()).await.unwrap();

        let sweeper = ExpirySweeper::start(Arc::clone(&manager), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(50)).await;
        sweeper.stop().await;

        assert!(manager.registry().contains(&init.upload_id).await);
    }

    #[tokio::test]
    async fn drop_stops_the_loop() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir, chrono::Duration::hours(1));

        let sweeper = ExpirySweeper::start(Arc::clone(&manager), Duration::from_millis(5));
        drop(sweeper);

        for _ in 0..200 {
            if Arc::strong_count(&manager) == 1 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("sweeper task still holds the manager");
    }
}
