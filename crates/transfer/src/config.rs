//! Transfer configuration.
//!
//! Read from a camelCase JSON file. Every field is optional; missing or
//! out-of-range values fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chunkyard_file_ops::DestinationResolver;
use serde::{Deserialize, Serialize};

use crate::TransferError;
use crate::store::FsChunkStore;

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 24 * 60 * 60;

/// Longest accepted session lifetime: 30 days.
pub const MAX_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Default expiry sweep period: 5 minutes.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;

/// Longest accepted sweep period: 1 day.
pub const MAX_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default upper bound on `totalChunks` per session.
pub const DEFAULT_MAX_CHUNKS: u32 = 100_000;

/// On-disk config format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    chunk_dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    storage_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_prefix: Option<String>,
    #[serde(default)]
    session_ttl_secs: u64,
    #[serde(default)]
    sweep_interval_secs: u64,
    #[serde(default)]
    max_chunks: u32,
}

/// Runtime configuration of the upload core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferConfig {
    /// Directory raw chunks are stored in.
    pub chunk_dir: PathBuf,
    /// Root of the durable artifact store.
    pub storage_root: PathBuf,
    /// Prefix of returned location references.
    pub public_prefix: String,
    /// Session lifetime, `1..=MAX_SESSION_TTL_SECS`.
    pub session_ttl_secs: u64,
    /// Expiry sweep period, `1..=MAX_SWEEP_INTERVAL_SECS`.
    pub sweep_interval_secs: u64,
    /// Largest `totalChunks` a session may declare.
    pub max_chunks: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_dir: PathBuf::from("temp_chunks"),
            storage_root: PathBuf::from("static"),
            public_prefix: "static".into(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            max_chunks: DEFAULT_MAX_CHUNKS,
        }
    }
}

impl TransferConfig {
    /// Loads configuration from `path`.
    ///
    /// A missing file yields defaults. A file that fails to parse is logged
    /// and also yields defaults; only read errors are returned.
    pub fn load(path: &Path) -> Result<Self, TransferError> {
        let mut config = Self::default();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no transfer config, using defaults");
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)?;
        let file = match serde_json::from_str::<ConfigFile>(&content) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse transfer config, using defaults"
                );
                return Ok(config);
            }
        };

        if let Some(dir) = file.chunk_dir.filter(|d| !d.as_os_str().is_empty()) {
            config.chunk_dir = dir;
        }
        if let Some(root) = file.storage_root.filter(|r| !r.as_os_str().is_empty()) {
            config.storage_root = root;
        }
        if let Some(prefix) = file.public_prefix {
            config.public_prefix = prefix;
        }
        if (1..=MAX_SESSION_TTL_SECS).contains(&file.session_ttl_secs) {
            config.session_ttl_secs = file.session_ttl_secs;
        }
        if (1..=MAX_SWEEP_INTERVAL_SECS).contains(&file.sweep_interval_secs) {
            config.sweep_interval_secs = file.sweep_interval_secs;
        }
        if file.max_chunks > 0 {
            config.max_chunks = file.max_chunks;
        }

        Ok(config)
    }

    /// Saves configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), TransferError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = ConfigFile {
            chunk_dir: Some(self.chunk_dir.clone()),
            storage_root: Some(self.storage_root.clone()),
            public_prefix: Some(self.public_prefix.clone()),
            session_ttl_secs: self.session_ttl_secs,
            sweep_interval_secs: self.sweep_interval_secs,
            max_chunks: self.max_chunks,
        };

        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json)?;

        tracing::debug!(path = %path.display(), "transfer configuration saved");
        Ok(())
    }

    /// Session lifetime, clamped to the accepted range.
    pub fn session_ttl(&self) -> chrono::Duration {
        let secs = self.session_ttl_secs.clamp(1, MAX_SESSION_TTL_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    /// Expiry sweep period, clamped to the accepted range.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.clamp(1, MAX_SWEEP_INTERVAL_SECS))
    }

    /// Filesystem chunk store rooted at [`chunk_dir`](Self::chunk_dir).
    pub fn chunk_store(&self) -> FsChunkStore {
        FsChunkStore::new(&self.chunk_dir)
    }

    /// Destination resolver rooted at [`storage_root`](Self::storage_root).
    pub fn destination_resolver(&self) -> DestinationResolver {
        DestinationResolver::new(&self.storage_root, &self.public_prefix)
    }
}
