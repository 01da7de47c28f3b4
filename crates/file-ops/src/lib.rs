//! Durable storage for assembled uploads.
//!
//! Maps an upload scope to a directory under the storage root, names
//! artifacts so repeated uploads of the same file never collide, and stages
//! writes under a `.part` name until the artifact is complete.

mod artifact;
mod destination;

pub use artifact::{PartialArtifact, artifact_file_name, sanitize_file_name};
pub use destination::{Destination, DestinationResolver, validate_scope};

/// Directory under the storage root holding every artifact.
pub const UPLOADS_DIR: &str = "uploads";

/// Sub-directory of [`UPLOADS_DIR`] for folder-scoped artifacts.
pub const FOLDERS_DIR: &str = "folders";

/// Sub-directory of [`UPLOADS_DIR`] for unscoped artifacts.
pub const TEMP_DIR: &str = "temp";

/// Suffix of artifacts still being written.
pub const PART_SUFFIX: &str = ".part";

/// Errors produced while resolving or preparing a destination.
#[derive(Debug, thiserror::Error)]
pub enum DestinationError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid scope id: {0}")]
    InvalidScopeId(String),
}
