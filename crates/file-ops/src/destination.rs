//! Scope to storage-directory resolution.

use std::path::{Component, Path, PathBuf};

use chunkyard_protocol::UploadScope;

use crate::{DestinationError, FOLDERS_DIR, TEMP_DIR, UPLOADS_DIR};

/// Maps upload scopes to directories under a storage root.
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    storage_root: PathBuf,
    public_prefix: String,
}

/// A concrete, existing directory an artifact can be written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    dir: PathBuf,
    /// Path segments of `dir` relative to the storage root.
    segments: Vec<String>,
    public_prefix: String,
}

impl DestinationResolver {
    /// Creates a resolver rooted at `storage_root`.
    ///
    /// `public_prefix` is prepended to location references so the static
    /// file server can map them back to URLs.
    pub fn new(storage_root: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        Self {
            storage_root: storage_root.into(),
            public_prefix: public_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns the storage root.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Resolves `scope` to a directory and creates it if absent.
    pub async fn resolve(&self, scope: &UploadScope) -> Result<Destination, DestinationError> {
        let segments = scope_segments(scope)?;
        let dir = segments
            .iter()
            .fold(self.storage_root.clone(), |dir, seg| dir.join(seg));

        tokio::fs::create_dir_all(&dir).await?;
        tracing::debug!(path = %dir.display(), "destination directory ready");

        Ok(Destination {
            dir,
            segments,
            public_prefix: self.public_prefix.clone(),
        })
    }
}

impl Destination {
    /// Directory the artifact is written into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full path of an artifact named `file_name` in this destination.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Location reference for an artifact, e.g. `static/uploads/p1/<name>`.
    pub fn location_ref(&self, file_name: &str) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.segments.len() + 2);
        if !self.public_prefix.is_empty() {
            parts.push(&self.public_prefix);
        }
        parts.extend(self.segments.iter().map(String::as_str));
        parts.push(file_name);
        parts.join("/")
    }
}

/// Checks that a scope's id can be used as a single directory name.
///
/// Rejects empty ids, separators, `.`/`..`, NUL bytes, and ids that would
/// alias the reserved `folders`/`temp` directories.
pub fn validate_scope(scope: &UploadScope) -> Result<(), DestinationError> {
    scope_segments(scope).map(|_| ())
}

fn scope_segments(scope: &UploadScope) -> Result<Vec<String>, DestinationError> {
    let segments = match scope {
        UploadScope::Project(id) => {
            validate_scope_id(id)?;
            if id == FOLDERS_DIR || id == TEMP_DIR {
                return Err(DestinationError::InvalidScopeId(format!(
                    "reserved project id: {id}"
                )));
            }
            vec![UPLOADS_DIR.to_string(), id.clone()]
        }
        UploadScope::Folder(id) => {
            validate_scope_id(id)?;
            vec![UPLOADS_DIR.to_string(), FOLDERS_DIR.to_string(), id.clone()]
        }
        UploadScope::Temporary => vec![UPLOADS_DIR.to_string(), TEMP_DIR.to_string()],
    };
    Ok(segments)
}

fn validate_scope_id(id: &str) -> Result<(), DestinationError> {
    if id.is_empty() {
        return Err(DestinationError::InvalidScopeId("empty id".into()));
    }
    if id.contains('\0') || id.contains('/') || id.contains('\\') {
        return Err(DestinationError::InvalidScopeId(format!(
            "id contains reserved characters: {id:?}"
        )));
    }

    let mut components = Path::new(id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(DestinationError::InvalidScopeId(format!(
            "id is not a plain name: {id}"
        ))),
    }
}
