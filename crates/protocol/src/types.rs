use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Where an assembled artifact is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum UploadScope {
    /// Artifact belongs to a project.
    Project(String),
    /// Artifact belongs to a folder.
    Folder(String),
    /// No owner yet; the artifact lands in the temporary area.
    #[default]
    Temporary,
}

impl UploadScope {
    /// Builds a scope from the optional project/folder ids of a request.
    ///
    /// Empty ids count as absent. Supplying both is rejected.
    pub fn from_ids(
        project_id: Option<&str>,
        folder_id: Option<&str>,
    ) -> Result<Self, ProtocolError> {
        let project_id = project_id.filter(|id| !id.is_empty());
        let folder_id = folder_id.filter(|id| !id.is_empty());
        match (project_id, folder_id) {
            (Some(_), Some(_)) => Err(ProtocolError::ConflictingScope),
            (Some(project), None) => Ok(Self::Project(project.to_string())),
            (None, Some(folder)) => Ok(Self::Folder(folder.to_string())),
            (None, None) => Ok(Self::Temporary),
        }
    }
}

/// Lifecycle tag of an upload session.
///
/// Completed and cancelled sessions are dropped from the registry, so only
/// `Initialized` is ever observed through a status query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadStatus {
    #[serde(rename = "initialized")]
    Initialized,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "cancelled")]
    Cancelled,
}
