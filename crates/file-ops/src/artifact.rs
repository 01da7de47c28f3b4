//! Artifact naming and staged writes.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::PART_SUFFIX;
use crate::destination::Destination;

/// Upper bound for the sanitized part of a stored name, in bytes.
///
/// Leaves room for the artifact id prefix and the `.part` suffix within
/// the usual 255-byte file name limit.
const MAX_SANITIZED_LEN: usize = 200;

/// Longest extension kept intact when a name has to be shortened.
const MAX_KEPT_EXTENSION_LEN: usize = 16;

/// Write buffer for assembled artifacts (1 MiB).
const WRITE_BUFFER_SIZE: usize = 1024 * 1024;

/// Replaces characters that are unsafe in a stored file name with `_`.
///
/// Path separators, drive/stream separators, wildcard and quoting
/// characters, and control characters are replaced. Overlong names are
/// shortened while keeping a short extension. An empty result becomes `file`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return "file".to_string();
    }
    if cleaned.len() <= MAX_SANITIZED_LEN {
        return cleaned.to_string();
    }

    match cleaned.rfind('.') {
        Some(dot) if dot > 0 && cleaned.len() - dot <= MAX_KEPT_EXTENSION_LEN => {
            let ext = &cleaned[dot..];
            let stem = truncate_at_char_boundary(&cleaned[..dot], MAX_SANITIZED_LEN - ext.len());
            format!("{stem}{ext}")
        }
        _ => truncate_at_char_boundary(cleaned, MAX_SANITIZED_LEN).to_string(),
    }
}

/// Stored name of an artifact: `<artifactId>_<sanitized file name>`.
pub fn artifact_file_name(artifact_id: &str, file_name: &str) -> String {
    format!("{artifact_id}_{}", sanitize_file_name(file_name))
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

// ---------------------------------------------------------------------------
// PartialArtifact
// ---------------------------------------------------------------------------

/// An artifact being written under `<final name>.part`.
///
/// Nothing is visible under the final name until [`publish`](Self::publish)
/// succeeds. A partial artifact that is discarded, fails to publish, or is
/// dropped mid-write removes its staging file.
pub struct PartialArtifact {
    writer: BufWriter<File>,
    part_path: PathBuf,
    final_path: PathBuf,
    written: u64,
    done: bool,
}

impl PartialArtifact {
    /// Creates (or truncates) the staging file for `final_name` in `dest`.
    pub async fn create(dest: &Destination, final_name: &str) -> io::Result<Self> {
        let final_path = dest.path_for(final_name);
        let part_path = dest.path_for(&format!("{final_name}{PART_SUFFIX}"));
        let file = File::create(&part_path).await?;

        Ok(Self {
            writer: BufWriter::with_capacity(WRITE_BUFFER_SIZE, file),
            part_path,
            final_path,
            written: 0,
            done: false,
        })
    }

    /// Appends `data` to the artifact.
    pub async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data).await?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Bytes appended so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Path the artifact will have once published.
    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Flushes, syncs, and renames the staging file to its final name.
    pub async fn publish(mut self) -> io::Result<PathBuf> {
        self.writer.flush().await?;
        self.writer.get_ref().sync_all().await?;
        tokio::fs::rename(&self.part_path, &self.final_path).await?;
        self.done = true;
        Ok(self.final_path.clone())
    }

    /// Removes the staging file (best-effort).
    pub async fn discard(mut self) {
        self.done = true;
        if let Err(e) = tokio::fs::remove_file(&self.part_path).await {
            tracing::warn!(
                path = %self.part_path.display(),
                error = %e,
                "failed to remove partial artifact"
            );
        }
    }
}

impl Drop for PartialArtifact {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        match std::fs::remove_file(&self.part_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.part_path.display(),
                error = %e,
                "failed to remove abandoned partial artifact"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DestinationResolver;
    use chunkyard_protocol::UploadScope;

    async fn temp_destination(root: &Path) -> Destination {
        DestinationResolver::new(root, "static")
            .resolve(&UploadScope::Temporary)
            .await
            .unwrap()
    }

    #[test]
    fn sanitize_keeps_plain_names() {
        assert_eq!(sanitize_file_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_file_name("my file (1).tar.gz"), "my file (1).tar.gz");
    }

    #[test]
    fn sanitize_strips_separators() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_file_name("C:\\Windows\\evil"), "C__Windows_evil");
    }

    #[test]
    fn sanitize_replaces_control_chars() {
        assert_eq!(sanitize_file_name("a\nb\tc"), "a_b_c");
    }

    #[test]
    fn sanitize_empty_and_dots() {
        assert_eq!(sanitize_file_name(""), "file");
        assert_eq!(sanitize_file_name("   "), "file");
        assert_eq!(sanitize_file_name(".."), "file");
    }

    #[test]
    fn sanitize_truncates_long_names_keeping_extension() {
        let long = format!("{}.pdf", "x".repeat(400));
        let out = sanitize_file_name(&long);
        assert_eq!(out.len(), MAX_SANITIZED_LEN);
        assert!(out.ends_with(".pdf"));
    }

    #[test]
    fn sanitize_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let out = sanitize_file_name(&long);
        assert!(out.len() <= MAX_SANITIZED_LEN);
        assert!(out.chars().all(|c| c == 'é'));
    }

    #[test]
    fn artifact_name_prefixes_id() {
        assert_eq!(artifact_file_name("abc", "a/b.pdf"), "abc_a_b.pdf");
    }

    #[tokio::test]
    async fn publish_renames_part_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = temp_destination(tmp.path()).await;

        let mut artifact = PartialArtifact::create(&dest, "id_a.txt").await.unwrap();
        artifact.write(b"foo").await.unwrap();
        artifact.write(b"bar").await.unwrap();
        assert_eq!(artifact.written(), 6);
        assert!(!dest.path_for("id_a.txt").exists());
        assert!(dest.path_for("id_a.txt.part").exists());

        let path = artifact.publish().await.unwrap();
        assert_eq!(path, dest.path_for("id_a.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"foobar");
        assert!(!dest.path_for("id_a.txt.part").exists());
    }

    #[tokio::test]
    async fn discard_removes_part_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = temp_destination(tmp.path()).await;

        let mut artifact = PartialArtifact::create(&dest, "id_b.txt").await.unwrap();
        artifact.write(b"partial").await.unwrap();
        artifact.discard().await;

        assert!(!dest.path_for("id_b.txt").exists());
        assert!(!dest.path_for("id_b.txt.part").exists());
    }

    #[tokio::test]
    async fn drop_removes_part_file() {
        let tmp = tempfile::tempdir().unwrap();
        let dest = temp_destination(tmp.path()).await;

        {
            let mut artifact = PartialArtifact::create(&dest, "id_c.txt").await.unwrap();
            artifact.write(b"abandoned").await.unwrap();
        }

        assert!(!dest.path_for("id_c.txt.part").exists());
    }
}
