use crate::TransferError;

/// Longest accepted display name, in bytes.
pub const MAX_FILE_NAME_LEN: usize = 255;

/// Validates a caller-supplied display name at session creation.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - NUL and other control characters
/// - `.` and `..`
/// - Names longer than [`MAX_FILE_NAME_LEN`] bytes
///
/// Path separators are allowed here; they are replaced when the stored
/// name is built (see [`chunkyard_file_ops::sanitize_file_name`]).
pub fn validate_file_name(file_name: &str) -> Result<(), TransferError> {
    if file_name.trim().is_empty() {
        return Err(TransferError::InvalidPath("empty file name".into()));
    }

    if file_name.len() > MAX_FILE_NAME_LEN {
        return Err(TransferError::InvalidPath(format!(
            "file name longer than {MAX_FILE_NAME_LEN} bytes"
        )));
    }

    if file_name.chars().any(char::is_control) {
        return Err(TransferError::InvalidPath(format!(
            "control characters not allowed: {file_name:?}"
        )));
    }

    if file_name == "." || file_name == ".." {
        return Err(TransferError::InvalidPath(format!(
            "reserved file name: {file_name}"
        )));
    }

    Ok(())
}
