use crate::TransferError;

/// Longest filename the destination accepts.
const MAX_FILENAME_LEN: usize = 255;

/// Validates a target filename before it is sent in upload headers.
///
/// Rejects:
/// - Empty names and names longer than 255 bytes
/// - `.` and `..`
/// - Path separators (`/` or `\`), so the name cannot address a directory
/// - Control characters, which cannot travel in an HTTP header
pub fn validate_filename(name: &str) -> Result<(), TransferError> {
    if name.is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }

    if name.len() > MAX_FILENAME_LEN {
        return Err(TransferError::InvalidName(format!(
            "name longer than {MAX_FILENAME_LEN} bytes"
        )));
    }

    if name == "." || name == ".." {
        return Err(TransferError::InvalidName(format!(
            "reserved name not allowed: {name}"
        )));
    }

    if name.contains(['/', '\\']) {
        return Err(TransferError::InvalidName(format!(
            "path separator not allowed: {name}"
        )));
    }

    if name.chars().any(char::is_control) {
        return Err(TransferError::InvalidName(format!(
            "control character not allowed: {name:?}"
        )));
    }

    Ok(())
}
