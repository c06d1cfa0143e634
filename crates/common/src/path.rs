/// Longest path that can be claimed, in bytes.
pub const MAX_PATH_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("path is empty")]
    Empty,
    #[error("path is {0} bytes, the limit is {MAX_PATH_LEN}")]
    TooLong(usize),
    #[error("path contains disallowed character {0:?}")]
    InvalidChar(char),
    #[error("paths starting with {0:?} are reserved")]
    Reserved(char),
}

/// Check that `path` can be claimed.
///
/// Allowed: ASCII letters, digits, `-`, `_`, `.` and `~`. A leading `_` is
/// reserved for gateway routes such as `/_status`, and a leading `.` would
/// produce dot-segments in URLs.
pub fn validate_path(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Err(PathError::Empty);
    }
    if path.len() > MAX_PATH_LEN {
        return Err(PathError::TooLong(path.len()));
    }
    if let Some(c) = path.chars().find(|c| !is_path_char(*c)) {
        return Err(PathError::InvalidChar(c));
    }
    match path.chars().next() {
        Some(c @ ('_' | '.')) => Err(PathError::Reserved(c)),
        _ => Ok(()),
    }
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~')
}
