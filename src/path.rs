//! Defines path normalization and manipulation over the forward-slash model.
//!
//! All paths exposed by this crate are absolute, use `/` as the only
//! separator, and carry no trailing slash except for the root itself.

use thiserror::Error;

/// Result of path operations.
pub type Result<T> = std::result::Result<T, PathError>;

/// Errors raised while canonicalizing a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A `..` segment tried to escape above the root.
    #[error("path escapes root: {0}")]
    EscapesRoot(String),
}

/// Canonicalizes a path into the form `/a/b/c`.
///
/// Empty segments are collapsed, `.` segments are dropped, and `..`
/// consumes the previous segment. Underflowing past the root fails with
/// [`PathError::EscapesRoot`]. Relative input is resolved against the root.
pub fn normalize(path: &str) -> Result<String> {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::EscapesRoot(path.to_owned()));
                }
            }
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Ok("/".to_owned());
    }
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in segments {
        normalized.push('/');
        normalized.push_str(segment);
    }
    Ok(normalized)
}

/// Returns the normalized parent of `path`. The parent of the root is the
/// root itself.
pub fn parent(path: &str) -> Result<String> {
    let normalized = normalize(path)?;
    match normalized.rfind('/') {
        Some(0) | None => Ok("/".to_owned()),
        Some(index) => Ok(normalized[..index].to_owned()),
    }
}

/// Returns the final segment of `path`. The basename of the root is the
/// empty string.
pub fn basename(path: &str) -> Result<String> {
    let normalized = normalize(path)?;
    match normalized.rfind('/') {
        Some(index) => Ok(normalized[index + 1..].to_owned()),
        None => Ok(String::new()),
    }
}

/// Joins `child` onto `base` and normalizes the result.
pub fn join(base: &str, child: &str) -> Result<String> {
    normalize(&format!("{}/{}", base, child))
}

#[cfg(test)]
mod tests;
