//! Defines the error taxonomy shared by every filesystem operation.
//!
//! Backends surface whatever raw error type their storage produces; the
//! core translates those at its boundary into [`FsError`] so callers never
//! observe backend-native types. The raw error is retained as the `cause`
//! chain.

use std::fmt;

/// Result of core filesystem operations.
pub type FsResult<T> = std::result::Result<T, FsError>;

/// Raw error produced by a backend primitive before translation.
pub type RawError = Box<dyn std::error::Error + Send + Sync>;

/// Result of backend primitives, carrying untranslated errors.
pub type RawResult<T> = std::result::Result<T, RawError>;

/// Closed set of error kinds. The names are stable public identifiers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The entry addressed by the operation does not exist, or is masked
    /// by a logical-delete tombstone.
    NotFound,
    /// The backend state could not be read during a read, list, or head.
    NotReadable,
    /// A write, mkcol, delete, or patch was refused by the backend.
    NoModificationAllowed,
    /// The requested modification is invalid for the current state, for
    /// example removing a non-empty directory without `recursive`.
    InvalidModification,
    /// The entry exists but with the wrong kind, for example a directory
    /// where a file operation was requested.
    TypeMismatch,
    /// The destination path already exists and the operation required it
    /// not to.
    PathExist,
    /// The operation violates the collision policy of a transfer, for
    /// example overwriting an existing destination without `force`.
    Security,
    /// The backend does not support the requested capability and no
    /// emulation applies in this context.
    NotSupported,
    /// The supplied path is malformed, for example `..` escaping the root.
    Syntax,
    /// The operation was applied to a handle in the wrong lifecycle state,
    /// for example reading from a closed stream.
    InvalidState,
    /// A backend resource limit was exceeded.
    QuotaExceeded,
    /// Conversion between binary representations failed, for example
    /// invalid UTF-8 or base64 input.
    Encoding,
    /// The operation was cancelled before completion.
    Abort,
}

impl ErrorKind {
    /// Stable identifier of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::NotReadable => "NotReadable",
            ErrorKind::NoModificationAllowed => "NoModificationAllowed",
            ErrorKind::InvalidModification => "InvalidModification",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::PathExist => "PathExist",
            ErrorKind::Security => "Security",
            ErrorKind::NotSupported => "NotSupported",
            ErrorKind::Syntax => "Syntax",
            ErrorKind::InvalidState => "InvalidState",
            ErrorKind::QuotaExceeded => "QuotaExceeded",
            ErrorKind::Encoding => "Encoding",
            ErrorKind::Abort => "Abort",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error raised by filesystem operations.
///
/// Carries the repository and path the operation addressed, and for
/// transfers the source and destination routes. The untranslated backend
/// error, when any, is available through [`std::error::Error::source`].
#[derive(Debug)]
pub struct FsError {
    /// Classification of the failure.
    pub kind: ErrorKind,
    /// Repository the operation addressed.
    pub repository: String,
    /// Normalized path the operation addressed.
    pub path: String,
    /// Optional human-readable detail.
    pub message: Option<String>,
    /// Transfer source path, set by the xmit engine.
    pub from: Option<String>,
    /// Transfer destination path, set by the xmit engine.
    pub to: Option<String>,
    /// Untranslated backend error.
    pub cause: Option<RawError>,
}

impl std::error::Error for FsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|cause| cause.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl FsError {
    /// Creates an error of `kind` addressed at `repository:path`.
    pub fn new(kind: ErrorKind, repository: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            kind,
            repository: repository.into(),
            path: path.into(),
            message: None,
            from: None,
            to: None,
            cause: None,
        }
    }

    /// Attaches a human-readable detail message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attaches the untranslated backend error as the cause.
    pub fn with_cause(mut self, cause: impl Into<RawError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Records the transfer route that produced the error.
    pub fn with_route(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self.to = Some(to.into());
        self
    }

    /// True when the error is of the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }

    /// Distinguishes this crate's errors from foreign ones.
    pub fn classify<'a>(error: &'a (dyn std::error::Error + 'static)) -> Option<&'a FsError> {
        error.downcast_ref::<FsError>()
    }

    /// Translates a raw backend error, falling back to `kind` when the
    /// error is foreign. Errors that already belong to the taxonomy pass
    /// through unchanged; anything else is wrapped with the raw error as
    /// cause.
    pub fn from_raw(kind: ErrorKind, repository: &str, path: &str, raw: RawError) -> FsError {
        match raw.downcast::<FsError>() {
            Ok(own) => *own,
            Err(raw) => FsError::new(kind, repository, path).with_cause(raw),
        }
    }

    /// Translates a raw backend error raised in a read context into
    /// [`ErrorKind::NotReadable`], passing own errors through.
    pub fn from_read(repository: &str, path: &str, raw: RawError) -> FsError {
        Self::from_raw(ErrorKind::NotReadable, repository, path, raw)
    }

    /// Translates a raw backend error raised in a write context into
    /// [`ErrorKind::NoModificationAllowed`], passing own errors through.
    pub fn from_write(repository: &str, path: &str, raw: RawError) -> FsError {
        Self::from_raw(ErrorKind::NoModificationAllowed, repository, path, raw)
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}:{}", self.kind, self.repository, self.path)?;
        if let (Some(from), Some(to)) = (&self.from, &self.to) {
            write!(f, " ({} -> {})", from, to)?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}
