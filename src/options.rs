//! Defines option records accepted by filesystem operations.
//!
//! Every record is `Default`-constructible; fields irrelevant to a given
//! backend are ignored.

/// Default buffer size for streaming and chunked operations, 96 KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 96 * 1024;

/// Kind of an entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    File,
    Directory,
}

/// Verb a presigned or addressable URL is requested for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UrlKind {
    Get,
    Post,
    Put,
    Delete,
}

/// Options of metadata queries.
#[derive(Debug, Clone, Default)]
pub struct HeadOptions {
    /// Skip hook callbacks for this call.
    pub ignore_hook: bool,
}

/// Options of patch operations.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    pub ignore_hook: bool,
}

/// Options of directory listings. Reserved for backend extensions.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub ignore_hook: bool,
}

/// Options of directory creation.
#[derive(Debug, Clone, Default)]
pub struct MkcolOptions {
    /// Succeed silently when the directory already exists.
    pub force: bool,
    /// Create missing ancestors.
    pub recursive: bool,
    pub ignore_hook: bool,
}

/// Options of delete operations.
#[derive(Debug, Clone, Default)]
pub struct DeleteOptions {
    /// Swallow not-found and continue past per-child errors.
    pub force: bool,
    /// Delete directory contents.
    pub recursive: bool,
    pub ignore_hook: bool,
}

/// Options of whole-file and streaming reads.
#[derive(Debug, Clone, Default)]
pub struct OpenReadOptions {
    /// Chunk size for streaming; defaults to [`DEFAULT_BUFFER_SIZE`].
    pub buffer_size: Option<usize>,
    /// First byte of the range to read.
    pub start: Option<u64>,
    /// Length of the range to read.
    pub length: Option<u64>,
    pub ignore_hook: bool,
}

/// Options of whole-file and streaming writes.
#[derive(Debug, Clone, Default)]
pub struct OpenWriteOptions {
    /// Chunk size for streaming; defaults to [`DEFAULT_BUFFER_SIZE`].
    pub buffer_size: Option<usize>,
    /// First byte of the range to overwrite.
    pub start: Option<u64>,
    /// Length of the range to overwrite, or a cap on the written length.
    pub length: Option<u64>,
    /// Append to the existing content instead of overwriting.
    pub append: bool,
    /// Existence requirement: `None` creates or overwrites, `Some(true)`
    /// requires the file not to exist, `Some(false)` requires it to exist.
    pub create: Option<bool>,
    pub ignore_hook: bool,
}

/// Options of copy operations.
#[derive(Debug, Clone, Default)]
pub struct CopyOptions {
    pub buffer_size: Option<usize>,
    /// Overwrite existing destination entries.
    pub force: bool,
    /// Copy directory contents.
    pub recursive: bool,
    pub ignore_hook: bool,
}

/// Options of move operations. Moves are implicitly recursive and delete
/// the source after a clean transfer.
#[derive(Debug, Clone, Default)]
pub struct MoveOptions {
    pub buffer_size: Option<usize>,
    /// Overwrite existing destination entries.
    pub force: bool,
    pub ignore_hook: bool,
}

/// Options of the transfer engine unifying copy and move.
#[derive(Debug, Clone, Default)]
pub struct XmitOptions {
    pub buffer_size: Option<usize>,
    /// Continue past per-child errors and overwrite destinations.
    pub force: bool,
    /// Descend into directories.
    pub recursive: bool,
    /// Delete each source entry after its transfer.
    pub move_source: bool,
    pub ignore_hook: bool,
}

impl CopyOptions {
    /// Transfer options of a plain copy.
    pub(crate) fn to_xmit(&self) -> XmitOptions {
        XmitOptions {
            buffer_size: self.buffer_size,
            force: self.force,
            recursive: self.recursive,
            move_source: false,
            ignore_hook: self.ignore_hook,
        }
    }
}

impl MoveOptions {
    /// Transfer options of a move: recursive, deleting sources.
    pub(crate) fn to_xmit(&self) -> XmitOptions {
        XmitOptions {
            buffer_size: self.buffer_size,
            force: self.force,
            recursive: true,
            move_source: true,
            ignore_hook: self.ignore_hook,
        }
    }
}
