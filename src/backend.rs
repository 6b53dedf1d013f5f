//! Defines the primitive contract storage backends implement.
//!
//! The core implements every public operation (preconditions, recursion,
//! hooks, emulation, error translation) in terms of these primitives. A
//! backend only moves bytes and metadata; it reports failures with whatever
//! raw error type its storage produces and never sees hook or option
//! handling.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::convert::{Converter, DefaultConverter};
use crate::error::{ErrorKind, FsError, RawResult};
use crate::hook::Hooks;
use crate::options::{OpenReadOptions, OpenWriteOptions, UrlKind, DEFAULT_BUFFER_SIZE};
use crate::stats::{Props, Stats};

/// Configuration of one repository. Read-only after construction.
#[derive(Clone)]
pub struct FsConfig {
    /// Optional operation hooks.
    pub hooks: Option<Arc<dyn Hooks>>,
    /// Converter used for representation bridging and emulation splices.
    pub converter: Arc<dyn Converter>,
    /// Default buffer size for streaming operations.
    pub buffer_size: usize,
    /// Treat entries carrying a `deleted` time as not found.
    pub logical_delete: bool,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            hooks: None,
            converter: Arc::new(DefaultConverter),
            buffer_size: DEFAULT_BUFFER_SIZE,
            logical_delete: false,
        }
    }
}

impl FsConfig {
    /// Installs an operation hook set.
    pub fn with_hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Enables logical-delete masking in head.
    pub fn with_logical_delete(mut self) -> Self {
        self.logical_delete = true;
        self
    }
}

/// Byte range of a raw load. Honored only by backends declaring
/// [`FsBackend::supports_range_read`]; the core passes a full range
/// otherwise and slices the result itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadRange {
    pub start: Option<u64>,
    pub length: Option<u64>,
}

/// Disposition flags of a raw save.
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveFlags {
    /// Append to the existing content. Only set for backends declaring
    /// [`FsBackend::supports_append`].
    pub append: bool,
    /// The save is expected to create the file rather than overwrite it.
    pub create: bool,
}

/// Primitive operations a storage backend provides.
///
/// All paths are normalized and absolute. Fallible methods return raw,
/// untranslated errors; the core maps them into the public taxonomy at its
/// boundary. An implementation may also return [`FsError`] values directly
/// where it can classify a failure itself; those pass through translation
/// unchanged.
#[async_trait]
pub trait FsBackend: Send + Sync {
    /// Name of the repository this backend serves.
    fn repository(&self) -> &str;

    /// Repository configuration.
    fn config(&self) -> &FsConfig;

    /// Reads entry metadata. `Ok(None)` means the entry does not exist.
    async fn head(&self, path: &str) -> RawResult<Option<Stats>>;

    /// Applies merged properties to an entry.
    async fn patch(&self, path: &str, props: &Props) -> RawResult<()>;

    /// Lists the children of a directory as normalized absolute paths. A
    /// trailing `/` may mark directories; the core strips it.
    async fn list(&self, path: &str) -> RawResult<Vec<String>>;

    /// Creates a directory whose parent exists.
    async fn mkcol(&self, path: &str) -> RawResult<()>;

    /// Removes an empty directory.
    async fn rmdir(&self, path: &str) -> RawResult<()>;

    /// Reads file content, whole or ranged per the declared capability.
    async fn load(&self, path: &str, range: LoadRange) -> RawResult<Bytes>;

    /// Writes whole file content, creating, truncating, or appending per
    /// `flags`.
    async fn save(&self, path: &str, data: Bytes, flags: SaveFlags) -> RawResult<()>;

    /// Removes a file.
    async fn rm(&self, path: &str) -> RawResult<()>;

    /// False for backends folding directories into key prefixes; the core
    /// then suppresses mkcol and rmdir work.
    fn supports_directory(&self) -> bool {
        true
    }

    /// True when [`FsBackend::save`] honors [`SaveFlags::append`].
    fn supports_append(&self) -> bool {
        false
    }

    /// True when [`FsBackend::load`] honors [`LoadRange`].
    fn supports_range_read(&self) -> bool {
        false
    }

    /// True when a native write stream can overwrite a byte range in
    /// place.
    fn supports_range_write(&self) -> bool {
        false
    }

    /// Opens a native read stream when the backend has one. The default
    /// makes the core synthesize a stream over [`FsBackend::load`].
    async fn create_read_stream(
        &self,
        path: &str,
        options: &OpenReadOptions,
    ) -> RawResult<Option<Box<dyn RawReadStream>>> {
        let _ = (path, options);
        Ok(None)
    }

    /// Opens a native write stream when the backend has one. The default
    /// makes the core synthesize a stream flushed through
    /// [`FsBackend::save`].
    ///
    /// When the options carry neither `append` nor `start`, opening must
    /// truncate existing content; otherwise content is preserved and the
    /// core positions the cursor itself.
    async fn create_write_stream(
        &self,
        path: &str,
        options: &OpenWriteOptions,
    ) -> RawResult<Option<Box<dyn RawWriteStream>>> {
        let _ = (path, options);
        Ok(None)
    }

    /// Produces an addressable URL for the given verb.
    async fn to_url(&self, path: &str, kind: UrlKind) -> RawResult<String> {
        let _ = kind;
        Err(Box::new(
            FsError::new(ErrorKind::NotSupported, self.repository(), path)
                .with_message("URLs are not supported by this backend"),
        ))
    }
}

/// Raw byte source a backend read stream exposes to the stream core.
#[async_trait]
pub trait RawReadStream: Send {
    /// Reads at most `max` bytes from the cursor. `Ok(None)` is the
    /// terminal end of the file; a shorter-than-`max` chunk is not.
    async fn read(&mut self, max: usize) -> RawResult<Option<Bytes>>;

    /// Moves the cursor to an absolute byte position.
    async fn seek(&mut self, position: u64) -> RawResult<()>;

    /// Releases the backend handle. Called exactly once.
    async fn close(&mut self) -> RawResult<()>;
}

/// Raw byte sink a backend write stream exposes to the stream core.
#[async_trait]
pub trait RawWriteStream: Send {
    /// Writes `chunk` at the cursor and returns the number of bytes
    /// accepted.
    async fn write(&mut self, chunk: Bytes) -> RawResult<usize>;

    /// Shrinks the file to `size` bytes.
    async fn truncate(&mut self, size: u64) -> RawResult<()>;

    /// Moves the cursor to an absolute byte position.
    async fn seek(&mut self, position: u64) -> RawResult<()>;

    /// Flushes and releases the backend handle. Called exactly once.
    async fn close(&mut self) -> RawResult<()>;
}
