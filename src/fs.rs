//! Defines the repository-scoped dispatcher over one backend.

use std::sync::Arc;

use bytes::Bytes;

use crate::backend::{FsBackend, FsConfig};
use crate::directory::Directory;
use crate::entry::{head_entry, head_optional, normalize_path, patch_entry, url_entry, Entry};
use crate::error::{ErrorKind, FsError, FsResult};
use crate::file::File;
use crate::options::{
    CopyOptions, DeleteOptions, HeadOptions, ListOptions, MkcolOptions, MoveOptions,
    OpenReadOptions, OpenWriteOptions, PatchOptions, UrlKind,
};
use crate::stats::{Props, Stats};
use crate::stream::{ReadStream, WriteStream};

/// One repository: a named tree addressed through a single path API.
///
/// The dispatcher resolves paths to file or directory handles and forwards
/// every operation to them; all cross-cutting behavior (hooks, emulation,
/// error translation) happens in the handles and beneath.
#[derive(Clone)]
pub struct FileSystem {
    backend: Arc<dyn FsBackend>,
}

impl FileSystem {
    /// Wraps a backend into a repository dispatcher.
    pub fn new(backend: Arc<dyn FsBackend>) -> Self {
        Self { backend }
    }

    /// Name of the repository.
    pub fn repository(&self) -> &str {
        self.backend.repository()
    }

    /// Repository configuration.
    pub fn config(&self) -> &FsConfig {
        self.backend.config()
    }

    /// The underlying backend.
    pub fn backend(&self) -> &Arc<dyn FsBackend> {
        &self.backend
    }

    /// File handle at `path`.
    pub fn file(&self, path: &str) -> FsResult<File> {
        File::new(Arc::clone(&self.backend), path)
    }

    /// Directory handle at `path`.
    pub fn directory(&self, path: &str) -> FsResult<Directory> {
        Directory::new(Arc::clone(&self.backend), path)
    }

    /// Resolves `path` into a handle of the kind the backend reports.
    pub async fn get_entry(&self, path: &str, options: &HeadOptions) -> FsResult<Entry> {
        let normalized = normalize_path(self.repository(), path)?;
        let stats = head_entry(&self.backend, &normalized, options).await?;
        Ok(Entry::from_stats(Arc::clone(&self.backend), normalized, &stats))
    }

    /// Entry metadata with hook bracket and logical-delete masking.
    pub async fn head(&self, path: &str, options: &HeadOptions) -> FsResult<Stats> {
        let normalized = normalize_path(self.repository(), path)?;
        head_entry(&self.backend, &normalized, options).await
    }

    /// Whether an entry exists at `path`. Hooks are not consulted.
    pub async fn exists(&self, path: &str) -> FsResult<bool> {
        let normalized = normalize_path(self.repository(), path)?;
        let found =
            head_optional(&self.backend, &normalized, &HeadOptions { ignore_hook: true }).await?;
        Ok(found.is_some())
    }

    /// Applies properties to the entry at `path`.
    pub async fn patch(&self, path: &str, props: &Props, options: &PatchOptions) -> FsResult<()> {
        let normalized = normalize_path(self.repository(), path)?;
        patch_entry(&self.backend, &normalized, props, options).await
    }

    /// Lists the children of the directory at `path`.
    pub async fn list(&self, path: &str, options: &ListOptions) -> FsResult<Vec<String>> {
        self.directory(path)?.list(options).await
    }

    /// Creates the directory at `path`; returns whether it was newly
    /// created.
    pub async fn mkcol(&self, path: &str, options: &MkcolOptions) -> FsResult<bool> {
        self.directory(path)?.mkcol(options).await
    }

    /// Deletes the entry at `path`, dispatching on its kind.
    pub async fn delete(&self, path: &str, options: &DeleteOptions) -> FsResult<Vec<FsError>> {
        let head = HeadOptions { ignore_hook: options.ignore_hook };
        let entry = match self.get_entry(path, &head).await {
            Ok(entry) => entry,
            Err(error) if options.force && error.is(ErrorKind::NotFound) => {
                return Ok(Vec::new())
            }
            Err(error) => return Err(error),
        };
        entry.delete(options).await
    }

    /// Reads the file at `path`.
    pub async fn read(&self, path: &str, options: &OpenReadOptions) -> FsResult<Bytes> {
        self.file(path)?.read(options).await
    }

    /// Reads the file at `path` as UTF-8 text.
    pub async fn read_text(&self, path: &str, options: &OpenReadOptions) -> FsResult<String> {
        self.file(path)?.read_text(options).await
    }

    /// Writes the file at `path`; returns whether anything was written.
    pub async fn write(
        &self,
        path: &str,
        data: impl Into<Bytes>,
        options: &OpenWriteOptions,
    ) -> FsResult<bool> {
        self.file(path)?.write(data, options).await
    }

    /// Writes UTF-8 text to the file at `path`.
    pub async fn write_text(
        &self,
        path: &str,
        text: &str,
        options: &OpenWriteOptions,
    ) -> FsResult<bool> {
        self.file(path)?.write_text(text, options).await
    }

    /// SHA-256 hex digest of the file at `path`.
    pub async fn hash(&self, path: &str, options: &OpenReadOptions) -> FsResult<String> {
        self.file(path)?.hash(options).await
    }

    /// Opens a read stream over the file at `path`.
    pub async fn create_read_stream(
        &self,
        path: &str,
        options: &OpenReadOptions,
    ) -> FsResult<ReadStream> {
        self.file(path)?.create_read_stream(options).await
    }

    /// Opens a write stream over the file at `path`.
    pub async fn create_write_stream(
        &self,
        path: &str,
        options: &OpenWriteOptions,
    ) -> FsResult<WriteStream> {
        self.file(path)?.create_write_stream(options).await
    }

    /// Addressable URL of the entry at `path` for the given verb.
    pub async fn to_url(&self, path: &str, kind: UrlKind) -> FsResult<String> {
        let normalized = normalize_path(self.repository(), path)?;
        url_entry(&self.backend, &normalized, kind).await
    }

    /// Copies the entry at `from` onto `to`. The destination handle takes
    /// the source's kind; accumulated per-child errors are returned.
    pub async fn copy(
        &self,
        from: &str,
        to: &str,
        options: &CopyOptions,
    ) -> FsResult<Vec<FsError>> {
        let head = HeadOptions { ignore_hook: options.ignore_hook };
        let source = self.get_entry(from, &head).await?;
        let destination = self.same_kind(&source, to)?;
        source.copy(&destination, options).await
    }

    /// Moves the entry at `from` onto `to`.
    pub async fn move_to(
        &self,
        from: &str,
        to: &str,
        options: &MoveOptions,
    ) -> FsResult<Vec<FsError>> {
        let head = HeadOptions { ignore_hook: options.ignore_hook };
        let source = self.get_entry(from, &head).await?;
        let destination = self.same_kind(&source, to)?;
        source.move_to(&destination, options).await
    }

    fn same_kind(&self, source: &Entry, to: &str) -> FsResult<Entry> {
        Ok(match source {
            Entry::File(_) => Entry::File(self.file(to)?),
            Entry::Directory(_) => Entry::Directory(self.directory(to)?),
        })
    }
}
