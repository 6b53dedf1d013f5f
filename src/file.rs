//! Defines the file handle: whole-file and streaming I/O, hashing, and the
//! append/range emulation fallback.
//!
//! Emulation engages when a backend lacks a declared capability: a range
//! read becomes a whole-content load plus a slice, an append becomes a
//! load-merge-save, a range write becomes a load-splice-save. The splice
//! itself is the converter's job.

use std::io::SeekFrom;
use std::sync::Arc;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::backend::{FsBackend, LoadRange, RawReadStream, RawWriteStream, SaveFlags};
use crate::convert::{Data, DataKind};
use crate::directory::Directory;
use crate::entry::{
    after_delete_hook, before_delete_hook, head_entry, head_optional, normalize_path, patch_entry,
    url_entry, xmit, Entry,
};
use crate::error::{ErrorKind, FsError, FsResult};
use crate::hook::{before_read_failure, before_write_failure, log_after_failure};
use crate::options::{
    CopyOptions, DeleteOptions, HeadOptions, MoveOptions, OpenReadOptions, OpenWriteOptions,
    PatchOptions, UrlKind, XmitOptions,
};
use crate::path;
use crate::stats::{Props, Stats};
use crate::stream::{
    resolve_buffer_size, BufferReadStream, BufferWriteStream, ReadStream, StreamContext,
    WriteStream,
};

/// Handle of a file inside one repository.
///
/// Handles are transient and cheap; they hold only the backend reference
/// and the normalized path, and may outlive the entry they point at.
#[derive(Clone)]
pub struct File {
    fs: Arc<dyn FsBackend>,
    path: String,
}

impl File {
    /// Creates a handle, normalizing `path`.
    pub fn new(fs: Arc<dyn FsBackend>, path: &str) -> FsResult<Self> {
        let path = normalize_path(fs.repository(), path)?;
        Ok(Self { fs, path })
    }

    pub(crate) fn from_normalized(fs: Arc<dyn FsBackend>, path: String) -> Self {
        Self { fs, path }
    }

    /// Normalized path of the file.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Repository the file belongs to.
    pub fn repository(&self) -> &str {
        self.fs.repository()
    }

    pub(crate) fn backend(&self) -> &Arc<dyn FsBackend> {
        &self.fs
    }

    /// Final path segment.
    pub fn name(&self) -> String {
        path::basename(&self.path).unwrap_or_default()
    }

    /// Handle of the containing directory.
    pub fn parent(&self) -> Directory {
        let parent = path::parent(&self.path).unwrap_or_else(|_| "/".to_owned());
        Directory::from_normalized(Arc::clone(&self.fs), parent)
    }

    /// File metadata. Fails with a type mismatch when the path holds a
    /// directory.
    pub async fn head(&self, options: &HeadOptions) -> FsResult<Stats> {
        let stats = head_entry(&self.fs, &self.path, options).await?;
        if stats.is_directory() {
            return Err(FsError::new(ErrorKind::TypeMismatch, self.repository(), &self.path)
                .with_message("entry is a directory"));
        }
        Ok(stats)
    }

    /// Applies properties to the file.
    pub async fn patch(&self, props: &Props, options: &PatchOptions) -> FsResult<()> {
        patch_entry(&self.fs, &self.path, props, options).await
    }

    /// Addressable URL of the file for the given verb.
    pub async fn to_url(&self, kind: UrlKind) -> FsResult<String> {
        url_entry(&self.fs, &self.path, kind).await
    }

    /// Reads the whole file, or the `start`/`length` range when set.
    ///
    /// A range request against a backend without native range reads is
    /// emulated by loading the whole content and slicing.
    pub async fn read(&self, options: &OpenReadOptions) -> FsResult<Bytes> {
        self.head(&HeadOptions { ignore_hook: options.ignore_hook }).await?;
        let repository = self.repository();
        let config = self.fs.config();
        let hooks = if options.ignore_hook { None } else { config.hooks.clone() };
        if let Some(hooks) = &hooks {
            match hooks.before_get(&self.path, options).await {
                Ok(Some(content)) => return Ok(content),
                Ok(None) => {}
                Err(error) => return Err(before_read_failure(repository, &self.path, error)),
            }
        }
        let ranged = options.start.is_some() || options.length.is_some();
        let content = if options.length == Some(0) {
            config.converter.empty()
        } else if ranged && self.fs.supports_range_read() {
            let range = LoadRange { start: options.start, length: options.length };
            self.load(range).await?
        } else if ranged {
            debug!(path = %self.path, "emulating range read over a whole-content load");
            let whole = self.load(LoadRange::default()).await?;
            config.converter.slice(&whole, options.start, options.length)
        } else {
            self.load(LoadRange::default()).await?
        };
        if let Some(hooks) = &hooks {
            if let Err(error) = hooks.after_get(&self.path).await {
                log_after_failure("get", repository, &self.path, &error);
            }
        }
        Ok(content)
    }

    /// Reads the file into the requested representation.
    pub async fn read_as(&self, target: DataKind, options: &OpenReadOptions) -> FsResult<Data> {
        let content = self.read(options).await?;
        self.fs.config().converter.convert(Data::Bytes(content), target).map_err(|error| {
            FsError::new(ErrorKind::Encoding, self.repository(), &self.path)
                .with_message(error.to_string())
        })
    }

    /// Reads the file as UTF-8 text.
    pub async fn read_text(&self, options: &OpenReadOptions) -> FsResult<String> {
        match self.read_as(DataKind::Text, options).await? {
            Data::Text(text) => Ok(text),
            _ => unreachable!("converter returned a different representation"),
        }
    }

    /// Writes `data`, honoring append, range, and existence options.
    ///
    /// Returns whether anything was written; a `length` of zero is a
    /// no-op. When the backend lacks append or range-write capability the
    /// content is rebuilt in memory and saved whole.
    pub async fn write(&self, data: impl Into<Bytes>, options: &OpenWriteOptions) -> FsResult<bool> {
        let mut options = options.clone();
        if options.length == Some(0) {
            return Ok(false);
        }
        if options.append && options.start.is_some() {
            warn!(path = %self.path, "append conflicts with a range start; the range wins");
            options.append = false;
        }
        let repository = self.repository().to_owned();
        let config = self.fs.config();
        let converter = Arc::clone(&config.converter);

        let existing =
            head_optional(&self.fs, &self.path, &HeadOptions { ignore_hook: options.ignore_hook })
                .await?;
        if let Some(stats) = &existing {
            if stats.is_directory() {
                return Err(FsError::new(ErrorKind::TypeMismatch, &repository, &self.path)
                    .with_message("entry is a directory"));
            }
        }
        let create_new = resolve_create(&repository, &self.path, existing.is_some(), options.create)?;

        let mut payload: Bytes = data.into();
        let hooks = if options.ignore_hook { None } else { config.hooks.clone() };
        if let Some(hooks) = &hooks {
            let handled = if create_new {
                hooks.before_post(&self.path, Some(&payload), &options).await
            } else {
                hooks.before_put(&self.path, Some(&payload), &options).await
            };
            match handled {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(error) => return Err(before_write_failure(&repository, &self.path, error)),
            }
        }

        if options.start.is_none() && options.length.is_some() {
            payload = converter.slice(&payload, None, options.length);
        }

        let mut flags = SaveFlags { append: false, create: create_new };
        let mut saved = false;
        if options.append {
            if self.fs.supports_append() && existing.is_some() {
                flags.append = true;
            } else {
                if existing.is_some() {
                    debug!(path = %self.path, "emulating append over a whole-content rewrite");
                }
                let base = match &existing {
                    Some(_) => self.load(LoadRange::default()).await?,
                    None => converter.empty(),
                };
                payload = converter.merge(&[base, payload]);
            }
        } else if let Some(start) = options.start {
            if self.fs.supports_range_write() {
                saved = self.write_range_native(&options, &existing, start, &payload).await?;
            }
            if !saved {
                debug!(path = %self.path, "emulating range write over a whole-content rewrite");
                let base = match &existing {
                    Some(_) => self.load(LoadRange::default()).await?,
                    None => converter.empty(),
                };
                payload = converter.modify(&base, &payload, options.start, options.length);
            }
        }
        if !saved {
            self.fs
                .save(&self.path, payload, flags)
                .await
                .map_err(|raw| FsError::from_write(&repository, &self.path, raw))?;
        }

        if let Some(hooks) = &hooks {
            let result = if create_new {
                hooks.after_post(&self.path).await
            } else {
                hooks.after_put(&self.path).await
            };
            if let Err(error) = result {
                let operation = if create_new { "post" } else { "put" };
                log_after_failure(operation, &repository, &self.path, &error);
            }
        }
        Ok(true)
    }

    /// Range write through a native backend write stream. Returns whether
    /// the backend provided one.
    async fn write_range_native(
        &self,
        options: &OpenWriteOptions,
        existing: &Option<Stats>,
        start: u64,
        payload: &Bytes,
    ) -> FsResult<bool> {
        let repository = self.repository().to_owned();
        let config = self.fs.config();
        let raw = self
            .fs
            .create_write_stream(&self.path, options)
            .await
            .map_err(|raw| FsError::from_write(&repository, &self.path, raw))?;
        let Some(raw) = raw else {
            return Ok(false);
        };
        let size = existing.as_ref().and_then(|stats| stats.size).unwrap_or(0);
        let ctx = StreamContext {
            repository: repository.clone(),
            path: self.path.clone(),
            hooks: None,
            converter: Arc::clone(&config.converter),
            ignore_hook: true,
            buffer_size: config.buffer_size,
        };
        let patch = match options.length {
            Some(length) => config.converter.slice(payload, None, Some(length)),
            None => payload.clone(),
        };
        let mut stream = WriteStream::new(ctx, raw, size, 0, existing.is_none());
        let outcome: FsResult<()> = async {
            stream.seek(SeekFrom::Start(start)).await?;
            stream.write(patch).await?;
            Ok(())
        }
        .await;
        let closed = stream.close().await;
        outcome?;
        closed?;
        Ok(true)
    }

    /// Writes UTF-8 text.
    pub async fn write_text(&self, text: &str, options: &OpenWriteOptions) -> FsResult<bool> {
        self.write(Bytes::from(text.to_owned().into_bytes()), options).await
    }

    /// SHA-256 of the file content as a lowercase hex digest, computed
    /// chunk-wise over the stream interface.
    pub async fn hash(&self, options: &OpenReadOptions) -> FsResult<String> {
        let mut stream = self.create_read_stream(options).await?;
        let mut hasher = Sha256::new();
        let outcome: FsResult<()> = async {
            while let Some(chunk) = stream.read(None).await? {
                hasher.update(&chunk);
            }
            Ok(())
        }
        .await;
        let closed = stream.close().await;
        outcome?;
        closed?;
        Ok(hex::encode(hasher.finalize()))
    }

    /// Opens a read stream over the file, honoring the `start`/`length`
    /// window. A substitute served by the read hook becomes a
    /// memory-backed stream.
    pub async fn create_read_stream(&self, options: &OpenReadOptions) -> FsResult<ReadStream> {
        let repository = self.repository().to_owned();
        let config = self.fs.config();
        let buffer_size =
            resolve_buffer_size(options.buffer_size, config.buffer_size, &repository, &self.path)?;
        let stats = self.head(&HeadOptions { ignore_hook: options.ignore_hook }).await?;
        let hooks = if options.ignore_hook { None } else { config.hooks.clone() };
        let mut substitute = None;
        if let Some(hooks) = &hooks {
            match hooks.before_get(&self.path, options).await {
                Ok(value) => substitute = value,
                Err(error) => return Err(before_read_failure(&repository, &self.path, error)),
            }
        }
        let (raw, size): (Box<dyn RawReadStream>, u64) = match substitute {
            Some(content) => {
                let size = content.len() as u64;
                (Box::new(BufferReadStream::new(content)), size)
            }
            None => {
                let native = self
                    .fs
                    .create_read_stream(&self.path, options)
                    .await
                    .map_err(|raw| FsError::from_read(&repository, &self.path, raw))?;
                match native {
                    Some(native) => (native, stats.size.unwrap_or(0)),
                    None => {
                        let content = self.load(LoadRange::default()).await?;
                        let size = content.len() as u64;
                        (Box::new(BufferReadStream::new(content)), size)
                    }
                }
            }
        };
        let ctx = StreamContext {
            repository,
            path: self.path.clone(),
            hooks,
            converter: Arc::clone(&config.converter),
            ignore_hook: options.ignore_hook,
            buffer_size,
        };
        let start = options.start.unwrap_or(0).min(size);
        let limit = options.length.map(|length| start.saturating_add(length));
        let mut stream = ReadStream::new(ctx, raw, size, start, limit);
        if start > 0 {
            if let Err(error) = stream.seek(SeekFrom::Start(start)).await {
                let _ = stream.close().await;
                return Err(error);
            }
        }
        Ok(stream)
    }

    /// Opens a write stream over the file. Append positions at the end;
    /// a `start` positions inside the existing content; otherwise the
    /// content is truncated. The close-time hook fires only when the
    /// stream was written to.
    pub async fn create_write_stream(&self, options: &OpenWriteOptions) -> FsResult<WriteStream> {
        let repository = self.repository().to_owned();
        let config = self.fs.config();
        let buffer_size =
            resolve_buffer_size(options.buffer_size, config.buffer_size, &repository, &self.path)?;
        let existing =
            head_optional(&self.fs, &self.path, &HeadOptions { ignore_hook: options.ignore_hook })
                .await?;
        if let Some(stats) = &existing {
            if stats.is_directory() {
                return Err(FsError::new(ErrorKind::TypeMismatch, &repository, &self.path)
                    .with_message("entry is a directory"));
            }
        }
        let create_new = resolve_create(&repository, &self.path, existing.is_some(), options.create)?;
        let hooks = if options.ignore_hook { None } else { config.hooks.clone() };
        if let Some(hooks) = &hooks {
            let result = if create_new {
                hooks.before_post(&self.path, None, options).await
            } else {
                hooks.before_put(&self.path, None, options).await
            };
            // Short-circuit does not apply when opening a stream.
            if let Err(error) = result {
                return Err(before_write_failure(&repository, &self.path, error));
            }
        }
        let preserve = options.append || options.start.is_some();
        let native = self
            .fs
            .create_write_stream(&self.path, options)
            .await
            .map_err(|raw| FsError::from_write(&repository, &self.path, raw))?;
        let (raw, size): (Box<dyn RawWriteStream>, u64) = match native {
            Some(native) => {
                let size = if preserve {
                    existing.as_ref().and_then(|stats| stats.size).unwrap_or(0)
                } else {
                    0
                };
                (native, size)
            }
            None => {
                let base = if preserve && existing.is_some() {
                    self.load(LoadRange::default()).await?
                } else {
                    config.converter.empty()
                };
                let size = base.len() as u64;
                let raw = BufferWriteStream::new(
                    Arc::clone(&self.fs),
                    self.path.clone(),
                    base,
                    create_new,
                );
                (Box::new(raw), size)
            }
        };
        let ctx = StreamContext {
            repository,
            path: self.path.clone(),
            hooks,
            converter: Arc::clone(&config.converter),
            ignore_hook: options.ignore_hook,
            buffer_size,
        };
        let position = if options.append { size } else { options.start.unwrap_or(0).min(size) };
        let mut stream = WriteStream::new(ctx, raw, size, 0, create_new);
        if position > 0 {
            if let Err(error) = stream.seek(SeekFrom::Start(position)).await {
                let _ = stream.close().await;
                return Err(error);
            }
        }
        Ok(stream)
    }

    /// Reads the whole file through the stream interface.
    pub async fn read_all(&self, options: &OpenReadOptions) -> FsResult<Bytes> {
        let mut stream = self.create_read_stream(options).await?;
        let outcome = stream.read_to_end().await;
        let closed = stream.close().await;
        let content = outcome?;
        closed?;
        Ok(content)
    }

    /// Writes the whole file through the stream interface.
    pub async fn write_all(
        &self,
        data: impl Into<Bytes>,
        options: &OpenWriteOptions,
    ) -> FsResult<()> {
        let mut stream = self.create_write_stream(options).await?;
        let outcome = stream.write(data.into()).await;
        let closed = stream.close().await;
        outcome?;
        closed?;
        Ok(())
    }

    /// Deletes the file. Not-found is swallowed under `force`.
    pub async fn delete(&self, options: &DeleteOptions) -> FsResult<Vec<FsError>> {
        if let Some(result) = before_delete_hook(&self.fs, &self.path, options).await? {
            return Ok(result);
        }
        let repository = self.repository();
        match head_optional(&self.fs, &self.path, &HeadOptions { ignore_hook: options.ignore_hook })
            .await?
        {
            None if options.force => return Ok(Vec::new()),
            None => return Err(FsError::new(ErrorKind::NotFound, repository, &self.path)),
            Some(stats) if stats.is_directory() => {
                return Err(FsError::new(ErrorKind::TypeMismatch, repository, &self.path)
                    .with_message("entry is a directory"))
            }
            Some(_) => {}
        }
        self.fs
            .rm(&self.path)
            .await
            .map_err(|raw| FsError::from_write(repository, &self.path, raw))?;
        after_delete_hook(&self.fs, &self.path, options.ignore_hook).await;
        Ok(Vec::new())
    }

    /// Copies the file onto `to`, returning accumulated transfer errors.
    pub async fn copy(&self, to: &File, options: &CopyOptions) -> FsResult<Vec<FsError>> {
        head_entry(&self.fs, &self.path, &HeadOptions { ignore_hook: options.ignore_hook }).await?;
        xmit(Entry::File(self.clone()), Entry::File(to.clone()), &options.to_xmit()).await
    }

    /// Moves the file onto `to`: transfer, then delete of the source when
    /// the transfer was clean.
    pub async fn move_to(&self, to: &File, options: &MoveOptions) -> FsResult<Vec<FsError>> {
        head_entry(&self.fs, &self.path, &HeadOptions { ignore_hook: options.ignore_hook }).await?;
        let mut errors =
            xmit(Entry::File(self.clone()), Entry::File(to.clone()), &options.to_xmit()).await?;
        if errors.is_empty() {
            let delete = DeleteOptions {
                force: options.force,
                recursive: false,
                ignore_hook: options.ignore_hook,
            };
            match self.delete(&delete).await {
                Ok(more) => errors.extend(more),
                Err(error) => errors.push(error),
            }
        }
        Ok(errors)
    }

    /// File side of the transfer engine: collision policy, then a
    /// stream-to-stream copy with both handles released in reverse order.
    pub(crate) async fn xmit_file(&self, to: &File, options: &XmitOptions) -> FsResult<()> {
        let head = HeadOptions { ignore_hook: options.ignore_hook };
        let existing = head_optional(to.backend(), to.path(), &head).await?;
        if let Some(stats) = &existing {
            if stats.is_directory() {
                return Err(FsError::new(ErrorKind::TypeMismatch, to.repository(), to.path())
                    .with_message("destination is a directory"));
            }
            if !options.force {
                return Err(FsError::new(ErrorKind::Security, to.repository(), to.path())
                    .with_message("destination exists"));
            }
        }
        let read = OpenReadOptions {
            buffer_size: options.buffer_size,
            ignore_hook: options.ignore_hook,
            ..OpenReadOptions::default()
        };
        let write = OpenWriteOptions {
            buffer_size: options.buffer_size,
            ignore_hook: options.ignore_hook,
            ..OpenWriteOptions::default()
        };
        let mut source = self.create_read_stream(&read).await?;
        let mut target = match to.create_write_stream(&write).await {
            Ok(target) => target,
            Err(error) => {
                let _ = source.close().await;
                return Err(error);
            }
        };
        let piped = source.pipe(&mut target).await;
        let target_closed = target.close().await;
        let source_closed = source.close().await;
        piped?;
        target_closed?;
        source_closed?;
        Ok(())
    }

    async fn load(&self, range: LoadRange) -> FsResult<Bytes> {
        self.fs
            .load(&self.path, range)
            .await
            .map_err(|raw| FsError::from_read(self.repository(), &self.path, raw))
    }
}

impl std::fmt::Display for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository(), self.path)
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("repository", &self.repository())
            .field("path", &self.path)
            .finish()
    }
}

fn resolve_create(
    repository: &str,
    path: &str,
    exists: bool,
    create: Option<bool>,
) -> FsResult<bool> {
    match (exists, create) {
        (true, Some(true)) => Err(FsError::new(ErrorKind::PathExist, repository, path)
            .with_message("file already exists")),
        (false, Some(false)) => Err(FsError::new(ErrorKind::NotFound, repository, path)
            .with_message("file does not exist")),
        (exists, _) => Ok(!exists),
    }
}
