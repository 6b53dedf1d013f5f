//! Defines the stream state machine shared by read and write streams.
//!
//! Streams wrap a raw backend stream and add position bookkeeping, seek
//! clamping, chunked accumulation, the open/closed lifecycle, and the
//! close-time hook dispatch. Position clamping and range handling live
//! here, never in backends. For backends without native streaming the file
//! core hands in a buffer-backed raw stream synthesized over whole-content
//! load and save.

use std::io::SeekFrom;
use std::mem;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::backend::{FsBackend, RawReadStream, RawWriteStream, SaveFlags};
use crate::convert::Converter;
use crate::error::{ErrorKind, FsError, FsResult, RawResult};
use crate::hook::{log_after_failure, Hooks};

/// Fields shared by both stream variants.
pub(crate) struct StreamContext {
    pub repository: String,
    pub path: String,
    pub hooks: Option<Arc<dyn Hooks>>,
    pub converter: Arc<dyn Converter>,
    pub ignore_hook: bool,
    pub buffer_size: usize,
}

impl StreamContext {
    fn closed_error(&self) -> FsError {
        FsError::new(ErrorKind::InvalidState, &self.repository, &self.path)
            .with_message("stream is closed")
    }

    fn read_error(&self, raw: crate::error::RawError) -> FsError {
        FsError::from_read(&self.repository, &self.path, raw)
    }

    fn write_error(&self, raw: crate::error::RawError) -> FsError {
        FsError::from_write(&self.repository, &self.path, raw)
    }
}

/// Validates a requested buffer size against the repository default.
pub(crate) fn resolve_buffer_size(
    requested: Option<usize>,
    default: usize,
    repository: &str,
    path: &str,
) -> FsResult<usize> {
    match requested {
        Some(0) => Err(FsError::new(ErrorKind::Syntax, repository, path)
            .with_message("buffer size must be at least 1")),
        Some(size) => Ok(size),
        None => Ok(default),
    }
}

fn clamp_seek(from: SeekFrom, position: u64, size: u64) -> u64 {
    let target = match from {
        SeekFrom::Start(offset) => offset as i128,
        SeekFrom::Current(delta) => position as i128 + delta as i128,
        SeekFrom::End(delta) => size as i128 + delta as i128,
    };
    target.clamp(0, size as i128) as u64
}

/// Byte source over an open file.
///
/// When a `length` window was requested at open time, reading stops at its
/// end; otherwise reads continue to the raw end of the file, which may
/// move while the stream is open.
pub struct ReadStream {
    ctx: StreamContext,
    raw: Box<dyn RawReadStream>,
    position: u64,
    /// Exclusive end of the readable window, when one was requested.
    limit: Option<u64>,
    /// File size observed at open time; the seek anchor for
    /// [`SeekFrom::End`].
    size: u64,
    closed: bool,
}

impl ReadStream {
    pub(crate) fn new(
        ctx: StreamContext,
        raw: Box<dyn RawReadStream>,
        size: u64,
        position: u64,
        limit: Option<u64>,
    ) -> Self {
        Self { ctx, raw, position, limit, size, closed: false }
    }

    /// Current byte position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// File size observed at open time.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(self.ctx.closed_error());
        }
        Ok(())
    }

    async fn raw_read(&mut self, max: usize) -> FsResult<Option<Bytes>> {
        let chunk = self.raw.read(max).await.map_err(|raw| self.ctx.read_error(raw))?;
        if let Some(chunk) = &chunk {
            self.position += chunk.len() as u64;
        }
        Ok(chunk)
    }

    /// Reads the next chunk, or at most `size` bytes when given.
    ///
    /// A request not exceeding the buffer size maps to one raw read;
    /// larger requests accumulate buffer-sized raw reads into a single
    /// chunk. Returns `None` at the end of the readable window.
    pub async fn read(&mut self, size: Option<usize>) -> FsResult<Option<Bytes>> {
        self.ensure_open()?;
        if size == Some(0) {
            return Ok(Some(Bytes::new()));
        }
        let remaining = match self.limit {
            Some(limit) => {
                let remaining = limit.saturating_sub(self.position);
                if remaining == 0 {
                    return Ok(None);
                }
                usize::try_from(remaining).unwrap_or(usize::MAX)
            }
            None => usize::MAX,
        };
        match size {
            None => self.raw_read(self.ctx.buffer_size.min(remaining)).await,
            Some(want) if want <= self.ctx.buffer_size => self.raw_read(want.min(remaining)).await,
            Some(want) => {
                let want = want.min(remaining);
                let mut parts: Vec<Bytes> = Vec::new();
                let mut collected = 0usize;
                while collected < want {
                    match self.raw_read((want - collected).min(self.ctx.buffer_size)).await? {
                        Some(chunk) => {
                            collected += chunk.len();
                            parts.push(chunk);
                        }
                        None => break,
                    }
                }
                match parts.len() {
                    0 => Ok(None),
                    1 => Ok(parts.pop()),
                    _ => Ok(Some(self.ctx.converter.merge(&parts))),
                }
            }
        }
    }

    /// Reads from the current position to the end of the window.
    pub async fn read_to_end(&mut self) -> FsResult<Bytes> {
        let mut parts: Vec<Bytes> = Vec::new();
        while let Some(chunk) = self.read(None).await? {
            parts.push(chunk);
        }
        Ok(self.ctx.converter.merge(&parts))
    }

    /// Moves the position, clamped to `[0, size]`, and returns it.
    pub async fn seek(&mut self, from: SeekFrom) -> FsResult<u64> {
        self.ensure_open()?;
        let target = clamp_seek(from, self.position, self.size);
        self.raw.seek(target).await.map_err(|raw| self.ctx.read_error(raw))?;
        self.position = target;
        Ok(target)
    }

    /// Copies everything from the current position into `target`,
    /// aborting on the first error of either side.
    pub async fn pipe(&mut self, target: &mut WriteStream) -> FsResult<()> {
        while let Some(chunk) = self.read(None).await? {
            target.write(chunk).await?;
        }
        Ok(())
    }

    /// Releases the backend handle and fires the read-completion hook.
    /// Idempotent after the first call.
    pub async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.raw.close().await.map_err(|raw| self.ctx.read_error(raw))?;
        if !self.ctx.ignore_hook {
            if let Some(hooks) = &self.ctx.hooks {
                if let Err(error) = hooks.after_get(&self.ctx.path).await {
                    log_after_failure("get", &self.ctx.repository, &self.ctx.path, &error);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream")
            .field("path", &self.ctx.path)
            .field("position", &self.position)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Byte sink over an open file.
pub struct WriteStream {
    ctx: StreamContext,
    raw: Box<dyn RawWriteStream>,
    position: u64,
    size: u64,
    dirty: bool,
    /// Whether the stream was opened in create-new mode; picks the
    /// close-time hook.
    created: bool,
    closed: bool,
}

impl WriteStream {
    pub(crate) fn new(
        ctx: StreamContext,
        raw: Box<dyn RawWriteStream>,
        size: u64,
        position: u64,
        created: bool,
    ) -> Self {
        Self { ctx, raw, position, size, dirty: false, created, closed: false }
    }

    /// Current byte position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Current file size as observed through this stream.
    pub fn size(&self) -> u64 {
        self.size
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(self.ctx.closed_error());
        }
        Ok(())
    }

    /// Writes `data` at the current position, extending the file as
    /// needed, and returns the number of bytes written.
    pub async fn write(&mut self, data: Bytes) -> FsResult<usize> {
        self.ensure_open()?;
        if data.is_empty() {
            return Ok(0);
        }
        let written = self.raw.write(data).await.map_err(|raw| self.ctx.write_error(raw))?;
        self.position += written as u64;
        if self.position > self.size {
            self.size = self.position;
        }
        self.dirty = true;
        Ok(written)
    }

    /// Shrinks the file to at most `size` bytes. Never grows; a size past
    /// the end is clamped to the current size. The position follows the
    /// new end when it would otherwise point past it.
    pub async fn truncate(&mut self, size: u64) -> FsResult<()> {
        self.ensure_open()?;
        let new_size = size.min(self.size);
        self.raw.truncate(new_size).await.map_err(|raw| self.ctx.write_error(raw))?;
        self.size = new_size;
        if self.position > new_size {
            self.raw.seek(new_size).await.map_err(|raw| self.ctx.write_error(raw))?;
            self.position = new_size;
        }
        self.dirty = true;
        Ok(())
    }

    /// Moves the position, clamped to `[0, size]`, and returns it.
    pub async fn seek(&mut self, from: SeekFrom) -> FsResult<u64> {
        self.ensure_open()?;
        let target = clamp_seek(from, self.position, self.size);
        self.raw.seek(target).await.map_err(|raw| self.ctx.write_error(raw))?;
        self.position = target;
        Ok(target)
    }

    /// Flushes and releases the backend handle, then fires the matching
    /// write-completion hook when anything was written. Idempotent after
    /// the first call.
    pub async fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.raw.close().await.map_err(|raw| self.ctx.write_error(raw))?;
        if self.dirty && !self.ctx.ignore_hook {
            if let Some(hooks) = &self.ctx.hooks {
                let result = if self.created {
                    hooks.after_post(&self.ctx.path).await
                } else {
                    hooks.after_put(&self.ctx.path).await
                };
                if let Err(error) = result {
                    let operation = if self.created { "post" } else { "put" };
                    log_after_failure(operation, &self.ctx.repository, &self.ctx.path, &error);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for WriteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteStream")
            .field("path", &self.ctx.path)
            .field("position", &self.position)
            .field("dirty", &self.dirty)
            .field("closed", &self.closed)
            .finish()
    }
}

/// Raw read stream synthesized over preloaded content.
pub(crate) struct BufferReadStream {
    content: Bytes,
    cursor: u64,
}

impl BufferReadStream {
    pub(crate) fn new(content: Bytes) -> Self {
        Self { content, cursor: 0 }
    }
}

#[async_trait]
impl RawReadStream for BufferReadStream {
    async fn read(&mut self, max: usize) -> RawResult<Option<Bytes>> {
        let len = self.content.len() as u64;
        if self.cursor >= len {
            return Ok(None);
        }
        let start = self.cursor as usize;
        let end = (start + max).min(self.content.len());
        self.cursor = end as u64;
        Ok(Some(self.content.slice(start..end)))
    }

    async fn seek(&mut self, position: u64) -> RawResult<()> {
        self.cursor = position.min(self.content.len() as u64);
        Ok(())
    }

    async fn close(&mut self) -> RawResult<()> {
        Ok(())
    }
}

/// Raw write stream synthesized over whole-content save. Accumulates
/// writes in memory and flushes once on close.
pub(crate) struct BufferWriteStream {
    backend: Arc<dyn FsBackend>,
    path: String,
    data: Vec<u8>,
    cursor: u64,
    create: bool,
}

impl BufferWriteStream {
    pub(crate) fn new(backend: Arc<dyn FsBackend>, path: String, base: Bytes, create: bool) -> Self {
        Self { backend, path, data: base.to_vec(), cursor: 0, create }
    }
}

#[async_trait]
impl RawWriteStream for BufferWriteStream {
    async fn write(&mut self, chunk: Bytes) -> RawResult<usize> {
        let start = self.cursor as usize;
        let end = start + chunk.len();
        if self.data.len() < end {
            self.data.resize(end, 0);
        }
        self.data[start..end].copy_from_slice(&chunk);
        self.cursor = end as u64;
        Ok(chunk.len())
    }

    async fn truncate(&mut self, size: u64) -> RawResult<()> {
        self.data.truncate(size as usize);
        if self.cursor > size {
            self.cursor = size;
        }
        Ok(())
    }

    async fn seek(&mut self, position: u64) -> RawResult<()> {
        let position = position as usize;
        if self.data.len() < position {
            self.data.resize(position, 0);
        }
        self.cursor = position as u64;
        Ok(())
    }

    async fn close(&mut self) -> RawResult<()> {
        let content = Bytes::from(mem::take(&mut self.data));
        let flags = SaveFlags { append: false, create: self.create };
        self.backend.save(&self.path, content, flags).await
    }
}
