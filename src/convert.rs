//! Defines conversion between the binary representations the core handles.
//!
//! File contents travel as [`Bytes`]; callers may also supply or request
//! UTF-8 text and base64 renditions. The converter additionally provides
//! the byte-level splice and chunking primitives the emulation paths and
//! the hash engine are built on.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::{Bytes, BytesMut};
use thiserror::Error;

use crate::options::DEFAULT_BUFFER_SIZE;

/// Result of conversion operations.
pub type Result<T> = std::result::Result<T, ConvertError>;

/// Errors raised while converting between representations.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// The input is not valid UTF-8.
    #[error("invalid utf-8 data")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The input is not valid base64.
    #[error("invalid base64 data")]
    Base64(#[from] base64::DecodeError),
}

/// A piece of content in one of the supported representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Data {
    /// Raw bytes.
    Bytes(Bytes),
    /// UTF-8 text.
    Text(String),
    /// Base64-encoded bytes.
    Base64(String),
}

/// Discriminator of [`Data`] representations.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DataKind {
    Bytes,
    Text,
    Base64,
}

impl Data {
    /// Representation of this piece of content.
    pub fn kind(&self) -> DataKind {
        match self {
            Data::Bytes(_) => DataKind::Bytes,
            Data::Text(_) => DataKind::Text,
            Data::Base64(_) => DataKind::Base64,
        }
    }
}

impl From<Bytes> for Data {
    fn from(value: Bytes) -> Self {
        Data::Bytes(value)
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::Text(value)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::Text(value.to_owned())
    }
}

/// Conversion service the core delegates byte juggling to.
///
/// The default implementation suffices for every backend; it is replaceable
/// through the repository configuration for backends with bespoke
/// representations.
pub trait Converter: Send + Sync {
    /// Converts `data` into the `target` representation.
    fn convert(&self, data: Data, target: DataKind) -> Result<Data>;

    /// Decodes `data` into raw bytes.
    fn to_bytes(&self, data: Data) -> Result<Bytes> {
        match self.convert(data, DataKind::Bytes)? {
            Data::Bytes(bytes) => Ok(bytes),
            _ => unreachable!("convert returned a different representation"),
        }
    }

    /// Cuts `[start, start + length)` out of `data`, clamped to its bounds.
    /// An absent `start` means the beginning, an absent `length` the rest.
    fn slice(&self, data: &Bytes, start: Option<u64>, length: Option<u64>) -> Bytes;

    /// Concatenates `parts` into one buffer.
    fn merge(&self, parts: &[Bytes]) -> Bytes;

    /// Splices `patch` into `base` at `start`, replacing `length` bytes in
    /// place. `length` defaults to the patch length and is capped by it; a
    /// start beyond the end of `base` zero-fills the gap.
    fn modify(&self, base: &Bytes, patch: &Bytes, start: Option<u64>, length: Option<u64>)
        -> Bytes;

    /// An empty piece of content.
    fn empty(&self) -> Bytes {
        Bytes::new()
    }
}

/// The built-in converter.
#[derive(Debug, Default)]
pub struct DefaultConverter;

impl Converter for DefaultConverter {
    fn convert(&self, data: Data, target: DataKind) -> Result<Data> {
        let bytes = match data {
            Data::Bytes(bytes) => bytes,
            Data::Text(text) => Bytes::from(text.into_bytes()),
            Data::Base64(encoded) => Bytes::from(BASE64.decode(encoded.as_bytes())?),
        };
        Ok(match target {
            DataKind::Bytes => Data::Bytes(bytes),
            DataKind::Text => Data::Text(String::from_utf8(bytes.to_vec())?),
            DataKind::Base64 => Data::Base64(BASE64.encode(&bytes)),
        })
    }

    fn slice(&self, data: &Bytes, start: Option<u64>, length: Option<u64>) -> Bytes {
        let len = data.len() as u64;
        let start = start.unwrap_or(0).min(len);
        let end = match length {
            Some(length) => start.saturating_add(length).min(len),
            None => len,
        };
        data.slice(start as usize..end as usize)
    }

    fn merge(&self, parts: &[Bytes]) -> Bytes {
        let total = parts.iter().map(Bytes::len).sum();
        let mut merged = BytesMut::with_capacity(total);
        for part in parts {
            merged.extend_from_slice(part);
        }
        merged.freeze()
    }

    fn modify(
        &self,
        base: &Bytes,
        patch: &Bytes,
        start: Option<u64>,
        length: Option<u64>,
    ) -> Bytes {
        let start = start.unwrap_or(0) as usize;
        let replaced = match length {
            Some(length) => (length as usize).min(patch.len()),
            None => patch.len(),
        };
        let mut modified = Vec::with_capacity(base.len().max(start + replaced));
        if start <= base.len() {
            modified.extend_from_slice(&base[..start]);
        } else {
            modified.extend_from_slice(base);
            modified.resize(start, 0);
        }
        modified.extend_from_slice(&patch[..replaced]);
        let tail = start + replaced;
        if tail < base.len() {
            modified.extend_from_slice(&base[tail..]);
        }
        Bytes::from(modified)
    }
}

/// Iterator cutting a buffer into chunks of at most `chunk_size` bytes.
pub struct ChunkIter {
    data: Bytes,
    chunk_size: usize,
    offset: usize,
}

impl Iterator for ChunkIter {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        if self.offset >= self.data.len() {
            return None;
        }
        let end = (self.offset + self.chunk_size).min(self.data.len());
        let chunk = self.data.slice(self.offset..end);
        self.offset = end;
        Some(chunk)
    }
}

/// Cuts `data` into chunks of at most `chunk_size` bytes; zero falls back
/// to [`DEFAULT_BUFFER_SIZE`].
pub fn chunks(data: Bytes, chunk_size: usize) -> ChunkIter {
    let chunk_size = if chunk_size == 0 { DEFAULT_BUFFER_SIZE } else { chunk_size };
    ChunkIter { data, chunk_size, offset: 0 }
}
