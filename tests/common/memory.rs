//! A small in-memory backend used by the integration tests.
//!
//! Capability flags are toggleable so the tests can drive both the native
//! paths (streams, append, range I/O) and the emulation fallbacks of the
//! core against the same store.

use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use omnifs::backend::{
    FsBackend, FsConfig, LoadRange, RawReadStream, RawWriteStream, SaveFlags,
};
use omnifs::error::{ErrorKind, FsError, RawResult};
use omnifs::options::{OpenReadOptions, OpenWriteOptions, UrlKind};
use omnifs::path;
use omnifs::stats::{Props, Stats};

/// Which primitives the backend pretends to support natively.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    pub append: bool,
    pub range_read: bool,
    pub range_write: bool,
    pub streams: bool,
}

impl Capabilities {
    /// Everything native.
    pub fn full() -> Self {
        Self { append: true, range_read: true, range_write: true, streams: true }
    }

    /// Whole-content load and save only; every fallback engages.
    pub fn minimal() -> Self {
        Self { append: false, range_read: false, range_write: false, streams: false }
    }
}

fn now_ms() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as i64
}

#[derive(Debug, Clone)]
enum Node {
    File {
        data: Vec<u8>,
        created: i64,
        modified: i64,
        deleted: Option<i64>,
    },
    Directory {
        created: i64,
        deleted: Option<i64>,
    },
}

impl Node {
    fn new_file() -> Self {
        let now = now_ms();
        Node::File { data: Vec::new(), created: now, modified: now, deleted: None }
    }

    fn new_directory() -> Self {
        Node::Directory { created: now_ms(), deleted: None }
    }

    fn stats(&self) -> Stats {
        match self {
            Node::File { data, created, modified, deleted } => Stats {
                size: Some(data.len() as u64),
                accessed: None,
                created: Some(*created),
                modified: Some(*modified),
                deleted: *deleted,
            },
            Node::Directory { created, deleted } => Stats {
                size: None,
                accessed: None,
                created: Some(*created),
                modified: None,
                deleted: *deleted,
            },
        }
    }
}

type State = BTreeMap<String, Node>;

/// In-memory repository rooted at `/`.
pub struct MemoryFs {
    repository: String,
    config: FsConfig,
    caps: Capabilities,
    state: Arc<RwLock<State>>,
}

impl MemoryFs {
    pub fn new(repository: &str, config: FsConfig, caps: Capabilities) -> Self {
        let mut state = State::new();
        state.insert("/".to_owned(), Node::new_directory());
        Self {
            repository: repository.to_owned(),
            config,
            caps,
            state: Arc::new(RwLock::new(state)),
        }
    }

    fn not_found(&self, path: &str) -> Box<FsError> {
        Box::new(FsError::new(ErrorKind::NotFound, &self.repository, path))
    }

    fn require_parent_dir(&self, state: &State, path: &str) -> RawResult<()> {
        let parent = path::parent(path).unwrap_or_else(|_| "/".to_owned());
        match state.get(&parent) {
            Some(Node::Directory { .. }) => Ok(()),
            Some(_) => Err(Box::new(io::Error::new(
                io::ErrorKind::Other,
                format!("parent is not a directory: {parent}"),
            ))),
            None => Err(Box::new(io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent is missing: {parent}"),
            ))),
        }
    }
}

#[async_trait]
impl FsBackend for MemoryFs {
    fn repository(&self) -> &str {
        &self.repository
    }

    fn config(&self) -> &FsConfig {
        &self.config
    }

    async fn head(&self, path: &str) -> RawResult<Option<Stats>> {
        let state = self.state.read().await;
        Ok(state.get(path).map(Node::stats))
    }

    async fn patch(&self, path: &str, props: &Props) -> RawResult<()> {
        let mut state = self.state.write().await;
        let Some(node) = state.get_mut(path) else {
            return Err(self.not_found(path));
        };
        match node {
            Node::File { created, modified, deleted, .. } => {
                if let Some(value) = props.stats.created {
                    *created = value;
                }
                if let Some(value) = props.stats.modified {
                    *modified = value;
                }
                *deleted = props.stats.deleted;
            }
            Node::Directory { created, deleted } => {
                if let Some(value) = props.stats.created {
                    *created = value;
                }
                *deleted = props.stats.deleted;
            }
        }
        Ok(())
    }

    async fn list(&self, path: &str) -> RawResult<Vec<String>> {
        let state = self.state.read().await;
        match state.get(path) {
            Some(Node::Directory { .. }) => {}
            Some(_) => {
                return Err(Box::new(io::Error::new(
                    io::ErrorKind::Other,
                    "not a directory",
                )))
            }
            None => return Err(self.not_found(path)),
        }
        let mut children = Vec::new();
        for (key, node) in state.iter() {
            if key == path {
                continue;
            }
            let parent = path::parent(key).unwrap_or_else(|_| "/".to_owned());
            if parent == path {
                // Directories carry a trailing slash marker.
                match node {
                    Node::Directory { .. } => children.push(format!("{key}/")),
                    Node::File { .. } => children.push(key.clone()),
                }
            }
        }
        Ok(children)
    }

    async fn mkcol(&self, path: &str) -> RawResult<()> {
        let mut state = self.state.write().await;
        self.require_parent_dir(&state, path)?;
        if state.contains_key(path) {
            return Err(Box::new(FsError::new(
                ErrorKind::PathExist,
                &self.repository,
                path,
            )));
        }
        state.insert(path.to_owned(), Node::new_directory());
        Ok(())
    }

    async fn rmdir(&self, path: &str) -> RawResult<()> {
        let mut state = self.state.write().await;
        match state.get(path) {
            Some(Node::Directory { .. }) => {}
            Some(_) => {
                return Err(Box::new(io::Error::new(io::ErrorKind::Other, "not a directory")))
            }
            None => return Err(self.not_found(path)),
        }
        let occupied = state.keys().any(|key| {
            key != path && path::parent(key).map(|parent| parent == path).unwrap_or(false)
        });
        if occupied {
            // Foreign error on purpose; the core translates it.
            return Err(Box::new(io::Error::new(
                io::ErrorKind::Other,
                "directory not empty",
            )));
        }
        state.remove(path);
        Ok(())
    }

    async fn load(&self, path: &str, range: LoadRange) -> RawResult<Bytes> {
        let state = self.state.read().await;
        match state.get(path) {
            Some(Node::File { data, .. }) => {
                let whole = Bytes::from(data.clone());
                if self.caps.range_read {
                    let len = whole.len() as u64;
                    let start = range.start.unwrap_or(0).min(len);
                    let end = match range.length {
                        Some(length) => start.saturating_add(length).min(len),
                        None => len,
                    };
                    Ok(whole.slice(start as usize..end as usize))
                } else {
                    Ok(whole)
                }
            }
            Some(_) => Err(Box::new(io::Error::new(io::ErrorKind::Other, "is a directory"))),
            None => Err(self.not_found(path)),
        }
    }

    async fn save(&self, path: &str, content: Bytes, flags: SaveFlags) -> RawResult<()> {
        let mut state = self.state.write().await;
        self.require_parent_dir(&state, path)?;
        match state.get_mut(path) {
            Some(Node::File { data, modified, .. }) => {
                if flags.append && self.caps.append {
                    data.extend_from_slice(&content);
                } else {
                    *data = content.to_vec();
                }
                *modified = now_ms();
            }
            Some(_) => {
                return Err(Box::new(io::Error::new(io::ErrorKind::Other, "is a directory")))
            }
            None => {
                let mut node = Node::new_file();
                if let Node::File { data, .. } = &mut node {
                    *data = content.to_vec();
                }
                state.insert(path.to_owned(), node);
            }
        }
        Ok(())
    }

    async fn rm(&self, path: &str) -> RawResult<()> {
        let mut state = self.state.write().await;
        match state.get(path) {
            Some(Node::File { .. }) => {
                state.remove(path);
                Ok(())
            }
            Some(_) => Err(Box::new(io::Error::new(io::ErrorKind::Other, "is a directory"))),
            None => Err(self.not_found(path)),
        }
    }

    fn supports_append(&self) -> bool {
        self.caps.append
    }

    fn supports_range_read(&self) -> bool {
        self.caps.range_read
    }

    fn supports_range_write(&self) -> bool {
        self.caps.range_write
    }

    async fn create_read_stream(
        &self,
        path: &str,
        _options: &OpenReadOptions,
    ) -> RawResult<Option<Box<dyn RawReadStream>>> {
        if !self.caps.streams {
            return Ok(None);
        }
        {
            let state = self.state.read().await;
            if !matches!(state.get(path), Some(Node::File { .. })) {
                return Err(self.not_found(path));
            }
        }
        Ok(Some(Box::new(MemoryReadStream {
            state: Arc::clone(&self.state),
            path: path.to_owned(),
            cursor: 0,
        })))
    }

    async fn create_write_stream(
        &self,
        path: &str,
        options: &OpenWriteOptions,
    ) -> RawResult<Option<Box<dyn RawWriteStream>>> {
        if !self.caps.streams {
            return Ok(None);
        }
        let truncate = !options.append && options.start.is_none();
        {
            let mut state = self.state.write().await;
            self.require_parent_dir(&state, path)?;
            match state.get_mut(path) {
                Some(Node::File { data, modified, .. }) => {
                    if truncate {
                        data.clear();
                        *modified = now_ms();
                    }
                }
                Some(_) => {
                    return Err(Box::new(io::Error::new(
                        io::ErrorKind::Other,
                        "is a directory",
                    )))
                }
                None => {
                    state.insert(path.to_owned(), Node::new_file());
                }
            }
        }
        Ok(Some(Box::new(MemoryWriteStream {
            state: Arc::clone(&self.state),
            path: path.to_owned(),
            cursor: 0,
        })))
    }

    async fn to_url(&self, path: &str, kind: UrlKind) -> RawResult<String> {
        match kind {
            UrlKind::Get => Ok(format!("memory://{}{}", self.repository, path)),
            _ => Err(Box::new(
                FsError::new(ErrorKind::NotSupported, &self.repository, path)
                    .with_message("only GET URLs are supported"),
            )),
        }
    }
}

/// Read stream observing the live store, so concurrent writers are
/// visible.
struct MemoryReadStream {
    state: Arc<RwLock<State>>,
    path: String,
    cursor: u64,
}

#[async_trait]
impl RawReadStream for MemoryReadStream {
    async fn read(&mut self, max: usize) -> RawResult<Option<Bytes>> {
        let state = self.state.read().await;
        let Some(Node::File { data, .. }) = state.get(&self.path) else {
            return Err(Box::new(io::Error::new(io::ErrorKind::NotFound, "file vanished")));
        };
        let len = data.len() as u64;
        if self.cursor >= len {
            return Ok(None);
        }
        let start = self.cursor as usize;
        let end = (start + max).min(data.len());
        self.cursor = end as u64;
        Ok(Some(Bytes::from(data[start..end].to_vec())))
    }

    async fn seek(&mut self, position: u64) -> RawResult<()> {
        self.cursor = position;
        Ok(())
    }

    async fn close(&mut self) -> RawResult<()> {
        Ok(())
    }
}

/// Write-through stream; every chunk lands in the store immediately.
struct MemoryWriteStream {
    state: Arc<RwLock<State>>,
    path: String,
    cursor: u64,
}

#[async_trait]
impl RawWriteStream for MemoryWriteStream {
    async fn write(&mut self, chunk: Bytes) -> RawResult<usize> {
        let mut state = self.state.write().await;
        let Some(Node::File { data, modified, .. }) = state.get_mut(&self.path) else {
            return Err(Box::new(io::Error::new(io::ErrorKind::NotFound, "file vanished")));
        };
        let start = self.cursor as usize;
        let end = start + chunk.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(&chunk);
        *modified = now_ms();
        self.cursor = end as u64;
        Ok(chunk.len())
    }

    async fn truncate(&mut self, size: u64) -> RawResult<()> {
        let mut state = self.state.write().await;
        let Some(Node::File { data, modified, .. }) = state.get_mut(&self.path) else {
            return Err(Box::new(io::Error::new(io::ErrorKind::NotFound, "file vanished")));
        };
        data.truncate(size as usize);
        *modified = now_ms();
        if self.cursor > size {
            self.cursor = size;
        }
        Ok(())
    }

    async fn seek(&mut self, position: u64) -> RawResult<()> {
        self.cursor = position;
        Ok(())
    }

    async fn close(&mut self) -> RawResult<()> {
        Ok(())
    }
}
