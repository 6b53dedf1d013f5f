//! Defines entry handles and the operation machinery shared by both kinds.
//!
//! Entries are transient, cheap handles: a backend reference plus a
//! normalized path. The head/patch brackets, the delete hook bracket, and
//! the transfer (xmit) engine live here so that the file and directory
//! variants only contribute their primitive-specific behavior.

use std::fmt;
use std::sync::Arc;

use crate::backend::FsBackend;
use crate::directory::Directory;
use crate::error::{ErrorKind, FsError, FsResult};
use crate::file::File;
use crate::hook::{before_read_failure, before_write_failure, log_after_failure};
use crate::options::{
    CopyOptions, DeleteOptions, EntryType, HeadOptions, ListOptions, MkcolOptions, MoveOptions,
    PatchOptions, UrlKind, XmitOptions,
};
use crate::path;
use crate::stats::{Props, Stats};

/// Normalizes `input`, reporting violations against `repository`.
pub(crate) fn normalize_path(repository: &str, input: &str) -> FsResult<String> {
    path::normalize(input).map_err(|error| {
        FsError::new(ErrorKind::Syntax, repository, input).with_message(error.to_string())
    })
}

/// Metadata query with the full hook bracket and logical-delete masking.
pub(crate) async fn head_entry(
    backend: &Arc<dyn FsBackend>,
    path: &str,
    options: &HeadOptions,
) -> FsResult<Stats> {
    let repository = backend.repository();
    let config = backend.config();
    let hooks = if options.ignore_hook { None } else { config.hooks.clone() };
    if let Some(hooks) = &hooks {
        match hooks.before_head(path, options).await {
            Ok(Some(stats)) => return Ok(stats),
            Ok(None) => {}
            Err(error) => return Err(before_read_failure(repository, path, error)),
        }
    }
    let stats = match backend.head(path).await {
        Ok(Some(stats)) => stats,
        Ok(None) => return Err(FsError::new(ErrorKind::NotFound, repository, path)),
        Err(raw) => return Err(FsError::from_read(repository, path, raw)),
    };
    if config.logical_delete && stats.deleted.is_some() {
        return Err(FsError::new(ErrorKind::NotFound, repository, path)
            .with_message("entry is logically deleted"));
    }
    if let Some(hooks) = &hooks {
        if let Err(error) = hooks.after_head(path, &stats).await {
            log_after_failure("head", repository, path, &error);
        }
    }
    Ok(stats)
}

/// Like [`head_entry`] but mapping not-found to `None`.
pub(crate) async fn head_optional(
    backend: &Arc<dyn FsBackend>,
    path: &str,
    options: &HeadOptions,
) -> FsResult<Option<Stats>> {
    match head_entry(backend, path, options).await {
        Ok(stats) => Ok(Some(stats)),
        Err(error) if error.is(ErrorKind::NotFound) => Ok(None),
        Err(error) => Err(error),
    }
}

/// Property patch: hook bracket, merge over current stats, primitive.
pub(crate) async fn patch_entry(
    backend: &Arc<dyn FsBackend>,
    path: &str,
    props: &Props,
    options: &PatchOptions,
) -> FsResult<()> {
    let repository = backend.repository();
    let hooks = if options.ignore_hook { None } else { backend.config().hooks.clone() };
    if let Some(hooks) = &hooks {
        match hooks.before_patch(path, props, options).await {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(error) => return Err(before_write_failure(repository, path, error)),
        }
    }
    let current = head_entry(backend, path, &HeadOptions { ignore_hook: true }).await?;
    let merged = props.merged_over(&current);
    backend
        .patch(path, &merged)
        .await
        .map_err(|raw| FsError::from_write(repository, path, raw))?;
    if let Some(hooks) = &hooks {
        if let Err(error) = hooks.after_patch(path).await {
            log_after_failure("patch", repository, path, &error);
        }
    }
    Ok(())
}

/// URL production, delegated to the backend.
pub(crate) async fn url_entry(
    backend: &Arc<dyn FsBackend>,
    path: &str,
    kind: UrlKind,
) -> FsResult<String> {
    backend
        .to_url(path, kind)
        .await
        .map_err(|raw| FsError::from_read(backend.repository(), path, raw))
}

/// Fires the before-delete hook; `Some` short-circuits the delete.
pub(crate) async fn before_delete_hook(
    backend: &Arc<dyn FsBackend>,
    path: &str,
    options: &DeleteOptions,
) -> FsResult<Option<Vec<FsError>>> {
    if options.ignore_hook {
        return Ok(None);
    }
    let Some(hooks) = backend.config().hooks.clone() else {
        return Ok(None);
    };
    hooks
        .before_delete(path, options)
        .await
        .map_err(|error| before_write_failure(backend.repository(), path, error))
}

/// Fires the after-delete hook, logging failures.
pub(crate) async fn after_delete_hook(backend: &Arc<dyn FsBackend>, path: &str, ignore: bool) {
    if ignore {
        return;
    }
    if let Some(hooks) = &backend.config().hooks {
        if let Err(error) = hooks.after_delete(path).await {
            log_after_failure("delete", backend.repository(), path, &error);
        }
    }
}

/// A file or directory handle.
#[derive(Clone)]
pub enum Entry {
    File(File),
    Directory(Directory),
}

impl Entry {
    /// Materializes the handle matching `stats`.
    pub(crate) fn from_stats(backend: Arc<dyn FsBackend>, path: String, stats: &Stats) -> Entry {
        if stats.is_directory() {
            Entry::Directory(Directory::from_normalized(backend, path))
        } else {
            Entry::File(File::from_normalized(backend, path))
        }
    }

    /// Normalized path of the entry.
    pub fn path(&self) -> &str {
        match self {
            Entry::File(file) => file.path(),
            Entry::Directory(dir) => dir.path(),
        }
    }

    /// Repository the entry belongs to.
    pub fn repository(&self) -> &str {
        match self {
            Entry::File(file) => file.repository(),
            Entry::Directory(dir) => dir.repository(),
        }
    }

    /// Kind of the entry.
    pub fn entry_type(&self) -> EntryType {
        match self {
            Entry::File(_) => EntryType::File,
            Entry::Directory(_) => EntryType::Directory,
        }
    }

    pub(crate) fn backend(&self) -> &Arc<dyn FsBackend> {
        match self {
            Entry::File(file) => file.backend(),
            Entry::Directory(dir) => dir.backend(),
        }
    }

    /// Entry metadata.
    pub async fn head(&self, options: &HeadOptions) -> FsResult<Stats> {
        head_entry(self.backend(), self.path(), options).await
    }

    /// Applies properties to the entry.
    pub async fn patch(&self, props: &Props, options: &PatchOptions) -> FsResult<()> {
        patch_entry(self.backend(), self.path(), props, options).await
    }

    /// Deletes the entry, dispatching on its kind.
    pub async fn delete(&self, options: &DeleteOptions) -> FsResult<Vec<FsError>> {
        match self {
            Entry::File(file) => file.delete(options).await,
            Entry::Directory(dir) => dir.delete(options).await,
        }
    }

    /// Copies the entry onto a same-kind destination.
    pub async fn copy(&self, to: &Entry, options: &CopyOptions) -> FsResult<Vec<FsError>> {
        match (self, to) {
            (Entry::File(src), Entry::File(dst)) => src.copy(dst, options).await,
            (Entry::Directory(src), Entry::Directory(dst)) => src.copy(dst, options).await,
            _ => Err(kind_mismatch(self, to)),
        }
    }

    /// Moves the entry onto a same-kind destination.
    pub async fn move_to(&self, to: &Entry, options: &MoveOptions) -> FsResult<Vec<FsError>> {
        match (self, to) {
            (Entry::File(src), Entry::File(dst)) => src.move_to(dst, options).await,
            (Entry::Directory(src), Entry::Directory(dst)) => src.move_to(dst, options).await,
            _ => Err(kind_mismatch(self, to)),
        }
    }

    /// Addressable URL of the entry for the given verb.
    pub async fn to_url(&self, kind: UrlKind) -> FsResult<String> {
        url_entry(self.backend(), self.path(), kind).await
    }

    /// Final path segment of the entry.
    pub fn name(&self) -> String {
        path::basename(self.path()).unwrap_or_default()
    }

    /// Handle of the containing directory.
    pub fn parent(&self) -> Directory {
        let parent = path::parent(self.path()).unwrap_or_else(|_| "/".to_owned());
        Directory::from_normalized(Arc::clone(self.backend()), parent)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository(), self.path())
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::File(file) => fmt::Debug::fmt(file, f),
            Entry::Directory(dir) => fmt::Debug::fmt(dir, f),
        }
    }
}

fn kind_mismatch(src: &Entry, dst: &Entry) -> FsError {
    FsError::new(ErrorKind::TypeMismatch, src.repository(), src.path())
        .with_route(src.path(), dst.path())
        .with_message("source and destination kinds differ")
}

/// One unit of transfer work.
enum Work {
    Transfer { src: Entry, dst: Entry, root: bool },
    /// Source directory whose children have been moved away; remove the
    /// empty shell.
    Shell { src: Directory },
}

/// Transfer engine unifying copy and move.
///
/// Flattens the tree walk onto an explicit work stack so deep trees do not
/// grow the call stack. Per-child failures accumulate into the returned
/// list; without `force` the walk stops at the first of them. In move mode
/// every transferred child is deleted after its copy; the root source is
/// left to the caller.
pub(crate) async fn xmit(src: Entry, dst: Entry, options: &XmitOptions) -> FsResult<Vec<FsError>> {
    let mut errors: Vec<FsError> = Vec::new();
    let mut stack = vec![Work::Transfer { src, dst, root: true }];
    while let Some(work) = stack.pop() {
        match work {
            Work::Transfer { src, dst, root } => match (&src, &dst) {
                (Entry::File(source), Entry::File(target)) => {
                    match source.xmit_file(target, options).await {
                        Ok(()) => {
                            if options.move_source && !root {
                                let delete = DeleteOptions {
                                    force: options.force,
                                    recursive: false,
                                    ignore_hook: options.ignore_hook,
                                };
                                match source.delete(&delete).await {
                                    Ok(more) => errors.extend(more),
                                    Err(error) => errors.push(error),
                                }
                            }
                        }
                        Err(error) => {
                            errors.push(error.with_route(source.path(), target.path()));
                        }
                    }
                }
                (Entry::Directory(source), Entry::Directory(target)) => {
                    let mkcol = MkcolOptions {
                        force: options.force,
                        recursive: false,
                        ignore_hook: options.ignore_hook,
                    };
                    if let Err(error) = target.mkcol(&mkcol).await {
                        errors.push(error.with_route(source.path(), target.path()));
                        if !options.force {
                            break;
                        }
                        continue;
                    }
                    if !options.recursive {
                        continue;
                    }
                    if options.move_source && !root {
                        stack.push(Work::Shell { src: source.clone() });
                    }
                    let list = ListOptions { ignore_hook: options.ignore_hook };
                    let children = match source.list(&list).await {
                        Ok(children) => children,
                        Err(error) => {
                            errors.push(error.with_route(source.path(), target.path()));
                            if !options.force {
                                break;
                            }
                            continue;
                        }
                    };
                    let head = HeadOptions { ignore_hook: options.ignore_hook };
                    for child in children {
                        let stats = match head_entry(source.backend(), &child, &head).await {
                            Ok(stats) => stats,
                            Err(error) => {
                                errors.push(error);
                                continue;
                            }
                        };
                        let name = path::basename(&child).unwrap_or_default();
                        let target_path = match path::join(target.path(), &name) {
                            Ok(path) => path,
                            Err(error) => {
                                errors.push(
                                    FsError::new(
                                        ErrorKind::Syntax,
                                        target.repository(),
                                        target.path(),
                                    )
                                    .with_message(error.to_string()),
                                );
                                continue;
                            }
                        };
                        let src_child =
                            Entry::from_stats(Arc::clone(source.backend()), child, &stats);
                        let dst_child =
                            Entry::from_stats(Arc::clone(target.backend()), target_path, &stats);
                        stack.push(Work::Transfer { src: src_child, dst: dst_child, root: false });
                    }
                }
                _ => errors.push(kind_mismatch(&src, &dst)),
            },
            Work::Shell { src } => {
                let delete = DeleteOptions {
                    force: options.force,
                    recursive: false,
                    ignore_hook: options.ignore_hook,
                };
                match src.delete(&delete).await {
                    Ok(more) => errors.extend(more),
                    Err(error) => errors.push(error),
                }
            }
        }
        if !options.force && !errors.is_empty() {
            break;
        }
    }
    Ok(errors)
}
