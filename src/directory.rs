//! Defines the directory handle: listing, creation, recursive delete, and
//! the directory side of transfers.

use std::sync::Arc;

use crate::backend::FsBackend;
use crate::entry::{
    after_delete_hook, before_delete_hook, head_entry, head_optional, normalize_path, patch_entry,
    url_entry, xmit, Entry,
};
use crate::error::{ErrorKind, FsError, FsResult};
use crate::hook::{before_read_failure, before_write_failure, log_after_failure};
use crate::options::{
    CopyOptions, DeleteOptions, HeadOptions, ListOptions, MkcolOptions, MoveOptions, PatchOptions,
    UrlKind,
};
use crate::path;
use crate::stats::{Props, Stats};

/// Handle of a directory inside one repository.
#[derive(Clone)]
pub struct Directory {
    fs: Arc<dyn FsBackend>,
    path: String,
}

impl Directory {
    /// Creates a handle, normalizing `path`.
    pub fn new(fs: Arc<dyn FsBackend>, path: &str) -> FsResult<Self> {
        let path = normalize_path(fs.repository(), path)?;
        Ok(Self { fs, path })
    }

    pub(crate) fn from_normalized(fs: Arc<dyn FsBackend>, path: String) -> Self {
        Self { fs, path }
    }

    /// Normalized path of the directory.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Repository the directory belongs to.
    pub fn repository(&self) -> &str {
        self.fs.repository()
    }

    pub(crate) fn backend(&self) -> &Arc<dyn FsBackend> {
        &self.fs
    }

    /// Final path segment; empty for the root.
    pub fn name(&self) -> String {
        path::basename(&self.path).unwrap_or_default()
    }

    /// Handle of the containing directory; the root is its own parent.
    pub fn parent(&self) -> Directory {
        let parent = path::parent(&self.path).unwrap_or_else(|_| "/".to_owned());
        Directory::from_normalized(Arc::clone(&self.fs), parent)
    }

    /// Directory metadata. Fails with a type mismatch when the path holds
    /// a file.
    pub async fn head(&self, options: &HeadOptions) -> FsResult<Stats> {
        let stats = head_entry(&self.fs, &self.path, options).await?;
        if stats.is_file() {
            return Err(FsError::new(ErrorKind::TypeMismatch, self.repository(), &self.path)
                .with_message("entry is a file"));
        }
        Ok(stats)
    }

    /// Applies properties to the directory.
    pub async fn patch(&self, props: &Props, options: &PatchOptions) -> FsResult<()> {
        patch_entry(&self.fs, &self.path, props, options).await
    }

    /// Addressable URL of the directory for the given verb.
    pub async fn to_url(&self, kind: UrlKind) -> FsResult<String> {
        url_entry(&self.fs, &self.path, kind).await
    }

    /// Lists the children as normalized absolute paths. Trailing-slash
    /// directory markers from the backend are stripped.
    pub async fn list(&self, options: &ListOptions) -> FsResult<Vec<String>> {
        let repository = self.repository();
        let hooks = if options.ignore_hook { None } else { self.fs.config().hooks.clone() };
        if let Some(hooks) = &hooks {
            match hooks.before_list(&self.path, options).await {
                Ok(Some(entries)) => return Ok(entries),
                Ok(None) => {}
                Err(error) => return Err(before_read_failure(repository, &self.path, error)),
            }
        }
        let raw = self
            .fs
            .list(&self.path)
            .await
            .map_err(|raw| FsError::from_read(repository, &self.path, raw))?;
        let mut entries = Vec::with_capacity(raw.len());
        for child in raw {
            match child.strip_suffix('/') {
                Some(stripped) if !stripped.is_empty() => entries.push(stripped.to_owned()),
                _ => entries.push(child),
            }
        }
        if let Some(hooks) = &hooks {
            if let Err(error) = hooks.after_list(&self.path, &entries).await {
                log_after_failure("list", repository, &self.path, &error);
            }
        }
        Ok(entries)
    }

    /// Creates the directory, returning whether it was newly created.
    ///
    /// An existing directory is an error unless `force` is set; a file at
    /// the path is a type mismatch; a missing parent is not-found unless
    /// `recursive` creates the whole chain.
    pub async fn mkcol(&self, options: &MkcolOptions) -> FsResult<bool> {
        let repository = self.repository();
        match head_optional(&self.fs, &self.path, &HeadOptions { ignore_hook: options.ignore_hook })
            .await?
        {
            Some(stats) if stats.is_directory() => {
                return if options.force {
                    Ok(false)
                } else {
                    Err(FsError::new(ErrorKind::PathExist, repository, &self.path)
                        .with_message("directory already exists"))
                };
            }
            Some(_) => {
                return Err(FsError::new(ErrorKind::TypeMismatch, repository, &self.path)
                    .with_message("a file occupies the path"))
            }
            None => {}
        }
        if self.fs.supports_directory() && self.path != "/" {
            let mut missing: Vec<String> = Vec::new();
            let mut cursor = path::parent(&self.path).unwrap_or_else(|_| "/".to_owned());
            while cursor != "/" {
                match head_optional(&self.fs, &cursor, &HeadOptions { ignore_hook: true }).await? {
                    Some(stats) if stats.is_directory() => break,
                    Some(_) => {
                        return Err(FsError::new(ErrorKind::TypeMismatch, repository, &cursor)
                            .with_message("an ancestor is a file"))
                    }
                    None => {
                        if !options.recursive {
                            return Err(FsError::new(ErrorKind::NotFound, repository, &cursor)
                                .with_message("parent directory is missing"));
                        }
                        missing.push(cursor.clone());
                        cursor = path::parent(&cursor).unwrap_or_else(|_| "/".to_owned());
                    }
                }
            }
            let ancestor_options = MkcolOptions {
                force: true,
                recursive: true,
                ignore_hook: options.ignore_hook,
            };
            for ancestor in missing.into_iter().rev() {
                let dir = Directory::from_normalized(Arc::clone(&self.fs), ancestor);
                dir.create_leaf(&ancestor_options).await?;
            }
        }
        self.create_leaf(options).await
    }

    /// Hook bracket plus the creation primitive for one directory whose
    /// parent exists.
    async fn create_leaf(&self, options: &MkcolOptions) -> FsResult<bool> {
        let repository = self.repository();
        let hooks = if options.ignore_hook { None } else { self.fs.config().hooks.clone() };
        if let Some(hooks) = &hooks {
            match hooks.before_mkcol(&self.path, options).await {
                Ok(Some(created)) => return Ok(created),
                Ok(None) => {}
                Err(error) => return Err(before_write_failure(repository, &self.path, error)),
            }
        }
        if self.fs.supports_directory() {
            self.fs
                .mkcol(&self.path)
                .await
                .map_err(|raw| FsError::from_write(repository, &self.path, raw))?;
        }
        if let Some(hooks) = &hooks {
            if let Err(error) = hooks.after_mkcol(&self.path).await {
                log_after_failure("mkcol", repository, &self.path, &error);
            }
        }
        Ok(true)
    }

    /// Deletes the directory, recursing into children when `recursive`.
    ///
    /// Per-child errors accumulate into the returned list; without
    /// `force` the walk stops at the first of them and the shell is left
    /// in place. The walk itself runs on an explicit stack so deep trees
    /// do not grow the call stack.
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
            Some(stats) if stats.is_file() => {
                return Err(FsError::new(ErrorKind::TypeMismatch, repository, &self.path)
                    .with_message("entry is a file"))
            }
            Some(_) => {}
        }
        let mut errors: Vec<FsError> = Vec::new();
        if options.recursive {
            self.delete_children(options, &mut errors).await;
        }
        if !errors.is_empty() && !options.force {
            return Ok(errors);
        }
        if let Err(error) = self.rmdir().await {
            errors.push(error);
            return Ok(errors);
        }
        after_delete_hook(&self.fs, &self.path, options.ignore_hook).await;
        Ok(errors)
    }

    /// Stack-driven removal of everything beneath this directory.
    async fn delete_children(&self, options: &DeleteOptions, errors: &mut Vec<FsError>) {
        enum Task {
            Visit(Entry),
            /// Children are gone; remove the emptied shell.
            Shell(Directory),
        }
        let mut stack: Vec<Task> = Vec::new();
        match self.list_into_entries(options, errors).await {
            Some(children) => stack.extend(children.into_iter().map(Task::Visit)),
            None => return,
        }
        while let Some(task) = stack.pop() {
            match task {
                Task::Visit(Entry::File(file)) => {
                    match file.delete(options).await {
                        Ok(more) => errors.extend(more),
                        Err(error) => errors.push(error),
                    }
                }
                Task::Visit(Entry::Directory(dir)) => {
                    match before_delete_hook(&dir.fs, &dir.path, options).await {
                        Ok(Some(more)) => {
                            errors.extend(more);
                            continue;
                        }
                        Ok(None) => {}
                        Err(error) => {
                            errors.push(error);
                            continue;
                        }
                    }
                    match head_optional(
                        &dir.fs,
                        &dir.path,
                        &HeadOptions { ignore_hook: options.ignore_hook },
                    )
                    .await
                    {
                        Ok(None) if options.force => continue,
                        Ok(None) => errors.push(FsError::new(
                            ErrorKind::NotFound,
                            dir.repository(),
                            &dir.path,
                        )),
                        Ok(Some(stats)) if stats.is_file() => errors.push(
                            FsError::new(ErrorKind::TypeMismatch, dir.repository(), &dir.path)
                                .with_message("entry is a file"),
                        ),
                        Ok(Some(_)) => {
                            stack.push(Task::Shell(dir.clone()));
                            if let Some(children) =
                                dir.list_into_entries(options, errors).await
                            {
                                stack.extend(children.into_iter().map(Task::Visit));
                            }
                        }
                        Err(error) => errors.push(error),
                    }
                }
                Task::Shell(dir) => match dir.rmdir().await {
                    Ok(()) => after_delete_hook(&dir.fs, &dir.path, options.ignore_hook).await,
                    Err(error) => errors.push(error),
                },
            }
            if !options.force && !errors.is_empty() {
                return;
            }
        }
    }

    /// Lists children and materializes kind-matching handles, pushing any
    /// failure into `errors`.
    async fn list_into_entries(
        &self,
        options: &DeleteOptions,
        errors: &mut Vec<FsError>,
    ) -> Option<Vec<Entry>> {
        let list = ListOptions { ignore_hook: options.ignore_hook };
        let children = match self.list(&list).await {
            Ok(children) => children,
            Err(error) => {
                errors.push(error);
                return None;
            }
        };
        let head = HeadOptions { ignore_hook: options.ignore_hook };
        let mut entries = Vec::with_capacity(children.len());
        for child in children {
            match head_entry(&self.fs, &child, &head).await {
                Ok(stats) => entries.push(Entry::from_stats(Arc::clone(&self.fs), child, &stats)),
                Err(error) => errors.push(error),
            }
        }
        Some(entries)
    }

    /// Removal primitive for an emptied directory. Suppressed for
    /// backends without real directories.
    async fn rmdir(&self) -> FsResult<()> {
        if !self.fs.supports_directory() {
            return Ok(());
        }
        self.fs.rmdir(&self.path).await.map_err(|raw| {
            FsError::from_raw(ErrorKind::InvalidModification, self.repository(), &self.path, raw)
        })
    }

    /// Copies the directory onto `to`, returning accumulated transfer
    /// errors.
    pub async fn copy(&self, to: &Directory, options: &CopyOptions) -> FsResult<Vec<FsError>> {
        head_entry(&self.fs, &self.path, &HeadOptions { ignore_hook: options.ignore_hook }).await?;
        xmit(Entry::Directory(self.clone()), Entry::Directory(to.clone()), &options.to_xmit()).await
    }

    /// Moves the directory onto `to`: recursive transfer with per-child
    /// source deletion, then removal of the emptied shell.
    pub async fn move_to(&self, to: &Directory, options: &MoveOptions) -> FsResult<Vec<FsError>> {
        head_entry(&self.fs, &self.path, &HeadOptions { ignore_hook: options.ignore_hook }).await?;
        let mut errors =
            xmit(Entry::Directory(self.clone()), Entry::Directory(to.clone()), &options.to_xmit())
                .await?;
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
}

impl std::fmt::Display for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.repository(), self.path)
    }
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("repository", &self.repository())
            .field("path", &self.path)
            .finish()
    }
}
