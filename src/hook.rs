//! Defines the before/after interception protocol around core operations.
//!
//! A repository configuration may carry one [`Hooks`] implementation. Every
//! core operation brackets its primitive with the matching pair: the
//! *before* hook may short-circuit the operation by returning a value (for
//! example to serve from a cache), the *after* hook fires only on success.
//! `post` denotes a create-new write, `put` an update of an existing file;
//! the write path picks the pair from prior existence.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{ErrorKind, FsError, FsResult};
use crate::options::{
    DeleteOptions, HeadOptions, ListOptions, MkcolOptions, OpenReadOptions, OpenWriteOptions,
    PatchOptions,
};
use crate::stats::{Props, Stats};

/// User-supplied callbacks bracketing core operations.
///
/// Every method defaults to a pass-through. Implementations see normalized
/// paths; the registry is scoped to one repository. A hook is never invoked
/// when the caller sets `ignore_hook`.
///
/// Short-circuit returns apply to whole-value operations; when a write
/// stream is opened the `before_put`/`before_post` payload is `None` and a
/// `true` return is disregarded.
#[async_trait]
pub trait Hooks: Send + Sync {
    /// May serve the stats instead of the backend.
    async fn before_head(&self, path: &str, options: &HeadOptions) -> FsResult<Option<Stats>> {
        let _ = (path, options);
        Ok(None)
    }

    async fn after_head(&self, path: &str, stats: &Stats) -> FsResult<()> {
        let _ = (path, stats);
        Ok(())
    }

    /// May apply the patch itself; `true` marks it handled.
    async fn before_patch(
        &self,
        path: &str,
        props: &Props,
        options: &PatchOptions,
    ) -> FsResult<bool> {
        let _ = (path, props, options);
        Ok(false)
    }

    async fn after_patch(&self, path: &str) -> FsResult<()> {
        let _ = path;
        Ok(())
    }

    /// May serve the child list instead of the backend.
    async fn before_list(
        &self,
        path: &str,
        options: &ListOptions,
    ) -> FsResult<Option<Vec<String>>> {
        let _ = (path, options);
        Ok(None)
    }

    async fn after_list(&self, path: &str, entries: &[String]) -> FsResult<()> {
        let _ = (path, entries);
        Ok(())
    }

    /// May create the directory itself; the value is "newly created".
    async fn before_mkcol(&self, path: &str, options: &MkcolOptions) -> FsResult<Option<bool>> {
        let _ = (path, options);
        Ok(None)
    }

    async fn after_mkcol(&self, path: &str) -> FsResult<()> {
        let _ = path;
        Ok(())
    }

    /// May perform the delete itself; the value is the error list.
    async fn before_delete(
        &self,
        path: &str,
        options: &DeleteOptions,
    ) -> FsResult<Option<Vec<FsError>>> {
        let _ = (path, options);
        Ok(None)
    }

    async fn after_delete(&self, path: &str) -> FsResult<()> {
        let _ = path;
        Ok(())
    }

    /// May serve file content instead of the backend.
    async fn before_get(
        &self,
        path: &str,
        options: &OpenReadOptions,
    ) -> FsResult<Option<Bytes>> {
        let _ = (path, options);
        Ok(None)
    }

    async fn after_get(&self, path: &str) -> FsResult<()> {
        let _ = path;
        Ok(())
    }

    /// May perform a create-new write itself; `true` marks it handled.
    async fn before_post(
        &self,
        path: &str,
        data: Option<&Bytes>,
        options: &OpenWriteOptions,
    ) -> FsResult<bool> {
        let _ = (path, data, options);
        Ok(false)
    }

    async fn after_post(&self, path: &str) -> FsResult<()> {
        let _ = path;
        Ok(())
    }

    /// May perform an update write itself; `true` marks it handled.
    async fn before_put(
        &self,
        path: &str,
        data: Option<&Bytes>,
        options: &OpenWriteOptions,
    ) -> FsResult<bool> {
        let _ = (path, data, options);
        Ok(false)
    }

    async fn after_put(&self, path: &str) -> FsResult<()> {
        let _ = path;
        Ok(())
    }
}

/// Wraps a before-hook failure on the read path.
pub(crate) fn before_read_failure(repository: &str, path: &str, error: FsError) -> FsError {
    FsError::new(ErrorKind::NotReadable, repository, path)
        .with_message("before hook failed")
        .with_cause(error)
}

/// Wraps a before-hook failure on the write path.
pub(crate) fn before_write_failure(repository: &str, path: &str, error: FsError) -> FsError {
    FsError::new(ErrorKind::NoModificationAllowed, repository, path)
        .with_message("before hook failed")
        .with_cause(error)
}

/// Logs a swallowed after-hook failure. After hooks never mask the result
/// of the operation they observe.
pub(crate) fn log_after_failure(operation: &str, repository: &str, path: &str, error: &FsError) {
    tracing::warn!(operation, repository, path, %error, "after hook failed");
}
