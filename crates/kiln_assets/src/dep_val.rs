//! Dependency Tracking
//!
//! Records which files an asset was built from, so that the owning cache can
//! decide when a compiled result has gone stale.
//!
//! # Design Principles
//! - A [`DependencyToken`] is shared via `Arc` between the handle that owns it
//!   and every cache that wants to query it
//! - Tokens only record state; deciding staleness is the job of a
//!   [`DependencyValidation`] implementation
//! - A token can be invalidated explicitly (e.g. from a file watcher), which
//!   is sticky

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::SystemTime;

/// Shared pointer to a dependency token.
pub type DepValPtr = Arc<DependencyToken>;

/// Snapshot of one source file as of a compile.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependentFileState {
    pub path: PathBuf,
    /// Modification time, or `None` if the file did not exist.
    pub timestamp: Option<SystemTime>,
}

impl DependentFileState {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, timestamp: Option<SystemTime>) -> Self {
        Self {
            path: path.into(),
            timestamp,
        }
    }

    /// Captures the current modification time of `path`.
    ///
    /// A missing or unreadable file is recorded as `None`, so that creating
    /// it later still counts as a change.
    #[must_use]
    pub fn capture(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let timestamp = std::fs::metadata(path)
            .and_then(|meta| meta.modified())
            .ok();
        Self::new(path, timestamp)
    }
}

/// Opaque record of the file set an asset depends on.
///
/// Must be re-queried through a [`DependencyValidation`] to detect staleness.
#[derive(Debug, Default)]
pub struct DependencyToken {
    files: Mutex<Vec<DependentFileState>>,
    children: Mutex<Vec<DepValPtr>>,
    invalidated: AtomicBool,
}

impl DependencyToken {
    #[must_use]
    pub fn new() -> DepValPtr {
        Arc::new(Self::default())
    }

    #[must_use]
    pub fn with_files(files: &[DependentFileState]) -> DepValPtr {
        let token = Self::default();
        token.register_file_dependencies(files);
        Arc::new(token)
    }

    /// Adds file states, skipping paths that are already recorded.
    pub fn register_file_dependencies(&self, files: &[DependentFileState]) {
        let mut guard = self.files.lock();
        for file in files {
            if !guard.iter().any(|f| f.path == file.path) {
                guard.push(file.clone());
            }
        }
    }

    /// Makes this token's validity depend on `child` as well.
    pub fn register_dependent(&self, child: DepValPtr) {
        let mut guard = self.children.lock();
        if !guard.iter().any(|c| Arc::ptr_eq(c, &child)) {
            guard.push(child);
        }
    }

    #[must_use]
    pub fn files(&self) -> Vec<DependentFileState> {
        self.files.lock().clone()
    }

    #[must_use]
    pub fn children(&self) -> Vec<DepValPtr> {
        self.children.lock().clone()
    }

    /// Marks the token stale regardless of file state.
    pub fn invalidate(&self) {
        self.invalidated.store(true, Ordering::Release);
    }

    #[inline]
    #[must_use]
    pub fn is_invalidated(&self) -> bool {
        self.invalidated.load(Ordering::Acquire)
    }
}

/// Validates dependency tokens against the current state of the world.
pub trait DependencyValidation: Send + Sync {
    /// Builds a token from a list of file dependencies.
    fn build(&self, files: &[DependentFileState]) -> DepValPtr {
        DependencyToken::with_files(files)
    }

    /// Returns `true` while nothing the token depends on has changed.
    fn is_valid(&self, token: &DependencyToken) -> bool;
}

/// Default validator: compares recorded modification times with the file
/// system.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTimestampValidation;

impl DependencyValidation for FileTimestampValidation {
    fn is_valid(&self, token: &DependencyToken) -> bool {
        if token.is_invalidated() {
            return false;
        }
        let files_unchanged = token
            .files()
            .iter()
            .all(|recorded| DependentFileState::capture(&recorded.path).timestamp == recorded.timestamp);
        files_unchanged && token.children().iter().all(|child| self.is_valid(child))
    }
}
