//! A build-scoped cache of loaded desktop files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::DesktopFile;

/// Caches loaded [`DesktopFile`]s by path.
///
/// The cache is an explicitly constructed value, not a process-wide
/// singleton: the menu builder creates a fresh one for every build so a
/// rebuild always sees current file contents, and tests stay hermetic.
#[derive(Debug, Default)]
pub struct DesktopFileCache {
    files: HashMap<PathBuf, Arc<DesktopFile>>,
}

impl DesktopFileCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the desktop file at `path`, loading it on first use.
    ///
    /// Unreadable files and files of unknown type yield `None`; the same
    /// path is retried on every call until it loads.
    pub fn get(&mut self, path: &Path) -> Option<Arc<DesktopFile>> {
        if let Some(file) = self.files.get(path) {
            return Some(file.clone());
        }
        match DesktopFile::load(path) {
            Ok(file) if file.is_valid() => {
                let file = Arc::new(file);
                self.files.insert(path.to_owned(), file.clone());
                Some(file)
            }
            Ok(_) => {
                debug!(file = %path.display(), "ignoring desktop file of unknown type");
                None
            }
            Err(err) => {
                debug!(file = %path.display(), %err, "failed to load desktop file");
                None
            }
        }
    }
}
