//! Enumeration of autostart entries.
//!
//! The autostart directories are `$XDG_CONFIG_HOME/autostart` followed by
//! `$XDG_CONFIG_DIRS/autostart`. When the same file name exists in several of
//! them only the most important directory's file counts — including its
//! `Hidden` key, which suppresses the entry everywhere.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::debug;

use crate::desktop_file::DesktopFile;
use crate::dirs::BaseDirs;

/// Collects the autostart desktop entries visible in the given search paths.
///
/// With `exclude_hidden`, entries whose most important file is hidden or not
/// displayable are omitted; entries unsuitable for `$XDG_CURRENT_DESKTOP`
/// are always omitted.
pub fn desktop_file_list(dirs: &BaseDirs, exclude_hidden: bool) -> Vec<DesktopFile> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for dir in dirs.autostart_dirs() {
        let Ok(dir_entries) = fs::read_dir(&dir) else {
            continue;
        };
        let mut paths: Vec<PathBuf> = dir_entries
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "desktop"))
            .collect();
        paths.sort();

        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !seen.insert(name.to_owned()) {
                continue;
            }
            let file = match DesktopFile::load(&path) {
                Ok(file) => file,
                Err(err) => {
                    debug!(file = %path.display(), %err, "skipping unreadable autostart entry");
                    continue;
                }
            };
            if exclude_hidden && !file.is_visible() {
                continue;
            }
            if !file.is_suitable("") {
                continue;
            }
            entries.push(file);
        }
    }

    entries
}
