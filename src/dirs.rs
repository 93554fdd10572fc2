//! XDG base-directory search paths.
//!
//! The menu pipeline never consults the environment directly for its search
//! paths; it is handed a [`BaseDirs`] value instead. [`BaseDirs::from_env`]
//! builds one from the usual `XDG_*` variables, and tests construct their own
//! from temporary directories.

use std::env;
use std::path::PathBuf;

/// The ordered XDG base-directory search paths.
#[derive(Debug, Clone)]
pub struct BaseDirs {
    /// `$XDG_CONFIG_HOME`, defaulting to `~/.config`.
    pub config_home: PathBuf,
    /// `$XDG_CONFIG_DIRS`, defaulting to `/etc/xdg`.
    pub config_dirs: Vec<PathBuf>,
    /// `$XDG_DATA_HOME`, defaulting to `~/.local/share`.
    pub data_home: PathBuf,
    /// `$XDG_DATA_DIRS`, defaulting to `/usr/local/share:/usr/share`.
    pub data_dirs: Vec<PathBuf>,
}

impl BaseDirs {
    /// Resolves the search paths from the process environment.
    ///
    /// Entries may use a leading `~` for the home directory; trailing slashes
    /// are stripped, relative entries in `$XDG_DATA_DIRS` are discarded and
    /// duplicates are removed, keeping the first occurrence.
    pub fn from_env() -> Self {
        let home = env::var("HOME").unwrap_or_else(|_| String::from("/"));

        let config_home = env::var("XDG_CONFIG_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| clean_path(&v, &home))
            .unwrap_or_else(|| PathBuf::from(&home).join(".config"));

        let data_home = env::var("XDG_DATA_HOME")
            .ok()
            .filter(|v| !v.is_empty())
            .map(|v| clean_path(&v, &home))
            .unwrap_or_else(|| PathBuf::from(&home).join(".local/share"));

        let config_dirs = path_list(env::var("XDG_CONFIG_DIRS").ok().as_deref(), &home)
            .unwrap_or_else(|| vec![PathBuf::from("/etc/xdg")]);

        let data_dirs = path_list(env::var("XDG_DATA_DIRS").ok().as_deref(), &home)
            .unwrap_or_else(|| {
                vec![PathBuf::from("/usr/local/share"), PathBuf::from("/usr/share")]
            });

        BaseDirs {
            config_home,
            config_dirs,
            data_home,
            data_dirs,
        }
    }

    /// The configuration search path in priority order: `config_home` first,
    /// then each entry of `config_dirs`.
    pub fn config_search(&self) -> impl Iterator<Item = &PathBuf> {
        std::iter::once(&self.config_home).chain(self.config_dirs.iter())
    }

    /// The autostart directories in priority order.
    pub fn autostart_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = vec![self.config_home.join("autostart")];
        dirs.extend(self.config_dirs.iter().map(|d| d.join("autostart")));
        dirs
    }
}

fn path_list(value: Option<&str>, home: &str) -> Option<Vec<PathBuf>> {
    let value = value?;
    let mut dirs = Vec::new();
    for entry in value.split(':').filter(|e| !e.is_empty()) {
        let path = clean_path(entry, home);
        if !path.is_absolute() {
            continue;
        }
        if !dirs.contains(&path) {
            dirs.push(path);
        }
    }
    if dirs.is_empty() {
        None
    } else {
        Some(dirs)
    }
}

fn clean_path(entry: &str, home: &str) -> PathBuf {
    let expanded = match entry.strip_prefix('~') {
        Some(rest) => format!("{home}{rest}"),
        None => entry.to_owned(),
    };
    // Keep the root directory itself intact.
    let trimmed = if expanded.len() > 1 {
        expanded.trim_end_matches('/')
    } else {
        &expanded
    };
    PathBuf::from(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_parsing_skips_relative_and_duplicate_entries() {
        let dirs = path_list(Some("/usr/share:relative:/usr/share:/opt/share/"), "/home/u").unwrap();
        assert_eq!(
            dirs,
            vec![PathBuf::from("/usr/share"), PathBuf::from("/opt/share")]
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        assert_eq!(
            clean_path("~/.local/share/", "/home/u"),
            PathBuf::from("/home/u/.local/share")
        );
    }

    #[test]
    fn config_search_puts_home_first() {
        let dirs = BaseDirs {
            config_home: PathBuf::from("/home/u/.config"),
            config_dirs: vec![PathBuf::from("/etc/xdg")],
            data_home: PathBuf::from("/home/u/.local/share"),
            data_dirs: vec![],
        };
        let search: Vec<_> = dirs.config_search().collect();
        assert_eq!(
            search,
            vec![&PathBuf::from("/home/u/.config"), &PathBuf::from("/etc/xdg")]
        );
    }
}
