//! Desktop entry (`.desktop`) and directory entry (`.directory`) key files.
//!
//! This is the narrow read-only interface the menu pipeline consumes: load a
//! file, ask for its (localized) display strings, its categories, and whether
//! it should be shown at all in a given desktop environment. Launching
//! applications from entries is out of scope for this crate.

use std::env;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use thiserror::Error;

mod cache;

pub use cache::DesktopFileCache;

const MAIN_GROUP: &str = "Desktop Entry";

/// Errors raised while loading a key file.
#[derive(Debug, Error)]
pub enum DesktopFileError {
    /// The file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A `key=value` line appeared before any `[Group]` header.
    #[error("stray assignment outside any group in {}", path.display())]
    StrayAssignment {
        /// The offending file.
        path: PathBuf,
    },
}

/// The `Type` of a desktop entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopFileType {
    /// `Type=Application`, or no type but an `Exec` key.
    Application,
    /// `Type=Link`.
    Link,
    /// `Type=Directory` (menu directory metadata).
    Directory,
    /// Anything else; such files are ignored by the pipeline.
    Unknown,
}

/// A loaded desktop entry or directory entry file.
#[derive(Debug, Clone)]
pub struct DesktopFile {
    file_name: PathBuf,
    items: IndexMap<String, String>,
    kind: DesktopFileType,
    locale: Locale,
}

impl DesktopFile {
    /// Loads a key file, resolving localized lookups against the process
    /// locale (`$LC_MESSAGES`, `$LC_ALL` or `$LANG`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DesktopFileError> {
        Self::load_with_locale(path, Locale::from_env())
    }

    /// Loads a key file with an explicit locale for localized lookups.
    pub fn load_with_locale(
        path: impl AsRef<Path>,
        locale: Locale,
    ) -> Result<Self, DesktopFileError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| DesktopFileError::Io {
            path: path.to_owned(),
            source,
        })?;

        let mut items = IndexMap::new();
        let mut group = String::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                group = line[1..line.len() - 1].to_owned();
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.is_empty() {
                continue;
            }
            if group.is_empty() {
                return Err(DesktopFileError::StrayAssignment {
                    path: path.to_owned(),
                });
            }
            items.insert(format!("{group}/{key}"), value.trim().to_owned());
        }

        let mut file = DesktopFile {
            file_name: path.to_owned(),
            items,
            kind: DesktopFileType::Unknown,
            locale,
        };
        file.kind = file.detect_type();
        Ok(file)
    }

    fn detect_type(&self) -> DesktopFileType {
        match self.value("Type") {
            Some("Application") => DesktopFileType::Application,
            Some("Link") => DesktopFileType::Link,
            Some("Directory") => DesktopFileType::Directory,
            _ if !self.exec().is_empty() => DesktopFileType::Application,
            _ => DesktopFileType::Unknown,
        }
    }

    /// The path this file was loaded from.
    pub fn file_name(&self) -> &Path {
        &self.file_name
    }

    /// The detected entry type.
    pub fn kind(&self) -> DesktopFileType {
        self.kind
    }

    /// Whether the file is a usable desktop or directory entry.
    pub fn is_valid(&self) -> bool {
        self.kind != DesktopFileType::Unknown
    }

    /// Looks up a raw value in the `Desktop Entry` group.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.items
            .get(&format!("{MAIN_GROUP}/{key}"))
            .map(String::as_str)
    }

    /// Looks up a value in the `Desktop Entry` group, preferring locale
    /// variants (`Key[lang_COUNTRY@MODIFIER]`, `Key[lang_COUNTRY]`,
    /// `Key[lang@MODIFIER]`, `Key[lang]`) over the plain key.
    pub fn localized_value(&self, key: &str) -> Option<&str> {
        for candidate in self.locale.key_candidates(key) {
            if let Some(value) = self.value(&candidate) {
                return Some(value);
            }
        }
        self.value(key)
    }

    fn list_value(&self, key: &str) -> Vec<&str> {
        self.value(key)
            .map(|v| v.split(';').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    fn bool_value(&self, key: &str) -> bool {
        matches!(self.value(key), Some("true") | Some("1"))
    }

    /// The localized `Name`.
    pub fn name(&self) -> &str {
        self.localized_value("Name").unwrap_or("")
    }

    /// The localized `GenericName`.
    pub fn generic_name(&self) -> &str {
        self.localized_value("GenericName").unwrap_or("")
    }

    /// The localized `Comment`.
    pub fn comment(&self) -> &str {
        self.localized_value("Comment").unwrap_or("")
    }

    /// The localized `Icon` name.
    pub fn icon_name(&self) -> &str {
        self.localized_value("Icon").unwrap_or("")
    }

    /// The `Categories` list.
    pub fn categories(&self) -> Vec<&str> {
        self.list_value("Categories")
    }

    /// The raw `Exec` line.
    pub fn exec(&self) -> &str {
        self.value("Exec").unwrap_or("")
    }

    /// The `Path` key: the working directory to launch the program in.
    pub fn path(&self) -> &str {
        self.value("Path").unwrap_or("")
    }

    /// The `TryExec` key.
    pub fn try_exec(&self) -> &str {
        self.value("TryExec").unwrap_or("")
    }

    /// Whether `NoDisplay` is set.
    pub fn no_display(&self) -> bool {
        self.bool_value("NoDisplay")
    }

    /// Whether `Hidden` is set.
    pub fn is_hidden(&self) -> bool {
        self.bool_value("Hidden")
    }

    /// The `OnlyShowIn` environment list.
    pub fn only_show_in(&self) -> Vec<&str> {
        self.list_value("OnlyShowIn")
    }

    /// The `NotShowIn` environment list.
    pub fn not_show_in(&self) -> Vec<&str> {
        self.list_value("NotShowIn")
    }

    /// Whether the program wants a terminal (`Terminal`).
    pub fn runs_on_terminal(&self) -> bool {
        self.bool_value("Terminal")
    }

    /// Whether the program supports startup notification (`StartupNotify`).
    pub fn startup_notify(&self) -> bool {
        self.bool_value("StartupNotify")
    }

    /// Whether the entry may be shown at all: neither `NoDisplay` nor
    /// `Hidden`, and any `TryExec` program resolves to an executable.
    pub fn is_visible(&self) -> bool {
        if self.no_display() || self.is_hidden() {
            return false;
        }
        let try_exec = self.try_exec();
        if !try_exec.is_empty() && !resolves_in_path(try_exec) {
            return false;
        }
        true
    }

    /// Whether the entry should be shown in the given desktop environment,
    /// per its `OnlyShowIn`/`NotShowIn` lists.
    ///
    /// An empty `environment` falls back to `$XDG_CURRENT_DESKTOP`, which may
    /// be a colon-separated list; the entry is suitable if any of its
    /// components is.
    pub fn is_suitable(&self, environment: &str) -> bool {
        let environments = if environment.is_empty() {
            env::var("XDG_CURRENT_DESKTOP").unwrap_or_default()
        } else {
            environment.to_owned()
        };

        for env_name in environments.split(':').filter(|e| !e.is_empty()) {
            let whitelisted = self.only_show_in();
            if !whitelisted.is_empty()
                && !whitelisted.iter().any(|e| e.eq_ignore_ascii_case(env_name))
            {
                continue;
            }
            if self
                .not_show_in()
                .iter()
                .any(|e| e.eq_ignore_ascii_case(env_name))
            {
                continue;
            }
            return true;
        }

        // No environment configured at all: no filtering applies.
        environments.split(':').all(|e| e.is_empty())
    }
}

/// Checks whether a program named by `TryExec` is actually installed.
fn resolves_in_path(program: &str) -> bool {
    if program.starts_with('/') {
        return is_executable(Path::new(program));
    }
    let Ok(path) = env::var("PATH") else {
        return false;
    };
    path.split(':')
        .any(|dir| is_executable(&Path::new(dir).join(program)))
}

fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

/// The message locale used for localized key lookup.
#[derive(Debug, Clone, Default)]
pub struct Locale {
    lang: String,
    country: Option<String>,
    modifier: Option<String>,
}

impl Locale {
    /// Builds a locale from an explicit language, country and modifier.
    pub fn new(
        lang: impl Into<String>,
        country: Option<String>,
        modifier: Option<String>,
    ) -> Self {
        Locale {
            lang: lang.into(),
            country,
            modifier,
        }
    }

    /// Reads the locale from `$LC_MESSAGES`, `$LC_ALL` or `$LANG`.
    pub fn from_env() -> Self {
        let value = env::var("LC_MESSAGES")
            .or_else(|_| env::var("LC_ALL"))
            .or_else(|_| env::var("LANG"))
            .unwrap_or_default();
        Self::parse(&value)
    }

    /// Parses a locale string such as `ca_ES.UTF-8@valencia`.
    pub fn parse(value: &str) -> Self {
        let (value, modifier) = match value.split_once('@') {
            Some((v, m)) if !m.is_empty() => (v, Some(m.to_owned())),
            _ => (value, None),
        };
        let value = value.split('.').next().unwrap_or("");
        let (lang, country) = match value.split_once('_') {
            Some((l, c)) if !c.is_empty() => (l, Some(c.to_owned())),
            _ => (value, None),
        };
        Locale {
            lang: lang.to_owned(),
            country,
            modifier,
        }
    }

    /// Candidate localized keys, most specific first. The bare key is not
    /// included.
    fn key_candidates(&self, key: &str) -> Vec<String> {
        let mut candidates = Vec::new();
        if self.lang.is_empty() {
            return candidates;
        }
        let lang = &self.lang;
        if let (Some(country), Some(modifier)) = (&self.country, &self.modifier) {
            candidates.push(format!("{key}[{lang}_{country}@{modifier}]"));
        }
        if let Some(country) = &self.country {
            candidates.push(format!("{key}[{lang}_{country}]"));
        }
        if let Some(modifier) = &self.modifier {
            candidates.push(format!("{key}[{lang}@{modifier}]"));
        }
        candidates.push(format!("{key}[{lang}]"));
        candidates
    }
}
