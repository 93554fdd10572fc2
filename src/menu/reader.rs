//! Loading `.menu` files and resolving their merge directives.
//!
//! The reader produces the single unified tree the pipeline passes operate
//! on. `<MergeFile>`, `<MergeDir>` and `<DefaultMergeDirs>` inline other
//! `.menu` files at the directive's position; `<DefaultAppDirs>` and
//! `<DefaultDirectoryDirs>` expand to plain `<AppDir>`/`<DirectoryDir>`
//! children for the application-link pass to consume. Merging is best-effort:
//! a missing target is skipped, only the root file is a hard error.
//!
//! Two bookkeeping lists keep merging sane: the per-branch file list breaks
//! cycles (a file that transitively includes itself is skipped), and a
//! per-menu merged-file list makes redundant merge directives a no-op.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::xml::Element;

use super::{BuildState, MenuError};

/// Loads the root menu file and resolves all merge directives.
pub(crate) fn load_menu(state: &mut BuildState<'_>, file: &Path) -> Result<Element, MenuError> {
    let canonical = fs::canonicalize(file).map_err(|source| MenuError::Io {
        path: file.to_owned(),
        source,
    })?;
    let root_file = canonical.clone();
    load_file(state, &canonical, &root_file, &[])
}

fn load_file(
    state: &mut BuildState<'_>,
    file: &Path,
    root_file: &Path,
    branch: &[PathBuf],
) -> Result<Element, MenuError> {
    let contents = fs::read_to_string(file).map_err(|source| MenuError::Io {
        path: file.to_owned(),
        source,
    })?;
    let mut root = Element::parse(&contents).map_err(|source| MenuError::Parse {
        path: file.to_owned(),
        source,
    })?;

    state.watch_paths.insert(file.to_owned());

    let dir = file.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut branch = branch.to_vec();
    branch.push(file.to_owned());
    process_merge_tags(state, &mut root, &dir, root_file, &branch);
    Ok(root)
}

fn process_merge_tags(
    state: &mut BuildState<'_>,
    element: &mut Element,
    dir: &Path,
    root_file: &Path,
    branch: &[PathBuf],
) {
    let mut merged_files: Vec<PathBuf> = Vec::new();
    let mut i = 0;
    while i < element.children().len() {
        let tag = element.children()[i].tag().to_owned();
        match tag.as_str() {
            "MergeFile" => {
                let directive = element.children_mut().remove(i);
                let inserted =
                    process_merge_file(state, &directive, dir, root_file, branch, &mut merged_files);
                i = splice_at(element, i, inserted);
            }
            "MergeDir" => {
                let directive = element.children_mut().remove(i);
                let target = resolve_path(dir, directive.text());
                let inserted = merge_dir(state, &target, root_file, branch, &mut merged_files);
                i = splice_at(element, i, inserted);
            }
            "DefaultMergeDirs" => {
                element.children_mut().remove(i);
                let base = merged_base_name(root_file);
                let mut inserted = Vec::new();
                for config_dir in default_config_dirs(state) {
                    let target = config_dir.join("menus").join(format!("{base}-merged"));
                    inserted.extend(merge_dir(state, &target, root_file, branch, &mut merged_files));
                }
                i = splice_at(element, i, inserted);
            }
            "AppDir" => {
                let absolute = resolve_path(dir, element.children()[i].text());
                element.children_mut()[i].set_text(absolute.to_string_lossy().into_owned());
                i += 1;
            }
            "DefaultAppDirs" => {
                element.children_mut().remove(i);
                let inserted = default_data_dirs(state)
                    .into_iter()
                    .map(|d| dir_element("AppDir", &d.join("applications")))
                    .collect();
                i = splice_at(element, i, inserted);
            }
            "DirectoryDir" => {
                let absolute = resolve_path(dir, element.children()[i].text());
                element.children_mut()[i].set_text(absolute.to_string_lossy().into_owned());
                i += 1;
            }
            "DefaultDirectoryDirs" => {
                element.children_mut().remove(i);
                let inserted = default_data_dirs(state)
                    .into_iter()
                    .map(|d| dir_element("DirectoryDir", &d.join("desktop-directories")))
                    .collect();
                i = splice_at(element, i, inserted);
            }
            "Menu" => {
                process_merge_tags(state, &mut element.children_mut()[i], dir, root_file, branch);
                i += 1;
            }
            _ => i += 1,
        }
    }
}

/// Inserts `elements` at position `i` and returns the position just past
/// them. Merged content is never reprocessed by the calling loop; its own
/// merge directives were already resolved when its file was loaded.
fn splice_at(element: &mut Element, i: usize, inserted: Vec<Element>) -> usize {
    let count = inserted.len();
    element.children_mut().splice(i..i, inserted);
    i + count
}

fn process_merge_file(
    state: &mut BuildState<'_>,
    directive: &Element,
    dir: &Path,
    root_file: &Path,
    branch: &[PathBuf],
    merged_files: &mut Vec<PathBuf>,
) -> Vec<Element> {
    if directive.attribute("type") != Some("parent") {
        let target = resolve_path(dir, directive.text());
        return merge_file(state, &target, root_file, branch, merged_files);
    }

    // type="parent": merge the same file from the next config dir after the
    // one the current file lives in.
    let Some(current) = branch.last() else {
        return Vec::new();
    };
    let search: Vec<PathBuf> = state.dirs.config_search().cloned().collect();
    let Some(position) = search.iter().position(|d| current.starts_with(d)) else {
        debug!(file = %current.display(), "parent merge outside the config search path");
        return Vec::new();
    };
    let relative = current
        .strip_prefix(&search[position])
        .expect("starts_with guarantees the prefix")
        .to_path_buf();
    for config_dir in &search[position + 1..] {
        let candidate = config_dir.join(&relative);
        if candidate.exists() {
            return merge_file(state, &candidate, root_file, branch, merged_files);
        }
    }
    Vec::new()
}

fn merge_file(
    state: &mut BuildState<'_>,
    file: &Path,
    root_file: &Path,
    branch: &[PathBuf],
    merged_files: &mut Vec<PathBuf>,
) -> Vec<Element> {
    let Ok(canonical) = fs::canonicalize(file) else {
        debug!(file = %file.display(), "skipping missing merge target");
        return Vec::new();
    };
    if branch.contains(&canonical) {
        debug!(file = %canonical.display(), "breaking merge cycle");
        return Vec::new();
    }
    if merged_files.contains(&canonical) {
        return Vec::new();
    }
    merged_files.push(canonical.clone());

    match load_file(state, &canonical, root_file, branch) {
        // The merged file's own <Name> is meaningless at the merge point.
        Ok(mut root) => root
            .take_children()
            .into_iter()
            .filter(|child| !child.is("Name"))
            .collect(),
        Err(err) => {
            warn!(file = %canonical.display(), %err, "failed to merge menu file");
            Vec::new()
        }
    }
}

fn merge_dir(
    state: &mut BuildState<'_>,
    dir: &Path,
    root_file: &Path,
    branch: &[PathBuf],
    merged_files: &mut Vec<PathBuf>,
) -> Vec<Element> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|e| e == "menu"))
        .collect();
    files.sort();

    let mut inserted = Vec::new();
    for file in &files {
        inserted.extend(merge_file(state, file, root_file, branch, merged_files));
    }
    inserted
}

/// The base name `<DefaultMergeDirs>` resolves against: the root menu file's
/// stem with any distribution prefix (`kde-`, `gnome-`, ...) stripped.
fn merged_base_name(root_file: &Path) -> String {
    let stem = root_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("applications");
    stem.rsplit('-').next().unwrap_or(stem).to_owned()
}

/// Config dirs for default merging, lowest priority first, so content from
/// more important dirs merges later and wins attribute conflicts.
fn default_config_dirs(state: &BuildState<'_>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = state.dirs.config_dirs.iter().rev().cloned().collect();
    dirs.push(state.dirs.config_home.clone());
    dirs
}

/// Data dirs for `<DefaultAppDirs>`/`<DefaultDirectoryDirs>`, lowest priority
/// first: with duplicate desktop-file ids the last `<AppDir>` wins, so the
/// most important directory must come last.
fn default_data_dirs(state: &BuildState<'_>) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = state.dirs.data_dirs.iter().rev().cloned().collect();
    dirs.push(state.dirs.data_home.clone());
    dirs
}

fn resolve_path(dir: &Path, text: &str) -> PathBuf {
    let path = Path::new(text);
    if path.is_absolute() {
        path.to_owned()
    } else {
        dir.join(path)
    }
}

fn dir_element(tag: &str, path: &Path) -> Element {
    let mut element = Element::new(tag);
    element.set_text(path.to_string_lossy().into_owned());
    element
}
