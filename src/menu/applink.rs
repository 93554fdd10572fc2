//! Allocation of desktop entries to menus.
//!
//! This pass runs in two phases over the whole tree, and the split is load
//! bearing: whether a menu in `onlyUnallocated` mode may show an entry
//! depends on claims made by *any* other menu, so allocation must finish
//! everywhere before the first `<AppLink>` is materialized.
//!
//! Phase one walks the tree top-down building each menu's desktop-entry pool
//! (its own `<AppDir>`s in declaration order, the last one winning duplicate
//! ids, then inherited ancestor entries that do not shadow its own), parses
//! the menu's include/exclude rules, marks matched entries as allocated and
//! remembers the selection. Phase two turns the selections into `<AppLink>`
//! leaves, filtering entries that are claimed elsewhere, invisible, or
//! unsuitable for every configured desktop environment.

use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::desktop_file::DesktopFile;
use crate::xml::Element;

use super::rules::RuleSet;
use super::BuildState;

struct AppEntry {
    id: String,
    file: Arc<DesktopFile>,
    allocated: Cell<bool>,
}

type Pool = IndexMap<String, Rc<AppEntry>>;

/// The per-menu outcome of the allocation phase, mirroring the tree's menu
/// structure.
struct Selection {
    only_unallocated: bool,
    picked: Vec<Rc<AppEntry>>,
    children: Vec<Selection>,
}

/// Runs both phases over the whole tree.
pub(crate) fn process_apps(root: &mut Element, state: &mut BuildState<'_>) {
    let selection = allocate(root, None, state);

    let fallback = [String::new()];
    let environments: &[String] = if state.environments.is_empty() {
        &fallback
    } else {
        state.environments
    };
    materialize(root, &selection, environments);
}

fn allocate(
    element: &mut Element,
    parent_pool: Option<&Pool>,
    state: &mut BuildState<'_>,
) -> Selection {
    let only_unallocated = element.attribute("onlyUnallocated") == Some("1");

    let mut app_dirs: Vec<PathBuf> = Vec::new();
    element.children_mut().retain(|child| {
        if child.is("AppDir") {
            app_dirs.push(PathBuf::from(child.text()));
            false
        } else {
            true
        }
    });

    let mut pool = Pool::new();
    for dir in &app_dirs {
        scan_app_dir(dir, "", &mut pool, state);
    }
    if let Some(parent_pool) = parent_pool {
        for (id, entry) in parent_pool {
            pool.entry(id.clone()).or_insert_with(|| entry.clone());
        }
    }

    let mut rules = RuleSet::default();
    element.children_mut().retain(|child| match child.tag() {
        "Include" => {
            rules.add_include(child);
            false
        }
        "Exclude" => {
            rules.add_exclude(child);
            false
        }
        _ => true,
    });

    let mut picked = Vec::new();
    for (id, entry) in &pool {
        if rules.check_include(id, &entry.file) {
            if !only_unallocated {
                entry.allocated.set(true);
            }
            if !rules.check_exclude(id, &entry.file) {
                picked.push(entry.clone());
            }
        }
    }

    let children = element
        .children_mut()
        .iter_mut()
        .filter(|child| child.is("Menu"))
        .map(|child| allocate(child, Some(&pool), state))
        .collect();

    Selection {
        only_unallocated,
        picked,
        children,
    }
}

/// Collects the `.desktop` files below one application directory.
///
/// Ids of entries in subdirectories carry the directory names as `-`-joined
/// prefixes, per the desktop-file id rules.
fn scan_app_dir(dir: &Path, prefix: &str, pool: &mut Pool, state: &mut BuildState<'_>) {
    state.watch_paths.insert(dir.to_owned());

    let Ok(entries) = fs::read_dir(dir) else {
        debug!(dir = %dir.display(), "application directory is not readable");
        return;
    };
    let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).map(|e| e.path()).collect();
    paths.sort();

    for path in &paths {
        if !path.is_file() || !path.extension().is_some_and(|e| e == "desktop") {
            continue;
        }
        let Some(file) = state.cache.get(path) else {
            continue;
        };
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let id = format!("{prefix}{file_name}");
        pool.insert(
            id.clone(),
            Rc::new(AppEntry {
                id,
                file,
                allocated: Cell::new(false),
            }),
        );
    }

    for path in &paths {
        if !path.is_dir() {
            continue;
        }
        // A symlink back into this directory would recurse forever.
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        if canonical == dir {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            scan_app_dir(&canonical, &format!("{prefix}{name}-"), pool, state);
        }
    }
}

fn materialize(element: &mut Element, selection: &Selection, environments: &[String]) {
    for entry in &selection.picked {
        if selection.only_unallocated && entry.allocated.get() {
            continue;
        }
        let file = &entry.file;
        let show = environments
            .iter()
            .any(|env| file.is_visible() && file.is_suitable(env));
        if !show {
            continue;
        }

        let mut app_link = Element::new("AppLink");
        app_link.set_attribute("id", entry.id.clone());
        app_link.set_attribute("title", file.name().to_owned());
        app_link.set_attribute("comment", file.comment().to_owned());
        app_link.set_attribute("genericName", file.generic_name().to_owned());
        app_link.set_attribute("exec", file.exec().to_owned());
        app_link.set_attribute("terminal", flag(file.runs_on_terminal()));
        app_link.set_attribute("startupNotify", flag(file.startup_notify()));
        app_link.set_attribute("path", file.path().to_owned());
        app_link.set_attribute("icon", file.icon_name().to_owned());
        app_link.set_attribute(
            "desktopFile",
            file.file_name().to_string_lossy().into_owned(),
        );
        element.push(app_link);
    }

    let mut selections = selection.children.iter();
    for child in element.children_mut() {
        if child.is("Menu") {
            if let Some(child_selection) = selections.next() {
                materialize(child, child_selection, environments);
            }
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "1"
    } else {
        "0"
    }
}
