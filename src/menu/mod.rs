//! The XDG Desktop Menu build pipeline.
//!
//! [`DesktopMenu`] turns a `.menu` file into the tree of menus and
//! application links a shell renders. Building is a fixed sequence of passes
//! over one mutable [`Element`] tree:
//!
//! 1. [`reader`] loads the root file and resolves every merge directive into
//!    a single document,
//! 2. `simplify` folds `<Name>`-style child elements into attributes,
//! 3. `mergeMenus` coalesces same-named sibling menus,
//! 4. `moveMenus` resolves `<Move>` directives (then menus are merged again,
//!    since moves can create new same-named siblings),
//! 5. deleted menus are dropped, directory metadata is attached,
//! 6. [`applink`] allocates desktop entries to menus through the
//!    include/exclude rules of [`rules`],
//! 7. [`layout`] computes each menu's final child order,
//! 8. empty menus and redundant separators are cleaned up.
//!
//! Every pass after the reader is total: given a well-formed merged document
//! it cannot fail, so the only error surface of [`DesktopMenu::read`] is
//! loading and parsing. A failed read leaves the previously built tree in
//! place.
//!
//! The whole pipeline is synchronous and runs on the calling thread; the only
//! asynchrony lives in [`MenuWatcher`], which re-runs [`DesktopMenu::rebuild`]
//! after debounced filesystem changes.

use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};

use crate::desktop_file::{DesktopFile, DesktopFileCache};
use crate::dirs::BaseDirs;
use crate::xml::{Element, XmlError};

mod applink;
mod layout;
mod reader;
mod rules;
mod watch;


pub use watch::{MenuWatcher, REBUILD_DELAY};

/// Errors that abort a menu build.
///
/// Missing merge targets, unreadable application directories and similar
/// conditions are recovered from silently (the menu specification treats
/// merging as best-effort); only a root file that cannot be loaded or parsed
/// is fatal.
#[derive(Debug, Error)]
pub enum MenuError {
    /// A menu file could not be read.
    #[error("cannot read menu file {}: {source}", path.display())]
    Io {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// A menu file is not well-formed XML.
    #[error("cannot parse menu file {}: {source}", path.display())]
    Parse {
        /// The malformed file.
        path: PathBuf,
        /// The underlying XML error.
        #[source]
        source: XmlError,
    },
}

/// Shared state threaded through one build.
pub(crate) struct BuildState<'a> {
    pub(crate) dirs: &'a BaseDirs,
    pub(crate) environments: &'a [String],
    pub(crate) cache: DesktopFileCache,
    pub(crate) watch_paths: BTreeSet<PathBuf>,
}

/// Builds and owns an application menu tree.
#[derive(Debug)]
pub struct DesktopMenu {
    menu_file: PathBuf,
    environments: Vec<String>,
    base_dirs: BaseDirs,
    tree: Option<Element>,
    hash: Option<[u8; 32]>,
    watch_paths: BTreeSet<PathBuf>,
    log_dir: Option<PathBuf>,
    out_dated: bool,
}

impl Default for DesktopMenu {
    fn default() -> Self {
        Self::new()
    }
}

impl DesktopMenu {
    /// Creates a menu builder using the environment's XDG search paths.
    pub fn new() -> Self {
        Self::with_base_dirs(BaseDirs::from_env())
    }

    /// Creates a menu builder with explicit search paths.
    pub fn with_base_dirs(base_dirs: BaseDirs) -> Self {
        DesktopMenu {
            menu_file: PathBuf::new(),
            environments: Vec::new(),
            base_dirs,
            tree: None,
            hash: None,
            watch_paths: BTreeSet::new(),
            log_dir: None,
            out_dated: true,
        }
    }

    /// The desktop environments menu entries are filtered against
    /// (`OnlyShowIn`/`NotShowIn`).
    pub fn environments(&self) -> &[String] {
        &self.environments
    }

    /// Sets the desktop environments to filter entries for.
    ///
    /// With an empty list, entries are checked once against
    /// `$XDG_CURRENT_DESKTOP` instead.
    pub fn set_environments(&mut self, environments: Vec<String>) {
        self.environments = environments;
    }

    /// Enables per-pass debug dumps: after each pipeline pass the tree is
    /// written to `NN-pass.xml` inside `directory`.
    pub fn set_log_dir(&mut self, directory: impl Into<PathBuf>) {
        self.log_dir = Some(directory.into());
    }

    /// The menu file passed to the last [`read`](Self::read) call.
    pub fn menu_file_name(&self) -> &Path {
        &self.menu_file
    }

    /// The built tree, if a read succeeded.
    pub fn xml(&self) -> Option<&Element> {
        self.tree.as_ref()
    }

    /// The built tree serialized to XML.
    pub fn to_xml_string(&self) -> Option<String> {
        self.tree.as_ref().map(Element::to_xml)
    }

    /// Every file and directory that contributed to the current tree; a
    /// [`MenuWatcher`] watches these.
    pub fn watch_paths(&self) -> &BTreeSet<PathBuf> {
        &self.watch_paths
    }

    /// Whether the sources changed since the tree was last consumed.
    pub fn is_out_dated(&self) -> bool {
        self.out_dated
    }

    /// Reads a menu file and runs the full build pipeline.
    ///
    /// On failure the previously built tree is left untouched.
    pub fn read(&mut self, menu_file: impl AsRef<Path>) -> Result<(), MenuError> {
        self.menu_file = menu_file.as_ref().to_owned();

        let mut state = BuildState {
            dirs: &self.base_dirs,
            environments: &self.environments,
            cache: DesktopFileCache::new(),
            watch_paths: BTreeSet::new(),
        };
        let log_dir = self.log_dir.clone();
        let log_dir = log_dir.as_deref();

        let mut root = reader::load_menu(&mut state, &self.menu_file)?;
        dump(log_dir, &root, "00-reader");

        simplify(&mut root);
        dump(log_dir, &root, "01-simplify");

        merge_menus(&mut root);
        dump(log_dir, &root, "02-mergeMenus");

        move_menus(&mut root);
        dump(log_dir, &root, "03-moveMenus");

        merge_menus(&mut root);
        dump(log_dir, &root, "04-mergeMenus");

        delete_deleted_menus(&mut root);
        dump(log_dir, &root, "05-deleteDeletedMenus");

        process_directory_entries(&mut root, &[], &mut state);
        dump(log_dir, &root, "06-processDirectoryEntries");

        applink::process_apps(&mut root, &mut state);
        dump(log_dir, &root, "07-processApps");

        layout::process_layouts(&mut root);
        dump(log_dir, &root, "08-processLayouts");

        delete_empty(&mut root);
        dump(log_dir, &root, "09-deleteEmpty");

        fix_separators(&mut root);
        dump(log_dir, &root, "10-fixSeparators");

        self.hash = Some(Sha256::digest(root.to_xml().as_bytes()).into());
        self.watch_paths = state.watch_paths;
        self.tree = Some(root);
        self.out_dated = false;

        Ok(())
    }

    /// Re-reads the current menu file.
    ///
    /// Returns whether the rebuilt tree differs from the previous one; on a
    /// difference the menu is also marked [out of date](Self::is_out_dated).
    pub fn rebuild(&mut self) -> Result<bool, MenuError> {
        let previous = self.hash;
        self.read(self.menu_file.clone())?;
        let changed = previous != self.hash;
        if changed {
            self.out_dated = true;
        }
        Ok(changed)
    }

    /// Writes the built tree to a file.
    pub fn save(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let serialized = self
            .to_xml_string()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "no menu has been read"))?;
        fs::write(path, serialized)
    }
}

/// Finds the menu file to read, per the menu specification's
/// `$XDG_CONFIG_DIRS/menus/${XDG_MENU_PREFIX}<base_name>` rule.
///
/// If no prefixed file exists, a list of well-known distribution file names
/// is tried in priority order.
pub fn find_menu_file(dirs: &BaseDirs, base_name: &str) -> Option<PathBuf> {
    const WELL_KNOWN: [&str; 6] = [
        "applications.menu",
        "razor-applications.menu",
        "kde4-applications.menu",
        "kde-applications.menu",
        "gnome-applications.menu",
        "lxde-applications.menu",
    ];

    let prefix = env::var("XDG_MENU_PREFIX").unwrap_or_default();
    for dir in dirs.config_search() {
        let candidate = dir.join("menus").join(format!("{prefix}{base_name}"));
        if candidate.exists() {
            return Some(candidate);
        }
    }
    for dir in dirs.config_search() {
        for name in WELL_KNOWN {
            let candidate = dir.join("menus").join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }
    None
}

fn dump(log_dir: Option<&Path>, root: &Element, name: &str) {
    let Some(dir) = log_dir else { return };
    let path = dir.join(format!("{name}.xml"));
    if let Err(err) = fs::write(&path, root.to_xml()) {
        warn!(file = %path.display(), %err, "cannot write menu debug dump");
    }
}

/// Folds marker child elements into attributes on their menu.
///
/// `<Name>` becomes the `name` attribute (slashes discarded, as the
/// specification requires names to contain none), `<Deleted>`/`<NotDeleted>`
/// and `<OnlyUnallocated>`/`<NotOnlyUnallocated>` become `deleted` and
/// `onlyUnallocated`, and `<FileInfo>` bookkeeping is dropped.
fn simplify(element: &mut Element) {
    let children = element.take_children();
    let mut kept = Vec::with_capacity(children.len());
    for mut child in children {
        match child.tag() {
            "Name" => {
                let name: String = child.text().chars().filter(|c| *c != '/').collect();
                element.set_attribute("name", name);
            }
            "Deleted" => element.set_attribute("deleted", "1"),
            "NotDeleted" => element.set_attribute("deleted", "0"),
            "OnlyUnallocated" => element.set_attribute("onlyUnallocated", "1"),
            "NotOnlyUnallocated" => element.set_attribute("onlyUnallocated", "0"),
            "FileInfo" => {}
            _ => {
                if child.is("Menu") {
                    simplify(&mut child);
                }
                kept.push(child);
            }
        }
    }
    *element.children_mut() = kept;
}

/// Coalesces sibling `<Menu>` elements sharing a `name`.
///
/// The merged menu sits at the position of the last occurrence; its children
/// are the occurrences' children in declaration order, and for the `deleted`
/// and `onlyUnallocated` attributes the last declaration wins.
fn merge_menus(element: &mut Element) {
    let mut last_index: HashMap<String, usize> = HashMap::new();
    let mut duplicated = false;
    for (i, child) in element.children().iter().enumerate() {
        if child.is("Menu") {
            let name = child.attribute("name").unwrap_or("").to_owned();
            if last_index.insert(name, i).is_some() {
                duplicated = true;
            }
        }
    }

    if duplicated {
        let children = element.take_children();
        let mut pooled: HashMap<String, (Vec<Element>, Vec<(&'static str, String)>)> =
            HashMap::new();
        let mut kept = Vec::with_capacity(children.len());
        for (i, mut child) in children.into_iter().enumerate() {
            if !child.is("Menu") {
                kept.push(child);
                continue;
            }
            let name = child.attribute("name").unwrap_or("").to_owned();
            let entry = pooled.entry(name.clone()).or_default();
            for key in ["deleted", "onlyUnallocated"] {
                if let Some(value) = child.attribute(key) {
                    entry.1.retain(|(k, _)| *k != key);
                    entry.1.push((key, value.to_owned()));
                }
            }
            entry.0.append(child.children_mut());
            if last_index[&name] == i {
                let (merged_children, attributes) = pooled.remove(&name).unwrap_or_default();
                *child.children_mut() = merged_children;
                for (key, value) in attributes {
                    child.set_attribute(key, value);
                }
                kept.push(child);
            }
        }
        *element.children_mut() = kept;
    }

    for child in element.children_mut() {
        if child.is("Menu") {
            merge_menus(child);
        }
    }
}

/// Resolves `<Move>` directives, deepest menus first.
///
/// Within one menu the moves run in declaration order. A missing origin is
/// ignored, a missing destination is created, and a destination inside the
/// moved subtree would create a cycle, so the move is skipped.
fn move_menus(element: &mut Element) {
    for child in element.children_mut() {
        if child.is("Menu") {
            move_menus(child);
        }
    }

    let mut moves = Vec::new();
    element.children_mut().retain(|child| {
        if child.is("Move") {
            let old = child
                .last_child("Old")
                .map(|e| e.text().to_owned())
                .unwrap_or_default();
            let new = child
                .last_child("New")
                .map(|e| e.text().to_owned())
                .unwrap_or_default();
            moves.push((old, new));
            false
        } else {
            true
        }
    });

    for (old_path, new_path) in moves {
        if path_components(&old_path).next().is_none() || new_path.is_empty() {
            continue;
        }
        let Some(old_chain) = resolve_menu_path(element, &old_path) else {
            continue;
        };
        let new_prefix = resolve_menu_prefix(element, &new_path);
        if new_prefix.len() >= old_chain.len() && new_prefix[..old_chain.len()] == old_chain[..] {
            debug!(old = %old_path, new = %new_path, "skipping move that would nest a menu under itself");
            continue;
        }

        let mut old_menu = remove_child_at(element, &old_chain);
        let destination = find_or_create_menu(element, &new_path);
        destination.children_mut().append(old_menu.children_mut());
        for key in ["deleted", "onlyUnallocated"] {
            if let Some(value) = old_menu.attribute(key) {
                let value = value.to_owned();
                destination.set_attribute(key, value);
            }
        }
    }
}

fn path_components(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|c| !c.is_empty())
}

/// Resolves a full menu path to a chain of child indices, or `None` if any
/// component is missing.
fn resolve_menu_path(scope: &Element, path: &str) -> Option<Vec<usize>> {
    let mut chain = Vec::new();
    let mut current = scope;
    for component in path_components(path) {
        let index = current
            .children()
            .iter()
            .position(|c| c.is("Menu") && c.attribute("name") == Some(component))?;
        chain.push(index);
        current = &current.children()[index];
    }
    Some(chain)
}

/// Resolves as many leading components of a menu path as exist.
fn resolve_menu_prefix(scope: &Element, path: &str) -> Vec<usize> {
    let mut chain = Vec::new();
    let mut current = scope;
    for component in path_components(path) {
        let Some(index) = current
            .children()
            .iter()
            .position(|c| c.is("Menu") && c.attribute("name") == Some(component))
        else {
            break;
        };
        chain.push(index);
        current = &current.children()[index];
    }
    chain
}

fn remove_child_at(scope: &mut Element, chain: &[usize]) -> Element {
    let (last, rest) = chain.split_last().expect("path chains are never empty");
    let mut current = scope;
    for &index in rest {
        current = &mut current.children_mut()[index];
    }
    current.children_mut().remove(*last)
}

fn find_or_create_menu<'a>(scope: &'a mut Element, path: &str) -> &'a mut Element {
    let mut current = scope;
    for component in path_components(path) {
        let index = match current
            .children()
            .iter()
            .position(|c| c.is("Menu") && c.attribute("name") == Some(component))
        {
            Some(index) => index,
            None => {
                let mut menu = Element::new("Menu");
                menu.set_attribute("name", component);
                current.push(menu);
                current.children().len() - 1
            }
        };
        current = &mut current.children_mut()[index];
    }
    current
}

/// Drops menus flagged `deleted`, and the `.hidden` menu some menu editors
/// create, together with all their descendants.
fn delete_deleted_menus(element: &mut Element) {
    element.children_mut().retain_mut(|child| {
        if !child.is("Menu") {
            return true;
        }
        if child.attribute("deleted") == Some("1") || child.attribute("name") == Some(".hidden") {
            return false;
        }
        delete_deleted_menus(child);
        true
    });
}

/// Resolves `<Directory>` references into `title`/`comment`/`icon`
/// attributes.
///
/// Each menu consumes its `<Directory>` and `<DirectoryDir>` children; later
/// declarations take priority, then the search falls back to the ancestors'
/// directory dirs. The `name` attribute is the title fallback.
fn process_directory_entries(
    element: &mut Element,
    parent_dirs: &[PathBuf],
    state: &mut BuildState<'_>,
) {
    let title = element.attribute("name").unwrap_or("").to_owned();
    element.set_attribute("title", title);

    let mut files: Vec<String> = Vec::new();
    let mut dirs: Vec<PathBuf> = Vec::new();
    let mut i = element.children().len();
    while i > 0 {
        i -= 1;
        if element.children()[i].is("Directory") {
            let directive = element.children_mut().remove(i);
            files.push(directive.text().to_owned());
        } else if element.children()[i].is("DirectoryDir") {
            let directive = element.children_mut().remove(i);
            dirs.push(PathBuf::from(directive.text()));
        }
    }
    dirs.extend(parent_dirs.iter().cloned());

    'search: for file in &files {
        let path = Path::new(file);
        if path.is_absolute() {
            if load_directory_file(path, element, state) {
                break 'search;
            }
        } else {
            for dir in &dirs {
                if load_directory_file(&dir.join(file), element, state) {
                    break 'search;
                }
            }
        }
    }

    for child in element.children_mut() {
        if child.is("Menu") {
            process_directory_entries(child, &dirs, state);
        }
    }
}

fn load_directory_file(path: &Path, element: &mut Element, state: &mut BuildState<'_>) -> bool {
    let Ok(file) = DesktopFile::load(path) else {
        return false;
    };
    if !file.is_valid() {
        return false;
    }

    element.set_attribute("title", file.name().to_owned());
    element.set_attribute("comment", file.comment().to_owned());
    element.set_attribute("icon", file.icon_name().to_owned());

    if let Some(dir) = path.parent() {
        state.watch_paths.insert(dir.to_owned());
    }
    true
}

/// Prunes menus with no `<Menu>` or `<AppLink>` child, bottom-up, unless the
/// layout marked them `keep`. The root itself is never removed.
fn delete_empty(element: &mut Element) {
    element.children_mut().retain_mut(|child| {
        if !child.is("Menu") {
            return true;
        }
        delete_empty(child);
        if child.attribute("keep") == Some("true") {
            return true;
        }
        child.has_child("Menu") || child.has_child("AppLink")
    });
}

/// Drops separators at the start or end of a menu and collapses runs of
/// separators to one.
fn fix_separators(element: &mut Element) {
    let mut previous_was_separator = false;
    element.children_mut().retain(|child| {
        let separator = child.is("Separator");
        let keep = !(separator && previous_was_separator);
        if keep {
            previous_was_separator = separator;
        }
        keep
    });
    if element.children().first().is_some_and(|c| c.is("Separator")) {
        element.children_mut().remove(0);
    }
    if element.children().last().is_some_and(|c| c.is("Separator")) {
        element.children_mut().pop();
    }

    for child in element.children_mut() {
        if child.is("Menu") {
            fix_separators(child);
        }
    }
}
