//! Debounced filesystem watching for automatic menu rebuilds.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use notify::{watcher, DebouncedEvent, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, warn};

use super::DesktopMenu;

/// How long filesystem events are coalesced before a rebuild runs.
///
/// Package installations touch many files in a burst; the delay absorbs the
/// burst into a single rebuild.
pub const REBUILD_DELAY: Duration = Duration::from_secs(3);

/// Rebuilds a [`DesktopMenu`] whenever one of its source files changes.
///
/// The watcher owns a background thread that waits for debounced filesystem
/// events on the menu's [watch paths](DesktopMenu::watch_paths), re-runs
/// [`DesktopMenu::rebuild`], re-syncs the watched set (a rebuild can add or
/// drop source directories) and invokes the change callback — but only when
/// the rebuilt tree actually differs from the previous one. Dropping the
/// watcher stops the thread.
#[derive(Debug)]
pub struct MenuWatcher {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl MenuWatcher {
    /// Starts watching the given menu.
    ///
    /// `on_change` runs on the watcher thread after every rebuild that
    /// produced a different tree.
    pub fn spawn<F>(menu: Arc<Mutex<DesktopMenu>>, mut on_change: F) -> Result<Self, notify::Error>
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = channel();
        let mut fs_watcher = watcher(tx, REBUILD_DELAY)?;
        let mut watched: BTreeSet<PathBuf> = menu.lock().unwrap().watch_paths().clone();
        for path in &watched {
            watch_path(&mut fs_watcher, path);
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("menu-watcher".into())
            .spawn(move || loop {
                if thread_stop.load(Ordering::Relaxed) {
                    break;
                }
                match rx.recv_timeout(Duration::from_millis(500)) {
                    Ok(event) => {
                        if !triggers_rebuild(&event) {
                            continue;
                        }
                        let mut menu = menu.lock().unwrap();
                        match menu.rebuild() {
                            Ok(changed) => {
                                resync(&mut fs_watcher, &mut watched, menu.watch_paths());
                                drop(menu);
                                if changed {
                                    on_change();
                                }
                            }
                            Err(err) => warn!(%err, "menu rebuild failed"),
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .expect("failed to spawn the menu watcher thread");

        Ok(MenuWatcher {
            stop,
            handle: Some(handle),
        })
    }
}

impl Drop for MenuWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn triggers_rebuild(event: &DebouncedEvent) -> bool {
    matches!(
        event,
        DebouncedEvent::Create(_)
            | DebouncedEvent::Write(_)
            | DebouncedEvent::Chmod(_)
            | DebouncedEvent::Remove(_)
            | DebouncedEvent::Rename(_, _)
            | DebouncedEvent::Rescan
    )
}

fn watch_path(fs_watcher: &mut RecommendedWatcher, path: &Path) {
    // Sources can disappear between builds; a path that cannot be watched is
    // picked up again on the rebuild that recreates it.
    if let Err(err) = fs_watcher.watch(path, RecursiveMode::NonRecursive) {
        debug!(path = %path.display(), %err, "cannot watch path");
    }
}

fn resync(
    fs_watcher: &mut RecommendedWatcher,
    watched: &mut BTreeSet<PathBuf>,
    current: &BTreeSet<PathBuf>,
) {
    for gone in watched.difference(current) {
        let _ = fs_watcher.unwatch(gone);
    }
    for added in current.difference(watched) {
        watch_path(fs_watcher, added);
    }
    *watched = current.clone();
}
