#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # freedesktop-menu
//!
//! This crate implements the parts of the freedesktop.org desktop-integration
//! specifications a Linux desktop shell needs to present an application menu:
//! the [Desktop Menu Specification] build pipeline, the narrow slice of the
//! [Desktop Entry Specification] that pipeline consumes, and the [Autostart
//! Specification] entry enumeration.
//!
//! ## Structure of the crate
//!
//! - [`menu`] is the core: [`menu::DesktopMenu`] reads a `.menu` file, resolves
//!   its merge directives and runs the multi-pass transformation (merging,
//!   moves, application allocation, layout) that produces the final menu tree.
//!   [`menu::MenuWatcher`] keeps such a menu up to date by watching every file
//!   and directory that contributed to it.
//! - [`desktop_file`] reads `.desktop` and `.directory` key files and answers
//!   the questions the menu pipeline asks of them (name, categories,
//!   visibility, suitability for a desktop environment).
//! - [`xml`] is the mutable element tree all menu passes operate on, together
//!   with its parser and serializer.
//! - [`dirs`] resolves the XDG base-directory search paths, and [`autostart`]
//!   enumerates autostart entries across them.
//!
//! ## Reading a menu
//!
//! ```no_run
//! use freedesktop_menu::dirs::BaseDirs;
//! use freedesktop_menu::menu::{self, DesktopMenu};
//!
//! let dirs = BaseDirs::from_env();
//! let file = menu::find_menu_file(&dirs, "applications.menu").expect("no menu file installed");
//!
//! let mut menu = DesktopMenu::with_base_dirs(dirs);
//! menu.set_environments(vec!["GNOME".into()]);
//! menu.read(&file).expect("menu build failed");
//! println!("{}", menu.to_xml_string().unwrap());
//! ```
//!
//! ## Logging
//!
//! This crate uses [`tracing`] for its internal logging: recovered conditions
//! (missing merge targets, unknown matching rules, unreadable application
//! directories) are logged and skipped rather than surfaced as errors, per the
//! menu specification's best-effort merging rules.
//!
//! [Desktop Menu Specification]: https://specifications.freedesktop.org/menu-spec/latest/
//! [Desktop Entry Specification]: https://specifications.freedesktop.org/desktop-entry-spec/latest/
//! [Autostart Specification]: https://specifications.freedesktop.org/autostart-spec/latest/

pub mod autostart;
pub mod desktop_file;
pub mod dirs;
pub mod menu;
pub mod xml;
