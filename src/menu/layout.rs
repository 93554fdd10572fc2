//! Per-menu `<Layout>`/`<DefaultLayout>` processing.
//!
//! Child menus are laid out before their parent so inlining decisions see
//! final child counts. Each menu's effective layout is its last non-empty
//! `<Layout>` child, falling back to the nearest `<DefaultLayout>` in scope;
//! layout parameters cascade from the inherited default and can be overridden
//! per reference by `<Menuname>` attributes.
//!
//! With no layout anywhere in scope, the implicit default applies:
//! submenus in alphabetical order, then entries in alphabetical order.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::xml::Element;

#[derive(Debug, Clone, Copy)]
struct LayoutParams {
    show_empty: bool,
    inline: bool,
    inline_limit: i32,
    inline_header: bool,
    inline_alias: bool,
}

const DEFAULT_PARAMS: LayoutParams = LayoutParams {
    show_empty: false,
    inline: false,
    inline_limit: 4,
    inline_header: true,
    inline_alias: false,
};

/// The `<DefaultLayout>` in scope for a menu: its directives plus the
/// parameter cascade accumulated so far.
struct DefaultLayout {
    directives: Rc<Vec<Element>>,
    params: LayoutParams,
}

/// Applies layouts to the whole tree.
pub(crate) fn process_layouts(root: &mut Element) {
    process_menu(root, None);
}

fn process_menu(element: &mut Element, inherited: Option<&DefaultLayout>) {
    let mut params = inherited.map_or(DEFAULT_PARAMS, |d| d.params);

    let scope = match element.last_child("DefaultLayout").cloned() {
        Some(local) => {
            apply_params(&local, &mut params);
            DefaultLayout {
                directives: Rc::new(local.children().to_vec()),
                params,
            }
        }
        None => DefaultLayout {
            directives: inherited
                .map(|d| d.directives.clone())
                .unwrap_or_else(|| Rc::new(implicit_directives())),
            params,
        },
    };

    let layout = match element.last_child("Layout") {
        Some(local) if !local.children().is_empty() => Rc::new(local.children().to_vec()),
        _ => scope.directives.clone(),
    };

    // Children first: a submenu must be fully laid out before the parent can
    // count and possibly inline it.
    for child in element.children_mut() {
        if child.is("Menu") {
            process_menu(child, Some(&scope));
        }
    }

    let mut result: Vec<Element> = Vec::new();
    for directive in layout.iter() {
        match directive.tag() {
            "Filename" => {
                if let Some(position) = position_of(element, "AppLink", "id", directive.text()) {
                    result.push(element.children_mut().remove(position));
                }
            }
            "Menuname" => place_menu(element, directive, scope.params, &mut result),
            "Separator" => result.push(Element::new("Separator")),
            "Merge" => {
                let mut placeholder = Element::new("Merge");
                if let Some(kind) = directive.attribute("type") {
                    placeholder.set_attribute("type", kind.to_owned());
                }
                result.push(placeholder);
            }
            _ => {}
        }
    }

    resolve_merges(element, &mut result);

    element
        .children_mut()
        .retain(|child| !child.is("Layout") && !child.is("DefaultLayout"));
    element.children_mut().append(&mut result);
}

fn implicit_directives() -> Vec<Element> {
    ["menus", "files"]
        .into_iter()
        .map(|kind| {
            let mut merge = Element::new("Merge");
            merge.set_attribute("type", kind);
            merge
        })
        .collect()
}

fn apply_params(element: &Element, params: &mut LayoutParams) {
    if let Some(value) = element.attribute("show_empty") {
        params.show_empty = value == "true";
    }
    if let Some(value) = element.attribute("inline") {
        params.inline = value == "true";
    }
    if let Some(value) = element.attribute("inline_limit") {
        params.inline_limit = value.parse().unwrap_or(params.inline_limit);
    }
    if let Some(value) = element.attribute("inline_header") {
        params.inline_header = value == "true";
    }
    if let Some(value) = element.attribute("inline_alias") {
        params.inline_alias = value == "true";
    }
}

fn position_of(element: &Element, tag: &str, attribute: &str, value: &str) -> Option<usize> {
    element
        .children()
        .iter()
        .position(|child| child.is(tag) && child.attribute(attribute) == Some(value))
}

/// Entries that count towards a menu's size for `show_empty` and inlining.
fn eligible_count(menu: &Element) -> i32 {
    menu.children()
        .iter()
        .filter(|c| c.is("AppLink") || c.is("Menu") || c.is("Separator"))
        .count() as i32
}

/// Places the submenu a `<Menuname>` directive references: dropped or kept
/// when empty per `show_empty`, inlined (optionally with a `<Header>` or an
/// aliased title) when the inlining parameters allow, appended as a submenu
/// otherwise.
fn place_menu(
    element: &mut Element,
    directive: &Element,
    defaults: LayoutParams,
    result: &mut Vec<Element>,
) {
    let Some(position) = position_of(element, "Menu", "name", directive.text()) else {
        return;
    };
    let mut params = defaults;
    apply_params(directive, &mut params);

    let count = eligible_count(&element.children()[position]);
    if count == 0 {
        if params.show_empty {
            let mut menu = element.children_mut().remove(position);
            menu.set_attribute("keep", "true");
            result.push(menu);
        }
        return;
    }

    let inline = params.inline && (params.inline_limit == 0 || params.inline_limit > count);
    let alias = params.inline_alias && inline && count == 1;
    let header = params.inline_header && inline && !alias;

    let mut menu = element.children_mut().remove(position);
    if !inline {
        result.push(menu);
        return;
    }

    if header {
        let mut header_element = Element::new("Header");
        for (name, value) in menu.attributes() {
            header_element.set_attribute(name.to_owned(), value.to_owned());
        }
        result.push(header_element);
    }
    if alias {
        let title = menu.attribute("title").unwrap_or("").to_owned();
        if let Some(first) = menu.children_mut().first_mut() {
            first.set_attribute("title", title);
        }
    }
    result.append(menu.children_mut());
}

/// Replaces each `<Merge>` placeholder with the not-yet-placed children of
/// the requested kind, in alphabetical order of their titles.
///
/// Children sharing a title keep only the last one in the merge; the shadowed
/// element stays behind and ends up after the laid-out children, which is the
/// historical behavior of this pipeline.
fn resolve_merges(element: &mut Element, result: &mut Vec<Element>) {
    while let Some(position) = result.iter().position(|c| c.is("Merge")) {
        let kind = result[position].attribute("type").unwrap_or("").to_owned();
        let menus = kind == "menus" || kind == "all";
        let files = kind == "files" || kind == "all";

        let mut by_title: BTreeMap<String, usize> = BTreeMap::new();
        for (index, child) in element.children().iter().enumerate() {
            if (menus && child.is("Menu")) || (files && child.is("AppLink")) {
                by_title.insert(child.attribute("title").unwrap_or("").to_owned(), index);
            }
        }

        let mut indices: Vec<usize> = by_title.values().copied().collect();
        indices.sort_unstable_by(|a, b| b.cmp(a));
        let mut picked: Vec<(String, Element)> = Vec::with_capacity(indices.len());
        for index in indices {
            let child = element.children_mut().remove(index);
            let title = child.attribute("title").unwrap_or("").to_owned();
            picked.push((title, child));
        }
        picked.sort_by(|a, b| a.0.cmp(&b.0));

        result.splice(position..=position, picked.into_iter().map(|(_, el)| el));
    }
}
