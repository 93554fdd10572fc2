//! The mutable element tree the menu passes operate on.
//!
//! `.menu` documents and everything the build pipeline derives from them are
//! plain trees of [`Element`]s: a tag name, an insertion-ordered attribute
//! map, text content and an owned list of children. Passes mutate the tree in
//! place; there are no parent pointers, so traversals that remove or reorder
//! nodes work on owned child vectors instead of live cursors.

use indexmap::IndexMap;

mod parse;
mod write;

pub use parse::XmlError;

/// A single node of a menu document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: IndexMap<String, String>,
    text: String,
    children: Vec<Element>,
}

impl Element {
    /// Creates an element with the given tag name and no content.
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// The tag name, e.g. `Menu` or `AppLink`.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Whether this element has the given tag name.
    pub fn is(&self, tag: &str) -> bool {
        self.tag == tag
    }

    /// Looks up an attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Sets an attribute, replacing any previous value.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Iterates over the attributes in insertion order.
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The direct text content, with surrounding whitespace trimmed.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the text content.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub(crate) fn append_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// The children, in document order.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Mutable access to the child list.
    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    /// Appends a child element.
    pub fn push(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Moves all children out of this element.
    pub fn take_children(&mut self) -> Vec<Element> {
        std::mem::take(&mut self.children)
    }

    /// The first child with the given tag name.
    pub fn first_child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(tag))
    }

    /// The last child with the given tag name.
    pub fn last_child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().rev().find(|c| c.is(tag))
    }

    /// Whether any direct child has the given tag name.
    pub fn has_child(&self, tag: &str) -> bool {
        self.children.iter().any(|c| c.is(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::Element;

    #[test]
    fn child_lookup() {
        let mut menu = Element::new("Menu");
        let mut first = Element::new("Move");
        first.set_text("a");
        let mut second = Element::new("Move");
        second.set_text("b");
        menu.push(first);
        menu.push(second);
        menu.push(Element::new("AppLink"));

        assert_eq!(menu.first_child("Move").unwrap().text(), "a");
        assert_eq!(menu.last_child("Move").unwrap().text(), "b");
        assert!(menu.has_child("AppLink"));
        assert!(!menu.has_child("Separator"));
    }

    #[test]
    fn attributes_preserve_insertion_order() {
        let mut el = Element::new("AppLink");
        el.set_attribute("id", "x.desktop");
        el.set_attribute("title", "X");
        el.set_attribute("id", "y.desktop");
        let attrs: Vec<_> = el.attributes().collect();
        assert_eq!(attrs, vec![("id", "y.desktop"), ("title", "X")]);
    }
}
