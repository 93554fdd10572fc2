//! XML parsing into the element tree.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::Element;

/// Errors raised while parsing a menu document.
#[derive(Debug, Error)]
pub enum XmlError {
    /// The document is not well-formed XML.
    #[error("XML syntax error at byte {position}: {source}")]
    Syntax {
        /// Byte offset of the offending input.
        position: usize,
        /// The underlying parser error.
        #[source]
        source: quick_xml::Error,
    },
    /// An attribute could not be parsed.
    #[error("malformed attribute at byte {position}: {source}")]
    Attribute {
        /// Byte offset of the offending input.
        position: usize,
        /// The underlying attribute error.
        #[source]
        source: quick_xml::events::attributes::AttrError,
    },
    /// The document contains no element at all.
    #[error("document has no root element")]
    NoRoot,
}

impl Element {
    /// Parses an XML document into an element tree.
    ///
    /// Comments, processing instructions and the XML declaration are
    /// discarded; text content is whitespace-trimmed. Returns the root
    /// element.
    pub fn parse(input: &str) -> Result<Element, XmlError> {
        let mut reader = Reader::from_str(input);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|source| XmlError::Syntax { position, source })?;
            match event {
                Event::Start(start) => {
                    stack.push(element_from_start(&start, position)?);
                }
                Event::Empty(start) => {
                    let element = element_from_start(&start, position)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    // Mismatched end tags are already rejected by the reader.
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, &mut root, element);
                    }
                }
                Event::Text(text) => {
                    let value = text
                        .unescape()
                        .map_err(|source| XmlError::Syntax { position, source })?;
                    let trimmed = value.trim();
                    if !trimmed.is_empty() {
                        if let Some(top) = stack.last_mut() {
                            top.append_text(trimmed);
                        }
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.append_text(String::from_utf8_lossy(&data.into_inner()).trim());
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        root.ok_or(XmlError::NoRoot)
    }
}

fn element_from_start(start: &BytesStart<'_>, position: usize) -> Result<Element, XmlError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|source| XmlError::Attribute { position, source })?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|source| XmlError::Syntax { position, source })?
            .into_owned();
        element.set_attribute(key, value);
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.push(element);
    } else if root.is_none() {
        *root = Some(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nested_elements() {
        let doc = r#"<?xml version="1.0"?>
            <Menu>
              <Name>Applications</Name>
              <Include><Category>Game</Category></Include>
              <AppDir>/usr/share/applications</AppDir>
            </Menu>"#;
        let root = Element::parse(doc).unwrap();
        assert_eq!(root.tag(), "Menu");
        assert_eq!(root.children().len(), 3);
        assert_eq!(root.first_child("Name").unwrap().text(), "Applications");
        let include = root.first_child("Include").unwrap();
        assert_eq!(include.first_child("Category").unwrap().text(), "Game");
    }

    #[test]
    fn parses_attributes_and_entities() {
        let root = Element::parse(r#"<Menu name="A &amp; B"><Layout inline="true"/></Menu>"#).unwrap();
        assert_eq!(root.attribute("name"), Some("A & B"));
        assert_eq!(root.first_child("Layout").unwrap().attribute("inline"), Some("true"));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(Element::parse("<Menu><Name></Menu>"), Err(XmlError::Syntax { .. })));
    }

    #[test]
    fn rejects_empty_document() {
        assert!(matches!(Element::parse("<!-- nothing here -->"), Err(XmlError::NoRoot)));
    }
}
