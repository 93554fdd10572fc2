//! Serialization of the element tree back to XML.

use super::Element;

impl Element {
    /// Serializes the tree rooted at this element.
    ///
    /// The output is stable for a given tree: attributes keep their insertion
    /// order and children their document order, so two identical trees always
    /// serialize to identical bytes. The menu builder hashes this output to
    /// detect whether a rebuild changed anything.
    pub fn to_xml(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        write_element(&mut out, self, 0);
        out
    }
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    indent(out, depth);
    out.push('<');
    out.push_str(element.tag());
    for (name, value) in element.attributes() {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_into(out, value, true);
        out.push('"');
    }

    if element.text().is_empty() && element.children().is_empty() {
        out.push_str("/>\n");
        return;
    }

    out.push('>');
    if element.children().is_empty() {
        escape_into(out, element.text(), false);
    } else {
        out.push('\n');
        if !element.text().is_empty() {
            indent(out, depth + 1);
            escape_into(out, element.text(), false);
            out.push('\n');
        }
        for child in element.children() {
            write_element(out, child, depth + 1);
        }
        indent(out, depth);
    }
    out.push_str("</");
    out.push_str(element.tag());
    out.push_str(">\n");
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn escape_into(out: &mut String, value: &str, attribute: bool) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::xml::Element;

    #[test]
    fn serializes_and_reparses() {
        let doc = r#"<Menu name="Games &amp; Fun"><AppDir>/usr/share/applications</AppDir><Menu name="Sub"><AppLink id="a.desktop" title="A"/></Menu></Menu>"#;
        let root = Element::parse(doc).unwrap();
        let serialized = root.to_xml();
        let reparsed = Element::parse(&serialized).unwrap();
        assert_eq!(root, reparsed);
    }

    #[test]
    fn output_is_stable() {
        let root = Element::parse("<Menu><Name>X</Name></Menu>").unwrap();
        assert_eq!(root.to_xml(), root.clone().to_xml());
    }
}
