//! Node tree back to HTML text.

use super::node::{AttrValue, Element, Node, is_void};

/// Serialize nodes to HTML.
pub fn to_html(nodes: &[Node]) -> String {
    let mut out = String::new();
    write_nodes(&mut out, nodes);
    out
}

fn write_nodes(out: &mut String, nodes: &[Node]) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Tag(element) => write_element(out, element),
        }
    }
}

fn write_element(out: &mut String, element: &Element) {
    let Some(tag) = element.tag.as_deref() else {
        write_nodes(out, element.children());
        return;
    };

    out.push('<');
    out.push_str(tag);
    for (name, value) in &element.attrs {
        out.push(' ');
        out.push_str(name);
        let value = match value {
            AttrValue::Text(v) | AttrValue::Template(v) => v,
        };
        if !value.is_empty() {
            out.push_str("=\"");
            out.push_str(&value.replace('"', "&quot;"));
            out.push('"');
        }
    }

    match &element.content {
        Some(content) => {
            out.push('>');
            write_nodes(out, content);
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        None if is_void(tag) => out.push('>'),
        None => out.push_str(" />"),
    }
}

// ============================================================================
// Tests
// ============================================================================
