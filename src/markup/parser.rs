//! Lenient HTML parser on top of `quick-xml`.
//!
//! The reader runs with every well-formedness check disabled; HTML rules are
//! applied on top:
//!
//! - void elements (`<br>`, `<img>`) never take content
//! - `<script>` and `<style>` bodies are raw text up to the closing tag
//! - an end tag closes up to the nearest open element with that name, or is
//!   dropped when nothing matches
//! - comments, doctype, CDATA and processing instructions are kept verbatim
//! - text is scanned before the reader sees it: `{{ }}` spans are opaque,
//!   and a `<` that opens no tag or a bare `&` is plain text
//!
//! Text containing `{{ }}` is wrapped in a transparent node carrying the
//! interpolation hook; elements with `{{ }}` in an attribute carry it
//! themselves.

use super::{
    MarkupError,
    hook::{RenderHook, has_expressions},
    node::{AttrValue, Element, Node, is_void},
};
use quick_xml::{Reader, events::BytesStart, events::Event};

/// Elements whose body is not parsed as markup.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[inline]
fn create_reader(content: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_reader(content.as_bytes());
    reader.config_mut().trim_text(false);
    reader.config_mut().enable_all_checks(false);
    reader.config_mut().allow_unmatched_ends = true;
    reader
}

/// Parse markup into top-level nodes.
pub fn parse(source: &str) -> Result<Vec<Node>, MarkupError> {
    let mut tree = TreeBuilder::default();
    let mut pos = 0;

    // Text runs are scanned here; quick-xml only ever sees one tag at a time.
    while pos < source.len() {
        if !is_tag_start(source, pos) {
            let end = text_end(source, pos);
            tree.push_text(&source[pos..end]);
            pos = end;
            continue;
        }

        let mut reader = create_reader(&source[pos..]);
        let event = reader.read_event().map_err(|err| MarkupError::Syntax {
            pos: pos + reader.error_position() as usize,
            message: err.to_string(),
        })?;
        let mut next = pos + reader.buffer_position() as usize;

        match event {
            Event::Start(start) => {
                let element = element_from(&start)?;
                let name = element.tag.as_deref().unwrap_or_default().to_ascii_lowercase();
                if RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
                    let (body_end, resume_at) = find_raw_end(source, next, &name);
                    tree.push_raw(element, &source[next..body_end]);
                    next = resume_at;
                } else if is_void(&name) {
                    tree.push_element(element);
                } else {
                    tree.open(element);
                }
            }
            Event::Empty(start) => tree.push_element(element_from(&start)?),
            Event::End(end) => tree.close(&String::from_utf8_lossy(end.name().as_ref())),
            Event::Text(text) => tree.push_text(&String::from_utf8_lossy(text.as_ref())),
            Event::GeneralRef(entity) => {
                tree.push_text(&format!("&{};", String::from_utf8_lossy(&entity)));
            }
            Event::CData(data) => {
                tree.push_text(&format!("<![CDATA[{}]]>", String::from_utf8_lossy(data.as_ref())));
            }
            Event::Comment(comment) => {
                tree.push_text(&format!("<!--{}-->", String::from_utf8_lossy(comment.as_ref())));
            }
            Event::DocType(doctype) => {
                let doctype = String::from_utf8_lossy(doctype.as_ref());
                tree.push_text(&format!("<!DOCTYPE {}>", doctype.trim()));
            }
            Event::PI(pi) => {
                tree.push_text(&format!("<?{}?>", String::from_utf8_lossy(pi.as_ref())));
            }
            Event::Decl(_) => {}
            Event::Eof => break,
        }

        if next == pos {
            break;
        }
        pos = next;
    }

    Ok(tree.finish())
}

/// `<` opening a tag, end tag, comment, doctype or processing instruction.
/// Any other `<` is text.
fn is_tag_start(source: &str, pos: usize) -> bool {
    let bytes = source.as_bytes();
    bytes[pos] == b'<'
        && bytes
            .get(pos + 1)
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, b'/' | b'!' | b'?'))
}

/// End of the text run starting at `from`: the next tag start outside a
/// `{{ }}` / `{{{ }}}` span, or the end of input.
///
/// Expression spans are opaque, so `{{ a < b && c }}` stays one text run.
/// Entities are kept as written; a bare `&` is plain text.
fn text_end(source: &str, from: usize) -> usize {
    let bytes = source.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        if bytes[i..].starts_with(b"{{") {
            let close = if bytes[i..].starts_with(b"{{{") { "}}}" } else { "}}" };
            let body = i + close.len();
            i = source[body..].find(close).map_or(body, |len| body + len + close.len());
            continue;
        }
        if i > from && is_tag_start(source, i) {
            return i;
        }
        i += 1;
    }
    bytes.len()
}

/// Locate `</name` (case-insensitive) from `from`; returns the body end and
/// the offset just past the closing tag. Unclosed bodies run to the end.
fn find_raw_end(source: &str, from: usize, name: &str) -> (usize, usize) {
    let lower = source[from..].to_ascii_lowercase();
    let needle = format!("</{name}");
    match lower.find(&needle) {
        Some(i) => {
            let end = from + i;
            let resume = source[end..].find('>').map_or(source.len(), |j| end + j + 1);
            (end, resume)
        }
        None => (source.len(), source.len()),
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, MarkupError> {
    let mut element = Element::new(&String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.html_attributes() {
        let attr = attr.map_err(|err| MarkupError::Attribute(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref());
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        let value = if has_expressions(&value) {
            AttrValue::Template(value)
        } else {
            AttrValue::Text(value)
        };
        element.attrs.push((key.as_ref().into(), value));
    }
    Ok(element)
}

// ============================================================================
// Tree builder
// ============================================================================

#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    stack: Vec<Element>,
}

impl TreeBuilder {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.stack.last_mut() {
            Some(element) => element.content.get_or_insert_with(Vec::new),
            None => &mut self.root,
        }
    }

    /// Append text, merging with a preceding text node.
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let nodes = self.current();
        if let Some(Node::Text(prev)) = nodes.last_mut() {
            *prev = format!("{prev}{text}").into();
        } else {
            nodes.push(Node::text(text));
        }
    }

    fn push_element(&mut self, element: Element) {
        let node = finalize(element, false);
        self.current().push(node);
    }

    fn push_raw(&mut self, mut element: Element, body: &str) {
        element.content = Some(if body.is_empty() {
            Vec::new()
        } else {
            vec![Node::text(body)]
        });
        let node = finalize(element, true);
        self.current().push(node);
    }

    fn open(&mut self, mut element: Element) {
        element.content = Some(Vec::new());
        self.stack.push(element);
    }

    fn close(&mut self, name: &str) {
        let Some(index) = self.stack.iter().rposition(|el| el.is(name)) else {
            return;
        };
        while self.stack.len() > index {
            if let Some(element) = self.stack.pop() {
                self.push_element(element);
            }
        }
    }

    fn finish(mut self) -> Vec<Node> {
        self.close_all();
        wrap_expressions(self.root, false)
    }

    fn close_all(&mut self) {
        while let Some(element) = self.stack.pop() {
            self.push_element(element);
        }
    }
}

/// Attach hooks once an element's children are complete.
fn finalize(mut element: Element, raw_text: bool) -> Node {
    if let Some(content) = element.content.take() {
        element.content = Some(wrap_expressions(content, raw_text));
    }
    if element.attrs.iter().any(|(_, v)| matches!(v, AttrValue::Template(_))) {
        element.hook = Some(RenderHook::interpolate());
    }
    Node::element(element)
}

/// Wrap text nodes containing `{{ }}` in hooked transparent nodes.
fn wrap_expressions(nodes: Vec<Node>, raw_text: bool) -> Vec<Node> {
    nodes
        .into_iter()
        .map(|node| match node {
            Node::Text(ref text) if has_expressions(text) => {
                let mut group = Element::transparent(vec![node.clone()]);
                group.hook = Some(if raw_text {
                    RenderHook::interpolate_raw()
                } else {
                    RenderHook::interpolate()
                });
                Node::element(group)
            }
            other => other,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
