//! `<page>` attributes and layout composition.
//!
//! ```html
//! <page layout="_layouts/main.html" title="About" />
//! <h1>About</h1>
//! ```
//!
//! The leading `<page>` element is removed and its attributes are merged
//! into the `page` local (keys already present win). When it names a
//! layout, the layout document replaces the page and the page's nodes take
//! the place of the layout's `<page-content />`. Layouts may declare their
//! own `<page layout>` to nest further.

use super::include::{INCLUDE_SRC, INCLUDE_TAG};
use super::{Plugin, Visit, transform};
use crate::expr::{Context, Object, Value};
use crate::markup::{AttrValue, Element, Node, interpolate_text};
use crate::render::{RenderContext, RenderError};
use crate::route::{Roots, resolve_source};
use quick_xml::escape::{escape, unescape};
use std::path::Path;

pub const PAGE_TAG: &str = "page";
pub const LAYOUT_ATTR: &str = "layout";
pub const CONTENT_TAG: &str = "page-content";
pub const MAX_LAYOUT_DEPTH: usize = 8;

pub struct Layout;

impl Plugin for Layout {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn apply(
        &self,
        mut tree: Vec<Node>,
        ctx: &mut RenderContext,
        locals: &mut Context,
    ) -> Result<Vec<Node>, RenderError> {
        let site = ctx.site.clone();
        let roots = Roots::of(&site);
        let mut from = ctx.file.clone();

        for _ in 0..=MAX_LAYOUT_DEPTH {
            let Some((page, body)) = split_page(&tree) else {
                return Ok(tree);
            };
            merge_page_attrs(&page, locals)?;

            let Some(layout) = page.attr(LAYOUT_ATTR) else {
                return Ok(body);
            };
            let layout = unescape(layout).unwrap_or(layout.into());
            let file = resolve_source(roots, &layout, Some(&from))?;
            let frame = anchor_references(&ctx.load(&file)?, &file, roots)?;

            tree = transform(&frame, &mut |element: &Element| -> Result<Visit, RenderError> {
                Ok(if element.is(CONTENT_TAG) {
                    Visit::Replace(body.clone())
                } else {
                    Visit::Descend
                })
            })?;
            from = file;
        }

        Err(RenderError::TooDeep {
            kind: LAYOUT_ATTR,
            limit: MAX_LAYOUT_DEPTH,
            path: from,
        })
    }
}

/// The leading `<page>` element and the nodes it frames.
///
/// Whitespace before `<page>` is dropped; an unclosed `<page ...>` swallows
/// the rest of the document, so its children count as page body too.
fn split_page(tree: &[Node]) -> Option<(&Element, Vec<Node>)> {
    let index = tree
        .iter()
        .position(|node| !matches!(node, Node::Text(text) if text.trim().is_empty()))?;
    let page = tree[index].as_element().filter(|el| el.is(PAGE_TAG))?;

    let mut body = page.children().to_vec();
    body.extend_from_slice(&tree[index + 1..]);
    Some((page, body))
}

fn merge_page_attrs(page: &Element, locals: &mut Context) -> Result<(), RenderError> {
    let mut attrs = Vec::with_capacity(page.attrs.len());
    for (name, value) in &page.attrs {
        let text = match value {
            AttrValue::Text(raw) => unescape(raw).map_or_else(|_| raw.clone(), |t| t.into_owned()),
            AttrValue::Template(raw) => {
                interpolate_text(raw, &mut |source: &str| locals.eval(source), false)?
            }
        };
        attrs.push((name.to_string(), Value::from(text)));
    }

    let mut merged = match locals.get(PAGE_TAG) {
        Some(Value::Object(existing)) => existing.clone(),
        _ => Object::new(),
    };
    for (name, value) in attrs {
        merged.entry(name).or_insert(value);
    }
    locals.set(PAGE_TAG, Value::Object(merged));
    Ok(())
}

/// Rewrite relative include and bundle references of a layout so they
/// resolve from the layout's directory once spliced into the page.
fn anchor_references(
    nodes: &[Node],
    layout: &Path,
    roots: Roots<'_>,
) -> Result<Vec<Node>, RenderError> {
    transform(nodes, &mut |element: &Element| -> Result<Visit, RenderError> {
        let attr = if element.is(INCLUDE_TAG) {
            INCLUDE_SRC
        } else if element.is("script") || element.is("link") {
            super::bundle::BUNDLE_ATTR
        } else {
            return Ok(Visit::Descend);
        };
        let Some(reference) = element.attr(attr).filter(|r| !r.starts_with('/')) else {
            return Ok(Visit::Descend);
        };

        let reference = unescape(reference).unwrap_or(reference.into());
        let file = resolve_source(roots, &reference, Some(layout))?;
        let Some(logical) = roots.logical(&file) else {
            return Ok(Visit::Descend);
        };

        let mut anchored = element.clone();
        anchored.set_attr(attr, escape(&logical));
        Ok(Visit::Replace(vec![Node::element(anchored)]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::markup::{parse, to_html};
    use crate::render::context::tests::context_for;
    use std::fs;
    use tempfile::TempDir;

    fn client(files: &[(&str, &str)]) -> (TempDir, SiteConfig) {
        let dir = tempfile::tempdir().unwrap();
        for (rel, content) in files {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
        let mut site = SiteConfig::default();
        site.paths.client = dir.path().to_path_buf();
        (dir, site)
    }

    fn run(site: SiteConfig, page: &str) -> Result<(String, Context), RenderError> {
        let file = site.paths.client.join(page);
        let source = fs::read_to_string(&file).unwrap();
        let mut ctx = context_for(site, &file, "/");
        let mut locals = Context::standard();
        locals.set("page", Value::object([("path", Value::from("/about"))]));
        let tree = Layout.apply(parse(&source).unwrap(), &mut ctx, &mut locals)?;
        Ok((to_html(&tree), locals))
    }

    #[test]
    fn test_page_without_layout() {
        let (_dir, site) = client(&[(
            "about.html",
            "\n<page title=\"About &amp; Us\" path=\"/ignored\" />\n<h1>About</h1>",
        )]);
        let (html, mut locals) = run(site, "about.html").unwrap();
        assert_eq!(html, "\n<h1>About</h1>");
        assert_eq!(locals.eval("page.title").unwrap().to_display(), "About & Us");
        assert_eq!(locals.eval("page.path").unwrap().to_display(), "/about");
    }

    #[test]
    fn test_no_page_element_is_untouched() {
        let (_dir, site) = client(&[("plain.html", "<h1>x</h1><page />")]);
        assert_eq!(run(site, "plain.html").unwrap().0, "<h1>x</h1><page />");
    }

    #[test]
    fn test_nested_layouts() {
        let (_dir, site) = client(&[
            ("about.html", r#"<page layout="_layouts/inner.html" title="About" /><p>hi</p>"#),
            (
                "_layouts/inner.html",
                r#"<page layout="_outer.html" section="docs" /><article><page-content /></article>"#,
            ),
            (
                "_layouts/_outer.html",
                r#"<html><include src="_head.html" /><body><page-content /></body></html>"#,
            ),
        ]);
        let (html, mut locals) = run(site, "about.html").unwrap();
        assert_eq!(
            html,
            r#"<html><include src="/_layouts/_head.html" /><body><article><p>hi</p></article></body></html>"#
        );
        assert_eq!(locals.eval("page.section").unwrap().to_display(), "docs");
        assert_eq!(locals.eval("page.title").unwrap().to_display(), "About");
    }

    #[test]
    fn test_template_page_attribute() {
        let (_dir, site) = client(&[("a.html", r#"<page title="{{ 'A' + 'B' }}" />"#)]);
        let (_, mut locals) = run(site, "a.html").unwrap();
        assert_eq!(locals.eval("page.title").unwrap().to_display(), "AB");
    }

    #[test]
    fn test_layout_cycle() {
        let (_dir, site) = client(&[
            ("a.html", r#"<page layout="_l.html" />"#),
            ("_l.html", r#"<page layout="_l.html" /><page-content />"#),
        ]);
        assert!(matches!(
            run(site, "a.html"),
            Err(RenderError::TooDeep { kind: "layout", .. })
        ));
    }
}
