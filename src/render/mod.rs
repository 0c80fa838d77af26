//! Page rendering.
//!
//! ```text
//! markup ─► parse ─► find <script server> ─► Pipeline(layout, bundle, include,
//!        template, interpolate) ─► strip <script server> ─► HTML
//! ```
//!
//! Data-submission requests (POST, PUT, PATCH, DELETE) are only rendered by
//! pages carrying the server marker in their own source. The marker is looked
//! up before the pipeline runs; for any other page nothing is evaluated and
//! the caller falls through to its next handler.

pub(crate) mod context;
mod error;
mod glob;
mod interpolate;
mod locals;

pub use context::RenderContext;
pub use error::RenderError;
pub use interpolate::{LOOP_BINDING, LOOP_TAG, resolve_interpolations};
pub use locals::make_locals;

use crate::markup::{self, Element, Node};
use crate::plugins::{BundleRefs, Pipeline, Visit, transform};
use std::convert::Infallible;

/// Marks a page as handling data submissions: `<script server>`.
pub const SERVER_MARKER: &str = "server";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub is_server_rendered: bool,
    pub html: String,
}

impl Rendered {
    fn fall_through() -> Self {
        Self {
            is_server_rendered: false,
            html: String::new(),
        }
    }
}

/// Render `html`, the content of `ctx.file`.
pub fn render(html: &str, ctx: &mut RenderContext) -> Result<Rendered, RenderError> {
    let tree = markup::parse(html).map_err(|source| RenderError::Markup {
        path: ctx.file.clone(),
        source,
    })?;

    let is_server_rendered = has_server_marker(&tree);
    if ctx.is_data_submission() && !is_server_rendered {
        return Ok(Rendered::fall_through());
    }

    let mut locals = make_locals(ctx);
    let pipeline = Pipeline::new(vec![Box::new(BundleRefs)], Vec::new());
    let tree = pipeline.run(tree, ctx, &mut locals)?;
    let tree = strip_server_marker(&tree);

    Ok(Rendered {
        is_server_rendered,
        html: markup::to_html(&tree),
    })
}

#[inline]
fn is_server_marker(element: &Element) -> bool {
    element.is("script") && element.has_attr(SERVER_MARKER)
}

fn has_server_marker(nodes: &[Node]) -> bool {
    nodes.iter().any(|node| match node {
        Node::Tag(element) => is_server_marker(element) || has_server_marker(element.children()),
        Node::Text(_) => false,
    })
}

/// Remove every marker, including ones pulled in by layouts and includes.
fn strip_server_marker(tree: &[Node]) -> Vec<Node> {
    let stripped = transform(tree, &mut |element: &Element| -> Result<Visit, Infallible> {
        if is_server_marker(element) {
            return Ok(Visit::Replace(Vec::new()));
        }
        Ok(Visit::Descend)
    });
    match stripped {
        Ok(tree) => tree,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::context::tests::context_for;
    use super::*;
    use crate::config::SiteConfig;
    use std::{fs, path::Path};
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
        site.site.name = "Acme".into();
        (dir, site)
    }

    fn render_page(site: SiteConfig, page: &str, method: &str) -> Result<Rendered, RenderError> {
        let file = site.paths.client.join(page);
        let source = fs::read_to_string(&file).unwrap();
        let mut ctx = context_for(site, &file, "/about").with_method(method);
        render(&source, &mut ctx)
    }

    #[test]
    fn test_full_pipeline() {
        let (_dir, site) = client(&[
            (
                "about.html",
                concat!(
                    r#"<page layout="_layouts/main.html" title="About" />"#,
                    r#"<template name="tag"><em>{{ attrs.label }}</em></template>"#,
                    r#"<for let="t of ['a', 'b']"><tag label="{{ t }}" /></for>"#,
                ),
            ),
            (
                "_layouts/main.html",
                concat!(
                    r#"<title>{{ page.title }} | {{ site.name }}</title>"#,
                    r#"<include src="_nav.html" /><main><page-content /></main>"#,
                ),
            ),
            ("_layouts/_nav.html", r#"<nav>{{ page.path }}</nav>"#),
        ]);

        let rendered = render_page(site, "about.html", "GET").unwrap();
        assert!(!rendered.is_server_rendered);
        assert_eq!(
            rendered.html,
            "<title>About | Acme</title><nav>/about</nav><main><em>a</em><em>b</em></main>"
        );
    }

    #[test]
    fn test_loop_bindings_stay_inside_loop() {
        let (_dir, site) = client(&[(
            "a.html",
            r#"<for let="x of [1, 2]">{{ x }}</for>[{{ typeof x }}]"#,
        )]);
        let rendered = render_page(site, "a.html", "GET").unwrap();
        assert_eq!(rendered.html, "12[undefined]");
    }

    #[test]
    fn test_post_without_marker_falls_through() {
        let (_dir, site) = client(&[("a.html", "<p>form</p>")]);
        let rendered = render_page(site, "a.html", "POST").unwrap();
        assert_eq!(rendered, Rendered::fall_through());
    }

    #[test]
    fn test_post_with_marker() {
        let (_dir, site) = client(&[
            (
                "a.html",
                r#"<div><script server>save()</script></div><include src="_handler.html" /><p>{{ request.method }}</p>"#,
            ),
            ("_handler.html", "<script server>log()</script><i>saved</i>"),
        ]);
        let rendered = render_page(site, "a.html", "POST").unwrap();
        assert!(rendered.is_server_rendered);
        assert_eq!(rendered.html, "<div></div><i>saved</i><p>POST</p>");
    }

    #[test]
    fn test_post_falls_through_before_pipeline() {
        // the pipeline would fail on both the missing include and the expression
        let (_dir, site) = client(&[
            ("a.html", r#"<include src="_gone.html" />{{ missing.field }}"#),
            ("b.html", "<include src=\"_handler.html\" />"),
            ("_handler.html", "<script server>save()</script>"),
        ]);
        let rendered = render_page(site.clone(), "a.html", "POST").unwrap();
        assert_eq!(rendered, Rendered::fall_through());

        // a marker only reachable through an include does not count
        let rendered = render_page(site, "b.html", "POST").unwrap();
        assert_eq!(rendered, Rendered::fall_through());
    }

    #[test]
    fn test_expression_error_is_fatal() {
        let (_dir, site) = client(&[("a.html", "<p>ok</p>{{ missing.field }}")]);
        assert!(matches!(
            render_page(site, "a.html", "GET"),
            Err(RenderError::Expr(_))
        ));
    }

    #[test]
    fn test_markup_error_names_file() {
        let file = Path::new("/client/broken.html");
        let mut ctx = context_for(SiteConfig::default(), file, "/broken");
        match render("<p><!-- unclosed", &mut ctx) {
            Err(RenderError::Markup { path, .. }) => assert_eq!(path, file),
            other => panic!("expected markup error, got {other:?}"),
        }
    }
}
