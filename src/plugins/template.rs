//! Reusable markup fragments.
//!
//! ```html
//! <template name="card">
//!   <div class="card"><h2>{{ attrs.title }}</h2><slot /></div>
//! </template>
//!
//! <card title="{{ post.title }}"><p>{{ post.summary }}</p></card>
//! ```
//!
//! Definitions are removed from the output. Each use becomes the template
//! body, with `<slot />` replaced by the use's children, wrapped in a
//! single-item loop that binds `attrs`. The expansion is therefore evaluated
//! in its own sandboxed scope by the interpolation stage.

use super::{Plugin, Visit, transform};
use crate::expr::Context;
use crate::markup::{AttrValue, Element, Node};
use crate::render::{LOOP_BINDING, LOOP_TAG, RenderContext, RenderError};
use quick_xml::escape::{escape, unescape};
use rustc_hash::FxHashMap;

pub const TEMPLATE_TAG: &str = "template";
pub const TEMPLATE_NAME: &str = "name";
pub const SLOT_TAG: &str = "slot";
pub const MAX_TEMPLATE_DEPTH: usize = 16;

type Definitions = FxHashMap<String, Vec<Node>>;

pub struct Templates;

impl Plugin for Templates {
    fn name(&self) -> &'static str {
        "template"
    }

    fn apply(
        &self,
        tree: Vec<Node>,
        ctx: &mut RenderContext,
        _locals: &mut Context,
    ) -> Result<Vec<Node>, RenderError> {
        let mut definitions = Definitions::default();
        let tree = transform(&tree, &mut |element: &Element| -> Result<Visit, RenderError> {
            if !element.is(TEMPLATE_TAG) {
                return Ok(Visit::Descend);
            }
            let Some(name) = element.attr(TEMPLATE_NAME) else {
                return Ok(Visit::Descend);
            };
            definitions.insert(name.to_ascii_lowercase(), element.children().to_vec());
            Ok(Visit::Replace(Vec::new()))
        })?;

        if definitions.is_empty() {
            return Ok(tree);
        }
        Expander {
            definitions: &definitions,
            ctx: &*ctx,
        }
        .expand(&tree, 0)
    }
}

struct Expander<'a> {
    definitions: &'a Definitions,
    ctx: &'a RenderContext,
}

impl Expander<'_> {
    fn expand(&self, nodes: &[Node], depth: usize) -> Result<Vec<Node>, RenderError> {
        transform(nodes, &mut |element: &Element| -> Result<Visit, RenderError> {
            let Some(body) = element
                .tag
                .as_deref()
                .and_then(|tag| self.definitions.get(&tag.to_ascii_lowercase()))
            else {
                return Ok(Visit::Descend);
            };
            if depth >= MAX_TEMPLATE_DEPTH {
                return Err(RenderError::TooDeep {
                    kind: TEMPLATE_TAG,
                    limit: MAX_TEMPLATE_DEPTH,
                    path: self.ctx.file.clone(),
                });
            }

            let children = self.expand(element.children(), depth + 1)?;
            let filled = transform(body, &mut |el: &Element| -> Result<Visit, RenderError> {
                Ok(if el.is(SLOT_TAG) {
                    Visit::Replace(children.clone())
                } else {
                    Visit::Descend
                })
            })?;
            let expanded = self.expand(&filled, depth + 1)?;

            let mut scope = Element::new(LOOP_TAG);
            scope.set_attr(LOOP_BINDING, escape(&attrs_binding(element)));
            scope.content = Some(expanded);
            Ok(Visit::Replace(vec![Node::element(scope)]))
        })
    }
}

/// `attrs of [{...}]` clause carrying the use site's attributes.
///
/// Literal attributes become string literals; `{{ }}` attributes become
/// string concatenations so they resolve in the caller's scope.
fn attrs_binding(element: &Element) -> String {
    let entries: Vec<String> = element
        .attrs
        .iter()
        .map(|(name, value)| {
            let value = match value {
                AttrValue::Text(raw) => literal(raw),
                AttrValue::Template(raw) => concatenation(raw),
            };
            format!("{}: {value}", json_string(name))
        })
        .collect();
    format!("attrs of [{{{}}}]", entries.join(", "))
}

fn literal(raw: &str) -> String {
    json_string(&unescape(raw).unwrap_or(raw.into()))
}

fn concatenation(raw: &str) -> String {
    let mut parts = vec![String::from("\"\"")];
    let mut rest = raw;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            parts.push(literal(&rest[..start]));
        }
        let after = &rest[start..];
        let (open, close) = if after.starts_with("{{{") {
            ("{{{", "}}}")
        } else {
            ("{{", "}}")
        };
        let Some(len) = after[open.len()..].find(close) else {
            rest = after;
            break;
        };
        let source = &after[open.len()..open.len() + len];
        let source = unescape(source).unwrap_or(source.into());
        parts.push(format!("String(({}) ?? \"\")", source.trim()));
        rest = &after[open.len() + len + close.len()..];
    }

    if !rest.is_empty() {
        parts.push(literal(rest));
    }
    parts.join(" + ")
}

fn json_string(text: &str) -> String {
    serde_json::Value::from(text).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::expr::Value;
    use crate::markup::{parse, to_html};
    use crate::render::context::tests::context_for;
    use crate::render::resolve_interpolations;
    use std::path::Path;

    fn render(source: &str, locals: &mut Context) -> Result<String, RenderError> {
        let mut ctx = context_for(SiteConfig::default(), Path::new("/client/index.html"), "/");
        let tree = Templates.apply(parse(source).unwrap(), &mut ctx, locals)?;
        Ok(to_html(&resolve_interpolations(&tree, locals)?))
    }

    #[test]
    fn test_expand_with_slot_and_attrs() {
        let mut locals = Context::standard();
        let html = render(
            concat!(
                r#"<template name="card"><div class="{{ attrs.kind }}"><slot /></div></template>"#,
                r#"<Card kind="note &amp; tip"><b>hi</b></Card>"#,
            ),
            &mut locals,
        )
        .unwrap();
        assert_eq!(html, r#"<div class="note &amp; tip"><b>hi</b></div>"#);
    }

    #[test]
    fn test_template_attrs_use_caller_scope() {
        let mut locals = Context::standard();
        locals.set(
            "posts",
            Value::Array(vec![Value::from("a\"b"), Value::from("c")]),
        );
        let html = render(
            concat!(
                r#"<template name="item"><li>{{ attrs.label }}</li></template>"#,
                r##"<ul><for let="p of posts"><item label="#{{ p }}!{{ null }}" /></for></ul>"##,
            ),
            &mut locals,
        )
        .unwrap();
        assert_eq!(html, "<ul><li>#a&quot;b!</li><li>#c!</li></ul>");
    }

    #[test]
    fn test_attrs_do_not_leak() {
        let mut locals = Context::standard();
        render(
            r#"<template name="x"><i>{{ attrs.v }}</i></template><x v="1" />"#,
            &mut locals,
        )
        .unwrap();
        assert!(locals.get("attrs").is_none());
    }

    #[test]
    fn test_unnamed_template_is_kept() {
        let mut locals = Context::standard();
        let html = render("<template><p>raw</p></template>", &mut locals).unwrap();
        assert_eq!(html, "<template><p>raw</p></template>");
    }

    #[test]
    fn test_recursive_template() {
        let mut locals = Context::standard();
        let err = render(r#"<template name="r"><r /></template><r />"#, &mut locals).unwrap_err();
        assert!(matches!(err, RenderError::TooDeep { kind: "template", .. }));
    }

    #[test]
    fn test_attrs_binding_clause() {
        let mut el = Element::new("card");
        el.attrs.push(("title".into(), AttrValue::Text("A &lt; B".into())));
        el.attrs.push(("n".into(), AttrValue::Template("x{{ a &gt; 1 }}".into())));
        assert_eq!(
            attrs_binding(&el),
            r#"attrs of [{"title": "A < B", "n": "" + "x" + String((a > 1) ?? "")}]"#
        );
    }
}
