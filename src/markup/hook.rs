//! Render hooks and `{{ }}` template text.
//!
//! `{{ expr }}` emits the HTML-escaped value, `{{{ expr }}}` emits it raw.
//! Entities inside the expression (`a &amp;&amp; b`) are decoded before it
//! is evaluated, since the source is stored exactly as written.

use super::node::{AttrValue, Element, Node};
use crate::expr::{ExprError, Value};
use quick_xml::escape::{escape, unescape};
use std::{
    fmt,
    sync::{Arc, LazyLock},
};

/// Evaluator callback handed to a hook: expression source in, value out.
pub type Evaluate<'a> = dyn FnMut(&str) -> Result<Value, ExprError> + 'a;

type HookFn = dyn Fn(&mut Element, &mut Evaluate<'_>) -> Result<(), ExprError> + Send + Sync;

/// Callback that substitutes evaluated values into its own element.
#[derive(Clone)]
pub struct RenderHook(Arc<HookFn>);

static INTERPOLATE: LazyLock<RenderHook> =
    LazyLock::new(|| RenderHook::new(|element, eval| interpolate(element, eval, true)));

static INTERPOLATE_RAW: LazyLock<RenderHook> =
    LazyLock::new(|| RenderHook::new(|element, eval| interpolate(element, eval, false)));

impl RenderHook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Element, &mut Evaluate<'_>) -> Result<(), ExprError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Standard hook: resolves template attributes and escaped child text.
    pub fn interpolate() -> Self {
        INTERPOLATE.clone()
    }

    /// Like [`RenderHook::interpolate`], but child text is not escaped
    /// (`<script>` and `<style>` bodies).
    pub fn interpolate_raw() -> Self {
        INTERPOLATE_RAW.clone()
    }

    pub fn call(&self, element: &mut Element, eval: &mut Evaluate<'_>) -> Result<(), ExprError> {
        (self.0)(element, eval)
    }
}

impl fmt::Debug for RenderHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RenderHook")
    }
}

fn interpolate(element: &mut Element, eval: &mut Evaluate<'_>, escape_text: bool) -> Result<(), ExprError> {
    for (_, value) in element.attrs.iter_mut() {
        if let AttrValue::Template(source) = value {
            *value = AttrValue::Text(render(source, eval, true)?);
        }
    }

    if let Some(content) = element.content.as_mut() {
        for node in content.iter_mut() {
            if let Node::Text(text) = node
                && has_expressions(text)
            {
                *node = Node::text(render(text, eval, escape_text)?);
            }
        }
    }
    Ok(())
}

#[inline]
pub fn has_expressions(text: &str) -> bool {
    text.contains("{{")
}

/// Substitute every `{{ }}` / `{{{ }}}` segment of `text`.
///
/// An opening brace pair without a matching close is kept literally.
pub fn render(text: &str, eval: &mut Evaluate<'_>, escape_output: bool) -> Result<String, ExprError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start..];
        let (open, close, raw) = if after.starts_with("{{{") {
            ("{{{", "}}}", true)
        } else {
            ("{{", "}}", false)
        };

        let Some(len) = after[open.len()..].find(close) else {
            out.push_str(after);
            return Ok(out);
        };

        let source = &after[open.len()..open.len() + len];
        let decoded = unescape(source).unwrap_or(source.into());
        let value = eval(decoded.trim())?.to_output();
        if raw || !escape_output {
            out.push_str(&value);
        } else {
            out.push_str(&escape(&value));
        }
        rest = &after[open.len() + len + close.len()..];
    }

    out.push_str(rest);
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Context;

    fn render_with(text: &str, escape_output: bool) -> Result<String, ExprError> {
        let mut ctx = Context::standard();
        ctx.set("name", Value::from("<b>Ann</b>"));
        ctx.set("n", Value::from(2.0));
        render(text, &mut |src| ctx.eval(src), escape_output)
    }

    #[test]
    fn test_render_escapes_by_default() {
        assert_eq!(
            render_with("Hi {{ name }}!", true).unwrap(),
            "Hi &lt;b&gt;Ann&lt;/b&gt;!"
        );
        assert_eq!(render_with("Hi {{{ name }}}!", true).unwrap(), "Hi <b>Ann</b>!");
        assert_eq!(render_with("{{ name }}", false).unwrap(), "<b>Ann</b>");
    }

    #[test]
    fn test_render_decodes_entities_in_source() {
        assert_eq!(render_with("{{ n &gt; 1 &amp;&amp; 'big' }}", true).unwrap(), "big");
    }

    #[test]
    fn test_render_nullish_and_unclosed() {
        assert_eq!(render_with("[{{ null }}]", true).unwrap(), "[]");
        assert_eq!(render_with("a {{ n", true).unwrap(), "a {{ n");
    }

    #[test]
    fn test_render_propagates_errors() {
        assert!(matches!(
            render_with("{{ missing }}", true),
            Err(ExprError::Reference(_))
        ));
    }

    #[test]
    fn test_interpolate_hook() {
        let mut el = Element::new("a");
        el.attrs.push(("href".into(), AttrValue::Template("/p/{{ n }}".into())));
        el.content = Some(vec![Node::text("#{{ n + 1 }}")]);

        let mut ctx = Context::standard();
        ctx.set("n", Value::from(2.0));
        RenderHook::interpolate()
            .call(&mut el, &mut |src| ctx.eval(src))
            .unwrap();

        assert_eq!(el.attr("href"), Some("/p/2"));
        assert!(matches!(&el.children()[0], Node::Text(t) if &**t == "#3"));
    }
}
