//! Interpolation engine.
//!
//! Walks a tree depth-first and resolves every expression against a context:
//!
//! ```text
//! text node            ──► unchanged
//! node with hook       ──► copy, hook(copy, eval) substitutes its values
//! <for let="x of xs">  ──► per item: sandbox(ctx) + bind x ──► resolve body
//!                          └─► one transparent node holding all iterations
//! <for ... />          ──► unchanged, never evaluated
//! node with content    ──► shallow copy with resolved content
//! anything else        ──► unchanged (shared)
//! ```
//!
//! Each loop iteration runs against its own deep copy of the enclosing
//! context, so bindings and assignments never leak between iterations or back
//! into the outer scope.

use super::RenderError;
use crate::{
    expr::{Context, parse_binding},
    markup::{Element, Node},
};
use quick_xml::escape::unescape;

/// Tag that expands its content once per item.
pub const LOOP_TAG: &str = "for";
/// Attribute holding the `<pattern> of <expression>` clause.
pub const LOOP_BINDING: &str = "let";

/// Resolve all expressions in `nodes` against `ctx`.
pub fn resolve_interpolations(nodes: &[Node], ctx: &mut Context) -> Result<Vec<Node>, RenderError> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Node::Tag(original) = node else {
            out.push(node.clone());
            continue;
        };

        let hooked = match &original.hook {
            Some(hook) => {
                let mut copy = Element::clone(original);
                copy.hook = None;
                hook.call(&mut copy, &mut |source| ctx.eval(source))?;
                Some(copy)
            }
            None => None,
        };
        let element: &Element = hooked.as_ref().unwrap_or(&**original);

        let resolved = if element.is(LOOP_TAG) && element.content.is_some() {
            expand_loop(element, ctx)?
        } else if let Some(content) = &element.content {
            Node::element(element.with_content(resolve_interpolations(content, ctx)?))
        } else if hooked.is_some() {
            Node::element(element.clone())
        } else {
            node.clone()
        };
        out.push(resolved);
    }
    Ok(out)
}

fn expand_loop(element: &Element, ctx: &mut Context) -> Result<Node, RenderError> {
    let raw = element.attr(LOOP_BINDING).ok_or(RenderError::MissingLoopBinding)?;
    let clause = unescape(raw).unwrap_or(raw.into());
    let binding = parse_binding(&clause).map_err(|source| RenderError::LoopBinding {
        clause: clause.to_string(),
        source,
    })?;

    let items = ctx.iterate(&binding)?;
    let body = element.children();
    let mut expanded = Vec::with_capacity(items.len() * body.len());
    for item in items {
        let mut scope = ctx.sandbox();
        scope.bind(&binding.pattern, item)?;
        expanded.extend(resolve_interpolations(body, &mut scope)?);
    }
    Ok(Node::group(expanded))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        expr::{ExprError, Value},
        markup::{parse, to_html},
    };

    fn render(src: &str, ctx: &mut Context) -> Result<String, RenderError> {
        let nodes = parse(src).unwrap();
        resolve_interpolations(&nodes, ctx).map(|nodes| to_html(&nodes))
    }

    fn ctx() -> Context {
        let mut ctx = Context::standard();
        ctx.set("title", Value::from("Home"));
        ctx.set("posts", Value::from(vec!["a", "b", "c"]));
        ctx
    }

    #[test]
    fn test_plain_tree_is_structural_copy() {
        let nodes = parse("<main><p class=\"x\">hi</p><br></main>").unwrap();
        let out = resolve_interpolations(&nodes, &mut ctx()).unwrap();
        assert_eq!(to_html(&out), to_html(&nodes));
    }

    #[test]
    fn test_text_and_attribute_substitution() {
        let html = render("<h1 title=\"{{ title }}!\">{{ title.toUpperCase() }}</h1>", &mut ctx()).unwrap();
        assert_eq!(html, "<h1 title=\"Home!\">HOME</h1>");
    }

    #[test]
    fn test_loop_expansion_order() {
        let html = render(
            "<ul><for let=\"post of posts\"><li>{{ post }}</li></for></ul>",
            &mut ctx(),
        )
        .unwrap();
        assert_eq!(html, "<ul><li>a</li><li>b</li><li>c</li></ul>");
    }

    #[test]
    fn test_loop_iterations_are_isolated() {
        let mut ctx = ctx();
        ctx.set("n", Value::from(0.0));
        let html = render(
            "<for let=\"post of posts\">{{ n += 1 }}:{{ title = post }} </for>{{ n }} {{ title }}",
            &mut ctx,
        )
        .unwrap();
        // every iteration starts from the outer n = 0; outer scope untouched
        assert_eq!(html, "1:a 1:b 1:c 0 Home");
    }

    #[test]
    fn test_nested_loops_with_destructuring() {
        let mut ctx = Context::standard();
        ctx.set(
            "groups",
            Value::object([
                ("x", Value::from(vec!["1", "2"])),
                ("y", Value::from(vec!["3"])),
            ]),
        );
        let html = render(
            "<for let=\"[name, items] of Object.entries(groups)\">{{ name }}=<for let=\"i of items\">{{ i }}</for>;</for>",
            &mut ctx,
        )
        .unwrap();
        assert_eq!(html, "x=12;y=3;");
    }

    #[test]
    fn test_loop_requires_binding() {
        let err = render("<for><p>x</p></for>", &mut ctx()).unwrap_err();
        assert!(matches!(err, RenderError::MissingLoopBinding));

        let err = render("<for let=\"posts\"><p>x</p></for>", &mut ctx()).unwrap_err();
        assert!(matches!(err, RenderError::LoopBinding { .. }));
    }

    #[test]
    fn test_self_closing_loop_is_left_alone() {
        let html = render("<ul><for let=\"p of missing\" /></ul>", &mut ctx()).unwrap();
        assert_eq!(html, "<ul><for let=\"p of missing\" /></ul>");
        assert_eq!(render("<for />", &mut ctx()).unwrap(), "<for />");

        // an explicit empty body still runs the loop
        let err = render("<for let=\"p of missing\"></for>", &mut ctx()).unwrap_err();
        assert!(matches!(err, RenderError::Expr(ExprError::Reference(_))));
    }

    #[test]
    fn test_expression_errors_are_fatal() {
        let err = render("<p>{{ page.title }}</p>", &mut ctx()).unwrap_err();
        assert!(matches!(err, RenderError::Expr(ExprError::Reference(_))));

        let mut ctx = ctx();
        ctx.set("page", Value::Null);
        assert!(render("<p>{{ page.title }}</p>", &mut ctx).is_err());
        assert_eq!(render("<p>{{ page?.title }}</p>", &mut ctx).unwrap(), "<p></p>");
    }

    #[test]
    fn test_source_tree_is_reusable() {
        let nodes = parse("<for let=\"p of posts\"><b>{{ p }}</b></for>").unwrap();
        let first = resolve_interpolations(&nodes, &mut ctx()).unwrap();
        let mut other = ctx();
        other.set("posts", Value::from(vec!["z"]));
        let second = resolve_interpolations(&nodes, &mut other).unwrap();
        assert_eq!(to_html(&first), "<b>a</b><b>b</b><b>c</b>");
        assert_eq!(to_html(&second), "<b>z</b>");
    }
}
