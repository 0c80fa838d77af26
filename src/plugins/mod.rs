//! Tree-transform stages applied to every rendered page.
//!
//! ```text
//! Layout ─► [prefix stages] ─► Include ─► Templates ─► Interpolate ─► [postfix stages]
//! ```
//!
//! Each stage takes the whole tree and returns a new one. Nodes a stage does
//! not change are shared with its input; changed nodes are shallow copies.

mod bundle;
mod include;
mod interpolate;
mod layout;
mod template;

pub use bundle::BundleRefs;
pub use include::Include;
pub use interpolate::Interpolate;
pub use layout::Layout;
pub use template::Templates;

use crate::expr::Context;
use crate::markup::{Element, Node};
use crate::render::{RenderContext, RenderError};

pub trait Plugin {
    fn name(&self) -> &'static str;

    fn apply(
        &self,
        tree: Vec<Node>,
        ctx: &mut RenderContext,
        locals: &mut Context,
    ) -> Result<Vec<Node>, RenderError>;
}

/// Ordered stage list for one render.
pub struct Pipeline {
    stages: Vec<Box<dyn Plugin>>,
}

impl Pipeline {
    /// Standard stages around caller-supplied `prefix` and `postfix` stages.
    pub fn new(prefix: Vec<Box<dyn Plugin>>, postfix: Vec<Box<dyn Plugin>>) -> Self {
        let mut stages: Vec<Box<dyn Plugin>> = vec![Box::new(Layout)];
        stages.extend(prefix);
        stages.push(Box::new(Include));
        stages.push(Box::new(Templates));
        stages.push(Box::new(Interpolate));
        stages.extend(postfix);
        Self { stages }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.stages.iter().map(|stage| stage.name())
    }

    pub fn run(
        &self,
        tree: Vec<Node>,
        ctx: &mut RenderContext,
        locals: &mut Context,
    ) -> Result<Vec<Node>, RenderError> {
        self.stages
            .iter()
            .try_fold(tree, |tree, stage| stage.apply(tree, ctx, locals))
    }
}

/// What [`transform`] does with a visited element.
pub enum Visit {
    /// Keep the element and visit its children.
    Descend,
    /// Splice these nodes in place of the element; they are not visited.
    Replace(Vec<Node>),
}

/// Rebuild `nodes`, letting `visit` replace elements depth-first.
pub fn transform<F, E>(nodes: &[Node], visit: &mut F) -> Result<Vec<Node>, E>
where
    F: FnMut(&Element) -> Result<Visit, E>,
{
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Node::Tag(element) = node else {
            out.push(node.clone());
            continue;
        };
        match visit(element)? {
            Visit::Replace(replacement) => out.extend(replacement),
            Visit::Descend => match &element.content {
                Some(content) => {
                    let content = transform(content, visit)?;
                    out.push(Node::element(element.with_content(content)));
                }
                None => out.push(node.clone()),
            },
        }
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::markup::{parse, to_html};
    use std::convert::Infallible;

    struct Upper;

    impl Plugin for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn apply(
            &self,
            tree: Vec<Node>,
            _ctx: &mut RenderContext,
            _locals: &mut Context,
        ) -> Result<Vec<Node>, RenderError> {
            Ok(tree
                .into_iter()
                .map(|node| match node {
                    Node::Text(text) => Node::text(text.to_uppercase()),
                    other => other,
                })
                .collect())
        }
    }

    #[test]
    fn test_stage_order() {
        let pipeline = Pipeline::new(vec![Box::new(BundleRefs)], vec![Box::new(Upper)]);
        let names: Vec<_> = pipeline.names().collect();
        assert_eq!(
            names,
            ["layout", "bundle", "include", "template", "interpolate", "upper"]
        );
    }

    #[test]
    fn test_transform_replaces_and_shares() {
        let tree = parse("<ul><li>a</li><x /><li>b</li></ul><p>keep</p>").unwrap();
        let out = transform(&tree, &mut |el| {
            Ok::<_, Infallible>(if el.is("x") {
                Visit::Replace(vec![Node::text("-")])
            } else {
                Visit::Descend
            })
        })
        .unwrap();

        assert_eq!(to_html(&out), "<ul><li>a</li>-<li>b</li></ul><p>keep</p>");
        assert_eq!(to_html(&tree), "<ul><li>a</li><x /><li>b</li></ul><p>keep</p>");
    }
}
