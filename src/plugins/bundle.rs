//! `<script bundle>` / `<link bundle>` rewriting.

use super::{Plugin, Visit, transform};
use crate::bundle::{BundleKind, register};
use crate::expr::Context;
use crate::markup::{Element, Node};
use crate::render::{RenderContext, RenderError};
use crate::route::{AccessError, Roots, resolve_asset};
use quick_xml::escape::{escape, unescape};

pub const BUNDLE_ATTR: &str = "bundle";

/// Points bundle references at their served URL and registers the sources.
///
/// `<script bundle="app.js">` becomes `<script src="/js/app.js">` when the
/// page lives in `client/js/`; the resolved source is recorded so the
/// router compiles it when that URL is requested.
pub struct BundleRefs;

impl Plugin for BundleRefs {
    fn name(&self) -> &'static str {
        "bundle"
    }

    fn apply(
        &self,
        tree: Vec<Node>,
        ctx: &mut RenderContext,
        _locals: &mut Context,
    ) -> Result<Vec<Node>, RenderError> {
        let roots = Roots::of(&ctx.site);
        transform(&tree, &mut |element: &Element| -> Result<Visit, RenderError> {
            let (url_attr, kind) = if element.is("script") {
                ("src", BundleKind::Script)
            } else if element.is("link") {
                ("href", BundleKind::Style)
            } else {
                return Ok(Visit::Descend);
            };
            let Some(reference) = element.attr(BUNDLE_ATTR) else {
                return Ok(Visit::Descend);
            };

            let reference = unescape(reference).unwrap_or(reference.into());
            let file = resolve_asset(roots, &reference, Some(&ctx.file))?;
            let url = roots
                .url(&file)
                .ok_or_else(|| AccessError::Denied(file.clone()))?;
            register(&file, kind);

            let mut rewritten: Element = element.clone();
            rewritten.remove_attr(BUNDLE_ATTR);
            rewritten.set_attr(url_attr, escape(&url));
            Ok(Visit::Replace(vec![Node::element(rewritten)]))
        })
    }
}
