use super::Plugin;
use crate::expr::Context;
use crate::markup::Node;
use crate::render::{RenderContext, RenderError, resolve_interpolations};

/// Final standard stage: resolves every expression and expands loops.
pub struct Interpolate;

impl Plugin for Interpolate {
    fn name(&self) -> &'static str {
        "interpolate"
    }

    fn apply(
        &self,
        tree: Vec<Node>,
        _ctx: &mut RenderContext,
        locals: &mut Context,
    ) -> Result<Vec<Node>, RenderError> {
        resolve_interpolations(&tree, locals)
    }
}
