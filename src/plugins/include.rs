//! `<include src="...">` expansion.

use super::{Plugin, Visit, transform};
use crate::expr::Context;
use crate::markup::{Element, Node};
use crate::render::{RenderContext, RenderError};
use crate::route::{Roots, resolve_source};
use quick_xml::escape::unescape;
use std::path::Path;

pub const INCLUDE_TAG: &str = "include";
pub const INCLUDE_SRC: &str = "src";
pub const MAX_INCLUDE_DEPTH: usize = 16;

/// Replaces each `<include>` with the parsed document it names.
///
/// Sources are resolved relative to the including file (or the client root
/// when they start with `/`) and must stay under the client root. Included
/// documents may include others, up to [`MAX_INCLUDE_DEPTH`] levels.
pub struct Include;

impl Plugin for Include {
    fn name(&self) -> &'static str {
        "include"
    }

    fn apply(
        &self,
        tree: Vec<Node>,
        ctx: &mut RenderContext,
        _locals: &mut Context,
    ) -> Result<Vec<Node>, RenderError> {
        let from = ctx.file.clone();
        expand(&tree, &from, 0, ctx)
    }
}

fn expand(
    nodes: &[Node],
    from: &Path,
    depth: usize,
    ctx: &mut RenderContext,
) -> Result<Vec<Node>, RenderError> {
    let site = ctx.site.clone();
    let roots = Roots::of(&site);

    transform(nodes, &mut |element: &Element| -> Result<Visit, RenderError> {
        if !element.is(INCLUDE_TAG) {
            return Ok(Visit::Descend);
        }
        let src = element
            .attr(INCLUDE_SRC)
            .ok_or(RenderError::MissingAttribute(INCLUDE_TAG, INCLUDE_SRC))?;
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(RenderError::TooDeep {
                kind: INCLUDE_TAG,
                limit: MAX_INCLUDE_DEPTH,
                path: from.to_path_buf(),
            });
        }

        let src = unescape(src).unwrap_or(src.into());
        let file = resolve_source(roots, &src, Some(from))?;
        let included = ctx.load(&file)?;
        Ok(Visit::Replace(expand(&included, &file, depth + 1, ctx)?))
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

    fn run(site: SiteConfig, page: &str) -> Result<String, RenderError> {
        let file = site.paths.client.join(page);
        let source = fs::read_to_string(&file).unwrap();
        let mut ctx = context_for(site, &file, "/");
        let tree = Include.apply(parse(&source).unwrap(), &mut ctx, &mut Context::standard())?;
        Ok(to_html(&tree))
    }

    #[test]
    fn test_nested_relative_includes() {
        let (_dir, site) = client(&[
            ("blog/post.html", r#"<main><include src="_card.html" /></main>"#),
            ("blog/_card.html", r#"<div><include src="../shared/_icon.html" /></div>"#),
            ("shared/_icon.html", "<i>*</i>"),
        ]);
        assert_eq!(run(site, "blog/post.html").unwrap(), "<main><div><i>*</i></div></main>");
    }

    #[test]
    fn test_absolute_include() {
        let (_dir, site) = client(&[
            ("a/b/page.html", r#"<include src="/_nav.html"></include>"#),
            ("_nav.html", "<nav></nav>"),
        ]);
        assert_eq!(run(site, "a/b/page.html").unwrap(), "<nav></nav>");
    }

    #[test]
    fn test_include_errors() {
        let (_dir, site) = client(&[
            ("missing.html", r#"<include src="_none.html" />"#),
            ("escape.html", r#"<include src="../../secret.html" />"#),
            ("nosrc.html", "<include />"),
            ("loop.html", r#"<include src="_self.html" />"#),
            ("_self.html", r#"<include src="_self.html" />"#),
        ]);

        assert!(matches!(run(site.clone(), "missing.html"), Err(RenderError::Io(..))));
        assert!(matches!(run(site.clone(), "escape.html"), Err(RenderError::Access(_))));
        assert!(matches!(
            run(site.clone(), "nosrc.html"),
            Err(RenderError::MissingAttribute("include", "src"))
        ));
        assert!(matches!(
            run(site, "loop.html"),
            Err(RenderError::TooDeep { kind: "include", .. })
        ));
    }
}
