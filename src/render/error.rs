use crate::{expr::ExprError, markup::MarkupError, route::AccessError};
use std::{io, path::PathBuf};
use thiserror::Error;

/// Fatal failure while rendering a page; no partial output is produced.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("<for> tag must have a let=\"...\" attribute")]
    MissingLoopBinding,

    #[error("invalid loop binding `{clause}`: {source}")]
    LoopBinding {
        clause: String,
        #[source]
        source: ExprError,
    },

    #[error(transparent)]
    Expr(#[from] ExprError),

    #[error("{}: {source}", path.display())]
    Markup {
        path: PathBuf,
        #[source]
        source: MarkupError,
    },

    #[error("failed to read {}", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{kind} nesting exceeds {limit} levels at {}", path.display())]
    TooDeep {
        kind: &'static str,
        limit: usize,
        path: PathBuf,
    },

    #[error("<{0}> is missing its `{1}` attribute")]
    MissingAttribute(&'static str, &'static str),
}
