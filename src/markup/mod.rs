//! Markup tree: parsing, render hooks and serialization.

mod hook;
mod node;
mod parser;
mod serialize;

pub use hook::render as interpolate_text;
pub use node::{AttrValue, Element, Node};
pub use parser::parse;
pub use serialize::to_html;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MarkupError {
    #[error("markup syntax error at offset {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("invalid attribute: {0}")]
    Attribute(String),
}
