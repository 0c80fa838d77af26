//! Sandboxed expression language used by `{{ ... }}` interpolation and loops.
//!
//! ```text
//! source ──► lexer ──► parser ──► Expr ──► Context::evaluate ──► Value
//!                                              │
//!                                   scope (page data) + Builtins
//! ```
//!
//! Expressions see only the names in their [`Context`]: the page locals and
//! a fixed table of [`Builtins`]. There is no way to reach the host process.

mod builtins;
mod context;
mod eval;
mod lexer;
mod parser;
mod value;

pub use builtins::Builtins;
pub use context::Context;
pub use parser::{LoopBinding, Pattern, parse, parse_binding};
pub use value::{Object, Value};

use thiserror::Error;

/// Failure while parsing or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("SyntaxError at offset {pos}: {message}")]
    Syntax { pos: usize, message: String },

    #[error("ReferenceError: {0} is not defined")]
    Reference(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("RangeError: {0}")]
    Range(String),
}

impl ExprError {
    pub fn syntax(pos: usize, message: impl Into<String>) -> Self {
        Self::Syntax { pos, message: message.into() }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::Range(message.into())
    }
}
