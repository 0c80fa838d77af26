//! Script and style bundles.
//!
//! Pages declare bundles (`<script bundle="app.js">`, `<link bundle="site.css">`);
//! rendering registers the resolved source, and a later request for that
//! path is answered by compiling it through the configured tool.

mod registry;
mod script;
mod style;

pub use registry::{BundleKind, lookup, register};
pub use script::bundle_script;
pub use style::bundle_style;

/// Body served in place of a stylesheet that failed to compile.
pub const STYLE_ERROR_BODY: &str = "!error";
