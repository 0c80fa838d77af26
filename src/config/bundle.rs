//! `[bundle]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[bundle]` section in lancer.toml - external script/style compilers.
///
/// The source file path is appended as the last argument; the compiled
/// output is read from stdout.
///
/// # Example
/// ```toml
/// [bundle]
/// script = ["esbuild", "--bundle", "--minify"]
/// style = ["tailwindcss", "-i"]
/// style_config = "tailwind.config.js"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    #[serde(default = "defaults::bundle::script")]
    #[educe(Default = defaults::bundle::script())]
    pub script: Vec<String>,

    #[serde(default = "defaults::bundle::style")]
    #[educe(Default = defaults::bundle::style())]
    pub style: Vec<String>,

    /// Shared style configuration; touching it invalidates every style bundle.
    #[serde(default = "defaults::bundle::style_config")]
    #[educe(Default = defaults::bundle::style_config())]
    pub style_config: PathBuf,
}
