//! `[paths]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[paths]` section in lancer.toml.
///
/// Relative paths are resolved against the project root when the config is
/// loaded, so every field is absolute afterwards.
///
/// # Example
/// ```toml
/// [paths]
/// client = "src/client"
/// files = "~/uploads"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct PathsConfig {
    /// Client source root: pages, partials, scripts and styles.
    #[serde(default = "defaults::paths::client")]
    #[educe(Default = defaults::paths::client())]
    pub client: PathBuf,

    /// Managed files root, served under `/files/`.
    #[serde(default = "defaults::paths::files")]
    #[educe(Default = defaults::paths::files())]
    pub files: PathBuf,

    /// Public static directory, served as-is.
    #[serde(default = "defaults::paths::r#static")]
    #[educe(Default = defaults::paths::r#static())]
    pub r#static: PathBuf,

    /// Production artifacts (`rewrites.json`, prebuilt assets).
    #[serde(default = "defaults::paths::build")]
    #[educe(Default = defaults::paths::build())]
    pub build: PathBuf,
}

impl PathsConfig {
    /// Location of the persisted rewrite table.
    pub fn rewrites_file(&self) -> PathBuf {
        self.build.join("rewrites.json")
    }
}
