//! Managed-file resolution.

use crate::config::SiteConfig;
use std::path::{Path, PathBuf};

/// Maps a path under the managed-files root to the file to send.
///
/// `preview` carries the `?preview=` query value so an implementation can
/// serve a variant (a resized image, a draft) instead of the original.
pub trait FileResolver: Send + Sync {
    fn resolve(&self, path: &Path, site: &SiteConfig, preview: Option<&str>) -> Option<PathBuf>;
}

/// Serves the file as stored, when it exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectFiles;

impl FileResolver for DirectFiles {
    fn resolve(&self, path: &Path, _site: &SiteConfig, _preview: Option<&str>) -> Option<PathBuf> {
        path.is_file().then(|| path.to_path_buf())
    }
}
