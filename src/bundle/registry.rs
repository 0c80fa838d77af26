//! Process-wide bundle registry.
//!
//! Rendering a page registers every `<script bundle>` / `<link bundle>` it
//! references; the browser then requests the bundle separately and the
//! router looks the resolved path up here. Entries are single-key
//! replacements that live for the whole process.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    Script,
    Style,
}

static REGISTRY: LazyLock<RwLock<FxHashMap<PathBuf, BundleKind>>> =
    LazyLock::new(|| RwLock::new(FxHashMap::default()));

pub fn register(path: &Path, kind: BundleKind) {
    REGISTRY.write().insert(path.to_path_buf(), kind);
}

pub fn lookup(path: &Path) -> Option<BundleKind> {
    REGISTRY.read().get(path).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_lookup() {
        let script = Path::new("/registry-test/app.js");
        let style = Path::new("/registry-test/site.css");

        assert_eq!(lookup(script), None);
        register(script, BundleKind::Script);
        register(style, BundleKind::Style);
        assert_eq!(lookup(script), Some(BundleKind::Script));
        assert_eq!(lookup(style), Some(BundleKind::Style));

        register(script, BundleKind::Style);
        assert_eq!(lookup(script), Some(BundleKind::Style));
    }
}
