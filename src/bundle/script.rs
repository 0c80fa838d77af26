//! Script bundling.
//!
//! Every request runs the configured bundler; there is no cache layer, so
//! the bundler's own caching (if any) decides the cost of a rebuild.

use crate::config::SiteConfig;
use crate::utils::exec::{self, ExecError};
use std::path::Path;

pub fn bundle_script(config: &SiteConfig, source: &Path) -> Result<String, ExecError> {
    exec::run(
        Some(&config.root),
        &config.bundle.script,
        &[source.as_os_str().to_owned()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_bundle_script_runs_command_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("app.js");
        fs::write(&source, "console.log(1)").unwrap();

        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        config.bundle.script = vec!["cat".into()];

        assert_eq!(bundle_script(&config, &source).unwrap(), "console.log(1)");
        fs::write(&source, "console.log(2)").unwrap();
        assert_eq!(bundle_script(&config, &source).unwrap(), "console.log(2)");
    }

    #[test]
    fn test_bundle_script_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::default();
        config.root = dir.path().to_path_buf();
        config.bundle.script = vec!["cat".into()];

        let err = bundle_script(&config, &dir.path().join("missing.js")).unwrap_err();
        assert!(matches!(err, ExecError::Failed { .. }));
    }
}
