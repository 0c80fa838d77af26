//! Site configuration management for `lancer.toml`.
//!
//! # Sections
//!
//! | Section      | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `[site]`     | Site name, locales, extra template locals       |
//! | `[paths]`    | Client, managed files, static and build roots   |
//! | `[serve]`    | HTTP server (interface, port, workers, mode)    |
//! | `[bundle]`   | Script bundler and style processor commands     |
//! | `[rewrites]` | Ordered URL pattern → page rewrites             |
//!
//! # Example
//!
//! ```toml
//! [site]
//! name = "Acme"
//! locales = ["en", "de"]
//!
//! [serve]
//! port = 5400
//!
//! [rewrites]
//! "/posts/:slug" = "/posts/_post.html"
//! "/docs/*" = "/docs/viewer.html"
//! ```

mod bundle;
pub mod defaults;
mod error;
mod handle;
mod paths;
mod serve;
mod site;

pub use error::ConfigError;
pub use handle::{cfg, init_config, reload_config};
pub use serve::Mode;

use bundle::BundleConfig;
use paths::PathsConfig;
use serve::ServeConfig;
use site::SiteSection;

use crate::cli::{Cli, Commands};
use crate::log;
use anyhow::{Context, Result, bail};
use educe::Educe;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing lancer.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// CLI arguments reference
    #[serde(skip)]
    pub cli: Option<&'static Cli>,

    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Absolute project root (set after loading)
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub site: SiteSection,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    #[serde(default)]
    pub bundle: BundleConfig,

    /// URL pattern → logical page path, tried in declaration order.
    #[serde(default)]
    pub rewrites: IndexMap<String, String>,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load, resolve and validate the config selected by the CLI.
    ///
    /// A missing config file is not an error: every section has defaults.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let root = cli.root.as_deref().unwrap_or(Path::new("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)?
        } else {
            Self::default()
        };
        config.update_with_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Get CLI arguments reference
    pub fn get_cli(&self) -> Option<&'static Cli> {
        self.cli
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &'static Cli) {
        self.cli = Some(cli);

        let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("./"));
        self.resolve_paths(&root, &cli.config);

        if let Commands::Serve {
            interface,
            port,
            production,
        } = &cli.command
        {
            Self::update_option(&mut self.serve.interface, interface.as_ref());
            Self::update_option(&mut self.serve.port, port.as_ref());
            if *production {
                self.serve.mode = Mode::Production;
            }
        }
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Make the root and every configured directory absolute.
    fn resolve_paths(&mut self, root: &Path, config_file: &Path) {
        let root = Self::normalize_path(root);
        self.config_path = Self::normalize_path(&root.join(config_file));

        self.paths.client = Self::resolve(&root, &self.paths.client);
        self.paths.files = Self::resolve(&root, &self.paths.files);
        self.paths.r#static = Self::resolve(&root, &self.paths.r#static);
        self.paths.build = Self::resolve(&root, &self.paths.build);
        self.bundle.style_config = Self::resolve(&root, &self.bundle.style_config);
        self.root = root;
    }

    /// Expand `~` and anchor relative paths at `root`.
    fn resolve(root: &Path, path: &Path) -> PathBuf {
        let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned());
        if expanded.is_relative() {
            Self::normalize_path(&root.join(expanded))
        } else {
            Self::normalize_path(&expanded)
        }
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            // For non-existent paths, manually make them absolute
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration for the current command
    pub fn validate(&self) -> Result<()> {
        if self.site.locales.is_empty() {
            bail!(ConfigError::Validation(
                "[site.locales] must have at least one element".into()
            ));
        }

        if self.serve.workers == 0 {
            bail!(ConfigError::Validation(
                "[serve.workers] must be at least 1".into()
            ));
        }

        Self::check_command("[bundle.script]", &self.bundle.script)?;
        Self::check_command("[bundle.style]", &self.bundle.style)?;

        for (pattern, target) in &self.rewrites {
            if target.trim().is_empty() {
                bail!(ConfigError::Validation(format!(
                    "[rewrites] `{pattern}` has an empty target"
                )));
            }
        }

        if let Some(Commands::Serve { .. }) = self.cli.map(|cli| &cli.command)
            && !self.paths.client.is_dir()
        {
            bail!(ConfigError::Validation(format!(
                "[paths.client] `{}` is not a directory",
                self.paths.client.display()
            )));
        }

        Ok(())
    }

    /// Commands must be non-empty; a missing executable only warns, since
    /// sites without bundles never invoke it.
    fn check_command(field: &str, command: &[String]) -> Result<()> {
        let Some(cmd) = command.first() else {
            bail!(ConfigError::Validation(format!(
                "{field} must have at least one element"
            )));
        };

        if which::which(cmd).is_err() {
            log!("config"; "{field}: `{cmd}` not found in PATH, bundles will fail");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    fn leak_cli(args: &[&str]) -> &'static Cli {
        Box::leak(Box::new(Cli::parse_from(args)))
    }

    #[test]
    fn test_from_str() {
        let config = SiteConfig::from_str(
            r#"
            [site]
            name = "Acme"
            "#,
        )
        .unwrap();
        assert_eq!(config.site.name, "Acme");
        assert!(config.rewrites.is_empty());
    }

    #[test]
    fn test_from_str_invalid_toml() {
        assert!(SiteConfig::from_str("[site\nname = 1").is_err());
    }

    #[test]
    fn test_unknown_top_level_field_rejection() {
        assert!(SiteConfig::from_str("[unknown_section]\nfield = 1").is_err());
    }

    #[test]
    fn test_rewrites_keep_declaration_order() {
        let config = SiteConfig::from_str(
            r#"
            [rewrites]
            "/z/:id" = "/z.html"
            "/a/:id" = "/a.html"
            "/m" = "/m.html"
            "#,
        )
        .unwrap();
        let patterns: Vec<_> = config.rewrites.keys().map(String::as_str).collect();
        assert_eq!(patterns, ["/z/:id", "/a/:id", "/m"]);
    }

    #[test]
    fn test_site_config_default() {
        let config = SiteConfig::default();
        assert!(config.cli.is_none());
        assert_eq!(config.config_path, PathBuf::new());
        assert_eq!(config.site.locales, ["en"]);
        assert_eq!(config.serve.port, 5400);
    }

    #[test]
    fn test_load_resolves_paths_and_cli_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("client")).unwrap();
        fs::write(
            dir.path().join("lancer.toml"),
            "[paths]\nfiles = 'uploads'\n[serve]\nport = 6000",
        )
        .unwrap();

        let root = dir.path().to_str().unwrap();
        let cli = leak_cli(&["lancer", "--root", root, "serve", "--port", "7000", "--production"]);
        let config = SiteConfig::load(cli).unwrap();

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.root, root);
        assert_eq!(config.paths.client, root.join("client"));
        assert_eq!(config.paths.files, root.join("uploads"));
        assert_eq!(config.serve.port, 7000);
        assert!(config.serve.is_production());
    }

    #[test]
    fn test_load_without_config_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let cli = leak_cli(&["lancer", "--root", root, "rewrites"]);
        let config = SiteConfig::load(cli).unwrap();
        assert_eq!(config.serve.port, 5400);
        assert!(config.paths.client.ends_with("client"));
    }

    #[test]
    fn test_serve_requires_client_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_str().unwrap();
        let cli = leak_cli(&["lancer", "--root", root, "serve"]);
        assert!(SiteConfig::load(cli).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = SiteConfig::default();
        config.site.locales.clear();
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.serve.workers = 0;
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.bundle.script.clear();
        assert!(config.validate().is_err());

        let mut config = SiteConfig::default();
        config.rewrites.insert("/a".into(), " ".into());
        assert!(config.validate().is_err());
    }
}
