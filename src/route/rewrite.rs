//! Rewrite table: ordered URL pattern → logical page path.
//!
//! Two sources feed the table:
//! - `[rewrites]` in lancer.toml, tried first, in declaration order
//! - file-based rewrites: client pages with `[param]` path segments, e.g.
//!   `posts/[id].html` serves `/posts/:id`
//!
//! Development rescans the client directory on every request; production
//! reads the combined table persisted by `lancer rewrites`.

use super::pattern::RoutePattern;
use crate::config::SiteConfig;
use crate::log;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::{fs, path::Path};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
#[error("invalid rewrite pattern `{pattern}`")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}

#[derive(Debug)]
struct Rule {
    target: String,
    /// The pattern with any `.html` suffix stripped, then as written.
    patterns: SmallVec<[RoutePattern; 2]>,
}

/// A successful rewrite lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteMatch<'a> {
    pub pattern: &'a str,
    pub target: &'a str,
    pub params: IndexMap<String, String>,
}

#[derive(Debug, Default)]
pub struct RewriteTable {
    rules: Vec<Rule>,
}

impl RewriteTable {
    pub fn compile<'a, I>(entries: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let compile = |pattern: &str| {
            RoutePattern::compile(pattern).map_err(|source| PatternError {
                pattern: pattern.to_owned(),
                source,
            })
        };

        let rules = entries
            .into_iter()
            .map(|(pattern, target)| -> Result<Rule, PatternError> {
                let mut patterns = SmallVec::new();
                if let Some(stripped) = pattern.strip_suffix(".html") {
                    patterns.push(compile(stripped)?);
                }
                patterns.push(compile(pattern)?);
                Ok(Rule {
                    target: target.to_owned(),
                    patterns,
                })
            })
            .collect::<Result<_, _>>()?;

        Ok(Self { rules })
    }

    /// Build the table the current mode uses.
    pub fn load(config: &SiteConfig) -> Result<Self> {
        let entries = if config.serve.is_production() {
            read_rewrites(&config.paths.rewrites_file())?
        } else {
            collect_rewrites(config)
        };
        let table = Self::compile(entries.iter().map(|(p, t)| (p.as_str(), t.as_str())))?;
        Ok(table)
    }

    /// First rule matching `path`, in table order.
    pub fn find(&self, path: &str) -> Option<RewriteMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            rule.patterns.iter().find_map(|pattern| {
                pattern.captures(path).map(|params| RewriteMatch {
                    pattern: pattern.as_str(),
                    target: &rule.target,
                    params: params.into_iter().collect(),
                })
            })
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Configured rewrites followed by file-based ones.
///
/// A configured pattern keeps its target when a file-based rule produces
/// the same pattern.
pub fn collect_rewrites(config: &SiteConfig) -> IndexMap<String, String> {
    let mut entries = config.rewrites.clone();
    for (pattern, target) in scan_file_rewrites(&config.paths.client) {
        entries.entry(pattern).or_insert(target);
    }
    entries
}

/// Pattern/target pairs for every client page with `[param]` segments.
pub fn scan_file_rewrites(client: &Path) -> Vec<(String, String)> {
    WalkDir::new(client)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(client).ok()?;
            let target = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let stem = target.strip_suffix(".html")?;
            if !stem.contains('[') {
                return None;
            }
            let stem = stem.strip_suffix("/index").unwrap_or(stem);
            Some((file_pattern(stem), format!("/{target}")))
        })
        .collect()
}

/// `posts/[id]` → `/posts/:id`
fn file_pattern(stem: &str) -> String {
    let segments: Vec<_> = stem
        .split('/')
        .map(|segment| match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            Some(name) => format!(":{name}"),
            None => segment.to_owned(),
        })
        .collect();
    format!("/{}", segments.join("/"))
}

fn read_rewrites(path: &Path) -> Result<IndexMap<String, String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rewrites from {}", path.display()))?;
    let entries = serde_json::from_str(&content)
        .with_context(|| format!("Invalid rewrites file {}", path.display()))?;
    Ok(entries)
}

/// Persist the combined table for production.
pub fn write_rewrites(config: &SiteConfig) -> Result<IndexMap<String, String>> {
    let entries = collect_rewrites(config);
    RewriteTable::compile(entries.iter().map(|(p, t)| (p.as_str(), t.as_str())))?;

    let path = config.paths.rewrites_file();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(&path, serde_json::to_string_pretty(&entries)?)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    log!("rewrites"; "{} rules -> {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    fn table(entries: &[(&str, &str)]) -> RewriteTable {
        RewriteTable::compile(entries.iter().copied()).unwrap()
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_find_binds_params() {
        let rewrites = table(&[("/a/:id", "/b.html")]);
        let found = rewrites.find("/a/42").unwrap();
        assert_eq!(found.target, "/b.html");
        assert_eq!(found.params.get("id").map(String::as_str), Some("42"));
        assert!(rewrites.find("/a").is_none());
    }

    #[test]
    fn test_first_match_wins() {
        let rewrites = table(&[("/p/new", "/new.html"), ("/p/:id", "/post.html")]);
        assert_eq!(rewrites.find("/p/new").unwrap().target, "/new.html");
        assert_eq!(rewrites.find("/p/7").unwrap().target, "/post.html");
    }

    #[test]
    fn test_html_suffix_tried_both_ways() {
        let rewrites = table(&[("/legal.html", "/pages/legal.html")]);
        assert!(rewrites.find("/legal").is_some());
        assert!(rewrites.find("/legal.html").is_some());
    }

    #[test]
    fn test_invalid_pattern() {
        let err = RewriteTable::compile([("/n/:id([)", "/n.html")]).unwrap_err();
        assert_eq!(err.pattern, "/n/:id([)");
    }

    #[test]
    fn test_scan_file_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("posts/[id].html"));
        touch(&dir.path().join("[lang]/docs/index.html"));
        touch(&dir.path().join("about.html"));
        touch(&dir.path().join("assets/[x].js"));

        let found = scan_file_rewrites(dir.path());
        assert_eq!(
            found,
            vec![
                ("/:lang/docs".to_owned(), "/[lang]/docs/index.html".to_owned()),
                ("/posts/:id".to_owned(), "/posts/[id].html".to_owned()),
            ]
        );
    }

    #[test]
    fn test_configured_rewrites_come_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("posts/[id].html"));

        let mut config = SiteConfig::default();
        config.paths.client = dir.path().to_path_buf();
        config.rewrites.insert("/posts/:id".into(), "/posts/_custom.html".into());
        config.rewrites.insert("/x".into(), "/y.html".into());

        let entries = collect_rewrites(&config);
        let pairs: Vec<_> = entries.iter().map(|(p, t)| (p.as_str(), t.as_str())).collect();
        assert_eq!(pairs, [("/posts/:id", "/posts/_custom.html"), ("/x", "/y.html")]);
    }

    #[test]
    fn test_write_then_load_in_production() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("client/posts/[id].html"));

        let mut config = SiteConfig::default();
        config.paths.client = dir.path().join("client");
        config.paths.build = dir.path().join("build");
        write_rewrites(&config).unwrap();
        assert!(config.paths.rewrites_file().is_file());

        fs::remove_file(dir.path().join("client/posts/[id].html")).unwrap();
        config.serve.mode = Mode::Production;
        let table = RewriteTable::load(&config).unwrap();
        assert_eq!(table.find("/posts/1").unwrap().target, "/posts/[id].html");
    }

    #[test]
    fn test_production_without_rewrites_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteConfig::default();
        config.paths.build = dir.path().to_path_buf();
        config.serve.mode = Mode::Production;
        assert!(RewriteTable::load(&config).is_err());
    }
}
