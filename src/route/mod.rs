//! Request routing.
//!
//! Turns a request URL into exactly one [`Target`]:
//!
//! ```text
//! url ─► decode, split query
//!      ─► static dir hit? ───────────────────────────► Static
//!      ─► strip locale prefix
//!      ─► rewrite table (first match, binds params)
//!      ─► resolve under files/ or client/ ── refused ─► Denied
//!      ─► registered bundle? ────────────────────────► Bundle
//!      ─► under files/? ── FileResolver ─────────────► File | NotFound
//!      ─► page.html, or page/index.html ─────────────► Page | NotFound
//! ```

mod files;
mod pattern;
mod resolve;
mod rewrite;

pub use files::{DirectFiles, FileResolver};
pub use resolve::{AccessError, MARKUP_EXT, Roots, normalize, resolve_asset, resolve_source};
pub use rewrite::{RewriteTable, write_rewrites};

use crate::bundle::{self, BundleKind};
use crate::config::SiteConfig;
use indexmap::IndexMap;
use resolve::INDEX_FILE;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Exact file in the public static (or production build) directory.
    Static(PathBuf),
    Bundle(BundleKind, PathBuf),
    /// Managed file chosen by the [`FileResolver`].
    File(PathBuf),
    /// Markup page to render.
    Page(PathBuf),
    Denied(AccessError),
    /// Nothing to serve; carries the file that was looked for.
    NotFound(PathBuf),
}

/// A routed request.
#[derive(Debug, Clone)]
pub struct Route {
    /// Decoded request path, without the query string.
    pub path: String,
    pub locale: String,
    /// `path` without its locale prefix.
    pub plain_path: String,
    /// Parameters captured by the matching rewrite.
    pub params: IndexMap<String, String>,
    pub query: IndexMap<String, String>,
    pub target: Target,
}

pub struct Router<'a> {
    config: &'a SiteConfig,
    rewrites: &'a RewriteTable,
    files: &'a dyn FileResolver,
}

impl<'a> Router<'a> {
    pub fn new(
        config: &'a SiteConfig,
        rewrites: &'a RewriteTable,
        files: &'a dyn FileResolver,
    ) -> Self {
        Self {
            config,
            rewrites,
            files,
        }
    }

    pub fn route(&self, url: &str) -> Route {
        let (path, query) = split_url(url);

        let (locale, plain_path) = match self.config.site.split_locale(&path) {
            Some((locale, plain)) => (locale.to_owned(), plain.to_owned()),
            None => (self.config.site.default_locale().to_owned(), path.clone()),
        };

        let mut route = Route {
            path,
            locale,
            plain_path,
            params: IndexMap::new(),
            query,
            target: Target::NotFound(PathBuf::new()),
        };

        route.target = match self.static_file(&route.path) {
            Some(file) => Target::Static(file),
            None => self.resolve(&route.plain_path, &mut route.params, &route.query),
        };
        route
    }

    fn static_file(&self, path: &str) -> Option<PathBuf> {
        let rel = path.trim_start_matches('/');
        if rel.is_empty() {
            return None;
        }

        let paths = &self.config.paths;
        let build = self.config.serve.is_production().then_some(&paths.build);
        let rewrites_file = paths.rewrites_file();

        [Some(&paths.r#static), build]
            .into_iter()
            .flatten()
            .find_map(|dir| {
                let file = normalize(&dir.join(rel));
                let servable = file.starts_with(dir) && file != rewrites_file && file.is_file();
                servable.then_some(file)
            })
    }

    fn resolve(
        &self,
        plain_path: &str,
        params: &mut IndexMap<String, String>,
        query: &IndexMap<String, String>,
    ) -> Target {
        let roots = Roots::of(self.config);
        let resolved = match self.rewrites.find(plain_path) {
            Some(found) => {
                let file = resolve_source(roots, found.target, None);
                params.extend(found.params);
                file
            }
            None => resolve_asset(roots, plain_path, None),
        };

        match resolved {
            Ok(file) => self.select(file, query.get("preview").map(String::as_str)),
            Err(err) => Target::Denied(err),
        }
    }

    fn select(&self, file: PathBuf, preview: Option<&str>) -> Target {
        if let Some(kind) = bundle::lookup(&file) {
            return Target::Bundle(kind, file);
        }

        if file.starts_with(&self.config.paths.files) {
            return match self.files.resolve(&file, self.config, preview) {
                Some(found) => Target::File(found),
                None => Target::NotFound(file),
            };
        }

        if file.extension().is_some_and(|ext| ext == MARKUP_EXT) {
            if file.is_file() {
                return Target::Page(file);
            }
            let index = file.with_extension("").join(INDEX_FILE);
            if index.is_file() {
                return Target::Page(index);
            }
        }

        Target::NotFound(file)
    }
}

/// Decode the path and parse the query string of `url`.
fn split_url(url: &str) -> (String, IndexMap<String, String>) {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));

    let mut path = decode(path, false);
    if !path.starts_with('/') {
        path.insert(0, '/');
    }

    let query = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key, true), decode(value, true))
        })
        .collect();

    (path, query)
}

fn decode(text: &str, plus_as_space: bool) -> String {
    let text = if plus_as_space {
        text.replace('+', " ")
    } else {
        text.to_owned()
    };
    let decoded = urlencoding::decode(&text).map(|d| d.into_owned());
    decoded.unwrap_or(text)
}
