//! Per-request render state.

use super::RenderError;
use crate::config::SiteConfig;
use crate::markup::{self, Node};
use crate::route::Route;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

/// Request methods that submit data rather than fetch a page.
const DATA_SUBMISSION_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

/// Everything a render needs to know about the request and the page.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub method: String,
    pub site: Arc<SiteConfig>,
    /// Parsed sub-documents (layouts, includes) read during this request.
    pub cache: FxHashMap<PathBuf, Vec<Node>>,
    pub locale: String,
    /// Request path without its locale prefix.
    pub plain_path: String,
    /// Markup file being rendered.
    pub file: PathBuf,
    /// Absolute request URL, e.g. `http://localhost:5400/de/about?x=1`.
    pub location: String,
    pub params: IndexMap<String, String>,
    pub query: IndexMap<String, String>,
    /// Raw `Cookie` request header.
    pub cookies: Option<String>,
}

impl RenderContext {
    pub fn new(site: Arc<SiteConfig>, route: &Route, file: PathBuf, url: &str, host: &str) -> Self {
        Self {
            method: "GET".into(),
            site,
            cache: FxHashMap::default(),
            locale: route.locale.clone(),
            plain_path: route.plain_path.clone(),
            file,
            location: format!("http://{host}{url}"),
            params: route.params.clone(),
            query: route.query.clone(),
            cookies: None,
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn with_cookies(mut self, header: Option<String>) -> Self {
        self.cookies = header;
        self
    }

    /// `scheme://host` part of [`Self::location`].
    pub fn origin(&self) -> &str {
        let after_scheme = self.location.find("://").map_or(0, |i| i + 3);
        match self.location[after_scheme..].find('/') {
            Some(slash) => &self.location[..after_scheme + slash],
            None => &self.location,
        }
    }

    pub fn is_data_submission(&self) -> bool {
        DATA_SUBMISSION_METHODS.contains(&self.method.as_str())
    }

    /// Read and parse `file` once per request.
    pub fn load(&mut self, file: &Path) -> Result<Vec<Node>, RenderError> {
        if let Some(nodes) = self.cache.get(file) {
            return Ok(nodes.clone());
        }

        let source =
            fs::read_to_string(file).map_err(|err| RenderError::Io(file.to_path_buf(), err))?;
        let nodes = markup::parse(&source).map_err(|source| RenderError::Markup {
            path: file.to_path_buf(),
            source,
        })?;
        self.cache.insert(file.to_path_buf(), nodes.clone());
        Ok(nodes)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::route::Target;

    /// Context for `file` requested as `url`, with `site` as configured.
    pub fn context_for(site: SiteConfig, file: &Path, url: &str) -> RenderContext {
        let route = Route {
            path: url.into(),
            locale: site.site.default_locale().into(),
            plain_path: url.into(),
            params: IndexMap::new(),
            query: IndexMap::new(),
            target: Target::Page(file.to_path_buf()),
        };
        RenderContext::new(Arc::new(site), &route, file.to_path_buf(), url, "localhost:5400")
    }

    #[test]
    fn test_origin_and_method() {
        let ctx = context_for(SiteConfig::default(), Path::new("/c/a.html"), "/a?x=1")
            .with_method("post");
        assert_eq!(ctx.location, "http://localhost:5400/a?x=1");
        assert_eq!(ctx.origin(), "http://localhost:5400");
        assert!(ctx.is_data_submission());
        assert!(!ctx.clone().with_method("GET").is_data_submission());
    }

    #[test]
    fn test_load_caches_per_request() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("_part.html");
        fs::write(&file, "<b>one</b>").unwrap();

        let mut ctx = context_for(SiteConfig::default(), &file, "/");
        assert_eq!(markup::to_html(&ctx.load(&file).unwrap()), "<b>one</b>");

        fs::write(&file, "<b>two</b>").unwrap();
        assert_eq!(markup::to_html(&ctx.load(&file).unwrap()), "<b>one</b>");

        let err = ctx.load(&dir.path().join("none.html")).unwrap_err();
        assert!(matches!(err, RenderError::Io(..)));
    }
}
