//! `[site]` section configuration.

use super::defaults;
use educe::Educe;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// `[site]` section in lancer.toml - site identity and template locals.
///
/// # Example
/// ```toml
/// [site]
/// name = "Acme"
/// locales = ["en", "de"]
///
/// [site.locals]
/// support_email = "help@acme.test"
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteSection {
    #[serde(default = "defaults::site::name")]
    #[educe(Default = defaults::site::name())]
    pub name: String,

    /// Supported locales; the first one is the default.
    #[serde(default = "defaults::site::locales")]
    #[educe(Default = defaults::site::locales())]
    pub locales: Vec<String>,

    /// Extra values exposed to every page.
    #[serde(default)]
    pub locals: IndexMap<String, toml::Value>,
}

impl SiteSection {
    /// Default locale (first configured).
    pub fn default_locale(&self) -> &str {
        self.locales.first().map_or("", String::as_str)
    }

    /// Split a known locale prefix off `path`: `/de/about` → (`de`, `/about`).
    pub fn split_locale<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let rest = path.strip_prefix('/')?;
        let head = rest.split('/').next().unwrap_or(rest);
        self.locales.iter().any(|l| l == head).then(|| {
            let plain = &path[1 + head.len()..];
            (head, if plain.is_empty() { "/" } else { plain })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;

    #[test]
    fn test_site_section() {
        let config = r#"
            [site]
            name = "Acme"
            locales = ["en", "de"]

            [site.locals]
            year = 2024
            nav = ["home", "about"]
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.site.name, "Acme");
        assert_eq!(config.site.default_locale(), "en");
        let keys: Vec<_> = config.site.locals.keys().map(String::as_str).collect();
        assert_eq!(keys, ["year", "nav"]);
    }

    #[test]
    fn test_split_locale() {
        let config: SiteConfig = toml::from_str("[site]\nlocales = ['en', 'de']").unwrap();
        let site = &config.site;

        assert_eq!(site.split_locale("/de/about"), Some(("de", "/about")));
        assert_eq!(site.split_locale("/de"), Some(("de", "/")));
        assert_eq!(site.split_locale("/de/"), Some(("de", "/")));
        assert_eq!(site.split_locale("/fr/about"), None);
        assert_eq!(site.split_locale("/design"), None);
    }
}
