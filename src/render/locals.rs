//! Root evaluation context of a page render.

use super::{
    RenderContext,
    glob::{glob_dir, page_attrs},
};
use crate::expr::{Builtins, Context, ExprError, Object, Value};
use indexmap::IndexMap;
use std::{
    path::Path,
    sync::{Arc, LazyLock},
};

static STANDARD: LazyLock<Builtins> = LazyLock::new(Builtins::standard);

fn path_value(path: &Path) -> Value {
    path.to_string_lossy().into_owned().into()
}

fn string_map(map: &IndexMap<String, String>) -> Value {
    Value::object(map.iter().map(|(k, v)| (k.as_str(), Value::from(v.as_str()))))
}

/// Build the globals every page sees.
///
/// `[site.locals]` entries are applied last and may shadow the others. The
/// whole scope is also reachable as `locals`, so optional names can be read
/// as `locals.name` without a `ReferenceError`.
pub fn make_locals(ctx: &RenderContext) -> Context {
    let site = &ctx.site;
    let mut scope = Object::new();

    scope.insert("filesDir".into(), path_value(&site.paths.files));
    scope.insert("clientDir".into(), path_value(&site.paths.client));
    scope.insert("publicDir".into(), path_value(&site.paths.r#static));

    scope.insert(
        "site".into(),
        Value::object([
            ("name", Value::from(site.site.name.as_str())),
            (
                "locales",
                Value::Array(site.site.locales.iter().map(|l| l.as_str().into()).collect()),
            ),
        ]),
    );

    scope.insert(
        "page".into(),
        Value::object([
            ("file", path_value(&ctx.file)),
            ("path", ctx.plain_path.as_str().into()),
            ("locale", ctx.locale.as_str().into()),
            ("location", ctx.location.as_str().into()),
        ]),
    );

    scope.insert(
        "request".into(),
        Value::object([
            ("method", Value::from(ctx.method.as_str())),
            ("path", ctx.plain_path.as_str().into()),
            ("params", string_map(&ctx.params)),
            ("query", string_map(&ctx.query)),
        ]),
    );

    scope.insert(
        "cookies".into(),
        string_map(&parse_cookies(ctx.cookies.as_deref().unwrap_or_default())),
    );

    for (key, value) in &site.site.locals {
        scope.insert(key.clone(), value.clone().into());
    }

    let origin = ctx.origin().to_owned();
    let plain_path = ctx.plain_path.clone();
    let location_for = {
        let origin = origin.clone();
        move |args: &[Value]| -> Result<Value, ExprError> {
            let locale = args.first().map(Value::to_display).unwrap_or_default();
            let path = match args.get(1) {
                Some(path) if !path.is_nullish() => path.to_display(),
                _ => plain_path.clone(),
            };
            Ok(format!("{origin}/{locale}{path}").into())
        }
    };

    let files_dir = site.paths.files.clone();
    let glob_files = move |args: &[Value]| -> Result<Value, ExprError> {
        let pattern = args.first().map(Value::to_display).unwrap_or_default();
        let files = glob_dir(&files_dir, "/files/", &pattern)?;
        Ok(Value::Array(
            files
                .into_iter()
                .map(|m| Value::object([("path", Value::from(m.path)), ("file", path_value(&m.file))]))
                .collect(),
        ))
    };

    let client_dir = site.paths.client.clone();
    let locale = ctx.locale.clone();
    let glob_client = move |args: &[Value]| -> Result<Value, ExprError> {
        let pattern = args.first().map(Value::to_display).unwrap_or_default();
        let pages = glob_dir(&client_dir, "/", &pattern)?;
        Ok(Value::Array(pages.into_iter().map(|m| client_page(m.path, &m.file, &origin, &locale)).collect()))
    };

    let builtins = STANDARD
        .clone()
        .with_fn("locationFor", location_for)
        .with_fn("globFiles", glob_files)
        .with_fn("globClient", glob_client);

    Context::new(scope, Arc::new(builtins))
}

/// One `globClient` entry; html pages also carry their `<page>` attributes.
fn client_page(path: String, file: &Path, origin: &str, locale: &str) -> Value {
    let plain_path = path.strip_suffix(".html").unwrap_or(&path);
    let mut entry = Object::new();
    entry.insert("file".into(), path_value(file));
    entry.insert("path".into(), plain_path.into());
    entry.insert("locale".into(), locale.into());
    entry.insert("location".into(), format!("{origin}/{locale}{plain_path}").into());
    if path.ends_with(".html")
        && let Some(attrs) = page_attrs(file)
    {
        entry.insert("attrs".into(), Value::Object(attrs));
    }
    Value::Object(entry)
}

/// `a=1; b=x%20y` → `{a: "1", b: "x y"}`
fn parse_cookies(header: &str) -> IndexMap<String, String> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            let value = value.trim().trim_matches('"');
            let decoded = urlencoding::decode(value).map(|v| v.into_owned());
            Some((name.to_owned(), decoded.unwrap_or_else(|_| value.to_owned())))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::render::context::tests::context_for;

    fn eval(ctx: &mut Context, source: &str) -> String {
        ctx.eval(source).unwrap().to_display()
    }

    #[test]
    fn test_page_and_site_locals() {
        let mut site = SiteConfig::default();
        site.site.name = "Acme".into();
        site.site
            .locals
            .insert("year".into(), toml::Value::Integer(2024));

        let render = context_for(site, Path::new("/c/about.html"), "/about");
        let mut locals = make_locals(&render);

        assert_eq!(eval(&mut locals, "site.name"), "Acme");
        assert_eq!(eval(&mut locals, "page.path"), "/about");
        assert_eq!(eval(&mut locals, "page.file"), "/c/about.html");
        assert_eq!(eval(&mut locals, "year + 1"), "2025");
        assert_eq!(eval(&mut locals, "request.method"), "GET");
    }

    #[test]
    fn test_location_for() {
        let render = context_for(SiteConfig::default(), Path::new("/c/a.html"), "/about");
        let mut locals = make_locals(&render);

        assert_eq!(
            eval(&mut locals, "locationFor('de')"),
            "http://localhost:5400/de/about"
        );
        assert_eq!(
            eval(&mut locals, "locationFor('de', '/contact')"),
            "http://localhost:5400/de/contact"
        );
    }

    #[test]
    fn test_cookies_and_params() {
        let mut render = context_for(SiteConfig::default(), Path::new("/c/a.html"), "/p/7")
            .with_cookies(Some("theme=dark; name=J%20Doe; broken".into()));
        render.params.insert("id".into(), "7".into());
        let mut locals = make_locals(&render);

        assert_eq!(eval(&mut locals, "cookies.theme"), "dark");
        assert_eq!(eval(&mut locals, "cookies.name"), "J Doe");
        assert_eq!(eval(&mut locals, "request.params.id"), "7");
        assert_eq!(eval(&mut locals, "typeof cookies.broken"), "undefined");
    }

    #[test]
    fn test_glob_client_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let client = dir.path().join("client");
        let files = dir.path().join("files");
        std::fs::create_dir_all(client.join("posts")).unwrap();
        std::fs::create_dir_all(files.join("img")).unwrap();
        std::fs::write(client.join("posts/hello.html"), "<page title=\"Hello\">\n<p>hi</p>").unwrap();
        std::fs::write(client.join("posts/plain.html"), "<p>plain</p>").unwrap();
        std::fs::write(files.join("img/a.png"), "").unwrap();

        let mut site = SiteConfig::default();
        site.paths.client = client.clone();
        site.paths.files = files;
        let render = context_for(site, &client.join("index.html"), "/");
        let mut locals = make_locals(&render);

        assert_eq!(eval(&mut locals, "globClient('posts/*.html').length"), "2");
        assert_eq!(eval(&mut locals, "globClient('posts/*.html')[0].path"), "/posts/hello");
        assert_eq!(eval(&mut locals, "globClient('posts/*.html')[0].attrs.title"), "Hello");
        assert_eq!(
            eval(&mut locals, "globClient('posts/*.html')[0].location"),
            format!("http://localhost:5400/{}/posts/hello", render.locale)
        );
        assert_eq!(eval(&mut locals, "typeof globClient('posts/*.html')[1].attrs"), "undefined");
        assert_eq!(eval(&mut locals, "globFiles('**/*.png').length"), "1");
        assert_eq!(eval(&mut locals, "globFiles('**/*.png')[0].path"), "/files/img/a.png");
    }

    #[test]
    fn test_locals_names_the_scope() {
        let render = context_for(SiteConfig::default(), Path::new("/c/a.html"), "/a");
        let mut locals = make_locals(&render);

        assert_eq!(eval(&mut locals, "locals.page.path"), "/a");
        assert_eq!(eval(&mut locals, "locals.subtitle || 'none'"), "none");
    }
}
