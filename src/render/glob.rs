//! File listing for the `globClient` and `globFiles` locals.

use crate::expr::{ExprError, Object, Value};
use crate::markup::{AttrValue, Node, parse};
use quick_xml::escape::unescape;
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// A matched file: its URL path and its location on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobMatch {
    pub path: String,
    pub file: PathBuf,
}

/// Translate a shell glob into an anchored regex over `/`-separated paths.
///
/// Supports `*`, `**`, `?`, `[...]` classes and `{a,b}` alternatives.
fn glob_regex(pattern: &str) -> Result<Regex, ExprError> {
    let pattern = pattern.trim_start_matches("./").trim_start_matches('/');
    let mut out = String::from("^");
    let mut chars = pattern.chars().peekable();
    let mut braces = 0usize;

    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("(?:[^/.][^/]*/)*");
                } else {
                    out.push_str(".*");
                }
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            '[' => {
                out.push('[');
                if matches!(chars.peek(), Some('!' | '^')) {
                    chars.next();
                    out.push('^');
                }
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    if c == '\\' || c == '[' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push(']');
            }
            '{' => {
                braces += 1;
                out.push_str("(?:");
            }
            '}' if braces > 0 => {
                braces -= 1;
                out.push(')');
            }
            ',' if braces > 0 => out.push('|'),
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    out.push('$');

    Regex::new(&out).map_err(|_| ExprError::type_error(format!("invalid glob pattern `{pattern}`")))
}

/// Files under `dir` matching `pattern`, sorted by file path.
///
/// Hidden entries are skipped; a missing `dir` yields nothing.
pub fn glob_dir(dir: &Path, url_prefix: &str, pattern: &str) -> Result<Vec<GlobMatch>, ExprError> {
    let regex = glob_regex(pattern)?;
    let mut matches: Vec<_> = WalkDir::new(dir)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(dir).ok()?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            regex.is_match(&rel).then(|| GlobMatch {
                path: format!("{url_prefix}{rel}"),
                file: entry.into_path(),
            })
        })
        .collect();
    matches.sort_by(|a, b| a.file.cmp(&b.file));
    Ok(matches)
}

/// Attributes of the leading `<page ...>` tag of an html file, if any.
///
/// Only the opening tag is read. Template attribute values stay unevaluated.
pub fn page_attrs(file: &Path) -> Option<Object> {
    let source = fs::read_to_string(file).ok()?;
    let rest = source.trim_start().strip_prefix("<page")?;
    if !rest.starts_with(|c: char| c.is_ascii_whitespace() || c == '>' || c == '/') {
        return None;
    }
    let end = rest.find('>')?;
    let tag = format!("<page{}", &rest[..=end]);

    let element = parse(&tag).ok()?.into_iter().find_map(|node| match node {
        Node::Tag(el) if el.tag.as_deref() == Some("page") => Some(el),
        _ => None,
    })?;

    Some(
        element
            .attrs
            .iter()
            .map(|(name, value)| {
                let text = match value {
                    AttrValue::Text(raw) => unescape(raw).map_or_else(|_| raw.clone(), |t| t.into_owned()),
                    AttrValue::Template(raw) => raw.clone(),
                };
                (name.to_string(), Value::from(text))
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn paths(dir: &Path, pattern: &str) -> Vec<String> {
        glob_dir(dir, "/", pattern)
            .unwrap()
            .into_iter()
            .map(|m| m.path)
            .collect()
    }

    #[test]
    fn test_glob_patterns() {
        let dir = tempdir().unwrap();
        for rel in ["posts/a.html", "posts/b.html", "posts/2024/c.html", "posts/notes.md", "posts/.draft.html"] {
            write(dir.path(), rel, "");
        }

        assert_eq!(paths(dir.path(), "posts/*.html"), ["/posts/a.html", "/posts/b.html"]);
        assert_eq!(
            paths(dir.path(), "posts/**/*.html"),
            ["/posts/2024/c.html", "/posts/a.html", "/posts/b.html"]
        );
        assert_eq!(paths(dir.path(), "posts/?.{html,md}"), ["/posts/a.html", "/posts/b.html"]);
        assert_eq!(paths(dir.path(), "posts/[!a].html"), ["/posts/b.html"]);
        assert!(paths(dir.path(), "nothing/*").is_empty());
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let dir = tempdir().unwrap();
        assert!(glob_dir(&dir.path().join("gone"), "/files/", "*").unwrap().is_empty());
    }

    #[test]
    fn test_page_attrs() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "post.html",
            "\n  <page title=\"Tom &amp; Jerry\"\n    date=\"2024\" summary=\"{{ x }}\">\n<p>body</p>",
        );
        write(dir.path(), "plain.html", "<p>no page</p><page title=\"late\">");
        write(dir.path(), "pager.html", "<pager title=\"x\">");

        let attrs = page_attrs(&dir.path().join("post.html")).unwrap();
        assert_eq!(attrs.get("title"), Some(&Value::from("Tom & Jerry")));
        assert_eq!(attrs.get("date"), Some(&Value::from("2024")));
        assert_eq!(attrs.get("summary"), Some(&Value::from("{{ x }}")));

        assert!(page_attrs(&dir.path().join("plain.html")).is_none());
        assert!(page_attrs(&dir.path().join("pager.html")).is_none());
    }
}
