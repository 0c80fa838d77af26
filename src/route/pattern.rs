//! Express-style URL patterns.
//!
//! | Syntax         | Matches                                  |
//! |----------------|------------------------------------------|
//! | `/posts/:id`   | one segment, captured as `id`            |
//! | `/posts/:id?`  | the segment (and its slash) is optional  |
//! | `/n/:id(\d+)`  | segment restricted by a custom regex     |
//! | `/docs/*`      | anything, captured as `0`, `1`, ...      |
//!
//! Matching is anchored, case-insensitive, and tolerates one trailing slash.

use regex::Regex;
use std::fmt;

const SEGMENT: &str = "[^/]+?";

#[derive(Clone)]
pub struct RoutePattern {
    source: String,
    regex: Regex,
    params: Vec<String>,
}

impl RoutePattern {
    pub fn compile(pattern: &str) -> Result<Self, regex::Error> {
        let chars: Vec<char> = pattern.trim_end_matches('/').chars().collect();
        let mut re = String::from("(?i)^");
        let mut params = Vec::new();
        let mut wildcards = 0usize;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let prefixed = matches!(c, '/' | '.') && chars.get(i + 1) == Some(&':');
            let param_start = if prefixed { i + 2 } else { i + 1 };

            if (prefixed || c == ':')
                && let Some(param) = read_param(&chars, param_start)
            {
                let group = format!(
                    "(?P<p{}>{})",
                    params.len(),
                    param.custom.as_deref().unwrap_or(SEGMENT)
                );
                let prefix = if prefixed {
                    regex::escape(c.encode_utf8(&mut [0; 4]))
                } else {
                    String::new()
                };
                if param.optional {
                    re.push_str(&format!("(?:{prefix}{group})?"));
                } else {
                    re.push_str(&prefix);
                    re.push_str(&group);
                }
                params.push(param.name);
                i = param.end;
                continue;
            }

            if c == '*' {
                re.push_str(&format!("(?P<p{}>.*)", params.len()));
                params.push(wildcards.to_string());
                wildcards += 1;
            } else {
                re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
            }
            i += 1;
        }
        re.push_str("/?$");

        Ok(Self {
            source: pattern.to_owned(),
            regex: Regex::new(&re)?,
            params,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Named captures of `path`, or `None` if it doesn't match.
    ///
    /// Optional parameters that did not participate are omitted.
    pub fn captures(&self, path: &str) -> Option<Vec<(String, String)>> {
        let caps = self.regex.captures(path)?;
        Some(
            self.params
                .iter()
                .enumerate()
                .filter_map(|(i, name)| {
                    caps.name(&format!("p{i}"))
                        .map(|m| (name.clone(), m.as_str().to_owned()))
                })
                .collect(),
        )
    }
}

impl fmt::Debug for RoutePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RoutePattern").field(&self.source).finish()
    }
}

struct Param {
    name: String,
    custom: Option<String>,
    optional: bool,
    end: usize,
}

/// Read `name`, `name(regex)` and a trailing `?` starting at `start`.
fn read_param(chars: &[char], start: usize) -> Option<Param> {
    let mut end = start;
    while chars
        .get(end)
        .is_some_and(|c| c.is_ascii_alphanumeric() || *c == '_')
    {
        end += 1;
    }
    if end == start {
        return None;
    }
    let name: String = chars[start..end].iter().collect();

    let mut custom = None;
    if chars.get(end) == Some(&'(') {
        let mut depth = 0usize;
        let open = end;
        for (offset, c) in chars[open..].iter().enumerate() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        custom = Some(chars[open + 1..open + offset].iter().collect());
                        end = open + offset + 1;
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    let optional = chars.get(end) == Some(&'?');
    if optional {
        end += 1;
    }

    Some(Param {
        name,
        custom,
        optional,
        end,
    })
}
