//! Logical path → file resolution with root containment.
//!
//! Every resolved path is normalized lexically (no filesystem access) and
//! must stay inside the root it was resolved against. Request paths that
//! name an include-only fragment (`_name.html`) are refused as well.

use crate::config::SiteConfig;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Request prefix routed to the managed-files root.
pub const FILES_PREFIX: &str = "/files/";
/// Base-name prefix marking include-only fragments.
pub const PARTIAL_MARKER: char = '_';
pub const MARKUP_EXT: &str = "html";
pub const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error("access denied: {}", .0.display())]
    Denied(PathBuf),

    #[error("access denied (partial): {}", .0.display())]
    DeniedPartial(PathBuf),
}

/// The two roots a logical path may resolve under.
#[derive(Debug, Clone, Copy)]
pub struct Roots<'a> {
    pub client: &'a Path,
    pub files: &'a Path,
}

impl<'a> Roots<'a> {
    pub fn of(config: &'a SiteConfig) -> Self {
        Self {
            client: &config.paths.client,
            files: &config.paths.files,
        }
    }

    /// `/`-prefixed logical path of a file under the client root.
    pub fn logical(&self, file: &Path) -> Option<String> {
        let rel = file.strip_prefix(self.client).ok()?;
        let parts: Vec<_> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect();
        Some(format!("/{}", parts.join("/")))
    }

    /// Request URL serving `file`, for files under either root.
    pub fn url(&self, file: &Path) -> Option<String> {
        self.logical(file).or_else(|| {
            let managed = Roots {
                client: self.files,
                files: self.files,
            };
            let rel = managed.logical(file)?;
            Some(format!("{}{}", FILES_PREFIX.trim_end_matches('/'), rel))
        })
    }
}

/// Resolve a request path, or an asset referenced from `from_file`.
///
/// Relative references (no leading `/`) are taken from the referencing
/// file's directory and must stay under the client root. Absolute paths go
/// under the managed-files root when they start with [`FILES_PREFIX`], under
/// the client root otherwise; a trailing `/` selects the directory index and
/// an extensionless name gets the markup extension.
pub fn resolve_asset(
    roots: Roots<'_>,
    asset: &str,
    from_file: Option<&Path>,
) -> Result<PathBuf, AccessError> {
    let file = match from_file {
        Some(from) if is_relative(asset) => {
            let base = from.parent().unwrap_or(roots.client);
            contained(roots.client, normalize(&base.join(asset)))?
        }
        _ => {
            let (root, rel) = match asset.strip_prefix(FILES_PREFIX) {
                Some(rest) => (roots.files, rest),
                None => (roots.client, asset.trim_start_matches('/')),
            };
            let mut file = contained(root, normalize(&root.join(rel)))?;
            if asset.ends_with('/') || file == root {
                file.push(INDEX_FILE);
            } else if let Some(name) = file.file_name().map(|n| n.to_string_lossy().into_owned())
                && !name.contains('.')
            {
                file.set_file_name(format!("{name}.{MARKUP_EXT}"));
            }
            file
        }
    };

    if is_partial(&file) {
        return Err(AccessError::DeniedPartial(file));
    }
    Ok(file)
}

/// Resolve a rewrite target or an include source.
///
/// Unlike [`resolve_asset`] these may name fragments, so only containment
/// under the client root is enforced. Relative paths need `from_file`.
pub fn resolve_source(
    roots: Roots<'_>,
    source: &str,
    from_file: Option<&Path>,
) -> Result<PathBuf, AccessError> {
    let base = match from_file {
        Some(from) if is_relative(source) => from.parent().unwrap_or(roots.client),
        _ => roots.client,
    };
    contained(
        roots.client,
        normalize(&base.join(source.trim_start_matches('/'))),
    )
}

#[inline]
fn is_relative(path: &str) -> bool {
    !path.starts_with('/')
}

fn contained(root: &Path, file: PathBuf) -> Result<PathBuf, AccessError> {
    if file.starts_with(root) {
        Ok(file)
    } else {
        Err(AccessError::Denied(file))
    }
}

fn is_partial(file: &Path) -> bool {
    let is_markup = file.extension().is_some_and(|ext| ext == MARKUP_EXT);
    let marked = file
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with(PARTIAL_MARKER));
    is_markup && marked
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out
}
