//! Style compilation with an mtime-keyed cache.
//!
//! A cached stylesheet is reused only while both the source file and the
//! shared style config keep the exact modification times recorded when it
//! was compiled. Syntax errors are logged and reported as `Ok(None)`
//! without touching the cache, so the next request retries.

use crate::config::SiteConfig;
use crate::log;
use crate::utils::exec::{self, ExecError};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, LazyLock},
    time::SystemTime,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StyleError {
    #[error("style syntax error in {}:\n{message}", path.display())]
    Syntax { path: PathBuf, message: String },

    #[error("cannot stat {}", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error(transparent)]
    Exec(ExecError),
}

pub trait StyleProcessor {
    fn process(&self, source: &Path) -> Result<String, StyleError>;
}

/// Runs the `[bundle.style]` command with the source path appended.
pub struct CommandProcessor<'a> {
    command: &'a [String],
    root: &'a Path,
}

impl<'a> CommandProcessor<'a> {
    pub fn new(config: &'a SiteConfig) -> Self {
        Self {
            command: &config.bundle.style,
            root: &config.root,
        }
    }
}

impl StyleProcessor for CommandProcessor<'_> {
    fn process(&self, source: &Path) -> Result<String, StyleError> {
        exec::run(Some(self.root), self.command, &[source.as_os_str().to_owned()]).map_err(
            |err| match err {
                ExecError::Failed { stderr, .. } => StyleError::Syntax {
                    path: source.to_path_buf(),
                    message: stderr,
                },
                other => StyleError::Exec(other),
            },
        )
    }
}

struct Entry {
    source_mtime: SystemTime,
    config_mtime: Option<SystemTime>,
    css: Arc<str>,
}

#[derive(Default)]
pub struct StyleCache {
    entries: RwLock<FxHashMap<PathBuf, Entry>>,
}

pub static STYLE_CACHE: LazyLock<StyleCache> = LazyLock::new(StyleCache::default);

impl StyleCache {
    /// Compiled stylesheet for `source`, or `None` after a syntax error.
    pub fn compile(
        &self,
        processor: &dyn StyleProcessor,
        source: &Path,
        style_config: &Path,
    ) -> Result<Option<Arc<str>>, StyleError> {
        let source_mtime = modified(source)?;
        // A project without a style config still gets cached output.
        let config_mtime = modified(style_config).ok();

        if let Some(entry) = self.entries.read().get(source)
            && entry.source_mtime == source_mtime
            && entry.config_mtime == config_mtime
        {
            return Ok(Some(Arc::clone(&entry.css)));
        }

        match processor.process(source) {
            Ok(css) => {
                let css: Arc<str> = css.into();
                self.entries.write().insert(
                    source.to_path_buf(),
                    Entry {
                        source_mtime,
                        config_mtime,
                        css: Arc::clone(&css),
                    },
                );
                Ok(Some(css))
            }
            Err(err @ StyleError::Syntax { .. }) => {
                log!("style"; "{err}");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

fn modified(path: &Path) -> Result<SystemTime, StyleError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|err| StyleError::Io(path.to_path_buf(), err))
}

/// Compile a registered style bundle through the process-wide cache.
pub fn bundle_style(config: &SiteConfig, source: &Path) -> Result<Option<Arc<str>>, StyleError> {
    STYLE_CACHE.compile(
        &CommandProcessor::new(config),
        source,
        &config.bundle.style_config,
    )
}
