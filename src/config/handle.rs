//! Process-wide config with atomic replacement.
//!
//! Request workers read through [`cfg`] without locking. In development
//! mode the server calls [`reload_config`] before handling a request, so
//! edits to `lancer.toml` apply to the next page without a restart.
//!
//! ```text
//!   worker 1 ──┐
//!   worker 2 ──┼── cfg() ─────► ArcSwap<SiteConfig> ◄── reload_config()
//!   worker N ──┘   (load_full)                          (hash gated store)
//! ```

use super::SiteConfig;
use crate::utils::hash;
use anyhow::{Result, anyhow};
use arc_swap::ArcSwap;
use std::{
    fs,
    sync::{
        Arc, LazyLock,
        atomic::{AtomicU64, Ordering},
    },
};

/// Default config until [`init_config`] stores the loaded one.
pub static CONFIG: LazyLock<ArcSwap<SiteConfig>> =
    LazyLock::new(|| ArcSwap::from_pointee(SiteConfig::default()));

/// Content hash of the config file behind [`CONFIG`]; 0 when there is none.
static CONFIG_HASH: AtomicU64 = AtomicU64::new(0);

/// Current config. Wait-free; the returned `Arc` stays valid across reloads.
#[inline]
pub fn cfg() -> Arc<SiteConfig> {
    CONFIG.load_full()
}

fn file_hash(config: &SiteConfig) -> u64 {
    fs::read(&config.config_path)
        .map(|content| hash::compute(&content))
        .unwrap_or(0)
}

/// Re-read `lancer.toml` if its content changed since the last load.
///
/// Returns `true` when a new config was stored. A config that fails to
/// parse or validate leaves the previous one in place.
pub fn reload_config() -> Result<bool> {
    let current = cfg();
    let cli = current
        .cli
        .ok_or_else(|| anyhow!("config was never initialized from the command line"))?;

    let new_hash = file_hash(&current);
    if new_hash == CONFIG_HASH.load(Ordering::Relaxed) {
        return Ok(false);
    }

    let config = SiteConfig::load(cli)?;
    CONFIG.store(Arc::new(config));
    CONFIG_HASH.store(new_hash, Ordering::Relaxed);
    Ok(true)
}

/// Install the startup config.
pub fn init_config(config: SiteConfig) {
    CONFIG_HASH.store(file_hash(&config), Ordering::Relaxed);
    CONFIG.store(Arc::new(config));
}
