//! Lancer - server-side HTML rendering with layouts, includes and templates.

mod bundle;
mod cli;
mod config;
mod expr;
mod logger;
mod markup;
mod plugins;
mod render;
mod route;
mod serve;
mod utils;

use anyhow::{Context, Result, bail};
use clap::Parser;
use cli::{Cli, Commands};
use config::{SiteConfig, cfg, init_config};
use render::{RenderContext, render};
use route::{DirectFiles, RewriteTable, Router, Target, write_rewrites};
use serve::serve_site;
use std::{fs, sync::Arc};

fn main() -> Result<()> {
    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));
    init_config(SiteConfig::load(cli)?);

    match &cli.command {
        Commands::Serve { .. } => serve_site(),
        Commands::Render { url } => render_url(url),
        Commands::Rewrites => write_rewrites(&cfg()).map(|_| ()),
    }
}

/// Route a GET for `url` and print the rendered page to stdout.
fn render_url(url: &str) -> Result<()> {
    let config = cfg();
    let rewrites = RewriteTable::load(&config)?;
    let route = Router::new(&config, &rewrites, &DirectFiles).route(url);

    let Target::Page(file) = &route.target else {
        bail!("`{url}` does not route to a page ({:?})", route.target);
    };
    let source =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let host = format!("{}:{}", config.serve.interface, config.serve.port);
    let mut ctx = RenderContext::new(Arc::clone(&config), &route, file.clone(), url, &host);
    let rendered = render(&source, &mut ctx)?;
    print!("{}", rendered.html);
    Ok(())
}
