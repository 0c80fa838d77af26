//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// lancer: server-side markup rendering
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Project root (default: current directory)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Config file name, relative to the root
    #[arg(short = 'C', long, default_value = "lancer.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the site over HTTP
    Serve {
        /// Network interface to bind
        #[arg(short, long)]
        interface: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Load rewrites from the build directory and stop reloading config
        #[arg(long)]
        production: bool,
    },

    /// Render a single URL and print the HTML
    Render {
        /// Request path, e.g. `/posts/42?draft=1`
        url: String,
    },

    /// Scan file-based rewrites and persist the combined table
    Rewrites,
}
