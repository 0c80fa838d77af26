//! HTTP server.
//!
//! Built on `tiny_http`: one listening socket shared by `[serve.workers]`
//! threads, each pulling requests until Ctrl+C unblocks them.
//!
//! # Request flow
//!
//! ```text
//! request ─► (development) reload lancer.toml if it changed
//!         ─► Router::route(url)
//!              Static / File ─► file bytes, guessed content type
//!              Bundle        ─► script bundler / cached style processor
//!              Page          ─► render(), 405 when a submission falls through
//!              Denied        ─► 404, logged as denied
//!              NotFound      ─► 404
//! ```
//!
//! Production serves the rewrite table loaded at startup; development
//! rebuilds it per request so new `[param]` pages route immediately.

use crate::{
    bundle::{BundleKind, STYLE_ERROR_BODY, bundle_script, bundle_style},
    config::{SiteConfig, cfg, reload_config},
    log,
    render::{RenderContext, render},
    route::{DirectFiles, RewriteTable, Roots, Route, Router, Target},
    utils::mime,
};
use anyhow::{Context, Result, anyhow};
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::Path,
    sync::Arc,
    thread,
    time::Instant,
};
use tiny_http::{Header, Request, Response, Server};

/// Try binding to port, retry with incremented port if in use
const MAX_PORT_RETRIES: u16 = 10;

// ============================================================================
// Server Entry Point
// ============================================================================

/// Bind, spawn the workers and block until Ctrl+C.
pub fn serve_site() -> Result<()> {
    let c = cfg();
    let interface: IpAddr = c
        .serve
        .interface
        .parse()
        .with_context(|| format!("Invalid interface `{}`", c.serve.interface))?;

    let rewrites = if c.serve.is_production() {
        let table = RewriteTable::load(&c).context("Run `lancer rewrites` before serving")?;
        log!("serve"; "production, {} rewrites", table.len());
        Some(Arc::new(table))
    } else {
        None
    };

    let (server, addr) = try_bind_port(interface, c.serve.port, MAX_PORT_RETRIES)?;
    let server = Arc::new(server);
    let workers = c.serve.workers;

    let server_for_signal = Arc::clone(&server);
    ctrlc::set_handler(move || {
        log!("serve"; "shutting down...");
        for _ in 0..workers {
            server_for_signal.unblock();
        }
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("serve"; "http://{}", addr);

    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let server = Arc::clone(&server);
            let rewrites = rewrites.clone();
            thread::spawn(move || {
                for request in server.incoming_requests() {
                    if let Err(e) = handle_request(request, rewrites.as_deref()) {
                        log!("serve"; "request error: {e:#}");
                    }
                }
            })
        })
        .collect();

    for handle in handles {
        handle
            .join()
            .map_err(|_| anyhow!("server worker panicked"))?;
    }
    Ok(())
}

/// Try to bind to a port, retrying with incremented port numbers if in use.
fn try_bind_port(interface: IpAddr, base_port: u16, max_retries: u16) -> Result<(Server, SocketAddr)> {
    let mut last_error = None;
    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow!(
        "Failed to bind after {} attempts (ports {}-{}): {}",
        max_retries,
        base_port,
        base_port.saturating_add(max_retries.saturating_sub(1)),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

// ============================================================================
// Request Handling
// ============================================================================

/// The parts of a request routing and rendering look at.
#[derive(Debug, Clone)]
pub struct Incoming<'a> {
    pub method: &'a str,
    pub url: &'a str,
    pub host: &'a str,
    pub cookies: Option<String>,
}

/// A response before it is written to the socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }

    fn status(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: mime::TEXT,
            body: format!("{status} {message}").into_bytes(),
        }
    }

    fn not_found() -> Self {
        Self::status(404, "Not Found")
    }

    fn into_response(self) -> Response<std::io::Cursor<Vec<u8>>> {
        Response::from_data(self.body)
            .with_status_code(self.status)
            .with_header(content_type(self.content_type))
    }
}

fn content_type(value: &str) -> Header {
    Header::from_bytes("Content-Type", value).expect("content type is a valid header value")
}

fn header<'r>(request: &'r Request, name: &'static str) -> Option<&'r str> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str())
}

fn handle_request(request: Request, production_rewrites: Option<&RewriteTable>) -> Result<()> {
    if production_rewrites.is_none()
        && let Err(e) = reload_config()
    {
        log!("config"; "reload failed, keeping previous config: {e:#}");
    }
    let config = cfg();

    let scanned;
    let rewrites = match production_rewrites {
        Some(table) => table,
        None => {
            scanned = RewriteTable::load(&config)?;
            &scanned
        }
    };

    let method = request.method().as_str().to_owned();
    let url = request.url().to_owned();
    let incoming = Incoming {
        method: &method,
        url: &url,
        host: header(&request, "Host").unwrap_or(config.serve.interface.as_str()),
        cookies: header(&request, "Cookie").map(str::to_owned),
    };

    let reply = respond(&config, rewrites, &incoming);
    request.respond(reply.into_response())?;
    Ok(())
}

/// Route and answer one request.
pub fn respond(config: &Arc<SiteConfig>, rewrites: &RewriteTable, incoming: &Incoming<'_>) -> Reply {
    log!("serve"; "{} {}", incoming.method, incoming.url);
    let route = Router::new(config, rewrites, &DirectFiles).route(incoming.url);

    let reply = match &route.target {
        Target::Static(file) | Target::File(file) => serve_file(file),
        Target::Bundle(kind, file) => serve_bundle(config, *kind, file),
        Target::Page(file) => serve_page(config, &route, file, incoming),
        Target::Denied(err) => {
            log!("denied"; "{err}");
            Ok(Reply::not_found())
        }
        Target::NotFound(file) => {
            not_found(config, file);
            Ok(Reply::not_found())
        }
    };

    reply.unwrap_or_else(|e| {
        log!("error"; "{} {}: {e:#}", incoming.method, incoming.url);
        Reply::status(500, "Internal Server Error")
    })
}

fn serve_file(path: &Path) -> Result<Reply> {
    let content = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Reply::ok(mime::guess_content_type(path), content))
}

fn serve_bundle(config: &SiteConfig, kind: BundleKind, source: &Path) -> Result<Reply> {
    log!("serve"; "--> {} (bundle)", logical(config, source));
    Ok(match kind {
        BundleKind::Script => Reply::ok(mime::JAVASCRIPT, bundle_script(config, source)?),
        BundleKind::Style => match bundle_style(config, source)? {
            Some(css) => Reply::ok(mime::CSS, css.as_bytes()),
            None => Reply::ok(mime::CSS, STYLE_ERROR_BODY),
        },
    })
}

fn serve_page(
    config: &Arc<SiteConfig>,
    route: &Route,
    file: &Path,
    incoming: &Incoming<'_>,
) -> Result<Reply> {
    log!("serve"; "--> {}", logical(config, file));
    let source =
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let mut ctx = RenderContext::new(
        Arc::clone(config),
        route,
        file.to_path_buf(),
        incoming.url,
        incoming.host,
    )
    .with_method(incoming.method)
    .with_cookies(incoming.cookies.clone());

    let started = Instant::now();
    let rendered = render(&source, &mut ctx)
        .with_context(|| format!("Failed to render {}", logical(config, file)))?;
    log!("render"; "{} in {:.1?}", logical(config, file), started.elapsed());

    if ctx.is_data_submission() && !rendered.is_server_rendered {
        return Ok(Reply::status(405, "Method Not Allowed"));
    }
    Ok(Reply::ok(mime::HTML, rendered.html))
}

/// Log why nothing was served. Development also names the markup file that
/// would serve the path, so a missing page is easy to create.
fn not_found(config: &SiteConfig, file: &Path) {
    if file.exists() {
        log!("denied"; "{} is not servable", logical(config, file));
    } else if config.serve.is_production() {
        log!("serve"; "no such file");
    } else {
        log!("serve"; "no such file, create {} to serve it", logical(config, file));
    }
}

fn logical(config: &SiteConfig, file: &Path) -> String {
    Roots::of(config)
        .url(file)
        .unwrap_or_else(|| file.display().to_string())
}

// ============================================================================
// Tests
// ============================================================================
