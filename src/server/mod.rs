//! Development HTTP server rooted at the output directory.
//!
//! Serves static build artifacts, injects the live-reload client into HTML
//! responses, and optionally opens a local browser once bound.

pub mod message;
mod mime;
pub mod reload;

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::config::PipelineConfig;
use crate::state::register_server;
use crate::{debug, log};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Live-reload client, served from memory at `/livereload.js`.
const LIVERELOAD_JS: &str = include_str!("livereload.js");

/// Script tag injected before `</body>` of served HTML.
const LIVERELOAD_TAG: &str = r#"<script src="/livereload.js"></script>"#;

/// A bound dev server, ready to enter the request loop.
pub struct DevServer {
    server: Arc<Server>,
    addr: SocketAddr,
    out_root: PathBuf,
    ws_port: u16,
}

impl DevServer {
    /// Bind the HTTP server with port retry and register it for graceful
    /// shutdown. `shutdown_tx` is signalled from the Ctrl+C handler so the
    /// watch loop can wind down alongside the request loop.
    pub fn bind(
        config: &PipelineConfig,
        ws_port: u16,
        shutdown_tx: crossbeam::channel::Sender<()>,
    ) -> Result<Self> {
        let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
        let server = Arc::new(server);

        register_server(Arc::clone(&server), shutdown_tx);

        log!("serve"; "http://{}", addr);

        Ok(Self {
            server,
            addr,
            out_root: config.output_dir(),
            ws_port,
        })
    }

    /// The bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Run the request loop until shutdown (blocking).
    pub fn run(self) {
        // Thread pool keeps one slow response from blocking the rest
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(4)
            .build()
            .expect("failed to create thread pool");

        for request in self.server.incoming_requests() {
            if crate::state::is_shutdown() {
                break;
            }
            let out_root = self.out_root.clone();
            let ws_port = self.ws_port;
            pool.spawn(move || {
                if let Err(e) = handle_request(request, &out_root, ws_port) {
                    log!("serve"; "request error: {e}");
                }
            });
        }
    }
}

/// Bind to the specified interface and port, with automatic port retry.
fn bind_with_retry(interface: std::net::IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

/// Handle a single HTTP request.
fn handle_request(request: Request, out_root: &Path, ws_port: u16) -> Result<()> {
    if request.method() != &Method::Get && request.method() != &Method::Head {
        return send_body(request, 405, mime::types::PLAIN, b"405 Method Not Allowed".to_vec());
    }

    let url_path = request.url().split('?').next().unwrap_or("/");

    // Live-reload client is served from memory
    if url_path == "/livereload.js" {
        let body = LIVERELOAD_JS.replace("__WS_PORT__", &ws_port.to_string());
        return send_body(request, 200, mime::types::JAVASCRIPT, body.into_bytes());
    }

    match resolve_path(url_path, out_root) {
        Some(path) => respond_file(request, &path),
        None => respond_not_found(request),
    }
}

/// Map a request URL to a file under the output root.
///
/// Directories resolve to their `index.html`; traversal components are
/// rejected.
fn resolve_path(url_path: &str, out_root: &Path) -> Option<PathBuf> {
    let rel = url_path.trim_start_matches('/');
    let rel = Path::new(rel);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let mut path = out_root.join(rel);
    if path.is_dir() {
        path = path.join("index.html");
    }
    path.is_file().then_some(path)
}

/// Respond with a static file, injecting the live-reload client into HTML.
fn respond_file(request: Request, path: &Path) -> Result<()> {
    let content_type = mime::from_path(path);
    let body = std::fs::read(path)?;
    let body = if content_type == mime::types::HTML {
        inject_livereload(body)
    } else {
        body
    };

    if request.method() == &Method::Head {
        let response = Response::empty(StatusCode(200))
            .with_header(make_header("Content-Type", content_type));
        return request.respond(response).map_err(Into::into);
    }
    send_body(request, 200, content_type, body)
}

fn respond_not_found(request: Request) -> Result<()> {
    debug!("serve"; "404 {}", request.url());
    send_body(request, 404, mime::types::PLAIN, b"404 Not Found".to_vec())
}

/// Insert the live-reload script tag before `</body>`, or append it when
/// the page has no closing body tag.
fn inject_livereload(body: Vec<u8>) -> Vec<u8> {
    let text = match String::from_utf8(body) {
        Ok(text) => text,
        // not actually utf-8 markup: serve unmodified
        Err(e) => return e.into_bytes(),
    };
    let injected = if let Some(pos) = text.rfind("</body>") {
        let mut s = String::with_capacity(text.len() + LIVERELOAD_TAG.len());
        s.push_str(&text[..pos]);
        s.push_str(LIVERELOAD_TAG);
        s.push_str(&text[pos..]);
        s
    } else {
        format!("{text}{LIVERELOAD_TAG}")
    };
    injected.into_bytes()
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type))
        .with_header(make_header("Cache-Control", "no-store"));
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &'static str, value: &str) -> Header {
    Header::from_bytes(key, value).unwrap()
}

/// Open the system browser at the served address. Failures are logged,
/// never fatal.
pub fn open_browser(addr: &SocketAddr) {
    let url = format!("http://{addr}");

    #[cfg(target_os = "macos")]
    let mut cmd = {
        let mut c = std::process::Command::new("open");
        c.arg(&url);
        c
    };
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut c = std::process::Command::new("cmd");
        c.args(["/C", "start", &url]);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let mut cmd = {
        let mut c = std::process::Command::new("xdg-open");
        c.arg(&url);
        c
    };

    match cmd.stdout(std::process::Stdio::null()).stderr(std::process::Stdio::null()).spawn() {
        Ok(_) => debug!("serve"; "opened browser at {}", url),
        Err(e) => log!("serve"; "could not open browser: {}", e),
    }
}
