//! Development server serving the build output.
//!
//! Files are looked up in the dist directory through the output filesystem,
//! then in `<project_root>/public` through the input filesystem. Requests for
//! `/` or extension-less paths fall back to the build's HTML entry so client
//! side routing works.

use crate::hmr::{self, HMR_CLIENT_PATH, HmrHub};
use crate::listener::Listener;
use crate::overlay;
use crate::state::{ServerState, SharedState};
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use fob_hmr::{
    AssetServer, BundleGraph, CollaboratorError, CollaboratorResult, Diagnostic, FileSystem,
    ServerOptions,
};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// How long a request waits for a running build before serving what exists.
const BUILD_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Static files that are not build output.
const PUBLIC_DIR: &str = "public";

/// Returned by [`DevServer::start`]; a co-located HMR channel pushes through `hub`.
#[derive(Debug, Clone)]
pub struct DevServerHandle {
    pub addr: SocketAddr,
    pub hub: HmrHub,
}

/// Development server.
pub struct DevServer {
    state: SharedState,
    listener: Mutex<Option<Listener>>,
}

impl DevServer {
    pub fn new(options: ServerOptions) -> Self {
        Self {
            state: Arc::new(ServerState::new(options, HmrHub::new())),
            listener: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.lock().as_ref().map(Listener::addr)
    }
}

#[async_trait]
impl AssetServer for DevServer {
    type Handle = DevServerHandle;

    fn options(&self) -> &ServerOptions {
        self.state.options()
    }

    async fn start(&self) -> CollaboratorResult<DevServerHandle> {
        if self.listener.lock().is_some() {
            return Err(CollaboratorError::Other(
                "Dev server is already running".to_string(),
            ));
        }

        let options = self.state.options();
        self.state.hub().reopen();
        let listener =
            Listener::bind(&options.host, options.port, build_router(self.state.clone())).await?;
        let addr = listener.addr();
        options
            .logger
            .verbose(&format!("Dev server bound to {}", addr));
        *self.listener.lock() = Some(listener);

        Ok(DevServerHandle {
            addr,
            hub: self.state.hub().clone(),
        })
    }

    async fn stop(&self) -> CollaboratorResult<()> {
        let listener = self
            .listener
            .lock()
            .take()
            .ok_or(CollaboratorError::Closed)?;

        self.state.abandon_build();
        // Open SSE streams would otherwise hold graceful shutdown forever.
        self.state.hub().shut_down();
        listener.shutdown().await
    }

    fn build_start(&self) {
        self.state.start_build();
    }

    fn build_success(&self, graph: Arc<dyn BundleGraph>) {
        self.state.complete_build(graph);
    }

    fn build_error(&self, diagnostics: &[Diagnostic]) {
        self.state.fail_build(diagnostics.to_vec());
    }
}

/// Build the axum router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .merge(hmr::routes(state.hub().clone()))
        .fallback(handle_request)
        .layer(
            // CORS: allow all origins for dev
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Handle all non-HMR requests (serve output, public files, or the error overlay).
async fn handle_request(State(state): State<SharedState>, uri: Uri) -> Response {
    let options = state.options();
    let request_path = uri.path();

    let Some(path) = strip_public_url(request_path, &options.public_url) else {
        return not_found(request_path);
    };

    let status = state.wait_for_build(BUILD_WAIT_TIMEOUT).await;
    if let Some(diagnostics) = status.diagnostics() {
        return html_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            overlay::render_error_overlay(diagnostics),
        );
    }

    let Some(relative) = relative_path(path) else {
        return not_found(request_path);
    };

    if !relative.as_os_str().is_empty() {
        let dist_file = options.dist_dir.join(&relative);
        if options.output_fs.is_file(&dist_file).await {
            return serve_file(&state, options.output_fs.as_ref(), &dist_file).await;
        }

        let public_file = options.project_root.join(PUBLIC_DIR).join(&relative);
        if options.input_fs.is_file(&public_file).await {
            return serve_file(&state, options.input_fs.as_ref(), &public_file).await;
        }
    }

    if relative.extension().is_none() {
        if let Some(entry) = state.entry_html() {
            let entry_file = options.dist_dir.join(entry);
            return serve_file(&state, options.output_fs.as_ref(), &entry_file).await;
        }
    }

    not_found(request_path)
}

async fn serve_file(state: &ServerState, fs: &dyn FileSystem, path: &Path) -> Response {
    match fs.read_file(path).await {
        Ok(content) => {
            let content_type = determine_content_type(path);
            let body = if content_type.starts_with("text/html") && state.hub().is_attached() {
                inject_hmr_script(&content)
            } else {
                content
            };
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, content_type)
                .header(header::CACHE_CONTROL, "no-cache")
                .body(Body::from(body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            state.options().logger.warn(&format!(
                "Failed to read file {}: {}",
                path.display(),
                e
            ));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CACHE_CONTROL, "no-cache")],
                format!("Failed to read {}", path.display()),
            )
                .into_response()
        }
    }
}

fn html_response(status: StatusCode, html: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        html,
    )
        .into_response()
}

fn not_found(path: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        format!("File not found: {}", path),
    )
        .into_response()
}

/// Strip the public URL's path prefix from a request path.
///
/// `public_url` may be a path (`/app/`) or a full URL whose path is used.
/// Returns `None` for requests outside the prefix.
fn strip_public_url<'a>(path: &'a str, public_url: &str) -> Option<&'a str> {
    let prefix_path = match public_url.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => public_url,
    };
    let prefix = prefix_path.trim_end_matches('/');
    if prefix.is_empty() {
        return Some(path);
    }

    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Relative filesystem path for a URL path; `None` if it escapes the root.
fn relative_path(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s if s.contains('\\') => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

/// Add the HMR client script before the closing `</body>` tag.
fn inject_hmr_script(content: &[u8]) -> Vec<u8> {
    let html = String::from_utf8_lossy(content);
    let script_tag = format!(r#"<script src="{}"></script>"#, HMR_CLIENT_PATH);

    match html.rfind("</body>") {
        Some(pos) => {
            let mut result = String::with_capacity(html.len() + script_tag.len() + 4);
            result.push_str(&html[..pos]);
            result.push_str(&script_tag);
            result.push('\n');
            result.push_str(&html[pos..]);
            result.into_bytes()
        }
        None => {
            let mut result = html.into_owned();
            result.push('\n');
            result.push_str(&script_tag);
            result.into_bytes()
        }
    }
}

/// Determine content type from file extension.
fn determine_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "wasm" => "application/wasm",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_public_url() {
        assert_eq!(strip_public_url("/index.js", "/"), Some("/index.js"));
        assert_eq!(strip_public_url("/app/index.js", "/app/"), Some("/index.js"));
        assert_eq!(strip_public_url("/app", "/app/"), Some("/"));
        assert_eq!(strip_public_url("/application", "/app/"), None);
        assert_eq!(strip_public_url("/other.js", "/app"), None);
        assert_eq!(
            strip_public_url("/static/a.css", "https://cdn.example.com/static/"),
            Some("/a.css")
        );
        assert_eq!(
            strip_public_url("/a.css", "https://cdn.example.com"),
            Some("/a.css")
        );
    }

    #[test]
    fn test_relative_path_rejects_traversal() {
        assert_eq!(relative_path("/a/./b.js"), Some(PathBuf::from("a/b.js")));
        assert_eq!(relative_path("/"), Some(PathBuf::new()));
        assert_eq!(relative_path("/../etc/passwd"), None);
        assert_eq!(relative_path("/a/..\\b"), None);
    }

    #[test]
    fn test_inject_hmr_script_with_body() {
        let html = b"<html><body><h1>Test</h1></body></html>";
        let result = String::from_utf8(inject_hmr_script(html)).unwrap();

        let script_pos = result.find(HMR_CLIENT_PATH).unwrap();
        let body_pos = result.find("</body>").unwrap();
        assert!(script_pos < body_pos);
    }

    #[test]
    fn test_inject_hmr_script_without_body() {
        let result = String::from_utf8(inject_hmr_script(b"<h1>Test</h1>")).unwrap();
        assert!(result.ends_with(&format!(r#"<script src="{}"></script>"#, HMR_CLIENT_PATH)));
    }

    #[test]
    fn test_content_types() {
        assert_eq!(
            determine_content_type(Path::new("a/index.js")),
            "application/javascript"
        );
        assert_eq!(determine_content_type(Path::new("styles.css")), "text/css");
        assert_eq!(
            determine_content_type(Path::new("index.html")),
            "text/html; charset=utf-8"
        );
        assert_eq!(
            determine_content_type(Path::new("LICENSE")),
            "application/octet-stream"
        );
    }
}
