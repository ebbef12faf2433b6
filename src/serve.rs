//! Development server.
//!
//! Serves the output root over HTTP and exposes a reload generation counter
//! that the watch loop bumps after every successful rebuild. With live
//! reload enabled, HTML pages get a small script that polls the counter and
//! reloads the page when it changes.

use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use mime_guess::MimeGuess;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServeConfig;

/// Route answering the current reload generation.
pub const GENERATION_ROUTE: &str = "/__assetline/generation";

const RELOAD_SCRIPT: &str = concat!(
    "<script>(function(){var g=null;setInterval(function(){",
    "fetch('/__assetline/generation').then(function(r){return r.text()}).then(function(t){",
    "if(g!==null&&t!==g){location.reload()}g=t}).catch(function(){})},1000)})();</script>"
);

/// Error running the development server.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServeError {
    /// The async runtime could not start
    #[error("Failed to start runtime: {0}")]
    Runtime(#[source] std::io::Error),
    /// The listen address could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    /// The server stopped with an error
    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),
}

#[derive(Clone)]
struct ServeState {
    root: Arc<PathBuf>,
    generation: Arc<AtomicU64>,
    live_reload: bool,
}

/// Static file server over the output root.
#[derive(Debug, Clone)]
pub struct DevServer {
    out_dir: PathBuf,
    config: ServeConfig,
    generation: Arc<AtomicU64>,
}

impl DevServer {
    pub fn new(out_dir: PathBuf, config: ServeConfig) -> Self {
        Self { out_dir, config, generation: Arc::new(AtomicU64::new(0)) }
    }

    /// Shared reload counter. Increment it to make open pages reload.
    pub fn generation(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.generation)
    }

    /// `host:port` the server listens on.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the axum router.
    pub fn router(&self) -> Router {
        let state = ServeState {
            root: Arc::new(self.out_dir.clone()),
            generation: self.generation(),
            live_reload: self.config.live_reload,
        };
        Router::new()
            .route(GENERATION_ROUTE, get(http_generation))
            .fallback(http_static)
            .with_state(state)
    }

    /// Serve until the process exits, on a dedicated tokio runtime.
    pub fn run(&self) -> Result<(), ServeError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(ServeError::Runtime)?;
        runtime.block_on(self.serve())
    }

    /// Serve on the current tokio runtime.
    pub async fn serve(&self) -> Result<(), ServeError> {
        let addr = self.address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServeError::Bind { addr: addr.clone(), source })?;

        tracing::info!("dev server listening on http://{} (root {})", addr, self.out_dir.display());
        axum::serve(listener, self.router()).await.map_err(ServeError::Server)
    }
}

async fn http_generation(State(state): State<ServeState>) -> String {
    state.generation.load(Ordering::SeqCst).to_string()
}

async fn http_static(State(state): State<ServeState>, uri: Uri) -> Response {
    let Some(path) = resolve_request_path(&state.root, uri.path()) else {
        return (StatusCode::BAD_REQUEST, "invalid path").into_response();
    };
    tracing::debug!("GET {} -> {}", uri.path(), path.display());

    let body = match tokio::fs::read(&path).await {
        Ok(body) => body,
        Err(_) => return (StatusCode::NOT_FOUND, "not found").into_response(),
    };

    let mime = MimeGuess::from_path(&path).first_or_octet_stream();
    let is_html = mime.essence_str() == "text/html";
    let body = if is_html && state.live_reload {
        inject_reload_script(&String::from_utf8_lossy(&body)).into_bytes()
    } else {
        body
    };

    let content_type = HeaderValue::from_str(mime.as_ref())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        ],
        body,
    )
        .into_response()
}

/// Map a request path onto the output root.
///
/// Returns `None` for paths that try to leave the root. Directories map to
/// their `index.html`.
fn resolve_request_path(root: &Path, request: &str) -> Option<PathBuf> {
    let decoded = percent_decode(request)?;
    let relative = Path::new(decoded.trim_start_matches('/'));

    let mut path = root.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }

    if decoded.ends_with('/') || path.is_dir() {
        path.push("index.html");
    }
    Some(path)
}

fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}

/// Insert the live-reload script before the last `</body>`, or append it.
fn inject_reload_script(html: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(index) => format!("{}{}{}", &html[..index], RELOAD_SCRIPT, &html[index..]),
        None => format!("{}{}", html, RELOAD_SCRIPT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_request_path() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("docs")).unwrap();

        assert_eq!(resolve_request_path(root, "/"), Some(root.join("index.html")));
        assert_eq!(resolve_request_path(root, "/docs"), Some(root.join("docs/index.html")));
        assert_eq!(resolve_request_path(root, "/css/a.css"), Some(root.join("css/a.css")));
        assert_eq!(resolve_request_path(root, "/my%20file.txt"), Some(root.join("my file.txt")));
    }

    #[test]
    fn test_resolve_request_path_rejects_traversal() {
        let root = Path::new("/srv/build");
        assert_eq!(resolve_request_path(root, "/../secret"), None);
        assert_eq!(resolve_request_path(root, "/css/%2e%2e/%2e%2e/secret"), None);
        assert_eq!(resolve_request_path(root, "/bad%zz"), None);
    }

    #[test]
    fn test_inject_reload_script() {
        let html = "<html><body><p>x</p></BODY></html>";
        let injected = inject_reload_script(html);
        assert!(injected.contains(&format!("<p>x</p>{}</BODY>", RELOAD_SCRIPT)));
        assert!(injected.contains(GENERATION_ROUTE));

        let fragment = inject_reload_script("<p>x</p>");
        assert!(fragment.ends_with(RELOAD_SCRIPT));
    }

    #[test]
    fn test_generation_is_shared() {
        let server = DevServer::new(PathBuf::from("build"), ServeConfig::default());
        let generation = server.generation();
        generation.fetch_add(1, Ordering::SeqCst);
        assert_eq!(server.generation().load(Ordering::SeqCst), 1);
        assert_eq!(server.address(), "127.0.0.1:9000");
    }

    #[tokio::test]
    async fn test_serves_files_over_http() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.html"), "<body>hi</body>").unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = DevServer::new(temp.path().to_path_buf(), ServeConfig::default());
        let router = server.router();
        tokio::spawn(async move { axum::serve(listener, router).await });

        let response = raw_get(addr, "/").await;
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.contains("text/html"));
        assert!(response.contains(RELOAD_SCRIPT));

        server.generation().fetch_add(2, Ordering::SeqCst);
        let response = raw_get(addr, GENERATION_ROUTE).await;
        assert!(response.ends_with("\r\n\r\n2"));

        assert!(raw_get(addr, "/missing.css").await.starts_with("HTTP/1.1 404"));
    }

    async fn raw_get(addr: std::net::SocketAddr, path: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let request =
            format!("GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n", path);
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }
}
