//! Development server implementation.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::sync::broadcast::error::RecvError;
use tower_http::services::ServeDir;

use sitesmith_build::{Builder, GlobError, SiteConfig, TaskName, TaskReport};

use crate::watcher::{next_batch, FileWatcher, TaskMatcher, WatchEvent};
use crate::websocket::{
    inject_script, livereload_client_script, ReloadHub, ReloadMessage, LIVERELOAD_SCRIPT_PATH,
    LIVERELOAD_WS_PATH,
};

/// Configuration for the development server.
#[derive(Debug, Clone)]
pub struct DevServerConfig {
    /// Pipeline configuration; its output directory is served
    pub site: SiteConfig,

    /// Port to listen on
    pub port: u16,

    /// Host to bind to
    pub host: String,

    /// Open browser on start
    pub open: bool,

    /// Quiet period before a burst of changes triggers a rebuild
    pub debounce: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            port: 3000,
            host: "127.0.0.1".to_string(),
            open: true,
            debounce: Duration::from_millis(100),
        }
    }
}

/// Errors that can occur with the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Invalid address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind to {0}: {1}")]
    BindError(SocketAddr, String),

    #[error("File watch error: {0}")]
    WatchError(String),

    #[error("Invalid watch pattern: {0}")]
    PatternError(#[from] GlobError),
}

/// Shared server state.
struct ServerState {
    hub: ReloadHub,
}

/// Development server.
pub struct DevServer {
    config: DevServerConfig,
}

impl DevServer {
    /// Create a new development server.
    pub fn new(config: DevServerConfig) -> Self {
        Self { config }
    }

    /// Build the HTTP router serving the output directory with live reload.
    pub fn router(&self, hub: ReloadHub) -> Router {
        let state = Arc::new(ServerState { hub });

        Router::new()
            .route(LIVERELOAD_WS_PATH, get(ws_handler))
            .route(LIVERELOAD_SCRIPT_PATH, get(script_handler))
            .fallback_service(ServeDir::new(self.config.site.output_root()))
            .layer(middleware::from_fn(inject_livereload))
            .with_state(state)
    }

    /// Start the development server.
    ///
    /// Expects the output directory to have been built already. Runs until
    /// the listener fails.
    pub async fn start(mut self) -> Result<(), ServerError> {
        let addr = self.addr()?;

        // notify reports canonical paths
        if let Ok(root) = self.config.site.root.canonicalize() {
            self.config.site.root = root;
        }

        let hub = ReloadHub::new();
        let matcher = TaskMatcher::new(&self.config.site)?;
        let builder = Arc::new(Builder::new(self.config.site.clone()));

        let (watcher, mut rx) = FileWatcher::new(&self.config.site.watch_roots())
            .map_err(|e| ServerError::WatchError(e.to_string()))?;

        let watch_hub = hub.clone();
        let debounce = self.config.debounce;
        tokio::spawn(async move {
            while let Some(batch) = next_batch(&mut rx, debounce).await {
                handle_batch(&builder, &matcher, &watch_hub, batch).await;
            }
            // Keep watcher alive
            drop(watcher);
        });

        self.listen(addr, hub).await
    }

    /// Serve the output directory without watching sources.
    pub async fn preview(self) -> Result<(), ServerError> {
        let addr = self.addr()?;
        self.listen(addr, ReloadHub::new()).await
    }

    fn addr(&self) -> Result<SocketAddr, ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        addr.parse().map_err(|_| ServerError::InvalidAddress(addr))
    }

    async fn listen(&self, addr: SocketAddr, hub: ReloadHub) -> Result<(), ServerError> {
        let app = self.router(hub);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        let url = format!("http://{}", addr);
        tracing::info!("Serving {} at {}", self.config.site.output_root().display(), url);

        if self.config.open {
            let _ = open::that(&url);
        }

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::BindError(addr, e.to_string()))?;

        Ok(())
    }
}

/// Rerun the tasks affected by a batch of changes and notify browsers.
async fn handle_batch(
    builder: &Arc<Builder>,
    matcher: &TaskMatcher,
    hub: &ReloadHub,
    batch: Vec<WatchEvent>,
) {
    let tasks = matcher.tasks_for_batch(&batch);
    if tasks.is_empty() {
        return;
    }

    for event in &batch {
        tracing::debug!("Changed: {}", event.path().display());
    }

    let runner = Arc::clone(builder);
    let to_run: Vec<TaskName> = tasks.iter().copied().collect();
    let reports = match tokio::task::spawn_blocking(move || {
        to_run
            .into_iter()
            .filter_map(|task| match runner.run_task(task) {
                Ok(report) => Some(report),
                Err(e) => {
                    // Keep serving the last good output
                    tracing::error!("{}", e);
                    None
                }
            })
            .collect::<Vec<_>>()
    })
    .await
    {
        Ok(reports) => reports,
        Err(e) => {
            tracing::error!("Rebuild task panicked: {}", e);
            return;
        }
    };

    for msg in reload_messages(&tasks, &reports, &builder.config().output_root()) {
        hub.send(msg);
    }
}

/// Decide what browsers should do after a rebuild.
///
/// Style-only rebuilds swap stylesheets in place; anything else reloads.
fn reload_messages(
    tasks: &BTreeSet<TaskName>,
    reports: &[TaskReport],
    output_root: &Path,
) -> Vec<ReloadMessage> {
    if reports.is_empty() {
        return Vec::new();
    }

    let style_only = tasks.iter().all(TaskName::is_style);
    if !style_only {
        return vec![ReloadMessage::Reload];
    }

    reports
        .iter()
        .flat_map(|report| report.files.iter())
        .map(|file| ReloadMessage::Css {
            path: url_path(file, output_root),
        })
        .collect()
}

/// URL path of an output file.
fn url_path(file: &Path, output_root: &Path) -> String {
    let relative: PathBuf = file.strip_prefix(output_root).unwrap_or(file).to_path_buf();
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();

    format!("/{}", segments.join("/"))
}

/// Add the live reload script to successful HTML responses.
async fn inject_livereload(request: Request, next: Next) -> Response {
    let response = next.run(request).await;

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"));

    if response.status() != StatusCode::OK || !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let html = inject_script(&String::from_utf8_lossy(&bytes), LIVERELOAD_SCRIPT_PATH);
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(html))
}

/// Handler for the live reload WebSocket endpoint.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_ws(mut socket: WebSocket, state: Arc<ServerState>) {
    let mut rx = state.hub.subscribe();

    if !send_json(&mut socket, &ReloadMessage::Connected).await {
        return;
    }

    loop {
        match rx.recv().await {
            Ok(msg) => {
                if !send_json(&mut socket, &msg).await {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!("Live reload client skipped {} messages", skipped);
                if !send_json(&mut socket, &ReloadMessage::Reload).await {
                    break;
                }
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn send_json(socket: &mut WebSocket, msg: &ReloadMessage) -> bool {
    let Ok(json) = serde_json::to_string(msg) else {
        return false;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

/// Handler for the live reload client script.
async fn script_handler() -> impl IntoResponse {
    let script = livereload_client_script(LIVERELOAD_WS_PATH);
    ([(header::CONTENT_TYPE, "application/javascript")], script)
}
