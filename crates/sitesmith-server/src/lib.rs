//! Development server with live reload for sitesmith builds.
//!
//! Serves the output directory, watches the sources, reruns the affected
//! tasks and tells connected browsers to reload or swap stylesheets.

pub mod server;
pub mod watcher;
pub mod websocket;

pub use server::{DevServer, DevServerConfig, ServerError};
pub use watcher::{next_batch, FileWatcher, TaskMatcher, WatchEvent};
pub use websocket::{inject_script, ReloadHub, ReloadMessage};
