//! Errors shared by the asset transforms.

use std::path::PathBuf;

/// Errors that can occur while transforming an asset.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("SCSS compile error in {path}: {message}")]
    ScssError { path: PathBuf, message: String },

    #[error("CSS minify error: {0}")]
    CssError(String),

    #[error("JavaScript error in {path}: {message}")]
    JsError { path: PathBuf, message: String },

    #[error("Image optimization failed for {path}: {message}")]
    ImageError { path: PathBuf, message: String },
}
