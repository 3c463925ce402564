//! SCSS compilation and CSS minification.

use std::path::{Path, PathBuf};

use crate::error::TransformError;

/// Compile an SCSS entry point to CSS.
///
/// `@import` and `@use` resolve relative to the entry file first, then against
/// each of `load_paths` in order. `url(...)` references are emitted unchanged.
pub fn compile_scss(entry: &Path, load_paths: &[PathBuf]) -> Result<String, TransformError> {
    if !entry.is_file() {
        return Err(TransformError::ReadError {
            path: entry.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }

    let options = grass::Options::default()
        .load_paths(load_paths)
        .style(grass::OutputStyle::Expanded);

    grass::from_path(entry, &options).map_err(|e| TransformError::ScssError {
        path: entry.to_path_buf(),
        message: e.to_string(),
    })
}

/// Minify CSS using lightningcss.
pub fn minify_css(css: &str) -> Result<String, TransformError> {
    use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

    let mut stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| TransformError::CssError(format!("parse error: {}", e)))?;

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| TransformError::CssError(e.to_string()))?;

    let minified = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| TransformError::CssError(e.to_string()))?;

    Ok(minified.code)
}
