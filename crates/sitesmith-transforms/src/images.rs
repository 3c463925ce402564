//! Lossless image optimization.

use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::TransformError;

/// Image formats recognised by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Svg,
    Webp,
    Other,
}

impl ImageFormat {
    /// Detect the format from a file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "png" => Self::Png,
            "jpg" | "jpeg" => Self::Jpeg,
            "gif" => Self::Gif,
            "svg" => Self::Svg,
            "webp" => Self::Webp,
            _ => Self::Other,
        }
    }
}

/// Result of optimizing one image.
#[derive(Debug)]
pub struct OptimizedImage {
    /// Bytes to write
    pub data: Vec<u8>,

    /// Size before optimization
    pub original_size: u64,
}

impl OptimizedImage {
    /// Bytes saved relative to the input.
    pub fn saved(&self) -> u64 {
        self.original_size.saturating_sub(self.data.len() as u64)
    }
}

/// Optimize an image's bytes.
///
/// PNGs are recompressed losslessly and SVGs are minified. The original is
/// kept when the result is not smaller. Every other format passes through
/// unchanged.
pub fn optimize_image(path: &Path, data: Vec<u8>) -> Result<OptimizedImage, TransformError> {
    let original_size = data.len() as u64;

    let optimized = match ImageFormat::from_path(path) {
        ImageFormat::Png => {
            let options = oxipng::Options::from_preset(2);
            Some(oxipng::optimize_from_memory(&data, &options).map_err(|e| {
                TransformError::ImageError {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                }
            })?)
        }
        // Non-UTF-8 SVGs are copied as-is
        ImageFormat::Svg => std::str::from_utf8(&data)
            .ok()
            .map(|svg| minify_svg(svg).into_bytes()),
        _ => None,
    };

    let data = match optimized {
        Some(smaller) if smaller.len() < data.len() => smaller,
        _ => data,
    };

    Ok(OptimizedImage {
        data,
        original_size,
    })
}

static XML_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>").expect("Invalid XML declaration regex"));

static DOCTYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<!DOCTYPE[^>\[]*(\[.*?\])?\s*>").expect("Invalid doctype regex")
});

static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("Invalid comment regex"));

static METADATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<metadata\b.*?</metadata\s*>").expect("Invalid metadata regex")
});

static INTER_TAG_SPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("Invalid whitespace regex"));

/// Strip what renders to nothing: the XML declaration, doctype, comments,
/// `<metadata>` and whitespace between tags.
///
/// Comments starting with `<!--!` are kept. Whitespace is left alone when the
/// document has `<text>` content or asks for `xml:space="preserve"`.
pub fn minify_svg(svg: &str) -> String {
    let svg = XML_DECLARATION.replace_all(svg, "");
    let svg = DOCTYPE.replace_all(&svg, "");
    let svg = COMMENT.replace_all(&svg, |caps: &Captures| {
        let comment = &caps[0];
        if comment.starts_with("<!--!") {
            comment.to_string()
        } else {
            String::new()
        }
    });
    let svg = METADATA.replace_all(&svg, "");

    if svg.contains("<text") || svg.contains("xml:space=\"preserve\"") {
        svg.trim().to_string()
    } else {
        INTER_TAG_SPACE.replace_all(&svg, "><").trim().to_string()
    }
}
