//! File transforms used by the sitesmith pipeline.
//!
//! Each module wraps one transform: HTML partial inclusion, whitespace-collapsing
//! HTML minification, SCSS compilation with CSS minification, JavaScript
//! minification and lossless image optimization (PNG recompression, SVG
//! minification).

pub mod error;
pub mod html;
pub mod images;
pub mod include;
pub mod scripts;
pub mod styles;

pub use error::TransformError;
pub use html::minify_html;
pub use images::{minify_svg, optimize_image, ImageFormat, OptimizedImage};
pub use include::{FileInclude, IncludeError};
pub use scripts::{concat_scripts, minify_js};
pub use styles::{compile_scss, minify_css};
