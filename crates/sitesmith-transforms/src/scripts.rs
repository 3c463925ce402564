//! JavaScript minification and bundling.

use std::fs;
use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_span::SourceType;

use crate::error::TransformError;

/// Number of parser diagnostics included in an error message.
const MAX_REPORTED_ERRORS: usize = 3;

/// Minify a JavaScript source file.
///
/// The source is parsed as a classic script, so top-level declarations keep
/// their names and stay reachable from inline handlers and other scripts.
pub fn minify_js(source: &str, path: &Path) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();

    if parsed.panicked || !parsed.errors.is_empty() {
        let message = parsed
            .errors
            .iter()
            .take(MAX_REPORTED_ERRORS)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");

        return Err(TransformError::JsError {
            path: path.to_path_buf(),
            message: if message.is_empty() {
                "parser aborted".to_string()
            } else {
                message
            },
        });
    }

    let mut program = parsed.program;
    let minified = Minifier::new(MinifierOptions::default()).build(&allocator, &mut program);

    let code = Codegen::new()
        .with_options(CodegenOptions::minify())
        .with_scoping(minified.scoping)
        .build(&program)
        .code;

    Ok(code)
}

/// Concatenate script files in order, separated by newlines.
pub fn concat_scripts(files: &[PathBuf]) -> Result<String, TransformError> {
    let mut parts = Vec::with_capacity(files.len());

    for file in files {
        let content = fs::read_to_string(file).map_err(|e| TransformError::ReadError {
            path: file.clone(),
            source: e,
        })?;
        parts.push(content);
    }

    Ok(parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn minifies_scripts() {
        let source = r#"
// Toggle the mobile menu
function toggleMenu(button) {
    var expanded = button.getAttribute("aria-expanded") === "true";
    button.setAttribute("aria-expanded", String(!expanded));
}

document.addEventListener("DOMContentLoaded", function () {
    var button = document.querySelector(".menu-toggle");
    if (button) {
        button.addEventListener("click", function () { toggleMenu(button); });
    }
});
"#;

        let minified = minify_js(source, Path::new("main.js")).unwrap();

        assert!(minified.len() < source.len());
        assert!(!minified.contains("Toggle the mobile menu"));
        assert!(minified.contains("toggleMenu"));
        assert!(minified.contains("DOMContentLoaded"));
    }

    #[test]
    fn reports_syntax_errors() {
        let err = minify_js("function (", Path::new("src/js/main.js")).unwrap_err();

        match err {
            TransformError::JsError { path, message } => {
                assert_eq!(path, PathBuf::from("src/js/main.js"));
                assert!(!message.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn concatenates_in_order() {
        let temp = tempdir().unwrap();
        let a = temp.path().join("jquery.min.js");
        let b = temp.path().join("plugin.min.js");
        fs::write(&a, "var $=1;").unwrap();
        fs::write(&b, "$.plugin=2;").unwrap();

        let bundle = concat_scripts(&[b.clone(), a.clone()]).unwrap();

        assert_eq!(bundle, "$.plugin=2;\nvar $=1;");
    }

    #[test]
    fn missing_vendor_file_is_an_error() {
        let temp = tempdir().unwrap();
        let missing = temp.path().join("gone.js");

        let err = concat_scripts(&[missing.clone()]).unwrap_err();

        assert!(err.to_string().contains("gone.js"));
    }
}
