//! HTML partial inclusion.
//!
//! Supports `@@include('file')`, `@@include('file', { "var": "value" })` and
//! `@@include_once('file')`. Include paths resolve relative to the file that
//! contains the directive. Variables passed to an include are visible to that
//! file and to everything it includes, as `@@var` or `@@var.nested`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Directive names that are never treated as variables.
const KEYWORDS: &[&str] = &["include", "include_once"];

/// Errors that can occur when resolving includes.
#[derive(Debug, thiserror::Error)]
pub enum IncludeError {
    #[error("Failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Included file not found: {path} (included from {from})")]
    NotFound { path: PathBuf, from: PathBuf },

    #[error("Include cycle detected: {0}")]
    Cycle(String),

    #[error("Invalid include arguments in {path}: {message}")]
    InvalidArguments { path: PathBuf, message: String },
}

/// Per-page bookkeeping while expanding includes.
#[derive(Debug, Default)]
struct IncludeState {
    /// Files currently being expanded, outermost first
    stack: Vec<PathBuf>,

    /// Every file included so far
    seen: HashSet<PathBuf>,
}

/// Expands include directives in HTML sources.
#[derive(Debug, Clone)]
pub struct FileInclude {
    directive: Regex,
    variable: Regex,
}

impl FileInclude {
    /// Create an include processor using the given directive prefix.
    pub fn new(prefix: &str) -> Self {
        let prefix = regex::escape(prefix);

        let directive = Regex::new(&format!(r"{prefix}(include_once|include)\s*\("))
            .expect("escaped prefix forms a valid pattern");
        let variable = Regex::new(&format!(
            r"{prefix}([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*)*)"
        ))
        .expect("escaped prefix forms a valid pattern");

        Self {
            directive,
            variable,
        }
    }

    /// Read a file and expand every include in it.
    pub fn process_file(&self, path: &Path) -> Result<String, IncludeError> {
        let source = fs::read_to_string(path).map_err(|e| IncludeError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.process(&source, path)
    }

    /// Expand includes in `source`, treating it as the contents of `path`.
    pub fn process(&self, source: &str, path: &Path) -> Result<String, IncludeError> {
        let mut state = IncludeState::default();
        state.stack.push(canonical(path));

        self.expand(source, path, &Map::new(), &mut state)
    }

    fn expand(
        &self,
        source: &str,
        file: &Path,
        context: &Map<String, Value>,
        state: &mut IncludeState,
    ) -> Result<String, IncludeError> {
        let source = self.substitute(source, context);
        let base_dir = file.parent().unwrap_or(Path::new(""));

        let mut output = String::with_capacity(source.len());
        let mut cursor = 0;

        while let Some(caps) = self.directive.captures_at(&source, cursor) {
            let Some(whole) = caps.get(0) else {
                break;
            };
            let once = &caps[1] == "include_once";

            output.push_str(&source[cursor..whole.start()]);

            let (target, args, consumed) =
                parse_arguments(&source[whole.end()..]).map_err(|message| {
                    IncludeError::InvalidArguments {
                        path: file.to_path_buf(),
                        message,
                    }
                })?;
            cursor = whole.end() + consumed;

            let target_path = base_dir.join(&target);
            if !target_path.is_file() {
                return Err(IncludeError::NotFound {
                    path: target_path,
                    from: file.to_path_buf(),
                });
            }

            let key = canonical(&target_path);
            if state.stack.contains(&key) {
                let chain = state
                    .stack
                    .iter()
                    .chain(std::iter::once(&key))
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(" -> ");
                return Err(IncludeError::Cycle(chain));
            }

            let first_time = state.seen.insert(key.clone());
            if once && !first_time {
                continue;
            }

            let content = fs::read_to_string(&target_path).map_err(|e| IncludeError::ReadError {
                path: target_path.clone(),
                source: e,
            })?;

            let mut scope = context.clone();
            if let Some(vars) = args {
                scope.extend(vars);
            }

            state.stack.push(key);
            let rendered = self.expand(&content, &target_path, &scope, state)?;
            state.stack.pop();

            output.push_str(&rendered);
        }

        output.push_str(&source[cursor..]);
        Ok(output)
    }

    /// Replace `@@name` references with values from the context.
    fn substitute(&self, source: &str, context: &Map<String, Value>) -> String {
        if context.is_empty() {
            return source.to_string();
        }

        self.variable
            .replace_all(source, |caps: &Captures| {
                let name = &caps[1];
                if KEYWORDS.contains(&name) {
                    return caps[0].to_string();
                }

                match lookup(context, name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

impl Default for FileInclude {
    fn default() -> Self {
        Self::new("@@")
    }
}

/// Resolve a dotted variable name against the context.
fn lookup<'a>(context: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    let mut segments = name.split('.');
    let mut value = context.get(segments.next()?)?;

    for segment in segments {
        value = value.get(segment)?;
    }

    Some(value)
}

/// Parse `'path'` or `'path', { ... })` after the opening parenthesis.
///
/// Returns the path, the optional context object, and the number of bytes
/// consumed including the closing parenthesis.
fn parse_arguments(rest: &str) -> Result<(String, Option<Map<String, Value>>, usize), String> {
    let mut pos = skip_whitespace(rest, 0);

    let quote = match rest[pos..].chars().next() {
        Some(q @ ('\'' | '"')) => q,
        _ => return Err("expected a quoted file path".to_string()),
    };

    let start = pos + 1;
    let end = rest[start..]
        .find(quote)
        .map(|i| start + i)
        .ok_or_else(|| "unterminated file path".to_string())?;
    let target = rest[start..end].to_string();

    pos = skip_whitespace(rest, end + 1);

    let mut args = None;
    if rest[pos..].starts_with(',') {
        pos = skip_whitespace(rest, pos + 1);

        let mut stream = serde_json::Deserializer::from_str(&rest[pos..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(Value::Object(map))) => {
                args = Some(map);
                pos += stream.byte_offset();
            }
            Some(Ok(_)) => return Err("include context must be a JSON object".to_string()),
            Some(Err(e)) => return Err(e.to_string()),
            None => return Err("missing include context".to_string()),
        }

        pos = skip_whitespace(rest, pos);
    }

    if !rest[pos..].starts_with(')') {
        return Err("expected `)` after include arguments".to_string());
    }

    Ok((target, args, pos + 1))
}

fn skip_whitespace(s: &str, pos: usize) -> usize {
    let tail = &s[pos..];
    pos + (tail.len() - tail.trim_start().len())
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn includes_partial_relative_to_file() {
        let temp = tempdir().unwrap();
        write(temp.path(), "partials/header.html", "<header>Site</header>");
        let page = write(
            temp.path(),
            "index.html",
            "@@include('./partials/header.html')\n<main>Hi</main>",
        );

        let html = FileInclude::default().process_file(&page).unwrap();

        assert_eq!(html, "<header>Site</header>\n<main>Hi</main>");
    }

    #[test]
    fn passes_variables_to_partial() {
        let temp = tempdir().unwrap();
        write(
            temp.path(),
            "partials/head.html",
            "<title>@@title</title><meta name=\"n\" content=\"@@meta.count\">",
        );
        let page = write(
            temp.path(),
            "about.html",
            r#"@@include("partials/head.html", { "title": "About (us)", "meta": { "count": 3 } })"#,
        );

        let html = FileInclude::default().process_file(&page).unwrap();

        assert_eq!(
            html,
            "<title>About (us)</title><meta name=\"n\" content=\"3\">"
        );
    }

    #[test]
    fn nested_includes_inherit_variables() {
        let temp = tempdir().unwrap();
        write(temp.path(), "partials/nav/link.html", "<a>@@label @@page</a>");
        write(
            temp.path(),
            "partials/nav.html",
            "<nav>@@include('nav/link.html', {\"label\": \"Home\"})</nav>",
        );
        let page = write(
            temp.path(),
            "index.html",
            "@@include('partials/nav.html', {\"page\": \"index\", \"label\": \"outer\"})",
        );

        let html = FileInclude::default().process_file(&page).unwrap();

        assert_eq!(html, "<nav><a>Home index</a></nav>");
    }

    #[test]
    fn leaves_unknown_variables_untouched() {
        let temp = tempdir().unwrap();
        write(temp.path(), "p.html", "<p>@@known @@unknown</p>");
        let page = write(temp.path(), "index.html", "@@include('p.html', {\"known\": 1})");

        let html = FileInclude::default().process_file(&page).unwrap();

        assert_eq!(html, "<p>1 @@unknown</p>");
    }

    #[test]
    fn include_once_skips_repeats() {
        let temp = tempdir().unwrap();
        write(temp.path(), "style.html", "<style></style>");
        let page = write(
            temp.path(),
            "index.html",
            "@@include_once('style.html')@@include_once('style.html')|@@include('style.html')",
        );

        let html = FileInclude::default().process_file(&page).unwrap();

        assert_eq!(html, "<style></style>|<style></style>");
    }

    #[test]
    fn detects_cycles() {
        let temp = tempdir().unwrap();
        write(temp.path(), "a.html", "@@include('b.html')");
        write(temp.path(), "b.html", "@@include('a.html')");
        let page = temp.path().join("a.html");

        let err = FileInclude::default().process_file(&page).unwrap_err();

        assert!(matches!(err, IncludeError::Cycle(_)));
        assert!(err.to_string().contains("b.html"));
    }

    #[test]
    fn reports_missing_partial() {
        let temp = tempdir().unwrap();
        let page = write(temp.path(), "index.html", "@@include('nope.html')");

        let err = FileInclude::default().process_file(&page).unwrap_err();

        match err {
            IncludeError::NotFound { path, from } => {
                assert!(path.ends_with("nope.html"));
                assert_eq!(from, page);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_object_context() {
        let temp = tempdir().unwrap();
        write(temp.path(), "p.html", "x");
        let page = write(temp.path(), "index.html", "@@include('p.html', [1, 2])");

        let err = FileInclude::default().process_file(&page).unwrap_err();

        assert!(matches!(err, IncludeError::InvalidArguments { .. }));
    }

    #[test]
    fn supports_custom_prefix() {
        let temp = tempdir().unwrap();
        write(temp.path(), "p.html", "<b>$$name</b>");
        let page = write(temp.path(), "index.html", "$$include('p.html', {\"name\": \"x\"})");

        let html = FileInclude::new("$$").process_file(&page).unwrap();

        assert_eq!(html, "<b>x</b>");
    }
}
