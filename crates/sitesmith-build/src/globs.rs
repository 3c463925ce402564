//! Glob-based source selection.
//!
//! A [`PathSet`] is an ordered list of patterns relative to the project root.
//! Patterns starting with `!` exclude. Files keep their path relative to the
//! literal base of the pattern that selected them, so `src/html/**/*.html`
//! maps `src/html/about/team.html` to `about/team.html`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

/// Characters that make a path component a glob.
const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Errors that can occur when selecting files.
#[derive(Debug, thiserror::Error)]
pub enum GlobError {
    #[error("Invalid glob pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("File not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to walk {path}: {message}")]
    WalkError { path: PathBuf, message: String },
}

/// A file selected by a [`PathSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk
    pub path: PathBuf,

    /// Path relative to the selecting pattern's base
    pub relative: PathBuf,
}

#[derive(Debug, Clone)]
struct Pattern {
    raw: String,
    base: PathBuf,
    singular: bool,
    matcher: GlobMatcher,
}

/// An ordered set of include and exclude globs.
#[derive(Debug, Clone)]
pub struct PathSet {
    patterns: Vec<Pattern>,
    exclude: GlobSet,
}

impl PathSet {
    /// Compile a list of patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, GlobError> {
        let mut included = Vec::new();
        let mut exclude = GlobSetBuilder::new();

        for raw in patterns {
            let raw = raw.as_ref();

            if let Some(negated) = raw.strip_prefix('!') {
                exclude.add(compile(negated)?);
                continue;
            }

            included.push(Pattern {
                raw: raw.to_string(),
                base: glob_base(raw),
                singular: !is_glob(raw),
                matcher: compile(raw)?.compile_matcher(),
            });
        }

        let exclude = exclude.build().map_err(|e| GlobError::InvalidPattern {
            pattern: patterns
                .iter()
                .map(|p| p.as_ref())
                .collect::<Vec<_>>()
                .join(", "),
            message: e.to_string(),
        })?;

        Ok(Self {
            patterns: included,
            exclude,
        })
    }

    /// Whether a root-relative path is selected by this set.
    pub fn matches(&self, relative: &Path) -> bool {
        !self.exclude.is_match(relative)
            && self.patterns.iter().any(|p| p.matcher.is_match(relative))
    }

    /// Resolve the set against `root`.
    ///
    /// Literal paths are returned in declaration order and must exist. Glob
    /// matches are sorted per pattern. A file selected twice is returned once.
    pub fn expand(&self, root: &Path) -> Result<Vec<SourceFile>, GlobError> {
        let mut files = Vec::new();
        let mut seen = HashSet::new();

        for pattern in &self.patterns {
            if pattern.singular {
                let path = root.join(&pattern.raw);
                if !path.is_file() {
                    return Err(GlobError::NotFound(path));
                }
                if self.exclude.is_match(&pattern.raw) {
                    continue;
                }

                let relative = path
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(&pattern.raw));

                if seen.insert(path.clone()) {
                    files.push(SourceFile { path, relative });
                }
                continue;
            }

            let base = root.join(&pattern.base);
            if !base.is_dir() {
                continue;
            }

            let mut matched = Vec::new();
            for entry in WalkDir::new(&base).follow_links(true) {
                let entry = entry.map_err(|e| GlobError::WalkError {
                    path: base.clone(),
                    message: e.to_string(),
                })?;

                if !entry.file_type().is_file() {
                    continue;
                }

                let path = entry.path();
                let Ok(from_root) = path.strip_prefix(root) else {
                    continue;
                };

                if !pattern.matcher.is_match(from_root) || self.exclude.is_match(from_root) {
                    continue;
                }

                let relative = path.strip_prefix(&base).unwrap_or(path).to_path_buf();
                matched.push(SourceFile {
                    path: path.to_path_buf(),
                    relative,
                });
            }

            matched.sort_by(|a, b| a.path.cmp(&b.path));
            for file in matched {
                if seen.insert(file.path.clone()) {
                    files.push(file);
                }
            }
        }

        Ok(files)
    }
}

/// The literal leading directories of a pattern.
///
/// For a pattern with no glob characters, the base is its parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = pattern.strip_prefix('!').unwrap_or(pattern);

    if !is_glob(pattern) {
        return Path::new(pattern)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
    }

    pattern
        .split('/')
        .take_while(|component| !component.contains(GLOB_CHARS))
        .collect::<Vec<_>>()
        .join("/")
        .into()
}

fn is_glob(pattern: &str) -> bool {
    pattern.contains(GLOB_CHARS)
}

fn compile(pattern: &str) -> Result<Glob, GlobError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map_err(|e| GlobError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}
