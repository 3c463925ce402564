//! Task execution.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use sitesmith_transforms::{
    compile_scss, concat_scripts, minify_css, minify_html, minify_js, optimize_image, FileInclude,
    IncludeError, TransformError,
};

use crate::config::{SiteConfig, Target};
use crate::globs::{glob_base, GlobError, PathSet, SourceFile};
use crate::tasks::{Plan, TaskName};

/// Outcome of one task.
#[derive(Debug, Clone)]
pub struct TaskReport {
    /// Task that ran
    pub task: TaskName,

    /// Files written
    pub files: Vec<PathBuf>,

    /// Bytes saved by optimization (images only)
    pub bytes_saved: u64,

    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Outcome of running a plan.
#[derive(Debug)]
pub struct BuildReport {
    /// Reports in completion order
    pub tasks: Vec<TaskReport>,

    /// Total time in milliseconds
    pub duration_ms: u64,

    /// Output directory
    pub output_dir: PathBuf,
}

impl BuildReport {
    /// Total number of files written.
    pub fn files_written(&self) -> usize {
        self.tasks.iter().map(|t| t.files.len()).sum()
    }
}

/// Errors that can occur while running tasks.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{task}: {source}")]
    Glob { task: TaskName, source: GlobError },

    #[error("{task}: {source}")]
    Include {
        task: TaskName,
        source: IncludeError,
    },

    #[error("{task}: {source}")]
    Transform {
        task: TaskName,
        source: TransformError,
    },

    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Refusing to clean {path}: it must be a directory inside {root} holding no sources")]
    UnsafeClean { path: PathBuf, root: PathBuf },

    #[error("Task '{0}' is not a file task")]
    NotRunnable(TaskName),
}

/// Runs pipeline tasks against a configuration.
pub struct Builder {
    config: SiteConfig,
    include: FileInclude,
}

impl Builder {
    /// Create a builder for the given configuration.
    pub fn new(config: SiteConfig) -> Self {
        let include = FileInclude::new(&config.include_prefix);
        Self { config, include }
    }

    /// The configuration this builder runs with.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Run a plan: series children in order, parallel children concurrently.
    pub fn run(&self, plan: &Plan) -> Result<BuildReport, TaskError> {
        let start = Instant::now();
        let tasks = self.execute(plan)?;

        Ok(BuildReport {
            tasks,
            duration_ms: start.elapsed().as_millis() as u64,
            output_dir: self.config.output_root(),
        })
    }

    fn execute(&self, plan: &Plan) -> Result<Vec<TaskReport>, TaskError> {
        match plan {
            Plan::Task(task) => Ok(vec![self.run_task(*task)?]),
            Plan::Series(children) => {
                let mut reports = Vec::new();
                for child in children {
                    reports.extend(self.execute(child)?);
                }
                Ok(reports)
            }
            Plan::Parallel(children) => {
                let results: Vec<Result<Vec<TaskReport>, TaskError>> =
                    children.par_iter().map(|child| self.execute(child)).collect();

                let mut reports = Vec::new();
                for result in results {
                    reports.extend(result?);
                }
                Ok(reports)
            }
        }
    }

    /// Run a single task and log its timing.
    pub fn run_task(&self, task: TaskName) -> Result<TaskReport, TaskError> {
        let start = Instant::now();
        tracing::info!("Starting '{}'...", task);

        let result = match task {
            TaskName::Clean => self.clean().map(|()| (Vec::new(), 0)),
            TaskName::Html => self.html().map(|files| (files, 0)),
            TaskName::Styles => self.styles(&self.config.styles, task).map(|f| (f, 0)),
            TaskName::VendorStyles => self
                .styles(&self.config.vendor_styles, task)
                .map(|f| (f, 0)),
            TaskName::Scripts => self.scripts().map(|files| (files, 0)),
            TaskName::VendorScripts => self.vendor_scripts().map(|files| (files, 0)),
            TaskName::Images => self.images(),
            TaskName::Serve => Err(TaskError::NotRunnable(task)),
        };

        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((files, bytes_saved)) => {
                tracing::info!(
                    "Finished '{}' after {}ms ({} files)",
                    task,
                    duration_ms,
                    files.len()
                );
                Ok(TaskReport {
                    task,
                    files,
                    bytes_saved,
                    duration_ms,
                })
            }
            Err(e) => {
                tracing::error!("'{}' errored after {}ms", task, duration_ms);
                Err(e)
            }
        }
    }

    /// Remove the output directory.
    fn clean(&self) -> Result<(), TaskError> {
        let output = self.config.output_root();
        if !output.exists() {
            return Ok(());
        }

        let unsafe_clean = || TaskError::UnsafeClean {
            path: output.clone(),
            root: self.config.root.clone(),
        };

        let root = fs::canonicalize(&self.config.root).map_err(|_| unsafe_clean())?;
        let target = fs::canonicalize(&output).map_err(|_| unsafe_clean())?;

        if target == root || !target.starts_with(&root) || !target.is_dir() {
            return Err(unsafe_clean());
        }

        if self
            .source_bases(&root)
            .iter()
            .any(|base| base.starts_with(&target))
        {
            return Err(unsafe_clean());
        }

        fs::remove_dir_all(&target).map_err(|e| TaskError::WriteError {
            path: target.clone(),
            source: e,
        })?;

        tracing::debug!("Removed {}", target.display());
        Ok(())
    }

    /// Directories every target reads from, resolved under `root`.
    fn source_bases(&self, root: &Path) -> Vec<PathBuf> {
        TaskName::ASSETS
            .iter()
            .filter_map(|task| self.config.target(*task))
            .flat_map(|target| target.src.iter().chain(target.watch.iter()))
            .filter(|pattern| !pattern.starts_with('!'))
            .map(|pattern| {
                let base = glob_base(pattern);
                fs::canonicalize(self.config.root.join(&base)).unwrap_or_else(|_| root.join(base))
            })
            .collect()
    }

    /// Expand includes in each page, then minify it.
    fn html(&self) -> Result<Vec<PathBuf>, TaskError> {
        let target = &self.config.html;
        let sources = self.sources(TaskName::Html, target)?;

        sources
            .par_iter()
            .map(|source| {
                let html = self
                    .include
                    .process_file(&source.path)
                    .map_err(|e| TaskError::Include {
                        task: TaskName::Html,
                        source: e,
                    })?;

                let html = if self.config.minify {
                    minify_html(&html)
                } else {
                    html
                };

                let path = self.output_path(target, &source.relative);
                write_output(&path, html.as_bytes())?;
                Ok(path)
            })
            .collect()
    }

    /// Compile SCSS entry points and minify the CSS.
    fn styles(&self, target: &Target, task: TaskName) -> Result<Vec<PathBuf>, TaskError> {
        let sources = self.sources(task, target)?;
        let load_paths = self.config.resolved_load_paths();
        let transform_err = |e: TransformError| TaskError::Transform { task, source: e };

        let mut written = Vec::new();
        for source in sources {
            let css = match compile_scss(&source.path, &load_paths) {
                Ok(css) => css,
                // A broken stylesheet is logged, not fatal
                Err(e @ TransformError::ScssError { .. }) => {
                    tracing::error!("{}", e);
                    continue;
                }
                Err(e) => return Err(transform_err(e)),
            };
            let css = if self.config.minify {
                minify_css(&css).map_err(transform_err)?
            } else {
                css
            };

            let path = self.output_path(target, &source.relative.with_extension("css"));
            write_output(&path, css.as_bytes())?;
            written.push(path);
        }

        Ok(written)
    }

    /// Minify the main script.
    fn scripts(&self) -> Result<Vec<PathBuf>, TaskError> {
        let target = &self.config.scripts;
        let sources = self.sources(TaskName::Scripts, target)?;
        let transform_err = |e: TransformError| TaskError::Transform {
            task: TaskName::Scripts,
            source: e,
        };

        let mut written = Vec::new();
        for source in sources {
            let js = fs::read_to_string(&source.path).map_err(|e| {
                transform_err(TransformError::ReadError {
                    path: source.path.clone(),
                    source: e,
                })
            })?;

            let js = if self.config.minify {
                minify_js(&js, &source.path).map_err(transform_err)?
            } else {
                js
            };

            let path = self.output_path(target, &source.relative);
            write_output(&path, js.as_bytes())?;
            written.push(path);
        }

        Ok(written)
    }

    /// Concatenate vendor scripts into one bundle.
    fn vendor_scripts(&self) -> Result<Vec<PathBuf>, TaskError> {
        let target = &self.config.vendor_scripts;
        let sources = self.sources(TaskName::VendorScripts, target)?;
        if sources.is_empty() {
            return Ok(Vec::new());
        }

        let paths: Vec<PathBuf> = sources.into_iter().map(|s| s.path).collect();
        let bundle = concat_scripts(&paths).map_err(|e| TaskError::Transform {
            task: TaskName::VendorScripts,
            source: e,
        })?;

        let name = target.rename.as_deref().unwrap_or("vendor.js");
        let path = self.config.dest_dir(target).join(name);
        write_output(&path, bundle.as_bytes())?;

        Ok(vec![path])
    }

    /// Optimize images, returning written files and bytes saved.
    fn images(&self) -> Result<(Vec<PathBuf>, u64), TaskError> {
        let target = &self.config.images;
        let sources = self.sources(TaskName::Images, target)?;

        let results: Vec<Result<(PathBuf, u64), TaskError>> = sources
            .par_iter()
            .map(|source| {
                let transform_err = |e: TransformError| TaskError::Transform {
                    task: TaskName::Images,
                    source: e,
                };

                let data = fs::read(&source.path).map_err(|e| {
                    transform_err(TransformError::ReadError {
                        path: source.path.clone(),
                        source: e,
                    })
                })?;

                let image = optimize_image(&source.path, data).map_err(transform_err)?;
                if image.saved() > 0 {
                    tracing::debug!(
                        "{}: saved {} bytes",
                        source.relative.display(),
                        image.saved()
                    );
                }

                let path = self.output_path(target, &source.relative);
                write_output(&path, &image.data)?;
                Ok((path, image.saved()))
            })
            .collect();

        let mut written = Vec::new();
        let mut saved = 0;
        for result in results {
            let (path, bytes) = result?;
            written.push(path);
            saved += bytes;
        }

        if saved > 0 {
            tracing::info!("Images: saved {} bytes", saved);
        }

        Ok((written, saved))
    }

    fn sources(&self, task: TaskName, target: &Target) -> Result<Vec<SourceFile>, TaskError> {
        let set = PathSet::new(&target.src).map_err(|e| TaskError::Glob { task, source: e })?;
        set.expand(&self.config.root)
            .map_err(|e| TaskError::Glob { task, source: e })
    }

    /// Output location for a source file, honouring the target's rename.
    fn output_path(&self, target: &Target, relative: &Path) -> PathBuf {
        let dest = self.config.dest_dir(target);
        match &target.rename {
            Some(name) => dest.join(name),
            None => dest.join(relative),
        }
    }
}

fn write_output(path: &Path, contents: &[u8]) -> Result<(), TaskError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TaskError::WriteError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    fs::write(path, contents).map_err(|e| TaskError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })
}
