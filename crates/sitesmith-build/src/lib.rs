//! Asset build pipeline for sitesmith.
//!
//! Selects source files with glob sets, runs them through the transforms in
//! `sitesmith-transforms`, and composes the per-asset tasks into series and
//! parallel plans.

pub mod builder;
pub mod config;
pub mod globs;
pub mod tasks;

pub use builder::{BuildReport, Builder, TaskError, TaskReport};
pub use config::{SiteConfig, Target};
pub use globs::{glob_base, GlobError, PathSet, SourceFile};
pub use tasks::{Plan, TaskName};
