//! Pipeline configuration.

use std::path::PathBuf;

use crate::globs::{GlobError, PathSet};
use crate::tasks::TaskName;

/// Third-party scripts bundled into `vendor.js`, in load order.
pub const DEFAULT_VENDOR_SCRIPTS: &[&str] = &[
    "node_modules/jquery/dist/jquery.min.js",
    "node_modules/bootstrap/dist/js/bootstrap.bundle.min.js",
    "node_modules/slick-carousel/slick/slick.min.js",
    "node_modules/jquery-match-height/dist/jquery.matchHeight-min.js",
    "node_modules/jquery-validation/dist/jquery.validate.min.js",
    "node_modules/wowjs/dist/wow.min.js",
    "node_modules/@fancyapps/fancybox/dist/jquery.fancybox.min.js",
    "node_modules/select2/dist/js/select2.min.js",
];

/// Inputs and output location for one asset task.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    /// Source globs, `!` prefix excludes
    pub src: Vec<String>,

    /// Globs that retrigger the task in dev mode
    pub watch: Vec<String>,

    /// Destination directory, relative to the output directory
    pub dest: PathBuf,

    /// Output filename replacing the source's relative path
    pub rename: Option<String>,
}

impl Target {
    fn new(src: &[&str], watch: &[&str], dest: &str, rename: Option<&str>) -> Self {
        Self {
            src: src.iter().map(|s| s.to_string()).collect(),
            watch: watch.iter().map(|s| s.to_string()).collect(),
            dest: PathBuf::from(dest),
            rename: rename.map(str::to_string),
        }
    }
}

/// Configuration for the whole pipeline.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Project root; every relative path resolves against it
    pub root: PathBuf,

    /// Output directory, removed and rebuilt by `build`
    pub output_dir: PathBuf,

    /// HTML pages with partial includes
    pub html: Target,

    /// Main stylesheet
    pub styles: Target,

    /// Vendor stylesheet
    pub vendor_styles: Target,

    /// Main script
    pub scripts: Target,

    /// Vendor scripts, concatenated in order
    pub vendor_scripts: Target,

    /// Images
    pub images: Target,

    /// Prefix for include directives and variables
    pub include_prefix: String,

    /// Extra SCSS import directories
    pub load_paths: Vec<PathBuf>,

    /// Minify HTML, CSS and JS output
    pub minify: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output_dir: PathBuf::from("dist"),
            html: Target::new(
                &["src/html/**/*.html", "!src/html/partials/**"],
                &["src/html/**/*.html"],
                "",
                None,
            ),
            styles: Target::new(
                &["src/scss/main.scss"],
                &["src/scss/**/*.scss"],
                "assets/css",
                Some("main.css"),
            ),
            vendor_styles: Target::new(
                &["src/scss/vendor.scss"],
                &["src/scss/vendor.scss"],
                "assets/css",
                Some("vendor.css"),
            ),
            scripts: Target::new(
                &["src/js/main.js"],
                &["src/js/**/*.js"],
                "assets/js",
                Some("main.js"),
            ),
            vendor_scripts: Target::new(DEFAULT_VENDOR_SCRIPTS, &[], "assets/js", Some("vendor.js")),
            images: Target::new(
                &["src/images/**/*"],
                &["src/images/**/*"],
                "assets/images",
                None,
            ),
            include_prefix: "@@".to_string(),
            load_paths: vec![PathBuf::from("node_modules")],
            minify: true,
        }
    }
}

impl SiteConfig {
    /// Create the default configuration rooted at `root`.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Absolute-or-root-relative output directory.
    pub fn output_root(&self) -> PathBuf {
        self.root.join(&self.output_dir)
    }

    /// Directory a target writes into.
    pub fn dest_dir(&self, target: &Target) -> PathBuf {
        self.output_root().join(&target.dest)
    }

    /// SCSS load paths resolved against the root.
    pub fn resolved_load_paths(&self) -> Vec<PathBuf> {
        self.load_paths.iter().map(|p| self.root.join(p)).collect()
    }

    /// The target a task reads from, if it is a file task.
    pub fn target(&self, task: TaskName) -> Option<&Target> {
        match task {
            TaskName::Html => Some(&self.html),
            TaskName::Styles => Some(&self.styles),
            TaskName::VendorStyles => Some(&self.vendor_styles),
            TaskName::Scripts => Some(&self.scripts),
            TaskName::VendorScripts => Some(&self.vendor_scripts),
            TaskName::Images => Some(&self.images),
            TaskName::Clean | TaskName::Serve => None,
        }
    }

    /// Compiled watch globs for every task that has them.
    pub fn watch_sets(&self) -> Result<Vec<(TaskName, PathSet)>, GlobError> {
        let mut sets = Vec::new();

        for task in TaskName::ASSETS {
            let Some(target) = self.target(task) else {
                continue;
            };
            if target.watch.is_empty() {
                continue;
            }
            sets.push((task, PathSet::new(&target.watch)?));
        }

        Ok(sets)
    }

    /// Directories the dev server should watch: the literal bases of every
    /// watch glob.
    pub fn watch_roots(&self) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = TaskName::ASSETS
            .iter()
            .filter_map(|task| self.target(*task))
            .flat_map(|target| target.watch.iter())
            .filter(|pattern| !pattern.starts_with('!'))
            .map(|pattern| self.root.join(crate::globs::glob_base(pattern)))
            .collect();

        roots.sort();
        roots.dedup();

        // Drop roots nested inside another root
        let mut unique: Vec<PathBuf> = Vec::new();
        for root in roots {
            if !unique.iter().any(|existing| root.starts_with(existing)) {
                unique.push(root);
            }
        }

        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    #[test]
    fn default_outputs_match_transforms() {
        let config = SiteConfig::default();

        let css = config.dest_dir(&config.styles);
        assert_eq!(css, PathBuf::from("./dist/assets/css"));
        assert_eq!(config.styles.src, vec!["src/scss/main.scss"]);
        assert_eq!(config.styles.rename.as_deref(), Some("main.css"));

        assert_eq!(config.vendor_styles.src, vec!["src/scss/vendor.scss"]);
        assert_eq!(config.vendor_styles.rename.as_deref(), Some("vendor.css"));

        assert_eq!(config.scripts.src, vec!["src/js/main.js"]);
        assert_eq!(
            config.dest_dir(&config.scripts),
            PathBuf::from("./dist/assets/js")
        );
        assert_eq!(config.scripts.rename.as_deref(), Some("main.js"));

        assert_eq!(config.vendor_scripts.rename.as_deref(), Some("vendor.js"));
        assert_eq!(config.vendor_scripts.src.len(), DEFAULT_VENDOR_SCRIPTS.len());
        assert!(config.vendor_scripts.watch.is_empty());

        assert_eq!(
            config.dest_dir(&config.images),
            PathBuf::from("./dist/assets/images")
        );
        assert_eq!(config.dest_dir(&config.html), PathBuf::from("./dist/"));
    }

    #[test]
    fn html_excludes_partials() {
        let config = SiteConfig::default();
        let set = PathSet::new(&config.html.src).unwrap();

        assert!(set.matches(Path::new("src/html/index.html")));
        assert!(set.matches(Path::new("src/html/about/team.html")));
        assert!(!set.matches(Path::new("src/html/partials/header.html")));
    }

    #[test]
    fn watch_sets_skip_vendor_scripts() {
        let config = SiteConfig::default();
        let tasks: Vec<TaskName> = config
            .watch_sets()
            .unwrap()
            .into_iter()
            .map(|(task, _)| task)
            .collect();

        assert_eq!(
            tasks,
            vec![
                TaskName::Html,
                TaskName::Styles,
                TaskName::VendorStyles,
                TaskName::Scripts,
                TaskName::Images,
            ]
        );
    }

    #[test]
    fn watch_roots_are_deduplicated() {
        let config = SiteConfig::with_root("/site");

        assert_eq!(
            config.watch_roots(),
            vec![
                PathBuf::from("/site/src/html"),
                PathBuf::from("/site/src/images"),
                PathBuf::from("/site/src/js"),
                PathBuf::from("/site/src/scss"),
            ]
        );
    }
}
