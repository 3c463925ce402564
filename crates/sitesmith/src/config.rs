//! Configuration file (sitesmith.toml).
//!
//! Every field is optional; anything left out keeps the pipeline default.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use sitesmith_build::{SiteConfig, Target};

/// Configuration file structure.
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub build: BuildSettings,
    #[serde(default)]
    pub html: TargetSettings,
    #[serde(default)]
    pub styles: TargetSettings,
    #[serde(default)]
    pub vendor_styles: TargetSettings,
    #[serde(default)]
    pub scripts: TargetSettings,
    #[serde(default)]
    pub vendor_scripts: TargetSettings,
    #[serde(default)]
    pub images: TargetSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    output: Option<PathBuf>,
    minify: Option<bool>,
    include_prefix: Option<String>,
    load_paths: Option<Vec<PathBuf>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TargetSettings {
    src: Option<Vec<String>>,
    watch: Option<Vec<String>>,
    dest: Option<PathBuf>,
    rename: Option<String>,
}

impl TargetSettings {
    fn apply(self, target: &mut Target) {
        if let Some(src) = self.src {
            target.src = src;
        }
        if let Some(watch) = self.watch {
            target.watch = watch;
        }
        if let Some(dest) = self.dest {
            target.dest = dest;
        }
        if let Some(rename) = self.rename {
            target.rename = Some(rename);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    pub port: Option<u16>,
    pub host: Option<String>,
    pub open: Option<bool>,
}

/// A loaded configuration and the directory it applies to.
#[derive(Debug)]
pub struct LoadedConfig {
    pub site: SiteConfig,
    pub server: ServerSettings,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<LoadedConfig> {
    if !path.exists() {
        tracing::debug!("{} not found, using defaults", path.display());
        return Ok(ConfigFile::default().into_loaded(PathBuf::from(".")));
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    tracing::info!("Loaded config from {}", path.display());

    let root = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    Ok(file.into_loaded(root))
}

impl ConfigFile {
    fn into_loaded(self, root: PathBuf) -> LoadedConfig {
        let mut site = SiteConfig::with_root(root);

        if let Some(output) = self.build.output {
            site.output_dir = output;
        }
        if let Some(minify) = self.build.minify {
            site.minify = minify;
        }
        if let Some(prefix) = self.build.include_prefix {
            site.include_prefix = prefix;
        }
        if let Some(load_paths) = self.build.load_paths {
            site.load_paths = load_paths;
        }

        self.html.apply(&mut site.html);
        self.styles.apply(&mut site.styles);
        self.vendor_styles.apply(&mut site.vendor_styles);
        self.scripts.apply(&mut site.scripts);
        self.vendor_scripts.apply(&mut site.vendor_scripts);
        self.images.apply(&mut site.images);

        LoadedConfig {
            site,
            server: self.server,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let loaded = load_config(&temp.path().join("sitesmith.toml")).unwrap();

        assert_eq!(loaded.site.output_dir, PathBuf::from("dist"));
        assert_eq!(loaded.site.root, PathBuf::from("."));
        assert!(loaded.server.port.is_none());
    }

    #[test]
    fn overrides_selected_fields() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("sitesmith.toml");
        fs::write(
            &path,
            r#"
[build]
output = "public"
minify = false

[vendor_scripts]
src = ["node_modules/jquery/dist/jquery.min.js"]

[styles]
dest = "css"

[server]
port = 8080
"#,
        )
        .unwrap();

        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.site.root, temp.path());
        assert_eq!(loaded.site.output_dir, PathBuf::from("public"));
        assert!(!loaded.site.minify);
        assert_eq!(loaded.site.vendor_scripts.src.len(), 1);
        assert_eq!(loaded.site.styles.dest, PathBuf::from("css"));
        assert_eq!(loaded.site.styles.src, vec!["src/scss/main.scss"]);
        assert_eq!(loaded.site.styles.rename.as_deref(), Some("main.css"));
        assert_eq!(loaded.server.port, Some(8080));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("sitesmith.toml");
        fs::write(&path, "[build]\nminify = \"yes\"").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("sitesmith.toml");
        fs::write(&path, "[stlyes]\ndest = \"css\"").unwrap();

        assert!(load_config(&path).is_err());
    }
}
