//! Preview a built site without watching the sources.

use std::path::PathBuf;

use anyhow::Result;
use sitesmith_server::DevServer;

use crate::commands::dev::server_config;
use crate::config::LoadedConfig;

/// Serve the output directory, or `dir` relative to the project root.
pub async fn run(
    loaded: LoadedConfig,
    port: Option<u16>,
    dir: Option<PathBuf>,
    open: bool,
) -> Result<()> {
    let LoadedConfig { mut site, server } = loaded;
    if let Some(dir) = dir {
        site.output_dir = dir;
    }

    let output = site.output_root();
    if !output.is_dir() {
        anyhow::bail!(
            "Directory not found: {}. Run 'sitesmith build' first.",
            output.display()
        );
    }

    DevServer::new(server_config(site, server, port, open))
        .preview()
        .await?;

    Ok(())
}
