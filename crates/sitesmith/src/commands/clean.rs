//! Output cleanup command.

use anyhow::{Context, Result};
use sitesmith_build::{Builder, SiteConfig, TaskName};

/// Run the clean command.
pub async fn run(site: SiteConfig) -> Result<()> {
    let output = site.output_root();

    tokio::task::spawn_blocking(move || Builder::new(site).run_task(TaskName::Clean))
        .await
        .context("Clean task panicked")??;

    tracing::info!("Removed {}", output.display());

    Ok(())
}
