//! Asset build command.

use anyhow::{Context, Result};
use sitesmith_build::{BuildReport, Builder, Plan, SiteConfig};

/// Run the full build plan and return its report.
pub async fn build(site: SiteConfig) -> Result<BuildReport> {
    let report = tokio::task::spawn_blocking(move || Builder::new(site).run(&Plan::build()))
        .await
        .context("Build panicked")?
        .context("Build failed")?;

    tracing::info!(
        "Built {} files in {}ms",
        report.files_written(),
        report.duration_ms
    );

    Ok(report)
}

/// Run the build command.
pub async fn run(site: SiteConfig) -> Result<()> {
    tracing::info!("Building assets...");

    let report = build(site).await?;

    tracing::info!("Output: {}", report.output_dir.display());

    Ok(())
}
