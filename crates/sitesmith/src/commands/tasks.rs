//! Task listing command.

use sitesmith_build::Plan;

/// Print the composed task plans.
pub fn run() {
    tracing::info!("build   = {}", Plan::build());
    tracing::info!("default = {}", Plan::default_plan());
}
