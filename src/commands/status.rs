// ABOUTME: Status command implementation.
// ABOUTME: Shows one resource's state and the operations valid in it.

use super::offline_platform;
use crate::cli::KindArg;
use hangar::config::Config;
use hangar::error::{Error, Result};
use hangar::ops::Operations;
use hangar::output::Output;
use hangar::store::{ResourceKey, ResourceKind};
use std::path::Path;

pub async fn status(
    config: Config,
    fleet: &Path,
    kind: KindArg,
    id: u64,
    output: Output,
) -> Result<()> {
    let platform = offline_platform(config, fleet)?;
    let kind = match kind {
        KindArg::Instance => ResourceKind::Instance,
        KindArg::Appserver => ResourceKind::AppServer,
        KindArg::Server => ResourceKind::Server,
        KindArg::Lb => ResourceKind::LoadBalancer,
    };
    let status = Operations::new(&platform)
        .status(ResourceKey { kind, id })
        .await
        .map_err(|e| Error::Operation(e.to_string()))?;

    let operations = if status.available_operations.is_empty() {
        "none".to_string()
    } else {
        status.available_operations.join(", ")
    };
    let human = format!(
        "{}: {} ({})\n  {}\n  operations: {}\n",
        status.resource, status.name, status.state_id, status.description, operations
    );
    output.report(&human, &status);
    Ok(())
}
