// ABOUTME: render-lb command implementation.
// ABOUTME: Dry-run of the aggregator for one load balancer; nothing is applied or locked.

use super::offline_platform;
use hangar::config::Config;
use hangar::error::{Error, Result};
use hangar::lb::LoadBalancerConfiguration;
use hangar::ops::Operations;
use hangar::output::Output;
use hangar::types::LoadBalancerId;
use std::path::Path;

pub async fn render_lb(config: Config, fleet: &Path, id: u64, output: Output) -> Result<()> {
    let platform = offline_platform(config, fleet)?;
    let lb = LoadBalancerId::new(id);
    output.progress(&format!("Rendering load balancer {lb}"));

    let rendered = Operations::new(&platform)
        .render_load_balancer(lb)
        .await
        .map_err(|e| Error::Operation(format!("load balancer {lb}: {e}")))?;

    if rendered.is_empty() {
        output.warning(&format!("load balancer {lb}: rendered configuration is empty"));
    }
    output.report(&render_text(&rendered), &rendered);
    Ok(())
}

fn render_text(rendered: &LoadBalancerConfiguration) -> String {
    let mut text = String::from("# backend map\n");
    text.push_str(&rendered.backend_map);
    text.push_str("\n# backends\n");
    text.push_str(&rendered.backend_conf);
    text
}
