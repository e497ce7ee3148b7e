// ABOUTME: plan-retention command implementation.
// ABOUTME: Prints the retention decision for every appserver of an instance without terminating any.

use super::offline_platform;
use chrono::{DateTime, Utc};
use hangar::config::Config;
use hangar::error::{Error, Result};
use hangar::ops::Operations;
use hangar::output::Output;
use hangar::types::InstanceId;
use std::fmt::Write as _;
use std::path::Path;

pub async fn plan_retention(
    config: Config,
    fleet: &Path,
    id: u64,
    days: Option<u32>,
    now: Option<&str>,
    output: Output,
) -> Result<()> {
    let now = match now {
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map_err(|e| Error::Operation(format!("invalid --now '{raw}': {e}")))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };
    let days = days.unwrap_or(config.orchestration.retention_days);
    let platform = offline_platform(config, fleet)?;
    let instance = InstanceId::new(id);

    output.progress(&format!(
        "Retention plan for instance {instance} ({days} day(s), at {})",
        now.to_rfc3339()
    ));
    let plan = Operations::new(&platform)
        .plan_retention(instance, days, now)
        .await
        .map_err(|e| Error::Operation(e.to_string()))?;

    let mut human = String::new();
    for entry in &plan.entries {
        let _ = writeln!(
            human,
            "{:>6}  {:<32} {:<24} {}  {}",
            entry.appserver.get(),
            entry.name,
            entry.status,
            entry.created.format("%Y-%m-%d %H:%M"),
            entry.decision.label()
        );
    }
    output.report(&human, &plan);
    output.success(&format!(
        "{} of {} appserver(s) would be terminated",
        plan.to_terminate().count(),
        plan.entries.len()
    ));
    Ok(())
}
