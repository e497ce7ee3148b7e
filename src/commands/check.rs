// ABOUTME: Check command implementation.
// ABOUTME: Validates configuration and fleet snapshot, then reports drift worth an operator's attention.

use super::offline_platform;
use hangar::config::{Config, DnsConfig};
use hangar::diagnostics::{Diagnostics, Warning};
use hangar::error::Result;
use hangar::output::{Output, OutputMode};
use hangar::platform::Platform;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;

#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    load_balancers: usize,
    instances: usize,
    appservers: usize,
    active_appservers: usize,
    dirty_load_balancers: Vec<u64>,
    warnings: &'a [Warning],
}

pub async fn check(config: Config, fleet: &Path, output: Output) -> Result<()> {
    output.progress(&format!("Checking fleet snapshot {}", fleet.display()));
    let platform = offline_platform(config, fleet)?;
    let mut diag = Diagnostics::default();

    if platform.config.load_balancer.disable_reconfiguration {
        diag.warn(Warning::load_balancer(
            "load balancer reconfiguration is disabled; every render is empty",
        ));
    }

    if let Some(dns) = &platform.config.dns {
        check_dns_token(dns, &mut diag);
    }

    let store = platform.store.as_ref();
    let load_balancers = store.load_balancers().await?;
    let mut dirty_load_balancers = Vec::new();
    for lb in load_balancers.iter().filter(|lb| lb.is_dirty()) {
        dirty_load_balancers.push(lb.id.get());
        diag.warn(Warning::load_balancer(format!(
            "load balancer {}: configuration version {} not deployed (deployed {})",
            lb.id, lb.configuration_version, lb.deployed_configuration_version
        )));
    }

    let instances = store.instances().await?;
    let (appservers, active_appservers) = check_appservers(&platform, &mut diag).await?;

    let report = CheckReport {
        load_balancers: load_balancers.len(),
        instances: instances.len(),
        appservers,
        active_appservers,
        dirty_load_balancers,
        warnings: diag.warnings(),
    };

    let mut human = String::new();
    let _ = writeln!(human, "Load balancers: {}", report.load_balancers);
    let _ = writeln!(human, "Instances:      {}", report.instances);
    let _ = writeln!(
        human,
        "AppServers:     {} ({} active)",
        report.appservers, report.active_appservers
    );
    if output.mode() != OutputMode::Json {
        for warning in diag.warnings() {
            output.warning(&warning.message);
        }
    }
    output.report(&human, &report);
    output.success(&format!(
        "Fleet snapshot is valid ({} warning(s))",
        diag.warnings().len()
    ));
    Ok(())
}

/// DNS updates on activation need the provider token to resolve.
fn check_dns_token(dns: &DnsConfig, diag: &mut Diagnostics) {
    match (&dns.api_token, dns.api_token()) {
        (None, _) => diag.warn(Warning::dns(format!(
            "dns: no api_token configured for zone {}",
            dns.zone
        ))),
        (Some(token), Err(e)) => diag.warn(Warning::dns(format!(
            "dns: api_token from {} cannot be resolved: {}",
            token.source(),
            e
        ))),
        (Some(_), Ok(_)) => {}
    }
}

/// Count appservers and flag active ones the load balancer cannot route to.
async fn check_appservers(platform: &Platform, diag: &mut Diagnostics) -> Result<(usize, usize)> {
    let store = platform.store.as_ref();
    let mut total = 0;
    let mut active = 0;
    for instance in store.instances().await? {
        let appservers = store.appservers_for_instance(instance.id).await?;
        total += appservers.len();
        let live_active: Vec<_> = appservers
            .iter()
            .filter(|a| a.is_active && !a.is_terminated())
            .collect();
        active += live_active.len();

        if !live_active.is_empty() && instance.load_balancing_server.is_none() {
            diag.warn(Warning::load_balancer(format!(
                "instance {}: has active appservers but no load balancer",
                instance.id
            )));
        }
        for appserver in live_active {
            let server = store.server(appserver.server_id).await?;
            if server.public_ip.is_none() {
                diag.warn(Warning::appserver(format!(
                    "appserver {}: active without a public address",
                    appserver.id
                )));
            }
        }
    }
    Ok((total, active))
}
