// ABOUTME: DNS records pointing an instance's routed domains at its load balancer.
// ABOUTME: Set on activation, removed on archive; names are relative to the managed zone.

use crate::platform::Platform;
use crate::resources::Instance;
use crate::services::{DeleteOutcome, DnsRecord, RecordType};

use super::error::LifecycleError;

/// Point every routed domain of `instance` at its load balancer with a
/// CNAME record. Returns the records written.
///
/// Does nothing when DNS is not configured or the instance has no load
/// balancer. Domains outside the zone and the zone apex are skipped.
pub async fn point_domains_at_load_balancer(
    platform: &Platform,
    instance: &Instance,
) -> Result<Vec<DnsRecord>, LifecycleError> {
    let (Some(dns), Some(settings)) = (&platform.dns, &platform.config.dns) else {
        tracing::debug!("instance {}: DNS not configured, skipping", instance.id);
        return Ok(Vec::new());
    };
    let Some(lb_id) = instance.load_balancing_server else {
        tracing::debug!("instance {}: no load balancer, skipping DNS", instance.id);
        return Ok(Vec::new());
    };
    let lb = platform.store.load_balancer(lb_id).await?;

    let mut written = Vec::new();
    for domain in instance.routed_domains() {
        let Some(name) = domain.relative_to(settings.zone.as_str()) else {
            tracing::warn!("{} is outside zone {}, not touching DNS", domain, settings.zone);
            continue;
        };
        if name == "@" {
            tracing::warn!("{} is the zone apex, which cannot be a CNAME", domain);
            continue;
        }

        let record = DnsRecord {
            zone: settings.zone.to_lowercase(),
            name,
            record_type: RecordType::Cname,
            value: lb.domain.to_lowercase(),
            ttl: settings.ttl,
        };
        dns.set_record(&record).await?;
        tracing::info!("DNS: {}", record);
        written.push(record);
    }
    Ok(written)
}

/// Remove the records written by [`point_domains_at_load_balancer`].
/// Returns the outcome per domain; failures are left to the caller.
pub async fn remove_domain_records(
    platform: &Platform,
    instance: &Instance,
) -> Vec<(String, DeleteOutcome)> {
    let (Some(dns), Some(settings)) = (&platform.dns, &platform.config.dns) else {
        return Vec::new();
    };

    let mut outcomes = Vec::new();
    for domain in instance.routed_domains() {
        let Some(name) = domain.relative_to(settings.zone.as_str()) else {
            continue;
        };
        if name == "@" {
            continue;
        }
        let outcome = dns
            .remove_record(&settings.zone.to_lowercase(), &name, RecordType::Cname)
            .await;
        outcomes.push((domain.to_lowercase(), outcome));
    }
    outcomes
}
