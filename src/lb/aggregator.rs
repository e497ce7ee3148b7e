// ABOUTME: Renders the backend routing configuration of one load balancer.
// ABOUTME: Collects backend map and backend blocks from every bound instance.

use serde::Serialize;
use std::net::IpAddr;

use crate::fsm::{ResourceState, WrongState};
use crate::platform::Platform;
use crate::resources::{AppServer, Instance, InstanceStatus, LoadBalancingServer};
use crate::resources::server::{self as server_fsm, PUBLIC_ADDRESS};
use crate::services::ComputeError;
use crate::store::StoreError;
use crate::types::InstanceId;

/// Rendered configuration for one load balancer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadBalancerConfiguration {
    /// `"<domain> <backend>"` lines.
    pub backend_map: String,
    /// `"backend <name>\n<body>\n"` blocks.
    pub backend_conf: String,
}

impl LoadBalancerConfiguration {
    pub fn is_empty(&self) -> bool {
        self.backend_map.is_empty() && self.backend_conf.is_empty()
    }
}

/// Routing pairs contributed by one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendEntries {
    /// (domain, backend name)
    pub map: Vec<(String, String)>,
    /// (backend name, config body)
    pub conf: Vec<(String, String)>,
}

#[derive(Debug, thiserror::Error)]
pub enum AggregationError {
    #[error(transparent)]
    WrongState(#[from] WrongState),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("failed to refresh public address: {0}")]
    Compute(#[from] ComputeError),
}

pub struct Aggregator<'a> {
    platform: &'a Platform,
}

impl<'a> Aggregator<'a> {
    pub fn new(platform: &'a Platform) -> Self {
        Self { platform }
    }

    /// Full configuration for `lb`.
    ///
    /// `triggering` only affects logging: it tells apart the instance whose
    /// change caused the render from instances rendered incidentally.
    pub async fn configuration(
        &self,
        lb: &LoadBalancingServer,
        triggering: Option<InstanceId>,
    ) -> Result<LoadBalancerConfiguration, AggregationError> {
        if self.platform.config.load_balancer.disable_reconfiguration {
            tracing::info!(
                "load balancer {}: reconfiguration disabled, rendering empty configuration",
                lb.id
            );
            return Ok(LoadBalancerConfiguration::default());
        }

        let instances = self
            .platform
            .store
            .instances_for_load_balancer(lb.id)
            .await?;

        let mut map_lines = Vec::new();
        let mut conf_blocks = Vec::new();
        for instance in instances
            .iter()
            .filter(|i| i.status == InstanceStatus::Active)
        {
            if triggering == Some(instance.id) {
                tracing::debug!("load balancer {}: rendering triggering instance {}", lb.id, instance.id);
            } else {
                tracing::debug!("load balancer {}: rendering instance {}", lb.id, instance.id);
            }

            let entries = self.instance_entries(instance, lb).await?;
            for (domain, backend) in entries.map {
                map_lines.push(format!("{} {}", domain.to_lowercase(), backend));
            }
            for (backend, body) in entries.conf {
                conf_blocks.push(format!("backend {backend}\n{body}\n"));
            }
        }

        Ok(LoadBalancerConfiguration {
            backend_map: map_lines.join("\n"),
            backend_conf: conf_blocks.join("\n"),
        })
    }

    /// Routing entries of one instance, with `lb`'s postfix on every backend name.
    pub async fn instance_entries(
        &self,
        instance: &Instance,
        lb: &LoadBalancingServer,
    ) -> Result<BackendEntries, AggregationError> {
        let active: Vec<AppServer> = self
            .platform
            .store
            .appservers_for_instance(instance.id)
            .await?
            .into_iter()
            .filter(|a| a.is_active && !a.is_terminated())
            .collect();

        if active.is_empty() {
            return Ok(self.preliminary_entries(instance, lb));
        }

        let backend = format!("be-{}{}", instance.slug(), lb.fragment_name_postfix);
        let settings = &self.platform.config.load_balancer;
        let mut body = Vec::new();
        if !settings.health_check_path.is_empty() {
            body.push(format!("    option httpchk GET {}", settings.health_check_path));
        }
        let check = if settings.health_check_path.is_empty() {
            ""
        } else {
            " check"
        };
        for appserver in &active {
            let ip = self.public_ip(appserver).await?;
            body.push(format!(
                "    server appserver-{} {}:{}{}",
                appserver.id, ip, settings.backend_port, check
            ));
        }

        Ok(BackendEntries {
            map: instance
                .routed_domains()
                .map(|d| (d.to_string(), backend.clone()))
                .collect(),
            conf: vec![(backend, body.join("\n"))],
        })
    }

    fn preliminary_entries(&self, instance: &Instance, lb: &LoadBalancingServer) -> BackendEntries {
        let Some(page) = &self.platform.config.load_balancer.preliminary_page else {
            return BackendEntries::default();
        };
        let backend = format!(
            "be-preliminary-page-{}{}",
            instance.id, lb.fragment_name_postfix
        );
        BackendEntries {
            map: instance
                .routed_domains()
                .map(|d| (d.to_string(), backend.clone()))
                .collect(),
            conf: vec![(
                backend,
                format!("    server preliminary-page {}:{}", page.address, page.port),
            )],
        }
    }

    /// Public address of the appserver's VM, refreshed from the compute
    /// provider once when the stored one is missing. A server whose VM is
    /// gone is never routed to, even with an address on record.
    async fn public_ip(&self, appserver: &AppServer) -> Result<IpAddr, AggregationError> {
        let store = &self.platform.store;
        let server = store.server(appserver.server_id).await?;
        PUBLIC_ADDRESS.check(server.key(), server.status, server_fsm::machine().states())?;
        if let Some(ip) = server.public_ip {
            return Ok(ip);
        }

        tracing::warn!(
            "appserver {}: active without a public address, refreshing from compute provider",
            appserver.id
        );
        if let Some(vm_id) = &server.vm_id
            && let Some(ip) = self.platform.compute.public_address(vm_id).await?
        {
            store.set_server_public_ip(server.id, Some(ip)).await?;
            return Ok(ip);
        }

        Err(WrongState::new(
            appserver.key(),
            "route traffic to an appserver without a public address",
            server.status.state_id(),
            Vec::new(),
        )
        .into())
    }
}
