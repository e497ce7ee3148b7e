// ABOUTME: Collaborator handles shared by every orchestration component.
// ABOUTME: Built once at startup and passed by reference; no global clients.

use std::sync::Arc;

use crate::config::Config;
use crate::lb::{LoadBalancerApplier, PlaybookLoadBalancerApplier};
use crate::services::{
    CommandPlaybookRunner, ComputeProvider, DnsProvider, EventSink, InstanceCapability,
    LockProvider, MemoryLockProvider, MonitoringController, PlaybookRunner, ServerProbe,
    TcpProbe, TracingEventSink,
};
use crate::store::Store;

/// Everything the core talks to.
pub struct Platform {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub compute: Arc<dyn ComputeProvider>,
    pub probe: Arc<dyn ServerProbe>,
    pub playbooks: Arc<dyn PlaybookRunner>,
    pub locks: Arc<dyn LockProvider>,
    pub applier: Arc<dyn LoadBalancerApplier>,
    /// `None` leaves DNS untouched on activation.
    pub dns: Option<Arc<dyn DnsProvider>>,
    /// Provisioned in order, deprovisioned in reverse order.
    pub capabilities: Vec<Arc<dyn InstanceCapability>>,
    pub monitoring: Option<Arc<dyn MonitoringController>>,
    pub events: Arc<dyn EventSink>,
}

impl Platform {
    pub fn builder(
        config: Config,
        store: Arc<dyn Store>,
        compute: Arc<dyn ComputeProvider>,
    ) -> PlatformBuilder {
        PlatformBuilder {
            config,
            store,
            compute,
            probe: None,
            playbooks: None,
            locks: None,
            applier: None,
            dns: None,
            capabilities: Vec::new(),
            monitoring: None,
            events: None,
        }
    }
}

pub struct PlatformBuilder {
    config: Config,
    store: Arc<dyn Store>,
    compute: Arc<dyn ComputeProvider>,
    probe: Option<Arc<dyn ServerProbe>>,
    playbooks: Option<Arc<dyn PlaybookRunner>>,
    locks: Option<Arc<dyn LockProvider>>,
    applier: Option<Arc<dyn LoadBalancerApplier>>,
    dns: Option<Arc<dyn DnsProvider>>,
    capabilities: Vec<Arc<dyn InstanceCapability>>,
    monitoring: Option<Arc<dyn MonitoringController>>,
    events: Option<Arc<dyn EventSink>>,
}

impl PlatformBuilder {
    pub fn probe(mut self, probe: Arc<dyn ServerProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn playbooks(mut self, playbooks: Arc<dyn PlaybookRunner>) -> Self {
        self.playbooks = Some(playbooks);
        self
    }

    pub fn locks(mut self, locks: Arc<dyn LockProvider>) -> Self {
        self.locks = Some(locks);
        self
    }

    pub fn applier(mut self, applier: Arc<dyn LoadBalancerApplier>) -> Self {
        self.applier = Some(applier);
        self
    }

    pub fn dns(mut self, dns: Arc<dyn DnsProvider>) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn capability(mut self, capability: Arc<dyn InstanceCapability>) -> Self {
        self.capabilities.push(capability);
        self
    }

    pub fn monitoring(mut self, monitoring: Arc<dyn MonitoringController>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Fill unset collaborators with the defaults: TCP SSH probe,
    /// `ansible-playbook` runner, in-memory locks, playbook-driven load
    /// balancer applier and tracing events.
    pub fn build(self) -> Platform {
        let provisioning = &self.config.provisioning;
        let probe = self.probe.unwrap_or_else(|| {
            Arc::new(TcpProbe::new(provisioning.ssh_port, provisioning.ssh_timeout))
        });
        let playbooks = self.playbooks.unwrap_or_else(|| {
            Arc::new(CommandPlaybookRunner::new(
                provisioning.ansible_playbook.clone(),
            ))
        });
        let applier = self.applier.unwrap_or_else(|| {
            Arc::new(PlaybookLoadBalancerApplier::new(
                playbooks.clone(),
                self.config.load_balancer.apply_playbook.clone(),
            ))
        });

        Platform {
            probe,
            playbooks,
            applier,
            locks: self
                .locks
                .unwrap_or_else(|| Arc::new(MemoryLockProvider::new())),
            events: self.events.unwrap_or_else(|| Arc::new(TracingEventSink)),
            dns: self.dns,
            capabilities: self.capabilities,
            monitoring: self.monitoring,
            store: self.store,
            compute: self.compute,
            config: self.config,
        }
    }
}
