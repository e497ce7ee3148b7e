// ABOUTME: Test support utilities.
// ABOUTME: Fake collaborators and a harness that wires them into a Platform over a MemoryStore.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hangar::config::{Config, DnsConfig};
use hangar::fsm::StateMachine;
use hangar::lb::{ApplyError, LoadBalancerApplier, LoadBalancerConfiguration};
use hangar::platform::{Platform, PlatformBuilder};
use hangar::resources::{
    AppServer, ConfigurationSnapshot, Instance, InstanceDomain, InstanceSettings,
    LoadBalancingServer, NewAppServer, NewInstance, NewLoadBalancer, appserver, server,
};
use hangar::services::{
    CapabilityError, ComputeError, ComputeProvider, DeleteOutcome, DnsError, DnsProvider,
    DnsRecord, EventSink, InstanceCapability, LifecycleEvent, MonitoringController,
    PlaybookError, PlaybookResult, PlaybookRun, PlaybookRunner, RecordType, ServerProbe, VmState,
};
use hangar::store::{
    AppServerStore, InstanceStore, LoadBalancerStore, MemoryStore, ServerStore,
};
use hangar::types::{DomainName, LoadBalancerId};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("hangar=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Configuration with short polls and a DNS zone of `example.com`.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.provisioning.poll_interval = Duration::from_millis(5);
    config.provisioning.max_polls = 3;
    config.load_balancer.lock_poll_interval = Duration::from_millis(5);
    config.load_balancer.lock_wait = Duration::from_secs(5);
    config.load_balancer.max_catch_up_rounds = 64;
    config.dns = Some(DnsConfig {
        zone: DomainName::new("example.com").unwrap(),
        ttl: 300,
        api_token: None,
    });
    config
}

// ---------------------------------------------------------------------------
// Compute

/// VMs become active on the first poll unless scripted otherwise. Every VM
/// gets the address 10.0.0.<n>.
#[derive(Default)]
pub struct FakeCompute {
    next_vm: AtomicU64,
    states: Mutex<VecDeque<VmState>>,
    pub fail_create: AtomicBool,
    pub withhold_address: AtomicBool,
    pub delete_outcome: Mutex<Option<DeleteOutcome>>,
    pub created: Mutex<Vec<String>>,
    pub deleted: Mutex<Vec<String>>,
    pub address_queries: AtomicUsize,
}

impl FakeCompute {
    /// Answer the next `vm_state` calls with `states`, in order.
    pub fn script_states(&self, states: impl IntoIterator<Item = VmState>) {
        self.states.lock().extend(states);
    }

    pub fn address_of(vm_id: &str) -> IpAddr {
        let n: u8 = vm_id
            .rsplit('-')
            .next()
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);
        IpAddr::from([10, 0, 0, n])
    }
}

#[async_trait]
impl ComputeProvider for FakeCompute {
    async fn create_vm(&self, _name: &str) -> Result<String, ComputeError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ComputeError::Quota("no capacity".to_string()));
        }
        let vm_id = format!("vm-{}", self.next_vm.fetch_add(1, Ordering::SeqCst) + 1);
        self.created.lock().push(vm_id.clone());
        Ok(vm_id)
    }

    async fn vm_state(&self, _vm_id: &str) -> Result<VmState, ComputeError> {
        Ok(self.states.lock().pop_front().unwrap_or(VmState::Active))
    }

    async fn public_address(&self, vm_id: &str) -> Result<Option<IpAddr>, ComputeError> {
        self.address_queries.fetch_add(1, Ordering::SeqCst);
        if self.withhold_address.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(Self::address_of(vm_id)))
    }

    async fn delete_vm(&self, vm_id: &str) -> DeleteOutcome {
        if let Some(outcome) = self.delete_outcome.lock().clone() {
            return outcome;
        }
        self.deleted.lock().push(vm_id.to_string());
        DeleteOutcome::Deleted
    }
}

pub struct AlwaysReachable;

#[async_trait]
impl ServerProbe for AlwaysReachable {
    async fn is_reachable(&self, _address: IpAddr) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Playbooks

/// Runs succeed unless a result was scripted for them.
#[derive(Default)]
pub struct ScriptedPlaybooks {
    results: Mutex<VecDeque<bool>>,
    pub runs: Mutex<Vec<PlaybookRun>>,
}

impl ScriptedPlaybooks {
    pub fn script(&self, results: impl IntoIterator<Item = bool>) {
        self.results.lock().extend(results);
    }

    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }
}

#[async_trait]
impl PlaybookRunner for ScriptedPlaybooks {
    async fn run(&self, run: &PlaybookRun) -> Result<PlaybookResult, PlaybookError> {
        self.runs.lock().push(run.clone());
        let success = self.results.lock().pop_front().unwrap_or(true);
        Ok(PlaybookResult {
            success,
            exit_code: Some(if success { 0 } else { 2 }),
            output: vec![
                "PLAY [appserver] ***".to_string(),
                if success {
                    "ok=12 changed=3 failed=0".to_string()
                } else {
                    "fatal: [host]: FAILED!".to_string()
                },
            ],
        })
    }
}

// ---------------------------------------------------------------------------
// Load balancer

/// Records applies and the highest number of applies in flight at once.
#[derive(Default)]
pub struct RecordingApplier {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub fail: AtomicBool,
    pub delay: Mutex<Duration>,
    pub applied: Mutex<Vec<(LoadBalancerId, LoadBalancerConfiguration)>>,
    pub removed: Mutex<Vec<LoadBalancerId>>,
}

impl RecordingApplier {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Mutex::new(delay),
            ..Self::default()
        }
    }

    pub fn apply_count(&self) -> usize {
        self.applied.lock().len()
    }

    pub fn last_applied(&self) -> Option<LoadBalancerConfiguration> {
        self.applied.lock().last().map(|(_, c)| c.clone())
    }
}

#[async_trait]
impl LoadBalancerApplier for RecordingApplier {
    async fn apply(
        &self,
        lb: &LoadBalancingServer,
        configuration: &LoadBalancerConfiguration,
    ) -> Result<(), ApplyError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = if self.fail.load(Ordering::SeqCst) {
            Err(ApplyError::Failed {
                exit_code: Some(2),
                tail: vec!["haproxy: configuration invalid".to_string()],
            })
        } else {
            self.applied.lock().push((lb.id, configuration.clone()));
            Ok(())
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn remove(&self, lb: &LoadBalancingServer) -> Result<(), ApplyError> {
        self.removed.lock().push(lb.id);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// DNS, events, capabilities

#[derive(Default)]
pub struct RecordingDns {
    pub records: Mutex<Vec<DnsRecord>>,
    pub removed: Mutex<Vec<String>>,
    pub fail_removal: AtomicBool,
}

#[async_trait]
impl DnsProvider for RecordingDns {
    async fn set_record(&self, record: &DnsRecord) -> Result<(), DnsError> {
        let mut records = self.records.lock();
        records.retain(|r| !(r.name == record.name && r.record_type == record.record_type));
        records.push(record.clone());
        Ok(())
    }

    async fn remove_record(
        &self,
        _zone: &str,
        name: &str,
        record_type: RecordType,
    ) -> DeleteOutcome {
        if self.fail_removal.load(Ordering::SeqCst) {
            return DeleteOutcome::Failed("DNS API returned 503".to_string());
        }
        self.removed.lock().push(name.to_string());
        let mut records = self.records.lock();
        let before = records.len();
        records.retain(|r| !(r.name == name && r.record_type == record_type));
        if records.len() < before {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::AlreadyAbsent
        }
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingEvents {
    pub fn count(&self, pred: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingEvents {
    fn emit(&self, event: LifecycleEvent) {
        self.events.lock().push(event);
    }
}

/// Appends "provision:<name>" and "deprovision:<name>" to a shared log.
pub struct FakeCapability {
    pub name: &'static str,
    pub log: Arc<Mutex<Vec<String>>>,
    pub fail_provision: bool,
    pub fail_deprovision: bool,
}

impl FakeCapability {
    pub fn new(name: &'static str, log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            log,
            fail_provision: false,
            fail_deprovision: false,
        }
    }
}

#[async_trait]
impl InstanceCapability for FakeCapability {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn provision(&self, instance: &Instance) -> Result<(), CapabilityError> {
        self.log.lock().push(format!("provision:{}", self.name));
        if self.fail_provision {
            return Err(CapabilityError {
                capability: self.name.to_string(),
                instance: instance.name.clone(),
                message: "backend refused".to_string(),
            });
        }
        Ok(())
    }

    async fn deprovision(&self, _instance: &Instance) -> DeleteOutcome {
        self.log.lock().push(format!("deprovision:{}", self.name));
        if self.fail_deprovision {
            DeleteOutcome::Failed("backend refused".to_string())
        } else {
            DeleteOutcome::Deleted
        }
    }
}

#[derive(Default)]
pub struct FakeMonitoring {
    pub fail_disable: AtomicBool,
    pub disabled: AtomicUsize,
}

#[async_trait]
impl MonitoringController for FakeMonitoring {
    async fn enable(&self, _instance: &Instance) -> Result<(), CapabilityError> {
        Ok(())
    }

    async fn disable(&self, _instance: &Instance) -> DeleteOutcome {
        self.disabled.fetch_add(1, Ordering::SeqCst);
        if self.fail_disable.load(Ordering::SeqCst) {
            DeleteOutcome::Failed("monitoring API unreachable".to_string())
        } else {
            DeleteOutcome::Deleted
        }
    }
}

// ---------------------------------------------------------------------------
// Harness

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub compute: Arc<FakeCompute>,
    pub playbooks: Arc<ScriptedPlaybooks>,
    pub applier: Arc<RecordingApplier>,
    pub dns: Arc<RecordingDns>,
    pub events: Arc<RecordingEvents>,
    pub platform: Platform,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(test_config(), RecordingApplier::default(), |b| b)
    }

    pub fn with_config(config: Config) -> Self {
        Self::with(config, RecordingApplier::default(), |b| b)
    }

    /// Build with a custom applier and extra platform wiring.
    pub fn with(
        config: Config,
        applier: RecordingApplier,
        extra: impl FnOnce(PlatformBuilder) -> PlatformBuilder,
    ) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::recording());
        let compute = Arc::new(FakeCompute::default());
        let playbooks = Arc::new(ScriptedPlaybooks::default());
        let applier = Arc::new(applier);
        let dns = Arc::new(RecordingDns::default());
        let events = Arc::new(RecordingEvents::default());

        let builder = Platform::builder(config, store.clone(), compute.clone())
            .probe(Arc::new(AlwaysReachable))
            .playbooks(playbooks.clone())
            .applier(applier.clone())
            .dns(dns.clone())
            .events(events.clone());
        let platform = extra(builder).build();

        Self {
            store,
            compute,
            playbooks,
            applier,
            dns,
            events,
            platform,
        }
    }

    pub async fn load_balancer(&self, domain: &str) -> LoadBalancingServer {
        self.store
            .create_load_balancer(NewLoadBalancer {
                domain: DomainName::new(domain).unwrap(),
                ssh_username: "root".to_string(),
                accepts_new_backends: true,
            })
            .await
            .unwrap()
    }

    pub async fn instance(
        &self,
        name: &str,
        domains: &[&str],
        lb: Option<LoadBalancerId>,
    ) -> Instance {
        self.store
            .create_instance(
                NewInstance {
                    name: name.to_string(),
                    domains: domains
                        .iter()
                        .map(|d| InstanceDomain::routed(DomainName::new(*d).unwrap()))
                        .collect(),
                    settings: InstanceSettings::default(),
                    load_balancing_server: lb,
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    /// An appserver in `New` on a `Pending` server.
    pub async fn new_appserver(&self, instance: &Instance, created: DateTime<Utc>) -> AppServer {
        let count = self
            .store
            .appservers_for_instance(instance.id)
            .await
            .unwrap()
            .len();
        let name = format!("{}-appserver-{}", instance.slug(), count + 1);
        let srv = self.store.create_server(&name, created).await.unwrap();
        self.store
            .create_appserver(
                NewAppServer {
                    instance_id: instance.id,
                    server_id: srv.id,
                    name,
                    snapshot: ConfigurationSnapshot::capture(instance, created),
                },
                created,
            )
            .await
            .unwrap()
    }

    /// A `Running` appserver on a `Ready` server with a VM and public address.
    pub async fn running_appserver(&self, instance: &Instance, created: DateTime<Utc>) -> AppServer {
        self.provisioned_appserver(instance, created, &appserver::CONFIGURATION_SUCCEEDED)
            .await
    }

    /// A `ConfigurationFailed` appserver on a `Ready` server.
    pub async fn failed_appserver(&self, instance: &Instance, created: DateTime<Utc>) -> AppServer {
        self.provisioned_appserver(instance, created, &appserver::CONFIGURATION_FAILED)
            .await
    }

    async fn provisioned_appserver(
        &self,
        instance: &Instance,
        created: DateTime<Utc>,
        last: &hangar::fsm::Transition<hangar::resources::AppServerStatus>,
    ) -> AppServer {
        let app = self.new_appserver(instance, created).await;
        let store = self.store.as_ref();

        let vm_id = self.compute.create_vm(&app.name).await.unwrap();
        store.set_server_vm_id(app.server_id, &vm_id).await.unwrap();
        store
            .set_server_public_ip(app.server_id, Some(FakeCompute::address_of(&vm_id)))
            .await
            .unwrap();
        walk(
            server::machine(),
            store,
            app.server_id.into(),
            &[server::START_BUILD, server::BOOT, server::MARK_READY],
        )
        .await;
        walk(
            appserver::machine(),
            store,
            app.key(),
            &[appserver::WAIT_FOR_SERVER, appserver::CONFIGURE_SERVER, *last],
        )
        .await;
        store.clear_writes();
        store.appserver(app.id).await.unwrap()
    }

    /// Flip `is_active` directly, bypassing the controller.
    pub async fn force_active(&self, app: &AppServer, activated: DateTime<Utc>) {
        self.store
            .set_appserver_active(app.id, true, Some(activated))
            .await
            .unwrap();
    }
}

async fn walk<S: hangar::fsm::ResourceState>(
    machine: &StateMachine<S>,
    store: &MemoryStore,
    key: hangar::store::ResourceKey,
    transitions: &[hangar::fsm::Transition<S>],
) {
    for t in transitions {
        machine.apply(store, key, t).await.unwrap();
    }
}
