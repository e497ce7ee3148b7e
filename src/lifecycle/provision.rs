// ABOUTME: Appserver provisioning pipeline built on the type state pattern.
// ABOUTME: Each step consumes self, drives the server and appserver FSMs and returns the next stage.

use nonempty::NonEmpty;
use std::net::IpAddr;

use crate::fsm::ResourceState;
use crate::platform::Platform;
use crate::resources::appserver::{
    self, CONFIGURATION_FAILED, CONFIGURATION_SUCCEEDED, CONFIGURE_SERVER, PROVISIONING_ERROR,
    WAIT_FOR_SERVER,
};
use crate::resources::server::{self, BOOT, BUILD_FAILED, MARK_READY, MARK_UNKNOWN, START_BUILD};
use crate::resources::{AppServer, AppServerStatus, Server, ServerStatus};
use crate::services::{LifecycleEvent, PlaybookRun, VmState};
use crate::store::ResourceKey;
use crate::types::AppServerId;

use super::error::LifecycleError;
use super::stage::{Configured, Created, Failed, ServerLaunched, ServerReady};

/// Playbook output lines kept on a failed configuration.
const FAILURE_TAIL: usize = 20;

/// An appserver being provisioned, parameterized by how far it got.
pub struct Provisioning<'a, S> {
    platform: &'a Platform,
    appserver: AppServer,
    server: Server,
    stage: S,
}

impl<S: std::fmt::Debug> std::fmt::Debug for Provisioning<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provisioning")
            .field("appserver", &self.appserver.id)
            .field("server", &self.server.id)
            .field("stage", &self.stage)
            .finish()
    }
}

/// How the configuration step ended. Both cases are normal outcomes;
/// infrastructure failures are errors instead.
#[derive(Debug)]
pub enum Configuration<'a> {
    Succeeded(Provisioning<'a, Configured>),
    Failed(Provisioning<'a, Failed>),
}

impl<'a, S> Provisioning<'a, S> {
    fn advance<T>(self, stage: T) -> Provisioning<'a, T> {
        Provisioning {
            platform: self.platform,
            appserver: self.appserver,
            server: self.server,
            stage,
        }
    }

    pub fn appserver(&self) -> &AppServer {
        &self.appserver
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub fn stage(&self) -> &S {
        &self.stage
    }

    /// Re-read the appserver record at the end of the pipeline.
    async fn reload(self) -> Result<AppServer, LifecycleError> {
        Ok(self.platform.store.appserver(self.appserver.id).await?)
    }
}

impl<'a> Provisioning<'a, Created> {
    pub async fn load(platform: &'a Platform, id: AppServerId) -> Result<Self, LifecycleError> {
        let appserver = platform.store.appserver(id).await?;
        let server = platform.store.server(appserver.server_id).await?;
        Ok(Self {
            platform,
            appserver,
            server,
            stage: Created,
        })
    }

    /// Ask the compute provider for a VM.
    #[must_use = "provisioning state must be used"]
    pub async fn launch_server(self) -> Result<Provisioning<'a, ServerLaunched>, LifecycleError> {
        let store = self.platform.store.as_ref();
        appserver::machine()
            .apply(store, self.appserver.key(), &WAIT_FOR_SERVER)
            .await?;
        server::machine()
            .apply(store, self.server.key(), &START_BUILD)
            .await?;

        let vm_id = self.platform.compute.create_vm(&self.server.name).await?;
        store.set_server_vm_id(self.server.id, &vm_id).await?;
        tracing::info!(
            "appserver {}: launched VM {} for server {}",
            self.appserver.id,
            vm_id,
            self.server.name
        );
        Ok(self.advance(ServerLaunched { vm_id }))
    }
}

impl<'a> Provisioning<'a, ServerLaunched> {
    /// Poll the VM until it is active, has a public address and answers on
    /// SSH, or until the poll budget runs out.
    #[must_use = "provisioning state must be used"]
    pub async fn wait_for_server(mut self) -> Result<Provisioning<'a, ServerReady>, LifecycleError> {
        let platform = self.platform;
        let settings = &platform.config.provisioning;
        let store = platform.store.as_ref();
        let machine = server::machine();
        let key = self.server.key();
        let vm_id = self.stage.vm_id.clone();

        for poll in 1..=settings.max_polls {
            match platform.compute.vm_state(&vm_id).await? {
                VmState::Building => {
                    tracing::debug!("server {}: VM {} still building (poll {})", self.server.id, vm_id, poll);
                }
                VmState::Active => {
                    if let Some(address) = platform.compute.public_address(&vm_id).await? {
                        if machine.current(store, key).await? == ServerStatus::Building {
                            machine.apply(store, key, &BOOT).await?;
                        }
                        if self.server.public_ip != Some(address) {
                            store.set_server_public_ip(self.server.id, Some(address)).await?;
                            self.server.public_ip = Some(address);
                        }
                        if platform.probe.is_reachable(address).await {
                            machine.apply(store, key, &MARK_READY).await?;
                            tracing::info!("server {}: ready at {}", self.server.id, address);
                            return Ok(self.advance(ServerReady { address }));
                        }
                        tracing::debug!("server {}: {} not reachable yet", self.server.id, address);
                    }
                }
                state @ (VmState::Error | VmState::Deleted) => {
                    return Err(LifecycleError::VmFailed {
                        server: self.server.id,
                        vm_id,
                        state,
                    });
                }
            }

            if poll < settings.max_polls {
                tokio::time::sleep(settings.poll_interval).await;
            }
        }

        Err(LifecycleError::ServerTimeout {
            server: self.server.id,
            polls: settings.max_polls,
        })
    }
}

impl<'a> Provisioning<'a, ServerReady> {
    /// Run the configuration playbook with the appserver's frozen snapshot.
    #[must_use = "provisioning state must be used"]
    pub async fn configure(self) -> Result<Configuration<'a>, LifecycleError> {
        let platform = self.platform;
        let settings = &platform.config.provisioning;
        let store = platform.store.as_ref();
        let machine = appserver::machine();
        let key = self.appserver.key();
        let address: IpAddr = self.stage.address;

        let vars = self
            .appserver
            .snapshot()
            .playbook_vars()
            .map_err(|source| LifecycleError::PlaybookVars {
                appserver: self.appserver.id,
                source,
            })?;
        machine.apply(store, key, &CONFIGURE_SERVER).await?;

        let run = PlaybookRun::new(settings.playbook.clone(), NonEmpty::new(address))
            .remote_user(settings.remote_user.clone())
            .vars(vars);
        let result = platform.playbooks.run(&run).await?;

        if result.success {
            machine.apply(store, key, &CONFIGURATION_SUCCEEDED).await?;
            tracing::info!("appserver {}: configured", self.appserver.id);
            return Ok(Configuration::Succeeded(self.advance(Configured { address })));
        }

        machine.apply(store, key, &CONFIGURATION_FAILED).await?;
        let tail = result.tail(FAILURE_TAIL).to_vec();
        tracing::warn!(
            "appserver {}: configuration playbook failed (exit {:?}):\n{}",
            self.appserver.id,
            result.exit_code,
            tail.join("\n")
        );
        Ok(Configuration::Failed(self.advance(Failed {
            exit_code: result.exit_code,
            tail,
        })))
    }
}

impl Provisioning<'_, Configured> {
    pub fn address(&self) -> IpAddr {
        self.stage.address
    }

    pub async fn finish(self) -> Result<AppServer, LifecycleError> {
        self.reload().await
    }
}

impl Provisioning<'_, Failed> {
    pub fn exit_code(&self) -> Option<i32> {
        self.stage.exit_code
    }

    pub fn output_tail(&self) -> &[String] {
        &self.stage.tail
    }

    pub async fn finish(self) -> Result<AppServer, LifecycleError> {
        self.reload().await
    }
}

/// Provision an appserver end to end.
///
/// Never fails: infrastructure errors put the appserver in `Error` and its
/// server in `BuildFailed` or `Unknown`. Callers inspect the returned status.
pub async fn provision(platform: &Platform, id: AppServerId) -> AppServerStatus {
    tracing::info!("appserver {}: provisioning", id);
    let status = match run_pipeline(platform, id).await {
        Ok(status) => status,
        Err(e) => {
            tracing::error!("appserver {}: provisioning failed: {}", id, e);
            record_infrastructure_failure(platform, id).await
        }
    };
    platform.events.emit(LifecycleEvent::ProvisioningFinished {
        appserver: id,
        status: status.state_id(),
    });
    status
}

async fn run_pipeline(platform: &Platform, id: AppServerId) -> Result<AppServerStatus, LifecycleError> {
    let ready = Provisioning::load(platform, id)
        .await?
        .launch_server()
        .await?
        .wait_for_server()
        .await?;

    let appserver = match ready.configure().await? {
        Configuration::Succeeded(done) => done.finish().await?,
        Configuration::Failed(failed) => failed.finish().await?,
    };
    Ok(appserver.status)
}

async fn record_infrastructure_failure(platform: &Platform, id: AppServerId) -> AppServerStatus {
    let store = platform.store.as_ref();
    let machine = appserver::machine();
    let key = ResourceKey::from(id);

    match machine.current(store, key).await {
        Ok(current) if machine.can_apply(current, &PROVISIONING_ERROR) => {
            if let Err(e) = machine.apply(store, key, &PROVISIONING_ERROR).await {
                tracing::warn!("appserver {}: could not record provisioning error: {}", id, e);
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!("appserver {}: could not read status: {}", id, e),
    }

    if let Ok(appserver) = store.appserver(id).await {
        let server_key = ResourceKey::from(appserver.server_id);
        let transition = match server::machine().current(store, server_key).await {
            Ok(ServerStatus::Building) => Some(BUILD_FAILED),
            Ok(ServerStatus::Booting) => Some(MARK_UNKNOWN),
            _ => None,
        };
        if let Some(transition) = transition
            && let Err(e) = server::machine().apply(store, server_key, &transition).await
        {
            tracing::warn!("server {}: could not record failure: {}", appserver.server_id, e);
        }
    }

    machine
        .current(store, key)
        .await
        .unwrap_or(AppServerStatus::Error)
}
