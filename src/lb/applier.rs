// ABOUTME: Pushes a rendered configuration fragment to a load balancer host.
// ABOUTME: The default applier runs an Ansible playbook against the host.

use async_trait::async_trait;
use nonempty::NonEmpty;
use serde_json::{Map, Value};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::resources::LoadBalancingServer;
use crate::services::{PlaybookError, PlaybookRun, PlaybookRunner};

use super::aggregator::LoadBalancerConfiguration;

/// Lines of playbook output kept in a failure.
const FAILURE_TAIL: usize = 20;

#[async_trait]
pub trait LoadBalancerApplier: Send + Sync {
    /// Install `configuration` as the host's fragment for this platform.
    async fn apply(
        &self,
        lb: &LoadBalancingServer,
        configuration: &LoadBalancerConfiguration,
    ) -> Result<(), ApplyError>;

    /// Remove the fragment from the host.
    async fn remove(&self, lb: &LoadBalancingServer) -> Result<(), ApplyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    #[error("playbook exited with {}: {}", .exit_code.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()), .tail.join(" | "))]
    Failed {
        exit_code: Option<i32>,
        tail: Vec<String>,
    },

    #[error("cannot resolve load balancer host {domain}: {message}")]
    Unresolvable { domain: String, message: String },

    #[error("{0}")]
    Other(String),
}

pub struct PlaybookLoadBalancerApplier {
    runner: Arc<dyn PlaybookRunner>,
    playbook: PathBuf,
}

impl PlaybookLoadBalancerApplier {
    pub fn new(runner: Arc<dyn PlaybookRunner>, playbook: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            playbook: playbook.into(),
        }
    }

    async fn run(
        &self,
        lb: &LoadBalancingServer,
        vars: Map<String, Value>,
    ) -> Result<(), ApplyError> {
        let address = resolve(lb.domain.as_str()).await?;
        let run = PlaybookRun::new(self.playbook.clone(), NonEmpty::new(address))
            .remote_user(&lb.ssh_username)
            .vars(vars);

        let result = self.runner.run(&run).await?;
        if result.success {
            return Ok(());
        }
        Err(ApplyError::Failed {
            exit_code: result.exit_code,
            tail: result.tail(FAILURE_TAIL).to_vec(),
        })
    }
}

#[async_trait]
impl LoadBalancerApplier for PlaybookLoadBalancerApplier {
    async fn apply(
        &self,
        lb: &LoadBalancingServer,
        configuration: &LoadBalancerConfiguration,
    ) -> Result<(), ApplyError> {
        tracing::info!("load balancer {}: applying fragment {}", lb.id, lb.fragment_name());
        let mut vars = fragment_vars(lb, "present");
        vars.insert(
            "backend_map".into(),
            Value::String(configuration.backend_map.clone()),
        );
        vars.insert(
            "backend_conf".into(),
            Value::String(configuration.backend_conf.clone()),
        );
        self.run(lb, vars).await
    }

    async fn remove(&self, lb: &LoadBalancingServer) -> Result<(), ApplyError> {
        tracing::info!("load balancer {}: removing fragment {}", lb.id, lb.fragment_name());
        self.run(lb, fragment_vars(lb, "absent")).await
    }
}

fn fragment_vars(lb: &LoadBalancingServer, state: &str) -> Map<String, Value> {
    let mut vars = Map::new();
    vars.insert("fragment_name".into(), Value::String(lb.fragment_name()));
    vars.insert("fragment_state".into(), Value::String(state.to_string()));
    vars
}

async fn resolve(domain: &str) -> Result<IpAddr, ApplyError> {
    if let Ok(ip) = domain.parse::<IpAddr>() {
        return Ok(ip);
    }
    let mut addresses = tokio::net::lookup_host((domain, 22))
        .await
        .map_err(|e| ApplyError::Unresolvable {
            domain: domain.to_string(),
            message: e.to_string(),
        })?;
    addresses
        .next()
        .map(|a| a.ip())
        .ok_or_else(|| ApplyError::Unresolvable {
            domain: domain.to_string(),
            message: "no addresses".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::NewLoadBalancer;
    use crate::services::PlaybookResult;
    use crate::types::{DomainName, LoadBalancerId};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        runs: Mutex<Vec<PlaybookRun>>,
        fail: bool,
    }

    #[async_trait]
    impl PlaybookRunner for Recorder {
        async fn run(&self, run: &PlaybookRun) -> Result<PlaybookResult, PlaybookError> {
            self.runs.lock().push(run.clone());
            Ok(PlaybookResult {
                success: !self.fail,
                exit_code: Some(if self.fail { 2 } else { 0 }),
                output: vec!["TASK [haproxy]".to_string(), "fatal: boom".to_string()],
            })
        }
    }

    fn lb() -> LoadBalancingServer {
        LoadBalancingServer::new(
            LoadBalancerId::new(1),
            NewLoadBalancer {
                domain: DomainName::new("127.0.0.1").unwrap(),
                ssh_username: "root".to_string(),
                accepts_new_backends: true,
            },
        )
    }

    #[tokio::test]
    async fn apply_passes_fragment_and_configuration() {
        let recorder = Arc::new(Recorder::default());
        let applier = PlaybookLoadBalancerApplier::new(recorder.clone(), "lb.yml");
        let lb = lb();
        let configuration = LoadBalancerConfiguration {
            backend_map: "a.example.com be-a".to_string(),
            backend_conf: "backend be-a\n    server x 1.2.3.4:80\n".to_string(),
        };

        applier.apply(&lb, &configuration).await.unwrap();

        let runs = recorder.runs.lock();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].remote_user, "root");
        assert_eq!(runs[0].vars["fragment_name"], Value::String(lb.fragment_name()));
        assert_eq!(runs[0].vars["fragment_state"], "present");
        assert_eq!(runs[0].vars["backend_map"], "a.example.com be-a");
    }

    #[tokio::test]
    async fn failed_playbook_reports_output_tail() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Default::default()
        });
        let applier = PlaybookLoadBalancerApplier::new(recorder, "lb.yml");

        let err = applier.remove(&lb()).await.unwrap_err();
        assert!(matches!(err, ApplyError::Failed { exit_code: Some(2), .. }));
        assert!(err.to_string().contains("fatal: boom"));
    }
}
