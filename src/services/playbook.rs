// ABOUTME: Configuration playbook runner interface and its ansible-playbook implementation.
// ABOUTME: Runs a named playbook against an inventory and captures its output lines.

use async_trait::async_trait;
use nonempty::NonEmpty;
use serde_json::{Map, Value};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;

/// One playbook invocation.
#[derive(Debug, Clone)]
pub struct PlaybookRun {
    pub playbook: PathBuf,
    pub inventory: NonEmpty<IpAddr>,
    pub remote_user: String,
    pub vars: Map<String, Value>,
}

impl PlaybookRun {
    pub fn new(playbook: impl Into<PathBuf>, inventory: NonEmpty<IpAddr>) -> Self {
        Self {
            playbook: playbook.into(),
            inventory,
            remote_user: "root".to_string(),
            vars: Map::new(),
        }
    }

    pub fn remote_user(mut self, user: impl Into<String>) -> Self {
        self.remote_user = user.into();
        self
    }

    pub fn vars(mut self, vars: Map<String, Value>) -> Self {
        self.vars = vars;
        self
    }

    /// Inline inventory; the trailing comma marks it as a host list.
    pub fn inventory_arg(&self) -> String {
        let mut arg = String::new();
        for host in self.inventory.iter() {
            arg.push_str(&host.to_string());
            arg.push(',');
        }
        arg
    }
}

/// Result of running a playbook.
#[derive(Debug, Clone)]
pub struct PlaybookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub output: Vec<String>,
}

impl PlaybookResult {
    /// Last few output lines, for log messages.
    pub fn tail(&self, lines: usize) -> &[String] {
        let start = self.output.len().saturating_sub(lines);
        &self.output[start..]
    }
}

#[async_trait]
pub trait PlaybookRunner: Send + Sync {
    /// Run a playbook. A playbook that runs and fails is `Ok` with
    /// `success == false`; `Err` means it could not be run at all.
    async fn run(&self, run: &PlaybookRun) -> Result<PlaybookResult, PlaybookError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PlaybookError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode playbook variables: {0}")]
    Vars(#[from] serde_json::Error),
}

/// Runs playbooks by spawning `ansible-playbook`.
#[derive(Debug, Clone)]
pub struct CommandPlaybookRunner {
    program: String,
}

impl CommandPlaybookRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn args(&self, run: &PlaybookRun) -> Result<Vec<String>, PlaybookError> {
        Ok(vec![
            "-i".to_string(),
            run.inventory_arg(),
            "-u".to_string(),
            run.remote_user.clone(),
            "--extra-vars".to_string(),
            serde_json::to_string(&run.vars)?,
            run.playbook.display().to_string(),
        ])
    }
}

impl Default for CommandPlaybookRunner {
    fn default() -> Self {
        Self::new("ansible-playbook")
    }
}

#[async_trait]
impl PlaybookRunner for CommandPlaybookRunner {
    async fn run(&self, run: &PlaybookRun) -> Result<PlaybookResult, PlaybookError> {
        let args = self.args(run)?;
        tracing::info!(
            "Running playbook {} against {}",
            run.playbook.display(),
            run.inventory_arg()
        );

        let output = Command::new(&self.program)
            .args(&args)
            .env("ANSIBLE_HOST_KEY_CHECKING", "False")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| PlaybookError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut lines: Vec<String> = String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        lines.extend(
            String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(str::to_string),
        );

        let result = PlaybookResult {
            success: output.status.success(),
            exit_code: output.status.code(),
            output: lines,
        };

        if result.success {
            tracing::info!("Playbook {} completed", run.playbook.display());
        } else {
            tracing::warn!(
                "Playbook {} failed with exit code {:?}",
                run.playbook.display(),
                result.exit_code
            );
        }
        Ok(result)
    }
}
