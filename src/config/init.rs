// ABOUTME: Config scaffolding for new deployments.
// ABOUTME: Writes a commented hangar.yml template.

use humantime_serde::re::humantime::format_duration;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::DomainName;

use super::{CONFIG_FILENAME, Config};

pub fn init_config(dir: &Path, zone: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let mut config = Config::template();

    if let (Some(z), Some(dns)) = (zone, config.dns.as_mut()) {
        dns.zone = DomainName::new(z).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    }

    let yaml = generate_template_yaml(&config);
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

fn generate_template_yaml(config: &Config) -> String {
    let lb = &config.load_balancer;
    let prov = &config.provisioning;
    let orch = &config.orchestration;
    let zone = config
        .dns
        .as_ref()
        .map(|d| d.zone.to_string())
        .unwrap_or_else(|| "example.com".to_string());
    format!(
        r#"load_balancer:
  # Set to true to render empty configurations (operational kill switch)
  disable_reconfiguration: {}
  lock_timeout: {}
  lock_poll_interval: {}
  max_catch_up_rounds: {}
  backend_port: {}
  health_check_path: {}
  apply_playbook: {}
  # preliminary_page:
  #   address: 10.0.0.10
  #   port: 80

provisioning:
  poll_interval: {}
  max_polls: {}
  playbook: {}
  remote_user: {}

orchestration:
  spawn_attempts: {}
  retention_days: {}
  # success_tag: deployment-succeeded
  # failure_tag: deployment-failed

dns:
  zone: {}
  api_token:
    env: HANGAR_DNS_TOKEN
"#,
        lb.disable_reconfiguration,
        format_duration(lb.lock_timeout),
        format_duration(lb.lock_poll_interval),
        lb.max_catch_up_rounds,
        lb.backend_port,
        lb.health_check_path,
        lb.apply_playbook.display(),
        format_duration(prov.poll_interval),
        prov.max_polls,
        prov.playbook.display(),
        prov.remote_user,
        orch.spawn_attempts,
        orch.retention_days,
        zone
    )
}
