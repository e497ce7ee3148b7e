// ABOUTME: Load balancing server record with its configuration versions.
// ABOUTME: configured > deployed means the server needs reconfiguring.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::types::{DomainName, LoadBalancerId};

const POSTFIX_LEN: usize = 8;

/// Random suffix appended to every backend name rendered for one load
/// balancer, so fragments from different servers never collide.
pub fn generate_fragment_postfix() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(POSTFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("-{suffix}")
}

#[derive(Debug, Clone)]
pub struct NewLoadBalancer {
    pub domain: DomainName,
    pub ssh_username: String,
    pub accepts_new_backends: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancingServer {
    pub id: LoadBalancerId,
    pub domain: DomainName,
    pub ssh_username: String,
    pub accepts_new_backends: bool,
    pub fragment_name_postfix: String,
    /// Bumped every time the rendered configuration may have changed.
    pub configuration_version: u64,
    /// Highest version known to be live on the server.
    pub deployed_configuration_version: u64,
}

impl LoadBalancingServer {
    pub fn new(id: LoadBalancerId, new: NewLoadBalancer) -> Self {
        Self {
            id,
            domain: new.domain,
            ssh_username: new.ssh_username,
            accepts_new_backends: new.accepts_new_backends,
            fragment_name_postfix: generate_fragment_postfix(),
            configuration_version: 1,
            deployed_configuration_version: 0,
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.deployed_configuration_version < self.configuration_version
    }

    /// Name of the lock serializing reconfiguration of this server.
    pub fn lock_name(&self) -> String {
        lock_name(self.id)
    }

    /// Name of the configuration fragment this server's backends live in.
    pub fn fragment_name(&self) -> String {
        format!("hangar{}", self.fragment_name_postfix)
    }
}

pub fn lock_name(id: LoadBalancerId) -> String {
    format!("load_balancer_reconfigure:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lb() -> LoadBalancingServer {
        LoadBalancingServer::new(
            LoadBalancerId::new(4),
            NewLoadBalancer {
                domain: DomainName::new("lb1.example.com").unwrap(),
                ssh_username: "ubuntu".to_string(),
                accepts_new_backends: true,
            },
        )
    }

    #[test]
    fn new_server_starts_dirty() {
        let lb = lb();
        assert!(lb.is_dirty());
        assert_eq!(lb.lock_name(), "load_balancer_reconfigure:4");
    }

    #[test]
    fn postfix_is_random_and_lowercase() {
        let a = generate_fragment_postfix();
        let b = generate_fragment_postfix();
        assert_ne!(a, b);
        assert_eq!(a.len(), POSTFIX_LEN + 1);
        assert!(a.starts_with('-'));
        assert!(a[1..].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn clean_when_deployed_caught_up() {
        let mut lb = lb();
        lb.deployed_configuration_version = lb.configuration_version;
        assert!(!lb.is_dirty());
    }
}
