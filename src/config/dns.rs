// ABOUTME: DNS zone settings used when activation moves traffic.
// ABOUTME: The API token may come from the environment.

use serde::Deserialize;

use crate::error::Result;
use crate::types::DomainName;

use super::EnvValue;

#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    pub zone: DomainName,

    #[serde(default = "default_ttl")]
    pub ttl: u32,

    #[serde(default)]
    pub api_token: Option<EnvValue>,
}

fn default_ttl() -> u32 {
    300
}

impl DnsConfig {
    pub fn template() -> Self {
        Self {
            zone: DomainName::new("example.com").expect("template zone is a valid domain"),
            ttl: default_ttl(),
            api_token: Some(EnvValue::FromEnv {
                var: "HANGAR_DNS_TOKEN".to_string(),
                default: None,
            }),
        }
    }

    pub fn api_token(&self) -> Result<Option<String>> {
        self.api_token.as_ref().map(EnvValue::resolve).transpose()
    }
}
