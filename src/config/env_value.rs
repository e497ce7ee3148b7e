// ABOUTME: Secret config values, given inline or named by an environment variable.
// ABOUTME: Debug output never shows an inline secret; resolution is checked by `hangar check`.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;

/// A secret such as a provider API token.
///
/// ```yaml
/// api_token: literal-token
/// api_token:
///   env: HANGAR_DNS_TOKEN
///   default: fallback-token
/// ```
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    /// Resolve against the process environment. An empty variable counts as unset.
    pub fn resolve(&self) -> Result<String> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolve using `lookup` for environment variables.
    pub fn resolve_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Result<String> {
        match self {
            EnvValue::Literal(value) => Ok(value.clone()),
            EnvValue::FromEnv { var, default } => lookup(var)
                .filter(|value| !value.is_empty())
                .or_else(|| default.clone())
                .ok_or_else(|| Error::MissingEnvVar(var.clone())),
        }
    }

    /// Where the value comes from, safe to print.
    pub fn source(&self) -> String {
        match self {
            EnvValue::Literal(_) => "inline value".to_string(),
            EnvValue::FromEnv { var, .. } => format!("${var}"),
        }
    }
}

impl fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Literal(_) => f.write_str("Literal(<redacted>)"),
            EnvValue::FromEnv { var, default } => f
                .debug_struct("FromEnv")
                .field("var", var)
                .field("default", &default.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}
