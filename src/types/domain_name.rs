// ABOUTME: Validated DNS host names for instances and load balancers.
// ABOUTME: Enforces RFC 1123 label rules; comparison keeps the original case.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainNameError {
    #[error("domain name cannot be empty")]
    Empty,

    #[error("domain name exceeds maximum length of 253 characters")]
    TooLong,

    #[error("domain label cannot be empty in '{0}'")]
    EmptyLabel(String),

    #[error("domain label exceeds maximum length of 63 characters: '{0}'")]
    LabelTooLong(String),

    #[error("domain label cannot start or end with a hyphen: '{0}'")]
    HyphenEdge(String),

    #[error("invalid character in domain name: '{0}'")]
    InvalidChar(char),
}

/// A syntactically valid host name such as `courses.example.com`.
///
/// Mixed case is accepted because operators type domains the way customers
/// send them; routing code lower-cases with [`DomainName::to_lowercase`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainName(String);

impl DomainName {
    pub fn new(value: &str) -> Result<Self, DomainNameError> {
        let value = value.trim_end_matches('.');
        if value.is_empty() {
            return Err(DomainNameError::Empty);
        }

        if value.len() > 253 {
            return Err(DomainNameError::TooLong);
        }

        for label in value.split('.') {
            if label.is_empty() {
                return Err(DomainNameError::EmptyLabel(value.to_string()));
            }
            if label.len() > 63 {
                return Err(DomainNameError::LabelTooLong(label.to_string()));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(DomainNameError::HyphenEdge(label.to_string()));
            }
            if let Some(c) = label
                .chars()
                .find(|c| !c.is_ascii_alphanumeric() && *c != '-')
            {
                return Err(DomainNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form used for routing and DNS, where case is irrelevant.
    pub fn to_lowercase(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// The name relative to `zone`, or `None` when the domain is outside it.
    ///
    /// `courses.example.com` in zone `example.com` is `courses`; the apex
    /// itself is `@`.
    pub fn relative_to(&self, zone: &str) -> Option<String> {
        let name = self.to_lowercase();
        let zone = zone.trim_end_matches('.').to_ascii_lowercase();
        if name == zone {
            return Some("@".to_string());
        }
        name.strip_suffix(&format!(".{zone}")).map(str::to_string)
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DomainName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DomainName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DomainName::new(&s).map_err(serde::de::Error::custom)
    }
}
