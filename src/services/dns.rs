// ABOUTME: DNS provider interface with idempotent record upserts and removals.
// ABOUTME: Records are named relative to the managed zone.

use async_trait::async_trait;
use std::fmt;

use super::DeleteOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Cname,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => write!(f, "A"),
            RecordType::Cname => write!(f, "CNAME"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub zone: String,
    /// Name relative to `zone`; `@` for the apex.
    pub name: String,
    pub record_type: RecordType,
    pub value: String,
    pub ttl: u32,
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} (ttl {})",
            self.zone, self.name, self.record_type, self.value, self.ttl
        )
    }
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Create the record, or replace any existing record of the same name and type.
    async fn set_record(&self, record: &DnsRecord) -> Result<(), DnsError>;

    async fn remove_record(&self, zone: &str, name: &str, record_type: RecordType)
    -> DeleteOutcome;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DnsError {
    #[error("DNS request failed: {0}")]
    Request(String),

    #[error("zone {0} is not managed by this provider")]
    UnknownZone(String),
}
