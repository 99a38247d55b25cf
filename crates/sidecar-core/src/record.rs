//! The record this process owns and the changes submitted for it

use crate::config::RecordConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Comment attached to the setup change batch
pub const CHANGE_COMMENT: &str = "dns-sidecar";

/// DNS record type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    /// A record (IPv4)
    A,
    /// AAAA record (IPv6)
    Aaaa,
}

impl RecordType {
    /// Record type for an address
    pub fn for_address(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// The wire name of the type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single weighted record set registered by this process
///
/// Built once after the address is resolved. Upsert and delete are both
/// derived from the same value so the delete targets exactly the record
/// that was created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSpec {
    name: String,
    zone_id: String,
    record_type: RecordType,
    value: IpAddr,
    ttl_secs: u32,
}

impl RecordSpec {
    /// Routing weight of the record set
    pub const WEIGHT: i64 = 100;

    /// Build the record for a resolved address
    pub fn new(config: &RecordConfig, value: IpAddr) -> Result<Self, crate::Error> {
        config.validate()?;

        Ok(Self {
            name: config.name.clone(),
            zone_id: config.zone_id.clone(),
            record_type: RecordType::for_address(&value),
            value,
            ttl_secs: config.ttl_secs,
        })
    }

    /// Record name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hosted zone id
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Record type
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Published address
    pub fn value(&self) -> IpAddr {
        self.value
    }

    /// Record TTL in seconds
    pub fn ttl_secs(&self) -> u32 {
        self.ttl_secs
    }

    /// Routing weight
    pub fn weight(&self) -> i64 {
        Self::WEIGHT
    }

    /// Set identifier distinguishing this process's record from its peers
    pub fn set_identifier(&self) -> String {
        self.value.to_string()
    }
}

impl fmt::Display for RecordSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} => {} (zone {}, ttl {}s)",
            self.record_type, self.name, self.value, self.zone_id, self.ttl_secs
        )
    }
}

/// Change action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    /// Create or replace the record
    Upsert,
    /// Remove the record
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Upsert => f.write_str("UPSERT"),
            ChangeAction::Delete => f.write_str("DELETE"),
        }
    }
}

/// One change submitted to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeRequest {
    /// What to do with the record
    pub action: ChangeAction,
    /// The record
    pub record: RecordSpec,
    /// Optional change batch comment
    pub comment: Option<String>,
}

impl ChangeRequest {
    /// The setup change
    pub fn upsert(record: &RecordSpec) -> Self {
        Self {
            action: ChangeAction::Upsert,
            record: record.clone(),
            comment: Some(CHANGE_COMMENT.to_string()),
        }
    }

    /// The teardown change
    pub fn delete(record: &RecordSpec) -> Self {
        Self {
            action: ChangeAction::Delete,
            record: record.clone(),
            comment: None,
        }
    }
}

/// Provider identifier of a submitted change
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChangeHandle(String);

impl ChangeHandle {
    /// Wrap a provider change id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The provider change id
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChangeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Propagation status of a submitted change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationStatus {
    /// Not yet applied everywhere
    Pending,
    /// Applied on all authoritative servers
    InSync,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_config() -> RecordConfig {
        RecordConfig::new("svc.example.com", "Z1", 10)
    }

    #[test]
    fn spec_uses_address_as_set_identifier() {
        let spec = RecordSpec::new(&record_config(), "10.0.0.5".parse().unwrap()).unwrap();

        assert_eq!(spec.record_type(), RecordType::A);
        assert_eq!(spec.set_identifier(), "10.0.0.5");
        assert_eq!(spec.weight(), 100);
        assert_eq!(spec.ttl_secs(), 10);
    }

    #[test]
    fn ipv6_value_is_aaaa() {
        let spec = RecordSpec::new(&record_config(), "2001:db8::1".parse().unwrap()).unwrap();
        assert_eq!(spec.record_type(), RecordType::Aaaa);
    }

    #[test]
    fn upsert_and_delete_target_the_same_record() {
        let spec = RecordSpec::new(&record_config(), "10.0.0.5".parse().unwrap()).unwrap();
        let upsert = ChangeRequest::upsert(&spec);
        let delete = ChangeRequest::delete(&spec);

        assert_eq!(upsert.action, ChangeAction::Upsert);
        assert_eq!(delete.action, ChangeAction::Delete);
        assert_eq!(upsert.record, delete.record);
        assert_eq!(upsert.comment.as_deref(), Some(CHANGE_COMMENT));
        assert!(delete.comment.is_none());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = RecordConfig::new("svc.example.com", "Z1", 0);
        assert!(RecordSpec::new(&config, "10.0.0.5".parse().unwrap()).is_err());
    }
}
