//! Configuration types for the DNS sidecar
//!
//! The configuration is built once at startup, validated, and then handed to
//! the [`LifecycleController`](crate::LifecycleController) by value. Nothing
//! mutates it afterwards.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Largest TTL Route 53 accepts for a record set (two days)
pub const MAX_TTL_SECS: u32 = 172_800;

/// Main sidecar configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    /// The record this process owns
    pub record: RecordConfig,

    /// Where the published address comes from
    pub address: AddressStrategy,

    /// Seconds to wait before submitting the upsert
    #[serde(default)]
    pub setup_delay_secs: u64,

    /// Change propagation polling
    #[serde(default)]
    pub propagation: PropagationConfig,
}

impl SidecarConfig {
    /// Create a configuration with default delay and polling settings
    pub fn new(record: RecordConfig, address: AddressStrategy) -> Self {
        Self {
            record,
            address,
            setup_delay_secs: 0,
            propagation: PropagationConfig::default(),
        }
    }

    /// Set the pre-setup delay
    pub fn with_setup_delay(mut self, secs: u64) -> Self {
        self.setup_delay_secs = secs;
        self
    }

    /// Set the propagation polling settings
    pub fn with_propagation(mut self, propagation: PropagationConfig) -> Self {
        self.propagation = propagation;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.record.validate()?;
        self.address.validate()?;
        self.propagation.validate()?;
        Ok(())
    }
}

/// The DNS record to register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordConfig {
    /// DNS record name (e.g., "svc.example.com")
    pub name: String,

    /// Hosted zone id the record lives in
    pub zone_id: String,

    /// Record TTL, also the length of the post-delete drain
    pub ttl_secs: u32,
}

impl RecordConfig {
    /// Create a new record configuration
    pub fn new(name: impl Into<String>, zone_id: impl Into<String>, ttl_secs: u32) -> Self {
        Self {
            name: name.into(),
            zone_id: zone_id.into(),
            ttl_secs,
        }
    }

    /// Validate the record configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::config("Record name cannot be empty"));
        }
        if self.zone_id.trim().is_empty() {
            return Err(crate::Error::config("Hosted zone id cannot be empty"));
        }
        if self.ttl_secs == 0 {
            return Err(crate::Error::config("Record TTL must be > 0"));
        }
        if self.ttl_secs > MAX_TTL_SECS {
            return Err(crate::Error::config(format!(
                "Record TTL must be <= {} seconds, got {}",
                MAX_TTL_SECS, self.ttl_secs
            )));
        }
        Ok(())
    }
}

/// How the address to publish is determined
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AddressStrategy {
    /// A literal address, no I/O
    Explicit {
        /// The address literal
        value: String,
    },

    /// A single key from the instance metadata service
    CloudMetadata {
        /// Metadata key (e.g., "public-ipv4")
        key: String,
    },

    /// The first network address in the container task metadata
    ContainerMetadata,
}

impl AddressStrategy {
    /// Metadata key holding the instance's public IPv4 address
    pub const PUBLIC_IPV4: &'static str = "public-ipv4";

    /// Metadata key holding the instance's private IPv4 address
    pub const LOCAL_IPV4: &'static str = "local-ipv4";

    /// Selector value for container task metadata
    pub const CONTAINER_SELECTOR: &'static str = "ecs";

    /// The kind of source this strategy needs, `None` for explicit values
    pub fn source_kind(&self) -> Option<AddressSourceKind> {
        match self {
            AddressStrategy::Explicit { .. } => None,
            AddressStrategy::CloudMetadata { .. } => Some(AddressSourceKind::CloudMetadata),
            AddressStrategy::ContainerMetadata => Some(AddressSourceKind::ContainerMetadata),
        }
    }

    /// Validate the strategy
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            AddressStrategy::Explicit { value } => {
                value.trim().parse::<IpAddr>().map_err(|_| {
                    crate::Error::config(format!("Explicit address is not an IP literal: {}", value))
                })?;
                Ok(())
            }
            AddressStrategy::CloudMetadata { key } => {
                if key.is_empty() {
                    return Err(crate::Error::config("Metadata key cannot be empty"));
                }
                Ok(())
            }
            AddressStrategy::ContainerMetadata => Ok(()),
        }
    }
}

/// Parses the operator-facing address selector
///
/// `public-ipv4` and `local-ipv4` select instance metadata, `ecs` selects
/// container metadata, anything else is taken as a literal address.
impl FromStr for AddressStrategy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let strategy = match s {
            Self::PUBLIC_IPV4 | Self::LOCAL_IPV4 => AddressStrategy::CloudMetadata { key: s.to_string() },
            Self::CONTAINER_SELECTOR => AddressStrategy::ContainerMetadata,
            _ => AddressStrategy::Explicit { value: s.to_string() },
        };
        strategy.validate()?;
        Ok(strategy)
    }
}

impl fmt::Display for AddressStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressStrategy::Explicit { value } => write!(f, "explicit ({})", value),
            AddressStrategy::CloudMetadata { key } => write!(f, "instance metadata ({})", key),
            AddressStrategy::ContainerMetadata => write!(f, "container metadata"),
        }
    }
}

/// The family of metadata service an [`AddressSource`](crate::AddressSource) reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSourceKind {
    /// Cloud instance metadata
    CloudMetadata,
    /// Container / task metadata
    ContainerMetadata,
}

/// Change propagation polling configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationConfig {
    /// Seconds between status queries
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Failed queries tolerated before giving up; the next one is fatal
    #[serde(default = "default_max_poll_failures")]
    pub max_poll_failures: usize,

    /// How failed queries are counted
    #[serde(default)]
    pub failure_counting: FailureCounting,
}

impl PropagationConfig {
    /// Validate the polling configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        Ok(())
    }
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            max_poll_failures: default_max_poll_failures(),
            failure_counting: FailureCounting::default(),
        }
    }
}

/// How failed status queries are counted against the budget
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureCounting {
    /// Every failure in one wait counts, successes never reset the counter
    #[default]
    Cumulative,
    /// A successful query resets the counter
    Consecutive,
}

impl FromStr for FailureCounting {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cumulative" => Ok(FailureCounting::Cumulative),
            "consecutive" => Ok(FailureCounting::Consecutive),
            other => Err(crate::Error::config(format!(
                "Unknown failure counting '{}', expected cumulative or consecutive",
                other
            ))),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_max_poll_failures() -> usize {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_parsing() {
        assert_eq!(
            "public-ipv4".parse::<AddressStrategy>().unwrap(),
            AddressStrategy::CloudMetadata {
                key: "public-ipv4".to_string()
            }
        );
        assert_eq!(
            "ecs".parse::<AddressStrategy>().unwrap(),
            AddressStrategy::ContainerMetadata
        );
        assert_eq!(
            "10.0.0.5".parse::<AddressStrategy>().unwrap(),
            AddressStrategy::Explicit {
                value: "10.0.0.5".to_string()
            }
        );
        assert!("not-an-address".parse::<AddressStrategy>().is_err());
    }

    #[test]
    fn record_validation() {
        assert!(RecordConfig::new("svc.example.com", "Z1", 10).validate().is_ok());
        assert!(RecordConfig::new("", "Z1", 10).validate().is_err());
        assert!(RecordConfig::new("svc.example.com", "", 10).validate().is_err());
        assert!(RecordConfig::new("svc.example.com", "Z1", 0).validate().is_err());
        assert!(
            RecordConfig::new("svc.example.com", "Z1", MAX_TTL_SECS + 1)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn propagation_defaults() {
        let config = PropagationConfig::default();
        assert_eq!(config.poll_interval_secs, 5);
        assert_eq!(config.max_poll_failures, 3);
        assert_eq!(config.failure_counting, FailureCounting::Cumulative);
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: SidecarConfig = serde_json::from_value(serde_json::json!({
            "record": { "name": "svc.example.com", "zone_id": "Z1", "ttl_secs": 10 },
            "address": { "type": "container_metadata" }
        }))
        .unwrap();

        assert_eq!(config.setup_delay_secs, 0);
        assert_eq!(config.propagation, PropagationConfig::default());
        assert!(config.validate().is_ok());
    }
}
