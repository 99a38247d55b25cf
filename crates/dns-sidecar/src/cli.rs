//! Command line and environment configuration
//!
//! Every flag can also be set through the environment variable of the
//! same name in upper case, which is how the sidecar is normally configured
//! inside a task definition.

use anyhow::{Context, Result};
use clap::Parser;
use sidecar_core::{AddressStrategy, FailureCounting, PropagationConfig, RecordConfig, SidecarConfig};
use tracing::Level;

#[derive(Debug, Clone, Parser)]
#[command(name = "dns-sidecar", version, about = "Registers this task's address in a Route53 hosted zone for as long as it runs")]
pub struct Args {
    /// DNS name to publish
    #[arg(long = "dns", env = "DNS", default_value = "my.example.com")]
    pub dns: String,

    /// Route53 hosted zone id
    #[arg(long = "hostedzone", env = "HOSTEDZONE", default_value = "Z2AAAABCDEFGT4")]
    pub hosted_zone: String,

    /// Record TTL in seconds, also the drain time after deregistration
    #[arg(long = "dnsttl", env = "DNSTTL", default_value_t = 10)]
    pub dns_ttl: u32,

    /// Address to publish: public-ipv4, local-ipv4, ecs, or an IP literal
    #[arg(long = "ipaddress", env = "IPADDRESS", default_value = AddressStrategy::PUBLIC_IPV4)]
    pub ip_address: String,

    /// Seconds to wait before registering
    #[arg(long = "setupdelay", env = "SETUPDELAY", default_value_t = 0)]
    pub setup_delay: u64,

    /// Seconds between change status queries
    #[arg(long = "poll-interval", env = "POLL_INTERVAL", default_value_t = 5)]
    pub poll_interval: u64,

    /// Failed status queries tolerated per change
    #[arg(long = "max-poll-failures", env = "MAX_POLL_FAILURES", default_value_t = 3)]
    pub max_poll_failures: usize,

    /// How failed status queries are counted: cumulative or consecutive
    #[arg(long = "poll-failure-counting", env = "POLL_FAILURE_COUNTING", default_value = "cumulative")]
    pub poll_failure_counting: String,

    /// Log level: trace, debug, info, warn, error
    #[arg(long = "log-level", env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Validate the arguments and build the lifecycle configuration
    pub fn to_config(&self) -> Result<SidecarConfig> {
        validate_domain_name(&self.dns)?;

        if self.hosted_zone.trim().is_empty() {
            anyhow::bail!("HOSTEDZONE cannot be empty");
        }

        let address: AddressStrategy = self
            .ip_address
            .parse()
            .with_context(|| format!("IPADDRESS '{}' is not valid", self.ip_address))?;

        let failure_counting: FailureCounting = self
            .poll_failure_counting
            .parse()
            .context("POLL_FAILURE_COUNTING is not valid")?;

        let config = SidecarConfig::new(
            RecordConfig::new(self.dns.trim(), self.hosted_zone.trim(), self.dns_ttl),
            address,
        )
        .with_setup_delay(self.setup_delay)
        .with_propagation(PropagationConfig {
            poll_interval_secs: self.poll_interval,
            max_poll_failures: self.max_poll_failures,
            failure_counting,
        });

        config.validate()?;
        Ok(config)
    }

    /// Parse the configured log level
    pub fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Validate that a string is a valid domain name
///
/// Basic RFC 1035 checks. A single trailing dot (fully qualified form) is
/// accepted.
pub fn validate_domain_name(domain: &str) -> Result<()> {
    let domain = domain.strip_suffix('.').unwrap_or(domain);

    if domain.is_empty() {
        anyhow::bail!("DNS name cannot be empty");
    }

    if domain.len() > 253 {
        anyhow::bail!(
            "DNS name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        );
    }

    for label in domain.split('.') {
        if label.is_empty() {
            anyhow::bail!("DNS name has empty label: '{}'", domain);
        }

        if label.len() > 63 {
            anyhow::bail!(
                "DNS label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            );
        }

        // Route53 also accepts a leading wildcard label
        if label == "*" {
            continue;
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            anyhow::bail!(
                "DNS label contains invalid characters. Label: '{}'. \
                Valid: alphanumeric, hyphen and underscore only.",
                label
            );
        }

        if label.starts_with('-') || label.ends_with('-') {
            anyhow::bail!("DNS label cannot start or end with hyphen. Label: '{}'", label);
        }
    }

    Ok(())
}
