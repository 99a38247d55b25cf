// # Metadata Address Sources
//
// This crate provides the HTTP-backed address sources for the DNS sidecar.
//
// ## Sources
//
// - [`Ec2MetadataSource`]: one key (e.g. `public-ipv4`) from the EC2
//   instance metadata service, using an IMDSv2 session token when the
//   service hands one out
// - [`EcsTaskMetadataSource`]: the first IPv4 address of the first network
//   in the ECS task metadata document
//
// ## Timeouts
//
// Metadata services are link-local and answer in milliseconds. Every request
// uses a fixed one second timeout, and a timeout is as fatal as any other
// failure: the sidecar must not publish an address it could not confirm.

mod ec2;
mod ecs;

pub use ec2::{DEFAULT_IMDS_ENDPOINT, Ec2MetadataSource, IMDS_ENDPOINT_ENV};
pub use ecs::{EcsTaskMetadataSource, METADATA_URI_ENV, METADATA_URI_V4_ENV, metadata_uri};

use sidecar_core::{AddressResolver, Error, Result};
use std::time::Duration;

/// Timeout applied to every metadata request
pub const METADATA_TIMEOUT: Duration = Duration::from_secs(1);

/// Build the HTTP client shared by the metadata sources
fn metadata_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(METADATA_TIMEOUT)
        .build()
        .map_err(|e| Error::http(format!("Failed to build metadata HTTP client: {}", e)))
}

/// Register both metadata sources with a resolver
///
/// Endpoints are read from the environment once, here.
pub fn register(resolver: &mut AddressResolver) -> Result<()> {
    resolver.register_source(Box::new(Ec2MetadataSource::from_env()?));
    resolver.register_source(Box::new(EcsTaskMetadataSource::from_env()?));
    Ok(())
}
