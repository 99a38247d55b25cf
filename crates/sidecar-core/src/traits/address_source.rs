// # Address Source Trait
//
// Defines the interface for looking up the address this host should publish.
//
// ## Implementations
//
// - EC2 instance metadata: `sidecar-metadata` crate
// - ECS task metadata: `sidecar-metadata` crate
//
// Explicit addresses need no source; the `AddressResolver` handles them
// without I/O.
//
// ## Usage
//
// ```rust,ignore
// use sidecar_core::AddressSource;
//
// #[tokio::main]
// async fn main() -> sidecar_core::Result<()> {
//     let source = /* AddressSource implementation */;
//
//     let address = source.fetch(&strategy).await?;
//     println!("Publishing {}", address);
//
//     Ok(())
// }
// ```

use crate::config::{AddressSourceKind, AddressStrategy};
use async_trait::async_trait;

/// Trait for address source implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ One HTTP exchange with a local metadata endpoint per call
/// - ✅ A short, fixed per-request timeout
///
/// ## Forbidden Capabilities
/// - ❌ Retries (a failed lookup is fatal and reported to the operator)
/// - ❌ Returning a guessed or default address when the lookup fails
/// - ❌ Touching DNS
///
/// Publishing a wrong address is worse than not starting, so every failure
/// must surface as an error.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Fetch the raw address string
    ///
    /// The strategy is passed so sources can read strategy-specific
    /// parameters such as the metadata key.
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: The address as reported by the service
    /// - `Err(Error)`: The service was unreachable or returned nothing usable
    async fn fetch(&self, strategy: &AddressStrategy) -> Result<String, crate::Error>;

    /// Which strategy family this source serves
    fn kind(&self) -> AddressSourceKind;

    /// Source name (for logging)
    fn source_name(&self) -> &'static str;
}
