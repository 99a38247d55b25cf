//! Address resolution
//!
//! The resolver maps an [`AddressStrategy`] to the address that will be
//! published. It runs exactly once, before any DNS operation, and never
//! retries: a failed lookup aborts startup.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sidecar_core::AddressResolver;
//!
//! let mut resolver = AddressResolver::new();
//! sidecar_metadata::register(&mut resolver)?;
//!
//! let address = resolver.resolve(&config.address).await?;
//! ```

use crate::config::{AddressSourceKind, AddressStrategy};
use crate::error::{Error, Result};
use crate::traits::AddressSource;
use std::collections::HashMap;
use std::net::IpAddr;
use tracing::{debug, info};

/// Resolves the address to publish from the configured strategy
///
/// Sources are registered by [`AddressSourceKind`] during startup. The
/// resolver is read-only once the lifecycle starts.
#[derive(Default)]
pub struct AddressResolver {
    sources: HashMap<AddressSourceKind, Box<dyn AddressSource>>,
}

impl AddressResolver {
    /// Create a resolver with no metadata sources
    ///
    /// Such a resolver can still resolve explicit addresses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address source, replacing any source of the same kind
    pub fn register_source(&mut self, source: Box<dyn AddressSource>) {
        debug!("Registering address source {} for {:?}", source.source_name(), source.kind());
        self.sources.insert(source.kind(), source);
    }

    /// Check if a source is registered for the given kind
    pub fn has_source(&self, kind: AddressSourceKind) -> bool {
        self.sources.contains_key(&kind)
    }

    /// Resolve the address for a strategy
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: The address to publish
    /// - `Err(Error::Resolution)`: No source for the strategy, the source
    ///   failed, or it returned something that is not an IP literal
    pub async fn resolve(&self, strategy: &AddressStrategy) -> Result<IpAddr> {
        let raw = match strategy {
            AddressStrategy::Explicit { value } => value.clone(),
            _ => {
                let kind = strategy.source_kind().ok_or_else(|| {
                    Error::resolution(format!("No source kind for strategy {}", strategy))
                })?;
                let source = self.sources.get(&kind).ok_or_else(|| {
                    Error::resolution(format!("No address source registered for {}", strategy))
                })?;

                info!("Fetching address from {}", strategy);
                source.fetch(strategy).await.map_err(|e| match e {
                    Error::Resolution(_) => e,
                    other => Error::resolution(format!("{}: {}", source.source_name(), other)),
                })?
            }
        };

        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::resolution(format!("{} returned an empty address", strategy)));
        }

        raw.parse::<IpAddr>()
            .map_err(|_| Error::resolution(format!("{} returned an invalid address: {}", strategy, raw)))
    }
}
