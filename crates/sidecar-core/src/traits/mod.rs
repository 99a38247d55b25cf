//! Core traits for the DNS sidecar
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`AddressSource`]: Look up the address to publish
//! - [`DnsChangeClient`]: Submit record changes and query their status

pub mod address_source;
pub mod dns_change;

pub use address_source::AddressSource;
pub use dns_change::DnsChangeClient;
