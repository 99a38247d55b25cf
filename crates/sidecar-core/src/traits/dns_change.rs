// # DNS Change Client Trait
//
// Defines the interface for submitting record changes to a hosted-zone DNS
// provider and querying their propagation status.
//
// ## Implementations
//
// - Route 53: `sidecar-provider-route53` crate
//
// ## Usage
//
// ```rust,ignore
// use sidecar_core::{ChangeRequest, DnsChangeClient};
//
// #[tokio::main]
// async fn main() -> sidecar_core::Result<()> {
//     let client = /* DnsChangeClient implementation */;
//
//     let handle = client.submit(&ChangeRequest::upsert(&record)).await?;
//     let status = client.poll(&handle).await?;
//
//     Ok(())
// }
// ```

use crate::record::{ChangeHandle, ChangeRequest, PropagationStatus};
use async_trait::async_trait;

/// Trait for DNS change client implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform API calls to the provider endpoint only
/// - ✅ Translate provider responses into [`ChangeHandle`] / [`PropagationStatus`]
///
/// ## Forbidden Capabilities
/// - ❌ Retry submissions (a rejected change needs operator intervention)
/// - ❌ Poll in a loop (owned by `PropagationWaiter`)
/// - ❌ Deduplicate changes (callers submit each logical change once)
/// - ❌ Spawn tasks or sleep
///
/// ## Examples
///
/// ✅ **CORRECT**: One mutation per call
/// ```rust,ignore
/// async fn submit(&self, request: &ChangeRequest) -> Result<ChangeHandle> {
///     let output = self.api.change_record_sets(request).await
///         .map_err(|e| Error::submission("provider", e.to_string()))?;
///     Ok(ChangeHandle::new(output.id))
/// }
/// ```
///
/// ❌ **WRONG**: Waiting for propagation inside `submit`
/// ```rust,ignore
/// async fn submit(&self, request: &ChangeRequest) -> Result<ChangeHandle> {
///     let handle = self.do_submit(request).await?;
///     while self.poll(&handle).await? != PropagationStatus::InSync {
///         tokio::time::sleep(Duration::from_secs(5)).await; // WRONG!
///     }
///     Ok(handle)
/// }
/// ```
#[async_trait]
pub trait DnsChangeClient: Send + Sync {
    /// Submit one change batch containing the request
    ///
    /// # Returns
    ///
    /// - `Ok(ChangeHandle)`: The provider accepted the change
    /// - `Err(Error::ProviderSubmission)`: The provider rejected it
    async fn submit(&self, request: &ChangeRequest) -> Result<ChangeHandle, crate::Error>;

    /// Query the propagation status of a submitted change
    ///
    /// Statuses other than fully propagated are reported as
    /// [`PropagationStatus::Pending`].
    ///
    /// # Returns
    ///
    /// - `Ok(PropagationStatus)`: The current status
    /// - `Err(Error::ProviderPoll)`: The query failed
    async fn poll(&self, handle: &ChangeHandle) -> Result<PropagationStatus, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}
