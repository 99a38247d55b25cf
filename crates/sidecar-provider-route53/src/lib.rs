// # Route53 Change Client
//
// This crate implements `DnsChangeClient` on top of the AWS Route53 API.
//
// ## Calls
//
// - submit: `ChangeResourceRecordSets` with a single UPSERT or DELETE change
// - poll: `GetChange` on the returned change id
//
// Records are weighted (weight 100) with the record value as set identifier,
// so several sidecars can publish the same name without overwriting each
// other. A DELETE must carry the exact same record set as the UPSERT.
//
// ## Credentials
//
// Credentials and region come from the default AWS provider chain
// (environment, profile, container or instance role). The region falls back
// to us-east-1 since Route53 is a global service.
//
// ## Failure Handling
//
// This client makes exactly one API call per method invocation. Counting and
// tolerating poll failures is the propagation waiter's job.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_config::meta::region::RegionProviderChain;
use aws_sdk_route53::Client;
use aws_sdk_route53::config::Region;
use aws_sdk_route53::error::{DisplayErrorContext, SdkError};
use aws_sdk_route53::types::{
    Change, ChangeAction as Route53Action, ChangeBatch, ChangeStatus, ResourceRecord, ResourceRecordSet, RrType,
};
use sidecar_core::{
    ChangeAction, ChangeHandle, ChangeRequest, DnsChangeClient, Error, PropagationStatus, RecordType, Result,
};
use tracing::{debug, info};

const PROVIDER_NAME: &str = "route53";

/// Region used when the provider chain yields none
pub const FALLBACK_REGION: &str = "us-east-1";

/// Route53 implementation of `DnsChangeClient`
pub struct Route53ChangeClient {
    client: Client,
}

impl std::fmt::Debug for Route53ChangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // SDK config holds credentials providers, keep them out of logs
        f.debug_struct("Route53ChangeClient")
            .field("provider", &PROVIDER_NAME)
            .finish_non_exhaustive()
    }
}

impl Route53ChangeClient {
    /// Wrap an already configured SDK client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS configuration chain
    pub async fn from_env() -> Self {
        let region = RegionProviderChain::default_provider().or_else(Region::new(FALLBACK_REGION));
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        debug!(
            "Route53 client configured (region: {})",
            config.region().map(|r| r.as_ref()).unwrap_or(FALLBACK_REGION)
        );

        Self::new(Client::new(&config))
    }
}

/// Translate a change request into a Route53 change batch
pub fn build_change_batch(request: &ChangeRequest) -> Result<ChangeBatch> {
    let record = &request.record;
    let invalid = |e: aws_sdk_route53::error::BuildError| {
        Error::submission(PROVIDER_NAME, format!("Invalid change batch: {}", e))
    };

    let value = ResourceRecord::builder()
        .value(record.value().to_string())
        .build()
        .map_err(invalid)?;

    let record_set = ResourceRecordSet::builder()
        .name(record.name())
        .r#type(rr_type(record.record_type()))
        .ttl(i64::from(record.ttl_secs()))
        .weight(record.weight())
        .set_identifier(record.set_identifier())
        .resource_records(value)
        .build()
        .map_err(invalid)?;

    let change = Change::builder()
        .action(route53_action(request.action))
        .resource_record_set(record_set)
        .build()
        .map_err(invalid)?;

    ChangeBatch::builder()
        .changes(change)
        .set_comment(request.comment.clone())
        .build()
        .map_err(invalid)
}

fn rr_type(record_type: RecordType) -> RrType {
    match record_type {
        RecordType::A => RrType::A,
        RecordType::Aaaa => RrType::Aaaa,
    }
}

fn route53_action(action: ChangeAction) -> Route53Action {
    match action {
        ChangeAction::Upsert => Route53Action::Upsert,
        ChangeAction::Delete => Route53Action::Delete,
    }
}

/// Map a Route53 change status onto propagation status
///
/// Only INSYNC counts as propagated. Unknown future statuses are treated
/// as still pending.
pub fn propagation_status(status: &ChangeStatus) -> PropagationStatus {
    match status {
        ChangeStatus::Insync => PropagationStatus::InSync,
        _ => PropagationStatus::Pending,
    }
}

/// Describe an SDK error with its full source chain
fn describe_sdk_error<E, R>(e: &SdkError<E, R>) -> String
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match e {
        SdkError::TimeoutError(_) => "Request timed out".to_string(),
        SdkError::DispatchFailure(_) => format!("Connection failed: {}", DisplayErrorContext(e)),
        _ => DisplayErrorContext(e).to_string(),
    }
}

#[async_trait]
impl DnsChangeClient for Route53ChangeClient {
    async fn submit(&self, request: &ChangeRequest) -> Result<ChangeHandle> {
        let batch = build_change_batch(request)?;

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(request.record.zone_id())
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| Error::submission(PROVIDER_NAME, describe_sdk_error(&e)))?;

        let info = output
            .change_info()
            .ok_or_else(|| Error::submission(PROVIDER_NAME, "Response carried no change info"))?;

        info!(
            "Route53 accepted {} for {} (change {})",
            request.action,
            request.record,
            info.id()
        );

        Ok(ChangeHandle::new(info.id()))
    }

    async fn poll(&self, handle: &ChangeHandle) -> Result<PropagationStatus> {
        let output = self
            .client
            .get_change()
            .id(handle.id())
            .send()
            .await
            .map_err(|e| Error::poll(PROVIDER_NAME, describe_sdk_error(&e)))?;

        let info = output
            .change_info()
            .ok_or_else(|| Error::poll(PROVIDER_NAME, "Response carried no change info"))?;

        debug!("Change {} status: {}", handle, info.status().as_str());

        Ok(propagation_status(info.status()))
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sidecar_core::{RecordConfig, RecordSpec};

    fn spec(address: &str) -> RecordSpec {
        RecordSpec::new(&RecordConfig::new("svc.example.com", "Z1", 10), address.parse().unwrap()).unwrap()
    }

    #[test]
    fn upsert_batch_carries_weighted_record_and_comment() {
        let batch = build_change_batch(&ChangeRequest::upsert(&spec("10.0.0.5"))).unwrap();

        assert_eq!(batch.comment(), Some("dns-sidecar"));
        assert_eq!(batch.changes().len(), 1);
        assert_eq!(batch.changes()[0].action(), &Route53Action::Upsert);

        let rendered = format!("{:?}", batch);
        assert!(rendered.contains("svc.example.com"));
        assert!(rendered.contains("\"10.0.0.5\""));
        assert!(rendered.contains("Some(100)"));
        assert!(rendered.contains("Some(10)"));
    }

    #[test]
    fn delete_batch_has_no_comment() {
        let batch = build_change_batch(&ChangeRequest::delete(&spec("10.0.0.5"))).unwrap();

        assert_eq!(batch.comment(), None);
        assert_eq!(batch.changes()[0].action(), &Route53Action::Delete);
    }

    #[test]
    fn ipv6_address_becomes_aaaa_record() {
        let batch = build_change_batch(&ChangeRequest::upsert(&spec("2001:db8::1"))).unwrap();

        let rendered = format!("{:?}", batch);
        assert!(rendered.contains("Aaaa"));
        assert!(rendered.contains("2001:db8::1"));
    }

    #[test]
    fn only_insync_counts_as_propagated() {
        assert_eq!(propagation_status(&ChangeStatus::Insync), PropagationStatus::InSync);
        assert_eq!(propagation_status(&ChangeStatus::Pending), PropagationStatus::Pending);
        assert_eq!(
            propagation_status(&ChangeStatus::from("SOMETHING_NEW")),
            PropagationStatus::Pending
        );
    }

    #[test]
    fn debug_output_is_redacted() {
        let config = aws_sdk_route53::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(FALLBACK_REGION))
            .build();
        let client = Route53ChangeClient::new(Client::from_conf(config));

        assert_eq!(format!("{:?}", client), "Route53ChangeClient { provider: \"route53\", .. }");
    }
}
