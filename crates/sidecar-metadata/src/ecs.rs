//! ECS task metadata source

use async_trait::async_trait;
use serde::Deserialize;
use sidecar_core::{AddressSource, AddressSourceKind, AddressStrategy, Error, Result};
use tracing::debug;

/// Version 4 task metadata endpoint, preferred when present
pub const METADATA_URI_V4_ENV: &str = "ECS_CONTAINER_METADATA_URI_V4";

/// Version 3 task metadata endpoint
pub const METADATA_URI_ENV: &str = "ECS_CONTAINER_METADATA_URI";

/// Pick the container metadata URI from the environment
///
/// The v4 variable wins over the v3 one. Empty values count as unset.
pub fn metadata_uri(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    [METADATA_URI_V4_ENV, METADATA_URI_ENV]
        .into_iter()
        .filter_map(|var| lookup(var))
        .map(|uri| uri.trim().to_string())
        .find(|uri| !uri.is_empty())
}

/// The part of the container metadata document the sidecar reads
#[derive(Debug, Deserialize)]
struct ContainerMetadata {
    #[serde(rename = "Networks", default)]
    networks: Option<Vec<ContainerNetwork>>,
}

#[derive(Debug, Deserialize)]
struct ContainerNetwork {
    #[serde(rename = "IPv4Addresses", default)]
    ipv4_addresses: Option<Vec<String>>,
}

impl ContainerMetadata {
    /// First IPv4 address of the first network
    fn first_ipv4(&self) -> Option<&str> {
        self.networks
            .as_deref()?
            .first()?
            .ipv4_addresses
            .as_deref()?
            .first()
            .map(String::as_str)
    }
}

/// Reads the task address from the ECS container metadata endpoint
pub struct EcsTaskMetadataSource {
    /// Endpoint URI, if the task runtime advertised one
    uri: Option<String>,

    /// HTTP client with the metadata timeout
    client: reqwest::Client,
}

impl EcsTaskMetadataSource {
    /// Create a source for a known endpoint URI
    pub fn new(uri: Option<String>) -> Result<Self> {
        Ok(Self {
            uri,
            client: crate::metadata_client()?,
        })
    }

    /// Create a source for the endpoint advertised in the process environment
    ///
    /// A missing endpoint is not an error here. It only fails when the
    /// container strategy is actually resolved.
    pub fn from_env() -> Result<Self> {
        Self::new(metadata_uri(|var| std::env::var(var).ok()))
    }

    async fn fetch_document(&self) -> Result<ContainerMetadata> {
        let uri = self.uri.as_deref().ok_or_else(|| {
            Error::resolution(format!(
                "Container metadata endpoint not set ({} / {})",
                METADATA_URI_V4_ENV, METADATA_URI_ENV
            ))
        })?;

        debug!("Fetching container metadata from {}", uri);

        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| Error::resolution(format!("Failed to fetch container metadata: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::resolution(format!(
                "Container metadata endpoint returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::resolution(format!("Failed to read container metadata: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::resolution(format!("Malformed container metadata: {}", e)))
    }
}

#[async_trait]
impl AddressSource for EcsTaskMetadataSource {
    async fn fetch(&self, strategy: &AddressStrategy) -> Result<String> {
        if !matches!(strategy, AddressStrategy::ContainerMetadata) {
            return Err(Error::resolution(format!(
                "Container metadata source cannot serve {}",
                strategy
            )));
        }

        let document = self.fetch_document().await?;
        document
            .first_ipv4()
            .map(str::to_string)
            .ok_or_else(|| Error::resolution("Container metadata lists no IPv4 address"))
    }

    fn kind(&self) -> AddressSourceKind {
        AddressSourceKind::ContainerMetadata
    }

    fn source_name(&self) -> &'static str {
        "ecs-task-metadata"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn serve(body: ResponseTemplate) -> (MockServer, EcsTaskMetadataSource) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/task"))
            .respond_with(body)
            .mount(&server)
            .await;

        let source = EcsTaskMetadataSource::new(Some(format!("{}/v4/task", server.uri()))).unwrap();
        (server, source)
    }

    #[test]
    fn v4_endpoint_takes_precedence() {
        let env: HashMap<&str, &str> = [
            (METADATA_URI_V4_ENV, "http://169.254.170.2/v4/abc"),
            (METADATA_URI_ENV, "http://169.254.170.2/v3/abc"),
        ]
        .into();

        let uri = metadata_uri(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(uri.as_deref(), Some("http://169.254.170.2/v4/abc"));
    }

    #[test]
    fn empty_v4_endpoint_falls_back_to_v3() {
        let env: HashMap<&str, &str> = [
            (METADATA_URI_V4_ENV, ""),
            (METADATA_URI_ENV, "http://169.254.170.2/v3/abc"),
        ]
        .into();

        let uri = metadata_uri(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(uri.as_deref(), Some("http://169.254.170.2/v3/abc"));
    }

    #[test]
    fn no_endpoint_in_environment() {
        assert_eq!(metadata_uri(|_| None), None);
    }

    #[tokio::test]
    async fn returns_first_address_of_first_network() {
        let body = serde_json::json!({
            "DockerId": "abc",
            "Networks": [
                { "NetworkMode": "awsvpc", "IPv4Addresses": ["10.0.2.15", "10.0.2.16"] },
                { "NetworkMode": "bridge", "IPv4Addresses": ["172.17.0.2"] }
            ]
        });
        let (_server, source) = serve(ResponseTemplate::new(200).set_body_json(body)).await;

        let value = source.fetch(&AddressStrategy::ContainerMetadata).await.unwrap();
        assert_eq!(value, "10.0.2.15");
    }

    #[tokio::test]
    async fn empty_address_list_is_an_error() {
        let body = serde_json::json!({ "Networks": [{ "IPv4Addresses": [] }] });
        let (_server, source) = serve(ResponseTemplate::new(200).set_body_json(body)).await;

        let err = source.fetch(&AddressStrategy::ContainerMetadata).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }

    #[tokio::test]
    async fn missing_networks_is_an_error() {
        let body = serde_json::json!({ "DockerId": "abc" });
        let (_server, source) = serve(ResponseTemplate::new(200).set_body_json(body)).await;

        assert!(source.fetch(&AddressStrategy::ContainerMetadata).await.is_err());
    }

    #[tokio::test]
    async fn malformed_document_is_an_error() {
        let (_server, source) = serve(ResponseTemplate::new(200).set_body_string("not json")).await;

        let err = source.fetch(&AddressStrategy::ContainerMetadata).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(ref msg) if msg.contains("Malformed")));
    }

    #[tokio::test]
    async fn server_error_is_an_error() {
        let (_server, source) = serve(ResponseTemplate::new(500)).await;

        let err = source.fetch(&AddressStrategy::ContainerMetadata).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn missing_endpoint_fails_on_fetch() {
        let source = EcsTaskMetadataSource::new(None).unwrap();

        let err = source.fetch(&AddressStrategy::ContainerMetadata).await.unwrap_err();
        assert!(matches!(err, Error::Resolution(ref msg) if msg.contains(METADATA_URI_V4_ENV)));
    }
}
