//! EC2 instance metadata source

use async_trait::async_trait;
use sidecar_core::{AddressSource, AddressSourceKind, AddressStrategy, Error, Result};
use tracing::debug;

/// Link-local address of the instance metadata service
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254";

/// Environment variable overriding the metadata endpoint (same as the AWS SDKs)
pub const IMDS_ENDPOINT_ENV: &str = "AWS_EC2_METADATA_SERVICE_ENDPOINT";

const TOKEN_PATH: &str = "/latest/api/token";
const METADATA_PATH: &str = "/latest/meta-data";
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";
const TOKEN_TTL_SECS: u32 = 21_600;

/// Reads a single key from the EC2 instance metadata service
pub struct Ec2MetadataSource {
    /// Service base URL, without trailing slash
    endpoint: String,

    /// HTTP client with the metadata timeout
    client: reqwest::Client,
}

impl Ec2MetadataSource {
    /// Create a source for the given endpoint
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            return Err(Error::config("Instance metadata endpoint cannot be empty"));
        }

        Ok(Self {
            endpoint,
            client: crate::metadata_client()?,
        })
    }

    /// Create a source for the endpoint in the environment, or the default one
    pub fn from_env() -> Result<Self> {
        let endpoint = std::env::var(IMDS_ENDPOINT_ENV)
            .ok()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_IMDS_ENDPOINT.to_string());
        Self::new(endpoint)
    }

    /// Request an IMDSv2 session token
    ///
    /// Returns `None` when the service does not issue tokens (IMDSv1 only),
    /// in which case the metadata read is attempted without one.
    async fn session_token(&self) -> Option<String> {
        let url = format!("{}{}", self.endpoint, TOKEN_PATH);
        let response = match self
            .client
            .put(&url)
            .header(TOKEN_TTL_HEADER, TOKEN_TTL_SECS.to_string())
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("IMDSv2 token request failed, falling back to IMDSv1: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!("IMDSv2 token request returned {}, falling back to IMDSv1", response.status());
            return None;
        }

        response.text().await.ok().filter(|t| !t.is_empty())
    }

    /// Read one metadata key
    async fn get_key(&self, key: &str) -> Result<String> {
        let token = self.session_token().await;
        let url = format!("{}{}/{}", self.endpoint, METADATA_PATH, key.trim_start_matches('/'));

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::resolution(format!("Failed to fetch instance metadata {}: {}", key, e)))?;

        if !response.status().is_success() {
            return Err(Error::resolution(format!(
                "Instance metadata {} returned HTTP {}",
                key,
                response.status()
            )));
        }

        let value = response
            .text()
            .await
            .map_err(|e| Error::resolution(format!("Failed to read instance metadata {}: {}", key, e)))?;

        let value = value.trim();
        if value.is_empty() {
            return Err(Error::resolution(format!("Instance metadata {} is empty", key)));
        }

        Ok(value.to_string())
    }
}

#[async_trait]
impl AddressSource for Ec2MetadataSource {
    async fn fetch(&self, strategy: &AddressStrategy) -> Result<String> {
        match strategy {
            AddressStrategy::CloudMetadata { key } => self.get_key(key).await,
            other => Err(Error::resolution(format!(
                "Instance metadata source cannot serve {}",
                other
            ))),
        }
    }

    fn kind(&self) -> AddressSourceKind {
        AddressSourceKind::CloudMetadata
    }

    fn source_name(&self) -> &'static str {
        "ec2-metadata"
    }
}
