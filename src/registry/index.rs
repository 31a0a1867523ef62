//! Registry service index (discovery document)
//!
//! A NuGet v3 feed describes its endpoints in a JSON document:
//!
//! ```json
//! { "resources": [ { "@id": "https://.../flat/", "@type": "PackageBaseAddress/3.0.0" } ] }
//! ```

use crate::core::error::PublishError;
use serde::Deserialize;
use tracing::debug;

/// Resource type of the per-package version listing root
pub const PACKAGE_BASE_ADDRESS_TYPE: &str = "PackageBaseAddress/3.0.0";

/// Resource type of the push endpoint
pub const PACKAGE_PUBLISH_TYPE: &str = "PackagePublish/2.0.0";

/// Parsed service index
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceIndex {
    pub resources: Vec<ServiceResource>,
}

/// One declared resource
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ServiceResource {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@type")]
    pub resource_type: String,
}

impl ServiceIndex {
    /// Parse a service index body fetched from `url`
    pub fn parse(url: &str, body: &str) -> Result<Self, PublishError> {
        serde_json::from_str(body).map_err(|e| PublishError::MalformedIndex {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// URL of the first resource with the given type
    pub fn find(&self, resource_type: &str) -> Option<&str> {
        self.resources
            .iter()
            .find(|resource| resource.resource_type == resource_type)
            .map(|resource| resource.id.as_str())
    }

    /// URL of a required resource; `MalformedIndex` when absent
    pub fn require(&self, url: &str, resource_type: &str) -> Result<&str, PublishError> {
        self.find(resource_type)
            .ok_or_else(|| PublishError::MalformedIndex {
                url: url.to_string(),
                reason: format!("no resource of type {}", resource_type),
            })
    }

    /// Version listing endpoint
    pub fn version_endpoint(&self, url: &str) -> Result<RegistryEndpoint, PublishError> {
        let endpoint = RegistryEndpoint::new(self.require(url, PACKAGE_BASE_ADDRESS_TYPE)?);
        debug!(base_address = endpoint.base_address(), "resolved version endpoint");
        Ok(endpoint)
    }
}

/// Per-package version listing root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEndpoint {
    base_address: String,
}

impl RegistryEndpoint {
    /// Create an endpoint; a trailing `/` is added when missing
    pub fn new(base_address: &str) -> Self {
        let base_address = if base_address.ends_with('/') {
            base_address.to_string()
        } else {
            format!("{}/", base_address)
        };
        Self { base_address }
    }

    pub fn base_address(&self) -> &str {
        &self.base_address
    }

    /// `{base}{lowercase id}/index.json`
    pub fn versions_url(&self, package_id: &str) -> String {
        format!("{}{}/index.json", self.base_address, package_id.to_lowercase())
    }
}

/// Normalise a registry root URL to its service index URL
///
/// # Examples
///
/// ```
/// use release_publisher::registry::index::normalize_index_url;
///
/// assert_eq!(
///     normalize_index_url("https://api.nuget.org/v3/"),
///     "https://api.nuget.org/v3/index.json"
/// );
/// assert_eq!(
///     normalize_index_url("https://api.nuget.org/v3/index.json"),
///     "https://api.nuget.org/v3/index.json"
/// );
/// ```
pub fn normalize_index_url(root: &str) -> String {
    if root.ends_with("/index.json") {
        root.to_string()
    } else {
        format!("{}/index.json", root.trim_end_matches('/'))
    }
}
