//! Version existence oracle
//!
//! A version collides with a published one when they share a base version:
//! `1.0.0-stg` is considered published if `1.0.0` or any `1.0.0-*` is listed,
//! and vice versa.

use crate::core::error::PublishError;
use crate::core::traits::split_version;
use crate::registry::client::NuGetRegistry;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct VersionListing {
    versions: Vec<String>,
}

/// First published version colliding with `version`, if any
///
/// # Examples
///
/// ```
/// use release_publisher::registry::find_collision;
///
/// let published = vec!["0.9.0".to_string(), "1.0.0-beta".to_string()];
/// assert_eq!(find_collision("1.0.0-stg", &published), Some("1.0.0-beta"));
/// assert_eq!(find_collision("1.1.0", &published), None);
/// ```
pub fn find_collision<'a>(version: &str, published: &'a [String]) -> Option<&'a str> {
    let (base, _) = split_version(version);
    let prefix = format!("{}-", base);

    published
        .iter()
        .map(String::as_str)
        .find(|candidate| {
            candidate.eq_ignore_ascii_case(base)
                || candidate
                    .get(..prefix.len())
                    .is_some_and(|head| head.eq_ignore_ascii_case(&prefix))
        })
}

impl NuGetRegistry {
    /// Published versions of `package_id`; empty when the registry has none
    pub async fn published_versions(&self, package_id: &str) -> Result<Vec<String>, PublishError> {
        let endpoint = self.resolve_version_endpoint().await?;
        let url = endpoint.versions_url(package_id);

        debug!(url = %url, "listing published versions");
        let response = self
            .http()
            .get(&url)
            .send()
            .await
            .map_err(|e| PublishError::unreachable(&url, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(package_id, "package not yet published");
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(PublishError::unreachable(&url, format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PublishError::unreachable(&url, e))?;
        let listing: VersionListing =
            serde_json::from_str(&body).map_err(|e| PublishError::MalformedIndex {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        Ok(listing.versions)
    }

    /// Published version colliding with `version`, if any
    pub async fn find_published_collision(
        &self,
        package_id: &str,
        version: &str,
    ) -> Result<Option<String>, PublishError> {
        let published = self.published_versions(package_id).await?;
        let collision = find_collision(version, &published).map(str::to_string);

        if let Some(existing) = &collision {
            info!(package_id, version, existing = %existing, "version already published");
        }
        Ok(collision)
    }

    /// Whether `version` or a variant sharing its base version is published
    pub async fn version_already_published(
        &self,
        package_id: &str,
        version: &str,
    ) -> Result<bool, PublishError> {
        Ok(self
            .find_published_collision(package_id, version)
            .await?
            .is_some())
    }
}
