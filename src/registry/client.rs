//! NuGet v3 registry client
//!
//! Owns the HTTP client, the API key and the cached service index for one
//! run. The version oracle lives in [`super::versions`]; pushing is provided
//! through [`PackagePusher`].

use crate::core::config::RegistryConfig;
use crate::core::error::PublishError;
use crate::core::traits::PackagePusher;
use crate::registry::index::{
    normalize_index_url, RegistryEndpoint, ServiceIndex, PACKAGE_PUBLISH_TYPE,
};
use crate::security::token_manager::SecureTokenManager;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Header carrying the push API key
const API_KEY_HEADER: &str = "X-NuGet-ApiKey";

/// Longest registry error body kept in `PushRejected`
const MAX_ERROR_BODY: usize = 512;

/// Registry client for one run
pub struct NuGetRegistry {
    http: reqwest::Client,
    index_url: String,
    api_key: Option<SecretString>,
    tokens: SecureTokenManager,
    push_timeout: Duration,
    index: OnceCell<ServiceIndex>,
}

impl NuGetRegistry {
    /// Create a client from registry configuration and an optional API key
    pub fn new(config: &RegistryConfig, api_key: Option<SecretString>) -> Result<Self, PublishError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("release-publisher/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PublishError::ConfigError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            index_url: normalize_index_url(&config.url),
            api_key,
            tokens: SecureTokenManager::new(&config.api_key_env),
            push_timeout: config.timeout(),
            index: OnceCell::new(),
        })
    }

    /// Create a client, reading the API key from the configured variable
    pub fn from_env(config: &RegistryConfig) -> Result<Self, PublishError> {
        let tokens = SecureTokenManager::new(&config.api_key_env);
        let api_key = tokens.get_token();
        info!(
            variable = %config.api_key_env,
            "API key length: {}",
            api_key.as_ref().map(|k| k.expose_secret().len()).unwrap_or(0)
        );
        Self::new(config, api_key)
    }

    pub fn index_url(&self) -> &str {
        &self.index_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Service index, fetched on first use and cached for the client's lifetime
    pub async fn service_index(&self) -> Result<&ServiceIndex, PublishError> {
        self.index
            .get_or_try_init(|| async {
                debug!(url = %self.index_url, "fetching service index");
                let response = self
                    .http
                    .get(&self.index_url)
                    .send()
                    .await
                    .map_err(|e| PublishError::unreachable(&self.index_url, e))?;

                let status = response.status();
                if !status.is_success() {
                    return Err(PublishError::unreachable(
                        &self.index_url,
                        format!("HTTP {}", status),
                    ));
                }

                let body = response
                    .text()
                    .await
                    .map_err(|e| PublishError::unreachable(&self.index_url, e))?;
                ServiceIndex::parse(&self.index_url, &body)
            })
            .await
    }

    /// Resolve the per-package version listing root
    pub async fn resolve_version_endpoint(&self) -> Result<RegistryEndpoint, PublishError> {
        self.service_index().await?.version_endpoint(&self.index_url)
    }

    async fn publish_url(&self) -> Result<String, PublishError> {
        let index = self.service_index().await?;
        Ok(index.require(&self.index_url, PACKAGE_PUBLISH_TYPE)?.to_string())
    }
}

#[async_trait]
impl PackagePusher for NuGetRegistry {
    fn name(&self) -> &str {
        &self.index_url
    }

    async fn push(&self, artifact: &Path) -> Result<(), PublishError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| PublishError::TokenMissing {
                variable: self.tokens.variable().to_string(),
            })?;

        let url = self.publish_url().await?;

        let bytes = tokio::fs::read(artifact).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PublishError::NotFound {
                    path: artifact.to_path_buf(),
                }
            } else {
                PublishError::io(artifact, e)
            }
        })?;
        let file_name = artifact
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "package.nupkg".to_string());

        info!(url = %url, file = %file_name, size = bytes.len(), "pushing package");

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| PublishError::io(artifact, e))?;
        let form = Form::new().part("package", part);

        let response = self
            .http
            .put(&url)
            .header(API_KEY_HEADER, api_key.expose_secret())
            .timeout(self.push_timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::unreachable(&url, e))?;

        let status = response.status();
        if status.is_success() {
            info!(status = status.as_u16(), "package accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let mut message = self.tokens.mask_tokens_in_string(&body, api_key);
        if message.len() > MAX_ERROR_BODY {
            let mut end = MAX_ERROR_BODY;
            while !message.is_char_boundary(end) {
                end -= 1;
            }
            message.truncate(end);
        }
        if message.trim().is_empty() {
            message = status
                .canonical_reason()
                .unwrap_or("no response body")
                .to_string();
        }

        Err(PublishError::PushRejected {
            status: status.as_u16(),
            message,
        })
    }
}
