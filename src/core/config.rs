//! Configuration structures and types for release-publisher
//!
//! This module provides type-safe configuration management with serde support.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public NuGet v3 service index
pub const DEFAULT_REGISTRY_URL: &str = "https://api.nuget.org/v3/index.json";

/// Environment variable holding the push API key
pub const DEFAULT_API_KEY_ENV: &str = "NUGETKEY";

/// Suffix marking a staging build that is promoted at publish time
pub const DEFAULT_STAGING_SUFFIX: &str = "stg";

/// Push timeout in seconds
pub const DEFAULT_PUSH_TIMEOUT_SECS: u64 = 300;

/// Root configuration object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublishConfig {
    /// Schema version (required)
    pub version: String,

    /// Target registry
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Publish behaviour
    #[serde(default)]
    pub publish: PublishOptionsConfig,

    /// Source checkout (required to build)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,

    /// Third-party binary dependency (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency: Option<DependencyConfig>,

    /// Where the build leaves its package (required to build)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactConfig>,

    /// Security settings (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityConfig>,
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegistryConfig {
    /// Service index URL (`/index.json` is appended when missing)
    pub url: String,

    /// Name of the environment variable holding the API key
    #[serde(rename = "apiKeyEnv")]
    pub api_key_env: String,

    /// Push timeout in seconds
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: u64,
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Publish options configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PublishOptionsConfig {
    /// Version suffix that triggers promotion to the base version
    #[serde(rename = "stagingSuffix")]
    pub staging_suffix: String,

    /// Stop before the push (default: false)
    #[serde(rename = "dryRun")]
    pub dry_run: bool,
}

/// Source checkout configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Git clone URL
    pub url: String,

    /// Branch to check out (default: "master")
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Checkout directory, relative to the project path
    pub directory: String,

    /// Solution file, relative to the checkout
    pub solution: String,

    /// Project descriptor, relative to the checkout
    pub descriptor: String,
}

fn default_branch() -> String {
    "master".to_string()
}

/// Dependency download configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DependencyConfig {
    /// URL prefix; the package kind subdirectory and archive name are appended
    #[serde(rename = "urlBase")]
    pub url_base: String,

    /// Archive file name (default: "latest.zip")
    #[serde(default = "default_archive")]
    pub archive: String,

    /// Extraction directory, relative to the project path
    pub directory: String,

    /// Placeholder in the descriptor replaced by the extraction directory
    #[serde(skip_serializing_if = "Option::is_none", rename = "pathPlaceholder")]
    pub path_placeholder: Option<String>,
}

fn default_archive() -> String {
    "latest.zip".to_string()
}

/// Build output configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactConfig {
    /// Output directory, relative to the checkout
    #[serde(rename = "outputDir")]
    pub output_dir: String,

    /// Substring the package file name must contain
    #[serde(rename = "nameContains")]
    pub name_contains: String,
}

/// Security configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecurityConfig {
    /// Environment variable expansion settings
    #[serde(skip_serializing_if = "Option::is_none", rename = "envVarExpansion")]
    pub env_var_expansion: Option<EnvVarExpansionConfig>,
}

/// Environment variable expansion configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvVarExpansionConfig {
    /// Enable environment variable expansion (default: true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Allowed environment variable prefixes (default: all)
    #[serde(skip_serializing_if = "Option::is_none", rename = "allowedPrefixes")]
    pub allowed_prefixes: Option<Vec<String>>,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            registry: RegistryConfig::default(),
            publish: PublishOptionsConfig::default(),
            source: None,
            dependency: None,
            artifact: None,
            security: Some(SecurityConfig::default()),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_seconds: DEFAULT_PUSH_TIMEOUT_SECS,
        }
    }
}

impl Default for PublishOptionsConfig {
    fn default() -> Self {
        Self {
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
            dry_run: false,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            env_var_expansion: Some(EnvVarExpansionConfig {
                enabled: Some(true),
                allowed_prefixes: None,
            }),
        }
    }
}
