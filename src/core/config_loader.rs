//! Configuration file loader for release-publisher
//!
//! This module provides configuration loading, layering, environment
//! expansion and validation.

use super::config::*;
use crate::core::error::PublishError;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Configuration file name
pub const CONFIG_FILENAME: &str = ".release-publisher.yaml";

lazy_static! {
    /// Environment variable pattern (${VAR_NAME})
    static ref ENV_VAR_REGEX: Regex = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").unwrap();
}

/// Settings given on the command line (highest priority)
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub registry_url: Option<String>,
    pub staging_suffix: Option<String>,
    pub dry_run: bool,
}

/// Configuration load options
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    /// Project path to load config from
    pub project_path: PathBuf,

    /// Explicit config file (replaces the project config file)
    pub config_file: Option<PathBuf>,

    /// CLI arguments (highest priority)
    pub cli_args: CliOverrides,

    /// Environment variables
    pub env: HashMap<String, String>,
}

impl ConfigLoadOptions {
    /// Options for a project directory using the process environment
    pub fn for_project(project_path: impl Into<PathBuf>) -> Self {
        Self {
            project_path: project_path.into(),
            config_file: None,
            cli_args: CliOverrides::default(),
            env: std::env::vars().collect(),
        }
    }
}

/// Configuration validation result
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationResult {
    pub valid: bool,
    pub errors: Vec<ConfigValidationIssue>,
    pub warnings: Vec<ConfigValidationIssue>,
}

/// Single configuration problem, keyed by field path (e.g. "registry.url")
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValidationIssue {
    pub field: String,
    pub message: String,
}

impl ConfigValidationIssue {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Configuration file loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from multiple sources with priority
    ///
    /// Priority (high to low):
    /// 1. CLI arguments
    /// 2. Environment variables
    /// 3. Config file (explicit path or ./.release-publisher.yaml)
    /// 4. Default values
    pub async fn load(options: ConfigLoadOptions) -> Result<PublishConfig, PublishError> {
        let file_path = options
            .config_file
            .clone()
            .unwrap_or_else(|| options.project_path.join(CONFIG_FILENAME));

        let mut config = match Self::load_config_file(&file_path).await? {
            Some(config) => config,
            None if options.config_file.is_some() => {
                return Err(PublishError::ConfigError(format!(
                    "config file {} does not exist",
                    file_path.display()
                )));
            }
            None => PublishConfig::default(),
        };

        Self::apply_env(&mut config, &options.env);
        Self::apply_cli(&mut config, &options.cli_args);

        let config = Self::expand_env_vars(config, &options.env);

        let result = Self::validate(&config);
        for warning in &result.warnings {
            warn!(field = %warning.field, "{}", warning.message);
        }
        if !result.valid {
            return Err(PublishError::ConfigError(Self::format_validation_result(
                &result,
            )));
        }

        Ok(config)
    }

    /// Load configuration from a YAML file, `None` if it does not exist
    async fn load_config_file(file_path: &Path) -> Result<Option<PublishConfig>, PublishError> {
        if !file_path.exists() {
            debug!(path = %file_path.display(), "no config file, using defaults");
            return Ok(None);
        }

        let content = fs::read_to_string(file_path).await.map_err(|e| {
            PublishError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config: PublishConfig = serde_yaml::from_str(&content).map_err(|e| {
            PublishError::ConfigError(format!("Failed to parse YAML config: {}", e))
        })?;

        debug!(path = %file_path.display(), "loaded config file");
        Ok(Some(config))
    }

    /// Apply environment variable overrides
    fn apply_env(config: &mut PublishConfig, env: &HashMap<String, String>) {
        // PUBLISH_REGISTRY_URL -> registry.url
        if let Some(url) = env.get("PUBLISH_REGISTRY_URL") {
            config.registry.url = url.clone();
        }

        // PUBLISH_API_KEY_ENV -> registry.apiKeyEnv
        if let Some(name) = env.get("PUBLISH_API_KEY_ENV") {
            config.registry.api_key_env = name.clone();
        }

        // PUBLISH_STAGING_SUFFIX -> publish.stagingSuffix
        if let Some(suffix) = env.get("PUBLISH_STAGING_SUFFIX") {
            config.publish.staging_suffix = suffix.clone();
        }

        // PUBLISH_DRY_RUN -> publish.dryRun
        if env.get("PUBLISH_DRY_RUN").map(|s| s.as_str()) == Some("true") {
            config.publish.dry_run = true;
        }
    }

    /// Apply command line overrides
    fn apply_cli(config: &mut PublishConfig, cli: &CliOverrides) {
        if let Some(url) = &cli.registry_url {
            config.registry.url = url.clone();
        }
        if let Some(suffix) = &cli.staging_suffix {
            config.publish.staging_suffix = suffix.clone();
        }
        if cli.dry_run {
            config.publish.dry_run = true;
        }
    }

    /// Expand environment variables in URL fields
    ///
    /// Only `${VAR_NAME}` references are expanded, and only for names matching
    /// `allowedPrefixes` when that list is configured.
    fn expand_env_vars(mut config: PublishConfig, env: &HashMap<String, String>) -> PublishConfig {
        let expansion = config
            .security
            .as_ref()
            .and_then(|s| s.env_var_expansion.as_ref());

        let enabled = expansion.and_then(|e| e.enabled).unwrap_or(true);
        if !enabled {
            return config;
        }

        let allowed_prefixes = expansion.and_then(|e| e.allowed_prefixes.clone());

        config.registry.url = Self::expand_string(&config.registry.url, env, &allowed_prefixes);
        if let Some(source) = &mut config.source {
            source.url = Self::expand_string(&source.url, env, &allowed_prefixes);
        }
        if let Some(dependency) = &mut config.dependency {
            dependency.url_base = Self::expand_string(&dependency.url_base, env, &allowed_prefixes);
        }

        config
    }

    /// Expand environment variables in a single string
    fn expand_string(
        input: &str,
        env: &HashMap<String, String>,
        allowed_prefixes: &Option<Vec<String>>,
    ) -> String {
        let mut result = input.to_string();
        for cap in ENV_VAR_REGEX.captures_iter(input) {
            let var_name = &cap[1];

            if let Some(prefixes) = allowed_prefixes
                && !prefixes.iter().any(|prefix| var_name.starts_with(prefix))
            {
                warn!(variable = var_name, "not allowed by prefix whitelist, skipping");
                continue;
            }

            match env.get(var_name) {
                Some(value) => result = result.replace(&format!("${{{}}}", var_name), value),
                None => warn!(variable = var_name, "environment variable not found"),
            }
        }

        result
    }

    /// Validate configuration
    pub fn validate(config: &PublishConfig) -> ConfigValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        // 1. Check version (required)
        if config.version.is_empty() {
            errors.push(ConfigValidationIssue::new("version", "Version is required"));
        } else if config.version != "1.0" {
            warnings.push(ConfigValidationIssue::new(
                "version",
                format!("Unknown version: {}", config.version),
            ));
        }

        // 2. Registry
        let url = &config.registry.url;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            errors.push(ConfigValidationIssue::new(
                "registry.url",
                format!("Registry URL must be http(s): {}", url),
            ));
        } else if url.starts_with("http://") {
            warnings.push(ConfigValidationIssue::new(
                "registry.url",
                "Registry URL is not using https; the API key is sent in clear text",
            ));
        }
        if config.registry.api_key_env.is_empty() {
            errors.push(ConfigValidationIssue::new(
                "registry.apiKeyEnv",
                "apiKeyEnv is required",
            ));
        }
        if config.registry.timeout_seconds == 0 {
            errors.push(ConfigValidationIssue::new(
                "registry.timeoutSeconds",
                "timeoutSeconds must be greater than zero",
            ));
        }

        // 3. Publish options
        let suffix = &config.publish.staging_suffix;
        if suffix.is_empty() || suffix.starts_with('-') {
            errors.push(ConfigValidationIssue::new(
                "publish.stagingSuffix",
                "stagingSuffix must be non-empty and given without the leading '-'",
            ));
        }

        // 4. Build settings
        if let Some(source) = &config.source {
            for (field, value) in [
                ("source.url", &source.url),
                ("source.directory", &source.directory),
                ("source.solution", &source.solution),
                ("source.descriptor", &source.descriptor),
            ] {
                if value.is_empty() {
                    errors.push(ConfigValidationIssue::new(field, "value is required"));
                }
            }
            if config.artifact.is_none() {
                warnings.push(ConfigValidationIssue::new(
                    "artifact",
                    "source is configured without artifact; builds cannot locate the package",
                ));
            }
        }
        if let Some(dependency) = &config.dependency
            && (dependency.url_base.is_empty() || dependency.directory.is_empty())
        {
            errors.push(ConfigValidationIssue::new(
                "dependency",
                "urlBase and directory are required",
            ));
        }

        ConfigValidationResult {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Format validation result as human-readable string
    pub fn format_validation_result(result: &ConfigValidationResult) -> String {
        let mut lines = Vec::new();

        if result.valid {
            lines.push("Configuration validation succeeded".to_string());
        } else {
            lines.push("Configuration has errors".to_string());
        }

        for error in &result.errors {
            lines.push(format!("  error [{}] {}", error.field, error.message));
        }
        for warning in &result.warnings {
            lines.push(format!("  warning [{}] {}", warning.field, warning.message));
        }

        lines.join("\n")
    }
}
