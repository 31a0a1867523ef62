//! Secure API key handling with masking
//!
//! The registry API key is read from one environment variable and held as a
//! [`SecretString`] so it never reaches logs or `Debug` output.

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::env;

/// Token manager for the registry API key
///
/// # Examples
///
/// ```
/// use release_publisher::security::SecureTokenManager;
///
/// let manager = SecureTokenManager::new("NUGETKEY");
/// assert_eq!(manager.variable(), "NUGETKEY");
/// assert_eq!(manager.mask_token("abcdef123456"), "abc...456");
/// ```
pub struct SecureTokenManager {
    variable: String,
}

impl SecureTokenManager {
    /// Creates a manager reading the key from `variable`
    pub fn new(variable: &str) -> Self {
        Self {
            variable: variable.to_string(),
        }
    }

    /// Name of the environment variable holding the key
    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Reads the key; `None` when the variable is unset or empty
    pub fn get_token(&self) -> Option<SecretString> {
        let value = env::var(&self.variable).ok()?;
        if value.trim().is_empty() {
            return None;
        }
        Some(SecretString::new(value.into()))
    }

    /// Masks a token for safe logging
    ///
    /// Shows only the first 3 and last 3 characters. Tokens shorter than 10
    /// characters are fully masked as "****".
    pub fn mask_token(&self, token: &str) -> String {
        if token.len() < 10 || !token.is_ascii() {
            return "****".to_string();
        }

        let prefix = &token[..3];
        let suffix = &token[token.len() - 3..];
        format!("{}...{}", prefix, suffix)
    }

    /// Masks every occurrence of `token` in a string
    pub fn mask_tokens_in_string(&self, text: &str, token: &SecretString) -> String {
        let token_str = token.expose_secret();
        if token_str.is_empty() {
            return text.to_string();
        }

        match Regex::new(&regex::escape(token_str)) {
            Ok(regex) => regex
                .replace_all(text, self.mask_token(token_str).as_str())
                .to_string(),
            Err(_) => text.to_string(),
        }
    }
}
