//! Secret resolution for API keys, tokens and the shared upload secret.
//!
//! Secrets are resolved from multiple sources in priority order:
//!
//! 1. **Direct value** - For quick local testing (e.g., `"value": "sk-test"`)
//! 2. **File reference** - For Docker secrets (e.g., `"file": "/run/secrets/anthropic"`)
//! 3. **Env var reference** - For production (e.g., `"env_var": "ANTHROPIC_API_KEY"`)

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

/// Result type for secret resolution.
pub type Result<T> = std::result::Result<T, SecretError>;

/// Where a secret comes from, as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SecretSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_var: Option<String>,
}

impl SecretSource {
    pub fn env(name: &str) -> Self {
        Self {
            env_var: Some(name.to_string()),
            ..Self::default()
        }
    }

    pub fn value(value: &str) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::default()
        }
    }

    pub fn resolve(&self) -> Result<SecretString> {
        resolve_secret(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env_var.as_deref(),
        )
    }

    /// Like [`SecretSource::resolve`], but an unset environment variable or an
    /// empty source yields `None`.
    pub fn resolve_optional(&self) -> Result<Option<SecretString>> {
        match self.resolve() {
            Ok(secret) => Ok(Some(secret)),
            Err(SecretError::NoSourceProvided) | Err(SecretError::EnvVarNotSet { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_configured(&self) -> bool {
        has_secret_source(
            self.value.as_deref(),
            self.file.as_deref(),
            self.env_var.as_deref(),
        )
    }
}

/// Resolves a secret from multiple sources in priority order:
/// 1. Direct value (if provided and non-empty)
/// 2. File contents (if path provided)
/// 3. Environment variable (if name provided)
///
/// # Examples
///
/// ```ignore
/// use invoicy::secrets::resolve_secret;
///
/// // File path used if no direct value
/// let secret = resolve_secret(
///     None,
///     Some("~/.secrets/anthropic"),
///     Some("ANTHROPIC_API_KEY"),
/// )?;
/// ```
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct {
        if !value.is_empty() {
            return Ok(SecretString::from(value.to_string()));
        }
    }

    if let Some(path) = file_path {
        if !path.is_empty() {
            let expanded = expand_home(path);
            return match fs::read_to_string(&expanded) {
                Ok(content) => Ok(SecretString::from(content.trim().to_string())),
                Err(e) => Err(SecretError::FileReadError {
                    path: expanded,
                    source: e,
                }),
            };
        }
    }

    if let Some(var_name) = env_var {
        if !var_name.is_empty() {
            return match std::env::var(var_name) {
                // env files often leave a trailing newline
                Ok(value) => Ok(SecretString::from(value.trim())),
                Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                    name: var_name.to_string(),
                }),
                Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                    name: var_name.to_string(),
                }),
            };
        }
    }

    Err(SecretError::NoSourceProvided)
}

/// Checks if at least one secret source is configured (non-empty).
pub fn has_secret_source(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> bool {
    direct.is_some_and(|s| !s.is_empty())
        || file_path.is_some_and(|s| !s.is_empty())
        || env_var.is_some_and(|s| !s.is_empty())
}

/// Expands `~` and `~/path` to the user's home directory.
///
/// `~user/path` is not supported.
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            if path == "~" {
                return home.to_string_lossy().into_owned();
            }
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
