use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.queue.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "queue.worker_count must be at least 1".to_string(),
        });
    }

    if config.queue.max_concurrent_items == 0 {
        return Err(ConfigError::Validation {
            message: "queue.max_concurrent_items must be at least 1".to_string(),
        });
    }

    if config.model.max_attempts == 0 {
        return Err(ConfigError::Validation {
            message: "model.max_attempts must be at least 1".to_string(),
        });
    }

    if config.model.fallback_after > config.model.max_attempts {
        return Err(ConfigError::Validation {
            message: format!(
                "model.fallback_after ({}) exceeds model.max_attempts ({})",
                config.model.fallback_after, config.model.max_attempts
            ),
        });
    }

    if let Some(url) = &config.webhook.url {
        if !is_http_url(url) {
            return Err(ConfigError::Validation {
                message: format!("webhook.url must be an http(s) URL, got '{}'", url),
            });
        }
    }

    if config.sheets.enabled && config.sheets.spreadsheet_id.as_deref().unwrap_or("").is_empty() {
        return Err(ConfigError::Validation {
            message: "sheets.spreadsheet_id is required when sheets are enabled".to_string(),
        });
    }

    if config.email.enabled {
        match (&config.email.endpoint, &config.email.from) {
            (Some(endpoint), Some(_)) if is_http_url(endpoint) => {}
            _ => {
                return Err(ConfigError::Validation {
                    message: "email.endpoint (http/https) and email.from are required when email is enabled"
                        .to_string(),
                })
            }
        }
    }

    Ok(())
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
