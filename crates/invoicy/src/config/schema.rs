use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::secrets::SecretSource;

pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
pub const DEFAULT_SECRET_ENV: &str = "INVOICY_SECRET";
pub const DEFAULT_SHEETS_TOKEN_ENV: &str = "GOOGLE_SHEETS_TOKEN";
pub const DEFAULT_EMAIL_KEY_ENV: &str = "INVOICY_EMAIL_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub sheets: SheetsConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            model: ModelConfig::default(),
            queue: QueueConfig::default(),
            webhook: WebhookConfig::default(),
            sheets: SheetsConfig::default(),
            email: EmailConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_upload_bytes() -> usize {
    50 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared secret expected in the `secret_key` field of submissions.
    #[serde(default = "default_auth_secret")]
    pub secret: SecretSource,
}

fn default_auth_secret() -> SecretSource {
    SecretSource::env(DEFAULT_SECRET_ENV)
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: default_auth_secret(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Used for attempts whose index is at least `fallback_after`.
    #[serde(default = "default_fallback_model")]
    pub fallback_model: Option<String>,
    #[serde(default = "default_fallback_after")]
    pub fallback_after: u32,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_api_key")]
    pub api_key: SecretSource,
    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_fallback_model() -> Option<String> {
    Some("claude-3-7-sonnet-20250219".to_string())
}

fn default_fallback_after() -> u32 {
    3
}

fn default_max_attempts() -> u32 {
    6
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_request_timeout() -> u64 {
    300
}

fn default_api_key() -> SecretSource {
    SecretSource::env(DEFAULT_API_KEY_ENV)
}

impl ModelConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_version: default_api_version(),
            model: default_model(),
            fallback_model: default_fallback_model(),
            fallback_after: default_fallback_after(),
            max_attempts: default_max_attempts(),
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout(),
            api_key: default_api_key(),
            transport: TransportConfig::default(),
        }
    }
}

/// HTTP-level retry budget for a single model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_fallback_base")]
    pub fallback_base_secs: u64,
}

fn default_max_retries() -> u32 {
    5
}

fn default_fallback_base() -> u64 {
    15
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            fallback_base_secs: default_fallback_base(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrdering {
    /// Run the first task alone, then the rest concurrently.
    #[default]
    FirstThenParallel,
    AllParallel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,
    #[serde(default = "default_processed_capacity")]
    pub processed_capacity: u64,
    #[serde(default = "default_processed_ttl")]
    pub processed_ttl_secs: u64,
    #[serde(default)]
    pub task_ordering: TaskOrdering,
    /// Parent directory for per-job temp dirs. System temp dir when unset.
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default = "default_true")]
    pub sync_single_documents: bool,
}

fn default_worker_count() -> usize {
    5
}

fn default_max_concurrent_items() -> usize {
    3
}

fn default_processed_capacity() -> u64 {
    10_000
}

fn default_processed_ttl() -> u64 {
    24 * 60 * 60
}

fn default_true() -> bool {
    true
}

impl QueueConfig {
    pub fn processed_ttl(&self) -> Duration {
        Duration::from_secs(self.processed_ttl_secs)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_concurrent_items: default_max_concurrent_items(),
            processed_capacity: default_processed_capacity(),
            processed_ttl_secs: default_processed_ttl(),
            task_ordering: TaskOrdering::default(),
            work_dir: None,
            sync_single_documents: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_webhook_timeout")]
    pub timeout_secs: u64,
}

fn default_webhook_timeout() -> u64 {
    10
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            timeout_secs: default_webhook_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    #[serde(default = "default_range")]
    pub range: String,
    #[serde(default = "default_sheets_api_url")]
    pub api_url: String,
    #[serde(default = "default_sheets_token")]
    pub access_token: SecretSource,
}

fn default_range() -> String {
    "A2:M2".to_string()
}

fn default_sheets_api_url() -> String {
    "https://sheets.googleapis.com/v4/spreadsheets".to_string()
}

fn default_sheets_token() -> SecretSource {
    SecretSource::env(DEFAULT_SHEETS_TOKEN_ENV)
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spreadsheet_id: None,
            range: default_range(),
            api_url: default_sheets_api_url(),
            access_token: default_sheets_token(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default = "default_email_key")]
    pub api_key: SecretSource,
}

fn default_email_key() -> SecretSource {
    SecretSource::env(DEFAULT_EMAIL_KEY_ENV)
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            from: None,
            api_key: default_email_key(),
        }
    }
}
