//! Shared state for the HTTP handlers.

use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use invoicy::{Config, JobQueue};

use crate::error::ServerError;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<JobQueue>,
    pub http: reqwest::Client,
    pub work_dir: Option<PathBuf>,
    pub sync_single_documents: bool,
    pub max_upload_bytes: usize,
    secret: Arc<SecretString>,
}

impl AppState {
    pub fn new(
        queue: Arc<JobQueue>,
        secret: SecretString,
        config: &Config,
    ) -> Result<Self, ServerError> {
        let http = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;

        Ok(Self {
            queue,
            http,
            work_dir: config.queue.work_dir.as_ref().map(PathBuf::from),
            sync_single_documents: config.queue.sync_single_documents,
            max_upload_bytes: config.server.max_upload_bytes,
            secret: Arc::new(secret),
        })
    }

    /// Constant-time comparison against the shared secret.
    pub fn is_authorized(&self, provided: &str) -> bool {
        let expected = self.secret.expose_secret().as_bytes();
        let provided = provided.as_bytes();
        if expected.len() != provided.len() {
            return false;
        }
        expected
            .iter()
            .zip(provided)
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}
