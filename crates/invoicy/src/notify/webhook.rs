use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::WebhookConfig;
use crate::error::NotifyError;
use crate::sanitize::redact_url;

use super::{NoopNotifier, Notification, Notifier};

/// Posts each notification's payload as JSON to one URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// A webhook notifier when a URL is configured, otherwise a no-op.
    pub fn from_config(config: &WebhookConfig) -> Result<Arc<dyn Notifier>, NotifyError> {
        match config.url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => Ok(Arc::new(Self::new(
                url,
                Duration::from_secs(config.timeout_secs),
            )?)),
            None => Ok(Arc::new(NoopNotifier)),
        }
    }

    fn request(&self, notification: &Notification) -> reqwest::RequestBuilder {
        self.client.post(&self.url).json(&notification.payload())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let response = self.request(notification).send().await?;
        let status = response.status();

        debug!(
            id = notification.id(),
            url = %redact_url(&self.url),
            status = status.as_u16(),
            "Webhook delivered"
        );

        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
