//! Outbound notifications: one message per finished work item, plus
//! rejections and best-effort diagnostics.

pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::NotifyError;
use crate::toolchain::InvoiceRecord;

pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Completed,
    Failed,
    Rejected,
    Diagnostic,
}

#[derive(Debug, Clone)]
pub enum Notification {
    /// All tasks succeeded. Sink failures only show up in `saved`.
    Completed(InvoiceRecord),
    Failed {
        id: String,
        file_name: String,
        media_type: String,
        error: String,
    },
    /// Archive member or upload that never became a work item.
    Rejected {
        id: String,
        file_name: String,
        file_extension: String,
        error: String,
    },
    /// A single failed extraction attempt, with the candidate output if any.
    Diagnostic {
        id: String,
        tool_name: String,
        tool_output: Option<Value>,
        tool: Value,
        error: String,
    },
}

impl Notification {
    pub fn id(&self) -> &str {
        match self {
            Notification::Completed(record) => &record.id,
            Notification::Failed { id, .. }
            | Notification::Rejected { id, .. }
            | Notification::Diagnostic { id, .. } => id,
        }
    }

    pub fn status(&self) -> NotificationStatus {
        match self {
            Notification::Completed(_) => NotificationStatus::Completed,
            Notification::Failed { .. } => NotificationStatus::Failed,
            Notification::Rejected { .. } => NotificationStatus::Rejected,
            Notification::Diagnostic { .. } => NotificationStatus::Diagnostic,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Notification::Completed(_))
    }

    /// JSON body posted to the webhook.
    pub fn payload(&self) -> Value {
        let mut payload = match self {
            Notification::Completed(record) => json!({
                "data": record.data,
                "tokens": record.tokens,
                "saved": record.saved,
                "error": record.error,
            }),
            Notification::Failed {
                file_name,
                media_type,
                error,
                ..
            } => json!({
                "file_name": file_name,
                "media_type": media_type,
                "error": error,
            }),
            Notification::Rejected {
                file_name,
                file_extension,
                error,
                ..
            } => json!({
                "file_name": file_name,
                "file_extension": file_extension,
                "error": error,
            }),
            Notification::Diagnostic {
                tool_name,
                tool_output,
                tool,
                error,
                ..
            } => json!({
                "tool_name": tool_name,
                "tool_output": tool_output,
                "tool": tool,
                "error": error,
            }),
        };

        if let Some(fields) = payload.as_object_mut() {
            fields.insert("id".to_string(), json!(self.id()));
            fields.insert("success".to_string(), json!(self.is_success()));
            fields.insert("status".to_string(), json!(self.status()));
        }
        payload
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Used when no webhook URL is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        debug!(
            id = notification.id(),
            status = ?notification.status(),
            "No webhook configured, dropping notification"
        );
        Ok(())
    }
}

/// Sends a notification once and logs the outcome. Never retried.
pub async fn deliver(notifier: &dyn Notifier, notification: &Notification) -> bool {
    match notifier.notify(notification).await {
        Ok(()) => true,
        Err(e) => {
            warn!(
                id = notification.id(),
                status = ?notification.status(),
                "Failed to deliver notification: {}",
                e
            );
            false
        }
    }
}
