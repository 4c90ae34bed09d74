//! Where finished records go besides the webhook.

pub mod email;
pub mod row;
pub mod sheets;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::error::SinkError;

pub use email::{render_invoice_html, HttpEmailSink};
pub use row::invoice_row;
pub use sheets::SheetsSink;

#[async_trait]
pub trait SpreadsheetSink: Send + Sync {
    async fn append_row(&self, row: &[String]) -> Result<(), SinkError>;
}

#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), SinkError>;
}

/// Optional sinks attached to the queue.
#[derive(Clone, Default)]
pub struct Sinks {
    pub spreadsheet: Option<Arc<dyn SpreadsheetSink>>,
    pub email: Option<Arc<dyn EmailSink>>,
}

impl Sinks {
    pub fn from_config(config: &Config) -> Result<Self, SinkError> {
        let spreadsheet: Option<Arc<dyn SpreadsheetSink>> = if config.sheets.enabled {
            Some(Arc::new(SheetsSink::new(&config.sheets)?))
        } else {
            None
        };

        let email: Option<Arc<dyn EmailSink>> = if config.email.enabled {
            Some(Arc::new(HttpEmailSink::new(&config.email)?))
        } else {
            None
        };

        Ok(Self { spreadsheet, email })
    }
}

impl std::fmt::Debug for Sinks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sinks")
            .field("spreadsheet", &self.spreadsheet.is_some())
            .field("email", &self.email.is_some())
            .finish()
    }
}
