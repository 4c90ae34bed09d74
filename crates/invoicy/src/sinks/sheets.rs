use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::SheetsConfig;
use crate::error::SinkError;

use super::SpreadsheetSink;

/// Appends rows through the Google Sheets `values:append` endpoint.
pub struct SheetsSink {
    client: Client,
    api_url: String,
    spreadsheet_id: String,
    range: String,
    access_token: SecretString,
}

impl SheetsSink {
    pub fn new(config: &SheetsConfig) -> Result<Self, SinkError> {
        let spreadsheet_id = config
            .spreadsheet_id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or(SinkError::NotConfigured("sheets"))?;

        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            spreadsheet_id,
            range: config.range.clone(),
            access_token: config.access_token.resolve()?,
        })
    }

    pub fn append_url(&self) -> String {
        format!(
            "{}/{}/values/{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.api_url, self.spreadsheet_id, self.range
        )
    }

    fn request(&self, row: &[String]) -> reqwest::RequestBuilder {
        self.client
            .post(self.append_url())
            .bearer_auth(self.access_token.expose_secret())
            .json(&json!({ "values": [row] }))
    }
}

#[async_trait]
impl SpreadsheetSink for SheetsSink {
    async fn append_row(&self, row: &[String]) -> Result<(), SinkError> {
        let response = self.request(row).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!(columns = row.len(), "Appended spreadsheet row");
        Ok(())
    }
}
