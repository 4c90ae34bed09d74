use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::fmt::Write;
use std::time::Duration;
use tracing::debug;

use crate::config::EmailConfig;
use crate::error::SinkError;
use crate::toolchain::InvoiceRecord;

use super::row::{format_taxes, format_withholdings};
use super::EmailSink;

/// Sends mail through a transactional-mail HTTP API that accepts
/// `{from, to, subject, html}` with a bearer key.
pub struct HttpEmailSink {
    client: Client,
    endpoint: String,
    from: String,
    api_key: SecretString,
}

impl HttpEmailSink {
    pub fn new(config: &EmailConfig) -> Result<Self, SinkError> {
        let (Some(endpoint), Some(from)) = (config.endpoint.clone(), config.from.clone()) else {
            return Err(SinkError::NotConfigured("email"));
        };

        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            endpoint,
            from,
            api_key: config.api_key.resolve()?,
        })
    }

    fn request(&self, to: &str, subject: &str, html: &str) -> reqwest::RequestBuilder {
        self.client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({
                "from": self.from,
                "to": [to],
                "subject": subject,
                "html": html,
            }))
    }
}

#[async_trait]
impl EmailSink for HttpEmailSink {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), SinkError> {
        let response = self.request(to, subject, html).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        debug!("Sent invoice summary email");
        Ok(())
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn row(html: &mut String, label: &str, value: &str) {
    let _ = write!(
        html,
        "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
        label,
        escape(value)
    );
}

/// Human-readable summary of a record.
pub fn render_invoice_html(record: &InvoiceRecord) -> String {
    let parties = &record.data.emisor_receptor;
    let items = &record.data.items;
    let mut html = String::new();

    let _ = write!(
        html,
        "<h2>{} {}</h2><table>",
        escape(&parties.voucher.kind),
        escape(&parties.voucher.number)
    );
    row(&mut html, "Fecha de emisión", &parties.voucher.issue_date);
    row(&mut html, "Emisor", &parties.issuer.name);
    row(
        &mut html,
        "CUIT emisor",
        parties.issuer.tax_id.as_deref().unwrap_or("-"),
    );
    row(&mut html, "Receptor", &parties.recipient.name);
    row(&mut html, "Moneda", &parties.voucher.currency);
    row(&mut html, "Subtotal", &format!("{:.2}", items.subtotal));
    row(&mut html, "Total", &format!("{:.2}", items.total));
    html.push_str("</table>");

    if !items.lines.is_empty() {
        html.push_str("<h3>Ítems</h3><ul>");
        for line in &items.lines {
            let _ = write!(
                html,
                "<li>{} &times; {} = {:.2}</li>",
                line.quantity,
                escape(&line.description),
                line.line_total
            );
        }
        html.push_str("</ul>");
    }

    let taxes = format_taxes(&record.data.impuestos.taxes);
    if !taxes.is_empty() {
        let _ = write!(html, "<h3>Impuestos</h3><pre>{}</pre>", escape(&taxes));
    }
    let withholdings = format_withholdings(&record.data.impuestos.withholdings);
    if !withholdings.is_empty() {
        let _ = write!(html, "<h3>Retenciones</h3><pre>{}</pre>", escape(&withholdings));
    }

    html
}
