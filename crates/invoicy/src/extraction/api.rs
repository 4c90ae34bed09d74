//! Wire format of the model's messages API and the HTTP client that speaks it.

use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ModelConfig;

use super::document::{Document, DocumentKind};
use super::error::ExtractionError;
use super::retry::{parse_retry_after, send_with_retry, RawResponse, RetryPolicy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRequest {
    pub model: String,
    pub max_tokens: u32,
    pub tools: Vec<ToolDefinition>,
    pub messages: Vec<Message>,
    pub tool_choice: ToolChoice,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

impl Message {
    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Image {
        source: Base64Source,
        cache_control: CacheControl,
    },
    Document {
        source: Base64Source,
        cache_control: CacheControl,
    },
    Text {
        text: String,
    },
}

impl ContentBlock {
    pub fn text(text: &str) -> Self {
        Self::Text {
            text: text.to_string(),
        }
    }

    /// Images go out as `image` blocks, PDFs as native `document` blocks.
    pub fn from_document(document: &Document) -> Self {
        let source = Base64Source {
            kind: "base64".to_string(),
            media_type: document.media_type.clone(),
            data: document.data.clone(),
        };
        match document.kind {
            DocumentKind::Image => Self::Image {
                source,
                cache_control: CacheControl::ephemeral(),
            },
            DocumentKind::Pdf => Self::Document {
                source,
                cache_control: CacheControl::ephemeral(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Base64Source {
    #[serde(rename = "type")]
    pub kind: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub kind: String,
}

impl CacheControl {
    pub fn ephemeral() -> Self {
        Self {
            kind: "ephemeral".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolChoice {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub disable_parallel_tool_use: bool,
}

impl ToolChoice {
    /// Forces exactly one call of the named tool.
    pub fn forced(name: &str) -> Self {
        Self {
            kind: "tool".to_string(),
            name: name.to_string(),
            disable_parallel_tool_use: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub content: Vec<ResponseBlock>,
    #[serde(default)]
    pub usage: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseBlock {
    ToolUse {
        name: String,
        input: Value,
    },
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

impl MessageResponse {
    /// Input of the first call to `tool_name`, if the model made one.
    pub fn tool_input(&self, tool_name: &str) -> Option<&Value> {
        self.content.iter().find_map(|block| match block {
            ResponseBlock::ToolUse { name, input } if name == tool_name => Some(input),
            _ => None,
        })
    }
}

/// One raw call to the model. Transport retries happen below this seam.
#[async_trait]
pub trait ModelApi: Send + Sync {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ExtractionError>;
}

#[async_trait]
impl<T: ModelApi + ?Sized> ModelApi for std::sync::Arc<T> {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ExtractionError> {
        (**self).create_message(request).await
    }
}

pub struct AnthropicApi {
    client: Client,
    url: String,
    version: String,
    api_key: SecretString,
    retry: RetryPolicy,
}

impl AnthropicApi {
    pub fn new(config: &ModelConfig) -> Result<Self, ExtractionError> {
        let api_key = config
            .api_key
            .resolve()
            .map_err(|e| ExtractionError::MissingCredential(e.to_string()))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ExtractionError::Fatal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.api_url.clone(),
            version: config.api_version.clone(),
            api_key,
            retry: RetryPolicy::from(&config.transport),
        })
    }

    async fn send_once(&self, request: &MessageRequest) -> Result<RawResponse, ExtractionError> {
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", &self.version)
            .json(request)
            .send()
            .await
            .map_err(|e| ExtractionError::Fatal(format!("Model API request failed: {}", e)))?;

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
        );
        let body = response
            .text()
            .await
            .map_err(|e| ExtractionError::Fatal(format!("Failed to read model response: {}", e)))?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }
}

#[async_trait]
impl ModelApi for AnthropicApi {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ExtractionError> {
        debug!(model = %request.model, tool = %request.tool_choice.name, "Calling model API");

        let body = send_with_retry(&self.retry, || self.send_once(request)).await?;

        serde_json::from_str(&body)
            .map_err(|e| ExtractionError::Fatal(format!("malformed response: {}", e)))
    }
}
