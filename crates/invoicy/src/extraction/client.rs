//! Per-task extraction: request, validate, convert, retry with fallback model.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ModelConfig;
use crate::notify::{self, Notification, Notifier};

use super::api::{ContentBlock, Message, MessageRequest, ModelApi, ToolChoice};
use super::document::Document;
use super::error::ExtractionError;
use super::tasks::{ExtractionTask, TaskCatalog};
use super::types::{ExtractionResult, TaskOutput, TokenUsage};
use super::validator::SchemaValidator;

/// Runs one extraction task against one document.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn extract(
        &self,
        process_id: &str,
        document: &Document,
        task: &ExtractionTask,
    ) -> Result<ExtractionResult, ExtractionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractorSettings {
    pub model: String,
    pub fallback_model: Option<String>,
    pub fallback_after: u32,
    pub max_attempts: u32,
    pub max_tokens: u32,
}

impl ExtractorSettings {
    /// Model for the zero-based `attempt`.
    pub fn model_for_attempt(&self, attempt: u32) -> &str {
        match &self.fallback_model {
            Some(fallback) if attempt >= self.fallback_after => fallback,
            _ => &self.model,
        }
    }
}

impl From<&ModelConfig> for ExtractorSettings {
    fn from(config: &ModelConfig) -> Self {
        Self {
            model: config.model.clone(),
            fallback_model: config.fallback_model.clone(),
            fallback_after: config.fallback_after,
            max_attempts: config.max_attempts,
            max_tokens: config.max_tokens,
        }
    }
}

struct AttemptFailure {
    error: ExtractionError,
    candidate: Option<Value>,
}

impl From<ExtractionError> for AttemptFailure {
    fn from(error: ExtractionError) -> Self {
        Self {
            error,
            candidate: None,
        }
    }
}

pub struct ModelExtractor<A> {
    api: A,
    settings: ExtractorSettings,
    catalog: Arc<TaskCatalog>,
    validator: SchemaValidator,
    diagnostics: Arc<dyn Notifier>,
}

impl<A: ModelApi> ModelExtractor<A> {
    pub fn new(
        api: A,
        settings: ExtractorSettings,
        catalog: Arc<TaskCatalog>,
        diagnostics: Arc<dyn Notifier>,
    ) -> Result<Self, ExtractionError> {
        let validator = SchemaValidator::new(&catalog)?;
        Ok(Self {
            api,
            settings,
            catalog,
            validator,
            diagnostics,
        })
    }

    pub fn settings(&self) -> &ExtractorSettings {
        &self.settings
    }

    pub fn build_request(
        &self,
        model: &str,
        document: &Document,
        task: &ExtractionTask,
    ) -> MessageRequest {
        MessageRequest {
            model: model.to_string(),
            max_tokens: self.settings.max_tokens,
            tools: self.catalog.tool_definitions(),
            messages: vec![Message::user(vec![
                ContentBlock::from_document(document),
                ContentBlock::text(&task.prompt),
            ])],
            tool_choice: ToolChoice::forced(task.name()),
        }
    }

    async fn attempt(
        &self,
        model: &str,
        document: &Document,
        task: &ExtractionTask,
    ) -> Result<ExtractionResult, AttemptFailure> {
        let request = self.build_request(model, document, task);
        let response = self.api.create_message(&request).await?;

        let candidate = response.tool_input(task.name()).cloned().ok_or_else(|| {
            ExtractionError::Fatal(format!(
                "malformed response: no '{}' tool call",
                task.name()
            ))
        })?;

        if let Err(message) = self.validator.validate(task.kind, &candidate) {
            return Err(AttemptFailure {
                error: ExtractionError::Validation {
                    task: task.kind,
                    message,
                },
                candidate: Some(candidate),
            });
        }

        let output = match TaskOutput::from_value(task.kind, candidate.clone()) {
            Ok(output) => output,
            Err(e) => {
                return Err(AttemptFailure {
                    error: ExtractionError::Validation {
                        task: task.kind,
                        message: e.to_string(),
                    },
                    candidate: Some(candidate),
                })
            }
        };

        Ok(ExtractionResult {
            kind: task.kind,
            output,
            usage: TokenUsage::from_usage(&response.usage),
        })
    }

    async fn report(&self, process_id: &str, task: &ExtractionTask, failure: &AttemptFailure) {
        let tool = serde_json::to_value(task.tool_definition()).unwrap_or(Value::Null);
        let notification = Notification::Diagnostic {
            id: process_id.to_string(),
            tool_name: task.name().to_string(),
            tool_output: failure.candidate.clone(),
            tool,
            error: failure.error.to_string(),
        };
        notify::deliver(self.diagnostics.as_ref(), &notification).await;
    }
}

#[async_trait]
impl<A: ModelApi> ExtractionService for ModelExtractor<A> {
    async fn extract(
        &self,
        process_id: &str,
        document: &Document,
        task: &ExtractionTask,
    ) -> Result<ExtractionResult, ExtractionError> {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let model = self.settings.model_for_attempt(attempt);
            debug!(task = %task.kind, attempt = attempt + 1, model, "Extraction attempt");

            match self.attempt(model, document, task).await {
                Ok(result) => {
                    info!(
                        task = %task.kind,
                        attempt = attempt + 1,
                        input_tokens = result.usage.input_tokens,
                        output_tokens = result.usage.output_tokens,
                        "Extraction accepted"
                    );
                    return Ok(result);
                }
                Err(failure) => {
                    warn!(
                        task = %task.kind,
                        attempt = attempt + 1,
                        transient = failure.error.is_transient(),
                        "Extraction attempt failed: {}",
                        failure.error
                    );
                    self.report(process_id, task, &failure).await;
                    last_error = Some(failure.error);
                }
            }
        }

        Err(ExtractionError::Exhausted {
            task: task.kind,
            attempts: max_attempts,
            source: Box::new(
                last_error.unwrap_or_else(|| ExtractionError::Fatal("no attempts made".to_string())),
            ),
        })
    }
}
