pub mod api;
pub mod client;
pub mod document;
pub mod error;
pub mod retry;
pub mod tasks;
pub mod types;
pub mod validator;

pub use api::{AnthropicApi, MessageRequest, MessageResponse, ModelApi, ToolDefinition};
pub use client::{ExtractionService, ExtractorSettings, ModelExtractor};
pub use document::{Document, DocumentKind};
pub use error::ExtractionError;
pub use retry::{send_with_retry, RawResponse, RetryPolicy};
pub use tasks::{ExtractionTask, TaskCatalog, TaskKind};
pub use types::{
    ExtractionResult, LineItem, LineItemsOutput, OtherDetails, PartiesOutput, Party, Tax,
    TaskOutput, TaxesOutput, TokenUsage, Voucher, Withholding,
};
pub use validator::SchemaValidator;
