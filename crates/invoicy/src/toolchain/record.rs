use serde::Serialize;

use crate::extraction::{
    ExtractionResult, LineItemsOutput, PartiesOutput, TaskKind, TaskOutput, TaxesOutput,
    TokenUsage,
};

use super::error::ToolchainError;

/// Aggregated task outputs, keyed by category on the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceData {
    pub emisor_receptor: PartiesOutput,
    pub items: LineItemsOutput,
    pub impuestos: TaxesOutput,
}

/// Outcome of running every task on one item.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub data: InvoiceData,
    pub tokens: TokenUsage,
}

impl Extraction {
    pub fn from_results(results: Vec<ExtractionResult>) -> Result<Self, ToolchainError> {
        let mut parties = None;
        let mut items = None;
        let mut taxes = None;
        let mut tokens = TokenUsage::default();

        for result in results {
            tokens += result.usage;
            match result.output {
                TaskOutput::Parties(output) => parties = Some(output),
                TaskOutput::LineItems(output) => items = Some(output),
                TaskOutput::Taxes(output) => taxes = Some(output),
            }
        }

        Ok(Self {
            data: InvoiceData {
                emisor_receptor: parties.ok_or(ToolchainError::MissingOutput(TaskKind::Parties))?,
                items: items.ok_or(ToolchainError::MissingOutput(TaskKind::LineItems))?,
                impuestos: taxes.ok_or(ToolchainError::MissingOutput(TaskKind::Taxes))?,
            },
            tokens,
        })
    }
}

/// Final per-item record, delivered once by webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceRecord {
    pub id: String,
    pub data: InvoiceData,
    pub tokens: TokenUsage,
    pub saved: bool,
    pub error: String,
}

impl InvoiceRecord {
    pub fn new(id: impl Into<String>, extraction: Extraction, saved: bool) -> Self {
        Self {
            id: id.into(),
            data: extraction.data,
            tokens: extraction.tokens,
            saved,
            error: String::new(),
        }
    }
}
