use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use super::tasks::TaskKind;

/// Token accounting reported by the model for one call, or summed over many.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_creation_input_tokens: u64,
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    /// Reads the counters out of a model `usage` object. Anything that is not
    /// a known non-negative integer counter (`service_tier`, nested objects)
    /// is ignored.
    pub fn from_usage(usage: &Value) -> Self {
        let mut tokens = Self::default();
        let Some(fields) = usage.as_object() else {
            return tokens;
        };

        for (key, value) in fields {
            let Some(count) = value.as_u64() else {
                continue;
            };
            match key.as_str() {
                "input_tokens" => tokens.input_tokens += count,
                "output_tokens" => tokens.output_tokens += count,
                "cache_creation_input_tokens" => tokens.cache_creation_input_tokens += count,
                "cache_read_input_tokens" => tokens.cache_read_input_tokens += count,
                _ => {}
            }
        }

        tokens
    }

    pub fn total(&self) -> u64 {
        self.input_tokens
            + self.output_tokens
            + self.cache_creation_input_tokens
            + self.cache_read_input_tokens
    }
}

impl Add for TokenUsage {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
        self.cache_creation_input_tokens += rhs.cache_creation_input_tokens;
        self.cache_read_input_tokens += rhs.cache_read_input_tokens;
    }
}

impl Sum for TokenUsage {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

// Parties

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartiesOutput {
    #[serde(rename = "comprobante")]
    pub voucher: Voucher,
    #[serde(rename = "emisor")]
    pub issuer: Party,
    #[serde(rename = "receptor")]
    pub recipient: Party,
    #[serde(rename = "otros", default)]
    pub other: OtherDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voucher {
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "subtipo", default, skip_serializing_if = "Option::is_none")]
    pub subkind: Option<String>,
    #[serde(rename = "jurisdiccion_fiscal")]
    pub jurisdiction: String,
    #[serde(rename = "numero")]
    pub number: String,
    #[serde(rename = "fecha_emision")]
    pub issue_date: String,
    #[serde(rename = "moneda")]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Party {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "id_fiscal", default, skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(rename = "direccion", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "condicion_iva", default, skip_serializing_if = "Option::is_none")]
    pub vat_condition: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OtherDetails {
    #[serde(rename = "forma_pago", default)]
    pub payment_method: Option<String>,
    #[serde(rename = "CAE", default)]
    pub cae: Option<String>,
    #[serde(rename = "vencimiento_CAE", default)]
    pub cae_due_date: Option<String>,
}

// Line items

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemsOutput {
    #[serde(rename = "detalles")]
    pub lines: Vec<LineItem>,
    pub subtotal: f64,
    pub total: f64,
    #[serde(rename = "observaciones", default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "descripcion")]
    pub description: String,
    #[serde(rename = "cantidad")]
    pub quantity: f64,
    #[serde(rename = "precio_unitario")]
    pub unit_price: f64,
    #[serde(rename = "precio_total")]
    pub line_total: f64,
}

// Taxes and withholdings

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxesOutput {
    #[serde(rename = "impuestos")]
    pub taxes: Vec<Tax>,
    #[serde(rename = "retenciones")]
    pub withholdings: Vec<Withholding>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(rename = "descripcion", default)]
    pub description: Option<String>,
    #[serde(rename = "base_imponible")]
    pub taxable_base: f64,
    #[serde(rename = "alicuota", default)]
    pub rate: Option<f64>,
    #[serde(rename = "importe")]
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Withholding {
    #[serde(rename = "tipo")]
    pub kind: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "base_imponible")]
    pub taxable_base: f64,
}

/// Schema-valid output of one task, typed by task kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TaskOutput {
    Parties(PartiesOutput),
    LineItems(LineItemsOutput),
    Taxes(TaxesOutput),
}

impl TaskOutput {
    pub fn from_value(kind: TaskKind, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            TaskKind::Parties => Self::Parties(serde_json::from_value(value)?),
            TaskKind::LineItems => Self::LineItems(serde_json::from_value(value)?),
            TaskKind::Taxes => Self::Taxes(serde_json::from_value(value)?),
        })
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Self::Parties(_) => TaskKind::Parties,
            Self::LineItems(_) => TaskKind::LineItems,
            Self::Taxes(_) => TaskKind::Taxes,
        }
    }
}

/// One accepted task result.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    pub kind: TaskKind,
    pub output: TaskOutput,
    pub usage: TokenUsage,
}
