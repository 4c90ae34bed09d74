pub mod error;
pub mod record;
pub mod runner;

pub use error::ToolchainError;
pub use record::{Extraction, InvoiceData, InvoiceRecord};
pub use runner::ToolchainRunner;
