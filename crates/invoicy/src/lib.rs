pub mod config;
pub mod error;
pub mod extraction;
pub mod notify;
pub mod sanitize;
pub mod secrets;
pub mod sinks;
pub mod toolchain;
pub mod worker;

pub use config::{load_config, load_config_from_str, Config};
pub use error::{InvoicyError, Result};
pub use extraction::{
    ExtractionError, ExtractionResult, ExtractionService, ExtractionTask, TaskCatalog, TaskKind,
    TokenUsage,
};
pub use notify::{Notification, Notifier};
pub use toolchain::{InvoiceRecord, ToolchainError, ToolchainRunner};
pub use worker::{Job, JobQueue, Manifest, Submission, WorkItem, WorkerPool};
