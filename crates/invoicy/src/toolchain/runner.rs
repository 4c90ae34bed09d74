use futures_util::future::try_join_all;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::config::TaskOrdering;
use crate::extraction::{Document, ExtractionResult, ExtractionService, ExtractionTask, TaskCatalog};
use crate::sanitize::redact_path;
use crate::worker::WorkItem;

use super::error::ToolchainError;
use super::record::Extraction;

/// Runs the task catalog against one work item.
pub struct ToolchainRunner {
    service: Arc<dyn ExtractionService>,
    catalog: Arc<TaskCatalog>,
    ordering: TaskOrdering,
}

impl ToolchainRunner {
    pub fn new(
        service: Arc<dyn ExtractionService>,
        catalog: Arc<TaskCatalog>,
        ordering: TaskOrdering,
    ) -> Self {
        Self {
            service,
            catalog,
            ordering,
        }
    }

    pub fn ordering(&self) -> TaskOrdering {
        self.ordering
    }

    /// Any task failure aborts the item; the other in-flight tasks are dropped.
    pub async fn run(&self, item: &WorkItem) -> Result<Extraction, ToolchainError> {
        let document = Document::load(item.path(), &item.media_type)
            .await
            .map_err(ToolchainError::Document)?;

        let results = match self.ordering {
            TaskOrdering::FirstThenParallel => {
                let first = self.catalog.first().ok_or(ToolchainError::EmptyCatalog)?;
                let first_result = self.run_task(&item.process_id, &document, first).await?;
                let rest = try_join_all(
                    self.catalog
                        .iter()
                        .skip(1)
                        .map(|task| self.run_task(&item.process_id, &document, task)),
                )
                .await?;
                std::iter::once(first_result).chain(rest).collect()
            }
            TaskOrdering::AllParallel => {
                try_join_all(
                    self.catalog
                        .iter()
                        .map(|task| self.run_task(&item.process_id, &document, task)),
                )
                .await?
            }
        };

        let extraction = Extraction::from_results(results)?;
        info!(
            process_id = %item.process_id,
            file = %redact_path(item.path()),
            total_tokens = extraction.tokens.total(),
            "Toolchain finished"
        );
        Ok(extraction)
    }

    async fn run_task(
        &self,
        process_id: &str,
        document: &Document,
        task: &ExtractionTask,
    ) -> Result<ExtractionResult, ToolchainError> {
        let span = info_span!("extraction_task", task = %task.kind);
        self.service
            .extract(process_id, document, task)
            .instrument(span)
            .await
            .map_err(|source| ToolchainError::Task {
                task: task.kind,
                source,
            })
    }
}
