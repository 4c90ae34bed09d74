//! The job queue: FIFO hand-off to worker loops, a global limit on items in
//! extraction, idempotence by job id and exactly one webhook per item.

use moka::sync::Cache;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{Config, QueueConfig};
use crate::error::{InvoicyError, JobError, WorkerError};
use crate::extraction::{AnthropicApi, ExtractorSettings, ModelExtractor, TaskCatalog};
use crate::notify::{self, Notification, Notifier, WebhookNotifier};
use crate::sinks::{invoice_row, render_invoice_html, Sinks};
use crate::toolchain::{Extraction, InvoiceRecord, ToolchainError, ToolchainRunner};

use super::active::{ActiveEntry, ActiveRegistry, ItemPhase};
use super::archive::RejectedMember;
use super::intake::{Manifest, Submission};
use super::job::{ItemInfo, Job, JobMetadata, WorkItem};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub max_concurrent_items: usize,
    pub processed_capacity: u64,
    pub processed_ttl: Duration,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for QueueSettings {
    fn from(config: &QueueConfig) -> Self {
        Self {
            max_concurrent_items: config.max_concurrent_items.max(1),
            processed_capacity: config.processed_capacity,
            processed_ttl: config.processed_ttl(),
        }
    }
}

pub struct JobQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    receiver: tokio::sync::Mutex<mpsc::UnboundedReceiver<Job>>,
    limiter: Semaphore,
    max_concurrent_items: usize,
    processed: Cache<String, ()>,
    active: ActiveRegistry,
    runner: ToolchainRunner,
    notifier: Arc<dyn Notifier>,
    sinks: Sinks,
}

impl JobQueue {
    pub fn new(
        runner: ToolchainRunner,
        notifier: Arc<dyn Notifier>,
        sinks: Sinks,
        settings: QueueSettings,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(sender)),
            receiver: tokio::sync::Mutex::new(receiver),
            limiter: Semaphore::new(settings.max_concurrent_items),
            max_concurrent_items: settings.max_concurrent_items,
            processed: Cache::builder()
                .max_capacity(settings.processed_capacity)
                .time_to_live(settings.processed_ttl)
                .build(),
            active: ActiveRegistry::default(),
            runner,
            notifier,
            sinks,
        }
    }

    /// Wires the production model client, webhook and sinks from config.
    pub fn from_config(config: &Config) -> Result<Self, InvoicyError> {
        let catalog = Arc::new(TaskCatalog::standard()?);
        let notifier = WebhookNotifier::from_config(&config.webhook)?;
        let api = AnthropicApi::new(&config.model)?;
        let extractor = ModelExtractor::new(
            api,
            ExtractorSettings::from(&config.model),
            Arc::clone(&catalog),
            Arc::clone(&notifier),
        )?;
        let runner = ToolchainRunner::new(Arc::new(extractor), catalog, config.queue.task_ordering);

        Ok(Self::new(
            runner,
            notifier,
            Sinks::from_config(config)?,
            QueueSettings::from(&config.queue),
        ))
    }

    /// Enqueues a job and returns its id without waiting for processing.
    pub fn submit(&self, job: Job) -> Result<String, WorkerError> {
        let id = job.id.clone();
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(WorkerError::ChannelClosed)?;
        sender.send(job).map_err(|_| WorkerError::ChannelClosed)?;
        debug!(job_id = %id, "Job queued");
        Ok(id)
    }

    /// Enqueues the submission's job and hands back its manifest. Rejected
    /// archive members are reported when the job is processed.
    pub async fn accept(&self, submission: Submission) -> Result<Manifest, WorkerError> {
        let Submission { job, manifest, .. } = submission;
        self.submit(job)?;
        Ok(manifest)
    }

    /// Stops accepting jobs. Workers drain what is already queued, then exit.
    pub fn close(&self) {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    pub fn active(&self) -> BTreeMap<String, ActiveEntry> {
        self.active.snapshot()
    }

    /// Items currently holding an extraction permit.
    pub fn in_flight(&self) -> usize {
        self.max_concurrent_items - self.limiter.available_permits()
    }

    pub fn is_processed(&self, job_id: &str) -> bool {
        self.processed.contains_key(job_id)
    }

    pub async fn worker_loop(&self, worker_id: usize) {
        debug!(worker_id, "Worker loop started");
        while let Some(job) = self.next_job().await {
            debug!(worker_id, job_id = %job.id, "Worker picked up job");
            self.process_job(job).await;
        }
        debug!(worker_id, "Queue closed, worker loop exiting");
    }

    async fn next_job(&self) -> Option<Job> {
        self.receiver.lock().await.recv().await
    }

    /// Runs every item of `job` in order, unless its id was already seen.
    pub async fn process_job(&self, mut job: Job) {
        if !self.mark_processed(&job.id) {
            info!(job_id = %job.id, "Job already processed, skipping");
            return;
        }

        let items = std::mem::take(&mut job.items);
        let rejected = std::mem::take(&mut job.rejected);
        let span = info_span!("job", job_id = %job.id, items = items.len());
        async {
            self.report_rejected(rejected).await;
            let _job_entry = self.active.track_job(&job.id, items.len());
            for item in items {
                // the outcome has already been delivered by webhook
                let _ = self.handle_item(&job.id, item, &job.metadata, true).await;
            }
        }
        .instrument(span)
        .await;

        self.finish_job(job);
    }

    /// Processes a job inline and returns its records. Honours the
    /// concurrency limit and sinks, sends no completion webhook and does not
    /// touch the processed set.
    pub async fn process_now(&self, mut job: Job) -> Vec<Result<InvoiceRecord, ToolchainError>> {
        let items = std::mem::take(&mut job.items);
        let mut results = Vec::with_capacity(items.len());
        {
            let _job_entry = self.active.track_job(&job.id, items.len());
            for item in items {
                results.push(self.handle_item(&job.id, item, &job.metadata, false).await);
            }
        }
        self.finish_job(job);
        results
    }

    async fn report_rejected(&self, rejected: Vec<RejectedMember>) {
        for member in rejected {
            let notification = Notification::Rejected {
                id: member.process_id,
                file_name: member.file_name,
                file_extension: member.file_extension,
                error: member.reason,
            };
            notify::deliver(self.notifier.as_ref(), &notification).await;
        }
    }

    /// Atomic check-and-insert. `true` when the id was not seen before.
    fn mark_processed(&self, job_id: &str) -> bool {
        self.processed
            .entry(job_id.to_string())
            .or_insert(())
            .is_fresh()
    }

    async fn handle_item(
        &self,
        job_id: &str,
        item: WorkItem,
        metadata: &JobMetadata,
        send_webhook: bool,
    ) -> Result<InvoiceRecord, ToolchainError> {
        let info = item.info();
        let entry = self.active.track_item(job_id, &info);
        let span = info_span!(
            "work_item",
            process_id = %info.process_id,
            file_name = %info.file_name
        );

        let result: Result<InvoiceRecord, ToolchainError> = async {
            entry.set_phase(ItemPhase::Extracting);
            let extraction = self.extract(&item).await?;
            entry.set_phase(ItemPhase::Persisting);
            Ok(self.persist(&info, extraction, metadata).await)
        }
        .instrument(span.clone())
        .await;

        if let Err(e) = &result {
            warn!(parent: &span, "Work item failed: {}", e);
        }

        if send_webhook {
            entry.set_phase(ItemPhase::Notifying);
            let notification = match &result {
                Ok(record) => Notification::Completed(record.clone()),
                Err(e) => Notification::Failed {
                    id: info.process_id.clone(),
                    file_name: info.file_name.clone(),
                    media_type: info.media_type.clone(),
                    error: e.to_string(),
                },
            };
            notify::deliver(self.notifier.as_ref(), &notification)
                .instrument(span.clone())
                .await;
        }

        if let Err(e) = item.close() {
            warn!(parent: &span, "Failed to delete work item file: {}", e);
        }
        result
    }

    async fn extract(&self, item: &WorkItem) -> Result<Extraction, ToolchainError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| ToolchainError::LimiterClosed)?;
        self.runner.run(item).await
    }

    async fn persist(
        &self,
        info: &ItemInfo,
        extraction: Extraction,
        metadata: &JobMetadata,
    ) -> InvoiceRecord {
        let saved = match &self.sinks.spreadsheet {
            Some(sheet) => match sheet.append_row(&invoice_row(&extraction.data)).await {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to append spreadsheet row: {}", e);
                    false
                }
            },
            None => false,
        };

        let record = InvoiceRecord::new(info.process_id.clone(), extraction, saved);

        if let (Some(email), Some(to)) = (&self.sinks.email, metadata.reply_to.as_deref()) {
            let html = render_invoice_html(&record);
            if let Err(e) = email.send(to, &metadata.reply_subject(), &html).await {
                warn!("Failed to send invoice email: {}", e);
            }
        }

        record
    }

    /// A failed cleanup abandons the job; it is never re-enqueued.
    fn finish_job(&self, job: Job) {
        let Some(temp_dir) = job.temp_dir else {
            return;
        };
        let path = temp_dir.path().to_path_buf();
        if let Err(source) = temp_dir.close() {
            let err = JobError::Cleanup { path, source };
            error!(job_id = %job.id, "{}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TaskOrdering;
    use crate::extraction::{
        Document, ExtractionError, ExtractionResult, ExtractionService, ExtractionTask, TaskKind,
        TaskOutput, TokenUsage,
    };
    use crate::notify::NoopNotifier;
    use async_trait::async_trait;
    use serde_json::json;
    use tempfile::TempDir;

    struct StaticService;

    #[async_trait]
    impl ExtractionService for StaticService {
        async fn extract(
            &self,
            _process_id: &str,
            _document: &Document,
            task: &ExtractionTask,
        ) -> Result<ExtractionResult, ExtractionError> {
            let value = match task.kind {
                TaskKind::Parties => json!({
                    "comprobante": {
                        "tipo": "Factura",
                        "jurisdiccion_fiscal": "Argentina",
                        "numero": "1",
                        "fecha_emision": "2024-01-01",
                        "moneda": "ARS"
                    },
                    "emisor": { "nombre": "E", "id_fiscal": "1" },
                    "receptor": { "nombre": "R" }
                }),
                TaskKind::LineItems => json!({ "detalles": [], "subtotal": 1.0, "total": 1.0 }),
                TaskKind::Taxes => json!({ "impuestos": [], "retenciones": [] }),
            };
            Ok(ExtractionResult {
                kind: task.kind,
                output: TaskOutput::from_value(task.kind, value).unwrap(),
                usage: TokenUsage::default(),
            })
        }
    }

    fn queue() -> JobQueue {
        let runner = ToolchainRunner::new(
            Arc::new(StaticService),
            Arc::new(TaskCatalog::standard().unwrap()),
            TaskOrdering::FirstThenParallel,
        );
        JobQueue::new(
            runner,
            Arc::new(NoopNotifier),
            Sinks::default(),
            QueueSettings::default(),
        )
    }

    fn job(id: &str) -> (Job, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("f.png");
        std::fs::write(&path, b"png").unwrap();
        let dir_path = dir.path().to_path_buf();
        let job = Job::new(id, vec![WorkItem::new(id, path, "image/png")]).with_temp_dir(dir);
        (job, dir_path)
    }

    #[test]
    fn test_mark_processed_is_check_and_insert() {
        let queue = queue();
        assert!(queue.mark_processed("a"));
        assert!(!queue.mark_processed("a"));
        assert!(queue.is_processed("a"));
        assert!(!queue.is_processed("b"));
    }

    #[test]
    fn test_submit_after_close() {
        let queue = queue();
        queue.close();
        assert!(queue.is_closed());
        let (job, _) = job("late");
        assert!(matches!(queue.submit(job), Err(WorkerError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_process_now_returns_records_and_cleans_up() {
        let queue = queue();
        let (job, dir) = job("inv-1");

        let results = queue.process_now(job).await;

        assert_eq!(results.len(), 1);
        let record = results[0].as_ref().unwrap();
        assert_eq!(record.id, "inv-1");
        assert!(!record.saved);
        assert!(!dir.exists());
        assert!(queue.active().is_empty());
        assert_eq!(queue.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_worker_loop_exits_when_closed() {
        let queue = Arc::new(queue());
        let (job, dir) = job("inv-2");
        queue.submit(job).unwrap();
        queue.close();

        queue.worker_loop(0).await;

        assert!(queue.is_processed("inv-2"));
        assert!(!dir.exists());
    }
}
