//! Shared fakes and fixtures for the invoicy integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use invoicy::config::TaskOrdering;
use invoicy::error::{NotifyError, SinkError};
use invoicy::extraction::{
    send_with_retry, Document, ExtractionError, ExtractionResult, ExtractionService,
    ExtractionTask, MessageRequest, MessageResponse, ModelApi, RawResponse, RetryPolicy,
    TaskCatalog, TaskKind, TaskOutput, TokenUsage,
};
use invoicy::notify::{Notification, Notifier};
use invoicy::sinks::{EmailSink, Sinks, SpreadsheetSink};
use invoicy::toolchain::ToolchainRunner;
use invoicy::worker::{
    new_job_dir, prepare_submission, stage_file, JobMetadata, JobQueue, QueueSettings, Submission,
};

pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];
pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

/// Schema-valid output for each task.
pub fn valid_output(kind: TaskKind) -> Value {
    match kind {
        TaskKind::Parties => json!({
            "comprobante": {
                "tipo": "Factura",
                "subtipo": "Para operaciones entre responsables inscriptos",
                "jurisdiccion_fiscal": "Argentina",
                "numero": "0002-00004567",
                "fecha_emision": "2024-07-15",
                "moneda": "ARS"
            },
            "emisor": {
                "nombre": "Servicios Patagónicos SA",
                "id_fiscal": "30-70000000-1",
                "condicion_iva": "Responsable Inscripto"
            },
            "receptor": { "nombre": "Estudio Contable SRL", "condicion_iva": "Responsable Inscripto" },
            "otros": { "CAE": "74290000000001", "vencimiento_CAE": "2024-07-25", "forma_pago": "Transferencia" }
        }),
        TaskKind::LineItems => json!({
            "detalles": [
                { "descripcion": "Abono mensual", "cantidad": 1, "precio_unitario": 1000.0, "precio_total": 1000.0 }
            ],
            "subtotal": 1000.0,
            "total": 1210.0
        }),
        TaskKind::Taxes => json!({
            "impuestos": [{ "tipo": "IVA", "base_imponible": 1000.0, "alicuota": 21.0, "importe": 210.0 }],
            "retenciones": []
        }),
    }
}

/// Extraction service with scripted failures, a per-call delay and a
/// high-water mark of items in extraction at once.
pub struct FakeService {
    fail_tasks: Vec<TaskKind>,
    fail_process_ids: Vec<String>,
    delay: Duration,
    input_tokens: u64,
    in_flight: Mutex<HashMap<String, usize>>,
    max_items_in_flight: Mutex<usize>,
    calls: Mutex<Vec<(String, TaskKind)>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self {
            fail_tasks: Vec::new(),
            fail_process_ids: Vec::new(),
            delay: Duration::ZERO,
            input_tokens: 100,
            in_flight: Mutex::new(HashMap::new()),
            max_items_in_flight: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing_task(mut self, kind: TaskKind) -> Self {
        self.fail_tasks.push(kind);
        self
    }

    pub fn failing_item(mut self, process_id: &str) -> Self {
        self.fail_process_ids.push(process_id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_items_in_flight(&self) -> usize {
        *self.max_items_in_flight.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<(String, TaskKind)> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, process_id: &str) {
        let mut in_flight = self.in_flight.lock().unwrap();
        *in_flight.entry(process_id.to_string()).or_insert(0) += 1;
        let mut max = self.max_items_in_flight.lock().unwrap();
        *max = (*max).max(in_flight.len());
    }

    fn leave(&self, process_id: &str) {
        let mut in_flight = self.in_flight.lock().unwrap();
        if let Some(count) = in_flight.get_mut(process_id) {
            *count -= 1;
            if *count == 0 {
                in_flight.remove(process_id);
            }
        }
    }
}

#[async_trait]
impl ExtractionService for FakeService {
    async fn extract(
        &self,
        process_id: &str,
        _document: &Document,
        task: &ExtractionTask,
    ) -> Result<ExtractionResult, ExtractionError> {
        self.calls
            .lock()
            .unwrap()
            .push((process_id.to_string(), task.kind));
        self.enter(process_id);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.leave(process_id);

        if self.fail_tasks.contains(&task.kind) || self.fail_process_ids.iter().any(|p| p == process_id) {
            return Err(ExtractionError::Exhausted {
                task: task.kind,
                attempts: 6,
                source: Box::new(ExtractionError::Validation {
                    task: task.kind,
                    message: "scripted failure".to_string(),
                }),
            });
        }

        Ok(ExtractionResult {
            kind: task.kind,
            output: TaskOutput::from_value(task.kind, valid_output(task.kind)).unwrap(),
            usage: TokenUsage {
                input_tokens: self.input_tokens,
                output_tokens: 10,
                ..TokenUsage::default()
            },
        })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    payloads: Mutex<Vec<Value>>,
}

impl RecordingNotifier {
    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn with_status(&self, status: &str) -> Vec<Value> {
        self.payloads()
            .into_iter()
            .filter(|p| p["status"] == status)
            .collect()
    }

    /// Completion and failure webhooks only.
    pub fn item_outcomes(&self) -> Vec<Value> {
        self.payloads()
            .into_iter()
            .filter(|p| p["status"] == "completed" || p["status"] == "failed")
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.payloads.lock().unwrap().push(notification.payload());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSheet {
    pub fail: bool,
    rows: Mutex<Vec<Vec<String>>>,
}

impl RecordingSheet {
    pub fn failing() -> Self {
        Self {
            fail: true,
            rows: Mutex::new(Vec::new()),
        }
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpreadsheetSink for RecordingSheet {
    async fn append_row(&self, row: &[String]) -> Result<(), SinkError> {
        if self.fail {
            return Err(SinkError::Rejected {
                status: 500,
                body: "sheet unavailable".to_string(),
            });
        }
        self.rows.lock().unwrap().push(row.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingEmail {
    sent: Mutex<Vec<(String, String)>>,
}

impl RecordingEmail {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSink for RecordingEmail {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), SinkError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}

pub struct Harness {
    pub queue: Arc<JobQueue>,
    pub notifier: Arc<RecordingNotifier>,
    pub sheet: Arc<RecordingSheet>,
    pub email: Arc<RecordingEmail>,
}

impl Harness {
    pub fn new(service: Arc<dyn ExtractionService>) -> Self {
        Self::with_sheet(service, RecordingSheet::default())
    }

    pub fn with_sheet(service: Arc<dyn ExtractionService>, sheet: RecordingSheet) -> Self {
        Self::from_parts(service, Arc::new(RecordingNotifier::default()), sheet)
    }

    /// Shares `notifier` with the caller, e.g. for an extractor's diagnostics.
    pub fn from_parts(
        service: Arc<dyn ExtractionService>,
        notifier: Arc<RecordingNotifier>,
        sheet: RecordingSheet,
    ) -> Self {
        let sheet = Arc::new(sheet);
        let email = Arc::new(RecordingEmail::default());
        let runner = ToolchainRunner::new(
            service,
            Arc::new(TaskCatalog::standard().unwrap()),
            TaskOrdering::FirstThenParallel,
        );
        let sinks = Sinks {
            spreadsheet: Some(sheet.clone()),
            email: Some(email.clone()),
        };
        let queue = Arc::new(JobQueue::new(
            runner,
            notifier.clone(),
            sinks,
            QueueSettings::default(),
        ));
        Self {
            queue,
            notifier,
            sheet,
            email,
        }
    }
}

/// Stages `bytes` as `file_name` in a fresh job dir and classifies it.
pub async fn submission(job_id: &str, file_name: &str, bytes: &[u8]) -> (Submission, PathBuf) {
    submission_with(job_id, file_name, bytes, JobMetadata::default()).await
}

pub async fn submission_with(
    job_id: &str,
    file_name: &str,
    bytes: &[u8],
    metadata: JobMetadata,
) -> (Submission, PathBuf) {
    let temp_dir = new_job_dir(None).unwrap();
    let dir = temp_dir.path().to_path_buf();
    let staged = stage_file(&dir, file_name, bytes).await.unwrap();
    let submission = prepare_submission(job_id, staged, temp_dir, metadata)
        .await
        .unwrap();
    (submission, dir)
}

/// ZIP bytes with the given files and directory entries.
pub fn zip_bytes(members: &[(&str, &[u8])], directories: &[&str]) -> Vec<u8> {
    let dir = tempfile::TempDir::new().unwrap();
    let path = write_zip(dir.path(), members, directories);
    std::fs::read(path).unwrap()
}

pub fn write_zip(dir: &Path, members: &[(&str, &[u8])], directories: &[&str]) -> PathBuf {
    let path = dir.join("batch.zip");
    let mut writer = ZipWriter::new(File::create(&path).unwrap());
    for name in directories {
        writer
            .add_directory(*name, SimpleFileOptions::default())
            .unwrap();
    }
    for (name, data) in members {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
    path
}

/// Model response body that calls `tool_name` with `input`.
pub fn tool_response(tool_name: &str, input: Value) -> Value {
    json!({
        "id": "msg_test",
        "type": "message",
        "role": "assistant",
        "content": [
            { "type": "tool_use", "id": "toolu_test", "name": tool_name, "input": input }
        ],
        "usage": { "input_tokens": 100, "output_tokens": 20 }
    })
}

/// Answers every forced tool call with valid output, except for the tasks
/// listed as invalid, which always get a schema-breaking candidate.
#[derive(Default)]
pub struct ToolApi {
    invalid: Vec<TaskKind>,
    calls: AtomicU32,
}

impl ToolApi {
    pub fn invalid_for(kind: TaskKind) -> Self {
        Self {
            invalid: vec![kind],
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelApi for ToolApi {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = request.tool_choice.name.as_str();
        let kind = TaskKind::from_tool_name(name)
            .ok_or_else(|| ExtractionError::Fatal(format!("unknown tool {}", name)))?;
        let input = if self.invalid.contains(&kind) {
            json!({ "detalles": "ninguno" })
        } else {
            valid_output(kind)
        };
        serde_json::from_value(tool_response(name, input))
            .map_err(|e| ExtractionError::Fatal(e.to_string()))
    }
}

/// Answers 429 with a retry-after hint a fixed number of times, then
/// succeeds, going through the real transport retry loop.
pub struct BusyApi {
    policy: RetryPolicy,
    busy_responses: u32,
    retry_after: Duration,
    calls: AtomicU32,
}

impl BusyApi {
    pub fn new(busy_responses: u32, retry_after: Duration) -> Self {
        Self {
            policy: RetryPolicy::default(),
            busy_responses,
            retry_after,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelApi for BusyApi {
    async fn create_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, ExtractionError> {
        let name = request.tool_choice.name.clone();
        let body = send_with_retry(&self.policy, || {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let name = name.clone();
            async move {
                if call < self.busy_responses {
                    return Ok(RawResponse {
                        status: 429,
                        retry_after: Some(self.retry_after),
                        body: "rate limited".to_string(),
                    });
                }
                let kind = TaskKind::from_tool_name(&name).unwrap_or(TaskKind::Parties);
                Ok(RawResponse {
                    status: 200,
                    retry_after: None,
                    body: tool_response(&name, valid_output(kind)).to_string(),
                })
            }
        })
        .await?;
        serde_json::from_str(&body).map_err(|e| ExtractionError::Fatal(e.to_string()))
    }
}
