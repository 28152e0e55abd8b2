//! Integration tests for the conversion orchestrator.
//!
//! Every test runs against an in-process fake backend, so no network access
//! or API key is needed:
//!
//!   cargo test --test orchestrator

use async_trait::async_trait;
use edgequake_pdf2latex::{
    accept_upload, resolve_input, AssetExtractor, AssetUploader, BackendError, CloudConfig,
    CloudProvider, ConversionConfig, ConversionProgressCallback, ConversionRequest, Credential,
    ErrorKind, ExtractedAsset, GenerationBackend, GenerationClient, GenerationRequest,
    GenerationResponse, Orchestrator, Pdf2LatexError, PdfPayload, ProcessingStatus,
    UploadedAsset,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_test::{assert_err, assert_ok};

// ── Test helpers ─────────────────────────────────────────────────────────────

const LATEX: &str = "\\documentclass{article}\n\\usepackage{amsmath}\n\\begin{document}\n$E = mc^2$\n\\end{document}";

/// Replies with a fixed answer and records every request it sees.
struct FakeBackend {
    reply: Result<String, String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeBackend {
    fn replying(text: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Err(message.to_string()),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_instructions(&self) -> String {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.instructions.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn generate(
        &self,
        _credential: &Credential,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        match &self.reply {
            Ok(text) => Ok(GenerationResponse::text(text.clone())),
            Err(e) => Err(e.clone().into()),
        }
    }
}

/// Blocks inside the call until released, announcing when it got there.
struct HeldBackend {
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl GenerationBackend for HeldBackend {
    fn name(&self) -> &str {
        "held"
    }

    async fn generate(
        &self,
        _credential: &Credential,
        _request: &GenerationRequest,
    ) -> Result<GenerationResponse, BackendError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(GenerationResponse::text(LATEX))
    }
}

#[derive(Default)]
struct Recorder {
    transitions: Mutex<Vec<(ProcessingStatus, ProcessingStatus)>>,
    messages: Mutex<Vec<String>>,
    failures: Mutex<Vec<ProcessingStatus>>,
}

impl Recorder {
    fn statuses(&self) -> Vec<ProcessingStatus> {
        self.transitions.lock().unwrap().iter().map(|(_, to)| *to).collect()
    }
}

impl ConversionProgressCallback for Recorder {
    fn on_status_change(&self, from: ProcessingStatus, to: ProcessingStatus) {
        self.transitions.lock().unwrap().push((from, to));
    }

    fn on_progress(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }

    fn on_failure(&self, step: ProcessingStatus, _error: &Pdf2LatexError) {
        self.failures.lock().unwrap().push(step);
    }
}

fn fast_config() -> ConversionConfig {
    ConversionConfig::builder()
        .placeholder_delay_ms(0)
        .build()
        .unwrap()
}

fn orchestrator_with(
    backend: Arc<dyn GenerationBackend>,
    key: Option<&str>,
    recorder: &Arc<Recorder>,
) -> Orchestrator {
    let client = GenerationClient::new(backend, key.and_then(Credential::new));
    Orchestrator::new(client, &fast_config()).with_progress(recorder.clone())
}

fn pdf() -> PdfPayload {
    accept_upload("paper.pdf", "application/pdf", b"%PDF-1.5\n1 0 obj\n".to_vec()).unwrap()
}

fn gdrive() -> CloudConfig {
    CloudConfig::new(CloudProvider::GoogleDrive, "https://example.com/imgs")
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_cloud_completes_with_backend_text() {
    let backend = FakeBackend::replying(LATEX);
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(backend.clone(), Some("key"), &recorder);

    let out = assert_ok!(orch.submit(ConversionRequest::new(pdf(), CloudConfig::default())).await);
    assert_eq!(out.latex, LATEX);

    let snap = orch.snapshot();
    assert_eq!(snap.status, ProcessingStatus::Completed);
    assert_eq!(snap.latex(), LATEX);

    let seen = recorder.statuses();
    assert!(!seen.contains(&ProcessingStatus::ExtractingAssets), "{seen:?}");
    assert!(!seen.contains(&ProcessingStatus::UploadingAssets), "{seen:?}");
    let instructions = backend.last_instructions();
    assert!(instructions.contains("IMAGE_PLACEHOLDER"));
    assert!(!instructions.contains("\\includegraphics"));
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn cloud_request_runs_asset_steps_in_order_and_references_prefix() {
    let backend = FakeBackend::replying(LATEX);
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(backend.clone(), Some("key"), &recorder);

    assert_ok!(orch.submit(ConversionRequest::new(pdf(), gdrive())).await);

    assert_eq!(
        recorder.statuses(),
        vec![
            ProcessingStatus::ReadingInput,
            ProcessingStatus::ExtractingAssets,
            ProcessingStatus::UploadingAssets,
            ProcessingStatus::GeneratingOutput,
            ProcessingStatus::Completed,
        ]
    );
    assert!(backend
        .last_instructions()
        .contains("https://example.com/imgs/image_01.png"));
    assert!(recorder
        .messages
        .lock()
        .unwrap()
        .iter()
        .any(|m| m.contains("Google Drive")));
}

#[tokio::test]
async fn trailing_slash_in_prefix_is_not_doubled() {
    let backend = FakeBackend::replying(LATEX);
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(backend.clone(), Some("key"), &recorder);
    let cloud = CloudConfig::new(CloudProvider::OneDrive, "https://cdn.test/figs/");

    assert_ok!(orch.submit(ConversionRequest::new(pdf(), cloud)).await);
    let instructions = backend.last_instructions();
    assert!(instructions.contains("https://cdn.test/figs/image_01.png"));
    assert!(!instructions.contains("figs//"));
}

#[tokio::test]
async fn transport_error_fails_with_upstream_descriptor() {
    let backend = FakeBackend::failing("connection reset by peer");
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(backend, Some("key"), &recorder);

    let err = assert_err!(orch.submit(ConversionRequest::new(pdf(), CloudConfig::default())).await);
    assert_eq!(err.kind(), ErrorKind::Upstream);

    let snap = orch.snapshot();
    assert_eq!(snap.status, ProcessingStatus::Failed);
    assert_eq!(snap.latex(), "");
    let failure = snap.failure().unwrap();
    assert_eq!(failure.kind, ErrorKind::Upstream);
    assert_eq!(failure.step, ProcessingStatus::GeneratingOutput);
    assert!(failure.message.contains("connection reset by peer"));
    assert_eq!(
        recorder.failures.lock().unwrap().as_slice(),
        &[ProcessingStatus::GeneratingOutput]
    );
}

#[tokio::test]
async fn missing_credential_never_reaches_the_backend() {
    let backend = FakeBackend::replying(LATEX);
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(backend.clone(), None, &recorder);

    let err = assert_err!(orch.submit(ConversionRequest::new(pdf(), CloudConfig::default())).await);
    assert!(matches!(err, Pdf2LatexError::MissingCredential { .. }), "{err:?}");
    assert_eq!(backend.calls(), 0);

    let failure = orch.snapshot().failure().cloned().unwrap();
    assert_eq!(failure.kind, ErrorKind::MissingCredential);
    assert_eq!(failure.step, ProcessingStatus::GeneratingOutput);
}

#[tokio::test]
async fn fenced_answer_is_unwrapped() {
    let backend = FakeBackend::replying(&format!("```latex\n{LATEX}\n```"));
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(backend, Some("key"), &recorder);

    let out = assert_ok!(orch.submit(ConversionRequest::new(pdf(), CloudConfig::default())).await);
    assert_eq!(out.latex, LATEX);
}

#[tokio::test]
async fn second_submit_while_generating_is_rejected() {
    let held = Arc::new(HeldBackend {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let recorder = Arc::new(Recorder::default());
    let orch = Arc::new(orchestrator_with(held.clone(), Some("key"), &recorder));

    let first = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move {
            orch.submit(ConversionRequest::new(pdf(), CloudConfig::default()))
                .await
        })
    };
    held.entered.notified().await;

    let other = accept_upload("other.pdf", "application/pdf", b"%PDF-1.4".to_vec()).unwrap();
    let err = assert_err!(orch.submit(ConversionRequest::new(other, gdrive())).await);
    assert!(matches!(
        err,
        Pdf2LatexError::Busy {
            status: ProcessingStatus::GeneratingOutput
        }
    ));
    let snap = orch.snapshot();
    assert_eq!(snap.status, ProcessingStatus::GeneratingOutput);
    assert_eq!(snap.file_name.as_deref(), Some("paper.pdf"));
    assert!(snap.result.is_none());

    held.release.notify_one();
    let out = assert_ok!(first.await.unwrap());
    assert_eq!(out.latex, LATEX);
    assert_eq!(orch.status(), ProcessingStatus::Completed);
}

#[tokio::test]
async fn cancel_during_placeholder_step_fails_as_cancelled() {
    let backend = FakeBackend::replying(LATEX);
    let client = GenerationClient::new(backend.clone(), Credential::new("key"));
    let config = ConversionConfig::builder()
        .placeholder_delay_ms(10_000)
        .build()
        .unwrap();
    let recorder = Arc::new(Recorder::default());
    let orch = Arc::new(Orchestrator::new(client, &config).with_progress(recorder.clone()));

    let running = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.submit(ConversionRequest::new(pdf(), gdrive())).await })
    };
    while orch.status() != ProcessingStatus::ExtractingAssets {
        tokio::task::yield_now().await;
    }
    assert!(orch.cancel());

    let err = assert_err!(running.await.unwrap());
    assert!(matches!(
        err,
        Pdf2LatexError::Cancelled {
            step: ProcessingStatus::ExtractingAssets
        }
    ));
    assert_eq!(orch.snapshot().failure().unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn slow_backend_times_out() {
    let held = Arc::new(HeldBackend {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let client = GenerationClient::new(held, Credential::new("key"))
        .with_timeout(Duration::from_millis(50));
    let orch = Orchestrator::new(client, &fast_config());

    let err = assert_err!(orch.submit(ConversionRequest::new(pdf(), CloudConfig::default())).await);
    assert!(matches!(err, Pdf2LatexError::Timeout { timeout_ms: 50 }));
    let failure = orch.snapshot().failure().cloned().unwrap();
    assert_eq!(failure.kind, ErrorKind::Timeout);
    assert_eq!(failure.step, ProcessingStatus::GeneratingOutput);
}

#[tokio::test]
async fn non_pdf_is_rejected_at_intake() {
    let err = assert_err!(accept_upload(
        "notes.docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        b"PK\x03\x04".to_vec(),
    ));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(err.to_string().contains("valid PDF"));

    assert_ok!(accept_upload("UPPER.PDF", "Application/PDF", b"%PDF".to_vec()));
}

#[tokio::test]
async fn resubmission_after_failure_starts_fresh() {
    let failing = FakeBackend::failing("quota exceeded");
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(failing, Some("key"), &recorder);

    assert_err!(orch.submit(ConversionRequest::new(pdf(), CloudConfig::default())).await);
    assert_eq!(orch.status(), ProcessingStatus::Failed);

    // Failed → Idle → ReadingInput on the next submit.
    assert_err!(orch.submit(ConversionRequest::new(pdf(), CloudConfig::default())).await);
    let transitions = recorder.transitions.lock().unwrap().clone();
    assert!(transitions.contains(&(ProcessingStatus::Failed, ProcessingStatus::Idle)));
}

// ── Asset seams ──────────────────────────────────────────────────────────────

struct OneFigure;

#[async_trait]
impl AssetExtractor for OneFigure {
    async fn extract(&self, _payload: &PdfPayload) -> Result<Vec<ExtractedAsset>, BackendError> {
        Ok(vec![ExtractedAsset {
            file_name: "image_01.png".into(),
            page: 1,
            data: vec![0x89, b'P', b'N', b'G'],
        }])
    }
}

struct RejectingUploader;

#[async_trait]
impl AssetUploader for RejectingUploader {
    async fn upload(
        &self,
        _assets: &[ExtractedAsset],
        _cloud: &CloudConfig,
    ) -> Result<Vec<UploadedAsset>, BackendError> {
        Err("403 Forbidden".into())
    }
}

#[tokio::test]
async fn custom_extractor_feeds_placeholder_uploader() {
    let backend = FakeBackend::replying(LATEX);
    let client = GenerationClient::new(backend, Credential::new("key"));
    let config = fast_config();
    let orch = Orchestrator::new(client, &config).with_assets(
        Arc::new(OneFigure),
        Arc::new(edgequake_pdf2latex::pipeline::assets::PlaceholderUploader::new(
            Duration::ZERO,
        )),
    );

    let out = assert_ok!(orch.submit(ConversionRequest::new(pdf(), gdrive())).await);
    assert_eq!(
        out.stats.uploaded_assets,
        vec![UploadedAsset {
            file_name: "image_01.png".into(),
            url: "https://example.com/imgs/image_01.png".into(),
        }]
    );
}

#[tokio::test]
async fn upload_failure_is_reported_at_upload_step() {
    let backend = FakeBackend::replying(LATEX);
    let client = GenerationClient::new(backend.clone(), Credential::new("key"));
    let orch = Orchestrator::new(client, &fast_config())
        .with_assets(Arc::new(OneFigure), Arc::new(RejectingUploader));

    let err = assert_err!(orch.submit(ConversionRequest::new(pdf(), gdrive())).await);
    assert_eq!(err.kind(), ErrorKind::Asset);
    let failure = orch.snapshot().failure().cloned().unwrap();
    assert_eq!(failure.step, ProcessingStatus::UploadingAssets);
    assert!(failure.message.contains("403"));
    assert_eq!(backend.calls(), 0);
}

// ── Local files ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn local_file_is_read_during_reading_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scan.pdf");
    std::fs::write(&path, b"%PDF-1.7\n%%EOF\n").unwrap();

    let payload = assert_ok!(resolve_input(path.to_str().unwrap(), 5).await);
    assert_eq!(payload.name(), "scan.pdf");
    assert_eq!(payload.path(), Some(path.as_path()));

    let backend = FakeBackend::replying(LATEX);
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(backend.clone(), Some("key"), &recorder);
    let out = assert_ok!(orch.submit(ConversionRequest::new(payload, CloudConfig::default())).await);
    assert_eq!(out.stats.pdf_bytes, 15);

    let sent = backend.requests.lock().unwrap()[0].payload.clone();
    assert_eq!(sent.mime_type, "application/pdf");
    assert_eq!(sent.data, "JVBERi0xLjcKJSVFT0YK");
}

#[tokio::test]
async fn local_non_pdf_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.pdf");
    std::fs::write(&path, b"\x89PNG\r\n\x1a\n").unwrap();

    let err = assert_err!(resolve_input(path.to_str().unwrap(), 5).await);
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn prebuilt_provider_runs_without_api_key() {
    let mock = edgequake_llm::MockProvider::new();
    mock.add_response(format!("```latex\n{LATEX}\n```")).await;
    let config = ConversionConfig::builder()
        .provider(Arc::new(mock))
        .placeholder_delay_ms(0)
        .build()
        .unwrap();

    let out = assert_ok!(
        edgequake_pdf2latex::convert_bytes("paper.pdf", b"%PDF-1.5".to_vec(), CloudConfig::default(), &config)
            .await
    );
    assert_eq!(out.latex, LATEX);
}

#[tokio::test]
async fn abandoned_submit_can_be_followed_by_a_new_one() {
    let held = Arc::new(HeldBackend {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let recorder = Arc::new(Recorder::default());
    let orch = orchestrator_with(held.clone(), Some("key"), &recorder);

    let outer = tokio::time::timeout(
        Duration::from_millis(50),
        orch.submit(ConversionRequest::new(pdf(), CloudConfig::default())),
    )
    .await;
    assert!(outer.is_err());

    let snap = orch.snapshot();
    assert_eq!(snap.status, ProcessingStatus::Failed);
    assert_eq!(snap.failure().unwrap().kind, ErrorKind::Cancelled);
    assert_eq!(
        recorder.failures.lock().unwrap().as_slice(),
        &[ProcessingStatus::GeneratingOutput]
    );
    assert_ok!(orch.reset());
}
