//! The conversion orchestrator: one request at a time through the steps.
//!
//! ```text
//! submit ─▶ ReadingInput ─┬──────────────────────────────────┬─▶ GeneratingOutput ─▶ Completed
//!                         └─▶ ExtractingAssets ─▶ UploadingAssets ┘
//! ```
//!
//! The asset steps only run when the request's [`CloudConfig`] names a
//! provider. Any failure moves the machine to `Failed` and stores a
//! [`FailureDescriptor`] naming the step that was running.
//!
//! The state lives behind a short-lived mutex that is never held across an
//! `.await`, so [`Orchestrator::snapshot`] can be polled from another task
//! while a request is in flight.

use crate::config::{CloudConfig, ConversionConfig};
use crate::error::Pdf2LatexError;
use crate::output::{
    ConversionOutput, ConversionResult, ConversionSnapshot, ConversionStats, FailureDescriptor,
};
use crate::pipeline::assets::{AssetExtractor, AssetUploader, PlaceholderExtractor, PlaceholderUploader};
use crate::pipeline::encode::encode_payload;
use crate::pipeline::generate::GenerationClient;
use crate::pipeline::provider::{resolve_backend, resolve_credential};
use crate::progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
use crate::request::ConversionRequest;
use crate::status::ProcessingStatus;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Default)]
struct State {
    status: ProcessingStatus,
    file_name: Option<String>,
    result: Option<ConversionResult>,
    /// Cancellation switch of the in-flight request.
    cancel: Option<watch::Sender<bool>>,
}

/// Runs conversion requests and owns the status machine.
///
/// Share it behind an `Arc` to observe or cancel a request from another task.
pub struct Orchestrator {
    client: GenerationClient,
    extractor: Arc<dyn AssetExtractor>,
    uploader: Arc<dyn AssetUploader>,
    progress: ProgressCallback,
    state: Arc<Mutex<State>>,
}

/// Cancels whatever request its orchestrator is running. Cheap to clone and
/// usable from any task or thread.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<Mutex<State>>,
}

impl CancelHandle {
    /// Ask the in-flight request to stop. Returns `false` when nothing is running.
    pub fn cancel(&self) -> bool {
        match &lock(&self.state).cancel {
            Some(tx) => {
                tx.send_replace(true);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelHandle").finish_non_exhaustive()
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("client", &self.client)
            .field("status", &self.status())
            .finish()
    }
}

impl Orchestrator {
    /// Orchestrator around `client`, with placeholder asset steps timed by
    /// `config.placeholder_delay_ms` and `config`'s progress callback.
    pub fn new(client: GenerationClient, config: &ConversionConfig) -> Self {
        let delay = config.placeholder_delay();
        Self {
            client,
            extractor: Arc::new(PlaceholderExtractor::new(delay)),
            uploader: Arc::new(PlaceholderUploader::new(delay)),
            progress: config
                .progress_callback
                .clone()
                .unwrap_or_else(|| Arc::new(NoopProgressCallback)),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Orchestrator with the backend and credential `config` selects.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Pdf2LatexError> {
        let backend = resolve_backend(config)?;
        let client = GenerationClient::from_config(backend, resolve_credential(config), config);
        Ok(Self::new(client, config))
    }

    /// Replace the placeholder asset steps.
    pub fn with_assets(
        mut self,
        extractor: Arc<dyn AssetExtractor>,
        uploader: Arc<dyn AssetUploader>,
    ) -> Self {
        self.extractor = extractor;
        self.uploader = uploader;
        self
    }

    /// Replace the progress callback taken from the configuration.
    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = progress;
        self
    }

    pub fn status(&self) -> ProcessingStatus {
        self.lock().status
    }

    /// Current status, file name and (once terminal) result.
    pub fn snapshot(&self) -> ConversionSnapshot {
        let state = self.lock();
        ConversionSnapshot {
            status: state.status,
            file_name: state.file_name.clone(),
            result: state.result.clone(),
        }
    }

    /// Clear the last result and return to `Idle`.
    ///
    /// # Errors
    /// [`Pdf2LatexError::Busy`] while a request is in flight.
    pub fn reset(&self) -> Result<(), Pdf2LatexError> {
        let from = {
            let mut state = self.lock();
            if state.status.is_busy() {
                return Err(Pdf2LatexError::Busy {
                    status: state.status,
                });
            }
            let from = state.status;
            state.status = from.transition(ProcessingStatus::Idle)?;
            state.file_name = None;
            state.result = None;
            from
        };
        if from != ProcessingStatus::Idle {
            self.progress.on_status_change(from, ProcessingStatus::Idle);
        }
        Ok(())
    }

    /// Handle that cancels the request running at the time it is used.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Ask the in-flight request to stop. Returns `false` when nothing is running.
    ///
    /// The request ends as `Failed` with [`Pdf2LatexError::Cancelled`] at the
    /// next step boundary or while awaiting the current step.
    pub fn cancel(&self) -> bool {
        self.cancel_handle().cancel()
    }

    /// Run one request to completion.
    ///
    /// A request submitted while another is in flight is refused with
    /// [`Pdf2LatexError::Busy`] and leaves the running one untouched.
    /// Otherwise any previous result is discarded and the request runs to
    /// `Completed` or `Failed`; the same outcome is kept for [`Self::snapshot`].
    /// Dropping the returned future before it resolves ends the request as
    /// `Failed` with [`Pdf2LatexError::Cancelled`].
    pub async fn submit(&self, request: ConversionRequest) -> Result<ConversionOutput, Pdf2LatexError> {
        let mut inflight = self.begin(&request)?;
        let start = Instant::now();
        info!("Converting '{}'", request.payload().name());

        let outcome = self
            .run(&request, &mut inflight.cancel, start)
            .await
            .and_then(|output| self.complete(&output).map(|()| output));
        inflight.settled = true;

        match outcome {
            Ok(output) => {
                info!(
                    "Converted '{}' in {}ms ({} chars of LaTeX)",
                    request.payload().name(),
                    output.stats.total_duration_ms,
                    output.latex.len()
                );
                Ok(output)
            }
            Err(e) => {
                self.fail(&e);
                Err(e)
            }
        }
    }

    // ── Steps ─────────────────────────────────────────────────────────────

    async fn run(
        &self,
        request: &ConversionRequest,
        cancel: &mut watch::Receiver<bool>,
        start: Instant,
    ) -> Result<ConversionOutput, Pdf2LatexError> {
        use ProcessingStatus::*;

        let mut steps = vec![ReadingInput];
        let payload = request.payload();
        let cloud = request.cloud();

        let encoded = guarded(ReadingInput, cancel, encode_payload(payload)).await?;
        let pdf_bytes = encoded.byte_len;

        let mut uploaded_assets = Vec::new();
        if cloud.uses_cloud() {
            self.advance(ExtractingAssets, ExtractingAssets.progress_message())?;
            steps.push(ExtractingAssets);
            let assets = guarded(ExtractingAssets, cancel, async {
                self.extractor
                    .extract(payload)
                    .await
                    .map_err(|source| Pdf2LatexError::Asset {
                        step: ExtractingAssets,
                        source,
                    })
            })
            .await?;
            debug!("Extracted {} assets", assets.len());

            self.advance(UploadingAssets, &upload_message(cloud))?;
            steps.push(UploadingAssets);
            uploaded_assets = guarded(UploadingAssets, cancel, async {
                self.uploader
                    .upload(&assets, cloud)
                    .await
                    .map_err(|source| Pdf2LatexError::Asset {
                        step: UploadingAssets,
                        source,
                    })
            })
            .await?;
        }

        self.advance(
            GeneratingOutput,
            &format!(
                "Generating LaTeX with {} (this may take a moment)...",
                self.client.backend_name()
            ),
        )?;
        steps.push(GeneratingOutput);
        let generated = guarded(GeneratingOutput, cancel, self.client.generate(encoded, cloud)).await?;
        steps.push(Completed);

        Ok(ConversionOutput {
            latex: generated.latex,
            stats: ConversionStats {
                pdf_bytes,
                total_duration_ms: start.elapsed().as_millis() as u64,
                generation_duration_ms: generated.duration_ms,
                input_tokens: generated.input_tokens,
                output_tokens: generated.output_tokens,
                steps,
                uploaded_assets,
            },
        })
    }

    // ── State changes ─────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Accept a request: refuse when busy, otherwise reset and enter `ReadingInput`.
    fn begin(&self, request: &ConversionRequest) -> Result<Inflight<'_>, Pdf2LatexError> {
        let (tx, rx) = watch::channel(false);
        let previous = {
            let mut state = self.lock();
            if state.status.is_busy() {
                warn!(
                    "Refusing '{}': a conversion is already {}",
                    request.payload().name(),
                    state.status
                );
                return Err(Pdf2LatexError::Busy {
                    status: state.status,
                });
            }
            let previous = state.status;
            state.status = previous
                .transition(ProcessingStatus::Idle)?
                .transition(ProcessingStatus::ReadingInput)?;
            state.file_name = Some(request.payload().name().to_string());
            state.result = None;
            state.cancel = Some(tx);
            previous
        };

        if previous != ProcessingStatus::Idle {
            self.progress
                .on_status_change(previous, ProcessingStatus::Idle);
        }
        self.progress
            .on_status_change(ProcessingStatus::Idle, ProcessingStatus::ReadingInput);
        self.progress
            .on_progress(ProcessingStatus::ReadingInput.progress_message());
        Ok(Inflight {
            orchestrator: self,
            cancel: rx,
            settled: false,
        })
    }

    fn advance(&self, next: ProcessingStatus, message: &str) -> Result<(), Pdf2LatexError> {
        let from = {
            let mut state = self.lock();
            let from = state.status;
            state.status = from.transition(next)?;
            from
        };
        debug!("Status: {} → {}", from, next);
        self.progress.on_status_change(from, next);
        self.progress.on_progress(message);
        Ok(())
    }

    /// Store the output and enter `Completed` in one step, so the result is
    /// never visible under a running status.
    fn complete(&self, output: &ConversionOutput) -> Result<(), Pdf2LatexError> {
        let from = {
            let mut state = self.lock();
            let from = state.status;
            state.status = from.transition(ProcessingStatus::Completed)?;
            state.result = Some(ConversionResult::Completed(output.clone()));
            state.cancel = None;
            from
        };
        self.progress
            .on_status_change(from, ProcessingStatus::Completed);
        self.progress.on_progress(ProcessingStatus::Completed.progress_message());
        self.progress.on_complete(output.latex.len());
        Ok(())
    }

    fn fail(&self, error: &Pdf2LatexError) {
        let step = {
            let mut state = self.lock();
            let step = state.status;
            if step.can_transition_to(ProcessingStatus::Failed) {
                state.status = ProcessingStatus::Failed;
            }
            state.result = Some(ConversionResult::Failed(FailureDescriptor {
                step,
                kind: error.kind(),
                message: error.to_string(),
            }));
            state.cancel = None;
            step
        };
        warn!("Conversion failed during {}: {}", step, error);
        if step.is_busy() {
            self.progress.on_status_change(step, ProcessingStatus::Failed);
        }
        self.progress.on_failure(step, error);
    }
}

/// The request `begin` accepted, held for as long as `submit` runs.
///
/// Dropping it unsettled means the `submit` future itself was dropped (an
/// outer timeout, a losing `select!` branch, an aborted task). The request
/// then ends as `Failed` with [`Pdf2LatexError::Cancelled`] at the step it
/// was in, so the orchestrator accepts new work again.
struct Inflight<'a> {
    orchestrator: &'a Orchestrator,
    cancel: watch::Receiver<bool>,
    /// Set once `complete` or `fail` has run for this request.
    settled: bool,
}

impl Drop for Inflight<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let step = self.orchestrator.status();
        if step.is_busy() {
            self.orchestrator.fail(&Pdf2LatexError::Cancelled { step });
        }
    }
}

fn upload_message(cloud: &CloudConfig) -> String {
    format!(
        "Simulating upload to {}...",
        cloud.provider.display_name()
    )
}

/// Await `fut` unless the request is cancelled first.
async fn guarded<T, F>(
    step: ProcessingStatus,
    cancel: &mut watch::Receiver<bool>,
    fut: F,
) -> Result<T, Pdf2LatexError>
where
    F: Future<Output = Result<T, Pdf2LatexError>>,
{
    if *cancel.borrow() {
        return Err(Pdf2LatexError::Cancelled { step });
    }
    tokio::select! {
        biased;
        _ = cancelled(cancel) => Err(Pdf2LatexError::Cancelled { step }),
        result = fut => result,
    }
}

/// Resolves once the switch is flipped; never if its sender is gone.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    let closed = rx.wait_for(|c| *c).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}
