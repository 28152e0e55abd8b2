//! Streaming conversion API: observe a conversion as events.
//!
//! [`crate::convert::convert`] returns only once the LaTeX is ready.
//! [`convert_stream`] instead yields a [`ConversionEvent`] for every status
//! change and progress message, ending with exactly one
//! [`ConversionEvent::Finished`] carrying the outcome. This is the shape a
//! UI wants: redraw on each event, show the LaTeX or the failure at the end.

use crate::config::{CloudConfig, ConversionConfig};
use crate::error::Pdf2LatexError;
use crate::orchestrator::Orchestrator;
use crate::output::ConversionResult;
use crate::pipeline::input;
use crate::progress::{ConversionProgressCallback, ProgressCallback};
use crate::request::ConversionRequest;
use crate::status::ProcessingStatus;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::Stream;
use tracing::info;

/// One observable moment of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ConversionEvent {
    StatusChanged {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },
    Progress {
        message: String,
    },
    /// Always the last event.
    Finished { result: ConversionResult },
}

/// A boxed stream of conversion events.
pub type EventStream = Pin<Box<dyn Stream<Item = ConversionEvent> + Send>>;

/// Forwards callback events into the channel, then to the caller's callback.
struct ChannelProgress {
    tx: mpsc::UnboundedSender<ConversionEvent>,
    inner: Option<ProgressCallback>,
}

impl ConversionProgressCallback for ChannelProgress {
    fn on_status_change(&self, from: ProcessingStatus, to: ProcessingStatus) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.tx.send(ConversionEvent::StatusChanged { from, to });
        if let Some(ref cb) = self.inner {
            cb.on_status_change(from, to);
        }
    }

    fn on_progress(&self, message: &str) {
        let _ = self.tx.send(ConversionEvent::Progress {
            message: message.to_string(),
        });
        if let Some(ref cb) = self.inner {
            cb.on_progress(message);
        }
    }

    fn on_complete(&self, latex_len: usize) {
        if let Some(ref cb) = self.inner {
            cb.on_complete(latex_len);
        }
    }

    fn on_failure(&self, step: ProcessingStatus, error: &Pdf2LatexError) {
        if let Some(ref cb) = self.inner {
            cb.on_failure(step, error);
        }
    }
}

/// Convert a PDF file or URL, streaming events as the conversion runs.
///
/// # Returns
/// - `Ok(EventStream)`: ends with [`ConversionEvent::Finished`]
/// - `Err(Pdf2LatexError)`: intake failed (not found, not a PDF, bad provider)
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdf2latex::{convert_stream, CloudConfig, ConversionConfig, ConversionEvent};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = ConversionConfig::builder().api_key("...").build()?;
/// let mut events = convert_stream("paper.pdf", CloudConfig::default(), &config).await?;
/// while let Some(event) = events.next().await {
///     if let ConversionEvent::Progress { message } = event {
///         eprintln!("{message}");
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn convert_stream(
    input_str: impl AsRef<str>,
    cloud: CloudConfig,
    config: &ConversionConfig,
) -> Result<EventStream, Pdf2LatexError> {
    let input_str = input_str.as_ref();
    info!("Starting streaming conversion: {}", input_str);

    let payload = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let orchestrator = Orchestrator::from_config(config)?;
    Ok(stream_request(
        orchestrator,
        ConversionRequest::new(payload, cloud),
        config.progress_callback.clone(),
    ))
}

/// Run `request` on a background task and stream its events.
///
/// `orchestrator`'s own callback is replaced by the channel; pass the caller's
/// callback as `inner` to keep receiving it too.
pub fn stream_request(
    orchestrator: Orchestrator,
    request: ConversionRequest,
    inner: Option<ProgressCallback>,
) -> EventStream {
    let (tx, rx) = mpsc::unbounded_channel();
    let progress = Arc::new(ChannelProgress {
        tx: tx.clone(),
        inner,
    });
    let orchestrator = orchestrator.with_progress(progress);

    tokio::spawn(async move {
        // Errors are already recorded in the snapshot.
        let _ = orchestrator.submit(request).await;
        if let Some(result) = orchestrator.snapshot().result {
            let _ = tx.send(ConversionEvent::Finished { result });
        }
    });

    Box::pin(UnboundedReceiverStream::new(rx))
}
