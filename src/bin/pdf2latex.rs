//! CLI binary for edgequake-pdf2latex.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` / `CloudConfig`, runs one request and prints the LaTeX.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdf2latex::{
    resolve_input, write_latex, CloudConfig, CloudProvider, ConversionConfig,
    ConversionProgressCallback, ConversionRequest, Orchestrator, Pdf2LatexError, ProcessingStatus,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner showing the current step, with one log line per finished step.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new(file_name: &str) -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix(file_name.to_string());
        bar.set_message("Waiting…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_status_change(&self, from: ProcessingStatus, to: ProcessingStatus) {
        if from.is_busy() && to != ProcessingStatus::Failed {
            self.bar
                .println(format!("  {} {}", green("✓"), dim(&from.to_string())));
        }
    }

    fn on_progress(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn on_complete(&self, latex_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} LaTeX generated  {}",
            green("✔"),
            dim(&format!("{latex_len} chars"))
        );
    }

    fn on_failure(&self, step: ProcessingStatus, error: &Pdf2LatexError) {
        self.bar.finish_and_clear();
        eprintln!("{} {} failed: {}", red("✘"), bold(&step.to_string()), error.kind());
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (stdout)
  pdf2latex paper.pdf

  # Convert to file
  pdf2latex paper.pdf -o paper.tex

  # Reference figures from a cloud folder
  pdf2latex paper.pdf --cloud-provider gdrive \
      --public-url-prefix https://example.com/imgs -o paper.tex

  # Use another provider through edgequake-llm
  pdf2latex --provider openai --model gpt-4.1 paper.pdf

  # Convert from URL
  pdf2latex https://arxiv.org/pdf/1706.03762 -o attention.tex

  # JSON output with stats
  pdf2latex --json paper.pdf > output.json

ENVIRONMENT VARIABLES:
  PDF2LATEX_API_KEY       API key for the generation service
  GEMINI_API_KEY          Fallback key for the default Gemini backend
  OPENAI_API_KEY          Key for --provider openai
  ANTHROPIC_API_KEY       Key for --provider anthropic
  RUST_LOG                Override the log filter (e.g. edgequake_pdf2latex=debug)

Press Ctrl-C during a conversion to cancel it.
"#;

/// Convert PDF files and URLs to LaTeX with a document-understanding model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2latex",
    version,
    about = "Convert PDF files and URLs to compilable LaTeX",
    long_about = "Convert a PDF document (local file or URL) to a complete, compilable LaTeX \
document. The PDF is sent whole to Google Gemini (default) or any edgequake-llm provider. \
Equations become math mode, tables become table environments, and figures are referenced \
from a cloud image host or redrawn in TikZ.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write LaTeX to this file instead of stdout.
    #[arg(short, long, env = "PDF2LATEX_OUTPUT")]
    output: Option<PathBuf>,

    /// API key for the generation service.
    #[arg(long, env = "PDF2LATEX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID (default: gemini-3-pro-preview).
    #[arg(long, env = "PDF2LATEX_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider instead of Gemini REST: openai, anthropic, ollama, …
    #[arg(long, env = "PDF2LATEX_PROVIDER")]
    provider: Option<String>,

    /// Where figures are hosted.
    #[arg(long, env = "PDF2LATEX_CLOUD_PROVIDER", value_enum, default_value = "none")]
    cloud_provider: CloudArg,

    /// Public URL prefix figures are served from (with --cloud-provider).
    #[arg(long, env = "PDF2LATEX_PUBLIC_URL_PREFIX", default_value = "")]
    public_url_prefix: String,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2LATEX_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Temperature (0.0–2.0).
    #[arg(long, env = "PDF2LATEX_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max output tokens.
    #[arg(long, env = "PDF2LATEX_MAX_TOKENS", default_value_t = 32768)]
    max_tokens: usize,

    /// Generation call timeout in seconds.
    #[arg(long, env = "PDF2LATEX_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "PDF2LATEX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Duration of each placeholder asset step in milliseconds.
    #[arg(long, env = "PDF2LATEX_PLACEHOLDER_DELAY_MS", default_value_t = 1500)]
    placeholder_delay_ms: u64,

    /// Output structured JSON (ConversionOutput) instead of LaTeX.
    #[arg(long, env = "PDF2LATEX_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PDF2LATEX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2LATEX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2LATEX_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum CloudArg {
    None,
    Gdrive,
    Onedrive,
}

impl From<CloudArg> for CloudProvider {
    fn from(v: CloudArg) -> Self {
        match v {
            CloudArg::None => CloudProvider::None,
            CloudArg::Gdrive => CloudProvider::GoogleDrive,
            CloudArg::Onedrive => CloudProvider::OneDrive,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the step messages, so library INFO logs are
    // suppressed while it is active.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Intake ───────────────────────────────────────────────────────────
    let payload = resolve_input(&cli.input, cli.download_timeout)
        .await
        .with_context(|| format!("Cannot use '{}' as input", cli.input))?;

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new(payload.name());
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let cloud = CloudConfig::new(cli.cloud_provider.into(), cli.public_url_prefix.clone());
    let orchestrator = Orchestrator::from_config(&config).context("Invalid configuration")?;

    // ── Run conversion (Ctrl-C cancels) ──────────────────────────────────
    let submit = orchestrator.submit(ConversionRequest::new(payload, cloud));
    tokio::pin!(submit);
    let result = tokio::select! {
        r = &mut submit => r,
        _ = tokio::signal::ctrl_c() => {
            orchestrator.cancel();
            submit.await
        }
    };
    let output = result.context("Conversion failed")?;

    // ── Output ───────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        write_latex(output_path, &output.latex)
            .await
            .context("Failed to write output")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}ms  →  {}",
                green("✔"),
                output.stats.total_duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(output.latex.as_bytes())
            .context("Failed to write to stdout")?;
        if !output.latex.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}",
            dim(&token_count(output.stats.input_tokens)),
            dim(&token_count(output.stats.output_tokens)),
            cyan(&format!("{}ms generating", output.stats.generation_duration_ms)),
        );
    }

    Ok(())
}

fn token_count(n: Option<u64>) -> String {
    n.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Map CLI args to `ConversionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .download_timeout_secs(cli.download_timeout)
        .placeholder_delay_ms(cli.placeholder_delay_ms);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(key) = resolve_api_key(cli) {
        builder = builder.api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `--api-key` / `PDF2LATEX_API_KEY` first, then the provider's usual variable.
///
/// Local providers take no key; they get a fixed credential so the
/// missing-key check passes.
fn resolve_api_key(cli: &Cli) -> Option<String> {
    if let Some(key) = cli.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        return Some(key.clone());
    }
    let var = match cli.provider.as_deref() {
        None | Some("gemini") => "GEMINI_API_KEY",
        Some("openai") => "OPENAI_API_KEY",
        Some("anthropic") => "ANTHROPIC_API_KEY",
        Some("azure") => "AZURE_OPENAI_API_KEY",
        Some("mistral") => "MISTRAL_API_KEY",
        Some("ollama") | Some("lmstudio") => return Some("local".to_string()),
        Some(_) => return None,
    };
    std::env::var(var).ok().filter(|k| !k.trim().is_empty())
}
