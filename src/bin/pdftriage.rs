//! CLI binary for edgequake-pdftriage.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, runs the extraction and prints a summary.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use edgequake_pdftriage::{
    extract_path, BatchOutcome, ClassificationFallback, ExtractionConfig,
    ExtractionProgressCallback, HttpDialect, HttpEndpoint, PageSelection, PricingTable,
    ProgressCallback, RetryPolicy, Strategy,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar plus one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(SPINNER),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
        })
    }

    fn page_elapsed(&self, page: usize) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(&page))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_document_start(&self, file_name: &str, total_pages: usize) {
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}  ETA {eta_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(SPINNER),
        );
        self.bar.set_length(total_pages as u64);
        self.bar.set_position(0);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{file_name}: {total_pages} pages"))
        ));
    }

    fn on_page_start(&self, page: usize, _total: usize) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(page, Instant::now());
        }
        self.bar.set_message(format!("page {page}"));
    }

    fn on_page_complete(&self, page: usize, total: usize, strategy: Strategy, tokens: u64) {
        let secs = self.page_elapsed(page);
        let via = match strategy {
            Strategy::Model => yellow("model"),
            Strategy::Deterministic => dim("text "),
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}  {}",
            green("✓"),
            page,
            total,
            via,
            dim(&format!("{tokens:>6} tokens")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page: usize, total: usize, error: &str) {
        let secs = self.page_elapsed(page);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_document_complete(&self, file_name: &str, total_pages: usize, succeeded: usize) {
        let failed = total_pages.saturating_sub(succeeded);
        let mark = if failed == 0 { green("✔") } else { cyan("⚠") };
        self.bar.println(format!(
            "{mark} {file_name}: {}/{total_pages} pages extracted",
            bold(&succeeded.to_string())
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # One file, outputs in ./output
  pdftriage parse report.pdf

  # A single page into a chosen directory
  pdftriage parse report.pdf --page 3 --output out/

  # Every PDF under a directory, two documents at a time
  pdftriage parse invoices/ -o out/ --concurrency 2

  # Anthropic Messages endpoint instead of an edgequake-llm provider
  pdftriage parse scan.pdf --endpoint https://api.anthropic.com/v1/messages \
      --dialect anthropic-messages --model claude-sonnet-4-20250514

OUTPUT (per document):
  metrics.json     totals and per-page strategy / tokens / time / cost
  pages/N.md       text of page N
  <name>.md        all pages joined

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Provider used when --provider is not given
  EDGEQUAKE_MODEL         Model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter; overrides -v / -q
"#;

#[derive(Parser, Debug)]
#[command(
    name = "pdftriage",
    version,
    about = "Extract PDF text page by page, using a vision model only where the text layer falls short",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Debug-level logs
    #[arg(short, long, global = true, env = "PDFTRIAGE_VERBOSE")]
    verbose: bool,

    /// Errors only, no progress bar
    #[arg(short, long, global = true, env = "PDFTRIAGE_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a PDF file or every PDF under a directory
    Parse(ParseArgs),
}

#[derive(clap::Args, Debug)]
struct ParseArgs {
    /// PDF file or directory
    path: PathBuf,

    /// Process only this page (1-based)
    #[arg(long, env = "PDFTRIAGE_PAGE")]
    page: Option<usize>,

    /// Output directory
    #[arg(short, long, env = "PDFTRIAGE_OUTPUT", default_value = "./output")]
    output: PathBuf,

    /// Vision model ID (also the pricing key)
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// edgequake-llm provider (openai, anthropic, gemini, ollama, …)
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Raw HTTP endpoint instead of an edgequake-llm provider
    #[arg(long, env = "PDFTRIAGE_ENDPOINT")]
    endpoint: Option<String>,

    /// API key for --endpoint
    #[arg(long, env = "PDFTRIAGE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Wire format of --endpoint
    #[arg(long, value_enum, default_value = "anthropic-messages")]
    dialect: DialectArg,

    #[arg(long, env = "PDFTRIAGE_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    #[arg(long, env = "PDFTRIAGE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Attempts per remote call, including the first
    #[arg(long, env = "PDFTRIAGE_MAX_ATTEMPTS", default_value_t = 5)]
    max_attempts: u32,

    /// First backoff delay in ms; doubles after each failure
    #[arg(long, env = "PDFTRIAGE_RETRY_BASE_MS", default_value_t = 1000)]
    retry_base_ms: u64,

    /// Pause after each model-served page, in ms
    #[arg(long, env = "PDFTRIAGE_REQUEST_DELAY_MS", default_value_t = 200)]
    request_delay_ms: u64,

    #[arg(long, env = "PDFTRIAGE_MIN_TEXT_LENGTH", default_value_t = 100)]
    min_text_length: usize,

    #[arg(long, env = "PDFTRIAGE_MAX_PREVIOUS_CHARS", default_value_t = 500)]
    max_previous_chars: usize,

    /// Verdict to assume when the classifier is unreachable
    #[arg(long, env = "PDFTRIAGE_FALLBACK", value_enum, default_value = "assume-no-table")]
    fallback: FallbackArg,

    #[arg(long, env = "PDFTRIAGE_API_TIMEOUT")]
    api_timeout: Option<u64>,

    #[arg(long, env = "PDFTRIAGE_PAGE_TIMEOUT")]
    page_timeout: Option<u64>,

    /// Documents processed at once (directory input)
    #[arg(short, long, env = "PDFTRIAGE_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// JSON price list replacing the built-in one
    #[arg(long, env = "PDFTRIAGE_PRICING")]
    pricing: Option<PathBuf>,

    /// File holding a replacement extraction prompt
    #[arg(long, env = "PDFTRIAGE_EXTRACTION_PROMPT")]
    extraction_prompt: Option<PathBuf>,

    /// Print the batch metrics as JSON on stdout
    #[arg(long)]
    json: bool,

    #[arg(long, env = "PDFTRIAGE_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum DialectArg {
    AnthropicMessages,
    OpenaiChat,
}

impl From<DialectArg> for HttpDialect {
    fn from(v: DialectArg) -> Self {
        match v {
            DialectArg::AnthropicMessages => HttpDialect::AnthropicMessages,
            DialectArg::OpenaiChat => HttpDialect::OpenAiChat,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FallbackArg {
    AssumeNoTable,
    PreferModelWhenImages,
}

impl From<FallbackArg> for ClassificationFallback {
    fn from(v: FallbackArg) -> Self {
        match v {
            FallbackArg::AssumeNoTable => ClassificationFallback::AssumeNoTable,
            FallbackArg::PreferModelWhenImages => ClassificationFallback::PreferModelWhenImages,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let Command::Parse(args) = cli.command;

    // The progress bar carries the per-page feedback, so library INFO logs
    // are muted while it is shown.
    let show_progress = !cli.quiet && !args.no_progress && !args.json;
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

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&args, progress_cb)?;
    let started = Instant::now();
    let outcome = extract_path(&args.path, &args.output, &config)
        .await
        .with_context(|| format!("Failed to process {}", args.path.display()))?;

    if args.json {
        let metrics: Vec<_> = outcome.reports.iter().map(|(_, r)| r.metrics()).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&metrics).context("Failed to serialise metrics")?
        );
    }
    if !cli.quiet {
        print_summary(&outcome, &args, started.elapsed());
    }

    if outcome.reports.is_empty() && !outcome.failures.is_empty() {
        bail!("all {} documents failed", outcome.failures.len());
    }
    Ok(())
}

fn print_summary(outcome: &BatchOutcome, args: &ParseArgs, elapsed: Duration) {
    let pages: usize = outcome.reports.iter().map(|(_, r)| r.total_pages).sum();
    let model_pages: usize = outcome
        .reports
        .iter()
        .flat_map(|(_, r)| &r.pages)
        .filter(|p| p.strategy == Strategy::Model)
        .count();
    let tokens: u64 = outcome.reports.iter().map(|(_, r)| r.total_tokens).sum();
    let cost: f64 = outcome.reports.iter().map(|(_, r)| r.total_cost_usd).sum();

    for failure in &outcome.failures {
        eprintln!("{} {}: {}", red("✘"), failure.path.display(), failure.error);
    }
    eprintln!(
        "{}  {} documents  {} pages ({} via model)  {:.1}s  →  {}",
        if outcome.failures.is_empty() { green("✔") } else { cyan("⚠") },
        outcome.reports.len(),
        pages,
        model_pages,
        elapsed.as_secs_f64(),
        bold(&args.output.display().to_string()),
    );
    eprintln!(
        "   {} tokens  /  {}",
        dim(&tokens.to_string()),
        dim(&format!("${cost:.6}")),
    );
}

fn build_config(args: &ParseArgs, progress_cb: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .dpi(args.dpi)
        .retry(RetryPolicy::new(
            args.max_attempts,
            Duration::from_millis(args.retry_base_ms),
        ))
        .request_delay(Duration::from_millis(args.request_delay_ms))
        .min_text_length(args.min_text_length)
        .max_previous_chars(args.max_previous_chars)
        .classification_fallback(args.fallback.into())
        .concurrency(args.concurrency);

    if let Some(page) = args.page {
        builder = builder.pages(PageSelection::Single(page));
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref url) = args.endpoint {
        builder = builder.http_endpoint(HttpEndpoint {
            url: url.clone(),
            api_key: args.api_key.clone(),
            dialect: args.dialect.into(),
        });
    }
    if let Some(ref pwd) = args.password {
        builder = builder.password(pwd);
    }
    if let Some(secs) = args.api_timeout {
        builder = builder.api_timeout_secs(secs);
    }
    if let Some(secs) = args.page_timeout {
        builder = builder.page_timeout_secs(secs);
    }
    if let Some(ref path) = args.pricing {
        let table = PricingTable::from_json_file(path)?;
        builder = builder.pricing(Arc::new(table));
    }
    if let Some(ref path) = args.extraction_prompt {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file {}", path.display()))?;
        builder = builder.extraction_prompt(prompt);
    }
    if let Some(cb) = progress_cb {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
