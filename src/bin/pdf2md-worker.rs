//! CLI binary for pdf2md-worker.
//!
//! A thin shim over the library crate: maps flags and env vars to the
//! collaborators, then runs one job, a batch of jobs, or a local conversion.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pdf2md_worker::{
    convert_pdf, DocumentPipeline, HttpInferenceClient, InferenceClient, JobOrchestrator,
    LocalStorage, LogStatusReporter, ObjectStore, ParseJob, PdfiumRenderer,
    PipelineProgressCallback, ProviderInferenceClient, StatusReporter, SupabaseStatusReporter,
    SupabaseStorage, WorkerConfig,
};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ─────────────────────────────────────────────────────

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ───────────────────────────────────

/// Pages are numbered from 1 for people.
fn page_label(page_index: usize, total_pages: usize) -> String {
    format!("Page {:>3}/{:<3}", page_index + 1, total_pages)
}

/// Terminal progress for `convert`: one bar plus a log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    corrections: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Rendering");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            corrections: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, page_index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&page_index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_document_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
        self.bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:42.green/238}] {pos:>3}/{len} pages  \
                 ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(TICKS),
        );
        self.bar.set_prefix("Converting");
    }

    fn on_page_start(&self, page_index: usize, _total_pages: usize) {
        self.start_times
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(page_index, Instant::now());
        self.bar.set_message(format!("page {}", page_index + 1));
    }

    fn on_page_complete(&self, page_index: usize, total_pages: usize, markdown_len: usize) {
        let secs = self.elapsed_secs(page_index);
        self.bar.println(format!(
            "  {} {}  {:<8}  {}",
            green("✓"),
            page_label(page_index, total_pages),
            dim(&format!("{markdown_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_index: usize, total_pages: usize, error: &str) {
        let secs = self.elapsed_secs(page_index);
        let msg: String = if error.chars().count() > 80 {
            error.chars().take(79).chain(['…']).collect()
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            page_label(page_index, total_pages),
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_overlap_checked(&self, previous_index: usize, current_index: usize, corrected: bool) {
        if corrected {
            self.corrections.fetch_add(1, Ordering::SeqCst);
            self.bar.println(format!(
                "  {} Pages {} and {} stitched",
                dim("↔"),
                previous_index + 1,
                current_index + 1
            ));
        }
    }

    fn on_document_complete(&self, total_pages: usize, converted_pages: usize) {
        self.bar.finish_and_clear();
        let failed = total_pages.saturating_sub(converted_pages);
        let corrections = self.corrections.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} pages converted, {} boundaries stitched",
                green("✔"),
                bold(&converted_pages.to_string()),
                corrections
            );
        } else {
            eprintln!(
                "{} {}/{} pages converted  ({} skipped)",
                red("⚠"),
                bold(&converted_pages.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

// ── Arguments ───────────────────────────────────────────────────────────────

const AFTER_HELP: &str = r#"EXAMPLES:
  # One queued job against Supabase
  pdf2md-worker job --job-id 123 --source-file uploads/report.pdf

  # A batch of jobs, one JSON object per line
  pdf2md-worker batch jobs.jsonl

  # Local conversion, no storage involved
  pdf2md-worker convert paper.pdf -o paper.md

INFERENCE BACKENDS:
  --inference-url set     POST {"messages": [...]} to a self-hosted endpoint
  --inference-url unset   chat provider from EDGEQUAKE_LLM_PROVIDER / EDGEQUAKE_MODEL,
                          OPENAI_API_KEY, or any key edgequake-llm detects

STORAGE BACKENDS:
  SUPABASE_URL + SUPABASE_PRIVATE_KEY   Supabase Storage and job table
  --local-root DIR                      <DIR>/<bucket>/<key>, status to the log

ENVIRONMENT VARIABLES:
  INFERENCE_URL, INFERENCE_API_KEY
  SUPABASE_URL, SUPABASE_PRIVATE_KEY, SUPABASE_BUCKET, PDF2MD_JOBS_BUCKET
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Overrides --verbose / --quiet
"#;

/// Convert stored PDF documents to Markdown with a vision model.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2md-worker",
    version,
    about = "Convert stored PDF documents to Markdown with a vision model",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    inference: InferenceArgs,

    #[command(flatten)]
    storage: StorageArgs,

    /// Longest edge of a rendered page, in pixels.
    #[arg(long, global = true, env = "PDF2MD_MAX_PIXELS", default_value_t = 2000)]
    max_pixels: u32,

    /// Directory containing the pdfium shared library.
    #[arg(long, global = true, env = "PDFIUM_LIB_PATH")]
    pdfium_lib_path: Option<PathBuf>,

    /// Text file replacing the page-to-Markdown instruction.
    #[arg(long, global = true, env = "PDF2MD_PAGE_PROMPT")]
    page_prompt: Option<PathBuf>,

    /// Text file replacing the overlap-correction instruction.
    #[arg(long, global = true, env = "PDF2MD_CORRECTION_PROMPT")]
    correction_prompt: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2MD_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single job.
    Job {
        #[arg(long)]
        job_id: String,

        /// Storage key of the PDF in the uploads bucket.
        #[arg(long)]
        source_file: String,

        #[arg(long, default_value = "md")]
        output_format: String,
    },

    /// Run jobs read as JSON lines from a file, or stdin when omitted.
    Batch {
        input: Option<PathBuf>,

        /// Stop at the first failed job.
        #[arg(long)]
        fail_fast: bool,
    },

    /// Convert a local PDF without touching storage.
    Convert {
        input: PathBuf,

        /// Write Markdown to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable the progress bar.
        #[arg(long)]
        no_progress: bool,
    },
}

#[derive(Args, Debug)]
struct InferenceArgs {
    /// JSON inference endpoint; when unset a chat provider is used instead.
    #[arg(long, global = true, env = "INFERENCE_URL")]
    inference_url: Option<String>,

    /// Bearer token for the inference endpoint.
    #[arg(long, global = true, env = "INFERENCE_API_KEY", hide_env_values = true)]
    inference_api_key: Option<String>,

    /// Chat provider: openai, anthropic, gemini, ollama, …
    #[arg(long, global = true, env = "EDGEQUAKE_LLM_PROVIDER")]
    provider: Option<String>,

    /// Chat model ID.
    #[arg(long, global = true, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// Per-call inference timeout in seconds.
    #[arg(long, global = true, env = "PDF2MD_INFERENCE_TIMEOUT", default_value_t = 120)]
    inference_timeout: u64,

    /// Chat provider temperature.
    #[arg(long, global = true, env = "PDF2MD_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Chat provider output token cap.
    #[arg(long, global = true, env = "PDF2MD_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,
}

#[derive(Args, Debug)]
struct StorageArgs {
    #[arg(long, global = true, env = "SUPABASE_URL")]
    supabase_url: Option<String>,

    #[arg(long, global = true, env = "SUPABASE_PRIVATE_KEY", hide_env_values = true)]
    supabase_key: Option<String>,

    /// Use a local directory tree instead of Supabase.
    #[arg(long, global = true, env = "PDF2MD_LOCAL_ROOT")]
    local_root: Option<PathBuf>,

    #[arg(long, global = true, env = "SUPABASE_BUCKET", default_value = "uploads")]
    uploads_bucket: String,

    #[arg(long, global = true, env = "PDF2MD_JOBS_BUCKET", default_value = "jobs")]
    jobs_bucket: String,

    #[arg(long, global = true, env = "PDF2MD_STATUS_TABLE", default_value = "jobs")]
    status_table: String,

    /// Storage and status request timeout in seconds.
    #[arg(long, global = true, env = "PDF2MD_STORAGE_TIMEOUT", default_value_t = 120)]
    storage_timeout: u64,
}

// ── Wiring ──────────────────────────────────────────────────────────────────

fn build_config(cli: &Cli) -> Result<WorkerConfig> {
    let mut builder = WorkerConfig::builder()
        .max_rendered_pixels(cli.max_pixels)
        .inference_timeout_secs(cli.inference.inference_timeout)
        .storage_timeout_secs(cli.storage.storage_timeout)
        .uploads_bucket(&cli.storage.uploads_bucket)
        .jobs_bucket(&cli.storage.jobs_bucket)
        .status_table(&cli.storage.status_table)
        .temperature(cli.inference.temperature)
        .max_tokens(cli.inference.max_tokens);

    if let Some(ref path) = cli.page_prompt {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page prompt: {}", path.display()))?;
        builder = builder.page_prompt(prompt);
    }
    if let Some(ref path) = cli.correction_prompt {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read correction prompt: {}", path.display()))?;
        builder = builder.correction_prompt(prompt);
    }
    if let Some(ref dir) = cli.pdfium_lib_path {
        builder = builder.pdfium_library_dir(dir);
    }

    builder.build().context("Invalid configuration")
}

fn build_client(args: &InferenceArgs, config: &WorkerConfig) -> Result<Arc<dyn InferenceClient>> {
    if let Some(ref url) = args.inference_url {
        info!("Inference endpoint: {}", url);
        let client = HttpInferenceClient::new(
            url.as_str(),
            args.inference_api_key.clone(),
            config.inference_timeout_secs,
        )
        .context("Failed to build inference client")?;
        return Ok(Arc::new(client));
    }

    let client = ProviderInferenceClient::resolve(args.provider.as_deref(), args.model.as_deref())
        .context("Failed to resolve a chat provider (set INFERENCE_URL or a provider API key)")?
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_timeout(Duration::from_secs(config.inference_timeout_secs));
    Ok(Arc::new(client))
}

fn build_storage(
    args: &StorageArgs,
    config: &WorkerConfig,
) -> Result<(Arc<dyn ObjectStore>, Arc<dyn StatusReporter>)> {
    match (&args.supabase_url, &args.supabase_key, &args.local_root) {
        (Some(url), Some(key), _) => {
            let store = SupabaseStorage::new(url.as_str(), key.as_str(), config.storage_timeout_secs)
                .context("Failed to build storage client")?;
            let reporter = SupabaseStatusReporter::new(
                url.as_str(),
                key.as_str(),
                config.status_table.as_str(),
                config.storage_timeout_secs,
            )
            .context("Failed to build status client")?;
            Ok((Arc::new(store), Arc::new(reporter)))
        }
        (_, _, Some(root)) => {
            info!("Local storage root: {}", root.display());
            Ok((
                Arc::new(LocalStorage::new(root)),
                Arc::new(LogStatusReporter),
            ))
        }
        _ => bail!("No storage configured: set SUPABASE_URL and SUPABASE_PRIVATE_KEY, or --local-root"),
    }
}

fn build_renderer(config: &WorkerConfig) -> PdfiumRenderer {
    PdfiumRenderer::new(
        config.max_rendered_pixels,
        config.pdfium_library_dir.clone(),
    )
}

fn build_orchestrator(cli: &Cli, config: WorkerConfig) -> Result<JobOrchestrator> {
    let client = build_client(&cli.inference, &config)?;
    let (store, reporter) = build_storage(&cli.storage, &config)?;
    let renderer = Arc::new(build_renderer(&config));
    Ok(JobOrchestrator::new(store, renderer, client, reporter, config))
}

// ── Subcommands ─────────────────────────────────────────────────────────────

async fn run_job(orchestrator: &JobOrchestrator, job: ParseJob, quiet: bool) -> Result<()> {
    let report = orchestrator
        .run(&job)
        .await
        .with_context(|| format!("Job '{}' failed", job.job_id))?;

    if !quiet {
        println!(
            "{}",
            serde_json::to_string(&report).context("Failed to serialize job report")?
        );
    }
    Ok(())
}

async fn run_batch(
    orchestrator: &JobOrchestrator,
    input: Option<PathBuf>,
    fail_fast: bool,
    quiet: bool,
) -> Result<()> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match input {
        Some(ref path) => Box::new(tokio::io::BufReader::new(
            tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open batch file: {}", path.display()))?,
        )),
        None => Box::new(tokio::io::BufReader::new(tokio::io::stdin())),
    };

    let mut succeeded = 0usize;
    let mut failed = 0usize;
    let mut line_no = 0usize;
    let mut lines = reader.lines();

    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read batch input")?
    {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        let job: ParseJob = match serde_json::from_str(&line) {
            Ok(job) => job,
            Err(e) => {
                warn!("Line {}: not a job: {}", line_no, e);
                failed += 1;
                if fail_fast {
                    break;
                }
                continue;
            }
        };

        // Jobs run one after another; a failure is already reported by the orchestrator.
        match run_job(orchestrator, job, quiet).await {
            Ok(()) => succeeded += 1,
            Err(e) => {
                warn!("{:#}", e);
                failed += 1;
                if fail_fast {
                    break;
                }
            }
        }
    }

    info!("Batch finished: {} completed, {} failed", succeeded, failed);
    if failed > 0 {
        bail!("{failed} job(s) failed");
    }
    Ok(())
}

async fn run_convert(
    cli: &Cli,
    config: WorkerConfig,
    input: &Path,
    output: Option<&Path>,
    show_progress: bool,
) -> Result<()> {
    let client = build_client(&cli.inference, &config)?;
    let renderer = build_renderer(&config);

    let mut pipeline = DocumentPipeline::from_config(client, &config);
    if show_progress {
        pipeline = pipeline.with_progress(CliProgressCallback::new());
    }

    let (markdown, stats) = convert_pdf(&renderer, &pipeline, input)
        .await
        .with_context(|| format!("Failed to convert {}", input.display()))?;

    match output {
        Some(path) => {
            std::fs::write(path, &markdown)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(
                "Wrote {} ({} pages, {} bytes)",
                path.display(),
                stats.pages_converted,
                markdown.len()
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout
                .write_all(markdown.as_bytes())
                .and_then(|_| stdout.write_all(b"\n"))
                .context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The convert progress bar replaces INFO logs unless --verbose is set.
    let show_progress = matches!(
        cli.command,
        Command::Convert { no_progress: false, .. }
    ) && !cli.quiet;
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

    let config = build_config(&cli)?;

    match cli.command {
        Command::Job {
            ref job_id,
            ref source_file,
            ref output_format,
        } => {
            let orchestrator = build_orchestrator(&cli, config)?;
            let job = ParseJob::new(job_id.as_str(), output_format.as_str(), source_file.as_str());
            run_job(&orchestrator, job, cli.quiet).await
        }
        Command::Batch {
            ref input,
            fail_fast,
        } => {
            let orchestrator = build_orchestrator(&cli, config)?;
            run_batch(&orchestrator, input.clone(), fail_fast, cli.quiet).await
        }
        Command::Convert {
            ref input,
            ref output,
            ..
        } => run_convert(&cli, config, input, output.as_deref(), show_progress).await,
    }
}
