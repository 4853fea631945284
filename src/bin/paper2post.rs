//! CLI binary for paper2post.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `PipelineConfig` and prints the run's metadata.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use paper2post::{
    summarize_paper, PipelineConfig, PipelineProgressCallback, ProgressCallback, RunReport, Stage,
    DEFAULT_TARGET_LANGUAGE,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the running stage, plus one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Start time of the running stage.
    started: Mutex<Option<Instant>>,
    /// Count of stages that fell back to a substitute.
    degraded: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self::with_bar(bar))
    }

    fn with_bar(bar: ProgressBar) -> Self {
        Self {
            bar,
            started: Mutex::new(None),
            degraded: AtomicUsize::new(0),
        }
    }

    fn stage_elapsed(&self) -> String {
        let secs = self
            .started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        dim(&format!("{secs:.1}s"))
    }
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_run_start(&self, paper_name: &str) {
        self.bar.set_prefix("Summarizing");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Turning '{paper_name}' into a post…"))
        ));
    }

    fn on_stage_start(&self, stage: Stage) {
        *self.started.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        self.bar.set_message(stage.to_string());
    }

    fn on_stage_complete(&self, stage: Stage) {
        self.bar.println(format!(
            "  {} {:<32} {}",
            green("✓"),
            stage.to_string(),
            self.stage_elapsed()
        ));
    }

    fn on_stage_degraded(&self, stage: Stage, reason: &str) {
        self.degraded.fetch_add(1, Ordering::SeqCst);
        self.bar.println(format!(
            "  {} {:<32} {}  {}",
            yellow("⚠"),
            stage.to_string(),
            self.stage_elapsed(),
            dim(reason)
        ));
    }

    fn on_run_complete(&self, post_path: &str) {
        self.bar.finish_and_clear();
        let degraded = self.degraded.load(Ordering::SeqCst);
        if degraded == 0 {
            eprintln!("{} {}", green("✔"), bold(post_path));
        } else {
            eprintln!(
                "{} {}  ({} stages degraded)",
                yellow("⚠"),
                bold(post_path),
                degraded
            );
        }
    }

    fn on_run_failed(&self, _error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✗"), bold("Run failed"));
    }
}

/// Clears the spinner on errors raised before `summarize_paper` runs, such
/// as an invalid configuration.
impl Drop for CliProgressCallback {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Summarize into the current Jekyll site
  paper2post papers/1706.03762.pdf

  # Write into another site checkout
  paper2post --output-root ../blog paper.pdf

  # English post, no figures, no quality review
  paper2post --no-translate --no-figures --no-review paper.pdf

  # Swedish summaries with a specific Gemini model
  paper2post --language Swedish --model gemini-2.5-pro paper.pdf

  # Any edgequake-llm provider (pages are sent as images)
  paper2post --provider openai --model gpt-4.1 paper.pdf

  # Machine-readable run report
  paper2post --json paper.pdf > report.json

OUTPUT:
  _posts/<YYYY-MM-DD>-<paper>.markdown       the post
  assets/papers/<paper>/<tier>_fig.png       selected figures
  _paper_metadata.txt                        PAPER_TITLE / PAPER_AUTHORS / PAPER_ID / POST_PATH

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (native backend, sees the PDF itself)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, ollama, …)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Turn research-paper PDFs into tiered-summary blog posts.
#[derive(Parser, Debug)]
#[command(
    name = "paper2post",
    version,
    about = "Turn a research-paper PDF into a tiered-summary Jekyll post",
    long_about = "Summarize a research paper for three audiences (children, high school, \
university), translate the summaries, pick a figure from the paper for each, and write a \
Jekyll post. Uses Google Gemini natively, or any provider supported by edgequake-llm.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the paper PDF.
    pdf: PathBuf,

    /// Root of the Jekyll site to write into.
    #[arg(long, env = "PAPER2POST_OUTPUT_ROOT", default_value = ".")]
    output_root: PathBuf,

    /// Model ID (e.g. gemini-2.0-flash, gpt-4.1-mini).
    #[arg(long, env = "PAPER2POST_MODEL")]
    model: Option<String>,

    /// Provider: gemini, openai, anthropic, ollama, azure, …
    #[arg(
        long,
        env = "PAPER2POST_PROVIDER",
        long_help = "Model provider. Auto-detected from API key env vars if not set.\n\
          'gemini' selects the native Gemini backend; any other name goes through edgequake-llm."
    )]
    provider: Option<String>,

    /// Language to translate the summaries into.
    #[arg(long, env = "PAPER2POST_LANGUAGE", default_value = DEFAULT_TARGET_LANGUAGE)]
    language: String,

    /// Keep the summaries in English.
    #[arg(long, env = "PAPER2POST_NO_TRANSLATE")]
    no_translate: bool,

    /// Skip figure extraction and selection.
    #[arg(long, env = "PAPER2POST_NO_FIGURES")]
    no_figures: bool,

    /// Skip the quality review.
    #[arg(long, env = "PAPER2POST_NO_REVIEW")]
    no_review: bool,

    /// Directory for temporary figure files (default: system temp dir).
    #[arg(long, env = "PAPER2POST_SCRATCH_DIR")]
    scratch_dir: Option<PathBuf>,

    /// Minimum figure width and height in pixels.
    #[arg(long, env = "PAPER2POST_MIN_FIGURE_SIZE", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..))]
    min_figure_size: u32,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "PAPER2POST_TEMPERATURE", default_value_t = 0.7)]
    temperature: f32,

    /// Max output tokens per model call.
    #[arg(long, env = "PAPER2POST_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Retries per failed model call.
    #[arg(long, env = "PAPER2POST_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// Per-call timeout in seconds.
    #[arg(long, env = "PAPER2POST_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Do not write _paper_metadata.txt.
    #[arg(long, env = "PAPER2POST_NO_METADATA_FILE")]
    no_metadata_file: bool,

    /// Leave staged uploads on the provider after the run.
    #[arg(long, env = "PAPER2POST_KEEP_UPLOADS")]
    keep_uploads: bool,

    /// Print the run report as JSON instead of KEY=value lines.
    #[arg(long, env = "PAPER2POST_JSON")]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "PAPER2POST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPER2POST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPER2POST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the spinner is active; it
    // reports every stage already.
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

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = summarize_paper(&cli.pdf, &config)
        .await
        .with_context(|| format!("Failed to summarize {}", cli.pdf.display()))?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else {
        print_key_values(&report);
        if !cli.quiet && !show_progress {
            eprintln!(
                "Wrote {} in {}ms ({} figures placed, {} issues)",
                report.post_path.display(),
                report.stats.total_duration_ms,
                report.stats.figures_placed,
                report.issues.len()
            );
        }
    }

    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .output_root(&cli.output_root)
        .target_language(&cli.language)
        .extract_figures(!cli.no_figures)
        .review(!cli.no_review)
        .min_figure_dimension(cli.min_figure_size)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout)
        .write_metadata_file(!cli.no_metadata_file)
        .cleanup_uploads(!cli.keep_uploads);

    if cli.no_translate {
        builder = builder.no_translation();
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref dir) = cli.scratch_dir {
        builder = builder.scratch_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Metadata lines for shell consumers, in the sidecar's format.
fn print_key_values(report: &RunReport) {
    println!("PAPER_TITLE={}", report.metadata.title);
    println!("PAPER_AUTHORS={}", report.metadata.authors);
    println!("PAPER_ID={}", report.paper_name);
    println!(
        "POST_PATH={}",
        report.post_relative_path.to_string_lossy().replace('\\', "/")
    );
    println!("PAPER_DATE={}", report.metadata.date);
}
