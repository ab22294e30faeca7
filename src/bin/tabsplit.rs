//! CLI binary for edgequake-tabsplit.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `SplitConfig`, writes one file per section and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_tabsplit::pipeline::input;
use edgequake_tabsplit::pipeline::llm::ClientSlot;
use edgequake_tabsplit::{
    detect_sections, split, write_sections, ProgressCallback, ProgressEvent, RenderMode,
    SplitConfig, SplitProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner while detecting, then a bar with one
/// log line per section. Sections in a batch complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);
        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} tabs  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Rendering");
        self.bar.reset_eta();
    }
}

impl SplitProgressCallback for CliProgressCallback {
    fn on_progress(&self, event: &ProgressEvent) {
        match event.label {
            Some(ref label) => self.bar.set_message(label.clone()),
            None => {
                self.bar.set_prefix("Detecting");
                self.bar.set_message("looking for tab boundaries…");
            }
        }
    }

    fn on_sections_detected(&self, total_sections: usize) {
        self.activate_bar(total_sections);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Found {total_sections} tabs"))
        ));
    }

    fn on_section_complete(&self, current: usize, total: usize, title: &str, content_len: usize) {
        self.bar.println(format!(
            "  {} Tab {:>3}/{:<3}  {:<32}  {}",
            green("✓"),
            current,
            total,
            title,
            dim(&format!("{content_len:>6} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_section_error(&self, current: usize, total: usize, title: &str, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Tab {:>3}/{:<3}  {:<32}  {}",
            red("✗"),
            current,
            total,
            title,
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_split_complete(&self, total_sections: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} tabs rendered",
            green("✔"),
            bold(&total_sections.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Split a DOCX export locally (no API key needed when it has bookmarks)
  tabsplit handbook.docx

  # Choose the output directory
  tabsplit handbook.docx -o docs/handbook

  # LLM rewrite of every tab (better tables and lists)
  tabsplit --mode enhanced handbook.docx

  # PDFs always go through the LLM
  tabsplit --provider gemini --model gemini-2.5-flash export.pdf

  # Show what would be split, without rendering
  tabsplit --detect-only --json handbook.docx

  # From a URL
  tabsplit https://example.com/export.docx -o export

ENVIRONMENT VARIABLES:
  GEMINI_API_KEY          Google Gemini API key (recommended: reads PDFs natively)
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (gemini, openai, anthropic, ollama)
  EDGEQUAKE_MODEL         Override model ID
  RUST_LOG                Tracing filter (overrides -v / -q)
"#;

/// Split multi-tab PDF/DOCX/HTML exports into one Markdown file per tab.
#[derive(Parser, Debug)]
#[command(
    name = "tabsplit",
    version,
    about = "Split multi-tab PDF/DOCX/HTML exports into one Markdown file per tab",
    long_about = "Detect the tabs of an exported document (bookmarked title paragraphs, \
file-like separators, or an LLM reading the document) and write each one as its own \
Markdown file. Quick mode converts locally; enhanced mode asks the LLM to rewrite each tab.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file path (.pdf, .docx, .html) or HTTP/HTTPS URL.
    input: String,

    /// Output directory. Defaults to the input's file stem.
    #[arg(short, long, env = "TABSPLIT_OUTPUT")]
    output: Option<PathBuf>,

    /// Rendering mode.
    #[arg(long, env = "TABSPLIT_MODE", value_enum, default_value = "quick")]
    mode: ModeArg,

    /// LLM model ID (e.g. gemini-2.5-flash).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: gemini, openai, anthropic, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Sections rendered concurrently per batch.
    #[arg(long, env = "TABSPLIT_BATCH_SIZE", default_value_t = 3)]
    batch_size: usize,

    /// Retries per section on LLM failure.
    #[arg(long, env = "TABSPLIT_MAX_RETRIES", default_value_t = 2)]
    max_retries: u32,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "TABSPLIT_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Minimum locally detected tabs before the LLM is skipped for detection.
    #[arg(long, env = "TABSPLIT_MIN_LOCAL_SECTIONS", default_value_t = 2)]
    min_local_sections: usize,

    /// Print detected boundaries only, no rendering.
    #[arg(long)]
    detect_only: bool,

    /// Print a JSON summary (sections written + stats) on stdout.
    #[arg(long, env = "TABSPLIT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TABSPLIT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TABSPLIT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TABSPLIT_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "TABSPLIT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Quick,
    Enhanced,
}

impl From<ModeArg> for RenderMode {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Quick => RenderMode::Quick,
            ModeArg::Enhanced => RenderMode::Enhanced,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.detect_only;
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

    // ── Ctrl-C: stop before the next batch ───────────────────────────────
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn SplitProgressCallback>)
    } else {
        None
    };
    let mut config = build_config(&cli, progress_cb, cancel)?;
    // Resolve the provider once. A missing one is reported only if a stage
    // needs it.
    if let ClientSlot::Ready(client) = ClientSlot::resolve(&config) {
        config.client = Some(client);
    }

    let (name, doc) = input::load(&cli.input, config.download_timeout_secs, config.max_input_bytes)
        .await
        .context("Failed to read input")?;

    // ── Detect-only mode ─────────────────────────────────────────────────
    if cli.detect_only {
        let detection = detect_sections(&doc, &config)
            .await
            .context("Detection failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&detection).context("Failed to serialise detection")?
            );
        } else {
            println!("File:       {}", name);
            println!("Detection:  {:?}", detection.source);
            if let Some(pages) = detection.total_pages {
                println!("Pages:      {}", pages);
            }
            for b in &detection.boundaries {
                println!(
                    "  {:>3}. {:<40} → {}",
                    b.ordinal, b.title, b.suggested_file_name
                );
            }
        }
        return Ok(());
    }

    // ── Split and write ──────────────────────────────────────────────────
    let output = split(&doc, cli.mode.into(), &config)
        .await
        .context("Split failed")?;
    let dir = cli
        .output
        .clone()
        .unwrap_or_else(|| input::default_output_dir(&name));
    let written = write_sections(&output.sections, &dir)
        .await
        .context("Failed to write sections")?;

    if cli.json {
        let summary = serde_json::json!({
            "outputDir": dir,
            "files": written,
            "stats": output.stats,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        if !show_progress {
            for path in &written {
                eprintln!("  {}", path.display());
            }
        }
        eprintln!(
            "{}  {} tabs  {}ms  →  {}",
            green("✔"),
            output.stats.total_sections,
            output.stats.duration_ms,
            bold(&dir.display().to_string()),
        );
        eprintln!(
            "   {} detection  /  {} via LLM  /  {} retries",
            dim(&format!("{:?}", output.stats.detection).to_lowercase()),
            dim(&output.stats.remote_sections.to_string()),
            dim(&output.stats.retries.to_string()),
        );
    }

    Ok(())
}

/// Map CLI args to `SplitConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancellationToken,
) -> Result<SplitConfig> {
    let mut builder = SplitConfig::builder()
        .batch_size(cli.batch_size)
        .max_retries(cli.max_retries)
        .temperature(cli.temperature)
        .local_detection_min_sections(cli.min_local_sections)
        .download_timeout_secs(cli.download_timeout)
        .cancel_token(cancel);

    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
