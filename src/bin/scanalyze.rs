//! CLI binary for scanalyze.
//!
//! A thin shim over the library crate: maps CLI flags to `SessionConfig` and
//! `AnalyzerConfig`, admits the inputs, runs the analysis and prints the
//! result.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use scanalyze::{
    AnalysisError, AnalysisStatus, Analyzer, AnalyzerConfig, FileSummary, IntakeError,
    LlmAnalyzer, RawFile, Session, SessionConfig, SessionObserver,
};
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

fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KIB * KIB {
        format!("{:.1} MB", b / (KIB * KIB))
    } else if b >= KIB {
        format!("{:.1} KB", b / KIB)
    } else {
        format!("{bytes} B")
    }
}

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: prints one line per admitted or rejected file and a
/// percentage bar while the analysis runs.
struct CliObserver {
    bar: ProgressBar,
    show_progress: bool,
}

impl CliObserver {
    fn new(show_progress: bool) -> Arc<Self> {
        let bar = ProgressBar::hidden();
        Arc::new(Self { bar, show_progress })
    }

    fn activate_bar(&self, name: &str) {
        if !self.show_progress {
            return;
        }
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(100);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_prefix("Analysing");
        self.bar.set_message(name.to_string());
        self.bar.enable_steady_tick(Duration::from_millis(80));
    }
}

impl SessionObserver for CliObserver {
    fn on_file_admitted(&self, file: &FileSummary) {
        eprintln!(
            "  {} {}  {}",
            green("✓"),
            file.name,
            dim(&format!("{}, {}", file.media_type, human_size(file.size))),
        );
    }

    fn on_file_rejected(&self, error: &IntakeError) {
        eprintln!("  {} {}", red("✗"), red(&error.to_string()));
    }

    fn on_analysis_start(&self, target: &FileSummary) {
        self.activate_bar(&target.name);
    }

    fn on_analysis_progress(&self, percent: u8) {
        // The simulated bar holds at 99 until the real call returns.
        self.bar.set_position(u64::from(percent.min(99)));
    }

    fn on_analysis_complete(&self, result: &str) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} analysis complete  {}",
            green("✔"),
            dim(&format!("{} chars", result.chars().count()))
        );
    }

    fn on_analysis_failed(&self, message: &str, detail: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), bold(message));
        eprintln!("   {}", dim(detail));
    }
}

/// Stand-in analyzer for runs without a prompt; `submit` is never reached.
struct IntakeOnly;

#[async_trait]
impl Analyzer for IntakeOnly {
    async fn analyze(&self, _prompt: &str, _file: &RawFile) -> Result<String, AnalysisError> {
        Err(AnalysisError::Internal("no prompt was given".into()))
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Check that a file would be accepted (no API key needed)
  scanalyze invoice.pdf

  # Ask a question about a scan
  scanalyze receipt.jpg --prompt "What is the total amount?"

  # Prompt from a file, export the answer
  scanalyze contract.pdf --prompt-file questions.txt -o results/

  # From a URL, with a specific model
  scanalyze https://example.com/report.pdf --provider openai --model gpt-4.1 -p "Summarize this"

  # Machine-readable session snapshot
  scanalyze photo.png -p "Describe the chart" --json

SUPPORTED PROVIDERS:
  openai (gpt-4.1-nano default), anthropic, gemini, azure, ollama,
  or any OpenAI-compatible endpoint supported by edgequake-llm.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium, for PDF inputs
"#;

/// Upload a document or image and analyse it with a Vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "scanalyze",
    version,
    about = "Upload a document or image and analyse it with a Vision LLM",
    long_about = "Admit local files or URLs (images are downscaled and recompressed, oversize \
files rejected), then ask a Vision Language Model a question about the first one. Supports \
OpenAI, Anthropic, Google Gemini, Azure OpenAI, and OpenAI-compatible endpoints.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Question or instruction for the model.
    #[arg(short, long, env = "SCANALYZE_PROMPT", conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the prompt from a text file.
    #[arg(long, env = "SCANALYZE_PROMPT_FILE")]
    prompt_file: Option<PathBuf>,

    /// Also write the result to <DIR>/analysis-result.txt.
    #[arg(short = 'o', long, env = "SCANALYZE_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Maximum number of files kept in the working set.
    #[arg(long, env = "SCANALYZE_MAX_FILES", default_value_t = 1)]
    max_files: usize,

    /// Maximum file size after transcoding, in MB.
    #[arg(long, env = "SCANALYZE_MAX_SIZE", default_value_t = 20)]
    max_size: u64,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "SCANALYZE_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "SCANALYZE_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries on LLM failure.
    #[arg(long, env = "SCANALYZE_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// How many leading PDF pages are sent to the model.
    #[arg(long, env = "SCANALYZE_PDF_PAGES", default_value_t = 10)]
    pdf_pages: usize,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "SCANALYZE_PDF_PASSWORD")]
    pdf_password: Option<String>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "SCANALYZE_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "SCANALYZE_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-attempt LLM call timeout in seconds.
    #[arg(long, env = "SCANALYZE_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,

    /// Print the session snapshot as JSON on stdout.
    #[arg(long, env = "SCANALYZE_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "SCANALYZE_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "SCANALYZE_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "SCANALYZE_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs would interleave with the progress bar.
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

    let prompt = read_prompt(&cli).await?;

    // ── Build session ────────────────────────────────────────────────────
    let mut builder = SessionConfig::builder()
        .max_files(cli.max_files)
        .max_size_mb(cli.max_size)
        .download_timeout_secs(cli.download_timeout);
    if !cli.quiet && !cli.json {
        builder = builder.observer(CliObserver::new(show_progress));
    }
    let session_config = builder.build().context("Invalid configuration")?;

    let analyzer: Arc<dyn Analyzer> = if prompt.is_some() {
        let config = build_analyzer_config(&cli).await?;
        Arc::new(LlmAnalyzer::from_config(config).context("Failed to set up the LLM provider")?)
    } else {
        Arc::new(IntakeOnly)
    };

    let session = Session::new(session_config, analyzer);

    // ── Admit inputs ─────────────────────────────────────────────────────
    let report = session
        .admit_inputs(cli.inputs.as_slice())
        .await
        .context("Failed to load input")?;

    if report.admitted.is_empty() {
        print_json(&cli, &session)?;
        anyhow::bail!(
            "{}",
            session
                .last_error()
                .unwrap_or_else(|| "No file was admitted".to_string())
        );
    }

    let Some(prompt) = prompt else {
        print_json(&cli, &session)?;
        return Ok(());
    };

    // ── Run analysis ─────────────────────────────────────────────────────
    let request = session.submit(&prompt).await.context("Analysis was not started")?;
    print_json(&cli, &session)?;

    match request.status {
        AnalysisStatus::Succeeded { ref result } => {
            if !cli.json {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(result.as_bytes())
                    .context("Failed to write to stdout")?;
                if !result.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }

            if let Some(ref dir) = cli.output_dir {
                let path = session
                    .export_result(dir)
                    .await
                    .context("Failed to export result")?;
                if !cli.quiet {
                    eprintln!("{} {}", cyan("→"), bold(&path.display().to_string()));
                }
            }
            Ok(())
        }
        AnalysisStatus::Failed { ref message } => anyhow::bail!("{message}"),
        _ => anyhow::bail!("Analysis did not complete"),
    }
}

async fn read_prompt(cli: &Cli) -> Result<Option<String>> {
    let prompt = match (&cli.prompt, &cli.prompt_file) {
        (Some(p), _) => Some(p.clone()),
        (None, Some(path)) => Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read prompt from {:?}", path))?,
        ),
        (None, None) => None,
    };
    match prompt {
        Some(p) if p.trim().is_empty() => anyhow::bail!("The prompt is empty"),
        other => Ok(other),
    }
}

/// Map CLI args to `AnalyzerConfig`.
async fn build_analyzer_config(cli: &Cli) -> Result<AnalyzerConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = AnalyzerConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .pdf_max_pages(cli.pdf_pages)
        .api_timeout_secs(Some(cli.api_timeout));

    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref pwd) = cli.pdf_password {
        builder = builder.pdf_password(pwd);
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }

    builder.build().context("Invalid configuration")
}

fn print_json(cli: &Cli, session: &Session) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(&session.snapshot())
            .context("Failed to serialise session")?;
        println!("{json}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_size_units() {
        assert_eq!(human_size(512), "512 B");
        assert_eq!(human_size(2048), "2.0 KB");
        assert_eq!(human_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn cli_parses_prompt_and_inputs() {
        let cli = Cli::try_parse_from(["scanalyze", "a.pdf", "b.png", "-p", "Summarize this"]).unwrap();
        assert_eq!(cli.inputs, vec!["a.pdf", "b.png"]);
        assert_eq!(cli.prompt.as_deref(), Some("Summarize this"));
        assert_eq!(cli.max_files, 1);
    }
}
