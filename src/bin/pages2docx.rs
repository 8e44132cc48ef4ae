//! CLI binary for pages2docx.
//!
//! A thin shim over the library crate that maps CLI flags to `BatchConfig`,
//! asks for confirmation, and prints the run summary.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pages2docx::script::quit_script;
use pages2docx::{
    run_batch, scan, AuditLog, BatchConfig, BatchError, BatchPlan, BatchProgressCallback,
    CancelFlag, CommandBridge, ProgressCallback, RunSummary, ScriptBridge,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicUsize, Ordering};
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

/// Exit code for a run stopped by Ctrl-C (128 + SIGINT).
const EXIT_INTERRUPTED: u8 = 130;

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// document.
struct CliProgressCallback {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_batch_start
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  \
                 [{bar:40.green/238}] {pos:>3}/{len}  \
                 ⏱ {elapsed_precise}  {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  ")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Converting");
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl BatchProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total} documents…"))
        ));
    }

    fn on_item_start(&self, _index: usize, _total: usize, source: &Path) {
        let name = file_name(source);
        // Keep the bar on one line.
        let msg: String = name.chars().take(50).collect();
        self.bar.set_message(msg);
    }

    fn on_item_converted(&self, index: usize, total: usize, source: &Path, archived: Option<&Path>) {
        let moved = match archived {
            Some(_) => dim("original archived"),
            None => red("original NOT archived"),
        };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            file_name(source),
            moved,
        ));
        self.bar.inc(1);
    }

    fn on_item_failed(&self, index: usize, total: usize, source: &Path, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error messages to keep output tidy.
        let msg = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            file_name(source),
            red(&msg),
        ));
        self.bar.inc(1);
    }

    fn on_restart(&self, processed: usize) {
        self.bar.println(format!(
            "  {} {}",
            cyan("↻"),
            dim(&format!("restarting application after {processed} documents")),
        ));
    }

    fn on_batch_complete(&self, processed: usize, converted: usize, failed: usize) {
        self.bar.finish_and_clear();
        if failed == 0 {
            eprintln!(
                "{} {} documents converted successfully",
                green("✔"),
                bold(&converted.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} documents converted  ({} failed)",
                if failed == processed {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&converted.to_string()),
                processed,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every Pages document below a folder (asks before starting)
  pages2docx ~/Documents/Letters

  # Unattended run, restarting Pages every 10 documents
  pages2docx --yes --restart-every 10 ~/Documents/Letters

  # Show what would be converted, touch nothing
  pages2docx --scan-only ~/Documents/Letters

  # Keynote to PowerPoint
  pages2docx --application Keynote --source-ext key --target-ext pptx \
             --export-format "Microsoft PowerPoint" --archive-dir keynote ~/Slides

  # Machine-readable summary
  pages2docx --yes --json ~/Documents/Letters > summary.json

WHAT HAPPENS:
  1. Every *.pages below the folder is found. Documents inside a 'pages'
     subfolder, or whose .docx already exists, are skipped.
  2. After confirmation, Pages is (re)started and each document is opened,
     exported to Word and closed without saving.
  3. A converted original is moved into a 'pages' subfolder next to it.
     Existing names are never overwritten: a.pages → a_1.pages → a_2.pages.
  4. Pages is restarted every N documents to keep its memory in check.
  5. Every outcome is appended to a JSON-lines log file.

  Re-running on the same folder only picks up what is left.
  Ctrl-C stops after the current document and still quits Pages.

REQUIREMENTS:
  macOS with Pages installed, and automation permission for your terminal
  (System Settings → Privacy & Security → Automation).
"#;

/// Batch-convert Pages documents to Word by driving Pages through AppleScript.
#[derive(Parser, Debug)]
#[command(
    name = "pages2docx",
    version,
    about = "Batch-convert Pages documents to Word by driving Pages through AppleScript",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Folder containing the documents. Prompted for if omitted.
    directory: Option<PathBuf>,

    /// Skip the confirmation prompt.
    #[arg(short, long, env = "PAGES2DOCX_YES")]
    yes: bool,

    /// List what would be converted, then exit.
    #[arg(long)]
    scan_only: bool,

    /// Restart the application after this many documents.
    #[arg(long, env = "PAGES2DOCX_RESTART_EVERY", default_value_t = 5,
          value_parser = clap::value_parser!(u64).range(1..))]
    restart_every: u64,

    /// Also restart the application after every failed document.
    #[arg(long, env = "PAGES2DOCX_RESTART_ON_FAILURE")]
    restart_on_failure: bool,

    /// Per-document scripting timeout in seconds.
    #[arg(long, env = "PAGES2DOCX_TIMEOUT", default_value_t = 300,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    /// Suffix of the documents to convert.
    #[arg(long, env = "PAGES2DOCX_SOURCE_EXT", default_value = "pages")]
    source_ext: String,

    /// Suffix of the converted documents.
    #[arg(long, env = "PAGES2DOCX_TARGET_EXT", default_value = "docx")]
    target_ext: String,

    /// Export format name understood by the application.
    #[arg(long, env = "PAGES2DOCX_EXPORT_FORMAT", default_value = "Microsoft Word")]
    export_format: String,

    /// Name of the per-folder archive subfolder for originals.
    #[arg(long, env = "PAGES2DOCX_ARCHIVE_DIR", default_value = "pages")]
    archive_dir: String,

    /// Application to drive.
    #[arg(long, env = "PAGES2DOCX_APPLICATION", default_value = "Pages")]
    application: String,

    /// Wait after quitting the application, in milliseconds.
    #[arg(long, env = "PAGES2DOCX_QUIT_SETTLE_MS", default_value_t = 3000)]
    quit_settle_ms: u64,

    /// Wait after launching the application, in milliseconds.
    #[arg(long, env = "PAGES2DOCX_LAUNCH_SETTLE_MS", default_value_t = 2000)]
    launch_settle_ms: u64,

    /// Pause between documents, in milliseconds.
    #[arg(long, env = "PAGES2DOCX_ITEM_DELAY_MS", default_value_t = 500)]
    item_delay_ms: u64,

    /// Audit log path. Default: ./pages2docx_<timestamp>.log
    #[arg(long, env = "PAGES2DOCX_LOG_FILE", conflicts_with = "no_log_file")]
    log_file: Option<PathBuf>,

    /// Do not write an audit log.
    #[arg(long)]
    no_log_file: bool,

    /// Print the run summary (or scan result) as JSON on stdout.
    #[arg(long, env = "PAGES2DOCX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PAGES2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAGES2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAGES2DOCX_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.scan_only;
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

    let directory = match cli.directory.clone() {
        Some(dir) => dir,
        None => prompt_for_directory()?,
    };

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn BatchProgressCallback>)
    } else {
        None
    };
    let cancel = CancelFlag::new();
    let config = build_config(&cli, progress_cb, cancel.clone())?;

    // ── Scan-only mode ───────────────────────────────────────────────────
    if cli.scan_only {
        let plan = scan(&directory, &config)
            .with_context(|| format!("Failed to scan {}", directory.display()))?;
        print_plan(&plan, cli.json)?;
        return Ok(ExitCode::SUCCESS);
    }

    // ── Audit log ────────────────────────────────────────────────────────
    let audit = if cli.no_log_file {
        None
    } else {
        let path = cli.log_file.clone().unwrap_or_else(|| {
            PathBuf::from(AuditLog::default_file_name(chrono::Local::now()))
        });
        Some(AuditLog::create(path).context("Failed to create log file")?)
    };
    let log_path = audit.as_ref().map(|log| log.path().to_path_buf());

    // ── Run ──────────────────────────────────────────────────────────────
    let quiet = cli.quiet;
    let assume_yes = cli.yes;
    let archive_dir = config.archive_dir_name.clone();
    let application = config.application.clone();
    let result = run_batch(&directory, &config, audit, |plan| {
        let confirmed = assume_yes || confirm(plan, &archive_dir, quiet);
        if confirmed {
            // Installed only now so Ctrl-C at the prompt still exits at once.
            install_interrupt_handler(cancel.clone(), application.clone(), quiet);
        }
        confirmed
    })
    .await;

    let summary = match result {
        Ok(summary) => summary,
        Err(BatchError::Declined) => {
            if !quiet {
                eprintln!("Cancelled by user");
            }
            return Ok(ExitCode::SUCCESS);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Cannot convert {}", directory.display()));
        }
    };

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
        );
    } else if !quiet {
        print_summary(&summary, log_path.as_deref());
    }

    if summary.interrupted {
        Ok(ExitCode::from(EXIT_INTERRUPTED))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

/// Map CLI args to `BatchConfig`.
fn build_config(
    cli: &Cli,
    progress: Option<ProgressCallback>,
    cancel: CancelFlag,
) -> Result<BatchConfig> {
    let mut builder = BatchConfig::builder()
        .source_extension(&cli.source_ext)
        .target_extension(&cli.target_ext)
        .export_format(&cli.export_format)
        .archive_dir_name(&cli.archive_dir)
        .application(&cli.application)
        .restart_every(cli.restart_every as usize)
        .restart_on_failure(cli.restart_on_failure)
        .call_timeout_secs(cli.timeout)
        .quit_settle_ms(cli.quit_settle_ms)
        .launch_settle_ms(cli.launch_settle_ms)
        .item_delay_ms(cli.item_delay_ms)
        .cancel_flag(cancel);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Ask for the folder interactively, accepting a drag-and-dropped path.
fn prompt_for_directory() -> Result<PathBuf> {
    eprintln!("Enter the path to the folder containing Pages documents:");
    eprintln!("(You can drag and drop the folder here)");
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read folder path")?;
    let trimmed = line.trim().trim_matches(|c| c == '\'' || c == '"');
    if trimmed.is_empty() {
        anyhow::bail!("No folder given");
    }
    Ok(PathBuf::from(trimmed))
}

fn confirm(plan: &BatchPlan, archive_dir: &str, quiet: bool) -> bool {
    if !quiet {
        eprintln!();
        eprintln!(
            "This will convert {} documents ({} already processed will be skipped).",
            bold(&plan.pending.len().to_string()),
            plan.already_processed()
        );
        eprintln!("Original files will be moved to '{archive_dir}' subfolders.");
    }
    eprint!("\nContinue? (y/n): ");
    io::stderr().flush().ok();

    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Ceiling for the quit attempt made on a forced exit.
const FORCED_QUIT_TIMEOUT: Duration = Duration::from_secs(5);

/// First Ctrl-C: finish the current document, then stop. Second: ask the
/// application to quit and exit now.
fn install_interrupt_handler(cancel: CancelFlag, application: String, quiet: bool) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        if !quiet {
            eprintln!(
                "\n{} Interrupted: finishing the current document, then quitting the application…",
                cyan("⚠")
            );
        }
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            if !quiet {
                eprintln!("\n{} Forced exit: quitting {application}…", red("✘"));
            }
            quit_application(&CommandBridge::osascript(), &application).await;
            std::process::exit(i32::from(EXIT_INTERRUPTED));
        }
    });
}

/// Best-effort quit so the application is not left running unattended.
async fn quit_application<B: ScriptBridge>(bridge: &B, application: &str) -> bool {
    match bridge
        .run(&quit_script(application), FORCED_QUIT_TIMEOUT)
        .await
    {
        Ok(out) if out.success => true,
        Ok(out) => {
            tracing::warn!("Failed to quit {application}: {}", out.stderr);
            false
        }
        Err(e) => {
            tracing::warn!("Failed to quit {application}: {e}");
            false
        }
    }
}

fn print_plan(plan: &BatchPlan, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(plan).context("Failed to serialise scan")?
        );
        return Ok(());
    }
    println!("Folder:             {}", plan.root.display());
    println!("Documents found:    {}", plan.total_found());
    println!("Already converted:  {}", plan.already_converted);
    println!("Already archived:   {}", plan.already_archived);
    println!("To be converted:    {}", plan.pending.len());
    for item in &plan.pending {
        println!("  {}", item.source.display());
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, log_path: Option<&Path>) {
    if summary.processed == 0 && !summary.interrupted {
        eprintln!("\n{} No new documents to convert!", green("✔"));
        eprintln!(
            "All {} documents in this folder have already been processed.",
            summary.already_converted + summary.already_archived
        );
        return;
    }

    let rule = "=".repeat(60);
    eprintln!("\n{rule}");
    if summary.interrupted {
        eprintln!("{}", bold("CONVERSION INTERRUPTED"));
    } else {
        eprintln!("{}", bold("CONVERSION COMPLETE!"));
    }
    eprintln!("Documents processed:     {}", summary.processed);
    eprintln!("Successfully converted:  {} {}", summary.converted, green("✓"));
    eprintln!("Errors:                  {} {}", summary.failed, red("✗"));
    if summary.archive_failures > 0 {
        eprintln!("Originals not archived:  {}", summary.archive_failures);
    }
    eprintln!("Restarts:                {}", summary.restarts);
    eprintln!(
        "Elapsed:                 {:.1}s",
        summary.elapsed_ms as f64 / 1000.0
    );

    let problems: Vec<_> = summary.problems().collect();
    if !problems.is_empty() {
        eprintln!("\nNeeds attention:");
        for outcome in problems {
            let reason = outcome
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();
            eprintln!("  {} {}", red("✗"), outcome.source.display());
            eprintln!("    {}", dim(&reason));
        }
    }

    if let Some(path) = log_path {
        eprintln!("\nLog file: {}", path.display());
    }
    eprintln!("{rule}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pages2docx::pipeline::bridge::BridgeError;
    use pages2docx::ScriptOutput;

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["pages2docx", "/tmp/docs"]);
        assert_eq!(cli.directory, Some(PathBuf::from("/tmp/docs")));
        assert_eq!(cli.restart_every, 5);
        assert_eq!(cli.timeout, 300);
        assert!(!cli.yes);
    }

    /// Records scripts and replies with a fixed exit status.
    struct RecordingBridge {
        scripts: std::sync::Mutex<Vec<String>>,
        success: bool,
    }

    impl ScriptBridge for RecordingBridge {
        async fn run(&self, script: &str, _timeout: Duration) -> Result<ScriptOutput, BridgeError> {
            self.scripts.lock().unwrap().push(script.to_string());
            Ok(ScriptOutput {
                success: self.success,
                code: Some(if self.success { 0 } else { 1 }),
                stdout: String::new(),
                stderr: if self.success { String::new() } else { "not running".into() },
            })
        }
    }

    #[tokio::test]
    async fn forced_exit_asks_application_to_quit() {
        let bridge = RecordingBridge {
            scripts: Default::default(),
            success: true,
        };
        assert!(quit_application(&bridge, "Keynote").await);
        assert_eq!(
            *bridge.scripts.lock().unwrap(),
            [r#"tell application "Keynote" to quit"#]
        );
    }

    #[tokio::test]
    async fn forced_exit_tolerates_failed_quit() {
        let bridge = RecordingBridge {
            scripts: Default::default(),
            success: false,
        };
        assert!(!quit_application(&bridge, "Pages").await);
        assert_eq!(bridge.scripts.lock().unwrap().len(), 1);
    }

    #[test]
    fn cli_rejects_zero_cadence() {
        assert!(Cli::try_parse_from(["pages2docx", "--restart-every", "0", "/tmp"]).is_err());
    }

    #[test]
    fn build_config_maps_flags() {
        let cli = Cli::parse_from([
            "pages2docx",
            "--restart-every",
            "2",
            "--restart-on-failure",
            "--target-ext",
            ".pdf",
            "--export-format",
            "PDF",
            "/tmp/docs",
        ]);
        let config = build_config(&cli, None, CancelFlag::new()).unwrap();
        assert_eq!(config.restart_policy.every, 2);
        assert!(config.restart_policy.on_failure);
        assert_eq!(config.target_extension, "pdf");
        assert_eq!(config.export_format, "PDF");
    }
}
