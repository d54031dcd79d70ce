//! askrunner CLI.
//!
//! Reads a list of questions from a CSV file, drives them one at a time
//! through a chat-style web page, and writes the captured answers back out
//! as CSV or JSON.
//!
//! Usage examples:
//!   Launch a local browser:
//!     $ ASKRUNNER_CHROME_BIN=/path/to/chrome \
//!       cargo run --bin askrunner -- run --questions questions.csv --out answers.csv
//!   Attach to a running browser:
//!     $ cargo run --bin askrunner -- run --questions questions.csv \
//!       --cdp-url ws://127.0.0.1:9222/devtools/browser/... --out answers.csv

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use askrunner::config::{EngineConfig, SelectorSet, Verbosity};
use askrunner::engine::{AutomationEngine, RunContext};
use askrunner::export;
use askrunner::logging::RunnerLogger;
use askrunner::page::ChromiumSurface;
use askrunner::runner::BatchRunner;
use askrunner::runtime::{ChromiumRuntime, LaunchPlan, LocalLaunchOptions};
use clap::{Args, Parser, Subcommand};
use log::info;
use tokio::fs;

#[derive(Parser)]
#[command(
    name = "askrunner",
    author,
    version,
    about = "Batch question runner for chat-style web UIs"
)]
struct Cli {
    /// Increase log verbosity (pass multiple times for DEBUG).
    #[arg(long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a batch of questions against a page and capture the answers.
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// CSV file containing the questions.
    #[arg(long)]
    questions: PathBuf,

    /// Question column, by header name or zero-based index.
    #[arg(long)]
    column: Option<String>,

    /// Page URL to open.
    #[arg(long, default_value = "https://www.perplexity.ai")]
    url: String,

    /// Selector profile JSON file; defaults cover common chat UIs.
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Resume the batch from this question index.
    #[arg(long, default_value_t = 0)]
    start_at: usize,

    /// Override the pause between cycles, in milliseconds.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Chrome/Chromium binary for a local launch.
    #[arg(long)]
    chrome_bin: Option<String>,

    /// Attach to a running browser over CDP instead of launching.
    #[arg(long, conflicts_with = "chrome_bin")]
    cdp_url: Option<String>,

    /// Show the launched browser window.
    #[arg(long)]
    show_browser: bool,

    /// Output file for the answers.
    #[arg(long, default_value = "answers.csv")]
    out: PathBuf,

    /// Write JSON instead of CSV.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_env_logger();

    let cli = Cli::parse();
    let verbosity = verbosity_from_count(cli.verbose);

    match cli.command {
        Command::Run(args) => {
            run_batch(args, verbosity).await?;
        }
    }

    Ok(())
}

async fn run_batch(args: RunArgs, verbosity: Verbosity) -> Result<()> {
    let mut config = EngineConfig::from_env().context("failed to load engine configuration")?;
    config.verbose = verbosity;
    if let Some(delay) = args.delay_ms {
        config.cycle_delay_ms = delay;
    }
    if let Some(chrome_bin) = &args.chrome_bin {
        config.chrome_executable = Some(chrome_bin.clone());
    }
    if let Some(cdp_url) = &args.cdp_url {
        config.cdp_url = Some(cdp_url.clone());
    }
    if args.show_browser {
        config.headless = false;
    }

    let csv_text = fs::read_to_string(&args.questions)
        .await
        .with_context(|| format!("failed to read {}", args.questions.display()))?;
    let questions = export::questions_from_csv(&csv_text, args.column.as_deref())
        .context("failed to extract questions from CSV")?;
    if questions.is_empty() {
        return Err(anyhow!("no questions found in {}", args.questions.display()));
    }
    info!("Loaded {} questions", questions.len());

    let selectors = match &args.selectors {
        Some(path) => {
            let text = fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            SelectorSet::from_json(&text).context("failed to parse selector profile")?
        }
        None => SelectorSet::default(),
    };

    let plan = match &config.cdp_url {
        Some(url) => LaunchPlan::AttachCdp { url: url.clone() },
        None => LaunchPlan::LaunchLocal(LocalLaunchOptions {
            chrome_executable: config.chrome_executable.clone(),
            headless: config.headless,
            ..Default::default()
        }),
    };

    let runtime = ChromiumRuntime::new();
    runtime
        .launch(&plan)
        .await
        .context("failed to launch browser")?;
    let page_id = runtime
        .open_page(&args.url)
        .await
        .with_context(|| format!("failed to open {}", args.url))?;
    let page = runtime
        .page(&page_id)
        .await
        .context("failed to resolve page")?
        .ok_or_else(|| anyhow!("page handle unavailable"))?;
    info!("Opened {}", args.url);

    let surface = Arc::new(ChromiumSurface::new(
        page,
        Duration::from_millis(config.mutation_poll_ms),
    ));
    let logger = Arc::new(RunnerLogger::new(config.verbose));
    let engine = AutomationEngine::new(surface, logger, config);

    let (mut ctx, stop_handle) = RunContext::resume_at(args.start_at);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested; finishing the current answer");
            stop_handle.stop();
        }
    });

    let runner = BatchRunner::new(&engine);
    let records = runner.run_all(&questions, &selectors, &mut ctx).await;
    info!("Captured {} answers", records.len());

    let output = if args.json {
        export::to_json(&records).context("failed to serialize answers")?
    } else {
        export::to_csv(&records)
    };
    fs::write(&args.out, output)
        .await
        .with_context(|| format!("failed to write {}", args.out.display()))?;
    info!("Wrote {}", args.out.display());

    runtime
        .shutdown()
        .await
        .context("failed to shut down browser runtime")?;

    Ok(())
}

fn verbosity_from_count(count: u8) -> Verbosity {
    match count {
        0 => Verbosity::Medium,
        _ => Verbosity::Detailed,
    }
}

fn init_env_logger() {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info");
        }
    }

    let _ = env_logger::Builder::from_env(env_logger::Env::default())
        .format_timestamp_secs()
        .try_init();
}
