//! Stockplan - Command-line interface for the report backend.
//!
//! Lists stores and product groups, generates a report with live progress
//! (Ctrl-C cancels), and runs per-store fan-out or batch processing.
//! Data goes to stdout; progress and logs go to stderr.

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use engine::{
    fanout::log_event, load_product_groups, load_stores, process_batch, render_progress,
    spawn_fan_out, ArtifactSink, ClientConfig, DirectorySink, FanOutEvent, HttpBackend,
    JobController, JobEventKind, JobOutcome, ProductGroup, ProgressStatus, ReportBackend,
    ReportForm,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stockplan - stock planning report client
#[derive(Parser, Debug)]
#[command(name = "stockplan")]
#[command(version = "0.1.0")]
#[command(about = "Generate stock planning reports from the report backend")]
struct Args {
    /// Backend base URL (overrides STOCKPLAN_BACKEND_URL)
    #[arg(long, value_name = "URL", global = true)]
    backend_url: Option<String>,

    /// Enable verbose output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the stores reports can be generated for
    Stores,
    /// Show the product group tree
    Groups,
    /// Generate a report for one store and save the workbook
    Report(ReportArgs),
    /// Process stores one at a time with a pause between them
    FanOut(ProcessArgs),
    /// Process all stores in a single backend request
    Batch(ProcessArgs),
}

#[derive(clap::Args, Debug)]
struct ReportArgs {
    /// First day of the report period
    #[arg(long, value_name = "YYYY-MM-DD")]
    start_date: String,

    /// Last day of the report period
    #[arg(long, value_name = "YYYY-MM-DD")]
    end_date: String,

    /// Store id (see `stockplan stores`)
    #[arg(long, value_name = "ID")]
    store: String,

    /// Planning horizon in days
    #[arg(long, value_name = "DAYS", default_value = "30")]
    planning_days: String,

    /// Restrict the report to a product group; repeat for several
    #[arg(long = "group", value_name = "ID")]
    groups: Vec<String>,

    /// Directory for the workbook (overrides STOCKPLAN_OUTPUT_DIR)
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct ProcessArgs {
    /// Comma-separated store ids
    #[arg(long, value_name = "IDS", value_delimiter = ',', required = true)]
    stores: Vec<String>,

    /// First day of the period
    #[arg(long, value_name = "YYYY-MM-DD")]
    start_date: String,

    /// Last day of the period
    #[arg(long, value_name = "YYYY-MM-DD")]
    end_date: String,

    /// Planning horizon in days
    #[arg(long, value_name = "DAYS", default_value = "30")]
    planning_days: String,

    /// Sales search window in days
    #[arg(long, value_name = "DAYS", default_value = "30")]
    search_days: String,
}

impl ProcessArgs {
    fn form(&self) -> ReportForm {
        ReportForm {
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            planning_days: self.planning_days.clone(),
            search_days: self.search_days.clone(),
            ..ReportForm::default()
        }
    }

    fn store_ids(&self) -> Vec<String> {
        self.stores
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// How a command ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunStatus {
    Done,
    Cancelled,
}

/// Progress line renderer for report generation.
struct CliProgress {
    verbose: bool,
    start_time: Instant,
    last_status: Option<ProgressStatus>,
}

impl CliProgress {
    fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
            last_status: None,
        }
    }

    fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    fn progress_bar(percent: u8) -> String {
        let filled = (percent.min(100) / 5) as usize;
        let empty = 20 - filled;
        format!("[{}{}]", "=".repeat(filled), " ".repeat(empty))
    }

    fn line(status: Option<ProgressStatus>) -> String {
        let percent = status.and_then(|s| s.percent()).unwrap_or(0);
        format!("{} {}", Self::progress_bar(percent), render_progress(status))
    }

    fn update(&mut self, status: ProgressStatus) {
        // Only redraw on change; the backend is polled every second.
        if self.last_status == Some(status) {
            return;
        }
        self.last_status = Some(status);
        eprint!("\r{}", Self::line(Some(status)));
        let _ = std::io::stderr().flush();
    }

    fn poll_failed(&self, message: &str) {
        if self.verbose {
            eprintln!("\nStatus check failed: {}", message);
        }
    }

    fn finish(&self) {
        if self.last_status.is_some() {
            eprintln!();
        }
        eprintln!("Elapsed: {}", Self::format_duration(self.start_time.elapsed()));
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "stockplan=debug,engine=debug"
    } else {
        "stockplan=warn,engine=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Parse arguments, run the command, and exit with its status.
#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(args.verbose);

    let exit_code = match run_cli(&args).await {
        Ok(RunStatus::Done) => 0,
        Ok(RunStatus::Cancelled) => 130,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            2
        }
    };

    std::process::exit(exit_code);
}

fn load_config(args: &Args) -> Result<ClientConfig, String> {
    let mut config = ClientConfig::from_env().map_err(|e| format!("Configuration error: {}", e))?;
    if let Some(url) = &args.backend_url {
        config.backend_url = url.trim_end_matches('/').to_string();
    }
    if let Command::Report(report) = &args.command {
        if let Some(output) = &report.output {
            config.output_dir = output.clone();
        }
    }
    Ok(config)
}

/// Main CLI logic - separated for testability
async fn run_cli(args: &Args) -> Result<RunStatus, String> {
    let config = load_config(args)?;
    let backend = Arc::new(HttpBackend::from_config(&config));
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let mut stdout = std::io::stdout();

    match &args.command {
        Command::Stores => list_stores(backend.as_ref(), &mut stdout).await,
        Command::Groups => list_groups(backend.as_ref(), &mut stdout).await,
        Command::Report(report) => {
            let form = ReportForm {
                start_date: report.start_date.clone(),
                end_date: report.end_date.clone(),
                store_id: report.store.clone(),
                planning_days: report.planning_days.clone(),
                product_groups: report.groups.clone(),
                ..ReportForm::default()
            };
            let mut controller = JobController::new(
                backend,
                DirectorySink::new(&config.output_dir),
                config.poll_interval,
            );
            run_report(&mut controller, &form, args.verbose, shutdown).await
        }
        Command::FanOut(process) => {
            run_fan_out(backend, process, config.fan_out_delay, &mut stdout, shutdown).await
        }
        Command::Batch(process) => run_batch(backend.as_ref(), process, &mut stdout).await,
    }
}

async fn list_stores<B: ReportBackend>(
    backend: &B,
    out: &mut impl Write,
) -> Result<RunStatus, String> {
    let loaded = load_stores(backend).await;
    if let Some(notice) = loaded.notice {
        return Err(notice);
    }

    for store in &loaded.items {
        writeln!(out, "{}\t{}", store.id, store.name).map_err(|e| e.to_string())?;
    }
    Ok(RunStatus::Done)
}

async fn list_groups<B: ReportBackend>(
    backend: &B,
    out: &mut impl Write,
) -> Result<RunStatus, String> {
    let loaded = load_product_groups(backend).await;
    if let Some(notice) = loaded.notice {
        return Err(notice);
    }

    for row in ProductGroup::flatten(&loaded.items) {
        writeln!(out, "{}\t{}", row.group.id, row.label()).map_err(|e| e.to_string())?;
    }
    Ok(RunStatus::Done)
}

/// Submit one report job and follow it until it ends or `shutdown` fires.
async fn run_report<B, S>(
    controller: &mut JobController<B, S>,
    form: &ReportForm,
    verbose: bool,
    shutdown: impl Future<Output = ()>,
) -> Result<RunStatus, String>
where
    B: ReportBackend + 'static,
    S: ArtifactSink,
{
    let params = form.to_report_params().map_err(|e| e.to_string())?;

    eprintln!("Generating report...");
    eprintln!("  Store: {}", params.store_id);
    eprintln!("  Period: {} .. {}", params.start_date, params.end_date);
    eprintln!("  Planning days: {}", params.planning_days);
    if !params.product_groups.is_empty() {
        eprintln!("  Product groups: {}", params.product_groups.join(", "));
    }

    let mut run = controller
        .submit(params)
        .ok_or_else(|| "A report is already being generated".to_string())?;
    let mut progress = CliProgress::new(verbose);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                if let Some(outcome) = controller.cancel() {
                    progress.finish();
                    eprintln!("{}", outcome.message());
                }
                // Wait for the backend to be told before exiting.
                let _ = (&mut run.handle).await;
                return Ok(RunStatus::Cancelled);
            }
            event = run.events.recv() => {
                let Some(event) = event else {
                    return Err("Report job ended without a result".to_string());
                };
                match &event.kind {
                    JobEventKind::Progress(status) => progress.update(*status),
                    JobEventKind::PollFailed(message) => progress.poll_failed(message),
                    _ => {}
                }
                if let Some(outcome) = controller.handle_event(event) {
                    progress.finish();
                    return report_outcome(outcome);
                }
            }
        }
    }
}

fn report_outcome(outcome: JobOutcome) -> Result<RunStatus, String> {
    match outcome {
        JobOutcome::Saved { path, message } => {
            eprintln!("{}", message);
            println!("{}", path.display());
            Ok(RunStatus::Done)
        }
        JobOutcome::Completed { message } => {
            eprintln!("{}", message);
            Ok(RunStatus::Done)
        }
        JobOutcome::Cancelled { message } => {
            eprintln!("{}", message);
            Ok(RunStatus::Cancelled)
        }
        JobOutcome::Failed { message } => Err(message),
    }
}

/// Walk the stores one by one, printing each event as it arrives.
async fn run_fan_out<B>(
    backend: Arc<B>,
    process: &ProcessArgs,
    delay: Duration,
    out: &mut impl Write,
    shutdown: impl Future<Output = ()>,
) -> Result<RunStatus, String>
where
    B: ReportBackend + 'static,
{
    let params = process.form().to_process_params().map_err(|e| e.to_string())?;
    let store_ids = process.store_ids();
    let total = store_ids.len();

    let cancel = CancellationToken::new();
    let mut fan_out = spawn_fan_out(backend, store_ids, params, delay, cancel.clone());
    tokio::pin!(shutdown);
    let mut stopping = false;

    loop {
        tokio::select! {
            _ = &mut shutdown, if !stopping => {
                eprintln!("Stopping after the current store...");
                cancel.cancel();
                stopping = true;
            }
            event = fan_out.events.recv() => {
                let Some(event) = event else { break };
                log_event(&event);
                let line = match &event {
                    FanOutEvent::Processing { store_id } => format!("processing\t{}", store_id),
                    FanOutEvent::WarehouseComplete { store_id } => format!("done\t{}", store_id),
                    FanOutEvent::Error { store_id, message } => {
                        format!("error\t{}\t{}", store_id, message)
                    }
                    FanOutEvent::Complete => "complete".to_string(),
                    FanOutEvent::Cancelled { processed } => format!("cancelled\t{}", processed),
                };
                writeln!(out, "{}", line).map_err(|e| e.to_string())?;
            }
        }
    }

    let summary = fan_out
        .handle
        .await
        .map_err(|e| format!("Fan-out task failed: {}", e))?;

    eprintln!(
        "Summary: {} done, {} failed, {} total",
        summary.succeeded, summary.failed, total
    );

    if summary.cancelled {
        Ok(RunStatus::Cancelled)
    } else if summary.failed > 0 {
        Err(format!("{} of {} stores failed", summary.failed, total))
    } else {
        Ok(RunStatus::Done)
    }
}

async fn run_batch<B: ReportBackend>(
    backend: &B,
    process: &ProcessArgs,
    out: &mut impl Write,
) -> Result<RunStatus, String> {
    let params = process.form().to_process_params().map_err(|e| e.to_string())?;
    let response = process_batch(backend, process.store_ids(), params)
        .await
        .map_err(|e| format!("Batch processing failed: {}", e))?;

    let pretty = serde_json::to_string_pretty(&response).map_err(|e| e.to_string())?;
    writeln!(out, "{}", pretty).map_err(|e| e.to_string())?;
    Ok(RunStatus::Done)
}
