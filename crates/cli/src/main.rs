mod service;

use clap::{Parser, Subcommand};
use mirrorwatch_core::bootstrap::ensure_directories;
use mirrorwatch_core::config::AppConfig;
use mirrorwatch_reports::ReportScheduler;
use mirrorwatch_watchman::Watchman;
use service::MirrorService;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// How often the host loop checks for a stop request.
const SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "MirrorWatch - mirrors new files and reports daily", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the mirroring service until interrupted
    Start,
    /// Generate today's report once and exit
    Report,
    /// Copy files that are not yet mirrored and exit
    Backfill,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AppConfig::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("❌ Error: Configuration invalid: {}", e);
            eprintln!("   Check mirrorwatch.toml and the WATCH_DIR / MIRROR_DIR / REPORT_DIR variables.");
            std::process::exit(1);
        }
    };

    let service_mode = matches!(args.command, Some(Commands::Start) | None);
    let _guard = init_logging(service_mode, &config.log_file());

    mirrorwatch_core::init();

    match args.command {
        Some(Commands::Start) | None => run_service(&config).await,
        Some(Commands::Report) => {
            ensure_directories(&config);
            println!("📊 Generating report for {}", config.mirror_path().display());
            match ReportScheduler::from_config(&config).fire().await {
                Some(path) => println!("✅ Report created: {}", path.display()),
                None => println!("⏸️ No report created (mirror empty or generation failed, see log)"),
            }
        }
        Some(Commands::Backfill) => {
            ensure_directories(&config);
            match Watchman::from_config(&config).backfill().await {
                Ok(summary) => println!(
                    "✅ Backfill: {} copied, {} already mirrored, {} failed",
                    summary.copied, summary.skipped, summary.failed
                ),
                Err(e) => {
                    error!("Backfill failed: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

async fn run_service(config: &AppConfig) {
    let stop_requested = Arc::new(AtomicBool::new(false));
    tokio::spawn({
        let stop_requested = stop_requested.clone();
        async move {
            shutdown_signal().await;
            stop_requested.store(true, Ordering::SeqCst);
        }
    });

    let handle = MirrorService::start(config);

    while !stop_requested.load(Ordering::SeqCst) {
        tokio::time::sleep(SHUTDOWN_POLL_INTERVAL).await;
    }

    info!("🛑 Shutdown requested");
    handle.stop().await;
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Service mode appends to the log file; one-shot commands log to stderr.
fn init_logging(service_mode: bool, log_file: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if service_mode {
        if let Some(dir) = log_file.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
        {
            Ok(file) => {
                let (non_blocking, guard) = tracing_appender::non_blocking(file);
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .init();
                return Some(guard);
            }
            Err(e) => eprintln!(
                "⚠️ Cannot open log file {}: {}; logging to stderr",
                log_file.display(),
                e
            ),
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .init();
    None
}
