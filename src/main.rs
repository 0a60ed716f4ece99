use anyhow::{Context, Result};
use clap::Parser;
use dupwatch::config::{AppConfig, ReportConfig};
use dupwatch::core::ledger::DirectoryLedger;
use dupwatch::database::{default_database_path, Database};
use dupwatch::logging::{self, LogSettings};
use dupwatch::services::{Culler, IngestionLoop, PerceptualOracle, ReportWriter};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "dupwatch",
    version,
    about = "Watch a folder of image submissions and record near-duplicate pairs"
)]
struct Cli {
    /// Directory whose subdirectories are the submissions to watch
    #[arg(short, long, value_name = "DIR")]
    dir: PathBuf,

    /// SQLite database file (default: per-user data directory)
    #[arg(long, value_name = "PATH", env = "DATABASE_URL")]
    database: Option<PathBuf>,

    /// Seconds to wait between polls when nothing is pending
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    poll_interval: u64,

    /// Maximum Hamming distance (of 64 bits) for two images to count as duplicates
    #[arg(long, value_name = "N", default_value_t = 10)]
    max_distance: u32,

    /// Also look for images in nested folders of each submission
    #[arg(short, long)]
    recursive: bool,

    /// Delete one image of every duplicate pair without asking
    #[arg(long)]
    delete: bool,

    /// Write JSON documents and an archive for every processed submission
    #[arg(long)]
    report: bool,

    /// Where reports are written
    #[arg(long, value_name = "DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Produce an image showing the duplicate pairs (implies --report)
    #[arg(short = 'i', long)]
    output_image: bool,

    /// Write logs to a file instead of stderr
    #[arg(long)]
    log: bool,

    /// Log file used with --log
    #[arg(long, value_name = "PATH", default_value = "dupwatch.log")]
    log_file: PathBuf,

    /// Log debug information
    #[arg(long)]
    debug: bool,
}

impl Cli {
    fn log_settings(&self) -> LogSettings {
        LogSettings::new(self.debug, self.log.then(|| self.log_file.clone()))
    }

    fn into_config(self) -> AppConfig {
        let report = (self.report || self.output_image).then(|| ReportConfig {
            output_dir: self.output_dir,
            visual: self.output_image,
        });

        AppConfig {
            watch_dir: self.dir,
            database_path: self.database,
            poll_interval_secs: self.poll_interval,
            max_distance: self.max_distance,
            recursive: self.recursive,
            delete_duplicates: self.delete,
            report,
            ..AppConfig::default()
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_settings = cli.log_settings();
    if let Err(e) = logging::init(&log_settings) {
        eprintln!("Failed to set up logging: {}", e);
    }

    match run(cli.into_config()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            if log_settings.file.is_some() {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(1)
        }
    }
}

fn run(config: AppConfig) -> Result<()> {
    let ledger = DirectoryLedger::open(&config.watch_dir)
        .with_context(|| format!("Cannot watch {}", config.watch_dir.display()))?;

    let database_path = match &config.database_path {
        Some(path) => path.clone(),
        None => default_database_path()?,
    };
    let db = Database::open(&database_path).context("Error connecting to the database")?;

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        log::warn!("Interrupt received, finishing up");
        handler_flag.store(true, Ordering::Relaxed);
    })
    .context("Failed to install Ctrl-C handler")?;

    let oracle =
        PerceptualOracle::new(config.scan_options(), config.max_distance).with_progress(true);

    let mut ingest = IngestionLoop::new(ledger, &db, oracle, cancel)
        .with_poll_interval(config.poll_interval());
    if config.delete_duplicates {
        ingest = ingest.with_culler(Culler::new());
    }
    if let Some(report) = &config.report {
        ingest = ingest.with_reporter(ReportWriter::new(&report.output_dir).with_visual(report.visual));
    }

    ingest.run();
    Ok(())
}
