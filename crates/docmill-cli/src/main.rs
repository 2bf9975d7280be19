//! Command-line front-end for the docmill pipeline.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docmill::db::{self, document_repo, run_repo, stats_repo};
use docmill::{Config, ConfigError, Database, DocmillError, RuleTable, Runner};

#[derive(Parser)]
#[command(
    name = "docmill",
    version,
    about = "Document content recognition pipeline",
    long_about = "Watches an inbox of office documents, images and PDFs and drives them \
                  through conversion, OCR, text extraction, line classification and \
                  tokenization, recording every step in a local SQLite store."
)]
struct Cli {
    /// Configuration file (default: ~/.docmill/config.json).
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process ready documents through the selected steps.
    Run {
        /// Step codes in any order, or "all" (the default).
        steps: Vec<String>,
    },
    /// Show document, run and step statistics.
    Status,
    /// Classification rule table maintenance.
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
}

#[derive(Subcommand)]
enum RulesCommand {
    /// Write the built-in rule table as JSON, ready for editing.
    Export {
        /// Destination file.
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Bridges `log` records into `tracing` and installs a fmt subscriber
/// honoring `RUST_LOG` (default `info`).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    tracing_log::LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

fn execute(cli: Cli) -> docmill::Result<()> {
    match cli.command {
        Commands::Run { steps } => run(cli.config.as_deref(), &steps),
        Commands::Status => status(cli.config.as_deref()),
        Commands::Rules {
            command: RulesCommand::Export { path },
        } => export_rules(&path),
    }
}

fn load_configuration(path: Option<&Path>) -> docmill::Result<Config> {
    let config = match path {
        Some(path) => docmill::load_config(path)?,
        None => docmill::config::load_or_default()?,
    };
    Ok(config)
}

fn open_database(config: &Config) -> docmill::Result<Database> {
    let path = match &config.database_path {
        Some(path) => PathBuf::from(path),
        None => db::default_database_path().ok_or_else(|| {
            DocmillError::Config(ConfigError::Validation {
                message: "cannot determine default database path".to_string(),
            })
        })?,
    };
    Ok(Database::open(&path)?)
}

fn run(config_path: Option<&Path>, steps: &[String]) -> docmill::Result<()> {
    let selection = docmill::pipeline::parse_selection(steps)?;
    let config = load_configuration(config_path)?;
    let database = open_database(&config)?;

    let mut runner = Runner::new(database, config)?;

    // First Ctrl-C stops between documents; work in flight finishes and
    // gets recorded.
    let shutdown = runner.shutdown_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown.store(true, Ordering::SeqCst);
    }) {
        tracing::warn!("Failed to install Ctrl-C handler: {}", e);
    }

    let summary = runner.run(&selection)?;
    println!(
        "Run {}: {} selected, {} ok, {} errors, {} children created, {} still ready",
        summary.run_id,
        summary.selected,
        summary.ok,
        summary.errors,
        summary.children,
        summary.ready
    );
    Ok(())
}

fn status(config_path: Option<&Path>) -> docmill::Result<()> {
    let config = load_configuration(config_path)?;
    let database = open_database(&config)?;

    let counts = database.with_conn(document_repo::status_counts)?;
    println!("Documents by step and status:");
    if counts.is_empty() {
        println!("  (none)");
    }
    for (step, doc_status, n) in counts {
        println!("  {:<10} {:<7} {:>6}", step, doc_status, n);
    }

    let runs = database.with_conn(|conn| run_repo::recent(conn, 5))?;
    println!("\nRecent runs:");
    if runs.is_empty() {
        println!("  (none)");
    }
    for run in runs {
        println!(
            "  #{:<5} {:<10} {:<6} selected {:>4}  ok {:>4}  errors {:>4}  ready {:>4}  {}",
            run.id,
            run.selection,
            run.status,
            run.no_selected,
            run.no_ok,
            run.no_errors,
            run.no_ready,
            run.started_at
        );
    }

    let stats = database.with_conn(|conn| stats_repo::query(conn, None))?;
    println!("\nStep statistics:");
    if stats.is_empty() {
        println!("  (none)");
    }
    for row in stats {
        println!(
            "  {} {:<10} processed {:>5}  ok {:>5}  failed {:>5}  avg {:>6} ms",
            row.date,
            row.step,
            row.total_processed,
            row.total_succeeded,
            row.total_failed,
            row.avg_duration_ms
        );
    }
    Ok(())
}

fn export_rules(path: &Path) -> docmill::Result<()> {
    RuleTable::builtin().export(path)?;
    println!("Rule table written to {}", path.display());
    Ok(())
}
