//! Command-line front end for the forensic timeline engine.
//!
//! Every subcommand is a cold start: it imports its source file(s) into a
//! throwaway in-process tab registry, runs one operation, and prints JSON
//! to stdout. This is the "external collaborator" a desktop UI shell would
//! otherwise be, reduced to the operations the engine actually exposes.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "timeline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Forensic timeline ingestion, query, and analytics engine")]
struct Cli {
    /// Path to a TOML config file overriding batch-size and cap defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a file and report the resulting row count.
    Import {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
    },

    /// Windowed, filtered, sorted row fetch.
    Query {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        /// Path to a JSON-encoded FilterModel.
        #[arg(long)]
        filter: Option<PathBuf>,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        desc: bool,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Day/hour event-count histogram over a timestamp column.
    Histogram {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
        #[arg(long)]
        column: String,
        #[arg(long)]
        hourly: bool,
    },

    /// Silent-gap and contiguous-activity session detection.
    Gaps {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
        #[arg(long)]
        column: String,
        #[arg(long, default_value_t = 30)]
        threshold_minutes: i64,
    },

    /// Burst-window detection relative to a rolling baseline.
    Bursts {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
        #[arg(long)]
        column: String,
        #[arg(long, default_value_t = 10)]
        window_minutes: i64,
        #[arg(long, default_value_t = 3.0)]
        multiplier: f64,
    },

    /// Per-source event count and timestamp range.
    Coverage {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
        #[arg(long)]
        source_column: String,
        #[arg(long)]
        timestamp_column: String,
    },

    /// Group-by value stacking on one column.
    Stack {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
        #[arg(long)]
        column: String,
    },

    /// Indicator-of-compromise substring/regex matching across all columns.
    Ioc {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
        /// One or more patterns to match (substrings or regexes).
        #[arg(long = "pattern", required = true)]
        patterns: Vec<String>,
    },

    /// Process-ancestry tree reconstruction with taxonomy flagging.
    ProcessTree {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
    },

    /// Lateral-movement graph reconstruction.
    Lateral {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
        #[arg(long = "event-id")]
        event_ids: Vec<String>,
    },

    /// RDP session lifecycle correlation.
    Rdp {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
    },

    /// Persistence-mechanism scanning (event log or registry export).
    Persistence {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
    },

    /// Export the filtered row set to CSV, TSV, or XLSX.
    Export {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        filter: Option<PathBuf>,
        #[arg(long, value_parser = ["csv", "tsv", "xlsx"])]
        format: String,
        #[arg(long)]
        output: PathBuf,
    },

    /// Render a standalone HTML summary report.
    Report {
        file: PathBuf,
        #[arg(long)]
        sheet: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        output: PathBuf,
    },

    /// Project several source files into one merged timeline.
    Merge {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        #[arg(long)]
        timestamp_column: String,
        #[arg(long, default_value = "merged")]
        name: String,
    },

    /// Re-import every tab named in a session file.
    SessionRestore { session: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Import { file, sheet } => {
            let registry = std::sync::Arc::new(timeline_core::tab::TabRegistry::new());
            let tab_id = commands::import_tab(&registry, &config, "import", &file, sheet.as_deref()).await?;
            let tab = registry.get(tab_id)?;
            println!("{{\"tab_id\": \"{}\", \"rows\": {}}}", tab.id, tab.store.row_count()?);
        }
        Commands::Query { file, sheet, filter, sort, desc, offset, limit } => {
            commands::cmd_query(&config, &file, sheet.as_deref(), filter.as_deref(), sort.as_deref(), desc, offset, limit).await?;
        }
        Commands::Histogram { file, sheet, filter, column, hourly } => {
            commands::cmd_histogram(&config, &file, sheet.as_deref(), filter.as_deref(), &column, hourly).await?;
        }
        Commands::Gaps { file, sheet, filter, column, threshold_minutes } => {
            commands::cmd_gaps(&config, &file, sheet.as_deref(), filter.as_deref(), &column, threshold_minutes).await?;
        }
        Commands::Bursts { file, sheet, filter, column, window_minutes, multiplier } => {
            commands::cmd_bursts(&config, &file, sheet.as_deref(), filter.as_deref(), &column, window_minutes, multiplier).await?;
        }
        Commands::Coverage { file, sheet, filter, source_column, timestamp_column } => {
            commands::cmd_coverage(&config, &file, sheet.as_deref(), filter.as_deref(), &source_column, &timestamp_column).await?;
        }
        Commands::Stack { file, sheet, filter, column } => {
            commands::cmd_stack(&config, &file, sheet.as_deref(), filter.as_deref(), &column).await?;
        }
        Commands::Ioc { file, sheet, filter, patterns } => {
            commands::cmd_ioc(&config, &file, sheet.as_deref(), filter.as_deref(), &patterns).await?;
        }
        Commands::ProcessTree { file, sheet, filter } => {
            commands::cmd_process_tree(&config, &file, sheet.as_deref(), filter.as_deref()).await?;
        }
        Commands::Lateral { file, sheet, filter, event_ids } => {
            commands::cmd_lateral(&config, &file, sheet.as_deref(), filter.as_deref(), &event_ids).await?;
        }
        Commands::Rdp { file, sheet, filter } => {
            commands::cmd_rdp(&config, &file, sheet.as_deref(), filter.as_deref()).await?;
        }
        Commands::Persistence { file, sheet, filter } => {
            commands::cmd_persistence(&config, &file, sheet.as_deref(), filter.as_deref()).await?;
        }
        Commands::Export { file, sheet, filter, format, output } => {
            commands::cmd_export(&config, &file, sheet.as_deref(), filter.as_deref(), &format, &output).await?;
        }
        Commands::Report { file, sheet, title, output } => {
            commands::cmd_report(&config, &file, sheet.as_deref(), title.as_deref(), &output).await?;
        }
        Commands::Merge { sources, timestamp_column, name } => {
            commands::cmd_merge(&config, &sources, &timestamp_column, &name).await?;
        }
        Commands::SessionRestore { session } => {
            commands::cmd_session_restore(&config, &session).await?;
        }
    }

    Ok(())
}
