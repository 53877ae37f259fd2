//! Sightline CLI
//!
//! Developer tool for experimenting with the query compiler and aggregator:
//! - Compile a JSON query request into SQL for a dialect
//! - Run filter and path expressions over JSON rows
//! - Pre-aggregate JSON rows into time buckets, in one batch or as a stream
//! - Print a default config file

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sightline::aggregator::{spawn_flush_task, AggregatedRow, MetricSchema, StreamingAggregator};
use sightline::config::{generate_default_config, Config, LoggingConfig};
use sightline::dialect::Dialect;
use sightline::filter::{compile_path, FilterCompiler};
use sightline::plan::{PhysicalPlanner, QueryRequest};
use sightline::row::Value;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Row = HashMap<String, Value>;

#[derive(Parser)]
#[command(name = "sightline")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Metric query compiler and streaming aggregator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search the standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compile a JSON query request into SQL
    Sql {
        /// Request file, `-` for stdin
        #[arg(default_value = "-")]
        request: PathBuf,
        /// Target dialect (h2, mysql, clickhouse); overrides the config
        #[arg(short, long)]
        dialect: Option<Dialect>,
    },

    /// Print the JSON rows matching a filter
    Filter {
        /// Filter text, e.g. "status >= 500 AND method = 'GET'"
        expression: String,
        /// JSON array of rows, `-` for stdin
        #[arg(short, long, default_value = "-")]
        rows: PathBuf,
        /// Log every comparison
        #[arg(long)]
        debug: bool,
    },

    /// Extract a nested value from each JSON row
    Path {
        /// Path text, e.g. "tags['host'].name"
        expression: String,
        /// JSON array of rows, `-` for stdin
        #[arg(short, long, default_value = "-")]
        rows: PathBuf,
    },

    /// Aggregate JSON rows into time buckets
    Aggregate {
        /// JSON metric schema
        #[arg(short, long)]
        schema: PathBuf,
        /// JSON array of rows, `-` for stdin
        #[arg(short, long, default_value = "-")]
        rows: PathBuf,
        /// Bucket width; overrides the config
        #[arg(short, long)]
        granularity_ms: Option<i64>,
        /// Read newline-delimited rows from stdin and flush on the
        /// configured interval until EOF
        #[arg(long)]
        stream: bool,
    },

    /// Print a default config file
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    match cli.command {
        Commands::Sql { request, dialect } => {
            let request: QueryRequest = serde_json::from_str(&read_input(&request)?)
                .context("Invalid query request")?;

            let mut planner_config = config.planner.clone();
            if let Some(dialect) = dialect {
                planner_config.dialect = dialect;
            }
            let planner = PhysicalPlanner::from_config(&planner_config);
            let plan = request.to_logical_plan(&planner_config.timestamp_column)?;

            tracing::info!(dialect = %planner_config.dialect, table = %request.table, "Compiling query");
            println!("{}", planner.to_sql(&plan)?);
        }

        Commands::Filter {
            expression,
            rows,
            debug,
        } => {
            let predicate = FilterCompiler::new().debug(debug).compile(&expression)?;
            let rows = read_rows(&rows)?;
            let total = rows.len();

            let mut matched = 0;
            for row in rows.iter().filter(|r| predicate.evaluate(*r)) {
                println!("{}", serde_json::to_string(row)?);
                matched += 1;
            }
            tracing::info!("{} of {} rows matched", matched, total);
        }

        Commands::Path { expression, rows } => {
            let path = compile_path(&expression)?;
            for row in read_rows(&rows)? {
                match path.evaluate(&row) {
                    Some(value) => println!("{}", serde_json::to_string(value)?),
                    None => println!("null"),
                }
            }
        }

        Commands::Aggregate {
            schema,
            rows,
            granularity_ms,
            stream,
        } => {
            let schema: MetricSchema =
                serde_json::from_str(&read_input(&schema)?).context("Invalid metric schema")?;
            let schema = schema.or_timestamp_column(&config.aggregator.timestamp_column);
            let granularity = granularity_ms.unwrap_or(config.aggregator.granularity_ms);
            let aggregator = StreamingAggregator::new(schema, granularity)?;

            if stream {
                stream_aggregate(aggregator, config.aggregator.flush_interval()).await?;
                return Ok(());
            }

            for row in read_rows(&rows)? {
                if let Err(e) = aggregator.aggregate(&row) {
                    tracing::warn!("Dropping row: {}", e);
                }
            }
            print_rows(aggregator.get_rows());
            if aggregator.skipped_fields() > 0 {
                tracing::warn!("{} metric values skipped", aggregator.skipped_fields());
            }
        }

        Commands::Config => {
            print!("{}", generate_default_config());
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("sightline={}", logging.level).into());

    // Logs go to stderr so stdout stays pipeable
    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Aggregate stdin rows until EOF, flushing every `flush_interval`
async fn stream_aggregate(aggregator: StreamingAggregator, flush_interval: Duration) -> Result<()> {
    let aggregator = Arc::new(aggregator);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let flush = spawn_flush_task(Arc::clone(&aggregator), flush_interval, print_rows, shutdown_rx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Row>(&line) {
            Ok(row) => {
                if let Err(e) = aggregator.aggregate(&row) {
                    tracing::warn!("Dropping row: {}", e);
                }
            }
            Err(e) => tracing::warn!("Skipping malformed row: {}", e),
        }
    }

    let _ = shutdown_tx.send(());
    flush.await.context("Flush task failed")?;
    if aggregator.skipped_fields() > 0 {
        tracing::warn!("{} metric values skipped", aggregator.skipped_fields());
    }
    Ok(())
}

fn print_rows(rows: Vec<AggregatedRow>) {
    for row in rows {
        match serde_json::to_string(&row.columns) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!("Failed to encode row: {}", e),
        }
    }
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))
    }
}

fn read_rows(path: &Path) -> Result<Vec<Row>> {
    serde_json::from_str(&read_input(path)?).context("Expected a JSON array of objects")
}
