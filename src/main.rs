use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use gtfsload::{config::AppConfig, store::init_schema, Importer, LoadError, LoadSummary};
use std::{env, path::PathBuf, process::ExitCode, time::Duration};
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "gtfsload", about = "Load GTFS static archives into SQLite")]
struct Cli {
    /// SQLite database file (GTFS_DB_PATH)
    #[arg(short = 'd', long = "db", global = true)]
    db: Option<PathBuf>,

    /// DDL file executed before loading (GTFS_SCHEMA_PATH)
    #[arg(short = 's', long = "schema", global = true)]
    schema: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ensure the schema, download the archive and load it (default)
    Import(ImportArgs),
    /// Ensure the schema only
    Init,
    /// Import now and then again on a fixed interval
    Watch {
        #[command(flatten)]
        import: ImportArgs,
        #[arg(long, default_value_t = 3600)]
        interval_secs: u64,
    },
}

#[derive(Args, Debug, Default)]
struct ImportArgs {
    /// Feed category (GTFS_CATEGORY)
    #[arg(short = 'c', long)]
    category: Option<String>,

    /// Rows per write (GTFS_BATCH_SIZE)
    #[arg(long)]
    batch_size: Option<usize>,

    /// Print the load summary as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(log_level.parse().unwrap_or(Level::INFO.into())),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        match e.downcast_ref::<LoadError>().and_then(LoadError::table) {
            Some(table) => error!(table, "GTFS static import failed: {:#}", e),
            None => error!("GTFS static import failed: {:#}", e),
        }
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

async fn run(cli: Cli) -> Result<()> {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    let mut config = AppConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(schema) = cli.schema {
        config.schema_path = schema;
    }

    init_schema(&config.db_path, &config.schema_path).context("initializing database")?;

    match cli.command.unwrap_or(Command::Import(ImportArgs::default())) {
        Command::Init => {
            info!(db = %config.db_path.display(), "database initialized; skipping import step");
            Ok(())
        }
        Command::Import(args) => {
            let (config, json) = apply(config, args);
            let summary = import_once(&config).await?;
            report(&summary, json)
        }
        Command::Watch {
            import,
            interval_secs,
        } => {
            let (config, json) = apply(config, import);
            watch(&config, Duration::from_secs(interval_secs.max(1)), json).await
        }
    }
}

fn apply(mut config: AppConfig, args: ImportArgs) -> (AppConfig, bool) {
    if let Some(category) = args.category {
        config.category = category;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size.max(1);
    }
    (config, args.json)
}

async fn import_once(config: &AppConfig) -> Result<LoadSummary> {
    let importer = Importer::new(config)?;
    let summary = importer
        .import_category(&config.category)
        .await
        .with_context(|| format!("importing category {}", config.category))?;
    Ok(summary)
}

fn report(summary: &LoadSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    }
    for t in &summary.tables {
        info!(table = %t.table, rows = t.rows, batches = t.batches, mode = ?t.mode, "table loaded");
    }
    Ok(())
}

/// Runs never overlap: the next tick is awaited only after the current
/// import finished. A failed run is logged and the loop carries on.
async fn watch(config: &AppConfig, every: Duration, json: bool) -> Result<()> {
    let mut ticker = time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval = ?every, category = %config.category, "watching");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted; stopping");
                return Ok(());
            }
        }

        info!("starting scheduled GTFS import");
        match import_once(config).await {
            Ok(summary) => {
                report(&summary, json)?;
                info!(rows = summary.total_rows(), "scheduled import finished");
            }
            Err(e) => error!("scheduled import failed: {:#}", e),
        }
    }
}
