use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use catcare::config::{EngineConfig, DEFAULT_LOG_FILTER};
use catcare::domain::catcare::{
    CatCareCommand, CatCareCommandHandler, CatCareEvent, CommandEnvelope, RegisteredCats,
};
use catcare::event_sourcing::{EventStore, SqliteEventStore};
use catcare::metrics::Metrics;

/// Exit code for a command the aggregate refused.
const EXIT_REJECTED: u8 = 2;

#[derive(Parser)]
#[command(name = "catcare-cli")]
#[command(version, about = "Record cat registrations and weigh-ins in an event-sourced log")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// SQLite database file (overrides CATCARE_DATABASE_URL)
    #[arg(long, global = true)]
    db: Option<String>,
    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new cat
    Register {
        /// Command id, unique per cat
        #[arg(long)]
        command_id: String,
        /// Cat name
        #[arg(long, default_value = "")]
        name: String,
        /// Birth date
        #[arg(long, default_value = "")]
        birth_date: String,
        /// Aggregate id, defaults to cat-<command-id>
        #[arg(long)]
        aggregate_id: Option<String>,
        /// Fail instead of retrying unless the stream is at this version
        #[arg(long)]
        expected_version: Option<i64>,
    },
    /// Log a weight measurement for a registered cat
    LogWeight {
        /// Aggregate id of the cat
        #[arg(long)]
        aggregate_id: String,
        /// Command id, unique per cat
        #[arg(long)]
        command_id: String,
        /// Measurement timestamp
        #[arg(long, default_value = "")]
        at: String,
        /// Weight in grams
        #[arg(long, allow_negative_numbers = true)]
        grams: i32,
        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
        /// Fail instead of retrying unless the stream is at this version
        #[arg(long)]
        expected_version: Option<i64>,
    },
    /// List every registered cat
    ListRegistered,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env()?;
    if let Some(path) = cli.db.as_deref() {
        config = config.with_database_path(path);
    }

    // Logs go to stderr so command output on stdout stays parseable.
    // Override with RUST_LOG, e.g. RUST_LOG=debug
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(
            EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let metrics = Arc::new(Metrics::new()?);

    // === 1. Open the event store ===
    let store = Arc::new(
        SqliteEventStore::<CatCareEvent>::connect(&config.database_url, config.max_connections).await?,
    );

    // === 2. Rebuild the read model by replay ===
    let registered_cats = Arc::new(RegisteredCats::new());
    let replayed = store.replay(&*registered_cats).await?;
    metrics.record_replayed(replayed);
    tracing::debug!(replayed, "Read model rebuilt");

    // === 3. Run the requested command ===
    let handler = CatCareCommandHandler::new(store.clone(), metrics.clone())
        .with_projection(registered_cats.clone());

    let exit = run(cli.command, &handler, &registered_cats).await;

    if cli.metrics {
        print!("{}", metrics.render()?);
    }

    store.close().await;
    exit
}

async fn run(
    command: Commands,
    handler: &CatCareCommandHandler<SqliteEventStore<CatCareEvent>>,
    registered_cats: &RegisteredCats,
) -> Result<ExitCode> {
    let envelope = match command {
        Commands::ListRegistered => {
            let cats = registered_cats.list();
            println!("registered_cats={}", cats.len());
            for cat in cats {
                println!(
                    "- entity_id={} name={} birth_date={}",
                    cat.entity_id, cat.name, cat.birth_date
                );
            }
            return Ok(ExitCode::SUCCESS);
        }
        Commands::Register {
            command_id,
            name,
            birth_date,
            aggregate_id,
            expected_version,
        } => {
            let aggregate_id = aggregate_id.unwrap_or_else(|| format!("cat-{command_id}"));
            CommandEnvelope {
                aggregate_id,
                command: Some(CatCareCommand::Register {
                    command_id,
                    name,
                    birth_date,
                }),
                expected_version,
            }
        }
        Commands::LogWeight {
            aggregate_id,
            command_id,
            at,
            grams,
            notes,
            expected_version,
        } => CommandEnvelope {
            aggregate_id,
            command: Some(CatCareCommand::LogWeight {
                command_id,
                at,
                grams,
                notes,
            }),
            expected_version,
        },
    };

    let result = handler.handle_command(envelope).await?;

    if let Some(rejection) = result.rejection.as_ref().filter(|_| !result.ok) {
        println!("rejected: {rejection}");
        return Ok(ExitCode::from(EXIT_REJECTED));
    }

    println!("ok: version={} events={}", result.new_version, result.events.len());
    for event in &result.events {
        println!("- {}", event.summary());
    }
    Ok(ExitCode::SUCCESS)
}
