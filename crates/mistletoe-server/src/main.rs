//! Mistletoe command-line entry point.
//!
//! # Usage
//!
//! ```bash
//! # Load users (JSON array of user records) into the store
//! mistletoe --store santa.cbor import roster.json
//!
//! # Run the round as an administrator
//! mistletoe --store santa.cbor trigger --caller admin@example.org
//!
//! # Inspect the round state
//! mistletoe --store santa.cbor status
//! ```

use std::{
    fs::File,
    io::{self, BufReader, Write},
    path::PathBuf,
    process::ExitCode,
    time::Duration,
};

use clap::{Parser, Subcommand};
use mistletoe_core::ResolverConfig;
use mistletoe_server::{
    Caller, EngineConfig, FailureReport, FileStore, PairingEngine, Store, SystemEnv, UserRecord,
};
use serde::Serialize;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Gift exchange pairing engine
#[derive(Parser, Debug)]
#[command(name = "mistletoe")]
#[command(about = "Constraint-aware gift exchange pairing")]
#[command(version)]
struct Args {
    /// Path to the store document (CBOR)
    #[arg(short, long, default_value = "mistletoe.cbor")]
    store: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import user records from a JSON array
    Import {
        /// Path to the JSON roster
        roster: PathBuf,
    },

    /// Run the pairing round
    Trigger {
        /// Authenticated caller email
        #[arg(short, long)]
        caller: Option<String>,

        /// Random shuffles before exact matching
        #[arg(long, default_value = "1000")]
        random_attempts: u32,

        /// Exact matching budget in milliseconds
        #[arg(long, default_value = "5000")]
        exact_deadline_ms: u64,

        /// Warn when a participant excludes more than this percentage of the
        /// roster
        #[arg(long, default_value = "50")]
        large_exclusion_percent: u8,

        /// Require caller emails in this domain
        #[arg(long)]
        admin_domain: Option<String>,
    },

    /// Print the round state
    Status,
}

fn write_json(value: &impl Serialize) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn run(args: Args) -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    let store = FileStore::open(&args.store);

    match args.command {
        Command::Import { roster } => {
            let reader = BufReader::new(File::open(&roster)?);
            let users: Vec<UserRecord> = serde_json::from_reader(reader)?;
            let count = users.len();
            for user in users {
                store.put_user(user)?;
            }
            tracing::info!("imported {} users into {}", count, store.path().display());
            Ok(ExitCode::SUCCESS)
        },

        Command::Trigger {
            caller,
            random_attempts,
            exact_deadline_ms,
            large_exclusion_percent,
            admin_domain,
        } => {
            let config = EngineConfig {
                resolver: ResolverConfig {
                    random_attempts,
                    exact_phase_deadline: Duration::from_millis(exact_deadline_ms),
                    large_exclusion_percent,
                },
                admin_email_domain: admin_domain,
            };
            let engine = PairingEngine::new(SystemEnv::new(), store, config);
            let caller = caller.map(Caller::new);

            match engine.trigger(caller.as_ref()) {
                Ok(report) => {
                    write_json(&report)?;
                    Ok(ExitCode::SUCCESS)
                },
                Err(e) => {
                    write_json(&FailureReport::from(&e))?;
                    Ok(ExitCode::FAILURE)
                },
            }
        },

        Command::Status => {
            write_json(&store.load_round_state()?)?;
            Ok(ExitCode::SUCCESS)
        },
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    tracing::info!("mistletoe starting with store {}", args.store.display());

    // Store access is blocking file I/O.
    tokio::task::spawn_blocking(move || run(args)).await?
}
