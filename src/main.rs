//! pgscope - diagnostic inspection of a running PostgreSQL server.

mod cli;

use cli::{Cli, Command};
use pgscope::config::Config;
use pgscope::db::types::DiagnosticRow;
use pgscope::error::{Error, Result};
use pgscope::inspect::{ActivityFilter, DbInspector};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    pgscope::logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!(category = e.category(), "{e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    let config = Config::load_from_file(&config_path)?;

    let connection = cli.resolve_connection(&config)?;
    info!("Connecting to {}", connection.display_string());

    let mut inspector = DbInspector::connect(&cli.target, &connection)
        .await?
        .with_ranking(cli.resolve_ranking(&config));

    let result = dispatch(&cli.command, &mut inspector).await;

    // The connection is released on every exit path, error or not.
    inspector.close().await?;
    result
}

async fn dispatch<E: pgscope::db::Executor>(
    command: &Command,
    inspector: &mut DbInspector<E>,
) -> Result<()> {
    match command {
        Command::Activity {
            include_self,
            pid,
            state,
        } => {
            let filter = ActivityFilter {
                include_self: *include_self,
                pids: if pid.is_empty() {
                    None
                } else {
                    Some(pid.clone())
                },
                states: if state.is_empty() {
                    None
                } else {
                    Some(state.clone())
                },
            };
            print_rows(&inspector.activity(&filter).await?)
        }
        Command::Locks { limit } => print_rows(&inspector.lock_info(*limit).await?),
        Command::Settings { name } => {
            let filter = if name.is_empty() {
                None
            } else {
                Some(name.as_slice())
            };
            print_rows(&inspector.settings(filter).await?)
        }
        Command::Statements => print_rows(&inspector.statement_stats().await?),
        Command::Version => {
            let version = inspector.server_version().await?;
            println!("{version}");
            Ok(())
        }
        Command::Extension { name } => {
            let status = inspector.validate_extension(name).await?;
            print_json(&status)
        }
        Command::Explain { statement } => print_rows(&inspector.explain(statement).await?),
    }
}

fn print_rows(rows: &[DiagnosticRow]) -> Result<()> {
    print_json(&rows)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| Error::internal(format!("failed to serialize output: {e}")))?;
    println!("{rendered}");
    Ok(())
}
