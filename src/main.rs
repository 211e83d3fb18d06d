use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use tokio::sync::Mutex;

mod commands;
mod credential;
mod database;
mod endpoints;
mod error;
mod formatter;
mod parser;
mod settlement;
mod types;
mod validator;

use crate::commands::{execute, Command, Credentials};
use crate::database::sqlite::SqliteDatabase;

/// Keep track of shared expenses and of who owes what to whom.
#[derive(Parser, Debug)]
#[command(name = "splitledger", version, about)]
struct Args {
    /// Path of the SQLite ledger.
    #[arg(long, env = "SPLITLEDGER_DB", default_value = "splitledger.db")]
    database: PathBuf,

    /// Email of the user acting on the ledger.
    #[arg(long = "as", value_name = "EMAIL", global = true)]
    session: Option<String>,

    /// Password of the acting user, or of the user being registered.
    #[arg(long, env = "SPLITLEDGER_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Print JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let args = Args::parse();

    info!("Initializing database at {}...", args.database.display());
    let database = SqliteDatabase::new(&args.database).map_err(|e| {
        error!("Cannot initialize database: {}", e);
        e
    })?;

    let database = Arc::new(Mutex::new(database));

    let credentials = Credentials {
        email: args.session.as_deref(),
        password: args.password.as_deref(),
    };

    match execute(args.command, &credentials, args.json, &database).await {
        Ok(output) => {
            println!("{}", output.trim_end());
            Ok(())
        }
        Err(e) => {
            error!("Command failed: {e:#}");
            Err(e)
        }
    }
}
