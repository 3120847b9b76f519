mod backup;
mod db;
mod merge_duplicates;
mod reset_password;
mod sync_completion;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "coldcall",
    about = "coldcall maintenance CLI - out-of-band fixups for the campaign database"
)]
struct Cli {
    /// Data directory holding coldcall.db
    #[arg(long, default_value = "data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reset a user's password (creates the user when missing)
    ResetPassword {
        /// Username to reset
        username: String,

        /// New password (defaults to a well-known dev password)
        #[arg(long)]
        password: Option<String>,
    },

    /// Mark assignments completed for every practice with a logged call
    SyncCompletion,

    /// Strip a region prefix and merge the duplicate practices it created
    MergeDuplicates {
        /// Region prefix to strip, e.g. "HIF "
        #[arg(long)]
        prefix: String,
    },

    /// Copy the database into the rotated backup directory
    Backup,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ResetPassword { username, password } => {
            reset_password::run(&cli.data_dir, &username, password.as_deref())
        }
        Commands::SyncCompletion => sync_completion::run(&cli.data_dir),
        Commands::MergeDuplicates { prefix } => merge_duplicates::run(&cli.data_dir, &prefix),
        Commands::Backup => backup::run(&cli.data_dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
