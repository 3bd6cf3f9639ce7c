//! Gerinmah CLI - migrations, backups and maintenance.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! gm-cli migrate
//!
//! # Snapshot the critical tables now
//! gm-cli backup run
//!
//! # Restore missing rows from the snapshots
//! gm-cli backup restore
//!
//! # Spot-check recent rows against the snapshots
//! gm-cli backup verify
//!
//! # Show snapshot ages and row counts
//! gm-cli backup status
//!
//! # Reconcile the permanent and served upload directories
//! gm-cli uploads sync
//!
//! # Grant or revoke CMS access
//! gm-cli user promote -u batbold
//! gm-cli user demote -u batbold
//! ```
//!
//! Every command reads `DATABASE_URL` and the `GERINMAH_*_DIR` variables the
//! server uses, from the environment or `.env`.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use gerinmah_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "gm-cli")]
#[command(author, version, about = "Gerinmah CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Table snapshots
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },
    /// Uploaded images
    Uploads {
        #[command(subcommand)]
        action: UploadsAction,
    },
    /// Manage user roles
    User {
        #[command(subcommand)]
        action: UserAction,
    },
}

#[derive(Subcommand)]
enum BackupAction {
    /// Snapshot every critical table
    Run,
    /// Restore rows missing from the live tables
    Restore,
    /// Report sampled rows missing from the live tables, without restoring
    Verify,
    /// Show snapshot metadata
    Status,
}

#[derive(Subcommand)]
enum UploadsAction {
    /// Copy files missing on either side between the upload directories
    Sync,
}

#[derive(Subcommand)]
enum UserAction {
    /// Give a user admin access
    Promote {
        #[arg(short, long)]
        username: String,
    },
    /// Turn an admin back into a customer
    Demote {
        #[arg(short, long)]
        username: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Backup { action } => match action {
            BackupAction::Run => commands::backup::run().await?,
            BackupAction::Restore => commands::backup::restore().await?,
            BackupAction::Verify => commands::backup::verify().await?,
            BackupAction::Status => commands::backup::status().await?,
        },
        Commands::Uploads { action } => match action {
            UploadsAction::Sync => commands::uploads::sync().await?,
        },
        Commands::User { action } => match action {
            UserAction::Promote { username } => {
                commands::user::set_role(&username, UserRole::Admin).await?;
            }
            UserAction::Demote { username } => {
                commands::user::set_role(&username, UserRole::Customer).await?;
            }
        },
    }
    Ok(())
}
