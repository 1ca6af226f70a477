//! Nutri CLI - Database migrations and operator tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! nutri-cli migrate
//!
//! # Provision a patient (same workflow as `POST /patients`)
//! nutri-cli patient provision -e maria@example.com -n "Maria Silva" --nutritionist n1
//!
//! # Resend a patient's invitation
//! nutri-cli patient resend-invite --id 7c1e...
//!
//! # Assign a role claim to an identity
//! nutri-cli identity set-role --id 7c1e... --role nutritionist
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::patient::ProvisionArgs;

#[derive(Parser)]
#[command(name = "nutri-cli")]
#[command(author, version, about = "Nutri CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Provision patients
    Patient {
        #[command(subcommand)]
        action: PatientAction,
    },
    /// Manage identity role claims
    Identity {
        #[command(subcommand)]
        action: IdentityAction,
    },
}

#[derive(Subcommand)]
enum PatientAction {
    /// Create identity, patient record and invitation
    Provision(ProvisionArgs),
    /// Send the invitation email again
    ResendInvite {
        /// Patient id (identity user id)
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum IdentityAction {
    /// Replace the role claim of an identity
    SetRole {
        /// Identity user id
        #[arg(long)]
        id: String,

        /// Role (`patient`, `nutritionist`, `admin`)
        #[arg(short, long)]
        role: String,
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
        Commands::Patient { action } => match action {
            PatientAction::Provision(args) => commands::patient::provision(args).await?,
            PatientAction::ResendInvite { id } => commands::patient::resend_invite(&id).await?,
        },
        Commands::Identity { action } => match action {
            IdentityAction::SetRole { id, role } => {
                commands::identity::set_role(&id, &role).await?;
            }
        },
    }
    Ok(())
}
