//! Credentials CLI - database migrations and catalog management.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! credentials-cli migrate
//!
//! # Register a program certificate
//! credentials-cli catalog add-program --program-id 10
//!
//! # Register a course certificate
//! credentials-cli catalog add-course --course-id course-v1:edX+DemoX+Demo --certificate-type verified
//!
//! # List registered credentials
//! credentials-cli catalog list
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `catalog` - Manage the credential catalog

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "credentials-cli")]
#[command(author, version, about = "Credentials service CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the credential catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Register a program certificate
    AddProgram {
        /// Program id
        #[arg(long)]
        program_id: i64,
    },
    /// Register a course certificate
    AddCourse {
        /// Course run key
        #[arg(long)]
        course_id: String,

        /// Enrollment track (`honor`, `verified`, `professional`, `no-id-professional`, `audit`)
        #[arg(long)]
        certificate_type: String,
    },
    /// List registered credentials
    List,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
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
        Commands::Catalog { action } => match action {
            CatalogAction::AddProgram { program_id } => {
                commands::catalog::add_program(program_id).await?;
            }
            CatalogAction::AddCourse {
                course_id,
                certificate_type,
            } => {
                commands::catalog::add_course(&course_id, &certificate_type).await?;
            }
            CatalogAction::List => commands::catalog::list().await?,
        },
    }
    Ok(())
}
