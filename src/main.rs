use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use registry_credentials::settings::Settings;

mod cli;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a credential payload's fields and try logging in to the registry
    #[command(visible_alias = "v")]
    Validate {
        /// Path to the JSON credential payload ("-" reads stdin)
        payload: String,
        /// Registry type of the payload
        #[arg(long, default_value = "docker_hub")]
        registry_type: String,
        /// Only check field rules, do not contact the registry
        #[arg(long)]
        skip_login: bool,
    },
    /// Encrypt the secret fields of a credential payload and print the stored form
    Encrypt {
        /// Path to the JSON credential payload ("-" reads stdin)
        payload: String,
        #[arg(long, default_value = "docker_hub")]
        registry_type: String,
    },
    /// Decrypt the secret fields of a stored credential and print it
    Decrypt {
        /// Path to the stored JSON credential ("-" reads stdin)
        payload: String,
        #[arg(long, default_value = "docker_hub")]
        registry_type: String,
    },
    /// Show the non-secret fields of a credential payload
    #[command(visible_alias = "s")]
    Show {
        /// Path to the JSON credential payload ("-" reads stdin)
        payload: String,
        #[arg(long, default_value = "docker_hub")]
        registry_type: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = Settings::new().context("Failed to load settings")?;

    match &cli.command {
        Commands::Validate {
            payload,
            registry_type,
            skip_login,
        } => {
            let valid = cli::validate(&settings, registry_type, payload, *skip_login).await?;
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Encrypt {
            payload,
            registry_type,
        } => {
            cli::encrypt(&settings, registry_type, payload).await?;
        }
        Commands::Decrypt {
            payload,
            registry_type,
        } => {
            cli::decrypt(&settings, registry_type, payload).await?;
        }
        Commands::Show {
            payload,
            registry_type,
        } => {
            cli::show(&settings, registry_type, payload)?;
        }
    }

    Ok(())
}
