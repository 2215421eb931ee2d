use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use briefly_runner::Pipeline;
use briefly_server::auth;
use briefly_server::config::ServerConfig;

#[derive(Parser)]
#[command(name = "briefly-server", about = "Personalized AI newsletter service")]
struct Cli {
    #[command(flatten)]
    config: ServerConfig,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API and scheduler (default)
    Serve,
    /// Generate a new API key for a user
    Keygen {
        /// User the key authenticates as
        #[arg(long)]
        user: String,
        /// Human-readable name for the key
        #[arg(long, default_value = "")]
        name: String,
    },
    /// List all API keys (metadata only, no secrets)
    ListKeys,
    /// Revoke (delete) an API key by ID
    RevokeKey {
        /// The API key ID to revoke
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let db = briefly_db::open_database(&cli.config.db_config()?)
        .await
        .context("opening database")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Keygen { user, name } => {
            let raw_key = auth::generate_api_key();
            let hash = auth::sha256_hex(&raw_key);
            let api_key = db.insert_api_key(&user, &name, &hash).await?;
            eprintln!("Created API key (id: {}) for user {user}", api_key.id);
            if !name.is_empty() {
                eprintln!("  name: {name}");
            }
            // Print the raw key to stdout so it can be captured
            println!("{raw_key}");
            eprintln!("\nSave this key, it cannot be retrieved again.");
        }
        Commands::ListKeys => {
            let keys = db.list_api_keys().await?;
            if keys.is_empty() {
                eprintln!("No API keys found.");
            } else {
                println!(
                    "{:<38} {:<24} {:<20} {:<28} LAST USED",
                    "ID", "USER", "NAME", "CREATED"
                );
                for key in keys {
                    println!(
                        "{:<38} {:<24} {:<20} {:<28} {}",
                        key.id,
                        key.user_id,
                        if key.name.is_empty() { "-" } else { &key.name },
                        key.created_at,
                        key.last_used_at.as_deref().unwrap_or("never"),
                    );
                }
            }
        }
        Commands::RevokeKey { id } => {
            db.delete_api_key(&id).await?;
            eprintln!("Revoked API key {id}");
        }
        Commands::Serve => {
            let addr = cli.config.addr()?;
            let pipeline = Pipeline::from_config(&cli.config.pipeline, db.clone())
                .context("configuring newsletter pipeline")?;

            let listener = TcpListener::bind(addr).await?;
            info!("briefly-server listening on http://{addr}");

            briefly_server::serve(
                listener,
                db,
                Arc::new(pipeline),
                cli.config.poll_interval(),
            )
            .await?;
        }
    }

    Ok(())
}
