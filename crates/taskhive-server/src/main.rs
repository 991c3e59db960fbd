use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use taskhive_core::user::{CreateUser, Role};
use taskhive_db::Db;
use taskhive_server::auth::AuthConfig;
use taskhive_service::TaskService;
use taskhive_store::{AttachmentStore, StoreConfig};

#[derive(Parser)]
#[command(name = "taskhive-server")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an admin account
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Escalate an existing account to admin
    Promote {
        #[arg(long)]
        email: String,
    },
    /// Delete stored files that no attachment references
    SweepOrphans,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let db = match std::env::var("TASKHIVE_DB") {
        Ok(path) => Db::open(&PathBuf::from(path))?,
        Err(_) => Db::open_default()?,
    };
    let store_config = StoreConfig::from_env();
    let using_s3 = store_config.is_s3();
    let store = AttachmentStore::new(&store_config)?;
    let service = TaskService::new(db, store);

    match cli.command {
        Some(Commands::CreateAdmin {
            name,
            email,
            password,
        }) => {
            let user = service
                .register_user(
                    &CreateUser {
                        name,
                        email,
                        password,
                    },
                    Role::Admin,
                )
                .await?;
            eprintln!("Created admin {} (id: {})", user.email, user.id);
        }
        Some(Commands::Promote { email }) => {
            let user = service.promote_user(&email).await?;
            eprintln!("Promoted {} to admin", user.email);
        }
        Some(Commands::SweepOrphans) => {
            let report = service.sweep_orphans().await?;
            eprintln!(
                "Scanned {} stored files: {} orphans removed, {} failed",
                report.scanned,
                report.deleted.len(),
                report.failed.len()
            );
            for (key, err) in &report.failed {
                eprintln!("  failed: {key}: {err}");
            }
        }
        None => {
            let Some(auth) = AuthConfig::from_env() else {
                bail!("TASKHIVE_JWT_SECRET must be set to start the server");
            };

            let bind = std::env::var("TASKHIVE_BIND").unwrap_or_else(|_| "0.0.0.0".into());
            let port: u16 = std::env::var("TASKHIVE_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000);
            let addr = SocketAddr::new(bind.parse()?, port);

            eprintln!(
                "storage backend: {}",
                if using_s3 { "s3" } else { "local disk" }
            );
            let listener = TcpListener::bind(addr).await?;
            eprintln!("taskhive-server listening on http://{addr}");

            taskhive_server::serve(listener, service, auth).await?;
        }
    }

    Ok(())
}
