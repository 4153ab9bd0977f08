use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use stash_server::commands::{self, ObjectInfo, UploadArgs, UploadSummary};
use stash_server::config::StashConfig;
use stash_server::error::ServerError;
use stash_server::storage_factory::create_storage;
use stash_upload::Uploader;

/// Operator tool for a stash file store.
#[derive(Parser, Debug)]
#[command(name = "stash", about = "Operate a stash file store", version)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "stash.toml")]
    config: String,

    /// Override the configured log level.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Delete expired objects.
    Cleanup {
        /// Keep running, sweeping every N seconds.
        #[arg(long)]
        every: Option<u64>,

        /// Keep running on the `[cleanup] every_seconds` schedule.
        #[arg(long, conflicts_with = "every")]
        daemon: bool,
    },
    /// Copy every live object from one backend to another.
    Migrate {
        /// Source backend (`local` or `s3`).
        #[arg(long)]
        from: String,

        /// Destination backend (`local` or `s3`).
        #[arg(long)]
        to: String,

        /// Objects copied in parallel.
        #[arg(long, default_value_t = 4)]
        concurrency: usize,
    },
    /// Hash an admin key for the auth file. Reads plaintext from stdin.
    HashKey,
    /// Verify an admin key against the auth file. Reads plaintext from stdin.
    CheckKey,
    /// Store a local file.
    Upload {
        path: PathBuf,

        /// Name to store under instead of the file's own name.
        #[arg(long)]
        name: Option<String>,

        /// Use a random name.
        #[arg(long)]
        randomize: bool,

        /// Lifetime in seconds.
        #[arg(long)]
        expiry: Option<u64>,

        #[arg(long)]
        delete_key: Option<String>,

        #[arg(long)]
        access_key: Option<String>,
    },
    /// Show an object's metadata.
    Info { key: String },
    /// Delete an object.
    Delete {
        key: String,

        #[arg(long)]
        delete_key: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = StashConfig::load(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    stash_server::telemetry::init(&config.logging);

    if !Path::new(&cli.config).exists() {
        info!(path = %cli.config, "config file not found, using defaults");
    }

    run(cli.command, config).await?;
    Ok(())
}

async fn run(command: Commands, config: StashConfig) -> Result<(), ServerError> {
    match command {
        Commands::HashKey => {
            let plaintext = commands::read_secret(std::io::stdin())?;
            println!("{}", stash_crypto::hash_key(&plaintext)?);
        }
        Commands::CheckKey => {
            let plaintext = commands::read_secret(std::io::stdin())?;
            commands::check_key(&config.auth, &plaintext)?;
            println!("ok");
        }
        Commands::Cleanup { every, daemon } => {
            let backend = create_storage(&config.storage).await?;
            let interval = match (every, daemon) {
                (Some(secs), _) => Some(Duration::from_secs(secs.max(1))),
                (None, true) => Some(config.cleanup.interval().ok_or_else(|| {
                    ServerError::Config("cleanup --daemon requires [cleanup] every_seconds > 0".into())
                })?),
                (None, false) => None,
            };
            match interval {
                Some(every) => commands::cleanup_every(backend, every, shutdown_signal()).await?,
                None => {
                    let report = commands::cleanup_once(backend.as_ref()).await?;
                    println!(
                        "scanned {}, deleted {}, skipped {}",
                        report.scanned,
                        report.deleted.len(),
                        report.skipped.len()
                    );
                }
            }
        }
        Commands::Migrate {
            from,
            to,
            concurrency,
        } => {
            let report = commands::migrate_storage(&config.storage, &from, &to, concurrency).await?;
            println!(
                "copied {}, expired {}, failed {}",
                report.copied.len(),
                report.expired.len(),
                report.failed.len()
            );
            if !report.is_clean() {
                for (key, e) in &report.failed {
                    warn!(key = %key, error = %e, "not migrated");
                }
                return Err(ServerError::Input(format!(
                    "{} object(s) failed to migrate",
                    report.failed.len()
                )));
            }
        }
        Commands::Upload {
            path,
            name,
            randomize,
            expiry,
            delete_key,
            access_key,
        } => {
            let backend = create_storage(&config.storage).await?;
            let uploader = Uploader::new(backend, config.upload);
            let upload = commands::upload_file(
                &uploader,
                UploadArgs {
                    path,
                    name,
                    randomize,
                    expiry_seconds: expiry,
                    delete_key,
                    access_key,
                },
            )
            .await?;
            print_json(&UploadSummary::from(&upload))?;
        }
        Commands::Info { key } => {
            let backend = create_storage(&config.storage).await?;
            let metadata = commands::object_info(backend.as_ref(), &key).await?;
            let key = stash_storage::StorageKey::new(key)?;
            print_json(&ObjectInfo::new(&key, &metadata))?;
        }
        Commands::Delete { key, delete_key } => {
            let backend = create_storage(&config.storage).await?;
            commands::delete_object(backend.as_ref(), &key, &delete_key).await?;
            println!("deleted {key}");
        }
    }
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<(), ServerError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| ServerError::Io(std::io::Error::other(e)))?;
    println!("{text}");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}
