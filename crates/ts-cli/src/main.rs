//! tabshell CLI
//!
//! Single binary for:
//! - Profile management (add, list, remove, duplicate, export, import)
//! - Interactive SSH sessions through the tab workspace
//! - Configuration file management

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tabshell::commands::{self, NewProfile};
use tabshell::output::print_info;
use ts_core::config;
use ts_core::FileProfileStore;

#[derive(Parser)]
#[command(name = "tabshell")]
#[command(author, version, about = "Tabbed remote shell client")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Path to the profile store (overrides config)
    #[arg(long, global = true, env = "TABSHELL_PROFILES")]
    profiles: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage stored connection profiles
    Profiles {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Open a shell session for a stored profile
    Connect {
        /// Profile ID to connect with
        profile: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// List stored profiles
    List {
        /// Print as JSON (credentials omitted)
        #[arg(long)]
        json: bool,
    },
    /// Add a profile
    Add {
        /// Display name
        name: String,
        /// Remote host name or address
        host: String,
        /// SSH port
        #[arg(short, long)]
        port: Option<u16>,
        /// Remote user name
        #[arg(short, long)]
        username: String,
        /// Password for password authentication
        #[arg(long, env = "TABSHELL_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Private key file for key authentication
        #[arg(short, long)]
        key: Option<PathBuf>,
        /// Passphrase for the private key
        #[arg(long)]
        passphrase: Option<String>,
        /// Handshake timeout in seconds (overrides config)
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// Remove a profile
    Remove {
        /// Profile ID
        id: String,
    },
    /// Copy a profile under a new ID
    Duplicate {
        /// Profile ID
        id: String,
    },
    /// Export all profiles to a JSON file
    Export {
        /// Destination file
        path: PathBuf,
    },
    /// Import profiles from a JSON file
    Import {
        /// Source file
        path: PathBuf,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show config file path
    Path,
    /// Show effective configuration
    Show,
    /// Write the default configuration
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);

    // The interactive session owns the terminal, so its logs go to a file
    let log_file = match &cli.command {
        Some(Commands::Connect { .. }) => open_log_file(&config_path),
        _ => None,
    };
    init_logging(log_level, log_file);

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            print_info("No command given; showing stored profiles");
            let store = open_store(&config_path, cli.profiles.as_deref())?;
            commands::profiles_list(&store, false)?;
            return Ok(());
        }
    };

    match command {
        Commands::Profiles { action } => {
            let store = open_store(&config_path, cli.profiles.as_deref())?;
            match action {
                ProfileAction::List { json } => commands::profiles_list(&store, json)?,
                ProfileAction::Add {
                    name,
                    host,
                    port,
                    username,
                    password,
                    key,
                    passphrase,
                    timeout,
                } => {
                    commands::profiles_add(
                        &store,
                        NewProfile {
                            name,
                            host,
                            port,
                            username,
                            password,
                            key_file: key,
                            passphrase,
                            timeout_secs: timeout,
                        },
                    )?;
                }
                ProfileAction::Remove { id } => commands::profiles_remove(&store, &id)?,
                ProfileAction::Duplicate { id } => commands::profiles_duplicate(&store, &id)?,
                ProfileAction::Export { path } => commands::profiles_export(&store, &path)?,
                ProfileAction::Import { path } => commands::profiles_import(&store, &path)?,
            }
        }

        Commands::Connect { profile } => {
            let client_config = config::load_or_default(&config_path)
                .with_context(|| format!("Failed to load config from {:?}", config_path))?;
            let store = open_store(&config_path, cli.profiles.as_deref())?;

            let cancel = CancellationToken::new();
            spawn_signal_handler(cancel.clone());

            commands::connect_command(&client_config, &store, &profile, cancel).await?;
        }

        Commands::Config { action } => match action {
            ConfigAction::Path => commands::config_path(&config_path)?,
            ConfigAction::Show => commands::config_show(&config_path)?,
            ConfigAction::Init { force } => commands::config_init(&config_path, force)?,
        },
    }

    Ok(())
}

fn init_logging(log_level: &str, log_file: Option<File>) {
    let filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()));

    let (file_layer, stderr_layer) = match log_file {
        Some(file) => (
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            ),
            None,
        ),
        None => (
            None,
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();
}

/// Open `tabshell.log` next to the config file, if possible
fn open_log_file(config_path: &Path) -> Option<File> {
    let dir = config_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(config::default_config_dir);
    std::fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("tabshell.log"))
        .ok()
}

/// Open the profile store named on the command line, or the configured one
fn open_store(config_path: &Path, override_path: Option<&Path>) -> Result<FileProfileStore> {
    let path = match override_path {
        Some(path) => path.to_path_buf(),
        None => {
            config::load_or_default(config_path)
                .with_context(|| format!("Failed to load config from {:?}", config_path))?
                .profiles_path
        }
    };
    FileProfileStore::open(&path)
        .with_context(|| format!("Failed to open profile store {:?}", path))
}

fn spawn_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, closing sessions...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, closing sessions...");
            }
        }

        cancel.cancel();
    });
}
