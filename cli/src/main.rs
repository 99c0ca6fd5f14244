//! podfwd CLI - Manage Kubernetes port-forwards
//!
//! An interactive console for opening and tearing down port-forwards to
//! pods, plus plain commands for scripting.

mod commands;
mod logging;
mod tui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "podfwd")]
#[command(author, version, about = "Manage Kubernetes port-forwards")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Namespace to work in (defaults to the configured namespace)
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Path to the configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Disable interactive TUI mode
    #[arg(long, global = true)]
    no_tui: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List pods and their declared ports
    #[command(alias = "ls")]
    Pods,

    /// Forward local ports to a pod until interrupted
    #[command(alias = "pf")]
    Forward {
        /// Resource to forward to: a pod name or kind/name (deploy/web, svc/web)
        target: String,

        /// Port mappings as local:remote, or a single port for both
        #[arg(required = true)]
        ports: Vec<String>,

        /// Container owning the remote ports
        #[arg(short, long)]
        container: Option<String>,

        /// Local address to listen on
        #[arg(long)]
        address: Option<String>,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let interactive = cli.command.is_none() && !cli.no_tui && atty::is(atty::Stream::Stdout);
    logging::setup_logging(cli.verbose, interactive)?;

    let (store, config) = commands::load_config(cli.config.clone()).await?;
    let namespace = cli
        .namespace
        .clone()
        .unwrap_or_else(|| config.namespace.clone());

    match cli.command {
        Some(Commands::Pods) => {
            commands::pods::run(&config, &namespace, cli.json).await?;
        }
        Some(Commands::Forward {
            target,
            ports,
            container,
            address,
        }) => {
            commands::forward::run(&config, &namespace, &target, &ports, container, address).await?;
        }
        Some(Commands::Config { action }) => match action.unwrap_or(ConfigAction::Show) {
            ConfigAction::Show => commands::config::show(&store, &config, cli.json)?,
            ConfigAction::Init { force } => commands::config::init(&store, force).await?,
        },
        None => {
            // Default: Launch TUI or list pods
            if interactive {
                tui::run(config, namespace).await?;
            } else {
                commands::pods::run(&config, &namespace, cli.json).await?;
            }
        }
    }

    Ok(())
}
