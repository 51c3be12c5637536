//! Warnet CLI
//!
//! Deploy Bitcoin Core and lnd networks to Kubernetes and run scenarios
//! against them.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use warnet_core::logging::{LoggingConfig, LOG_ROTATION_ENV};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Namespace to operate in
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Path to the kubeconfig file
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Output format (table, json, yaml)
    #[arg(short, long, global = true)]
    output: Option<String>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that the tools and the cluster warnet needs are available
    Setup,
    /// Initialize a warnet project in the current directory
    Init,
    /// Create a new warnet project in a new directory
    New {
        /// Project directory to create
        directory: PathBuf,
    },
    /// Deploy a network
    Deploy {
        /// Network directory holding network.yaml
        directory: PathBuf,
        /// Wait until every tank reached its peers
        #[arg(long)]
        wait: bool,
        /// Seconds to wait for connectivity
        #[arg(long, default_value = "300")]
        timeout: u64,
    },
    /// Uninstall every release in the namespace
    Down,
    /// Show pods deployed by warnet
    Status,
    /// Run a scenario in a commander pod
    Run {
        /// Scenario file
        scenario: PathBuf,
        /// Follow the commander log until it exits
        #[arg(long)]
        debug: bool,
        /// Arguments passed to the scenario
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
    /// Show where the dashboard is reachable
    Dashboard,
    /// Print the log of a pod
    Logs {
        pod: String,
        /// Container within the pod
        #[arg(short, long)]
        container: Option<String>,
        /// Keep streaming new lines
        #[arg(short, long)]
        follow: bool,
    },
    /// Archive a tank's bitcoin datadir
    Snapshot {
        /// Tank to snapshot; omit with --all
        tank: Option<String>,
        /// Snapshot every tank
        #[arg(long, conflicts_with = "tank")]
        all: bool,
        /// Only include files or directories matching these names
        #[arg(short, long, value_delimiter = ',')]
        filter: Vec<String>,
        /// Local directory for the archives
        #[arg(long, default_value = "./warnet-snapshots")]
        output_dir: PathBuf,
    },
    /// Bitcoin Core RPC
    Bitcoin {
        #[command(subcommand)]
        command: BitcoinCommands,
    },
    /// lnd RPC and chart rendering
    Ln {
        #[command(subcommand)]
        command: LnCommands,
    },
    /// Manage team namespaces
    Namespaces {
        #[command(subcommand)]
        command: NamespaceCommands,
    },
    /// Build Bitcoin Core images
    Image {
        #[command(subcommand)]
        command: ImageCommands,
    },
    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
pub enum BitcoinCommands {
    /// Call bitcoin-cli in a tank
    Rpc {
        tank: String,
        method: String,
        #[arg(allow_hyphen_values = true)]
        params: Vec<String>,
    },
    /// Check that every tank reached its configured peers
    Connected {
        /// Keep polling for this many seconds
        #[arg(long)]
        wait: Option<u64>,
    },
}

#[derive(Subcommand)]
pub enum LnCommands {
    /// Call lncli in a lightning pod
    Rpc {
        pod: String,
        method: String,
        #[arg(allow_hyphen_values = true)]
        params: Vec<String>,
    },
    /// Print a node's identity pubkey
    Pubkey { pod: String },
    /// Print a node's advertised host
    Host { pod: String },
    /// Render the lnd ConfigMaps for a release
    Render {
        /// Release the node belongs to
        #[arg(short, long)]
        release: String,
        /// Values files, applied in order over the chart defaults
        #[arg(short = 'f', long = "values")]
        values: Vec<PathBuf>,
        /// Directory holding tls.cert and tls.key
        #[arg(long)]
        chart_dir: Option<PathBuf>,
        /// Apply the ConfigMaps to the cluster instead of printing them
        #[arg(long)]
        apply: bool,
    },
    /// List the channels declared by lightning nodes
    Channels,
}

#[derive(Subcommand)]
pub enum NamespaceCommands {
    /// List namespaces and their service accounts
    List {
        /// Only namespaces starting with this prefix
        #[arg(long)]
        prefix: Option<String>,
    },
    /// Create a namespace with one service account per user
    Create {
        name: String,
        /// Comma separated user names
        #[arg(long, value_delimiter = ',')]
        users: Vec<String>,
    },
    /// Make a namespace the kubectl default
    Use { name: String },
    /// Delete a namespace, or every namespace with a prefix
    Destroy {
        #[arg(conflicts_with = "prefix")]
        name: Option<String>,
        #[arg(long)]
        prefix: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ImageCommands {
    /// Build a Bitcoin Core image with docker buildx
    Build {
        /// Repository to build from, e.g. bitcoin/bitcoin
        #[arg(long)]
        repo: String,
        /// Commit to build
        #[arg(long)]
        commit_sha: String,
        /// Registry the tags belong to
        #[arg(long)]
        registry: String,
        /// Comma separated image tags
        #[arg(long)]
        tags: String,
        /// Configure flags
        #[arg(long, allow_hyphen_values = true)]
        build_args: Option<String>,
        /// Comma separated architectures (amd64, arm64, armhf)
        #[arg(long)]
        arches: Option<String>,
        /// load or push
        #[arg(long, default_value = "load")]
        action: String,
        /// Dockerfile to build
        #[arg(long, default_value = "resources/images/bitcoin/Dockerfile")]
        dockerfile: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;

    let mut logging = LoggingConfig::from_env();
    logging.level = if cli.verbose {
        "debug".to_string()
    } else {
        config.log_level.clone()
    };
    if logging.file_path.is_none() {
        logging.file_path = config.log_path.clone();
    }
    if std::env::var_os(LOG_ROTATION_ENV).is_none() {
        if let Some(rotation) = config.log_rotation {
            logging.rotation = rotation;
        }
    }
    let _log_guard = logging
        .init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    let ctx = commands::Context::new(&cli, &config);

    match cli.command {
        Commands::Setup => commands::setup::handle_setup(&ctx).await?,
        Commands::Init => commands::project::handle_init()?,
        Commands::New { directory } => commands::project::handle_new(&directory)?,
        Commands::Deploy {
            directory,
            wait,
            timeout,
        } => commands::network::handle_deploy(&ctx, &directory, wait, timeout).await?,
        Commands::Down => commands::network::handle_down(&ctx).await?,
        Commands::Status => commands::network::handle_status(&ctx).await?,
        Commands::Dashboard => commands::network::handle_dashboard(&ctx).await?,
        Commands::Run {
            scenario,
            debug,
            args,
        } => commands::scenario::handle_run(&ctx, &scenario, args, debug).await?,
        Commands::Logs {
            pod,
            container,
            follow,
        } => commands::scenario::handle_logs(&ctx, &pod, container.as_deref(), follow).await?,
        Commands::Snapshot {
            tank,
            all,
            filter,
            output_dir,
        } => commands::snapshot::handle_snapshot(&ctx, tank, all, &filter, &output_dir).await?,
        Commands::Bitcoin { command } => commands::bitcoin::handle_bitcoin_command(command, &ctx).await?,
        Commands::Ln { command } => commands::ln::handle_ln_command(command, &ctx).await?,
        Commands::Namespaces { command } => {
            commands::namespaces::handle_namespaces_command(command, &ctx).await?
        }
        Commands::Image { command } => commands::image::handle_image_command(command).await?,
        Commands::Completions { shell } => generate_completions(shell),
    }

    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
