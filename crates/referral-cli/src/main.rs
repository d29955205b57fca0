mod cmd;
mod output;
mod root;

use clap::{Args, Parser, Subcommand};
use cmd::{cache::CacheSubcommand, config::ConfigSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "psychref",
    about = "Match upcoming evaluation appointments to referral sources and write one notification letter per referrer",
    version,
    propagate_version = true
)]
struct Cli {
    /// Working directory holding .psychref/, the client cache and letters
    /// (default: auto-detect from .psychref/)
    #[arg(long, global = true, env = "PSYCHREF_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// The three CSV exports a run reads.
#[derive(Args, Debug, Clone)]
pub struct SheetArgs {
    /// Path to demographics CSV file
    #[arg(long, short = 'd', value_name = "FILE")]
    pub dem: Option<PathBuf>,

    /// Path to referral report CSV file
    #[arg(long = "ref", short = 'r', value_name = "FILE")]
    pub referral: Option<PathBuf>,

    /// Path to appointments CSV file
    #[arg(long, short = 'a', value_name = "FILE")]
    pub app: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .psychref/config.yaml with defaults
    Init,

    /// Match, filter, group, write letters, and record notified clients
    Run {
        #[command(flatten)]
        sheets: SheetArgs,

        /// Procedure code to match instead of the configured one
        #[arg(long)]
        code: Option<String>,

        /// Show who would be notified without writing letters or the cache
        #[arg(long)]
        dry_run: bool,

        /// Open the output folder when letters were written
        #[arg(long)]
        open: bool,
    },

    /// Load the given sheets and report missing columns
    Check {
        #[command(flatten)]
        sheets: SheetArgs,
    },

    /// Inspect or manually edit the processed-client list
    Cache {
        #[command(subcommand)]
        subcommand: CacheSubcommand,
    },

    /// Show, validate or change configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Check { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run {
            sheets,
            code,
            dry_run,
            open,
        } => cmd::run::run(
            &root,
            &sheets,
            cmd::run::RunOptions {
                code,
                dry_run,
                open,
            },
            cli.json,
        ),
        Commands::Check { sheets } => cmd::check::run(&sheets, cli.json),
        Commands::Cache { subcommand } => cmd::cache::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
