mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, state::StateSubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "gazeflow",
    about = "Run eye-tracking processing pipelines and track per-recording action states",
    version,
    propagate_version = true
)]
struct Cli {
    /// Session working directory (default: current directory)
    #[arg(long, global = true, env = "GAZEFLOW_ROOT")]
    root: Option<PathBuf>,

    /// Study config directory (default: nearest config/ above the session)
    #[arg(long, global = true, env = "GAZEFLOW_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline (auto-coding or post-coding) on the session
    Run {
        /// Pipeline name: auto-coding or post-coding
        pipeline: String,

        #[command(flatten)]
        barrier: cmd::BarrierArgs,

        /// Study config override, e.g. --set sync_ref_recording=cam1
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },

    /// Block until an action has completed for the session
    Wait {
        /// Action name (snake_case, e.g. detect_markers)
        action: String,

        /// Only wait for the recordings the action is relevant to
        #[arg(long)]
        only_relevant: bool,

        #[command(flatten)]
        barrier: cmd::BarrierArgs,
    },

    /// Read and write action states
    State {
        #[command(subcommand)]
        subcommand: StateSubcommand,
    },

    /// List the known actions
    Actions,

    /// Validate the study config
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } | Commands::Wait { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let config_dir = cli.config_dir.as_deref();

    let result = match cli.command {
        Commands::Run {
            pipeline,
            barrier,
            overrides,
        } => cmd::run::run(&root, config_dir, &pipeline, &barrier, &overrides),
        Commands::Wait {
            action,
            only_relevant,
            barrier,
        } => cmd::wait::run(&root, config_dir, &action, only_relevant, &barrier),
        Commands::State { subcommand } => cmd::state::run(&root, config_dir, subcommand, cli.json),
        Commands::Actions => cmd::actions::run(&root, config_dir, cli.json),
        Commands::Config { subcommand } => {
            cmd::config::run(&root, config_dir, subcommand, cli.json)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
