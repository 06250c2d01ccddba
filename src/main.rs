use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

mod auth;
mod cli;
mod error;
mod logging;
mod ring;
mod snapshot;
mod storage;

use cli::commands::{GlobalOptions, SnapshotArgs};

#[derive(Parser)]
#[command(
    name = "ringsnap",
    version,
    about = "Download the latest snapshot from a Ring camera"
)]
struct Cli {
    /// Ring account username (only needed until a refresh token is stored)
    #[arg(short, long, global = true, env = "RING_USERNAME")]
    username: Option<String>,

    /// Ring account password
    #[arg(short, long, global = true, env = "RING_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Directory holding config.toml and credentials.json
    #[arg(long, global = true, env = "RINGSNAP_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a snapshot from a device
    Snapshot {
        /// Id of the Ring device (see `ringsnap list`)
        #[arg(short, long)]
        device_id: Option<u64>,

        /// Folder to store the snapshot in (default: current directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Ask the device to capture a new snapshot before downloading
        #[arg(long, conflicts_with = "cached")]
        force_update: bool,

        /// Download the latest cached snapshot without asking for a new one
        #[arg(long)]
        cached: bool,

        /// Only accept the download if it decodes as an image
        #[arg(long)]
        validate: bool,

        /// How many times to try the download (default: 3)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_retries: Option<u32>,

        /// Save these options to config.toml for later runs
        #[arg(long)]
        remember: bool,
    },

    /// List all Ring devices and their ids
    List,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("warning: {:#}", e);
    }

    let global = GlobalOptions {
        config_dir: cli.config_dir,
        username: cli.username,
        password: cli.password,
    };

    let result = match &cli.command {
        Commands::Snapshot {
            device_id,
            out,
            force_update,
            cached,
            validate,
            max_retries,
            remember,
        } => {
            let force_update = match (*force_update, *cached) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let args = SnapshotArgs {
                device_id: *device_id,
                out: out.clone(),
                force_update,
                validate: *validate,
                max_retries: *max_retries,
                remember: *remember,
            };
            cli::commands::cmd_snapshot(&global, &args)
        }
        Commands::List => cli::commands::cmd_list(&global),
    };

    if let Err(e) = result {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
