pub mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

use crate::{
    host::{self, args::HostArgs},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "tabtally", version, long_about = None)]
#[command(about = "Per-domain browsing time and session blocking", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Show time spent per domain and the domains blocked for the session")]
    Report {
        #[arg(
            long,
            help = "Application directory. By default tries to use $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(
        about = "Run the native messaging host on the current stdio. Used for debugging the extension"
    )]
    Serve {
        #[command(flatten)]
        host: HostArgs,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    match args.commands {
        Commands::Report { dir } => {
            let app_dir = dir.map_or_else(create_application_default_path, Ok)?;
            enable_logging(CLI_PREFIX, &app_dir.join("logs"), logging_level, args.log)?;
            report::print_report(&app_dir).await
        }
        Commands::Serve { host } => {
            let app_dir = host
                .dir
                .clone()
                .map_or_else(create_application_default_path, Ok)?;
            enable_logging(
                CLI_PREFIX,
                &app_dir.join("logs"),
                logging_level.or(host.log_filter),
                args.log || host.log_console,
            )?;
            host::serve(&host, &app_dir).await
        }
    }
}
