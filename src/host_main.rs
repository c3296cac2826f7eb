// Started by the browser through its native messaging manifest. Stdout belongs to the extension,
// nothing else may write to it.

use anyhow::Result;
use clap::Parser;
use tabtally::{
    host::{args::HostArgs, serve},
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, HOST_PREFIX},
        runtime::single_thread_runtime,
    },
};
use tracing::error;

fn main() -> Result<()> {
    let args = HostArgs::parse();
    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;
    enable_logging(HOST_PREFIX, &app_dir.join("logs"), args.log_filter, args.log_console)?;

    single_thread_runtime()?
        .block_on(async move { serve(&args, &app_dir).await })
        .inspect_err(|e| error!("Host stopped with an error {e:?}"))
}
