mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use boxboard_core::storage::local::LocalStore;
use clap::Parser;

use crate::commands::{Command, Context};

#[derive(Debug, Parser)]
#[command(name = "boxboard", version, about = "Kanban boards in a local document store")]
struct Cli {
    /// Config file (default: ~/.config/boxboard/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Store root directory, overrides the config file
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Acting user id, overrides the config file
    #[arg(long, global = true)]
    user: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let file_config = config::load_config(&config_path);
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| file_config.resolved_data_dir());
    log::debug!("[boxboard.cli] Using store at {}", data_dir.display());

    let ctx = Context {
        store: Arc::new(LocalStore::new(data_dir)),
        user_id: cli.user.clone().or(file_config.user_id),
        defaults: file_config.defaults,
    };

    let mut stdout = std::io::stdout();
    match commands::run(cli.command, &ctx, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("[boxboard.cli] Command failed: {:?}", e);
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}
