use std::{env, path::PathBuf, process};

use clap::Parser;
use tracing::error;
use xbytechat::{
    config::{ConfigManager, EnvConfigManager},
    logger::{LogConfig, init_tracing},
};

mod cli;

use cli::{Cli, CliContext, default_command};

/// Resolve the xbytechat root directory from the environment or use default.
pub fn resolve_root_dir() -> PathBuf {
    if let Ok(path) = env::var("XBYTECHAT_ROOT") {
        PathBuf::from(path)
    } else {
        PathBuf::from("./xbytechat")
    }
}

#[tokio::main(flavor = "multi_thread", worker_threads = 4)]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let root = resolve_root_dir();

    init_tracing(&LogConfig::new(&root, cli.log_level.clone()).with_console(cli.verbose))?;

    let env_file = root.join("config").join(".env");
    let config_manager = ConfigManager(EnvConfigManager::new(env_file));
    let context = CliContext::new(root, config_manager).await?;

    let command = cli.command.unwrap_or_else(default_command);
    if let Err(err) = cli::execute(&context, command).await {
        error!("{err:#}");
        eprintln!("❌ {err:#}");
        process::exit(1);
    }
    Ok(())
}
