//! 子命令分发

use anyhow::Context;

use crate::config::{ConfigError, ConfigManager};
use crate::logger::{self, LogOutput};
use crate::terminal::SessionIdentity;

use super::bootstrap;
use super::cli::{Cli, Command, ConfigAction};
use super::runner;

/// 执行命令
pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let origin = match &cli.command {
        Command::Connect { origin, .. } | Command::Endpoint { origin, .. } => origin.as_deref(),
        Command::Config { .. } => None,
    };

    if let Command::Config {
        action: ConfigAction::Init { force },
    } = cli.command
    {
        let output = LogOutput::select(false, cli.log_file.as_deref());
        logger::init_logging("info", cli.verbose, &output).context("初始化日志失败")?;
        return init_config(cli.config.as_deref(), force);
    }

    let manager = bootstrap::load_and_validate_config(cli.config.as_deref(), origin)
        .context("加载配置失败")?;
    let config = manager.config();
    let interactive = matches!(cli.command, Command::Connect { .. });
    let log_file = cli.log_file.as_deref().or(config.logging.file.as_deref());
    let output = LogOutput::select(interactive, log_file);
    logger::init_logging(&config.logging.level, cli.verbose, &output)
        .context("初始化日志失败")?;
    tracing::debug!("[配置] 使用配置文件: {}", manager.config_path().display());

    match cli.command {
        Command::Connect { namespace, pod, .. } => {
            let identity = SessionIdentity::new(namespace, pod)?;
            runner::run_connect(config, identity).await
        }
        Command::Endpoint { namespace, pod, .. } => {
            let identity = SessionIdentity::new(namespace, pod)?;
            let endpoint = identity.endpoint(&config.origin_url()?, &config.server.path_prefix)?;
            println!("{}", endpoint);
            Ok(())
        }
        Command::Config { .. } => {
            print!("{}", ConfigManager::to_yaml(config)?);
            Ok(())
        }
    }
}

fn init_config(path: Option<&std::path::Path>, force: bool) -> anyhow::Result<()> {
    let path = path
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(ConfigManager::default_config_path);

    if path.exists() && !force {
        return Err(ConfigError::WriteError(format!(
            "配置文件已存在: {}（使用 --force 覆盖）",
            path.display()
        ))
        .into());
    }

    ConfigManager::new(path.clone()).save()?;
    println!("{}", path.display());
    Ok(())
}
