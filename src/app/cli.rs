//! 命令行参数定义

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "labterm")]
#[command(about = "把本地终端桥接到实验环境 Pod 里的 shell")]
#[command(version)]
pub struct Cli {
    /// 增加日志详细程度（-v debug，-vv trace）
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// 配置文件路径（默认 <config_dir>/labterm/config.yaml）
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// 日志文件路径，覆盖配置中的 logging.file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 连接到 Pod 的终端（Ctrl-] r 重连，Ctrl-] q 退出）
    Connect {
        namespace: String,
        pod: String,
        /// 页面来源，覆盖配置中的 server.origin
        #[arg(long)]
        origin: Option<String>,
    },
    /// 打印终端 WebSocket 端点
    Endpoint {
        namespace: String,
        pod: String,
        #[arg(long)]
        origin: Option<String>,
    },
    /// 配置文件管理
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// 写入默认配置
    Init {
        /// 覆盖已有配置文件（旧文件保存为 .yaml.backup）
        #[arg(long)]
        force: bool,
    },
    /// 打印生效的配置
    Show,
}
