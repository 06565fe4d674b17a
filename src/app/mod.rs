//! 命令行应用模块
//!
//! - `cli` - 命令行参数
//! - `commands` - 子命令分发
//! - `bootstrap` - 配置加载与注册表初始化
//! - `runner` - 交互式终端运行器
//! - `stdio_host` - stdout 宿主显示面
//! - `input` - 本地转义键过滤

pub mod bootstrap;
pub mod cli;
pub mod commands;
pub mod input;
pub mod runner;
pub mod stdio_host;

pub use cli::Cli;
pub use commands::dispatch;
