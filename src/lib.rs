//! labterm - 实验环境终端桥接
//!
//! 把字符终端桥接到远程 Pod 里的 shell。核心逻辑在 `terminal` 模块，
//! `app` 提供命令行宿主。

pub mod app;
pub mod config;
pub mod logger;
pub mod terminal;

// 重新导出核心类型
pub use terminal::{SessionIdentity, SessionRegistry, SessionStatus, TerminalError};
