//! 配置管理模块
//!
//! 提供 YAML 配置文件的加载、保存和验证

mod types;
mod yaml;

pub use types::{Config, ConnectionConfig, LoggingConfig, ServerConfig, TerminalConfig};
pub use yaml::{load_config, ConfigError, ConfigManager};
