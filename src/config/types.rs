//! 配置类型定义
//!
//! 定义 labterm 的配置结构，支持 YAML 序列化/反序列化。
//! 所有字段都有默认值，配置文件可以只写需要修改的部分。

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::terminal::{BridgeOptions, CellMetrics, Geometry, DEFAULT_PATH_PREFIX};

use super::yaml::ConfigError;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// 服务端配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 连接配置
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// 终端配置
    #[serde(default)]
    pub terminal: TerminalConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// 页面来源
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.server.origin)
            .map_err(|e| ConfigError::ValidationError(format!("origin 无效: {}", e)))
    }

    /// 转换为会话参数
    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            connect_timeout: Duration::from_millis(self.connection.connect_timeout_ms),
            settle_delay: Duration::from_millis(self.connection.settle_delay_ms),
            cell: CellMetrics {
                width: self.terminal.cell_width_px,
                height: self.terminal.cell_height_px,
            },
            scrollback: self.terminal.scrollback_lines,
            history_bytes: self.terminal.history_bytes,
            default_geometry: Geometry::new(self.terminal.default_cols, self.terminal.default_rows),
        }
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let origin = self.origin_url()?;
        if !matches!(origin.scheme(), "http" | "https") {
            return Err(ConfigError::ValidationError(format!(
                "origin 必须是 http 或 https: {}",
                self.server.origin
            )));
        }
        if origin.host_str().is_none() {
            return Err(ConfigError::ValidationError(format!(
                "origin 缺少主机: {}",
                self.server.origin
            )));
        }
        if self.connection.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms 必须大于 0".to_string(),
            ));
        }
        if !(self.terminal.cell_width_px > 0.0 && self.terminal.cell_height_px > 0.0) {
            return Err(ConfigError::ValidationError(
                "字符单元尺寸必须大于 0".to_string(),
            ));
        }
        if self.terminal.default_cols < 2 || self.terminal.default_rows < 1 {
            return Err(ConfigError::ValidationError(format!(
                "默认尺寸过小: {}x{}",
                self.terminal.default_cols, self.terminal.default_rows
            )));
        }
        Ok(())
    }
}

// ============ 服务端配置 ============

/// 服务端配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// 页面来源（决定 ws/wss 和主机）
    #[serde(default = "default_origin")]
    pub origin: String,
    /// 终端端点路径前缀
    #[serde(default = "default_path_prefix")]
    pub path_prefix: String,
}

fn default_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_path_prefix() -> String {
    DEFAULT_PATH_PREFIX.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            path_prefix: default_path_prefix(),
        }
    }
}

// ============ 连接配置 ============

/// 连接配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    /// 连接超时（毫秒）
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// 创建会话后等待多久再连接（毫秒）
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    30_000
}

fn default_settle_delay_ms() -> u64 {
    2_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

// ============ 终端配置 ============

/// 终端配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerminalConfig {
    /// 滚动历史行数
    #[serde(default = "default_scrollback_lines")]
    pub scrollback_lines: usize,
    /// 输出历史缓冲区大小（字节）
    #[serde(default = "default_history_bytes")]
    pub history_bytes: usize,
    /// 字符单元宽度（像素）
    #[serde(default = "default_cell_width_px")]
    pub cell_width_px: f64,
    /// 字符单元高度（像素）
    #[serde(default = "default_cell_height_px")]
    pub cell_height_px: f64,
    #[serde(default = "default_cols")]
    pub default_cols: u16,
    #[serde(default = "default_rows")]
    pub default_rows: u16,
}

fn default_scrollback_lines() -> usize {
    crate::terminal::emulator::DEFAULT_SCROLLBACK
}

fn default_history_bytes() -> usize {
    crate::terminal::emulator::DEFAULT_HISTORY_BYTES
}

fn default_cell_width_px() -> f64 {
    CellMetrics::default().width
}

fn default_cell_height_px() -> f64 {
    CellMetrics::default().height
}

fn default_cols() -> u16 {
    crate::terminal::DEFAULT_COLS
}

fn default_rows() -> u16 {
    crate::terminal::DEFAULT_ROWS
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            scrollback_lines: default_scrollback_lines(),
            history_bytes: default_history_bytes(),
            cell_width_px: default_cell_width_px(),
            cell_height_px: default_cell_height_px(),
            default_cols: default_cols(),
            default_rows: default_rows(),
        }
    }
}

// ============ 日志配置 ============

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 日志文件路径，交互式会话期间未配置时不输出日志
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}
