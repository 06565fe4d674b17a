//! YAML 配置文件支持
//!
//! 提供 YAML 配置的加载、保存和管理功能

use std::path::{Path, PathBuf};

use super::types::Config;

/// 配置错误类型
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// 文件读取错误
    ReadError(String),
    /// 文件写入错误
    WriteError(String),
    /// YAML 解析错误
    ParseError(String),
    /// YAML 序列化错误
    SerializeError(String),
    /// 配置验证错误
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(msg) => write!(f, "配置读取错误: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "配置写入错误: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "YAML 解析错误: {}", msg),
            ConfigError::SerializeError(msg) => write!(f, "YAML 序列化错误: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "配置验证错误: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// 配置管理器
///
/// 管理 YAML 配置文件的加载和保存
#[derive(Debug)]
pub struct ConfigManager {
    /// 当前配置
    config: Config,
    /// 配置文件路径
    config_path: PathBuf,
}

impl ConfigManager {
    /// 创建新的配置管理器
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config: Config::default(),
            config_path,
        }
    }

    /// 使用指定配置创建配置管理器
    pub fn with_config(config: Config, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// 从文件加载配置
    ///
    /// 如果文件不存在，返回默认配置
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError(e.to_string()))?;
            Self::parse_yaml(&content)?
        } else {
            tracing::debug!("[配置] 配置文件不存在，使用默认配置: {}", path.display());
            Config::default()
        };

        Ok(Self {
            config,
            config_path: path.to_path_buf(),
        })
    }

    /// 从 YAML 字符串解析配置
    pub fn parse_yaml(yaml: &str) -> Result<Config, ConfigError> {
        // 空文件等价于全部使用默认值
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// 将配置序列化为 YAML 字符串
    pub fn to_yaml(config: &Config) -> Result<String, ConfigError> {
        serde_yaml::to_string(config).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// 保存配置到文件
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&self.config_path)
    }

    /// 保存配置到指定路径
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // 确保父目录存在
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        if path.exists() {
            let backup_path = path.with_extension("yaml.backup");
            let _ = std::fs::copy(path, backup_path);
        }
        let yaml = Self::to_yaml(&self.config)?;
        std::fs::write(path, yaml).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        tracing::info!("[配置] 已保存: {}", path.display());
        Ok(())
    }

    /// 获取当前配置
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// 获取可变配置引用
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// 获取配置文件路径
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// 获取默认配置文件路径
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("labterm")
            .join("config.yaml")
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new(Self::default_config_path())
    }
}

/// 加载配置
///
/// 未指定路径时使用默认路径，文件不存在时使用默认配置。
pub fn load_config(path: Option<&Path>) -> Result<ConfigManager, ConfigError> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(ConfigManager::default_config_path);
    ConfigManager::load(&path)
}
