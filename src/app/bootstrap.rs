//! 应用启动引导模块
//!
//! 包含配置加载验证和会话注册表的初始化。

use std::path::Path;
use std::sync::Arc;

use crate::config::{self, Config, ConfigError, ConfigManager};
use crate::terminal::{Page, SessionRegistry, TransportConnector, WsConnector};

/// 加载配置并应用命令行覆盖项
///
/// 配置文件不存在时使用默认配置。
pub fn load_and_validate_config(
    path: Option<&Path>,
    origin: Option<&str>,
) -> Result<ConfigManager, ConfigError> {
    let mut manager = config::load_config(path)?;

    if let Some(origin) = origin {
        manager.config_mut().server.origin = origin.to_string();
    }
    manager.config().validate()?;
    Ok(manager)
}

/// 创建页面上下文和会话注册表
pub fn init_registry(config: &Config) -> Result<(Arc<Page>, Arc<SessionRegistry>), ConfigError> {
    init_registry_with(config, Arc::new(WsConnector::new()))
}

pub fn init_registry_with(
    config: &Config,
    connector: Arc<dyn TransportConnector>,
) -> Result<(Arc<Page>, Arc<SessionRegistry>), ConfigError> {
    let page = Arc::new(Page::new(config.origin_url()?));
    let registry = SessionRegistry::new(
        page.clone(),
        connector,
        config.bridge_options(),
        config.server.path_prefix.clone(),
    );
    Ok((page, registry))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_origin_override() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        let manager =
            load_and_validate_config(Some(&path), Some("https://lab.example.com")).unwrap();
        assert_eq!(manager.config().server.origin, "https://lab.example.com");
    }

    #[test]
    fn test_invalid_origin_override_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        let err = load_and_validate_config(Some(&path), Some("ftp://lab")).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_init_registry() {
        let config = Config::default();
        let (page, registry) = init_registry(&config).unwrap();
        assert_eq!(page.origin().as_str(), "http://localhost:8080/");
        assert_eq!(registry.session_count(), 0);
    }
}
