//! 会话标识与终端端点
//!
//! `(namespace, pod)` 唯一确定一个远程 shell，端点地址由页面来源和标识推导。

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::TerminalError;

/// 默认端点路径前缀
pub const DEFAULT_PATH_PREFIX: &str = "/ws/terminal";

/// 会话标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionIdentity {
    namespace: String,
    pod: String,
}

impl SessionIdentity {
    /// 创建会话标识
    ///
    /// namespace 和 pod 去除首尾空白后都不能为空。
    pub fn new(namespace: impl Into<String>, pod: impl Into<String>) -> Result<Self, TerminalError> {
        let namespace = namespace.into().trim().to_string();
        let pod = pod.into().trim().to_string();

        if namespace.is_empty() || pod.is_empty() {
            return Err(TerminalError::InvalidIdentity(format!(
                "namespace={:?}, pod={:?}",
                namespace, pod
            )));
        }

        Ok(Self { namespace, pod })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn pod(&self) -> &str {
        &self.pod
    }

    /// 推导终端 WebSocket 端点
    ///
    /// 页面来源为 `https` 时使用 `wss`，否则使用 `ws`，路径为
    /// `{path_prefix}/{namespace}/{pod}`。
    pub fn endpoint(&self, origin: &Url, path_prefix: &str) -> Result<Url, TerminalError> {
        let scheme = match origin.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(TerminalError::InvalidEndpoint(format!(
                    "不支持的页面协议: {}",
                    other
                )))
            }
        };

        let host = origin
            .host_str()
            .ok_or_else(|| TerminalError::InvalidEndpoint(format!("缺少主机: {}", origin)))?;
        let authority = match origin.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        let prefix = path_prefix.trim_end_matches('/');
        let prefix = if prefix.starts_with('/') || prefix.is_empty() {
            prefix.to_string()
        } else {
            format!("/{}", prefix)
        };

        let raw = format!(
            "{}://{}{}/{}/{}",
            scheme,
            authority,
            prefix,
            urlencoding::encode(&self.namespace),
            urlencoding::encode(&self.pod)
        );

        Url::parse(&raw).map_err(|e| TerminalError::InvalidEndpoint(e.to_string()))
    }
}

impl std::fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod)
    }
}
