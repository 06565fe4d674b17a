//! 终端桥接错误类型
//!
//! 定义终端会话桥接相关的错误类型。
//!
//! ## 功能
//! - 会话注册错误
//! - 传输层错误
//! - 序列化支持

use thiserror::Error;

/// 终端错误类型
#[derive(Debug, Error)]
pub enum TerminalError {
    /// 会话标识无效（namespace 或 pod 为空）
    #[error("会话标识无效: {0}")]
    InvalidIdentity(String),

    /// 宿主显示面不可用
    #[error("宿主显示面不可用")]
    HostUnavailable,

    /// 终端端点地址无效
    #[error("终端端点无效: {0}")]
    InvalidEndpoint(String),

    /// 传输层创建或运行失败
    #[error("传输失败: {0}")]
    TransportFailed(String),

    /// 发送失败
    #[error("发送失败: {0}")]
    SendFailed(String),

    /// 会话不存在
    #[error("会话不存在: {0}")]
    SessionNotFound(String),

    /// 会话已关闭
    #[error("会话已关闭")]
    SessionClosed,
}

impl From<TerminalError> for String {
    fn from(err: TerminalError) -> Self {
        err.to_string()
    }
}

impl serde::Serialize for TerminalError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
