//! 终端事件定义
//!
//! 定义会话状态、连接状态、错误种类以及状态变化事件。

use serde::{Deserialize, Serialize};

use super::identity::SessionIdentity;

/// 会话状态
///
/// `Idle → Connecting → Open → (Disconnected | Errored) → Closed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// 已创建，尚未发起连接
    Idle,
    /// 正在连接
    Connecting,
    /// 已连接
    Open,
    /// 连接已断开
    Disconnected,
    /// 连接出错
    Errored,
    /// 会话已销毁（终态）
    Closed,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl SessionStatus {
    /// 是否允许手动重连
    pub fn is_retry_eligible(self) -> bool {
        matches!(self, Self::Disconnected | Self::Errored)
    }
}

impl From<ConnectionState> for SessionStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Disconnected => Self::Disconnected,
            ConnectionState::Connecting => Self::Connecting,
            ConnectionState::Open => Self::Open,
            ConnectionState::Errored => Self::Errored,
        }
    }
}

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Open,
    Errored,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

/// 错误种类
///
/// 所有错误都在连接管理器边界被转换为状态变化和终端内提示，不会向上抛出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 30 秒内未建立连接
    ConnectTimeout,
    /// 传输层错误事件
    TransportError,
    /// 未经错误直接关闭
    UnexpectedClose,
    /// 释放显示面失败（只记录日志）
    DisposeFailure,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::ConnectTimeout => write!(f, "ConnectTimeout"),
            ErrorKind::TransportError => write!(f, "TransportError"),
            ErrorKind::UnexpectedClose => write!(f, "UnexpectedClose"),
            ErrorKind::DisposeFailure => write!(f, "DisposeFailure"),
        }
    }
}

/// 会话状态变化事件，通过观察者和广播通道发布
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusEvent {
    /// 会话 ID
    pub session_id: String,
    /// 会话标识
    pub identity: SessionIdentity,
    /// 变化前状态
    pub previous: SessionStatus,
    /// 当前状态
    pub status: SessionStatus,
    /// 最近一次错误种类
    pub error_kind: Option<ErrorKind>,
    /// 事件时间（Unix 时间戳，毫秒）
    pub timestamp_ms: i64,
}
