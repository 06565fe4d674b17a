//! 传输层抽象
//!
//! 连接管理器只通过这里的 trait 打开、发送和关闭传输，传输事件通过带代次号的
//! 通道回送，过期传输的事件由连接管理器丢弃。
//!
//! - `ws` - 基于 tokio-tungstenite 的 WebSocket 实现

pub mod ws;

use std::sync::Arc;

use tokio::sync::mpsc;
use url::Url;

use super::error::TerminalError;
use super::protocol::OutboundFrame;

pub use ws::WsConnector;

/// WebSocket 异常关闭码（未收到关闭帧）
pub const CLOSE_ABNORMAL: u16 = 1006;
/// 关闭帧未携带状态码
pub const CLOSE_NO_STATUS: u16 = 1005;

/// 传输事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// 连接已建立
    Opened,
    /// 收到数据（shell 输出）
    Message(Vec<u8>),
    /// 传输层错误
    Error(String),
    /// 连接已关闭
    Closed { code: u16, reason: String },
}

/// 带代次号的传输事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
    pub generation: u64,
    pub event: TransportEvent,
}

/// 传输事件发送端
///
/// 每次打开传输都会分配新的代次号。
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<TransportEnvelope>,
}

impl TransportEvents {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<TransportEnvelope>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, data: Vec<u8>) {
        self.emit(TransportEvent::Message(data));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(TransportEvent::Error(message.into()));
    }

    pub fn closed(&self, code: u16, reason: impl Into<String>) {
        self.emit(TransportEvent::Closed {
            code,
            reason: reason.into(),
        });
    }

    fn emit(&self, event: TransportEvent) {
        // 会话已销毁时接收端不存在，事件直接丢弃
        let _ = self.tx.send(TransportEnvelope {
            generation: self.generation,
            event,
        });
    }
}

/// 已打开的传输句柄
pub trait Transport: Send + Sync {
    /// 发送一帧
    fn send(&self, frame: OutboundFrame) -> Result<(), TerminalError>;

    /// 关闭传输。关闭后不再回送任何事件。
    fn close(&self);
}

/// 传输连接器
pub trait TransportConnector: Send + Sync {
    /// 打开到端点的传输
    ///
    /// 连接是异步建立的：成功时通过 `events` 回送 `Opened`。只有无法创建传输时
    /// 才同步返回错误。
    fn open(
        &self,
        endpoint: &Url,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TerminalError>;
}
