//! 终端会话桥接模块
//!
//! 把网页内嵌的字符终端桥接到远程 Pod 里的 shell：按键经 WebSocket 发往后端，
//! shell 输出原样写回终端，终端尺寸变化以 `resize` 控制消息同步。
//!
//! ## 模块结构
//! - `error` - 错误类型定义
//! - `events` - 状态与事件定义
//! - `identity` - 会话标识与端点推导
//! - `protocol` - 线路协议
//! - `host` - 宿主显示面抽象
//! - `page` - 页面上下文（resize 与卸载钩子）
//! - `emulator` - 终端模拟器适配器
//! - `transport` - 传输层抽象与 WebSocket 实现
//! - `connection` - 连接管理器
//! - `resize` - 尺寸协调器
//! - `observer` - 状态观察者
//! - `session` - 单个会话
//! - `session_manager` - 会话注册表
//!
//! ## 使用示例
//! ```ignore
//! use labterm_lib::terminal::{SessionIdentity, SessionRegistry, WsConnector};
//!
//! let registry = SessionRegistry::with_defaults(page, Arc::new(WsConnector::new()), options);
//! let identity = SessionIdentity::new("lab-ns", "lab-pod")?;
//! registry.setup(&identity, Some(host));
//! registry.input(&identity, b"ls -la\r")?;
//! ```

pub mod connection;
pub mod emulator;
pub mod error;
pub mod events;
pub mod host;
pub mod identity;
pub mod observer;
pub mod page;
pub mod protocol;
pub mod resize;
pub mod session;
pub mod session_manager;
pub mod transport;

#[cfg(test)]
mod testing;

// 重新导出常用类型
pub use emulator::{Geometry, TerminalEmulator, DEFAULT_COLS, DEFAULT_ROWS};
pub use error::TerminalError;
pub use events::{ConnectionState, ErrorKind, SessionStatus, SessionStatusEvent};
pub use host::{CellMetrics, HostSurface, PixelSize};
pub use identity::{SessionIdentity, DEFAULT_PATH_PREFIX};
pub use observer::{FnObserver, SessionObserver};
pub use page::Page;
pub use session::{BridgeOptions, SessionMetadata};
pub use session_manager::SessionRegistry;
pub use transport::{Transport, TransportConnector, WsConnector};
