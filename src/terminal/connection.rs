//! 连接管理器
//!
//! 管理单个流式传输的生命周期：连接、发送、接收、超时、错误和关闭。
//!
//! ## 状态机
//! `Disconnected -> Connecting -> Open -> (Disconnected | Errored)`
//!
//! 传输错误后到达的关闭事件把 `Errored` 转为 `Disconnected`。没有自动重试，
//! 只有显式调用 `connect()` 才会重新连接。
//!
//! ## 代次
//! 每次打开传输代次号加一，超时或主动关闭也会让代次号前进，旧传输迟到的事件
//! 和旧定时器一律丢弃。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;

use super::emulator::{notices, TerminalEmulator};
use super::events::{ConnectionState, ErrorKind};
use super::protocol::OutboundFrame;
use super::transport::{
    Transport, TransportConnector, TransportEnvelope, TransportEvent, TransportEvents,
};

/// 默认连接超时 (30 秒)
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// 连接管理器
pub struct ConnectionManager {
    /// 终端端点
    endpoint: Url,
    /// 传输连接器
    connector: Arc<dyn TransportConnector>,
    /// 传输事件发送端
    events_tx: mpsc::UnboundedSender<TransportEnvelope>,
    /// 超时通知发送端（携带代次号）
    timeout_tx: mpsc::UnboundedSender<u64>,
    /// 连接超时
    connect_timeout: Duration,
    /// 当前状态
    state: ConnectionState,
    /// 当前传输
    transport: Option<Arc<dyn Transport>>,
    /// 当前代次
    generation: u64,
    /// 连接超时定时器
    timeout_task: Option<JoinHandle<()>>,
    /// 上次成功连接后的连接尝试次数
    attempts: u32,
    /// 最近一次错误
    last_error: Option<ErrorKind>,
}

impl ConnectionManager {
    pub fn new(
        endpoint: Url,
        connector: Arc<dyn TransportConnector>,
        events_tx: mpsc::UnboundedSender<TransportEnvelope>,
        timeout_tx: mpsc::UnboundedSender<u64>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            connector,
            events_tx,
            timeout_tx,
            connect_timeout,
            state: ConnectionState::Disconnected,
            transport: None,
            generation: 0,
            timeout_task: None,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 是否发起过连接
    pub fn has_attempted(&self) -> bool {
        self.generation > 0
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    /// 发起连接
    ///
    /// 已连接或正在连接时不做任何事。返回是否打开了新的传输，
    /// 创建传输失败时状态转为 `Errored` 并返回 false。
    pub fn connect(&mut self, emulator: &mut TerminalEmulator) -> bool {
        match self.state {
            ConnectionState::Open => {
                tracing::debug!("[连接] 已连接，忽略连接请求");
                return false;
            }
            ConnectionState::Connecting => {
                tracing::debug!("[连接] 正在连接，忽略连接请求");
                return false;
            }
            ConnectionState::Disconnected | ConnectionState::Errored => {}
        }

        self.retire_transport();
        self.generation += 1;
        self.attempts += 1;
        self.state = ConnectionState::Connecting;

        emulator.clear();
        emulator.writeln(notices::CONNECTING);

        tracing::info!(
            "[连接] 开始连接 {} (代次 {}, 第 {} 次尝试)",
            self.endpoint,
            self.generation,
            self.attempts
        );

        let events = TransportEvents::new(self.generation, self.events_tx.clone());
        match self.connector.open(&self.endpoint, events) {
            Ok(transport) => {
                self.transport = Some(transport);
                self.start_timeout();
            }
            Err(e) => {
                tracing::error!("[连接] 创建传输失败: {}", e);
                self.state = ConnectionState::Errored;
                self.last_error = Some(ErrorKind::TransportError);
                emulator.writeln(notices::CREATE_FAILED);
                return false;
            }
        }

        true
    }

    /// 处理传输事件，返回状态是否变化
    pub fn handle_event(
        &mut self,
        envelope: TransportEnvelope,
        emulator: &mut TerminalEmulator,
    ) -> bool {
        if envelope.generation != self.generation {
            tracing::debug!(
                "[连接] 丢弃过期传输事件 (代次 {}, 当前 {})",
                envelope.generation,
                self.generation
            );
            return false;
        }

        match envelope.event {
            TransportEvent::Opened => self.on_open(emulator),
            TransportEvent::Message(data) => {
                if self.state == ConnectionState::Open {
                    emulator.write(&data);
                }
                false
            }
            TransportEvent::Error(message) => self.on_error(&message, emulator),
            TransportEvent::Closed { code, reason } => self.on_close(code, &reason, emulator),
        }
    }

    /// 处理连接超时
    pub fn handle_timeout(&mut self, generation: u64, emulator: &mut TerminalEmulator) -> bool {
        if generation != self.generation || self.state != ConnectionState::Connecting {
            tracing::debug!("[连接] 忽略过期的超时定时器 (代次 {})", generation);
            return false;
        }

        self.timeout_task = None;
        tracing::warn!(
            "[连接] {} 秒内未建立连接: {}",
            self.connect_timeout.as_secs(),
            self.endpoint
        );

        self.retire_transport();
        self.state = ConnectionState::Errored;
        self.last_error = Some(ErrorKind::ConnectTimeout);
        emulator.writeln(&notices::connect_timeout(self.connect_timeout.as_secs()));
        true
    }

    /// 发送一帧，只在已连接时发送，否则直接丢弃
    pub fn send(&self, frame: OutboundFrame) -> bool {
        if self.state != ConnectionState::Open {
            tracing::trace!("[连接] 未连接，丢弃出站帧");
            return false;
        }

        let Some(transport) = self.transport.as_ref() else {
            return false;
        };

        match transport.send(frame) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[连接] 发送失败: {}", e);
                false
            }
        }
    }

    /// 关闭连接（会话销毁时调用）
    pub fn close(&mut self) {
        self.retire_transport();
        self.state = ConnectionState::Disconnected;
    }

    fn on_open(&mut self, emulator: &mut TerminalEmulator) -> bool {
        if self.state != ConnectionState::Connecting {
            return false;
        }

        self.cancel_timeout();
        self.state = ConnectionState::Open;
        self.attempts = 0;
        self.last_error = None;

        tracing::info!("[连接] 连接已建立: {}", self.endpoint);

        emulator.clear();
        emulator.writeln(notices::ESTABLISHED);

        if let Some(transport) = self.transport.clone() {
            emulator.on_data(Box::new(move |data| {
                if let Err(e) = transport.send(OutboundFrame::Input(data.to_vec())) {
                    tracing::debug!("[连接] 按键输入发送失败: {}", e);
                }
            }));
        }

        true
    }

    fn on_error(&mut self, message: &str, emulator: &mut TerminalEmulator) -> bool {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Open
        ) {
            return false;
        }

        tracing::error!("[连接] 传输错误: {}", message);
        self.cancel_timeout();
        emulator.clear_on_data();
        // 保留代次号，让紧随其后的关闭事件把状态转为 Disconnected
        self.transport = None;
        self.state = ConnectionState::Errored;
        self.last_error = Some(ErrorKind::TransportError);
        emulator.writeln(notices::TRANSPORT_ERROR);
        true
    }

    fn on_close(&mut self, code: u16, reason: &str, emulator: &mut TerminalEmulator) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Open => {
                tracing::info!("[连接] 连接已关闭: code={}, reason={:?}", code, reason);
                self.cancel_timeout();
                emulator.clear_on_data();
                self.transport = None;
                self.state = ConnectionState::Disconnected;
                self.last_error = Some(ErrorKind::UnexpectedClose);
                emulator.writeln(&notices::closed(code));
                true
            }
            ConnectionState::Errored => {
                tracing::info!("[连接] 传输错误后连接关闭: code={}", code);
                self.state = ConnectionState::Disconnected;
                true
            }
            ConnectionState::Disconnected => false,
        }
    }

    fn start_timeout(&mut self) {
        self.cancel_timeout();

        let generation = self.generation;
        let timeout = self.connect_timeout;
        let tx = self.timeout_tx.clone();
        self.timeout_task = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(generation);
        }));
    }

    fn cancel_timeout(&mut self) {
        if let Some(task) = self.timeout_task.take() {
            task.abort();
        }
    }

    /// 关闭当前传输并让代次号前进，旧传输的后续事件都会被丢弃
    fn retire_transport(&mut self) {
        self.cancel_timeout();
        if let Some(transport) = self.transport.take() {
            transport.close();
            self.generation += 1;
            tracing::debug!("[连接] 已关闭旧传输");
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.retire_transport();
    }
}
