//! 终端会话
//!
//! 一个会话把模拟器、连接管理器和尺寸协调器绑在一起，状态放在同一把锁后面。
//! 所有异步输入（传输事件、连接超时、等待定时器、视口 resize）通过通道送到
//! 每个会话唯一的驱动任务里逐个处理，状态变化在释放锁之后通知观察者。

use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

use super::connection::{ConnectionManager, DEFAULT_CONNECT_TIMEOUT};
use super::emulator::{
    notices, Geometry, TerminalEmulator, DEFAULT_HISTORY_BYTES, DEFAULT_SCROLLBACK,
};
use super::error::TerminalError;
use super::events::{ErrorKind, SessionStatus, SessionStatusEvent};
use super::host::{CellMetrics, HostSurface};
use super::identity::SessionIdentity;
use super::observer::StatusSubject;
use super::page::Page;
use super::resize::ResizeCoordinator;
use super::transport::{TransportConnector, TransportEnvelope};

/// 默认等待时间 (2 秒)，给 Pod 留出启动 shell 的时间
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// 会话参数
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// 连接超时
    pub connect_timeout: Duration,
    /// 创建会话到首次连接之间的等待时间
    pub settle_delay: Duration,
    /// 字符单元尺寸
    pub cell: CellMetrics,
    /// 滚动历史行数
    pub scrollback: usize,
    /// 输出历史缓冲区大小
    pub history_bytes: usize,
    /// 宿主不可测量时使用的尺寸
    pub default_geometry: Geometry,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            settle_delay: DEFAULT_SETTLE_DELAY,
            cell: CellMetrics::default(),
            scrollback: DEFAULT_SCROLLBACK,
            history_bytes: DEFAULT_HISTORY_BYTES,
            default_geometry: Geometry::default(),
        }
    }
}

/// 会话元数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// 会话 ID
    pub id: String,
    /// 会话标识
    pub identity: SessionIdentity,
    /// 会话状态
    pub status: SessionStatus,
    /// 是否可以手动重连
    pub retry_eligible: bool,
    /// 最近一次错误种类
    pub last_error_kind: Option<ErrorKind>,
    /// 创建时间（Unix 时间戳，毫秒）
    pub created_at: i64,
    /// 终端行数
    pub rows: u16,
    /// 终端列数
    pub cols: u16,
    /// 上次连接成功后的连接尝试次数
    pub connect_attempts: u32,
}

struct SessionState {
    status: SessionStatus,
    last_error: Option<ErrorKind>,
    emulator: TerminalEmulator,
    connection: ConnectionManager,
    resize: ResizeCoordinator,
    settle_task: Option<JoinHandle<()>>,
}

/// 终端会话
pub struct Session {
    id: String,
    identity: SessionIdentity,
    created_at: i64,
    page: Arc<Page>,
    subject: Arc<StatusSubject>,
    state: Mutex<SessionState>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// 创建会话并启动驱动任务
    ///
    /// 必须在 tokio 运行时内调用。创建后立即按宿主尺寸适配一次，
    /// 等待 `settle_delay` 后自动发起第一次连接。
    pub fn start(
        identity: SessionIdentity,
        host: Arc<dyn HostSurface>,
        endpoint: Url,
        page: Arc<Page>,
        connector: Arc<dyn TransportConnector>,
        subject: Arc<StatusSubject>,
        options: &BridgeOptions,
    ) -> Arc<Self> {
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (timeout_tx, timeout_rx) = mpsc::unbounded_channel();
        let (settle_tx, settle_rx) = mpsc::unbounded_channel();

        let mut emulator = TerminalEmulator::new(
            host,
            options.default_geometry,
            options.scrollback,
            options.history_bytes,
        );
        let connection = ConnectionManager::new(
            endpoint,
            connector,
            transport_tx,
            timeout_tx,
            options.connect_timeout,
        );
        let (mut resize, resize_rx) = ResizeCoordinator::attach(&page, options.cell);
        resize.fit(&mut emulator, &connection);
        emulator.writeln(notices::INITIALIZED);

        let session = Arc::new(Self {
            id: Uuid::new_v4().to_string(),
            identity,
            created_at: Utc::now().timestamp_millis(),
            page,
            subject,
            state: Mutex::new(SessionState {
                status: SessionStatus::Idle,
                last_error: None,
                emulator,
                connection,
                resize,
                settle_task: None,
            }),
            driver: Mutex::new(None),
        });

        let settle_delay = options.settle_delay;
        let settle_task = tokio::spawn(async move {
            tokio::time::sleep(settle_delay).await;
            let _ = settle_tx.send(());
        });
        session.state.lock().settle_task = Some(settle_task);

        let driver = tokio::spawn(drive(
            Arc::downgrade(&session),
            transport_rx,
            timeout_rx,
            settle_rx,
            resize_rx,
        ));
        *session.driver.lock() = Some(driver);

        tracing::info!(
            "[终端] 创建会话: {} ({}), {} 后连接",
            session.id,
            session.identity,
            humanize(settle_delay)
        );
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn status(&self) -> SessionStatus {
        self.state.lock().status
    }

    pub fn is_closed(&self) -> bool {
        self.status() == SessionStatus::Closed
    }

    /// 会话元数据
    pub fn metadata(&self) -> SessionMetadata {
        let state = self.state.lock();
        let geometry = state.emulator.geometry();
        SessionMetadata {
            id: self.id.clone(),
            identity: self.identity.clone(),
            status: state.status,
            retry_eligible: state.status.is_retry_eligible(),
            last_error_kind: state.last_error,
            created_at: self.created_at,
            rows: geometry.rows,
            cols: geometry.columns,
            connect_attempts: state.connection.attempts(),
        }
    }

    /// 屏幕可见文本
    pub fn contents(&self) -> String {
        self.state.lock().emulator.contents()
    }

    /// 发起连接
    ///
    /// 已连接、正在连接、创建传输失败或会话已销毁时返回 false。
    pub fn connect(&self) -> bool {
        let (started, event) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.status == SessionStatus::Closed {
                return false;
            }

            if let Some(task) = state.settle_task.take() {
                task.abort();
            }
            let started = state.connection.connect(&mut state.emulator);
            (started, self.refresh_status(state))
        };

        self.publish(event);
        started
    }

    /// 切换到新的宿主显示面（UI 重新挂载）
    pub fn rebind(&self, host: Arc<dyn HostSurface>) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.status == SessionStatus::Closed {
            return;
        }

        state.emulator.rebind(host);
        state.resize.fit(&mut state.emulator, &state.connection);
        tracing::info!("[终端] 会话 {} 已重新挂载", self.identity);
    }

    /// 转发按键输入，返回是否发送
    ///
    /// 连接未打开时输入直接丢弃。
    pub fn input(&self, bytes: &[u8]) -> Result<bool, TerminalError> {
        let state = self.state.lock();
        if state.status == SessionStatus::Closed {
            return Err(TerminalError::SessionClosed);
        }
        Ok(state.emulator.key_input(bytes))
    }

    /// 销毁会话
    ///
    /// 关闭连接、移除 resize 监听器并释放模拟器。重复调用返回 false。
    pub fn teardown(&self) -> bool {
        let event = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.status == SessionStatus::Closed {
                return false;
            }

            if let Some(task) = state.settle_task.take() {
                task.abort();
            }
            state.connection.close();
            state.resize.detach(&self.page);
            if let Some(kind) = state.emulator.dispose() {
                state.last_error = Some(kind);
            }

            let previous = state.status;
            state.status = SessionStatus::Closed;
            self.status_event(previous, state)
        };

        if let Some(driver) = self.driver.lock().take() {
            driver.abort();
        }

        tracing::info!("[终端] 销毁会话: {} ({})", self.id, self.identity);
        self.subject.notify(&event);
        true
    }

    fn on_transport(&self, envelope: TransportEnvelope) {
        let event = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.status == SessionStatus::Closed {
                return;
            }

            let changed = state.connection.handle_event(envelope, &mut state.emulator);
            if changed && state.connection.is_open() {
                // 新传输上还没有尺寸信息，先把当前尺寸发过去
                state.resize.reset_wire();
                state.resize.fit(&mut state.emulator, &state.connection);
            }
            self.refresh_status(state)
        };

        self.publish(event);
    }

    fn on_timeout(&self, generation: u64) {
        let event = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.status == SessionStatus::Closed {
                return;
            }

            state.connection.handle_timeout(generation, &mut state.emulator);
            self.refresh_status(state)
        };

        self.publish(event);
    }

    fn on_settled(&self) {
        tracing::debug!("[终端] 等待结束，开始连接: {}", self.identity);
        self.connect();
    }

    fn on_viewport_resize(&self) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.status == SessionStatus::Closed {
            return;
        }
        state.resize.fit(&mut state.emulator, &state.connection);
    }

    /// 根据连接状态推导会话状态，状态变化时返回事件
    fn refresh_status(&self, state: &mut SessionState) -> Option<SessionStatusEvent> {
        if state.status == SessionStatus::Closed {
            return None;
        }

        state.last_error = state.connection.last_error();
        let next = if state.connection.has_attempted() {
            SessionStatus::from(state.connection.state())
        } else {
            SessionStatus::Idle
        };

        if next == state.status {
            return None;
        }

        let previous = state.status;
        state.status = next;
        Some(self.status_event(previous, state))
    }

    fn status_event(&self, previous: SessionStatus, state: &SessionState) -> SessionStatusEvent {
        tracing::info!(
            "[终端] 会话 {} 状态: {:?} -> {:?}",
            self.identity,
            previous,
            state.status
        );
        SessionStatusEvent {
            session_id: self.id.clone(),
            identity: self.identity.clone(),
            previous,
            status: state.status,
            error_kind: state.last_error,
            timestamp_ms: Utc::now().timestamp_millis(),
        }
    }

    fn publish(&self, event: Option<SessionStatusEvent>) {
        if let Some(event) = event {
            self.subject.notify(&event);
        }
    }
}

/// 会话驱动任务
///
/// 只持有弱引用，会话被释放后自动退出。
async fn drive(
    session: Weak<Session>,
    mut transport_rx: mpsc::UnboundedReceiver<TransportEnvelope>,
    mut timeout_rx: mpsc::UnboundedReceiver<u64>,
    mut settle_rx: mpsc::UnboundedReceiver<()>,
    mut resize_rx: mpsc::UnboundedReceiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            Some(envelope) = transport_rx.recv() => {
                let Some(session) = session.upgrade() else { break };
                session.on_transport(envelope);
            }
            Some(generation) = timeout_rx.recv() => {
                let Some(session) = session.upgrade() else { break };
                session.on_timeout(generation);
            }
            Some(()) = settle_rx.recv() => {
                let Some(session) = session.upgrade() else { break };
                session.on_settled();
            }
            Some(()) = resize_rx.recv() => {
                let Some(session) = session.upgrade() else { break };
                session.on_viewport_resize();
            }
            else => break,
        }
    }

    tracing::debug!("[终端] 会话驱动任务结束");
}

fn humanize(duration: Duration) -> String {
    if duration.subsec_millis() == 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
