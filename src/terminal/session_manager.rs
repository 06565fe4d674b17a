//! 终端会话注册表
//!
//! 每个页面一个注册表，管理当前页面唯一的终端会话。
//!
//! ## 功能
//! - `setup` 幂等：同一标识重复调用只会切换宿主显示面
//! - 首次创建会话时注册页面卸载钩子（每个注册表最多一次）
//! - 状态变化通过观察者和广播通知 UI

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::error::TerminalError;
use super::events::{SessionStatus, SessionStatusEvent};
use super::host::HostSurface;
use super::identity::{SessionIdentity, DEFAULT_PATH_PREFIX};
use super::observer::{SessionObserver, StatusSubject};
use super::page::Page;
use super::session::{BridgeOptions, Session, SessionMetadata};
use super::transport::TransportConnector;

/// 终端会话注册表
pub struct SessionRegistry {
    /// 页面上下文
    page: Arc<Page>,
    /// 传输连接器
    connector: Arc<dyn TransportConnector>,
    /// 会话参数
    options: BridgeOptions,
    /// 端点路径前缀
    path_prefix: String,
    /// 当前会话
    active: Mutex<Option<Arc<Session>>>,
    /// 卸载钩子是否已注册
    unload_hook_installed: AtomicBool,
    /// 状态主题
    subject: Arc<StatusSubject>,
    self_ref: Weak<SessionRegistry>,
}

impl SessionRegistry {
    /// 创建注册表
    pub fn new(
        page: Arc<Page>,
        connector: Arc<dyn TransportConnector>,
        options: BridgeOptions,
        path_prefix: impl Into<String>,
    ) -> Arc<Self> {
        tracing::info!("[会话注册表] 已初始化: {}", page.origin());
        let path_prefix = path_prefix.into();
        Arc::new_cyclic(|self_ref| Self {
            page,
            connector,
            options,
            path_prefix,
            active: Mutex::new(None),
            unload_hook_installed: AtomicBool::new(false),
            subject: Arc::new(StatusSubject::new()),
            self_ref: self_ref.clone(),
        })
    }

    /// 使用默认路径前缀创建注册表
    pub fn with_defaults(
        page: Arc<Page>,
        connector: Arc<dyn TransportConnector>,
        options: BridgeOptions,
    ) -> Arc<Self> {
        Self::new(page, connector, options, DEFAULT_PATH_PREFIX)
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    /// 准备会话
    ///
    /// 必须在 tokio 运行时内调用。返回是否创建了新会话：
    /// - 没有会话：创建会话，等待后自动连接
    /// - 已有同一标识的会话：切换到新的宿主显示面，返回 false
    /// - 已有其他标识的会话：什么都不做，返回 false
    pub fn setup(&self, identity: &SessionIdentity, host: Option<Arc<dyn HostSurface>>) -> bool {
        let Some(host) = host else {
            tracing::warn!("[会话注册表] {}: {}", TerminalError::HostUnavailable, identity);
            return false;
        };

        if self.page.is_unloaded() {
            tracing::warn!("[会话注册表] 页面已卸载，忽略 setup: {}", identity);
            return false;
        }

        let mut active = self.active.lock();
        if let Some(session) = active.as_ref() {
            if session.identity() == identity {
                let session = session.clone();
                drop(active);
                tracing::debug!("[会话注册表] 复用已有会话: {}", identity);
                session.rebind(host);
            } else {
                tracing::warn!(
                    "[会话注册表] 已有其他会话 {}，忽略 setup: {}",
                    session.identity(),
                    identity
                );
            }
            return false;
        }

        let endpoint = match identity.endpoint(self.page.origin(), &self.path_prefix) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                tracing::error!("[会话注册表] {}", e);
                return false;
            }
        };

        let session = Session::start(
            identity.clone(),
            host,
            endpoint,
            self.page.clone(),
            self.connector.clone(),
            self.subject.clone(),
            &self.options,
        );
        *active = Some(session);
        drop(active);

        self.install_unload_hook();
        true
    }

    /// 用原始 namespace/pod 准备会话，标识无效时返回 false
    pub fn setup_pod(
        &self,
        namespace: &str,
        pod: &str,
        host: Option<Arc<dyn HostSurface>>,
    ) -> bool {
        match SessionIdentity::new(namespace, pod) {
            Ok(identity) => self.setup(&identity, host),
            Err(e) => {
                tracing::warn!("[会话注册表] {}", e);
                false
            }
        }
    }

    /// 发起连接（手动重连也走这里）
    pub fn connect(&self, identity: &SessionIdentity) -> bool {
        match self.session(identity) {
            Ok(session) => session.connect(),
            Err(e) => {
                tracing::debug!("[会话注册表] 忽略连接请求: {}", e);
                false
            }
        }
    }

    /// 销毁会话，可重复调用
    pub fn teardown(&self, identity: &SessionIdentity) -> bool {
        let session = {
            let mut active = self.active.lock();
            match active.as_ref() {
                Some(session) if session.identity() == identity => active.take(),
                _ => None,
            }
        };

        match session {
            Some(session) => session.teardown(),
            None => false,
        }
    }

    /// 销毁当前会话（页面卸载时调用）
    pub fn teardown_active(&self) -> bool {
        let session = self.active.lock().take();
        match session {
            Some(session) => session.teardown(),
            None => false,
        }
    }

    /// 转发按键输入，返回是否发送
    pub fn input(&self, identity: &SessionIdentity, bytes: &[u8]) -> Result<bool, TerminalError> {
        self.session(identity)?.input(bytes)
    }

    pub fn status(&self, identity: &SessionIdentity) -> Option<SessionStatus> {
        self.session(identity).ok().map(|session| session.status())
    }

    pub fn metadata(&self, identity: &SessionIdentity) -> Option<SessionMetadata> {
        self.session(identity).ok().map(|session| session.metadata())
    }

    pub fn screen_contents(&self, identity: &SessionIdentity) -> Option<String> {
        self.session(identity).ok().map(|session| session.contents())
    }

    pub fn active_identity(&self) -> Option<SessionIdentity> {
        self.active
            .lock()
            .as_ref()
            .map(|session| session.identity().clone())
    }

    pub fn session_count(&self) -> usize {
        usize::from(self.active.lock().is_some())
    }

    /// 注册状态观察者
    pub fn register_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.subject.register(observer);
    }

    /// 注销状态观察者
    pub fn unregister_observer(&self, name: &str) -> bool {
        self.subject.unregister(name)
    }

    /// 订阅状态事件
    pub fn subscribe(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.subject.subscribe()
    }

    fn session(&self, identity: &SessionIdentity) -> Result<Arc<Session>, TerminalError> {
        self.active
            .lock()
            .as_ref()
            .filter(|session| session.identity() == identity)
            .cloned()
            .ok_or_else(|| TerminalError::SessionNotFound(identity.to_string()))
    }

    fn install_unload_hook(&self) {
        if self.unload_hook_installed.swap(true, Ordering::SeqCst) {
            return;
        }

        let registry = self.self_ref.clone();
        self.page.on_unload(Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.teardown_active();
            }
        }));
        tracing::debug!("[会话注册表] 已注册页面卸载钩子");
    }
}
