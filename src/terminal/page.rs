//! 页面上下文
//!
//! 替代浏览器的 `window`：提供页面来源、视口 resize 监听和页面卸载钩子。
//! 每个页面构造一次，注入到会话注册表中，测试可以各自创建独立页面。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

/// resize 监听器 ID
pub type ListenerId = u64;

/// 页面卸载钩子
pub type UnloadHook = Box<dyn FnOnce() + Send>;

/// 页面上下文
pub struct Page {
    origin: Url,
    next_listener_id: AtomicU64,
    resize_listeners: Mutex<HashMap<ListenerId, mpsc::UnboundedSender<()>>>,
    unload_hooks: Mutex<Vec<UnloadHook>>,
    unloaded: AtomicBool,
}

impl Page {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            next_listener_id: AtomicU64::new(1),
            resize_listeners: Mutex::new(HashMap::new()),
            unload_hooks: Mutex::new(Vec::new()),
            unloaded: AtomicBool::new(false),
        }
    }

    /// 页面来源（决定 ws/wss 以及主机）
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// 注册视口 resize 监听器
    pub fn add_resize_listener(&self) -> (ListenerId, mpsc::UnboundedReceiver<()>) {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.resize_listeners.lock().insert(id, tx);
        tracing::debug!("[页面] 注册 resize 监听器: {}", id);
        (id, rx)
    }

    /// 移除视口 resize 监听器
    pub fn remove_resize_listener(&self, id: ListenerId) -> bool {
        let removed = self.resize_listeners.lock().remove(&id).is_some();
        if removed {
            tracing::debug!("[页面] 移除 resize 监听器: {}", id);
        }
        removed
    }

    /// 当前 resize 监听器数量
    pub fn resize_listener_count(&self) -> usize {
        self.resize_listeners.lock().len()
    }

    /// 派发视口 resize 事件，返回收到通知的监听器数量
    pub fn dispatch_resize(&self) -> usize {
        let mut listeners = self.resize_listeners.lock();
        // 接收端已经丢弃的监听器顺便清理掉
        listeners.retain(|_, tx| tx.send(()).is_ok());
        listeners.len()
    }

    /// 注册页面卸载钩子
    pub fn on_unload(&self, hook: UnloadHook) {
        self.unload_hooks.lock().push(hook);
    }

    /// 已注册的卸载钩子数量
    pub fn unload_hook_count(&self) -> usize {
        self.unload_hooks.lock().len()
    }

    /// 页面是否已卸载
    pub fn is_unloaded(&self) -> bool {
        self.unloaded.load(Ordering::SeqCst)
    }

    /// 派发页面卸载事件
    ///
    /// 钩子在锁外执行，每个钩子只执行一次。
    pub fn dispatch_unload(&self) {
        if self.unloaded.swap(true, Ordering::SeqCst) {
            return;
        }

        let hooks = std::mem::take(&mut *self.unload_hooks.lock());
        tracing::info!("[页面] 页面卸载，执行 {} 个钩子", hooks.len());
        for hook in hooks {
            hook();
        }
    }
}
