//! 会话状态观察者
//!
//! UI 绑定层通过注册观察者或订阅广播来感知会话状态，不直接耦合
//! setup/teardown 的调用时机。

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::events::SessionStatusEvent;

/// 会话状态观察者
pub trait SessionObserver: Send + Sync {
    /// 观察者名称（用于日志和注销）
    fn name(&self) -> &str;

    /// 处理状态变化
    fn on_status_changed(&self, event: &SessionStatusEvent) -> Result<(), String>;

    /// 是否对该事件感兴趣，默认全部感兴趣
    fn is_interested_in(&self, _event: &SessionStatusEvent) -> bool {
        true
    }

    /// 优先级（数字越小越先通知），默认 100
    fn priority(&self) -> i32 {
        100
    }
}

/// 函数式观察者
pub struct FnObserver<F>
where
    F: Fn(&SessionStatusEvent) -> Result<(), String> + Send + Sync,
{
    name: String,
    priority: i32,
    handler: F,
}

impl<F> FnObserver<F>
where
    F: Fn(&SessionStatusEvent) -> Result<(), String> + Send + Sync,
{
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            priority: 100,
            handler,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<F> SessionObserver for FnObserver<F>
where
    F: Fn(&SessionStatusEvent) -> Result<(), String> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn on_status_changed(&self, event: &SessionStatusEvent) -> Result<(), String> {
        (self.handler)(event)
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 状态主题
///
/// 管理观察者的注册、注销和通知，同时提供广播订阅。
pub struct StatusSubject {
    /// 观察者列表（按优先级排序）
    observers: RwLock<BTreeMap<i32, Vec<Arc<dyn SessionObserver>>>>,
    /// 事件广播通道
    event_tx: broadcast::Sender<SessionStatusEvent>,
}

impl StatusSubject {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            observers: RwLock::new(BTreeMap::new()),
            event_tx,
        }
    }

    /// 注册观察者
    pub fn register(&self, observer: Arc<dyn SessionObserver>) {
        let priority = observer.priority();
        let name = observer.name().to_string();

        self.observers
            .write()
            .entry(priority)
            .or_default()
            .push(observer);

        tracing::debug!("[会话注册表] 注册观察者: {} (优先级: {})", name, priority);
    }

    /// 注销观察者（按名称）
    pub fn unregister(&self, name: &str) -> bool {
        let mut observers = self.observers.write();
        let before: usize = observers.values().map(|v| v.len()).sum();
        for entries in observers.values_mut() {
            entries.retain(|o| o.name() != name);
        }
        observers.retain(|_, v| !v.is_empty());
        let after: usize = observers.values().map(|v| v.len()).sum();

        tracing::debug!("[会话注册表] 注销观察者: {}", name);
        before != after
    }

    /// 订阅事件广播
    pub fn subscribe(&self) -> broadcast::Receiver<SessionStatusEvent> {
        self.event_tx.subscribe()
    }

    /// 通知所有观察者并广播
    ///
    /// 调用方不能持有会话锁。
    pub fn notify(&self, event: &SessionStatusEvent) {
        let observers: Vec<Arc<dyn SessionObserver>> = {
            let observers = self.observers.read();
            observers
                .values()
                .flatten()
                .filter(|o| o.is_interested_in(event))
                .cloned()
                .collect()
        };

        for observer in observers {
            if let Err(e) = observer.on_status_changed(event) {
                tracing::error!("[会话注册表] 观察者 {} 处理失败: {}", observer.name(), e);
            }
        }

        let _ = self.event_tx.send(event.clone());
    }

    pub fn observer_count(&self) -> usize {
        self.observers.read().values().map(|v| v.len()).sum()
    }

    pub fn observer_names(&self) -> Vec<String> {
        self.observers
            .read()
            .values()
            .flatten()
            .map(|o| o.name().to_string())
            .collect()
    }
}

impl Default for StatusSubject {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::events::SessionStatus;
    use crate::terminal::identity::SessionIdentity;
    use parking_lot::Mutex;

    fn event(status: SessionStatus) -> SessionStatusEvent {
        SessionStatusEvent {
            session_id: "s-1".to_string(),
            identity: SessionIdentity::new("lab1", "p1").unwrap(),
            previous: SessionStatus::Idle,
            status,
            error_kind: None,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn test_priority_order() {
        let subject = StatusSubject::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (name, priority) in [("low", 100), ("high", 10), ("medium", 50)] {
            let order = order.clone();
            let observer = FnObserver::new(name, move |_event| {
                order.lock().push(name);
                Ok(())
            })
            .with_priority(priority);
            subject.register(Arc::new(observer));
        }

        subject.notify(&event(SessionStatus::Connecting));
        assert_eq!(*order.lock(), vec!["high", "medium", "low"]);
    }

    #[test]
    fn test_unregister() {
        let subject = StatusSubject::new();
        subject.register(Arc::new(FnObserver::new("ui", |_| Ok(()))));
        assert_eq!(subject.observer_count(), 1);

        assert!(subject.unregister("ui"));
        assert!(!subject.unregister("ui"));
        assert_eq!(subject.observer_count(), 0);
        assert!(subject.observer_names().is_empty());
    }

    #[test]
    fn test_failing_observer_does_not_block_others() {
        let subject = StatusSubject::new();
        let seen = Arc::new(Mutex::new(0));

        subject.register(Arc::new(
            FnObserver::new("broken", |_| Err("boom".to_string())).with_priority(1),
        ));
        let counter = seen.clone();
        subject.register(Arc::new(FnObserver::new("counter", move |_| {
            *counter.lock() += 1;
            Ok(())
        })));

        subject.notify(&event(SessionStatus::Open));
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn test_broadcast_subscription() {
        let subject = StatusSubject::new();
        let mut rx = subject.subscribe();
        subject.notify(&event(SessionStatus::Errored));
        let received = rx.try_recv().unwrap();
        assert_eq!(received.status, SessionStatus::Errored);
    }
}
