//! 测试支撑：内存传输、可调尺寸的宿主和常用构造函数

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use url::Url;

use super::error::TerminalError;
use super::host::{HostSurface, PixelSize};
use super::identity::SessionIdentity;
use super::page::Page;
use super::protocol::{ControlMessage, OutboundFrame};
use super::session::BridgeOptions;
use super::session_manager::SessionRegistry;
use super::transport::{Transport, TransportConnector, TransportEvents};

/// 内存传输
///
/// 事件由测试手动触发。关闭后仍然可以触发事件，用来验证过期事件会被丢弃。
pub struct MemoryTransport {
    endpoint: Url,
    events: TransportEvents,
    sent: Mutex<Vec<OutboundFrame>>,
    closed: AtomicBool,
}

impl MemoryTransport {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn fire_open(&self) {
        self.events.opened();
    }

    pub fn fire_message(&self, data: &[u8]) {
        self.events.message(data.to_vec());
    }

    pub fn fire_error(&self, message: &str) {
        self.events.error(message);
    }

    pub fn fire_close(&self, code: u16) {
        self.events.closed(code, "");
    }

    pub fn sent(&self) -> Vec<OutboundFrame> {
        self.sent.lock().clone()
    }

    /// 已发送的按键输入（拼接）
    pub fn sent_input(&self) -> Vec<u8> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Input(bytes) => Some(bytes.clone()),
                OutboundFrame::Control(_) => None,
            })
            .flatten()
            .collect()
    }

    pub fn resize_messages(&self) -> Vec<ControlMessage> {
        self.sent
            .lock()
            .iter()
            .filter_map(|frame| match frame {
                OutboundFrame::Control(msg) => Some(*msg),
                OutboundFrame::Input(_) => None,
            })
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn send(&self, frame: OutboundFrame) -> Result<(), TerminalError> {
        if self.is_closed() {
            return Err(TerminalError::SendFailed("transport closed".to_string()));
        }
        self.sent.lock().push(frame);
        Ok(())
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// 内存连接器，记录每次打开的传输
#[derive(Default)]
pub struct MemoryConnector {
    transports: Mutex<Vec<Arc<MemoryTransport>>>,
    fail_next_open: AtomicBool,
}

impl MemoryConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open_count(&self) -> usize {
        self.transports.lock().len()
    }

    pub fn transports(&self) -> Vec<Arc<MemoryTransport>> {
        self.transports.lock().clone()
    }

    /// 最近一次打开的传输
    pub fn last(&self) -> Arc<MemoryTransport> {
        self.transports
            .lock()
            .last()
            .cloned()
            .expect("no transport opened")
    }

    /// 让下一次打开同步失败
    pub fn fail_next_open(&self) {
        self.fail_next_open.store(true, Ordering::SeqCst);
    }
}

impl TransportConnector for MemoryConnector {
    fn open(
        &self,
        endpoint: &Url,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TerminalError> {
        if self.fail_next_open.swap(false, Ordering::SeqCst) {
            return Err(TerminalError::TransportFailed("refused".to_string()));
        }

        let transport = Arc::new(MemoryTransport {
            endpoint: endpoint.clone(),
            events,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        });
        self.transports.lock().push(transport.clone());
        Ok(transport)
    }
}

/// 可调尺寸的测试宿主
pub struct TestHost {
    size: Mutex<PixelSize>,
    rendered: Mutex<Vec<u8>>,
    releases: AtomicUsize,
    fail_release: AtomicBool,
}

impl TestHost {
    pub fn new(width: f64, height: f64) -> Arc<Self> {
        Arc::new(Self {
            size: Mutex::new(PixelSize::new(width, height)),
            rendered: Mutex::new(Vec::new()),
            releases: AtomicUsize::new(0),
            fail_release: AtomicBool::new(false),
        })
    }

    /// 80x24 的宿主
    pub fn standard() -> Arc<Self> {
        Self::new(720.0, 408.0)
    }

    pub fn set_size(&self, width: f64, height: f64) {
        *self.size.lock() = PixelSize::new(width, height);
    }

    pub fn rendered(&self) -> String {
        String::from_utf8_lossy(&self.rendered.lock()).into_owned()
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn fail_release(&self) {
        self.fail_release.store(true, Ordering::SeqCst);
    }
}

impl HostSurface for TestHost {
    fn pixel_size(&self) -> PixelSize {
        *self.size.lock()
    }

    fn render(&self, bytes: &[u8]) {
        self.rendered.lock().extend_from_slice(bytes);
    }

    fn release(&self) -> Result<(), String> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if self.fail_release.load(Ordering::SeqCst) {
            Err("surface already detached".to_string())
        } else {
            Ok(())
        }
    }
}

pub fn surface(host: &Arc<TestHost>) -> Option<Arc<dyn HostSurface>> {
    Some(host.clone() as Arc<dyn HostSurface>)
}

pub fn page() -> Arc<Page> {
    Arc::new(Page::new(Url::parse("http://localhost:8080").unwrap()))
}

pub fn identity() -> SessionIdentity {
    SessionIdentity::new("lab-ns", "lab-pod").unwrap()
}

pub fn registry(page: &Arc<Page>, connector: &Arc<MemoryConnector>) -> Arc<SessionRegistry> {
    registry_with(page, connector, BridgeOptions::default())
}

pub fn registry_with(
    page: &Arc<Page>,
    connector: &Arc<MemoryConnector>,
    options: BridgeOptions,
) -> Arc<SessionRegistry> {
    SessionRegistry::with_defaults(page.clone(), connector.clone(), options)
}

/// 让驱动任务处理完已排队的事件
pub async fn flush() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// 推进模拟时间并处理到期事件
pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(std::time::Duration::from_millis(ms)).await;
    flush().await;
}
