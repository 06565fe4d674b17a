//! 终端尺寸协调器
//!
//! 监听页面视口 resize，按宿主容器尺寸重新计算终端尺寸，更新模拟器，
//! 并在连接打开时发送 `resize` 控制消息。相同尺寸不会重复发送。

use tokio::sync::mpsc;

use super::connection::ConnectionManager;
use super::emulator::{Geometry, TerminalEmulator};
use super::host::CellMetrics;
use super::page::{ListenerId, Page};
use super::protocol::{ControlMessage, OutboundFrame};

/// 尺寸协调器
pub struct ResizeCoordinator {
    cell: CellMetrics,
    listener: Option<ListenerId>,
    /// 最近一次发送到线路上的尺寸
    last_sent: Option<Geometry>,
}

impl ResizeCoordinator {
    /// 在页面上注册 resize 监听器
    pub fn attach(page: &Page, cell: CellMetrics) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (listener, rx) = page.add_resize_listener();
        (
            Self {
                cell,
                listener: Some(listener),
                last_sent: None,
            },
            rx,
        )
    }

    pub fn is_attached(&self) -> bool {
        self.listener.is_some()
    }

    pub fn last_sent(&self) -> Option<Geometry> {
        self.last_sent
    }

    /// 按宿主容器尺寸重新计算终端尺寸
    ///
    /// 返回新的尺寸（与之前不同时）。容器不可测量时跳过。
    pub fn fit(
        &mut self,
        emulator: &mut TerminalEmulator,
        connection: &ConnectionManager,
    ) -> Option<Geometry> {
        let changed = emulator
            .host_size()
            .and_then(|size| Geometry::fit(size, self.cell))
            .filter(|geometry| *geometry != emulator.geometry());

        if let Some(geometry) = changed {
            tracing::debug!("[尺寸] {} -> {}", emulator.geometry(), geometry);
            emulator.resize(geometry);
        }

        self.sync(emulator, connection);
        changed
    }

    /// 连接打开时把模拟器当前尺寸同步到线路上
    pub fn sync(&mut self, emulator: &TerminalEmulator, connection: &ConnectionManager) -> bool {
        if !connection.is_open() {
            return false;
        }

        let geometry = emulator.geometry();
        if self.last_sent == Some(geometry) {
            return false;
        }

        if connection.send(OutboundFrame::Control(ControlMessage::resize(geometry))) {
            tracing::debug!("[尺寸] 已发送 resize {}", geometry);
            self.last_sent = Some(geometry);
            true
        } else {
            false
        }
    }

    /// 新传输打开后线路上还没有尺寸信息
    pub fn reset_wire(&mut self) {
        self.last_sent = None;
    }

    /// 移除 resize 监听器
    pub fn detach(&mut self, page: &Page) {
        if let Some(listener) = self.listener.take() {
            page.remove_resize_listener(listener);
        }
    }
}
