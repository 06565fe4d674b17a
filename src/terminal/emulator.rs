//! 终端模拟器适配器
//!
//! 封装字符网格显示面，负责渲染字节流并报告当前尺寸，不感知网络。
//!
//! ## 功能
//! - vt100 解析器维护屏幕状态和滚动历史
//! - 原始输出历史（循环缓冲区），宿主重新挂载时回放
//! - 按键事件生产者（`on_data`）
//!
//! ## 架构说明
//! 宿主显示面可以在会话存续期间被替换（UI 重新挂载），适配器本身和历史保持不变。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::events::ErrorKind;
use super::host::{CellMetrics, HostSurface, PixelSize};

/// 默认终端行数
pub const DEFAULT_ROWS: u16 = 24;
/// 默认终端列数
pub const DEFAULT_COLS: u16 = 80;
/// 默认滚动历史行数
pub const DEFAULT_SCROLLBACK: usize = 1000;
/// 输出历史缓冲区默认大小 (1MB)
pub const DEFAULT_HISTORY_BYTES: usize = 1024 * 1024;

const MIN_COLS: u16 = 2;
const MIN_ROWS: u16 = 1;

/// 终端内提示文本
pub mod notices {
    pub const INITIALIZED: &str = "\x1b[1;32m终端已初始化，等待 Pod 就绪...\x1b[0m";
    pub const CONNECTING: &str = "\x1b[1;33m正在连接终端...\x1b[0m";
    pub const ESTABLISHED: &str = "\x1b[1;32m连接已建立，欢迎进入实验环境！\x1b[0m\r\n";
    pub const TRANSPORT_ERROR: &str = "\r\n\x1b[1;31m终端连接出错，请手动重新连接。\x1b[0m";
    pub const CREATE_FAILED: &str = "\r\n\x1b[1;31m无法创建终端连接，请手动重新连接。\x1b[0m";

    pub fn connect_timeout(secs: u64) -> String {
        format!(
            "\r\n\x1b[1;31m{} 秒内未能连接到终端，请稍后手动重新连接。\x1b[0m",
            secs
        )
    }

    pub fn closed(code: u16) -> String {
        format!(
            "\r\n\x1b[1;33m连接已关闭 (代码 {})，请手动重新连接。\x1b[0m",
            code
        )
    }
}

/// 终端尺寸（字符列数 × 行数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Geometry {
    pub columns: u16,
    pub rows: u16,
}

impl Geometry {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self { columns, rows }
    }

    /// 根据容器尺寸和字符单元尺寸计算终端尺寸
    ///
    /// 容器不可测量时返回 `None`。
    pub fn fit(size: PixelSize, cell: CellMetrics) -> Option<Self> {
        if !size.is_measurable() || cell.width <= 0.0 || cell.height <= 0.0 {
            return None;
        }

        let columns = (size.width / cell.width).floor().min(u16::MAX as f64) as u16;
        let rows = (size.height / cell.height).floor().min(u16::MAX as f64) as u16;

        Some(Self {
            columns: columns.max(MIN_COLS),
            rows: rows.max(MIN_ROWS),
        })
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new(DEFAULT_COLS, DEFAULT_ROWS)
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.columns, self.rows)
    }
}

/// 循环缓冲区，用于存储终端输出历史
struct CircularBuffer {
    data: Vec<u8>,
    max_size: usize,
}

impl CircularBuffer {
    fn new(max_size: usize) -> Self {
        Self {
            data: Vec::new(),
            max_size,
        }
    }

    fn append(&mut self, new_data: &[u8]) {
        if self.max_size == 0 {
            return;
        }

        self.data.extend_from_slice(new_data);

        // 超出部分从头部丢弃，起点对齐到安全边界
        if self.data.len() > self.max_size {
            let excess = self.data.len() - self.max_size;
            let start = self.boundary_after(excess);
            self.data.drain(0..start);
        }
    }

    /// 从 `from` 起找到可以安全回放的起点
    ///
    /// 优先从下一行开始，避免回放半截转义序列；没有换行时至少跳过
    /// UTF-8 后续字节。
    fn boundary_after(&self, from: usize) -> usize {
        let rest = &self.data[from..];
        match rest.iter().position(|&b| b == b'\n') {
            Some(pos) => from + pos + 1,
            None => from + rest.iter().take_while(|&&b| b & 0xC0 == 0x80).count(),
        }
    }

    fn get_all(&self) -> Vec<u8> {
        self.data.clone()
    }
}

/// 按键输入处理器
pub type InputHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// 终端模拟器适配器
pub struct TerminalEmulator {
    /// 宿主显示面
    host: Option<Arc<dyn HostSurface>>,
    /// vt100 解析器（释放后为 None）
    parser: Option<vt100::Parser>,
    /// 当前尺寸
    geometry: Geometry,
    /// 原始输出历史
    history: CircularBuffer,
    /// 按键事件订阅者
    on_data: Option<InputHandler>,
}

impl TerminalEmulator {
    /// 创建适配器并绑定到宿主显示面
    pub fn new(
        host: Arc<dyn HostSurface>,
        geometry: Geometry,
        scrollback: usize,
        history_bytes: usize,
    ) -> Self {
        tracing::debug!("[终端] 创建模拟器 ({})", geometry);
        Self {
            host: Some(host),
            parser: Some(vt100::Parser::new(
                geometry.rows.max(MIN_ROWS),
                geometry.columns.max(MIN_COLS),
                scrollback,
            )),
            geometry,
            history: CircularBuffer::new(history_bytes),
            on_data: None,
        }
    }

    /// 渲染字节流
    pub fn write(&mut self, bytes: &[u8]) {
        let Some(parser) = self.parser.as_mut() else {
            tracing::debug!("[终端] 模拟器已释放，丢弃 {} 字节输出", bytes.len());
            return;
        };

        parser.process(bytes);
        self.history.append(bytes);
        if let Some(host) = &self.host {
            host.render(bytes);
        }
    }

    /// 渲染一行文本（追加 CRLF）
    pub fn writeln(&mut self, text: &str) {
        let mut line = String::with_capacity(text.len() + 2);
        line.push_str(text);
        line.push_str("\r\n");
        self.write(line.as_bytes());
    }

    /// 清屏并把光标移到左上角
    pub fn clear(&mut self) {
        self.write(b"\x1b[H\x1b[2J");
    }

    /// 当前尺寸
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// 调整尺寸（重排）
    pub fn resize(&mut self, geometry: Geometry) {
        if let Some(parser) = self.parser.as_mut() {
            parser.set_size(geometry.rows.max(MIN_ROWS), geometry.columns.max(MIN_COLS));
        }
        self.geometry = geometry;
    }

    /// 宿主显示面当前尺寸
    pub fn host_size(&self) -> Option<PixelSize> {
        self.host.as_ref().map(|host| host.pixel_size())
    }

    /// 切换到新的宿主显示面，并回放输出历史
    pub fn rebind(&mut self, host: Arc<dyn HostSurface>) {
        if self.parser.is_none() {
            return;
        }

        // 同一个显示面重新挂载时不释放也不回放
        if let Some(current) = &self.host {
            if Arc::as_ptr(current) as *const () == Arc::as_ptr(&host) as *const () {
                return;
            }
        }

        if let Some(old) = self.host.replace(host.clone()) {
            if let Err(e) = old.release() {
                tracing::warn!("[终端] 释放旧宿主显示面失败: {}", e);
            }
        }

        let history = self.history.get_all();
        if !history.is_empty() {
            host.render(&history);
        }
        tracing::debug!("[终端] 已切换宿主显示面，回放 {} 字节历史", history.len());
    }

    /// 订阅按键事件（替换已有订阅者）
    pub fn on_data(&mut self, handler: InputHandler) {
        self.on_data = Some(handler);
    }

    /// 取消按键事件订阅
    pub fn clear_on_data(&mut self) {
        self.on_data = None;
    }

    /// 产生按键事件，返回是否有订阅者
    pub fn key_input(&self, bytes: &[u8]) -> bool {
        match &self.on_data {
            Some(handler) if self.parser.is_some() => {
                handler(bytes);
                true
            }
            _ => false,
        }
    }

    /// 屏幕可见文本
    pub fn contents(&self) -> String {
        self.parser
            .as_ref()
            .map(|parser| parser.screen().contents())
            .unwrap_or_default()
    }

    /// 原始输出历史
    pub fn history(&self) -> Vec<u8> {
        self.history.get_all()
    }

    pub fn is_disposed(&self) -> bool {
        self.parser.is_none()
    }

    /// 释放显示面
    ///
    /// 可以重复调用，也可以在从未写入时调用。宿主释放失败只记录日志，
    /// 返回 `Some(ErrorKind::DisposeFailure)` 供调用方记录。
    pub fn dispose(&mut self) -> Option<ErrorKind> {
        self.on_data = None;
        self.parser = None;

        let host = self.host.take()?;
        match host.release() {
            Ok(()) => {
                tracing::debug!("[终端] 模拟器已释放");
                None
            }
            Err(e) => {
                tracing::error!("[终端] 释放显示面失败: {}", e);
                Some(ErrorKind::DisposeFailure)
            }
        }
    }
}
