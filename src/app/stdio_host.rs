//! 标准输出宿主显示面
//!
//! 把终端字节流直接写到 stdout，用本地终端的字符尺寸乘以单元尺寸作为容器尺寸，
//! 这样远程 shell 的尺寸始终跟随本地窗口。

use std::io::Write;

use crate::terminal::{CellMetrics, HostSurface, PixelSize};

/// stdout 宿主
#[derive(Debug, Clone, Copy)]
pub struct StdioHost {
    cell: CellMetrics,
}

impl StdioHost {
    pub fn new(cell: CellMetrics) -> Self {
        Self { cell }
    }
}

impl HostSurface for StdioHost {
    fn pixel_size(&self) -> PixelSize {
        match crossterm::terminal::size() {
            Ok((cols, rows)) => PixelSize::new(
                f64::from(cols) * self.cell.width,
                f64::from(rows) * self.cell.height,
            ),
            Err(e) => {
                tracing::debug!("[终端] 无法读取本地终端尺寸: {}", e);
                PixelSize::default()
            }
        }
    }

    fn render(&self, bytes: &[u8]) {
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = stdout.write_all(bytes).and_then(|_| stdout.flush()) {
            tracing::warn!("[终端] 写入 stdout 失败: {}", e);
        }
    }

    fn release(&self) -> Result<(), String> {
        let mut stdout = std::io::stdout().lock();
        stdout
            .write_all(b"\x1b[0m\r\n")
            .and_then(|_| stdout.flush())
            .map_err(|e| e.to_string())
    }
}
