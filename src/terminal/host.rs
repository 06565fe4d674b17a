//! 宿主显示面
//!
//! 宿主负责真正的绘制和测量，终端适配器只把字节流交给它。

/// 宿主容器的像素尺寸
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelSize {
    pub width: f64,
    pub height: f64,
}

impl PixelSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// 容器尚未完成布局时宽高为 0，此时无法计算终端尺寸
    pub fn is_measurable(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// 单个字符单元的像素尺寸
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub width: f64,
    pub height: f64,
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self {
            width: 9.0,
            height: 17.0,
        }
    }
}

/// 宿主显示面
///
/// 由 UI 绑定层提供。实现必须可以跨线程共享。
pub trait HostSurface: Send + Sync {
    /// 当前容器尺寸
    fn pixel_size(&self) -> PixelSize;

    /// 绘制终端字节流（包含控制序列）
    fn render(&self, _bytes: &[u8]) {}

    /// 释放显示面
    fn release(&self) -> Result<(), String> {
        Ok(())
    }
}
