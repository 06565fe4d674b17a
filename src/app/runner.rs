//! 交互式终端运行器
//!
//! 本地终端进入 raw 模式，stdin 字节作为按键转发，SIGWINCH 转为视口 resize，
//! 退出时派发页面卸载事件销毁会话。

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::terminal::{FnObserver, HostSurface, SessionIdentity, SessionStatusEvent};

use super::bootstrap;
use super::input::{InputAction, InputFilter};
use super::stdio_host::StdioHost;

/// raw 模式守卫，离开作用域时恢复本地终端
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> anyhow::Result<Self> {
        enable_raw_mode().context("无法进入 raw 模式")?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::warn!("[终端] 恢复本地终端失败: {}", e);
        }
    }
}

/// 在后台线程读取 stdin，避免阻塞运行时
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdin = stdin.lock();
        let mut buf = [0u8; 4096];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::error!("[终端] 读取 stdin 失败: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// 连接到 Pod 终端并运行到用户退出
pub async fn run_connect(config: &Config, identity: SessionIdentity) -> anyhow::Result<()> {
    let (page, registry) = bootstrap::init_registry(config)?;

    registry.register_observer(Arc::new(FnObserver::new(
        "status-log",
        |event: &SessionStatusEvent| {
            tracing::debug!(
                "[终端] {} {:?} -> {:?} ({:?})",
                event.identity,
                event.previous,
                event.status,
                event.error_kind
            );
            Ok(())
        },
    )));

    let host: Arc<dyn HostSurface> = Arc::new(StdioHost::new(config.bridge_options().cell));
    let _raw = RawModeGuard::enable()?;

    if !registry.setup(&identity, Some(host)) {
        anyhow::bail!("无法创建终端会话: {}", identity);
    }

    let mut stdin = spawn_stdin_reader();
    let mut filter = InputFilter::new();

    #[cfg(unix)]
    let mut sigwinch =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::window_change())
            .context("无法监听 SIGWINCH")?;

    'session: loop {
        #[cfg(unix)]
        let resize_event = sigwinch.recv();
        #[cfg(not(unix))]
        let resize_event = std::future::pending::<Option<()>>();

        tokio::select! {
            _ = resize_event => {
                page.dispatch_resize();
            }
            data = stdin.recv() => {
                let Some(data) = data else {
                    tracing::info!("[终端] stdin 已关闭");
                    break;
                };

                for action in filter.process(&data) {
                    match action {
                        InputAction::Forward(bytes) => {
                            if let Err(e) = registry.input(&identity, &bytes) {
                                tracing::warn!("[终端] {}", e);
                                break 'session;
                            }
                        }
                        InputAction::Reconnect => {
                            if !registry.connect(&identity) {
                                tracing::debug!("[终端] 未打开新的传输");
                            }
                        }
                        InputAction::Quit => break 'session,
                    }
                }
            }
        }
    }

    page.dispatch_unload();
    Ok(())
}
