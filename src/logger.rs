//! 日志初始化
//!
//! 默认写到 stderr。交互式会话期间本地终端处于 raw 模式，stderr 与远程 shell
//! 共用同一个 TTY，此时日志只写文件，未配置文件则丢弃。

use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

/// 日志输出目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    /// 写到 stderr
    Stderr,
    /// 追加写入文件
    File(PathBuf),
    /// 丢弃
    Discard,
}

impl LogOutput {
    /// 根据是否占用本地终端和日志文件配置选择输出目标
    pub fn select(interactive: bool, file: Option<&Path>) -> Self {
        match (file, interactive) {
            (Some(path), _) => LogOutput::File(path.to_path_buf()),
            (None, true) => LogOutput::Discard,
            (None, false) => LogOutput::Stderr,
        }
    }
}

/// 根据配置级别和 `-v` 次数计算过滤规则
///
/// `RUST_LOG` 存在时优先使用。
pub fn filter_directive(level: &str, verbosity: u8) -> String {
    match verbosity {
        0 => level.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

/// 初始化全局日志订阅器
pub fn init_logging(level: &str, verbosity: u8, output: &LogOutput) -> std::io::Result<()> {
    let directive = filter_directive(level, verbosity);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let (writer, ansi) = match output {
        LogOutput::Stderr => (
            BoxMakeWriter::new(std::io::stderr.with_max_level(tracing::Level::TRACE)),
            true,
        ),
        LogOutput::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            (BoxMakeWriter::new(std::sync::Mutex::new(file)), false)
        }
        LogOutput::Discard => (BoxMakeWriter::new(std::io::sink), false),
    };

    // 重复初始化（例如测试中）直接忽略
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false)
        .compact()
        .try_init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_filter_directive() {
        assert_eq!(filter_directive("warn", 0), "warn");
        assert_eq!(filter_directive("warn", 1), "debug");
        assert_eq!(filter_directive("info", 3), "trace");
    }

    #[test]
    fn test_interactive_session_never_logs_to_stderr() {
        assert_eq!(LogOutput::select(true, None), LogOutput::Discard);
        assert_eq!(
            LogOutput::select(true, Some(Path::new("/tmp/labterm.log"))),
            LogOutput::File(PathBuf::from("/tmp/labterm.log"))
        );
        assert_eq!(LogOutput::select(false, None), LogOutput::Stderr);
    }

    #[test]
    fn test_file_output_creates_parent_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("labterm.log");
        init_logging("info", 0, &LogOutput::File(path.clone())).unwrap();
        assert!(path.exists());
    }
}
