//! 本地按键过滤
//!
//! `Ctrl-]` 之后跟一个命令键：`r` 手动重连，`q` 退出，再按一次 `Ctrl-]`
//! 发送它本身。其他键连同 `Ctrl-]` 一起原样转发。

/// 转义键 `Ctrl-]`
pub const ESCAPE_KEY: u8 = 0x1d;

/// 过滤后的输入动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// 转发到远程 shell
    Forward(Vec<u8>),
    /// 手动重连
    Reconnect,
    /// 退出
    Quit,
}

/// 按键过滤器
#[derive(Debug, Default)]
pub struct InputFilter {
    escaped: bool,
}

impl InputFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否在等待命令键
    pub fn is_waiting(&self) -> bool {
        self.escaped
    }

    /// 处理一段 stdin 输入
    pub fn process(&mut self, input: &[u8]) -> Vec<InputAction> {
        let mut actions = Vec::new();
        let mut pending = Vec::with_capacity(input.len());

        for &byte in input {
            if !self.escaped {
                if byte == ESCAPE_KEY {
                    self.escaped = true;
                } else {
                    pending.push(byte);
                }
                continue;
            }

            self.escaped = false;
            let command = match byte {
                b'r' | b'R' => Some(InputAction::Reconnect),
                b'q' | b'Q' => Some(InputAction::Quit),
                ESCAPE_KEY => {
                    pending.push(ESCAPE_KEY);
                    None
                }
                other => {
                    pending.extend_from_slice(&[ESCAPE_KEY, other]);
                    None
                }
            };

            if let Some(command) = command {
                if !pending.is_empty() {
                    actions.push(InputAction::Forward(std::mem::take(&mut pending)));
                }
                actions.push(command);
            }
        }

        if !pending.is_empty() {
            actions.push(InputAction::Forward(pending));
        }
        actions
    }
}
