//! 终端线路协议
//!
//! 一个 WebSocket 上复用两种消息：
//! - 原始字节：入站为 shell 输出，出站为按键输入
//! - 控制消息：仅出站的 JSON，目前只有 `resize`
//!
//! 入站数据从不按控制消息解析。

use serde::{Deserialize, Serialize};

use super::emulator::Geometry;

/// 出站控制消息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// 终端尺寸变化
    Resize { cols: u16, rows: u16 },
}

impl ControlMessage {
    pub fn resize(geometry: Geometry) -> Self {
        Self::Resize {
            cols: geometry.columns,
            rows: geometry.rows,
        }
    }
}

/// 出站帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    /// 原始按键输入
    Input(Vec<u8>),
    /// 控制消息
    Control(ControlMessage),
}

/// 线路载荷
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WirePayload {
    Text(String),
    Binary(Vec<u8>),
}

impl OutboundFrame {
    /// 编码为线路载荷
    ///
    /// 按键输入是合法 UTF-8 时以文本帧发送，否则以二进制帧发送；控制消息总是文本帧。
    pub fn into_payload(self) -> WirePayload {
        match self {
            OutboundFrame::Input(bytes) => match String::from_utf8(bytes) {
                Ok(text) => WirePayload::Text(text),
                Err(e) => WirePayload::Binary(e.into_bytes()),
            },
            OutboundFrame::Control(msg) => {
                // 控制消息只含整数字段，序列化不会失败
                WirePayload::Text(serde_json::to_string(&msg).unwrap_or_default())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resize_message_shape() {
        let msg = ControlMessage::resize(Geometry::new(120, 30));
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"resize","cols":120,"rows":30}"#);
    }

    #[test]
    fn test_input_utf8_is_text_frame() {
        let payload = OutboundFrame::Input(b"ls -la\r".to_vec()).into_payload();
        assert_eq!(payload, WirePayload::Text("ls -la\r".to_string()));
    }

    #[test]
    fn test_input_invalid_utf8_is_binary_frame() {
        let payload = OutboundFrame::Input(vec![0xff, 0xfe, 0x03]).into_payload();
        assert_eq!(payload, WirePayload::Binary(vec![0xff, 0xfe, 0x03]));
    }

    #[test]
    fn test_control_is_text_frame() {
        let payload =
            OutboundFrame::Control(ControlMessage::Resize { cols: 80, rows: 24 }).into_payload();
        match payload {
            WirePayload::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                assert_eq!(value["type"], "resize");
                assert_eq!(value["cols"], 80);
                assert_eq!(value["rows"], 24);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
