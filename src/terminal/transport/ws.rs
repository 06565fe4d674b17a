//! WebSocket 传输
//!
//! 每个传输对应一个后台任务：建立连接、转发出站帧、回送入站数据和关闭事件。
//! `close()` 通过取消令牌结束任务，结束后不会再回送事件。

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{
    Transport, TransportConnector, TransportEvents, CLOSE_ABNORMAL, CLOSE_NO_STATUS,
};
use crate::terminal::error::TerminalError;
use crate::terminal::protocol::{OutboundFrame, WirePayload};

/// WebSocket 连接器
#[derive(Debug, Default, Clone)]
pub struct WsConnector;

impl WsConnector {
    pub fn new() -> Self {
        Self
    }
}

impl TransportConnector for WsConnector {
    fn open(
        &self,
        endpoint: &Url,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TerminalError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TerminalError::TransportFailed(e.to_string()))?;

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tracing::debug!(
            "[连接] 打开 WebSocket: {} (代次 {})",
            endpoint,
            events.generation()
        );
        runtime.spawn(run_socket(
            endpoint.clone(),
            events,
            outbound_rx,
            cancel.clone(),
        ));

        Ok(Arc::new(WsTransport {
            outbound: outbound_tx,
            cancel,
        }))
    }
}

/// WebSocket 传输句柄
struct WsTransport {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    cancel: CancellationToken,
}

impl Transport for WsTransport {
    fn send(&self, frame: OutboundFrame) -> Result<(), TerminalError> {
        self.outbound
            .send(frame)
            .map_err(|_| TerminalError::SendFailed("WebSocket 任务已结束".to_string()))
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn to_message(frame: OutboundFrame) -> Message {
    match frame.into_payload() {
        WirePayload::Text(text) => Message::Text(text),
        WirePayload::Binary(bytes) => Message::Binary(bytes),
    }
}

async fn run_socket(
    endpoint: Url,
    events: TransportEvents,
    mut outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    cancel: CancellationToken,
) {
    let connected = tokio::select! {
        _ = cancel.cancelled() => return,
        result = connect_async(endpoint.as_str()) => result,
    };

    let stream = match connected {
        Ok((stream, _response)) => stream,
        Err(e) => {
            tracing::warn!("[连接] WebSocket 连接失败: {}: {}", endpoint, e);
            events.error(e.to_string());
            events.closed(CLOSE_ABNORMAL, String::new());
            return;
        }
    };

    events.opened();
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.close().await;
                tracing::debug!("[连接] WebSocket 已主动关闭 (代次 {})", events.generation());
                return;
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = sink.close().await;
                    return;
                };
                if let Err(e) = sink.send(to_message(frame)).await {
                    events.error(e.to_string());
                    events.closed(CLOSE_ABNORMAL, String::new());
                    return;
                }
            }
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => events.message(text.into_bytes()),
                Some(Ok(Message::Binary(bytes))) => events.message(bytes),
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    events.closed(code, reason);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    events.error(e.to_string());
                    events.closed(CLOSE_ABNORMAL, String::new());
                    return;
                }
                None => {
                    events.closed(CLOSE_ABNORMAL, String::new());
                    return;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::protocol::ControlMessage;
    use crate::terminal::transport::TransportEvent;
    use std::time::Duration;

    #[test]
    fn test_outbound_frames_map_to_messages() {
        assert_eq!(
            to_message(OutboundFrame::Input(b"ls\r".to_vec())),
            Message::Text("ls\r".to_string())
        );
        assert_eq!(
            to_message(OutboundFrame::Control(ControlMessage::Resize {
                cols: 100,
                rows: 40
            })),
            Message::Text(r#"{"type":"resize","cols":100,"rows":40}"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_error_then_close() {
        // 绑定后立即释放，得到一个没有监听者的端口
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let endpoint = Url::parse(&format!("ws://127.0.0.1:{}/ws/terminal/ns/pod", port)).unwrap();
        let _transport = WsConnector::new()
            .open(&endpoint, TransportEvents::new(7, tx))
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.generation, 7);
        assert!(matches!(first.event, TransportEvent::Error(_)));

        let second = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            second.event,
            TransportEvent::Closed {
                code: CLOSE_ABNORMAL,
                reason: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_close_before_connect_emits_nothing() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let endpoint = Url::parse("ws://10.255.255.1:9/ws/terminal/ns/pod").unwrap();
        let transport = WsConnector::new()
            .open(&endpoint, TransportEvents::new(1, tx))
            .unwrap();
        transport.close();
        drop(transport);

        let next = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(matches!(next, Ok(None) | Err(_)));
    }
}
