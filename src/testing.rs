//! In-process JMQT server stand-in used by the async tests.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{WebSocketStream, accept_async};
use tungstenite::protocol::Message as WsMessage;

use crate::config::Settings;

const WAIT: Duration = Duration::from_secs(5);

pub struct MockServer {
    listener: TcpListener,
    pub port: u16,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Can't bind");
        let port = listener.local_addr().expect("local_addr").port();
        Self { listener, port }
    }

    pub fn address(&self) -> String {
        format!("ws://127.0.0.1:{}/", self.port)
    }

    pub fn settings(&self) -> Settings {
        let mut settings = Settings::default();
        settings.server.port = self.port;
        settings
    }

    pub async fn accept(&self) -> MockPeer {
        let (stream, _) = tokio::time::timeout(WAIT, self.listener.accept())
            .await
            .expect("no client connected")
            .expect("accept failed");
        let ws = accept_async(stream).await.expect("WebSocket handshake failed");
        MockPeer { ws }
    }
}

/// Port nothing is listening on.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("Can't bind");
    listener.local_addr().expect("local_addr").port()
}

pub struct MockPeer {
    ws: WebSocketStream<TcpStream>,
}

impl MockPeer {
    /// Next text frame from the client, parsed as JSON.
    pub async fn recv(&mut self) -> Value {
        loop {
            let frame = tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("timed out waiting for a frame")
                .expect("connection ended")
                .expect("read failed");
            if let WsMessage::Text(text) = frame {
                return serde_json::from_str(text.as_str()).expect("client sent invalid JSON");
            }
        }
    }

    /// Asserts the client sends nothing for `quiet`.
    pub async fn expect_silence(&mut self, quiet: Duration) {
        if let Ok(Some(Ok(WsMessage::Text(text)))) = tokio::time::timeout(quiet, self.ws.next()).await {
            panic!("unexpected frame from client: {text}");
        }
    }

    pub async fn send(&mut self, packet: Value) {
        self.ws
            .send(WsMessage::Text(packet.to_string().into()))
            .await
            .expect("send failed");
    }

    pub async fn raw(&mut self, text: &str) {
        self.ws
            .send(WsMessage::Text(text.to_string().into()))
            .await
            .expect("send failed");
    }

    /// Waits until the client closes the socket.
    pub async fn expect_closed(&mut self) {
        loop {
            match tokio::time::timeout(WAIT, self.ws.next())
                .await
                .expect("client did not close the connection")
            {
                None | Some(Err(_)) | Some(Ok(WsMessage::Close(_))) => return,
                Some(Ok(_)) => {}
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
