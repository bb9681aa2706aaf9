//! Trait abstraction for the WebSocket link to enable testing

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::{Result, TeleopError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connect timeout used unless overridden.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Outgoing half of an open link.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one text frame
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Close the link gracefully
    async fn close(&mut self) -> Result<()>;
}

/// Incoming half of an open link.
#[async_trait]
pub trait FrameSource: Send {
    /// Next text frame, or `None` once the peer has closed the link.
    async fn next_text(&mut self) -> Option<Result<String>>;
}

/// Both halves of a freshly opened link.
pub type Link = (Box<dyn FrameSink>, Box<dyn FrameSource>);

/// Opens links to the simulator.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Link>;
}

/// Connector for a `ws://` endpoint using tokio-tungstenite.
///
/// TCP connect and handshake together are bounded by the connect timeout,
/// so a peer that accepts but never answers still yields an error.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Link> {
        debug!("Connecting to {}", self.url);
        let handshake = tokio_tungstenite::connect_async(self.url.as_str());
        let (stream, _response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| {
                TeleopError::Transport(format!(
                    "Connecting to {} timed out after {:?}",
                    self.url, self.connect_timeout
                ))
            })?
            .map_err(|e| TeleopError::Transport(format!("Failed to connect to {}: {}", self.url, e)))?;

        let (sink, source) = stream.split();
        Ok((Box::new(WsSink { sink }), Box::new(WsSource { source })))
    }
}

struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl FrameSink for WsSink {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sink
            .send(Message::Text(text))
            .await
            .map_err(|e| TeleopError::Transport(format!("Send failed: {}", e)))
    }

    async fn close(&mut self) -> Result<()> {
        self.sink
            .close()
            .await
            .map_err(|e| TeleopError::Transport(format!("Close failed: {}", e)))
    }
}

struct WsSource {
    source: SplitStream<WsStream>,
}

#[async_trait]
impl FrameSource for WsSource {
    async fn next_text(&mut self) -> Option<Result<String>> {
        loop {
            match self.source.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    debug!("Close frame received: {:?}", frame);
                    return None;
                }
                Ok(Message::Binary(data)) => {
                    debug!("Ignoring {} byte binary frame", data.len());
                }
                // Ping replies are queued by tungstenite itself
                Ok(_) => {}
                Err(e) => return Some(Err(TeleopError::Transport(format!("Receive failed: {}", e)))),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mocks::MockConnector;
    use super::*;

    #[test]
    fn test_ws_connector_url() {
        let connector = WsConnector::new("ws://127.0.0.1:1337/ws");
        assert_eq!(connector.url(), "ws://127.0.0.1:1337/ws");
        assert_eq!(connector.connect_timeout(), DEFAULT_CONNECT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_ws_connector_times_out_on_silent_peer() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let held = tokio::spawn(async move {
            // Accept and hold the socket without ever answering the handshake
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let connector = WsConnector::new(format!("ws://127.0.0.1:{}/ws", port))
            .with_connect_timeout(Duration::from_millis(200));
        let result = tokio::time::timeout(Duration::from_secs(5), connector.connect())
            .await
            .expect("connect should give up on its own");

        match result {
            Err(TeleopError::Transport(msg)) => assert!(msg.contains("timed out")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("silent peer should not complete a handshake"),
        }
        held.abort();
    }

    #[tokio::test]
    async fn test_ws_connector_refused() {
        // Port 9 (discard) is closed on any sane test host
        let connector = WsConnector::new("ws://127.0.0.1:9/ws");
        let result = connector.connect().await;
        assert!(matches!(result, Err(TeleopError::Transport(_))));
    }

    #[tokio::test]
    async fn test_mock_connector_round_trip() {
        let connector = MockConnector::new();
        let (mut sink, mut source) = connector.connect().await.unwrap();

        sink.send_text("hello".to_string()).await.unwrap();
        assert_eq!(connector.sent(), vec!["hello".to_string()]);

        connector.push_inbound("world");
        assert_eq!(source.next_text().await.unwrap().unwrap(), "world");

        connector.close_remote();
        assert!(source.next_text().await.is_none());
    }

    #[test]
    fn test_mock_connector_refusing() {
        let connector = MockConnector::refusing();
        assert!(tokio_test::block_on(connector.connect()).is_err());
        assert_eq!(connector.attempts(), 1);
    }
}
