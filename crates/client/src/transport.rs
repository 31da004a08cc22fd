// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for the relay connection.
//!
//! A [`Connector`] opens one [`Transport`] per connection attempt. The
//! transport carries text frames only; encoding lives in `cairn_core`.
//! Production code uses [`WebSocketConnector`]; tests substitute a mock.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue, AUTHORIZATION};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::config::{AuthMode, ClientConfig};

/// Boxed future returned by transport operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Header carrying the producing actor.
pub const USER_HEADER: &str = "x-cairn-user";
/// Header carrying the session or workstation.
pub const TERMINAL_HEADER: &str = "x-cairn-terminal";

/// Error type for transport operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The open did not finish within the connect timeout.
    #[error("connection timed out after {0:?}")]
    Timeout(Duration),

    /// A write did not finish within the send timeout.
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    /// The handshake request could not be built from the config.
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Opens transports to the relay.
pub trait Connector: Send + Sync {
    /// Start one connection attempt.
    ///
    /// The returned future is dropped if the attempt is aborted.
    fn connect(&self) -> BoxFuture<'static, TransportResult<Box<dyn Transport>>>;
}

/// An open duplex text channel.
pub trait Transport: Send {
    /// Send one text frame.
    fn send(&mut self, text: String) -> BoxFuture<'_, TransportResult<()>>;

    /// Receive the next text frame.
    ///
    /// Returns `None` once the peer has closed. Must be cancel-safe: the
    /// client drops a pending `recv` whenever another event wins the race.
    fn recv(&mut self) -> BoxFuture<'_, TransportResult<Option<String>>>;

    /// Close the channel. Errors are not interesting to callers.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}

/// Builds the handshake request for `config` according to its auth mode.
pub fn handshake_request(config: &ClientConfig) -> TransportResult<Request> {
    match config.auth {
        AuthMode::Header => {
            let mut request = into_request(&config.url)?;
            let headers = request.headers_mut();
            if let Some(token) = &config.token {
                headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
            }
            headers.insert(
                HeaderName::from_static(USER_HEADER),
                header_value(&config.user_id)?,
            );
            headers.insert(
                HeaderName::from_static(TERMINAL_HEADER),
                header_value(&config.terminal_id)?,
            );
            Ok(request)
        }
        AuthMode::Query => {
            let mut url = Url::parse(&config.url)
                .map_err(|e| TransportError::InvalidHandshake(format!("bad url: {}", e)))?;
            {
                let mut pairs = url.query_pairs_mut();
                if let Some(token) = &config.token {
                    pairs.append_pair("token", token);
                }
                pairs
                    .append_pair("user", &config.user_id)
                    .append_pair("terminal", &config.terminal_id);
            }
            into_request(url.as_str())
        }
        AuthMode::Anonymous => into_request(&config.url),
    }
}

fn into_request(url: &str) -> TransportResult<Request> {
    url.into_client_request()
        .map_err(|e| TransportError::InvalidHandshake(e.to_string()))
}

fn header_value(value: &str) -> TransportResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHandshake(e.to_string()))
}

/// Connector for WebSocket relays using tokio-tungstenite.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    config: ClientConfig,
}

impl WebSocketConnector {
    /// Creates a connector for the relay named in `config`.
    pub fn new(config: ClientConfig) -> Self {
        WebSocketConnector { config }
    }
}

impl Connector for WebSocketConnector {
    fn connect(&self) -> BoxFuture<'static, TransportResult<Box<dyn Transport>>> {
        let request = handshake_request(&self.config);
        let timeout = self.config.connect_timeout();
        let url = self.config.url.clone();
        Box::pin(async move {
            let request = request?;
            tracing::debug!("opening websocket to {}", url);
            let (ws_stream, _) =
                match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request)).await
                {
                    Ok(Ok(opened)) => opened,
                    Ok(Err(e)) => return Err(TransportError::ConnectionFailed(e.to_string())),
                    Err(_) => return Err(TransportError::Timeout(timeout)),
                };
            let (sink, stream) = ws_stream.split();
            Ok(Box::new(WebSocketTransport { sink, stream }) as Box<dyn Transport>)
        })
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// An open WebSocket connection.
pub struct WebSocketTransport {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

impl Transport for WebSocketTransport {
    fn send(&mut self, text: String) -> BoxFuture<'_, TransportResult<()>> {
        Box::pin(async move {
            self.sink
                .send(Message::Text(text.into()))
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))?;
            // Flush so a broken connection surfaces here rather than later.
            self.sink
                .flush()
                .await
                .map_err(|e| TransportError::SendFailed(e.to_string()))
        })
    }

    fn recv(&mut self) -> BoxFuture<'_, TransportResult<Option<String>>> {
        Box::pin(async move {
            loop {
                match self.stream.next().await {
                    Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_string())),
                    Some(Ok(Message::Close(_))) | None => return Ok(None),
                    // Protocol-level ping/pong is answered by tungstenite.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(TransportError::ReceiveFailed(e.to_string())),
                }
            }
        })
    }

    fn close(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Err(e) = self.sink.close().await {
                tracing::debug!("websocket close failed: {}", e);
            }
        })
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
pub(crate) mod tests;
