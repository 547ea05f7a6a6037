//! Transport guard for the voice channel.
//!
//! The voice assistant needs a duplex connection so the user can barge in
//! while the assistant is speaking. Server-Sent Events and HTTP polling are
//! one-directional, so they are rejected here instead of being allowed as a
//! silent fallback.
//!
//! [`create_transport`] performs every check up front and returns without
//! doing I/O. [`WebSocketTransport::connect`] opens the socket; the returned
//! [`VoiceSocket`] yields [`TransportEvent`]s. Open, close and error events
//! are logged only when voice diagnostics are enabled.

use std::fmt;
use std::str::FromStr;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::audio::assert_chunk_framing;
use crate::error::VoiceError;
use crate::flags::FeatureFlags;

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

/// Default voice endpoint used when no config provides one.
pub const DEFAULT_VOICE_URL: &str = "ws://127.0.0.1:8787/voice";

/// Kind of transport requested for the voice channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    WebSocket,
    WebRtc,
    Sse,
    Http,
}

impl TransportType {
    /// Whether both sides can send at any time.
    pub fn is_duplex(self) -> bool {
        matches!(self, Self::WebSocket | Self::WebRtc)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::WebRtc => "webrtc",
            Self::Sse => "sse",
            Self::Http => "http",
        }
    }
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "websocket" => Ok(Self::WebSocket),
            "webrtc" => Ok(Self::WebRtc),
            "sse" => Ok(Self::Sse),
            "http" => Ok(Self::Http),
            other => Err(format!("unknown transport type: {other}")),
        }
    }
}

/// Transport descriptor. Validated once by [`create_transport`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default, rename = "type")]
    pub transport_type: TransportType,
    #[serde(default, alias = "apiKey")]
    pub api_key: Option<String>,
}

fn default_url() -> String {
    DEFAULT_VOICE_URL.to_string()
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            transport_type: TransportType::WebSocket,
            api_key: None,
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("url", &self.url)
            .field("transport_type", &self.transport_type)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Reject any transport that cannot carry barge-in.
pub fn assert_duplex_transport(transport_type: TransportType) -> Result<(), VoiceError> {
    if transport_type.is_duplex() {
        Ok(())
    } else {
        Err(VoiceError::NonDuplexTransport(transport_type))
    }
}

/// A validated, not yet connected voice transport.
pub trait VoiceTransport: Send + Sync + fmt::Debug {
    fn transport_type(&self) -> TransportType;

    fn url(&self) -> &str;

    /// Narrow to the WebSocket implementation.
    fn as_websocket(&self) -> Option<&WebSocketTransport> {
        None
    }
}

/// Whether `transport` is a [`WebSocketTransport`].
pub fn is_websocket_transport(transport: &dyn VoiceTransport) -> bool {
    transport.as_websocket().is_some()
}

/// Build a transport for `config`.
///
/// Non-duplex types fail with [`VoiceError::NonDuplexTransport`]. WebRTC
/// passes the duplex check but has no factory yet, so it fails with
/// [`VoiceError::UnsupportedTransport`].
pub fn create_transport(
    config: TransportConfig,
    flags: &FeatureFlags,
) -> Result<Box<dyn VoiceTransport>, VoiceError> {
    assert_duplex_transport(config.transport_type)?;
    if config.transport_type != TransportType::WebSocket {
        return Err(VoiceError::UnsupportedTransport(config.transport_type));
    }
    Ok(Box::new(WebSocketTransport::new(config, flags.clone())?))
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

/// WebSocket voice transport.
#[derive(Debug)]
pub struct WebSocketTransport {
    config: TransportConfig,
    flags: FeatureFlags,
}

impl WebSocketTransport {
    fn new(config: TransportConfig, flags: FeatureFlags) -> Result<Self, VoiceError> {
        if !(config.url.starts_with("ws://") || config.url.starts_with("wss://")) {
            return Err(VoiceError::InvalidEndpoint(format!(
                "websocket url must start with ws:// or wss://, got {}",
                config.url
            )));
        }
        Ok(Self { config, flags })
    }

    /// Open the connection. The API key, if any, is sent as a bearer token.
    pub async fn connect(&self) -> Result<VoiceSocket, VoiceError> {
        let mut request = self.config.url.as_str().into_client_request()?;
        if let Some(key) = &self.config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
                VoiceError::InvalidEndpoint("api key is not a valid header value".into())
            })?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        match tokio_tungstenite::connect_async(request).await {
            Ok((stream, _response)) => {
                if self.flags.voice_diagnostics_enabled() {
                    info!(url = %self.config.url, "voice transport open");
                }
                Ok(VoiceSocket {
                    stream,
                    flags: self.flags.clone(),
                    url: self.config.url.clone(),
                    finished: false,
                })
            }
            Err(e) => {
                if self.flags.voice_diagnostics_enabled() {
                    warn!(url = %self.config.url, error = %e, "voice transport error");
                }
                Err(e.into())
            }
        }
    }
}

impl VoiceTransport for WebSocketTransport {
    fn transport_type(&self) -> TransportType {
        TransportType::WebSocket
    }

    fn url(&self) -> &str {
        &self.config.url
    }

    fn as_websocket(&self) -> Option<&WebSocketTransport> {
        Some(self)
    }
}

/// Event observed on an open [`VoiceSocket`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// PCM16 audio from the peer.
    Audio(Vec<u8>),
    /// Control or transcript text from the peer.
    Text(String),
    Closed {
        code: u16,
        reason: String,
        was_clean: bool,
    },
    Error(String),
}

/// An open WebSocket voice connection.
pub struct VoiceSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    flags: FeatureFlags,
    url: String,
    finished: bool,
}

impl VoiceSocket {
    /// Send one PCM16 chunk. Framing anomalies are logged, never rejected.
    pub async fn send_audio(&mut self, chunk: &[u8]) -> Result<(), VoiceError> {
        assert_chunk_framing(chunk.len(), self.flags.voice_diagnostics_enabled());
        self.stream.send(WsMessage::Binary(chunk.to_vec())).await?;
        Ok(())
    }

    /// Send a text control message.
    pub async fn send_text(&mut self, text: &str) -> Result<(), VoiceError> {
        self.stream.send(WsMessage::Text(text.to_string())).await?;
        Ok(())
    }

    /// Wait for the next event. Returns `None` once the socket is finished.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        if self.finished {
            return None;
        }
        loop {
            let event = match self.stream.next().await {
                Some(Ok(WsMessage::Binary(data))) => TransportEvent::Audio(data),
                Some(Ok(WsMessage::Text(text))) => TransportEvent::Text(text),
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((1005, String::new()));
                    self.on_close(code, reason, true)
                }
                Some(Ok(_)) => continue, // Ping, Pong, raw frames
                Some(Err(e)) => {
                    if self.flags.voice_diagnostics_enabled() {
                        warn!(url = %self.url, error = %e, "voice transport error");
                    }
                    TransportEvent::Error(e.to_string())
                }
                None => self.on_close(ABNORMAL_CLOSURE, String::new(), false),
            };
            return Some(event);
        }
    }

    fn on_close(&mut self, code: u16, reason: String, was_clean: bool) -> TransportEvent {
        self.finished = true;
        if self.flags.voice_diagnostics_enabled() {
            info!(url = %self.url, code, reason = %reason, was_clean, "voice transport closed");
        }
        TransportEvent::Closed {
            code,
            reason,
            was_clean,
        }
    }

    /// Close the connection from our side.
    pub async fn close(&mut self) -> Result<(), VoiceError> {
        self.finished = true;
        self.stream.close(None).await?;
        Ok(())
    }
}

impl fmt::Debug for VoiceSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoiceSocket")
            .field("url", &self.url)
            .field("finished", &self.finished)
            .finish()
    }
}
