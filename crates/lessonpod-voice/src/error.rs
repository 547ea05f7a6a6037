//! Voice layer error types.
//!
//! Defines [`VoiceError`], the error type for the few voice operations that
//! can fail outright: transport policy checks, hard-fail audio validation,
//! connecting, and config loading. Storage failures never surface here;
//! the breaker and session store log them and continue in memory.

use thiserror::Error;

use crate::transport::TransportType;

/// Errors produced by voice layer operations.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// A half-duplex transport was requested for the voice channel.
    #[error("non-duplex transport rejected: {0} cannot carry barge-in; use websocket or webrtc")]
    NonDuplexTransport(TransportType),

    /// A duplex transport with no concrete factory was requested.
    #[error("unsupported transport: {0} (only websocket transports are built)")]
    UnsupportedTransport(TransportType),

    /// The endpoint URL does not match the transport type.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// The audio stream violated the contract and the caller asked for a hard fail.
    #[error("audio contract violation: {}", .0.join("; "))]
    AudioContract(Vec<String>),

    /// WebSocket connection or send failed.
    #[error("transport error: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),

    /// Config file could not be read.
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
