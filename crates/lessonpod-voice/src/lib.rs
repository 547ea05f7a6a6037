//! Voice session hardening layer for lessonpod.
//!
//! Everything between "the user pressed the mic button" and "audio is
//! flowing": deciding whether voice may start, enforcing a full-duplex
//! transport, checking the PCM stream against the audio contract, tripping
//! to text after repeated failures, and keeping the per-trip concierge
//! session in sync.
//!
//! # Components
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`FeatureFlags`] | Environment-driven voice flags, read fresh each call |
//! | [`validate_audio_contract`] | Sample rate and chunk size checks against [`AUDIO_CONTRACT`] |
//! | [`create_transport`] | Duplex-only transport factory ([`WebSocketTransport`]) |
//! | [`CircuitBreaker`] | Persisted failure counter that trips voice off |
//! | [`SessionStore`] | Write-through store of [`ConciergeSession`]s |
//! | [`VoiceGate`] | Flag + breaker decision with a fallback [`Notice`] |
//! | [`SessionContext`] | Per-trip [`SessionHandle`]s with watch subscriptions |
//! | [`VoiceServices`] | Wires all of the above from a [`VoiceConfig`] |
//!
//! Core operations are synchronous. Only [`WebSocketTransport::connect`]
//! and the [`VoiceSocket`] it returns are async.

pub mod audio;
pub mod breaker;
pub mod config;
pub mod context;
pub mod error;
pub mod flags;
pub mod gate;
pub mod services;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use audio::{
    AUDIO_CONTRACT, AudioContract, AudioContractReport, FramingAnomaly, SampleEncoding,
    assert_chunk_framing, validate_audio_contract,
};
pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerState};
pub use config::{BreakerSettings, SessionSettings, VoiceConfig};
pub use context::{SessionContext, SessionHandle, SessionSubscription};
pub use error::VoiceError;
pub use flags::{FeatureFlags, FlagSnapshot};
pub use gate::{LogNotifier, Notice, NoticeAction, Notifier, VoiceGate};
pub use services::VoiceServices;
pub use session::{
    ConciergeSession, MessageRole, NewMessage, Persistence, SessionMessage, SessionStore,
    SessionUpdate, VoiceState,
};
pub use transport::{
    TransportConfig, TransportEvent, TransportType, VoiceSocket, VoiceTransport,
    WebSocketTransport, assert_duplex_transport, create_transport, is_websocket_transport,
};
