//! Audio contract for the live voice stream.
//!
//! [`AUDIO_CONTRACT`] is the single record every size check derives from.
//! [`validate_audio_contract`] is the strict check run when a stream is
//! established; [`assert_chunk_framing`] is the lenient per-chunk check run
//! during normal operation, which only logs.

use serde::Serialize;
use tracing::warn;

use crate::error::VoiceError;

/// Bytes per sample for 16-bit PCM.
const PCM16_BYTES_PER_SAMPLE: u64 = 2;

/// Sample encoding carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEncoding {
    /// Signed 16-bit little-endian PCM, mono.
    Pcm16Le,
}

impl SampleEncoding {
    /// Size of one sample in bytes.
    pub const fn bytes_per_sample(self) -> u64 {
        match self {
            Self::Pcm16Le => PCM16_BYTES_PER_SAMPLE,
        }
    }
}

/// Expected format of the voice stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AudioContract {
    pub expected_sample_rate_hz: u32,
    pub encoding: SampleEncoding,
    /// Nominal duration of one chunk.
    pub chunk_duration_ms: u32,
    pub min_chunk_duration_ms: u32,
    pub max_chunk_duration_ms: u32,
    /// Upper bound on audio queued for playback.
    pub max_buffered_playback_ms: u32,
    /// Voice-activity probability above which a frame counts as speech.
    pub vad_threshold: f32,
    /// How long speech is assumed to continue after the last voiced frame.
    pub vad_hangover_ms: u32,
}

/// The contract the voice pipeline is built against.
pub const AUDIO_CONTRACT: AudioContract = AudioContract {
    expected_sample_rate_hz: 16_000,
    encoding: SampleEncoding::Pcm16Le,
    chunk_duration_ms: 32,
    min_chunk_duration_ms: 20,
    max_chunk_duration_ms: 100,
    max_buffered_playback_ms: 2_000,
    vad_threshold: 0.5,
    vad_hangover_ms: 300,
};

impl AudioContract {
    /// Bytes occupied by `duration_ms` of audio at the contract rate.
    pub const fn bytes_for_ms(&self, duration_ms: u32) -> u64 {
        self.expected_sample_rate_hz as u64 * duration_ms as u64 / 1000
            * self.encoding.bytes_per_sample()
    }

    /// Bytes in a nominal chunk (1024 for 16 kHz / 32 ms).
    pub const fn expected_chunk_bytes(&self) -> u64 {
        self.bytes_for_ms(self.chunk_duration_ms)
    }

    /// Bytes in the shortest allowed chunk.
    pub const fn min_chunk_bytes(&self) -> u64 {
        self.bytes_for_ms(self.min_chunk_duration_ms)
    }

    /// Bytes in the longest allowed chunk.
    pub const fn max_chunk_bytes(&self) -> u64 {
        self.bytes_for_ms(self.max_chunk_duration_ms)
    }

    /// Bytes of playback the client may hold before it is over budget.
    pub const fn max_buffered_bytes(&self) -> u64 {
        self.bytes_for_ms(self.max_buffered_playback_ms)
    }

    /// Whether `buffered_bytes` of queued playback is within budget.
    pub const fn within_playback_budget(&self, buffered_bytes: u64) -> bool {
        buffered_bytes <= self.max_buffered_bytes()
    }
}

/// Outcome of [`validate_audio_contract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioContractReport {
    pub ok: bool,
    pub sample_rate_match: bool,
    /// Always true: the encoding is fixed by the contract and not observable
    /// from raw PCM bytes.
    pub encoding_match: bool,
    pub chunk_size_valid: bool,
    pub errors: Vec<String>,
}

/// Check an observed stream against [`AUDIO_CONTRACT`].
///
/// Chunk checks only run when `chunk_bytes` is given. With `hard_fail`, a
/// failed check is returned as [`VoiceError::AudioContract`]; otherwise the
/// report is returned for the caller to act on.
pub fn validate_audio_contract(
    actual_sample_rate_hz: u32,
    actual_chunk_bytes: Option<usize>,
    hard_fail: bool,
) -> Result<AudioContractReport, VoiceError> {
    let contract = &AUDIO_CONTRACT;
    let mut errors = Vec::new();

    let sample_rate_match = actual_sample_rate_hz == contract.expected_sample_rate_hz;
    if !sample_rate_match {
        errors.push(format!(
            "sample rate mismatch: expected {} Hz, got {} Hz; resample to {} Hz or fail the session",
            contract.expected_sample_rate_hz,
            actual_sample_rate_hz,
            contract.expected_sample_rate_hz
        ));
    }

    let mut chunk_size_valid = true;
    if let Some(len) = actual_chunk_bytes {
        let len = len as u64;
        let min = contract.min_chunk_bytes();
        let max = contract.max_chunk_bytes();
        if len == 0 {
            chunk_size_valid = false;
            errors.push("empty chunk (0 bytes): possible empty-frame loop".to_string());
        } else if len > max * 2 {
            chunk_size_valid = false;
            errors.push(format!(
                "chunk too large: {len} bytes exceeds 2x max ({max} bytes): possible giant frame"
            ));
        } else if len * 2 < min {
            chunk_size_valid = false;
            errors.push(format!(
                "chunk too small: {len} bytes is under half the min ({min} bytes): check framing"
            ));
        }
    }

    let ok = sample_rate_match && chunk_size_valid;
    if hard_fail && !ok {
        return Err(VoiceError::AudioContract(errors));
    }

    Ok(AudioContractReport {
        ok,
        sample_rate_match,
        encoding_match: true,
        chunk_size_valid,
        errors,
    })
}

/// A per-chunk framing problem seen by [`assert_chunk_framing`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingAnomaly {
    Empty,
    /// More than 3x the nominal chunk size.
    Oversized { bytes: usize, expected: u64 },
}

/// Lenient framing check for chunks flowing through a live session.
///
/// Never fails. Logs only when `diagnostics_enabled`; the anomaly is
/// returned either way so callers can count repeats.
pub fn assert_chunk_framing(chunk_bytes: usize, diagnostics_enabled: bool) -> Option<FramingAnomaly> {
    let expected = AUDIO_CONTRACT.expected_chunk_bytes();
    let anomaly = if chunk_bytes == 0 {
        FramingAnomaly::Empty
    } else if chunk_bytes as u64 > expected * 3 {
        FramingAnomaly::Oversized {
            bytes: chunk_bytes,
            expected,
        }
    } else {
        return None;
    };

    if diagnostics_enabled {
        match anomaly {
            FramingAnomaly::Empty => warn!("empty audio chunk sent"),
            FramingAnomaly::Oversized { bytes, expected } => {
                warn!(bytes, expected, "audio chunk more than 3x nominal size")
            }
        }
    }
    Some(anomaly)
}
