//! `lessonpod audio` -- check stream parameters against the audio contract.
//!
//! # Examples
//!
//! ```text
//! lessonpod audio --sample-rate 16000 --chunk-bytes 1024
//! lessonpod audio --sample-rate 48000 --hard-fail
//! ```

use clap::Args;
use lessonpod_voice::{AUDIO_CONTRACT, validate_audio_contract};

#[derive(Args, Debug)]
pub struct AudioArgs {
    /// Observed sample rate in Hz.
    #[arg(long)]
    pub sample_rate: u32,

    /// Observed chunk size in bytes.
    #[arg(long)]
    pub chunk_bytes: Option<usize>,

    /// Exit with an error instead of printing a failing report.
    #[arg(long)]
    pub hard_fail: bool,
}

pub fn run(args: AudioArgs) -> anyhow::Result<()> {
    let report = validate_audio_contract(args.sample_rate, args.chunk_bytes, args.hard_fail)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    if !report.ok {
        eprintln!(
            "expected {} Hz PCM16, chunks of {}..={} bytes (nominal {})",
            AUDIO_CONTRACT.expected_sample_rate_hz,
            AUDIO_CONTRACT.min_chunk_bytes(),
            AUDIO_CONTRACT.max_chunk_bytes(),
            AUDIO_CONTRACT.expected_chunk_bytes(),
        );
    }
    Ok(())
}
