//! `lessonpod flags` -- print the voice feature flags.
//!
//! Flags are read from the process environment on every call, so this shows
//! exactly what a freshly started app would see.

use lessonpod_voice::FeatureFlags;

pub fn run() -> anyhow::Result<()> {
    let snapshot = FeatureFlags::from_process_env().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
