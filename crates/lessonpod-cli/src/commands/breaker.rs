//! `lessonpod breaker` -- inspect or drive the persisted circuit breaker.
//!
//! Operates on the same storage the app uses, so `fail` three times here
//! trips voice for the next app start too.
//!
//! # Examples
//!
//! ```text
//! lessonpod breaker status
//! lessonpod breaker fail
//! lessonpod breaker reset
//! ```

use clap::Subcommand;
use lessonpod_voice::VoiceServices;
use serde_json::json;

use super::{GlobalOpts, build_services, format_datetime};

#[derive(Subcommand, Debug)]
pub enum BreakerAction {
    /// Show the breaker state.
    Status,
    /// Record one voice failure.
    Fail,
    /// Record a voice success (clears the breaker).
    Succeed,
    /// Reset the breaker, as the "Try voice again" action does.
    Reset,
}

pub fn run(action: BreakerAction, opts: &GlobalOpts) -> anyhow::Result<()> {
    let services = build_services(opts)?;
    let gate = services.gate();
    match action {
        BreakerAction::Status => {}
        BreakerAction::Fail => gate.record_voice_failure(),
        BreakerAction::Succeed => gate.record_voice_success(),
        BreakerAction::Reset => gate.try_voice_again(),
    }
    print_status(&services)
}

fn print_status(services: &VoiceServices) -> anyhow::Result<()> {
    let tripped = services.breaker().is_tripped();
    let state = services.breaker().state();
    let config = services.breaker().config();
    let out = json!({
        "tripped": tripped,
        "failures": state.failures,
        "failure_threshold": config.failure_threshold,
        "window_secs": config.window.num_seconds(),
        "first_failure_at": state.first_failure_at.as_ref().map(format_datetime),
        "tripped_at": state.tripped_at.as_ref().map(format_datetime),
        "can_use_voice": services.gate().can_use_voice(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
