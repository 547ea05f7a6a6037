//! `lessonpod session` -- manage stored concierge sessions.
//!
//! # Examples
//!
//! ```text
//! lessonpod session list
//! lessonpod session show trip-42
//! lessonpod session clear trip-42
//! ```

use clap::Subcommand;
use comfy_table::{Table, presets::UTF8_FULL};
use lessonpod_voice::{ConciergeSession, VoiceServices};

use super::{GlobalOpts, build_services, format_datetime};

#[derive(Subcommand, Debug)]
pub enum SessionAction {
    /// List trips with a stored session.
    List,
    /// Print a stored session as JSON.
    Show { trip_id: String },
    /// Delete a stored session.
    Clear { trip_id: String },
}

pub fn run(action: SessionAction, opts: &GlobalOpts) -> anyhow::Result<()> {
    let services = build_services(opts)?;
    match action {
        SessionAction::List => list(&services),
        SessionAction::Show { trip_id } => show(&services, &trip_id),
        SessionAction::Clear { trip_id } => clear(&services, &trip_id),
    }
}

fn list(services: &VoiceServices) -> anyhow::Result<()> {
    let store = services.sessions().store();
    let trip_ids = store.stored_trip_ids();
    if trip_ids.is_empty() {
        println!("No sessions found.");
        println!("  Dir: {}", services.config().storage_dir().display());
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["TRIP", "MESSAGES", "QUERIES", "VOICE", "CREATED"]);
    for trip_id in &trip_ids {
        match store.get_session(trip_id) {
            Some(session) => table.add_row(row(&session)),
            // Unreadable file; show what we can.
            None => table.add_row([trip_id.clone(), "?".into(), "?".into(), "?".into(), "?".into()]),
        };
    }

    println!("{table}");
    println!("  {} session(s)", trip_ids.len());
    Ok(())
}

fn row(session: &ConciergeSession) -> [String; 5] {
    [
        session.trip_id.clone(),
        session.messages.len().to_string(),
        format!("{}/{}", session.query_count, session.query_limit),
        session.voice_state.to_string(),
        format_datetime(&session.created_at),
    ]
}

fn show(services: &VoiceServices, trip_id: &str) -> anyhow::Result<()> {
    let session = services
        .sessions()
        .store()
        .get_session(trip_id)
        .ok_or_else(|| anyhow::anyhow!("no session stored for trip '{trip_id}'"))?;
    println!("{}", serde_json::to_string_pretty(&session)?);
    Ok(())
}

fn clear(services: &VoiceServices, trip_id: &str) -> anyhow::Result<()> {
    if services.sessions().store().clear_session(trip_id) {
        println!("Cleared session for trip '{trip_id}'.");
    } else {
        println!("No session stored for trip '{trip_id}'.");
    }
    Ok(())
}
