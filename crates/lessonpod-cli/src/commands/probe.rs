//! `lessonpod probe` -- open the voice endpoint and report what happens.
//!
//! Goes through the same gate the app uses: if voice is flagged off or the
//! breaker is tripped, nothing is dialed. Otherwise the probe connects,
//! sends one chunk of silence, waits for the first event and feeds the
//! outcome back into the breaker.

use std::time::Duration;

use clap::Args;
use lessonpod_voice::{
    AUDIO_CONTRACT, TransportEvent, VoiceServices, VoiceTransport, create_transport,
};
use tracing::{debug, info};

use super::{GlobalOpts, build_services};

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Endpoint to dial instead of the configured one.
    #[arg(long)]
    pub url: Option<String>,

    /// Seconds to wait for the connection and for the first event.
    #[arg(long, default_value = "5")]
    pub timeout: u64,
}

pub async fn run(args: ProbeArgs, opts: &GlobalOpts) -> anyhow::Result<()> {
    let services = build_services(opts)?;
    let gate = services.gate();

    if !services.flags().voice_live_enabled() {
        println!("Voice is disabled (set VOICE_LIVE_ENABLED=true to enable).");
        return Ok(());
    }
    if gate.is_tripped() {
        println!("Voice circuit breaker is tripped; run `lessonpod breaker reset` to retry.");
        return Ok(());
    }

    let mut transport_config = services.config().transport.clone();
    if let Some(url) = args.url {
        transport_config.url = url;
    }
    let transport = create_transport(transport_config, services.flags())?;
    let Some(ws) = transport.as_websocket() else {
        anyhow::bail!("no probe available for {} transports", transport.transport_type());
    };

    let wait = Duration::from_secs(args.timeout);
    info!(url = %ws.url(), "probing voice endpoint");
    let mut socket = match tokio::time::timeout(wait, ws.connect()).await {
        Ok(Ok(socket)) => socket,
        Ok(Err(e)) => return Err(fail(&services, e.into())),
        Err(_) => return Err(fail(&services, anyhow::anyhow!("connect timed out after {wait:?}"))),
    };

    let silence = vec![0u8; AUDIO_CONTRACT.expected_chunk_bytes() as usize];
    if let Err(e) = socket.send_audio(&silence).await {
        return Err(fail(&services, e.into()));
    }

    let outcome = match tokio::time::timeout(wait, socket.next_event()).await {
        Ok(Some(TransportEvent::Audio(data))) => Ok(format!("audio frame ({} bytes)", data.len())),
        Ok(Some(TransportEvent::Text(text))) => Ok(format!("text frame: {text}")),
        Ok(Some(TransportEvent::Closed { code, reason, was_clean })) => Err(anyhow::anyhow!(
            "closed by peer (code {code}, reason '{reason}', clean: {was_clean})"
        )),
        Ok(Some(TransportEvent::Error(e))) => Err(anyhow::anyhow!("transport error: {e}")),
        Ok(None) => Err(anyhow::anyhow!("socket finished before any event")),
        // Connected and accepted audio; a quiet peer still counts as healthy.
        Err(_) => Ok(format!("no event within {wait:?}")),
    };

    if let Err(e) = socket.close().await {
        debug!(error = %e, "voice probe close failed");
    }
    match outcome {
        Ok(summary) => {
            gate.record_voice_success();
            println!("Voice endpoint OK: {summary}");
            Ok(())
        }
        Err(e) => Err(fail(&services, e)),
    }
}

fn fail(services: &VoiceServices, err: anyhow::Error) -> anyhow::Error {
    services.gate().record_voice_failure();
    let state = services.breaker().state();
    err.context(format!(
        "voice probe failed ({}/{} failures{})",
        state.failures,
        services.breaker().config().failure_threshold,
        if state.tripped { ", breaker tripped" } else { "" }
    ))
}
