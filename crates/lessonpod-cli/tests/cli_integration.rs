//! CLI integration tests for the `lessonpod` binary.
//!
//! These tests run the compiled binary via `std::process::Command`. Each
//! test points `LESSONPOD_CONFIG` at a nonexistent path so the config
//! loader falls back to defaults, and passes `--storage-dir` with a fresh
//! temp directory so no real user state is touched.

use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use std::thread::JoinHandle;

use futures_util::{SinkExt, StreamExt};
use lessonpod_platform::FileStore;
use lessonpod_voice::{NewMessage, SessionStore};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// Build a `Command` pointing at the compiled `lessonpod` binary.
fn lessonpod_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_lessonpod"));
    cmd.env("LESSONPOD_CONFIG", "/tmp/.lessonpod-test-nonexistent-config.toml");
    // Suppress tracing output so test assertions only match program output.
    cmd.env("RUST_LOG", "off");
    for var in [
        "VOICE_LIVE_ENABLED",
        "VOICE_DIAGNOSTICS_ENABLED",
        "VOICE_USE_WEBSOCKET_ONLY",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

fn run_in(storage: &Path, args: &[&str]) -> Output {
    lessonpod_bin()
        .args(args)
        .arg("--storage-dir")
        .arg(storage)
        .output()
        .expect("failed to run lessonpod")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("not JSON ({e}): {stdout}"))
}

// ── 1. Help and version ─────────────────────────────────────────────────

#[test]
fn help_output() {
    let output = lessonpod_bin().arg("--help").output().expect("failed to run lessonpod");
    assert!(output.status.success(), "exit code should be 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("lessonpod voice layer CLI"),
        "help output should contain the CLI description, got: {stdout}"
    );
}

#[test]
fn version_output() {
    let output = lessonpod_bin().arg("--version").output().expect("failed to run lessonpod");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("lessonpod"), "got: {stdout}");
}

#[test]
fn unknown_subcommand_fails() {
    let output = lessonpod_bin()
        .arg("this-subcommand-does-not-exist")
        .output()
        .expect("failed to run lessonpod");
    assert!(!output.status.success());
}

// ── 2. Flags ────────────────────────────────────────────────────────────

#[test]
fn flags_defaults() {
    let output = lessonpod_bin().arg("flags").output().expect("failed to run lessonpod");
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["voice_live_enabled"], false);
    assert_eq!(json["voice_diagnostics_enabled"], false);
    assert_eq!(json["voice_websocket_only"], true);
}

#[test]
fn flags_read_environment() {
    let output = lessonpod_bin()
        .arg("flags")
        .env("VOICE_LIVE_ENABLED", "yes")
        .env("VOICE_USE_WEBSOCKET_ONLY", "false")
        .output()
        .expect("failed to run lessonpod");
    let json = stdout_json(&output);
    assert_eq!(json["voice_live_enabled"], true);
    assert_eq!(json["voice_feature_available"], true);
    assert_eq!(json["voice_websocket_only"], false);
}

// ── 3. Audio contract ───────────────────────────────────────────────────

#[test]
fn audio_matching_stream_is_ok() {
    let output = lessonpod_bin()
        .args(["audio", "--sample-rate", "16000", "--chunk-bytes", "1024"])
        .output()
        .expect("failed to run lessonpod");
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["errors"].as_array().unwrap().len(), 0);
}

#[test]
fn audio_mismatch_reports_without_hard_fail() {
    let output = lessonpod_bin()
        .args(["audio", "--sample-rate", "48000"])
        .output()
        .expect("failed to run lessonpod");
    assert!(output.status.success());
    let json = stdout_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["sample_rate_match"], false);
}

#[test]
fn audio_hard_fail_exits_non_zero() {
    let output = lessonpod_bin()
        .args(["audio", "--sample-rate", "16000", "--chunk-bytes", "0", "--hard-fail"])
        .output()
        .expect("failed to run lessonpod");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("empty chunk"), "got: {stderr}");
}

// ── 4. Breaker ──────────────────────────────────────────────────────────

#[test]
fn breaker_trips_after_three_failures_and_persists() {
    let dir = tempfile::tempdir().unwrap();

    let status = stdout_json(&run_in(dir.path(), &["breaker", "status"]));
    assert_eq!(status["tripped"], false);
    assert_eq!(status["failures"], 0);

    for _ in 0..3 {
        assert!(run_in(dir.path(), &["breaker", "fail"]).status.success());
    }

    let status = stdout_json(&run_in(dir.path(), &["breaker", "status"]));
    assert_eq!(status["tripped"], true);
    assert_eq!(status["failures"], 3);
    assert_eq!(status["can_use_voice"], false);

    let status = stdout_json(&run_in(dir.path(), &["breaker", "reset"]));
    assert_eq!(status["tripped"], false);
    assert_eq!(status["failures"], 0);
}

#[test]
fn breaker_success_clears_failures() {
    let dir = tempfile::tempdir().unwrap();
    run_in(dir.path(), &["breaker", "fail"]);
    let status = stdout_json(&run_in(dir.path(), &["breaker", "succeed"]));
    assert_eq!(status["failures"], 0);
}

// ── 5. Sessions ─────────────────────────────────────────────────────────

fn seed_session(dir: &Path, trip_id: &str) {
    let store = SessionStore::new(Arc::new(FileStore::with_dir(dir)));
    store.get_or_create_session(trip_id, 10);
    store.add_message(trip_id, NewMessage::user("what did episode 3 say about sourdough?"));
    store.increment_query_count(trip_id);
}

#[test]
fn session_list_empty() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["session", "list"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No sessions found."));
}

#[test]
fn session_list_show_clear() {
    let dir = tempfile::tempdir().unwrap();
    seed_session(dir.path(), "trip-42");

    let output = run_in(dir.path(), &["session", "list"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("trip-42"), "got: {stdout}");
    assert!(stdout.contains("1/10"), "got: {stdout}");

    let json = stdout_json(&run_in(dir.path(), &["session", "show", "trip-42"]));
    assert_eq!(json["tripId"], "trip-42");
    assert_eq!(json["queryCount"], 1);
    assert_eq!(json["messages"][0]["role"], "user");

    let output = run_in(dir.path(), &["session", "clear", "trip-42"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("Cleared session"));

    let output = run_in(dir.path(), &["session", "show", "trip-42"]);
    assert!(!output.status.success());
}

// ── 6. Probe ────────────────────────────────────────────────────────────

#[test]
fn probe_respects_disabled_flag() {
    let dir = tempfile::tempdir().unwrap();
    let output = run_in(dir.path(), &["probe"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Voice is disabled"));
}

#[test]
fn probe_failure_counts_against_breaker() {
    let dir = tempfile::tempdir().unwrap();
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let output = lessonpod_bin()
        .args(["probe", "--timeout", "2", "--url", &format!("ws://{addr}/voice")])
        .arg("--storage-dir")
        .arg(dir.path())
        .env("VOICE_LIVE_ENABLED", "true")
        .output()
        .expect("failed to run lessonpod");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("voice probe failed"), "got: {stderr}");

    let status = stdout_json(&run_in(dir.path(), &["breaker", "status"]));
    assert_eq!(status["failures"], 1);
}

#[test]
fn probe_rejects_half_duplex_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "[transport]\ntype = \"sse\"\n").unwrap();

    let output = lessonpod_bin()
        .args(["probe", "--config"])
        .arg(&config)
        .arg("--storage-dir")
        .arg(dir.path().join("storage"))
        .env("VOICE_LIVE_ENABLED", "true")
        .output()
        .expect("failed to run lessonpod");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("non-duplex transport rejected"), "got: {stderr}");
}

/// One-connection WebSocket server on its own thread. With `echo`, the
/// first frame is sent back before closing; otherwise it closes right away.
fn spawn_ws_server(echo: bool) -> (std::net::SocketAddr, JoinHandle<()>) {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            if echo {
                if let Some(Ok(msg @ Message::Binary(_))) = ws.next().await {
                    ws.send(msg).await.unwrap();
                }
            }
            let _ = ws
                .close(Some(CloseFrame {
                    code: CloseCode::Normal,
                    reason: "done".into(),
                }))
                .await;
            while let Some(Ok(_)) = ws.next().await {}
        });
    });
    (addr, handle)
}

fn probe_against(dir: &Path, addr: std::net::SocketAddr) -> Output {
    lessonpod_bin()
        .args(["probe", "--timeout", "5", "--url", &format!("ws://{addr}/voice")])
        .arg("--storage-dir")
        .arg(dir)
        .env("VOICE_LIVE_ENABLED", "true")
        .output()
        .expect("failed to run lessonpod")
}

#[test]
fn probe_echoing_endpoint_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, server) = spawn_ws_server(true);

    let output = probe_against(dir.path(), addr);
    server.join().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("Voice endpoint OK: audio frame (1024 bytes)"), "got: {stdout}");

    let status = stdout_json(&run_in(dir.path(), &["breaker", "status"]));
    assert_eq!(status["failures"], 0);
}

#[test]
fn probe_peer_close_is_a_failure_and_exits_cleanly() {
    let dir = tempfile::tempdir().unwrap();
    let (addr, server) = spawn_ws_server(false);

    let output = probe_against(dir.path(), addr);
    server.join().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("closed by peer (code 1000"), "got: {stderr}");
    assert!(!stderr.contains("panicked"), "got: {stderr}");

    let status = stdout_json(&run_in(dir.path(), &["breaker", "status"]));
    assert_eq!(status["failures"], 1);
}
