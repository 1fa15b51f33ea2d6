//! End-to-end behaviour of the call detail view: a record is resolved, its
//! recording is attached to a player, and the player reacts to operator
//! commands and media notifications.

use calldesk_proto::playback::download_file_name;
use calldesk_proto::{
    format_clock, resolve, CallRecord, MediaNotification, MediaPrimitive, PlaybackController,
    PlaybackState, TransportState,
};
use serde_json::json;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(String),
    Unload,
    Play,
    Pause,
    Seek(f64),
}

#[derive(Debug, Default)]
struct FakeMedia {
    calls: Vec<Call>,
}

impl MediaPrimitive for FakeMedia {
    fn load(&mut self, url: &str) {
        self.calls.push(Call::Load(url.to_string()));
    }
    fn unload(&mut self) {
        self.calls.push(Call::Unload);
    }
    fn play(&mut self) {
        self.calls.push(Call::Play);
    }
    fn pause(&mut self) {
        self.calls.push(Call::Pause);
    }
    fn seek(&mut self, position_secs: f64) {
        self.calls.push(Call::Seek(position_secs));
    }
}

fn jane() -> CallRecord {
    CallRecord::from_value(json!({
        "id": "call-42",
        "customer": { "name": "Jane", "number": "+15551234567" },
        "startedAt": "2024-01-01T10:00:00Z",
        "endedAt": "2024-01-01T10:03:30Z",
        "artifact": { "recordingUrl": "https://x/a.wav", "transcript": "hello" }
    }))
}

#[test]
fn jane_scenario_resolves() {
    let summary = resolve(&jane());
    assert_eq!(summary.caller_name, "Jane");
    assert_eq!(summary.caller_number, "+15551234567");
    assert_eq!(summary.duration, "3m 30s");
    assert_eq!(summary.recording_url.as_deref(), Some("https://x/a.wav"));
    assert_eq!(summary.transcript.as_deref(), Some("hello"));
    assert_eq!(summary.notes, "hello");
}

#[test]
fn empty_record_uses_every_fallback() {
    let summary = resolve(&CallRecord::from_value(json!({})));
    assert_eq!(summary.caller_name, "Unknown");
    assert_eq!(summary.caller_number, "WebCall");
    assert_eq!(summary.duration, "-");
    assert_eq!(summary.recording_url, None);
    assert_eq!(summary.transcript, None);
    assert_eq!(summary.notes, "No notes available.");
    assert!(summary.structured_fields.is_empty());
    assert!(summary.structured_blocks.is_empty());
}

#[test]
fn durations_from_timestamps() {
    let span = |start: &str, end: Option<&str>| {
        let mut value = json!({ "startedAt": start });
        if let Some(end) = end {
            value["endedAt"] = json!(end);
        }
        resolve(&CallRecord::from_value(value)).duration
    };
    assert_eq!(span("2024-03-01T12:00:00Z", Some("2024-03-01T12:02:05Z")), "2m 5s");
    assert_eq!(span("2024-03-01T12:00:10Z", Some("2024-03-01T12:00:00Z")), "0m 0s");
    assert_eq!(span("2024-03-01T12:00:00Z", None), "-");
    assert_eq!(span("not a time", Some("2024-03-01T12:00:00Z")), "-");
}

#[test]
fn resolving_is_idempotent() {
    let record = CallRecord::from_value(json!({
        "analysis": {
            "summary": "Wants a refund.",
            "successEvaluation": true,
            "structuredData": { "order_id": "A-17", "items": [{ "sku": 1 }] },
            "structuredDataMulti": [{ "x": 1 }, { "y": 2 }]
        },
        "phoneNumber": { "name": "Support line", "number": "+18005550100" }
    }));
    let first = resolve(&record);
    let second = resolve(&record);
    assert_eq!(first, second);
    assert_eq!(first.success_evaluation.as_deref(), Some("true"));
    assert_eq!(first.caller_name, "Support line");
}

#[test]
fn seek_past_end_is_clamped() {
    let mut player = PlaybackController::new(FakeMedia::default());
    player.attach(resolve(&jane()).recording_url.as_deref());
    player.on_notification(MediaNotification::MetadataLoaded { duration: 180.0 });
    player.seek(200.0);
    assert_eq!(player.state().current_time, 180.0);
    assert_eq!(player.media().calls.last(), Some(&Call::Seek(180.0)));
}

#[test]
fn play_then_pause_issues_both_in_order() {
    let mut player = PlaybackController::new(FakeMedia::default());
    player.attach(Some("https://x/a.wav"));
    player.play();
    player.pause();
    assert!(!player.state().is_playing);
    assert_eq!(
        player.media().calls,
        vec![Call::Load("https://x/a.wav".to_string()), Call::Play, Call::Pause]
    );
}

#[test]
fn ended_returns_to_paused() {
    let mut player = PlaybackController::new(FakeMedia::default());
    player.attach(Some("https://x/a.wav"));
    player.play();
    player.on_notification(MediaNotification::MetadataLoaded { duration: 3.0 });
    player.on_notification(MediaNotification::Progress { position: 3.0 });
    player.on_notification(MediaNotification::Ended);
    assert_eq!(player.transport(), TransportState::Paused);
    assert_eq!(player.state().current_time, 3.0);
}

#[test]
fn swapping_records_resets_state() {
    let mut player = PlaybackController::new(FakeMedia::default());
    player.attach(Some("https://x/a.wav"));
    player.play();
    player.on_notification(MediaNotification::MetadataLoaded { duration: 90.0 });
    player.on_notification(MediaNotification::Progress { position: 45.0 });

    let other = CallRecord::from_value(json!({ "id": "web-1" }));
    player.attach(resolve(&other).recording_url.as_deref());
    assert_eq!(player.state(), PlaybackState::default());
    assert_eq!(player.transport(), TransportState::Idle);
    assert_eq!(player.media().calls.last(), Some(&Call::Unload));
    assert_eq!(player.download(other.id.as_deref()), None);
}

#[test]
fn download_is_named_after_the_call() {
    let record = jane();
    let mut player = PlaybackController::new(FakeMedia::default());
    player.attach(resolve(&record).recording_url.as_deref());
    let before = player.state();
    let request = player.download(record.id.as_deref()).unwrap();
    assert_eq!(request.url, "https://x/a.wav");
    assert_eq!(request.file_name, "call-recording-call-42.wav");
    assert_eq!(player.state(), before);
    assert_eq!(
        download_file_name(Some("call-42"), "https://x/a.wav"),
        request.file_name
    );
}

#[test]
fn live_counter_truncates() {
    assert_eq!(format_clock(65.9), "1:05");
    assert_eq!(format_clock(125.0), "2:05");
}
