//! Media primitives backing the inspector's player.
//!
//! `MpvMedia` queues every command on one channel drained by a single task,
//! so mpv sees them in the order the controller issued them.  mpv's
//! unsolicited events come back as `InspectorEvent::Mpv` and are turned into
//! `MediaNotification`s by `notification_from_mpv`.
//!
//! Every event handed to the core carries the `Generation` of the source it
//! belongs to.  The core bumps the generation on each attach and detach and
//! discards anything stamped with an older one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use calldesk_proto::config::MpvConfig;
use calldesk_proto::{MediaCommandKind, MediaNotification, MediaPrimitive};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::InspectorEvent;
use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBS_DURATION, OBS_EOF_REACHED, OBS_TIME_POS};

/// Counter shared by the core and the media primitive.  Identifies which
/// attached source a media event belongs to.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
enum MediaRequest {
    Load(String),
    Unload,
    Play,
    Pause,
    Seek(f64),
}

impl MediaRequest {
    fn kind(&self) -> MediaCommandKind {
        match self {
            MediaRequest::Load(_) => MediaCommandKind::Load,
            MediaRequest::Unload => MediaCommandKind::Unload,
            MediaRequest::Play => MediaCommandKind::Play,
            MediaRequest::Pause => MediaCommandKind::Pause,
            MediaRequest::Seek(_) => MediaCommandKind::Seek,
        }
    }
}

// ── mpv-backed primitive ──────────────────────────────────────────────────────

pub struct MpvMedia {
    tx: mpsc::UnboundedSender<(u64, MediaRequest)>,
    generation: Generation,
}

impl MpvMedia {
    /// Start the command task.  mpv itself is spawned lazily on the first
    /// load.  The returned handle finishes once the `MpvMedia` is dropped and
    /// mpv has been shut down.
    pub fn spawn(
        config: MpvConfig,
        generation: Generation,
        events: mpsc::Sender<InspectorEvent>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(media_task(MpvDriver::new(config), rx, events));
        (Self { tx, generation }, task)
    }

    fn dispatch(&self, request: MediaRequest) {
        if self.tx.send((self.generation.current(), request)).is_err() {
            debug!("media: command task gone, dropping request");
        }
    }
}

impl MediaPrimitive for MpvMedia {
    fn load(&mut self, url: &str) {
        self.dispatch(MediaRequest::Load(url.to_string()));
    }

    fn unload(&mut self) {
        self.dispatch(MediaRequest::Unload);
    }

    fn play(&mut self) {
        self.dispatch(MediaRequest::Play);
    }

    fn pause(&mut self) {
        self.dispatch(MediaRequest::Pause);
    }

    fn seek(&mut self, position_secs: f64) {
        self.dispatch(MediaRequest::Seek(position_secs));
    }
}

/// Tells the event forwarder which source mpv is about to play.
#[derive(Debug, Clone, Copy, PartialEq)]
enum SourceMark {
    /// A `loadfile` for this generation is about to be written; events up
    /// to mpv's `start-file` still belong to the previous source.
    Loading(u64),
    /// From now on events belong to this generation.
    Current(u64),
}

struct Session {
    handle: MpvHandle,
    marks: mpsc::UnboundedSender<SourceMark>,
}

async fn media_task(
    mut driver: MpvDriver,
    mut rx: mpsc::UnboundedReceiver<(u64, MediaRequest)>,
    events: mpsc::Sender<InspectorEvent>,
) {
    let mut session: Option<Session> = None;

    while let Some((generation, request)) = rx.recv().await {
        if session.is_some() && !driver.process_alive() {
            warn!("media: mpv process died, dropping handle");
            session = None;
        }
        if session.is_none() {
            // Only a load is worth starting mpv for.
            if request == MediaRequest::Unload {
                continue;
            }
            if !matches!(request, MediaRequest::Load(_)) {
                reject(&events, generation, request.kind()).await;
                continue;
            }
            session = connect(&mut driver, &events).await;
        }
        let Some(s) = session.as_ref() else {
            reject(&events, generation, request.kind()).await;
            continue;
        };

        let kind = request.kind();
        let result = match request {
            MediaRequest::Load(url) => {
                let _ = s.marks.send(SourceMark::Loading(generation));
                s.handle.load_paused(&url).await
            }
            MediaRequest::Unload => {
                let _ = s.marks.send(SourceMark::Current(generation));
                s.handle.stop().await
            }
            MediaRequest::Play => s.handle.set_pause(false).await,
            MediaRequest::Pause => s.handle.set_pause(true).await,
            MediaRequest::Seek(secs) => s.handle.seek_to(secs).await,
        };
        if let Err(e) = result {
            warn!("media: {} failed: {}", kind, e);
            reject(&events, generation, kind).await;
        }
    }

    info!("media: controller gone, shutting mpv down");
    if let Some(s) = session.take() {
        let _ = s.handle.stop().await;
    }
    driver.kill().await;
}

async fn connect(driver: &mut MpvDriver, events: &mpsc::Sender<InspectorEvent>) -> Option<Session> {
    let (mpv_tx, mpv_rx) = mpsc::channel::<MpvEvent>(64);
    let (marks_tx, marks_rx) = mpsc::unbounded_channel();
    tokio::spawn(forward_events(mpv_rx, marks_rx, events.clone()));

    match driver.spawn_and_connect(mpv_tx).await {
        Ok(handle) => {
            handle.observe_transport().await;
            Some(Session {
                handle,
                marks: marks_tx,
            })
        }
        Err(e) => {
            warn!("media: failed to start mpv: {}", e);
            None
        }
    }
}

/// Stamp mpv events with the generation of the source they describe.
///
/// Marks are always polled first: a `Loading` mark is queued before its
/// `loadfile` is written, so it is seen before the matching `start-file`.
async fn forward_events(
    mut mpv_rx: mpsc::Receiver<MpvEvent>,
    mut marks: mpsc::UnboundedReceiver<SourceMark>,
    events: mpsc::Sender<InspectorEvent>,
) {
    let mut current = 0u64;
    let mut loading: Option<u64> = None;
    loop {
        tokio::select! {
            biased;
            Some(mark) = marks.recv() => match mark {
                SourceMark::Loading(generation) => loading = Some(generation),
                SourceMark::Current(generation) => {
                    loading = None;
                    current = generation;
                }
            },
            evt = mpv_rx.recv() => {
                let Some(event) = evt else { break };
                if let Some(generation) = loading {
                    if event.event_name() != Some("start-file") {
                        debug!("media: dropping event of previous source {:?}", event.raw);
                        continue;
                    }
                    current = generation;
                    loading = None;
                }
                if events
                    .send(InspectorEvent::Mpv { generation: current, event })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}

async fn reject(events: &mpsc::Sender<InspectorEvent>, generation: u64, command: MediaCommandKind) {
    let _ = events
        .send(InspectorEvent::Media {
            generation,
            notification: MediaNotification::Rejected { command },
        })
        .await;
}

/// Translate an mpv event into a controller notification, if it is one.
pub fn notification_from_mpv(evt: &MpvEvent) -> Option<MediaNotification> {
    if let Some((obs_id, data)) = evt.as_property_change() {
        return match obs_id {
            OBS_TIME_POS => data
                .as_f64()
                .map(|position| MediaNotification::Progress { position }),
            OBS_DURATION => data
                .as_f64()
                .map(|duration| MediaNotification::MetadataLoaded { duration }),
            OBS_EOF_REACHED if data.as_bool() == Some(true) => Some(MediaNotification::Ended),
            _ => None,
        };
    }

    match (evt.event_name(), evt.end_reason()) {
        (Some("end-file"), Some("eof")) => Some(MediaNotification::Ended),
        (Some("end-file"), Some("error")) => {
            warn!("mpv: playback failed: {:?}", evt.raw.get("file_error"));
            Some(MediaNotification::Ended)
        }
        _ => None,
    }
}

// ── silent primitive ──────────────────────────────────────────────────────────

/// Used when audio is disabled or unavailable.  Loads are accepted so the
/// view still offers download; every play is reported back as rejected.
pub struct SilentMedia {
    generation: Generation,
    events: mpsc::Sender<InspectorEvent>,
}

impl SilentMedia {
    pub fn new(generation: Generation, events: mpsc::Sender<InspectorEvent>) -> Self {
        Self { generation, events }
    }
}

impl MediaPrimitive for SilentMedia {
    fn load(&mut self, url: &str) {
        debug!("media: silent load {}", url);
    }

    fn unload(&mut self) {}

    fn play(&mut self) {
        let rejected = InspectorEvent::Media {
            generation: self.generation.current(),
            notification: MediaNotification::Rejected {
                command: MediaCommandKind::Play,
            },
        };
        if self.events.try_send(rejected).is_err() {
            debug!("media: could not report rejected play");
        }
    }

    fn pause(&mut self) {}

    fn seek(&mut self, _position_secs: f64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn evt(raw: serde_json::Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn test_property_changes_map_to_notifications() {
        assert_eq!(
            notification_from_mpv(&evt(json!({ "event": "property-change", "id": OBS_TIME_POS, "data": 4.25 }))),
            Some(MediaNotification::Progress { position: 4.25 })
        );
        assert_eq!(
            notification_from_mpv(&evt(json!({ "event": "property-change", "id": OBS_DURATION, "data": 180.0 }))),
            Some(MediaNotification::MetadataLoaded { duration: 180.0 })
        );
        assert_eq!(
            notification_from_mpv(&evt(json!({ "event": "property-change", "id": OBS_EOF_REACHED, "data": true }))),
            Some(MediaNotification::Ended)
        );
    }

    #[test]
    fn test_null_and_irrelevant_events_ignored() {
        assert_eq!(
            notification_from_mpv(&evt(json!({ "event": "property-change", "id": OBS_TIME_POS, "data": null }))),
            None
        );
        assert_eq!(
            notification_from_mpv(&evt(json!({ "event": "property-change", "id": OBS_EOF_REACHED, "data": false }))),
            None
        );
        assert_eq!(
            notification_from_mpv(&evt(json!({ "event": "end-file", "reason": "stop" }))),
            None
        );
        assert_eq!(notification_from_mpv(&evt(json!({ "event": "file-loaded" }))), None);
    }

    #[test]
    fn test_end_file_maps_to_ended() {
        assert_eq!(
            notification_from_mpv(&evt(json!({ "event": "end-file", "reason": "eof" }))),
            Some(MediaNotification::Ended)
        );
        assert_eq!(
            notification_from_mpv(&evt(json!({ "event": "end-file", "reason": "error", "file_error": "not found" }))),
            Some(MediaNotification::Ended)
        );
    }

    #[tokio::test]
    async fn test_silent_media_rejects_play() {
        let (tx, mut rx) = mpsc::channel(4);
        let generation = Generation::default();
        generation.advance();
        let mut media = SilentMedia::new(generation, tx);
        media.load("https://x/a.wav");
        media.play();
        match rx.recv().await {
            Some(InspectorEvent::Media {
                generation: 1,
                notification: MediaNotification::Rejected { command },
            }) => assert_eq!(command, MediaCommandKind::Play),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_generation_advances() {
        let generation = Generation::default();
        let shared = generation.clone();
        assert_eq!(generation.current(), 0);
        assert_eq!(shared.advance(), 1);
        assert_eq!(generation.current(), 1);
    }

    fn stamped(evt: Option<InspectorEvent>) -> (u64, Option<String>) {
        match evt {
            Some(InspectorEvent::Mpv { generation, event }) => {
                (generation, event.event_name().map(str::to_string))
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_forwarder_drops_previous_source_until_start_file() {
        let (mpv_tx, mpv_rx) = mpsc::channel(16);
        let (marks_tx, marks_rx) = mpsc::unbounded_channel();
        let (core_tx, mut core_rx) = mpsc::channel(16);
        tokio::spawn(forward_events(mpv_rx, marks_rx, core_tx));

        let progress = |pos: f64| MpvEvent {
            raw: json!({ "event": "property-change", "id": OBS_TIME_POS, "data": pos }),
        };

        marks_tx.send(SourceMark::Current(1)).unwrap();
        mpv_tx.send(progress(3.0)).await.unwrap();
        assert_eq!(stamped(core_rx.recv().await), (1, Some("property-change".to_string())));

        marks_tx.send(SourceMark::Loading(2)).unwrap();
        mpv_tx.send(progress(95.0)).await.unwrap();
        mpv_tx
            .send(evt(json!({ "event": "start-file", "playlist_entry_id": 2 })))
            .await
            .unwrap();
        mpv_tx.send(progress(0.5)).await.unwrap();

        assert_eq!(stamped(core_rx.recv().await), (2, Some("start-file".to_string())));
        match core_rx.recv().await {
            Some(InspectorEvent::Mpv { generation: 2, event }) => {
                assert_eq!(
                    notification_from_mpv(&event),
                    Some(MediaNotification::Progress { position: 0.5 })
                );
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
