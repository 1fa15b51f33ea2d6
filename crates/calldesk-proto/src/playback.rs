//! Playback controller for one call recording.
//!
//! ```text
//!   attach(Some(url))        play()
//!   ───────────────▶ Paused ───────▶ Playing
//!   Idle ◀── detach()  ▲   ◀───────    │
//!                      │  pause()      │
//!                      └── Ended ──────┘
//! ```
//!
//! Commands update state optimistically and are forwarded to the media
//! primitive without waiting for confirmation.  Notifications from the
//! primitive then move the position and duration.  While `Idle` every
//! notification is dropped: it belongs to a source that is gone.

use tracing::{debug, info, warn};

use crate::protocol::{MediaCommandKind, MediaNotification};

/// Fire-and-forget audio transport.  Implementations report progress back
/// through `MediaNotification`s delivered to `PlaybackController::on_notification`.
pub trait MediaPrimitive {
    fn load(&mut self, url: &str);
    fn unload(&mut self);
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, position_secs: f64);
}

impl<M: MediaPrimitive + ?Sized> MediaPrimitive for Box<M> {
    fn load(&mut self, url: &str) {
        (**self).load(url)
    }
    fn unload(&mut self) {
        (**self).unload()
    }
    fn play(&mut self) {
        (**self).play()
    }
    fn pause(&mut self) {
        (**self).pause()
    }
    fn seek(&mut self, position_secs: f64) {
        (**self).seek(position_secs)
    }
}

/// Transport values the view renders.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlaybackState {
    pub is_playing: bool,
    /// Seconds, never negative, never past `duration` once that is known.
    pub current_time: f64,
    /// Seconds; 0 until the primitive reports metadata.
    pub duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No recording attached.
    Idle,
    Paused,
    Playing,
}

/// A save-as request for the attached recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub url: String,
    pub file_name: String,
}

pub struct PlaybackController<M: MediaPrimitive> {
    media: M,
    source: Option<String>,
    state: PlaybackState,
}

impl<M: MediaPrimitive> PlaybackController<M> {
    pub fn new(media: M) -> Self {
        Self {
            media,
            source: None,
            state: PlaybackState::default(),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn transport(&self) -> TransportState {
        match (&self.source, self.state.is_playing) {
            (None, _) => TransportState::Idle,
            (Some(_), false) => TransportState::Paused,
            (Some(_), true) => TransportState::Playing,
        }
    }

    /// Seeking is meaningful once a source is attached and its length known.
    pub fn can_seek(&self) -> bool {
        self.source.is_some() && self.state.duration > 0.0
    }

    /// Bind to a new recording (or none).  Always starts from a fresh state.
    pub fn attach(&mut self, url: Option<&str>) {
        self.state = PlaybackState::default();
        match url {
            Some(url) => {
                info!("playback: attach {}", url);
                self.source = Some(url.to_string());
                self.media.load(url);
            }
            None => self.release(),
        }
    }

    /// Drop the current recording; the view closed or the record changed.
    pub fn detach(&mut self) {
        self.state = PlaybackState::default();
        self.release();
    }

    fn release(&mut self) {
        if self.source.take().is_some() {
            info!("playback: detach");
            self.media.unload();
        }
    }

    pub fn play(&mut self) {
        if self.source.is_none() {
            debug!("playback: play ignored, no source");
            return;
        }
        self.media.play();
        self.set_playing(true);
    }

    pub fn pause(&mut self) {
        if self.source.is_none() {
            debug!("playback: pause ignored, no source");
            return;
        }
        self.media.pause();
        self.set_playing(false);
    }

    pub fn toggle(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Move the cursor to `position` seconds, clamped to `[0, duration]`.
    pub fn seek(&mut self, position: f64) {
        if !self.can_seek() || position.is_nan() {
            debug!("playback: seek to {} ignored", position);
            return;
        }
        let target = position.clamp(0.0, self.state.duration);
        self.media.seek(target);
        self.state.current_time = target;
    }

    /// The recording as a save-as request, `None` when nothing is attached.
    pub fn download(&self, call_id: Option<&str>) -> Option<DownloadRequest> {
        let url = self.source.as_ref()?;
        Some(DownloadRequest {
            url: url.clone(),
            file_name: download_file_name(call_id, url),
        })
    }

    pub fn on_notification(&mut self, notification: MediaNotification) {
        if self.source.is_none() {
            debug!("playback: dropping {:?}, no source", notification);
            return;
        }
        match notification {
            MediaNotification::Progress { position } => {
                if !position.is_finite() {
                    debug!("playback: ignoring position {}", position);
                    return;
                }
                let mut position = position.max(0.0);
                if self.state.duration > 0.0 {
                    position = position.min(self.state.duration);
                }
                self.state.current_time = position;
            }
            MediaNotification::MetadataLoaded { duration } => {
                if !duration.is_finite() || duration < 0.0 {
                    warn!("playback: ignoring reported duration {}", duration);
                    return;
                }
                debug!("playback: duration {}s", duration);
                self.state.duration = duration;
                if duration > 0.0 && self.state.current_time > duration {
                    self.state.current_time = duration;
                }
            }
            MediaNotification::Ended => {
                info!("playback: source ended");
                self.set_playing(false);
            }
            MediaNotification::Rejected { command } => {
                warn!("playback: media rejected {}", command);
                if command == MediaCommandKind::Play {
                    self.set_playing(false);
                }
            }
        }
    }

    fn set_playing(&mut self, playing: bool) {
        if self.state.is_playing != playing {
            debug!(
                "playback: is_playing {} → {}",
                self.state.is_playing, playing
            );
        }
        self.state.is_playing = playing;
    }
}

/// `call-recording-<id>.<ext>`, extension taken from the URL path.
///
/// The id comes from upstream data, so anything other than ASCII
/// alphanumerics, `-`, `_` and `.` becomes `_`.  The result is always a
/// single path component.
pub fn download_file_name(call_id: Option<&str>, url: &str) -> String {
    let id = call_id
        .map(sanitize_id)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    format!("call-recording-{}.{}", id, url_extension(url).unwrap_or_else(|| "wav".to_string()))
}

fn sanitize_id(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    // Skip scheme and host so `https://example.com` has no extension.
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.split_once('/')?.1,
        None => path,
    };
    let (_, last) = path.rsplit_once('/').unwrap_or(("", path));
    let (stem, ext) = last.rsplit_once('.')?;
    let valid = !stem.is_empty()
        && (1..=5).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}

/// Live transport counter: `m:ss`, fractional seconds truncated.
pub fn format_clock(secs: f64) -> String {
    let total = if secs.is_finite() && secs > 0.0 {
        secs.trunc() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
