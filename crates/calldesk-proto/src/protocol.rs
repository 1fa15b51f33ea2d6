//! Messages flowing into the playback controller.
//!
//! Operator commands and media notifications are plain values so the host
//! can queue them, log them, and feed them to the controller one at a time.

use std::fmt;

/// Operator intent from the detail view.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    /// Play when paused, pause when playing.
    Toggle,
    /// Absolute position in seconds; clamped by the controller.
    Seek { seconds: f64 },
    Download,
}

/// Asynchronous report from the media primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaNotification {
    /// Periodic playback position, seconds.
    Progress { position: f64 },
    /// Total length became known, seconds.
    MetadataLoaded { duration: f64 },
    /// Source played through to the end.
    Ended,
    /// The primitive refused or failed a command it was given.
    Rejected { command: MediaCommandKind },
}

/// Commands the controller issues to the media primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaCommandKind {
    Load,
    Unload,
    Play,
    Pause,
    Seek,
}

impl fmt::Display for MediaCommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaCommandKind::Load => "load",
            MediaCommandKind::Unload => "unload",
            MediaCommandKind::Play => "play",
            MediaCommandKind::Pause => "pause",
            MediaCommandKind::Seek => "seek",
        };
        f.write_str(name)
    }
}
