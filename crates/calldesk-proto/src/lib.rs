//! Call-record resolution and recording playback for the calldesk inspector.
//!
//! `resolver` turns a loosely-typed [`record::CallRecord`] into display
//! fields; `playback` drives one recording through a [`playback::MediaPrimitive`].
//! Neither does any I/O.

pub mod config;
pub mod platform;
pub mod playback;
pub mod protocol;
pub mod record;
pub mod resolver;

pub use playback::{
    format_clock, DownloadRequest, MediaPrimitive, PlaybackController, PlaybackState,
    TransportState,
};
pub use protocol::{MediaCommandKind, MediaNotification, PlayerCommand};
pub use record::CallRecord;
pub use resolver::{resolve, ResolvedCallSummary};
