/// InspectorCore: single-owner event loop for the call inspector.
///
/// Operator input, mpv events, media rejections and download outcomes all
/// arrive as `InspectorEvent`s on one channel.  The core owns the loaded
/// calls and the `PlaybackController` exclusively and handles each event to
/// completion before taking the next, so the controller never sees
/// concurrent access.
///
/// Media events are stamped with the `Generation` current when their source
/// was attached.  Each open or close advances it, so events still in flight
/// from a previous recording are dropped instead of landing in the new
/// `PlaybackState`.
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use calldesk_proto::resolver::ResolvedCallSummary;
use calldesk_proto::{
    resolve, CallRecord, MediaCommandKind, MediaNotification, MediaPrimitive, PlaybackController,
    PlayerCommand, TransportState,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::console::ConsoleInput;
use crate::download::Downloader;
use crate::media::{notification_from_mpv, Generation};
use crate::mpv::MpvEvent;
use crate::view;

pub type BoxedMedia = Box<dyn MediaPrimitive + Send>;

// ── InspectorEvent ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum InspectorEvent {
    /// A line typed by the operator.
    Input(ConsoleInput),
    /// Raw mpv unsolicited event (forwarded from the reader task).
    Mpv { generation: u64, event: MpvEvent },
    /// Reported by the media task itself, e.g. a failed command.
    Media {
        generation: u64,
        notification: MediaNotification,
    },
    DownloadFinished {
        file_name: String,
        result: Result<PathBuf, String>,
    },
    Shutdown,
}

// ── InspectorCore ─────────────────────────────────────────────────────────────

pub struct InspectorCore<W: Write> {
    calls: Vec<CallRecord>,
    /// Index into `calls` of the call on screen.
    open: Option<usize>,
    summary: Option<ResolvedCallSummary>,
    player: PlaybackController<BoxedMedia>,
    /// Shared with the media primitive; advanced on every attach and detach.
    generation: Generation,
    /// Finishes once the media primitive is dropped and mpv is gone.
    media_task: Option<JoinHandle<()>>,
    downloader: Downloader,
    event_tx: mpsc::Sender<InspectorEvent>,
    out: W,
}

impl<W: Write> InspectorCore<W> {
    pub fn new(
        calls: Vec<CallRecord>,
        media: BoxedMedia,
        generation: Generation,
        media_task: Option<JoinHandle<()>>,
        downloader: Downloader,
        event_tx: mpsc::Sender<InspectorEvent>,
        out: W,
    ) -> Self {
        Self {
            calls,
            open: None,
            summary: None,
            player: PlaybackController::new(media),
            generation,
            media_task,
            downloader,
            event_tx,
            out,
        }
    }

    /// Show call `index` (0-based) and run until quit or stdin closes.
    pub async fn run(
        mut self,
        index: usize,
        mut event_rx: mpsc::Receiver<InspectorEvent>,
    ) -> anyhow::Result<()> {
        info!("InspectorCore: starting event loop with {} calls", self.calls.len());
        self.open_call(index);
        self.say("type `help` for commands");

        loop {
            let Some(evt) = event_rx.recv().await else {
                info!("InspectorCore: event channel closed, shutting down");
                break;
            };
            if !self.handle_event(evt) {
                break;
            }
        }

        // Unblock the media task if it is waiting to report into a full channel.
        drop(event_rx);
        self.shutdown().await;
        Ok(())
    }

    /// Returns false when the loop should stop.
    pub fn handle_event(&mut self, evt: InspectorEvent) -> bool {
        match evt {
            InspectorEvent::Shutdown => {
                info!("InspectorCore: shutdown requested");
                return false;
            }
            InspectorEvent::Input(input) => {
                debug!("InspectorCore: input {:?}", input);
                return self.handle_input(input);
            }
            InspectorEvent::Mpv { generation, event } => {
                if let Some(notification) = notification_from_mpv(&event) {
                    self.handle_notification(generation, notification);
                }
            }
            InspectorEvent::Media {
                generation,
                notification,
            } => self.handle_notification(generation, notification),
            InspectorEvent::DownloadFinished { file_name, result } => match result {
                Ok(path) => self.say(&format!("saved {}", path.display())),
                Err(e) => self.say(&format!("download of {} failed: {}", file_name, e)),
            },
        }
        true
    }

    fn handle_input(&mut self, input: ConsoleInput) -> bool {
        match input {
            ConsoleInput::Player(cmd) => self.handle_command(cmd),
            ConsoleInput::SeekBy(delta) => {
                let target = self.player.state().current_time + delta;
                self.handle_command(PlayerCommand::Seek { seconds: target });
            }
            ConsoleInput::Open(n) => {
                if n == 0 || n > self.calls.len() {
                    self.say(&format!("no call #{} (1-{})", n, self.calls.len()));
                } else {
                    self.open_call(n - 1);
                }
            }
            ConsoleInput::Close => {
                self.generation.advance();
                self.player.detach();
                self.open = None;
                self.summary = None;
                self.say("closed");
            }
            ConsoleInput::Status => {
                let which = match self.open {
                    Some(i) => format!("call #{}", i + 1),
                    None => "no call open".to_string(),
                };
                let line = self.transport_line();
                self.say(&format!("{}  {}", which, line));
            }
            ConsoleInput::Help => self.say(view::HELP),
            ConsoleInput::Quit => {
                info!("InspectorCore: quit");
                return false;
            }
            ConsoleInput::Unknown(line) => {
                self.say(&format!("unknown command `{}`, try `help`", line));
            }
        }
        true
    }

    fn handle_command(&mut self, cmd: PlayerCommand) {
        match cmd {
            PlayerCommand::Play => self.player.play(),
            PlayerCommand::Pause => self.player.pause(),
            PlayerCommand::Toggle => self.player.toggle(),
            PlayerCommand::Seek { seconds } => {
                if !self.player.can_seek() {
                    self.say("cannot seek: no recording loaded or length unknown");
                    return;
                }
                self.player.seek(seconds);
            }
            PlayerCommand::Download => {
                self.start_download();
                return;
            }
        }
        if self.player.transport() == TransportState::Idle {
            self.say("no recording for this call");
            return;
        }
        let line = self.transport_line();
        self.say(&line);
    }

    fn handle_notification(&mut self, generation: u64, notification: MediaNotification) {
        if generation != self.generation.current() {
            debug!(
                "InspectorCore: dropping {:?} from source generation {}",
                notification, generation
            );
            return;
        }
        let attached = self.player.transport() != TransportState::Idle;
        let announce = match &notification {
            MediaNotification::Ended => Some("finished".to_string()),
            MediaNotification::Rejected {
                command: MediaCommandKind::Play,
            } => Some("audio unavailable, recording can still be downloaded".to_string()),
            MediaNotification::Rejected { command } => Some(format!("{} failed", command)),
            _ => None,
        };
        self.player.on_notification(notification);
        if let (true, Some(message)) = (attached, announce) {
            let line = self.transport_line();
            self.say(&format!("{}  {}", message, line));
        }
    }

    fn open_call(&mut self, index: usize) {
        let Some(record) = self.calls.get(index) else {
            warn!("InspectorCore: no call at index {}", index);
            return;
        };
        let summary = resolve(record);
        info!(
            "InspectorCore: opening call #{} id={:?}",
            index + 1,
            summary.call_id
        );
        self.generation.advance();
        self.player.attach(summary.recording_url.as_deref());
        self.open = Some(index);
        let text = view::render_summary(&summary);
        self.summary = Some(summary);
        self.say(&text);
        let line = self.transport_line();
        self.say(&line);
    }

    fn start_download(&mut self) {
        let call_id = self.summary.as_ref().and_then(|s| s.call_id.clone());
        let Some(request) = self.player.download(call_id.as_deref()) else {
            self.say("nothing to download");
            return;
        };
        self.say(&format!(
            "downloading {} to {}",
            request.file_name,
            self.downloader.dir().display()
        ));

        let downloader = self.downloader.clone();
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = downloader.save(&request).await.map_err(|e| {
                error!("download: {} failed: {}", request.url, e);
                e.to_string()
            });
            let _ = tx
                .send(InspectorEvent::DownloadFinished {
                    file_name: request.file_name,
                    result,
                })
                .await;
        });
    }

    fn transport_line(&self) -> String {
        view::transport_line(self.player.transport(), self.player.state())
    }

    fn say(&mut self, text: &str) {
        if let Err(e) = writeln!(self.out, "{}", text).and_then(|_| self.out.flush()) {
            warn!("InspectorCore: write failed: {}", e);
        }
    }

    async fn shutdown(self) {
        let Self {
            mut player,
            generation,
            media_task,
            ..
        } = self;
        generation.advance();
        player.detach();
        // Dropping the primitive closes its command channel; the media task
        // then stops mpv and exits.
        drop(player);
        if let Some(task) = media_task {
            if tokio::time::timeout(Duration::from_secs(3), task).await.is_err() {
                warn!("InspectorCore: media task did not stop in time");
            }
        }
        info!("InspectorCore: stopped");
    }
}
