//! Operator commands read from stdin, one per line.

use calldesk_proto::PlayerCommand;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::core::InspectorEvent;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    Player(PlayerCommand),
    /// `seek +10` / `seek -5`: relative to the current position.
    SeekBy(f64),
    /// 1-based index into the loaded calls.
    Open(usize),
    Close,
    Status,
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_line(line: &str) -> Option<ConsoleInput> {
    let mut words = line.split_whitespace();
    let head = words.next()?.to_ascii_lowercase();
    let arg = words.next();

    let input = match (head.as_str(), arg) {
        ("play", None) => ConsoleInput::Player(PlayerCommand::Play),
        ("pause", None) => ConsoleInput::Player(PlayerCommand::Pause),
        ("toggle" | "p", None) => ConsoleInput::Player(PlayerCommand::Toggle),
        ("download" | "d", None) => ConsoleInput::Player(PlayerCommand::Download),
        ("seek", Some(arg)) => match parse_seek(arg) {
            Some(SeekArg::Absolute(seconds)) => {
                ConsoleInput::Player(PlayerCommand::Seek { seconds })
            }
            Some(SeekArg::Relative(delta)) => ConsoleInput::SeekBy(delta),
            None => ConsoleInput::Unknown(line.trim().to_string()),
        },
        ("open", Some(arg)) => match arg.parse::<usize>() {
            Ok(n) if n > 0 => ConsoleInput::Open(n),
            _ => ConsoleInput::Unknown(line.trim().to_string()),
        },
        ("close", None) => ConsoleInput::Close,
        ("status" | "s", None) => ConsoleInput::Status,
        ("help" | "?", None) => ConsoleInput::Help,
        ("quit" | "q" | "exit", None) => ConsoleInput::Quit,
        _ => ConsoleInput::Unknown(line.trim().to_string()),
    };
    Some(input)
}

#[derive(Debug, PartialEq)]
enum SeekArg {
    Absolute(f64),
    Relative(f64),
}

fn parse_seek(arg: &str) -> Option<SeekArg> {
    if let Some(rest) = arg.strip_prefix('+') {
        return parse_position(rest).map(SeekArg::Relative);
    }
    if let Some(rest) = arg.strip_prefix('-') {
        return parse_position(rest).map(|d| SeekArg::Relative(-d));
    }
    parse_position(arg).map(SeekArg::Absolute)
}

/// `90`, `90.5` or `1:30`.
fn parse_position(s: &str) -> Option<f64> {
    let secs = match s.split_once(':') {
        Some((m, ss)) => {
            let minutes: u64 = m.parse().ok()?;
            let seconds: f64 = ss.parse().ok()?;
            if !(0.0..60.0).contains(&seconds) {
                return None;
            }
            minutes as f64 * 60.0 + seconds
        }
        None => s.parse().ok()?,
    };
    (secs.is_finite() && secs >= 0.0).then_some(secs)
}

/// Forward stdin lines to the core until EOF, then request shutdown.
pub async fn read_stdin(events: mpsc::Sender<InspectorEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let Some(input) = parse_line(&line) else {
                    continue;
                };
                debug!("console: {:?}", input);
                if events.send(InspectorEvent::Input(input)).await.is_err() {
                    return;
                }
            }
            Ok(None) => {
                info!("console: stdin closed");
                break;
            }
            Err(e) => {
                info!("console: stdin read error: {}", e);
                break;
            }
        }
    }
    let _ = events.send(InspectorEvent::Shutdown).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_words() {
        assert_eq!(parse_line("play"), Some(ConsoleInput::Player(PlayerCommand::Play)));
        assert_eq!(parse_line("  PAUSE "), Some(ConsoleInput::Player(PlayerCommand::Pause)));
        assert_eq!(parse_line("p"), Some(ConsoleInput::Player(PlayerCommand::Toggle)));
        assert_eq!(parse_line("d"), Some(ConsoleInput::Player(PlayerCommand::Download)));
        assert_eq!(parse_line("q"), Some(ConsoleInput::Quit));
        assert_eq!(parse_line(""), None);
    }

    #[test]
    fn test_seek_forms() {
        assert_eq!(
            parse_line("seek 90"),
            Some(ConsoleInput::Player(PlayerCommand::Seek { seconds: 90.0 }))
        );
        assert_eq!(
            parse_line("seek 1:30"),
            Some(ConsoleInput::Player(PlayerCommand::Seek { seconds: 90.0 }))
        );
        assert_eq!(parse_line("seek +10"), Some(ConsoleInput::SeekBy(10.0)));
        assert_eq!(parse_line("seek -0:05"), Some(ConsoleInput::SeekBy(-5.0)));
        assert_eq!(
            parse_line("seek 1:75"),
            Some(ConsoleInput::Unknown("seek 1:75".to_string()))
        );
        assert_eq!(parse_line("seek"), Some(ConsoleInput::Unknown("seek".to_string())));
    }

    #[test]
    fn test_open_is_one_based() {
        assert_eq!(parse_line("open 2"), Some(ConsoleInput::Open(2)));
        assert_eq!(parse_line("open 0"), Some(ConsoleInput::Unknown("open 0".to_string())));
        assert_eq!(parse_line("open x"), Some(ConsoleInput::Unknown("open x".to_string())));
    }
}
