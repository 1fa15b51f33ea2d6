//! Plain-text rendering of a resolved call and its player.

use std::fmt::Write as _;

use calldesk_proto::resolver::{self, ResolvedCallSummary};
use calldesk_proto::{format_clock, CallRecord, PlaybackState, TransportState};

pub const HELP: &str = "\
commands:
  play | pause | toggle (p)     control playback
  seek <secs|m:ss>              jump to a position
  seek +<secs> | seek -<secs>   jump relative to the current position
  download (d)                  save the recording
  open <n> | close              switch to another call from the list
  status (s)                    print the player line
  help (?) | quit (q)";

pub fn render_summary(summary: &ResolvedCallSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Call       {}", summary.call_id.as_deref().unwrap_or("-"));
    let _ = writeln!(out, "Caller     {}", summary.caller_name);
    let _ = writeln!(out, "Number     {}", summary.caller_number);
    let _ = writeln!(out, "Duration   {}", summary.duration);
    if let Some(success) = &summary.success_evaluation {
        let _ = writeln!(out, "Success    {}", success);
    }
    let _ = writeln!(
        out,
        "Recording  {}",
        summary.recording_url.as_deref().unwrap_or("none")
    );

    let _ = writeln!(out, "\nNotes\n{}", indent(&summary.notes));

    if !summary.structured_fields.is_empty() {
        let _ = writeln!(out, "\nStructured data");
        let width = summary
            .structured_fields
            .iter()
            .map(|f| f.label.chars().count())
            .max()
            .unwrap_or(0);
        for field in &summary.structured_fields {
            let value = if field.value.contains('\n') {
                format!("\n{}", indent(&field.value))
            } else {
                field.value.clone()
            };
            let _ = writeln!(out, "  {:<width$}  {}", field.label, value, width = width);
        }
    }

    for block in &summary.structured_blocks {
        let _ = writeln!(out, "\nBlock {}\n{}", block.number, indent(&block.body));
    }

    if let Some(transcript) = &summary.transcript {
        let _ = writeln!(out, "\nTranscript\n{}", indent(transcript));
    }
    out
}

/// `▶ 1:05 / 3:30`, or a note that there is nothing to play.
pub fn transport_line(transport: TransportState, state: PlaybackState) -> String {
    let icon = match transport {
        TransportState::Idle => return "■ no recording".to_string(),
        TransportState::Playing => '▶',
        TransportState::Paused => '⏸',
    };
    let total = if state.duration > 0.0 {
        format_clock(state.duration)
    } else {
        "-:--".to_string()
    };
    format!("{} {} / {}", icon, format_clock(state.current_time), total)
}

/// One line per call for `list` and the inspector's index.
pub fn history_rows(calls: &[CallRecord]) -> Vec<String> {
    calls
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let summary = resolver::resolve(record);
            let when = record
                .created_at
                .as_deref()
                .or(record.started_at.as_deref())
                .and_then(resolver::parse_instant)
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string());
            let audio = if summary.recording_url.is_some() { "♪" } else { " " };
            format!(
                "{:>3}  {:<16}  {:<20}  {:<16}  {:>8}  {} {}",
                i + 1,
                when,
                truncate(&summary.caller_name, 20),
                truncate(&summary.caller_number, 16),
                summary.duration,
                audio,
                record.ended_reason.as_deref().or(record.status.as_deref()).unwrap_or(""),
            )
        })
        .collect()
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut cut: String = s.chars().take(max.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_lists_fallbacks() {
        let summary = resolver::resolve(&CallRecord::default());
        let text = render_summary(&summary);
        assert!(text.contains("Caller     Unknown"));
        assert!(text.contains("Number     WebCall"));
        assert!(text.contains("Duration   -"));
        assert!(text.contains("Recording  none"));
        assert!(text.contains("No notes available."));
        assert!(!text.contains("Transcript"));
    }

    #[test]
    fn test_structured_values_are_aligned() {
        let record = CallRecord::from_value(json!({
            "analysis": { "structuredData": { "order_id": "A-17", "items": [1, 2] } }
        }));
        let text = render_summary(&resolver::resolve(&record));
        assert!(text.contains("  order id  A-17"));
        assert!(text.contains("  items     \n"));
    }

    #[test]
    fn test_transport_line() {
        let state = PlaybackState {
            is_playing: true,
            current_time: 65.9,
            duration: 210.0,
        };
        assert_eq!(transport_line(TransportState::Playing, state), "▶ 1:05 / 3:30");
        assert_eq!(
            transport_line(TransportState::Paused, PlaybackState::default()),
            "⏸ 0:00 / -:--"
        );
        assert_eq!(
            transport_line(TransportState::Idle, PlaybackState::default()),
            "■ no recording"
        );
    }

    #[test]
    fn test_history_rows() {
        let calls = CallRecord::many_from_value(json!([
            {
                "createdAt": "2024-01-01T09:59:00Z",
                "customer": { "name": "Jane", "number": "+15551234567" },
                "startedAt": "2024-01-01T10:00:00Z",
                "endedAt": "2024-01-01T10:03:30Z",
                "endedReason": "customer-ended-call",
                "artifact": { "recordingUrl": "https://x/a.wav" }
            },
            {}
        ]));
        let rows = history_rows(&calls);
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("  1  2024-01-01 09:59"));
        assert!(rows[0].contains("3m 30s  ♪ customer-ended-call"));
        assert!(rows[1].contains("Unknown"));
        assert!(rows[1].contains("WebCall"));
    }

    #[test]
    fn test_truncate_marks_cut() {
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
