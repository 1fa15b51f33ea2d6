//! Call record → display summary.
//!
//! `resolve` is a total function: every absent or malformed field falls back
//! to a fixed display value, nothing here returns an error or panics.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::record::CallRecord;

pub const UNKNOWN_CALLER: &str = "Unknown";
/// Shown when no number is known at all: the call came from a browser.
pub const WEB_CALL: &str = "WebCall";
pub const NO_DURATION: &str = "-";
pub const NO_NOTES: &str = "No notes available.";

/// Presentation-ready view of one call record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedCallSummary {
    pub call_id: Option<String>,
    pub caller_name: String,
    pub caller_number: String,
    /// `"<m>m <s>s"` or `"-"`.
    pub duration: String,
    pub recording_url: Option<String>,
    pub transcript: Option<String>,
    pub notes: String,
    pub success_evaluation: Option<String>,
    pub structured_fields: Vec<StructuredField>,
    pub structured_blocks: Vec<StructuredBlock>,
}

/// One `analysis.structuredData` entry ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredField {
    pub label: String,
    pub value: String,
}

/// One `analysis.structuredDataMulti` block, numbered from 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredBlock {
    pub number: usize,
    pub body: String,
}

pub fn resolve(record: &CallRecord) -> ResolvedCallSummary {
    let transcript = record.artifact.as_ref().and_then(|a| a.transcript.clone());
    let summary = record.analysis.as_ref().and_then(|a| a.summary.as_deref());

    ResolvedCallSummary {
        call_id: record.id.clone(),
        caller_name: caller_name(record),
        caller_number: caller_number(record),
        duration: duration_display(record.started_at.as_deref(), record.ended_at.as_deref()),
        recording_url: recording_url(record),
        notes: first_non_empty([summary, transcript.as_deref()])
            .unwrap_or(NO_NOTES)
            .to_string(),
        transcript,
        success_evaluation: record
            .analysis
            .as_ref()
            .and_then(|a| a.success_evaluation.clone()),
        structured_fields: structured_fields(record),
        structured_blocks: structured_blocks(record),
    }
}

pub fn caller_name(record: &CallRecord) -> String {
    let structured = record.structured_value("name").and_then(scalar_text);
    first_non_empty([
        record.customer.as_ref().and_then(|c| c.name.as_deref()),
        structured.as_deref(),
        record.phone_number.as_ref().and_then(|p| p.name.as_deref()),
    ])
    .unwrap_or(UNKNOWN_CALLER)
    .to_string()
}

pub fn caller_number(record: &CallRecord) -> String {
    let structured = record.structured_value("phone_number").and_then(scalar_text);
    first_non_empty([
        record.customer.as_ref().and_then(|c| c.number.as_deref()),
        structured.as_deref(),
        record.destination.as_ref().and_then(|d| d.number.as_deref()),
        record.phone_number.as_ref().and_then(|p| p.number.as_deref()),
    ])
    .unwrap_or(WEB_CALL)
    .to_string()
}

/// Mono recording first, stereo as fallback.
pub fn recording_url(record: &CallRecord) -> Option<String> {
    let artifact = record.artifact.as_ref()?;
    let nested = artifact.recording.as_ref();
    first_non_empty([
        artifact.recording_url.as_deref(),
        nested
            .and_then(|r| r.mono.as_ref())
            .and_then(|m| m.combined_url.as_deref()),
        artifact.stereo_recording_url.as_deref(),
        nested.and_then(|r| r.stereo_url.as_deref()),
    ])
    .map(str::to_string)
}

/// Static call length from the lifecycle timestamps.
///
/// Negative spans (clock skew) clamp to zero.  The seconds component is
/// rounded and not carried into minutes, so 119.6s renders as `"1m 60s"`.
pub fn duration_display(started_at: Option<&str>, ended_at: Option<&str>) -> String {
    let (Some(start), Some(end)) = (
        started_at.and_then(parse_instant),
        ended_at.and_then(parse_instant),
    ) else {
        return NO_DURATION.to_string();
    };
    let millis = (end - start).num_milliseconds().max(0);
    format_duration(millis as f64 / 1000.0)
}

pub fn format_duration(delta_secs: f64) -> String {
    let delta = delta_secs.max(0.0);
    let minutes = (delta / 60.0).floor() as u64;
    let seconds = (delta % 60.0).round() as u64;
    format!("{}m {}s", minutes, seconds)
}

/// Parse the timestamp shapes upstream is known to send.  Offset-less values
/// are read as UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn structured_fields(record: &CallRecord) -> Vec<StructuredField> {
    let Some(data) = record
        .analysis
        .as_ref()
        .and_then(|a| a.structured_data.as_ref())
    else {
        return Vec::new();
    };
    data.iter()
        .map(|(key, value)| StructuredField {
            label: key.replace('_', " "),
            value: display_value(value),
        })
        .collect()
}

pub fn structured_blocks(record: &CallRecord) -> Vec<StructuredBlock> {
    let Some(blocks) = record
        .analysis
        .as_ref()
        .and_then(|a| a.structured_data_multi.as_ref())
    else {
        return Vec::new();
    };
    blocks
        .iter()
        .enumerate()
        .map(|(i, block)| StructuredBlock {
            number: i + 1,
            body: pretty_json(block),
        })
        .collect()
}

/// Composite values as indented JSON, scalars in their plain form.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Object(_) | Value::Array(_) => pretty_json(value),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> Option<&'a str> {
    candidates.into_iter().flatten().find(|s| !s.is_empty())
}
