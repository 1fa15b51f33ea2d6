//! Call record model.
//!
//! Upstream call records are the union of whatever the call pipeline chose to
//! populate.  Every field is optional, every level keeps the fields it does
//! not know about in `extra`, and a field whose JSON type does not match the
//! model reads as absent instead of rejecting the whole record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use tracing::warn;

/// One phone or web call as delivered by the upstream pipeline.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRecord {
    #[serde(default, deserialize_with = "lenient_text")]
    pub id: Option<String>,
    /// `inboundPhoneCall`, `outboundPhoneCall`, `webCall`, ...
    #[serde(rename = "type", default, deserialize_with = "lenient")]
    pub call_type: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ended_reason: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub started_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub ended_at: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub analysis: Option<Analysis>,
    #[serde(default, deserialize_with = "lenient")]
    pub artifact: Option<Artifact>,
    #[serde(default, deserialize_with = "lenient")]
    pub customer: Option<Party>,
    #[serde(default, deserialize_with = "lenient")]
    pub destination: Option<Party>,
    #[serde(default, deserialize_with = "lenient")]
    pub phone_number: Option<Party>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// AI analysis attached to a finished call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    #[serde(default, deserialize_with = "lenient")]
    pub structured_data: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "lenient")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub success_evaluation: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub structured_data_multi: Option<Vec<Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Media artifacts produced by the call.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default, deserialize_with = "lenient")]
    pub transcript: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub recording_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub stereo_recording_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub recording: Option<Recording>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Nested recording layout used by newer pipeline versions.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recording {
    #[serde(default, deserialize_with = "lenient")]
    pub mono: Option<MonoRecording>,
    #[serde(default, deserialize_with = "lenient")]
    pub stereo_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonoRecording {
    #[serde(default, deserialize_with = "lenient")]
    pub combined_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub assistant_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub customer_url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A customer, destination, or service phone number.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Party {
    #[serde(default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub number: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallRecord {
    /// Build a record from any JSON value.  Never fails: a value that is not
    /// an object yields an empty record.
    pub fn from_value(value: Value) -> Self {
        if !value.is_object() {
            warn!("call record is not a JSON object, treating as empty");
            return Self::default();
        }
        match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                warn!("call record could not be read, treating as empty: {}", e);
                Self::default()
            }
        }
    }

    pub fn from_json_str(s: &str) -> anyhow::Result<Self> {
        let value: Value = serde_json::from_str(s)?;
        Ok(Self::from_value(value))
    }

    /// Read a call-history payload: a bare array of records, an envelope
    /// object carrying the array under `calls`, `data`, or `results`, or a
    /// single record.
    pub fn many_from_value(value: Value) -> Vec<Self> {
        match value {
            Value::Array(items) => items.into_iter().map(Self::from_value).collect(),
            Value::Object(mut obj) => {
                for key in ["calls", "data", "results"] {
                    if matches!(obj.get(key), Some(Value::Array(_))) {
                        if let Some(Value::Array(items)) = obj.remove(key) {
                            return items.into_iter().map(Self::from_value).collect();
                        }
                    }
                }
                vec![Self::from_value(Value::Object(obj))]
            }
            other => vec![Self::from_value(other)],
        }
    }

    /// Look up a key in `analysis.structuredData`.
    pub fn structured_value(&self, key: &str) -> Option<&Value> {
        self.analysis
            .as_ref()?
            .structured_data
            .as_ref()?
            .get(key)
    }
}

/// Deserialize into `Some(T)` when the JSON matches `T`, `None` otherwise.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Like `lenient`, but also accepts numbers and booleans as text.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_land_in_extra() {
        let record = CallRecord::from_value(json!({
            "id": "c1",
            "orgId": "org-9",
            "customer": { "name": "Ana", "email": "ana@example.com" }
        }));
        assert_eq!(record.id.as_deref(), Some("c1"));
        assert_eq!(record.extra.get("orgId"), Some(&json!("org-9")));
        let customer = record.customer.unwrap();
        assert_eq!(customer.name.as_deref(), Some("Ana"));
        assert_eq!(customer.extra.get("email"), Some(&json!("ana@example.com")));
    }

    #[test]
    fn test_mistyped_fields_read_as_absent() {
        let record = CallRecord::from_value(json!({
            "startedAt": 1700000000,
            "artifact": { "transcript": ["not", "text"], "recordingUrl": "https://x/a.wav" },
            "analysis": "broken",
            "customer": { "name": null, "number": 15551234567u64 }
        }));
        assert_eq!(record.started_at, None);
        assert_eq!(record.analysis, None);
        let artifact = record.artifact.unwrap();
        assert_eq!(artifact.transcript, None);
        assert_eq!(artifact.recording_url.as_deref(), Some("https://x/a.wav"));
        let customer = record.customer.unwrap();
        assert_eq!(customer.name, None);
        assert_eq!(customer.number.as_deref(), Some("15551234567"));
    }

    #[test]
    fn test_non_object_is_empty_record() {
        assert_eq!(CallRecord::from_value(json!("nope")), CallRecord::default());
        assert_eq!(CallRecord::from_value(Value::Null), CallRecord::default());
    }

    #[test]
    fn test_many_from_envelope_and_array() {
        let calls = CallRecord::many_from_value(json!({ "calls": [{ "id": "a" }, { "id": "b" }] }));
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].id.as_deref(), Some("b"));

        let calls = CallRecord::many_from_value(json!([{ "id": "x" }]));
        assert_eq!(calls.len(), 1);

        let calls = CallRecord::many_from_value(json!({ "id": "solo" }));
        assert_eq!(calls[0].id.as_deref(), Some("solo"));
    }

    #[test]
    fn test_structured_value_lookup() {
        let record = CallRecord::from_value(json!({
            "analysis": { "structuredData": { "name": "Bo" } }
        }));
        assert_eq!(record.structured_value("name"), Some(&json!("Bo")));
        assert_eq!(record.structured_value("missing"), None);
        assert_eq!(CallRecord::default().structured_value("name"), None);
    }
}
