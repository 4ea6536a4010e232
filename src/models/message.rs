// src/models/message.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One chat message row as returned by the backend.
///
/// `id` and `session_id` are kept as strings whatever the column type is
/// (integer, uuid or text), so ranking and grouping never depend on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(deserialize_with = "deserialize_key")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_key")]
    pub session_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub correo_enviado: Option<bool>,
    /// Any other column of the table, addressable by column descriptors.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Look up a column by name, descending into JSON objects for dotted
    /// paths such as `message.content`.
    pub fn field(&self, path: &str) -> Value {
        let mut segments = path.split('.');
        let head = match segments.next() {
            Some(head) => head,
            None => return Value::Null,
        };

        let mut current = match head {
            "id" => Value::String(self.id.clone()),
            "session_id" => Value::String(self.session_id.clone()),
            "created_at" => Value::String(
                self.created_at
                    .to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            ),
            "message" => self.message.clone().unwrap_or(Value::Null),
            "correo_enviado" => self.correo_enviado.map(Value::Bool).unwrap_or(Value::Null),
            other => self.extra.get(other).cloned().unwrap_or(Value::Null),
        };

        for segment in segments {
            current = match current {
                Value::Object(mut map) => map.remove(segment).unwrap_or(Value::Null),
                // Payloads are sometimes stored as JSON text.
                Value::String(text) => match serde_json::from_str::<Value>(&text) {
                    Ok(Value::Object(mut map)) => map.remove(segment).unwrap_or(Value::Null),
                    _ => Value::Null,
                },
                _ => Value::Null,
            };
        }

        current
    }
}

/// The lightweight `(session_id, created_at)` projection used for ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    #[serde(deserialize_with = "deserialize_key")]
    pub session_id: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
}

fn deserialize_key<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number key, got {}",
            other
        ))),
    }
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("invalid timestamp: {}", raw))
    })
}

/// Accepts both `timestamptz` output and zone-less `timestamp` output,
/// reading the latter as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Postgres renders offsets as "+00" which RFC 3339 rejects.
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
