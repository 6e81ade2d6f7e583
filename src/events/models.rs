// Event models — the (account, object, timestamp) triples the pipeline runs on.
//
// `RawEvent` is what callers hand us: loosely typed JSON values, so one
// ingestion path can take string or integer account ids and either ISO-8601
// or epoch-second timestamps. `Event` is the normalized, immutable form every
// downstream stage works with.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MalformedEvent, MalformedReason};

/// A single share of an object by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub account_id: String,
    /// Exact-match key for the thing being shared (text, link, hashtag...).
    pub object_id: String,
    /// The concrete post that carried the object, when the caller knows it.
    pub content_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(
        account_id: impl Into<String>,
        object_id: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            object_id: object_id.into(),
            content_id: None,
            timestamp,
        }
    }

    pub fn with_content(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    /// Identity of the concrete post: the content id when known, otherwise
    /// the account, object and instant of the share.
    pub fn post_key(&self) -> String {
        match &self.content_id {
            Some(content) => content.clone(),
            None => format!(
                "{}/{}@{}",
                self.account_id,
                self.object_id,
                self.timestamp.to_rfc3339()
            ),
        }
    }

    /// Convenience constructor from epoch seconds, used heavily in tests.
    ///
    /// Out-of-range seconds clamp to the Unix epoch.
    pub fn at_secs(account_id: impl Into<String>, object_id: impl Into<String>, secs: i64) -> Self {
        let timestamp = DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH);
        Self::new(account_id, object_id, timestamp)
    }
}

/// An un-normalized input record.
///
/// Field aliases accept the column names used by common tabular
/// exports (`id_user`, `timestamp_share`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    #[serde(default, alias = "id_user", alias = "account")]
    pub account_id: Option<Value>,
    #[serde(default, alias = "object")]
    pub object_id: Option<Value>,
    #[serde(default, alias = "post_id")]
    pub content_id: Option<Value>,
    #[serde(default, alias = "timestamp_share", alias = "created_at")]
    pub timestamp: Option<Value>,
    /// Set when the input record was not a JSON object at all.
    #[serde(skip)]
    unreadable: bool,
}

impl RawEvent {
    pub fn new(account_id: Value, object_id: Value, timestamp: Value) -> Self {
        Self {
            account_id: Some(account_id),
            object_id: Some(object_id),
            content_id: None,
            timestamp: Some(timestamp),
            unreadable: false,
        }
    }

    /// Placeholder for an input record that could not be read, so it is
    /// still counted when dropped.
    pub fn unreadable() -> Self {
        Self {
            unreadable: true,
            ..Self::default()
        }
    }

    pub fn is_unreadable(&self) -> bool {
        self.unreadable
    }

    /// Read one decoded JSON value as a record.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_else(|_| Self::unreadable())
    }
}

/// Parse input text holding either a JSON array of records or JSON Lines.
///
/// Elements or lines that are not records become `RawEvent::unreadable()`
/// in both shapes. Only an array that is not valid JSON as a whole fails.
pub fn parse_records(text: &str) -> Result<Vec<RawEvent>, serde_json::Error> {
    if text.trim_start().starts_with('[') {
        let values: Vec<Value> = serde_json::from_str(text)?;
        return Ok(values.into_iter().map(RawEvent::from_value).collect());
    }

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            serde_json::from_str::<Value>(line)
                .map(RawEvent::from_value)
                .unwrap_or_else(|_| RawEvent::unreadable())
        })
        .collect())
}

impl TryFrom<RawEvent> for Event {
    type Error = MalformedEvent;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        if raw.unreadable {
            return Err(MalformedReason::UnreadableRecord.into());
        }
        let account_id = normalize_id(
            raw.account_id.as_ref(),
            MalformedReason::MissingAccount,
            MalformedReason::InvalidAccount,
        )?;
        let object_id = normalize_id(
            raw.object_id.as_ref(),
            MalformedReason::MissingObject,
            MalformedReason::InvalidObject,
        )?;
        let timestamp = match raw.timestamp.as_ref() {
            None | Some(Value::Null) => return Err(MalformedReason::MissingTimestamp.into()),
            Some(value) => parse_timestamp(value).ok_or(MalformedReason::UnparsableTimestamp)?,
        };
        // A content id is optional evidence; anything odd is simply dropped.
        let content_id = raw.content_id.as_ref().and_then(|v| {
            normalize_id(Some(v), MalformedReason::MissingObject, MalformedReason::InvalidObject)
                .ok()
        });

        Ok(Event {
            account_id,
            object_id,
            content_id,
            timestamp,
        })
    }
}

/// Turn a string or integer identifier into its canonical string form.
fn normalize_id(
    value: Option<&Value>,
    missing: MalformedReason,
    invalid: MalformedReason,
) -> Result<String, MalformedReason> {
    match value {
        None | Some(Value::Null) => Err(missing),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Err(missing)
            } else {
                Ok(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Ok(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Ok(u.to_string())
            } else {
                Err(invalid)
            }
        }
        Some(_) => Err(invalid),
    }
}

/// Parse an ISO-8601 string or an epoch-seconds number into a UTC instant.
///
/// Accepts RFC 3339, `+hhmm` offsets, minute-only times, the basic format
/// (`20231114T221320Z`) and bare dates (midnight). Strings without an offset
/// are read as UTC. Numeric strings are treated as epoch seconds, same as
/// JSON numbers.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(secs) = n.as_i64() {
                DateTime::from_timestamp(secs, 0)
            } else {
                n.as_f64().and_then(from_epoch_f64)
            }
        }
        Value::String(s) => parse_timestamp_str(s.trim()),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0);
    }
    if let Ok(secs) = s.parse::<f64>() {
        return from_epoch_f64(secs);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    const OFFSET_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f%z",
        "%Y-%m-%d %H:%M:%S%.f%z",
        "%Y-%m-%dT%H:%M%z",
        "%Y%m%dT%H%M%S%z",
    ];
    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    // A trailing `Z` is UTC, which is how offset-less strings are read anyway.
    let naive = s.strip_suffix('Z').unwrap_or(s);
    const NAIVE_FORMATS: [&str; 5] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
        "%Y%m%dT%H%M%S",
    ];
    if let Some(dt) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
    {
        return Some(dt.and_utc());
    }

    NaiveDate::parse_from_str(naive, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
}

fn from_epoch_f64(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    let whole = secs.floor();
    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }
    let nanos = ((secs - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}
