// Error taxonomy for the detection pipeline.
//
// Only configuration errors abort a run. Malformed events are dropped and
// counted in the run diagnostics, and an empty input is reported alongside
// an empty result rather than raised to the caller.

use serde::{Deserialize, Serialize};

/// Errors surfaced by the detection pipeline.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    /// The configuration is meaningless (e.g. `min_repetition < 2`).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Zero usable events reached the filter stage.
    #[error("no usable events after ingestion")]
    EmptyInput,
}

/// Why an incoming record was rejected during ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedReason {
    MissingAccount,
    /// Account id present but neither a string nor an integer.
    InvalidAccount,
    MissingObject,
    /// Object id present but neither a string nor an integer.
    InvalidObject,
    MissingTimestamp,
    UnparsableTimestamp,
    /// The record was not a JSON object.
    UnreadableRecord,
}

impl MalformedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MalformedReason::MissingAccount => "missing_account",
            MalformedReason::InvalidAccount => "invalid_account",
            MalformedReason::MissingObject => "missing_object",
            MalformedReason::InvalidObject => "invalid_object",
            MalformedReason::MissingTimestamp => "missing_timestamp",
            MalformedReason::UnparsableTimestamp => "unparsable_timestamp",
            MalformedReason::UnreadableRecord => "unreadable_record",
        }
    }
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single record that could not be turned into an [`Event`](crate::events::models::Event).
///
/// Recoverable: the ingesting store drops the record and counts the reason.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("malformed event: {reason}")]
pub struct MalformedEvent {
    pub reason: MalformedReason,
}

impl From<MalformedReason> for MalformedEvent {
    fn from(reason: MalformedReason) -> Self {
        Self { reason }
    }
}
