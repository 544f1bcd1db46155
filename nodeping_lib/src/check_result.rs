//! Check results: one record per execution of a check.

use crate::check::CheckType;
use crate::error::{MalformedResponseError, Result};
use crate::helpers::{parent_check_id, serialize_whole_as_int, timestamp_ms_to_datetime};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Result object as the API sends it (abbreviated keys).
#[derive(Deserialize)]
struct WireResult {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "t")]
    check_type: CheckType,
    #[serde(rename = "tg")]
    target: Option<String>,
    #[serde(rename = "th")]
    threshold: u64,
    #[serde(rename = "i")]
    interval: f64,
    #[serde(rename = "ci")]
    customer_id: String,
    #[serde(rename = "ra")]
    scheduled: i64,
    #[serde(rename = "q")]
    queue: Option<String>,
    #[serde(rename = "s")]
    started: i64,
    #[serde(rename = "sc")]
    status: String,
    #[serde(rename = "rt")]
    runtime: u64,
    #[serde(rename = "e")]
    completed: i64,
    #[serde(rename = "l")]
    locations: Option<Value>,
    #[serde(rename = "m")]
    message: Option<String>,
    #[serde(rename = "su")]
    success: bool,
}

/// One execution of a check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckResult {
    /// Composite `<check-id>-<suffix>` identifier.
    pub id: String,
    #[serde(rename = "type")]
    pub check_type: CheckType,
    /// URL or hostname the check ran against.
    pub target: Option<String>,
    /// Timeout threshold, in seconds.
    pub threshold: u64,
    /// Interval between runs, in seconds. Fractional values occur for
    /// sub-minute schedules; whole values serialize as integers.
    #[serde(serialize_with = "serialize_whole_as_int")]
    pub interval: f64,
    pub customer_id: String,
    /// Unix timestamp (ms) the run was scheduled for.
    pub scheduled_ts: i64,
    /// Unix timestamp (ms) the run actually started.
    pub ts: i64,
    /// Short result text; the status code for HTTP checks.
    pub status: String,
    /// Run duration in milliseconds.
    pub runtime: u64,
    /// Unix timestamp (ms) the run completed.
    pub completed_ts: i64,
    /// Per-location sub-results, passed through as sent. Empty array when absent.
    pub locations: Value,
    pub message: Option<String>,
    pub queue: Option<String>,
    pub success: bool,
    /// Parent check, i.e. `id` without its last `-` segment.
    pub check_id: Option<String>,
}

impl CheckResult {
    /// Map one raw result object.
    ///
    /// Fails when `_id`, `t`, `ci`, `th`, `i`, `ra`, `s`, `e`, `sc`, `rt` or `su`
    /// is missing or mistyped.
    pub fn from_value(value: &Value) -> Result<Self> {
        let wire = WireResult::deserialize(value).map_err(|e| {
            MalformedResponseError::new(format!("invalid result: {}", e), Some(value.clone()))
        })?;
        Ok(wire.into())
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        timestamp_ms_to_datetime(self.scheduled_ts)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        timestamp_ms_to_datetime(self.ts)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        timestamp_ms_to_datetime(self.completed_ts)
    }
}

impl From<WireResult> for CheckResult {
    fn from(w: WireResult) -> Self {
        let check_id = parent_check_id(&w.id);
        Self {
            id: w.id,
            check_type: w.check_type,
            target: w.target,
            threshold: w.threshold,
            interval: w.interval,
            customer_id: w.customer_id,
            scheduled_ts: w.scheduled,
            ts: w.started,
            status: w.status,
            runtime: w.runtime,
            completed_ts: w.completed,
            locations: w.locations.unwrap_or_else(|| Value::Array(Vec::new())),
            message: w.message,
            queue: w.queue,
            success: w.success,
            check_id,
        }
    }
}
