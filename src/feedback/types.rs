use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

/// Closed set of feedback signal types.
///
/// Implicit signals are detected by the surrounding system (edit-distance
/// thresholds, repeated same-intent requests); this crate only classifies
/// and records them.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FeedbackKind {
    ImplicitEdit,
    ImplicitRetry,
    ImplicitAccept,
    ExplicitPositive,
    ExplicitNegative,
    ExplicitCorrection,
}

/// One recorded feedback event. Immutable once recorded, only aggregated.
///
/// Payload keys the engine understands: `category` (preference category to
/// reinforce or correct), `value` (replacement value on corrections),
/// `edit_ratio` (edit magnitude in [0, 1] for edits/corrections).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub id: String,
    pub kind: FeedbackKind,
    pub session_id: String,
    /// Back-reference only; a stale id does not invalidate the event.
    pub message_id: Option<u64>,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl FeedbackEvent {
    pub fn new(
        kind: FeedbackKind,
        session_id: impl Into<String>,
        message_id: Option<u64>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            session_id: session_id.into(),
            message_id,
            payload,
            created_at: Utc::now(),
        }
    }
}

/// Direction of the satisfaction score since the previous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Trend {
    Improving,
    Declining,
    Flat,
}

/// Read-only aggregation over the feedback log for one session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackAnalytics {
    pub session_id: String,
    pub counts: BTreeMap<FeedbackKind, usize>,
    pub total: usize,
    /// Exponential moving average in [-1, 1]; `None` before any feedback.
    pub satisfaction: Option<f64>,
    pub trend: Trend,
}

/// Half-open-ended time filter for analytics queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| instant >= start)
            && self.end.is_none_or(|end| instant <= end)
    }
}
