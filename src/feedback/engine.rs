use super::types::{FeedbackAnalytics, FeedbackEvent, FeedbackKind, TimeRange, Trend};
use crate::config::FeedbackConfig;
use crate::error::{FeedbackError, Result};
use crate::preference::PreferenceCategory;
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

const TREND_EPSILON: f64 = 1e-6;

/// What a feedback event implies for the preference profile. The caller
/// resolves the currently active value and applies the change under the
/// session's lock.
#[derive(Debug, Clone, PartialEq)]
pub struct Reinforcement {
    pub category: PreferenceCategory,
    pub action: ReinforcementAction,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReinforcementAction {
    /// Positive feedback: re-detect the currently active value.
    Reinforce,
    /// Negative feedback: decay the category's confidence.
    Decay,
    /// Correction carrying a replacement value.
    Replace(String),
}

#[derive(Debug, Clone, Default)]
struct SatisfactionState {
    score: f64,
    previous: Option<f64>,
    samples: u32,
}

/// Append-only feedback log plus per-session satisfaction tracking.
///
/// `record` never fails on stale message references; only structurally
/// malformed events (empty session id) are rejected. Kinds outside the
/// enumerated set are unrepresentable: callers taking strings must parse
/// into [`FeedbackKind`] at the boundary, and that parse failure is the
/// invalid-event error.
pub struct FeedbackEngine {
    config: FeedbackConfig,
    log: RwLock<Vec<FeedbackEvent>>,
    satisfaction: RwLock<HashMap<String, SatisfactionState>>,
}

impl FeedbackEngine {
    pub fn new(config: FeedbackConfig) -> Self {
        Self {
            config,
            log: RwLock::new(Vec::new()),
            satisfaction: RwLock::new(HashMap::new()),
        }
    }

    /// Validate, append, update the satisfaction EMA, and derive the
    /// preference reinforcement implied by the payload, if any.
    pub fn record(&self, event: FeedbackEvent) -> Result<Option<Reinforcement>> {
        if event.session_id.trim().is_empty() {
            return Err(FeedbackError::Invalid("missing session id".into()).into());
        }

        let signal = self.signal_for(&event);
        {
            let mut map = self
                .satisfaction
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let state = map.entry(event.session_id.clone()).or_default();
            state.previous = Some(state.score);
            state.score =
                self.config.ema_alpha * signal + (1.0 - self.config.ema_alpha) * state.score;
            state.samples += 1;
        }

        let reinforcement = reinforcement_for(&event);
        tracing::debug!(
            session = event.session_id.as_str(),
            kind = %event.kind,
            signal,
            "feedback recorded"
        );

        self.log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);

        Ok(reinforcement)
    }

    /// Current satisfaction EMA for a session, if any feedback exists.
    pub fn satisfaction(&self, session_id: &str) -> Option<f64> {
        self.satisfaction
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(session_id)
            .filter(|state| state.samples > 0)
            .map(|state| state.score)
    }

    /// Per-kind counts and satisfaction trend over the log. Read-only.
    pub fn analytics(&self, session_id: &str, range: TimeRange) -> FeedbackAnalytics {
        let mut counts: BTreeMap<FeedbackKind, usize> = BTreeMap::new();
        let mut total = 0;
        for event in self
            .log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            if event.session_id != session_id || !range.contains(event.created_at) {
                continue;
            }
            *counts.entry(event.kind).or_default() += 1;
            total += 1;
        }

        let (satisfaction, trend) = {
            let map = self
                .satisfaction
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            match map.get(session_id).filter(|state| state.samples > 0) {
                Some(state) => {
                    let trend = match state.previous {
                        Some(previous) if state.score > previous + TREND_EPSILON => {
                            Trend::Improving
                        }
                        Some(previous) if state.score < previous - TREND_EPSILON => {
                            Trend::Declining
                        }
                        _ => Trend::Flat,
                    };
                    (Some(state.score), trend)
                }
                None => (None, Trend::Flat),
            }
        };

        FeedbackAnalytics {
            session_id: session_id.to_string(),
            counts,
            total,
            satisfaction,
            trend,
        }
    }

    fn signal_for(&self, event: &FeedbackEvent) -> f64 {
        match event.kind {
            FeedbackKind::ExplicitPositive | FeedbackKind::ImplicitAccept => 1.0,
            FeedbackKind::ExplicitNegative | FeedbackKind::ImplicitRetry => -1.0,
            FeedbackKind::ImplicitEdit | FeedbackKind::ExplicitCorrection => {
                let magnitude = event
                    .payload
                    .get("edit_ratio")
                    .and_then(serde_json::Value::as_f64)
                    .map_or(1.0, |ratio| ratio.clamp(0.0, 1.0));
                -(self.config.edit_signal_weight * magnitude)
            }
        }
    }
}

fn reinforcement_for(event: &FeedbackEvent) -> Option<Reinforcement> {
    let category: PreferenceCategory = event
        .payload
        .get("category")
        .and_then(serde_json::Value::as_str)?
        .parse()
        .ok()?;

    let action = match event.kind {
        FeedbackKind::ExplicitPositive | FeedbackKind::ImplicitAccept => {
            ReinforcementAction::Reinforce
        }
        FeedbackKind::ExplicitCorrection => match event
            .payload
            .get("value")
            .and_then(serde_json::Value::as_str)
        {
            Some(value) => ReinforcementAction::Replace(value.to_string()),
            None => ReinforcementAction::Decay,
        },
        FeedbackKind::ExplicitNegative
        | FeedbackKind::ImplicitRetry
        | FeedbackKind::ImplicitEdit => ReinforcementAction::Decay,
    };

    Some(Reinforcement { category, action })
}
