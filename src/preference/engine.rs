use super::types::{Detection, Preference, PreferenceCategory, PreferenceProfile};
use crate::config::PreferenceConfig;
use chrono::Utc;

/// Confidence-merging preference model.
///
/// Pure state-transition logic over a [`PreferenceProfile`]; the caller owns
/// the profile and its locking. Conflicting signals are resolved locally via
/// the decay/margin rule and never surface as errors.
pub struct PreferenceEngine {
    config: PreferenceConfig,
}

impl PreferenceEngine {
    pub fn new(config: PreferenceConfig) -> Self {
        Self { config }
    }

    /// Fold a batch of detections into the profile, in order.
    pub fn apply(&self, profile: &mut PreferenceProfile, detections: &[Detection]) {
        for detection in detections {
            self.apply_one(profile, detection);
        }
    }

    fn apply_one(&self, profile: &mut PreferenceProfile, detection: &Detection) {
        let detected = detection.confidence.clamp(0.0, 1.0);
        let now = Utc::now();

        let Some(existing) = profile.get_mut(detection.category) else {
            profile.insert(
                detection.category,
                Preference {
                    value: detection.value.clone(),
                    confidence: detected,
                    evidence_count: 1,
                    last_updated: now,
                },
            );
            return;
        };

        if existing.value == detection.value {
            // Independent agreeing evidence: asymptotic to 1, never reaches it.
            existing.confidence = merge_confidence(existing.confidence, detected);
            existing.evidence_count += 1;
            existing.last_updated = now;
            return;
        }

        // Contradiction: decay the incumbent, switch only on a clear win.
        let decayed = existing.confidence * self.config.conflict_decay;
        if detected > decayed + self.config.switch_margin {
            tracing::debug!(
                category = %detection.category,
                from = existing.value.as_str(),
                to = detection.value.as_str(),
                "preference value switched"
            );
            *existing = Preference {
                value: detection.value.clone(),
                confidence: detected,
                evidence_count: 1,
                last_updated: now,
            };
        } else {
            existing.confidence = decayed;
            existing.last_updated = now;
        }
    }

    /// Decay one category's confidence without supplying a replacement value
    /// (negative feedback path).
    pub fn decay(&self, profile: &mut PreferenceProfile, category: PreferenceCategory) {
        if let Some(existing) = profile.get_mut(category) {
            existing.confidence *= self.config.conflict_decay;
            existing.last_updated = Utc::now();
        }
    }

    /// The stored value, only if its confidence clears the reporting
    /// threshold; otherwise the preference is treated as unset.
    pub fn get_active<'a>(
        &self,
        profile: &'a PreferenceProfile,
        category: PreferenceCategory,
    ) -> Option<&'a Preference> {
        profile
            .get(category)
            .filter(|pref| pref.confidence >= self.config.min_report_confidence)
    }

    /// Ordered instruction fragments for the generation request, one per
    /// active preference. Read-only.
    pub fn build_directives(&self, profile: &PreferenceProfile) -> Vec<String> {
        profile
            .iter()
            .filter(|(_, pref)| pref.confidence >= self.config.min_report_confidence)
            .map(|(category, pref)| directive_for(category, &pref.value))
            .collect()
    }

    pub fn config(&self) -> &PreferenceConfig {
        &self.config
    }
}

/// `1 - (1-old)(1-new)`: monotonically increasing, bounded by 1.
fn merge_confidence(old: f64, detected: f64) -> f64 {
    (1.0 - (1.0 - old) * (1.0 - detected)).clamp(0.0, 1.0)
}

fn directive_for(category: PreferenceCategory, value: &str) -> String {
    match category {
        PreferenceCategory::CodeStyle => {
            format!("Follow a {value} code style.")
        }
        PreferenceCategory::Verbosity => match value {
            "concise" => "Keep responses concise and to the point.".into(),
            "detailed" => "Provide thorough, detailed responses.".into(),
            other => format!("Use a {other} level of detail."),
        },
        PreferenceCategory::Tone => format!("Adopt a {value} tone."),
        PreferenceCategory::ToolPreference => {
            format!("Prefer {value} when tooling choices arise.")
        }
        PreferenceCategory::LanguageFramework => {
            format!("Default to {value} for code examples.")
        }
    }
}
