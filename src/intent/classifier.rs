use crate::config::IntentConfig;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of routing one input text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub mode: String,
    pub score: f64,
    pub matched_terms: Vec<String>,
}

/// Stateless weighted-pattern scorer mapping free text to an operating mode.
///
/// Deterministic for a fixed configuration and safe to call from any number
/// of tasks concurrently; the configuration snapshot is read lock-free and
/// can be swapped live via [`IntentClassifier::update`].
pub struct IntentClassifier {
    config: Arc<ArcSwap<IntentConfig>>,
}

impl IntentClassifier {
    pub fn new(config: IntentConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Atomically swap in a new pattern/threshold configuration.
    pub fn update(&self, config: IntentConfig) {
        self.config.store(Arc::new(config));
        tracing::info!("intent configuration swapped");
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<IntentConfig> {
        self.config.load_full()
    }

    /// Score the input against every pattern and pick the best mode.
    ///
    /// Per pattern: `raw = matched_keywords/keywords * keyword_weight +
    /// matched_markers/markers * marker_weight`, then scaled by the pattern's
    /// confidence multiplier. Ties go to the earlier pattern. Scores at or
    /// below the acceptance threshold fall through to the default mode.
    pub fn classify(&self, text: &str) -> Classification {
        let config = self.config.load();
        let normalized = text.to_lowercase();

        if normalized.trim().is_empty() {
            return Classification {
                mode: config.default_mode.clone(),
                score: 0.0,
                matched_terms: Vec::new(),
            };
        }

        let mut best: Option<(f64, &str, Vec<String>)> = None;
        for pattern in &config.patterns {
            let (keyword_hits, mut matched) = matches_in(&normalized, &pattern.keywords);
            let (marker_hits, marker_terms) = matches_in(&normalized, &pattern.markers);
            matched.extend(marker_terms);

            let keyword_score = ratio(keyword_hits, pattern.keywords.len());
            let marker_score = ratio(marker_hits, pattern.markers.len());
            let raw =
                keyword_score * config.keyword_weight + marker_score * config.marker_weight;
            let score = raw * pattern.confidence;

            // Strictly greater: earlier patterns win ties.
            if best.as_ref().is_none_or(|(top, _, _)| score > *top) {
                best = Some((score, pattern.mode.as_str(), matched));
            }
        }

        let Some((score, mode, matched_terms)) = best else {
            return Classification {
                mode: config.default_mode.clone(),
                score: 0.0,
                matched_terms: Vec::new(),
            };
        };

        if score <= config.acceptance_threshold {
            return Classification {
                mode: config.default_mode.clone(),
                score,
                matched_terms,
            };
        }

        Classification {
            mode: mode.to_string(),
            score,
            matched_terms,
        }
    }
}

fn matches_in(normalized: &str, terms: &[String]) -> (usize, Vec<String>) {
    let mut matched = Vec::new();
    for term in terms {
        if normalized.contains(term.to_lowercase().as_str()) {
            matched.push(term.clone());
        }
    }
    (matched.len(), matched)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(hits: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::patterns::IntentPattern;

    fn pattern(mode: &str, keywords: &[&str], markers: &[&str], confidence: f64) -> IntentPattern {
        IntentPattern {
            mode: mode.into(),
            keywords: keywords.iter().map(|s| (*s).to_string()).collect(),
            markers: markers.iter().map(|s| (*s).to_string()).collect(),
            confidence,
        }
    }

    fn config_with(patterns: Vec<IntentPattern>, threshold: f64) -> IntentConfig {
        IntentConfig {
            acceptance_threshold: threshold,
            patterns,
            ..IntentConfig::default()
        }
    }

    #[test]
    fn empty_text_yields_default_mode_at_zero() {
        let classifier = IntentClassifier::new(IntentConfig::default());
        let result = classifier.classify("   ");
        assert_eq!(result.mode, "general");
        assert!(result.score.abs() < f64::EPSILON);
        assert!(result.matched_terms.is_empty());
    }

    #[test]
    fn classify_is_deterministic() {
        let classifier = IntentClassifier::new(IntentConfig::default());
        let first = classifier.classify("please fix the bug in this function");
        let second = classifier.classify("please fix the bug in this function");
        assert_eq!(first.mode, second.mode);
        assert!((first.score - second.score).abs() < f64::EPSILON);
    }

    #[test]
    fn seventeen_keyword_scenario_scores_six_hundredths() {
        // 2 of 17 keywords match, no markers: (2/17) * 0.6 * 0.85 = 0.06,
        // which clears a 0.05 acceptance threshold.
        let mut keywords = vec!["latest", "news"];
        keywords.extend([
            "q1", "q2", "q3", "q4", "q5", "q6", "q7", "q8", "q9", "q10", "q11", "q12", "q13",
            "q14", "q15",
        ]);
        let classifier = IntentClassifier::new(config_with(
            vec![pattern("research", &keywords, &["source"], 0.85)],
            0.05,
        ));

        let result = classifier.classify("show me the latest news please");
        assert_eq!(result.mode, "research");
        assert!((result.score - 0.06).abs() < 1e-9);
        assert_eq!(result.matched_terms, vec!["latest", "news"]);
    }

    #[test]
    fn score_at_threshold_falls_back_to_default() {
        let classifier = IntentClassifier::new(config_with(
            vec![pattern("build", &["deploy"], &[], 1.0)],
            0.6, // keyword_score 1.0 * 0.6 == threshold, not above it
        ));
        let result = classifier.classify("deploy");
        assert_eq!(result.mode, "general");
        assert!((result.score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn ties_resolve_to_earlier_pattern() {
        let classifier = IntentClassifier::new(config_with(
            vec![
                pattern("first", &["alpha"], &[], 0.9),
                pattern("second", &["alpha"], &[], 0.9),
            ],
            0.05,
        ));
        let result = classifier.classify("alpha");
        assert_eq!(result.mode, "first");
    }

    #[test]
    fn empty_marker_list_contributes_nothing() {
        let classifier = IntentClassifier::new(config_with(
            vec![pattern("build", &["compile"], &[], 1.0)],
            0.05,
        ));
        let result = classifier.classify("compile it");
        // keyword_score 1.0 * 0.6 + 0 marker contribution
        assert!((result.score - 0.6).abs() < 1e-9);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let classifier = IntentClassifier::new(config_with(
            vec![pattern("build", &["Deploy"], &[], 1.0)],
            0.05,
        ));
        let result = classifier.classify("DEPLOY the service");
        assert_eq!(result.mode, "build");
    }

    #[test]
    fn live_update_changes_routing_without_restart() {
        let classifier = IntentClassifier::new(config_with(
            vec![pattern("build", &["ship"], &[], 1.0)],
            0.05,
        ));
        assert_eq!(classifier.classify("ship it").mode, "build");

        classifier.update(config_with(
            vec![pattern("release", &["ship"], &[], 1.0)],
            0.05,
        ));
        assert_eq!(classifier.classify("ship it").mode, "release");
    }
}
