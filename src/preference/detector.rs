use super::types::{Detection, PreferenceCategory};

/// A phrase trigger mapping matched text to a category value.
#[derive(Debug, Clone)]
pub struct PreferenceTrigger {
    pub category: PreferenceCategory,
    pub phrase: &'static str,
    pub value: &'static str,
    pub confidence: f64,
}

const fn trigger(
    category: PreferenceCategory,
    phrase: &'static str,
    value: &'static str,
    confidence: f64,
) -> PreferenceTrigger {
    PreferenceTrigger {
        category,
        phrase,
        value,
        confidence,
    }
}

/// Built-in trigger tables. Stated preferences ("be concise") score higher
/// than implied ones ("short answer please").
pub fn default_triggers() -> Vec<PreferenceTrigger> {
    use PreferenceCategory::{CodeStyle, LanguageFramework, Tone, ToolPreference, Verbosity};
    vec![
        // Verbosity
        trigger(Verbosity, "be concise", "concise", 0.6),
        trigger(Verbosity, "keep it short", "concise", 0.6),
        trigger(Verbosity, "keep it brief", "concise", 0.6),
        trigger(Verbosity, "short answer", "concise", 0.5),
        trigger(Verbosity, "tl;dr", "concise", 0.5),
        trigger(Verbosity, "in detail", "detailed", 0.5),
        trigger(Verbosity, "more detail", "detailed", 0.6),
        trigger(Verbosity, "explain thoroughly", "detailed", 0.6),
        trigger(Verbosity, "step by step", "detailed", 0.5),
        // Tone
        trigger(Tone, "be formal", "formal", 0.6),
        trigger(Tone, "professional tone", "formal", 0.6),
        trigger(Tone, "be casual", "casual", 0.6),
        trigger(Tone, "keep it friendly", "casual", 0.5),
        trigger(Tone, "no fluff", "direct", 0.5),
        // Code style
        trigger(CodeStyle, "use tabs", "tabs", 0.6),
        trigger(CodeStyle, "use spaces", "spaces", 0.6),
        trigger(CodeStyle, "functional style", "functional", 0.6),
        trigger(CodeStyle, "object oriented", "object_oriented", 0.5),
        trigger(CodeStyle, "with comments", "commented", 0.5),
        trigger(CodeStyle, "without comments", "uncommented", 0.5),
        // Tool preference
        trigger(ToolPreference, "use docker", "docker", 0.6),
        trigger(ToolPreference, "use make", "make", 0.5),
        trigger(ToolPreference, "use cargo", "cargo", 0.6),
        trigger(ToolPreference, "use npm", "npm", 0.5),
        trigger(ToolPreference, "use git", "git", 0.5),
        // Language / framework
        trigger(LanguageFramework, "in rust", "rust", 0.6),
        trigger(LanguageFramework, "in python", "python", 0.6),
        trigger(LanguageFramework, "in typescript", "typescript", 0.6),
        trigger(LanguageFramework, "in javascript", "javascript", 0.5),
        trigger(LanguageFramework, "use react", "react", 0.6),
        trigger(LanguageFramework, "use tokio", "tokio", 0.5),
        trigger(LanguageFramework, "use axum", "axum", 0.5),
    ]
}

/// Heuristic phrase matcher extracting preference signals from raw text.
///
/// Independent of the intent patterns: a message can route to "build" while
/// still carrying a verbosity signal.
pub struct PreferenceDetector {
    triggers: Vec<PreferenceTrigger>,
}

impl PreferenceDetector {
    pub fn new() -> Self {
        Self {
            triggers: default_triggers(),
        }
    }

    pub fn with_triggers(triggers: Vec<PreferenceTrigger>) -> Self {
        Self { triggers }
    }

    /// Scan the text for trigger phrases. Duplicate (category, value) hits
    /// collapse to the strongest one so overlapping phrases don't
    /// double-merge.
    pub fn detect(&self, text: &str) -> Vec<Detection> {
        let normalized = text.to_lowercase();
        let mut detections: Vec<Detection> = Vec::new();

        for trig in &self.triggers {
            if !normalized.contains(trig.phrase) {
                continue;
            }
            match detections
                .iter_mut()
                .find(|d| d.category == trig.category && d.value == trig.value)
            {
                Some(existing) => existing.confidence = existing.confidence.max(trig.confidence),
                None => detections.push(Detection {
                    category: trig.category,
                    value: trig.value.to_string(),
                    confidence: trig.confidence,
                }),
            }
        }

        detections
    }
}

impl Default for PreferenceDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_stated_verbosity_preference() {
        let detector = PreferenceDetector::new();
        let detections = detector.detect("Please be concise from now on.");
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].category, PreferenceCategory::Verbosity);
        assert_eq!(detections[0].value, "concise");
    }

    #[test]
    fn detects_multiple_categories_in_one_message() {
        let detector = PreferenceDetector::new();
        let detections =
            detector.detect("Be formal and write it in rust, and use docker for the build");
        let categories: Vec<_> = detections.iter().map(|d| d.category).collect();
        assert!(categories.contains(&PreferenceCategory::Tone));
        assert!(categories.contains(&PreferenceCategory::LanguageFramework));
        assert!(categories.contains(&PreferenceCategory::ToolPreference));
    }

    #[test]
    fn overlapping_phrases_collapse_to_strongest() {
        let detector = PreferenceDetector::new();
        // "more detail" and "in detail" both hit the detailed value.
        let detections = detector.detect("give me more detail, really go in detail");
        let verbosity: Vec<_> = detections
            .iter()
            .filter(|d| d.category == PreferenceCategory::Verbosity)
            .collect();
        assert_eq!(verbosity.len(), 1);
        assert!((verbosity[0].confidence - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn plain_text_yields_no_detections() {
        let detector = PreferenceDetector::new();
        assert!(detector.detect("what is the capital of france").is_empty());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let detector = PreferenceDetector::new();
        let detections = detector.detect("PLEASE BE CONCISE");
        assert_eq!(detections.len(), 1);
    }
}
