use serde::{Deserialize, Serialize};

/// One routable intent pattern.
///
/// Patterns are an ordered list: declaration order breaks score ties, earlier
/// wins. Keywords carry the bulk of the match weight, context markers the
/// rest (weights live in [`crate::config::IntentConfig`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentPattern {
    /// Operating mode this pattern routes to (e.g. "build", "research").
    pub mode: String,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub markers: Vec<String>,
    /// Pattern-level confidence multiplier applied to the raw match score.
    #[serde(default = "default_pattern_confidence")]
    pub confidence: f64,
}

fn default_pattern_confidence() -> f64 {
    0.85
}

/// Built-in pattern tables so the crate routes sensibly out of the box.
/// Entirely replaceable through configuration.
pub fn default_patterns() -> Vec<IntentPattern> {
    vec![
        IntentPattern {
            mode: "build".into(),
            keywords: [
                "build", "create", "implement", "write", "add", "fix", "refactor", "debug",
                "code", "function", "compile", "test", "deploy", "install", "script",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            markers: ["file", "repo", "branch", "module", "struct", "api", "crate"]
                .into_iter()
                .map(String::from)
                .collect(),
            confidence: 0.85,
        },
        IntentPattern {
            mode: "research".into(),
            keywords: [
                "search", "find", "research", "latest", "news", "summarize", "explain",
                "compare", "what", "who", "when", "why", "how", "history", "overview",
                "definition", "meaning",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            markers: ["source", "article", "paper", "website", "docs", "reference"]
                .into_iter()
                .map(String::from)
                .collect(),
            confidence: 0.85,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_patterns_keep_declaration_order() {
        let patterns = default_patterns();
        assert_eq!(patterns[0].mode, "build");
        assert_eq!(patterns[1].mode, "research");
    }

    #[test]
    fn pattern_deserializes_with_defaults() {
        let pattern: IntentPattern = toml::from_str(
            r#"
            mode = "review"
            keywords = ["review", "critique"]
            "#,
        )
        .unwrap();
        assert_eq!(pattern.mode, "review");
        assert!(pattern.markers.is_empty());
        assert!((pattern.confidence - 0.85).abs() < f64::EPSILON);
    }
}
