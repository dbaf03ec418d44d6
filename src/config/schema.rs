use crate::error::ConfigError;
use crate::intent::patterns::{IntentPattern, default_patterns};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the conversation core.
///
/// Every tunable the engines consume lives here; nothing algorithmic is
/// compiled in. Missing sections fall back to defaults, so an empty TOML
/// file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub intent: IntentConfig,
    pub session: SessionConfig,
    pub preference: PreferenceConfig,
    pub feedback: FeedbackConfig,
    pub reliability: ReliabilityConfig,
    pub storage: StorageConfig,
}

impl Config {
    /// Load and validate a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.intent.validate()?;
        self.session.validate()?;
        self.preference.validate()?;
        self.feedback.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

// ─── Intent classification ──────────────────────────────────────────────────

/// Scoring weights, acceptance threshold, and the ordered pattern list.
///
/// Swapped live through the classifier's `ArcSwap` handle, so keyword tables
/// and thresholds are tunable without a restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentConfig {
    pub keyword_weight: f64,
    pub marker_weight: f64,
    /// Scores at or below this fall through to the default mode.
    pub acceptance_threshold: f64,
    pub default_mode: String,
    pub patterns: Vec<IntentPattern>,
}

impl Default for IntentConfig {
    fn default() -> Self {
        Self {
            keyword_weight: 0.6,
            marker_weight: 0.4,
            acceptance_threshold: 0.05,
            default_mode: "general".into(),
            patterns: default_patterns(),
        }
    }
}

impl IntentConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("intent.keyword_weight", self.keyword_weight),
            ("intent.marker_weight", self.marker_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        if self.keyword_weight + self.marker_weight <= 0.0 {
            return Err(ConfigError::Validation(
                "intent weights must not both be zero".into(),
            ));
        }
        if !(0.0..1.0).contains(&self.acceptance_threshold) {
            return Err(ConfigError::Validation(format!(
                "intent.acceptance_threshold must be within [0, 1), got {}",
                self.acceptance_threshold
            )));
        }
        if self.default_mode.trim().is_empty() {
            return Err(ConfigError::Validation(
                "intent.default_mode must not be empty".into(),
            ));
        }
        for pattern in &self.patterns {
            if !(0.0..=1.0).contains(&pattern.confidence) {
                return Err(ConfigError::Validation(format!(
                    "pattern {} confidence must be within [0, 1], got {}",
                    pattern.mode, pattern.confidence
                )));
            }
        }
        Ok(())
    }
}

// ─── Session memory ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum retained messages per session; overflow is folded into the
    /// rolling summary.
    pub window_budget: usize,
    /// Extra messages evicted beyond the overflow, so eviction does not
    /// re-trigger on every append once the budget is reached.
    pub evict_batch: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            window_budget: 40,
            evict_batch: 2,
        }
    }
}

impl SessionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_budget == 0 {
            return Err(ConfigError::Validation(
                "session.window_budget must be at least 1".into(),
            ));
        }
        if self.evict_batch == 0 {
            return Err(ConfigError::Validation(
                "session.evict_batch must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

// ─── Preference learning ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceConfig {
    /// Confidence decay applied to an established value when a contradictory
    /// detection arrives.
    pub conflict_decay: f64,
    /// A contradictory detection must beat the decayed confidence by this
    /// margin before the active value switches.
    pub switch_margin: f64,
    /// Preferences below this confidence are treated as unset.
    pub min_report_confidence: f64,
    /// Confidence of the synthetic detection generated by positive feedback.
    pub reinforce_confidence: f64,
    /// Confidence of the replacement value carried by an explicit correction.
    pub correction_confidence: f64,
}

impl Default for PreferenceConfig {
    fn default() -> Self {
        Self {
            conflict_decay: 0.8,
            switch_margin: 0.1,
            min_report_confidence: 0.4,
            reinforce_confidence: 0.3,
            correction_confidence: 0.6,
        }
    }
}

impl PreferenceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("preference.conflict_decay", self.conflict_decay),
            ("preference.switch_margin", self.switch_margin),
            ("preference.min_report_confidence", self.min_report_confidence),
            ("preference.reinforce_confidence", self.reinforce_confidence),
            ("preference.correction_confidence", self.correction_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Validation(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

// ─── Feedback tracking ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedbackConfig {
    /// Exponential moving average factor for the satisfaction score.
    pub ema_alpha: f64,
    /// Scale of the partial negative signal contributed by edits and
    /// corrections (multiplied by edit magnitude).
    pub edit_signal_weight: f64,
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            ema_alpha: 0.3,
            edit_signal_weight: 0.5,
        }
    }
}

impl FeedbackConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.ema_alpha) || self.ema_alpha == 0.0 {
            return Err(ConfigError::Validation(format!(
                "feedback.ema_alpha must be within (0, 1], got {}",
                self.ema_alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.edit_signal_weight) {
            return Err(ConfigError::Validation(format!(
                "feedback.edit_signal_weight must be within [0, 1], got {}",
                self.edit_signal_weight
            )));
        }
        Ok(())
    }
}

// ─── Provider reliability ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliabilityConfig {
    /// Retries per provider for transient failures.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
    /// Per-attempt timeout on the generation capability.
    pub request_timeout_ms: u64,
}

impl Default for ReliabilityConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff_ms: 200,
            request_timeout_ms: 30_000,
        }
    }
}

// ─── Durable storage ────────────────────────────────────────────────────────

/// Optional SQLite persistence. Disabled means in-memory only with no
/// cross-restart continuity, which is a supported configuration, not an
/// error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub durable: bool,
    pub path: Option<PathBuf>,
}

impl StorageConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.durable && self.path.is_none() {
            return Err(ConfigError::Validation(
                "storage.durable requires storage.path".into(),
            ));
        }
        Ok(())
    }
}
