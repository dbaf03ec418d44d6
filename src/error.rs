use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `attune`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; internal code continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum AttuneError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Session ─────────────────────────────────────────────────────────
    #[error("session: {0}")]
    Session(#[from] SessionError),

    // ── Generation provider ─────────────────────────────────────────────
    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    // ── Feedback ────────────────────────────────────────────────────────
    #[error("feedback: {0}")]
    Feedback(#[from] FeedbackError),

    // ── Durable store ───────────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Session errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("eviction failed: {0}")]
    Eviction(String),
}

// ─── Generation provider errors ─────────────────────────────────────────────

/// Failure classification for the generation capability.
///
/// Transient variants are retried with bounded backoff by the reliability
/// layer; permanent variants surface immediately and are never retried.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("provider {provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },

    #[error("provider {provider} rate-limited (retry after {retry_after_secs}s)")]
    RateLimited {
        provider: String,
        retry_after_secs: u64,
    },

    #[error("provider {provider} timed out after {elapsed_ms}ms")]
    Timeout { provider: String, elapsed_ms: u64 },

    #[error("provider {provider} returned a malformed response: {detail}")]
    Malformed { provider: String, detail: String },

    #[error("provider {provider} does not support mode {mode}")]
    UnsupportedMode { provider: String, mode: String },

    #[error("all providers failed. Attempts:\n{0}")]
    Exhausted(String),
}

impl ProviderError {
    /// Whether the failure is worth retrying on the same provider.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }
}

// ─── Feedback errors ────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("invalid feedback event: {0}")]
    Invalid(String),
}

// ─── Durable store errors ───────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("schema migration failed: {0}")]
    Schema(String),

    #[error("sqlx: {0}")]
    Sqlx(String),
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, AttuneError>;
