use crate::error::ProviderError;
use crate::session::types::{ContextWindow, Message};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Everything a generation backend needs for one turn: the selected mode,
/// the bounded context, preference directives, and the new user input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub mode: String,
    pub context: ContextWindow,
    pub directives: Vec<String>,
    pub input: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageMetadata {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub text: String,
    #[serde(default)]
    pub usage: UsageMetadata,
    /// Name of the adapter that actually served the response. Routing
    /// wrappers fill this in so fallbacks stay attributable; plain adapters
    /// may leave it unset and be identified by their own `name()`.
    #[serde(default)]
    pub served_by: Option<String>,
}

impl GenerationOutput {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: UsageMetadata::default(),
            served_by: None,
        }
    }
}

/// Pluggable text-generation capability.
///
/// Failures must be classified through [`ProviderError`] so the reliability
/// layer can tell transient from permanent.
pub trait GenerationProvider: Send + Sync {
    /// Provider identifier (e.g. "primary", "local").
    fn name(&self) -> &str;

    fn generate<'a>(
        &'a self,
        request: &'a GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<GenerationOutput, ProviderError>> + Send + 'a>>;
}

/// Pluggable summarization capability used by eviction:
/// `new_summary = summarize(old_summary, evicted_block)`.
pub trait Summarizer: Send + Sync {
    fn summarize<'a>(
        &'a self,
        existing_summary: &'a str,
        evicted: &'a [Message],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + 'a>>;
}
